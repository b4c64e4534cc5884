//! Arena-backed n-tree (quadtree in 2D, octree in 3D) with barycenters.
//!
//! Every cell keeps the weighted sum of the positions beneath it, so a far
//! away cluster can stand in for all its particles when computing
//! repulsion (Barnes-Hut). Cells live in one `Vec`; children of a cell are
//! contiguous and addressed by the index of the first one. Particles are
//! addressed by their graph handle.

use glam::DVec3;
use petgraph::stable_graph::NodeIndex;

/// Depth past which cells no longer split. Coincident particles would
/// otherwise subdivide forever.
const MAX_DEPTH: u32 = 20;

/// Space dimensionality of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Quadtree over (x, y); z is ignored.
    Two,
    /// Octree over (x, y, z).
    Three,
}

impl Dimension {
    #[inline]
    fn axes(self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }

    #[inline]
    fn children(self) -> usize {
        1 << self.axes()
    }
}

/// How far the tree may approximate when answering a repulsion query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Every other particle contributes exactly.
    Exhaustive,
    /// Particles closer than `view_zone` contribute exactly. Cells outside
    /// it contribute through their barycenter once `width / distance` falls
    /// below `theta`.
    BarnesHut { view_zone: f64, theta: f64 },
}

/// Repulsion force law: `strength * w1 * w2 / d²`, with `d` floored at
/// `unit` so coincident neighbours cannot blow up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepulsionLaw {
    pub unit: f64,
    pub strength: f64,
}

/// Result of one repulsion query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Repulsion {
    pub displacement: DVec3,
    /// Sum of the force magnitudes that went into `displacement`.
    pub energy: f64,
    /// Number of particles or barycenters that were visited.
    pub interactions: usize,
}

#[derive(Debug, Clone)]
struct Cell {
    lo: DVec3,
    hi: DVec3,
    depth: u32,
    parent: Option<usize>,
    first_child: Option<usize>,
    members: Vec<NodeIndex>,
    weighted_sum: DVec3,
    weight: f64,
    population: usize,
}

impl Cell {
    fn new(lo: DVec3, hi: DVec3, depth: u32, parent: Option<usize>) -> Self {
        Self {
            lo,
            hi,
            depth,
            parent,
            first_child: None,
            members: Vec::new(),
            weighted_sum: DVec3::ZERO,
            weight: 0.0,
            population: 0,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    #[inline]
    fn width(&self) -> f64 {
        self.hi.x - self.lo.x
    }

    #[inline]
    fn center_of_mass(&self) -> DVec3 {
        if self.weight > 0.0 {
            self.weighted_sum / self.weight
        } else {
            (self.lo + self.hi) * 0.5
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    position: DVec3,
    weight: f64,
    cell: usize,
}

/// Recursive space partition over the particle positions.
pub struct NTree {
    dimension: Dimension,
    /// Particles a leaf holds before it splits.
    capacity: usize,
    cells: Vec<Cell>,
    /// Dense per-handle slots, indexed by `NodeIndex::index()`.
    entries: Vec<Option<Entry>>,
    len: usize,
}

impl NTree {
    /// Create an empty tree whose leaves split past `capacity` particles.
    pub fn new(dimension: Dimension, capacity: usize) -> Self {
        Self {
            dimension,
            capacity: capacity.max(1),
            cells: Vec::new(),
            entries: Vec::new(),
            len: 0,
        }
    }

    /// Number of particles in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Barycenter and total weight of the whole tree.
    pub fn aggregate(&self) -> Option<(DVec3, f64)> {
        let root = self.cells.first().filter(|c| c.population > 0)?;
        Some((root.center_of_mass(), root.weight))
    }

    /// Insert a particle, or move it if it is already present.
    pub fn insert(&mut self, handle: NodeIndex, position: DVec3, weight: f64) {
        self.remove(handle);

        let slot = handle.index();
        if self.entries.len() <= slot {
            self.entries.resize(slot + 1, None);
        }
        self.entries[slot] = Some(Entry {
            position,
            weight,
            cell: 0,
        });
        self.len += 1;

        let fits = self
            .cells
            .first()
            .is_some_and(|root| self.encloses(root, position));
        if fits {
            self.place(0, handle);
        } else {
            self.rebuild();
        }
    }

    /// Remove a particle. Returns false if it was not in the tree.
    pub fn remove(&mut self, handle: NodeIndex) -> bool {
        let Some(entry) = self.entries.get_mut(handle.index()).and_then(Option::take) else {
            return false;
        };
        self.len -= 1;

        let leaf = &mut self.cells[entry.cell];
        if let Some(at) = leaf.members.iter().position(|&m| m == handle) {
            leaf.members.swap_remove(at);
        }

        let mut cursor = Some(entry.cell);
        while let Some(c) = cursor {
            let cell = &mut self.cells[c];
            cell.weighted_sum -= entry.position * entry.weight;
            cell.weight -= entry.weight;
            cell.population -= 1;
            cursor = cell.parent;
        }
        true
    }

    /// Replace the whole content of the tree.
    pub fn rebuild_from<I>(&mut self, particles: I)
    where
        I: IntoIterator<Item = (NodeIndex, DVec3, f64)>,
    {
        self.entries.iter_mut().for_each(|e| *e = None);
        self.len = 0;
        for (handle, position, weight) in particles {
            let slot = handle.index();
            if self.entries.len() <= slot {
                self.entries.resize(slot + 1, None);
            }
            if self.entries[slot].is_none() {
                self.len += 1;
            }
            self.entries[slot] = Some(Entry {
                position,
                weight,
                cell: 0,
            });
        }
        self.rebuild();
    }

    /// Rebuild all cells from the stored particles, resizing the root to
    /// their current extent.
    fn rebuild(&mut self) {
        self.cells.clear();

        let mut positions = self.entries.iter().flatten().map(|e| e.position);
        let Some(first) = positions.next() else {
            return;
        };
        let (lo, hi) = positions.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        let (lo, hi) = self.root_bounds(lo, hi);
        self.cells.push(Cell::new(lo, hi, 0, None));

        let live: Vec<NodeIndex> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(slot, _)| NodeIndex::new(slot))
            .collect();
        for handle in live {
            self.place(0, handle);
        }
    }

    /// Drop every particle and cell.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
        self.len = 0;
    }

    /// Repulsion felt by a particle from every other particle in the tree.
    pub fn repulsion(&self, handle: NodeIndex, admission: Admission, law: RepulsionLaw) -> Repulsion {
        let mut out = Repulsion::default();
        let Some(entry) = self.entry(handle) else {
            return out;
        };

        match admission {
            Admission::Exhaustive => {
                for (slot, other) in self.entries.iter().enumerate() {
                    let Some(other) = other else { continue };
                    if slot == handle.index() {
                        continue;
                    }
                    out.interactions += 1;
                    Self::repel(&mut out, entry.position, other.position, entry.weight * other.weight, law);
                }
            }
            Admission::BarnesHut { view_zone, theta } => {
                if !self.cells.is_empty() {
                    self.descend(0, handle, &entry, view_zone, theta, law, &mut out);
                }
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn descend(
        &self,
        c: usize,
        handle: NodeIndex,
        entry: &Entry,
        view_zone: f64,
        theta: f64,
        law: RepulsionLaw,
        out: &mut Repulsion,
    ) {
        let cell = &self.cells[c];
        if cell.population == 0 {
            return;
        }

        if self.in_view(cell, entry.position, view_zone) {
            match cell.first_child {
                None => {
                    for &other in &cell.members {
                        if other == handle {
                            continue;
                        }
                        if let Some(o) = self.entry(other) {
                            out.interactions += 1;
                            Self::repel(out, entry.position, o.position, entry.weight * o.weight, law);
                        }
                    }
                }
                Some(first) => {
                    for child in first..first + self.dimension.children() {
                        self.descend(child, handle, entry, view_zone, theta, law, out);
                    }
                }
            }
            return;
        }

        let pole = cell.center_of_mass();
        let distance = pole.distance(entry.position);
        let admissible = distance > 0.0 && cell.width() / distance < theta;

        match cell.first_child {
            Some(first) if !admissible => {
                for child in first..first + self.dimension.children() {
                    self.descend(child, handle, entry, view_zone, theta, law, out);
                }
            }
            _ => {
                out.interactions += 1;
                Self::repel(out, entry.position, pole, entry.weight * cell.weight, law);
            }
        }
    }

    fn repel(out: &mut Repulsion, at: DVec3, other: DVec3, weight: f64, law: RepulsionLaw) {
        let delta = other - at;
        let length = delta.length();
        if length > 0.0 {
            let d = length.max(law.unit);
            let factor = law.strength * weight / (d * d);
            out.energy += factor;
            out.displacement -= delta / length * factor;
        }
    }

    /// Whether the cube of half-side `view_zone` around `at` touches the cell.
    fn in_view(&self, cell: &Cell, at: DVec3, view_zone: f64) -> bool {
        (0..self.dimension.axes())
            .all(|axis| cell.lo[axis] <= at[axis] + view_zone && cell.hi[axis] >= at[axis] - view_zone)
    }

    fn encloses(&self, cell: &Cell, p: DVec3) -> bool {
        (0..self.dimension.axes()).all(|axis| cell.lo[axis] <= p[axis] && p[axis] <= cell.hi[axis])
    }

    /// Square (or cube) root region around the particle extent.
    fn root_bounds(&self, lo: DVec3, hi: DVec3) -> (DVec3, DVec3) {
        let extent = hi - lo;
        let side = match self.dimension {
            Dimension::Two => extent.x.max(extent.y),
            Dimension::Three => extent.max_element(),
        };
        let half = side * 0.5 * 1.01 + 1e-3;
        let center = (lo + hi) * 0.5;
        let mut lo = center - DVec3::splat(half);
        let mut hi = center + DVec3::splat(half);
        if self.dimension == Dimension::Two {
            lo.z = 0.0;
            hi.z = 0.0;
        }
        (lo, hi)
    }

    /// Walk from `start` down to the leaf enclosing the particle, adding its
    /// mass on the way, and split the leaf if it overflows.
    fn place(&mut self, start: usize, handle: NodeIndex) {
        let Some(entry) = self.entry(handle) else {
            return;
        };

        let mut c = start;
        loop {
            let cell = &mut self.cells[c];
            cell.weighted_sum += entry.position * entry.weight;
            cell.weight += entry.weight;
            cell.population += 1;

            match cell.first_child {
                Some(first) => c = first + self.octant(c, entry.position),
                None => {
                    cell.members.push(handle);
                    let overflow = cell.members.len() > self.capacity && cell.depth < MAX_DEPTH;
                    if let Some(e) = self.entries[handle.index()].as_mut() {
                        e.cell = c;
                    }
                    if overflow {
                        self.split(c);
                    }
                    return;
                }
            }
        }
    }

    fn split(&mut self, c: usize) {
        let (lo, hi, depth) = {
            let cell = &self.cells[c];
            (cell.lo, cell.hi, cell.depth)
        };
        let mid = (lo + hi) * 0.5;

        let first = self.cells.len();
        for octant in 0..self.dimension.children() {
            let mut child_lo = lo;
            let mut child_hi = hi;
            for axis in 0..self.dimension.axes() {
                if octant & (1 << axis) != 0 {
                    child_lo[axis] = mid[axis];
                } else {
                    child_hi[axis] = mid[axis];
                }
            }
            self.cells.push(Cell::new(child_lo, child_hi, depth + 1, Some(c)));
        }

        let members = std::mem::take(&mut self.cells[c].members);
        self.cells[c].first_child = Some(first);
        for handle in members {
            let Some(entry) = self.entry(handle) else {
                continue;
            };
            let child = first + self.octant(c, entry.position);
            self.place(child, handle);
        }
    }

    /// Index of the child of `c` that encloses `p`.
    fn octant(&self, c: usize, p: DVec3) -> usize {
        let cell = &self.cells[c];
        let mid = (cell.lo + cell.hi) * 0.5;
        (0..self.dimension.axes())
            .filter(|&axis| p[axis] >= mid[axis])
            .fold(0, |acc, axis| acc | (1 << axis))
    }

    #[inline]
    fn entry(&self, handle: NodeIndex) -> Option<Entry> {
        self.entries.get(handle.index()).copied().flatten()
    }
}
