//! The SpringBox force layout.
//!
//! [`SpringBox`] owns the graph of particles and springs, the spatial
//! index used for repulsion and the energy history used to decide when
//! the layout has stabilized. It is driven by graph-mutation events
//! (or the equivalent direct calls) and by repeated calls to
//! [`SpringBox::compute`].

mod attribute;
mod config;
mod energy;
mod event;
mod springbox;
mod stats;

pub use attribute::{AttributeValue, EdgeAttribute, GraphAttribute, NodeAttribute};
pub use config::{MIN_FORCE, Quality, SimulationConfig};
pub use energy::Energies;
pub use event::{AttributeTarget, GraphEvent, LayoutListener, SubscriberId, Subscribers};
pub use springbox::SpringBox;
pub use stats::{StatsWriter, StepStats};
