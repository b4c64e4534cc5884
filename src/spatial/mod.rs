//! Spatial indexing for approximate repulsion.
//!
//! This module provides an arena-backed quadtree/octree whose cells carry
//! barycenters, so that distant clusters of particles can be treated as a
//! single mass (Barnes-Hut).

mod ntree;

pub use ntree::{Admission, Dimension, NTree, Repulsion, RepulsionLaw};
