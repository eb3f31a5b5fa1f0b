//! Engine data structures: meshes, nodes, bounds, and instances.
//!
//! This module contains the core data types for scene representation:
//!
//! - `mesh` contains mesh buffers, shader types and material lookup
//! - `node` is the capability-tagged scene node consumed by classification
//! - `bounds` holds axis-aligned bounding boxes for visibility testing
//! - `instance` holds per-instance transformation and attribute data

pub mod bounds;
pub mod instance;
pub mod mesh;
pub mod node;
