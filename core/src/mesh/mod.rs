//! CPU-side mesh types and generators.
//!
//! This module provides GPU-agnostic mesh data structures:
//!
//! - [`MeshData`] - Typed vertices plus optional indices
//! - [`PrimitiveTopology`] - How vertices form primitives
//! - Generators for common shapes (quad, triangle, regular polygon)
//!
//! These types are re-exported by `glint-graphics` for convenience.

mod data;
pub mod generators;

pub use data::{MeshData, PrimitiveTopology, first_out_of_range_index};
