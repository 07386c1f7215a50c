//! GPU layout inference from data element types.
//!
//! A data element (one vertex, or one instance) is described as an ordered list
//! of named fields, each a scalar or a fixed-size aggregate of one scalar kind.
//! [`Layout::infer`] turns that description into attribute slots:
//!
//! - A field of 1 to 4 components becomes one [`AttributeDescriptor`]
//! - A 16-component field (4x4 matrix) becomes four 4-component descriptors on
//!   consecutive slots
//! - Nested records are flattened, keeping their field boundaries
//! - Offsets accumulate in declaration order and sum to the stride
//!
//! Descriptions come from `#[derive(VertexData)]` or from
//! [`ElementDescription`] directly. [`Layout::of`] caches layouts per type.
//!
//! # Example
//!
//! ```ignore
//! use glint_graphics::VertexData;
//!
//! #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
//! #[repr(C)]
//! struct ShapeInstance {
//!     model: [[f32; 4]; 4],
//!     color: [f32; 4],
//! }
//!
//! let layout = Layout::of::<ShapeInstance>()?;
//! assert_eq!(layout.slot_count(), 5);
//! assert_eq!(layout.stride(), 80);
//! ```

mod describe;
mod infer;
mod scalar;

pub use describe::{AttributeShape, ElementDescription, Field, Shape, VertexData};
pub use infer::{AttributeDescriptor, Layout, LayoutField};
pub use scalar::{BaseType, ScalarKind};
