//! Graphics error types.
//!
//! Every construction failure is a distinct variant carrying the names and the
//! expected and actual shapes involved, so shader/source mismatches can be
//! fixed from the message alone.

use thiserror::Error;

use crate::backend::ShaderStage;
use crate::layout::ScalarKind;

/// Errors that can occur in the graphics system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Leaf fields of one element type use different scalar kinds.
    #[error("element `{element}` mixes scalar kinds: field `{field}` is {found}, expected {expected}")]
    InconsistentScalarKind {
        element: String,
        field: String,
        expected: ScalarKind,
        found: ScalarKind,
    },
    /// A leaf field is not one of the supported scalar kinds.
    #[error("element `{element}` field `{field}` has unsupported scalar type `{type_name}`")]
    UnsupportedScalarKind {
        element: String,
        field: String,
        type_name: String,
    },
    /// A field flattens to a component count that has no attribute form.
    #[error(
        "element `{element}` field `{field}` has {components} components, expected 1, 2, 3, 4 or 16"
    )]
    UnsupportedComponentCount {
        element: String,
        field: String,
        components: usize,
    },
    /// The element type has no fields.
    #[error("element `{0}` has no fields")]
    EmptyLayout(String),
    /// The inferred stride differs from the Rust type's size (padding).
    #[error("element `{element}` is {size} bytes but its fields add up to {stride}; remove padding")]
    StrideMismatch {
        element: String,
        size: usize,
        stride: usize,
    },
    /// A shader stage failed to compile.
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompileError { stage: ShaderStage, log: String },
    /// The program failed to link.
    #[error("shader program failed to link: {0}")]
    ProgramLinkError(String),
    /// No active attribute with this name.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    /// No active uniform with this name.
    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),
    /// A uniform value does not match the declared uniform type.
    #[error("uniform `{name}` is declared as {expected}, got {actual}")]
    UniformTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    /// A uniform array value is longer than the declared array.
    #[error("uniform `{name}` holds {declared} elements, got {supplied}")]
    UniformSizeExceeded {
        name: String,
        declared: usize,
        supplied: usize,
    },
    /// A buffer layout does not match the shader attributes it is bound to.
    #[error("attribute layout mismatch: shader expects {expected}, buffer provides {actual}")]
    AttributeLayoutMismatch { expected: String, actual: String },
    /// A buffer attached as indices is not usable as an index buffer.
    #[error("not an index buffer: {0}")]
    NotAnIndexBuffer(String),
    /// Attributes from two different programs were attached to one binding.
    #[error("binding already holds attributes of program {bound}, cannot attach attributes of program {offered}")]
    CrossProgramBindingError { bound: u32, offered: u32 },
    /// A resource was used after being disposed.
    #[error("{0} used after dispose")]
    UseAfterDispose(String),
    /// The backend failed to create an object.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result alias used throughout the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;
