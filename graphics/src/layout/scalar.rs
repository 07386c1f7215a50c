//! Scalar kinds on the data side and base types on the shader side.

use std::fmt;

/// Scalar kind of a leaf field in a data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 8-bit signed integer.
    I8,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit signed integer.
    I16,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl ScalarKind {
    /// Get the size in bytes of one scalar.
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Get the shader base type this scalar feeds without conversion.
    pub fn base_type(self) -> BaseType {
        match self {
            Self::I8 | Self::I16 | Self::I32 => BaseType::Int,
            Self::U8 | Self::U16 | Self::U32 => BaseType::UInt,
            Self::F32 => BaseType::Float,
            Self::F64 => BaseType::Double,
        }
    }

    /// Get the Rust spelling of this scalar.
    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base type of a shader input or uniform, as reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    /// `float`, `vecN`, `mat4`.
    Float,
    /// `double`, `dvecN`, `dmat4`.
    Double,
    /// `int`, `ivecN`.
    Int,
    /// `uint`, `uvecN`.
    UInt,
    /// `bool`, `bvecN` (uniforms only).
    Bool,
    /// Any sampler type (uniforms only, set as an `int` texture unit).
    Sampler,
}

impl BaseType {
    /// Format a GLSL-style type name for this base type and component count.
    ///
    /// A component count of 16 names a 4x4 matrix.
    pub fn glsl_name(self, components: u8) -> String {
        let (scalar, prefix) = match self {
            Self::Float => ("float", ""),
            Self::Double => ("double", "d"),
            Self::Int => ("int", "i"),
            Self::UInt => ("uint", "u"),
            Self::Bool => ("bool", "b"),
            Self::Sampler => return "sampler".to_string(),
        };
        match components {
            1 => scalar.to_string(),
            16 => format!("{prefix}mat4"),
            n => format!("{prefix}vec{n}"),
        }
    }
}
