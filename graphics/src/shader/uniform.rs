//! Typed uniform values.

use glint_core::math::{Mat4, Vec2, Vec3, Vec4, mat4_to_cols_array};

use crate::layout::BaseType;

/// A value that can be written to a shader uniform.
///
/// Array variants write consecutive elements starting at element 0 of a
/// uniform array. Matrices are column-major.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2([f32; 2]),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `int`, or a sampler's texture unit
    Int(i32),
    /// `ivec2`
    IVec2([i32; 2]),
    /// `ivec3`
    IVec3([i32; 3]),
    /// `ivec4`
    IVec4([i32; 4]),
    /// `uint`
    UInt(u32),
    /// `uvec2`
    UVec2([u32; 2]),
    /// `uvec3`
    UVec3([u32; 3]),
    /// `uvec4`
    UVec4([u32; 4]),
    /// `double`
    Double(f64),
    /// `dvec2`
    DVec2([f64; 2]),
    /// `dvec3`
    DVec3([f64; 3]),
    /// `dvec4`
    DVec4([f64; 4]),
    /// `bool`
    Bool(bool),
    /// `bvec2`
    BVec2([bool; 2]),
    /// `bvec3`
    BVec3([bool; 3]),
    /// `bvec4`
    BVec4([bool; 4]),
    /// `mat4`
    Mat4([f32; 16]),
    /// `float[]`
    FloatArray(Vec<f32>),
    /// `vec2[]`
    Vec2Array(Vec<[f32; 2]>),
    /// `vec3[]`
    Vec3Array(Vec<[f32; 3]>),
    /// `vec4[]`
    Vec4Array(Vec<[f32; 4]>),
    /// `int[]`
    IntArray(Vec<i32>),
    /// `uint[]`
    UIntArray(Vec<u32>),
    /// `mat4[]`
    Mat4Array(Vec<[f32; 16]>),
}

impl UniformValue {
    /// Get the base type of this value.
    pub fn base_type(&self) -> BaseType {
        match self {
            Self::Float(_)
            | Self::Vec2(_)
            | Self::Vec3(_)
            | Self::Vec4(_)
            | Self::Mat4(_)
            | Self::FloatArray(_)
            | Self::Vec2Array(_)
            | Self::Vec3Array(_)
            | Self::Vec4Array(_)
            | Self::Mat4Array(_) => BaseType::Float,
            Self::Int(_) | Self::IVec2(_) | Self::IVec3(_) | Self::IVec4(_) | Self::IntArray(_) => {
                BaseType::Int
            }
            Self::UInt(_)
            | Self::UVec2(_)
            | Self::UVec3(_)
            | Self::UVec4(_)
            | Self::UIntArray(_) => BaseType::UInt,
            Self::Double(_) | Self::DVec2(_) | Self::DVec3(_) | Self::DVec4(_) => BaseType::Double,
            Self::Bool(_) | Self::BVec2(_) | Self::BVec3(_) | Self::BVec4(_) => BaseType::Bool,
        }
    }

    /// Get the components per element (16 for `mat4`).
    pub fn components(&self) -> u8 {
        match self {
            Self::Float(_)
            | Self::Int(_)
            | Self::UInt(_)
            | Self::Bool(_)
            | Self::Double(_)
            | Self::FloatArray(_)
            | Self::IntArray(_)
            | Self::UIntArray(_) => 1,
            Self::Vec2(_)
            | Self::IVec2(_)
            | Self::UVec2(_)
            | Self::DVec2(_)
            | Self::BVec2(_)
            | Self::Vec2Array(_) => 2,
            Self::Vec3(_)
            | Self::IVec3(_)
            | Self::UVec3(_)
            | Self::DVec3(_)
            | Self::BVec3(_)
            | Self::Vec3Array(_) => 3,
            Self::Vec4(_)
            | Self::IVec4(_)
            | Self::UVec4(_)
            | Self::DVec4(_)
            | Self::BVec4(_)
            | Self::Vec4Array(_) => 4,
            Self::Mat4(_) | Self::Mat4Array(_) => 16,
        }
    }

    /// Get the number of elements written (1 for non-array values).
    pub fn len(&self) -> usize {
        match self {
            Self::FloatArray(v) => v.len(),
            Self::Vec2Array(v) => v.len(),
            Self::Vec3Array(v) => v.len(),
            Self::Vec4Array(v) => v.len(),
            Self::IntArray(v) => v.len(),
            Self::UIntArray(v) => v.len(),
            Self::Mat4Array(v) => v.len(),
            _ => 1,
        }
    }

    /// Check whether this is an empty array value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether this is an array variant.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::FloatArray(_)
                | Self::Vec2Array(_)
                | Self::Vec3Array(_)
                | Self::Vec4Array(_)
                | Self::IntArray(_)
                | Self::UIntArray(_)
                | Self::Mat4Array(_)
        )
    }

    /// Format a GLSL-style type name, e.g. `vec3` or `mat4[2]`.
    pub fn type_name(&self) -> String {
        let element = self.base_type().glsl_name(self.components());
        if self.is_array() {
            format!("{element}[{}]", self.len())
        } else {
            element
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    f32 => Float,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    i32 => Int,
    [i32; 2] => IVec2,
    [i32; 3] => IVec3,
    [i32; 4] => IVec4,
    u32 => UInt,
    [u32; 2] => UVec2,
    [u32; 3] => UVec3,
    [u32; 4] => UVec4,
    f64 => Double,
    [f64; 2] => DVec2,
    [f64; 3] => DVec3,
    [f64; 4] => DVec4,
    bool => Bool,
    [bool; 2] => BVec2,
    [bool; 3] => BVec3,
    [bool; 4] => BVec4,
    [f32; 16] => Mat4,
    Vec<f32> => FloatArray,
    Vec<[f32; 2]> => Vec2Array,
    Vec<[f32; 3]> => Vec3Array,
    Vec<[f32; 4]> => Vec4Array,
    Vec<i32> => IntArray,
    Vec<u32> => UIntArray,
    Vec<[f32; 16]> => Mat4Array,
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value.into())
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value.into())
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value.into())
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(mat4_to_cols_array(&value))
    }
}

impl From<&Mat4> for UniformValue {
    fn from(value: &Mat4) -> Self {
        Self::Mat4(mat4_to_cols_array(value))
    }
}

impl From<&[Mat4]> for UniformValue {
    fn from(values: &[Mat4]) -> Self {
        Self::Mat4Array(values.iter().map(mat4_to_cols_array).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(UniformValue::from(1.0f32).type_name(), "float");
        assert_eq!(UniformValue::from([1u32, 2]).type_name(), "uvec2");
        assert_eq!(UniformValue::from(Mat4::identity()).type_name(), "mat4");
        assert_eq!(
            UniformValue::from(vec![[0.0f32; 3]; 4]).type_name(),
            "vec3[4]"
        );
    }

    #[test]
    fn test_double_and_bool_vectors() {
        let value = UniformValue::from([1.0f64, 2.0, 3.0]);
        assert_eq!(value.base_type(), BaseType::Double);
        assert_eq!(value.type_name(), "dvec3");
        assert_eq!(UniformValue::from(0.5f64).type_name(), "double");
        assert_eq!(UniformValue::from([true, false]).type_name(), "bvec2");
        assert_eq!(UniformValue::from([true; 4]).components(), 4);
        assert!(!UniformValue::BVec3([false; 3]).is_array());
    }

    #[test]
    fn test_nalgebra_conversions() {
        let value = UniformValue::from(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(value, UniformValue::Vec3([1.0, 2.0, 3.0]));

        let mut m = Mat4::identity();
        m[(0, 3)] = 5.0;
        let UniformValue::Mat4(cols) = UniformValue::from(&m) else {
            panic!("expected a matrix");
        };
        // Translation lives in the fourth column.
        assert_eq!(cols[12], 5.0);
    }

    #[test]
    fn test_array_len() {
        let value = UniformValue::from(vec![1i32, 2, 3]);
        assert!(value.is_array());
        assert_eq!(value.len(), 3);
        assert_eq!(value.base_type(), BaseType::Int);
        assert_eq!(UniformValue::Bool(true).len(), 1);
        assert!(!UniformValue::Bool(true).is_array());
    }
}
