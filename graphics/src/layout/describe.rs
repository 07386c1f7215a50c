//! Declarative element descriptions.
//!
//! An [`ElementDescription`] is the list of named fields of a data element,
//! each with a [`Shape`]. It is produced at compile time by
//! `#[derive(VertexData)]` or written by hand for types that cannot derive.

use super::scalar::ScalarKind;

/// Shape of one field of a data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A single supported scalar.
    Scalar(ScalarKind),
    /// A leaf type that has no attribute form (e.g. `u64`).
    Unsupported(&'static str),
    /// A fixed-size aggregate of `len` copies of `element`.
    Array { element: Box<Shape>, len: usize },
    /// A nested record whose fields flatten into the parent element.
    Record(Vec<Field>),
}

impl Shape {
    /// A single scalar.
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }

    /// An `n`-component vector of `kind`.
    pub fn vector(kind: ScalarKind, n: usize) -> Self {
        Self::array(Self::Scalar(kind), n)
    }

    /// A 4x4 matrix of `kind`, laid out as four 4-component columns.
    pub fn matrix4(kind: ScalarKind) -> Self {
        Self::array(Self::vector(kind, 4), 4)
    }

    /// A fixed-size array of `element`.
    pub fn array(element: Shape, len: usize) -> Self {
        Self::Array {
            element: Box::new(element),
            len,
        }
    }

    /// Check whether a record appears anywhere inside this shape.
    pub fn contains_record(&self) -> bool {
        match self {
            Self::Record(_) => true,
            Self::Array { element, .. } => element.contains_record(),
            Self::Scalar(_) | Self::Unsupported(_) => false,
        }
    }
}

/// A named field of a data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name, used in diagnostics.
    pub name: String,
    /// Field shape.
    pub shape: Shape,
}

/// Ordered field list of one data element type.
///
/// # Example
///
/// ```ignore
/// let desc = ElementDescription::new("ShapeInstance")
///     .with_field("model", Shape::matrix4(ScalarKind::F32))
///     .with_field("color", Shape::vector(ScalarKind::F32, 4));
/// let layout = Layout::infer(&desc)?;
/// assert_eq!(layout.stride(), 80);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescription {
    name: String,
    fields: Vec<Field>,
}

impl ElementDescription {
    /// Create an empty description for the element called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn with_field(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.fields.push(Field {
            name: name.into(),
            shape,
        });
        self
    }

    /// Get the element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Consume the description, returning its fields.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

/// Types that can appear as a field of a data element.
///
/// Implemented for the supported scalars, for the 64-bit and pointer-sized
/// integers (as [`Shape::Unsupported`]), for fixed arrays, for nalgebra
/// vectors and matrices, and by `#[derive(VertexData)]` for records.
pub trait AttributeShape {
    /// Get the shape of this type.
    fn shape() -> Shape;
}

/// A plain data element whose GPU layout can be inferred.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
/// #[repr(C)]
/// struct ColorVertex {
///     position: [f32; 3],
///     color: [f32; 4],
/// }
/// ```
pub trait VertexData: bytemuck::Pod {
    /// Describe the fields of this element.
    fn describe() -> ElementDescription;
}

macro_rules! impl_scalar_shape {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl AttributeShape for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }
            }

            impl VertexData for $ty {
                fn describe() -> ElementDescription {
                    ElementDescription::new(stringify!($ty)).with_field("value", Self::shape())
                }
            }
        )*
    };
}

macro_rules! impl_unsupported_shape {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AttributeShape for $ty {
                fn shape() -> Shape {
                    Shape::Unsupported(stringify!($ty))
                }
            }
        )*
    };
}

impl_scalar_shape! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
    f64 => F64,
}

impl_unsupported_shape!(i64, u64, i128, u128, isize, usize);

impl<T: AttributeShape, const N: usize> AttributeShape for [T; N] {
    fn shape() -> Shape {
        Shape::array(T::shape(), N)
    }
}

impl<T, const N: usize> VertexData for [T; N]
where
    T: AttributeShape,
    [T; N]: bytemuck::Pod,
{
    fn describe() -> ElementDescription {
        ElementDescription::new(std::any::type_name::<Self>())
            .with_field("value", <Self as AttributeShape>::shape())
    }
}

impl<T, const R: usize, const C: usize> AttributeShape for nalgebra::SMatrix<T, R, C>
where
    T: AttributeShape + nalgebra::Scalar,
{
    fn shape() -> Shape {
        // Column-major storage: C columns of R components.
        if C == 1 {
            Shape::array(T::shape(), R)
        } else {
            Shape::array(Shape::array(T::shape(), R), C)
        }
    }
}

impl<T, const R: usize, const C: usize> VertexData for nalgebra::SMatrix<T, R, C>
where
    T: AttributeShape + nalgebra::Scalar,
    nalgebra::SMatrix<T, R, C>: bytemuck::Pod,
{
    fn describe() -> ElementDescription {
        ElementDescription::new(std::any::type_name::<Self>())
            .with_field("value", <Self as AttributeShape>::shape())
    }
}
