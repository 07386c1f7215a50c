//! Layout inference.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use super::describe::{ElementDescription, Field, Shape, VertexData};
use super::scalar::ScalarKind;
use crate::error::{GraphicsError, GraphicsResult};

/// Components per slot of a matrix field.
const MATRIX_COLUMN_COMPONENTS: u8 = 4;

/// One shader-visible input slot of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeDescriptor {
    /// Scalar kind of every component.
    pub kind: ScalarKind,
    /// Number of components in this slot (1..=4).
    pub components: u8,
    /// Slot index relative to the first slot of the layout.
    pub slot: u32,
    /// Byte offset within one element.
    pub offset: usize,
}

impl AttributeDescriptor {
    /// Get the size in bytes of this slot.
    pub fn size(&self) -> usize {
        self.kind.size() * self.components as usize
    }
}

impl fmt::Display for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.kind, self.components)
    }
}

/// A named field of a layout, spanning one or more consecutive slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutField {
    /// Flattened field path, e.g. `color` or `transform.model`.
    pub name: String,
    /// Total components (1..=4, or 16 for a 4x4 matrix).
    pub components: u8,
    /// Index of the first descriptor this field occupies.
    pub first_slot: u32,
    /// Number of descriptors this field occupies.
    pub slot_count: u32,
    /// Byte offset within one element.
    pub offset: usize,
}

/// Ordered attribute slots and stride derived from a data element type.
///
/// Invariants: descriptor offsets strictly increase, the descriptor sizes sum
/// to the stride, and every descriptor shares one scalar kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    element: String,
    kind: ScalarKind,
    fields: Vec<LayoutField>,
    descriptors: Vec<AttributeDescriptor>,
    stride: usize,
}

static LAYOUT_CACHE: LazyLock<RwLock<HashMap<TypeId, Arc<Layout>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

impl Layout {
    /// Infer the layout of `T`, caching the result per type.
    ///
    /// Also checks that `T` has no padding, so its bytes can be uploaded as-is.
    pub fn of<T: VertexData>() -> GraphicsResult<Arc<Layout>> {
        let id = TypeId::of::<T>();
        if let Some(layout) = LAYOUT_CACHE.read().get(&id) {
            return Ok(Arc::clone(layout));
        }

        let layout = Self::infer(&T::describe())?;
        let size = std::mem::size_of::<T>();
        if size != layout.stride {
            return Err(GraphicsError::StrideMismatch {
                element: layout.element,
                size,
                stride: layout.stride,
            });
        }

        log::debug!(
            "Inferred layout for `{}`: {} slots, stride {}",
            layout.element,
            layout.descriptors.len(),
            layout.stride
        );

        let layout = Arc::new(layout);
        LAYOUT_CACHE
            .write()
            .entry(id)
            .or_insert_with(|| Arc::clone(&layout));
        Ok(layout)
    }

    /// Infer a layout from a declarative description.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::UnsupportedScalarKind`] if a leaf is not a supported scalar
    /// - [`GraphicsError::EmptyLayout`] if the element has no fields
    /// - [`GraphicsError::InconsistentScalarKind`] if leaves disagree on scalar kind
    /// - [`GraphicsError::UnsupportedComponentCount`] if a field is not 1..=4 or 16 wide
    pub fn infer(description: &ElementDescription) -> GraphicsResult<Layout> {
        let element = description.name();
        let mut leaves = Vec::new();
        for field in description.fields() {
            flatten(element, field.name.clone(), &field.shape, &mut leaves)?;
        }

        let Some(first) = leaves.first() else {
            return Err(GraphicsError::EmptyLayout(element.to_string()));
        };
        let kind = first.kind;

        let mut fields = Vec::with_capacity(leaves.len());
        let mut descriptors = Vec::new();
        let mut offset = 0;
        for leaf in leaves {
            if leaf.kind != kind {
                return Err(GraphicsError::InconsistentScalarKind {
                    element: element.to_string(),
                    field: leaf.name,
                    expected: kind,
                    found: leaf.kind,
                });
            }

            let (slot_count, per_slot) = match leaf.components {
                1..=4 => (1, leaf.components as u8),
                16 => (4, MATRIX_COLUMN_COMPONENTS),
                components => {
                    return Err(GraphicsError::UnsupportedComponentCount {
                        element: element.to_string(),
                        field: leaf.name,
                        components,
                    });
                }
            };

            let first_slot = descriptors.len() as u32;
            fields.push(LayoutField {
                name: leaf.name,
                components: leaf.components as u8,
                first_slot,
                slot_count,
                offset,
            });
            for i in 0..slot_count {
                let descriptor = AttributeDescriptor {
                    kind,
                    components: per_slot,
                    slot: first_slot + i,
                    offset,
                };
                offset += descriptor.size();
                descriptors.push(descriptor);
            }
        }

        Ok(Layout {
            element: element.to_string(),
            kind,
            fields,
            descriptors,
            stride: offset,
        })
    }

    /// Get the element type name.
    pub fn element_name(&self) -> &str {
        &self.element
    }

    /// Get the scalar kind shared by every slot.
    pub fn scalar_kind(&self) -> ScalarKind {
        self.kind
    }

    /// Get the per-element byte stride.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Get the attribute slots in order.
    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    /// Get the named fields in order.
    pub fn fields(&self) -> &[LayoutField] {
        &self.fields
    }

    /// Get the number of slots.
    pub fn slot_count(&self) -> usize {
        self.descriptors.len()
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.element)?;
        for (i, d) in self.descriptors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("]")
    }
}

static_assertions::assert_impl_all!(Layout: Send, Sync);

/// A leaf attribute before slot assignment.
struct Leaf {
    name: String,
    kind: ScalarKind,
    components: usize,
}

fn flatten(element: &str, name: String, shape: &Shape, out: &mut Vec<Leaf>) -> GraphicsResult<()> {
    match shape {
        Shape::Record(fields) => {
            for Field { name: inner, shape } in fields {
                flatten(element, format!("{name}.{inner}"), shape, out)?;
            }
        }
        Shape::Array { element: inner, len } if inner.contains_record() => {
            for i in 0..*len {
                flatten(element, format!("{name}[{i}]"), inner, out)?;
            }
        }
        _ => {
            let (kind, components) = numeric(shape).map_err(|type_name| {
                GraphicsError::UnsupportedScalarKind {
                    element: element.to_string(),
                    field: name.clone(),
                    type_name: type_name.to_string(),
                }
            })?;
            // Zero-length arrays contribute nothing.
            if components > 0 {
                out.push(Leaf {
                    name,
                    kind,
                    components,
                });
            }
        }
    }
    Ok(())
}

/// Collapse a record-free shape into its scalar kind and component count.
fn numeric(shape: &Shape) -> Result<(ScalarKind, usize), &'static str> {
    match shape {
        Shape::Scalar(kind) => Ok((*kind, 1)),
        Shape::Unsupported(type_name) => Err(type_name),
        Shape::Array { element, len } => {
            let (kind, count) = numeric(element)?;
            Ok((kind, count * len))
        }
        Shape::Record(_) => Err("record"),
    }
}
