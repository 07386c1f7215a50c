//! Vertex array bindings.
//!
//! A [`VertexArray`] associates buffers with the attribute slots of one shader
//! program. Every attachment is validated against the program's introspected
//! attributes before any device state changes: the number of slots, their
//! base type and their component counts must match the buffer's [`Layout`].
//!
//! Attributes are expanded into slots the way the device sees them: a `mat4`
//! occupies four consecutive 4-component slots, and an attribute array of
//! length N occupies N times the slots of one element.

use std::rc::Rc;

use glint_core::mesh::PrimitiveTopology;

use crate::backend::{
    AttribPointer, BufferId, BufferTarget, DrawCommand, GpuObject, IndexType, ProgramId,
    VertexArrayId,
};
use crate::device::{GraphicsDevice, ResourceKind};
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::{Layout, VertexData};
use crate::resources::GpuBuffer;
use crate::shader::{ProgramAttribute, ShaderProgram};

/// One device slot expected by a shader attribute.
#[derive(Debug, Clone, Copy)]
struct ShaderSlot<'a> {
    attribute: &'a ProgramAttribute,
    location: u32,
    components: u8,
}

fn shader_slots(attributes: &[ProgramAttribute]) -> Vec<ShaderSlot<'_>> {
    attributes
        .iter()
        .flat_map(|attribute| {
            (0..attribute.slot_count()).map(move |i| ShaderSlot {
                attribute,
                location: attribute.location + i,
                components: attribute.slot_components(),
            })
        })
        .collect()
}

fn describe_attributes(attributes: &[ProgramAttribute]) -> String {
    let parts: Vec<_> = attributes
        .iter()
        .map(|a| format!("{} {}", a.type_name(), a.name))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Match a buffer layout against shader attributes, producing one attribute
/// pointer per slot.
///
/// Fails with [`GraphicsError::AttributeLayoutMismatch`] when the slot counts
/// differ or any slot disagrees in base type or component count.
pub fn plan_attribute_pointers(
    layout: &Layout,
    attributes: &[ProgramAttribute],
    divisor: u32,
) -> GraphicsResult<Vec<AttribPointer>> {
    let slots = shader_slots(attributes);
    let mismatch = || GraphicsError::AttributeLayoutMismatch {
        expected: describe_attributes(attributes),
        actual: layout.to_string(),
    };

    if slots.len() != layout.descriptors().len() {
        return Err(mismatch());
    }

    slots
        .iter()
        .zip(layout.descriptors())
        .map(|(slot, descriptor)| {
            let base_type = slot.attribute.base_type;
            if descriptor.kind.base_type() != base_type || descriptor.components != slot.components {
                return Err(mismatch());
            }
            Ok(AttribPointer {
                location: slot.location,
                components: descriptor.components,
                kind: descriptor.kind,
                base_type,
                stride: layout.stride(),
                offset: descriptor.offset,
                divisor,
            })
        })
        .collect()
}

#[derive(Debug)]
struct Attachment {
    buffer: BufferId,
    generation: u64,
    elements: usize,
    divisor: u32,
    pointers: Vec<AttribPointer>,
}

#[derive(Debug, Clone, Copy)]
struct IndexAttachment {
    buffer: BufferId,
    generation: u64,
    index_type: IndexType,
    count: usize,
}

/// A vertex array object binding buffers to one program's attributes.
///
/// Holds device handles only: the buffers stay owned by their creators. A
/// buffer reallocated by a growing upload must be passed to
/// [`refresh`](Self::refresh) before the next draw.
///
/// # Example
///
/// ```ignore
/// let mut binding = device.create_vertex_array()?;
/// binding.attach(mesh.vertices(), 0, &[program.get_attribute("aPosition")?.clone()])?;
/// binding.attach(&instances, 1, &instance_attributes)?;
/// binding.draw(&program, instances.len() as u32, PrimitiveTopology::TriangleList)?;
/// ```
pub struct VertexArray {
    device: Rc<GraphicsDevice>,
    id: Option<VertexArrayId>,
    program: Option<ProgramId>,
    attachments: Vec<Attachment>,
    index: Option<IndexAttachment>,
    label: Option<String>,
}

impl VertexArray {
    /// Create an empty vertex array.
    pub fn new(device: &Rc<GraphicsDevice>) -> GraphicsResult<Self> {
        let id = device.backend().create_vertex_array()?;
        device.resource_created(ResourceKind::VertexArray);
        Ok(Self {
            device: Rc::clone(device),
            id: Some(id),
            program: None,
            attachments: Vec::new(),
            index: None,
            label: None,
        })
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if let Some(id) = self.id {
            self.device.label_object(GpuObject::VertexArray(id), &label);
        }
        self.label = Some(label);
        self
    }

    /// Get the device vertex array, failing if disposed.
    pub fn id(&self) -> GraphicsResult<VertexArrayId> {
        self.id.ok_or_else(|| {
            GraphicsError::UseAfterDispose(format!(
                "vertex array `{}`",
                self.label.as_deref().unwrap_or("unnamed")
            ))
        })
    }

    /// Get the program whose attributes are attached, if any.
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Attach `buffer` to `attributes` with the given instancing divisor
    /// (0 advances per vertex, N advances every N instances).
    ///
    /// The attributes are matched in order against the buffer's layout.
    pub fn attach<T: VertexData>(
        &mut self,
        buffer: &GpuBuffer<T>,
        divisor: u32,
        attributes: &[ProgramAttribute],
    ) -> GraphicsResult<()> {
        let id = self.id()?;
        let buffer_id = buffer.id()?;

        let bound = self.program.or_else(|| attributes.first().map(|a| a.program));
        if let Some(bound) = bound
            && let Some(other) = attributes.iter().find(|a| a.program != bound)
        {
            return Err(GraphicsError::CrossProgramBindingError {
                bound: bound.raw(),
                offered: other.program.raw(),
            });
        }

        let pointers = plan_attribute_pointers(buffer.layout(), attributes, divisor)?;
        let backend = self.device.backend();
        for pointer in &pointers {
            backend.set_attribute(id, buffer_id, pointer);
        }

        // Slots re-pointed at this buffer no longer read from their old source.
        for attachment in &mut self.attachments {
            attachment
                .pointers
                .retain(|old| pointers.iter().all(|new| new.location != old.location));
        }
        self.attachments.retain(|a| !a.pointers.is_empty());

        log::trace!(
            "Attached `{}` to {} slots (divisor {divisor})",
            buffer.display_name(),
            pointers.len()
        );
        self.program = bound;
        self.attachments.push(Attachment {
            buffer: buffer_id,
            generation: buffer.generation(),
            elements: buffer.len(),
            divisor,
            pointers,
        });
        Ok(())
    }

    /// Attach `buffer` as the index buffer.
    ///
    /// Fails with [`GraphicsError::NotAnIndexBuffer`] unless the buffer targets
    /// index data and holds single `u8`, `u16` or `u32` values.
    pub fn attach_indices<I: VertexData>(&mut self, buffer: &GpuBuffer<I>) -> GraphicsResult<()> {
        let id = self.id()?;
        let buffer_id = buffer.id()?;

        if buffer.target() != BufferTarget::Index {
            return Err(GraphicsError::NotAnIndexBuffer(format!(
                "buffer `{}` targets vertex data",
                buffer.display_name()
            )));
        }
        let layout = buffer.layout();
        let index_type = match layout.descriptors() {
            [single] if single.components == 1 => IndexType::from_scalar(single.kind),
            _ => None,
        }
        .ok_or_else(|| {
            GraphicsError::NotAnIndexBuffer(format!(
                "buffer `{}` holds {layout}, expected u8, u16 or u32 indices",
                buffer.display_name()
            ))
        })?;

        self.device.backend().set_index_buffer(id, buffer_id);
        self.index = Some(IndexAttachment {
            buffer: buffer_id,
            generation: buffer.generation(),
            index_type,
            count: buffer.len(),
        });
        Ok(())
    }

    /// Re-point every slot sourced from `buffer` if it was reallocated since
    /// it was attached, and pick up its current element count.
    ///
    /// Returns whether any slot was re-pointed.
    pub fn refresh<T: VertexData>(&mut self, buffer: &GpuBuffer<T>) -> GraphicsResult<bool> {
        let id = self.id()?;
        let buffer_id = buffer.id()?;
        let backend = self.device.backend();
        let mut rebound = false;

        for attachment in self.attachments.iter_mut().filter(|a| a.buffer == buffer_id) {
            if attachment.generation != buffer.generation() {
                for pointer in &attachment.pointers {
                    backend.set_attribute(id, buffer_id, pointer);
                }
                attachment.generation = buffer.generation();
                rebound = true;
            }
            attachment.elements = buffer.len();
        }

        if let Some(index) = self.index.as_mut().filter(|i| i.buffer == buffer_id) {
            if index.generation != buffer.generation() {
                backend.set_index_buffer(id, buffer_id);
                index.generation = buffer.generation();
                rebound = true;
            }
            index.count = buffer.len();
        }

        if rebound {
            log::debug!("Re-bound reallocated buffer `{}`", buffer.display_name());
        }
        Ok(rebound)
    }

    /// Get the largest element count among per-vertex buffers.
    pub fn vertex_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| a.divisor == 0)
            .map(|a| a.elements)
            .max()
            .unwrap_or(0)
    }

    /// Get the number of indices, if an index buffer is attached.
    pub fn index_count(&self) -> Option<usize> {
        self.index.map(|i| i.count)
    }

    /// Get the index type, if an index buffer is attached.
    pub fn index_type(&self) -> Option<IndexType> {
        self.index.map(|i| i.index_type)
    }

    /// Issue one instanced draw with `program`.
    ///
    /// Draws the attached indices if present, otherwise [`vertex_count`](Self::vertex_count)
    /// vertices.
    pub fn draw(
        &self,
        program: &ShaderProgram,
        instance_count: u32,
        topology: PrimitiveTopology,
    ) -> GraphicsResult<()> {
        let id = self.id()?;
        let program_id = program.id()?;
        if let Some(bound) = self.program
            && bound != program_id
        {
            return Err(GraphicsError::CrossProgramBindingError {
                bound: bound.raw(),
                offered: program_id.raw(),
            });
        }

        let (count, index_type) = match self.index {
            Some(index) => (index.count, Some(index.index_type)),
            None => (self.vertex_count(), None),
        };
        let command = DrawCommand {
            topology,
            count: u32::try_from(count).map_err(|_| {
                GraphicsError::InvalidParameter(format!("draw of {count} elements exceeds u32"))
            })?,
            instance_count,
            index_type,
        };

        let backend = self.device.backend();
        backend.use_program(Some(program_id));
        backend.draw(program_id, id, &command);
        Ok(())
    }

    /// Check whether the vertex array has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.id.is_none()
    }

    /// Release the device vertex array. Disposing again does nothing.
    pub fn dispose(&mut self) {
        if let Some(id) = self.id.take() {
            self.device.backend().delete_vertex_array(id);
            self.device.resource_released(ResourceKind::VertexArray);
            self.attachments.clear();
            self.index = None;
        }
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("id", &self.id)
            .field("program", &self.program)
            .field("attachments", &self.attachments.len())
            .field("index", &self.index)
            .field("label", &self.label)
            .finish()
    }
}
