//! GPU buffer resource.

use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use crate::backend::{BufferId, BufferTarget, BufferUsage, GpuObject};
use crate::device::{GraphicsDevice, ResourceKind};
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::{Layout, VertexData};

/// A device buffer holding a homogeneous sequence of `T`.
///
/// Storage grows on demand: uploading more elements than the current capacity
/// reallocates storage sized exactly to the upload and bumps
/// [`generation`](Self::generation), so any vertex array pointing at the old
/// allocation must be refreshed. Smaller uploads overwrite the live prefix in
/// place.
///
/// # Example
///
/// ```ignore
/// let mut instances = device.create_buffer::<ShapeInstance>(BufferTarget::Vertex, BufferUsage::Stream)?;
/// instances.upload(&frame_instances)?;
/// println!("{} of {} elements live", instances.len(), instances.capacity());
/// ```
pub struct GpuBuffer<T: VertexData> {
    device: Rc<GraphicsDevice>,
    id: Option<BufferId>,
    layout: Arc<Layout>,
    target: BufferTarget,
    usage: BufferUsage,
    capacity: usize,
    len: usize,
    generation: u64,
    label: Option<String>,
    _marker: PhantomData<T>,
}

impl<T: VertexData> GpuBuffer<T> {
    /// Create a buffer with zero capacity.
    ///
    /// # Errors
    ///
    /// Fails if the layout of `T` cannot be inferred or the backend cannot
    /// create the buffer.
    pub fn new(
        device: &Rc<GraphicsDevice>,
        target: BufferTarget,
        usage: BufferUsage,
    ) -> GraphicsResult<Self> {
        let layout = Layout::of::<T>()?;
        let id = device.backend().create_buffer()?;
        device.resource_created(ResourceKind::Buffer);
        Ok(Self {
            device: Rc::clone(device),
            id: Some(id),
            layout,
            target,
            usage,
            capacity: 0,
            len: 0,
            generation: 0,
            label: None,
            _marker: PhantomData,
        })
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if let Some(id) = self.id {
            self.device.label_object(GpuObject::Buffer(id), &label);
        }
        self.label = Some(label);
        self
    }

    /// Upload `elements`, growing the storage if needed.
    ///
    /// Bytes past the live prefix are left untouched when no reallocation is
    /// needed.
    pub fn upload(&mut self, elements: &[T]) -> GraphicsResult<()> {
        let id = self.id()?;
        let bytes: &[u8] = bytemuck::cast_slice(elements);
        let backend = self.device.backend();

        if elements.len() > self.capacity {
            log::debug!(
                "Reallocating buffer `{}`: {} -> {} elements",
                self.display_name(),
                self.capacity,
                elements.len()
            );
            backend.buffer_data(id, self.target, bytes, self.usage);
            self.capacity = elements.len();
            self.generation += 1;
        } else if !bytes.is_empty() {
            backend.buffer_sub_data(id, self.target, 0, bytes);
        }
        self.len = elements.len();
        Ok(())
    }

    /// Get the device buffer, failing if disposed.
    pub fn id(&self) -> GraphicsResult<BufferId> {
        self.id.ok_or_else(|| {
            GraphicsError::UseAfterDispose(format!("buffer `{}`", self.display_name()))
        })
    }

    /// Get the number of live elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check whether the buffer holds no live elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the allocated capacity in elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the reallocation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Get the element layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get what the buffer holds.
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Get the usage hint.
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Get the debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Check whether the buffer has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.id.is_none()
    }

    /// Release the device storage. Disposing again does nothing.
    pub fn dispose(&mut self) {
        if let Some(id) = self.id.take() {
            log::trace!("Disposing buffer `{}`", self.display_name());
            self.device.backend().delete_buffer(id);
            self.device.resource_released(ResourceKind::Buffer);
            self.capacity = 0;
            self.len = 0;
        }
    }

    pub(crate) fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.layout.element_name())
    }
}

impl<T: VertexData> Drop for GpuBuffer<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: VertexData> std::fmt::Debug for GpuBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("layout", &self.layout.to_string())
            .field("target", &self.target)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("generation", &self.generation)
            .field("label", &self.label)
            .finish()
    }
}
