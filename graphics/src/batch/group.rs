//! Per-material batch groups.

use std::any::Any;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::backend::{BufferTarget, BufferUsage};
use crate::binding::VertexArray;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::VertexData;
use crate::materials::Material;
use crate::mesh::Mesh;
use crate::resources::GpuBuffer;
use crate::scene::CameraMatrices;

use super::FrameStats;

/// Identity of an `Rc`-shared object.
///
/// Batches hold a `Weak` to their key, which keeps the allocation reserved, so
/// an address names one object for as long as its batch exists.
pub(super) fn identity<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

/// Instance count of one draw call; the device takes a `u32`.
fn draw_instance_count(len: usize, label: &str) -> GraphicsResult<u32> {
    u32::try_from(len).map_err(|_| {
        GraphicsError::InvalidParameter(format!(
            "{len} instances of material `{label}` exceed one draw call"
        ))
    })
}

/// The type-erased operations the registry needs from one material's batches.
pub(super) trait MaterialGroup {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Identity of the material.
    fn key(&self) -> usize;

    /// Check whether the material is still alive.
    fn is_alive(&self) -> bool;

    /// Upload and draw every batch, pruning batches whose mesh is gone.
    fn draw(
        &mut self,
        camera: Option<&dyn CameraMatrices>,
        skip_empty: bool,
        stats: &mut FrameStats,
    ) -> GraphicsResult<()>;

    fn clear(&mut self);

    fn batch_count(&self) -> usize;

    fn pending_instances(&self) -> usize;

    fn dispose(&mut self);
}

/// GPU state and pending instances for one (material, mesh) pair.
struct Batch<V: VertexData, I: VertexData> {
    // Declared first so the binding is released before the buffer it reads.
    binding: VertexArray,
    instances: GpuBuffer<I>,
    mesh: Weak<Mesh<V>>,
    pending: Vec<I>,
}

impl<V: VertexData, I: VertexData> Batch<V, I> {
    fn new(
        device: &Rc<GraphicsDevice>,
        material: &Material<V, I>,
        mesh: &Rc<Mesh<V>>,
        instance_usage: BufferUsage,
    ) -> GraphicsResult<Self> {
        let mut binding = VertexArray::new(device)?;
        binding.attach(mesh.vertices(), 0, material.mesh_attributes())?;

        let instances = GpuBuffer::new(device, BufferTarget::Vertex, instance_usage)?;
        binding.attach(&instances, 1, material.instance_attributes())?;

        if let Some(indices) = mesh.indices() {
            binding.attach_indices(indices)?;
        }

        Ok(Self {
            binding,
            instances,
            mesh: Rc::downgrade(mesh),
            pending: Vec::new(),
        })
    }

    fn dispose(&mut self) {
        self.binding.dispose();
        self.instances.dispose();
        self.pending.clear();
    }
}

/// Every batch of one material, in first-use order.
pub(super) struct BatchList<V: VertexData, I: VertexData> {
    device: Rc<GraphicsDevice>,
    material: Weak<Material<V, I>>,
    batches: Vec<Batch<V, I>>,
    index: HashMap<usize, usize>,
    label: String,
}

impl<V: VertexData, I: VertexData> BatchList<V, I> {
    pub(super) fn new(device: &Rc<GraphicsDevice>, material: &Rc<Material<V, I>>) -> Self {
        Self {
            device: Rc::clone(device),
            material: Rc::downgrade(material),
            batches: Vec::new(),
            index: HashMap::new(),
            label: material.label().unwrap_or("unnamed").to_string(),
        }
    }

    /// Get the pending list of the batch for `mesh`, creating the batch if
    /// needed.
    pub(super) fn pending_for(
        &mut self,
        material: &Material<V, I>,
        mesh: &Rc<Mesh<V>>,
    ) -> GraphicsResult<&mut Vec<I>> {
        let key = identity(mesh);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let batch = Batch::new(
                    &self.device,
                    material,
                    mesh,
                    self.device.parameters().instance_usage,
                )?;
                log::debug!(
                    "Created batch for material `{}`, mesh `{}`",
                    self.label,
                    mesh.label().unwrap_or("unnamed")
                );
                self.batches.push(batch);
                self.index.insert(key, self.batches.len() - 1);
                self.batches.len() - 1
            }
        };
        Ok(&mut self.batches[slot].pending)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .batches
            .iter()
            .enumerate()
            .map(|(slot, batch)| (batch.mesh.as_ptr() as *const () as usize, slot))
            .collect();
    }
}

impl<V: VertexData, I: VertexData> MaterialGroup for BatchList<V, I> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn key(&self) -> usize {
        self.material.as_ptr() as *const () as usize
    }

    fn is_alive(&self) -> bool {
        self.material.strong_count() > 0
    }

    fn draw(
        &mut self,
        camera: Option<&dyn CameraMatrices>,
        skip_empty: bool,
        stats: &mut FrameStats,
    ) -> GraphicsResult<()> {
        let Some(material) = self.material.upgrade() else {
            log::warn!(
                "Material `{}` was dropped; pruning {} batches",
                self.label,
                self.batches.len()
            );
            stats.pruned += self.batches.len();
            self.dispose();
            return Ok(());
        };

        let before = self.batches.len();
        let label = &self.label;
        self.batches.retain_mut(|batch| {
            let alive = batch.mesh.strong_count() > 0;
            if !alive {
                log::warn!("Mesh of a batch of material `{label}` was dropped; pruning batch");
                batch.dispose();
            }
            alive
        });
        if self.batches.len() != before {
            stats.pruned += before - self.batches.len();
            self.rebuild_index();
        }

        let program = material.program();
        if let Some(uniforms) = material.camera_uniforms() {
            match camera {
                Some(camera) => {
                    camera.assign_matrices(program, &uniforms.view, &uniforms.projection)?
                }
                None => log::trace!("Material `{}` drawn without a camera", self.label),
            }
        }

        for batch in &mut self.batches {
            if batch.pending.is_empty() && skip_empty {
                stats.skipped_empty += 1;
                continue;
            }
            let Some(mesh) = batch.mesh.upgrade() else {
                continue;
            };

            batch.instances.upload(&batch.pending)?;
            batch.binding.refresh(&batch.instances)?;

            let instance_count = batch.pending.len();
            let count = draw_instance_count(instance_count, &self.label)?;
            batch.binding.draw(program, count, mesh.topology())?;
            stats.draw_calls += 1;
            stats.instances += instance_count;
        }
        Ok(())
    }

    fn clear(&mut self) {
        for batch in &mut self.batches {
            batch.pending.clear();
        }
    }

    fn batch_count(&self) -> usize {
        self.batches.len()
    }

    fn pending_instances(&self) -> usize {
        self.batches.iter().map(|b| b.pending.len()).sum()
    }

    fn dispose(&mut self) {
        for batch in &mut self.batches {
            batch.dispose();
        }
        self.batches.clear();
        self.index.clear();
    }
}
