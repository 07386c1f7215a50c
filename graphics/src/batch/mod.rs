//! Instanced batch registry.
//!
//! [`Graphics`] groups per-frame instances by material, then by mesh. Each
//! (material, mesh) pair gets one batch holding a vertex array, an instance
//! buffer and the pending instance values. Batches persist across frames so
//! their device objects are reused; instance buffers only reallocate when a
//! frame exceeds the previous high-water mark.
//!
//! # Frame Loop
//!
//! ```ignore
//! let mut graphics = Graphics::new(&device);
//! loop {
//!     graphics.clear();
//!     for shape in &shapes {
//!         graphics.add(&material, &quad, shape.instance())?;
//!     }
//!     let stats = graphics.draw(Some(&camera))?;
//!     log::trace!("{} draw calls", stats.draw_calls);
//! }
//! ```
//!
//! # Ownership
//!
//! Materials and meshes stay owned by the caller; the registry holds weak
//! references and prunes batches whose material or mesh has been dropped at
//! the next [`Graphics::draw`].

mod group;

use std::collections::HashMap;
use std::rc::Rc;

use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::VertexData;
use crate::materials::Material;
use crate::mesh::Mesh;
use crate::scene::CameraMatrices;

use group::{BatchList, MaterialGroup, identity};

/// Counters for one [`Graphics::draw`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Instanced draw calls issued.
    pub draw_calls: usize,
    /// Instances drawn across all calls.
    pub instances: usize,
    /// Batches skipped because they had no instances.
    pub skipped_empty: usize,
    /// Batches removed because their material or mesh was dropped.
    pub pruned: usize,
}

/// Batch registry keyed by (material identity, mesh identity).
pub struct Graphics {
    device: Rc<GraphicsDevice>,
    groups: Vec<Box<dyn MaterialGroup>>,
    index: HashMap<usize, usize>,
    disposed: bool,
}

impl Graphics {
    /// Create an empty registry.
    pub fn new(device: &Rc<GraphicsDevice>) -> Self {
        Self {
            device: Rc::clone(device),
            groups: Vec::new(),
            index: HashMap::new(),
            disposed: false,
        }
    }

    /// Queue one instance of `mesh` drawn with `material`.
    ///
    /// Creates the batch (vertex array and empty instance buffer) on first
    /// use of the pair; no data is uploaded until [`draw`](Self::draw).
    pub fn add<V: VertexData, I: VertexData>(
        &mut self,
        material: &Rc<Material<V, I>>,
        mesh: &Rc<Mesh<V>>,
        instance: I,
    ) -> GraphicsResult<()> {
        self.pending_for(material, mesh)?.push(instance);
        Ok(())
    }

    /// Queue several instances of `mesh` drawn with `material`.
    pub fn extend<V: VertexData, I: VertexData>(
        &mut self,
        material: &Rc<Material<V, I>>,
        mesh: &Rc<Mesh<V>>,
        instances: impl IntoIterator<Item = I>,
    ) -> GraphicsResult<()> {
        self.pending_for(material, mesh)?.extend(instances);
        Ok(())
    }

    /// Upload pending instances and issue one instanced draw per batch, in
    /// material then mesh first-use order.
    ///
    /// Materials that consume a camera receive its matrices first. Pending
    /// instances are kept until [`clear`](Self::clear).
    pub fn draw(&mut self, camera: Option<&dyn CameraMatrices>) -> GraphicsResult<FrameStats> {
        self.check_alive()?;
        let skip_empty = self.device.parameters().skip_empty_batches;
        let mut stats = FrameStats::default();

        for group in &mut self.groups {
            group.draw(camera, skip_empty, &mut stats)?;
        }

        let before = self.groups.len();
        self.groups.retain(|g| g.is_alive());
        if self.groups.len() != before {
            self.rebuild_index();
        }

        log::trace!(
            "Frame drawn: {} draw calls, {} instances",
            stats.draw_calls,
            stats.instances
        );
        Ok(stats)
    }

    /// Drop every pending instance, keeping batches and their device objects.
    pub fn clear(&mut self) {
        for group in &mut self.groups {
            group.clear();
        }
    }

    /// Get the number of batches.
    pub fn batch_count(&self) -> usize {
        self.groups.iter().map(|g| g.batch_count()).sum()
    }

    /// Get the number of materials with batches.
    pub fn material_count(&self) -> usize {
        self.groups.len()
    }

    /// Get the number of instances queued since the last clear.
    pub fn pending_instances(&self) -> usize {
        self.groups.iter().map(|g| g.pending_instances()).sum()
    }

    /// Release every batch. Further `add` or `draw` calls fail with
    /// [`GraphicsError::UseAfterDispose`]; disposing again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        log::debug!("Disposing graphics registry ({} batches)", self.batch_count());
        for group in &mut self.groups {
            group.dispose();
        }
        self.groups.clear();
        self.index.clear();
        self.disposed = true;
    }

    fn pending_for<V: VertexData, I: VertexData>(
        &mut self,
        material: &Rc<Material<V, I>>,
        mesh: &Rc<Mesh<V>>,
    ) -> GraphicsResult<&mut Vec<I>> {
        self.check_alive()?;
        let key = identity(material);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                // A material is only registered once its first batch exists.
                let mut list = BatchList::new(&self.device, material);
                list.pending_for(material, mesh)?;
                self.groups.push(Box::new(list));
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        let list = self.groups[slot]
            .as_any_mut()
            .downcast_mut::<BatchList<V, I>>()
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(
                    "material is registered with different vertex and instance types".to_string(),
                )
            })?;
        list.pending_for(material, mesh)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .groups
            .iter()
            .enumerate()
            .map(|(slot, group)| (group.key(), slot))
            .collect();
    }

    fn check_alive(&self) -> GraphicsResult<()> {
        if self.disposed {
            Err(GraphicsError::UseAfterDispose("graphics registry".to_string()))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Graphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graphics")
            .field("materials", &self.material_count())
            .field("batches", &self.batch_count())
            .field("pending_instances", &self.pending_instances())
            .field("disposed", &self.disposed)
            .finish()
    }
}
