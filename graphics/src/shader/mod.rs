//! Shader programs with introspection and typed uniforms.
//!
//! A [`ShaderProgram`] is compiled from vertex and fragment GLSL source and
//! then introspected once: every active attribute and uniform is recorded by
//! name with its location, base type, component count and array size. The
//! binding layer validates buffer layouts against [`ProgramAttribute`]s, and
//! [`ShaderProgram::set_uniform`] validates values against [`ProgramUniform`]s,
//! so mismatches surface before any draw.
//!
//! # Example
//!
//! ```ignore
//! let program = device.create_program(VERTEX_SOURCE, FRAGMENT_SOURCE)?;
//! let tint = program.get_uniform("uTint")?.clone();
//! program.set_uniform(&tint, [1.0f32, 0.5, 0.0, 1.0])?;
//! ```

mod uniform;

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::{GpuObject, ProgramId, ShaderStage, UniformLocation};
use crate::device::{GraphicsDevice, ResourceKind};
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::BaseType;

pub use uniform::UniformValue;

/// An active vertex input of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAttribute {
    /// Attribute name.
    pub name: String,
    /// First attribute slot.
    pub location: u32,
    /// Base type.
    pub base_type: BaseType,
    /// Components (1..=4, or 16 for `mat4`).
    pub components: u8,
    /// Array length (1 for non-arrays).
    pub array_size: u32,
    /// Program this attribute belongs to.
    pub program: ProgramId,
}

impl ProgramAttribute {
    /// Get the components of each slot this attribute occupies.
    pub fn slot_components(&self) -> u8 {
        if self.components == 16 { 4 } else { self.components }
    }

    /// Get the number of consecutive slots this attribute occupies.
    pub fn slot_count(&self) -> u32 {
        let per_element = if self.components == 16 { 4 } else { 1 };
        per_element * self.array_size
    }

    /// Format the GLSL type, e.g. `vec3` or `mat4[2]`.
    pub fn type_name(&self) -> String {
        let element = self.base_type.glsl_name(self.components);
        if self.array_size > 1 {
            format!("{element}[{}]", self.array_size)
        } else {
            element
        }
    }
}

/// An active uniform of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramUniform {
    /// Uniform name, without any `[0]` suffix.
    pub name: String,
    /// Location of element 0.
    pub location: UniformLocation,
    /// Base type.
    pub base_type: BaseType,
    /// Components (1..=4, or 16 for `mat4`).
    pub components: u8,
    /// Array length (1 for non-arrays).
    pub array_size: u32,
    /// Program this uniform belongs to.
    pub program: ProgramId,
}

impl ProgramUniform {
    /// Format the GLSL type, e.g. `mat4` or `vec4[8]`.
    pub fn type_name(&self) -> String {
        let element = self.base_type.glsl_name(self.components);
        if self.array_size > 1 {
            format!("{element}[{}]", self.array_size)
        } else {
            element
        }
    }

    /// Check that `value` can be written to this uniform.
    pub fn check(&self, value: &UniformValue) -> GraphicsResult<()> {
        let type_matches = match self.base_type {
            BaseType::Sampler => value.base_type() == BaseType::Int && value.components() == 1,
            declared => value.base_type() == declared && value.components() == self.components,
        };
        if !type_matches {
            return Err(GraphicsError::UniformTypeMismatch {
                name: self.name.clone(),
                expected: self.type_name(),
                actual: value.type_name(),
            });
        }
        if value.len() > self.array_size as usize {
            return Err(GraphicsError::UniformSizeExceeded {
                name: self.name.clone(),
                declared: self.array_size as usize,
                supplied: value.len(),
            });
        }
        Ok(())
    }
}

/// A linked shader program.
///
/// Programs are shared by materials through `Rc`. The device program is
/// released by [`dispose`](Self::dispose) or on drop, whichever comes first.
pub struct ShaderProgram {
    device: Rc<GraphicsDevice>,
    id: Cell<Option<ProgramId>>,
    attributes: Vec<ProgramAttribute>,
    uniforms: Vec<ProgramUniform>,
    attribute_index: HashMap<String, usize>,
    uniform_index: HashMap<String, usize>,
    label: Option<String>,
}

impl ShaderProgram {
    /// Compile both stages, link them and introspect the result.
    ///
    /// Fails with [`GraphicsError::ShaderCompileError`] or
    /// [`GraphicsError::ProgramLinkError`] carrying the device log. No device
    /// object outlives a failed compile.
    pub fn compile(
        device: &Rc<GraphicsDevice>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> GraphicsResult<Self> {
        let backend = device.backend();
        let vertex = backend.compile_shader(ShaderStage::Vertex, vertex_source)?;
        let fragment = match backend.compile_shader(ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(e) => {
                backend.delete_shader(vertex);
                return Err(e);
            }
        };
        let linked = backend.link_program(vertex, fragment);
        backend.delete_shader(vertex);
        backend.delete_shader(fragment);
        let id = linked?;
        device.resource_created(ResourceKind::Program);

        let attributes: Vec<_> = backend
            .active_attributes(id)
            .into_iter()
            .map(|a| ProgramAttribute {
                name: a.name,
                location: a.location,
                base_type: a.base_type,
                components: a.components,
                array_size: a.array_size,
                program: id,
            })
            .collect();
        let uniforms: Vec<_> = backend
            .active_uniforms(id)
            .into_iter()
            .map(|u| ProgramUniform {
                name: u.name,
                location: u.location,
                base_type: u.base_type,
                components: u.components,
                array_size: u.array_size,
                program: id,
            })
            .collect();

        log::debug!(
            "Linked program {} ({} attributes, {} uniforms)",
            id.raw(),
            attributes.len(),
            uniforms.len()
        );

        Ok(Self {
            device: Rc::clone(device),
            id: Cell::new(Some(id)),
            attribute_index: attributes
                .iter()
                .enumerate()
                .map(|(i, a)| (a.name.clone(), i))
                .collect(),
            uniform_index: uniforms
                .iter()
                .enumerate()
                .map(|(i, u)| (u.name.clone(), i))
                .collect(),
            attributes,
            uniforms,
            label: None,
        })
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if let Some(id) = self.id.get() {
            self.device.label_object(GpuObject::Program(id), &label);
        }
        self.label = Some(label);
        self
    }

    /// Get the device program, failing if disposed.
    pub fn id(&self) -> GraphicsResult<ProgramId> {
        self.id.get().ok_or_else(|| {
            GraphicsError::UseAfterDispose(format!("shader program `{}`", self.display_name()))
        })
    }

    /// Get the debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Check whether the program has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.id.get().is_none()
    }

    /// Get every active attribute.
    pub fn attributes(&self) -> &[ProgramAttribute] {
        &self.attributes
    }

    /// Get every active uniform.
    pub fn uniforms(&self) -> &[ProgramUniform] {
        &self.uniforms
    }

    /// Look up an active attribute by name.
    pub fn get_attribute(&self, name: &str) -> GraphicsResult<&ProgramAttribute> {
        self.attribute_index
            .get(name)
            .map(|&i| &self.attributes[i])
            .ok_or_else(|| GraphicsError::UnknownAttribute(name.to_string()))
    }

    /// Look up an active uniform by name.
    pub fn get_uniform(&self, name: &str) -> GraphicsResult<&ProgramUniform> {
        self.uniform_index
            .get(name)
            .map(|&i| &self.uniforms[i])
            .ok_or_else(|| GraphicsError::UnknownUniform(name.to_string()))
    }

    /// Make this program current.
    pub fn bind(&self) -> GraphicsResult<()> {
        let id = self.id()?;
        self.device.backend().use_program(Some(id));
        Ok(())
    }

    /// Write a uniform after checking its type and array bound.
    ///
    /// Binds the program first.
    pub fn set_uniform(
        &self,
        uniform: &ProgramUniform,
        value: impl Into<UniformValue>,
    ) -> GraphicsResult<()> {
        let id = self.id()?;
        if uniform.program != id {
            return Err(GraphicsError::InvalidParameter(format!(
                "uniform `{}` belongs to program {}, not {}",
                uniform.name,
                uniform.program.raw(),
                id.raw()
            )));
        }
        let value = value.into();
        uniform.check(&value)?;

        let backend = self.device.backend();
        backend.use_program(Some(id));
        backend.set_uniform(uniform.location, &value);
        Ok(())
    }

    /// Look up a uniform by name and write it.
    pub fn set_uniform_by_name(
        &self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> GraphicsResult<()> {
        let uniform = self.get_uniform(name)?;
        self.set_uniform(uniform, value)
    }

    /// Release the device program. Further use fails with
    /// [`GraphicsError::UseAfterDispose`]; disposing again does nothing.
    pub fn dispose(&self) {
        if let Some(id) = self.id.take() {
            log::debug!("Disposing program {}", id.raw());
            self.device.backend().delete_program(id);
            self.device.resource_released(ResourceKind::Program);
        }
    }

    fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("id", &self.id.get())
            .field("label", &self.label)
            .field("attributes", &self.attributes.len())
            .field("uniforms", &self.uniforms.len())
            .finish()
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::device::DeviceParameters;

    const VERTEX: &str = r#"
        #version 330 core
        in vec3 aPosition;
        in mat4 aModel;
        uniform mat4 uView;
        uniform vec4 uTint;
        uniform float uWeights[4];
        uniform sampler2D uTexture;
        void main() { gl_Position = uView * aModel * vec4(aPosition, 1.0); }
    "#;

    const FRAGMENT: &str = r#"
        #version 330 core
        uniform vec4 uTint;
        uniform bool uEnabled;
        out vec4 color;
        void main() { color = uTint; }
    "#;

    fn setup() -> (Rc<DummyBackend>, Rc<GraphicsDevice>) {
        let backend = Rc::new(DummyBackend::new());
        let device = GraphicsDevice::with_backend(backend.clone(), DeviceParameters::default());
        (backend, device)
    }

    #[test]
    fn test_introspection() {
        let (_backend, device) = setup();
        let program = ShaderProgram::compile(&device, VERTEX, FRAGMENT).unwrap();

        let model = program.get_attribute("aModel").unwrap();
        assert_eq!(model.components, 16);
        assert_eq!(model.slot_count(), 4);
        assert_eq!(model.type_name(), "mat4");

        let weights = program.get_uniform("uWeights").unwrap();
        assert_eq!(weights.array_size, 4);
        assert_eq!(weights.type_name(), "float[4]");

        // Shared between stages, reported once.
        let tints = program.uniforms().iter().filter(|u| u.name == "uTint").count();
        assert_eq!(tints, 1);
    }

    #[test]
    fn test_unknown_names() {
        let (_backend, device) = setup();
        let program = ShaderProgram::compile(&device, VERTEX, FRAGMENT).unwrap();
        assert_eq!(
            program.get_uniform("uMissing").unwrap_err(),
            GraphicsError::UnknownUniform("uMissing".to_string())
        );
        assert_eq!(
            program.get_attribute("aMissing").unwrap_err(),
            GraphicsError::UnknownAttribute("aMissing".to_string())
        );
    }

    #[test]
    fn test_set_uniform_writes_value() {
        let (backend, device) = setup();
        let program = ShaderProgram::compile(&device, VERTEX, FRAGMENT).unwrap();
        program
            .set_uniform_by_name("uTint", [1.0f32, 0.0, 0.0, 1.0])
            .unwrap();
        program.set_uniform_by_name("uTexture", 2i32).unwrap();
        program.set_uniform_by_name("uEnabled", true).unwrap();

        let id = program.id().unwrap();
        assert_eq!(
            backend.uniform_value(id, "uTint"),
            Some(UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        );
        assert_eq!(backend.uniform_value(id, "uTexture"), Some(UniformValue::Int(2)));
        assert!(backend.errors().is_empty());
    }

    #[test]
    fn test_set_uniform_type_checks() {
        let (_backend, device) = setup();
        let program = ShaderProgram::compile(&device, VERTEX, FRAGMENT).unwrap();

        let err = program
            .set_uniform_by_name("uTint", [1.0f32, 0.0, 0.0])
            .unwrap_err();
        assert_eq!(
            err,
            GraphicsError::UniformTypeMismatch {
                name: "uTint".to_string(),
                expected: "vec4".to_string(),
                actual: "vec3".to_string(),
            }
        );

        let err = program
            .set_uniform_by_name("uWeights", vec![0.0f32; 5])
            .unwrap_err();
        assert_eq!(
            err,
            GraphicsError::UniformSizeExceeded {
                name: "uWeights".to_string(),
                declared: 4,
                supplied: 5,
            }
        );

        assert!(program.set_uniform_by_name("uWeights", vec![0.5f32; 3]).is_ok());
        assert!(program.set_uniform_by_name("uEnabled", 1i32).is_err());
    }

    #[test]
    fn test_bool_and_double_vector_uniforms() {
        let (backend, device) = setup();
        let fragment = r#"
            #version 400 core
            uniform bvec3 uMask;
            uniform dvec2 uOrigin;
            out vec4 color;
            void main() { color = vec4(uMask, float(uOrigin.x)); }
        "#;
        let program = ShaderProgram::compile(&device, VERTEX, fragment).unwrap();

        program.set_uniform_by_name("uMask", [true, false, true]).unwrap();
        program.set_uniform_by_name("uOrigin", [0.5f64, 2.0]).unwrap();
        let id = program.id().unwrap();
        assert_eq!(
            backend.uniform_value(id, "uMask"),
            Some(UniformValue::BVec3([true, false, true]))
        );
        assert_eq!(
            backend.uniform_value(id, "uOrigin"),
            Some(UniformValue::DVec2([0.5, 2.0]))
        );

        let err = program.set_uniform_by_name("uMask", [1i32, 0, 1]).unwrap_err();
        assert_eq!(
            err,
            GraphicsError::UniformTypeMismatch {
                name: "uMask".to_string(),
                expected: "bvec3".to_string(),
                actual: "ivec3".to_string(),
            }
        );
        assert!(program.set_uniform_by_name("uOrigin", [0.5f32, 2.0]).is_err());
    }

    #[test]
    fn test_compile_failure_leaves_nothing_behind() {
        let (backend, device) = setup();
        let err = ShaderProgram::compile(&device, VERTEX, "out vec4 c;").unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::ShaderCompileError {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(device.program_count(), 0);
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (backend, device) = setup();
        let program = ShaderProgram::compile(&device, VERTEX, FRAGMENT).unwrap();
        assert_eq!(device.program_count(), 1);

        program.dispose();
        program.dispose();
        assert_eq!(device.program_count(), 0);
        assert!(program.is_disposed());
        assert!(matches!(
            program.set_uniform_by_name("uTint", [0.0f32; 4]),
            Err(GraphicsError::UseAfterDispose(_))
        ));
        assert!(backend.errors().is_empty());
    }
}
