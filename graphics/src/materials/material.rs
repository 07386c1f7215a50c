//! Material definition.
//!
//! A [`Material`] pairs a shader program with the attribute names its mesh
//! vertices and its per-instance values bind to, plus the camera uniforms it
//! consumes. Every name is resolved and checked once, at construction.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::binding::plan_attribute_pointers;
use crate::error::{GraphicsError, GraphicsResult};
use crate::layout::{BaseType, Layout, VertexData};
use crate::shader::{ProgramAttribute, ProgramUniform, ShaderProgram};

/// Names of the view and projection matrix uniforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraUniformNames {
    /// View matrix uniform.
    pub view: String,
    /// Projection matrix uniform.
    pub projection: String,
}

/// Descriptor for creating a [`Material`].
#[derive(Debug, Clone)]
pub struct MaterialDescriptor {
    /// Program used to draw.
    pub program: Rc<ShaderProgram>,

    /// Attributes fed from mesh vertices, in vertex field order.
    pub mesh_attributes: Vec<String>,

    /// Attributes fed from instance values, in instance field order.
    pub instance_attributes: Vec<String>,

    /// Camera matrix uniforms, if the material consumes a camera.
    pub camera: Option<CameraUniformNames>,

    /// Optional label for debugging.
    pub label: Option<String>,
}

impl MaterialDescriptor {
    /// Create a descriptor for `program` with no attributes.
    pub fn new(program: Rc<ShaderProgram>) -> Self {
        Self {
            program,
            mesh_attributes: Vec::new(),
            instance_attributes: Vec::new(),
            camera: None,
            label: None,
        }
    }

    /// Set the mesh attribute names.
    pub fn with_mesh_attributes(mut self, names: &[&str]) -> Self {
        self.mesh_attributes = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the instance attribute names.
    pub fn with_instance_attributes(mut self, names: &[&str]) -> Self {
        self.instance_attributes = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Consume camera matrices through the named uniforms.
    pub fn with_camera(mut self, view: impl Into<String>, projection: impl Into<String>) -> Self {
        self.camera = Some(CameraUniformNames {
            view: view.into(),
            projection: projection.into(),
        });
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Resolved camera uniforms of a material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraUniforms {
    /// View matrix uniform.
    pub view: ProgramUniform,
    /// Projection matrix uniform.
    pub projection: ProgramUniform,
}

/// A shader program bound to vertex type `V` and instance type `I`.
///
/// Materials are shared through `Rc`; the batch registry groups draws by the
/// identity of that `Rc`, not by value.
///
/// # Example
///
/// ```ignore
/// let material = Rc::new(Material::<ColorVertex, ShapeInstance>::new(
///     MaterialDescriptor::new(program)
///         .with_mesh_attributes(&["aPosition"])
///         .with_instance_attributes(&["aModel", "aColor"])
///         .with_camera("uView", "uProjection"),
/// )?);
/// ```
pub struct Material<V: VertexData, I: VertexData> {
    program: Rc<ShaderProgram>,
    mesh_attributes: Vec<ProgramAttribute>,
    instance_attributes: Vec<ProgramAttribute>,
    camera: Option<CameraUniforms>,
    label: Option<String>,
    _marker: PhantomData<fn() -> (V, I)>,
}

impl<V: VertexData, I: VertexData> Material<V, I> {
    /// Resolve and validate a material.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::UnknownAttribute`] / [`GraphicsError::UnknownUniform`]
    ///   for names the program does not have
    /// - [`GraphicsError::AttributeLayoutMismatch`] when the named attributes do
    ///   not match the layout of `V` or `I`, or when two of them share a slot
    /// - [`GraphicsError::UniformTypeMismatch`] when a camera uniform is not a
    ///   `mat4`
    pub fn new(descriptor: MaterialDescriptor) -> GraphicsResult<Self> {
        let MaterialDescriptor {
            program,
            mesh_attributes,
            instance_attributes,
            camera,
            label,
        } = descriptor;

        let mesh_attributes = resolve_attributes(&program, &mesh_attributes)?;
        let instance_attributes = resolve_attributes(&program, &instance_attributes)?;
        check_distinct_slots(&mesh_attributes, &instance_attributes)?;
        plan_attribute_pointers(&*Layout::of::<V>()?, &mesh_attributes, 0)?;
        plan_attribute_pointers(&*Layout::of::<I>()?, &instance_attributes, 1)?;

        let camera = camera
            .map(|names| -> GraphicsResult<_> {
                Ok(CameraUniforms {
                    view: resolve_matrix(&program, &names.view)?,
                    projection: resolve_matrix(&program, &names.projection)?,
                })
            })
            .transpose()?;

        log::debug!(
            "Created material `{}` ({} mesh attributes, {} instance attributes, camera: {})",
            label.as_deref().unwrap_or("unnamed"),
            mesh_attributes.len(),
            instance_attributes.len(),
            camera.is_some()
        );

        Ok(Self {
            program,
            mesh_attributes,
            instance_attributes,
            camera,
            label,
            _marker: PhantomData,
        })
    }

    /// Get the shader program.
    pub fn program(&self) -> &Rc<ShaderProgram> {
        &self.program
    }

    /// Get the resolved mesh attributes.
    pub fn mesh_attributes(&self) -> &[ProgramAttribute] {
        &self.mesh_attributes
    }

    /// Get the resolved instance attributes.
    pub fn instance_attributes(&self) -> &[ProgramAttribute] {
        &self.instance_attributes
    }

    /// Get the camera uniforms, if the material consumes a camera.
    pub fn camera_uniforms(&self) -> Option<&CameraUniforms> {
        self.camera.as_ref()
    }

    /// Check whether the material consumes camera matrices.
    pub fn uses_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Get the label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl<V: VertexData, I: VertexData> fmt::Debug for Material<V, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Material")
            .field("label", &self.label)
            .field("program", &self.program)
            .field("mesh_attributes", &self.mesh_attributes.len())
            .field("instance_attributes", &self.instance_attributes.len())
            .field("uses_camera", &self.uses_camera())
            .finish()
    }
}

fn resolve_attributes(
    program: &ShaderProgram,
    names: &[String],
) -> GraphicsResult<Vec<ProgramAttribute>> {
    names
        .iter()
        .map(|name| program.get_attribute(name).cloned())
        .collect()
}

/// Every slot may be fed by one source only; a later binding would replace
/// the earlier one on the vertex array.
fn check_distinct_slots(
    mesh: &[ProgramAttribute],
    instance: &[ProgramAttribute],
) -> GraphicsResult<()> {
    let tagged = mesh
        .iter()
        .map(|a| (a, "mesh"))
        .chain(instance.iter().map(|a| (a, "instance")));
    let mut claimed: HashMap<u32, (&str, &str)> = HashMap::new();
    for (attribute, source) in tagged {
        for location in attribute.location..attribute.location + attribute.slot_count() {
            if let Some((name, first)) = claimed.insert(location, (attribute.name.as_str(), source)) {
                return Err(GraphicsError::AttributeLayoutMismatch {
                    expected: "each attribute slot bound once".to_string(),
                    actual: format!(
                        "slot {location} bound as {first} attribute `{name}` and {source} attribute `{}`",
                        attribute.name
                    ),
                });
            }
        }
    }
    Ok(())
}

fn resolve_matrix(program: &ShaderProgram, name: &str) -> GraphicsResult<ProgramUniform> {
    let uniform = program.get_uniform(name)?;
    if uniform.base_type != BaseType::Float || uniform.components != 16 || uniform.array_size != 1 {
        return Err(GraphicsError::UniformTypeMismatch {
            name: name.to_string(),
            expected: "mat4".to_string(),
            actual: uniform.type_name(),
        });
    }
    Ok(uniform.clone())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::device::{DeviceParameters, GraphicsDevice};

    const VERTEX: &str = r#"
        in vec3 aPosition;
        in mat4 aModel;
        in vec4 aColor;
        uniform mat4 uView;
        uniform mat4 uProjection;
        uniform vec3 uLight;
        out vec4 vColor;
        void main() { vColor = aColor; gl_Position = uProjection * uView * aModel * vec4(aPosition, 1.0); }
    "#;

    const FRAGMENT: &str = "in vec4 vColor; out vec4 c; void main() { c = vColor; }";

    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, crate::VertexData)]
    #[repr(C)]
    struct Instance {
        model: [[f32; 4]; 4],
        color: [f32; 4],
    }

    fn program() -> Rc<ShaderProgram> {
        let backend = Rc::new(DummyBackend::new());
        let device = GraphicsDevice::with_backend(backend, DeviceParameters::default());
        device.create_program(VERTEX, FRAGMENT).unwrap()
    }

    fn descriptor() -> MaterialDescriptor {
        MaterialDescriptor::new(program())
            .with_mesh_attributes(&["aPosition"])
            .with_instance_attributes(&["aModel", "aColor"])
    }

    #[test]
    fn test_material_resolves_names() {
        let material = Material::<[f32; 3], Instance>::new(
            descriptor()
                .with_camera("uView", "uProjection")
                .with_label("shapes"),
        )
        .unwrap();
        assert_eq!(material.mesh_attributes()[0].name, "aPosition");
        assert_eq!(material.instance_attributes().len(), 2);
        assert!(material.uses_camera());
        assert_eq!(material.label(), Some("shapes"));
    }

    #[test]
    fn test_missing_camera_uniform() {
        let err =
            Material::<[f32; 3], Instance>::new(descriptor().with_camera("uCamera", "uProjection"))
                .unwrap_err();
        assert_eq!(err, GraphicsError::UnknownUniform("uCamera".to_string()));
    }

    #[test]
    fn test_camera_uniform_must_be_mat4() {
        let err = Material::<[f32; 3], Instance>::new(descriptor().with_camera("uView", "uLight"))
            .unwrap_err();
        assert!(matches!(err, GraphicsError::UniformTypeMismatch { ref name, .. } if name == "uLight"));
    }

    #[test]
    fn test_unknown_attribute() {
        let err = Material::<[f32; 3], Instance>::new(
            MaterialDescriptor::new(program()).with_mesh_attributes(&["aNormal"]),
        )
        .unwrap_err();
        assert_eq!(err, GraphicsError::UnknownAttribute("aNormal".to_string()));
    }

    #[test]
    fn test_attribute_bound_as_mesh_and_instance() {
        let err = Material::<[f32; 3], [f32; 3]>::new(
            MaterialDescriptor::new(program())
                .with_mesh_attributes(&["aPosition"])
                .with_instance_attributes(&["aPosition"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::AttributeLayoutMismatch { ref actual, .. }
                if actual.contains("mesh attribute `aPosition` and instance attribute `aPosition`")
        ));
    }

    #[test]
    fn test_attribute_listed_twice() {
        let err = Material::<[[f32; 4]; 2], [f32; 4]>::new(
            MaterialDescriptor::new(program()).with_mesh_attributes(&["aColor", "aColor"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::AttributeLayoutMismatch { ref actual, .. }
                if actual.contains("mesh attribute `aColor` and mesh attribute `aColor`")
        ));
    }

    #[test]
    fn test_vertex_type_checked_against_attributes() {
        let err = Material::<[f32; 2], Instance>::new(descriptor()).unwrap_err();
        assert!(matches!(err, GraphicsError::AttributeLayoutMismatch { .. }));
    }
}
