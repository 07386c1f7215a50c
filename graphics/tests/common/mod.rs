//! Common utilities for batching integration tests.
//!
//! Shared shaders, vertex and instance types, and a test context that pairs a
//! device with the backend that records its calls.

use std::rc::Rc;

use glint_graphics::{
    DeviceParameters, DummyBackend, GraphicsDevice, GraphicsResult, Material, MaterialDescriptor,
    ShaderProgram, VertexData,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (records calls, models device state).
    Dummy,
    /// OpenGL backend (needs a host context).
    Gl,
}

impl Backend {
    /// Check if this backend is currently available.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            // No headless context is created by the test harness.
            Backend::Gl => false,
        }
    }
}

// ============================================================================
// Shaders
// ============================================================================

/// Instanced shape shader: per-vertex position, per-instance model and color.
pub const SHAPE_VERTEX: &str = r#"
    #version 330 core
    in vec3 aPosition;
    in mat4 aModel;
    in vec4 aColor;
    uniform mat4 uView;
    uniform mat4 uProjection;
    out vec4 vColor;
    void main() {
        vColor = aColor;
        gl_Position = uProjection * uView * aModel * vec4(aPosition, 1.0);
    }
"#;

/// Pass-through color fragment shader.
pub const SHAPE_FRAGMENT: &str = r#"
    #version 330 core
    in vec4 vColor;
    out vec4 fragColor;
    void main() { fragColor = vColor; }
"#;

/// Flat shader without camera uniforms: per-instance offset only.
pub const FLAT_VERTEX: &str = r#"
    #version 330 core
    in vec3 aPosition;
    in vec2 aOffset;
    void main() { gl_Position = vec4(aPosition.xy + aOffset, aPosition.z, 1.0); }
"#;

/// Constant color fragment shader.
pub const FLAT_FRAGMENT: &str = r#"
    #version 330 core
    out vec4 fragColor;
    void main() { fragColor = vec4(1.0); }
"#;

// ============================================================================
// Vertex and Instance Types
// ============================================================================

/// Per-instance values of the shape shader.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
#[repr(C)]
pub struct ShapeInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl ShapeInstance {
    /// Identity transform with the given color.
    pub fn colored(color: [f32; 4]) -> Self {
        let mut model = [[0.0; 4]; 4];
        for (i, column) in model.iter_mut().enumerate() {
            column[i] = 1.0;
        }
        Self { model, color }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context pairing a device with its recording backend.
pub struct TestContext {
    /// Backend that records every device call.
    pub backend: Rc<DummyBackend>,
    /// Graphics device for creating resources.
    pub device: Rc<GraphicsDevice>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_parameters(backend, DeviceParameters::default())
    }

    /// Create a test context with custom device parameters.
    pub fn with_parameters(backend: Backend, parameters: DeviceParameters) -> Option<Self> {
        if !backend.is_available() {
            return None;
        }
        let _ = env_logger::builder().is_test(true).try_init();

        let recorder = Rc::new(DummyBackend::new());
        let device = GraphicsDevice::with_backend(recorder.clone(), parameters);
        Some(Self {
            backend: recorder,
            device,
        })
    }

    /// Compile the instanced shape program.
    pub fn shape_program(&self) -> Rc<ShaderProgram> {
        self.device
            .create_program(SHAPE_VERTEX, SHAPE_FRAGMENT)
            .expect("shape shader should link")
    }

    /// Build a shape material, optionally consuming the camera.
    pub fn shape_material(&self, with_camera: bool) -> GraphicsResult<Rc<Material<[f32; 3], ShapeInstance>>> {
        let mut descriptor = MaterialDescriptor::new(self.shape_program())
            .with_mesh_attributes(&["aPosition"])
            .with_instance_attributes(&["aModel", "aColor"])
            .with_label("shapes");
        if with_camera {
            descriptor = descriptor.with_camera("uView", "uProjection");
        }
        Material::new(descriptor).map(Rc::new)
    }

    /// Build a flat material fed by `[f32; 2]` offsets.
    pub fn flat_material(&self) -> Rc<Material<[f32; 3], [f32; 2]>> {
        let program = self
            .device
            .create_program(FLAT_VERTEX, FLAT_FRAGMENT)
            .expect("flat shader should link");
        Rc::new(
            Material::new(
                MaterialDescriptor::new(program)
                    .with_mesh_attributes(&["aPosition"])
                    .with_instance_attributes(&["aOffset"]),
            )
            .expect("flat material should resolve"),
        )
    }
}
