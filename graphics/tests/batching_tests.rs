//! Integration tests for the batch registry and the resources under it.
//!
//! Tests are parameterized using `rstest` to run against every backend; the
//! GL backend needs a host context and is skipped here.
//!
//! # Test Categories
//!
//! - **Buffer Tests**: Grow-or-overwrite uploads
//! - **Registry Tests**: Batching, clearing, pruning and disposal
//! - **Validation Tests**: Name, layout and binding errors
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test batching_tests
//! ```

mod common;

use std::rc::Rc;

use rstest::rstest;

use common::{Backend, ShapeInstance, TestContext};
use glint_core::mesh::PrimitiveTopology;
use glint_core::mesh::generators::{triangle, unit_quad};
use glint_graphics::backend::IndexType;
use glint_graphics::layout::ScalarKind;
use glint_graphics::{
    BufferTarget, BufferUsage, Camera, CameraMatrices, DeviceParameters, Graphics, GraphicsError,
    Layout, Material, MaterialDescriptor, UniformValue, VertexData,
};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

// ============================================================================
// Buffer Tests
// ============================================================================

/// Uploading the same data twice leaves the storage unchanged and does not
/// reallocate.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_upload_idempotent(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let data: Vec<[f32; 3]> = vec![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]];
    let mut buffer = ctx
        .device
        .create_vertex_buffer(&data, BufferUsage::Static)
        .unwrap();
    let id = buffer.id().unwrap();
    let first = ctx.backend.buffer_contents(id).unwrap();

    buffer.upload(&data).unwrap();

    assert_eq!(ctx.backend.buffer_contents(id).unwrap(), first);
    assert_eq!(ctx.backend.reallocation_count(id), 1);
    assert_eq!(buffer.len(), 2);
}

/// Growing past capacity reallocates exactly once; a smaller upload
/// overwrites in place.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_growth_reallocates_once(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut buffer = ctx
        .device
        .create_buffer::<f32>(BufferTarget::Vertex, BufferUsage::Dynamic)
        .unwrap();
    let id = buffer.id().unwrap();

    buffer.upload(&[1.0f32; 4]).unwrap();
    buffer.upload(&[2.0f32; 16]).unwrap();
    assert_eq!(ctx.backend.reallocation_count(id), 2);

    buffer.upload(&[3.0f32; 8]).unwrap();
    assert_eq!(ctx.backend.reallocation_count(id), 2);
    assert_eq!(buffer.capacity(), 16);
    assert_eq!(buffer.len(), 8);
}

// ============================================================================
// Registry Tests
// ============================================================================

/// Three instances of a non-indexed triangle draw with one instanced call.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_triangle_three_instances_one_draw(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.shape_material(false).unwrap();
    let mesh = ctx.device.create_mesh(&triangle(0.5)).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics
        .extend(
            &material,
            &mesh,
            [RED, BLUE, RED].map(ShapeInstance::colored),
        )
        .unwrap();
    let stats = graphics.draw(None).unwrap();

    let draws = ctx.backend.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].command.count, 3);
    assert_eq!(draws[0].command.instance_count, 3);
    assert_eq!(draws[0].command.index_type, None);
    assert_eq!(draws[0].command.topology, PrimitiveTopology::TriangleList);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.instances, 3);
    assert!(ctx.backend.errors().is_empty());
}

/// An indexed mesh draws its index count with the index element type.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_indexed_mesh_draw(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.flat_material();
    let quad = ctx.device.create_mesh(&unit_quad()).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&material, &quad, [0.0f32, 0.0]).unwrap();
    graphics.add(&material, &quad, [2.0f32, 0.0]).unwrap();
    graphics.draw(None).unwrap();

    let draws = ctx.backend.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].command.count, 6);
    assert_eq!(draws[0].command.instance_count, 2);
    assert_eq!(draws[0].command.index_type, Some(IndexType::U32));
}

/// Two materials sharing one mesh get separate batches and draws.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_two_materials_share_mesh(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let first = ctx.shape_material(false).unwrap();
    let second = ctx.shape_material(false).unwrap();
    let mesh = ctx.device.create_mesh(&unit_quad()).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&first, &mesh, ShapeInstance::colored(RED)).unwrap();
    graphics.add(&second, &mesh, ShapeInstance::colored(BLUE)).unwrap();
    graphics.add(&first, &mesh, ShapeInstance::colored(BLUE)).unwrap();

    let stats = graphics.draw(None).unwrap();
    assert_eq!(graphics.material_count(), 2);
    assert_eq!(graphics.batch_count(), 2);
    assert_eq!(stats.draw_calls, 2);

    let draws = ctx.backend.draw_calls();
    // First-use order: first material, then second.
    assert_eq!(draws[0].program, first.program().id().unwrap());
    assert_eq!(draws[0].command.instance_count, 2);
    assert_eq!(draws[1].program, second.program().id().unwrap());
    assert_eq!(draws[1].command.instance_count, 1);
}

/// Instances stay queued across draws until cleared; cleared batches are
/// skipped rather than drawn with zero instances.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_clear_then_draw_issues_nothing(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.flat_material();
    let mesh = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&material, &mesh, [0.5f32, 0.5]).unwrap();
    graphics.draw(None).unwrap();
    graphics.draw(None).unwrap();
    assert_eq!(ctx.backend.draw_calls().len(), 2);

    graphics.clear();
    ctx.backend.clear_commands();
    let stats = graphics.draw(None).unwrap();

    assert!(ctx.backend.draw_calls().is_empty());
    assert_eq!(stats.skipped_empty, 1);
    assert_eq!(graphics.pending_instances(), 0);
    // The batch and its device objects survive the clear.
    assert_eq!(graphics.batch_count(), 1);
}

/// With skipping disabled, an empty batch still issues a zero-instance draw.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_empty_batch_drawn_when_not_skipped(#[case] backend: Backend) {
    let params = DeviceParameters::new().with_skip_empty_batches(false);
    let Some(ctx) = TestContext::with_parameters(backend, params) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.flat_material();
    let mesh = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&material, &mesh, [0.0f32, 0.0]).unwrap();
    graphics.clear();
    graphics.draw(None).unwrap();

    let draws = ctx.backend.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].command.instance_count, 0);
}

/// Growing the instance buffer between frames re-points the bindings, so no
/// draw reads a stale allocation.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_instance_growth_rebinds(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.shape_material(false).unwrap();
    let mesh = ctx.device.create_mesh(&unit_quad()).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    for count in [1usize, 4, 2, 16] {
        graphics.clear();
        graphics
            .extend(
                &material,
                &mesh,
                std::iter::repeat_n(ShapeInstance::colored(RED), count),
            )
            .unwrap();
        let stats = graphics.draw(None).unwrap();
        assert_eq!(stats.instances, count);
    }

    assert_eq!(ctx.backend.draw_calls().len(), 4);
    assert_eq!(ctx.backend.stale_attribute_reads(), 0);
    assert!(ctx.backend.errors().is_empty());
}

/// Camera matrices are written to the material's uniforms before drawing.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_camera_uniforms_written(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.shape_material(true).unwrap();
    let mesh = ctx.device.create_mesh(&unit_quad()).unwrap();
    let camera = Camera::default().with_aspect_ratio(16.0 / 9.0).with_zoom(2.0);
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&material, &mesh, ShapeInstance::colored(RED)).unwrap();
    graphics.draw(Some(&camera)).unwrap();

    let program = material.program().id().unwrap();
    assert_eq!(
        ctx.backend.uniform_value(program, "uView"),
        Some(UniformValue::from(camera.view()))
    );
    assert_eq!(
        ctx.backend.uniform_value(program, "uProjection"),
        Some(UniformValue::from(camera.projection()))
    );
}

/// Dropping a mesh or material prunes its batches at the next draw.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_dropped_owners_pruned(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.flat_material();
    let triangle_mesh = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    let quad = ctx.device.create_mesh(&unit_quad()).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&material, &triangle_mesh, [0.0f32, 0.0]).unwrap();
    graphics.add(&material, &quad, [1.0f32, 0.0]).unwrap();
    assert_eq!(graphics.batch_count(), 2);

    drop(triangle_mesh);
    let stats = graphics.draw(None).unwrap();
    assert_eq!(stats.pruned, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(graphics.batch_count(), 1);

    drop(material);
    let stats = graphics.draw(None).unwrap();
    assert_eq!(stats.pruned, 1);
    assert_eq!(graphics.material_count(), 0);

    // Only the surviving quad's buffers remain.
    drop(quad);
    assert_eq!(ctx.device.buffer_count(), 0);
    assert_eq!(ctx.device.vertex_array_count(), 0);
    assert_eq!(ctx.device.program_count(), 0);
}

/// A disposed registry refuses further use; disposing again is a no-op.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_registry_use_after_dispose(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.flat_material();
    let mesh = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    let mut graphics = Graphics::new(&ctx.device);
    graphics.add(&material, &mesh, [0.0f32, 0.0]).unwrap();

    graphics.dispose();
    graphics.dispose();

    assert_eq!(ctx.device.vertex_array_count(), 0);
    assert!(matches!(
        graphics.draw(None),
        Err(GraphicsError::UseAfterDispose(_))
    ));
    assert!(matches!(
        graphics.add(&material, &mesh, [0.0f32, 0.0]),
        Err(GraphicsError::UseAfterDispose(_))
    ));
}

/// A first `add` whose batch cannot be built leaves no material, batch or
/// pending instance behind, and the registry stays usable.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_failed_add_leaves_no_state(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let material = ctx.flat_material();
    let mut disposed = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    Rc::get_mut(&mut disposed).unwrap().dispose();
    let mut graphics = Graphics::new(&ctx.device);

    assert!(matches!(
        graphics.add(&material, &disposed, [0.0f32, 0.0]),
        Err(GraphicsError::UseAfterDispose(_))
    ));
    assert_eq!(graphics.material_count(), 0);
    assert_eq!(graphics.batch_count(), 0);
    assert_eq!(graphics.pending_instances(), 0);
    assert_eq!(ctx.device.vertex_array_count(), 0);

    let mesh = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    graphics.add(&material, &mesh, [0.0f32, 0.0]).unwrap();
    let stats = graphics.draw(None).unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(graphics.material_count(), 1);
}

// ============================================================================
// Validation Tests
// ============================================================================

/// One attribute cannot be fed by both the mesh and the instance buffer.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_attribute_bound_twice(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let program = ctx
        .device
        .create_program(
            r#"
            #version 330 core
            in vec3 aPosition;
            in vec3 aOther;
            void main() { gl_Position = vec4(aPosition + aOther, 1.0); }
            "#,
            common::FLAT_FRAGMENT,
        )
        .unwrap();
    let result = Material::<[f32; 3], [f32; 3]>::new(
        MaterialDescriptor::new(program)
            .with_mesh_attributes(&["aPosition"])
            .with_instance_attributes(&["aPosition"]),
    );

    match result {
        Err(GraphicsError::AttributeLayoutMismatch { actual, .. }) => {
            assert!(actual.contains("`aPosition`"), "{actual}");
        }
        other => panic!("expected a layout mismatch, got {other:?}"),
    }
}

/// A camera material over a program without the camera uniforms fails at
/// construction.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_missing_camera_uniform(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let program = ctx
        .device
        .create_program(common::FLAT_VERTEX, common::FLAT_FRAGMENT)
        .unwrap();
    let result = Material::<[f32; 3], [f32; 2]>::new(
        MaterialDescriptor::new(program)
            .with_mesh_attributes(&["aPosition"])
            .with_instance_attributes(&["aOffset"])
            .with_camera("uView", "uProjection"),
    );

    assert_eq!(
        result.unwrap_err(),
        GraphicsError::UnknownUniform("uView".to_string())
    );
}

/// A 2-component vertex type cannot feed a `vec3` attribute.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_vertex_layout_mismatch(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let result = Material::<[f32; 2], ShapeInstance>::new(
        MaterialDescriptor::new(ctx.shape_program())
            .with_mesh_attributes(&["aPosition"])
            .with_instance_attributes(&["aModel", "aColor"]),
    );

    match result {
        Err(GraphicsError::AttributeLayoutMismatch { expected, actual }) => {
            assert!(expected.contains("vec3 aPosition"), "{expected}");
            assert!(actual.contains("f32x2"), "{actual}");
        }
        other => panic!("expected a layout mismatch, got {other:?}"),
    }
}

/// Only single-component unsigned index buffers can be attached as indices.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_not_an_index_buffer(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut binding = ctx.device.create_vertex_array().unwrap();
    let vertex_target = ctx
        .device
        .create_vertex_buffer(&[0u32, 1, 2], BufferUsage::Static)
        .unwrap();
    let float_indices = ctx
        .device
        .create_index_buffer(&[0.0f32, 1.0, 2.0], BufferUsage::Static)
        .unwrap();
    let indices = ctx
        .device
        .create_index_buffer(&[0u16, 1, 2], BufferUsage::Static)
        .unwrap();

    assert!(matches!(
        binding.attach_indices(&vertex_target),
        Err(GraphicsError::NotAnIndexBuffer(_))
    ));
    assert!(matches!(
        binding.attach_indices(&float_indices),
        Err(GraphicsError::NotAnIndexBuffer(_))
    ));
    binding.attach_indices(&indices).unwrap();
    assert_eq!(binding.index_type(), Some(IndexType::U16));
    assert_eq!(binding.index_count(), Some(3));
}

/// A vertex array bound for one program cannot draw with another.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_cross_program_binding(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let shapes = ctx.shape_program();
    let other = ctx.shape_program();
    let positions = ctx
        .device
        .create_vertex_buffer(&[[0.0f32; 3]; 3], BufferUsage::Static)
        .unwrap();

    let mut binding = ctx.device.create_vertex_array().unwrap();
    binding
        .attach(&positions, 0, &[shapes.get_attribute("aPosition").unwrap().clone()])
        .unwrap();

    let err = binding
        .draw(&other, 1, PrimitiveTopology::TriangleList)
        .unwrap_err();
    assert!(matches!(err, GraphicsError::CrossProgramBindingError { .. }));

    let err = binding
        .attach(&positions, 0, &[other.get_attribute("aPosition").unwrap().clone()])
        .unwrap_err();
    assert!(matches!(err, GraphicsError::CrossProgramBindingError { .. }));

    binding.draw(&shapes, 1, PrimitiveTopology::TriangleList).unwrap();
    assert_eq!(ctx.backend.draw_calls().len(), 1);
}

/// Disposed resources fail with `UseAfterDispose` instead of touching the
/// device.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::gl(Backend::Gl)]
fn test_resource_use_after_dispose(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let program = ctx.shape_program();
    let mut buffer = ctx
        .device
        .create_vertex_buffer(&[[1.0f32; 3]], BufferUsage::Static)
        .unwrap();

    program.dispose();
    buffer.dispose();

    assert!(matches!(program.id(), Err(GraphicsError::UseAfterDispose(_))));
    assert!(matches!(
        program.set_uniform_by_name("uView", [0.0f32; 16]),
        Err(GraphicsError::UseAfterDispose(_))
    ));
    assert!(matches!(
        buffer.upload(&[[2.0f32; 3]]),
        Err(GraphicsError::UseAfterDispose(_))
    ));
    assert!(ctx.backend.errors().is_empty());
    assert_eq!(ctx.backend.live_objects(), 0);
}

// ============================================================================
// Layout Tests
// ============================================================================

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
#[repr(C)]
struct Transform {
    offset: [f32; 2],
    scale: f32,
}

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, VertexData)]
#[repr(C)]
struct Sprite {
    transform: Transform,
    color: [f32; 4],
}

/// Nested derived structs flatten into the parent's slots.
#[test]
fn test_derive_flattens_nested_fields() {
    let layout = Layout::of::<Sprite>().unwrap();

    let slots: Vec<(u8, u32, usize)> = layout
        .descriptors()
        .iter()
        .map(|d| (d.components, d.slot, d.offset))
        .collect();
    assert_eq!(slots, vec![(2, 0, 0), (1, 1, 8), (4, 2, 12)]);
    assert_eq!(layout.stride(), 28);
    assert_eq!(layout.scalar_kind(), ScalarKind::F32);

    let names: Vec<&str> = layout.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["transform.offset", "transform.scale", "color"]);
}

/// Layouts are computed once per type and shared.
#[test]
fn test_layout_cached_per_type() {
    let first = Layout::of::<ShapeInstance>().unwrap();
    let second = Layout::of::<ShapeInstance>().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.slot_count(), 5);
    assert_eq!(first.stride(), 80);
}

/// Registry over `Rc`-shared resources compiles against the public API alone.
#[test]
fn test_material_shared_by_rc() {
    let ctx = TestContext::new(Backend::Dummy).unwrap();
    let material = ctx.flat_material();
    let clone = Rc::clone(&material);
    let mesh = ctx.device.create_mesh(&triangle(1.0)).unwrap();
    let mut graphics = Graphics::new(&ctx.device);

    graphics.add(&material, &mesh, [0.0f32, 0.0]).unwrap();
    graphics.add(&clone, &mesh, [1.0f32, 0.0]).unwrap();

    // Both handles name the same material, so one batch holds both.
    assert_eq!(graphics.batch_count(), 1);
    assert_eq!(graphics.pending_instances(), 2);
}
