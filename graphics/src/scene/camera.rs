//! Camera producing view and projection matrices.

use glint_core::math::{
    Mat4, Vec2, Vec3, Vec4, look_at_rh, orthographic_off_center, perspective_off_center,
    quat_from_axis_angle, quat_rotate_vec3,
};

use crate::error::GraphicsResult;
use crate::shader::{ProgramUniform, ShaderProgram};

/// Source of view and projection matrices for materials that consume a
/// camera.
pub trait CameraMatrices {
    /// Get the view matrix.
    fn view(&self) -> Mat4;

    /// Get the projection matrix.
    fn projection(&self) -> Mat4;

    /// Write both matrices into `program`.
    fn assign_matrices(
        &self,
        program: &ShaderProgram,
        view: &ProgramUniform,
        projection: &ProgramUniform,
    ) -> GraphicsResult<()> {
        program.set_uniform(view, self.view())?;
        program.set_uniform(projection, self.projection())
    }
}

/// A look-along camera with an off-center orthographic or perspective
/// projection in OpenGL clip conventions.
///
/// The view window spans `screen_size` scaled by `zoom`, placed so that
/// `screen_offset` (in half-sizes, `(-1, -1)` by default) is its lower-left
/// corner. The default camera sits at `-Z` looking down `+Z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Eye position.
    pub position: Vec3,
    /// Look direction.
    pub direction: Vec3,
    /// Up vector before roll.
    pub world_up: Vec3,
    /// Roll around `direction`, in radians.
    pub rotation: f32,
    /// Scale of the view window and depth range.
    pub zoom: f32,
    /// Lower-left corner of the view window, in half screen sizes.
    pub screen_offset: Vec2,
    /// Near and far planes before zoom.
    pub depth_range: Vec2,
    /// View window size; the longest side is 2.
    pub screen_size: Vec2,
    /// Orthographic instead of perspective projection.
    pub is_orthographic: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(-Vec3::z(), Vec3::z(), true)
    }
}

impl Camera {
    /// Create a camera at `position` looking along `direction` with a square
    /// view window.
    pub fn new(position: Vec3, direction: Vec3, is_orthographic: bool) -> Self {
        Self {
            position,
            direction,
            world_up: Vec3::y(),
            rotation: 0.0,
            zoom: 1.0,
            screen_offset: Vec2::new(-1.0, -1.0),
            depth_range: Vec2::new(1.0, 100.0),
            screen_size: Vec2::new(2.0, 2.0),
            is_orthographic,
        }
    }

    /// Size the view window for a `width / height` aspect ratio.
    pub fn with_aspect_ratio(mut self, aspect: f32) -> Self {
        self.set_aspect_ratio(aspect);
        self
    }

    /// Set the zoom.
    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set the near and far planes.
    pub fn with_depth_range(mut self, near: f32, far: f32) -> Self {
        self.depth_range = Vec2::new(near, far);
        self
    }

    /// Size the view window for a `width / height` aspect ratio, keeping the
    /// longest side at 2. Non-positive ratios give a square window.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.screen_size = if aspect <= 0.0 {
            Vec2::new(2.0, 2.0)
        } else if aspect >= 1.0 {
            Vec2::new(2.0, 2.0 / aspect)
        } else {
            Vec2::new(2.0 * aspect, 2.0)
        };
    }

    /// Get `world_up` rolled around the look direction.
    pub fn camera_up(&self) -> Vec3 {
        quat_rotate_vec3(quat_from_axis_angle(self.direction, self.rotation), self.world_up)
    }

    /// Project a world position to normalized device coordinates.
    pub fn world_to_screen(&self, world: Vec3) -> Vec2 {
        let clip = self.projection() * self.view() * Vec4::new(world.x, world.y, world.z, 1.0);
        let w = if clip.w.abs() > f32::EPSILON { clip.w } else { 1.0 };
        Vec2::new(clip.x / w, clip.y / w)
    }

    /// Unproject normalized device coordinates on the near plane to a world
    /// position.
    pub fn screen_to_world(&self, screen: Vec2) -> Vec3 {
        let inverse = (self.projection() * self.view())
            .try_inverse()
            .unwrap_or_else(Mat4::identity);
        let world = inverse * Vec4::new(screen.x, screen.y, -1.0, 1.0);
        let w = if world.w.abs() > f32::EPSILON { world.w } else { 1.0 };
        Vec3::new(world.x / w, world.y / w, world.z / w)
    }
}

impl CameraMatrices for Camera {
    fn view(&self) -> Mat4 {
        look_at_rh(&self.position, &(self.position + self.direction), &self.camera_up())
    }

    fn projection(&self) -> Mat4 {
        let bottom_left = self.screen_size.component_mul(&self.screen_offset) / 2.0 * self.zoom;
        let top_right = self
            .screen_size
            .component_mul(&(self.screen_offset / 2.0 + Vec2::new(1.0, 1.0)))
            * self.zoom;
        let depth = self.depth_range * self.zoom;

        if self.is_orthographic {
            orthographic_off_center(
                bottom_left.x,
                top_right.x,
                bottom_left.y,
                top_right.y,
                depth.x,
                depth.y,
            )
        } else {
            perspective_off_center(
                bottom_left.x,
                top_right.x,
                bottom_left.y,
                top_right.y,
                depth.x,
                depth.y,
            )
        }
    }
}
