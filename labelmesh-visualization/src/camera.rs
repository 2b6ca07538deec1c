//! Perspective camera with orbit controls

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Closest the eye may get to the orbit target
const MIN_DISTANCE: f32 = 1e-3;
/// Keeps orbiting away from the poles where `up` and the view direction align
const POLE_EPSILON: f32 = 1e-3;

/// Maps OpenGL clip depth (-1..1) onto wgpu's 0..1
#[rustfmt::skip]
const OPENGL_TO_WGPU: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// A 3D camera orbiting a target point
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    home: (Point3<f32>, Point3<f32>),
}

impl Camera {
    /// Create a new camera; the given pose becomes its home pose
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up,
            fov,
            aspect_ratio,
            near,
            far,
            home: (position, target),
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Get the projection matrix in wgpu clip space
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let perspective = Perspective3::new(self.aspect_ratio, self.fov, self.near, self.far);
        OPENGL_TO_WGPU * perspective.into_inner()
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update the aspect ratio from a viewport size; empty viewports are ignored
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    /// Distance between eye and target
    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    /// Rotate the eye around the target, in radians
    pub fn orbit(&mut self, horizontal: f32, vertical: f32) {
        let offset = self.position - self.target;
        let radius = offset.norm();
        if radius < f32::EPSILON {
            return;
        }

        let theta = offset.x.atan2(offset.z) - horizontal;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() - vertical)
            .clamp(POLE_EPSILON, std::f32::consts::PI - POLE_EPSILON);

        let direction = Vector3::new(phi.sin() * theta.sin(), phi.cos(), phi.sin() * theta.cos());
        self.position = self.target + direction * radius;
    }

    /// Slide eye and target together across the view plane.
    ///
    /// Offsets are fractions of the current distance so panning feels the
    /// same at every zoom level.
    pub fn pan(&mut self, horizontal: f32, vertical: f32) {
        let forward = self.target - self.position;
        let distance = forward.norm();
        let Some(forward) = forward.try_normalize(f32::EPSILON) else {
            return;
        };
        let right = forward.cross(&self.up).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::x);
        let camera_up = right.cross(&forward);

        let shift = (-right * horizontal + camera_up * vertical) * distance;
        self.position += shift;
        self.target += shift;
    }

    /// Move toward (positive) or away from (negative) the target
    pub fn zoom(&mut self, amount: f32) {
        let offset = self.position - self.target;
        let distance = offset.norm();
        if distance < f32::EPSILON {
            return;
        }
        let new_distance = (distance * (-amount).exp()).clamp(MIN_DISTANCE, self.far * 0.9);
        self.position = self.target + offset * (new_distance / distance);
    }

    /// Return to the home pose
    pub fn reset(&mut self) {
        let (position, target) = self.home;
        self.position = position;
        self.target = target;
    }

    /// Aim at the center of a bounding box from far enough away to see all of
    /// it, keeping the current viewing direction
    pub fn frame_bounds(&mut self, min: Point3<f32>, max: Point3<f32>) {
        let center = nalgebra::center(&min, &max);
        let radius = ((max - min).norm() * 0.5).max(MIN_DISTANCE);
        let distance = radius / (self.fov * 0.5).sin();

        let direction = (self.position - self.target)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z);
        self.target = center;
        self.position = center + direction * distance;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            75f32.to_radians(),
            16.0 / 9.0,
            0.1,
            1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::default();
        let clip = camera.view_projection() * camera.target.to_homogeneous();
        let ndc = clip.xyz() / clip.w;
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::default();
        camera.orbit(0.7, -0.4);
        assert_relative_eq!(camera.distance(), 5.0, epsilon = 1e-4);
        assert_eq!(camera.target, Point3::origin());
        assert!(camera.position.x.abs() > 0.1);
    }

    #[test]
    fn test_orbit_stops_at_the_poles() {
        let mut camera = Camera::default();
        camera.orbit(0.0, 10.0);
        let direction = (camera.position - camera.target).normalize();
        assert!(direction.y < 1.0);
        assert!(direction.cross(&camera.up).norm() > 0.0);
    }

    #[test]
    fn test_pan_moves_target_with_eye() {
        let mut camera = Camera::default();
        camera.pan(0.1, 0.0);
        assert_relative_eq!(camera.distance(), 5.0, epsilon = 1e-5);
        assert!(camera.target.x.abs() > 0.1);
        assert_relative_eq!(camera.target.x, camera.position.x, epsilon = 1e-5);
    }

    #[test]
    fn test_zoom_and_reset() {
        let mut camera = Camera::default();
        camera.zoom(0.5);
        assert!(camera.distance() < 5.0);
        camera.zoom(-100.0);
        assert!(camera.distance() <= camera.far);

        camera.pan(0.3, 0.2);
        camera.reset();
        assert_eq!(camera.position, Point3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.target, Point3::origin());
    }

    #[test]
    fn test_frame_bounds_centers_target() {
        let mut camera = Camera::default();
        camera.frame_bounds(Point3::new(10.0, 10.0, 10.0), Point3::new(12.0, 14.0, 10.0));
        assert_relative_eq!(camera.target, Point3::new(11.0, 12.0, 10.0));
        // Viewing direction is kept (+Z)
        assert_relative_eq!(camera.position.x, 11.0, epsilon = 1e-5);
        assert!(camera.position.z > 10.0);
    }

    #[test]
    fn test_viewport_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(800, 400);
        assert_relative_eq!(camera.aspect_ratio, 2.0);
        camera.set_viewport(0, 400);
        assert_relative_eq!(camera.aspect_ratio, 2.0);
    }
}
