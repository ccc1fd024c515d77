//! # Rendering Device
//!
//! The opaque backend that turns scene parameters into raw pixel buffers.
//! Devices are synchronous, single-client, and not reentrant; the render
//! session serializes all access. Two implementations ship with the crate:
//! a deterministic software device for tests and demos, and a TCP client for
//! an external rendering engine (see [`crate::render::remote`]).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

use crate::errors::ViewerError;
use crate::events::LoadImageRequest;

/// Scene parameter names understood by the bundled devices.
pub mod params {
    pub const CAMERA_EYE: &str = "cameraEye";
    pub const CAMERA_UP: &str = "cameraUp";
    pub const CAMERA_TARGET: &str = "cameraTarget";
    pub const CAMERA_PROJECTION: &str = "cameraProjection";
    pub const EXPOSURE: &str = "exposure";
    pub const DENSITY: &str = "density";
    pub const RENDER_ITERATIONS: &str = "renderIterations";
    pub const BOUNDING_BOX: &str = "boundingBox";
    pub const PRIMARY_STEP_SIZE: &str = "primaryStepSize";
    pub const SECONDARY_STEP_SIZE: &str = "secondaryStepSize";
    pub const CLIP_REGION: &str = "clipRegion";
}

/// Contract of the rendering backend.
pub trait RenderDevice: Send {
    /// Initialize the device at the given resolution. Called once, before
    /// any draw; a device that cannot be reached fails here with
    /// `DeviceUnavailable`.
    fn setup(&mut self, width: u32, height: u32) -> Result<(), ViewerError>;

    /// Mutate one named scene parameter.
    fn set_parameter(&mut self, name: &str, values: &[f64]) -> Result<(), ViewerError>;

    /// Update the output resolution on the live device; takes effect on the
    /// next draw.
    fn set_size(&mut self, width: u32, height: u32) -> Result<(), ViewerError>;

    /// Load image data for rendering.
    fn load_image(&mut self, request: &LoadImageRequest) -> Result<(), ViewerError>;

    /// Render one frame and block until the device signals completion.
    /// Returns a tightly packed RGBA8 buffer of `width * height * 4` bytes.
    fn issue_draw(&mut self) -> Result<Vec<u8>, ViewerError>;
}

/// The default scene applied to a freshly set-up device.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDefaults {
    pub camera_eye: [f64; 3],
    pub camera_up: [f64; 3],
    pub camera_target: [f64; 3],
    /// 0.0 is perspective, 1.0 orthographic.
    pub camera_projection: f64,
    pub exposure: f64,
    pub density: f64,
    pub render_iterations: u32,
    pub show_bounding_box: bool,
    pub primary_step_size: f64,
    pub secondary_step_size: f64,
}

impl Default for SceneDefaults {
    fn default() -> Self {
        Self {
            camera_eye: [0.0, 0.0, 2.0],
            camera_up: [0.0, 1.0, 0.0],
            camera_target: [0.0, 0.0, 0.0],
            camera_projection: 0.0,
            exposure: 0.75,
            density: 50.0,
            render_iterations: 1,
            show_bounding_box: true,
            primary_step_size: 4.0,
            secondary_step_size: 4.0,
        }
    }
}

impl SceneDefaults {
    /// Push every default onto a device, in a fixed order.
    pub fn apply(&self, device: &mut dyn RenderDevice) -> Result<(), ViewerError> {
        device.set_parameter(params::CAMERA_EYE, &self.camera_eye)?;
        device.set_parameter(params::CAMERA_UP, &self.camera_up)?;
        device.set_parameter(params::CAMERA_TARGET, &self.camera_target)?;
        device.set_parameter(params::CAMERA_PROJECTION, &[self.camera_projection])?;
        device.set_parameter(params::EXPOSURE, &[self.exposure])?;
        device.set_parameter(params::DENSITY, &[self.density])?;
        device.set_parameter(
            params::RENDER_ITERATIONS,
            &[f64::from(self.render_iterations)],
        )?;
        device.set_parameter(
            params::BOUNDING_BOX,
            &[if self.show_bounding_box { 1.0 } else { 0.0 }],
        )?;
        device.set_parameter(params::PRIMARY_STEP_SIZE, &[self.primary_step_size])?;
        device.set_parameter(params::SECONDARY_STEP_SIZE, &[self.secondary_step_size])?;
        Ok(())
    }
}

/// A deterministic, in-process device.
///
/// Renders a shaded radial field modulated by the usual volume parameters.
/// Identical parameters always produce identical pixels, which the tests
/// rely on.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    width: u32,
    height: u32,
    parameters: HashMap<String, Vec<f64>>,
    loaded_images: Vec<String>,
    ready: bool,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_images(&self) -> &[String] {
        &self.loaded_images
    }

    fn scalar(&self, name: &str, fallback: f64) -> f64 {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .copied()
            .unwrap_or(fallback)
    }

    fn vector3(&self, name: &str, fallback: [f64; 3]) -> [f64; 3] {
        match self.parameters.get(name) {
            Some(values) if values.len() >= 3 => [values[0], values[1], values[2]],
            _ => fallback,
        }
    }
}

impl RenderDevice for SoftwareDevice {
    fn setup(&mut self, width: u32, height: u32) -> Result<(), ViewerError> {
        self.width = width;
        self.height = height;
        self.ready = true;
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, values: &[f64]) -> Result<(), ViewerError> {
        self.parameters.insert(name.to_string(), values.to_vec());
        Ok(())
    }

    fn set_size(&mut self, width: u32, height: u32) -> Result<(), ViewerError> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn load_image(&mut self, request: &LoadImageRequest) -> Result<(), ViewerError> {
        if request.path.is_empty() {
            return Err(ViewerError::DeviceFailure(
                "loadImage with empty path".to_string(),
            ));
        }
        self.loaded_images.push(request.path.clone());
        Ok(())
    }

    fn issue_draw(&mut self) -> Result<Vec<u8>, ViewerError> {
        if !self.ready {
            return Err(ViewerError::DeviceFailure(
                "draw issued before setup".to_string(),
            ));
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let eye = self.vector3(params::CAMERA_EYE, [0.0, 0.0, 2.0]);
        let exposure = self.scalar(params::EXPOSURE, 0.75);
        let density = self.scalar(params::DENSITY, 50.0).max(0.0);
        let iterations = (self.scalar(params::RENDER_ITERATIONS, 1.0) as u32).max(1);

        // Fixed seed: the device is progressive but reproducible.
        let mut rng = ChaCha8Rng::seed_from_u64(0x7ead_5eed);
        let mut buffer = vec![0u8; width * height * 4];
        for y in 0..height {
            for x in 0..width {
                let u = (x as f64 + 0.5) / width.max(1) as f64 - 0.5 - eye[0] * 0.1;
                let v = (y as f64 + 0.5) / height.max(1) as f64 - 0.5 - eye[1] * 0.1;
                let falloff = (1.0 - (u * u + v * v).sqrt() * 2.0).max(0.0);

                let mut accumulated = 0.0;
                for _ in 0..iterations {
                    let jitter: f64 = rng.gen_range(-0.5..0.5) / 255.0;
                    accumulated += (falloff + jitter).clamp(0.0, 1.0);
                }
                let sample = accumulated / f64::from(iterations);
                let lit = (sample * exposure * (density / 50.0).min(1.0)).clamp(0.0, 1.0);

                let offset = (y * width + x) * 4;
                buffer[offset] = (lit * 255.0) as u8;
                buffer[offset + 1] = (lit * 230.0) as u8;
                buffer[offset + 2] = (lit * 255.0) as u8;
                buffer[offset + 3] = 255;
            }
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_buffer_matches_resolution() {
        let mut device = SoftwareDevice::new();
        device.setup(64, 48).unwrap();
        let buffer = device.issue_draw().unwrap();
        assert_eq!(buffer.len(), 64 * 48 * 4);

        device.set_size(10, 10).unwrap();
        assert_eq!(device.issue_draw().unwrap().len(), 10 * 10 * 4);
    }

    #[test]
    fn draw_before_setup_is_a_device_failure() {
        let mut device = SoftwareDevice::new();
        assert!(matches!(
            device.issue_draw(),
            Err(ViewerError::DeviceFailure(_))
        ));
    }

    #[test]
    fn identical_parameters_render_identical_pixels() {
        let mut first = SoftwareDevice::new();
        first.setup(32, 32).unwrap();
        SceneDefaults::default().apply(&mut first).unwrap();

        let mut second = SoftwareDevice::new();
        second.setup(32, 32).unwrap();
        SceneDefaults::default().apply(&mut second).unwrap();

        assert_eq!(first.issue_draw().unwrap(), second.issue_draw().unwrap());
    }

    #[test]
    fn density_darkens_the_field() {
        let mut device = SoftwareDevice::new();
        device.setup(16, 16).unwrap();
        device.set_parameter(params::DENSITY, &[50.0]).unwrap();
        let bright: u64 = device.issue_draw().unwrap().iter().map(|&b| u64::from(b)).sum();
        device.set_parameter(params::DENSITY, &[5.0]).unwrap();
        let dim: u64 = device.issue_draw().unwrap().iter().map(|&b| u64::from(b)).sum();
        assert!(dim < bright);
    }
}
