//! Single point light

use glam::Vec3;
use serde::Deserialize;

use crate::gpu::GpuBackend;

use super::shader::ShaderProgram;

/// Point light uploaded as `lightPos` / `lightColor`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
}

impl Light {
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Upload to a program's uniforms
    pub fn apply(&self, gpu: &mut impl GpuBackend, shader: &ShaderProgram) {
        shader.set_vec3(gpu, "lightPos", self.position);
        shader.set_vec3(gpu, "lightColor", self.color);
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new(Vec3::new(2.0, 4.0, 3.0), Vec3::ONE)
    }
}
