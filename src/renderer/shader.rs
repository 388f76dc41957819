//! Shader programs and typed uniform setters
//!
//! Uniforms are looked up by name on every set. Setting a name the program
//! does not declare, or setting it with the wrong type, does nothing.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3};

use crate::gpu::{GpuBackend, ProgramError, ProgramId, UniformValue};

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// A linked vertex + fragment program
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
}

impl ShaderProgram {
    /// Read and compile a program from two WGSL files
    ///
    /// Both files are read before the GPU is touched.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or the program fails to
    /// compile or link
    pub fn from_files(
        gpu: &mut impl GpuBackend,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let vertex = read_source(vertex_path.as_ref())?;
        let fragment = read_source(fragment_path.as_ref())?;
        Self::from_sources(gpu, &vertex, &fragment)
    }

    /// Compile a program from WGSL source text
    ///
    /// # Errors
    ///
    /// Returns an error if either stage fails to compile or they fail to link
    pub fn from_sources(
        gpu: &mut impl GpuBackend,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let id = gpu.compile_program(vertex_source, fragment_source)?;
        Ok(Self { id })
    }

    pub const fn id(&self) -> ProgramId {
        self.id
    }

    /// Make this the current program
    pub fn activate(&self, gpu: &mut impl GpuBackend) {
        gpu.use_program(self.id);
    }

    pub fn set_mat4(&self, gpu: &mut impl GpuBackend, name: &str, value: &Mat4) {
        gpu.set_uniform(self.id, name, UniformValue::Mat4(*value));
    }

    pub fn set_vec2(&self, gpu: &mut impl GpuBackend, name: &str, value: Vec2) {
        gpu.set_uniform(self.id, name, UniformValue::Vec2(value));
    }

    pub fn set_vec3(&self, gpu: &mut impl GpuBackend, name: &str, value: Vec3) {
        gpu.set_uniform(self.id, name, UniformValue::Vec3(value));
    }

    pub fn set_int(&self, gpu: &mut impl GpuBackend, name: &str, value: i32) {
        gpu.set_uniform(self.id, name, UniformValue::Int(value));
    }

    pub fn set_float(&self, gpu: &mut impl GpuBackend, name: &str, value: f32) {
        gpu.set_uniform(self.id, name, UniformValue::Float(value));
    }

    pub fn release(self, gpu: &mut impl GpuBackend) {
        gpu.delete_program(self.id);
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}
