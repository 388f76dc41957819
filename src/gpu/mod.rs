//! Lowest GPU binding layer
//!
//! Resources cross this boundary as numeric ids. The raw value `0` is the
//! "absent" sentinel for every id type; everything above this layer wraps the
//! ids in owning types (`MeshBuffer`, `Texture`, `ShaderProgram`).

mod headless;
mod reflect;
mod wgpu_backend;

pub use headless::{GpuCall, HeadlessGpu};
pub use reflect::{UniformField, UniformKind, UniformLayout};
pub use wgpu_backend::WgpuBackend;

use glam::{Mat4, Vec2, Vec3};

/// Number of texture units a draw can sample (diffuse, normal, specular)
pub const MAX_TEXTURE_UNITS: usize = 3;

macro_rules! gpu_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// The "absent" sentinel
            pub const NONE: Self = Self(0);

            /// Wrap a raw id
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw id
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Check whether this is the absent sentinel
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }

            /// Check whether this names a resource
            pub const fn is_some(self) -> bool {
                self.0 != 0
            }
        }
    };
}

gpu_id!(
    /// Vertex or index buffer id
    BufferId
);
gpu_id!(
    /// Vertex-array id: a vertex buffer, an index buffer and their layout
    VertexArrayId
);
gpu_id!(
    /// 2D texture id
    TextureId
);
gpu_id!(
    /// Linked shader program id
    ProgramId
);

/// What a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// One vertex attribute inside an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Number of f32 components
    pub components: u32,
    /// Byte offset inside the vertex
    pub offset: u32,
}

/// Interleaved vertex layout bound to a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices
    pub stride: u32,
    pub attributes: &'static [VertexAttribute],
}

/// Texel format of an uploaded texture, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// Map a decoded channel count to a format
    pub const fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Red),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Bytes per texel
    pub const fn channels(self) -> u32 {
        match self {
            Self::Red => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Decoded texture ready for upload, with its full mip chain
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Level 0 first; each level halves both dimensions down to 1x1
    pub levels: Vec<Vec<u8>>,
}

impl TextureImage {
    /// Dimensions of a mip level
    pub fn level_size(&self, level: usize) -> (u32, u32) {
        (
            (self.width >> level).max(1),
            (self.height >> level).max(1),
        )
    }
}

/// Typed value for a named uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec2(Vec2),
    Vec3(Vec3),
    Int(i32),
    Float(f32),
}

impl UniformValue {
    /// The block member type this value writes into
    pub const fn kind(&self) -> UniformKind {
        match self {
            Self::Mat4(_) => UniformKind::Mat4,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Int(_) => UniformKind::Int,
            Self::Float(_) => UniformKind::Float,
        }
    }

    /// Write the value's bytes at the start of `dst`
    pub fn write_to(&self, dst: &mut [u8]) {
        match self {
            Self::Mat4(m) => dst[..64].copy_from_slice(bytemuck::cast_slice(&m.to_cols_array())),
            Self::Vec2(v) => dst[..8].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            Self::Vec3(v) => dst[..12].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            Self::Int(i) => dst[..4].copy_from_slice(&i.to_ne_bytes()),
            Self::Float(f) => dst[..4].copy_from_slice(&f.to_ne_bytes()),
        }
    }
}

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    /// Entry point every stage source must define
    pub const fn entry_point(self) -> &'static str {
        match self {
            Self::Vertex => "vs_main",
            Self::Fragment => "fs_main",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => write!(f, "VERTEX"),
            Self::Fragment => write!(f, "FRAGMENT"),
        }
    }
}

/// Program compile or link failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgramError {
    #[error("shader compilation error of type {stage}: {message}")]
    Compile { stage: Stage, message: String },
    #[error("program linking error: {0}")]
    Link(String),
}

/// Failure while bringing up the GPU
#[derive(Debug, thiserror::Error)]
pub enum GpuInitError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// GPU operations the renderer needs
///
/// Creation calls return the `NONE` id on failure; deleting `NONE` or an id
/// that is already gone is a no-op.
pub trait GpuBackend {
    /// Create a buffer initialised with `contents`
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> BufferId;

    /// Delete a buffer
    fn delete_buffer(&mut self, id: BufferId);

    /// Bind a vertex buffer and an index buffer under one layout
    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        layout: VertexLayout,
    ) -> VertexArrayId;

    /// Delete a vertex array (its buffers are deleted separately)
    fn delete_vertex_array(&mut self, id: VertexArrayId);

    /// Upload a texture and all of its mip levels
    fn create_texture(&mut self, image: &TextureImage) -> TextureId;

    /// Delete a texture
    fn delete_texture(&mut self, id: TextureId);

    /// Compile both stages and link them into a program
    ///
    /// # Errors
    ///
    /// Returns an error if either stage fails to compile or the stages do
    /// not link; nothing is left allocated in that case.
    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ProgramError>;

    /// Delete a program
    fn delete_program(&mut self, id: ProgramId);

    /// Make a program current for following draws
    fn use_program(&mut self, id: ProgramId);

    /// Set a uniform by name; unknown names are ignored
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue);

    /// Bind a texture to a unit
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Draw `index_count` indices of a vertex array with the current state
    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32);

    /// Clear color and depth at the start of the frame
    fn clear(&mut self, color: [f32; 4]);

    /// Rasterize following draws as lines
    fn set_wireframe(&mut self, enabled: bool);

    /// Finish the frame and show it
    fn present(&mut self);

    /// Resize the render target
    fn resize(&mut self, _width: u32, _height: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_ids() {
        assert!(TextureId::NONE.is_none());
        assert!(TextureId::default().is_none());
        assert!(TextureId::from_raw(3).is_some());
        assert_eq!(BufferId::from_raw(7).raw(), 7);
    }

    #[test]
    fn test_pixel_format_channels() {
        assert_eq!(PixelFormat::from_channels(1), Some(PixelFormat::Red));
        assert_eq!(PixelFormat::from_channels(3), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::from_channels(4), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::from_channels(2), None);
        assert_eq!(PixelFormat::from_channels(0), None);
    }

    #[test]
    fn test_uniform_value_bytes() {
        let mut bytes = [0u8; 12];
        UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)).write_to(&mut bytes);
        let floats: [f32; 3] = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(floats, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_level_size_clamps_to_one() {
        let image = TextureImage {
            width: 8,
            height: 2,
            format: PixelFormat::Rgba,
            levels: Vec::new(),
        };
        assert_eq!(image.level_size(0), (8, 2));
        assert_eq!(image.level_size(2), (2, 1));
        assert_eq!(image.level_size(3), (1, 1));
    }
}
