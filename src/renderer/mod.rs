//! Rendering module
//!
//! Models, textures, shaders and the camera, drawn through a [`GpuBackend`].
//!
//! [`GpuBackend`]: crate::gpu::GpuBackend

mod camera;
mod import;
mod light;
mod mesh;
mod model;
#[allow(clippy::module_inception)]
mod renderer;
mod shader;
mod texture;

pub use camera::{Camera, CameraMovement};
pub use import::{
    DEFAULT_MATERIAL, ImportError, ImportedMaterial, ImportedMesh, ImportedScene, NO_MATERIAL,
    SceneNode,
};
pub use light::Light;
pub use mesh::{MeshBuffer, MeshData, Vertex};
pub use model::{CUBE_MATERIAL, Model};
pub use renderer::{DEFAULT_CLEAR_COLOR, Renderer};
pub use shader::{ShaderError, ShaderProgram};
pub use texture::{
    TEXTURE_EXTENSIONS, Texture, TextureCache, TextureError, TextureKind, decode_image,
    find_material_texture,
};
