//! Mesh and vertex definitions

use bytemuck::{Pod, Zeroable};

use crate::gpu::{
    BufferId, BufferKind, GpuBackend, TextureId, VertexArrayId, VertexAttribute, VertexLayout,
};

use super::texture::TextureKind;

/// Vertex with position, normal, and UV coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Interleaved layout: position at location 0, normal at 1, UV at 2
    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: size_of::<Self>() as u32,
        attributes: &[
            // Position
            VertexAttribute {
                location: 0,
                components: 3,
                offset: 0,
            },
            // Normal
            VertexAttribute {
                location: 1,
                components: 3,
                offset: size_of::<[f32; 3]>() as u32,
            },
            // UV
            VertexAttribute {
                location: 2,
                components: 2,
                offset: size_of::<[f32; 6]>() as u32,
            },
        ],
    };

    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Get the vertex buffer layout
    pub const fn layout() -> VertexLayout {
        Self::LAYOUT
    }
}

/// CPU-side triangle list waiting for upload
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material_name: String,
}

/// GPU-resident vertex and index data for one drawable surface
///
/// The vertex buffer, index buffer and vertex array are either all present
/// or all absent. An empty mesh has an index count of zero and draws nothing.
#[derive(Debug)]
pub struct MeshBuffer {
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    index_count: u32,
    diffuse: Option<TextureId>,
    normal: Option<TextureId>,
    specular: Option<TextureId>,
    material_name: String,
}

impl MeshBuffer {
    /// A mesh that owns nothing
    pub fn empty(material_name: impl Into<String>) -> Self {
        Self {
            vertex_array: VertexArrayId::NONE,
            vertex_buffer: BufferId::NONE,
            index_buffer: BufferId::NONE,
            index_count: 0,
            diffuse: None,
            normal: None,
            specular: None,
            material_name: material_name.into(),
        }
    }

    /// Upload mesh data
    ///
    /// Any failed allocation releases what was already created and yields an
    /// empty mesh.
    pub fn upload(gpu: &mut impl GpuBackend, data: &MeshData) -> Self {
        if data.vertices.is_empty() || data.indices.is_empty() || data.indices.len() % 3 != 0 {
            log::warn!(
                "Mesh '{}' has {} vertices and {} indices, skipping upload",
                data.material_name,
                data.vertices.len(),
                data.indices.len()
            );
            return Self::empty(data.material_name.clone());
        }

        let vertex_buffer =
            gpu.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&data.vertices));
        let index_buffer = gpu.create_buffer(BufferKind::Index, bytemuck::cast_slice(&data.indices));
        let vertex_array = gpu.create_vertex_array(vertex_buffer, index_buffer, Vertex::LAYOUT);

        if vertex_buffer.is_none() || index_buffer.is_none() || vertex_array.is_none() {
            log::error!("Failed to upload mesh '{}'", data.material_name);
            gpu.delete_vertex_array(vertex_array);
            gpu.delete_buffer(index_buffer);
            gpu.delete_buffer(vertex_buffer);
            return Self::empty(data.material_name.clone());
        }

        Self {
            vertex_array,
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            diffuse: None,
            normal: None,
            specular: None,
            material_name: data.material_name.clone(),
        }
    }

    /// Number of indices, always a multiple of 3
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }

    pub const fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// Check if the mesh has GPU data
    pub const fn is_uploaded(&self) -> bool {
        self.vertex_array.is_some()
    }

    /// Material name, for diagnostics and texture lookup
    pub fn material_name(&self) -> &str {
        &self.material_name
    }

    /// Texture bound for a slot, if any
    pub const fn texture(&self, kind: TextureKind) -> Option<TextureId> {
        match kind {
            TextureKind::Diffuse => self.diffuse,
            TextureKind::Normal => self.normal,
            TextureKind::Specular => self.specular,
        }
    }

    /// Attach a texture to a slot; the texture is not owned by the mesh
    pub fn set_texture(&mut self, kind: TextureKind, texture: Option<TextureId>) {
        let texture = texture.filter(|id| id.is_some());
        match kind {
            TextureKind::Diffuse => self.diffuse = texture,
            TextureKind::Normal => self.normal = texture,
            TextureKind::Specular => self.specular = texture,
        }
    }

    /// Bind every texture slot and draw
    ///
    /// Slots without a texture get `fallback`, so nothing bound for an
    /// earlier mesh carries over.
    pub fn draw(&self, gpu: &mut impl GpuBackend, fallback: TextureId) {
        if self.index_count == 0 {
            return;
        }
        for kind in TextureKind::ALL {
            gpu.bind_texture(kind.unit(), self.texture(kind).unwrap_or(fallback));
        }
        gpu.draw_indexed(self.vertex_array, self.index_count);
    }

    /// Release the GPU objects
    pub fn release(self, gpu: &mut impl GpuBackend) {
        gpu.delete_vertex_array(self.vertex_array);
        gpu.delete_buffer(self.index_buffer);
        gpu.delete_buffer(self.vertex_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, HeadlessGpu};

    fn triangle() -> MeshData {
        MeshData {
            vertices: vec![
                Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            indices: vec![0, 1, 2],
            material_name: "tri".into(),
        }
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(Vertex::LAYOUT.stride, 32);
        let offsets: Vec<_> = Vertex::LAYOUT
            .attributes
            .iter()
            .map(|a| (a.location, a.components, a.offset))
            .collect();
        assert_eq!(offsets, vec![(0, 3, 0), (1, 3, 12), (2, 2, 24)]);
    }

    #[test]
    fn test_upload_and_release() {
        let mut gpu = HeadlessGpu::new();
        let mesh = MeshBuffer::upload(&mut gpu, &triangle());
        assert!(mesh.is_uploaded());
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(gpu.live_buffers(), 2);
        assert_eq!(gpu.vertex_layout(mesh.vertex_array()), Some(Vertex::LAYOUT));

        mesh.release(&mut gpu);
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn test_partial_triangle_is_not_uploaded() {
        let mut gpu = HeadlessGpu::new();
        let mut data = triangle();
        data.indices.push(0);
        let mesh = MeshBuffer::upload(&mut gpu, &data);
        assert_eq!(mesh.index_count(), 0);
        assert_eq!(gpu.allocations(), 0);
    }

    #[test]
    fn test_draw_fills_missing_slots_with_fallback() {
        let mut gpu = HeadlessGpu::new();
        let mut mesh = MeshBuffer::upload(&mut gpu, &triangle());
        let fallback = TextureId::from_raw(50);
        mesh.set_texture(TextureKind::Specular, Some(TextureId::from_raw(99)));
        mesh.set_texture(TextureKind::Normal, Some(TextureId::NONE));

        mesh.draw(&mut gpu, fallback);
        assert_eq!(
            gpu.calls(),
            &[
                GpuCall::BindTexture {
                    unit: 0,
                    texture: fallback
                },
                GpuCall::BindTexture {
                    unit: 1,
                    texture: fallback
                },
                GpuCall::BindTexture {
                    unit: 2,
                    texture: TextureId::from_raw(99)
                },
                GpuCall::Draw {
                    program: crate::gpu::ProgramId::NONE,
                    vertex_array: mesh.vertex_array(),
                    index_count: 3,
                    textures: [fallback, fallback, TextureId::from_raw(99)],
                },
            ]
        );
    }

    #[test]
    fn test_empty_mesh_draws_nothing() {
        let mut gpu = HeadlessGpu::new();
        let mesh = MeshBuffer::empty("none");
        mesh.draw(&mut gpu, TextureId::NONE);
        assert!(gpu.calls().is_empty());
        mesh.release(&mut gpu);
    }
}
