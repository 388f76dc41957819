//! Headless GPU backend
//!
//! Implements the full backend contract without a device. Frame-level calls
//! are recorded in order, resources are counted, and uniform values are kept
//! per program so tests can inspect what a frame would have drawn.

use rustc_hash::FxHashMap;

use super::reflect::{self, UniformLayout};
use super::{
    BufferId, BufferKind, GpuBackend, MAX_TEXTURE_UNITS, PixelFormat, ProgramError, ProgramId,
    TextureId, TextureImage, UniformValue, VertexArrayId, VertexLayout,
};

/// A recorded frame-level call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    Clear([f32; 4]),
    UseProgram(ProgramId),
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    Draw {
        program: ProgramId,
        vertex_array: VertexArrayId,
        index_count: u32,
        textures: [TextureId; MAX_TEXTURE_UNITS],
    },
    SetWireframe(bool),
    Present,
}

#[derive(Debug)]
struct HeadlessProgram {
    layout: UniformLayout,
    values: FxHashMap<String, UniformValue>,
}

#[derive(Debug, Clone, Copy)]
struct HeadlessTexture {
    width: u32,
    height: u32,
    format: PixelFormat,
    levels: usize,
}

/// Backend that records instead of rendering
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_id: u32,
    buffers: FxHashMap<u32, BufferKind>,
    vertex_arrays: FxHashMap<u32, (BufferId, BufferId, VertexLayout)>,
    textures: FxHashMap<u32, HeadlessTexture>,
    programs: FxHashMap<u32, HeadlessProgram>,
    current_program: ProgramId,
    units: [TextureId; MAX_TEXTURE_UNITS],
    allocations: usize,
    calls: Vec<GpuCall>,
}

impl HeadlessGpu {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.allocations += 1;
        self.next_id
    }

    /// Recorded frame calls, oldest first
    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    /// Take and clear the recorded calls
    pub fn take_calls(&mut self) -> Vec<GpuCall> {
        std::mem::take(&mut self.calls)
    }

    /// Recorded draws as `(vertex array, index count)`
    pub fn draws(&self) -> Vec<(VertexArrayId, u32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::Draw {
                    vertex_array,
                    index_count,
                    ..
                } => Some((*vertex_array, *index_count)),
                _ => None,
            })
            .collect()
    }

    /// Total resources ever created, including deleted ones
    pub const fn allocations(&self) -> usize {
        self.allocations
    }

    /// Resources currently alive
    pub fn live_resources(&self) -> usize {
        self.buffers.len() + self.vertex_arrays.len() + self.textures.len() + self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Layout a vertex array was created with
    pub fn vertex_layout(&self, id: VertexArrayId) -> Option<VertexLayout> {
        self.vertex_arrays.get(&id.raw()).map(|(_, _, layout)| *layout)
    }

    /// Dimensions, format and mip level count of a texture
    pub fn texture_info(&self, id: TextureId) -> Option<(u32, u32, PixelFormat, usize)> {
        self.textures
            .get(&id.raw())
            .map(|t| (t.width, t.height, t.format, t.levels))
    }

    /// Last value written to a program's uniform
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.programs
            .get(&program.raw())
            .and_then(|p| p.values.get(name).copied())
    }

    /// Texture currently bound to a unit
    pub fn bound_texture(&self, unit: u32) -> TextureId {
        self.units
            .get(unit as usize)
            .copied()
            .unwrap_or(TextureId::NONE)
    }
}

impl GpuBackend for HeadlessGpu {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> BufferId {
        if contents.is_empty() {
            return BufferId::NONE;
        }
        let id = self.allocate();
        self.buffers.insert(id, kind);
        BufferId::from_raw(id)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id.raw());
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        layout: VertexLayout,
    ) -> VertexArrayId {
        let valid = self.buffers.get(&vertex_buffer.raw()) == Some(&BufferKind::Vertex)
            && self.buffers.get(&index_buffer.raw()) == Some(&BufferKind::Index);
        if !valid {
            log::error!("Vertex array needs one vertex buffer and one index buffer");
            return VertexArrayId::NONE;
        }
        let id = self.allocate();
        self.vertex_arrays
            .insert(id, (vertex_buffer, index_buffer, layout));
        VertexArrayId::from_raw(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        self.vertex_arrays.remove(&id.raw());
    }

    fn create_texture(&mut self, image: &TextureImage) -> TextureId {
        if image.width == 0 || image.height == 0 || image.levels.is_empty() {
            return TextureId::NONE;
        }
        let id = self.allocate();
        self.textures.insert(
            id,
            HeadlessTexture {
                width: image.width,
                height: image.height,
                format: image.format,
                levels: image.levels.len(),
            },
        );
        TextureId::from_raw(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id.raw()).is_some() {
            for unit in &mut self.units {
                if *unit == id {
                    *unit = TextureId::NONE;
                }
            }
        }
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ProgramError> {
        let layout = reflect::link(vertex_source, fragment_source)?;
        let id = self.allocate();
        self.programs.insert(
            id,
            HeadlessProgram {
                layout,
                values: FxHashMap::default(),
            },
        );
        Ok(ProgramId::from_raw(id))
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.programs.remove(&id.raw());
        if self.current_program == id {
            self.current_program = ProgramId::NONE;
        }
    }

    fn use_program(&mut self, id: ProgramId) {
        self.current_program = id;
        self.calls.push(GpuCall::UseProgram(id));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        let Some(entry) = self.programs.get_mut(&program.raw()) else {
            return;
        };
        if entry
            .layout
            .find(name)
            .is_some_and(|field| field.kind == value.kind())
        {
            entry.values.insert(name.to_string(), value);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if let Some(slot) = self.units.get_mut(unit as usize) {
            *slot = texture;
            self.calls.push(GpuCall::BindTexture { unit, texture });
        }
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32) {
        if index_count == 0 || !self.vertex_arrays.contains_key(&vertex_array.raw()) {
            return;
        }
        self.calls.push(GpuCall::Draw {
            program: self.current_program,
            vertex_array,
            index_count,
            textures: self.units,
        });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(GpuCall::Clear(color));
    }

    fn set_wireframe(&mut self, enabled: bool) {
        self.calls.push(GpuCall::SetWireframe(enabled));
    }

    fn present(&mut self) {
        self.calls.push(GpuCall::Present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: VertexLayout = VertexLayout {
        stride: 12,
        attributes: &[],
    };

    #[test]
    fn test_vertex_array_requires_both_buffers() {
        let mut gpu = HeadlessGpu::new();
        let vbo = gpu.create_buffer(BufferKind::Vertex, &[0; 12]);
        assert!(
            gpu.create_vertex_array(vbo, BufferId::NONE, LAYOUT)
                .is_none()
        );

        let ebo = gpu.create_buffer(BufferKind::Index, &[0; 12]);
        let vao = gpu.create_vertex_array(vbo, ebo, LAYOUT);
        assert!(vao.is_some());
        assert_eq!(gpu.live_resources(), 3);
    }

    #[test]
    fn test_empty_buffer_is_not_created() {
        let mut gpu = HeadlessGpu::new();
        assert!(gpu.create_buffer(BufferKind::Vertex, &[]).is_none());
        assert_eq!(gpu.allocations(), 0);
    }

    #[test]
    fn test_delete_unknown_ids_is_noop() {
        let mut gpu = HeadlessGpu::new();
        gpu.delete_buffer(BufferId::NONE);
        gpu.delete_texture(TextureId::from_raw(42));
        gpu.delete_program(ProgramId::NONE);
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn test_zero_index_draw_is_skipped() {
        let mut gpu = HeadlessGpu::new();
        let vbo = gpu.create_buffer(BufferKind::Vertex, &[0; 12]);
        let ebo = gpu.create_buffer(BufferKind::Index, &[0; 12]);
        let vao = gpu.create_vertex_array(vbo, ebo, LAYOUT);

        gpu.draw_indexed(vao, 0);
        gpu.draw_indexed(VertexArrayId::NONE, 3);
        gpu.draw_indexed(vao, 3);
        assert_eq!(gpu.draws(), vec![(vao, 3)]);
    }

    #[test]
    fn test_deleted_texture_unbinds_units() {
        let mut gpu = HeadlessGpu::new();
        let texture = gpu.create_texture(&TextureImage {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba,
            levels: vec![vec![255; 4]],
        });
        gpu.bind_texture(2, texture);
        assert_eq!(gpu.bound_texture(2), texture);

        gpu.delete_texture(texture);
        assert!(gpu.bound_texture(2).is_none());
    }

    #[test]
    fn test_bind_out_of_range_unit_is_ignored() {
        let mut gpu = HeadlessGpu::new();
        gpu.bind_texture(MAX_TEXTURE_UNITS as u32, TextureId::from_raw(1));
        assert!(gpu.calls().is_empty());
    }
}
