//! Frame lifecycle

use glam::{Mat4, Vec3};

use crate::gpu::{GpuBackend, TextureId};

use super::camera::Camera;
use super::light::Light;
use super::model::Model;
use super::shader::ShaderProgram;

/// Default clear colour, dark grey
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Begins frames, submits models and ends frames
///
/// The view and projection are captured at `begin_frame` and used for every
/// submit until the next frame.
#[derive(Debug)]
pub struct Renderer {
    clear_color: [f32; 4],
    view: Mat4,
    projection: Mat4,
    view_position: Vec3,
    light: Light,
    /// Bound to every slot a mesh has no texture for
    fallback: TextureId,
    wireframe: bool,
    submitted: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_position: Vec3::ZERO,
            light: Light::default(),
            fallback: TextureId::NONE,
            wireframe: false,
            submitted: 0,
        }
    }

    /// Clear the targets and capture the camera for this frame
    pub fn begin_frame(&mut self, gpu: &mut impl GpuBackend, camera: &Camera, projection: Mat4) {
        gpu.clear(self.clear_color);
        self.view = camera.view_matrix();
        self.projection = projection;
        self.view_position = camera.position;
        self.submitted = 0;
    }

    /// Draw every mesh of a model with one transform
    pub fn submit(
        &mut self,
        gpu: &mut impl GpuBackend,
        model: &Model,
        transform: Mat4,
        shader: &ShaderProgram,
    ) {
        shader.activate(gpu);
        shader.set_mat4(gpu, "model", &transform);
        shader.set_mat4(gpu, "view", &self.view);
        shader.set_mat4(gpu, "projection", &self.projection);
        shader.set_vec3(gpu, "viewPos", self.view_position);
        self.light.apply(gpu, shader);

        model.draw(gpu, self.fallback);
        self.submitted += model.mesh_count();
    }

    /// Finish the frame's submissions
    ///
    /// Post-processing or UI would hook in here. Returns the number of meshes
    /// submitted since `begin_frame`.
    pub fn end_frame(&mut self) -> usize {
        log::trace!("Frame submitted {} meshes", self.submitted);
        std::mem::take(&mut self.submitted)
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub const fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_light(&mut self, light: Light) {
        self.light = light;
    }

    pub const fn light(&self) -> &Light {
        &self.light
    }

    /// Texture sampled by meshes with no texture of their own
    pub fn set_fallback_texture(&mut self, texture: TextureId) {
        self.fallback = texture;
    }

    pub fn set_wireframe(&mut self, gpu: &mut impl GpuBackend, enabled: bool) {
        self.wireframe = enabled;
        gpu.set_wireframe(enabled);
    }

    pub const fn wireframe(&self) -> bool {
        self.wireframe
    }

    /// View matrix captured at `begin_frame`
    pub const fn view(&self) -> Mat4 {
        self.view
    }

    /// Projection captured at `begin_frame`
    pub const fn projection(&self) -> Mat4 {
        self.projection
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, HeadlessGpu, MAX_TEXTURE_UNITS, UniformValue};
    use crate::renderer::import::{ImportedMaterial, ImportedMesh, ImportedScene, SceneNode};
    use crate::renderer::texture::{Texture, TextureCache};
    use smallvec::smallvec;

    const VERTEX: &str = include_str!("../../assets/shaders/basic.vert.wgsl");
    const FRAGMENT: &str = include_str!("../../assets/shaders/basic.frag.wgsl");

    #[test]
    fn test_frame_snapshots_camera() {
        let mut gpu = HeadlessGpu::new();
        let shader = ShaderProgram::from_sources(&mut gpu, VERTEX, FRAGMENT).unwrap();
        let cube = Model::cube(&mut gpu);
        let mut renderer = Renderer::new();

        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0));
        let projection = camera.projection_matrix(16.0 / 9.0);
        renderer.begin_frame(&mut gpu, &camera, projection);
        let view = camera.view_matrix();

        // Moving the camera mid-frame does not change what gets submitted
        camera.position = Vec3::new(10.0, 0.0, 0.0);
        let transform = Mat4::from_translation(Vec3::Y);
        renderer.submit(&mut gpu, &cube, transform, &shader);
        assert_eq!(renderer.end_frame(), 1);

        assert_eq!(gpu.uniform(shader.id(), "view"), Some(UniformValue::Mat4(view)));
        assert_eq!(
            gpu.uniform(shader.id(), "projection"),
            Some(UniformValue::Mat4(projection))
        );
        assert_eq!(
            gpu.uniform(shader.id(), "model"),
            Some(UniformValue::Mat4(transform))
        );
        assert_eq!(
            gpu.uniform(shader.id(), "viewPos"),
            Some(UniformValue::Vec3(Vec3::new(0.0, 0.0, 5.0)))
        );
        assert_eq!(gpu.calls()[0], GpuCall::Clear(DEFAULT_CLEAR_COLOR));
    }

    #[test]
    fn test_fallback_bound_before_draw() {
        let mut gpu = HeadlessGpu::new();
        let shader = ShaderProgram::from_sources(&mut gpu, VERTEX, FRAGMENT).unwrap();
        let white = Texture::white(&mut gpu).unwrap();
        let cube = Model::cube(&mut gpu);
        let mut renderer = Renderer::new();
        renderer.set_fallback_texture(white.id());

        renderer.begin_frame(&mut gpu, &Camera::default(), Mat4::IDENTITY);
        renderer.submit(&mut gpu, &cube, Mat4::IDENTITY, &shader);

        let draw = gpu
            .calls()
            .iter()
            .find_map(|call| match call {
                GpuCall::Draw { textures, .. } => Some(*textures),
                _ => None,
            })
            .unwrap();
        assert_eq!(draw, [white.id(); MAX_TEXTURE_UNITS]);
    }

    fn textured_pair() -> ImportedScene {
        let triangle = |material| ImportedMesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            faces: vec![smallvec![0, 1, 2]],
            material: Some(material),
            ..Default::default()
        };
        ImportedScene {
            meshes: vec![triangle(0), triangle(1)],
            materials: vec![
                ImportedMaterial {
                    name: Some("wood".into()),
                },
                ImportedMaterial {
                    name: Some("stone".into()),
                },
            ],
            root: Some(SceneNode {
                meshes: vec![0, 1],
                children: Vec::new(),
            }),
            incomplete: false,
        }
    }

    #[test]
    fn test_textures_do_not_carry_over_between_meshes() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(2, 2)
            .save(dir.path().join("wood_diffuse.png"))
            .unwrap();

        let mut gpu = HeadlessGpu::new();
        let shader = ShaderProgram::from_sources(&mut gpu, VERTEX, FRAGMENT).unwrap();
        let white = Texture::white(&mut gpu).unwrap();
        let mut cache = TextureCache::new();
        let mut model = Model::from_scene(&mut gpu, &textured_pair()).unwrap();
        model.resolve_textures(&mut gpu, &mut cache, dir.path());

        let mut renderer = Renderer::new();
        renderer.set_fallback_texture(white.id());
        renderer.begin_frame(&mut gpu, &Camera::default(), Mat4::IDENTITY);
        renderer.submit(&mut gpu, &model, Mat4::IDENTITY, &shader);

        let draws: Vec<_> = gpu
            .calls()
            .iter()
            .filter_map(|call| match call {
                GpuCall::Draw { textures, .. } => Some(*textures),
                _ => None,
            })
            .collect();
        assert_eq!(draws.len(), 2);
        assert_ne!(draws[0][0], white.id());
        assert_eq!(draws[1], [white.id(); MAX_TEXTURE_UNITS]);
    }

    #[test]
    fn test_empty_model_submits_nothing() {
        let mut gpu = HeadlessGpu::new();
        let shader = ShaderProgram::from_sources(&mut gpu, VERTEX, FRAGMENT).unwrap();
        let mut renderer = Renderer::new();

        renderer.begin_frame(&mut gpu, &Camera::default(), Mat4::IDENTITY);
        renderer.submit(&mut gpu, &Model::empty(), Mat4::IDENTITY, &shader);
        assert!(gpu.draws().is_empty());
        assert_eq!(renderer.end_frame(), 0);
    }
}
