//! Models: ordered collections of mesh buffers
//!
//! A model with no meshes is the designated "failed to load" state. Loading
//! never panics or aborts; every failure is logged and yields an empty model.

use std::collections::TryReserveError;
use std::path::Path;

use glam::Vec3;

use crate::gpu::{GpuBackend, TextureId};

use super::import::{ImportError, ImportedMesh, ImportedScene};
use super::mesh::{MeshBuffer, MeshData, Vertex};
use super::texture::{TextureCache, TextureKind, find_material_texture};

/// Material name of the procedural cube
pub const CUBE_MATERIAL: &str = "cube_material";

/// An ordered collection of meshes drawn with one shared transform
#[derive(Debug, Default)]
pub struct Model {
    meshes: Vec<MeshBuffer>,
}

impl Model {
    /// A model with no meshes
    pub const fn empty() -> Self {
        Self { meshes: Vec::new() }
    }

    /// Load a model from a scene file
    ///
    /// Returns an empty model if the file cannot be imported.
    pub fn load(gpu: &mut impl GpuBackend, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let result =
            ImportedScene::load(path).and_then(|scene| Self::from_scene(gpu, &scene));

        match result {
            Ok(model) => {
                log::info!(
                    "Loaded model {} with {} meshes",
                    path.display(),
                    model.mesh_count()
                );
                model
            }
            Err(e) => {
                log::error!("Failed to load model {}: {e}", path.display());
                Self::empty()
            }
        }
    }

    /// Build a model from an imported scene
    ///
    /// Meshes are taken from every node in depth-first order. All faces are
    /// validated before anything is uploaded, so an error leaves no GPU
    /// resources behind. A mesh whose staging memory cannot be reserved
    /// becomes an empty mesh without failing the model.
    ///
    /// # Errors
    ///
    /// Returns an error for incomplete scenes, a missing root node, or any
    /// face that is not a triangle
    pub fn from_scene(gpu: &mut impl GpuBackend, scene: &ImportedScene) -> Result<Self, ImportError> {
        if scene.incomplete {
            return Err(ImportError::Incomplete);
        }
        let root = scene.root.as_ref().ok_or(ImportError::NoRootNode)?;

        let order = root.flatten();
        let mut sources = Vec::with_capacity(order.len());
        for index in order {
            let mesh = scene
                .meshes
                .get(index)
                .ok_or(ImportError::MissingMesh(index))?;
            validate_mesh(index, mesh)?;
            sources.push(mesh);
        }

        let meshes = sources
            .into_iter()
            .map(|mesh| {
                let material_name = scene.material_name(mesh);
                match stage_mesh(mesh, &material_name) {
                    Ok(data) => MeshBuffer::upload(gpu, &data),
                    Err(e) => {
                        log::error!("Out of memory staging mesh '{material_name}': {e}");
                        MeshBuffer::empty(material_name)
                    }
                }
            })
            .collect();

        Ok(Self { meshes })
    }

    /// Build a unit cube centred at the origin
    ///
    /// 24 vertices (4 per face, so each face has its own normal) and 36
    /// indices, wound counter-clockwise seen from outside.
    pub fn cube(gpu: &mut impl GpuBackend) -> Self {
        let mesh = MeshBuffer::upload(gpu, &cube_data());
        if !mesh.is_uploaded() {
            log::error!("Failed to build cube");
            return Self::empty();
        }
        Self { meshes: vec![mesh] }
    }

    pub fn meshes(&self) -> &[MeshBuffer] {
        &self.meshes
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Check whether this is the empty "failed" model
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Draw every mesh in order with the current program
    ///
    /// `fallback` fills each slot a mesh has no texture for.
    pub fn draw(&self, gpu: &mut impl GpuBackend, fallback: TextureId) {
        for mesh in &self.meshes {
            mesh.draw(gpu, fallback);
        }
    }

    /// Attach material textures found next to the model
    ///
    /// Textures are owned by `cache`; slots with no matching file stay
    /// unbound.
    pub fn resolve_textures(
        &mut self,
        gpu: &mut impl GpuBackend,
        cache: &mut TextureCache,
        dir: &Path,
    ) {
        for mesh in &mut self.meshes {
            for kind in TextureKind::ALL {
                let Some(path) = find_material_texture(dir, mesh.material_name(), kind) else {
                    continue;
                };
                let texture = cache.get_or_load(gpu, &path);
                mesh.set_texture(kind, texture);
            }
        }
    }

    /// Release every mesh
    pub fn free(self, gpu: &mut impl GpuBackend) {
        for mesh in self.meshes {
            mesh.release(gpu);
        }
    }
}

fn validate_mesh(index: usize, mesh: &ImportedMesh) -> Result<(), ImportError> {
    let vertex_count = mesh.positions.len();
    for (face, indices) in mesh.faces.iter().enumerate() {
        if indices.len() != 3 {
            return Err(ImportError::NonTriangleFace {
                mesh: index,
                face,
                vertices: indices.len(),
            });
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(ImportError::IndexOutOfRange {
                mesh: index,
                index: bad,
            });
        }
    }
    Ok(())
}

/// Interleave an imported mesh into upload-ready vertices and indices
fn stage_mesh(mesh: &ImportedMesh, material_name: &str) -> Result<MeshData, TryReserveError> {
    let generated;
    let normals: &[[f32; 3]] = match &mesh.normals {
        Some(normals) if normals.len() == mesh.positions.len() => normals,
        _ => {
            generated = smooth_normals(mesh);
            &generated
        }
    };
    let texcoords = mesh
        .texcoords
        .as_deref()
        .filter(|t| t.len() == mesh.positions.len());

    let mut vertices = Vec::new();
    vertices.try_reserve_exact(mesh.positions.len())?;
    for (i, &position) in mesh.positions.iter().enumerate() {
        let uv = texcoords.map_or([0.0, 0.0], |t| t[i]);
        vertices.push(Vertex::new(position, normals[i], uv));
    }

    let mut indices = Vec::new();
    indices.try_reserve_exact(mesh.faces.len() * 3)?;
    for face in &mesh.faces {
        indices.extend_from_slice(face);
    }

    Ok(MeshData {
        vertices,
        indices,
        material_name: material_name.to_string(),
    })
}

/// Area-weighted vertex normals
///
/// Vertices touched only by degenerate faces, or by none, get +Y.
fn smooth_normals(mesh: &ImportedMesh) -> Vec<[f32; 3]> {
    let mut sums = vec![Vec3::ZERO; mesh.positions.len()];
    for face in &mesh.faces {
        let [a, b, c] = [face[0], face[1], face[2]].map(|i| i as usize);
        let (pa, pb, pc) = (
            Vec3::from(mesh.positions[a]),
            Vec3::from(mesh.positions[b]),
            Vec3::from(mesh.positions[c]),
        );
        // Cross product length is twice the face area
        let weighted = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            sums[i] += weighted;
        }
    }
    sums.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

fn cube_data() -> MeshData {
    // (normal, u axis, v axis) per face with u x v = normal
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X, Vec3::Y),         // Front
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y), // Back
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),     // Left
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),     // Right
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),     // Top
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),     // Bottom
    ];
    const CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in FACES {
        let base = vertices.len() as u32;
        for (cu, cv) in CORNERS {
            let position = normal * 0.5 + u * cu + v * cv;
            vertices.push(Vertex::new(
                position.to_array(),
                normal.to_array(),
                [cu + 0.5, cv + 0.5],
            ));
        }
        indices.extend([0, 1, 2, 2, 3, 0].map(|i| base + i));
    }

    MeshData {
        vertices,
        indices,
        material_name: CUBE_MATERIAL.to_string(),
    }
}
