//! Scene import
//!
//! OBJ and glTF files are read into a format-neutral [`ImportedScene`]: a
//! node tree referencing meshes, each mesh carrying its own faces. Faces keep
//! their original vertex count so callers can reject anything that is not a
//! triangle.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Material name for an unnamed material
pub const DEFAULT_MATERIAL: &str = "default_material";
/// Material name for a mesh without a material
pub const NO_MATERIAL: &str = "no_material";

/// Errors raised while importing a scene
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("unsupported scene format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("OBJ import failed: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("glTF import failed: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("scene has no root node")]
    NoRootNode,
    #[error("scene is incomplete")]
    Incomplete,
    #[error("node references missing mesh {0}")]
    MissingMesh(usize),
    #[error("mesh {mesh} has no vertex positions")]
    MissingPositions { mesh: usize },
    #[error("mesh {mesh} face {face} has {vertices} vertices, expected a triangle")]
    NonTriangleFace {
        mesh: usize,
        face: usize,
        vertices: usize,
    },
    #[error("mesh {mesh} index {index} is out of range")]
    IndexOutOfRange { mesh: usize, index: u32 },
}

/// One mesh as read from the file
#[derive(Debug, Clone, Default)]
pub struct ImportedMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First texture-coordinate channel, v pointing up
    pub texcoords: Option<Vec<[f32; 2]>>,
    pub faces: Vec<SmallVec<[u32; 3]>>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedMaterial {
    pub name: Option<String>,
}

/// Node of the imported hierarchy
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    /// Indices into [`ImportedScene::meshes`]
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Mesh indices in depth-first order, a node's own meshes before its children's
    pub fn flatten(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<usize>) {
        out.extend_from_slice(&self.meshes);
        for child in &self.children {
            child.collect(out);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportedScene {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub root: Option<SceneNode>,
    /// Set when the file parsed but produced no meshes
    pub incomplete: bool,
}

impl ImportedScene {
    /// Import a scene, choosing the reader by file extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or of an unknown type
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("obj") => Self::load_obj(path),
            Some("gltf" | "glb") => Self::load_gltf(path),
            _ => Err(ImportError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Import a Wavefront OBJ file, triangulating polygons
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_obj(path: &Path) -> Result<Self, ImportError> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ignore_points: true,
                ignore_lines: true,
                ..Default::default()
            },
        )?;

        let materials = materials.unwrap_or_else(|e| {
            log::warn!("No materials for {}: {e}", path.display());
            Vec::new()
        });

        let mut root = SceneNode::default();
        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let mesh = model.mesh;
            let positions = mesh
                .positions
                .chunks_exact(3)
                .map(|p| [p[0], p[1], p[2]])
                .collect();
            let normals = (!mesh.normals.is_empty()).then(|| {
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| [n[0], n[1], n[2]])
                    .collect()
            });
            let texcoords = (!mesh.texcoords.is_empty()).then(|| {
                mesh.texcoords
                    .chunks_exact(2)
                    .map(|t| [t[0], t[1]])
                    .collect()
            });
            let faces = faces_from_arities(&mesh.indices, &mesh.face_arities);

            root.children.push(SceneNode {
                meshes: vec![meshes.len()],
                children: Vec::new(),
            });
            meshes.push(ImportedMesh {
                positions,
                normals,
                texcoords,
                faces,
                material: mesh.material_id,
            });
        }

        Ok(Self {
            incomplete: meshes.is_empty(),
            meshes,
            materials: materials
                .into_iter()
                .map(|m| ImportedMaterial {
                    name: (!m.name.is_empty()).then_some(m.name),
                })
                .collect(),
            root: Some(root),
        })
    }

    /// Import a glTF 2.0 file (`.gltf` or `.glb`)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no scene
    pub fn load_gltf(path: &Path) -> Result<Self, ImportError> {
        let (document, buffers, _images) = gltf::import(path)?;

        let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
            return Err(ImportError::NoRootNode);
        };

        let mut importer = GltfImporter {
            buffers: &buffers,
            meshes: Vec::new(),
            by_source: FxHashMap::default(),
        };
        let mut root = SceneNode::default();
        for node in scene.nodes() {
            root.children.push(importer.node(&node)?);
        }

        Ok(Self {
            incomplete: importer.meshes.is_empty(),
            meshes: importer.meshes,
            materials: document
                .materials()
                .map(|m| ImportedMaterial {
                    name: m.name().map(str::to_string),
                })
                .collect(),
            root: Some(root),
        })
    }

    /// Resolve the material name of a mesh
    pub fn material_name(&self, mesh: &ImportedMesh) -> String {
        match mesh.material.map(|index| self.materials.get(index)) {
            None => NO_MATERIAL.to_string(),
            Some(Some(ImportedMaterial { name: Some(name) })) => name.clone(),
            Some(_) => DEFAULT_MATERIAL.to_string(),
        }
    }
}

fn faces_from_arities(indices: &[u32], arities: &[u32]) -> Vec<SmallVec<[u32; 3]>> {
    if arities.is_empty() {
        return indices.chunks(3).map(SmallVec::from_slice).collect();
    }
    let mut faces = Vec::with_capacity(arities.len());
    let mut start = 0;
    for &arity in arities {
        let end = (start + arity as usize).min(indices.len());
        faces.push(SmallVec::from_slice(&indices[start..end]));
        start = end;
    }
    faces
}

struct GltfImporter<'a> {
    buffers: &'a [gltf::buffer::Data],
    meshes: Vec<ImportedMesh>,
    /// glTF mesh index to imported primitive indices
    by_source: FxHashMap<usize, Vec<usize>>,
}

impl GltfImporter<'_> {
    fn node(&mut self, node: &gltf::Node<'_>) -> Result<SceneNode, ImportError> {
        let mut out = SceneNode::default();
        if let Some(mesh) = node.mesh() {
            out.meshes = self.mesh(&mesh)?;
        }
        for child in node.children() {
            out.children.push(self.node(&child)?);
        }
        Ok(out)
    }

    fn mesh(&mut self, mesh: &gltf::Mesh<'_>) -> Result<Vec<usize>, ImportError> {
        if let Some(indices) = self.by_source.get(&mesh.index()) {
            return Ok(indices.clone());
        }

        let buffers = self.buffers;
        let mut indices = Vec::new();
        for primitive in mesh.primitives() {
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or(ImportError::MissingPositions {
                    mesh: self.meshes.len(),
                })?
                .collect();
            let normals = reader.read_normals().map(Iterator::collect);
            let texcoords = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().map(|[u, v]| [u, 1.0 - v]).collect());
            let vertex_indices: Vec<u32> = match reader.read_indices() {
                Some(read) => read.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            indices.push(self.meshes.len());
            self.meshes.push(ImportedMesh {
                positions,
                normals,
                texcoords,
                faces: assemble_faces(primitive.mode(), &vertex_indices),
                material: primitive.material().index(),
            });
        }

        self.by_source.insert(mesh.index(), indices.clone());
        Ok(indices)
    }
}

/// Split a primitive's index stream into faces
///
/// Strips and fans are triangulated; points and lines keep their own arity.
fn assemble_faces(mode: gltf::mesh::Mode, indices: &[u32]) -> Vec<SmallVec<[u32; 3]>> {
    use gltf::mesh::Mode;

    match mode {
        Mode::Triangles => indices.chunks(3).map(SmallVec::from_slice).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    SmallVec::from_slice(&[w[0], w[1], w[2]])
                } else {
                    SmallVec::from_slice(&[w[1], w[0], w[2]])
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&first, rest)) => rest
                .windows(2)
                .map(|w| SmallVec::from_slice(&[first, w[0], w[1]]))
                .collect(),
            None => Vec::new(),
        },
        Mode::Points => indices.iter().map(|&i| SmallVec::from_slice(&[i])).collect(),
        Mode::Lines => indices.chunks(2).map(SmallVec::from_slice).collect(),
        Mode::LineStrip => indices.windows(2).map(SmallVec::from_slice).collect(),
        Mode::LineLoop => {
            let mut faces: Vec<SmallVec<[u32; 3]>> =
                indices.windows(2).map(SmallVec::from_slice).collect();
            if let (Some(&first), Some(&last)) = (indices.first(), indices.last()) {
                if indices.len() > 2 {
                    faces.push(SmallVec::from_slice(&[last, first]));
                }
            }
            faces
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltf::mesh::Mode;

    const TWO_OBJECTS: &str = "\
o first
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 5 6 7
";

    #[test]
    fn test_obj_two_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.obj");
        std::fs::write(&path, TWO_OBJECTS).unwrap();

        let scene = ImportedScene::load(&path).unwrap();
        assert!(!scene.incomplete);
        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.root.as_ref().unwrap().flatten(), vec![0, 1]);

        // Quad is triangulated
        let quad = &scene.meshes[0];
        assert_eq!(quad.faces.len(), 2);
        assert!(quad.faces.iter().all(|f| f.len() == 3));
        assert!(quad.texcoords.is_some());
        assert!(quad.normals.is_some());

        let tri = &scene.meshes[1];
        assert!(tri.texcoords.is_none());
        assert!(tri.normals.is_none());
        assert_eq!(scene.material_name(tri), NO_MATERIAL);
    }

    #[test]
    fn test_missing_and_unknown_files() {
        assert!(matches!(
            ImportedScene::load("missing.obj"),
            Err(ImportError::Obj(_))
        ));
        assert!(matches!(
            ImportedScene::load("scene.fbx"),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_obj_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.obj");
        std::fs::write(&path, "# nothing here\n").unwrap();
        assert!(ImportedScene::load(&path).unwrap().incomplete);
    }

    #[test]
    fn test_material_names() {
        let scene = ImportedScene {
            materials: vec![
                ImportedMaterial {
                    name: Some("wood".into()),
                },
                ImportedMaterial { name: None },
            ],
            ..Default::default()
        };
        let with = |material| ImportedMesh {
            material,
            ..Default::default()
        };
        assert_eq!(scene.material_name(&with(Some(0))), "wood");
        assert_eq!(scene.material_name(&with(Some(1))), DEFAULT_MATERIAL);
        assert_eq!(scene.material_name(&with(Some(7))), DEFAULT_MATERIAL);
        assert_eq!(scene.material_name(&with(None)), NO_MATERIAL);
    }

    #[test]
    fn test_flatten_depth_first() {
        let root = SceneNode {
            meshes: vec![0],
            children: vec![
                SceneNode {
                    meshes: vec![1],
                    children: vec![SceneNode {
                        meshes: vec![2, 3],
                        children: Vec::new(),
                    }],
                },
                SceneNode {
                    meshes: vec![4],
                    children: Vec::new(),
                },
            ],
        };
        assert_eq!(root.flatten(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_strip_and_fan_triangulation() {
        let to_vecs = |faces: Vec<SmallVec<[u32; 3]>>| -> Vec<Vec<u32>> {
            faces.iter().map(|f| f.to_vec()).collect()
        };
        let strip = assemble_faces(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(to_vecs(strip), vec![vec![0, 1, 2], vec![2, 1, 3]]);

        let fan = assemble_faces(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(to_vecs(fan), vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn test_lines_are_not_triangles() {
        let faces = assemble_faces(Mode::Lines, &[0, 1, 2, 3]);
        assert!(faces.iter().all(|f| f.len() == 2));
        let points = assemble_faces(Mode::Points, &[0, 1]);
        assert!(points.iter().all(|f| f.len() == 1));
    }
}
