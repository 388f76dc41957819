//! Engine configuration

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use crate::renderer::{DEFAULT_CLEAR_COLOR, Light};

/// Config file read from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "miracle.ron";

/// Failure to read a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Engine configuration
///
/// Every field has a default, so a RON file only needs the fields it changes.
/// Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable VSync
    pub vsync: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// Scene file shown beside the cube; `None` shows only the cube
    pub model: Option<PathBuf>,
    /// Where material textures are searched; `None` searches the model's
    /// directory
    pub texture_dir: Option<PathBuf>,
    /// Attach material textures to the loaded model
    pub resolve_textures: bool,
    /// Sound played with the `1` key
    pub audio_track: Option<PathBuf>,
    pub camera_position: Vec3,
    pub light: Light,
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("Miracle Engine"),
            width: 1920,
            height: 1080,
            vsync: true,
            vertex_shader: PathBuf::from("assets/shaders/basic.vert.wgsl"),
            fragment_shader: PathBuf::from("assets/shaders/basic.frag.wgsl"),
            model: Some(PathBuf::from("assets/models/girl.obj")),
            texture_dir: Some(PathBuf::from("assets/textures")),
            resolve_textures: true,
            audio_track: Some(PathBuf::from("assets/audio/kaleidoscope.mp3")),
            camera_position: Vec3::new(0.0, 0.0, 5.0),
            light: Light::default(),
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

impl EngineConfig {
    /// Create a new config with a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set window dimensions
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable VSync
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the vertex and fragment shader files
    pub fn with_shaders(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    /// Set the scene file, or `None` for the cube alone
    pub fn with_model(mut self, model: Option<PathBuf>) -> Self {
        self.model = model;
        self
    }

    pub fn with_texture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.texture_dir = Some(dir.into());
        self
    }

    pub fn with_resolve_textures(mut self, resolve: bool) -> Self {
        self.resolve_textures = resolve;
        self
    }

    pub fn with_audio_track(mut self, track: Option<PathBuf>) -> Self {
        self.audio_track = track;
        self
    }

    pub fn with_camera_position(mut self, position: Vec3) -> Self {
        self.camera_position = position;
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.light = light;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Directory searched for material textures
    pub fn texture_search_dir(&self) -> Option<PathBuf> {
        self.texture_dir.clone().or_else(|| {
            self.model
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
        })
    }

    /// Parse a RON document
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Read a RON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the config from command-line arguments
    ///
    /// The first argument after the program name is a config path that must
    /// exist. Without one, [`DEFAULT_CONFIG_FILE`] is read if present and the
    /// defaults are used otherwise.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        let _program = args.next();
        if let Some(path) = args.next() {
            log::info!("Loading config from {path}");
            return Self::load(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            log::info!("Loading config from {DEFAULT_CONFIG_FILE}");
            Self::load(fallback)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_title("Test")
            .with_size(800, 600)
            .with_vsync(false)
            .with_model(None)
            .with_clear_color([0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.title, "Test");
        assert_eq!((config.width, config.height), (800, 600));
        assert!(!config.vsync);
        assert!(config.model.is_none());
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = EngineConfig::from_ron(
            r#"(
                title: "Viewer",
                vsync: false,
                camera_position: (1.0, 2.0, 3.0),
                light: (color: (1.0, 0.5, 0.25)),
            )"#,
        )
        .unwrap();

        assert_eq!(config.title, "Viewer");
        assert!(!config.vsync);
        assert_eq!(config.camera_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(config.light.color, Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(config.light.position, Light::default().position);
        assert_eq!(config.width, 1920);
        assert_eq!(config.vertex_shader, EngineConfig::default().vertex_shader);
    }

    #[test]
    fn test_optional_paths() {
        let config = EngineConfig::from_ron(
            r#"(model: Some("scenes/ship.gltf"), texture_dir: None, audio_track: None)"#,
        )
        .unwrap();
        assert_eq!(config.model, Some(PathBuf::from("scenes/ship.gltf")));
        assert!(config.audio_track.is_none());
        assert_eq!(config.texture_search_dir(), Some(PathBuf::from("scenes")));

        let config = config.with_texture_dir("textures");
        assert_eq!(config.texture_search_dir(), Some(PathBuf::from("textures")));
    }

    #[test]
    fn test_textures_default_to_shared_directory() {
        let config = EngineConfig::default();
        assert_eq!(
            config.texture_search_dir(),
            Some(PathBuf::from("assets/textures"))
        );

        let config = EngineConfig::from_ron(r#"(model: Some("scenes/ship.gltf"))"#).unwrap();
        assert_eq!(
            config.texture_search_dir(),
            Some(PathBuf::from("assets/textures"))
        );
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        assert!(EngineConfig::from_ron("(fullscreen: true)").is_err());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");
        assert!(matches!(
            EngineConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let broken = dir.path().join("broken.ron");
        std::fs::write(&broken, "(width: \"wide\")").unwrap();
        assert!(matches!(
            EngineConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_explicit_path_argument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ron");
        std::fs::write(&path, "(width: 640, height: 480)").unwrap();

        let args = ["miracle".to_string(), path.display().to_string()];
        let config = EngineConfig::from_args(args.into_iter()).unwrap();
        assert_eq!((config.width, config.height), (640, 480));
    }
}
