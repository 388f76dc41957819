//! Texture loading and GPU management
//!
//! Images are flipped vertically on load so row 0 lands at the bottom of
//! texture space, matching the v-up texture coordinates of imported meshes.
//! The full mip chain is built on the CPU before upload.

use std::path::{Path, PathBuf};

use image::{DynamicImage, imageops::FilterType};
use rustc_hash::FxHashMap;

use crate::gpu::{GpuBackend, PixelFormat, TextureId, TextureImage};

/// Extensions tried when searching for a material texture, in order
pub const TEXTURE_EXTENSIONS: [&str; 4] = ["jpg", "png", "tga", "bmp"];

/// Texture slot of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Normal,
    Specular,
}

impl TextureKind {
    pub const ALL: [Self; 3] = [Self::Diffuse, Self::Normal, Self::Specular];

    /// File-name suffix used by the texture search
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuse",
            Self::Normal => "normal",
            Self::Specular => "specular",
        }
    }

    /// Texture unit the slot is bound to
    pub const fn unit(self) -> u32 {
        match self {
            Self::Diffuse => 0,
            Self::Normal => 1,
            Self::Specular => 2,
        }
    }
}

/// Errors that can occur during texture loading
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("unsupported image format with {0} channels")]
    UnsupportedChannels(u8),
    #[error("GPU rejected a {width}x{height} texture")]
    Upload { width: u32, height: u32 },
}

/// Decode an image into an uploadable texture with its mip chain
///
/// # Errors
///
/// Returns an error for channel counts other than 1, 3 or 4
pub fn decode_image(image: DynamicImage) -> Result<TextureImage, TextureError> {
    let channels = image.color().channel_count();
    let format = PixelFormat::from_channels(channels)
        .ok_or(TextureError::UnsupportedChannels(channels))?;

    // Normalise to 8 bits per channel
    let base = match format {
        PixelFormat::Red => DynamicImage::ImageLuma8(image.into_luma8()),
        PixelFormat::Rgb => DynamicImage::ImageRgb8(image.into_rgb8()),
        PixelFormat::Rgba => DynamicImage::ImageRgba8(image.into_rgba8()),
    }
    .flipv();

    let (width, height) = (base.width(), base.height());
    let level_count = u32::BITS - width.max(height).max(1).leading_zeros();

    let mut levels = Vec::with_capacity(level_count as usize);
    for level in 1..level_count {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        levels.push(base.resize_exact(w, h, FilterType::Triangle).into_bytes());
    }
    levels.insert(0, base.into_bytes());

    Ok(TextureImage {
        width,
        height,
        format,
        levels,
    })
}

/// A GPU texture owned by its creator
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Texture {
    /// Load a texture from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoded or uploaded
    pub fn from_path(gpu: &mut impl GpuBackend, path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TextureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(gpu, &bytes)
    }

    /// Load a texture from encoded bytes (PNG, JPEG, TGA, BMP)
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded or uploaded
    pub fn from_bytes(gpu: &mut impl GpuBackend, bytes: &[u8]) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(gpu, &decode_image(image)?)
    }

    /// Upload a decoded image
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not create the texture
    pub fn from_image(gpu: &mut impl GpuBackend, image: &TextureImage) -> Result<Self, TextureError> {
        let id = gpu.create_texture(image);
        if id.is_none() {
            return Err(TextureError::Upload {
                width: image.width,
                height: image.height,
            });
        }
        Ok(Self {
            id,
            width: image.width,
            height: image.height,
            format: image.format,
        })
    }

    /// Create a 1x1 white texture, used where a mesh has no texture
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not create the texture
    pub fn white(gpu: &mut impl GpuBackend) -> Result<Self, TextureError> {
        Self::from_image(
            gpu,
            &TextureImage {
                width: 1,
                height: 1,
                format: PixelFormat::Rgba,
                levels: vec![vec![255; 4]],
            },
        )
    }

    pub const fn id(&self) -> TextureId {
        self.id
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn release(self, gpu: &mut impl GpuBackend) {
        gpu.delete_texture(self.id);
    }
}

/// Find a texture file for a material by naming convention
///
/// For each of `{material}_{suffix}`, `{material}{suffix}` and `{material}`,
/// every extension is tried before the next pattern; the first file that
/// exists wins.
pub fn find_material_texture(dir: &Path, material: &str, kind: TextureKind) -> Option<PathBuf> {
    let suffix = kind.suffix();
    let stems = [
        format!("{material}_{suffix}"),
        format!("{material}{suffix}"),
        material.to_string(),
    ];

    stems.iter().find_map(|stem| {
        TEXTURE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{stem}.{ext}")))
            .find(|candidate| candidate.is_file())
    })
}

/// Textures loaded by path, each loaded once
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: FxHashMap<PathBuf, Texture>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached texture or load it
    ///
    /// Failures are logged and yield `None`, meaning "use the fallback".
    pub fn get_or_load(&mut self, gpu: &mut impl GpuBackend, path: &Path) -> Option<TextureId> {
        if let Some(texture) = self.textures.get(path) {
            return Some(texture.id());
        }
        match Texture::from_path(gpu, path) {
            Ok(texture) => {
                log::debug!(
                    "Loaded texture {} ({}x{})",
                    path.display(),
                    texture.width(),
                    texture.height()
                );
                let id = texture.id();
                self.textures.insert(path.to_path_buf(), texture);
                Some(id)
            }
            Err(e) => {
                log::error!("Failed to load texture {}: {e}", path.display());
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Release every cached texture
    pub fn release(self, gpu: &mut impl GpuBackend) {
        for (_, texture) in self.textures {
            texture.release(gpu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessGpu;
    use image::{GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

    fn write_png(dir: &Path, name: &str, image: DynamicImage) -> PathBuf {
        let path = dir.join(name);
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn test_channel_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut gpu = HeadlessGpu::new();

        let gray = write_png(dir.path(), "gray.png", GrayImage::new(4, 4).into());
        let rgb = write_png(dir.path(), "rgb.png", RgbImage::new(4, 4).into());
        let rgba = write_png(dir.path(), "rgba.png", RgbaImage::new(4, 4).into());
        let gray_alpha = write_png(dir.path(), "ga.png", GrayAlphaImage::new(4, 4).into());

        let formats: Vec<_> = [&gray, &rgb, &rgba]
            .into_iter()
            .map(|path| Texture::from_path(&mut gpu, path).unwrap().format())
            .collect();
        assert_eq!(
            formats,
            vec![PixelFormat::Red, PixelFormat::Rgb, PixelFormat::Rgba]
        );

        let err = Texture::from_path(&mut gpu, &gray_alpha).unwrap_err();
        assert!(matches!(err, TextureError::UnsupportedChannels(2)));
        assert_eq!(gpu.live_textures(), 3);
    }

    #[test]
    fn test_missing_file() {
        let mut gpu = HeadlessGpu::new();
        let err = Texture::from_path(&mut gpu, "does/not/exist.png").unwrap_err();
        assert!(matches!(err, TextureError::Io { .. }));
        assert_eq!(gpu.allocations(), 0);
    }

    #[test]
    fn test_flip_and_mip_chain() {
        let mut image = RgbImage::new(8, 2);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let decoded = decode_image(image.into()).unwrap();

        // 8x2, 4x1, 2x1, 1x1
        assert_eq!(decoded.levels.len(), 4);
        for (level, data) in decoded.levels.iter().enumerate() {
            let (w, h) = decoded.level_size(level);
            assert_eq!(data.len(), (w * h * 3) as usize);
        }

        // Top-left pixel moves to the last row
        let last_row = (8 * 3) as usize;
        assert_eq!(&decoded.levels[0][last_row..last_row + 3], &[255, 0, 0]);
        assert_eq!(&decoded.levels[0][..3], &[0, 0, 0]);
    }

    #[test]
    fn test_search_order() {
        let dir = tempfile::tempdir().unwrap();
        let touch = |name: &str| std::fs::write(dir.path().join(name), b"").unwrap();

        assert_eq!(
            find_material_texture(dir.path(), "wood", TextureKind::Diffuse),
            None
        );

        touch("wood.jpg");
        touch("wooddiffuse.bmp");
        assert_eq!(
            find_material_texture(dir.path(), "wood", TextureKind::Diffuse),
            Some(dir.path().join("wooddiffuse.bmp"))
        );

        touch("wood_diffuse.png");
        assert_eq!(
            find_material_texture(dir.path(), "wood", TextureKind::Diffuse),
            Some(dir.path().join("wood_diffuse.png"))
        );

        touch("wood_diffuse.jpg");
        assert_eq!(
            find_material_texture(dir.path(), "wood", TextureKind::Diffuse),
            Some(dir.path().join("wood_diffuse.jpg"))
        );
        assert_eq!(
            find_material_texture(dir.path(), "wood", TextureKind::Normal),
            Some(dir.path().join("wood.jpg"))
        );
    }

    #[test]
    fn test_cache_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", RgbaImage::new(2, 2).into());
        let mut gpu = HeadlessGpu::new();
        let mut cache = TextureCache::new();

        let first = cache.get_or_load(&mut gpu, &path);
        let second = cache.get_or_load(&mut gpu, &path);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(gpu.allocations(), 1);

        assert_eq!(cache.get_or_load(&mut gpu, &dir.path().join("b.png")), None);

        cache.release(&mut gpu);
        assert_eq!(gpu.live_textures(), 0);
    }
}
