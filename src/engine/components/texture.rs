use std::path::Path;

use crate::engine::error::TextureError;
use crate::engine::rendering::{RenderDevice, TextureHandle};

/// GPU texture owned by a material.
///
/// The handle is released explicitly through [`Texture::release`]; dropping a texture
/// that still holds one leaks it and logs a warning.
#[derive(Debug, Default)]
pub struct Texture {
    handle: Option<TextureHandle>,
    width: u32,
    height: u32,
}

impl Texture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Loads an image file. Returns `false` and logs the cause on failure.
    pub fn load(&mut self, device: &dyn RenderDevice, path: &Path) -> bool {
        match self.try_load(device, path) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("texture '{}' not loaded: {}", path.display(), err);
                false
            }
        }
    }

    /// Loads a compressed image (PNG, JPEG, ...) held in memory.
    pub fn load_from_memory(&mut self, device: &dyn RenderDevice, bytes: &[u8]) -> bool {
        match self.try_load_from_memory(device, bytes) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("embedded texture not loaded: {}", err);
                false
            }
        }
    }

    /// Uploads raw RGBA8 texels.
    pub fn load_rgba(&mut self, device: &dyn RenderDevice, width: u32, height: u32, texels: &[u8]) -> bool {
        match self.upload(device, width, height, texels) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("raw texture not loaded: {}", err);
                false
            }
        }
    }

    pub fn try_load(&mut self, device: &dyn RenderDevice, path: &Path) -> Result<(), TextureError> {
        let reader = image::io::Reader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|source| TextureError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let rgba = reader.decode()?.to_rgba8();
        let (width, height) = rgba.dimensions();
        self.upload(device, width, height, rgba.as_raw())
    }

    pub fn try_load_from_memory(&mut self, device: &dyn RenderDevice, bytes: &[u8]) -> Result<(), TextureError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        self.upload(device, width, height, rgba.as_raw())
    }

    fn upload(&mut self, device: &dyn RenderDevice, width: u32, height: u32, texels: &[u8]) -> Result<(), TextureError> {
        let expected = width as usize * height as usize * 4;
        if texels.len() != expected {
            return Err(TextureError::TexelSize {
                expected,
                actual: texels.len(),
            });
        }

        let handle = device.create_texture_rgba8(width, height, texels)?;
        self.release(device);
        self.handle = Some(handle);
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn bind(&self, device: &dyn RenderDevice, unit: u32) {
        if let Some(handle) = self.handle {
            device.bind_texture(unit, handle);
        }
    }

    pub fn release(&mut self, device: &dyn RenderDevice) {
        if let Some(handle) = self.handle.take() {
            device.delete_texture(handle);
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            tracing::warn!("texture {:?} dropped without release", handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rendering::HeadlessDevice;

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skin.png");
        write_png(&path, 4, 2);

        let device = HeadlessDevice::new();
        let mut texture = Texture::new();
        assert!(texture.load(&device, &path));
        assert_eq!(texture.dimensions(), (4, 2));
        texture.release(&device);
        assert!(!texture.is_loaded());
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn missing_file_is_reported_not_fatal() {
        let device = HeadlessDevice::new();
        let mut texture = Texture::new();
        assert!(!texture.load(&device, Path::new("/definitely/not/here.png")));
        assert!(matches!(
            texture.try_load(&device, Path::new("/definitely/not/here.png")),
            Err(TextureError::Io { .. })
        ));
        assert!(!texture.is_loaded());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let device = HeadlessDevice::new();
        let mut texture = Texture::new();
        assert!(!texture.load_from_memory(&device, b"not an image"));
        assert_eq!(device.counters().textures_created, 0);
    }

    #[test]
    fn raw_texels_must_match_dimensions() {
        let device = HeadlessDevice::new();
        let mut texture = Texture::new();
        assert!(!texture.load_rgba(&device, 2, 2, &[0; 8]));
        assert!(texture.load_rgba(&device, 2, 2, &[0; 16]));
        texture.release(&device);
    }

    #[test]
    fn reloading_releases_the_previous_handle() {
        let device = HeadlessDevice::new();
        let mut texture = Texture::new();
        texture.load_rgba(&device, 1, 1, &[0; 4]);
        texture.load_rgba(&device, 1, 1, &[255; 4]);
        assert_eq!(device.live_textures(), 1);
        texture.release(&device);
        texture.release(&device);
        assert_eq!(device.counters().textures_deleted, 2);
    }
}
