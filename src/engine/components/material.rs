use std::path::Path;

use glam::Vec3;

use crate::engine::components::texture::Texture;
use crate::engine::loaders::scene::{EmbeddedTexture, ImportedMaterial, MaterialKey};
use crate::engine::rendering::{uniforms, RasterState, RenderDevice, ShaderProgram, ShaderProgramExt};
use crate::engine::utils::paths::{embedded_texture_index, texture_candidates};

/// Texture unit the diffuse texture is bound to.
pub const DIFFUSE_TEXTURE_UNIT: u32 = 0;

#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub ambient_color: Vec3,
    pub diffuse_color: Vec3,
    pub specular_color: Vec3,
    pub shininess: f32,
    pub shininess_strength: f32,
    pub reflectivity: f32,
    pub disable_back_culling: bool,
    pub wireframe: bool,
    texture: Option<Texture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient_color: Vec3::ZERO,
            diffuse_color: Vec3::splat(0.8),
            specular_color: Vec3::ZERO,
            shininess: 0.0,
            shininess_strength: 0.0,
            reflectivity: 0.0,
            disable_back_culling: false,
            wireframe: false,
            texture: None,
        }
    }
}

impl Material {
    /// Builds a material from an imported slot, resolving its diffuse texture.
    ///
    /// Properties missing from the import keep their defaults.
    pub fn from_imported(
        device: &dyn RenderDevice,
        imported: &ImportedMaterial,
        embedded: &[EmbeddedTexture],
        directory: &str,
        texture_root: &str,
    ) -> Self {
        let defaults = Self::default();
        let mut material = Self {
            name: imported.name.clone(),
            ambient_color: imported.color(MaterialKey::ColorAmbient).unwrap_or(defaults.ambient_color),
            diffuse_color: imported.color(MaterialKey::ColorDiffuse).unwrap_or(defaults.diffuse_color),
            specular_color: imported.color(MaterialKey::ColorSpecular).unwrap_or(defaults.specular_color),
            shininess: imported.float(MaterialKey::Shininess).unwrap_or(defaults.shininess),
            shininess_strength: imported
                .float(MaterialKey::ShininessStrength)
                .unwrap_or(defaults.shininess_strength),
            reflectivity: imported.float(MaterialKey::Reflectivity).unwrap_or(defaults.reflectivity),
            disable_back_culling: imported
                .flag(MaterialKey::TwoSided)
                .unwrap_or(defaults.disable_back_culling),
            wireframe: imported.flag(MaterialKey::EnableWireframe).unwrap_or(defaults.wireframe),
            texture: None,
        };

        if let Some(reference) = &imported.diffuse_texture {
            material.resolve_texture(device, reference, embedded, directory, texture_root);
        }
        material
    }

    fn resolve_texture(
        &mut self,
        device: &dyn RenderDevice,
        reference: &str,
        embedded: &[EmbeddedTexture],
        directory: &str,
        texture_root: &str,
    ) {
        let embedded_index = embedded_texture_index(reference).filter(|_| !embedded.is_empty());
        if let Some(index) = embedded_index {
            match embedded.get(index) {
                Some(texture) => {
                    if !self.set_texture_from_embedded(device, texture) {
                        tracing::warn!("material '{}': embedded texture {} failed to load", self.name, reference);
                    }
                }
                None => tracing::warn!(
                    "material '{}': embedded texture {} out of range ({} available)",
                    self.name,
                    reference,
                    embedded.len()
                ),
            }
            return;
        }

        for candidate in texture_candidates(directory, reference, texture_root) {
            if self.set_texture_from_file(device, Path::new(&candidate)) {
                tracing::info!("material '{}': loaded texture '{}'", self.name, candidate);
                return;
            }
            tracing::debug!("material '{}': error loading texture '{}'", self.name, candidate);
        }
        tracing::warn!("material '{}': no texture found for '{}'", self.name, reference);
    }

    pub fn has_texture(&self) -> bool {
        self.texture.as_ref().is_some_and(Texture::is_loaded)
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    /// Loads the texture from a file; the material stays texture-less on failure.
    pub fn set_texture_from_file(&mut self, device: &dyn RenderDevice, path: &Path) -> bool {
        let mut texture = Texture::new();
        let loaded = texture.load(device, path);
        self.replace_texture(device, texture, loaded)
    }

    /// Loads an embedded texture: a compressed blob when `height == 0`, raw RGBA8
    /// texels otherwise.
    pub fn set_texture_from_embedded(&mut self, device: &dyn RenderDevice, embedded: &EmbeddedTexture) -> bool {
        let mut texture = Texture::new();
        let loaded = if embedded.height == 0 {
            let length = (embedded.width as usize).min(embedded.data.len());
            texture.load_from_memory(device, &embedded.data[..length])
        } else {
            texture.load_rgba(device, embedded.width, embedded.height, &embedded.data)
        };
        self.replace_texture(device, texture, loaded)
    }

    fn replace_texture(&mut self, device: &dyn RenderDevice, texture: Texture, loaded: bool) -> bool {
        if loaded {
            self.release(device);
            self.texture = Some(texture);
        }
        loaded
    }

    pub fn raster_state(&self) -> RasterState {
        RasterState {
            cull_back_faces: !self.disable_back_culling,
            wireframe: self.wireframe,
        }
    }

    /// Binds the texture and uploads the material uniforms.
    pub fn apply(&self, device: &dyn RenderDevice, program: &dyn ShaderProgram) {
        match &self.texture {
            Some(texture) if texture.is_loaded() => {
                texture.bind(device, DIFFUSE_TEXTURE_UNIT);
                program.set_i32_named(uniforms::TEXTURE, DIFFUSE_TEXTURE_UNIT as i32);
                program.set_i32_named(uniforms::HAS_TEXTURE, 1);
            }
            _ => program.set_i32_named(uniforms::HAS_TEXTURE, 0),
        }
        program.set_vec3_named(uniforms::DIFFUSE_COLOR, self.diffuse_color);
        device.set_raster_state(self.raster_state());
    }

    pub fn release(&mut self, device: &dyn RenderDevice) {
        if let Some(mut texture) = self.texture.take() {
            texture.release(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::engine::loaders::scene::MaterialProperty;
    use crate::engine::rendering::{HeadlessDevice, HeadlessProgram, UniformValue};

    fn png_bytes() -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]))
            .save(&path)
            .unwrap();
        fs::read(path).unwrap()
    }

    fn textured(reference: &str) -> ImportedMaterial {
        ImportedMaterial {
            name: "skin".to_string(),
            diffuse_texture: Some(reference.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn absent_properties_keep_defaults() {
        let device = HeadlessDevice::new();
        let imported = ImportedMaterial::default()
            .with_property(MaterialKey::Shininess, MaterialProperty::Float(32.0))
            .with_property(MaterialKey::TwoSided, MaterialProperty::Bool(true));
        let material = Material::from_imported(&device, &imported, &[], ".", "/");
        assert_eq!(material.diffuse_color, Vec3::splat(0.8));
        assert_eq!(material.specular_color, Vec3::ZERO);
        assert_eq!(material.shininess, 32.0);
        assert!(!material.raster_state().cull_back_faces);
        assert!(!material.has_texture());
    }

    #[test]
    fn texture_found_by_file_name_in_model_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.png"), png_bytes()).unwrap();
        let directory = dir.path().to_str().unwrap();

        let device = HeadlessDevice::new();
        let mut material = Material::from_imported(&device, &textured(".\\textures\\x.png"), &[], directory, "/");
        assert!(material.has_texture());
        assert_eq!(material.texture().unwrap().dimensions(), (2, 2));
        material.release(&device);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn texture_root_is_the_last_candidate() {
        let models = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("x.png"), png_bytes()).unwrap();

        let device = HeadlessDevice::new();
        let mut material = Material::from_imported(
            &device,
            &textured("textures/x.png"),
            &[],
            models.path().to_str().unwrap(),
            root.path().to_str().unwrap(),
        );
        assert!(material.has_texture());
        material.release(&device);
    }

    #[test]
    fn missing_texture_leaves_material_untextured() {
        let dir = tempfile::tempdir().unwrap();
        let device = HeadlessDevice::new();
        let material = Material::from_imported(
            &device,
            &textured("textures/x.png"),
            &[],
            dir.path().to_str().unwrap(),
            dir.path().to_str().unwrap(),
        );
        assert!(!material.has_texture());
        assert_eq!(device.counters().textures_created, 0);
    }

    #[test]
    fn embedded_references_select_by_index() {
        let device = HeadlessDevice::new();
        let embedded = vec![
            EmbeddedTexture {
                width: 1,
                height: 1,
                data: vec![255; 4],
            },
            {
                let data = png_bytes();
                EmbeddedTexture {
                    width: data.len() as u32,
                    height: 0,
                    data,
                }
            },
        ];

        let mut raw = Material::from_imported(&device, &textured("*0"), &embedded, ".", "/");
        let mut compressed = Material::from_imported(&device, &textured("*1"), &embedded, ".", "/");
        let out_of_range = Material::from_imported(&device, &textured("*7"), &embedded, ".", "/");

        assert_eq!(raw.texture().unwrap().dimensions(), (1, 1));
        assert_eq!(compressed.texture().unwrap().dimensions(), (2, 2));
        assert!(!out_of_range.has_texture());

        raw.release(&device);
        compressed.release(&device);
    }

    #[test]
    fn apply_uploads_texture_state() {
        let device = HeadlessDevice::new();
        let program = HeadlessProgram::new();
        let mut material = Material::default();
        material.apply(&device, &program);
        assert_eq!(program.last_value(uniforms::HAS_TEXTURE), Some(UniformValue::Int(0)));
        assert_eq!(
            program.last_value(uniforms::DIFFUSE_COLOR),
            Some(UniformValue::Vec3(Vec3::splat(0.8)))
        );
        assert!(device.raster_state().cull_back_faces);

        let embedded = EmbeddedTexture {
            width: 1,
            height: 1,
            data: vec![0; 4],
        };
        assert!(material.set_texture_from_embedded(&device, &embedded));
        material.apply(&device, &program);
        assert_eq!(program.last_value(uniforms::HAS_TEXTURE), Some(UniformValue::Int(1)));
        assert_eq!(program.last_value(uniforms::TEXTURE), Some(UniformValue::Int(0)));
        assert!(device.bound_texture(DIFFUSE_TEXTURE_UNIT).is_some());
        material.release(&device);
    }
}
