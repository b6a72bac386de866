//! Configuration types for the video renderer

use crate::backend::BackendKind;
use crate::color::ColorMatrix;
use crate::error::{Error, Result};
use crate::render::MAX_SHARPEN;
use crate::transform::Rotation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Preferred backend
    pub backend: BackendKind,
    /// Matrix for YUV content
    pub color_matrix: ColorMatrix,
    /// Unsharp amount (0 = off, up to 10)
    pub sharpen: f32,
    /// Letterbox instead of stretching
    pub preserve_aspect: bool,
    /// Quad rotation
    pub rotation: Rotation,
    /// Directory of precompiled shader bytecode (`<stem>.cso`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            color_matrix: ColorMatrix::Bt601,
            sharpen: 0.0,
            preserve_aspect: true,
            rotation: Rotation::None,
            shader_dir: None,
        }
    }
}

impl RendererConfig {
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_color_matrix(mut self, matrix: ColorMatrix) -> Self {
        self.color_matrix = matrix;
        self
    }

    pub fn with_sharpen(mut self, amount: f32) -> Self {
        self.sharpen = amount;
        self
    }

    pub fn with_preserve_aspect(mut self, preserve: bool) -> Self {
        self.preserve_aspect = preserve;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = Some(dir.into());
        self
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check values the renderer cannot clamp on its own
    pub fn validate(&self) -> Result<()> {
        if !self.sharpen.is_finite() || self.sharpen < 0.0 || self.sharpen > MAX_SHARPEN {
            return Err(Error::Config(format!(
                "sharpen must be within 0..={}, got {}",
                MAX_SHARPEN, self.sharpen
            )));
        }
        if let Some(dir) = &self.shader_dir {
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "shader directory {} does not exist",
                    dir.display()
                )));
            }
        }
        if !self.backend.is_available() {
            return Err(Error::UnsupportedBackend(self.backend.display_name().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.backend, BackendKind::Auto);
        assert_eq!(config.color_matrix, ColorMatrix::Bt601);
        assert!(config.preserve_aspect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = RendererConfig::from_toml_str(
            r#"
            backend = "soft"
            color_matrix = "bt709"
            rotation = "90"
            sharpen = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Soft);
        assert_eq!(config.color_matrix, ColorMatrix::Bt709);
        assert_eq!(config.rotation, Rotation::Deg90);
        assert_eq!(config.sharpen, 1.5);
        assert!(config.preserve_aspect);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RendererConfig::from_toml_str("sharpen = 11.0").is_err());
        assert!(RendererConfig::from_toml_str("backend = \"vulkan\"").is_err());
        assert!(RendererConfig::default()
            .with_shader_dir("/definitely/not/here")
            .validate()
            .is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = RendererConfig::default()
            .with_backend(BackendKind::Soft)
            .with_sharpen(2.0)
            .with_preserve_aspect(false)
            .with_shader_dir(dir.path());

        let path = dir.path().join("renderer.toml");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(RendererConfig::from_file(&path).unwrap(), config);
    }
}
