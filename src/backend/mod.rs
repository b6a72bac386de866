//! Graphics backends
//!
//! Direct3D 11 and Direct3D 9 on Windows, plus a CPU reference backend that
//! runs everywhere.

pub mod soft;

#[cfg(windows)]
pub mod d3d11;
#[cfg(windows)]
pub mod d3d9;

use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::render::{FrameRenderer, RenderOptions, Renderer};
use crate::shader::ShaderLibrary;
use serde::{Deserialize, Serialize};

pub use soft::{SoftAdapter, SoftBackend};

/// Renderer backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Automatically select the best available (D3D11 > Soft)
    #[default]
    Auto,
    /// Direct3D 11 with a DXGI flip-less swap chain
    D3d11,
    /// Direct3D 9 for older drivers and DXVA2 decoders
    D3d9,
    /// CPU reference renderer
    Soft,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::D3d11, BackendKind::D3d9, BackendKind::Soft];

    /// Get human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::D3d11 => "Direct3D 11",
            BackendKind::D3d9 => "Direct3D 9",
            BackendKind::Soft => "software",
        }
    }

    /// Whether this build can create the backend at all
    pub fn is_available(&self) -> bool {
        match self {
            BackendKind::Auto | BackendKind::Soft => true,
            BackendKind::D3d11 | BackendKind::D3d9 => cfg!(windows),
        }
    }

    /// Concrete backend `Auto` stands for on this platform
    pub fn resolve(self) -> BackendKind {
        match self {
            BackendKind::Auto if cfg!(windows) => BackendKind::D3d11,
            BackendKind::Auto => BackendKind::Soft,
            other => other,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "d3d11" | "dx11" => Ok(BackendKind::D3d11),
            "d3d9" | "dx9" => Ok(BackendKind::D3d9),
            "soft" | "software" | "cpu" => Ok(BackendKind::Soft),
            other => Err(Error::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Backends this build can create
pub fn available_backends() -> Vec<BackendKind> {
    BackendKind::ALL.into_iter().filter(|b| b.is_available()).collect()
}

fn load_shaders(config: &RendererConfig) -> Result<ShaderLibrary> {
    match &config.shader_dir {
        Some(dir) => ShaderLibrary::load_dir(dir),
        None => Ok(ShaderLibrary::new()),
    }
}

/// Create a renderer based on configuration
pub fn create_renderer(config: &RendererConfig) -> Result<Box<dyn Renderer>> {
    create_renderer_with_backend(config, config.backend)
}

/// Create a renderer with specific backend
pub fn create_renderer_with_backend(
    config: &RendererConfig,
    backend: BackendKind,
) -> Result<Box<dyn Renderer>> {
    let options = RenderOptions::from(config);

    match backend.resolve() {
        BackendKind::Soft | BackendKind::Auto => {
            tracing::info!("Using software renderer");
            let renderer = FrameRenderer::<SoftBackend>::new(SoftAdapter::new(), load_shaders(config)?, options);
            Ok(Box::new(renderer))
        }
        #[cfg(windows)]
        BackendKind::D3d11 => {
            tracing::info!("Using Direct3D 11 renderer");
            let renderer = FrameRenderer::<d3d11::D3d11Backend>::new(
                d3d11::D3d11Adapter::new(),
                load_shaders(config)?,
                options,
            );
            Ok(Box::new(renderer))
        }
        #[cfg(windows)]
        BackendKind::D3d9 => {
            tracing::info!("Using Direct3D 9 renderer");
            let renderer = FrameRenderer::<d3d9::D3d9Backend>::new(
                d3d9::D3d9Adapter::new(),
                load_shaders(config)?,
                options,
            );
            Ok(Box::new(renderer))
        }
        #[cfg(not(windows))]
        other => Err(Error::UnsupportedBackend(other.display_name().to_string())),
    }
}
