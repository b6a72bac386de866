//! Video Renderer - GPU frame presentation
//!
//! Uploads decoded video frames into GPU textures, converts them to RGB with
//! pixel shader passes, optionally sharpens, and presents to a window.
//!
//! # Features
//!
//! - **Formats**: ARGB, I420, I444 and NV12 from CPU memory, NV12/ARGB
//!   decoder and capture surfaces without a CPU round trip
//! - **Backends**: Direct3D 11, Direct3D 9 and a CPU reference device
//! - **Recovery**: resize and device loss are handled inside the renderer
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use video_renderer::{create_renderer, pattern::Pattern, HeadlessWindow, PixelFormat, RendererConfig};
//! use video_renderer::{BackendKind, ColorMatrix};
//!
//! fn main() -> video_renderer::Result<()> {
//!     let config = RendererConfig::default().with_backend(BackendKind::Soft);
//!     let renderer = create_renderer(&config)?;
//!     renderer.init(Arc::new(HeadlessWindow::new(1280, 720)))?;
//!
//!     let frame = Pattern::Bars.frame(640, 360, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
//!     renderer.render(&frame.as_frame());
//!     renderer.destroy();
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod color;
pub mod config;
pub mod error;
pub mod pattern;
pub mod plane;
pub mod render;
pub mod shader;
pub mod surface;
pub mod transform;
pub mod types;
pub mod window;

// Re-exports for convenience
pub use backend::{available_backends, create_renderer, create_renderer_with_backend, BackendKind};
pub use color::ColorMatrix;
pub use config::RendererConfig;
pub use error::{Error, Result};
pub use render::{FrameRenderer, RenderOptions, Renderer};
pub use shader::ShaderLibrary;
pub use surface::{SurfaceId, SurfaceRegistry};
pub use transform::Rotation;
pub use types::{
    FrameBuffer, FrameOutcome, FramePlane, HardwareSurface, PixelFormat, PixelFrame, RenderStats,
    Resolution, SurfaceHandle,
};
pub use window::{HeadlessWindow, RenderWindow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
