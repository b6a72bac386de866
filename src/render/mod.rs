//! Render contract
//!
//! [`Renderer`] is the object-safe surface the application drives.
//! [`Backend`] and [`RenderTexture`] are the seams a graphics API plugs into;
//! [`FrameRenderer`] holds the single state machine and format dispatch
//! shared by every backend.

pub mod convert;
pub mod pipeline;

pub use convert::{RgbToYuvConverter, YuvToRgbConverter};
pub use pipeline::{FrameRenderer, RenderOptions};

use crate::backend::BackendKind;
use crate::color::ColorMatrix;
use crate::error::{Error, Result};
use crate::plane::{MappedTexture, TextureFormat};
use crate::shader::ShaderLibrary;
use crate::transform::{Rotation, ShaderConstants, Transform};
use crate::types::{
    FrameOutcome, HardwareSurface, PixelFormat, PixelFrame, PixelShader, RenderStats, Resolution,
    ShaderProgram,
};
use crate::window::RenderWindow;
use std::sync::Arc;

/// Maximum unsharp amount accepted by [`Renderer::set_sharpen`]
pub const MAX_SHARPEN: f32 = 10.0;

/// Trait for video renderers
///
/// All methods take `&self`: one lock per instance serializes init, resize,
/// render and destroy, so the renderer can be shared between a decode thread
/// and a UI thread.
pub trait Renderer: Send + Sync {
    /// Create the device and swap chain for `window`. Safe to call again
    /// after [`Renderer::destroy`]; a failure leaves the renderer
    /// uninitialized.
    fn init(&self, window: Arc<dyn RenderWindow>) -> Result<()>;

    /// Follow a change of the window's client area
    fn resize(&self) -> Result<()>;

    /// Upload, convert and present one CPU frame
    fn render(&self, frame: &PixelFrame<'_>) -> FrameOutcome;

    /// Copy, convert and present one GPU-resident frame
    fn render_surface(&self, surface: &HardwareSurface) -> FrameOutcome;

    /// Release every GPU resource
    fn destroy(&self);

    /// Unsharp amount, clamped to `0.0..=10.0`; zero disables the pass
    fn set_sharpen(&self, amount: f32);

    /// Matrix used for YUV content
    fn set_color_matrix(&self, matrix: ColorMatrix);

    /// Letterbox instead of stretching when aspect ratios differ
    fn set_preserve_aspect(&self, preserve: bool);

    fn set_rotation(&self, rotation: Rotation);

    fn is_ready(&self) -> bool;

    fn backend(&self) -> BackendKind;

    /// Get renderer statistics
    fn stats(&self) -> RenderStats;
}

/// Clamp a requested unsharp amount into the supported range
pub fn clamp_sharpen(amount: f32) -> f32 {
    if amount.is_finite() {
        amount.clamp(0.0, MAX_SHARPEN)
    } else {
        0.0
    }
}

/// How a texture is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// CPU writable through map/unmap
    Dynamic,
    /// GPU writable through copies only
    Default,
    /// Shader pass output, also sampled by later passes
    RenderTarget,
}

/// Texture creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub array_size: u32,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            array_size: 1,
        }
    }

    pub fn render_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self::new(width, height, format, TextureUsage::RenderTarget)
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size.max(1);
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Which bits of a texture a view exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// The whole texture in its own format
    Full,
    /// 8-bit luma plane of an NV12 texture
    Luma,
    /// Two-channel U/V plane of an NV12 texture
    Chroma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Point,
    Linear,
}

/// How a frame format reaches a presentable texture on a given backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionPath {
    /// Run a pixel shader pass into a back-buffer sized target
    Shader(PixelShader),
    /// The input texture is presentable as-is
    Direct,
    /// Device blit from the input texture into an RGB texture
    Blit,
}

/// Shader pass over one GPU texture.
///
/// Call order per pass is `begin`, bind, `draw`, `end`. `draw` without
/// `begin` does nothing.
pub trait RenderTexture<B: Backend>: Send {
    fn desc(&self) -> &TextureDesc;

    /// Backing texture, e.g. for present or as a later pass's input
    fn texture(&self) -> &B::Texture;

    /// Vertex transform applied from the next `begin`
    fn set_transform(&mut self, transform: &Transform);

    /// Cache the bound render targets, bind this texture and clear it
    fn begin(&mut self) -> Result<()>;

    fn ps_set_texture(&mut self, slot: u32, view: Option<&B::View>);

    fn ps_set_constant(&mut self, slot: u32, buffer: Option<&B::Buffer>);

    fn ps_set_samplers(&mut self, slot: u32, sampler: Option<&B::Sampler>);

    /// Draw the quad and submit
    fn draw(&mut self) -> Result<()>;

    /// Restore the render targets cached by `begin`
    fn end(&mut self);

    fn is_drawing(&self) -> bool;

    fn shader_view(&self) -> Option<B::View> {
        B::texture_view(self.texture(), ViewKind::Full)
    }

    fn luma_view(&self) -> Option<B::View> {
        B::texture_view(self.texture(), ViewKind::Luma)
    }

    fn chroma_view(&self) -> Option<B::View> {
        B::texture_view(self.texture(), ViewKind::Chroma)
    }
}

/// A graphics API: device, swap chain and resource factory
pub trait Backend: Sized + Send + 'static {
    /// Creation context shared by every device this backend creates
    type Adapter: Clone + Send + Sync + 'static;
    type Texture: Send;
    type View: Clone + Send;
    type Sampler: Send;
    type Buffer: Send;
    type Target: RenderTexture<Self>;

    const KIND: BackendKind;

    /// Create the device and a swap chain sized to the window's client area
    fn create(
        adapter: &Self::Adapter,
        window: &dyn RenderWindow,
        shaders: Arc<ShaderLibrary>,
    ) -> Result<Self>;

    fn back_buffer_size(&self) -> Resolution;

    fn back_buffer_format(&self) -> TextureFormat;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture>;

    /// Create a render target bound to `program`
    fn create_render_target(&mut self, desc: &TextureDesc, program: ShaderProgram) -> Result<Self::Target>;

    fn create_sampler(&mut self, kind: SamplerKind) -> Result<Self::Sampler>;

    fn create_constant_buffer(&mut self) -> Result<Self::Buffer>;

    fn update_constants(&mut self, buffer: &mut Self::Buffer, constants: &ShaderConstants) -> Result<()>;

    /// Map a dynamic texture for writing, discarding its contents
    fn map_texture(
        &mut self,
        texture: &mut Self::Texture,
        write: &mut dyn FnMut(&mut MappedTexture<'_>) -> Result<()>,
    ) -> Result<()>;

    /// View created alongside the texture (array slice 0)
    fn texture_view(texture: &Self::Texture, kind: ViewKind) -> Option<Self::View>;

    /// New view over one array slice
    fn create_view(&mut self, texture: &Self::Texture, kind: ViewKind, array_slice: u32) -> Result<Self::View>;

    /// GPU copy of a foreign surface (slice) into a pooled texture
    fn copy_surface(&mut self, dst: &mut Self::Texture, surface: &HardwareSurface) -> Result<()>;

    fn conversion_path(&self, format: PixelFormat, matrix: ColorMatrix) -> Result<ConversionPath> {
        match format {
            PixelFormat::Argb => Ok(ConversionPath::Shader(PixelShader::Argb)),
            PixelFormat::I420 | PixelFormat::I444 => Ok(ConversionPath::Shader(matrix.yuv_shader())),
            PixelFormat::Nv12 => Ok(ConversionPath::Shader(matrix.nv12_shader())),
            PixelFormat::Unknown => Err(Error::UnsupportedFormat(format.to_string())),
        }
    }

    /// Device blit with format conversion, used by [`ConversionPath::Blit`]
    fn blit(&mut self, _src: &Self::Texture, _dst: &mut Self::Texture) -> Result<()> {
        Err(Error::UnsupportedFormat(format!(
            "{} backend has no blit conversion",
            Self::KIND
        )))
    }

    /// Bind the back buffer and clear it
    fn begin_frame(&mut self) -> Result<()>;

    /// Copy `output` into the back buffer and present. `None` closes the
    /// frame without presenting. Device removal yields [`Error::DeviceLost`].
    fn present(&mut self, output: Option<&Self::Texture>) -> Result<()>;

    /// Unbind and release every view of the back buffer
    fn release_targets(&mut self);

    /// Resize the swap chain buffers. Device removal yields
    /// [`Error::DeviceLost`].
    fn resize_buffers(&mut self, size: Resolution) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_sharpen() {
        assert_eq!(clamp_sharpen(-1.0), 0.0);
        assert_eq!(clamp_sharpen(2.5), 2.5);
        assert_eq!(clamp_sharpen(42.0), MAX_SHARPEN);
        assert_eq!(clamp_sharpen(f32::NAN), 0.0);
    }

    #[test]
    fn test_texture_desc() {
        let desc = TextureDesc::render_target(800, 600, TextureFormat::Rgba8).with_array_size(0);
        assert_eq!(desc.array_size, 1);
        assert_eq!(desc.usage, TextureUsage::RenderTarget);
        assert_eq!(desc.resolution(), Resolution::SVGA);
    }
}
