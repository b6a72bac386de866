//! Encoder-side color converters
//!
//! [`RgbToYuvConverter`] splits an RGBA texture into two NV12 textures: a
//! regular 4:2:0 frame plus the chroma samples 4:2:0 drops. An encoder can
//! ship both as ordinary NV12 streams and [`YuvToRgbConverter`] rebuilds
//! full 4:4:4 color from them on the other side.

use super::{Backend, RenderTexture, SamplerKind, TextureDesc, ViewKind};
use crate::error::{Error, Result};
use crate::plane::TextureFormat;
use crate::transform::{ShaderConstants, Transform};
use crate::types::{ConverterShader, Resolution};

fn full_view<B: Backend>(texture: &B::Texture, kind: ViewKind) -> Result<B::View> {
    B::texture_view(texture, kind)
        .ok_or_else(|| Error::UnsupportedFormat(format!("texture has no {:?} view", kind)))
}

/// Run one converter pass; textures are unbound again afterwards
fn run_pass<B: Backend>(
    target: &mut B::Target,
    views: &[B::View],
    constants: &B::Buffer,
    sampler: &B::Sampler,
) -> Result<()> {
    target.set_transform(&Transform::IDENTITY);
    target.begin()?;
    for (slot, view) in views.iter().enumerate() {
        target.ps_set_texture(slot as u32, Some(view));
    }
    target.ps_set_constant(0, Some(constants));
    target.ps_set_samplers(0, Some(sampler));
    let drawn = target.draw();
    target.end();
    for slot in 0..views.len() {
        target.ps_set_texture(slot as u32, None);
    }
    drawn
}

/// RGBA -> (4:2:0 NV12, residual chroma NV12)
pub struct RgbToYuvConverter<B: Backend> {
    yuv420: B::Target,
    chroma420: B::Target,
    point: B::Sampler,
    constants: B::Buffer,
    size: Resolution,
}

impl<B: Backend> RgbToYuvConverter<B> {
    /// Both outputs are NV12, so `width` and `height` must be even
    pub fn new(backend: &mut B, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(Error::TextureCreation(format!(
                "converter needs even dimensions, got {}x{}",
                width, height
            )));
        }

        let desc = TextureDesc::render_target(width, height, TextureFormat::Nv12);
        let yuv420 = backend.create_render_target(&desc, ConverterShader::RgbToYuv420.into())?;
        let chroma420 = backend.create_render_target(&desc, ConverterShader::RgbToChroma420.into())?;
        let point = backend.create_sampler(SamplerKind::Point)?;
        let mut constants = backend.create_constant_buffer()?;
        backend.update_constants(&mut constants, &ShaderConstants::new(width, height, 0.0))?;

        Ok(Self {
            yuv420,
            chroma420,
            point,
            constants,
            size: Resolution::new(width, height),
        })
    }

    pub fn size(&self) -> Resolution {
        self.size
    }

    /// Convert `rgba`, which must match the converter size
    pub fn convert(&mut self, rgba: &B::Texture) -> Result<()> {
        let view = full_view::<B>(rgba, ViewKind::Full)?;
        let views = [view];
        run_pass::<B>(&mut self.yuv420, &views, &self.constants, &self.point)?;
        run_pass::<B>(&mut self.chroma420, &views, &self.constants, &self.point)
    }

    pub fn yuv420(&self) -> &B::Texture {
        self.yuv420.texture()
    }

    pub fn chroma420(&self) -> &B::Texture {
        self.chroma420.texture()
    }
}

/// (4:2:0 NV12, residual chroma NV12) -> RGBA
pub struct YuvToRgbConverter<B: Backend> {
    rgba: B::Target,
    point: B::Sampler,
    constants: B::Buffer,
    size: Resolution,
}

impl<B: Backend> YuvToRgbConverter<B> {
    pub fn new(backend: &mut B, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::TextureCreation(format!("{}x{} converter", width, height)));
        }

        let desc = TextureDesc::render_target(width, height, TextureFormat::Rgba8);
        let rgba = backend.create_render_target(&desc, ConverterShader::Yuv444Combine.into())?;
        let point = backend.create_sampler(SamplerKind::Point)?;
        let mut constants = backend.create_constant_buffer()?;
        backend.update_constants(&mut constants, &ShaderConstants::new(width, height, 0.0))?;

        Ok(Self {
            rgba,
            point,
            constants,
            size: Resolution::new(width, height),
        })
    }

    pub fn size(&self) -> Resolution {
        self.size
    }

    /// Combine slice 0 of both textures
    pub fn combine(&mut self, yuv420: &B::Texture, chroma420: &B::Texture) -> Result<()> {
        let views = [
            full_view::<B>(yuv420, ViewKind::Luma)?,
            full_view::<B>(yuv420, ViewKind::Chroma)?,
            full_view::<B>(chroma420, ViewKind::Luma)?,
            full_view::<B>(chroma420, ViewKind::Chroma)?,
        ];
        run_pass::<B>(&mut self.rgba, &views, &self.constants, &self.point)
    }

    /// Combine frames living in texture arrays, e.g. a decoder's surface pool
    pub fn combine_slices(
        &mut self,
        backend: &mut B,
        yuv420: &B::Texture,
        yuv420_index: u32,
        chroma420: &B::Texture,
        chroma420_index: u32,
    ) -> Result<()> {
        let views = [
            backend.create_view(yuv420, ViewKind::Luma, yuv420_index)?,
            backend.create_view(yuv420, ViewKind::Chroma, yuv420_index)?,
            backend.create_view(chroma420, ViewKind::Luma, chroma420_index)?,
            backend.create_view(chroma420, ViewKind::Chroma, chroma420_index)?,
        ];
        run_pass::<B>(&mut self.rgba, &views, &self.constants, &self.point)
    }

    pub fn output(&self) -> &B::Texture {
        self.rgba.texture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::{SoftAdapter, SoftBackend, SoftTexture};
    use crate::color::ColorMatrix;
    use crate::pattern::Pattern;
    use crate::render::TextureUsage;
    use crate::shader::ShaderLibrary;
    use crate::types::{FramePlane, PixelFormat, PixelFrame};
    use crate::window::HeadlessWindow;
    use std::sync::Arc;

    fn backend(adapter: &SoftAdapter) -> SoftBackend {
        let window = HeadlessWindow::new(64, 64);
        SoftBackend::create(adapter, &window, Arc::new(ShaderLibrary::new())).unwrap()
    }

    fn rgba_source(backend: &mut SoftBackend, pattern: Pattern, width: u32, height: u32) -> SoftTexture {
        let frame = pattern.frame(width, height, PixelFormat::Argb, ColorMatrix::Bt601, 0);
        let mut texture = backend
            .create_texture(&TextureDesc::new(width, height, TextureFormat::Bgra8, TextureUsage::Dynamic))
            .unwrap();
        backend
            .map_texture(&mut texture, &mut |map| {
                crate::plane::upload_frame_plane(map, &frame.as_frame(), crate::types::PixelPlane::Argb)
            })
            .unwrap();
        texture
    }

    #[test]
    fn test_odd_size_is_rejected() {
        let adapter = SoftAdapter::new();
        let mut backend = backend(&adapter);
        assert!(RgbToYuvConverter::new(&mut backend, 15, 16).is_err());
    }

    #[test]
    fn test_round_trip_keeps_full_chroma() {
        let adapter = SoftAdapter::new();
        let mut backend = backend(&adapter);
        let (width, height) = (16, 8);
        let source = rgba_source(&mut backend, Pattern::Ramp, width, height);

        let mut forward = RgbToYuvConverter::new(&mut backend, width, height).unwrap();
        forward.convert(&source).unwrap();
        let mut inverse = YuvToRgbConverter::new(&mut backend, width, height).unwrap();
        inverse.combine(forward.yuv420(), forward.chroma420()).unwrap();

        let out = inverse.output().read_rgba().unwrap();
        for y in 0..height {
            for x in 0..width {
                let expected = Pattern::Ramp.rgb_at(x, y, width, height, 0);
                let at = ((y * width + x) * 4) as usize;
                for c in 0..3 {
                    let diff = (out[at + c] as i32 - expected[c] as i32).abs();
                    assert!(diff <= 3, "pixel ({}, {}) channel {}: {} vs {}", x, y, c, out[at + c], expected[c]);
                }
            }
        }
    }

    #[test]
    fn test_combine_from_array_slices() {
        let adapter = SoftAdapter::new();
        let mut backend = backend(&adapter);
        let (width, height) = (8, 4);
        let source = rgba_source(&mut backend, Pattern::Solid([200, 40, 90]), width, height);

        let mut forward = RgbToYuvConverter::new(&mut backend, width, height).unwrap();
        forward.convert(&source).unwrap();

        // Park both outputs in slice 1 of two-slice arrays
        let park = |texture: &SoftTexture| {
            let array = adapter.create_surface_texture(width, height, PixelFormat::Nv12, 2).unwrap();
            let bytes = texture.read_slice(0).unwrap();
            let pitch = texture.row_pitch();
            let (y, uv) = bytes.split_at(pitch * height as usize);
            let frame = PixelFrame::nv12(width, height, FramePlane::new(y, pitch), FramePlane::new(uv, pitch));
            array.upload(1, &frame).unwrap();
            array
        };
        let yuv = park(forward.yuv420());
        let chroma = park(forward.chroma420());

        let mut inverse = YuvToRgbConverter::new(&mut backend, width, height).unwrap();
        inverse.combine_slices(&mut backend, &yuv, 1, &chroma, 1).unwrap();
        let out = inverse.output().read_rgba().unwrap();
        for px in out.chunks(4) {
            assert!((px[0] as i32 - 200).abs() <= 3);
            assert!((px[1] as i32 - 40).abs() <= 3);
            assert!((px[2] as i32 - 90).abs() <= 3);
        }
    }
}
