//! Pixel programs of the software backend
//!
//! One function per shader program. Each runs once per target pixel with the
//! interpolated texture coordinate and writes up to two render targets, like
//! `SV_Target0` / `SV_Target1` of the HLSL programs.

use super::texture::BoundView;
use crate::color::ColorMatrix;
use crate::render::SamplerKind;
use crate::transform::ShaderConstants;
use crate::types::{ConverterShader, PixelShader, ShaderProgram};

/// Texture slots a pass can bind
pub const MAX_TEXTURE_SLOTS: usize = 4;
/// Sampler slots a pass can bind
pub const MAX_SAMPLER_SLOTS: usize = 2;

/// Pass inputs, locked for the duration of one draw
pub(crate) struct Bindings<'a> {
    pub views: [Option<BoundView<'a>>; MAX_TEXTURE_SLOTS],
    pub samplers: [Option<SamplerKind>; MAX_SAMPLER_SLOTS],
    pub constants: ShaderConstants,
}

/// Values written by one fragment
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Fragment {
    pub target0: [f32; 4],
    pub target1: [f32; 4],
}

impl Fragment {
    fn color(rgb: [f32; 3]) -> Self {
        Self {
            target0: [rgb[0], rgb[1], rgb[2], 1.0],
            target1: [0.0; 4],
        }
    }

    fn planar(luma: f32, u: f32, v: f32) -> Self {
        Self {
            target0: [luma, 0.0, 0.0, 1.0],
            target1: [u, v, 0.0, 1.0],
        }
    }
}

impl Bindings<'_> {
    /// Unbound slots read as zero
    fn sample(&self, slot: usize, sampler: usize, u: f32, v: f32) -> [f32; 4] {
        match self.views.get(slot).and_then(Option::as_ref) {
            Some(view) => {
                let kind = self.samplers[sampler].unwrap_or(SamplerKind::Linear);
                view.sample(kind, u, v)
            }
            None => [0.0; 4],
        }
    }

    fn load(&self, slot: usize, x: i64, y: i64) -> [f32; 4] {
        match self.views.get(slot).and_then(Option::as_ref) {
            Some(view) => view.load(x, y),
            None => [0.0; 4],
        }
    }

    /// Texel addressed by a texture coordinate in the constant buffer's size
    fn texel(&self, u: f32, v: f32) -> (i64, i64) {
        (
            (u * self.constants.width).floor() as i64,
            (v * self.constants.height).floor() as i64,
        )
    }

    fn size(&self) -> (i64, i64) {
        (self.constants.width as i64, self.constants.height as i64)
    }
}

pub(crate) fn shade(program: ShaderProgram, bindings: &Bindings<'_>, u: f32, v: f32) -> Fragment {
    match program {
        ShaderProgram::Pixel(PixelShader::Argb) => {
            let c = bindings.sample(0, 0, u, v);
            Fragment::color([c[0], c[1], c[2]])
        }
        ShaderProgram::Pixel(PixelShader::YuvBt601) => yuv(bindings, ColorMatrix::Bt601, u, v),
        ShaderProgram::Pixel(PixelShader::YuvBt709) => yuv(bindings, ColorMatrix::Bt709, u, v),
        ShaderProgram::Pixel(PixelShader::Nv12Bt601) => nv12(bindings, ColorMatrix::Bt601, u, v),
        ShaderProgram::Pixel(PixelShader::Nv12Bt709) => nv12(bindings, ColorMatrix::Bt709, u, v),
        ShaderProgram::Pixel(PixelShader::Sharpen) => sharpen(bindings, u, v),
        ShaderProgram::Converter(ConverterShader::RgbToYuv420) => rgb_to_yuv420(bindings, u, v),
        ShaderProgram::Converter(ConverterShader::RgbToChroma420) => rgb_to_chroma420(bindings, u, v),
        ShaderProgram::Converter(ConverterShader::Yuv444Combine) => yuv444_combine(bindings, u, v),
    }
}

fn yuv(bindings: &Bindings<'_>, matrix: ColorMatrix, u: f32, v: f32) -> Fragment {
    let y = bindings.sample(0, 0, u, v)[0];
    let cb = bindings.sample(1, 1, u, v)[0];
    let cr = bindings.sample(2, 1, u, v)[0];
    Fragment::color(matrix.yuv_to_rgb(y, cb, cr))
}

fn nv12(bindings: &Bindings<'_>, matrix: ColorMatrix, u: f32, v: f32) -> Fragment {
    let y = bindings.sample(0, 0, u, v)[0];
    let uv = bindings.sample(1, 1, u, v);
    Fragment::color(matrix.yuv_to_rgb(y, uv[0], uv[1]))
}

/// `c + (c - mean of the four neighbors) * amount`
fn sharpen(bindings: &Bindings<'_>, u: f32, v: f32) -> Fragment {
    let c = bindings.sample(0, 0, u, v);
    let amount = bindings.constants.param;
    if amount <= 0.0 || bindings.constants.width <= 0.0 || bindings.constants.height <= 0.0 {
        return Fragment::color([c[0], c[1], c[2]]);
    }

    let dx = 1.0 / bindings.constants.width;
    let dy = 1.0 / bindings.constants.height;
    let neighbors = [
        bindings.sample(0, 0, u - dx, v),
        bindings.sample(0, 0, u + dx, v),
        bindings.sample(0, 0, u, v - dy),
        bindings.sample(0, 0, u, v + dy),
    ];

    let mut rgb = [0.0; 3];
    for (i, out) in rgb.iter_mut().enumerate() {
        let mean = neighbors.iter().map(|n| n[i]).sum::<f32>() / 4.0;
        *out = (c[i] + (c[i] - mean) * amount).clamp(0.0, 1.0);
    }
    Fragment::color(rgb)
}

fn to_yuv(rgba: [f32; 4]) -> [f32; 3] {
    ColorMatrix::Bt601.rgb_to_yuv(rgba[0], rgba[1], rgba[2])
}

/// Luma of every pixel; chroma pixel (i, j) takes the even-even source
/// pixel (2i, 2j). Only the top-left quarter of target1 lands in the
/// chroma plane.
fn rgb_to_yuv420(bindings: &Bindings<'_>, u: f32, v: f32) -> Fragment {
    let (x, y) = bindings.texel(u, v);
    let [luma, _, _] = to_yuv(bindings.load(0, x, y));
    let [_, cb, cr] = to_yuv(bindings.load(0, x * 2, y * 2));
    Fragment::planar(luma, cb, cr)
}

/// Chroma the 4:2:0 frame drops. The luma plane carries U of the odd rows
/// in its top half and V of the odd rows in its bottom half; the chroma
/// plane carries U/V of the odd-even pixels (2i + 1, 2j).
fn rgb_to_chroma420(bindings: &Bindings<'_>, u: f32, v: f32) -> Fragment {
    let (x, y) = bindings.texel(u, v);
    let (width, height) = bindings.size();
    let half = height / 2;

    let luma = if y < half {
        to_yuv(bindings.load(0, x, y * 2 + 1))[1]
    } else {
        to_yuv(bindings.load(0, x, (y - half) * 2 + 1))[2]
    };
    let [_, cb, cr] = to_yuv(bindings.load(0, (x * 2 + 1).min(width - 1), y * 2));
    Fragment::planar(luma, cb, cr)
}

/// Rebuild full-resolution RGB from a 4:2:0 frame (slots 0/1) and the
/// residual chroma frame (slots 2/3)
fn yuv444_combine(bindings: &Bindings<'_>, u: f32, v: f32) -> Fragment {
    let (x, y) = bindings.texel(u, v);
    let (_, height) = bindings.size();
    let half = height / 2;

    let luma = bindings.load(0, x, y)[0];
    let (cb, cr) = if y % 2 == 1 {
        let row = (y - 1) / 2;
        (bindings.load(2, x, row)[0], bindings.load(2, x, half + row)[0])
    } else if x % 2 == 1 {
        let uv = bindings.load(3, (x - 1) / 2, y / 2);
        (uv[0], uv[1])
    } else {
        let uv = bindings.load(1, x / 2, y / 2);
        (uv[0], uv[1])
    };
    Fragment::color(ColorMatrix::Bt601.yuv_to_rgb(luma, cb, cr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(constants: ShaderConstants) -> Bindings<'static> {
        Bindings {
            views: Default::default(),
            samplers: [None; MAX_SAMPLER_SLOTS],
            constants,
        }
    }

    #[test]
    fn test_unbound_slots_read_zero() {
        let bindings = empty(ShaderConstants::default());
        let out = shade(PixelShader::Argb.into(), &bindings, 0.5, 0.5);
        assert_eq!(out.target0, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sharpen_flat_input_is_unchanged() {
        // No texture bound: the neighborhood is flat, so the mask adds nothing
        let bindings = empty(ShaderConstants::new(16, 16, 2.0));
        let out = shade(PixelShader::Sharpen.into(), &bindings, 0.5, 0.5);
        assert_eq!(out.target0, [0.0, 0.0, 0.0, 1.0]);
    }
}
