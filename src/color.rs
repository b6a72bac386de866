//! YUV <-> RGB color matrices (limited range)
//!
//! Values are normalized to 0.0..=1.0 on both sides. Luma occupies
//! 16..=235 and chroma 16..=240 when expressed in 8-bit code values.

use crate::types::PixelShader;
use serde::{Deserialize, Serialize};

/// Matrix coefficients used for YUV content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMatrix {
    /// ITU-R BT.601 (SD)
    #[default]
    Bt601,
    /// ITU-R BT.709 (HD)
    Bt709,
}

impl ColorMatrix {
    /// (Kr, Kb) luma weights
    fn weights(&self) -> (f32, f32) {
        match self {
            ColorMatrix::Bt601 => (0.299, 0.114),
            ColorMatrix::Bt709 => (0.2126, 0.0722),
        }
    }

    /// Shader for planar (I420/I444) input
    pub fn yuv_shader(&self) -> PixelShader {
        match self {
            ColorMatrix::Bt601 => PixelShader::YuvBt601,
            ColorMatrix::Bt709 => PixelShader::YuvBt709,
        }
    }

    /// Shader for biplanar (NV12) input
    pub fn nv12_shader(&self) -> PixelShader {
        match self {
            ColorMatrix::Bt601 => PixelShader::Nv12Bt601,
            ColorMatrix::Bt709 => PixelShader::Nv12Bt709,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ColorMatrix::Bt601 => "BT.601",
            ColorMatrix::Bt709 => "BT.709",
        }
    }

    /// Convert normalized Y'CbCr to clamped R'G'B'
    pub fn yuv_to_rgb(&self, y: f32, u: f32, v: f32) -> [f32; 3] {
        let (kr, kb) = self.weights();
        let kg = 1.0 - kr - kb;

        let y = (y * 255.0 - 16.0) / 219.0;
        let u = (u * 255.0 - 128.0) / 224.0;
        let v = (v * 255.0 - 128.0) / 224.0;

        let r = y + 2.0 * (1.0 - kr) * v;
        let b = y + 2.0 * (1.0 - kb) * u;
        let g = (y - kr * r - kb * b) / kg;

        [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)]
    }

    /// Convert normalized R'G'B' to limited-range Y'CbCr
    pub fn rgb_to_yuv(&self, r: f32, g: f32, b: f32) -> [f32; 3] {
        let (kr, kb) = self.weights();
        let kg = 1.0 - kr - kb;

        let y = kr * r + kg * g + kb * b;
        let u = (b - y) / (2.0 * (1.0 - kb));
        let v = (r - y) / (2.0 * (1.0 - kr));

        [
            (16.0 + 219.0 * y) / 255.0,
            (128.0 + 224.0 * u) / 255.0,
            (128.0 + 224.0 * v) / 255.0,
        ]
    }

    /// 8-bit convenience wrapper around [`ColorMatrix::yuv_to_rgb`]
    pub fn yuv_to_rgb_u8(&self, yuv: [u8; 3]) -> [u8; 3] {
        let [r, g, b] = self.yuv_to_rgb(
            yuv[0] as f32 / 255.0,
            yuv[1] as f32 / 255.0,
            yuv[2] as f32 / 255.0,
        );
        [to_u8(r), to_u8(g), to_u8(b)]
    }

    /// 8-bit convenience wrapper around [`ColorMatrix::rgb_to_yuv`]
    pub fn rgb_to_yuv_u8(&self, rgb: [u8; 3]) -> [u8; 3] {
        let [y, u, v] = self.rgb_to_yuv(
            rgb[0] as f32 / 255.0,
            rgb[1] as f32 / 255.0,
            rgb[2] as f32 / 255.0,
        );
        [to_u8(y), to_u8(u), to_u8(v)]
    }
}

impl std::fmt::Display for ColorMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Quantize a normalized value to an 8-bit code value
pub fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_levels() {
        let m = ColorMatrix::Bt601;
        assert_eq!(m.rgb_to_yuv_u8([0, 0, 0]), [16, 128, 128]);
        assert_eq!(m.rgb_to_yuv_u8([255, 255, 255]), [235, 128, 128]);
        assert_eq!(m.yuv_to_rgb_u8([16, 128, 128]), [0, 0, 0]);
        assert_eq!(m.yuv_to_rgb_u8([235, 128, 128]), [255, 255, 255]);
    }

    #[test]
    fn test_bt601_red() {
        // Standard BT.601 studio-swing code values for pure red
        assert_eq!(ColorMatrix::Bt601.rgb_to_yuv_u8([255, 0, 0]), [81, 90, 240]);
    }

    #[test]
    fn test_round_trip_within_one_code_value() {
        for matrix in [ColorMatrix::Bt601, ColorMatrix::Bt709] {
            for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [12, 200, 99], [128, 128, 128]] {
                let back = matrix.yuv_to_rgb_u8(matrix.rgb_to_yuv_u8(rgb));
                for c in 0..3 {
                    assert!(
                        (back[c] as i32 - rgb[c] as i32).abs() <= 2,
                        "{:?} {:?} -> {:?}",
                        matrix,
                        rgb,
                        back
                    );
                }
            }
        }
    }

    #[test]
    fn test_matrices_differ() {
        let yuv = [120, 90, 180];
        assert_ne!(
            ColorMatrix::Bt601.yuv_to_rgb_u8(yuv),
            ColorMatrix::Bt709.yuv_to_rgb_u8(yuv)
        );
        assert_eq!(ColorMatrix::Bt709.nv12_shader(), PixelShader::Nv12Bt709);
    }
}
