//! Synthetic test frames
//!
//! Used by the CLI stream, the benches and the end-to-end tests.

use crate::color::ColorMatrix;
use crate::plane::chroma_size;
use crate::types::{FrameBuffer, PixelFormat};

/// Image content of a generated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pattern {
    /// Eight vertical color bars
    #[default]
    Bars,
    /// Red increases left to right, green top to bottom
    Ramp,
    /// One color everywhere
    Solid([u8; 3]),
    /// Color bars scrolling eight pixels per frame
    Moving,
}

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

impl Pattern {
    /// RGB color of pixel (x, y) in frame number `index`
    pub fn rgb_at(&self, x: u32, y: u32, width: u32, height: u32, index: u64) -> [u8; 3] {
        match self {
            Pattern::Solid(rgb) => *rgb,
            Pattern::Ramp => [
                (x * 255 / width.saturating_sub(1).max(1)) as u8,
                (y * 255 / height.saturating_sub(1).max(1)) as u8,
                128,
            ],
            Pattern::Bars => BARS[(x as usize * BARS.len()) / width.max(1) as usize],
            Pattern::Moving => {
                let shifted = ((x as u64 + index * 8) % width.max(1) as u64) as u32;
                Pattern::Bars.rgb_at(shifted, y, width, height, 0)
            }
        }
    }

    /// Generate frame `index` in `format`
    pub fn frame(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        matrix: ColorMatrix,
        index: u64,
    ) -> FrameBuffer {
        let rgb: Vec<[u8; 3]> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| self.rgb_at(x, y, width, height, index))
            .collect();
        from_rgb(&rgb, width, height, format, matrix)
    }
}

/// Convert a tightly packed RGB image into a frame of `format`.
///
/// 4:2:0 chroma is the average of each 2x2 block, clipped at the edges.
pub fn from_rgb(
    rgb: &[[u8; 3]],
    width: u32,
    height: u32,
    format: PixelFormat,
    matrix: ColorMatrix,
) -> FrameBuffer {
    let mut frame = FrameBuffer::new(width, height, format);
    let (w, h) = (width as usize, height as usize);

    match format {
        PixelFormat::Unknown => {}
        PixelFormat::Argb => {
            for (px, out) in rgb.iter().zip(frame.planes[0].chunks_exact_mut(4)) {
                out.copy_from_slice(&[px[2], px[1], px[0], 255]);
            }
        }
        PixelFormat::I444 => {
            for (i, px) in rgb.iter().enumerate() {
                let [y, u, v] = matrix.rgb_to_yuv_u8(*px);
                frame.planes[0][i] = y;
                frame.planes[1][i] = u;
                frame.planes[2][i] = v;
            }
        }
        PixelFormat::I420 | PixelFormat::Nv12 => {
            let yuv: Vec<[u8; 3]> = rgb.iter().map(|px| matrix.rgb_to_yuv_u8(*px)).collect();
            for (i, px) in yuv.iter().enumerate() {
                frame.planes[0][i] = px[0];
            }

            let (cw, ch) = chroma_size(width, height);
            for cy in 0..ch as usize {
                for cx in 0..cw as usize {
                    let (mut u, mut v, mut n) = (0u32, 0u32, 0u32);
                    for y in (cy * 2)..(cy * 2 + 2).min(h) {
                        for x in (cx * 2)..(cx * 2 + 2).min(w) {
                            u += yuv[y * w + x][1] as u32;
                            v += yuv[y * w + x][2] as u32;
                            n += 1;
                        }
                    }
                    let (u, v) = (((u + n / 2) / n) as u8, ((v + n / 2) / n) as u8);
                    let c = cy * cw as usize + cx;
                    if format == PixelFormat::Nv12 {
                        frame.planes[1][c * 2] = u;
                        frame.planes[1][c * 2 + 1] = v;
                    } else {
                        frame.planes[1][c] = u;
                        frame.planes[2][c] = v;
                    }
                }
            }
        }
    }
    frame
}

/// YUV frame with a horizontal luma ramp (16..=235), a horizontal U ramp and
/// a vertical V ramp (both 16..=240)
pub fn yuv_ramp(width: u32, height: u32, format: PixelFormat) -> FrameBuffer {
    let mut frame = FrameBuffer::new(width, height, format);
    let ramp = |i: u32, n: u32, span: u32| (16 + i * span / n.saturating_sub(1).max(1)) as u8;

    for y in 0..height as usize {
        for x in 0..width as usize {
            frame.planes[0][y * frame.pitches[0] + x] = ramp(x as u32, width, 219);
        }
    }

    let (cw, ch) = match format {
        PixelFormat::I444 => (width, height),
        _ => chroma_size(width, height),
    };
    for cy in 0..ch {
        for cx in 0..cw {
            let u = ramp(cx, cw, 224);
            let v = 240 - (ramp(cy, ch, 224) - 16);
            match format {
                PixelFormat::Nv12 => {
                    let at = cy as usize * frame.pitches[1] + cx as usize * 2;
                    frame.planes[1][at] = u;
                    frame.planes[1][at + 1] = v;
                }
                PixelFormat::I420 | PixelFormat::I444 => {
                    frame.planes[1][cy as usize * frame.pitches[1] + cx as usize] = u;
                    frame.planes[2][cy as usize * frame.pitches[2] + cx as usize] = v;
                }
                _ => {}
            }
        }
    }
    frame
}

/// Y, U, V code values covering pixel (x, y) of a YUV frame
pub fn yuv_at(frame: &FrameBuffer, x: u32, y: u32) -> Option<[u8; 3]> {
    let luma = *frame.planes.first()?.get(y as usize * frame.pitches[0] + x as usize)?;
    let (cx, cy) = match frame.format {
        PixelFormat::I444 => (x as usize, y as usize),
        PixelFormat::I420 | PixelFormat::Nv12 => (x as usize / 2, y as usize / 2),
        _ => return None,
    };
    let (u, v) = if frame.format == PixelFormat::Nv12 {
        let at = cy * frame.pitches[1] + cx * 2;
        (*frame.planes[1].get(at)?, *frame.planes[1].get(at + 1)?)
    } else {
        (
            *frame.planes[1].get(cy * frame.pitches[1] + cx)?,
            *frame.planes[2].get(cy * frame.pitches[2] + cx)?,
        )
    };
    Some([luma, u, v])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_is_stored_bgra() {
        let frame = Pattern::Solid([10, 20, 30]).frame(4, 2, PixelFormat::Argb, ColorMatrix::Bt601, 0);
        assert_eq!(&frame.planes[0][0..4], &[30, 20, 10, 255]);
        assert!(frame.as_frame().validate().is_ok());
    }

    #[test]
    fn test_nv12_solid_chroma() {
        let frame = Pattern::Solid([255, 0, 0]).frame(5, 3, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
        // Odd size: 3x2 chroma blocks, interleaved U then V
        assert_eq!(frame.planes[1].len(), 12);
        assert_eq!(&frame.planes[1][0..2], &[90, 240]);
        assert_eq!(&frame.planes[1][10..12], &[90, 240]);
        assert_eq!(yuv_at(&frame, 4, 2), Some([81, 90, 240]));
    }

    #[test]
    fn test_bars_cover_width() {
        assert_eq!(Pattern::Bars.rgb_at(0, 0, 80, 10, 0), [255, 255, 255]);
        assert_eq!(Pattern::Bars.rgb_at(79, 0, 80, 10, 0), [0, 0, 0]);
        assert_ne!(
            Pattern::Moving.rgb_at(5, 0, 80, 10, 1),
            Pattern::Moving.rgb_at(5, 0, 80, 10, 0)
        );
    }

    #[test]
    fn test_yuv_ramp_ends() {
        let frame = yuv_ramp(640, 480, PixelFormat::I420);
        assert_eq!(yuv_at(&frame, 0, 0), Some([16, 16, 240]));
        assert_eq!(yuv_at(&frame, 639, 479), Some([235, 240, 16]));
    }
}
