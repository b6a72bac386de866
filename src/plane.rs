//! Plane geometry and the row-bounded upload shared by every backend
//!
//! Chroma dimensions round up (`(n + 1) / 2`) everywhere: texture sizes,
//! row counts and the NV12 chroma block.

use crate::error::{Error, Result};
use crate::types::{FramePlane, PixelFormat, PixelFrame, PixelPlane};

/// Subsampled chroma dimensions for 4:2:0 content
pub fn chroma_size(width: u32, height: u32) -> (u32, u32) {
    ((width + 1) / 2, (height + 1) / 2)
}

/// Dimensions and texel size of one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneExtent {
    pub width: u32,
    pub height: u32,
    pub bytes_per_texel: usize,
}

impl PlaneExtent {
    const fn new(width: u32, height: u32, bytes_per_texel: usize) -> Self {
        Self {
            width,
            height,
            bytes_per_texel,
        }
    }

    /// Bytes covering one row without padding
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_texel
    }
}

/// Extent of CPU plane `index` of a frame
pub fn frame_plane_extent(
    format: PixelFormat,
    index: usize,
    width: u32,
    height: u32,
) -> Option<PlaneExtent> {
    let (cw, ch) = chroma_size(width, height);
    match (format, index) {
        (PixelFormat::Argb, 0) => Some(PlaneExtent::new(width, height, 4)),
        (PixelFormat::I420, 0) | (PixelFormat::I444, _) | (PixelFormat::Nv12, 0) if index < 3 => {
            Some(PlaneExtent::new(width, height, 1))
        }
        (PixelFormat::I420, 1 | 2) => Some(PlaneExtent::new(cw, ch, 1)),
        (PixelFormat::Nv12, 1) => Some(PlaneExtent::new(cw, ch, 2)),
        _ => None,
    }
}

/// Size of the input texture backing `plane` for a frame of `format`.
///
/// NV12 textures must have even dimensions, so odd frames get one padding
/// row or column.
pub fn texture_size(plane: PixelPlane, format: PixelFormat, width: u32, height: u32) -> (u32, u32) {
    match (plane, format) {
        (PixelPlane::U | PixelPlane::V, PixelFormat::I420) => chroma_size(width, height),
        (PixelPlane::Nv12, _) => (round_even(width), round_even(height)),
        _ => (width, height),
    }
}

/// Round up to the next even number
pub fn round_even(n: u32) -> u32 {
    n + (n & 1)
}

/// Copy `rows` rows between two pitched buffers.
///
/// Each row moves `min(src_pitch, dst_pitch)` bytes, further bounded by what
/// is left in either buffer, so neither side is ever read or written out of
/// bounds.
pub fn copy_rows(
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    dst_pitch: usize,
    rows: usize,
) -> Result<()> {
    let span = src_pitch.min(dst_pitch);
    for row in 0..rows {
        let s = row * src_pitch;
        let d = row * dst_pitch;
        let n = span
            .min(src.len().saturating_sub(s))
            .min(dst.len().saturating_sub(d));
        if n == 0 {
            return Err(Error::InvalidFrame(format!(
                "row {} of {} is outside the plane",
                row, rows
            )));
        }
        dst[d..d + n].copy_from_slice(&src[s..s + n]);
    }
    Ok(())
}

/// Texel layout of GPU textures, independent of the graphics API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 8-bit channel
    R8,
    /// 32-bit, stored B, G, R, A
    Bgra8,
    /// 32-bit, stored R, G, B, A
    Rgba8,
    /// Luma rows followed by interleaved U/V rows, same pitch
    Nv12,
}

impl TextureFormat {
    /// Bytes per texel of the first plane
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            TextureFormat::R8 | TextureFormat::Nv12 => 1,
            TextureFormat::Bgra8 | TextureFormat::Rgba8 => 4,
        }
    }

    /// Rows a mapped texture of this format spans
    pub fn mapped_rows(&self, height: u32) -> usize {
        match self {
            TextureFormat::Nv12 => height as usize + chroma_size(0, height).1 as usize,
            _ => height as usize,
        }
    }

    /// Input texture format for a plane role
    pub fn for_plane(plane: PixelPlane) -> Self {
        match plane {
            PixelPlane::Argb => TextureFormat::Bgra8,
            PixelPlane::Nv12 => TextureFormat::Nv12,
            PixelPlane::Y | PixelPlane::U | PixelPlane::V => TextureFormat::R8,
        }
    }
}

/// CPU view of a mapped texture
pub struct MappedTexture<'a> {
    pub data: &'a mut [u8],
    pub row_pitch: usize,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl MappedTexture<'_> {
    /// Write one single-plane source into the mapping
    pub fn write_plane(&mut self, plane: &FramePlane<'_>, rows: u32) -> Result<()> {
        copy_rows(
            plane.data,
            plane.pitch,
            self.data,
            self.row_pitch,
            rows as usize,
        )
    }

    /// Write a `width` x `height` NV12 frame: luma rows, then the
    /// interleaved chroma rows right after the texture's luma plane. U/V bytes
    /// are copied as-is. Padding texels of an odd-sized frame repeat the last
    /// luma column and row.
    pub fn write_nv12(
        &mut self,
        y: &FramePlane<'_>,
        uv: &FramePlane<'_>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if width > self.width || height > self.height {
            return Err(Error::Map(format!(
                "{}x{} frame does not fit a {}x{} texture",
                width, height, self.width, self.height
            )));
        }
        let pitch = self.row_pitch;
        let luma_rows = height as usize;
        let chroma_rows = chroma_size(width, height).1 as usize;
        let split = pitch * self.height as usize;
        if self.data.len() < split + pitch * chroma_rows {
            return Err(Error::Map(format!(
                "mapped NV12 texture holds {} bytes, needs {}",
                self.data.len(),
                split + pitch * chroma_rows
            )));
        }

        let (luma, chroma) = self.data.split_at_mut(split);
        copy_rows(y.data, y.pitch, luma, pitch, luma_rows)?;
        copy_rows(uv.data, uv.pitch, chroma, pitch, chroma_rows)?;

        let (w, tex_w) = (width as usize, (self.width as usize).min(pitch));
        if tex_w > w {
            for row in luma.chunks_mut(pitch).take(luma_rows) {
                let edge = row[w - 1];
                row[w..tex_w].fill(edge);
            }
        }
        if self.height > height {
            let last = (luma_rows - 1) * pitch;
            luma.copy_within(last..last + tex_w, luma_rows * pitch);
        }
        Ok(())
    }
}

/// Upload the CPU planes of `frame` that back input texture `plane`
pub fn upload_frame_plane(
    map: &mut MappedTexture<'_>,
    frame: &PixelFrame<'_>,
    plane: PixelPlane,
) -> Result<()> {
    let missing = |i: usize| Error::InvalidFrame(format!("{} frame is missing plane {}", frame.format, i));
    match plane {
        PixelPlane::Nv12 => {
            let y = frame.plane(0).ok_or_else(|| missing(0))?;
            let uv = frame.plane(1).ok_or_else(|| missing(1))?;
            map.write_nv12(y, uv, frame.width, frame.height)
        }
        PixelPlane::Argb | PixelPlane::Y | PixelPlane::U | PixelPlane::V => {
            let index = match plane {
                PixelPlane::U => 1,
                PixelPlane::V => 2,
                _ => 0,
            };
            let source = frame.plane(index).ok_or_else(|| missing(index))?;
            let rows = frame_plane_extent(frame.format, index, frame.width, frame.height)
                .map(|e| e.height)
                .ok_or_else(|| missing(index))?;
            map.write_plane(source, rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameBuffer;

    #[test]
    fn test_chroma_size_rounds_up() {
        assert_eq!(chroma_size(640, 480), (320, 240));
        assert_eq!(chroma_size(5, 3), (3, 2));
        assert_eq!(chroma_size(1, 1), (1, 1));
    }

    #[test]
    fn test_copy_rows_wider_source() {
        let src: Vec<u8> = (0..24).collect();
        let mut dst = vec![0xffu8; 8];
        copy_rows(&src, 8, &mut dst, 4, 2).unwrap();
        assert_eq!(dst, vec![0, 1, 2, 3, 8, 9, 10, 11]);
    }

    #[test]
    fn test_copy_rows_narrower_source() {
        let src: Vec<u8> = (0..6).collect();
        let mut dst = vec![0xffu8; 16];
        copy_rows(&src, 3, &mut dst, 8, 2).unwrap();
        assert_eq!(&dst[0..3], &[0, 1, 2]);
        assert_eq!(&dst[3..8], &[0xff; 5]);
        assert_eq!(&dst[8..11], &[3, 4, 5]);
    }

    #[test]
    fn test_copy_rows_stops_at_short_source() {
        let src = vec![1u8; 10];
        let mut dst = vec![0u8; 32];
        assert!(copy_rows(&src, 8, &mut dst, 8, 4).is_err());
    }

    #[test]
    fn test_nv12_chroma_follows_luma() {
        let mut frame = FrameBuffer::new(4, 3, PixelFormat::Nv12);
        for (row, line) in frame.planes[0].chunks_mut(4).enumerate() {
            line.fill(10 + row as u8);
        }
        // U, V pairs
        for (i, pair) in frame.planes[1].chunks_mut(2).enumerate() {
            pair[0] = 100 + i as u8;
            pair[1] = 200 + i as u8;
        }

        // Odd height: the texture is padded to 4 rows
        let (tex_w, tex_h) = texture_size(PixelPlane::Nv12, PixelFormat::Nv12, 4, 3);
        assert_eq!((tex_w, tex_h), (4, 4));
        let pitch = 8;
        let mut storage = vec![0u8; pitch * TextureFormat::Nv12.mapped_rows(tex_h)];
        let mut map = MappedTexture {
            data: &mut storage,
            row_pitch: pitch,
            width: tex_w,
            height: tex_h,
            format: TextureFormat::Nv12,
        };
        upload_frame_plane(&mut map, &frame.as_frame(), PixelPlane::Nv12).unwrap();

        assert_eq!(&storage[0..4], &[10; 4]);
        assert_eq!(&storage[16..20], &[12; 4]);
        // Padding row repeats the last luma row
        assert_eq!(&storage[24..28], &[12; 4]);
        // Chroma starts after the texture's four luma rows, two rows of it
        assert_eq!(&storage[32..36], &[100, 200, 101, 201]);
        assert_eq!(&storage[40..44], &[102, 202, 103, 203]);
    }

    #[test]
    fn test_nv12_odd_width_repeats_edge() {
        let mut frame = FrameBuffer::new(3, 2, PixelFormat::Nv12);
        frame.planes[0].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        let mut storage = vec![0u8; 4 * TextureFormat::Nv12.mapped_rows(2)];
        let mut map = MappedTexture {
            data: &mut storage,
            row_pitch: 4,
            width: 4,
            height: 2,
            format: TextureFormat::Nv12,
        };
        upload_frame_plane(&mut map, &frame.as_frame(), PixelPlane::Nv12).unwrap();
        assert_eq!(&storage[0..8], &[1, 2, 3, 3, 4, 5, 6, 6]);
    }

    #[test]
    fn test_i420_chroma_rows() {
        let frame = FrameBuffer::new(7, 5, PixelFormat::I420);
        let extent = frame_plane_extent(PixelFormat::I420, 1, 7, 5).unwrap();
        assert_eq!((extent.width, extent.height), (4, 3));
        assert_eq!(frame.planes[1].len(), 12);
        assert_eq!(texture_size(PixelPlane::U, PixelFormat::I420, 7, 5), (4, 3));
        assert_eq!(texture_size(PixelPlane::U, PixelFormat::I444, 7, 5), (7, 5));
    }
}
