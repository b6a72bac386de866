//! CPU textures laid out like mapped D3D11 textures
//!
//! Rows are padded to [`ROW_ALIGNMENT`]. NV12 keeps its interleaved chroma
//! rows directly after the luma plane, at the same pitch.

use crate::error::{Error, Result};
use crate::plane::{self, MappedTexture, TextureFormat};
use crate::render::{SamplerKind, TextureDesc, TextureUsage, ViewKind};
use crate::types::{PixelFormat, PixelFrame, PixelPlane};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Row pitch alignment of every soft texture
pub const ROW_ALIGNMENT: usize = 64;

/// Counts a texture as live until dropped
struct LiveToken(Arc<AtomicUsize>);

impl LiveToken {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Storage {
    desc: TextureDesc,
    row_pitch: usize,
    slices: Vec<RwLock<Vec<u8>>>,
    _live: LiveToken,
}

/// Reference-counted CPU texture (array)
#[derive(Clone)]
pub struct SoftTexture {
    inner: Arc<Storage>,
}

impl std::fmt::Debug for SoftTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftTexture")
            .field("desc", &self.inner.desc)
            .field("row_pitch", &self.inner.row_pitch)
            .finish()
    }
}

impl SoftTexture {
    pub(crate) fn new(desc: TextureDesc, live: &Arc<AtomicUsize>) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::TextureCreation(format!(
                "{}x{} texture",
                desc.width, desc.height
            )));
        }
        if desc.format == TextureFormat::Nv12 && (desc.width % 2 != 0 || desc.height % 2 != 0) {
            return Err(Error::TextureCreation(format!(
                "NV12 texture needs even dimensions, got {}x{}",
                desc.width, desc.height
            )));
        }

        let row_bytes = desc.width as usize * desc.format.bytes_per_texel();
        let row_pitch = row_bytes.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;
        let size = row_pitch * desc.format.mapped_rows(desc.height);
        let slices = (0..desc.array_size.max(1))
            .map(|_| RwLock::new(vec![0u8; size]))
            .collect();

        Ok(Self {
            inner: Arc::new(Storage {
                desc,
                row_pitch,
                slices,
                _live: LiveToken::new(live),
            }),
        })
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.inner.desc
    }

    pub fn row_pitch(&self) -> usize {
        self.inner.row_pitch
    }

    /// True when both handles name the same texture
    pub fn same_texture(&self, other: &SoftTexture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Handles alive for this texture, including views
    pub(crate) fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn slice(&self, index: u32) -> Result<&RwLock<Vec<u8>>> {
        self.inner.slices.get(index as usize).ok_or_else(|| {
            Error::Surface(format!(
                "array slice {} out of {}",
                index,
                self.inner.slices.len()
            ))
        })
    }

    /// Map slice 0 for CPU writes; only dynamic textures are mappable
    pub(crate) fn map_write(
        &self,
        write: &mut dyn FnMut(&mut MappedTexture<'_>) -> Result<()>,
    ) -> Result<()> {
        if self.inner.desc.usage != TextureUsage::Dynamic {
            return Err(Error::Map(format!(
                "{:?} texture is not CPU writable",
                self.inner.desc.usage
            )));
        }
        self.write_slice(0, write)
    }

    fn write_slice(
        &self,
        index: u32,
        write: &mut dyn FnMut(&mut MappedTexture<'_>) -> Result<()>,
    ) -> Result<()> {
        let mut data = self.slice(index)?.write();
        let desc = self.inner.desc;
        let mut map = MappedTexture {
            data: &mut data,
            row_pitch: self.inner.row_pitch,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        };
        write(&mut map)
    }

    /// Fill one array slice from a CPU frame, the way a decoder or capture
    /// source writes its own textures
    pub fn upload(&self, slice: u32, frame: &PixelFrame<'_>) -> Result<()> {
        frame.validate()?;
        let role = match (frame.format, self.inner.desc.format) {
            (PixelFormat::Nv12, TextureFormat::Nv12) => PixelPlane::Nv12,
            (PixelFormat::Argb, TextureFormat::Bgra8) => PixelPlane::Argb,
            (format, texture) => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} frame into {:?} texture",
                    format, texture
                )))
            }
        };
        self.write_slice(slice, &mut |map| plane::upload_frame_plane(map, frame, role))
    }

    /// Copy of one slice's bytes, padding included
    pub fn read_slice(&self, slice: u32) -> Result<Vec<u8>> {
        Ok(self.slice(slice)?.read().clone())
    }

    /// Tightly packed RGBA copy of slice 0 (color formats only)
    pub fn read_rgba(&self) -> Result<Vec<u8>> {
        let desc = self.inner.desc;
        let data = self.slice(0)?.read();
        let pitch = self.inner.row_pitch;
        let mut out = Vec::with_capacity(desc.width as usize * desc.height as usize * 4);
        for row in data.chunks(pitch).take(desc.height as usize) {
            for px in row[..desc.width as usize * desc.format.bytes_per_texel()].chunks(desc.format.bytes_per_texel()) {
                match desc.format {
                    TextureFormat::Rgba8 => out.extend_from_slice(px),
                    TextureFormat::Bgra8 => out.extend_from_slice(&[px[2], px[1], px[0], px[3]]),
                    TextureFormat::R8 => out.extend_from_slice(&[px[0], 0, 0, 255]),
                    TextureFormat::Nv12 => {
                        return Err(Error::UnsupportedFormat("RGBA readback of NV12".into()))
                    }
                }
            }
        }
        Ok(out)
    }

    /// Clear slice 0 to opaque black
    pub(crate) fn clear(&self) {
        let mut data = self.inner.slices[0].write();
        match self.inner.desc.format {
            TextureFormat::Rgba8 | TextureFormat::Bgra8 => {
                for px in data.chunks_exact_mut(4) {
                    px.copy_from_slice(&[0, 0, 0, 255]);
                }
            }
            TextureFormat::R8 | TextureFormat::Nv12 => data.fill(0),
        }
    }

    /// Whole-resource copy; descriptors must match in size and format
    pub(crate) fn copy_resource(&self, src: &SoftTexture) -> Result<()> {
        let (d, s) = (self.inner.desc, src.inner.desc);
        if (d.width, d.height, d.format) != (s.width, s.height, s.format) {
            return Err(Error::Present(format!(
                "copy from {}x{} {:?} into {}x{} {:?}",
                s.width, s.height, s.format, d.width, d.height, d.format
            )));
        }
        if self.same_texture(src) {
            return Ok(());
        }
        let source = src.inner.slices[0].read();
        self.inner.slices[0].write().copy_from_slice(&source);
        Ok(())
    }

    /// Copy a `width` x `height` region from slice `src_slice` of `src` into
    /// slice 0, both planes for NV12. The region is clamped to the smaller
    /// of the two textures.
    pub(crate) fn copy_region(&self, src: &SoftTexture, src_slice: u32, width: u32, height: u32) -> Result<()> {
        let (d, s) = (self.inner.desc, src.inner.desc);
        if d.format != s.format {
            return Err(Error::Surface(format!("{:?} surface into {:?} texture", s.format, d.format)));
        }
        if self.same_texture(src) {
            return Err(Error::Surface("source and destination are the same texture".into()));
        }
        let (width, height) = match d.format {
            TextureFormat::Nv12 => (plane::round_even(width), plane::round_even(height)),
            _ => (width, height),
        };
        // Oversized regions are clipped to both textures
        let width = width.min(s.width).min(d.width);
        let height = height.min(s.height).min(d.height);

        let source = src.slice(src_slice)?.read();
        let mut dest = self.inner.slices[0].write();
        let row_bytes = width as usize * d.format.bytes_per_texel();
        let (sp, dp) = (src.inner.row_pitch, self.inner.row_pitch);
        copy_block(&source, sp, &mut dest, dp, row_bytes, height as usize);
        if d.format == TextureFormat::Nv12 {
            let (so, do_) = (sp * s.height as usize, dp * d.height as usize);
            copy_block(&source[so..], sp, &mut dest[do_..], dp, row_bytes, height as usize / 2);
        }
        Ok(())
    }

    pub(crate) fn read_guard(&self, slice: u32) -> Result<RwLockReadGuard<'_, Vec<u8>>> {
        Ok(self.slice(slice)?.read_recursive())
    }

    pub(crate) fn write_guard(&self) -> parking_lot::RwLockWriteGuard<'_, Vec<u8>> {
        self.inner.slices[0].write()
    }
}

fn copy_block(src: &[u8], src_pitch: usize, dst: &mut [u8], dst_pitch: usize, row_bytes: usize, rows: usize) {
    for row in 0..rows {
        let (s, d) = (row * src_pitch, row * dst_pitch);
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
}

/// Shader resource view: a texture, the bits it exposes and an array slice
#[derive(Clone, Debug)]
pub struct SoftView {
    texture: SoftTexture,
    kind: ViewKind,
    slice: u32,
}

impl SoftView {
    pub(crate) fn new(texture: &SoftTexture, kind: ViewKind, slice: u32) -> Result<Self> {
        let format = texture.desc().format;
        let valid = match kind {
            ViewKind::Full => format != TextureFormat::Nv12,
            ViewKind::Luma | ViewKind::Chroma => format == TextureFormat::Nv12,
        };
        if !valid {
            return Err(Error::UnsupportedFormat(format!("{:?} view of {:?} texture", kind, format)));
        }
        texture.slice(slice)?;
        Ok(Self {
            texture: texture.clone(),
            kind,
            slice,
        })
    }

    pub fn texture(&self) -> &SoftTexture {
        &self.texture
    }

    pub(crate) fn bind(&self) -> Result<BoundView<'_>> {
        let desc = *self.texture.desc();
        let pitch = self.texture.row_pitch();
        let (width, height, offset, texel) = match self.kind {
            ViewKind::Full => (desc.width, desc.height, 0, desc.format.bytes_per_texel()),
            ViewKind::Luma => (desc.width, desc.height, 0, 1),
            ViewKind::Chroma => (desc.width / 2, desc.height / 2, pitch * desc.height as usize, 2),
        };
        Ok(BoundView {
            data: self.texture.read_guard(self.slice)?,
            format: desc.format,
            kind: self.kind,
            pitch,
            offset,
            texel,
            width,
            height,
        })
    }
}

/// A view locked for reading during one draw
pub(crate) struct BoundView<'a> {
    data: RwLockReadGuard<'a, Vec<u8>>,
    format: TextureFormat,
    kind: ViewKind,
    pitch: usize,
    offset: usize,
    texel: usize,
    pub width: u32,
    pub height: u32,
}

impl BoundView<'_> {
    /// Integer texel fetch with wrap addressing
    pub fn load(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        let at = self.offset + y * self.pitch + x * self.texel;
        let px = &self.data[at..at + self.texel];
        let n = |v: u8| v as f32 / 255.0;
        match (self.kind, self.format) {
            (ViewKind::Chroma, _) => [n(px[0]), n(px[1]), 0.0, 1.0],
            (_, TextureFormat::Bgra8) => [n(px[2]), n(px[1]), n(px[0]), n(px[3])],
            (_, TextureFormat::Rgba8) => [n(px[0]), n(px[1]), n(px[2]), n(px[3])],
            _ => [n(px[0]), 0.0, 0.0, 1.0],
        }
    }

    /// Filtered fetch at normalized coordinates
    pub fn sample(&self, sampler: SamplerKind, u: f32, v: f32) -> [f32; 4] {
        let (w, h) = (self.width as f32, self.height as f32);
        match sampler {
            SamplerKind::Point => self.load((u * w).floor() as i64, (v * h).floor() as i64),
            SamplerKind::Linear => {
                let fx = u * w - 0.5;
                let fy = v * h - 0.5;
                let (x0, y0) = (fx.floor(), fy.floor());
                let (tx, ty) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let a = self.load(x0, y0);
                let b = self.load(x0 + 1, y0);
                let c = self.load(x0, y0 + 1);
                let d = self.load(x0 + 1, y0 + 1);
                let mut out = [0.0; 4];
                for i in 0..4 {
                    let top = a[i] + (b[i] - a[i]) * tx;
                    let bottom = c[i] + (d[i] - c[i]) * tx;
                    out[i] = top + (bottom - top) * ty;
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_pitch_is_aligned_and_live_counted() {
        let counter = live();
        let texture = SoftTexture::new(
            TextureDesc::new(10, 4, TextureFormat::Bgra8, TextureUsage::Dynamic),
            &counter,
        )
        .unwrap();
        assert_eq!(texture.row_pitch(), 64);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let view = SoftView::new(&texture, ViewKind::Full, 0).unwrap();
        drop(texture);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(view);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_nv12_views() {
        let texture = SoftTexture::new(
            TextureDesc::new(4, 2, TextureFormat::Nv12, TextureUsage::Default),
            &live(),
        )
        .unwrap();
        let mut frame = crate::types::FrameBuffer::new(4, 2, PixelFormat::Nv12);
        frame.planes[0].copy_from_slice(&[0, 51, 102, 153, 204, 255, 0, 0]);
        frame.planes[1].copy_from_slice(&[10, 20, 30, 40]);
        texture.upload(0, &frame.as_frame()).unwrap();

        assert!(SoftView::new(&texture, ViewKind::Full, 0).is_err());
        let luma = SoftView::new(&texture, ViewKind::Luma, 0).unwrap();
        let chroma = SoftView::new(&texture, ViewKind::Chroma, 0).unwrap();
        let luma = luma.bind().unwrap();
        let chroma = chroma.bind().unwrap();

        assert_eq!((luma.width, luma.height), (4, 2));
        assert_eq!((chroma.width, chroma.height), (2, 1));
        assert_eq!(luma.load(1, 0)[0], 51.0 / 255.0);
        // U in the first channel, V in the second
        assert_eq!(chroma.load(1, 0), [30.0 / 255.0, 40.0 / 255.0, 0.0, 1.0]);
        // Wrap addressing
        assert_eq!(chroma.load(2, 0), chroma.load(0, 0));
    }

    #[test]
    fn test_linear_sampling_blends_neighbors() {
        let texture = SoftTexture::new(
            TextureDesc::new(2, 1, TextureFormat::R8, TextureUsage::Dynamic),
            &live(),
        )
        .unwrap();
        texture
            .map_write(&mut |map| {
                map.data[0] = 0;
                map.data[1] = 255;
                Ok(())
            })
            .unwrap();
        let view = SoftView::new(&texture, ViewKind::Full, 0).unwrap();
        let bound = view.bind().unwrap();
        assert_eq!(bound.sample(SamplerKind::Point, 0.25, 0.5)[0], 0.0);
        assert!((bound.sample(SamplerKind::Linear, 0.5, 0.5)[0] - 0.5).abs() < 1e-6);
        assert_eq!(bound.sample(SamplerKind::Linear, 0.75, 0.5)[0], 1.0);
    }

    #[test]
    fn test_map_requires_dynamic_usage() {
        let texture = SoftTexture::new(
            TextureDesc::render_target(4, 4, TextureFormat::Rgba8),
            &live(),
        )
        .unwrap();
        assert!(matches!(texture.map_write(&mut |_| Ok(())), Err(Error::Map(_))));
    }

    #[test]
    fn test_copy_region_from_array_slice() {
        let counter = live();
        let source = SoftTexture::new(
            TextureDesc::new(8, 4, TextureFormat::Nv12, TextureUsage::Default).with_array_size(3),
            &counter,
        )
        .unwrap();
        let mut frame = crate::types::FrameBuffer::new(8, 4, PixelFormat::Nv12);
        frame.planes[0].fill(77);
        frame.planes[1].fill(99);
        source.upload(2, &frame.as_frame()).unwrap();

        let dest = SoftTexture::new(
            TextureDesc::new(8, 4, TextureFormat::Nv12, TextureUsage::Default),
            &counter,
        )
        .unwrap();
        dest.copy_region(&source, 2, 8, 4).unwrap();
        let bytes = dest.read_slice(0).unwrap();
        let pitch = dest.row_pitch();
        assert_eq!(&bytes[0..8], &[77; 8]);
        assert_eq!(&bytes[pitch * 4..pitch * 4 + 8], &[99; 8]);
        assert!(dest.copy_region(&source, 3, 8, 4).is_err());
    }

    #[test]
    fn test_copy_region_clamps_to_source() {
        let counter = live();
        let source = SoftTexture::new(TextureDesc::new(4, 4, TextureFormat::Bgra8, TextureUsage::Default), &counter)
            .unwrap();
        let mut frame = crate::types::FrameBuffer::new(4, 4, PixelFormat::Argb);
        frame.planes[0].fill(200);
        source.upload(0, &frame.as_frame()).unwrap();

        let dest = SoftTexture::new(TextureDesc::new(8, 8, TextureFormat::Bgra8, TextureUsage::Default), &counter)
            .unwrap();
        dest.copy_region(&source, 0, 8, 8).unwrap();
        let bytes = dest.read_slice(0).unwrap();
        let pitch = dest.row_pitch();
        assert_eq!(&bytes[0..16], &[200; 16]);
        assert_eq!(&bytes[16..32], &[0; 16]);
        assert_eq!(&bytes[pitch * 4..pitch * 4 + 4], &[0; 4]);
    }
}
