//! Common types shared by the renderer and its backends

use crate::error::{Error, Result};
use crate::plane;
use crate::surface::SurfaceId;
use serde::{Deserialize, Serialize};

/// Surface resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // Common resolutions
    pub const VGA: Self = Self::new(640, 480);
    pub const SVGA: Self = Self::new(800, 600);
    pub const XGA: Self = Self::new(1024, 768);
    pub const HD_720P: Self = Self::new(1280, 720);
    pub const FHD_1080P: Self = Self::new(1920, 1080);

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Calculate aspect ratio
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::SVGA
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of a frame handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Unknown,
    /// Packed 32-bit ARGB, stored B, G, R, A in memory
    Argb,
    /// Planar YUV 4:2:0, three planes
    I420,
    /// Planar YUV 4:4:4, three planes
    I444,
    /// Biplanar YUV 4:2:0, luma plane plus interleaved U/V plane
    Nv12,
}

impl PixelFormat {
    /// Number of CPU planes a frame of this format carries
    pub fn plane_count(&self) -> usize {
        match self {
            PixelFormat::Unknown => 0,
            PixelFormat::Argb => 1,
            PixelFormat::Nv12 => 2,
            PixelFormat::I420 | PixelFormat::I444 => 3,
        }
    }

    /// Input texture roles this format occupies
    pub fn texture_planes(&self) -> &'static [PixelPlane] {
        match self {
            PixelFormat::Unknown => &[],
            PixelFormat::Argb => &[PixelPlane::Argb],
            PixelFormat::Nv12 => &[PixelPlane::Nv12],
            PixelFormat::I420 | PixelFormat::I444 => &[PixelPlane::Y, PixelPlane::U, PixelPlane::V],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PixelFormat::Unknown => "unknown",
            PixelFormat::Argb => "ARGB",
            PixelFormat::I420 => "I420",
            PixelFormat::I444 => "I444",
            PixelFormat::Nv12 => "NV12",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "argb" | "bgra" => Ok(PixelFormat::Argb),
            "i420" | "yuv420p" => Ok(PixelFormat::I420),
            "i444" | "yuv444p" => Ok(PixelFormat::I444),
            "nv12" => Ok(PixelFormat::Nv12),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Role of an input texture; indexes the renderer's input texture array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelPlane {
    Argb,
    Nv12,
    Y,
    U,
    V,
}

impl PixelPlane {
    pub const COUNT: usize = 5;
    pub const ALL: [PixelPlane; Self::COUNT] = [
        PixelPlane::Argb,
        PixelPlane::Nv12,
        PixelPlane::Y,
        PixelPlane::U,
        PixelPlane::V,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Pixel shader program run by one render-target pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelShader {
    /// Packed ARGB passthrough
    Argb,
    YuvBt601,
    YuvBt709,
    Nv12Bt601,
    Nv12Bt709,
    /// Unsharp-mask post pass
    Sharpen,
}

impl PixelShader {
    pub const COUNT: usize = 6;
    pub const ALL: [PixelShader; Self::COUNT] = [
        PixelShader::Argb,
        PixelShader::YuvBt601,
        PixelShader::YuvBt709,
        PixelShader::Nv12Bt601,
        PixelShader::Nv12Bt709,
        PixelShader::Sharpen,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// File stem of the precompiled bytecode blob
    pub fn file_stem(&self) -> &'static str {
        match self {
            PixelShader::Argb => "argb",
            PixelShader::YuvBt601 => "yuv_bt601",
            PixelShader::YuvBt709 => "yuv_bt709",
            PixelShader::Nv12Bt601 => "nv12_bt601",
            PixelShader::Nv12Bt709 => "nv12_bt709",
            PixelShader::Sharpen => "sharpen",
        }
    }
}

/// Shader programs of the encoder-side converters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConverterShader {
    RgbToYuv420,
    RgbToChroma420,
    Yuv444Combine,
}

impl ConverterShader {
    pub const COUNT: usize = 3;
    pub const ALL: [ConverterShader; Self::COUNT] = [
        ConverterShader::RgbToYuv420,
        ConverterShader::RgbToChroma420,
        ConverterShader::Yuv444Combine,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            ConverterShader::RgbToYuv420 => "rgb_to_yuv420",
            ConverterShader::RgbToChroma420 => "rgb_to_chroma420",
            ConverterShader::Yuv444Combine => "yuv444_combine",
        }
    }
}

/// Any pixel shader program a render texture can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Pixel(PixelShader),
    Converter(ConverterShader),
}

impl ShaderProgram {
    pub fn file_stem(&self) -> &'static str {
        match self {
            ShaderProgram::Pixel(shader) => shader.file_stem(),
            ShaderProgram::Converter(shader) => shader.file_stem(),
        }
    }
}

impl From<PixelShader> for ShaderProgram {
    fn from(shader: PixelShader) -> Self {
        ShaderProgram::Pixel(shader)
    }
}

impl From<ConverterShader> for ShaderProgram {
    fn from(shader: ConverterShader) -> Self {
        ShaderProgram::Converter(shader)
    }
}

impl std::fmt::Display for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// One CPU-resident plane: borrowed bytes plus row pitch
#[derive(Debug, Clone, Copy)]
pub struct FramePlane<'a> {
    pub data: &'a [u8],
    pub pitch: usize,
}

impl<'a> FramePlane<'a> {
    pub fn new(data: &'a [u8], pitch: usize) -> Self {
        Self { data, pitch }
    }
}

/// A decoded frame with CPU-resident planes.
///
/// Planes are borrowed for the duration of a render call and never retained.
/// `planes[i]` is populated exactly for `i < format.plane_count()`.
#[derive(Debug, Clone, Copy)]
pub struct PixelFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: [Option<FramePlane<'a>>; 3],
}

impl<'a> PixelFrame<'a> {
    /// Packed ARGB frame
    pub fn argb(width: u32, height: u32, data: &'a [u8], pitch: usize) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Argb,
            planes: [Some(FramePlane::new(data, pitch)), None, None],
        }
    }

    /// Planar 4:2:0 frame
    pub fn i420(
        width: u32,
        height: u32,
        y: FramePlane<'a>,
        u: FramePlane<'a>,
        v: FramePlane<'a>,
    ) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::I420,
            planes: [Some(y), Some(u), Some(v)],
        }
    }

    /// Planar 4:4:4 frame
    pub fn i444(
        width: u32,
        height: u32,
        y: FramePlane<'a>,
        u: FramePlane<'a>,
        v: FramePlane<'a>,
    ) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::I444,
            planes: [Some(y), Some(u), Some(v)],
        }
    }

    /// Biplanar frame: luma plus interleaved U/V
    pub fn nv12(width: u32, height: u32, y: FramePlane<'a>, uv: FramePlane<'a>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Nv12,
            planes: [Some(y), Some(uv), None],
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn plane(&self, index: usize) -> Option<&FramePlane<'a>> {
        self.planes.get(index).and_then(|p| p.as_ref())
    }

    /// Check that every plane the format implies is present and large enough
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if self.format == PixelFormat::Unknown {
            return Err(Error::UnsupportedFormat(self.format.to_string()));
        }

        for index in 0..self.format.plane_count() {
            let plane = self.plane(index).ok_or_else(|| {
                Error::InvalidFrame(format!("{} frame is missing plane {}", self.format, index))
            })?;
            let extent = plane::frame_plane_extent(self.format, index, self.width, self.height)
                .ok_or_else(|| Error::Internal(format!("no extent for plane {}", index)))?;
            if plane.pitch == 0 {
                return Err(Error::InvalidFrame(format!("plane {} has zero pitch", index)));
            }
            let rows = extent.height as usize;
            let needed = (rows - 1) * plane.pitch + plane.pitch.min(extent.row_bytes());
            if plane.data.len() < needed {
                return Err(Error::InvalidFrame(format!(
                    "plane {} holds {} bytes, needs {}",
                    index,
                    plane.data.len(),
                    needed
                )));
            }
        }

        for index in self.format.plane_count()..self.planes.len() {
            if self.planes[index].is_some() {
                return Err(Error::InvalidFrame(format!(
                    "{} frame carries unexpected plane {}",
                    self.format, index
                )));
            }
        }

        Ok(())
    }
}

/// Owned frame storage with per-plane pitch
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<Vec<u8>>,
    pub pitches: Vec<usize>,
}

impl FrameBuffer {
    /// Allocate a zeroed, tightly packed frame
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::with_padding(width, height, format, 0)
    }

    /// Allocate a zeroed frame whose rows carry `padding` extra bytes
    pub fn with_padding(width: u32, height: u32, format: PixelFormat, padding: usize) -> Self {
        let mut planes = Vec::with_capacity(format.plane_count());
        let mut pitches = Vec::with_capacity(format.plane_count());
        for index in 0..format.plane_count() {
            if let Some(extent) = plane::frame_plane_extent(format, index, width, height) {
                let pitch = extent.row_bytes() + padding;
                planes.push(vec![0u8; pitch * extent.height as usize]);
                pitches.push(pitch);
            }
        }
        Self {
            width,
            height,
            format,
            planes,
            pitches,
        }
    }

    /// Borrow as a frame descriptor
    pub fn as_frame(&self) -> PixelFrame<'_> {
        let mut planes = [None, None, None];
        for (slot, (data, pitch)) in planes.iter_mut().zip(self.planes.iter().zip(&self.pitches)) {
            *slot = Some(FramePlane::new(data, *pitch));
        }
        PixelFrame {
            width: self.width,
            height: self.height,
            format: self.format,
            planes,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Total bytes across all planes
    pub fn size_bytes(&self) -> usize {
        self.planes.iter().map(Vec::len).sum()
    }
}

/// How a hardware surface is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceHandle {
    /// Cross-process / cross-device shared handle
    Shared(u64),
    /// Texture registered with the backend's surface registry
    Registered(SurfaceId),
}

/// A frame that stays in GPU memory: a texture (array) owned by a decoder or
/// capture source. The renderer copies from it and never retains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareSurface {
    pub handle: SurfaceHandle,
    /// Slice of a texture array holding this frame
    pub array_index: u32,
    pub width: u32,
    pub height: u32,
    /// `Nv12` for decoder output, `Argb` for capture textures
    pub format: PixelFormat,
}

impl HardwareSurface {
    pub fn nv12(handle: SurfaceHandle, array_index: u32, width: u32, height: u32) -> Self {
        Self {
            handle,
            array_index,
            width,
            height,
            format: PixelFormat::Nv12,
        }
    }

    pub fn argb(handle: SurfaceHandle, width: u32, height: u32) -> Self {
        Self {
            handle,
            array_index: 0,
            width,
            height,
            format: PixelFormat::Argb,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Result of one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame reached the back buffer and was presented
    Presented,
    /// Frame was dropped; the renderer state is unchanged
    Dropped,
    /// Device was lost at present time and the renderer was rebuilt
    DeviceReset,
}

/// Statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    /// Frames presented
    pub frames_presented: u64,
    /// Frames dropped (invalid input, map failure, not initialized)
    pub frames_dropped: u64,
    /// Destroy + init cycles caused by device loss
    pub device_resets: u64,
    /// Input texture set rebuilds caused by format or size changes
    pub texture_reallocations: u64,
    /// Successful swap chain resizes
    pub resizes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_planes() {
        assert_eq!(PixelFormat::Argb.texture_planes(), &[PixelPlane::Argb]);
        assert_eq!(PixelFormat::Nv12.texture_planes(), &[PixelPlane::Nv12]);
        assert_eq!(
            PixelFormat::I420.texture_planes(),
            &[PixelPlane::Y, PixelPlane::U, PixelPlane::V]
        );
        assert!(PixelFormat::Unknown.texture_planes().is_empty());
    }

    #[test]
    fn test_enum_indices_are_dense() {
        for (i, plane) in PixelPlane::ALL.iter().enumerate() {
            assert_eq!(plane.index(), i);
        }
        for (i, shader) in PixelShader::ALL.iter().enumerate() {
            assert_eq!(shader.index(), i);
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("nv12".parse::<PixelFormat>().unwrap(), PixelFormat::Nv12);
        assert_eq!("I420".parse::<PixelFormat>().unwrap(), PixelFormat::I420);
        assert!("p010".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_frame_buffer_layout() {
        let buffer = FrameBuffer::new(5, 3, PixelFormat::I420);
        assert_eq!(buffer.pitches, vec![5, 3, 3]);
        assert_eq!(buffer.planes[0].len(), 15);
        assert_eq!(buffer.planes[1].len(), 6);

        let nv12 = FrameBuffer::new(5, 3, PixelFormat::Nv12);
        assert_eq!(nv12.pitches, vec![5, 6]);
        assert_eq!(nv12.planes[1].len(), 12);
    }

    #[test]
    fn test_validate_accepts_padded_frames() {
        let buffer = FrameBuffer::with_padding(64, 32, PixelFormat::I444, 17);
        assert!(buffer.as_frame().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_plane() {
        let data = vec![0u8; 10 * 4 * 9];
        let frame = PixelFrame::argb(10, 10, &data, 40);
        assert!(matches!(frame.validate(), Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_validate_rejects_missing_plane() {
        let y = vec![0u8; 16];
        let mut frame = PixelFrame::nv12(4, 4, FramePlane::new(&y, 4), FramePlane::new(&y, 4));
        frame.planes[1] = None;
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_tight_last_row() {
        // Last row only needs the visible bytes, not the full pitch
        let data = vec![0u8; 2 * 32 + 16];
        let frame = PixelFrame::argb(4, 3, &data, 32);
        assert!(frame.validate().is_ok());
    }
}
