//! Full-screen quad geometry and the per-pass vertex transform

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Quad rotation in multiples of 90 degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    None,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// True when the rotation swaps the horizontal and vertical axes
    pub fn is_transposing(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    fn sin_cos(&self) -> (f32, f32) {
        match self {
            Rotation::None => (0.0, 1.0),
            Rotation::Deg90 => (1.0, 0.0),
            Rotation::Deg180 => (0.0, -1.0),
            Rotation::Deg270 => (-1.0, 0.0),
        }
    }
}

/// Scale then rotate, applied to the quad in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: Rotation,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: Rotation::None,
    };

    /// Fit a `video` sized image into a `window` sized target without
    /// cropping: the relatively longer side fills the target and the other
    /// side is scaled down.
    pub fn aspect_fit(
        video_width: u32,
        video_height: u32,
        window_width: u32,
        window_height: u32,
        rotation: Rotation,
    ) -> Self {
        let mut transform = Self {
            rotation,
            ..Self::IDENTITY
        };
        if video_width == 0 || video_height == 0 || window_width == 0 || window_height == 0 {
            return transform;
        }

        let src_ratio = video_width as f64 / video_height as f64;
        let dst_ratio = if rotation.is_transposing() {
            window_height as f64 / window_width as f64
        } else {
            window_width as f64 / window_height as f64
        };

        if src_ratio > dst_ratio {
            transform.scale_y = (dst_ratio / src_ratio) as f32;
        } else if src_ratio < dst_ratio {
            transform.scale_x = (src_ratio / dst_ratio) as f32;
        }
        transform
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Row-major matrix for row vectors: `v * scale * rotation`
    pub fn matrix(&self) -> [[f32; 4]; 4] {
        let (s, c) = self.rotation.sin_cos();
        let (sx, sy) = (self.scale_x, self.scale_y);
        [
            [sx * c, sx * s, 0.0, 0.0],
            [-sy * s, sy * c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Map a quad-space point to device space
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let m = self.matrix();
        (x * m[0][0] + y * m[1][0], x * m[0][1] + y * m[1][1])
    }

    /// Map a device-space point back onto the quad
    pub fn invert(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if self.scale_x == 0.0 || self.scale_y == 0.0 {
            return None;
        }
        let (s, c) = self.rotation.sin_cos();
        // Undo the rotation, then the scale
        let rx = x * c + y * s;
        let ry = -x * s + y * c;
        Some((rx / self.scale_x, ry / self.scale_y))
    }
}

/// One quad vertex: position, texture coordinate, color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub color: [f32; 4],
}

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Full-screen quad, top-left first, clockwise
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-1.0, 1.0, 0.0], texcoord: [0.0, 0.0], color: WHITE },
    Vertex { position: [1.0, 1.0, 0.0], texcoord: [1.0, 0.0], color: WHITE },
    Vertex { position: [1.0, -1.0, 0.0], texcoord: [1.0, 1.0], color: WHITE },
    Vertex { position: [-1.0, -1.0, 0.0], texcoord: [0.0, 1.0], color: WHITE },
];

/// Two triangles over [`QUAD_VERTICES`]
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Vertex shader constant buffer (matrices stored transposed for HLSL)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexConstants {
    pub world: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

const IDENTITY_MATRIX: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl VertexConstants {
    pub fn new(transform: &Transform) -> Self {
        Self {
            world: IDENTITY_MATRIX,
            view: transpose(transform.matrix()),
            projection: IDENTITY_MATRIX,
        }
    }
}

impl Default for VertexConstants {
    fn default() -> Self {
        Self::new(&Transform::IDENTITY)
    }
}

fn transpose(m: [[f32; 4]; 4]) -> [[f32; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for (r, row) in m.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            out[c][r] = *value;
        }
    }
    out
}

/// Pixel shader constants: `{width, height, param, pad}`.
///
/// The sharpen pass puts the unsharp amount in `param`; the converters
/// leave it zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ShaderConstants {
    pub width: f32,
    pub height: f32,
    pub param: f32,
    pub pad: f32,
}

impl ShaderConstants {
    pub fn new(width: u32, height: u32, param: f32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            param,
            pad: 0.0,
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.width, self.height, self.param, self.pad]
    }
}

/// Map pixel centers of a `width` x `height` target into device space
pub fn pixel_to_device(x: u32, y: u32, width: u32, height: u32) -> (f32, f32) {
    let nx = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
    let ny = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;
    (nx, ny)
}

/// Texture coordinate of a quad-space point, `None` outside the quad
pub fn quad_texcoord(qx: f32, qy: f32) -> Option<(f32, f32)> {
    if !(-1.0..=1.0).contains(&qx) || !(-1.0..=1.0).contains(&qy) {
        return None;
    }
    Some(((qx + 1.0) * 0.5, (1.0 - qy) * 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_same_ratio_is_identity() {
        let t = Transform::aspect_fit(640, 480, 1024, 768, Rotation::None);
        assert!(t.is_identity());
    }

    #[test]
    fn test_wide_video_shrinks_height() {
        let t = Transform::aspect_fit(1920, 1080, 800, 600, Rotation::None);
        assert!(approx(t.scale_x, 1.0));
        assert!(approx(t.scale_y, (4.0 / 3.0) / (16.0 / 9.0)));
    }

    #[test]
    fn test_tall_video_shrinks_width() {
        let t = Transform::aspect_fit(480, 640, 800, 600, Rotation::None);
        assert!(approx(t.scale_y, 1.0));
        assert!(approx(t.scale_x, 0.75 / (4.0 / 3.0)));
    }

    #[test]
    fn test_rotation_inverts_window_ratio() {
        let t = Transform::aspect_fit(1600, 900, 1600, 900, Rotation::Deg90);
        assert!(approx(t.scale_x, 1.0));
        assert!(approx(t.scale_y, (900.0 / 1600.0) / (1600.0 / 900.0)));
        // After rotating, the quad spans the full window height
        let (x, y) = t.apply(1.0, 1.0);
        assert!(approx(y.abs(), 1.0));
        assert!(x.abs() < 1.0);
    }

    #[test]
    fn test_invert_round_trip() {
        let t = Transform {
            scale_x: 0.5,
            scale_y: 0.8,
            rotation: Rotation::Deg270,
        };
        let (dx, dy) = t.apply(0.3, -0.7);
        let (qx, qy) = t.invert(dx, dy).unwrap();
        assert!(approx(qx, 0.3) && approx(qy, -0.7));
    }

    #[test]
    fn test_quad_texcoord_corners() {
        assert_eq!(quad_texcoord(-1.0, 1.0), Some((0.0, 0.0)));
        assert_eq!(quad_texcoord(1.0, -1.0), Some((1.0, 1.0)));
        assert_eq!(quad_texcoord(1.01, 0.0), None);
        assert_eq!(QUAD_INDICES.len(), 6);
    }
}
