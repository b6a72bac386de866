//! Render-to-texture pass on D3D9 with a pre-transformed triangle fan

use super::texture::{D3d9Texture, D3d9View};
use super::{device_error, warn_on_failure, D3d9Backend, D3d9Buffer, D3d9Sampler};
use crate::error::{Error, Result};
use crate::render::{RenderTexture, SamplerKind, TextureDesc};
use crate::transform::{Transform, QUAD_VERTICES};
use crate::types::ShaderProgram;
use bytemuck::{Pod, Zeroable};
use windows::Win32::Graphics::Direct3D9::{
    IDirect3DDevice9, IDirect3DPixelShader9, IDirect3DSurface9, IDirect3DVertexBuffer9,
    IDirect3DVertexShader9, D3DCLEAR_TARGET, D3DFVF_DIFFUSE, D3DFVF_TEX1, D3DFVF_XYZRHW,
    D3DLOCK_DISCARD, D3DPOOL_DEFAULT, D3DPT_TRIANGLEFAN, D3DSAMP_ADDRESSU, D3DSAMP_ADDRESSV,
    D3DSAMP_MAGFILTER, D3DSAMP_MINFILTER, D3DTADDRESS_CLAMP, D3DTEXF_LINEAR, D3DTEXF_POINT,
    D3DUSAGE_DYNAMIC, D3DUSAGE_WRITEONLY,
};

pub(crate) const FVF: u32 = D3DFVF_XYZRHW as u32 | D3DFVF_DIFFUSE as u32 | D3DFVF_TEX1 as u32;

const OPAQUE_BLACK: u32 = 0xff00_0000;
const WHITE: u32 = 0xffff_ffff;

/// Screen-space vertex matching [`FVF`]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FanVertex {
    x: f32,
    y: f32,
    z: f32,
    rhw: f32,
    color: u32,
    u: f32,
    v: f32,
}

/// Quad corners in target pixels. The half-pixel shift maps texel centers
/// onto pixel centers.
fn fan_vertices(transform: &Transform, width: u32, height: u32) -> [FanVertex; 4] {
    let (w, h) = (width as f32, height as f32);
    QUAD_VERTICES.map(|vertex| {
        let (dx, dy) = transform.apply(vertex.position[0], vertex.position[1]);
        FanVertex {
            x: (dx + 1.0) * 0.5 * w - 0.5,
            y: (1.0 - dy) * 0.5 * h - 0.5,
            z: 0.0,
            rhw: 1.0,
            color: WHITE,
            u: vertex.texcoord[0],
            v: vertex.texcoord[1],
        }
    })
}

/// One shader pass into an owned render-target texture
pub struct D3d9RenderTexture {
    device: IDirect3DDevice9,
    texture: D3d9Texture,
    vertex_buffer: IDirect3DVertexBuffer9,
    pixel_shader: Option<IDirect3DPixelShader9>,
    program: ShaderProgram,
    transform: Transform,
    cached: Option<Option<IDirect3DSurface9>>,
}

unsafe impl Send for D3d9RenderTexture {}

impl D3d9RenderTexture {
    pub(crate) fn new(
        device: IDirect3DDevice9,
        texture: D3d9Texture,
        pixel_shader: Option<IDirect3DPixelShader9>,
        program: ShaderProgram,
    ) -> Result<Self> {
        let size = std::mem::size_of::<[FanVertex; 4]>() as u32;
        let mut vertex_buffer = None;
        unsafe {
            device.CreateVertexBuffer(
                size,
                D3DUSAGE_DYNAMIC as u32 | D3DUSAGE_WRITEONLY as u32,
                FVF,
                D3DPOOL_DEFAULT,
                &mut vertex_buffer,
                std::ptr::null_mut(),
            )
        }
        .map_err(|e| device_error(e, "CreateVertexBuffer"))?;
        let vertex_buffer =
            vertex_buffer.ok_or_else(|| Error::Internal("CreateVertexBuffer returned nothing".into()))?;

        Ok(Self {
            device,
            texture,
            vertex_buffer,
            pixel_shader,
            program,
            transform: Transform::IDENTITY,
            cached: None,
        })
    }

    fn write_vertices(&self) -> Result<()> {
        let vertices = fan_vertices(&self.transform, self.texture.desc.width, self.texture.desc.height);
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let mut data = std::ptr::null_mut();
        unsafe {
            self.vertex_buffer
                .Lock(0, bytes.len() as u32, &mut data, D3DLOCK_DISCARD as u32)
                .map_err(|e| device_error(e, "IDirect3DVertexBuffer9::Lock"))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.cast::<u8>(), bytes.len());
            self.vertex_buffer
                .Unlock()
                .map_err(|e| device_error(e, "IDirect3DVertexBuffer9::Unlock"))
        }
    }
}

impl RenderTexture<D3d9Backend> for D3d9RenderTexture {
    fn desc(&self) -> &TextureDesc {
        &self.texture.desc
    }

    fn texture(&self) -> &D3d9Texture {
        &self.texture
    }

    fn set_transform(&mut self, transform: &Transform) {
        self.transform = *transform;
    }

    fn begin(&mut self) -> Result<()> {
        let pixel_shader = self
            .pixel_shader
            .clone()
            .ok_or_else(|| Error::ShaderMissing(self.program.to_string()))?;
        self.write_vertices()?;

        if self.cached.is_none() {
            self.cached = Some(unsafe { self.device.GetRenderTarget(0) }.ok());
        }
        unsafe {
            self.device
                .SetRenderTarget(0, &self.texture.surface)
                .map_err(|e| device_error(e, "SetRenderTarget"))?;
            self.device
                .Clear(0, std::ptr::null(), D3DCLEAR_TARGET as u32, OPAQUE_BLACK, 1.0, 0)
                .map_err(|e| device_error(e, "Clear"))?;
            self.device.SetFVF(FVF).map_err(|e| device_error(e, "SetFVF"))?;
            self.device
                .SetStreamSource(0, &self.vertex_buffer, 0, std::mem::size_of::<FanVertex>() as u32)
                .map_err(|e| device_error(e, "SetStreamSource"))?;
            self.device
                .SetVertexShader(None::<&IDirect3DVertexShader9>)
                .map_err(|e| device_error(e, "SetVertexShader"))?;
            self.device
                .SetPixelShader(&pixel_shader)
                .map_err(|e| device_error(e, "SetPixelShader"))?;
        }
        Ok(())
    }

    fn ps_set_texture(&mut self, slot: u32, view: Option<&D3d9View>) {
        let bound = unsafe { self.device.SetTexture(slot, view.map(|v| &v.0)) };
        warn_on_failure(bound, "SetTexture");
    }

    /// Registers `3 * slot` onwards hold width, height and the pass
    /// parameter in their x component
    fn ps_set_constant(&mut self, slot: u32, buffer: Option<&D3d9Buffer>) {
        let Some(buffer) = buffer else {
            return;
        };
        let c = buffer.0;
        let registers = [
            [c.width, 0.0, 0.0, 0.0],
            [c.height, 0.0, 0.0, 0.0],
            [c.param, 0.0, 0.0, 0.0],
        ];
        let set = unsafe {
            self.device
                .SetPixelShaderConstantF(slot * 3, registers.as_ptr().cast(), registers.len() as u32)
        };
        warn_on_failure(set, "SetPixelShaderConstantF");
    }

    fn ps_set_samplers(&mut self, slot: u32, sampler: Option<&D3d9Sampler>) {
        let filter = match sampler.map(|s| s.0) {
            Some(SamplerKind::Linear) => D3DTEXF_LINEAR,
            Some(SamplerKind::Point) | None => D3DTEXF_POINT,
        };
        let states = [
            (D3DSAMP_MINFILTER, filter.0 as u32),
            (D3DSAMP_MAGFILTER, filter.0 as u32),
            (D3DSAMP_ADDRESSU, D3DTADDRESS_CLAMP.0 as u32),
            (D3DSAMP_ADDRESSV, D3DTADDRESS_CLAMP.0 as u32),
        ];
        for (state, value) in states {
            let set = unsafe { self.device.SetSamplerState(slot, state, value) };
            if !warn_on_failure(set, "SetSamplerState") {
                break;
            }
        }
    }

    fn draw(&mut self) -> Result<()> {
        if !self.is_drawing() {
            return Ok(());
        }
        unsafe { self.device.DrawPrimitive(D3DPT_TRIANGLEFAN, 0, 2) }.map_err(|e| device_error(e, "DrawPrimitive"))
    }

    fn end(&mut self) {
        if let Some(cached) = self.cached.take() {
            if let Some(surface) = cached {
                let restored = unsafe { self.device.SetRenderTarget(0, &surface) };
                warn_on_failure(restored, "SetRenderTarget");
            }
        }
    }

    fn is_drawing(&self) -> bool {
        self.cached.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Rotation;

    #[test]
    fn test_fan_covers_target() {
        let v = fan_vertices(&Transform::IDENTITY, 800, 600);
        assert_eq!((v[0].x, v[0].y), (-0.5, -0.5));
        assert_eq!((v[2].x, v[2].y), (799.5, 599.5));
        assert_eq!((v[1].u, v[1].v), (1.0, 0.0));
    }

    #[test]
    fn test_fan_letterbox() {
        let t = Transform {
            scale_x: 1.0,
            scale_y: 0.5,
            rotation: Rotation::None,
        };
        let v = fan_vertices(&t, 100, 100);
        assert_eq!(v[0].y, 24.5);
        assert_eq!(v[3].y, 74.5);
    }
}
