//! D3D9 textures and plain surfaces

use super::device_error;
use crate::error::{Error, Result};
use crate::plane::TextureFormat;
use crate::render::{TextureDesc, TextureUsage};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D9::{
    IDirect3D9, IDirect3DBaseTexture9, IDirect3DDevice9, IDirect3DSurface9, IDirect3DTexture9,
    D3DADAPTER_DEFAULT, D3DDEVTYPE_HAL, D3DFMT_A8B8G8R8, D3DFMT_L8, D3DFMT_X8R8G8B8, D3DFORMAT,
    D3DPOOL_DEFAULT, D3DRTYPE_SURFACE, D3DUSAGE_DYNAMIC, D3DUSAGE_RENDERTARGET,
};

/// FOURCC surface format accepted by `StretchRect` for YUV to RGB
pub(crate) const D3DFMT_NV12: D3DFORMAT = D3DFORMAT(u32::from_le_bytes(*b"NV12"));

pub(crate) fn d3d9_format(format: TextureFormat) -> D3DFORMAT {
    match format {
        TextureFormat::R8 => D3DFMT_L8,
        TextureFormat::Bgra8 => D3DFMT_X8R8G8B8,
        TextureFormat::Rgba8 => D3DFMT_A8B8G8R8,
        TextureFormat::Nv12 => D3DFMT_NV12,
    }
}

/// Whether the adapter can blit NV12 into the back buffer format
pub(crate) fn supports_nv12(d3d9: &IDirect3D9) -> bool {
    unsafe {
        d3d9.CheckDeviceFormat(
            D3DADAPTER_DEFAULT,
            D3DDEVTYPE_HAL,
            D3DFMT_X8R8G8B8,
            0,
            D3DRTYPE_SURFACE,
            D3DFMT_NV12,
        )
    }
    .is_ok()
}

/// Sampleable texture
#[derive(Clone)]
pub struct D3d9View(pub(crate) IDirect3DBaseTexture9);

// D3D9 devices here are created with D3DCREATE_MULTITHREADED
unsafe impl Send for D3d9View {}

/// Decoder or capture surface registered with a [`super::D3d9Adapter`]
#[derive(Clone)]
pub struct D3d9Surface(pub IDirect3DSurface9);

unsafe impl Send for D3d9Surface {}
unsafe impl Sync for D3d9Surface {}

/// A texture and its top-level surface, or a plain surface for NV12
pub struct D3d9Texture {
    pub(crate) texture: Option<IDirect3DTexture9>,
    pub(crate) surface: IDirect3DSurface9,
    pub(crate) desc: TextureDesc,
    view: Option<D3d9View>,
}

unsafe impl Send for D3d9Texture {}

impl D3d9Texture {
    pub(crate) fn create(device: &IDirect3DDevice9, d3d9: &IDirect3D9, desc: &TextureDesc) -> Result<Self> {
        if desc.array_size > 1 {
            return Err(Error::UnsupportedFormat("texture arrays on Direct3D 9".into()));
        }
        let format = d3d9_format(desc.format);

        if desc.format == TextureFormat::Nv12 {
            if !supports_nv12(d3d9) {
                return Err(Error::UnsupportedFormat("NV12 to RGB conversion".into()));
            }
            let mut surface = None;
            unsafe {
                device.CreateOffscreenPlainSurface(
                    desc.width,
                    desc.height,
                    format,
                    D3DPOOL_DEFAULT,
                    &mut surface,
                    std::ptr::null_mut(),
                )
            }
            .map_err(|e| texture_error(e, desc))?;
            let surface = surface.ok_or_else(|| Error::TextureCreation("no NV12 surface".into()))?;
            return Ok(Self {
                texture: None,
                surface,
                desc: *desc,
                view: None,
            });
        }

        // Copy destinations must be render targets in D3D9
        let usage = match desc.usage {
            TextureUsage::Dynamic => D3DUSAGE_DYNAMIC as u32,
            TextureUsage::Default | TextureUsage::RenderTarget => D3DUSAGE_RENDERTARGET as u32,
        };
        let mut texture = None;
        unsafe {
            device.CreateTexture(
                desc.width,
                desc.height,
                1,
                usage,
                format,
                D3DPOOL_DEFAULT,
                &mut texture,
                std::ptr::null_mut(),
            )
        }
        .map_err(|e| texture_error(e, desc))?;
        let texture: IDirect3DTexture9 =
            texture.ok_or_else(|| Error::TextureCreation("CreateTexture returned nothing".into()))?;
        let surface = unsafe { texture.GetSurfaceLevel(0) }.map_err(|e| device_error(e, "GetSurfaceLevel"))?;
        let view = texture.cast::<IDirect3DBaseTexture9>()?;

        Ok(Self {
            texture: Some(texture),
            surface,
            desc: *desc,
            view: Some(D3d9View(view)),
        })
    }

    pub fn surface(&self) -> &IDirect3DSurface9 {
        &self.surface
    }

    /// NV12 plain surfaces cannot be sampled
    pub(crate) fn view(&self) -> Option<D3d9View> {
        self.view.clone()
    }
}

fn texture_error(e: windows::core::Error, desc: &TextureDesc) -> Error {
    match device_error(e, "create texture") {
        Error::Internal(msg) => Error::TextureCreation(format!(
            "{}x{} {:?}: {}",
            desc.width, desc.height, desc.format, msg
        )),
        other => other,
    }
}
