//! D3D11 textures and shader resource views

use super::device_error;
use crate::error::{Error, Result};
use crate::plane::TextureFormat;
use crate::render::{TextureDesc, TextureUsage, ViewKind};
use windows::Win32::Graphics::Direct3D::{D3D11_SRV_DIMENSION_TEXTURE2D, D3D11_SRV_DIMENSION_TEXTURE2DARRAY};
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Device, ID3D11RenderTargetView, ID3D11ShaderResourceView, ID3D11Texture2D,
    D3D11_BIND_RENDER_TARGET, D3D11_BIND_SHADER_RESOURCE, D3D11_CPU_ACCESS_WRITE,
    D3D11_RENDER_TARGET_VIEW_DESC, D3D11_RENDER_TARGET_VIEW_DESC_0, D3D11_RTV_DIMENSION_TEXTURE2D,
    D3D11_SHADER_RESOURCE_VIEW_DESC, D3D11_SHADER_RESOURCE_VIEW_DESC_0, D3D11_TEX2D_ARRAY_SRV,
    D3D11_TEX2D_RTV, D3D11_TEX2D_SRV, D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT,
    D3D11_USAGE_DYNAMIC,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_NV12, DXGI_FORMAT_R8G8B8A8_UNORM,
    DXGI_FORMAT_R8G8_UNORM, DXGI_FORMAT_R8_UNORM, DXGI_SAMPLE_DESC,
};

pub(crate) fn dxgi_format(format: TextureFormat) -> DXGI_FORMAT {
    match format {
        TextureFormat::R8 => DXGI_FORMAT_R8_UNORM,
        TextureFormat::Bgra8 => DXGI_FORMAT_B8G8R8A8_UNORM,
        TextureFormat::Rgba8 => DXGI_FORMAT_R8G8B8A8_UNORM,
        TextureFormat::Nv12 => DXGI_FORMAT_NV12,
    }
}

/// Format a view of `kind` reads the texture as
fn view_format(format: TextureFormat, kind: ViewKind) -> Result<DXGI_FORMAT> {
    match (format, kind) {
        (TextureFormat::Nv12, ViewKind::Luma) => Ok(DXGI_FORMAT_R8_UNORM),
        (TextureFormat::Nv12, ViewKind::Chroma) => Ok(DXGI_FORMAT_R8G8_UNORM),
        (TextureFormat::Nv12, ViewKind::Full) => Err(Error::UnsupportedFormat("full view of NV12".into())),
        (other, ViewKind::Full) => Ok(dxgi_format(other)),
        (other, kind) => Err(Error::UnsupportedFormat(format!("{:?} view of {:?}", kind, other))),
    }
}

/// Shader resource view
#[derive(Clone)]
pub struct D3d11View(pub(crate) ID3D11ShaderResourceView);

// COM pointers are free-threaded here: the device is multithread protected
unsafe impl Send for D3d11View {}

/// Foreign texture (array) registered with a [`super::D3d11Adapter`]
#[derive(Clone)]
pub struct D3d11Surface(pub ID3D11Texture2D);

unsafe impl Send for D3d11Surface {}
unsafe impl Sync for D3d11Surface {}

/// A 2D texture plus the views created with it
pub struct D3d11Texture {
    pub(crate) texture: ID3D11Texture2D,
    pub(crate) desc: TextureDesc,
    full: Option<D3d11View>,
    luma: Option<D3d11View>,
    chroma: Option<D3d11View>,
}

unsafe impl Send for D3d11Texture {}

impl D3d11Texture {
    pub(crate) fn create(device: &ID3D11Device, desc: &TextureDesc) -> Result<Self> {
        let (usage, cpu_access, bind) = match desc.usage {
            TextureUsage::Dynamic => (
                D3D11_USAGE_DYNAMIC,
                D3D11_CPU_ACCESS_WRITE.0 as u32,
                D3D11_BIND_SHADER_RESOURCE.0 as u32,
            ),
            TextureUsage::Default => (D3D11_USAGE_DEFAULT, 0, D3D11_BIND_SHADER_RESOURCE.0 as u32),
            TextureUsage::RenderTarget => (
                D3D11_USAGE_DEFAULT,
                0,
                (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
            ),
        };

        let texture_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.width,
            Height: desc.height,
            MipLevels: 1,
            ArraySize: desc.array_size,
            Format: dxgi_format(desc.format),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: usage,
            BindFlags: bind,
            CPUAccessFlags: cpu_access,
            MiscFlags: 0,
        };

        let mut texture = None;
        unsafe { device.CreateTexture2D(&texture_desc, None, Some(&mut texture)) }.map_err(|e| {
            Error::TextureCreation(format!(
                "CreateTexture2D({}x{} {:?}) failed: {}",
                desc.width, desc.height, desc.format, e
            ))
        })?;
        let texture = texture.ok_or_else(|| Error::TextureCreation("CreateTexture2D returned nothing".into()))?;

        let mut created = Self {
            texture,
            desc: *desc,
            full: None,
            luma: None,
            chroma: None,
        };
        if desc.format == TextureFormat::Nv12 {
            created.luma = Some(created.view(device, ViewKind::Luma, 0)?);
            created.chroma = Some(created.view(device, ViewKind::Chroma, 0)?);
        } else {
            created.full = Some(created.view(device, ViewKind::Full, 0)?);
        }
        Ok(created)
    }

    pub fn raw(&self) -> &ID3D11Texture2D {
        &self.texture
    }

    pub(crate) fn view_of(&self, kind: ViewKind) -> Option<D3d11View> {
        match kind {
            ViewKind::Full => self.full.clone(),
            ViewKind::Luma => self.luma.clone(),
            ViewKind::Chroma => self.chroma.clone(),
        }
    }

    /// Shader resource view over one array slice
    pub(crate) fn view(&self, device: &ID3D11Device, kind: ViewKind, slice: u32) -> Result<D3d11View> {
        if slice >= self.desc.array_size {
            return Err(Error::Surface(format!(
                "array slice {} out of {}",
                slice, self.desc.array_size
            )));
        }

        let format = view_format(self.desc.format, kind)?;
        let srv_desc = if self.desc.array_size > 1 {
            D3D11_SHADER_RESOURCE_VIEW_DESC {
                Format: format,
                ViewDimension: D3D11_SRV_DIMENSION_TEXTURE2DARRAY,
                Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture2DArray: D3D11_TEX2D_ARRAY_SRV {
                        MostDetailedMip: 0,
                        MipLevels: 1,
                        FirstArraySlice: slice,
                        ArraySize: 1,
                    },
                },
            }
        } else {
            D3D11_SHADER_RESOURCE_VIEW_DESC {
                Format: format,
                ViewDimension: D3D11_SRV_DIMENSION_TEXTURE2D,
                Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture2D: D3D11_TEX2D_SRV {
                        MostDetailedMip: 0,
                        MipLevels: 1,
                    },
                },
            }
        };

        let mut view = None;
        unsafe { device.CreateShaderResourceView(&self.texture, Some(&srv_desc), Some(&mut view)) }
            .map_err(|e| device_error(e, "CreateShaderResourceView"))?;
        view.map(D3d11View)
            .ok_or_else(|| Error::TextureCreation("CreateShaderResourceView returned nothing".into()))
    }

    /// Render target views: one for color textures, luma + chroma for NV12
    pub(crate) fn render_target_views(&self, device: &ID3D11Device) -> Result<Vec<ID3D11RenderTargetView>> {
        let formats: &[DXGI_FORMAT] = match self.desc.format {
            TextureFormat::Nv12 => &[DXGI_FORMAT_R8_UNORM, DXGI_FORMAT_R8G8_UNORM],
            other => &[dxgi_format(other)],
        };

        formats
            .iter()
            .map(|format| {
                let rtv_desc = D3D11_RENDER_TARGET_VIEW_DESC {
                    Format: *format,
                    ViewDimension: D3D11_RTV_DIMENSION_TEXTURE2D,
                    Anonymous: D3D11_RENDER_TARGET_VIEW_DESC_0 {
                        Texture2D: D3D11_TEX2D_RTV { MipSlice: 0 },
                    },
                };
                let mut rtv = None;
                unsafe { device.CreateRenderTargetView(&self.texture, Some(&rtv_desc), Some(&mut rtv)) }
                    .map_err(|e| device_error(e, "CreateRenderTargetView"))?;
                rtv.ok_or_else(|| Error::TextureCreation("CreateRenderTargetView returned nothing".into()))
            })
            .collect()
    }
}
