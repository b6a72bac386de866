//! Direct3D 9 backend
//!
//! Fixed-function vertex stage, pixel shaders per pass, and `StretchRect`
//! for everything the hardware converts on its own: packed ARGB goes to the
//! back buffer as-is and NV12 is converted by a device blit.

mod target;
mod texture;

pub use target::D3d9RenderTexture;
pub use texture::{D3d9Surface, D3d9Texture, D3d9View};

use crate::backend::BackendKind;
use crate::color::ColorMatrix;
use crate::error::{Error, Result};
use crate::plane::{MappedTexture, TextureFormat};
use crate::render::{Backend, ConversionPath, SamplerKind, TextureDesc, TextureUsage, ViewKind};
use crate::shader::ShaderLibrary;
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::transform::ShaderConstants;
use crate::types::{HardwareSurface, PixelFormat, Resolution, ShaderProgram, SurfaceHandle};
use crate::window::{hwnd_of, RenderWindow};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Direct3D9::{
    Direct3DCreate9, IDirect3D9, IDirect3DDevice9, IDirect3DPixelShader9, IDirect3DSurface9,
    D3DADAPTER_DEFAULT, D3DBACKBUFFER_TYPE_MONO, D3DCAPS9, D3DCLEAR_TARGET, D3DCREATE_HARDWARE_VERTEXPROCESSING,
    D3DCREATE_MULTITHREADED, D3DCREATE_SOFTWARE_VERTEXPROCESSING, D3DCULL_NONE, D3DDEVCAPS_HWTRANSFORMANDLIGHT,
    D3DDEVTYPE_HAL, D3DERR_DEVICELOST, D3DERR_DEVICENOTRESET, D3DFMT_X8R8G8B8, D3DLOCKED_RECT,
    D3DLOCK_DISCARD, D3DMULTISAMPLE_NONE, D3DPRESENTFLAG_VIDEO, D3DPRESENT_PARAMETERS, D3DRS_ALPHABLENDENABLE,
    D3DRS_CULLMODE, D3DRS_LIGHTING, D3DRS_ZENABLE, D3DSWAPEFFECT_COPY, D3DTEXF_LINEAR, D3DTEXF_NONE,
    D3DZB_FALSE, D3D_SDK_VERSION,
};
use windows::Win32::Graphics::Gdi::RGNDATA;

const OPAQUE_BLACK: u32 = 0xff00_0000;

/// Map a failed call; a lost device becomes [`Error::DeviceLost`]
pub(crate) fn device_error(e: windows::core::Error, what: &str) -> Error {
    let code = e.code();
    if code == D3DERR_DEVICELOST || code == D3DERR_DEVICENOTRESET {
        Error::DeviceLost(format!("{}: {}", what, e))
    } else {
        Error::Internal(format!("{} failed: {}", what, e))
    }
}

/// Log a failed call the frame can survive; returns whether it succeeded
pub(crate) fn warn_on_failure(result: windows::core::Result<()>, what: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{} failed: {}", what, e);
            false
        }
    }
}

/// Windowed copy-effect swap chain without a depth buffer
fn present_parameters(hwnd: HWND, size: Resolution) -> D3DPRESENT_PARAMETERS {
    D3DPRESENT_PARAMETERS {
        BackBufferWidth: size.width,
        BackBufferHeight: size.height,
        BackBufferFormat: D3DFMT_X8R8G8B8,
        BackBufferCount: 1,
        MultiSampleType: D3DMULTISAMPLE_NONE,
        MultiSampleQuality: 0,
        SwapEffect: D3DSWAPEFFECT_COPY,
        hDeviceWindow: hwnd,
        Windowed: true.into(),
        EnableAutoDepthStencil: false.into(),
        Flags: D3DPRESENTFLAG_VIDEO as u32,
        FullScreen_RefreshRateInHz: 0,
        PresentationInterval: 0,
        ..Default::default()
    }
}

/// Creation context for D3D9 devices
#[derive(Clone, Default)]
pub struct D3d9Adapter {
    registry: Arc<SurfaceRegistry<D3d9Surface>>,
}

impl D3d9Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SurfaceRegistry<D3d9Surface> {
        &self.registry
    }

    /// Register a DXVA2 decoder surface
    pub fn register_surface(&self, surface: IDirect3DSurface9) -> SurfaceId {
        self.registry.register(D3d9Surface(surface))
    }
}

/// Sampler state applied to a texture stage
#[derive(Debug, Clone, Copy)]
pub struct D3d9Sampler(pub(crate) SamplerKind);

/// Shader constants, uploaded to registers when bound
#[derive(Debug, Clone, Copy, Default)]
pub struct D3d9Buffer(pub(crate) ShaderConstants);

pub struct D3d9Backend {
    d3d9: IDirect3D9,
    device: IDirect3DDevice9,
    params: D3DPRESENT_PARAMETERS,
    back_buffer: Option<IDirect3DSurface9>,
    size: Resolution,
    in_scene: bool,
    pixel_shaders: HashMap<ShaderProgram, IDirect3DPixelShader9>,
    shaders: Arc<ShaderLibrary>,
    adapter: D3d9Adapter,
}

// Created with D3DCREATE_MULTITHREADED; the renderer serializes access
unsafe impl Send for D3d9Backend {}

impl D3d9Backend {
    fn create_device(d3d9: &IDirect3D9, hwnd: HWND, params: &mut D3DPRESENT_PARAMETERS) -> Result<IDirect3DDevice9> {
        let mut caps = D3DCAPS9::default();
        unsafe { d3d9.GetDeviceCaps(D3DADAPTER_DEFAULT, D3DDEVTYPE_HAL, &mut caps) }
            .map_err(|e| Error::DeviceCreation(format!("GetDeviceCaps failed: {}", e)))?;

        let vertex_processing = if caps.DevCaps & D3DDEVCAPS_HWTRANSFORMANDLIGHT as u32 != 0 {
            D3DCREATE_HARDWARE_VERTEXPROCESSING as u32
        } else {
            D3DCREATE_SOFTWARE_VERTEXPROCESSING as u32
        };

        let mut device = None;
        let first = unsafe {
            d3d9.CreateDevice(
                D3DADAPTER_DEFAULT,
                D3DDEVTYPE_HAL,
                hwnd,
                D3DCREATE_MULTITHREADED as u32 | vertex_processing,
                params,
                &mut device,
            )
        };
        if let Err(e) = first {
            debug!("CreateDevice failed ({}), retrying with software vertex processing", e);
            unsafe {
                d3d9.CreateDevice(
                    D3DADAPTER_DEFAULT,
                    D3DDEVTYPE_HAL,
                    hwnd,
                    D3DCREATE_MULTITHREADED as u32 | D3DCREATE_SOFTWARE_VERTEXPROCESSING as u32,
                    params,
                    &mut device,
                )
            }
            .map_err(|e| Error::DeviceCreation(format!("CreateDevice failed: {}", e)))?;
        }
        device.ok_or_else(|| Error::DeviceCreation("CreateDevice returned no device".into()))
    }

    fn pixel_shader(&mut self, program: ShaderProgram) -> Result<Option<IDirect3DPixelShader9>> {
        if let Some(shader) = self.pixel_shaders.get(&program) {
            return Ok(Some(shader.clone()));
        }
        // ARGB and NV12 never run a shader here
        let Ok(bytecode) = self.shaders.program(program) else {
            debug!("No Direct3D 9 bytecode for {}", program);
            return Ok(None);
        };
        if bytecode.len() % 4 != 0 {
            return Err(Error::ShaderCreation(format!("{} is not DWORD aligned", program)));
        }
        let tokens: Vec<u32> = bytecode
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let shader = unsafe { self.device.CreatePixelShader(tokens.as_ptr()) }
            .map_err(|e| Error::ShaderCreation(format!("{}: {}", program, e)))?;
        self.pixel_shaders.insert(program, shader.clone());
        Ok(Some(shader))
    }

    fn back_buffer(&mut self) -> Result<IDirect3DSurface9> {
        if let Some(surface) = &self.back_buffer {
            return Ok(surface.clone());
        }
        let surface = unsafe { self.device.GetBackBuffer(0, 0, D3DBACKBUFFER_TYPE_MONO) }
            .map_err(|e| device_error(e, "GetBackBuffer"))?;
        self.back_buffer = Some(surface.clone());
        Ok(surface)
    }

    fn end_scene(&mut self) -> Result<()> {
        if !std::mem::take(&mut self.in_scene) {
            return Ok(());
        }
        unsafe { self.device.EndScene() }.map_err(|e| device_error(e, "EndScene"))
    }
}

impl Backend for D3d9Backend {
    type Adapter = D3d9Adapter;
    type Texture = D3d9Texture;
    type View = D3d9View;
    type Sampler = D3d9Sampler;
    type Buffer = D3d9Buffer;
    type Target = D3d9RenderTexture;

    const KIND: BackendKind = BackendKind::D3d9;

    fn create(adapter: &D3d9Adapter, window: &dyn RenderWindow, shaders: Arc<ShaderLibrary>) -> Result<Self> {
        let hwnd = hwnd_of(window)?;
        let size = window.client_size()?;
        if size.is_empty() {
            return Err(Error::SwapChain(format!("client area is {}", size)));
        }

        let d3d9 = unsafe { Direct3DCreate9(D3D_SDK_VERSION) }
            .ok_or_else(|| Error::DeviceCreation("Direct3DCreate9 failed".into()))?;

        let mut params = present_parameters(hwnd, size);
        let device = Self::create_device(&d3d9, hwnd, &mut params)?;
        info!("Direct3D 9 device ready ({})", size);

        Ok(Self {
            d3d9,
            device,
            params,
            back_buffer: None,
            size,
            in_scene: false,
            pixel_shaders: HashMap::new(),
            shaders,
            adapter: adapter.clone(),
        })
    }

    fn back_buffer_size(&self) -> Resolution {
        self.size
    }

    fn back_buffer_format(&self) -> TextureFormat {
        TextureFormat::Bgra8
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<D3d9Texture> {
        D3d9Texture::create(&self.device, &self.d3d9, desc)
    }

    fn create_render_target(&mut self, desc: &TextureDesc, program: ShaderProgram) -> Result<D3d9RenderTexture> {
        let texture = self.create_texture(&TextureDesc {
            usage: TextureUsage::RenderTarget,
            ..*desc
        })?;
        let pixel_shader = self.pixel_shader(program)?;
        D3d9RenderTexture::new(self.device.clone(), texture, pixel_shader, program)
    }

    fn create_sampler(&mut self, kind: SamplerKind) -> Result<D3d9Sampler> {
        Ok(D3d9Sampler(kind))
    }

    fn create_constant_buffer(&mut self) -> Result<D3d9Buffer> {
        Ok(D3d9Buffer::default())
    }

    fn update_constants(&mut self, buffer: &mut D3d9Buffer, constants: &ShaderConstants) -> Result<()> {
        buffer.0 = *constants;
        Ok(())
    }

    fn map_texture(
        &mut self,
        texture: &mut D3d9Texture,
        write: &mut dyn FnMut(&mut MappedTexture<'_>) -> Result<()>,
    ) -> Result<()> {
        let desc = texture.desc;
        if desc.usage != TextureUsage::Dynamic {
            return Err(Error::Map(format!("{:?} texture is not CPU writable", desc.usage)));
        }

        let mut rect = D3DLOCKED_RECT::default();
        let locked = unsafe {
            match &texture.texture {
                Some(tex) => tex.LockRect(0, &mut rect, std::ptr::null(), D3DLOCK_DISCARD as u32),
                None => texture.surface.LockRect(&mut rect, std::ptr::null(), 0),
            }
        };
        locked.map_err(|e| match device_error(e, "LockRect") {
            Error::Internal(msg) => Error::Map(msg),
            other => other,
        })?;

        let row_pitch = rect.Pitch.max(0) as usize;
        let len = row_pitch * desc.format.mapped_rows(desc.height);
        // SAFETY: the locked rectangle covers every row of the level and
        // stays valid until UnlockRect
        let data = unsafe { std::slice::from_raw_parts_mut(rect.pBits.cast::<u8>(), len) };
        let mut map = MappedTexture {
            data,
            row_pitch,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        };
        let written = write(&mut map);
        let unlocked = unsafe {
            match &texture.texture {
                Some(tex) => tex.UnlockRect(0),
                None => texture.surface.UnlockRect(),
            }
        };
        warn_on_failure(unlocked, "UnlockRect");
        written
    }

    fn texture_view(texture: &D3d9Texture, kind: ViewKind) -> Option<D3d9View> {
        match kind {
            ViewKind::Full => texture.view(),
            ViewKind::Luma | ViewKind::Chroma => None,
        }
    }

    fn create_view(&mut self, texture: &D3d9Texture, kind: ViewKind, array_slice: u32) -> Result<D3d9View> {
        if array_slice != 0 {
            return Err(Error::UnsupportedFormat("texture arrays on Direct3D 9".into()));
        }
        Self::texture_view(texture, kind)
            .ok_or_else(|| Error::UnsupportedFormat(format!("{:?} view of a Direct3D 9 texture", kind)))
    }

    fn copy_surface(&mut self, dst: &mut D3d9Texture, surface: &HardwareSurface) -> Result<()> {
        let source = match surface.handle {
            SurfaceHandle::Registered(id) => self
                .adapter
                .registry
                .get(id)
                .ok_or_else(|| Error::Surface(format!("{} is not registered", id)))?,
            SurfaceHandle::Shared(h) => {
                return Err(Error::Surface(format!(
                    "shared handle {:#x} needs Direct3D 9Ex",
                    h
                )))
            }
        };
        if surface.array_index != 0 {
            return Err(Error::Surface("Direct3D 9 surfaces have no array slices".into()));
        }

        let rect = RECT {
            left: 0,
            top: 0,
            right: surface.width.min(dst.desc.width) as i32,
            bottom: surface.height.min(dst.desc.height) as i32,
        };
        unsafe {
            self.device
                .StretchRect(&source.0, &rect, &dst.surface, &rect, D3DTEXF_NONE)
        }
        .map_err(|e| match device_error(e, "StretchRect") {
            Error::Internal(msg) => Error::Surface(msg),
            other => other,
        })
    }

    fn conversion_path(&self, format: PixelFormat, matrix: ColorMatrix) -> Result<ConversionPath> {
        match format {
            PixelFormat::Argb => Ok(ConversionPath::Direct),
            PixelFormat::Nv12 => Ok(ConversionPath::Blit),
            PixelFormat::I420 | PixelFormat::I444 => Ok(ConversionPath::Shader(matrix.yuv_shader())),
            PixelFormat::Unknown => Err(Error::UnsupportedFormat(format.to_string())),
        }
    }

    fn blit(&mut self, src: &D3d9Texture, dst: &mut D3d9Texture) -> Result<()> {
        unsafe {
            self.device.StretchRect(
                &src.surface,
                std::ptr::null(),
                &dst.surface,
                std::ptr::null(),
                D3DTEXF_LINEAR,
            )
        }
        .map_err(|e| device_error(e, "StretchRect"))
    }

    fn begin_frame(&mut self) -> Result<()> {
        let back_buffer = self.back_buffer()?;
        let states = [
            (D3DRS_CULLMODE, D3DCULL_NONE.0 as u32),
            (D3DRS_ZENABLE, D3DZB_FALSE.0 as u32),
            (D3DRS_LIGHTING, 0),
            (D3DRS_ALPHABLENDENABLE, 0),
        ];
        unsafe {
            for (state, value) in states {
                self.device
                    .SetRenderState(state, value)
                    .map_err(|e| device_error(e, "SetRenderState"))?;
            }
            self.device
                .SetRenderTarget(0, &back_buffer)
                .map_err(|e| device_error(e, "SetRenderTarget"))?;
            self.device
                .Clear(0, std::ptr::null(), D3DCLEAR_TARGET as u32, OPAQUE_BLACK, 1.0, 0)
                .map_err(|e| device_error(e, "Clear"))?;
            self.device.BeginScene().map_err(|e| device_error(e, "BeginScene"))?;
        }
        self.in_scene = true;
        Ok(())
    }

    fn present(&mut self, output: Option<&D3d9Texture>) -> Result<()> {
        let copied = match output {
            Some(output) => {
                let back_buffer = self.back_buffer()?;
                unsafe {
                    self.device.StretchRect(
                        &output.surface,
                        std::ptr::null(),
                        &back_buffer,
                        std::ptr::null(),
                        D3DTEXF_NONE,
                    )
                }
                .map_err(|e| device_error(e, "StretchRect"))
            }
            None => Ok(()),
        };
        self.end_scene()?;
        copied?;
        if output.is_none() {
            return Ok(());
        }

        unsafe {
            self.device.Present(
                std::ptr::null(),
                std::ptr::null(),
                HWND::default(),
                std::ptr::null::<RGNDATA>(),
            )
        }
        .map_err(|e| match device_error(e, "Present") {
            Error::Internal(msg) => Error::Present(msg),
            lost => {
                warn!("Direct3D 9 device lost during present");
                lost
            }
        })
    }

    fn release_targets(&mut self) {
        if let Err(e) = self.end_scene() {
            debug!("EndScene on release: {}", e);
        }
        self.back_buffer = None;
    }

    /// `Reset` needs every default-pool resource gone; a failure is
    /// reported as device loss so the renderer rebuilds from scratch
    fn resize_buffers(&mut self, size: Resolution) -> Result<()> {
        self.release_targets();
        self.params.BackBufferWidth = size.width;
        self.params.BackBufferHeight = size.height;
        unsafe { self.device.Reset(&mut self.params) }
            .map_err(|e| Error::DeviceLost(format!("Reset failed: {}", e)))?;
        self.size = size;
        debug!("Direct3D 9 device reset to {}", size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::E_FAIL;
    use windows::Win32::Graphics::Direct3D9::D3DFMT_UNKNOWN;

    #[test]
    fn test_present_parameters_have_no_depth_buffer() {
        let params = present_parameters(HWND::default(), Resolution::new(640, 480));
        assert!(!params.EnableAutoDepthStencil.as_bool());
        assert_eq!(params.AutoDepthStencilFormat, D3DFMT_UNKNOWN);
        assert_eq!(params.BackBufferWidth, 640);
        assert_eq!(params.BackBufferHeight, 480);
        assert_eq!(params.SwapEffect, D3DSWAPEFFECT_COPY);
    }

    #[test]
    fn test_failed_call_is_reported() {
        assert!(warn_on_failure(Ok(()), "UnlockRect"));
        assert!(!warn_on_failure(Err(E_FAIL.into()), "UnlockRect"));
    }

    #[test]
    fn test_lost_device_is_classified() {
        assert!(device_error(D3DERR_DEVICELOST.into(), "Present").is_device_lost());
        assert!(!device_error(E_FAIL.into(), "Present").is_device_lost());
    }
}
