//! Direct3D 11 backend
//!
//! One device per renderer instance, created hardware first with WARP and
//! the reference rasterizer as fallbacks. The swap chain has a single
//! R8G8B8A8 buffer; every frame ends with a copy of the final pass into it.

mod target;
mod texture;

pub use target::D3d11RenderTexture;
pub use texture::{D3d11Surface, D3d11Texture, D3d11View};

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use crate::plane::{round_even, MappedTexture, TextureFormat};
use crate::render::{Backend, SamplerKind, TextureDesc, TextureUsage, ViewKind};
use crate::shader::ShaderLibrary;
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::transform::{ShaderConstants, VertexConstants, QUAD_INDICES, QUAD_VERTICES};
use crate::types::{HardwareSurface, Resolution, ShaderProgram, SurfaceHandle};
use crate::window::{hwnd_of, RenderWindow};
use std::collections::HashMap;
use std::sync::Arc;
use target::{update_buffer, QuadPipeline};
use tracing::{debug, info, warn};
use windows::core::{s, Interface};
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_REFERENCE, D3D_DRIVER_TYPE_WARP,
    D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_11_0,
};
use windows::Win32::Graphics::Direct3D10::ID3D10Multithread;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Buffer, ID3D11Device, ID3D11DeviceContext, ID3D11PixelShader,
    ID3D11RenderTargetView, ID3D11SamplerState, ID3D11Texture2D, D3D11_BIND_CONSTANT_BUFFER,
    D3D11_BIND_INDEX_BUFFER, D3D11_BIND_VERTEX_BUFFER, D3D11_BOX, D3D11_BUFFER_DESC,
    D3D11_COMPARISON_NEVER, D3D11_CREATE_DEVICE_FLAG, D3D11_CULL_NONE, D3D11_FILL_SOLID,
    D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_FILTER_MIN_MAG_MIP_POINT, D3D11_INPUT_ELEMENT_DESC,
    D3D11_INPUT_PER_VERTEX_DATA, D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_WRITE_DISCARD,
    D3D11_RASTERIZER_DESC, D3D11_SAMPLER_DESC, D3D11_SDK_VERSION, D3D11_SUBRESOURCE_DATA,
    D3D11_TEXTURE2D_DESC, D3D11_TEXTURE_ADDRESS_CLAMP, D3D11_USAGE_DEFAULT, D3D11_VIEWPORT,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_R32G32B32A32_FLOAT, DXGI_FORMAT_R32G32B32_FLOAT, DXGI_FORMAT_R32G32_FLOAT,
    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_UNKNOWN, DXGI_MODE_DESC, DXGI_RATIONAL, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGIDevice, IDXGIFactory1, IDXGISwapChain, DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET,
    DXGI_ERROR_WAS_STILL_DRAWING, DXGI_PRESENT, DXGI_SWAP_CHAIN_DESC, DXGI_SWAP_CHAIN_FLAG,
    DXGI_SWAP_EFFECT_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

const DRIVER_TYPES: [D3D_DRIVER_TYPE; 3] = [
    D3D_DRIVER_TYPE_HARDWARE,
    D3D_DRIVER_TYPE_WARP,
    D3D_DRIVER_TYPE_REFERENCE,
];

const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 3] = [
    D3D_FEATURE_LEVEL_11_0,
    D3D_FEATURE_LEVEL_10_1,
    D3D_FEATURE_LEVEL_10_0,
];

const CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Map a failed call; device removal and reset become [`Error::DeviceLost`]
pub(crate) fn device_error(e: windows::core::Error, what: &str) -> Error {
    let code = e.code();
    if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET {
        Error::DeviceLost(format!("{}: {}", what, e))
    } else {
        Error::Internal(format!("{} failed: {}", what, e))
    }
}

/// Creation context for D3D11 devices: owns the registry resolving
/// [`SurfaceHandle::Registered`] surfaces
#[derive(Clone, Default)]
pub struct D3d11Adapter {
    registry: Arc<SurfaceRegistry<D3d11Surface>>,
}

impl D3d11Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SurfaceRegistry<D3d11Surface> {
        &self.registry
    }

    /// Register a decoder or capture texture (array)
    pub fn register_surface(&self, texture: ID3D11Texture2D) -> SurfaceId {
        self.registry.register(D3d11Surface(texture))
    }
}

#[derive(Clone)]
pub struct D3d11Sampler(pub(crate) ID3D11SamplerState);

unsafe impl Send for D3d11Sampler {}

pub struct D3d11Buffer(pub(crate) ID3D11Buffer);

unsafe impl Send for D3d11Buffer {}

/// Device, immediate context and swap chain
pub struct D3d11Backend {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    swap_chain: IDXGISwapChain,
    back_buffer: Option<(ID3D11Texture2D, ID3D11RenderTargetView)>,
    size: Resolution,
    quad: QuadPipeline,
    pixel_shaders: HashMap<ShaderProgram, ID3D11PixelShader>,
    shaders: Arc<ShaderLibrary>,
    adapter: D3d11Adapter,
}

// The device is multithread protected and the renderer serializes access
unsafe impl Send for D3d11Backend {}

impl D3d11Backend {
    fn create_device() -> Result<(ID3D11Device, ID3D11DeviceContext, D3D_DRIVER_TYPE)> {
        let mut last_error = None;
        for driver in DRIVER_TYPES {
            let mut device = None;
            let mut context = None;
            let mut level = D3D_FEATURE_LEVEL::default();
            let created = unsafe {
                D3D11CreateDevice(
                    None,
                    driver,
                    None,
                    D3D11_CREATE_DEVICE_FLAG(0),
                    Some(&FEATURE_LEVELS),
                    D3D11_SDK_VERSION,
                    Some(&mut device),
                    Some(&mut level),
                    Some(&mut context),
                )
            };
            match (created, device, context) {
                (Ok(()), Some(device), Some(context)) => {
                    debug!("D3D11 device created on {:?} at level {:#x}", driver, level.0);
                    return Ok((device, context, driver));
                }
                (Err(e), _, _) => {
                    debug!("D3D11CreateDevice({:?}) failed: {}", driver, e);
                    last_error = Some(e.to_string());
                }
                _ => last_error = Some("D3D11CreateDevice returned no device".into()),
            }
        }
        Err(Error::DeviceCreation(
            last_error.unwrap_or_else(|| "no driver type available".into()),
        ))
    }

    fn create_swap_chain(
        device: &ID3D11Device,
        window: &dyn RenderWindow,
        size: Resolution,
    ) -> Result<IDXGISwapChain> {
        let hwnd = hwnd_of(window)?;
        let factory: IDXGIFactory1 = unsafe {
            let dxgi_device: IDXGIDevice = device.cast()?;
            let adapter = dxgi_device.GetAdapter()?;
            adapter.GetParent()?
        };

        let desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: size.width,
                Height: size.height,
                RefreshRate: DXGI_RATIONAL {
                    Numerator: 60,
                    Denominator: 1,
                },
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 1,
            OutputWindow: hwnd,
            Windowed: true.into(),
            SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
            Flags: 0,
        };

        let mut swap_chain = None;
        unsafe { factory.CreateSwapChain(device, &desc, &mut swap_chain) }
            .ok()
            .map_err(|e| Error::SwapChain(format!("CreateSwapChain failed: {}", e)))?;
        swap_chain.ok_or_else(|| Error::SwapChain("CreateSwapChain returned nothing".into()))
    }

    fn create_quad(device: &ID3D11Device, shaders: &ShaderLibrary) -> Result<QuadPipeline> {
        let bytecode = shaders.vertex()?;
        let shader_error = |what: &str, e: windows::core::Error| Error::ShaderCreation(format!("{}: {}", what, e));

        let mut vertex_shader = None;
        unsafe { device.CreateVertexShader(bytecode, None, Some(&mut vertex_shader)) }
            .map_err(|e| shader_error("CreateVertexShader", e))?;

        let layout = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 12,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 20,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout = None;
        unsafe { device.CreateInputLayout(&layout, bytecode, Some(&mut input_layout)) }
            .map_err(|e| shader_error("CreateInputLayout", e))?;

        let vertex_buffer = create_buffer(
            device,
            bytemuck::cast_slice(&QUAD_VERTICES),
            D3D11_BIND_VERTEX_BUFFER.0 as u32,
        )?;
        let index_buffer = create_buffer(
            device,
            bytemuck::cast_slice(&QUAD_INDICES),
            D3D11_BIND_INDEX_BUFFER.0 as u32,
        )?;

        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            DepthClipEnable: true.into(),
            ..Default::default()
        };
        let mut rasterizer = None;
        unsafe { device.CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer)) }
            .map_err(|e| device_error(e, "CreateRasterizerState"))?;

        match (vertex_shader, input_layout, rasterizer) {
            (Some(vertex_shader), Some(input_layout), Some(rasterizer)) => Ok(QuadPipeline {
                vertex_shader,
                input_layout,
                vertex_buffer,
                index_buffer,
                rasterizer,
            }),
            _ => Err(Error::ShaderCreation("quad pipeline state missing".into())),
        }
    }

    fn pixel_shader(&mut self, program: ShaderProgram) -> Result<ID3D11PixelShader> {
        if let Some(shader) = self.pixel_shaders.get(&program) {
            return Ok(shader.clone());
        }
        let bytecode = self.shaders.program(program)?;
        let mut shader = None;
        unsafe { self.device.CreatePixelShader(bytecode, None, Some(&mut shader)) }
            .map_err(|e| Error::ShaderCreation(format!("{}: {}", program, e)))?;
        let shader = shader.ok_or_else(|| Error::ShaderCreation(format!("{} returned nothing", program)))?;
        self.pixel_shaders.insert(program, shader.clone());
        Ok(shader)
    }

    fn back_buffer(&mut self) -> Result<(ID3D11Texture2D, ID3D11RenderTargetView)> {
        if let Some(pair) = &self.back_buffer {
            return Ok(pair.clone());
        }
        let texture: ID3D11Texture2D =
            unsafe { self.swap_chain.GetBuffer(0) }.map_err(|e| device_error(e, "GetBuffer"))?;
        let mut rtv = None;
        unsafe { self.device.CreateRenderTargetView(&texture, None, Some(&mut rtv)) }
            .map_err(|e| device_error(e, "CreateRenderTargetView"))?;
        let rtv = rtv.ok_or_else(|| Error::SwapChain("back buffer has no render target view".into()))?;
        self.back_buffer = Some((texture.clone(), rtv.clone()));
        Ok((texture, rtv))
    }

    fn open_surface(&self, handle: SurfaceHandle) -> Result<ID3D11Texture2D> {
        match handle {
            SurfaceHandle::Shared(h) => {
                unsafe { self.device.OpenSharedResource::<ID3D11Texture2D>(HANDLE(h as usize as *mut _)) }
                    .map_err(|e| Error::Surface(format!("OpenSharedResource({:#x}) failed: {}", h, e)))
            }
            SurfaceHandle::Registered(id) => self
                .adapter
                .registry
                .get(id)
                .map(|surface| surface.0)
                .ok_or_else(|| Error::Surface(format!("{} is not registered", id))),
        }
    }

    /// Reason the device went away, for logging
    fn removed_reason(&self) -> String {
        match unsafe { self.device.GetDeviceRemovedReason() } {
            Ok(()) => "device reports no removal".into(),
            Err(e) => e.to_string(),
        }
    }
}

fn create_buffer(device: &ID3D11Device, data: &[u8], bind: u32) -> Result<ID3D11Buffer> {
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: data.len() as u32,
        Usage: D3D11_USAGE_DEFAULT,
        BindFlags: bind,
        CPUAccessFlags: 0,
        MiscFlags: 0,
        StructureByteStride: 0,
    };
    let init = D3D11_SUBRESOURCE_DATA {
        pSysMem: data.as_ptr().cast(),
        SysMemPitch: 0,
        SysMemSlicePitch: 0,
    };
    let mut buffer = None;
    unsafe { device.CreateBuffer(&desc, Some(&init), Some(&mut buffer)) }
        .map_err(|e| device_error(e, "CreateBuffer"))?;
    buffer.ok_or_else(|| Error::Internal("CreateBuffer returned nothing".into()))
}

impl Backend for D3d11Backend {
    type Adapter = D3d11Adapter;
    type Texture = D3d11Texture;
    type View = D3d11View;
    type Sampler = D3d11Sampler;
    type Buffer = D3d11Buffer;
    type Target = D3d11RenderTexture;

    const KIND: BackendKind = BackendKind::D3d11;

    fn create(adapter: &D3d11Adapter, window: &dyn RenderWindow, shaders: Arc<ShaderLibrary>) -> Result<Self> {
        let size = window.client_size()?;
        if size.is_empty() {
            return Err(Error::SwapChain(format!("client area is {}", size)));
        }

        let (device, context, driver) = Self::create_device()?;

        let multithread: ID3D10Multithread = context
            .cast()
            .map_err(|e| Error::DeviceCreation(format!("ID3D10Multithread unavailable: {}", e)))?;
        unsafe {
            let _ = multithread.SetMultithreadProtected(true);
        }

        let swap_chain = Self::create_swap_chain(&device, window, size)?;
        let quad = Self::create_quad(&device, &shaders)?;
        info!("Direct3D 11 device ready on {:?} ({})", driver, size);

        Ok(Self {
            device,
            context,
            swap_chain,
            back_buffer: None,
            size,
            quad,
            pixel_shaders: HashMap::new(),
            shaders,
            adapter: adapter.clone(),
        })
    }

    fn back_buffer_size(&self) -> Resolution {
        self.size
    }

    fn back_buffer_format(&self) -> TextureFormat {
        TextureFormat::Rgba8
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<D3d11Texture> {
        D3d11Texture::create(&self.device, desc)
    }

    fn create_render_target(&mut self, desc: &TextureDesc, program: ShaderProgram) -> Result<D3d11RenderTexture> {
        let desc = TextureDesc {
            usage: TextureUsage::RenderTarget,
            ..*desc
        };
        let texture = D3d11Texture::create(&self.device, &desc)?;
        let render_targets = texture.render_target_views(&self.device)?;
        let pixel_shader = self.pixel_shader(program)?;
        let vertex_constants = create_buffer(
            &self.device,
            bytemuck::bytes_of(&VertexConstants::default()),
            D3D11_BIND_CONSTANT_BUFFER.0 as u32,
        )?;
        Ok(D3d11RenderTexture::new(
            self.context.clone(),
            texture,
            render_targets,
            pixel_shader,
            self.quad.clone(),
            vertex_constants,
        ))
    }

    fn create_sampler(&mut self, kind: SamplerKind) -> Result<D3d11Sampler> {
        let filter = match kind {
            SamplerKind::Point => D3D11_FILTER_MIN_MAG_MIP_POINT,
            SamplerKind::Linear => D3D11_FILTER_MIN_MAG_MIP_LINEAR,
        };
        let desc = D3D11_SAMPLER_DESC {
            Filter: filter,
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
            MipLODBias: 0.0,
            MaxAnisotropy: 1,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0; 4],
            MinLOD: 0.0,
            MaxLOD: f32::MAX,
        };
        let mut sampler = None;
        unsafe { self.device.CreateSamplerState(&desc, Some(&mut sampler)) }
            .map_err(|e| device_error(e, "CreateSamplerState"))?;
        sampler
            .map(D3d11Sampler)
            .ok_or_else(|| Error::Internal("CreateSamplerState returned nothing".into()))
    }

    fn create_constant_buffer(&mut self) -> Result<D3d11Buffer> {
        create_buffer(
            &self.device,
            bytemuck::bytes_of(&ShaderConstants::default()),
            D3D11_BIND_CONSTANT_BUFFER.0 as u32,
        )
        .map(D3d11Buffer)
    }

    fn update_constants(&mut self, buffer: &mut D3d11Buffer, constants: &ShaderConstants) -> Result<()> {
        update_buffer(&self.context, &buffer.0, constants);
        Ok(())
    }

    fn map_texture(
        &mut self,
        texture: &mut D3d11Texture,
        write: &mut dyn FnMut(&mut MappedTexture<'_>) -> Result<()>,
    ) -> Result<()> {
        let desc = texture.desc;
        if desc.usage != TextureUsage::Dynamic {
            return Err(Error::Map(format!("{:?} texture is not CPU writable", desc.usage)));
        }

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(&texture.texture, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
        }
        .map_err(|e| match device_error(e, "Map") {
            Error::Internal(msg) => Error::Map(msg),
            other => other,
        })?;

        let row_pitch = mapped.RowPitch as usize;
        let len = row_pitch * desc.format.mapped_rows(desc.height);
        // SAFETY: the mapping spans RowPitch bytes per row for every row of
        // the subresource and stays valid until Unmap
        let data = unsafe { std::slice::from_raw_parts_mut(mapped.pData.cast::<u8>(), len) };
        let mut map = MappedTexture {
            data,
            row_pitch,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        };
        let written = write(&mut map);
        unsafe { self.context.Unmap(&texture.texture, 0) };
        written
    }

    fn texture_view(texture: &D3d11Texture, kind: ViewKind) -> Option<D3d11View> {
        texture.view_of(kind)
    }

    fn create_view(&mut self, texture: &D3d11Texture, kind: ViewKind, array_slice: u32) -> Result<D3d11View> {
        texture.view(&self.device, kind, array_slice)
    }

    fn copy_surface(&mut self, dst: &mut D3d11Texture, surface: &HardwareSurface) -> Result<()> {
        let source = self.open_surface(surface.handle)?;
        let mut src_desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { source.GetDesc(&mut src_desc) };

        if surface.array_index >= src_desc.ArraySize {
            return Err(Error::Surface(format!(
                "array slice {} out of {}",
                surface.array_index, src_desc.ArraySize
            )));
        }
        if src_desc.Format != texture::dxgi_format(dst.desc.format) {
            return Err(Error::Surface(format!(
                "surface format {:?} does not match {:?}",
                src_desc.Format, dst.desc.format
            )));
        }

        let (mut width, mut height) = (surface.width, surface.height);
        if dst.desc.format == TextureFormat::Nv12 {
            width = round_even(width);
            height = round_even(height);
        }
        width = width.min(src_desc.Width).min(dst.desc.width);
        height = height.min(src_desc.Height).min(dst.desc.height);

        let src_box = D3D11_BOX {
            left: 0,
            top: 0,
            front: 0,
            right: width,
            bottom: height,
            back: 1,
        };
        // One mip level, so the subresource index is the array slice
        unsafe {
            self.context.CopySubresourceRegion(
                &dst.texture,
                0,
                0,
                0,
                0,
                &source,
                surface.array_index,
                Some(&src_box as *const _),
            );
        }
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        let (_, rtv) = self.back_buffer()?;
        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: self.size.width as f32,
            Height: self.size.height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        unsafe {
            self.context.OMSetRenderTargets(Some(&[Some(rtv.clone())]), None);
            self.context.ClearRenderTargetView(&rtv, &CLEAR);
            self.context.RSSetViewports(Some(&[viewport]));
        }
        Ok(())
    }

    fn present(&mut self, output: Option<&D3d11Texture>) -> Result<()> {
        let Some(output) = output else {
            return Ok(());
        };
        let (back_buffer, _) = self.back_buffer()?;
        unsafe { self.context.CopyResource(&back_buffer, &output.texture) };

        let hr = unsafe { self.swap_chain.Present(0, DXGI_PRESENT(0)) };
        if hr == DXGI_ERROR_DEVICE_REMOVED || hr == DXGI_ERROR_DEVICE_RESET {
            let reason = self.removed_reason();
            warn!("D3D11 device removed during present: {}", reason);
            return Err(Error::DeviceLost(reason));
        }
        if hr == DXGI_ERROR_WAS_STILL_DRAWING {
            return Ok(());
        }
        hr.ok().map_err(|e| Error::Present(e.to_string()))
    }

    fn release_targets(&mut self) {
        unsafe {
            self.context.OMSetRenderTargets(None, None);
            self.context.Flush();
        }
        self.back_buffer = None;
    }

    fn resize_buffers(&mut self, size: Resolution) -> Result<()> {
        self.release_targets();
        unsafe {
            self.swap_chain
                .ResizeBuffers(0, size.width, size.height, DXGI_FORMAT_UNKNOWN, DXGI_SWAP_CHAIN_FLAG(0))
        }
        .map_err(|e| match device_error(e, "ResizeBuffers") {
            Error::Internal(msg) => Error::SwapChain(msg),
            other => other,
        })?;
        self.size = size;
        debug!("D3D11 swap chain resized to {}", size);
        Ok(())
    }
}
