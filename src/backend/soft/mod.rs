//! Software reference backend
//!
//! Runs the same passes as the Direct3D backends on the CPU, one kernel per
//! shader program. It has no window system dependency, so it drives the
//! headless CLI and every end-to-end test. The [`SoftAdapter`] doubles as a
//! fault injector for device loss and creation failures.

mod kernels;
mod target;
mod texture;

pub use target::{SoftBuffer, SoftRenderTexture, SoftSampler};
pub use texture::{SoftTexture, SoftView, ROW_ALIGNMENT};

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use crate::plane::{MappedTexture, TextureFormat};
use crate::render::{Backend, SamplerKind, TextureDesc, TextureUsage, ViewKind};
use crate::shader::ShaderLibrary;
use crate::surface::{SurfaceId, SurfaceRegistry};
use crate::transform::ShaderConstants;
use crate::types::{HardwareSurface, PixelFormat, Resolution, ShaderProgram, SurfaceHandle};
use crate::window::RenderWindow;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use target::SoftContext;
use tracing::debug;

/// Tightly packed RGBA copy of a presented back buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(at..at + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

#[derive(Default)]
struct AdapterState {
    live_textures: Arc<AtomicUsize>,
    lose_on_present: AtomicBool,
    lose_on_resize: AtomicBool,
    failing_creations: AtomicU32,
    devices_created: AtomicU64,
    presents: AtomicU64,
    last_presented: Mutex<Option<Image>>,
    next_shared_handle: AtomicU64,
    shared: RwLock<HashMap<u64, SoftTexture>>,
    registry: SurfaceRegistry<SoftTexture>,
}

/// The "GPU" every soft device is created on. Cloning shares it.
#[derive(Clone, Default)]
pub struct SoftAdapter {
    state: Arc<AdapterState>,
}

impl std::fmt::Debug for SoftAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftAdapter")
            .field("live_textures", &self.live_textures())
            .field("devices_created", &self.devices_created())
            .field("present_count", &self.present_count())
            .finish()
    }
}

impl SoftAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Textures (and surfaces) currently alive on this adapter
    pub fn live_textures(&self) -> usize {
        self.state.live_textures.load(Ordering::SeqCst)
    }

    pub fn devices_created(&self) -> u64 {
        self.state.devices_created.load(Ordering::SeqCst)
    }

    pub fn present_count(&self) -> u64 {
        self.state.presents.load(Ordering::SeqCst)
    }

    /// Latest image that reached the screen
    pub fn last_presented(&self) -> Option<Image> {
        self.state.last_presented.lock().clone()
    }

    /// The next present reports device removal
    pub fn lose_device_on_next_present(&self) {
        self.state.lose_on_present.store(true, Ordering::SeqCst);
    }

    /// The next swap chain resize reports device removal
    pub fn lose_device_on_next_resize(&self) {
        self.state.lose_on_resize.store(true, Ordering::SeqCst);
    }

    /// The next `count` device creations fail
    pub fn fail_next_device_creations(&self, count: u32) {
        self.state.failing_creations.store(count, Ordering::SeqCst);
    }

    /// Create a GPU-only texture (array) the way a decoder or capture source
    /// allocates its output surfaces
    pub fn create_surface_texture(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        array_size: u32,
    ) -> Result<SoftTexture> {
        let format = match format {
            PixelFormat::Nv12 => TextureFormat::Nv12,
            PixelFormat::Argb => TextureFormat::Bgra8,
            other => {
                return Err(Error::UnsupportedFormat(format!("{} surface", other)));
            }
        };
        let desc = TextureDesc::new(width, height, format, TextureUsage::Default).with_array_size(array_size);
        SoftTexture::new(desc, &self.state.live_textures)
    }

    /// Registry resolving [`SurfaceHandle::Registered`] handles
    pub fn registry(&self) -> &SurfaceRegistry<SoftTexture> {
        &self.state.registry
    }

    pub fn register_surface(&self, texture: SoftTexture) -> SurfaceId {
        self.state.registry.register(texture)
    }

    /// Open a texture to other devices, like `IDXGIResource::GetSharedHandle`
    pub fn share_texture(&self, texture: &SoftTexture) -> u64 {
        let handle = self.state.next_shared_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.shared.write().insert(handle, texture.clone());
        handle
    }

    /// Close a shared handle
    pub fn close_shared(&self, handle: u64) -> bool {
        self.state.shared.write().remove(&handle).is_some()
    }

    fn resolve(&self, handle: SurfaceHandle) -> Result<SoftTexture> {
        match handle {
            SurfaceHandle::Shared(h) => self
                .state
                .shared
                .read()
                .get(&h)
                .cloned()
                .ok_or_else(|| Error::Surface(format!("unknown shared handle {:#x}", h))),
            SurfaceHandle::Registered(id) => self
                .state
                .registry
                .get(id)
                .ok_or_else(|| Error::Surface(format!("{} is not registered", id))),
        }
    }

    fn take_failure(&self) -> bool {
        self.state
            .failing_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// CPU device with a one-buffer "swap chain"
pub struct SoftBackend {
    context: SoftContext,
    back_buffer: SoftTexture,
    size: Resolution,
    adapter: SoftAdapter,
}

impl SoftBackend {
    fn create_back_buffer(adapter: &SoftAdapter, size: Resolution) -> Result<SoftTexture> {
        SoftTexture::new(
            TextureDesc::render_target(size.width, size.height, TextureFormat::Rgba8),
            &adapter.state.live_textures,
        )
        .map_err(|e| Error::SwapChain(e.to_string()))
    }
}

impl Backend for SoftBackend {
    type Adapter = SoftAdapter;
    type Texture = SoftTexture;
    type View = SoftView;
    type Sampler = SoftSampler;
    type Buffer = SoftBuffer;
    type Target = SoftRenderTexture;

    const KIND: BackendKind = BackendKind::Soft;

    fn create(adapter: &SoftAdapter, window: &dyn RenderWindow, _shaders: Arc<ShaderLibrary>) -> Result<Self> {
        if adapter.take_failure() {
            return Err(Error::DeviceCreation("adapter refused to create a device".into()));
        }

        let size = window.client_size()?;
        if size.is_empty() {
            return Err(Error::SwapChain(format!("client area is {}", size)));
        }

        let back_buffer = Self::create_back_buffer(adapter, size)?;
        adapter.state.devices_created.fetch_add(1, Ordering::SeqCst);
        debug!("Soft device created with a {} back buffer", size);

        Ok(Self {
            context: SoftContext::default(),
            back_buffer,
            size,
            adapter: adapter.clone(),
        })
    }

    fn back_buffer_size(&self) -> Resolution {
        self.size
    }

    fn back_buffer_format(&self) -> TextureFormat {
        TextureFormat::Rgba8
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<SoftTexture> {
        SoftTexture::new(*desc, &self.adapter.state.live_textures)
    }

    fn create_render_target(&mut self, desc: &TextureDesc, program: ShaderProgram) -> Result<SoftRenderTexture> {
        let texture = self.create_texture(&TextureDesc {
            usage: TextureUsage::RenderTarget,
            ..*desc
        })?;
        Ok(SoftRenderTexture::new(texture, program, self.context.clone()))
    }

    fn create_sampler(&mut self, kind: SamplerKind) -> Result<SoftSampler> {
        Ok(SoftSampler(kind))
    }

    fn create_constant_buffer(&mut self) -> Result<SoftBuffer> {
        Ok(SoftBuffer::default())
    }

    fn update_constants(&mut self, buffer: &mut SoftBuffer, constants: &ShaderConstants) -> Result<()> {
        *buffer.0.lock() = *constants;
        Ok(())
    }

    fn map_texture(
        &mut self,
        texture: &mut SoftTexture,
        write: &mut dyn FnMut(&mut MappedTexture<'_>) -> Result<()>,
    ) -> Result<()> {
        texture.map_write(write)
    }

    fn texture_view(texture: &SoftTexture, kind: ViewKind) -> Option<SoftView> {
        SoftView::new(texture, kind, 0).ok()
    }

    fn create_view(&mut self, texture: &SoftTexture, kind: ViewKind, array_slice: u32) -> Result<SoftView> {
        SoftView::new(texture, kind, array_slice)
    }

    fn copy_surface(&mut self, dst: &mut SoftTexture, surface: &HardwareSurface) -> Result<()> {
        let source = self.adapter.resolve(surface.handle)?;
        dst.copy_region(&source, surface.array_index, surface.width, surface.height)
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.context.bind_render_target(&self.back_buffer);
        self.back_buffer.clear();
        Ok(())
    }

    fn present(&mut self, output: Option<&SoftTexture>) -> Result<()> {
        let Some(output) = output else {
            return Ok(());
        };
        if self.adapter.state.lose_on_present.swap(false, Ordering::SeqCst) {
            return Err(Error::DeviceLost("device removed during present".into()));
        }

        self.back_buffer.copy_resource(output)?;
        let image = Image {
            width: self.size.width,
            height: self.size.height,
            pixels: self.back_buffer.read_rgba()?,
        };
        *self.adapter.state.last_presented.lock() = Some(image);
        self.adapter.state.presents.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_targets(&mut self) {
        self.context.unbind_render_targets();
    }

    fn resize_buffers(&mut self, size: Resolution) -> Result<()> {
        if self.adapter.state.lose_on_resize.swap(false, Ordering::SeqCst) {
            return Err(Error::DeviceLost("device removed during resize".into()));
        }
        // Every outstanding reference to the back buffer must be gone first
        if self.back_buffer.ref_count() > 1 {
            return Err(Error::SwapChain("back buffer is still referenced".into()));
        }

        self.back_buffer = Self::create_back_buffer(&self.adapter, size)?;
        self.size = size;
        debug!("Soft swap chain resized to {}", size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::HeadlessWindow;

    #[test]
    fn test_injected_creation_failure() {
        let adapter = SoftAdapter::new();
        adapter.fail_next_device_creations(1);
        let window = HeadlessWindow::new(64, 64);
        let shaders = Arc::new(ShaderLibrary::new());

        assert!(matches!(
            SoftBackend::create(&adapter, &window, Arc::clone(&shaders)),
            Err(Error::DeviceCreation(_))
        ));
        assert!(SoftBackend::create(&adapter, &window, shaders).is_ok());
        assert_eq!(adapter.devices_created(), 1);
    }

    #[test]
    fn test_resize_needs_released_back_buffer() {
        let adapter = SoftAdapter::new();
        let window = HeadlessWindow::new(64, 64);
        let mut backend = SoftBackend::create(&adapter, &window, Arc::new(ShaderLibrary::new())).unwrap();

        backend.begin_frame().unwrap();
        assert!(matches!(
            backend.resize_buffers(Resolution::new(32, 32)),
            Err(Error::SwapChain(_))
        ));
        backend.release_targets();
        backend.resize_buffers(Resolution::new(32, 32)).unwrap();
        assert_eq!(backend.back_buffer_size(), Resolution::new(32, 32));
    }

    #[test]
    fn test_shared_and_registered_handles() {
        let adapter = SoftAdapter::new();
        let texture = adapter.create_surface_texture(16, 16, PixelFormat::Nv12, 2).unwrap();
        let id = adapter.register_surface(texture.clone());
        let handle = adapter.share_texture(&texture);

        assert!(adapter.resolve(SurfaceHandle::Registered(id)).unwrap().same_texture(&texture));
        assert!(adapter.resolve(SurfaceHandle::Shared(handle)).unwrap().same_texture(&texture));
        assert!(adapter.close_shared(handle));
        assert!(adapter.resolve(SurfaceHandle::Shared(handle)).is_err());
        assert!(adapter.create_surface_texture(16, 16, PixelFormat::I420, 1).is_err());
    }
}
