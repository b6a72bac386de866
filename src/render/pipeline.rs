//! Frame renderer state machine
//!
//! `Uninitialized -> Ready` on init, `Ready -> Ready` on resize, back to
//! `Uninitialized` on destroy or on a failed init/resize. Device loss seen at
//! present or resize time destroys everything and re-initializes against the
//! same window.

use super::{
    clamp_sharpen, Backend, ConversionPath, RenderTexture, Renderer, SamplerKind, TextureDesc,
    TextureUsage, ViewKind,
};
use crate::backend::BackendKind;
use crate::color::ColorMatrix;
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::plane::{self, TextureFormat};
use crate::shader::ShaderLibrary;
use crate::transform::{Rotation, ShaderConstants, Transform};
use crate::types::{
    FrameOutcome, HardwareSurface, PixelFormat, PixelFrame, PixelPlane, PixelShader, RenderStats,
    Resolution,
};
use crate::window::RenderWindow;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-instance rendering options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub sharpen: f32,
    pub color_matrix: ColorMatrix,
    pub preserve_aspect: bool,
    pub rotation: Rotation,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sharpen: 0.0,
            color_matrix: ColorMatrix::Bt601,
            preserve_aspect: true,
            rotation: Rotation::None,
        }
    }
}

impl From<&RendererConfig> for RenderOptions {
    fn from(config: &RendererConfig) -> Self {
        Self {
            sharpen: clamp_sharpen(config.sharpen),
            color_matrix: config.color_matrix,
            preserve_aspect: config.preserve_aspect,
            rotation: config.rotation,
        }
    }
}

/// Where the pixels of the current frame come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InputSource {
    Cpu,
    Gpu,
}

/// Identity of the allocated input texture set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    format: PixelFormat,
    width: u32,
    height: u32,
    source: InputSource,
    path: ConversionPath,
}

/// Texture holding the latest pass result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Input(PixelPlane),
    Target(PixelShader),
    Blit,
}

/// Non-owning cursor over the pipeline's textures. Overwritten by every
/// pass and cleared outside a frame.
#[derive(Debug, Default)]
struct CurrentStage(Option<Stage>);

impl CurrentStage {
    fn set(&mut self, stage: Stage) {
        self.0 = Some(stage);
    }

    fn clear(&mut self) {
        self.0 = None;
    }

    fn get(&self) -> Option<Stage> {
        self.0
    }
}

/// Resolution-bound resources rebuilt on every init and resize
struct TargetSet<B: Backend> {
    render_targets: [Option<B::Target>; PixelShader::COUNT],
    point: B::Sampler,
    linear: B::Sampler,
    constants: B::Buffer,
}

impl<B: Backend> TargetSet<B> {
    fn create(backend: &mut B) -> Result<Self> {
        let size = backend.back_buffer_size();
        let desc = TextureDesc::render_target(size.width, size.height, backend.back_buffer_format());

        let mut render_targets: [Option<B::Target>; PixelShader::COUNT] = Default::default();
        for shader in PixelShader::ALL {
            render_targets[shader.index()] = Some(backend.create_render_target(&desc, shader.into())?);
        }

        Ok(Self {
            render_targets,
            point: backend.create_sampler(SamplerKind::Point)?,
            linear: backend.create_sampler(SamplerKind::Linear)?,
            constants: backend.create_constant_buffer()?,
        })
    }
}

/// Everything tied to one device. Field order is drop order: textures go
/// before the backend that created them.
struct DeviceResources<B: Backend> {
    inputs: [Option<B::Texture>; PixelPlane::COUNT],
    blit_target: Option<B::Texture>,
    key: Option<TextureKey>,
    targets: Option<TargetSet<B>>,
    output: CurrentStage,
    backend: B,
}

impl<B: Backend> DeviceResources<B> {
    fn new(mut backend: B) -> Result<Self> {
        let targets = TargetSet::create(&mut backend)?;
        Ok(Self {
            inputs: Default::default(),
            blit_target: None,
            key: None,
            targets: Some(targets),
            output: CurrentStage::default(),
            backend,
        })
    }

    fn release_inputs(&mut self) {
        self.inputs = Default::default();
        self.blit_target = None;
        self.key = None;
    }

    /// Drop everything sized by the frame or the back buffer
    fn release_frame_resources(&mut self) {
        self.output.clear();
        self.release_inputs();
        self.targets = None;
        self.backend.release_targets();
    }

    fn render_frame(
        &mut self,
        frame: &PixelFrame<'_>,
        options: &RenderOptions,
        stats: &mut RenderStats,
    ) -> Result<()> {
        frame.validate()?;
        self.prepare_inputs(frame.format, frame.resolution(), InputSource::Cpu, options, stats)?;

        for role in frame.format.texture_planes() {
            let texture = self.inputs[role.index()]
                .as_mut()
                .ok_or_else(|| Error::Internal(format!("no input texture for {:?}", role)))?;
            self.backend
                .map_texture(texture, &mut |map| plane::upload_frame_plane(map, frame, *role))?;
        }

        self.draw_frame(frame.format, frame.resolution(), options)
    }

    fn render_surface(
        &mut self,
        surface: &HardwareSurface,
        options: &RenderOptions,
        stats: &mut RenderStats,
    ) -> Result<()> {
        if surface.resolution().is_empty() {
            return Err(Error::Surface(format!("empty surface {}", surface.resolution())));
        }
        let plane = match surface.format {
            PixelFormat::Nv12 => PixelPlane::Nv12,
            PixelFormat::Argb => PixelPlane::Argb,
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} hardware surfaces",
                    other
                )))
            }
        };

        self.prepare_inputs(surface.format, surface.resolution(), InputSource::Gpu, options, stats)?;
        let texture = self.inputs[plane.index()]
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("no input texture for {:?}", plane)))?;
        self.backend.copy_surface(texture, surface)?;

        self.draw_frame(surface.format, surface.resolution(), options)
    }

    /// Lazily (re)allocate the input textures for a format and size
    fn prepare_inputs(
        &mut self,
        format: PixelFormat,
        size: Resolution,
        source: InputSource,
        options: &RenderOptions,
        stats: &mut RenderStats,
    ) -> Result<()> {
        let path = self.backend.conversion_path(format, options.color_matrix)?;
        let key = TextureKey {
            format,
            width: size.width,
            height: size.height,
            source,
            path,
        };
        if self.key == Some(key) {
            return Ok(());
        }

        // Old set goes first so both never coexist
        self.release_inputs();

        let usage = match source {
            InputSource::Cpu => TextureUsage::Dynamic,
            InputSource::Gpu => TextureUsage::Default,
        };
        for role in format.texture_planes() {
            let (width, height) = plane::texture_size(*role, format, size.width, size.height);
            let desc = TextureDesc::new(width, height, TextureFormat::for_plane(*role), usage);
            match self.backend.create_texture(&desc) {
                Ok(texture) => self.inputs[role.index()] = Some(texture),
                Err(e) => {
                    self.release_inputs();
                    return Err(e);
                }
            }
        }

        if path == ConversionPath::Blit {
            let desc = TextureDesc::render_target(size.width, size.height, self.backend.back_buffer_format());
            match self.backend.create_texture(&desc) {
                Ok(texture) => self.blit_target = Some(texture),
                Err(e) => {
                    self.release_inputs();
                    return Err(e);
                }
            }
        }

        debug!("Allocated {} input textures at {}", format, size);
        self.key = Some(key);
        stats.texture_reallocations += 1;
        Ok(())
    }

    /// Begin, convert, sharpen, end. A failed pass closes the frame without
    /// presenting anything.
    fn draw_frame(&mut self, format: PixelFormat, size: Resolution, options: &RenderOptions) -> Result<()> {
        self.output.clear();
        self.backend.begin_frame()?;

        let result = self
            .convert(format, size, options)
            .and_then(|()| self.process(size, options.sharpen));

        let presented = match result {
            Ok(()) => {
                let output = resolve_output(&self.inputs, &self.targets, &self.blit_target, self.output.get());
                match output {
                    Some(texture) => self.backend.present(Some(texture)),
                    None => {
                        self.backend.present(None)?;
                        Err(Error::Internal("no pass produced an output".into()))
                    }
                }
            }
            Err(e) => {
                self.backend.present(None)?;
                Err(e)
            }
        };

        self.output.clear();
        presented
    }

    /// Format dispatch: run the conversion for `format` into a presentable texture
    fn convert(&mut self, format: PixelFormat, size: Resolution, options: &RenderOptions) -> Result<()> {
        let DeviceResources {
            inputs,
            blit_target,
            targets,
            output,
            backend,
            ..
        } = self;

        let planes = format.texture_planes();
        let first = *planes
            .first()
            .ok_or_else(|| Error::UnsupportedFormat(format.to_string()))?;
        let input = |plane: PixelPlane| {
            inputs[plane.index()]
                .as_ref()
                .ok_or_else(|| Error::Internal(format!("no input texture for {:?}", plane)))
        };

        match backend.conversion_path(format, options.color_matrix)? {
            ConversionPath::Direct => {
                input(first)?;
                output.set(Stage::Input(first));
            }
            ConversionPath::Blit => {
                let src = input(first)?;
                let dst = blit_target
                    .as_mut()
                    .ok_or_else(|| Error::Internal("no blit target".into()))?;
                backend.blit(src, dst)?;
                output.set(Stage::Blit);
            }
            ConversionPath::Shader(shader) => {
                let views = match format {
                    PixelFormat::Nv12 => {
                        let nv12 = input(PixelPlane::Nv12)?;
                        vec![
                            (0, view_of::<B>(nv12, ViewKind::Luma)?),
                            (1, view_of::<B>(nv12, ViewKind::Chroma)?),
                        ]
                    }
                    _ => planes
                        .iter()
                        .enumerate()
                        .map(|(slot, plane)| Ok((slot as u32, view_of::<B>(input(*plane)?, ViewKind::Full)?)))
                        .collect::<Result<Vec<_>>>()?,
                };

                let TargetSet {
                    render_targets,
                    point,
                    linear,
                    ..
                } = targets.as_mut().ok_or(Error::NotInitialized)?;
                let target = render_targets[shader.index()]
                    .as_mut()
                    .ok_or_else(|| Error::Internal(format!("no render target for {:?}", shader)))?;

                let desc = *target.desc();
                // The quad samples the whole input texture, padding included
                let (width, height) = plane::texture_size(first, format, size.width, size.height);
                let transform = if options.preserve_aspect {
                    Transform::aspect_fit(width, height, desc.width, desc.height, options.rotation)
                } else {
                    Transform {
                        rotation: options.rotation,
                        ..Transform::IDENTITY
                    }
                };

                target.set_transform(&transform);
                target.begin()?;
                for (slot, view) in &views {
                    target.ps_set_texture(*slot, Some(view));
                }
                target.ps_set_samplers(0, Some(&*linear));
                target.ps_set_samplers(1, Some(&*point));
                let drawn = target.draw();
                for (slot, _) in &views {
                    target.ps_set_texture(*slot, None);
                }
                target.end();
                drawn?;

                output.set(Stage::Target(shader));
            }
        }
        Ok(())
    }

    /// Optional unsharp pass over the current output
    fn process(&mut self, size: Resolution, unsharp: f32) -> Result<()> {
        if unsharp <= 0.0 {
            return Ok(());
        }

        let source = resolve_output(&self.inputs, &self.targets, &self.blit_target, self.output.get())
            .ok_or_else(|| Error::Internal("sharpen pass has no input".into()))?;
        let view = view_of::<B>(source, ViewKind::Full)?;

        let DeviceResources {
            targets,
            output,
            backend,
            ..
        } = self;
        let TargetSet {
            render_targets,
            point,
            linear,
            constants,
        } = targets.as_mut().ok_or(Error::NotInitialized)?;

        backend.update_constants(constants, &ShaderConstants::new(size.width, size.height, unsharp))?;

        let target = render_targets[PixelShader::Sharpen.index()]
            .as_mut()
            .ok_or_else(|| Error::Internal("no sharpen target".into()))?;
        target.set_transform(&Transform::IDENTITY);
        target.begin()?;
        target.ps_set_texture(0, Some(&view));
        target.ps_set_constant(0, Some(&*constants));
        target.ps_set_samplers(0, Some(&*linear));
        target.ps_set_samplers(1, Some(&*point));
        let drawn = target.draw();
        target.ps_set_texture(0, None);
        target.ps_set_constant(0, None);
        target.end();
        drawn?;

        output.set(Stage::Target(PixelShader::Sharpen));
        Ok(())
    }
}

fn view_of<B: Backend>(texture: &B::Texture, kind: ViewKind) -> Result<B::View> {
    B::texture_view(texture, kind)
        .ok_or_else(|| Error::Internal(format!("texture has no {:?} view", kind)))
}

fn resolve_output<'a, B: Backend>(
    inputs: &'a [Option<B::Texture>; PixelPlane::COUNT],
    targets: &'a Option<TargetSet<B>>,
    blit_target: &'a Option<B::Texture>,
    stage: Option<Stage>,
) -> Option<&'a B::Texture> {
    match stage? {
        Stage::Input(plane) => inputs[plane.index()].as_ref(),
        Stage::Target(shader) => targets
            .as_ref()?
            .render_targets[shader.index()]
            .as_ref()
            .map(|t| t.texture()),
        Stage::Blit => blit_target.as_ref(),
    }
}

struct RendererState<B: Backend> {
    window: Option<Arc<dyn RenderWindow>>,
    device: Option<DeviceResources<B>>,
    options: RenderOptions,
    stats: RenderStats,
}

impl<B: Backend> RendererState<B> {
    fn destroy(&mut self) {
        self.device = None;
        self.window = None;
    }

    fn init(
        &mut self,
        adapter: &B::Adapter,
        shaders: &Arc<ShaderLibrary>,
        window: Arc<dyn RenderWindow>,
    ) -> Result<()> {
        self.destroy();

        let backend = B::create(adapter, window.as_ref(), Arc::clone(shaders))?;
        let size = backend.back_buffer_size();
        self.device = Some(DeviceResources::new(backend)?);
        self.window = Some(window);

        info!("{} renderer initialized ({})", B::KIND, size);
        Ok(())
    }

    fn resize(&mut self, adapter: &B::Adapter, shaders: &Arc<ShaderLibrary>) -> Result<()> {
        let window = self.window.clone().ok_or(Error::NotInitialized)?;
        let device = self.device.as_mut().ok_or(Error::NotInitialized)?;

        let size = window.client_size()?;
        if size.is_empty() {
            return Err(Error::Window(format!("client area is {}", size)));
        }

        device.release_frame_resources();
        let result = device.backend.resize_buffers(size).and_then(|()| {
            device.targets = Some(TargetSet::create(&mut device.backend)?);
            Ok(())
        });

        match result {
            Ok(()) => {
                self.stats.resizes += 1;
                info!("Resized to {}", size);
                Ok(())
            }
            Err(e) if e.is_device_lost() => {
                warn!("Device lost during resize: {}", e);
                self.stats.device_resets += 1;
                self.init(adapter, shaders, window)
            }
            Err(e) => {
                self.destroy();
                Err(e)
            }
        }
    }

    /// Map a frame result to an outcome, rebuilding the device if it was lost
    fn finish(
        &mut self,
        result: Result<()>,
        adapter: &B::Adapter,
        shaders: &Arc<ShaderLibrary>,
    ) -> FrameOutcome {
        match result {
            Ok(()) => {
                self.stats.frames_presented += 1;
                FrameOutcome::Presented
            }
            Err(e) if e.is_device_lost() => {
                warn!("Device lost at present: {}", e);
                let Some(window) = self.window.clone() else {
                    self.destroy();
                    return FrameOutcome::Dropped;
                };
                self.stats.device_resets += 1;
                match self.init(adapter, shaders, window) {
                    Ok(()) => FrameOutcome::DeviceReset,
                    Err(e) => {
                        error!("Re-initialization after device loss failed: {}", e);
                        self.stats.frames_dropped += 1;
                        FrameOutcome::Dropped
                    }
                }
            }
            Err(e) => {
                debug!("Dropped frame: {}", e);
                self.stats.frames_dropped += 1;
                FrameOutcome::Dropped
            }
        }
    }
}

/// [`Renderer`] over any [`Backend`]
pub struct FrameRenderer<B: Backend> {
    adapter: B::Adapter,
    shaders: Arc<ShaderLibrary>,
    state: Mutex<RendererState<B>>,
}

impl<B: Backend> FrameRenderer<B> {
    pub fn new(adapter: B::Adapter, shaders: ShaderLibrary, options: RenderOptions) -> Self {
        Self {
            adapter,
            shaders: Arc::new(shaders),
            state: Mutex::new(RendererState {
                window: None,
                device: None,
                options: RenderOptions {
                    sharpen: clamp_sharpen(options.sharpen),
                    ..options
                },
                stats: RenderStats::default(),
            }),
        }
    }

    pub fn adapter(&self) -> &B::Adapter {
        &self.adapter
    }

    pub fn options(&self) -> RenderOptions {
        self.state.lock().options
    }

    /// Back buffer size, if initialized
    pub fn size(&self) -> Option<Resolution> {
        self.state
            .lock()
            .device
            .as_ref()
            .map(|d| d.backend.back_buffer_size())
    }
}

impl<B: Backend> Renderer for FrameRenderer<B> {
    fn init(&self, window: Arc<dyn RenderWindow>) -> Result<()> {
        let mut state = self.state.lock();
        let result = state.init(&self.adapter, &self.shaders, window);
        if let Err(e) = &result {
            warn!("{} renderer init failed: {}", B::KIND, e);
            state.destroy();
        }
        result
    }

    fn resize(&self) -> Result<()> {
        self.state.lock().resize(&self.adapter, &self.shaders)
    }

    fn render(&self, frame: &PixelFrame<'_>) -> FrameOutcome {
        let mut state = self.state.lock();
        let state = &mut *state;
        let result = match state.device.as_mut() {
            Some(device) => device.render_frame(frame, &state.options, &mut state.stats),
            None => Err(Error::NotInitialized),
        };
        state.finish(result, &self.adapter, &self.shaders)
    }

    fn render_surface(&self, surface: &HardwareSurface) -> FrameOutcome {
        let mut state = self.state.lock();
        let state = &mut *state;
        let result = match state.device.as_mut() {
            Some(device) => device.render_surface(surface, &state.options, &mut state.stats),
            None => Err(Error::NotInitialized),
        };
        state.finish(result, &self.adapter, &self.shaders)
    }

    fn destroy(&self) {
        self.state.lock().destroy();
        info!("{} renderer destroyed", B::KIND);
    }

    fn set_sharpen(&self, amount: f32) {
        self.state.lock().options.sharpen = clamp_sharpen(amount);
    }

    fn set_color_matrix(&self, matrix: ColorMatrix) {
        self.state.lock().options.color_matrix = matrix;
    }

    fn set_preserve_aspect(&self, preserve: bool) {
        self.state.lock().options.preserve_aspect = preserve;
    }

    fn set_rotation(&self, rotation: Rotation) {
        self.state.lock().options.rotation = rotation;
    }

    fn is_ready(&self) -> bool {
        self.state.lock().device.is_some()
    }

    fn backend(&self) -> BackendKind {
        B::KIND
    }

    fn stats(&self) -> RenderStats {
        self.state.lock().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::{Image, SoftAdapter, SoftBackend};
    use crate::pattern::{self, Pattern};
    use crate::types::{FrameBuffer, SurfaceHandle};
    use crate::window::HeadlessWindow;
    use std::thread;

    const WHITE: [u8; 3] = [255, 255, 255];

    fn setup(width: u32, height: u32) -> (SoftAdapter, Arc<HeadlessWindow>, FrameRenderer<SoftBackend>) {
        let adapter = SoftAdapter::new();
        let window = Arc::new(HeadlessWindow::new(width, height));
        let renderer = FrameRenderer::<SoftBackend>::new(adapter.clone(), ShaderLibrary::new(), RenderOptions::default());
        renderer.init(window.clone()).unwrap();
        (adapter, window, renderer)
    }

    fn presented(adapter: &SoftAdapter) -> Image {
        adapter.last_presented().expect("nothing presented")
    }

    fn assert_close(actual: [u8; 4], expected: [u8; 3], tolerance: u8) {
        for i in 0..3 {
            assert!(
                actual[i].abs_diff(expected[i]) <= tolerance,
                "got {:?}, expected {:?}",
                actual,
                expected
            );
        }
    }

    /// Same image with `padding` extra bytes on every row
    fn padded(frame: &FrameBuffer, padding: usize) -> FrameBuffer {
        let mut out = FrameBuffer::with_padding(frame.width, frame.height, frame.format, padding);
        for (index, plane) in frame.planes.iter().enumerate() {
            let pitch = frame.pitches[index];
            let out_pitch = out.pitches[index];
            for (row, src) in plane.chunks(pitch).enumerate() {
                out.planes[index][row * out_pitch..row * out_pitch + pitch].copy_from_slice(src);
            }
        }
        out
    }

    fn edge_frame() -> FrameBuffer {
        let rgb: Vec<[u8; 3]> = (0..32u32)
            .flat_map(|_| (0..32u32).map(|x| if x < 16 { [0, 0, 0] } else { [128, 128, 128] }))
            .collect();
        pattern::from_rgb(&rgb, 32, 32, PixelFormat::Argb, ColorMatrix::Bt601)
    }

    #[test]
    fn test_every_format_presents() {
        let (adapter, _window, renderer) = setup(64, 48);
        for format in [PixelFormat::Argb, PixelFormat::I420, PixelFormat::I444, PixelFormat::Nv12] {
            let frame = Pattern::Bars.frame(40, 30, format, ColorMatrix::Bt601, 0);
            assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented, "{}", format);
        }
        assert_eq!(adapter.present_count(), 4);
        assert_eq!(renderer.stats().frames_presented, 4);
    }

    #[test]
    fn test_argb_solid_fills_window() {
        let (adapter, _window, renderer) = setup(32, 32);
        let frame = Pattern::Solid([255, 0, 0]).frame(32, 32, PixelFormat::Argb, ColorMatrix::Bt601, 0);
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);

        let image = presented(&adapter);
        assert_eq!(image.resolution(), Resolution::new(32, 32));
        assert_eq!(image.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(31, 31), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_yuv_ramps_match_matrix() {
        for matrix in [ColorMatrix::Bt601, ColorMatrix::Bt709] {
            for format in [PixelFormat::I420, PixelFormat::I444, PixelFormat::Nv12] {
                let (adapter, _window, renderer) = setup(64, 64);
                renderer.set_color_matrix(matrix);
                let frame = pattern::yuv_ramp(64, 64, format);
                assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);

                let image = presented(&adapter);
                for (x, y) in [(0, 0), (13, 7), (32, 40), (63, 63)] {
                    let yuv = pattern::yuv_at(&frame, x, y).unwrap();
                    let pixel = image.pixel(x, y).unwrap();
                    assert_close(pixel, matrix.yuv_to_rgb_u8(yuv), 1);
                }
            }
        }
    }

    #[test]
    fn test_solid_colors_survive_conversion() {
        let (adapter, _window, renderer) = setup(16, 16);
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], WHITE] {
            for format in [PixelFormat::I420, PixelFormat::Nv12, PixelFormat::I444] {
                let frame = Pattern::Solid(rgb).frame(16, 16, format, ColorMatrix::Bt601, 0);
                renderer.render(&frame.as_frame());
                assert_close(presented(&adapter).pixel(8, 8).unwrap(), rgb, 4);
            }
        }
    }

    #[test]
    fn test_padded_pitch_matches_packed() {
        for format in [PixelFormat::Argb, PixelFormat::I420, PixelFormat::I444, PixelFormat::Nv12] {
            let (adapter, _window, renderer) = setup(31, 17);
            let frame = Pattern::Ramp.frame(31, 17, format, ColorMatrix::Bt601, 0);

            renderer.render(&frame.as_frame());
            let packed = presented(&adapter);
            renderer.render(&padded(&frame, 13).as_frame());
            assert_eq!(presented(&adapter), packed, "{}", format);
        }
    }

    #[test]
    fn test_letterbox_and_resize() {
        let (adapter, window, renderer) = setup(64, 64);
        let frame = Pattern::Solid(WHITE).frame(64, 16, PixelFormat::Argb, ColorMatrix::Bt601, 0);

        renderer.render(&frame.as_frame());
        let image = presented(&adapter);
        assert_eq!(image.pixel(32, 0), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(32, 32), Some([255, 255, 255, 255]));
        assert_eq!(image.pixel(32, 63), Some([0, 0, 0, 255]));

        window.set_size(32, 64);
        renderer.resize().unwrap();
        assert_eq!(renderer.size(), Some(Resolution::new(32, 64)));

        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
        let image = presented(&adapter);
        assert_eq!(image.resolution(), Resolution::new(32, 64));
        assert_eq!(image.pixel(16, 20), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(16, 32), Some([255, 255, 255, 255]));
        assert_eq!(renderer.stats().resizes, 1);
    }

    #[test]
    fn test_stretch_fills_window() {
        let (adapter, _window, renderer) = setup(64, 64);
        renderer.set_preserve_aspect(false);
        let frame = Pattern::Solid(WHITE).frame(64, 16, PixelFormat::Argb, ColorMatrix::Bt601, 0);

        renderer.render(&frame.as_frame());
        assert_eq!(presented(&adapter).pixel(32, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_format_switch_reallocates_inputs() {
        let (adapter, _window, renderer) = setup(64, 64);
        let i420 = Pattern::Bars.frame(48, 32, PixelFormat::I420, ColorMatrix::Bt601, 0);
        let nv12 = Pattern::Bars.frame(48, 32, PixelFormat::Nv12, ColorMatrix::Bt601, 0);

        renderer.render(&i420.as_frame());
        let with_i420 = adapter.live_textures();
        renderer.render(&i420.as_frame());
        assert_eq!(adapter.live_textures(), with_i420);

        renderer.render(&nv12.as_frame());
        assert_eq!(adapter.live_textures(), with_i420 - 2);

        renderer.render(&i420.as_frame());
        assert_eq!(adapter.live_textures(), with_i420);
        assert_eq!(renderer.stats().texture_reallocations, 3);

        renderer.destroy();
        assert_eq!(adapter.live_textures(), 0);
    }

    #[test]
    fn test_sharpen_pass() {
        let (adapter, _window, renderer) = setup(32, 32);
        let frame = edge_frame();

        renderer.render(&frame.as_frame());
        assert_close(presented(&adapter).pixel(16, 10).unwrap(), [128, 128, 128], 1);

        renderer.set_sharpen(2.0);
        renderer.render(&frame.as_frame());
        let image = presented(&adapter);
        assert_close(image.pixel(16, 10).unwrap(), [192, 192, 192], 2);
        assert_close(image.pixel(24, 10).unwrap(), [128, 128, 128], 1);

        renderer.set_sharpen(100.0);
        assert_eq!(renderer.options().sharpen, crate::render::MAX_SHARPEN);
        renderer.set_sharpen(0.0);
        renderer.render(&frame.as_frame());
        assert_close(presented(&adapter).pixel(16, 10).unwrap(), [128, 128, 128], 1);
    }

    #[test]
    fn test_device_loss_at_present_reinitializes() {
        let (adapter, _window, renderer) = setup(32, 32);
        let frame = Pattern::Bars.frame(32, 32, PixelFormat::Nv12, ColorMatrix::Bt601, 0);

        adapter.lose_device_on_next_present();
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::DeviceReset);
        assert!(renderer.is_ready());
        assert_eq!(adapter.devices_created(), 2);
        assert_eq!(renderer.stats().device_resets, 1);

        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
    }

    #[test]
    fn test_failed_reinit_drops_frame() {
        let (adapter, _window, renderer) = setup(32, 32);
        let frame = Pattern::Bars.frame(32, 32, PixelFormat::Argb, ColorMatrix::Bt601, 0);

        adapter.lose_device_on_next_present();
        adapter.fail_next_device_creations(1);
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Dropped);
        assert!(!renderer.is_ready());
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Dropped);
    }

    #[test]
    fn test_device_loss_during_resize() {
        let (adapter, window, renderer) = setup(32, 32);
        adapter.lose_device_on_next_resize();
        window.set_size(48, 40);

        renderer.resize().unwrap();
        assert!(renderer.is_ready());
        assert_eq!(renderer.size(), Some(Resolution::new(48, 40)));
        assert_eq!(adapter.devices_created(), 2);
    }

    #[test]
    fn test_empty_client_area_keeps_device() {
        let (_adapter, window, renderer) = setup(32, 32);
        window.set_size(0, 32);

        assert!(matches!(renderer.resize(), Err(Error::Window(_))));
        assert!(renderer.is_ready());
        assert_eq!(renderer.size(), Some(Resolution::new(32, 32)));
    }

    #[test]
    fn test_init_failure_leaves_uninitialized() {
        let adapter = SoftAdapter::new();
        let renderer = FrameRenderer::<SoftBackend>::new(adapter.clone(), ShaderLibrary::new(), RenderOptions::default());
        let window = Arc::new(HeadlessWindow::new(32, 32));

        adapter.fail_next_device_creations(1);
        assert!(matches!(renderer.init(window.clone()), Err(Error::DeviceCreation(_))));
        assert!(!renderer.is_ready());
        assert!(matches!(renderer.resize(), Err(Error::NotInitialized)));

        renderer.init(window).unwrap();
        assert!(renderer.is_ready());
    }

    #[test]
    fn test_render_before_init_is_dropped() {
        let renderer =
            FrameRenderer::<SoftBackend>::new(SoftAdapter::new(), ShaderLibrary::new(), RenderOptions::default());
        let frame = Pattern::Bars.frame(8, 8, PixelFormat::I420, ColorMatrix::Bt601, 0);

        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Dropped);
        assert_eq!(renderer.stats().frames_dropped, 1);
    }

    #[test]
    fn test_invalid_frame_is_dropped() {
        let (adapter, _window, renderer) = setup(16, 16);
        let mut frame = Pattern::Bars.frame(16, 16, PixelFormat::I420, ColorMatrix::Bt601, 0);
        frame.planes[1].truncate(10);

        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Dropped);
        assert!(renderer.is_ready());
        assert_eq!(adapter.present_count(), 0);
    }

    #[test]
    fn test_destroy_then_reinit() {
        let (adapter, window, renderer) = setup(32, 32);
        renderer.destroy();
        assert!(!renderer.is_ready());
        assert_eq!(adapter.live_textures(), 0);

        renderer.init(window).unwrap();
        let frame = Pattern::Bars.frame(32, 32, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
    }

    #[test]
    fn test_shared_surface_array_slice() {
        let (adapter, _window, renderer) = setup(32, 32);
        let surfaces = adapter.create_surface_texture(32, 32, PixelFormat::Nv12, 4).unwrap();
        let green = Pattern::Solid([0, 255, 0]).frame(32, 32, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
        surfaces.upload(2, &green.as_frame()).unwrap();
        let handle = adapter.share_texture(&surfaces);

        let surface = HardwareSurface::nv12(SurfaceHandle::Shared(handle), 2, 32, 32);
        assert_eq!(renderer.render_surface(&surface), FrameOutcome::Presented);
        assert_close(presented(&adapter).pixel(16, 16).unwrap(), [0, 255, 0], 4);

        let id = adapter.register_surface(surfaces);
        let surface = HardwareSurface::nv12(SurfaceHandle::Registered(id), 2, 32, 32);
        assert_eq!(renderer.render_surface(&surface), FrameOutcome::Presented);

        adapter.close_shared(handle);
        let stale = HardwareSurface::nv12(SurfaceHandle::Shared(handle), 2, 32, 32);
        assert_eq!(renderer.render_surface(&stale), FrameOutcome::Dropped);
    }

    #[test]
    fn test_argb_capture_surface() {
        let (adapter, _window, renderer) = setup(16, 16);
        let capture = adapter.create_surface_texture(16, 16, PixelFormat::Argb, 1).unwrap();
        let blue = Pattern::Solid([0, 0, 255]).frame(16, 16, PixelFormat::Argb, ColorMatrix::Bt601, 0);
        capture.upload(0, &blue.as_frame()).unwrap();
        let id = adapter.register_surface(capture);

        let surface = HardwareSurface::argb(SurfaceHandle::Registered(id), 16, 16);
        assert_eq!(renderer.render_surface(&surface), FrameOutcome::Presented);
        assert_eq!(presented(&adapter).pixel(3, 3), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_oversized_surface_is_clamped() {
        let (adapter, _window, renderer) = setup(32, 32);
        let capture = adapter.create_surface_texture(16, 16, PixelFormat::Argb, 1).unwrap();
        let blue = Pattern::Solid([0, 0, 255]).frame(16, 16, PixelFormat::Argb, ColorMatrix::Bt601, 0);
        capture.upload(0, &blue.as_frame()).unwrap();
        let id = adapter.register_surface(capture);

        // Declared larger than the texture behind it
        let surface = HardwareSurface::argb(SurfaceHandle::Registered(id), 32, 32);
        assert_eq!(renderer.render_surface(&surface), FrameOutcome::Presented);

        let image = presented(&adapter);
        assert_close(image.pixel(3, 3).unwrap(), [0, 0, 255], 0);
        assert_close(image.pixel(24, 24).unwrap(), [0, 0, 0], 0);
    }

    #[test]
    fn test_resize_idempotent() {
        let (adapter, _window, renderer) = setup(100, 60);
        let frame = Pattern::Bars.frame(40, 40, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
        renderer.render(&frame.as_frame());
        let before = presented(&adapter);

        renderer.resize().unwrap();
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
        let first = presented(&adapter);
        renderer.resize().unwrap();
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
        let second = presented(&adapter);

        assert_eq!(first.resolution(), Resolution::new(100, 60));
        assert_eq!(first, second);
        assert_eq!(first, before);
        assert_eq!(renderer.stats().resizes, 2);
    }

    #[test]
    fn test_nv12_letterbox_across_resize() {
        const BLACK: Option<[u8; 4]> = Some([0, 0, 0, 255]);
        let (adapter, window, renderer) = setup(100, 60);
        let frame = Pattern::Solid(WHITE).frame(64, 48, PixelFormat::Nv12, ColorMatrix::Bt601, 0);

        // 4:3 in a wider window: bars left and right, content spans x 10..90
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
        let image = presented(&adapter);
        assert_eq!(image.pixel(5, 30), BLACK);
        assert_eq!(image.pixel(95, 30), BLACK);
        for (x, y) in [(11, 30), (50, 30), (88, 30), (50, 0), (50, 59)] {
            assert_close(image.pixel(x, y).unwrap(), WHITE, 4);
        }

        // Taller window: bars top and bottom, content spans y 15..75
        window.set_size(80, 90);
        renderer.resize().unwrap();
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);
        let image = presented(&adapter);
        assert_eq!(image.resolution(), Resolution::new(80, 90));
        assert_eq!(image.pixel(40, 13), BLACK);
        assert_eq!(image.pixel(40, 76), BLACK);
        for (x, y) in [(40, 16), (40, 45), (40, 73), (0, 45), (79, 45)] {
            assert_close(image.pixel(x, y).unwrap(), WHITE, 4);
        }
    }

    #[test]
    fn test_odd_nv12_fills_padded_aspect() {
        // 15x5 is stored as 16x6, the same shape as the window
        let (adapter, _window, renderer) = setup(64, 24);
        let frame = Pattern::Solid(WHITE).frame(15, 5, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
        assert_eq!(renderer.render(&frame.as_frame()), FrameOutcome::Presented);

        let image = presented(&adapter);
        for (x, y) in [(32, 0), (32, 23), (0, 12), (63, 12), (63, 23)] {
            assert_close(image.pixel(x, y).unwrap(), WHITE, 4);
        }
    }

    #[test]
    fn test_concurrent_render_and_resize() {
        let (_adapter, window, renderer) = setup(64, 64);
        let renderer = Arc::new(renderer);

        let decode = {
            let renderer = Arc::clone(&renderer);
            thread::spawn(move || {
                let frame = Pattern::Bars.frame(32, 24, PixelFormat::Nv12, ColorMatrix::Bt601, 0);
                (0..40)
                    .map(|_| renderer.render(&frame.as_frame()))
                    .filter(|outcome| *outcome == FrameOutcome::Presented)
                    .count()
            })
        };

        for i in 0..10u32 {
            window.set_size(32 + i * 4, 32 + i * 2);
            renderer.resize().unwrap();
        }

        assert_eq!(decode.join().unwrap(), 40);
        assert_eq!(renderer.stats().resizes, 10);
    }
}
