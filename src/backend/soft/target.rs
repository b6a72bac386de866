//! Render targets and pipeline state of the software backend

use super::kernels::{self, Bindings, Fragment, MAX_SAMPLER_SLOTS, MAX_TEXTURE_SLOTS};
use super::texture::{SoftTexture, SoftView};
use super::SoftBackend;
use crate::color::to_u8;
use crate::error::Result;
use crate::plane::TextureFormat;
use crate::render::{RenderTexture, SamplerKind, TextureDesc};
use crate::transform::{pixel_to_device, quad_texcoord, ShaderConstants, Transform};
use crate::types::ShaderProgram;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct SoftSampler(pub SamplerKind);

/// Pixel shader constant buffer
#[derive(Debug, Clone, Default)]
pub struct SoftBuffer(pub(crate) Arc<Mutex<ShaderConstants>>);

impl SoftBuffer {
    pub fn get(&self) -> ShaderConstants {
        *self.0.lock()
    }
}

/// Bound output-merger and pixel shader state, the "immediate context"
#[derive(Default)]
pub(crate) struct ContextState {
    pub render_targets: Vec<SoftTexture>,
    views: [Option<SoftView>; MAX_TEXTURE_SLOTS],
    samplers: [Option<SamplerKind>; MAX_SAMPLER_SLOTS],
    constants: Option<SoftBuffer>,
}

#[derive(Clone, Default)]
pub(crate) struct SoftContext(Arc<Mutex<ContextState>>);

impl SoftContext {
    pub fn bind_render_target(&self, texture: &SoftTexture) {
        self.0.lock().render_targets = vec![texture.clone()];
    }

    pub fn unbind_render_targets(&self) {
        self.0.lock().render_targets.clear();
    }

    fn swap_render_targets(&self, targets: Vec<SoftTexture>) -> Vec<SoftTexture> {
        std::mem::replace(&mut self.0.lock().render_targets, targets)
    }
}

/// Render texture drawing through [`kernels`]
pub struct SoftRenderTexture {
    texture: SoftTexture,
    program: ShaderProgram,
    transform: Transform,
    context: SoftContext,
    cached: Option<Vec<SoftTexture>>,
}

impl SoftRenderTexture {
    pub(crate) fn new(texture: SoftTexture, program: ShaderProgram, context: SoftContext) -> Self {
        Self {
            texture,
            program,
            transform: Transform::IDENTITY,
            context,
            cached: None,
        }
    }

    pub fn program(&self) -> ShaderProgram {
        self.program
    }

    fn run(&self, bindings: &Bindings<'_>) {
        let desc = *self.texture.desc();
        let pitch = self.texture.row_pitch();
        let (width, height) = (desc.width, desc.height);
        let mut data = self.texture.write_guard();

        let fragment_at = |x: u32, y: u32, w: u32, h: u32| -> Option<Fragment> {
            let (nx, ny) = pixel_to_device(x, y, w, h);
            let (qx, qy) = self.transform.invert(nx, ny)?;
            let (u, v) = quad_texcoord(qx, qy)?;
            Some(kernels::shade(self.program, bindings, u, v))
        };

        match desc.format {
            TextureFormat::Nv12 => {
                // Both planes bound at once: the pass runs over the luma
                // viewport and target1 only lands inside the chroma plane
                let (luma, chroma) = data.split_at_mut(pitch * height as usize);
                let (cw, ch) = (width / 2, height / 2);
                for y in 0..height {
                    for x in 0..width {
                        let Some(fragment) = fragment_at(x, y, width, height) else {
                            continue;
                        };
                        luma[y as usize * pitch + x as usize] = to_u8(fragment.target0[0]);
                        if x < cw && y < ch {
                            let at = y as usize * pitch + x as usize * 2;
                            chroma[at] = to_u8(fragment.target1[0]);
                            chroma[at + 1] = to_u8(fragment.target1[1]);
                        }
                    }
                }
            }
            format => {
                let texel = format.bytes_per_texel();
                for y in 0..height {
                    for x in 0..width {
                        let Some(fragment) = fragment_at(x, y, width, height) else {
                            continue;
                        };
                        let [r, g, b, a] = fragment.target0.map(to_u8);
                        let at = y as usize * pitch + x as usize * texel;
                        match format {
                            TextureFormat::Rgba8 => data[at..at + 4].copy_from_slice(&[r, g, b, a]),
                            TextureFormat::Bgra8 => data[at..at + 4].copy_from_slice(&[b, g, r, a]),
                            _ => data[at] = r,
                        }
                    }
                }
            }
        }
    }
}

impl RenderTexture<SoftBackend> for SoftRenderTexture {
    fn desc(&self) -> &TextureDesc {
        self.texture.desc()
    }

    fn texture(&self) -> &SoftTexture {
        &self.texture
    }

    fn set_transform(&mut self, transform: &Transform) {
        self.transform = *transform;
    }

    fn begin(&mut self) -> Result<()> {
        let previous = self.context.swap_render_targets(vec![self.texture.clone()]);
        if self.cached.is_none() {
            self.cached = Some(previous);
        }
        self.texture.clear();
        Ok(())
    }

    fn ps_set_texture(&mut self, slot: u32, view: Option<&SoftView>) {
        if let Some(entry) = self.context.0.lock().views.get_mut(slot as usize) {
            *entry = view.cloned();
        }
    }

    fn ps_set_constant(&mut self, slot: u32, buffer: Option<&SoftBuffer>) {
        if slot == 0 {
            self.context.0.lock().constants = buffer.cloned();
        }
    }

    fn ps_set_samplers(&mut self, slot: u32, sampler: Option<&SoftSampler>) {
        if let Some(entry) = self.context.0.lock().samplers.get_mut(slot as usize) {
            *entry = sampler.map(|s| s.0);
        }
    }

    fn draw(&mut self) -> Result<()> {
        if !self.is_drawing() {
            return Ok(());
        }

        let (views, samplers, constants) = {
            let state = self.context.0.lock();
            (
                state.views.clone(),
                state.samplers,
                state.constants.as_ref().map(SoftBuffer::get).unwrap_or_default(),
            )
        };

        // A texture cannot be sampled while it is the render target
        let mut bound: [Option<_>; MAX_TEXTURE_SLOTS] = Default::default();
        for (slot, view) in views.iter().enumerate() {
            if let Some(view) = view {
                if !view.texture().same_texture(&self.texture) {
                    bound[slot] = Some(view.bind()?);
                }
            }
        }

        self.run(&Bindings {
            views: bound,
            samplers,
            constants,
        });
        Ok(())
    }

    fn end(&mut self) {
        if let Some(previous) = self.cached.take() {
            self.context.swap_render_targets(previous);
        }
    }

    fn is_drawing(&self) -> bool {
        self.cached.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TextureUsage, ViewKind};
    use crate::types::PixelShader;
    use std::sync::atomic::AtomicUsize;

    fn texture(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> SoftTexture {
        SoftTexture::new(
            TextureDesc::new(width, height, format, usage),
            &Arc::new(AtomicUsize::new(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_draw_without_begin_is_noop() {
        let context = SoftContext::default();
        let target = texture(4, 4, TextureFormat::Rgba8, TextureUsage::RenderTarget);
        let mut pass = SoftRenderTexture::new(target.clone(), PixelShader::Argb.into(), context);
        pass.draw().unwrap();
        assert!(target.read_slice(0).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_begin_end_restores_targets() {
        let context = SoftContext::default();
        let back_buffer = texture(4, 4, TextureFormat::Rgba8, TextureUsage::RenderTarget);
        context.bind_render_target(&back_buffer);

        let target = texture(4, 4, TextureFormat::Rgba8, TextureUsage::RenderTarget);
        let mut pass = SoftRenderTexture::new(target.clone(), PixelShader::Argb.into(), context.clone());
        pass.begin().unwrap();
        assert!(pass.is_drawing());
        assert!(context.0.lock().render_targets[0].same_texture(&target));
        pass.end();
        assert!(!pass.is_drawing());
        assert!(context.0.lock().render_targets[0].same_texture(&back_buffer));
    }

    #[test]
    fn test_argb_pass_copies_and_letterboxes() {
        let context = SoftContext::default();
        let source = texture(2, 2, TextureFormat::Bgra8, TextureUsage::Dynamic);
        source
            .map_write(&mut |map| {
                for row in 0..2 {
                    for px in map.data[row * map.row_pitch..row * map.row_pitch + 8].chunks_mut(4) {
                        px.copy_from_slice(&[0, 0, 255, 255]);
                    }
                }
                Ok(())
            })
            .unwrap();

        let target = texture(4, 4, TextureFormat::Rgba8, TextureUsage::RenderTarget);
        let mut pass = SoftRenderTexture::new(target.clone(), PixelShader::Argb.into(), context);
        pass.set_transform(&Transform {
            scale_x: 0.5,
            ..Transform::IDENTITY
        });
        pass.begin().unwrap();
        let view = SoftView::new(&source, ViewKind::Full, 0).unwrap();
        pass.ps_set_texture(0, Some(&view));
        pass.ps_set_samplers(0, Some(&SoftSampler(SamplerKind::Point)));
        pass.draw().unwrap();
        pass.end();

        let rgba = target.read_rgba().unwrap();
        let px = |x: usize, y: usize| &rgba[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        // Center columns are red, side bars stay black
        assert_eq!(px(1, 1), &[255, 0, 0, 255]);
        assert_eq!(px(2, 3), &[255, 0, 0, 255]);
        assert_eq!(px(0, 0), &[0, 0, 0, 255]);
        assert_eq!(px(3, 2), &[0, 0, 0, 255]);
    }
}
