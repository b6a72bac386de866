//! Render-to-texture pass on D3D11

use super::texture::{D3d11Texture, D3d11View};
use super::{D3d11Backend, D3d11Buffer, D3d11Sampler};
use crate::error::Result;
use crate::render::{RenderTexture, TextureDesc};
use crate::transform::{Transform, Vertex, VertexConstants, QUAD_INDICES};
use windows::Win32::Graphics::Direct3D::D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST;
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Buffer, ID3D11DeviceContext, ID3D11InputLayout, ID3D11PixelShader,
    ID3D11RasterizerState, ID3D11RenderTargetView, ID3D11VertexShader, D3D11_VIEWPORT,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_R16_UINT;

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Quad geometry and vertex stage, shared by every pass of a device
#[derive(Clone)]
pub(crate) struct QuadPipeline {
    pub vertex_shader: ID3D11VertexShader,
    pub input_layout: ID3D11InputLayout,
    pub vertex_buffer: ID3D11Buffer,
    pub index_buffer: ID3D11Buffer,
    pub rasterizer: ID3D11RasterizerState,
}

/// One shader pass into an owned texture
pub struct D3d11RenderTexture {
    context: ID3D11DeviceContext,
    texture: D3d11Texture,
    render_targets: Vec<Option<ID3D11RenderTargetView>>,
    pixel_shader: ID3D11PixelShader,
    quad: QuadPipeline,
    vertex_constants: ID3D11Buffer,
    transform: Transform,
    cached: Option<[Option<ID3D11RenderTargetView>; 1]>,
}

unsafe impl Send for D3d11RenderTexture {}

impl D3d11RenderTexture {
    pub(crate) fn new(
        context: ID3D11DeviceContext,
        texture: D3d11Texture,
        render_targets: Vec<ID3D11RenderTargetView>,
        pixel_shader: ID3D11PixelShader,
        quad: QuadPipeline,
        vertex_constants: ID3D11Buffer,
    ) -> Self {
        Self {
            context,
            texture,
            render_targets: render_targets.into_iter().map(Some).collect(),
            pixel_shader,
            quad,
            vertex_constants,
            transform: Transform::IDENTITY,
            cached: None,
        }
    }
}

impl RenderTexture<D3d11Backend> for D3d11RenderTexture {
    fn desc(&self) -> &TextureDesc {
        &self.texture.desc
    }

    fn texture(&self) -> &D3d11Texture {
        &self.texture
    }

    fn set_transform(&mut self, transform: &Transform) {
        self.transform = *transform;
    }

    fn begin(&mut self) -> Result<()> {
        let desc = self.texture.desc;
        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: desc.width as f32,
            Height: desc.height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        update_buffer(&self.context, &self.vertex_constants, &VertexConstants::new(&self.transform));
        let buffers = [Some(self.quad.vertex_buffer.clone())];
        let strides = [std::mem::size_of::<Vertex>() as u32];
        let offsets = [0u32];

        unsafe {
            self.context.RSSetViewports(Some(&[viewport]));

            if self.cached.is_none() {
                let mut cached: [Option<ID3D11RenderTargetView>; 1] = [None];
                self.context.OMGetRenderTargets(Some(&mut cached), None);
                self.cached = Some(cached);
            }
            self.context.OMSetRenderTargets(None, None);
            self.context.OMSetRenderTargets(Some(&self.render_targets), None);
            for rtv in self.render_targets.iter().flatten() {
                self.context.ClearRenderTargetView(rtv, &BLACK);
            }

            self.context.RSSetState(&self.quad.rasterizer);
            self.context.IASetInputLayout(&self.quad.input_layout);
            self.context.VSSetShader(&self.quad.vertex_shader, None);
            self.context.IASetVertexBuffers(
                0,
                1,
                Some(buffers.as_ptr()),
                Some(strides.as_ptr()),
                Some(offsets.as_ptr()),
            );
            self.context.IASetIndexBuffer(&self.quad.index_buffer, DXGI_FORMAT_R16_UINT, 0);
            self.context.VSSetConstantBuffers(0, Some(&[Some(self.vertex_constants.clone())]));
            self.context.PSSetShader(&self.pixel_shader, None);
        }
        Ok(())
    }

    fn ps_set_texture(&mut self, slot: u32, view: Option<&D3d11View>) {
        unsafe {
            self.context.PSSetShaderResources(slot, Some(&[view.map(|v| v.0.clone())]));
        }
    }

    fn ps_set_constant(&mut self, slot: u32, buffer: Option<&D3d11Buffer>) {
        unsafe {
            self.context.PSSetConstantBuffers(slot, Some(&[buffer.map(|b| b.0.clone())]));
        }
    }

    fn ps_set_samplers(&mut self, slot: u32, sampler: Option<&D3d11Sampler>) {
        unsafe {
            self.context.PSSetSamplers(slot, Some(&[sampler.map(|s| s.0.clone())]));
        }
    }

    fn draw(&mut self) -> Result<()> {
        if !self.is_drawing() {
            return Ok(());
        }
        unsafe {
            self.context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            self.context.DrawIndexed(QUAD_INDICES.len() as u32, 0, 0);
            self.context.Flush();
        }
        Ok(())
    }

    fn end(&mut self) {
        if let Some(cached) = self.cached.take() {
            unsafe {
                self.context.OMSetRenderTargets(None, None);
                self.context.OMSetRenderTargets(Some(&cached), None);
            }
        }
    }

    fn is_drawing(&self) -> bool {
        self.cached.is_some()
    }
}

/// Overwrite a default-usage constant buffer with `value`
pub(crate) fn update_buffer<T: bytemuck::Pod>(context: &ID3D11DeviceContext, buffer: &ID3D11Buffer, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    unsafe {
        context.UpdateSubresource(buffer, 0, None, bytes.as_ptr().cast(), 0, 0);
    }
}
