//! wgpu renderer.
//!
//! [`GpuState`] owns the surface and one [`PoolRenderer`] per registered
//! pool. Each frame the viewer hands it the [`FrameReport`] from
//! [`VfxEngine::frame`](crate::engine::VfxEngine::frame); only the dirty
//! slot ranges are copied to the GPU before drawing.

mod camera;
mod pool_renderer;

use std::collections::BTreeMap;
use std::sync::Arc;

use winit::window::Window;

pub use camera::Camera;
pub use pool_renderer::PoolRenderer;

use crate::engine::FrameReport;
use crate::error::GpuError;
use crate::lifecycle::CameraBasis;
use crate::registry::PoolRegistry;
use crate::shader::ParticleUniforms;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Surface, device and per-pool resources.
pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// Current surface size and format.
    pub config: wgpu::SurfaceConfiguration,
    depth_texture: wgpu::TextureView,
    /// Renderers keyed by pool name, tagged with the registration they serve.
    pools: BTreeMap<String, (u64, PoolRenderer)>,
    /// Orbit camera the viewer steers.
    pub camera: Camera,
}

impl GpuState {
    /// Bring up wgpu on `window` and create resources for every pool.
    pub async fn new(window: Arc<Window>, registry: &PoolRegistry) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = create_depth_texture(&device, &config);

        let mut state = Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            pools: BTreeMap::new(),
            camera: Camera::new(),
        };
        state.sync_pools(registry);
        Ok(state)
    }

    /// Reconfigure the surface and depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = create_depth_texture(&self.device, &self.config);
        }
    }

    /// Create renderers for new pools and drop those of removed pools.
    ///
    /// A pool registered again under an old name gets a fresh renderer,
    /// since its capacity and pipeline may differ.
    pub fn sync_pools(&mut self, registry: &PoolRegistry) {
        self.pools
            .retain(|name, (generation, _)| !is_stale(registry, name, *generation));
        for (name, pool) in registry.iter() {
            if self.pools.contains_key(name) {
                continue;
            }
            let Some(generation) = registry.generation(name) else {
                continue;
            };
            let renderer = PoolRenderer::new(
                &self.device,
                &self.queue,
                self.config.format,
                name,
                pool,
            );
            self.pools.insert(name.to_string(), (generation, renderer));
        }
    }

    /// Copy the slots a frame wrote. Returns the bytes queued.
    pub fn upload(&mut self, registry: &PoolRegistry, report: &FrameReport) -> u64 {
        self.sync_pools(registry);
        let mut bytes = 0;
        for (name, range) in &report.dirty {
            if let (Some((_, renderer)), Some(pool)) = (self.pools.get(name), registry.get(name)) {
                bytes += renderer.upload(&self.queue, pool, range);
            }
        }
        if bytes > 0 {
            log::trace!("uploaded {} bytes", bytes);
        }
        bytes
    }

    /// Draw every pool as seen at `time`.
    pub fn render(&mut self, registry: &PoolRegistry, time: f32) -> Result<(), wgpu::SurfaceError> {
        let aspect = self.config.width as f32 / self.config.height as f32;
        let view_matrix = self.camera.view_matrix();
        let view_proj = self.camera.projection(aspect) * view_matrix;
        let basis = CameraBasis::from_view(&view_matrix);

        for (name, (_, renderer)) in &self.pools {
            if let Some(pool) = registry.get(name) {
                let uniforms = ParticleUniforms::new(view_proj, &basis, time, pool.settings());
                renderer.write_uniforms(&self.queue, &uniforms);
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (_, renderer) in self.pools.values() {
                renderer.draw(&mut render_pass);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Whether a renderer built for `generation` no longer matches the pool
/// registered as `name`.
fn is_stale(registry: &PoolRegistry, name: &str, generation: u64) -> bool {
    registry.generation(name) != Some(generation)
}
