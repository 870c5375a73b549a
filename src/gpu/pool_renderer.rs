//! GPU resources for one particle pool.
//!
//! Each pool gets one instance-rate vertex buffer per [`Attribute`], sized
//! for the full capacity, plus a uniform buffer and a pipeline built from
//! the pool's [`ShaderVariant`]. Uploads write only the byte ranges named by
//! a [`DirtyRange`], one `write_buffer` per span per attribute.

use wgpu::util::DeviceExt;

use crate::pool::{BlendMode, ParticlePool};
use crate::shader::{generate_particle_shader, ParticleUniforms, ShaderVariant};
use crate::textures::{AlphaMap, FilterMode};
use crate::upload::{Attribute, DirtyRange};

use super::DEPTH_FORMAT;

const TRANSFORM_ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x4,
    1 => Float32x4,
    2 => Float32x4,
    3 => Float32x4
];
const COLOR_START_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![4 => Float32x3];
const COLOR_END_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![5 => Float32x3];
const DIRECTION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![6 => Float32x3];
const SPEED_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![7 => Float32];
const ROTATION_SPEED_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![8 => Float32x3];
const LIFETIME_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![9 => Float32x2];

/// Vertex buffer layout of one attribute array.
fn vertex_layout(attribute: Attribute) -> wgpu::VertexBufferLayout<'static> {
    let attributes: &'static [wgpu::VertexAttribute] = match attribute {
        Attribute::Transform => &TRANSFORM_ATTRS,
        Attribute::ColorStart => &COLOR_START_ATTRS,
        Attribute::ColorEnd => &COLOR_END_ATTRS,
        Attribute::Direction => &DIRECTION_ATTRS,
        Attribute::Speed => &SPEED_ATTRS,
        Attribute::RotationSpeed => &ROTATION_SPEED_ATTRS,
        Attribute::Lifetime => &LIFETIME_ATTRS,
    };
    wgpu::VertexBufferLayout {
        array_stride: attribute.slot_bytes() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes,
    }
}

fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    match mode {
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
        BlendMode::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        },
    }
}

/// Buffers, bind group and pipeline for one pool.
pub struct PoolRenderer {
    capacity: u32,
    buffers: Vec<wgpu::Buffer>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
    // kept alive for the bind group
    _alpha_texture: Option<wgpu::Texture>,
}

impl PoolRenderer {
    /// Create GPU resources for `pool` and upload its current contents.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        name: &str,
        pool: &ParticlePool,
    ) -> Self {
        let settings = pool.settings();
        let variant = ShaderVariant::for_settings(settings);

        let buffers = Attribute::ALL
            .iter()
            .map(|&attribute| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(attribute.label()),
                    contents: pool.attribute_bytes(attribute),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: std::mem::size_of::<ParticleUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut layout_entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        if variant.alpha_map {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &layout_entries,
        });

        let alpha = settings
            .alpha_map
            .as_ref()
            .map(|handle| upload_alpha_map(device, queue, handle.map()));

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        if let Some((_, view, sampler)) = &alpha {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &bind_group_layout,
            entries: &entries,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(generate_particle_shader(variant).into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffers = Attribute::ALL.map(vertex_layout);

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(blend_state(settings.blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // Translucent quads test against depth but never write it.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::debug!(
            "pool `{}`: {} slots, {:?}, {:?} blending",
            name,
            pool.capacity(),
            variant,
            settings.blend
        );

        Self {
            capacity: pool.capacity() as u32,
            buffers,
            uniform_buffer,
            bind_group,
            pipeline,
            _alpha_texture: alpha.map(|(texture, _, _)| texture),
        }
    }

    /// Write the dirty spans of every attribute. Returns the bytes written.
    pub fn upload(&self, queue: &wgpu::Queue, pool: &ParticlePool, range: &DirtyRange) -> u64 {
        let mut written = 0;
        for (attribute, buffer) in Attribute::ALL.iter().zip(&self.buffers) {
            let bytes = pool.attribute_bytes(*attribute);
            for span in range.byte_ranges(*attribute) {
                let data = &bytes[span.start as usize..span.end as usize];
                queue.write_buffer(buffer, span.start, data);
                written += span.end - span.start;
            }
        }
        written
    }

    /// Write this frame's uniforms.
    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &ParticleUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Record the instanced draw: six vertices per slot.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        for (slot, buffer) in self.buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.draw(0..6, 0..self.capacity);
    }
}

fn upload_alpha_map(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    map: &AlphaMap,
) -> (wgpu::Texture, wgpu::TextureView, wgpu::Sampler) {
    let size = wgpu::Extent3d {
        width: map.width,
        height: map.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Alpha Map"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &map.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * map.width),
            rows_per_image: Some(map.height),
        },
        size,
    );

    let filter = match map.filter {
        FilterMode::Linear => wgpu::FilterMode::Linear,
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
    };
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Alpha Map Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    (texture, view, sampler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layouts_cover_every_location() {
        let mut locations: Vec<u32> = Attribute::ALL
            .iter()
            .flat_map(|a| vertex_layout(*a).attributes.iter().map(|v| v.shader_location))
            .collect();
        locations.sort_unstable();
        assert_eq!(locations, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_vertex_strides_match_pool_storage() {
        for attribute in Attribute::ALL {
            let layout = vertex_layout(attribute);
            let covered: u64 = layout.attributes.iter().map(|a| a.format.size()).sum();
            assert_eq!(layout.array_stride, covered, "{:?}", attribute);
            assert_eq!(layout.array_stride % 4, 0);
        }
    }

    #[test]
    fn test_additive_blend_adds() {
        let state = blend_state(BlendMode::Additive);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(blend_state(BlendMode::Alpha), wgpu::BlendState::ALPHA_BLENDING);
    }
}
