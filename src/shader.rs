//! WGSL generation for particle rendering.
//!
//! Each pool draws its slots as instanced quads. The vertex stage runs the
//! lifecycle math from [`crate::lifecycle`] per vertex: unborn and dead
//! particles are moved outside the clip volume, live ones are displaced,
//! spun, scaled by the size envelope and oriented according to the pool's
//! [`RenderMode`]. The fragment stage applies the alpha envelope, the
//! optional alpha map, and discards anything outside its lifetime.
//!
//! # Vertex Inputs
//!
//! | Location | Attribute | Format |
//! |----------|-----------|--------|
//! | 0-3 | emission transform columns | `vec4<f32>` |
//! | 4 | color start | `vec3<f32>` |
//! | 5 | color end | `vec3<f32>` |
//! | 6 | direction | `vec3<f32>` |
//! | 7 | speed | `f32` |
//! | 8 | rotation speed | `vec3<f32>` |
//! | 9 | lifetime `(birth, duration)` | `vec2<f32>` |

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::lifecycle::{CameraBasis, RenderMode, QUAD_SIZE};
use crate::pool::PoolSettings;

/// Per-pool uniform block. Matches `struct Uniforms` in the generated WGSL.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ParticleUniforms {
    /// Camera view-projection matrix.
    pub view_proj: [[f32; 4]; 4],
    /// World-space camera right vector (w unused).
    pub camera_right: [f32; 4],
    /// World-space camera up vector (w unused).
    pub camera_up: [f32; 4],
    /// Current simulation time in seconds.
    pub time: f32,
    /// Color multiplier applied in the fragment stage.
    pub intensity: f32,
    /// Size fade window as (start, end) progress.
    pub fade_size: [f32; 2],
    /// Alpha fade window as (start, end) progress.
    pub fade_alpha: [f32; 2],
    pub _padding: [f32; 2],
}

impl ParticleUniforms {
    /// Uniforms for one pool at one instant.
    pub fn new(view_proj: Mat4, camera: &CameraBasis, time: f32, settings: &PoolSettings) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            camera_right: camera.right.extend(0.0).to_array(),
            camera_up: camera.up.extend(0.0).to_array(),
            time,
            intensity: settings.intensity,
            fade_size: [settings.fade_size.start, settings.fade_size.end],
            fade_alpha: [settings.fade_alpha.start, settings.fade_alpha.end],
            _padding: [0.0; 2],
        }
    }
}

/// Which shader a pool needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVariant {
    /// Quad orientation.
    pub render_mode: RenderMode,
    /// Whether an alpha map texture is bound.
    pub alpha_map: bool,
}

impl ShaderVariant {
    /// The variant matching a pool's settings.
    pub fn for_settings(settings: &PoolSettings) -> Self {
        Self {
            render_mode: settings.render_mode,
            alpha_map: settings.alpha_map.is_some(),
        }
    }

    /// All four variants.
    pub fn all() -> [ShaderVariant; 4] {
        [
            (RenderMode::Oriented, false),
            (RenderMode::Oriented, true),
            (RenderMode::CameraFacing, false),
            (RenderMode::CameraFacing, true),
        ]
        .map(|(render_mode, alpha_map)| ShaderVariant {
            render_mode,
            alpha_map,
        })
    }
}

const ORIENTED_WGSL: &str = r#"    let s = instance.rotation_speed * age;
    let spin = rotation_z(s.z) * rotation_y(s.y) * rotation_x(s.x);
    let local = spin * vec3<f32>(corner * scale, 0.0);
    let world = (model * vec4<f32>(local, 1.0)).xyz + offset;"#;

const CAMERA_FACING_WGSL: &str = r#"    let size = length(model[0].xyz) * scale;
    let center = model[3].xyz + offset;
    let world = center
        + (uniforms.camera_right.xyz * corner.x + uniforms.camera_up.xyz * corner.y) * size;"#;

/// Generate the WGSL module for a pool variant.
pub fn generate_particle_shader(variant: ShaderVariant) -> String {
    let h = QUAD_SIZE / 2.0;
    let orient = match variant.render_mode {
        RenderMode::Oriented => ORIENTED_WGSL,
        RenderMode::CameraFacing => CAMERA_FACING_WGSL,
    };
    let (texture_bindings, mask) = if variant.alpha_map {
        (
            "@group(0) @binding(1)\nvar alpha_map: texture_2d<f32>;\n@group(0) @binding(2)\nvar alpha_sampler: sampler;\n",
            "textureSample(alpha_map, alpha_sampler, in.uv).a",
        )
    } else {
        ("", "1.0")
    };

    format!(
        r#"struct Uniforms {{
    view_proj: mat4x4<f32>,
    camera_right: vec4<f32>,
    camera_up: vec4<f32>,
    time: f32,
    intensity: f32,
    fade_size: vec2<f32>,
    fade_alpha: vec2<f32>,
    _padding: vec2<f32>,
}};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
{texture_bindings}
struct InstanceInput {{
    @location(0) m0: vec4<f32>,
    @location(1) m1: vec4<f32>,
    @location(2) m2: vec4<f32>,
    @location(3) m3: vec4<f32>,
    @location(4) color_start: vec3<f32>,
    @location(5) color_end: vec3<f32>,
    @location(6) direction: vec3<f32>,
    @location(7) speed: f32,
    @location(8) rotation_speed: vec3<f32>,
    @location(9) lifetime: vec2<f32>,
}};

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) @interpolate(flat) progress: f32,
}};

fn fade_window(edge0: f32, edge1: f32, x: f32) -> f32 {{
    if (edge0 == edge1) {{
        if (x < edge0) {{
            return 0.0;
        }}
        return 1.0;
    }}
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}}

fn rotation_x(a: f32) -> mat3x3<f32> {{
    let c = cos(a);
    let s = sin(a);
    return mat3x3<f32>(
        vec3<f32>(1.0, 0.0, 0.0),
        vec3<f32>(0.0, c, s),
        vec3<f32>(0.0, -s, c),
    );
}}

fn rotation_y(a: f32) -> mat3x3<f32> {{
    let c = cos(a);
    let s = sin(a);
    return mat3x3<f32>(
        vec3<f32>(c, 0.0, -s),
        vec3<f32>(0.0, 1.0, 0.0),
        vec3<f32>(s, 0.0, c),
    );
}}

fn rotation_z(a: f32) -> mat3x3<f32> {{
    let c = cos(a);
    let s = sin(a);
    return mat3x3<f32>(
        vec3<f32>(c, s, 0.0),
        vec3<f32>(-s, c, 0.0),
        vec3<f32>(0.0, 0.0, 1.0),
    );
}}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    instance: InstanceInput,
) -> VertexOutput {{
    var quad = array<vec2<f32>, 6>(
        vec2<f32>(-{h:?}, -{h:?}),
        vec2<f32>( {h:?}, -{h:?}),
        vec2<f32>(-{h:?},  {h:?}),
        vec2<f32>(-{h:?},  {h:?}),
        vec2<f32>( {h:?}, -{h:?}),
        vec2<f32>( {h:?},  {h:?}),
    );
    let corner = quad[vertex_index];

    var out: VertexOutput;
    out.uv = vec2<f32>(corner.x, -corner.y) / {size:?} + vec2<f32>(0.5, 0.5);
    out.color = vec3<f32>(0.0);
    out.progress = -1.0;

    let duration = instance.lifetime.y;
    let age = uniforms.time - instance.lifetime.x;
    var progress = -1.0;
    if (duration > 0.0) {{
        progress = age / duration;
    }}
    if (progress < 0.0 || progress > 1.0) {{
        // unborn or dead: outside the clip volume
        out.clip_position = vec4<f32>(9999.0, 9999.0, 9999.0, 1.0);
        return out;
    }}

    let scale = fade_window(0.0, uniforms.fade_size.x, progress)
        * fade_window(1.01, uniforms.fade_size.y, progress);
    var dir = vec3<f32>(0.0);
    if (length(instance.direction) > 0.0) {{
        dir = normalize(instance.direction);
    }}
    let offset = dir * age * instance.speed;
    let model = mat4x4<f32>(instance.m0, instance.m1, instance.m2, instance.m3);

{orient}

    out.clip_position = uniforms.view_proj * vec4<f32>(world, 1.0);
    out.color = mix(instance.color_start, instance.color_end, progress) * uniforms.intensity;
    out.progress = progress;
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
    let mask = {mask};
    if (in.progress < 0.0 || in.progress > 1.0) {{
        discard;
    }}
    let alpha = fade_window(0.0, uniforms.fade_alpha.x, in.progress)
        * fade_window(1.01, uniforms.fade_alpha.y, in.progress);
    return vec4<f32>(in.color, alpha * mask);
}}
"#,
        size = QUAD_SIZE,
    )
}
