use std::path::PathBuf;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use voluma_assets::{AssetError, VolumeDesc, fetch_text, load_volume_or_blank};
use voluma_provider::{
    AsyncProviderExt, AsyncValue, Cached, Provider, ReloadRegistry, Source, async_value, join3,
    join5,
};

use crate::shaders;

/// Layout of the shipped demo volume (matches the asset generator output).
pub const VOLUME_DESC: VolumeDesc = VolumeDesc {
    width: 180,
    height: 216,
    depth: 180,
};

/// Presentation parameters for the window surface. Re-set on every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceParams {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl SurfaceParams {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// User-tunable rendering parameters, edited live from the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// MSAA sample count for the view target (1 disables MSAA).
    pub sample_count: u32,
    /// Opacity scale applied while raymarching.
    pub density: f32,
    /// Orbit speed in radians per second.
    pub rotation_speed: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_count: 4,
            density: 1.0,
            rotation_speed: 1.0,
        }
    }
}

/// Asset-root-relative paths of the reloadable scene inputs.
#[derive(Debug, Clone)]
pub struct ScenePaths {
    pub shader: String,
    pub volume: String,
}

impl Default for ScenePaths {
    fn default() -> Self {
        Self {
            shader: "shaders/draw.wgsl".to_string(),
            volume: "volume/t1_head_180x216x180_u8.bin.zst".to_string(),
        }
    }
}

/// Uniform block consumed by the raymarch shader. Must match the WGSL
/// `Uniforms` struct layout (80 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Uniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub density: f32,
    pub time: f32,
    pub _pad: [f32; 2],
}

/// Errors from asynchronous resource creation. Clonable so they can live in
/// shared futures and reach every awaiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),
    #[error("pipeline creation failed: {0}")]
    PipelineCreation(String),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

type AsyncResult<T> = AsyncValue<Result<T, RenderError>>;

/// The scene's resource graph.
///
/// All GPU objects hang off a handful of value sources (device, surface,
/// settings, sample count) and two path-registered fetch nodes (shader text,
/// volume bytes). Mutating a source or notifying the reload registry
/// invalidates exactly the dependent subtree; resources are re-created
/// lazily on the next `get`.
pub struct SceneGraph {
    pub queue: wgpu::Queue,

    // Value sources.
    pub device: Source<wgpu::Device>,
    pub surface: Source<SurfaceParams>,
    pub settings: Source<RenderSettings>,
    /// Pipeline-facing MSAA sample count. Kept separate from `settings` so
    /// per-frame tunables (density, rotation speed) do not rebuild the
    /// pipeline; callers re-set it only when the count actually changes.
    pub sample_count: Source<u32>,
    /// Swapchain view for the frame being drawn. Re-set every frame by the
    /// draw step and cleared afterwards; never cached across frames.
    pub frame_view: Source<Option<wgpu::TextureView>>,

    // Synchronous derived nodes.
    pub sampler: Cached<wgpu::Sampler>,
    pub uniform_buffer: Cached<wgpu::Buffer>,
    pub msaa_target: Cached<wgpu::TextureView>,

    // Asynchronous derived nodes.
    pub shader: Cached<AsyncResult<wgpu::ShaderModule>>,
    pub pipeline: Cached<AsyncResult<wgpu::RenderPipeline>>,
    pub volume_view: Cached<AsyncValue<wgpu::TextureView>>,
    pub bind_group: Cached<AsyncResult<wgpu::BindGroup>>,
}

impl SceneGraph {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_params: SurfaceParams,
        settings_value: RenderSettings,
        asset_root: PathBuf,
        paths: ScenePaths,
        registry: &ReloadRegistry,
    ) -> Self {
        let device = Source::new(device);
        let surface = Source::new(surface_params);
        let settings = Source::new(settings_value);
        let frame_view = Source::new(None);

        let sampler = device.map(|device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("volume_sampler"),
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Linear,
                anisotropy_clamp: 16,
                ..Default::default()
            })
        });

        let uniform_buffer = device.map(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("uniform_buffer"),
                size: std::mem::size_of::<Uniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        // Fetch node: shader text, keyed in the reload registry. A fetch
        // failure downgrades to the built-in fallback so the viewer stays
        // alive without the on-disk asset.
        let shader_text: Cached<AsyncValue<String>> = Cached::new({
            let root = asset_root.clone();
            let path = paths.shader.clone();
            move || {
                let root = root.clone();
                let path = path.clone();
                async_value(async move {
                    match fetch_text(&root, &path) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(path = %path, error = %e, "shader fetch failed, using built-in fallback");
                            shaders::VOLUME_SHADER.to_string()
                        }
                    }
                })
            }
        });
        registry.register(&paths.shader, shader_text.handle());

        let shader = device.join(&shader_text).map_async(|(device, text_future)| async move {
            let text = text_future.await;
            compile_shader(&device, &text).await
        });

        let surface_format = surface.map(|params| params.format);
        // Dedicated source so density and rotation edits flowing through
        // `settings` never reach the pipeline or the MSAA target.
        let sample_count = Source::new(settings_value.sample_count);

        let pipeline = join3(&shader, &surface_format, &sample_count).map_async({
            let device = device.clone();
            move |(shader_future, format, samples)| {
                let device = device.get();
                async move {
                    let module = shader_future.await?;
                    build_pipeline(&device, &module, format, samples).await
                }
            }
        });

        // Fetch node: volume bytes, keyed in the reload registry. Best
        // effort per the asset contract; a blank volume renders as empty
        // space rather than aborting the frame loop.
        let volume_bytes: Cached<AsyncValue<Vec<u8>>> = Cached::new({
            let root = asset_root.clone();
            let path = paths.volume.clone();
            move || {
                let root = root.clone();
                let path = path.clone();
                async_value(async move { load_volume_or_blank(&root, &path, VOLUME_DESC) })
            }
        });
        registry.register(&paths.volume, volume_bytes.handle());

        let volume_view = device.join(&volume_bytes).map_async({
            let queue = queue.clone();
            move |(device, bytes_future)| {
                let queue = queue.clone();
                async move {
                    let data = bytes_future.await;
                    upload_volume(&device, &queue, VOLUME_DESC, &data)
                }
            }
        });

        let bind_group = join5(&device, &pipeline, &uniform_buffer, &sampler, &volume_view)
            .map_async(
                |(device, pipeline_future, buffer, sampler, volume_future)| async move {
                    let pipeline = pipeline_future.await?;
                    let volume = volume_future.await;
                    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("volume_bind_group"),
                        layout: &pipeline.get_bind_group_layout(0),
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: buffer.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&sampler),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: wgpu::BindingResource::TextureView(&volume),
                            },
                        ],
                    }))
                },
            );

        let msaa_target =
            join3(&device, &surface, &sample_count).map(|(device, params, samples)| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("msaa_target"),
                    size: wgpu::Extent3d {
                        width: params.width.max(1),
                        height: params.height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format: params.format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                });
                texture.create_view(&Default::default())
            });

        Self {
            queue,
            device,
            surface,
            settings,
            sample_count,
            frame_view,
            sampler,
            uniform_buffer,
            msaa_target,
            shader,
            pipeline,
            volume_view,
            bind_group,
        }
    }

    /// Push fresh uniform contents. The buffer node resolves synchronously;
    /// only its first `get` after (re)creation allocates.
    pub fn write_uniforms(&self, uniforms: &Uniforms) {
        self.queue
            .write_buffer(&self.uniform_buffer.get(), 0, bytemuck::bytes_of(uniforms));
    }
}

async fn compile_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("volume_shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match device.pop_error_scope().await {
        Some(error) => Err(RenderError::ShaderCompile(error.to_string())),
        None => Ok(module),
    }
}

async fn build_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    sample_count: u32,
) -> Result<wgpu::RenderPipeline, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("volume_pipeline"),
        layout: None,
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: sample_count,
            ..Default::default()
        },
        multiview: None,
        cache: None,
    });
    match device.pop_error_scope().await {
        Some(error) => Err(RenderError::PipelineCreation(error.to_string())),
        None => Ok(pipeline),
    }
}

fn upload_volume(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    desc: VolumeDesc,
    data: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: desc.width,
        height: desc.height,
        depth_or_array_layers: desc.depth,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("volume_texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: wgpu::TextureFormat::R8Unorm,
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
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(desc.bytes_per_row()),
            rows_per_image: Some(desc.height),
        },
        size,
    );
    texture.create_view(&Default::default())
}
