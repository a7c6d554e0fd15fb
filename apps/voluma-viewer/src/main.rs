use anyhow::Result;
use clap::Parser;
use egui::Context as EguiContext;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use voluma_assets::AssetWatcher;
use voluma_provider::{Provider, ReloadRegistry};
use voluma_render::{
    FrameApp, FrameLoop, OrbitCamera, RenderError, RenderSettings, SceneGraph, ScenePaths,
    SurfaceParams, Uniforms,
};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "voluma-viewer", about = "Volumetric rendering viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Asset directory (shaders and volume data)
    #[arg(long, default_value = "./assets")]
    assets: String,
}

/// Everything that exists once the window and GPU are up.
struct Viewer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    graph: SceneGraph,
    registry: ReloadRegistry,
    watcher: Option<AssetWatcher>,
    camera: OrbitCamera,
    rotation: f32,
    time: f32,
    scene_error_logged: bool,
    egui_ctx: EguiContext,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl FrameApp for Viewer {
    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.graph.device.get(), &self.config);
        self.graph.surface.set(SurfaceParams {
            width,
            height,
            format: self.config.format,
        });
    }

    fn update(&mut self, dt: f32) {
        if let Some(watcher) = &self.watcher {
            for path in watcher.poll_changes() {
                self.registry.notify_change(&path);
            }
        }
        let settings = self.graph.settings.get();
        self.rotation += settings.rotation_speed * dt;
        self.time += dt;
    }

    fn draw(&mut self) -> Result<()> {
        let device = self.graph.device.get();

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&device, &self.config);
                return Ok(());
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return Ok(());
            }
        };
        // The swapchain view flows through the graph's per-frame source: set
        // on acquisition, read back for the passes below, cleared after
        // present. It is never held in a cached node.
        self.graph.frame_view.set(Some(
            output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        ));
        let Some(view) = self.graph.frame_view.get() else {
            return Ok(());
        };

        let params = self.graph.surface.get();
        let settings = self.graph.settings.get();
        self.graph.write_uniforms(&Uniforms {
            inv_view_proj: self
                .camera
                .inverse_view_proj(self.rotation, params.aspect())
                .to_cols_array_2d(),
            density: settings.density,
            time: self.time,
            _pad: [0.0; 2],
        });

        // Await the cached resource futures. Resolved futures return
        // immediately; a shader edit swaps in fresh in-flight ones.
        let pipeline = pollster::block_on(self.graph.pipeline.get());
        let bind_group = pollster::block_on(self.graph.bind_group.get());
        let scene = match (pipeline, bind_group) {
            (Ok(pipeline), Ok(bind_group)) => {
                self.scene_error_logged = false;
                Some((pipeline, bind_group))
            }
            (Err(e), _) | (_, Err(e)) => {
                // Broken shader edits keep the last good frame loop alive;
                // the clear color and UI still draw.
                if !self.scene_error_logged {
                    match &e {
                        RenderError::ShaderCompile(msg) => {
                            tracing::warn!("shader rejected, scene pass skipped: {msg}")
                        }
                        other => tracing::warn!("scene pass skipped: {other}"),
                    }
                    self.scene_error_logged = true;
                }
                None
            }
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        let msaa_view;
        let (target, resolve_target) = if self.graph.sample_count.get() > 1 {
            msaa_view = self.graph.msaa_target.get();
            (&msaa_view, Some(&view))
        } else {
            (&view, None)
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("volume_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            if let Some((pipeline, bind_group)) = &scene {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        self.draw_ui(&device, &view, &mut encoder);

        self.graph.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.graph.frame_view.set(None);
        Ok(())
    }
}

impl Viewer {
    fn draw_ui(
        &mut self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let raw_input = self.egui_winit.take_egui_input(&self.window);
        let graph = &self.graph;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            settings_panel(ctx, graph);
        });
        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, &self.graph.queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(
            device,
            &self.graph.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn settings_panel(ctx: &EguiContext, graph: &SceneGraph) {
    let mut settings = graph.settings.get();
    let before = settings;

    egui::SidePanel::left("settings")
        .default_width(220.0)
        .show(ctx, |ui| {
            ui.heading("Voluma");
            ui.separator();
            ui.add(egui::Slider::new(&mut settings.density, 0.0..=4.0).text("Density"));
            ui.add(
                egui::Slider::new(&mut settings.rotation_speed, 0.0..=4.0).text("Rotation speed"),
            );
            ui.horizontal(|ui| {
                ui.label("MSAA:");
                ui.selectable_value(&mut settings.sample_count, 1, "Off");
                ui.selectable_value(&mut settings.sample_count, 4, "4x");
            });
            ui.separator();
            ui.small("Edit assets/shaders/draw.wgsl to hot-reload the shader");
        });

    // One set per edit; untouched frames leave the derived nodes cached. The
    // sample-count source only fires when that field moved, so slider ticks
    // never rebuild the pipeline.
    if settings != before {
        graph.settings.set(settings);
        if settings.sample_count != before.sample_count {
            graph.sample_count.set(settings.sample_count);
        }
    }
}

const SETTINGS_FILE: &str = "voluma-settings.json";

fn load_settings() -> RenderSettings {
    match std::fs::read_to_string(SETTINGS_FILE) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("ignoring malformed {SETTINGS_FILE}: {e}");
                RenderSettings::default()
            }
        },
        Err(_) => RenderSettings::default(),
    }
}

fn save_settings(settings: &RenderSettings) {
    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            if let Err(e) = std::fs::write(SETTINGS_FILE, json) {
                tracing::warn!("failed to save {SETTINGS_FILE}: {e}");
            }
        }
        Err(e) => tracing::warn!("failed to serialize settings: {e}"),
    }
}

struct GpuApp {
    assets_dir: PathBuf,
    settings: RenderSettings,
    viewer: Option<Viewer>,
    frame_loop: FrameLoop,
}

impl GpuApp {
    fn new(assets_dir: PathBuf, settings: RenderSettings) -> Self {
        Self {
            assets_dir,
            settings,
            viewer: None,
            frame_loop: FrameLoop::new(),
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Voluma")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("voluma_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
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

        let registry = ReloadRegistry::new();
        let graph = SceneGraph::new(
            device.clone(),
            queue,
            SurfaceParams {
                width: config.width,
                height: config.height,
                format: surface_format,
            },
            self.settings,
            self.assets_dir.clone(),
            ScenePaths::default(),
            &registry,
        );

        let watcher = match AssetWatcher::new(&self.assets_dir) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("asset watching disabled: {e}");
                None
            }
        };

        let egui_ctx = EguiContext::default();
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        self.viewer = Some(Viewer {
            window,
            surface,
            config,
            graph,
            registry,
            watcher,
            camera: OrbitCamera::default(),
            rotation: 0.0,
            time: 0.0,
            scene_error_logged: false,
            egui_ctx,
            egui_winit,
            egui_renderer,
        });
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };

        let response = viewer.egui_winit.on_window_event(&viewer.window, &event);
        if response.consumed {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.frame_loop.request_resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame_loop.run_frame(viewer) {
                    tracing::error!("frame failed: {e}");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = &self.viewer {
            viewer.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("voluma-viewer starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(PathBuf::from(cli.assets), load_settings());
    event_loop.run_app(&mut app)?;

    if let Some(viewer) = &app.viewer {
        save_settings(&viewer.graph.settings.get());
    }

    Ok(())
}
