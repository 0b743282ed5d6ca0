//! Model viewer: loads a skinned model and plays its first clip in a window, or
//! runs a fixed number of frames headless and prints what was drawn.
//!
//! Keys: Space pauses/resumes, N cycles clips, L toggles loop/clamp, Left/Right turn the
//! model, Escape quits. Dragging with the left mouse button looks around.

use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{ContextApi, ContextAttributesBuilder, PossiblyCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasWindowHandle;
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use skinned_model::{
    Actor, Camera, GlShaderProgram, GlowDevice, HeadlessDevice, HeadlessProgram, Model, ModelConfig, PlaybackMode,
};

#[derive(Parser, Debug)]
#[command(name = "skinned-model-viewer", version, about = "View skinned glTF models")]
struct Args {
    /// Model file (.gltf or .glb)
    path: PathBuf,

    /// JSON file with import and playback settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 120)]
    frames: u32,

    /// Clip to play instead of the first one
    #[arg(long)]
    clip: Option<usize>,
}

const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;
const TURN_STEP: f32 = 0.1;
const MOUSE_SENSITIVITY: f32 = 0.003;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ModelConfig::from_json_file(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => ModelConfig::default(),
    };

    if args.headless {
        return run_headless(&args, config);
    }

    let event_loop = EventLoop::new()?;
    let mut viewer = Viewer::new(args, config);
    event_loop.run_app(&mut viewer)?;

    match viewer.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn run_headless(args: &Args, config: ModelConfig) -> Result<()> {
    let device = HeadlessDevice::new();
    let program = HeadlessProgram::new();
    let camera = Camera::default();
    let frame = camera.frame_context(16.0 / 9.0);

    let mut model = Model::new(&args.path, config);
    model.initialize(&device)?;
    if let Some(clip) = args.clip {
        model.play_clip(clip);
    }

    for _ in 0..args.frames {
        model.update(HEADLESS_FRAME_TIME);
        model.render(&device, &program, &frame);
    }

    let stats = model.stats();
    let counters = device.counters();
    model.release(&device);

    println!("{}: {}", args.path.display(), stats);
    println!(
        "{} frames: {} draw calls, {} triangles, {} textures uploaded",
        args.frames,
        counters.draw_calls,
        counters.indices_drawn / 3,
        counters.textures_created
    );
    Ok(())
}

struct Renderer {
    device: GlowDevice,
    program: GlShaderProgram,
    model: Model,
    camera: Camera,
}

struct Viewer {
    args: Args,
    config: Option<ModelConfig>,
    window: Option<Window>,
    gl_context: Option<PossiblyCurrentContext>,
    gl_surface: Option<Surface<WindowSurface>>,
    renderer: Option<Renderer>,
    last_frame_time: Option<Instant>,
    dragging: bool,
    error: Option<anyhow::Error>,
}

impl Viewer {
    fn new(args: Args, config: ModelConfig) -> Self {
        Self {
            args,
            config: Some(config),
            window: None,
            gl_context: None,
            gl_surface: None,
            renderer: None,
            last_frame_time: None,
            dragging: false,
            error: None,
        }
    }

    fn create_context(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let title = format!("skinned-model-viewer - {}", self.args.path.display());
        let window = event_loop.create_window(Window::default_attributes().with_title(title))?;

        let (_, gl_config) = DisplayBuilder::new()
            .build(event_loop, ConfigTemplateBuilder::new().with_depth_size(24), |configs| {
                // glutin only calls the picker with at least one config.
                configs
                    .max_by_key(|c| c.depth_size())
                    .expect("no GL configs offered")
            })
            .map_err(|err| anyhow!("creating GL display: {err}"))?;

        let display = gl_config.display();
        let raw_window = window.window_handle()?.as_raw();
        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(raw_window));
        let not_current = unsafe { display.create_context(&gl_config, &context_attributes)? };

        let size = window.inner_size();
        let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            raw_window,
            NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
        );
        let surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes)? };
        let context = not_current.make_current(&surface)?;

        let gl = unsafe {
            glow::Context::from_loader_function(|symbol| {
                CString::new(symbol)
                    .map(|name| display.get_proc_address(&name))
                    .unwrap_or(std::ptr::null())
            })
        };
        let gl = Rc::new(gl);

        let device = GlowDevice::new(gl.clone());
        let program = GlShaderProgram::skinned(gl).context("building the skinning shader")?;

        let config = self.config.take().unwrap_or_default();
        let mut model = Model::new(&self.args.path, config);
        if let Err(err) = model.initialize(&device) {
            program.delete();
            return Err(err.into());
        }
        if let Some(clip) = self.args.clip {
            model.play_clip(clip);
        }

        window.request_redraw();
        self.window = Some(window);
        self.gl_context = Some(context);
        self.gl_surface = Some(surface);
        self.renderer = Some(Renderer {
            device,
            program,
            model,
            camera: Camera::default(),
        });
        self.last_frame_time = Some(Instant::now());
        Ok(())
    }

    fn redraw(&mut self) {
        let (Some(window), Some(surface), Some(context), Some(renderer)) =
            (&self.window, &self.gl_surface, &self.gl_context, &mut self.renderer)
        else {
            return;
        };

        let now = Instant::now();
        let delta = self
            .last_frame_time
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame_time = Some(now);

        let size = window.inner_size();
        let aspect_ratio = size.width.max(1) as f32 / size.height.max(1) as f32;
        let frame = renderer.camera.frame_context(aspect_ratio);

        renderer.device.begin_frame(size.width, size.height);
        renderer.model.update(delta);
        renderer.model.render(&renderer.device, &renderer.program, &frame);

        if let Err(err) = surface.swap_buffers(context) {
            tracing::error!("swap_buffers failed: {}", err);
        }
        window.request_redraw();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        if code == KeyCode::Escape {
            event_loop.exit();
            return;
        }
        let Some(renderer) = &mut self.renderer else {
            return;
        };
        let model = &mut renderer.model;
        match code {
            KeyCode::Space => {
                if model.animator().is_paused() {
                    model.resume();
                } else {
                    model.pause();
                }
            }
            KeyCode::KeyN => {
                let clips = model.animations().len();
                if clips > 0 {
                    let next = model.animator().active_clip().map_or(0, |clip| (clip + 1) % clips);
                    model.play_clip(next);
                    tracing::info!("playing clip {} '{}'", next, model.animations()[next].name);
                }
            }
            KeyCode::KeyL => {
                let mode = match model.animator().mode() {
                    PlaybackMode::Loop => PlaybackMode::Clamp,
                    PlaybackMode::Clamp => PlaybackMode::Loop,
                };
                model.set_playback_mode(mode);
                tracing::info!("playback mode {:?}", mode);
            }
            KeyCode::ArrowLeft => model.transform_mut().rotate(0.0, -TURN_STEP, 0.0),
            KeyCode::ArrowRight => model.transform_mut().rotate(0.0, TURN_STEP, 0.0),
            _ => {}
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.create_context(event_loop) {
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::RedrawRequested => self.redraw(),

            WindowEvent::Resized(size) => {
                if let (Some(surface), Some(context)) = (&self.gl_surface, &self.gl_context) {
                    surface.resize(
                        context,
                        NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
                        NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
                    );
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.dragging = state == ElementState::Pressed,

            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let (DeviceEvent::MouseMotion { delta: (dx, dy) }, true, Some(renderer)) =
            (event, self.dragging, &mut self.renderer)
        {
            renderer
                .camera
                .apply_mouse_delta(dx as f32, dy as f32, MOUSE_SENSITIVITY);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.model.release(&renderer.device);
            renderer.program.delete();
        }
    }
}
