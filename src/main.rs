use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use sphere_tracer::{
    load_geometry, read_shader_file, CliOptions, DrawCall, Geometry, KeyCode, KeyEvent, KeyState,
    NamedKey, ProgramStages, RenderContext, RenderMode, Renderer, ShaderError, ViewerConfig,
};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,wgpu_core=warn,wgpu_hal=warn"),
    )
    .init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = CliOptions::parse()?;

    let geometry = match &config.mode {
        RenderMode::Mesh { path } => load_geometry(path),
        RenderMode::Raymarch => Geometry::default(),
    };
    let vertex_source = read_shader_file(&config.vertex_shader);
    let fragment_source = read_shader_file(&config.fragment_shader);
    let stages = ProgramStages::build(&vertex_source, &fragment_source, &config.mode.interface());

    if config.check_only {
        return run_check(&config, &geometry, stages);
    }

    let stages = match stages {
        Ok(stages) => Some(stages),
        Err(err) if config.strict => {
            return Err(anyhow::Error::new(err).context("shader program is required with --strict"));
        }
        Err(_) => None,
    };

    match run_interactive(config, geometry, stages) {
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => Err(err.context(
            "no window available (set DISPLAY or WAYLAND_DISPLAY, or use --check for a headless run)",
        )),
        other => other,
    }
}

/// Headless validation: builds everything that does not need a GPU and
/// prints a summary.
fn run_check(
    config: &ViewerConfig,
    geometry: &Geometry,
    stages: Result<ProgramStages, ShaderError>,
) -> Result<()> {
    let raymarch = matches!(config.mode, RenderMode::Raymarch);
    println!("Mode: {}", config.mode.name());
    println!("Vertex shader: {}", config.vertex_shader.display());
    println!("Fragment shader: {}", config.fragment_shader.display());
    if let RenderMode::Mesh { path } = &config.mode {
        println!(
            "Mesh: {} ({} vertices, {} indices)",
            path.display(),
            geometry.vertex_count(),
            geometry.index_count()
        );
    }
    let draw = DrawCall::plan(raymarch, geometry.vertex_count(), geometry.index_count());
    println!("Draw: {} vertices", draw.vertices());

    match stages {
        Ok(stages) => {
            println!(
                "Program: linked ({} + {})",
                stages.vertex.entry_point(),
                stages.fragment.entry_point()
            );
            Ok(())
        }
        Err(err) => {
            println!("Program: failed");
            println!("{err}");
            Err(anyhow!("shader program did not link"))
        }
    }
}

fn run_interactive(
    config: ViewerConfig,
    geometry: Geometry,
    stages: Option<ProgramStages>,
) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        context: RenderContext::new(&config),
        config,
        geometry,
        stages,
        renderer: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated with error")?;

    app.shutdown();
    match app.last_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct ViewerApp {
    renderer: Option<Renderer>,
    context: RenderContext,
    config: ViewerConfig,
    geometry: Geometry,
    stages: Option<ProgramStages>,
    last_error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<Renderer> {
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        block_on(Renderer::new(
            window,
            self.context.is_raymarch(),
            &self.geometry,
            self.stages.take(),
        ))
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let frame = self.context.update();
        if self.context.should_close() {
            event_loop.exit();
            return;
        }

        match renderer.render(&frame.uniforms) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow!("GPU is out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("Surface timeout; retrying next frame");
            }
            Err(err) => warn!("skipping frame: {err}"),
        }
    }

    fn shutdown(&mut self) {
        // Program, buffers and surface go before the window they belong to.
        if let Some(renderer) = self.renderer.take() {
            drop(renderer);
        }
        let position = self.context.camera().position();
        info!(
            "viewer closed; camera at ({:.2}, {:.2}, {:.2})",
            position.x, position.y, position.z
        );
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        match self.create_renderer(event_loop) {
            Ok(renderer) => {
                let viewport = renderer.viewport();
                self.context.set_viewport(viewport.width, viewport.height);
                info!(
                    "{} mode; drawing {} vertices per frame",
                    self.config.mode.name(),
                    renderer.draw_call().vertices()
                );
                renderer.window().request_redraw();
                self.renderer = Some(renderer);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if window_id != renderer.window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                self.context.request_close();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                renderer.resize(size);
                self.context.set_viewport(size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = renderer.window().inner_size();
                renderer.resize(size);
                self.context.set_viewport(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let Some(key) = map_keycode(code) else {
                    debug!("unmapped key {code:?}");
                    return;
                };
                self.context.push_key(KeyEvent {
                    key,
                    state: match event.state {
                        ElementState::Pressed => KeyState::Pressed,
                        ElementState::Released => KeyState::Released,
                    },
                    repeat: event.repeat,
                });
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_ref() {
            renderer.window().request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        Key::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Enter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        _ => return None,
    })
}
