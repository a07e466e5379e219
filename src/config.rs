use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::camera::DEFAULT_SPEED;
use crate::input::KeyBindings;
use crate::render::{FrameUniforms, POSITION_LOCATION};
use crate::shader::ProgramInterface;

pub const USAGE: &str = "Usage: sphere-tracer [--mesh <file>] [--vertex <file>] [--fragment <file>] \
[--width <px>] [--height <px>] [--title <text>] [--speed <units>] [--bind <Key>=<action>]... \
[--strict] [--check]";

/// Which of the two mutually exclusive pipelines a run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// Full-screen quad; the fragment stage raymarches the scene.
    Raymarch,
    /// Rasterizes geometry loaded from a mesh file.
    Mesh { path: PathBuf },
}

impl RenderMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raymarch => "raymarch",
            Self::Mesh { .. } => "mesh",
        }
    }

    /// Vertex buffers and uniforms this mode binds for its program.
    pub fn interface(&self) -> ProgramInterface<'static> {
        let vertex_inputs: &'static [u32] = match self {
            Self::Raymarch => &[],
            Self::Mesh { .. } => &[POSITION_LOCATION],
        };
        ProgramInterface {
            vertex_inputs,
            uniform_size: FrameUniforms::SIZE,
        }
    }

    fn default_shaders(&self) -> (PathBuf, PathBuf) {
        match self {
            Self::Raymarch => (
                PathBuf::from("shaders/basic.vert.wgsl"),
                PathBuf::from("shaders/raymarcher.frag.wgsl"),
            ),
            Self::Mesh { .. } => (
                PathBuf::from("shaders/mesh.vert.wgsl"),
                PathBuf::from("shaders/mesh.frag.wgsl"),
            ),
        }
    }
}

/// Everything a run needs to know, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub speed: f32,
    pub bindings: KeyBindings,
    /// Treat shader failures as fatal instead of running with nothing drawn.
    pub strict: bool,
    /// Validate shaders and geometry without opening a window.
    pub check_only: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let mode = RenderMode::Raymarch;
        let (vertex_shader, fragment_shader) = mode.default_shaders();
        Self {
            title: "Sphere Tracer".to_string(),
            width: 800,
            height: 600,
            mode,
            vertex_shader,
            fragment_shader,
            speed: DEFAULT_SPEED,
            bindings: KeyBindings::default(),
            strict: false,
            check_only: false,
        }
    }
}

pub struct CliOptions;

impl CliOptions {
    pub fn parse() -> Result<ViewerConfig> {
        Self::parse_from(std::env::args().skip(1))
    }

    /// Builds a config from arguments, program name excluded.
    pub fn parse_from<I>(args: I) -> Result<ViewerConfig>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut config = ViewerConfig::default();
        let mut vertex = None;
        let mut fragment = None;
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--mesh" => {
                    config.mode = RenderMode::Mesh {
                        path: PathBuf::from(value("--mesh")?),
                    }
                }
                "--vertex" => vertex = Some(PathBuf::from(value("--vertex")?)),
                "--fragment" => fragment = Some(PathBuf::from(value("--fragment")?)),
                "--width" => config.width = parse_dimension(&value("--width")?, "--width")?,
                "--height" => config.height = parse_dimension(&value("--height")?, "--height")?,
                "--title" => config.title = value("--title")?,
                "--speed" => {
                    let raw = value("--speed")?;
                    config.speed = raw
                        .parse::<f32>()
                        .ok()
                        .filter(|speed| speed.is_finite() && *speed > 0.0)
                        .with_context(|| format!("--speed expects a positive number, got {raw}"))?;
                }
                "--bind" => {
                    let raw = value("--bind")?;
                    let (key, action) = KeyBindings::parse_binding(&raw)
                        .with_context(|| format!("invalid key binding {raw:?}"))?;
                    config.bindings.bind(key, action);
                }
                "--strict" => config.strict = true,
                "--check" => config.check_only = true,
                "--help" | "-h" => bail!("{USAGE}"),
                other => bail!("Unknown argument: {other}\n{USAGE}"),
            }
        }

        let (default_vertex, default_fragment) = config.mode.default_shaders();
        config.vertex_shader = vertex.unwrap_or(default_vertex);
        config.fragment_shader = fragment.unwrap_or(default_fragment);
        Ok(config)
    }
}

fn parse_dimension(raw: &str, flag: &str) -> Result<u32> {
    raw.parse::<u32>()
        .ok()
        .filter(|value| *value > 0)
        .with_context(|| format!("{flag} expects a positive integer, got {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraImpulse;
    use crate::input::{KeyAction, KeyCode};

    fn parse(args: &[&str]) -> Result<ViewerConfig> {
        CliOptions::parse_from(args.iter().copied())
    }

    #[test]
    fn no_arguments_reproduce_default_viewer() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.mode, RenderMode::Raymarch);
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.vertex_shader, PathBuf::from("shaders/basic.vert.wgsl"));
        assert_eq!(
            config.fragment_shader,
            PathBuf::from("shaders/raymarcher.frag.wgsl")
        );
    }

    #[test]
    fn mesh_switches_mode_and_default_shaders() {
        let config = parse(&["--mesh", "assets/cube.obj"]).unwrap();
        assert_eq!(config.mode.name(), "mesh");
        assert_eq!(config.vertex_shader, PathBuf::from("shaders/mesh.vert.wgsl"));
        assert_eq!(config.fragment_shader, PathBuf::from("shaders/mesh.frag.wgsl"));
    }

    #[test]
    fn only_mesh_mode_feeds_vertex_attributes() {
        let raymarch = RenderMode::Raymarch.interface();
        assert!(raymarch.vertex_inputs.is_empty());
        assert_eq!(raymarch.uniform_size, 112);

        let mesh = RenderMode::Mesh {
            path: PathBuf::from("a.obj"),
        }
        .interface();
        assert_eq!(mesh.vertex_inputs, &[0]);
    }

    #[test]
    fn explicit_shader_paths_win() {
        let config = parse(&["--fragment", "my.wgsl", "--mesh", "a.off"]).unwrap();
        assert_eq!(config.fragment_shader, PathBuf::from("my.wgsl"));
        assert_eq!(config.vertex_shader, PathBuf::from("shaders/mesh.vert.wgsl"));
    }

    #[test]
    fn parses_numeric_options_and_flags() {
        let config = parse(&[
            "--width", "1024", "--height", "768", "--speed", "0.25", "--strict", "--check",
        ])
        .unwrap();
        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.speed, 0.25);
        assert!(config.strict);
        assert!(config.check_only);
    }

    #[test]
    fn bind_overrides_defaults() {
        let config = parse(&["--bind", "W=reset"]).unwrap();
        assert_eq!(
            config.bindings.action(KeyCode::Character('W')),
            Some(KeyAction::Camera(CameraImpulse::Reset))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--width", "0"]).is_err());
        assert!(parse(&["--speed", "-1"]).is_err());
        assert!(parse(&["--mesh"]).is_err());
        assert!(parse(&["--bind", "W=teleport"]).is_err());
        let err = parse(&["--fullscreen"]).unwrap_err();
        assert!(err.to_string().contains("Unknown argument: --fullscreen"));
    }
}
