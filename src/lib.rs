//! Building blocks for a small real-time viewer.
//!
//! The crate renders either a raymarched scene driven entirely by a
//! fragment shader, or a single mesh loaded from disk, under a keyboard
//! driven free-fly camera. Everything except the `render` module is free of
//! GPU and windowing state so it can be exercised headlessly.

pub mod app;
pub mod camera;
pub mod config;
pub mod geometry;
pub mod input;
pub mod mesh;
pub mod render;
pub mod shader;
pub mod transform;

pub use app::{FrameUpdate, RenderContext};
pub use camera::{Camera, CameraImpulse};
pub use config::{CliOptions, RenderMode, ViewerConfig};
pub use geometry::{load_geometry, resolve_vertices, Geometry};
pub use input::{InputQueue, KeyAction, KeyBindings, KeyCode, KeyEvent, KeyState, NamedKey};
pub use mesh::{load_mesh_file, load_obj_from_str, load_off_from_str, MeshError, SurfaceMesh};
pub use render::{DrawCall, FrameUniforms, Renderer, ShaderProgram};
pub use shader::{
    compile_stage, read_shader_file, CompiledStage, ProgramInterface, ProgramStages, ResourceUse,
    ShaderError, ShaderKind,
};
pub use transform::{Transforms, Viewport};
