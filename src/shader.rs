//! WGSL stage compilation and program interface checks.
//!
//! Stages are parsed and validated with `naga` before anything touches the
//! GPU, so diagnostics are available even without a device.

use std::fmt;
use std::fs;
use std::path::Path;

use log::error;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Handle, Module, ShaderStage, Type, TypeInner};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    fn stage(self) -> ShaderStage {
        match self {
            Self::Vertex => ShaderStage::Vertex,
            Self::Fragment => ShaderStage::Fragment,
        }
    }

    fn attribute(self) -> &'static str {
        match self {
            Self::Vertex => "@vertex",
            Self::Fragment => "@fragment",
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Failed to compile {kind} shader!\n{log}")]
    Compile { kind: ShaderKind, log: String },
    #[error("Failed to link shader program!\n{log}")]
    Link { log: String },
}

/// What the host binds for a program: the vertex attribute locations fed by
/// vertex buffers and the size of the uniform block at `@group(0) @binding(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramInterface<'a> {
    pub vertex_inputs: &'a [u32],
    pub uniform_size: u64,
}

/// A resource binding read or written by an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUse {
    pub group: u32,
    pub binding: u32,
    pub uniform: bool,
    pub size: u32,
}

/// A validated shader stage. Holds the source for module creation, the
/// user-defined locations crossing the stage boundary and the resources the
/// entry point touches.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    kind: ShaderKind,
    source: String,
    entry_point: String,
    inputs: Vec<u32>,
    outputs: Vec<u32>,
    resources: Vec<ResourceUse>,
}

impl CompiledStage {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// `@location` indices read by the entry point.
    pub fn inputs(&self) -> &[u32] {
        &self.inputs
    }

    /// `@location` indices written by the entry point.
    pub fn outputs(&self) -> &[u32] {
        &self.outputs
    }

    pub fn resources(&self) -> &[ResourceUse] {
        &self.resources
    }
}

/// Reads a shader source file. A missing or unreadable file is reported and
/// yields an empty string, which then fails to compile.
pub fn read_shader_file(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            error!("Could not open file: {} ({err})", path.display());
            String::new()
        }
    }
}

/// Parses and validates a single WGSL stage.
pub fn compile_stage(kind: ShaderKind, source: &str) -> Result<CompiledStage, ShaderError> {
    let compile_error = |log: String| ShaderError::Compile { kind, log };

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| compile_error(err.emit_to_string(source)))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|err| compile_error(err.emit_to_string(source)))?;

    let (index, entry) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, entry)| entry.stage == kind.stage())
        .ok_or_else(|| compile_error(format!("no {} entry point found", kind.attribute())))?;

    let inputs = entry
        .function
        .arguments
        .iter()
        .flat_map(|arg| locations(&module, arg.ty, arg.binding.as_ref()))
        .collect();
    let outputs = entry
        .function
        .result
        .as_ref()
        .map(|result| locations(&module, result.ty, result.binding.as_ref()))
        .unwrap_or_default();

    let usage = info.get_entry_point(index);
    let resources = module
        .global_variables
        .iter()
        .filter(|(handle, _)| !usage[*handle].is_empty())
        .filter_map(|(_, var)| {
            var.binding.as_ref().map(|binding| ResourceUse {
                group: binding.group,
                binding: binding.binding,
                uniform: matches!(var.space, AddressSpace::Uniform),
                size: module.types[var.ty].inner.size(module.to_ctx()),
            })
        })
        .collect();

    Ok(CompiledStage {
        kind,
        source: source.to_string(),
        entry_point: entry.name.clone(),
        inputs,
        outputs,
        resources,
    })
}

/// Checks that `vertex` and `fragment` can form one program against what the
/// host binds: stage kinds match their slots, every vertex input comes from a
/// vertex buffer, every fragment input is written by the vertex stage and the
/// only resource used is the uniform block.
pub fn check_interface(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
    interface: &ProgramInterface<'_>,
) -> Result<(), ShaderError> {
    let link_error = |log: String| ShaderError::Link { log };

    if vertex.kind != ShaderKind::Vertex || fragment.kind != ShaderKind::Fragment {
        return Err(link_error(format!(
            "expected a vertex and a fragment stage, got {} and {}",
            vertex.kind, fragment.kind
        )));
    }

    let unfed = missing_locations(&vertex.inputs, interface.vertex_inputs);
    if !unfed.is_empty() {
        return Err(link_error(format!(
            "vertex input {unfed} of {} is not supplied by any vertex buffer",
            vertex.entry_point
        )));
    }

    let unwritten = missing_locations(&fragment.inputs, &vertex.outputs);
    if !unwritten.is_empty() {
        return Err(link_error(format!(
            "fragment input {unwritten} not written by vertex entry point {}",
            vertex.entry_point
        )));
    }

    for resource in vertex.resources.iter().chain(&fragment.resources) {
        if (resource.group, resource.binding) != (0, 0) || !resource.uniform {
            return Err(link_error(format!(
                "resource at @group({}) @binding({}) is not bound; only a uniform block at @group(0) @binding(0) is provided",
                resource.group, resource.binding
            )));
        }
        if u64::from(resource.size) > interface.uniform_size {
            return Err(link_error(format!(
                "uniform block at @group(0) @binding(0) is {} bytes, but only {} are bound",
                resource.size, interface.uniform_size
            )));
        }
    }
    Ok(())
}

fn missing_locations(wanted: &[u32], provided: &[u32]) -> String {
    wanted
        .iter()
        .filter(|location| !provided.contains(location))
        .map(|location| format!("@location({location})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Both stages of a program, compiled and interface-checked.
#[derive(Debug, Clone)]
pub struct ProgramStages {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
}

impl ProgramStages {
    /// Compiles both stages, then checks them against each other and against
    /// `interface`. Every failure is logged; the first one is returned.
    pub fn build(
        vertex_source: &str,
        fragment_source: &str,
        interface: &ProgramInterface<'_>,
    ) -> Result<Self, ShaderError> {
        let vertex = compile_stage(ShaderKind::Vertex, vertex_source).inspect_err(log_failure);
        let fragment =
            compile_stage(ShaderKind::Fragment, fragment_source).inspect_err(log_failure);
        let (vertex, fragment) = (vertex?, fragment?);
        check_interface(&vertex, &fragment, interface).inspect_err(log_failure)?;
        Ok(Self { vertex, fragment })
    }
}

fn log_failure(err: &ShaderError) {
    error!("{err}");
}

fn locations(module: &Module, ty: Handle<Type>, binding: Option<&Binding>) -> Vec<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => vec![*location],
        Some(Binding::BuiltIn(_)) => Vec::new(),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|member| match member.binding {
                    Some(Binding::Location { location, .. }) => Some(location),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 1.0);
    out.color = position;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;

    const MESH_INTERFACE: ProgramInterface<'static> = ProgramInterface {
        vertex_inputs: &[0],
        uniform_size: 112,
    };

    const QUAD_INTERFACE: ProgramInterface<'static> = ProgramInterface {
        vertex_inputs: &[],
        uniform_size: 112,
    };

    fn fragment_with_uniform(declaration: &str) -> String {
        format!(
            "{declaration}\n@fragment\nfn fs_main() -> @location(0) vec4<f32> {{\n    return block.color;\n}}\n"
        )
    }

    fn quad_vertex() -> CompiledStage {
        compile_stage(ShaderKind::Vertex, include_str!("../shaders/basic.vert.wgsl")).unwrap()
    }

    #[test]
    fn compiles_valid_stages() {
        let vertex = compile_stage(ShaderKind::Vertex, VERTEX).unwrap();
        assert_eq!(vertex.entry_point(), "vs_main");
        assert_eq!(vertex.inputs(), &[0]);
        assert_eq!(vertex.outputs(), &[0]);
        assert!(vertex.resources().is_empty());

        let fragment = compile_stage(ShaderKind::Fragment, FRAGMENT).unwrap();
        assert_eq!(fragment.entry_point(), "fs_main");
        assert_eq!(fragment.inputs(), &[0]);
        check_interface(&vertex, &fragment, &MESH_INTERFACE).unwrap();
    }

    #[test]
    fn syntax_error_names_vertex_stage() {
        let err = compile_stage(ShaderKind::Vertex, "@vertex fn vs_main( {").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("vertex"), "{message}");
        match err {
            ShaderError::Compile { kind, log } => {
                assert_eq!(kind, ShaderKind::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn syntax_error_names_fragment_stage() {
        let broken = FRAGMENT.replace("return", "retrun");
        let err = compile_stage(ShaderKind::Fragment, &broken).unwrap_err();
        assert!(err.to_string().starts_with("Failed to compile fragment shader!"));
    }

    #[test]
    fn empty_source_has_no_entry_point() {
        let err = compile_stage(ShaderKind::Fragment, "").unwrap_err();
        assert!(err.to_string().contains("no @fragment entry point"));
    }

    #[test]
    fn wrong_stage_attribute_is_a_compile_error() {
        let err = compile_stage(ShaderKind::Vertex, FRAGMENT).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                kind: ShaderKind::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn validation_errors_are_reported() {
        let source = "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return 1.0;\n}\n";
        let err = compile_stage(ShaderKind::Fragment, source).unwrap_err();
        assert!(err.to_string().contains("fragment"));
    }

    #[test]
    fn missing_varying_fails_interface_check() {
        let fragment = compile_stage(ShaderKind::Fragment, FRAGMENT).unwrap();
        let err = check_interface(&quad_vertex(), &fragment, &QUAD_INTERFACE).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to link shader program!"), "{message}");
        assert!(message.contains("fragment input @location(0)"), "{message}");
    }

    #[test]
    fn swapped_stages_fail_interface_check() {
        let vertex = compile_stage(ShaderKind::Vertex, VERTEX).unwrap();
        let fragment = compile_stage(ShaderKind::Fragment, FRAGMENT).unwrap();
        assert!(matches!(
            check_interface(&fragment, &vertex, &MESH_INTERFACE),
            Err(ShaderError::Link { .. })
        ));
    }

    #[test]
    fn vertex_attribute_without_buffer_fails_to_link() {
        let vertex = compile_stage(ShaderKind::Vertex, VERTEX).unwrap();
        let fragment = compile_stage(ShaderKind::Fragment, FRAGMENT).unwrap();
        let err = check_interface(&vertex, &fragment, &QUAD_INTERFACE).unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("vertex input @location(0) of vs_main is not supplied"),
            "{message}"
        );
    }

    #[test]
    fn uniform_block_is_recorded_per_entry_point() {
        let vertex = compile_stage(ShaderKind::Vertex, include_str!("../shaders/mesh.vert.wgsl"))
            .unwrap();
        assert_eq!(
            vertex.resources(),
            &[ResourceUse {
                group: 0,
                binding: 0,
                uniform: true,
                size: 112,
            }]
        );
    }

    #[test]
    fn unbound_resource_fails_to_link() {
        let fragment = compile_stage(
            ShaderKind::Fragment,
            &fragment_with_uniform(
                "struct Block { color: vec4<f32> }\n@group(1) @binding(0) var<uniform> block: Block;",
            ),
        )
        .unwrap();
        let err = check_interface(&quad_vertex(), &fragment, &QUAD_INTERFACE).unwrap_err();
        assert!(err.to_string().contains("@group(1) @binding(0) is not bound"));
    }

    #[test]
    fn oversized_uniform_block_fails_to_link() {
        let fragment = compile_stage(
            ShaderKind::Fragment,
            &fragment_with_uniform(
                "struct Block { color: vec4<f32>, extra: array<vec4<f32>, 8> }\n@group(0) @binding(0) var<uniform> block: Block;",
            ),
        )
        .unwrap();
        let err = check_interface(&quad_vertex(), &fragment, &QUAD_INTERFACE).unwrap_err();
        assert!(err.to_string().contains("144 bytes, but only 112 are bound"));
    }

    #[test]
    fn unused_bindings_are_ignored() {
        let source = "struct Block { color: vec4<f32> }\n@group(3) @binding(7) var<uniform> block: Block;\n@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return vec4<f32>(1.0);\n}\n";
        let fragment = compile_stage(ShaderKind::Fragment, source).unwrap();
        assert!(fragment.resources().is_empty());
        check_interface(&quad_vertex(), &fragment, &QUAD_INTERFACE).unwrap();
    }

    #[test]
    fn program_stages_build_reports_first_failure() {
        assert!(ProgramStages::build(VERTEX, FRAGMENT, &MESH_INTERFACE).is_ok());
        let err = ProgramStages::build(VERTEX, "fn broken(", &MESH_INTERFACE).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                kind: ShaderKind::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn bundled_raymarch_shaders_link() {
        let stages = ProgramStages::build(
            include_str!("../shaders/basic.vert.wgsl"),
            include_str!("../shaders/raymarcher.frag.wgsl"),
            &QUAD_INTERFACE,
        )
        .unwrap();
        assert!(stages.vertex.inputs().is_empty());
        assert!(stages.fragment.inputs().is_empty());
    }

    #[test]
    fn bundled_mesh_shaders_link() {
        let stages = ProgramStages::build(
            include_str!("../shaders/mesh.vert.wgsl"),
            include_str!("../shaders/mesh.frag.wgsl"),
            &MESH_INTERFACE,
        )
        .unwrap();
        assert_eq!(stages.vertex.inputs(), &[0]);
        assert_eq!(stages.fragment.inputs(), &[0]);
    }

    #[test]
    fn mesh_shaders_do_not_link_in_raymarch_mode() {
        let err = ProgramStages::build(
            include_str!("../shaders/mesh.vert.wgsl"),
            include_str!("../shaders/mesh.frag.wgsl"),
            &QUAD_INTERFACE,
        )
        .unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn missing_file_reads_as_empty_source() {
        assert!(read_shader_file("no/such/shader.wgsl").is_empty());
    }
}
