use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use thiserror::Error;

/// Polygon mesh as read from disk: vertex positions in file order plus
/// fan-triangulated faces indexing into them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceMesh {
    pub positions: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Iterates vertex positions in source order.
    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported mesh format for {0} (expected .obj or .off)")]
    UnsupportedFormat(PathBuf),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl MeshError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Reads a mesh file, picking the parser from the file extension.
pub fn load_mesh_file(path: impl AsRef<Path>) -> Result<SurfaceMesh, MeshError> {
    let path = path.as_ref();
    let parser: fn(&str) -> Result<SurfaceMesh, MeshError> = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("obj") => load_obj_from_str,
        Some("off") => load_off_from_str,
        _ => return Err(MeshError::UnsupportedFormat(path.to_path_buf())),
    };
    let contents = fs::read_to_string(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parser(&contents)
}

/// Parses a Wavefront OBJ file from memory.
///
/// Only positions and face connectivity are kept; texture coordinates and
/// normals referenced by faces are ignored.
pub fn load_obj_from_str(data: &str) -> Result<SurfaceMesh, MeshError> {
    let mut mesh = SurfaceMesh::default();
    let mut polygons = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => mesh.positions.push(
                parse_vec3(parts).map_err(|message| MeshError::parse(line_no, message))?,
            ),
            "f" => polygons.push((line_no, parse_obj_face(parts, line_no)?)),
            _ => {}
        }
    }

    // Faces may reference vertices declared later in the file, so indices are
    // resolved once every position is known.
    let len = mesh.positions.len();
    for (line_no, polygon) in polygons {
        let resolved = polygon
            .into_iter()
            .map(|index| {
                fix_index(index, len)
                    .ok_or_else(|| MeshError::parse(line_no, format!("invalid vertex index {index}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        triangulate_face(&resolved, &mut mesh.faces);
    }

    Ok(mesh)
}

/// Parses an ASCII OFF file from memory.
pub fn load_off_from_str(data: &str) -> Result<SurfaceMesh, MeshError> {
    let mut lines = data
        .lines()
        .enumerate()
        .map(|(no, line)| (no + 1, strip_comment(line).trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_no, header) = lines
        .next()
        .ok_or_else(|| MeshError::parse(1, "missing OFF header"))?;
    // Some writers put the counts on the header line itself.
    let counts = match header.strip_prefix("OFF") {
        Some(rest) if !rest.trim().is_empty() => (header_no, rest.trim()),
        Some(_) => lines
            .next()
            .ok_or_else(|| MeshError::parse(header_no, "missing element counts"))?,
        None => return Err(MeshError::parse(header_no, "missing OFF header")),
    };

    let (counts_no, counts) = counts;
    let mut fields = counts.split_whitespace();
    let vertex_count = parse_count(fields.next(), counts_no, "vertex count")?;
    let face_count = parse_count(fields.next(), counts_no, "face count")?;

    // Counts come from the file; storage grows with the lines actually read.
    let mut mesh = SurfaceMesh::default();

    for _ in 0..vertex_count {
        let (line_no, line) = lines
            .next()
            .ok_or_else(|| MeshError::parse(counts_no, "unexpected end of vertex list"))?;
        mesh.positions.push(
            parse_vec3(line.split_whitespace())
                .map_err(|message| MeshError::parse(line_no, message))?,
        );
    }

    for _ in 0..face_count {
        let (line_no, line) = lines
            .next()
            .ok_or_else(|| MeshError::parse(counts_no, "unexpected end of face list"))?;
        let mut fields = line.split_whitespace();
        let arity = parse_count(fields.next(), line_no, "face arity")?;
        let polygon = fields
            .take(arity)
            .map(|field| {
                field
                    .parse::<usize>()
                    .ok()
                    .filter(|&index| index < vertex_count)
                    .ok_or_else(|| MeshError::parse(line_no, format!("invalid vertex index {field}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if polygon.len() != arity || arity < 3 {
            return Err(MeshError::parse(
                line_no,
                "faces must reference at least 3 vertices",
            ));
        }
        triangulate_face(&polygon, &mut mesh.faces);
    }

    Ok(mesh)
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or_default()
}

fn parse_count(field: Option<&str>, line: usize, what: &str) -> Result<usize, MeshError> {
    field
        .and_then(|value| value.parse::<usize>().ok())
        .ok_or_else(|| MeshError::parse(line, format!("invalid {what}")))
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3, String> {
    let mut component = || -> Result<f32, String> {
        let value = parts
            .next()
            .ok_or_else(|| "missing vector component".to_string())?;
        value
            .parse::<f32>()
            .map_err(|err| format!("invalid vector component {value:?}: {err}"))
    };
    let x = component()?;
    let y = component()?;
    let z = component()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_obj_face<'a>(
    parts: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<Vec<i64>, MeshError> {
    let mut indices = Vec::new();
    for part in parts {
        let position = part.split('/').next().unwrap_or_default();
        let index = position
            .parse::<i64>()
            .map_err(|_| MeshError::parse(line, format!("invalid face reference {part:?}")))?;
        indices.push(index);
    }
    if indices.len() < 3 {
        return Err(MeshError::parse(
            line,
            "faces must reference at least 3 vertices",
        ));
    }
    Ok(indices)
}

fn triangulate_face(polygon: &[usize], faces: &mut Vec<[u32; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([
            polygon[0] as u32,
            polygon[i] as u32,
            polygon[i + 1] as u32,
        ]);
    }
}

/// Converts a 1-based (or negative, relative) OBJ index into a 0-based one.
fn fix_index(index: i64, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}
