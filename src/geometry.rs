use std::path::Path;

use glam::Vec3;
use log::{error, info};

use crate::mesh::{load_mesh_file, SurfaceMesh};

/// Flattened geometry ready for upload: positions in mesh vertex order plus
/// the triangle list that indexes them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn from_mesh(mesh: &SurfaceMesh) -> Self {
        Self {
            positions: resolve_vertices(mesh),
            indices: mesh.faces.iter().flatten().copied().collect(),
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions as tightly packed `[f32; 3]` for a vertex buffer.
    pub fn position_data(&self) -> Vec<[f32; 3]> {
        self.positions.iter().map(|p| p.to_array()).collect()
    }
}

/// Returns one position per mesh vertex, in the mesh's iteration order.
pub fn resolve_vertices(mesh: &SurfaceMesh) -> Vec<Vec3> {
    mesh.vertices().collect()
}

/// Loads a mesh file into [`Geometry`]. Failures are logged and produce
/// empty geometry, which callers treat as "nothing to draw".
pub fn load_geometry(path: impl AsRef<Path>) -> Geometry {
    let path = path.as_ref();
    match load_mesh_file(path) {
        Ok(mesh) => {
            let geometry = Geometry::from_mesh(&mesh);
            info!(
                "loaded mesh {} ({} vertices, {} triangles)",
                path.display(),
                geometry.vertex_count(),
                mesh.face_count()
            );
            geometry
        }
        Err(err) => {
            error!("failed to load mesh {}: {err}", path.display());
            Geometry::default()
        }
    }
}
