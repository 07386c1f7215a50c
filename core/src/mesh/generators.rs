//! Mesh generators for common 2D shapes.
//!
//! These generators produce [`MeshData`] of plain `[f32; 3]` positions that can
//! be uploaded to the GPU with `Mesh::from_data`.

use std::f32::consts::TAU;

use super::data::{MeshData, PrimitiveTopology};

/// Generate a unit quad on the XY plane spanning `(0,0)..(1,1)`.
///
/// Four vertices with indices `0,1,2, 1,2,3`.
pub fn unit_quad() -> MeshData<[f32; 3]> {
    MeshData::new(vec![
        [1.0, 1.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0],
    ])
    .with_indices(vec![0, 1, 2, 1, 2, 3])
    .with_label("unit_quad")
}

/// Generate a non-indexed triangle centered on the origin.
pub fn triangle(size: f32) -> MeshData<[f32; 3]> {
    MeshData::new(vec![
        [-size, -size, 0.0],
        [size, -size, 0.0],
        [0.0, size, 0.0],
    ])
    .with_label("triangle")
}

/// Generate a regular polygon on the XY plane.
///
/// Vertices sit on a circle of the given `radius`, starting on the +X axis
/// and going counter-clockwise. Indices triangulate the polygon as a fan
/// around vertex 0 in triangle-list form, `(sides - 2) * 3` indices total.
/// Fewer than three sides produces an empty mesh.
pub fn regular_polygon(sides: u32, radius: f32) -> MeshData<[f32; 3]> {
    if sides < 3 {
        return MeshData::new(Vec::new()).with_label("polygon");
    }

    let delta = TAU / sides as f32;
    let vertices = (0..sides)
        .map(|i| {
            let angle = i as f32 * delta;
            [angle.cos() * radius, angle.sin() * radius, 0.0]
        })
        .collect();

    let indices = (1..sides - 1).flat_map(|a| [0, a, a + 1]).collect();

    MeshData::new(vertices)
        .with_indices(indices)
        .with_topology(PrimitiveTopology::TriangleList)
        .with_label("polygon")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_quad() {
        let mesh = unit_quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert!(mesh.is_indexed());
        assert_eq!(mesh.indices(), Some(&[0, 1, 2, 1, 2, 3][..]));
    }

    #[test]
    fn test_triangle() {
        let mesh = triangle(0.5);
        assert_eq!(mesh.vertex_count(), 3);
        assert!(!mesh.is_indexed());
    }

    #[test]
    fn test_regular_polygon_hexagon() {
        let mesh = regular_polygon(6, 2.0);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_count(), 12);
        assert_eq!(&mesh.indices().unwrap()[..6], &[0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.first_out_of_range_index(), None);
        for v in mesh.vertices() {
            let r = (v[0] * v[0] + v[1] * v[1]).sqrt();
            assert!((r - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_polygon() {
        let mesh = regular_polygon(2, 1.0);
        assert_eq!(mesh.vertex_count(), 0);
        assert!(!mesh.is_indexed());
    }
}
