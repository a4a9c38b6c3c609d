// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level builders with tolerance-based vertex, edge and face sharing
//! (face sewing).
//!
//! Faces whose corners coincide within tolerance share vertices and edges;
//! faces with the same boundary become one face. This is how adjacent
//! solids end up sharing their common wall.

use nalgebra::Point3;

use crate::error::{KernelError, Result};
use crate::keys::*;
use crate::spatial::Sewer;
use crate::store::ShapeStore;

impl ShapeStore {
    /// Creates a face from coordinate triples, creating vertices as needed.
    pub fn add_face_by_coords(&mut self, coords: &[[f64; 3]]) -> Result<FaceKey> {
        if coords.len() < 3 {
            return Err(KernelError::DegenerateFace);
        }
        let mut sewer = Sewer::new(1e-10);
        let points = to_points(coords);
        let (face, _) = sewer.face(self, &points, &[])?;
        Ok(face)
    }

    /// Creates a shell from face coordinate lists, with tolerance-based vertex
    /// and edge sharing.
    ///
    /// Faces that share vertex positions within `tolerance` will share the
    /// same vertex and edge entities.
    pub fn sew_faces(
        &mut self,
        face_coords: &[Vec<[f64; 3]>],
        tolerance: f64,
    ) -> Result<(ShellKey, Vec<FaceKey>)> {
        let mut sewer = Sewer::new(tolerance);
        self.sew_faces_with(&mut sewer, face_coords)
    }

    fn sew_faces_with(
        &mut self,
        sewer: &mut Sewer,
        face_coords: &[Vec<[f64; 3]>],
    ) -> Result<(ShellKey, Vec<FaceKey>)> {
        if face_coords.is_empty() {
            return Err(KernelError::EmptyShell);
        }

        let mut faces = Vec::with_capacity(face_coords.len());
        let mut reversed = Vec::with_capacity(face_coords.len());
        for coords in face_coords {
            if coords.len() < 3 {
                return Err(KernelError::DegenerateFace);
            }
            let (face, flipped) = sewer.face(self, &to_points(coords), &[])?;
            faces.push(face);
            reversed.push(flipped);
        }

        let shell = self.add_shell_oriented(&faces, &reversed)?;
        Ok((shell, faces))
    }

    /// Constructs a solid from face coordinate lists with sewing.
    pub fn add_solid_by_faces(
        &mut self,
        face_coords: &[Vec<[f64; 3]>],
        tolerance: f64,
    ) -> Result<SolidKey> {
        let (shell, _) = self.sew_faces(face_coords, tolerance)?;
        self.add_solid(shell)
    }

    /// Constructs a comp-solid from multiple groups of face coordinates.
    ///
    /// Each group represents a solid. Faces shared between solids (within
    /// tolerance) become one face used by both shells.
    pub fn add_comp_solid_by_solids(
        &mut self,
        solid_face_coords: &[Vec<Vec<[f64; 3]>>],
        tolerance: f64,
    ) -> Result<CompSolidKey> {
        if solid_face_coords.is_empty() {
            return Err(KernelError::EmptyCompSolid);
        }

        let mut sewer = Sewer::new(tolerance);
        let mut solids = Vec::with_capacity(solid_face_coords.len());
        for coords in solid_face_coords {
            let (shell, _) = self.sew_faces_with(&mut sewer, coords)?;
            solids.push(self.add_solid(shell)?);
        }
        self.add_comp_solid(&solids)
    }

    /// Creates a box solid from min/max corners.
    pub fn make_box(
        &mut self,
        min: [f64; 3],
        max: [f64; 3],
    ) -> Result<(SolidKey, ShellKey, [FaceKey; 6])> {
        let (shell, face_keys) = self.sew_faces(&box_faces(min, max), 1e-10)?;
        let solid = self.add_solid(shell)?;
        let faces = [
            face_keys[0],
            face_keys[1],
            face_keys[2],
            face_keys[3],
            face_keys[4],
            face_keys[5],
        ];
        Ok((solid, shell, faces))
    }

    /// Creates two adjacent box solids sharing a face, forming a comp-solid.
    pub fn make_adjacent_boxes(
        &mut self,
        box1_min: [f64; 3],
        box1_max: [f64; 3],
        box2_min: [f64; 3],
        box2_max: [f64; 3],
        tolerance: f64,
    ) -> Result<CompSolidKey> {
        self.add_comp_solid_by_solids(
            &[box_faces(box1_min, box1_max), box_faces(box2_min, box2_max)],
            tolerance,
        )
    }
}

/// Outward-wound faces of an axis-aligned box: bottom, top, front, back,
/// left, right.
pub fn box_faces(min: [f64; 3], max: [f64; 3]) -> Vec<Vec<[f64; 3]>> {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;
    vec![
        vec![[x0, y0, z0], [x0, y1, z0], [x1, y1, z0], [x1, y0, z0]],
        vec![[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
        vec![[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
        vec![[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]],
        vec![[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
        vec![[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]],
    ]
}

fn to_points(coords: &[[f64; 3]]) -> Vec<Point3<f64>> {
    coords.iter().map(|c| Point3::new(c[0], c[1], c[2])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn face_by_coords() {
        let mut store = ShapeStore::new();
        let face = store
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]])
            .unwrap();
        assert_relative_eq!(store.face_area(face).unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn sewing_shares_edges() {
        let mut store = ShapeStore::new();
        let (shell, faces) = store
            .sew_faces(
                &[
                    vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
                    vec![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
                ],
                1e-6,
            )
            .unwrap();

        assert_eq!(faces.len(), 2);
        assert_eq!(store.vertex_count(), 6);
        assert_eq!(store.edge_count(), 7);
        assert!(!store.is_shell_closed(shell));
    }

    #[test]
    fn box_is_closed_unit_volume() {
        let mut store = ShapeStore::new();
        let (solid, shell, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();

        assert!(store.is_shell_closed(shell));
        assert_relative_eq!(store.solid_volume(solid).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn adjacent_boxes_share_wall() {
        let mut store = ShapeStore::new();
        let complex = store
            .make_adjacent_boxes([0.0; 3], [1.0; 3], [1.0, 0.0, 0.0], [2.0, 1.0, 1.0], 1e-6)
            .unwrap();

        assert_eq!(store.comp_solid(complex).unwrap().solids.len(), 2);
        assert_eq!(store.face_count(), 11);
        assert_eq!(store.vertex_count(), 12);
    }

    #[test]
    fn open_faces_do_not_bound_solid() {
        let mut store = ShapeStore::new();
        let mut faces = box_faces([0.0; 3], [1.0; 3]);
        faces.pop();
        assert!(matches!(
            store.add_solid_by_faces(&faces, 1e-6),
            Err(KernelError::OpenShell(4))
        ));
    }
}
