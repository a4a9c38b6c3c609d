// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Regular boolean operations between two argument groups.
//!
//! `fuse` and `common` run a [`CellsBuilder`] over both groups and select
//! cells by label. `section` computes the intersection curves and points of
//! the two groups' boundaries directly.

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::cells::{segment_crossings, CellsBuilder};
use crate::error::{KernelError, Result};
use crate::geometry::Location;
use crate::keys::*;
use crate::spatial::Sewer;
use crate::store::ShapeStore;

impl ShapeStore {
    /// Regular union of the two groups. Touching solids melt into one and
    /// coplanar faces merge.
    pub fn fuse(&mut self, a: &[Shape], b: &[Shape], fuzzy: f64) -> Result<Option<Shape>> {
        let mut builder = self.decompose(a, b, fuzzy)?;
        builder.add_all_to_result();
        builder.make_fused(self)
    }

    /// The parts lying in both groups, assembled into containers.
    pub fn common(&mut self, a: &[Shape], b: &[Shape], fuzzy: f64) -> Result<Option<Shape>> {
        let mut builder = self.decompose(a, b, fuzzy)?;
        let split = a.len();
        builder.add_to_result_if(|labels| {
            labels.iter().any(|&l| l < split) && labels.iter().any(|&l| l >= split)
        });
        builder.make_containers(self)
    }

    fn decompose(&mut self, a: &[Shape], b: &[Shape], fuzzy: f64) -> Result<CellsBuilder> {
        if a.is_empty() || b.is_empty() {
            return Err(KernelError::Unsupported(
                "boolean needs at least one shape in each group".to_string(),
            ));
        }
        let mut builder = CellsBuilder::new(fuzzy);
        for &shape in a.iter().chain(b) {
            builder.add_argument(shape);
        }
        builder.perform(self);
        if builder.has_errors() {
            return Err(KernelError::Decomposition(builder.dump_errors()));
        }
        Ok(builder)
    }

    /// Intersection curves and points between the boundaries of the two
    /// groups: edges where faces cross, vertices where edges pierce faces or
    /// cross each other. Coplanar face pairs contribute nothing. `None` when
    /// the boundaries do not meet.
    pub fn section(&mut self, a: &[Shape], b: &[Shape], tolerance: f64) -> Result<Option<Shape>> {
        for &shape in a.iter().chain(b) {
            self.ensure(shape)?;
        }
        let collect = |store: &ShapeStore, group: &[Shape], kind: ShapeKind| {
            let mut out: Vec<Shape> = Vec::new();
            for &shape in group {
                for sub in store.sub_shapes(shape, kind) {
                    if !out.contains(&sub) {
                        out.push(sub);
                    }
                }
            }
            out
        };
        let faces_a = collect(self, a, ShapeKind::Face);
        let faces_b = collect(self, b, ShapeKind::Face);
        let edges_a = collect(self, a, ShapeKind::Edge);
        let edges_b = collect(self, b, ShapeKind::Edge);

        let mut sewer = Sewer::new(tolerance);
        for &shape in a.iter().chain(b) {
            sewer.adopt(self, shape);
        }

        let mut segments: Vec<(Point3<f64>, Point3<f64>)> = Vec::new();
        for &fa in &faces_a {
            for &fb in &faces_b {
                if let (Shape::Face(ka), Shape::Face(kb)) = (fa, fb) {
                    if ka != kb {
                        segments.extend(self.face_face_segments(ka, kb, tolerance));
                    }
                }
            }
        }

        let mut points: Vec<Point3<f64>> = Vec::new();
        for (edges, faces) in [(&edges_a, &faces_b), (&edges_b, &faces_a)] {
            for &e in edges.iter() {
                for &f in faces.iter() {
                    if let (Shape::Edge(ek), Shape::Face(fk)) = (e, f) {
                        points.extend(self.edge_face_points(ek, fk, tolerance));
                    }
                }
            }
        }
        for &ea in &edges_a {
            for &eb in &edges_b {
                if ea == eb {
                    continue;
                }
                if let (Shape::Edge(ka), Shape::Edge(kb)) = (ea, eb) {
                    if let (Some((p, q)), Some((c, d))) = (self.edge_points(ka), self.edge_points(kb)) {
                        points.extend(
                            segment_crossings(&p, &q, &c, &d, tolerance)
                                .into_iter()
                                .map(|t| p + (q - p) * t),
                        );
                    }
                }
            }
        }

        let mut members: Vec<Shape> = Vec::new();
        let mut used: Vec<VertexKey> = Vec::new();
        for (p, q) in &segments {
            if let Some(edge) = sewer.edge_by_points(self, p, q)? {
                let shape = Shape::Edge(edge);
                if !members.contains(&shape) {
                    members.push(shape);
                }
                if let Some(data) = self.edge(edge) {
                    used.extend([data.start, data.end]);
                }
            }
        }
        for p in &points {
            let vertex = sewer.vertex(self, p);
            let shape = Shape::Vertex(vertex);
            if !used.contains(&vertex) && !members.contains(&shape) {
                members.push(shape);
            }
        }
        debug!(members = members.len(), "section computed");

        if members.is_empty() {
            return Ok(None);
        }
        self.add_compound(&members).map(Some)
    }

    /// Maximal segments of the line where two face planes meet that lie in
    /// both faces.
    fn face_face_segments(
        &self,
        a: FaceKey,
        b: FaceKey,
        tolerance: f64,
    ) -> Vec<(Point3<f64>, Point3<f64>)> {
        let (Some((na, oa)), Some((nb, ob))) = (self.face_plane(a), self.face_plane(b)) else {
            return Vec::new();
        };
        let u = na.cross(&nb);
        let len_sq = u.norm_squared();
        if len_sq < 1e-18 {
            return Vec::new();
        }
        let origin = Point3::from((nb * oa - na * ob).cross(&u) / len_sq);
        let dir = u / len_sq.sqrt();

        let mut params: Vec<f64> = Vec::new();
        for (face, normal, offset) in [(a, nb, ob), (b, na, oa)] {
            let Some((outer, holes)) = self.face_loops(face) else {
                continue;
            };
            for lp in std::iter::once(&outer).chain(holes.iter()) {
                for i in 0..lp.len() {
                    let (p, q) = (lp[i], lp[(i + 1) % lp.len()]);
                    params.extend(plane_crossing(&p, &q, &normal, offset, tolerance).map(
                        |x| (x - origin).dot(&dir),
                    ));
                }
            }
        }
        params.sort_by(|x, y| x.total_cmp(y));
        params.dedup_by(|x, y| (*x - *y).abs() <= tolerance);

        let inside = |p: &Point3<f64>, face: FaceKey| {
            self.classify_point_on_face(face, p, tolerance)
                .map_or(false, |l| l != Location::Out)
        };
        let mut out: Vec<(Point3<f64>, Point3<f64>)> = Vec::new();
        let mut open: Option<f64> = None;
        for pair in params.windows(2) {
            let mid = origin + dir * ((pair[0] + pair[1]) * 0.5);
            if inside(&mid, a) && inside(&mid, b) {
                open.get_or_insert(pair[0]);
            } else if let Some(start) = open.take() {
                out.push((origin + dir * start, origin + dir * pair[0]));
            }
        }
        if let (Some(start), Some(&end)) = (open, params.last()) {
            out.push((origin + dir * start, origin + dir * end));
        }
        out
    }

    /// Points where an edge meets a face it does not lie in.
    fn edge_face_points(&self, edge: EdgeKey, face: FaceKey, tolerance: f64) -> Vec<Point3<f64>> {
        let (Some((p, q)), Some((normal, offset))) = (self.edge_points(edge), self.face_plane(face))
        else {
            return Vec::new();
        };
        let dp = normal.dot(&p.coords) - offset;
        let dq = normal.dot(&q.coords) - offset;
        if dp.abs() <= tolerance && dq.abs() <= tolerance {
            return Vec::new();
        }
        plane_crossing(&p, &q, &normal, offset, tolerance)
            .filter(|x| self.classify_point_on_face(face, x, tolerance) != Some(Location::Out))
            .collect()
    }
}

/// Points of the segment `p`–`q` on the plane `normal · x = offset`: the
/// touching endpoints, or the crossing point. Empty when the segment lies in
/// the plane.
fn plane_crossing(
    p: &Point3<f64>,
    q: &Point3<f64>,
    normal: &Vector3<f64>,
    offset: f64,
    tolerance: f64,
) -> impl Iterator<Item = Point3<f64>> {
    let dp = normal.dot(&p.coords) - offset;
    let dq = normal.dot(&q.coords) - offset;
    let mut out: Vec<Point3<f64>> = Vec::with_capacity(2);
    if dp.abs() <= tolerance {
        out.push(*p);
    }
    if dq.abs() <= tolerance {
        out.push(*q);
    }
    if (dp > tolerance && dq < -tolerance) || (dp < -tolerance && dq > tolerance) {
        let t = dp / (dp - dq);
        out.push(p + (q - p) * t);
    }
    out.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn offset_cubes(store: &mut ShapeStore) -> (Shape, Shape) {
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]).unwrap();
        (Shape::Solid(a), Shape::Solid(b))
    }

    fn volume(store: &ShapeStore, shape: Shape) -> f64 {
        store
            .sub_shapes(shape, ShapeKind::Solid)
            .into_iter()
            .filter_map(|s| match s {
                Shape::Solid(k) => store.solid_volume(k),
                _ => None,
            })
            .sum()
    }

    #[test]
    fn fuse_offset_cubes() {
        let mut store = ShapeStore::new();
        let (a, b) = offset_cubes(&mut store);
        let fused = store.fuse(&[a], &[b], 1e-6).unwrap().unwrap();
        assert_eq!(store.sub_shapes(fused, ShapeKind::Solid).len(), 1);
        assert_relative_eq!(volume(&store, fused), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn common_offset_cubes() {
        let mut store = ShapeStore::new();
        let (a, b) = offset_cubes(&mut store);
        let common = store.common(&[a], &[b], 1e-6).unwrap().unwrap();
        assert_relative_eq!(volume(&store, common), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn common_of_disjoint_is_none() {
        let mut store = ShapeStore::new();
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([3.0; 3], [4.0; 3]).unwrap();
        let common = store
            .common(&[Shape::Solid(a)], &[Shape::Solid(b)], 1e-6)
            .unwrap();
        assert!(common.is_none());
    }

    #[test]
    fn section_of_offset_cubes_is_overlap_wireframe() {
        let mut store = ShapeStore::new();
        let (a, b) = offset_cubes(&mut store);
        let section = store.section(&[a], &[b], 1e-6).unwrap().unwrap();
        assert_eq!(store.sub_shapes(section, ShapeKind::Edge).len(), 12);
        let Shape::Compound(ck) = section else {
            panic!("expected compound");
        };
        assert!(store
            .compound(ck)
            .unwrap()
            .members
            .iter()
            .all(|m| m.kind() == ShapeKind::Edge));
    }

    #[test]
    fn section_of_edge_through_face_is_vertex() {
        let mut store = ShapeStore::new();
        let face = store
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])
            .unwrap();
        let v0 = store.add_vertex(0.5, 0.5, -1.0);
        let v1 = store.add_vertex(0.5, 0.5, 1.0);
        let edge = store.add_edge(v0, v1).unwrap();

        let section = store
            .section(&[Shape::Face(face)], &[Shape::Edge(edge)], 1e-6)
            .unwrap()
            .unwrap();
        let vertices = store.sub_shapes(section, ShapeKind::Vertex);
        assert_eq!(vertices.len(), 1);
        let Shape::Vertex(vk) = vertices[0] else {
            panic!("expected vertex");
        };
        let p = store.vertex_point(vk).unwrap();
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn section_of_separate_shapes_is_none() {
        let mut store = ShapeStore::new();
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([3.0; 3], [4.0; 3]).unwrap();
        assert!(store
            .section(&[Shape::Solid(a)], &[Shape::Solid(b)], 1e-6)
            .unwrap()
            .is_none());
    }
}
