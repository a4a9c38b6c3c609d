// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries on shapes.
//!
//! Lengths, areas, volumes, normals, centres, point classification and
//! point-to-shape distance, computed directly on the polyhedral data.

use nalgebra::{Point3, Vector3};

use crate::keys::*;
use crate::store::ShapeStore;

/// A triangle as three points.
pub type Triangle = [Point3<f64>; 3];

/// Where a point lies relative to a face or solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    In,
    On,
    Out,
}

/// Unnormalised polygon normal by Newell's method. Its length is twice the
/// polygon area.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = points.len();
    for i in 0..n {
        let curr = points[i];
        let next = points[(i + 1) % n];
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }
    normal
}

/// Distance from `p` to the segment `a`–`b`.
pub fn point_segment_distance(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-30 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Index pair of the two coordinates kept when projecting along `normal`.
pub(crate) fn dominant_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let abs_n = normal.abs();
    if abs_n.z >= abs_n.x && abs_n.z >= abs_n.y {
        (0, 1)
    } else if abs_n.y >= abs_n.x {
        (0, 2)
    } else {
        (1, 2)
    }
}

fn crossings_2d(loop_pts: &[[f64; 2]], q: [f64; 2]) -> usize {
    let n = loop_pts.len();
    let mut count = 0;
    for i in 0..n {
        let a = loop_pts[i];
        let b = loop_pts[(i + 1) % n];
        if (a[1] > q[1]) != (b[1] > q[1]) {
            let x = a[0] + (q[1] - a[1]) / (b[1] - a[1]) * (b[0] - a[0]);
            if x > q[0] {
                count += 1;
            }
        }
    }
    count
}

impl ShapeStore {
    /// Returns the 3D position of a vertex.
    pub fn vertex_point(&self, key: VertexKey) -> Option<Point3<f64>> {
        self.vertices.get(key).map(|v| Point3::new(v.x, v.y, v.z))
    }

    /// Returns the end points of an edge.
    pub fn edge_points(&self, key: EdgeKey) -> Option<(Point3<f64>, Point3<f64>)> {
        let edge = self.edges.get(key)?;
        Some((self.vertex_point(edge.start)?, self.vertex_point(edge.end)?))
    }

    /// Computes the Euclidean length of an edge.
    pub fn edge_length(&self, key: EdgeKey) -> Option<f64> {
        let (p0, p1) = self.edge_points(key)?;
        Some((p1 - p0).norm())
    }

    /// Computes the unit face normal from the outer loop winding.
    pub fn face_normal(&self, key: FaceKey) -> Option<Vector3<f64>> {
        let face = self.faces.get(key)?;
        let points = self.wire_points(face.outer_wire)?;
        newell_normal(&points).try_normalize(1e-15)
    }

    /// Plane of a face as `(unit normal, offset)` with `normal · p = offset`.
    pub fn face_plane(&self, key: FaceKey) -> Option<(Vector3<f64>, f64)> {
        let normal = self.face_normal(key)?;
        let face = self.faces.get(key)?;
        let points = self.wire_points(face.outer_wire)?;
        let n = points.len() as f64;
        let mean = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
        Some((normal, normal.dot(&mean)))
    }

    /// Area of a face, holes subtracted.
    pub fn face_area(&self, key: FaceKey) -> Option<f64> {
        let (outer, holes) = self.face_loops(key)?;
        let mut area = newell_normal(&outer).norm() / 2.0;
        for hole in &holes {
            area -= newell_normal(hole).norm() / 2.0;
        }
        Some(area.abs())
    }

    /// Triangulates a face by ear clipping on its dominant projection plane.
    /// Triangles are wound along the face normal.
    pub fn triangulate_face(&self, key: FaceKey) -> Option<Vec<Triangle>> {
        let (outer, holes) = self.face_loops(key)?;
        if outer.len() < 3 {
            return None;
        }
        let normal = self.face_normal(key)?;
        let (ax_u, ax_v) = dominant_axes(&normal);

        let mut coords_2d: Vec<f64> = Vec::new();
        let mut all_points: Vec<Point3<f64>> = Vec::new();
        for p in &outer {
            coords_2d.push(p[ax_u]);
            coords_2d.push(p[ax_v]);
            all_points.push(*p);
        }

        let mut hole_indices: Vec<usize> = Vec::new();
        for hole in &holes {
            hole_indices.push(all_points.len());
            for p in hole {
                coords_2d.push(p[ax_u]);
                coords_2d.push(p[ax_v]);
                all_points.push(*p);
            }
        }

        let indices = earcutr::earcut(&coords_2d, &hole_indices, 2).ok()?;

        let mut triangles = Vec::with_capacity(indices.len() / 3);
        for chunk in indices.chunks(3) {
            if chunk.len() < 3 {
                continue;
            }
            let (a, b, c) = (all_points[chunk[0]], all_points[chunk[1]], all_points[chunk[2]]);
            if (b - a).cross(&(c - a)).dot(&normal) < 0.0 {
                triangles.push([a, c, b]);
            } else {
                triangles.push([a, b, c]);
            }
        }
        Some(triangles)
    }

    /// Area-weighted centre of a face.
    pub fn face_centroid(&self, key: FaceKey) -> Option<Point3<f64>> {
        let triangles = self.triangulate_face(key)?;
        weighted_triangle_centre(&triangles)
    }

    /// Triangles of a shell, wound by the shell's face orientation.
    pub fn shell_triangles(&self, key: ShellKey) -> Option<Vec<Triangle>> {
        let shell = self.shells.get(key)?;
        let mut out = Vec::new();
        for (i, &fk) in shell.faces.iter().enumerate() {
            let triangles = self.triangulate_face(fk)?;
            let flip = shell.reversed.get(i).copied().unwrap_or(false);
            out.extend(
                triangles
                    .into_iter()
                    .map(|[a, b, c]| if flip { [a, c, b] } else { [a, b, c] }),
            );
        }
        Some(out)
    }

    /// Triangles of a solid wound outward from the material: the outer shell
    /// encloses positive volume and void shells negative volume.
    pub fn solid_triangles(&self, key: SolidKey) -> Option<Vec<Triangle>> {
        Some(
            self.solid_face_triangles(key)?
                .into_iter()
                .flat_map(|(_, triangles)| triangles)
                .collect(),
        )
    }

    /// Like [`ShapeStore::solid_triangles`], grouped by boundary face.
    pub fn solid_face_triangles(&self, key: SolidKey) -> Option<Vec<(FaceKey, Vec<Triangle>)>> {
        let solid = self.solids.get(key)?;
        let mut out = self.oriented_shell_faces(solid.outer_shell, true)?;
        for &inner in &solid.inner_shells {
            out.extend(self.oriented_shell_faces(inner, false)?);
        }
        Some(out)
    }

    fn oriented_shell_faces(
        &self,
        key: ShellKey,
        positive: bool,
    ) -> Option<Vec<(FaceKey, Vec<Triangle>)>> {
        let shell = self.shells.get(key)?;
        let mut faces = Vec::with_capacity(shell.faces.len());
        for (i, &fk) in shell.faces.iter().enumerate() {
            let flip = shell.reversed.get(i).copied().unwrap_or(false);
            let triangles: Vec<Triangle> = self
                .triangulate_face(fk)?
                .into_iter()
                .map(|[a, b, c]| if flip { [a, c, b] } else { [a, b, c] })
                .collect();
            faces.push((fk, triangles));
        }
        let volume: f64 = signed_volume(
            &faces
                .iter()
                .flat_map(|(_, t)| t.iter().copied())
                .collect::<Vec<_>>(),
        );
        if (volume >= 0.0) != positive {
            for (_, triangles) in &mut faces {
                for t in triangles.iter_mut() {
                    t.swap(1, 2);
                }
            }
        }
        Some(faces)
    }

    /// Volume of a solid, voids subtracted.
    pub fn solid_volume(&self, key: SolidKey) -> Option<f64> {
        let triangles = self.solid_triangles(key)?;
        Some(signed_volume(&triangles).abs())
    }

    /// Volume-weighted centre of a solid.
    pub fn solid_centroid(&self, key: SolidKey) -> Option<Point3<f64>> {
        let triangles = self.solid_triangles(key)?;
        volume_centre(&triangles).map(|(c, _)| c)
    }

    /// Classifies a point against a solid by ray casting. Points closer than
    /// `tolerance` to the boundary are [`Location::On`].
    pub fn classify_point_in_solid(
        &self,
        key: SolidKey,
        point: &Point3<f64>,
        tolerance: f64,
    ) -> Option<Location> {
        let solid = self.solids.get(key)?;
        let shells: Vec<ShellKey> = std::iter::once(solid.outer_shell)
            .chain(solid.inner_shells.iter().copied())
            .collect();

        for &sk in &shells {
            for &fk in &self.shells.get(sk)?.faces {
                if self.point_face_distance(fk, point)? <= tolerance {
                    return Some(Location::On);
                }
            }
        }

        // Slightly perturbed direction avoids edge/vertex degeneracies
        let dir = Vector3::new(1.0, 1e-7, 1e-8);
        let mut crossings = 0;
        for &sk in &shells {
            for [a, b, c] in self.shell_triangles(sk)? {
                if ray_intersects_triangle(point, &dir, &a, &b, &c) {
                    crossings += 1;
                }
            }
        }
        Some(if crossings % 2 == 1 {
            Location::In
        } else {
            Location::Out
        })
    }

    /// Classifies a point against a face.
    pub fn classify_point_on_face(
        &self,
        key: FaceKey,
        point: &Point3<f64>,
        tolerance: f64,
    ) -> Option<Location> {
        let (normal, offset) = self.face_plane(key)?;
        if (normal.dot(&point.coords) - offset).abs() > tolerance {
            return Some(Location::Out);
        }
        if self.face_boundary_distance(key, point)? <= tolerance {
            return Some(Location::On);
        }
        Some(if self.projects_inside_face(key, &normal, point)? {
            Location::In
        } else {
            Location::Out
        })
    }

    fn projects_inside_face(
        &self,
        key: FaceKey,
        normal: &Vector3<f64>,
        point: &Point3<f64>,
    ) -> Option<bool> {
        let (outer, holes) = self.face_loops(key)?;
        let (u, v) = dominant_axes(normal);
        let flat = |pts: &[Point3<f64>]| pts.iter().map(|p| [p[u], p[v]]).collect::<Vec<_>>();
        let q = [point[u], point[v]];
        let mut crossings = crossings_2d(&flat(&outer), q);
        for hole in &holes {
            crossings += crossings_2d(&flat(hole), q);
        }
        Some(crossings % 2 == 1)
    }

    fn face_boundary_distance(&self, key: FaceKey, point: &Point3<f64>) -> Option<f64> {
        let (outer, holes) = self.face_loops(key)?;
        let mut best = f64::INFINITY;
        for lp in std::iter::once(&outer).chain(holes.iter()) {
            for i in 0..lp.len() {
                let d = point_segment_distance(point, &lp[i], &lp[(i + 1) % lp.len()]);
                best = best.min(d);
            }
        }
        Some(best)
    }

    /// Distance from a point to a face region.
    pub fn point_face_distance(&self, key: FaceKey, point: &Point3<f64>) -> Option<f64> {
        let (normal, offset) = self.face_plane(key)?;
        let plane_distance = (normal.dot(&point.coords) - offset).abs();
        if self.projects_inside_face(key, &normal, point)? {
            return Some(plane_distance);
        }
        self.face_boundary_distance(key, point)
    }

    /// Distance from a point to any shape. Points inside a solid are at
    /// distance zero.
    pub fn distance_to_point(&self, shape: Shape, point: &Point3<f64>) -> Option<f64> {
        match shape {
            Shape::Vertex(k) => Some((self.vertex_point(k)? - point).norm()),
            Shape::Edge(k) => {
                let (a, b) = self.edge_points(k)?;
                Some(point_segment_distance(point, &a, &b))
            }
            Shape::Face(k) => self.point_face_distance(k, point),
            Shape::Solid(k) => {
                if self.classify_point_in_solid(k, point, 0.0)? == Location::In {
                    return Some(0.0);
                }
                let solid = self.solids.get(k)?;
                let mut best = f64::INFINITY;
                for sk in std::iter::once(solid.outer_shell).chain(solid.inner_shells.iter().copied()) {
                    for &fk in &self.shells.get(sk)?.faces {
                        best = best.min(self.point_face_distance(fk, point)?);
                    }
                }
                Some(best)
            }
            _ => {
                let mut best: Option<f64> = None;
                for child in self.children(shape) {
                    if let Some(d) = self.distance_to_point(child, point) {
                        best = Some(best.map_or(d, |b: f64| b.min(d)));
                    }
                }
                best
            }
        }
    }

    /// Average of the distinct vertices of a shape.
    pub fn centroid(&self, shape: Shape) -> Option<Point3<f64>> {
        let vertices = self.sub_shapes(shape, ShapeKind::Vertex);
        if vertices.is_empty() {
            return None;
        }
        let mut sum = Vector3::zeros();
        for v in &vertices {
            if let Shape::Vertex(k) = v {
                sum += self.vertex_point(*k)?.coords;
            }
        }
        Some(Point3::from(sum / vertices.len() as f64))
    }

    /// Centre of mass: length-, area- or volume-weighted depending on the
    /// shape's dimension. Falls back to the vertex centroid for shapes with
    /// no measure.
    pub fn center_of_mass(&self, shape: Shape) -> Option<Point3<f64>> {
        let weighted = match shape {
            Shape::Vertex(k) => self.vertex_point(k),
            Shape::Edge(k) => {
                let (a, b) = self.edge_points(k)?;
                Some(nalgebra::center(&a, &b))
            }
            Shape::Face(k) => self.face_centroid(k),
            Shape::Solid(k) => self.solid_centroid(k),
            Shape::Wire(_) => self.linear_centre(shape),
            Shape::Shell(_) => self.surface_centre(shape),
            Shape::CompSolid(_) => self.volume_centre_of(shape),
            Shape::Compound(_) => {
                if !self.sub_shapes(shape, ShapeKind::Solid).is_empty() {
                    self.volume_centre_of(shape)
                } else if !self.sub_shapes(shape, ShapeKind::Face).is_empty() {
                    self.surface_centre(shape)
                } else if !self.sub_shapes(shape, ShapeKind::Edge).is_empty() {
                    self.linear_centre(shape)
                } else {
                    None
                }
            }
        };
        weighted.or_else(|| self.centroid(shape))
    }

    fn linear_centre(&self, shape: Shape) -> Option<Point3<f64>> {
        let mut sum = Vector3::zeros();
        let mut total = 0.0;
        for e in self.sub_shapes(shape, ShapeKind::Edge) {
            if let Shape::Edge(k) = e {
                let (a, b) = self.edge_points(k)?;
                let len = (b - a).norm();
                sum += nalgebra::center(&a, &b).coords * len;
                total += len;
            }
        }
        (total > 1e-15).then(|| Point3::from(sum / total))
    }

    fn surface_centre(&self, shape: Shape) -> Option<Point3<f64>> {
        let mut triangles = Vec::new();
        for f in self.sub_shapes(shape, ShapeKind::Face) {
            if let Shape::Face(k) = f {
                triangles.extend(self.triangulate_face(k)?);
            }
        }
        weighted_triangle_centre(&triangles)
    }

    fn volume_centre_of(&self, shape: Shape) -> Option<Point3<f64>> {
        let mut sum = Vector3::zeros();
        let mut total = 0.0;
        for s in self.sub_shapes(shape, ShapeKind::Solid) {
            if let Shape::Solid(k) = s {
                let (c, v) = volume_centre(&self.solid_triangles(k)?)?;
                sum += c.coords * v;
                total += v;
            }
        }
        (total.abs() > 1e-15).then(|| Point3::from(sum / total))
    }

    /// A point strictly inside a solid. The centroid when it is inside,
    /// otherwise a point just behind one of the boundary triangles.
    pub fn interior_point(&self, key: SolidKey) -> Option<Point3<f64>> {
        let centre = self.solid_centroid(key)?;
        if self.classify_point_in_solid(key, &centre, 1e-9)? == Location::In {
            return Some(centre);
        }

        let (min, max) = self.bounding_box(Shape::Solid(key))?;
        let diag = (max - min).norm().max(1e-9);
        let triangles = self.solid_triangles(key)?;
        for step in [1e-3, 1e-5, 1e-7] {
            for [a, b, c] in &triangles {
                let Some(normal) = (b - a).cross(&(c - a)).try_normalize(1e-15) else {
                    continue;
                };
                let mid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
                let candidate = mid - normal * (diag * step);
                if self.classify_point_in_solid(key, &candidate, 0.0)? == Location::In {
                    return Some(candidate);
                }
            }
        }
        Some(centre)
    }

    /// Axis-aligned bounding box of a shape's vertices.
    pub fn bounding_box(&self, shape: Shape) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut any = false;
        for v in self.sub_shapes(shape, ShapeKind::Vertex) {
            if let Shape::Vertex(k) = v {
                let p = self.vertex_point(k)?;
                min = min.inf(&p);
                max = max.sup(&p);
                any = true;
            }
        }
        any.then_some((min, max))
    }
}

/// Signed volume enclosed by a triangle set.
pub fn signed_volume(triangles: &[Triangle]) -> f64 {
    let Some(reference) = triangles.first().map(|t| t[0]) else {
        return 0.0;
    };
    let mut volume = 0.0;
    for [a, b, c] in triangles {
        let (a, b, c) = (a - reference, b - reference, c - reference);
        volume += a.dot(&b.cross(&c));
    }
    volume / 6.0
}

/// Centre and signed volume of a closed triangle set.
fn volume_centre(triangles: &[Triangle]) -> Option<(Point3<f64>, f64)> {
    let reference = triangles.first()?[0];
    let mut volume = 0.0;
    let mut sum = Vector3::zeros();
    for [a, b, c] in triangles {
        let (a, b, c) = (a - reference, b - reference, c - reference);
        let v = a.dot(&b.cross(&c)) / 6.0;
        volume += v;
        sum += (a + b + c) / 4.0 * v;
    }
    if volume.abs() < 1e-15 {
        return None;
    }
    Some((reference + sum / volume, volume))
}

fn weighted_triangle_centre(triangles: &[Triangle]) -> Option<Point3<f64>> {
    let mut sum = Vector3::zeros();
    let mut total = 0.0;
    for [a, b, c] in triangles {
        let area = (b - a).cross(&(c - a)).norm() / 2.0;
        sum += (a.coords + b.coords + c.coords) / 3.0 * area;
        total += area;
    }
    (total > 1e-15).then(|| Point3::from(sum / total))
}

/// Möller–Trumbore ray-triangle intersection test.
///
/// Casts a ray from `origin` along `dir` and tests if it hits the
/// triangle (v0, v1, v2).
pub(crate) fn ray_intersects_triangle(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> bool {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = dir.cross(&edge2);
    let a = edge1.dot(&h);

    if a.abs() < 1e-12 {
        return false; // ray parallel to triangle
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);

    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let q = s.cross(&edge1);
    let v = f * dir.dot(&q);

    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    let t = f * edge2.dot(&q);
    t > 1e-12 // intersection is in front of origin
}

/// Parity test of a point against a closed triangle set.
pub(crate) fn point_in_triangles(point: &Point3<f64>, triangles: &[Triangle]) -> bool {
    let dir = Vector3::new(1.0, 1e-7, 1e-8);
    triangles
        .iter()
        .filter(|[a, b, c]| ray_intersects_triangle(point, &dir, a, b, c))
        .count()
        % 2
        == 1
}
