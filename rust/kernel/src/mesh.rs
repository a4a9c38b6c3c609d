// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon soups and their conversion to and from shapes.
//!
//! Solid splitting runs on `csgrs` BSP meshes. The split meshes come back as
//! convex polygon fragments; [`merge_coplanar`] fuses them into maximal
//! planar faces, [`resolve_t_junctions`] makes neighbouring loops agree on
//! their vertices, and [`ShapeStore::sew_planar_solids`] turns the faces
//! back into solids through a shared [`Sewer`].

use std::sync::OnceLock;

use csgrs::mesh::{polygon::Polygon, vertex::Vertex, Mesh as CSGMesh};
use csgrs::traits::CSG;
use nalgebra::{Point2, Point3, Vector3};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::builders::box_faces;
use crate::error::{KernelError, Result};
use crate::geometry::{newell_normal, point_in_triangles, signed_volume, Triangle};
use crate::keys::*;
use crate::planar::{self, PlaneFrame, Region};
use crate::spatial::Sewer;
use crate::store::ShapeStore;

/// A BSP mesh as used by the boolean engine.
pub type CsgMesh = CSGMesh<()>;

/// A planar polygon wound outward from the material.
pub type Polygon3 = Vec<Point3<f64>>;

/// A planar face with holes, wound outward from the material.
#[derive(Debug, Clone)]
pub struct PlanarFace {
    pub normal: Vector3<f64>,
    pub outer: Vec<Point3<f64>>,
    pub holes: Vec<Vec<Point3<f64>>>,
}

/// Converts triangles to a BSP mesh, skipping degenerate ones.
pub fn triangles_to_csg(triangles: &[Triangle]) -> CsgMesh {
    if triangles.is_empty() {
        return CSGMesh {
            polygons: Vec::new(),
            bounding_box: OnceLock::new(),
            metadata: None,
        };
    }

    let mut polygons = Vec::with_capacity(triangles.len());
    for [v0, v1, v2] in triangles {
        let Some(normal) = (v1 - v0).cross(&(v2 - v0)).try_normalize(1e-10) else {
            continue;
        };
        let vertices = vec![
            Vertex::new(*v0, normal),
            Vertex::new(*v1, normal),
            Vertex::new(*v2, normal),
        ];
        polygons.push(Polygon::new(vertices, None));
    }
    CSGMesh::from_polygons(&polygons, None)
}

/// Polygons of a BSP mesh.
pub fn csg_polygons(mesh: &CsgMesh) -> Vec<Polygon3> {
    mesh.polygons
        .iter()
        .filter(|p| p.vertices.len() >= 3)
        .map(|p| {
            p.vertices
                .iter()
                .map(|v| Point3::new(v.pos[0], v.pos[1], v.pos[2]))
                .collect()
        })
        .collect()
}

/// Boolean operation on two BSP meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshOp {
    Intersect,
    Difference,
    Union,
}

pub fn mesh_boolean(a: &CsgMesh, b: &CsgMesh, op: MeshOp) -> CsgMesh {
    match op {
        MeshOp::Intersect => a.intersection(b),
        MeshOp::Difference => a.difference(b),
        MeshOp::Union => a.union(b),
    }
}

/// Signed volume of a closed polygon soup.
pub fn polygons_volume(polygons: &[Polygon3]) -> f64 {
    signed_volume(&fan_triangles(polygons))
}

/// Fan triangulation of convex polygons.
pub fn fan_triangles(polygons: &[Polygon3]) -> Vec<Triangle> {
    let mut triangles = Vec::new();
    for poly in polygons {
        for i in 1..poly.len().saturating_sub(1) {
            triangles.push([poly[0], poly[i], poly[i + 1]]);
        }
    }
    triangles
}

/// Axis-aligned bounds of a point cloud.
pub fn points_bounds<'a>(
    points: impl IntoIterator<Item = &'a Point3<f64>>,
) -> Option<(Point3<f64>, Point3<f64>)> {
    let mut iter = points.into_iter();
    let first = *iter.next()?;
    let (mut min, mut max) = (first, first);
    for p in iter {
        min = min.inf(p);
        max = max.sup(p);
    }
    Some((min, max))
}

/// Returns `true` if two boxes overlap, touching included.
pub fn bounds_overlap(
    a: &(Point3<f64>, Point3<f64>),
    b: &(Point3<f64>, Point3<f64>),
    tolerance: f64,
) -> bool {
    (0..3).all(|i| a.0[i] <= b.1[i] + tolerance && b.0[i] <= a.1[i] + tolerance)
}

/// A box covering the positive side of `frame`'s plane over the given
/// bounds.
pub fn half_space_box(frame: &PlaneFrame, min: &Point3<f64>, max: &Point3<f64>) -> CsgMesh {
    let centre = nalgebra::center(min, max);
    let reach = (max - min).norm() * 2.0 + 1.0;
    let origin = centre - frame.normal * frame.distance(&centre);
    let to_world =
        |c: &[f64; 3]| origin + frame.u * c[0] + frame.v * c[1] + frame.normal * c[2];

    let mut triangles = Vec::with_capacity(12);
    for quad in box_faces([-reach, -reach, 0.0], [reach, reach, reach]) {
        let q: Vec<Point3<f64>> = quad.iter().map(to_world).collect();
        triangles.push([q[0], q[1], q[2]]);
        triangles.push([q[0], q[2], q[3]]);
    }
    triangles_to_csg(&triangles)
}

/// Cross-section of a closed triangle set by a plane, as regions in the
/// plane's frame. Triangles lying in the plane contribute their own area.
pub fn plane_section(triangles: &[Triangle], frame: &PlaneFrame, tolerance: f64) -> Vec<Region> {
    let mut segments: Vec<(Point3<f64>, Point3<f64>)> = Vec::new();
    let mut on_plane: Vec<Vec<Point2<f64>>> = Vec::new();

    for tri in triangles {
        let d = tri.map(|p| frame.distance(&p));
        if d.iter().all(|x| x.abs() <= tolerance) {
            on_plane.push(tri.iter().map(|p| frame.to_2d(p)).collect());
            continue;
        }
        // Points on the plane count as below it: the section is taken just
        // above the plane, which keeps every crossing well defined
        let above = d.map(|x| x > tolerance);
        let count = above.iter().filter(|a| **a).count();
        if count == 0 || count == 3 {
            continue;
        }

        let mut points = Vec::with_capacity(2);
        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            if above[i] != above[j] {
                let (p, dp, q, dq) = if above[i] {
                    (tri[i], d[i], tri[j], d[j])
                } else {
                    (tri[j], d[j], tri[i], d[i])
                };
                points.push(if dq.abs() <= tolerance {
                    q
                } else {
                    p + (q - p) * (dp / (dp - dq))
                });
            }
        }
        let [p, q] = [points[0], points[1]];
        let tri_normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
        let dir = frame.normal.cross(&tri_normal);
        let segment = if (q - p).dot(&dir) >= 0.0 { (p, q) } else { (q, p) };
        if (segment.1 - segment.0).norm() > tolerance {
            segments.push(segment);
        }
    }

    let loops: Vec<Vec<Point2<f64>>> = chain_segments(&segments, tolerance * 10.0)
        .iter()
        .map(|l| l.iter().map(|p| frame.to_2d(p)).collect())
        .collect();
    let mut regions = planar::fill_loops(&loops);
    if !on_plane.is_empty() {
        regions = planar::union(&regions, &planar::union_contours(&on_plane));
    }
    regions
}

/// Joins directed segments into closed loops. Open chains are dropped.
fn chain_segments(
    segments: &[(Point3<f64>, Point3<f64>)],
    tolerance: f64,
) -> Vec<Vec<Point3<f64>>> {
    let mut used = vec![false; segments.len()];
    let mut loops = Vec::new();

    for seed in 0..segments.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let start = segments[seed].0;
        let mut points = vec![start];
        let mut end = segments[seed].1;
        let mut closed = false;

        while let Some(next) =
            (0..segments.len()).find(|&i| !used[i] && (segments[i].0 - end).norm() <= tolerance)
        {
            used[next] = true;
            points.push(segments[next].0);
            end = segments[next].1;
            if (end - start).norm() <= tolerance {
                closed = true;
                break;
            }
        }
        if !closed && (end - start).norm() <= tolerance {
            closed = true;
        }

        if closed && points.len() >= 3 {
            loops.push(points);
        } else {
            trace!(points = points.len(), "dropping open section chain");
        }
    }
    loops
}

/// Fuses coplanar polygons with the same outward direction into maximal
/// planar faces.
pub fn merge_coplanar(polygons: &[Polygon3], tolerance: f64) -> Vec<PlanarFace> {
    let mut groups: Vec<(PlaneFrame, Vec<Vec<Point2<f64>>>)> = Vec::new();

    for poly in polygons {
        if poly.len() < 3 {
            continue;
        }
        let Some(normal) = newell_normal(poly).try_normalize(1e-12) else {
            continue;
        };
        let mean = Point3::from(
            poly.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / poly.len() as f64,
        );
        let offset = normal.dot(&mean.coords);

        let index = groups.iter().position(|(frame, _)| {
            frame.normal.dot(&normal) > 1.0 - 1e-6 && (frame.offset() - offset).abs() <= tolerance
        });
        let index = match index {
            Some(i) => i,
            None => {
                groups.push((PlaneFrame::new(mean, normal), Vec::new()));
                groups.len() - 1
            }
        };
        let frame = groups[index].0;
        groups[index]
            .1
            .push(poly.iter().map(|p| frame.to_2d(p)).collect());
    }

    let mut faces = Vec::new();
    for (frame, contours) in groups {
        for region in planar::union_contours(&contours) {
            let (outer, holes) = region.to_3d(&frame);
            faces.push(PlanarFace {
                normal: frame.normal,
                outer,
                holes,
            });
        }
    }
    faces
}

/// Inserts every loop corner that lies on another loop's segment into that
/// segment, across all given face sets.
pub fn resolve_t_junctions(face_sets: &mut [Vec<PlanarFace>], tolerance: f64) {
    let mut corners: Vec<Point3<f64>> = Vec::new();
    for face in face_sets.iter().flatten() {
        for p in std::iter::once(&face.outer).chain(face.holes.iter()).flatten() {
            if !corners.iter().any(|c| (c - p).norm() <= tolerance) {
                corners.push(*p);
            }
        }
    }

    for face in face_sets.iter_mut().flatten() {
        face.outer = split_loop(&face.outer, &corners, tolerance);
        for hole in &mut face.holes {
            *hole = split_loop(hole, &corners, tolerance);
        }
    }
}

fn split_loop(points: &[Point3<f64>], corners: &[Point3<f64>], tolerance: f64) -> Vec<Point3<f64>> {
    let n = points.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        out.push(a);

        let ab = b - a;
        let len = ab.norm();
        if len <= tolerance {
            continue;
        }
        let dir = ab / len;
        let mut inserts: Vec<(f64, Point3<f64>)> = corners
            .iter()
            .filter_map(|c| {
                let t = (c - a).dot(&dir);
                if t <= tolerance || t >= len - tolerance {
                    return None;
                }
                let off = (c - (a + dir * t)).norm();
                (off <= tolerance).then_some((t, *c))
            })
            .collect();
        inserts.sort_by(|x, y| x.0.total_cmp(&y.0));
        out.extend(inserts.into_iter().map(|(_, c)| c));
    }
    out
}

impl ShapeStore {
    /// Sews planar faces into solids. Faces are grouped into shells by
    /// shared edges; shells enclosing positive volume become outer shells,
    /// the others become voids of the outer shell that contains them.
    pub fn sew_planar_solids(
        &mut self,
        sewer: &mut Sewer,
        faces: &[PlanarFace],
    ) -> Result<Vec<SolidKey>> {
        let mut keys: Vec<FaceKey> = Vec::with_capacity(faces.len());
        let mut reversed: Vec<bool> = Vec::with_capacity(faces.len());
        for face in faces {
            match sewer.face(self, &face.outer, &face.holes) {
                Ok((fk, rev)) => {
                    if !keys.contains(&fk) {
                        keys.push(fk);
                        reversed.push(rev);
                    }
                }
                Err(KernelError::DegenerateFace) => {
                    trace!("skipping degenerate face while sewing");
                }
                Err(e) => return Err(e),
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let components = self.edge_connected_faces(&keys);

        let mut outers: Vec<(ShellKey, Vec<Triangle>)> = Vec::new();
        let mut voids: Vec<(ShellKey, Point3<f64>)> = Vec::new();
        for component in components {
            let shell_faces: Vec<FaceKey> = component.iter().map(|&i| keys[i]).collect();
            let flags: Vec<bool> = component.iter().map(|&i| reversed[i]).collect();
            let shell = self.add_shell_oriented(&shell_faces, &flags)?;
            let open = self.shell_boundary_edge_count(shell);
            if open > 0 {
                return Err(KernelError::OpenShell(open));
            }
            let triangles = self
                .shell_triangles(shell)
                .ok_or(KernelError::NotFound(Shape::Shell(shell)))?;
            if signed_volume(&triangles) > 0.0 {
                outers.push((shell, triangles));
            } else if let Some([a, b, c]) = triangles.first() {
                voids.push((shell, Point3::from((a.coords + b.coords + c.coords) / 3.0)));
            }
        }

        let mut inner: Vec<Vec<ShellKey>> = vec![Vec::new(); outers.len()];
        for (shell, sample) in voids {
            match outers
                .iter()
                .position(|(_, triangles)| point_in_triangles(&sample, triangles))
            {
                Some(i) => inner[i].push(shell),
                None => trace!(?shell, "void shell outside every outer shell"),
            }
        }

        let mut solids = Vec::with_capacity(outers.len());
        for ((outer, _), voids) in outers.into_iter().zip(inner) {
            solids.push(self.add_solid_with_voids(outer, &voids)?);
        }
        Ok(solids)
    }

    /// Groups faces into components connected through shared edges.
    /// Returns indices into `faces`.
    pub(crate) fn edge_connected_faces(&self, faces: &[FaceKey]) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..faces.len()).collect();
        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let mut owner: FxHashMap<EdgeKey, usize> = FxHashMap::default();
        for (i, &fk) in faces.iter().enumerate() {
            for (ek, _) in self.face_directed_edges(fk) {
                match owner.get(&ek) {
                    Some(&j) => {
                        let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                        if ri != rj {
                            parent[ri] = rj;
                        }
                    }
                    None => {
                        owner.insert(ek, i);
                    }
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut index: FxHashMap<usize, usize> = FxHashMap::default();
        for i in 0..faces.len() {
            let r = root(&mut parent, i);
            let g = *index.entry(r).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(i);
        }
        groups
    }
}
