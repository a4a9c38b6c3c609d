// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Volume making: closed regions bounded by a set of faces.
//!
//! Faces are first sewn so coincident edges become shared. Around every
//! edge the incident faces are sorted by angle; the two face sides facing
//! each wedge between neighbours bound the same region. Joining sides
//! across all wedges partitions the face sides into region boundaries.
//! Regions with positive enclosed volume become solids; the unbounded
//! outside region has negative volume and is dropped.

use std::f64::consts::TAU;

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{KernelError, Result};
use crate::geometry::{signed_volume, Location, Triangle};
use crate::keys::*;
use crate::spatial::Sewer;
use crate::store::ShapeStore;

/// Result of [`ShapeStore::make_volumes`].
#[derive(Debug, Clone, Default)]
pub struct Volumes {
    /// One solid per bounded region, in input face order.
    pub solids: Vec<SolidKey>,
    /// Sewn faces that bound no region.
    pub unused: Vec<FaceKey>,
}

impl ShapeStore {
    /// Sews faces so that coincident vertices and edges are shared.
    ///
    /// Faces already sharing their edges come back unchanged; others are
    /// rebuilt on the shared edges. The output has one face per distinct
    /// input face.
    pub fn sew_existing_faces(&mut self, faces: &[FaceKey], tolerance: f64) -> Result<Vec<FaceKey>> {
        let mut sewer = Sewer::new(tolerance);
        for &fk in faces {
            self.ensure(Shape::Face(fk))?;
            sewer.adopt(self, Shape::Face(fk));
        }
        let mut out: Vec<FaceKey> = Vec::with_capacity(faces.len());
        for &fk in faces {
            let (outer, holes) = self
                .face_loops(fk)
                .ok_or(KernelError::NotFound(Shape::Face(fk)))?;
            let (sewn, _) = sewer.face(self, &outer, &holes)?;
            if !out.contains(&sewn) {
                out.push(sewn);
            }
        }
        Ok(out)
    }

    /// Builds a solid for every closed region bounded by `faces`.
    pub fn make_volumes(&mut self, faces: &[FaceKey], tolerance: f64) -> Result<Volumes> {
        let faces = self.sew_existing_faces(faces, tolerance)?;
        let mut sides = SideSets::new(faces.len() * 2);

        let mut edge_faces: FxHashMap<EdgeKey, Vec<usize>> = FxHashMap::default();
        for (i, &fk) in faces.iter().enumerate() {
            for (ek, _) in self.face_directed_edges(fk) {
                let list = edge_faces.entry(ek).or_default();
                if !list.contains(&i) {
                    list.push(i);
                }
            }
        }

        for (&ek, incident) in &edge_faces {
            let fan = self
                .radial_fan(ek, &faces, incident, tolerance)
                .ok_or(KernelError::NotFound(Shape::Edge(ek)))?;
            for w in 0..fan.len() {
                let (fi, forward_side) = fan[w];
                let (fj, next_forward) = fan[(w + 1) % fan.len()];
                // Side of fi facing the wedge, and side of fj facing back
                sides.join(side_index(fi, forward_side), side_index(fj, !next_forward));
            }
        }

        let mut regions: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for side in 0..faces.len() * 2 {
            let root = sides.find(side);
            regions.entry(root).or_default().push(side);
        }
        let mut ordered: Vec<Vec<usize>> = regions.into_values().collect();
        ordered.sort_by_key(|r| r.iter().copied().min().unwrap_or(usize::MAX));

        let min_volume = tolerance.powi(3).max(1e-12);
        let mut solids = Vec::new();
        let mut used = vec![false; faces.len()];
        for region in ordered {
            let mut bounding: Vec<(usize, bool)> = Vec::new();
            for &side in &region {
                let (face, positive) = (side / 2, side % 2 == 0);
                // Both sides in one region: a dangling face
                if region.contains(&side_index(face, !positive)) {
                    continue;
                }
                bounding.push((face, positive));
            }
            if bounding.is_empty() {
                continue;
            }

            let mut triangles: Vec<Triangle> = Vec::new();
            for &(i, positive) in &bounding {
                let tris = self
                    .triangulate_face(faces[i])
                    .ok_or(KernelError::NotFound(Shape::Face(faces[i])))?;
                // The positive side faces into the region, so it points
                // against the outward normal
                triangles.extend(tris.into_iter().map(|[a, b, c]| {
                    if positive {
                        [a, c, b]
                    } else {
                        [a, b, c]
                    }
                }));
            }
            let volume = signed_volume(&triangles);
            if volume <= min_volume {
                trace!(faces = bounding.len(), volume, "skipping unbounded region");
                continue;
            }

            let keys: Vec<FaceKey> = bounding.iter().map(|&(i, _)| faces[i]).collect();
            let reversed: Vec<bool> = bounding.iter().map(|&(_, positive)| positive).collect();
            let shell = self.add_shell_oriented(&keys, &reversed)?;
            if !self.is_shell_closed(shell) {
                trace!(faces = keys.len(), "region boundary is not closed");
                continue;
            }
            solids.push(self.add_solid(shell)?);
            for &(i, _) in &bounding {
                used[i] = true;
            }
        }

        let unused = faces
            .iter()
            .zip(&used)
            .filter(|(_, u)| !**u)
            .map(|(f, _)| *f)
            .collect();
        debug!(faces = faces.len(), solids = solids.len(), "volumes made");
        Ok(Volumes { solids, unused })
    }

    /// Faces around an edge sorted by angle, each with the flag telling
    /// whether its normal side faces the next face in the fan.
    fn radial_fan(
        &self,
        edge: EdgeKey,
        faces: &[FaceKey],
        incident: &[usize],
        tolerance: f64,
    ) -> Option<Vec<(usize, bool)>> {
        let (a, b) = self.edge_points(edge)?;
        let axis = (b - a).try_normalize(1e-15)?;
        let mid = nalgebra::center(&a, &b);
        let step = ((b - a).norm() * 1e-3).max(tolerance * 10.0);

        let mut spokes: Vec<(usize, Vector3<f64>, Vector3<f64>)> = Vec::with_capacity(incident.len());
        for &i in incident {
            let normal = self.face_normal(faces[i])?;
            let mut inward = normal.cross(&axis).try_normalize(1e-15)?;
            let probe: Point3<f64> = mid + inward * step;
            if self.classify_point_on_face(faces[i], &probe, tolerance)? != Location::In {
                inward = -inward;
            }
            spokes.push((i, normal, inward));
        }

        let reference = spokes.first()?.2;
        let angle = |v: &Vector3<f64>| {
            let a = axis.dot(&reference.cross(v)).atan2(reference.dot(v));
            if a < 0.0 {
                a + TAU
            } else {
                a
            }
        };
        spokes.sort_by(|x, y| angle(&x.2).total_cmp(&angle(&y.2)));

        Some(
            spokes
                .into_iter()
                .map(|(i, normal, inward)| (i, normal.dot(&axis.cross(&inward)) > 0.0))
                .collect(),
        )
    }
}

fn side_index(face: usize, positive: bool) -> usize {
    face * 2 + usize::from(!positive)
}

/// Union-find over face sides.
#[derive(Debug, Clone)]
struct SideSets {
    parent: Vec<usize>,
}

impl SideSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn join(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
