// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerance-based sharing of vertices, edges and faces.
//!
//! [`SpatialIndex`] is a grid hash for nearest-vertex lookups. [`Sewer`]
//! builds on it: every vertex, edge and face created through one sewer is
//! merged with coincident geometry created earlier through the same sewer.
//! All kernel operations that produce new shapes go through a sewer, which
//! is what gives equal geometry equal keys.

use nalgebra::Point3;
use rustc_hash::FxHashMap;

use crate::error::{KernelError, Result};
use crate::geometry::newell_normal;
use crate::keys::*;
use crate::store::ShapeStore;

/// A spatial hash grid for fast tolerance-based vertex lookup.
///
/// Lookups check the 27 neighbouring grid cells for candidates within
/// tolerance, so `cell_size` should be at least the query tolerance.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: FxHashMap<(i64, i64, i64), Vec<VertexKey>>,
}

impl SpatialIndex {
    /// Creates a new spatial index with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            grid: FxHashMap::default(),
        }
    }

    /// Inserts a vertex key at the given coordinates.
    pub fn insert(&mut self, key: VertexKey, x: f64, y: f64, z: f64) {
        let cell = self.cell_coords(x, y, z);
        self.grid.entry(cell).or_default().push(key);
    }

    /// Finds the nearest indexed vertex within `tolerance` of `(x, y, z)`.
    pub fn find_near(
        &self,
        store: &ShapeStore,
        x: f64,
        y: f64,
        z: f64,
        tolerance: f64,
    ) -> Option<VertexKey> {
        let (cx, cy, cz) = self.cell_coords(x, y, z);
        let tol_sq = tolerance * tolerance;
        let mut best: Option<(VertexKey, f64)> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(keys) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &vk in keys {
                        let Some(v) = store.vertex(vk) else {
                            continue;
                        };
                        let dist_sq =
                            (v.x - x).powi(2) + (v.y - y).powi(2) + (v.z - z).powi(2);
                        if dist_sq <= tol_sq && best.map_or(true, |(_, d)| dist_sq < d) {
                            best = Some((vk, dist_sq));
                        }
                    }
                }
            }
        }

        best.map(|(k, _)| k)
    }

    fn cell_coords(&self, x: f64, y: f64, z: f64) -> (i64, i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
            (z / self.cell_size).floor() as i64,
        )
    }
}

impl ShapeStore {
    /// Returns an existing indexed vertex within `tolerance` of `(x, y, z)`,
    /// or creates a new one.
    pub fn find_or_add_vertex(
        &mut self,
        index: &mut SpatialIndex,
        x: f64,
        y: f64,
        z: f64,
        tolerance: f64,
    ) -> VertexKey {
        if let Some(existing) = index.find_near(self, x, y, z, tolerance) {
            return existing;
        }

        let key = self.add_vertex(x, y, z);
        index.insert(key, x, y, z);
        key
    }
}

/// Merge-or-create context for vertices, edges and faces.
#[derive(Debug, Clone)]
pub struct Sewer {
    tolerance: f64,
    index: SpatialIndex,
    // (min_vertex, max_vertex) → edge
    edge_map: FxHashMap<(VertexKey, VertexKey), EdgeKey>,
    // sorted edge set of all loops → face
    face_map: FxHashMap<Vec<EdgeKey>, FaceKey>,
}

impl Sewer {
    /// Creates a sewer merging geometry closer than `tolerance`.
    pub fn new(tolerance: f64) -> Self {
        let tolerance = tolerance.max(1e-10);
        Self {
            tolerance,
            index: SpatialIndex::new(tolerance * 2.0),
            edge_map: FxHashMap::default(),
            face_map: FxHashMap::default(),
        }
    }

    /// The merge distance of this sewer.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Makes an existing shape and all its sub-shapes available for reuse.
    pub fn adopt(&mut self, store: &ShapeStore, shape: Shape) {
        for v in store.sub_shapes(shape, ShapeKind::Vertex) {
            if let Shape::Vertex(vk) = v {
                if let Some(p) = store.vertex(vk) {
                    if self.index.find_near(store, p.x, p.y, p.z, self.tolerance).is_none() {
                        self.index.insert(vk, p.x, p.y, p.z);
                    }
                }
            }
        }
        for e in store.sub_shapes(shape, ShapeKind::Edge) {
            if let Shape::Edge(ek) = e {
                if let Some(edge) = store.edge(ek) {
                    self.edge_map
                        .entry(canonical(edge.start, edge.end))
                        .or_insert(ek);
                }
            }
        }
        for f in store.sub_shapes(shape, ShapeKind::Face) {
            if let Shape::Face(fk) = f {
                let mut edges: Vec<EdgeKey> = store
                    .face_directed_edges(fk)
                    .into_iter()
                    .map(|(ek, _)| ek)
                    .collect();
                edges.sort();
                self.face_map.entry(edges).or_insert(fk);
            }
        }
    }

    /// Returns the vertex at `p`, merging with an earlier one if close enough.
    pub fn vertex(&mut self, store: &mut ShapeStore, p: &Point3<f64>) -> VertexKey {
        store.find_or_add_vertex(&mut self.index, p.x, p.y, p.z, self.tolerance)
    }

    /// Returns the edge between two vertices, reusing an existing one.
    /// `None` when both ends merged into one vertex.
    pub fn edge(
        &mut self,
        store: &mut ShapeStore,
        start: VertexKey,
        end: VertexKey,
    ) -> Result<Option<EdgeKey>> {
        if start == end {
            return Ok(None);
        }
        let key = canonical(start, end);
        if let Some(&existing) = self.edge_map.get(&key) {
            return Ok(Some(existing));
        }
        let edge = store.add_edge(start, end)?;
        self.edge_map.insert(key, edge);
        Ok(Some(edge))
    }

    /// Returns the edge between two points.
    pub fn edge_by_points(
        &mut self,
        store: &mut ShapeStore,
        a: &Point3<f64>,
        b: &Point3<f64>,
    ) -> Result<Option<EdgeKey>> {
        let va = self.vertex(store, a);
        let vb = self.vertex(store, b);
        self.edge(store, va, vb)
    }

    fn loop_edges(
        &mut self,
        store: &mut ShapeStore,
        points: &[Point3<f64>],
    ) -> Result<Vec<EdgeKey>> {
        let mut vertices: Vec<VertexKey> = Vec::with_capacity(points.len());
        for p in points {
            let vk = self.vertex(store, p);
            if vertices.last() != Some(&vk) {
                vertices.push(vk);
            }
        }
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(KernelError::DegenerateFace);
        }

        let mut edges = Vec::with_capacity(vertices.len());
        for i in 0..vertices.len() {
            let start = vertices[i];
            let end = vertices[(i + 1) % vertices.len()];
            if let Some(edge) = self.edge(store, start, end)? {
                edges.push(edge);
            }
        }
        if edges.len() < 3 {
            return Err(KernelError::DegenerateFace);
        }
        Ok(edges)
    }

    /// Returns the face bounded by the given loops, reusing an existing face
    /// with the same edges. The flag is `true` when the reused face winds
    /// against `outer`.
    pub fn face(
        &mut self,
        store: &mut ShapeStore,
        outer: &[Point3<f64>],
        holes: &[Vec<Point3<f64>>],
    ) -> Result<(FaceKey, bool)> {
        let outer_edges = self.loop_edges(store, outer)?;
        let mut hole_edges = Vec::with_capacity(holes.len());
        for hole in holes {
            hole_edges.push(self.loop_edges(store, hole)?);
        }

        let mut canonical_face: Vec<EdgeKey> = outer_edges
            .iter()
            .chain(hole_edges.iter().flatten())
            .copied()
            .collect();
        canonical_face.sort();

        if let Some(&existing) = self.face_map.get(&canonical_face) {
            let wanted = newell_normal(outer);
            let stored = store.face_normal(existing).unwrap_or(wanted);
            return Ok((existing, wanted.dot(&stored) < 0.0));
        }

        let outer_wire = store.add_wire(&outer_edges)?;
        let mut inner_wires = Vec::with_capacity(hole_edges.len());
        for edges in &hole_edges {
            inner_wires.push(store.add_wire(edges)?);
        }
        let face = store.add_face_with_holes(outer_wire, &inner_wires)?;
        self.face_map.insert(canonical_face, face);
        Ok((face, false))
    }
}

fn canonical(a: VertexKey, b: VertexKey) -> (VertexKey, VertexKey) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_index_find_near() {
        let mut store = ShapeStore::new();
        let mut index = SpatialIndex::new(0.01);
        let v0 = store.find_or_add_vertex(&mut index, 0.0, 0.0, 0.0, 0.001);
        store.find_or_add_vertex(&mut index, 10.0, 10.0, 10.0, 0.001);

        assert_eq!(index.find_near(&store, 0.0, 0.0, 0.0, 0.001), Some(v0));
        assert_eq!(index.find_near(&store, 0.001, 0.0, 0.0, 0.01), Some(v0));
        assert_eq!(index.find_near(&store, 1.0, 0.0, 0.0, 0.01), None);
    }

    #[test]
    fn find_or_add_reuses_vertex() {
        let mut store = ShapeStore::new();
        let mut index = SpatialIndex::new(0.01);

        let v0 = store.find_or_add_vertex(&mut index, 0.0, 0.0, 0.0, 0.001);
        let v1 = store.find_or_add_vertex(&mut index, 0.0001, 0.0, 0.0, 0.001);
        let v2 = store.find_or_add_vertex(&mut index, 5.0, 5.0, 5.0, 0.001);

        assert_eq!(v0, v1);
        assert_ne!(v0, v2);
        assert_eq!(store.vertex_count(), 2);
    }

    #[test]
    fn sewer_shares_edges_and_faces() {
        let mut store = ShapeStore::new();
        let mut sewer = Sewer::new(1e-9);
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let (f0, rev0) = sewer.face(&mut store, &square, &[]).unwrap();

        let mut reversed_square = square.to_vec();
        reversed_square.reverse();
        let (f1, rev1) = sewer.face(&mut store, &reversed_square, &[]).unwrap();

        assert_eq!(f0, f1);
        assert!(!rev0);
        assert!(rev1);
        assert_eq!(store.edge_count(), 4);
    }

    #[test]
    fn sewer_adopts_existing_shapes() {
        let mut store = ShapeStore::new();
        let a = store.add_vertex(0.0, 0.0, 0.0);
        let b = store.add_vertex(1.0, 0.0, 0.0);
        let edge = store.add_edge(a, b).unwrap();

        let mut sewer = Sewer::new(1e-9);
        sewer.adopt(&store, Shape::Edge(edge));
        let again = sewer
            .edge_by_points(&mut store, &Point3::new(1.0, 0.0, 0.0), &Point3::new(0.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(again, Some(edge));
        assert_eq!(store.vertex_count(), 2);
    }
}
