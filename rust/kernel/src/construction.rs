// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated construction of shapes.
//!
//! Every constructor checks that referenced sub-shapes exist and that the
//! result is well formed (closed face loops, closed solid shells), then
//! registers upward adjacency. A failed check never leaves a partially
//! built shape behind.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{KernelError, Result};
use crate::geometry::newell_normal;
use crate::keys::*;
use crate::store::*;

/// Minimum doubled-area magnitude for a face loop to count as non-degenerate.
const MIN_LOOP_AREA: f64 = 1e-14;

impl ShapeStore {
    /// Adds a vertex at the given 3D coordinates.
    pub fn add_vertex(&mut self, x: f64, y: f64, z: f64) -> VertexKey {
        self.vertices.insert(VertexData { x, y, z })
    }

    /// Creates an edge between two existing vertices.
    pub fn add_edge(&mut self, start: VertexKey, end: VertexKey) -> Result<EdgeKey> {
        self.ensure(Shape::Vertex(start))?;
        self.ensure(Shape::Vertex(end))?;

        let key = self.edges.insert(EdgeData { start, end });
        self.link(Shape::Vertex(start), Shape::Edge(key));
        self.link(Shape::Vertex(end), Shape::Edge(key));
        Ok(key)
    }

    /// Creates a wire from a list of edges.
    ///
    /// When the edges form a chain, orientations follow the chain. Otherwise
    /// the edges must still be connected through shared vertices (a branching
    /// wire) and every edge keeps its own direction.
    pub fn add_wire(&mut self, edge_keys: &[EdgeKey]) -> Result<WireKey> {
        if edge_keys.is_empty() {
            return Err(KernelError::EmptyWire);
        }
        for &ek in edge_keys {
            self.ensure(Shape::Edge(ek))?;
        }

        let orientations = match self.chain_orientations(edge_keys) {
            Some(o) => o,
            None => {
                self.check_connected(edge_keys)?;
                vec![true; edge_keys.len()]
            }
        };

        let key = self.wires.insert(WireData {
            edges: edge_keys.to_vec(),
            orientations,
        });
        for &ek in edge_keys {
            self.link(Shape::Edge(ek), Shape::Wire(key));
        }
        Ok(key)
    }

    /// Orientation of each edge if the list forms a chain, each edge sharing
    /// its end with the next edge's start.
    fn chain_orientations(&self, edge_keys: &[EdgeKey]) -> Option<Vec<bool>> {
        let mut orientations = Vec::with_capacity(edge_keys.len());
        if edge_keys.len() == 1 {
            orientations.push(true);
            return Some(orientations);
        }

        let first = self.edges.get(edge_keys[0])?;
        let second = self.edges.get(edge_keys[1])?;
        if first.end == second.start || first.end == second.end {
            orientations.push(true);
        } else if first.start == second.start || first.start == second.end {
            orientations.push(false);
        } else {
            return None;
        }

        for i in 1..edge_keys.len() {
            let prev = self.edges.get(edge_keys[i - 1])?;
            let curr = self.edges.get(edge_keys[i])?;
            let prev_end = if orientations[i - 1] {
                prev.end
            } else {
                prev.start
            };
            if prev_end == curr.start {
                orientations.push(true);
            } else if prev_end == curr.end {
                orientations.push(false);
            } else {
                return None;
            }
        }
        Some(orientations)
    }

    /// Fails unless every edge can be reached from the first one through
    /// shared vertices.
    fn check_connected(&self, edge_keys: &[EdgeKey]) -> Result<()> {
        let mut reached: FxHashSet<VertexKey> = FxHashSet::default();
        let mut done = vec![false; edge_keys.len()];
        if let Some(first) = self.edges.get(edge_keys[0]) {
            reached.insert(first.start);
            reached.insert(first.end);
            done[0] = true;
        }

        let mut progress = true;
        while progress {
            progress = false;
            for (i, &ek) in edge_keys.iter().enumerate() {
                if done[i] {
                    continue;
                }
                let Some(edge) = self.edges.get(ek) else {
                    continue;
                };
                if reached.contains(&edge.start) || reached.contains(&edge.end) {
                    reached.insert(edge.start);
                    reached.insert(edge.end);
                    done[i] = true;
                    progress = true;
                }
            }
        }

        match done.iter().position(|d| !d) {
            Some(i) => Err(KernelError::DisconnectedWire(i, 0)),
            None => Ok(()),
        }
    }

    /// Returns `true` if every vertex of the wire is used by exactly two of
    /// its edges.
    pub fn is_wire_closed(&self, key: WireKey) -> bool {
        let Some(wire) = self.wires.get(key) else {
            return false;
        };
        let mut degree: FxHashMap<VertexKey, usize> = FxHashMap::default();
        for &ek in &wire.edges {
            if let Some(edge) = self.edges.get(ek) {
                *degree.entry(edge.start).or_default() += 1;
                *degree.entry(edge.end).or_default() += 1;
            }
        }
        !degree.is_empty() && degree.values().all(|&d| d == 2)
    }

    fn check_face_loop(&self, wire: WireKey) -> Result<()> {
        let data = self
            .wires
            .get(wire)
            .ok_or(KernelError::NotFound(Shape::Wire(wire)))?;
        if data.edges.len() < 3 {
            return Err(KernelError::DegenerateFace);
        }
        if !self.is_wire_closed(wire) {
            return Err(KernelError::OpenWire);
        }
        let points = self.wire_points(wire).unwrap_or_default();
        if newell_normal(&points).norm() < MIN_LOOP_AREA {
            return Err(KernelError::DegenerateFace);
        }
        Ok(())
    }

    /// Creates a face from an outer boundary wire.
    pub fn add_face(&mut self, outer_wire: WireKey) -> Result<FaceKey> {
        self.add_face_with_holes(outer_wire, &[])
    }

    /// Creates a face with an outer boundary and inner boundary wires (holes).
    pub fn add_face_with_holes(
        &mut self,
        outer_wire: WireKey,
        inner_wires: &[WireKey],
    ) -> Result<FaceKey> {
        self.check_face_loop(outer_wire)?;
        for &iw in inner_wires {
            self.check_face_loop(iw)?;
        }

        let key = self.faces.insert(FaceData {
            outer_wire,
            inner_wires: inner_wires.to_vec(),
        });
        self.link(Shape::Wire(outer_wire), Shape::Face(key));
        for &iw in inner_wires {
            self.link(Shape::Wire(iw), Shape::Face(key));
        }
        Ok(key)
    }

    /// Creates a shell from a list of faces, orienting them consistently.
    ///
    /// The first face keeps its winding; every face reached through a shared
    /// edge is flipped when needed so neighbours traverse that edge in
    /// opposite directions.
    pub fn add_shell(&mut self, face_keys: &[FaceKey]) -> Result<ShellKey> {
        if face_keys.is_empty() {
            return Err(KernelError::EmptyShell);
        }
        for &fk in face_keys {
            self.ensure(Shape::Face(fk))?;
        }
        let reversed = self.propagate_orientation(face_keys);
        self.add_shell_oriented(face_keys, &reversed)
    }

    /// Creates a shell with explicit per-face reversal flags.
    pub fn add_shell_oriented(
        &mut self,
        face_keys: &[FaceKey],
        reversed: &[bool],
    ) -> Result<ShellKey> {
        if face_keys.is_empty() {
            return Err(KernelError::EmptyShell);
        }
        for &fk in face_keys {
            self.ensure(Shape::Face(fk))?;
        }

        let mut flags = reversed.to_vec();
        flags.resize(face_keys.len(), false);
        let key = self.shells.insert(ShellData {
            faces: face_keys.to_vec(),
            reversed: flags,
        });
        for &fk in face_keys {
            self.link(Shape::Face(fk), Shape::Shell(key));
        }
        Ok(key)
    }

    fn propagate_orientation(&self, face_keys: &[FaceKey]) -> Vec<bool> {
        // Directed edge usage per face: edge → (vertex_from, vertex_to)
        let usage: Vec<FxHashMap<EdgeKey, (VertexKey, VertexKey)>> = face_keys
            .iter()
            .map(|&fk| self.face_directed_edges(fk).into_iter().collect())
            .collect();

        let mut reversed = vec![false; face_keys.len()];
        let mut visited = vec![false; face_keys.len()];

        for seed in 0..face_keys.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            let mut stack = vec![seed];
            while let Some(i) = stack.pop() {
                for j in 0..face_keys.len() {
                    if visited[j] {
                        continue;
                    }
                    let shared = usage[i]
                        .iter()
                        .find_map(|(ek, di)| usage[j].get(ek).map(|dj| (*di, *dj)));
                    if let Some((di, dj)) = shared {
                        // Same direction in both faces means one must flip
                        let same = di == dj;
                        reversed[j] = reversed[i] ^ same;
                        visited[j] = true;
                        stack.push(j);
                    }
                }
            }
        }
        reversed
    }

    /// Directed edges of a face's loops, following each wire's winding.
    pub(crate) fn face_directed_edges(&self, key: FaceKey) -> Vec<(EdgeKey, (VertexKey, VertexKey))> {
        let mut out = Vec::new();
        let Some(face) = self.faces.get(key) else {
            return out;
        };
        for wk in std::iter::once(face.outer_wire).chain(face.inner_wires.iter().copied()) {
            let Some(wire) = self.wires.get(wk) else {
                continue;
            };
            for (i, &ek) in wire.edges.iter().enumerate() {
                if let Some(edge) = self.edges.get(ek) {
                    let dir = if wire.orientations[i] {
                        (edge.start, edge.end)
                    } else {
                        (edge.end, edge.start)
                    };
                    out.push((ek, dir));
                }
            }
        }
        out
    }

    /// Number of edges used by exactly one face of the shell.
    pub fn shell_boundary_edge_count(&self, key: ShellKey) -> usize {
        let Some(shell) = self.shells.get(key) else {
            return 0;
        };
        let mut uses: FxHashMap<EdgeKey, usize> = FxHashMap::default();
        for &fk in &shell.faces {
            for (ek, _) in self.face_directed_edges(fk) {
                *uses.entry(ek).or_default() += 1;
            }
        }
        uses.values().filter(|&&n| n == 1).count()
    }

    /// Returns `true` if the shell has no boundary edges.
    pub fn is_shell_closed(&self, key: ShellKey) -> bool {
        self.shells.contains_key(key) && self.shell_boundary_edge_count(key) == 0
    }

    /// Creates a solid from a closed outer shell.
    pub fn add_solid(&mut self, outer_shell: ShellKey) -> Result<SolidKey> {
        self.add_solid_with_voids(outer_shell, &[])
    }

    /// Creates a solid with an outer shell and closed void shells.
    pub fn add_solid_with_voids(
        &mut self,
        outer_shell: ShellKey,
        inner_shells: &[ShellKey],
    ) -> Result<SolidKey> {
        for &sk in std::iter::once(&outer_shell).chain(inner_shells) {
            self.ensure(Shape::Shell(sk))?;
            let open = self.shell_boundary_edge_count(sk);
            if open > 0 {
                return Err(KernelError::OpenShell(open));
            }
        }

        let key = self.solids.insert(SolidData {
            outer_shell,
            inner_shells: inner_shells.to_vec(),
        });
        self.link(Shape::Shell(outer_shell), Shape::Solid(key));
        for &is in inner_shells {
            self.link(Shape::Shell(is), Shape::Solid(key));
        }
        Ok(key)
    }

    /// Creates a comp-solid from a list of solids.
    pub fn add_comp_solid(&mut self, solid_keys: &[SolidKey]) -> Result<CompSolidKey> {
        if solid_keys.is_empty() {
            return Err(KernelError::EmptyCompSolid);
        }
        for &sk in solid_keys {
            self.ensure(Shape::Solid(sk))?;
        }

        let key = self.comp_solids.insert(CompSolidData {
            solids: solid_keys.to_vec(),
        });
        for &sk in solid_keys {
            self.link(Shape::Solid(sk), Shape::CompSolid(key));
        }
        Ok(key)
    }

    /// Creates a compound holding the given members. Duplicates are dropped.
    pub fn add_compound(&mut self, members: &[Shape]) -> Result<Shape> {
        for &m in members {
            self.ensure(m)?;
        }
        let mut unique: Vec<Shape> = Vec::with_capacity(members.len());
        for &m in members {
            if !unique.contains(&m) {
                unique.push(m);
            }
        }

        let key = self.compounds.insert(CompoundData {
            members: unique.clone(),
        });
        for m in unique {
            self.link(m, Shape::Compound(key));
        }
        Ok(Shape::Compound(key))
    }
}

/// Helper to build a rectangular face from four corner vertices.
///
/// Creates 4 edges, 1 wire, and 1 face. Returns `(face_key, wire_key, edge_keys)`.
pub fn make_rectangle(
    store: &mut ShapeStore,
    v0: VertexKey,
    v1: VertexKey,
    v2: VertexKey,
    v3: VertexKey,
) -> Result<(FaceKey, WireKey, [EdgeKey; 4])> {
    let e0 = store.add_edge(v0, v1)?;
    let e1 = store.add_edge(v1, v2)?;
    let e2 = store.add_edge(v2, v3)?;
    let e3 = store.add_edge(v3, v0)?;
    let wire = store.add_wire(&[e0, e1, e2, e3])?;
    let face = store.add_face(wire)?;
    Ok((face, wire, [e0, e1, e2, e3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(store: &mut ShapeStore) -> [VertexKey; 4] {
        [
            store.add_vertex(0.0, 0.0, 0.0),
            store.add_vertex(1.0, 0.0, 0.0),
            store.add_vertex(1.0, 1.0, 0.0),
            store.add_vertex(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn add_edge_invalid_vertex() {
        let mut store = ShapeStore::new();
        let v0 = store.add_vertex(0.0, 0.0, 0.0);
        let stale = store.add_vertex(9.0, 9.0, 9.0);
        store.vertices.remove(stale);

        assert!(store.add_edge(v0, stale).is_err());
    }

    #[test]
    fn add_edge_registers_upward_adjacency() {
        let mut store = ShapeStore::new();
        let v0 = store.add_vertex(0.0, 0.0, 0.0);
        let v1 = store.add_vertex(1.0, 0.0, 0.0);
        let v2 = store.add_vertex(0.0, 1.0, 0.0);

        let e0 = store.add_edge(v0, v1).unwrap();
        let e1 = store.add_edge(v0, v2).unwrap();

        let parents: Vec<_> = store.parents(Shape::Vertex(v0)).collect();
        assert_eq!(parents.len(), 2);
        assert!(parents.contains(&Shape::Edge(e0)));
        assert!(parents.contains(&Shape::Edge(e1)));
    }

    #[test]
    fn wire_chain_orientation() {
        let mut store = ShapeStore::new();
        let v = square(&mut store);
        let e0 = store.add_edge(v[0], v[1]).unwrap();
        let e1 = store.add_edge(v[2], v[1]).unwrap();
        let wire = store.add_wire(&[e0, e1]).unwrap();

        assert_eq!(store.wire(wire).unwrap().orientations, vec![true, false]);
        assert!(!store.is_wire_closed(wire));
    }

    #[test]
    fn branching_wire_is_accepted() {
        let mut store = ShapeStore::new();
        let c = store.add_vertex(0.0, 0.0, 0.0);
        let a = store.add_vertex(1.0, 0.0, 0.0);
        let b = store.add_vertex(0.0, 1.0, 0.0);
        let d = store.add_vertex(0.0, 0.0, 1.0);
        let e0 = store.add_edge(c, a).unwrap();
        let e1 = store.add_edge(c, b).unwrap();
        let e2 = store.add_edge(c, d).unwrap();

        let wire = store.add_wire(&[e0, e1, e2]).unwrap();
        assert_eq!(store.wire(wire).unwrap().edges.len(), 3);
    }

    #[test]
    fn disconnected_wire_is_rejected() {
        let mut store = ShapeStore::new();
        let v = square(&mut store);
        let far0 = store.add_vertex(5.0, 5.0, 5.0);
        let far1 = store.add_vertex(6.0, 5.0, 5.0);
        let e0 = store.add_edge(v[0], v[1]).unwrap();
        let e1 = store.add_edge(far0, far1).unwrap();

        assert_eq!(
            store.add_wire(&[e0, e1]),
            Err(KernelError::DisconnectedWire(1, 0))
        );
        assert_eq!(store.add_wire(&[]), Err(KernelError::EmptyWire));
    }

    #[test]
    fn face_requires_closed_loop() {
        let mut store = ShapeStore::new();
        let v = square(&mut store);
        let e0 = store.add_edge(v[0], v[1]).unwrap();
        let e1 = store.add_edge(v[1], v[2]).unwrap();
        let e2 = store.add_edge(v[2], v[3]).unwrap();
        let open = store.add_wire(&[e0, e1, e2]).unwrap();

        assert_eq!(store.add_face(open), Err(KernelError::OpenWire));
    }

    #[test]
    fn collinear_loop_is_degenerate() {
        let mut store = ShapeStore::new();
        let a = store.add_vertex(0.0, 0.0, 0.0);
        let b = store.add_vertex(1.0, 0.0, 0.0);
        let c = store.add_vertex(2.0, 0.0, 0.0);
        let e0 = store.add_edge(a, b).unwrap();
        let e1 = store.add_edge(b, c).unwrap();
        let e2 = store.add_edge(c, a).unwrap();
        let wire = store.add_wire(&[e0, e1, e2]).unwrap();

        assert_eq!(store.add_face(wire), Err(KernelError::DegenerateFace));
    }

    #[test]
    fn make_rectangle_builds_face() {
        let mut store = ShapeStore::new();
        let v = square(&mut store);
        let (face, wire, edges) = make_rectangle(&mut store, v[0], v[1], v[2], v[3]).unwrap();

        assert_eq!(store.face(face).unwrap().outer_wire, wire);
        assert_eq!(store.wire(wire).unwrap().edges, edges.to_vec());
        assert!(store.is_wire_closed(wire));
    }

    #[test]
    fn open_shell_cannot_bound_solid() {
        let mut store = ShapeStore::new();
        let v = square(&mut store);
        let (face, _, _) = make_rectangle(&mut store, v[0], v[1], v[2], v[3]).unwrap();
        let shell = store.add_shell(&[face]).unwrap();

        assert_eq!(store.add_solid(shell), Err(KernelError::OpenShell(4)));
        assert_eq!(store.add_shell(&[]), Err(KernelError::EmptyShell));
    }

    #[test]
    fn shell_orientation_flips_inconsistent_neighbour() {
        let mut store = ShapeStore::new();
        let v = square(&mut store);
        let v4 = store.add_vertex(2.0, 0.0, 0.0);
        let v5 = store.add_vertex(2.0, 1.0, 0.0);
        let (left, _, _) = make_rectangle(&mut store, v[0], v[1], v[2], v[3]).unwrap();

        // Shares edge v1-v2 with `left`.
        let e_shared = store.face_directed_edges(left)[1].0;
        let e0 = store.add_edge(v[1], v4).unwrap();
        let e1 = store.add_edge(v4, v5).unwrap();
        let e2 = store.add_edge(v5, v[2]).unwrap();
        let wire = store.add_wire(&[e0, e1, e2, e_shared]).unwrap();
        let right = store.add_face(wire).unwrap();

        let shell = store.add_shell(&[left, right]).unwrap();
        let data = store.shell(shell).unwrap();
        // left winds v1→v2, right winds v2→v1: already consistent
        assert_eq!(data.reversed, vec![false, false]);
    }
}
