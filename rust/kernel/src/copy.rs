// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural copies of shapes.
//!
//! A copy duplicates the whole sub-shape graph below a root while keeping
//! its sharing: a vertex used by three edges of the original is one vertex
//! used by three edges of the copy.

use rustc_hash::FxHashMap;

use crate::error::{KernelError, Result};
use crate::keys::*;
use crate::store::ShapeStore;

/// Original sub-shape → its copy.
pub type CopyHistory = FxHashMap<Shape, Shape>;

impl ShapeStore {
    /// Copies `shape` and everything below it. Returns the copy and a map
    /// from every original sub-shape to its counterpart.
    pub fn copy_shape(&mut self, shape: Shape) -> Result<(Shape, CopyHistory)> {
        self.ensure(shape)?;
        let mut history = CopyHistory::default();
        let copy = self.copy_rec(shape, &mut history)?;
        Ok((copy, history))
    }

    fn copy_rec(&mut self, shape: Shape, history: &mut CopyHistory) -> Result<Shape> {
        if let Some(&done) = history.get(&shape) {
            return Ok(done);
        }
        let missing = KernelError::NotFound(shape);

        let copy = match shape {
            Shape::Vertex(k) => {
                let v = self.vertex(k).ok_or(missing)?;
                let (x, y, z) = (v.x, v.y, v.z);
                Shape::Vertex(self.add_vertex(x, y, z))
            }
            Shape::Edge(k) => {
                let e = self.edge(k).ok_or(missing)?.clone();
                let start = self.copy_vertex(e.start, history)?;
                let end = self.copy_vertex(e.end, history)?;
                Shape::Edge(self.add_edge(start, end)?)
            }
            Shape::Wire(k) => {
                let w = self.wire(k).ok_or(missing)?.clone();
                let mut edges = Vec::with_capacity(w.edges.len());
                for ek in w.edges {
                    edges.push(self.copy_edge(ek, history)?);
                }
                let key = self.add_wire(&edges)?;
                // Keep the original traversal even for branching wires
                if let Some(data) = self.wires.get_mut(key) {
                    data.orientations = w.orientations;
                }
                Shape::Wire(key)
            }
            Shape::Face(k) => {
                let f = self.face(k).ok_or(missing)?.clone();
                let outer = self.copy_wire(f.outer_wire, history)?;
                let mut inner = Vec::with_capacity(f.inner_wires.len());
                for wk in f.inner_wires {
                    inner.push(self.copy_wire(wk, history)?);
                }
                Shape::Face(self.add_face_with_holes(outer, &inner)?)
            }
            Shape::Shell(k) => {
                let s = self.shell(k).ok_or(missing)?.clone();
                let mut faces = Vec::with_capacity(s.faces.len());
                for fk in s.faces {
                    match self.copy_rec(Shape::Face(fk), history)? {
                        Shape::Face(f) => faces.push(f),
                        other => return Err(KernelError::NotFound(other)),
                    }
                }
                Shape::Shell(self.add_shell_oriented(&faces, &s.reversed)?)
            }
            Shape::Solid(k) => {
                let s = self.solid(k).ok_or(missing)?.clone();
                let outer = self.copy_shell(s.outer_shell, history)?;
                let mut inner = Vec::with_capacity(s.inner_shells.len());
                for sk in s.inner_shells {
                    inner.push(self.copy_shell(sk, history)?);
                }
                Shape::Solid(self.add_solid_with_voids(outer, &inner)?)
            }
            Shape::CompSolid(k) => {
                let c = self.comp_solid(k).ok_or(missing)?.clone();
                let mut solids = Vec::with_capacity(c.solids.len());
                for sk in c.solids {
                    match self.copy_rec(Shape::Solid(sk), history)? {
                        Shape::Solid(s) => solids.push(s),
                        other => return Err(KernelError::NotFound(other)),
                    }
                }
                Shape::CompSolid(self.add_comp_solid(&solids)?)
            }
            Shape::Compound(k) => {
                let members = self.compound(k).ok_or(missing)?.members.clone();
                let mut copies = Vec::with_capacity(members.len());
                for m in members {
                    copies.push(self.copy_rec(m, history)?);
                }
                self.add_compound(&copies)?
            }
        };

        history.insert(shape, copy);
        Ok(copy)
    }

    fn copy_vertex(&mut self, key: VertexKey, history: &mut CopyHistory) -> Result<VertexKey> {
        match self.copy_rec(Shape::Vertex(key), history)? {
            Shape::Vertex(v) => Ok(v),
            other => Err(KernelError::NotFound(other)),
        }
    }

    fn copy_edge(&mut self, key: EdgeKey, history: &mut CopyHistory) -> Result<EdgeKey> {
        match self.copy_rec(Shape::Edge(key), history)? {
            Shape::Edge(e) => Ok(e),
            other => Err(KernelError::NotFound(other)),
        }
    }

    fn copy_wire(&mut self, key: WireKey, history: &mut CopyHistory) -> Result<WireKey> {
        match self.copy_rec(Shape::Wire(key), history)? {
            Shape::Wire(w) => Ok(w),
            other => Err(KernelError::NotFound(other)),
        }
    }

    fn copy_shell(&mut self, key: ShellKey, history: &mut CopyHistory) -> Result<ShellKey> {
        match self.copy_rec(Shape::Shell(key), history)? {
            Shape::Shell(s) => Ok(s),
            other => Err(KernelError::NotFound(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn copy_keeps_sharing() {
        let mut store = ShapeStore::new();
        let complex = store
            .make_adjacent_boxes([0.0; 3], [1.0; 3], [1.0, 0.0, 0.0], [2.0, 1.0, 1.0], 1e-6)
            .unwrap();
        let faces_before = store.face_count();

        let (copy, history) = store.copy_shape(Shape::CompSolid(complex)).unwrap();

        assert_ne!(copy, Shape::CompSolid(complex));
        assert_eq!(store.face_count(), faces_before * 2);
        assert_eq!(store.sub_shapes(copy, ShapeKind::Face).len(), 11);
        assert_eq!(store.sub_shapes(copy, ShapeKind::Vertex).len(), 12);
        assert_eq!(history[&Shape::CompSolid(complex)], copy);
        assert_eq!(history.len(), 12 + 20 + 11 + 11 + 2 + 2 + 1);
    }

    #[test]
    fn copy_preserves_geometry() {
        let mut store = ShapeStore::new();
        let (solid, _, _) = store.make_box([0.0; 3], [2.0, 1.0, 1.0]).unwrap();
        let (copy, _) = store.copy_shape(Shape::Solid(solid)).unwrap();
        let Shape::Solid(copied) = copy else {
            panic!("expected solid");
        };
        assert_relative_eq!(store.solid_volume(copied).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn copy_of_compound_copies_members() {
        let mut store = ShapeStore::new();
        let a = store.add_vertex(0.0, 0.0, 0.0);
        let b = store.add_vertex(1.0, 0.0, 0.0);
        let e = store.add_edge(a, b).unwrap();
        let compound = store.add_compound(&[Shape::Edge(e), Shape::Vertex(a)]).unwrap();

        let (copy, history) = store.copy_shape(compound).unwrap();
        let Shape::Compound(ck) = copy else {
            panic!("expected compound");
        };
        let members = &store.compound(ck).unwrap().members;
        assert_eq!(members.len(), 2);
        // The loose vertex is the same copy as the edge's start
        assert_eq!(members[1], history[&Shape::Vertex(a)]);
    }
}
