// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for boundary-representation shapes.
//!
//! The [`ShapeStore`] owns every shape. Shapes are immutable once created,
//! except compounds, which can gain and lose members. Each child keeps an
//! upward link to the shapes that reference it, so ancestor queries never
//! scan the whole store.
//!
//! Sub-shapes are shared: two faces bounded by the same edge reference the
//! same [`EdgeKey`], and a face between two solids is one [`FaceKey`] used
//! by both shells. That sharing is what makes the structure non-manifold.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use crate::error::{KernelError, Result};
use crate::keys::*;

/// Data stored for a vertex: a point in 3D space.
#[derive(Debug, Clone)]
pub struct VertexData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Data stored for an edge: a line segment between two vertices.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub start: VertexKey,
    pub end: VertexKey,
}

/// Data stored for a wire: a connected set of edges.
#[derive(Debug, Clone)]
pub struct WireData {
    /// Edges in traversal order when the wire is a simple chain.
    pub edges: Vec<EdgeKey>,
    /// `true` if edge[i] is traversed start→end.
    pub orientations: Vec<bool>,
}

/// Data stored for a face: a planar region bounded by one outer wire and
/// zero or more inner wires (holes).
#[derive(Debug, Clone)]
pub struct FaceData {
    pub outer_wire: WireKey,
    pub inner_wires: Vec<WireKey>,
}

/// Data stored for a shell.
#[derive(Debug, Clone)]
pub struct ShellData {
    pub faces: Vec<FaceKey>,
    /// `true` if face[i] is used against its own winding inside this shell.
    pub reversed: Vec<bool>,
}

/// Data stored for a solid: an outer shell and optional void shells.
#[derive(Debug, Clone)]
pub struct SolidData {
    pub outer_shell: ShellKey,
    pub inner_shells: Vec<ShellKey>,
}

/// Data stored for a comp-solid.
#[derive(Debug, Clone)]
pub struct CompSolidData {
    pub solids: Vec<SolidKey>,
}

/// Data stored for a compound.
#[derive(Debug, Clone, Default)]
pub struct CompoundData {
    pub members: Vec<Shape>,
}

/// The arena that owns all shapes and their upward adjacency.
///
/// # Example
///
/// ```
/// use nmt_kernel::ShapeStore;
///
/// let mut store = ShapeStore::new();
/// let v0 = store.add_vertex(0.0, 0.0, 0.0);
/// let v1 = store.add_vertex(1.0, 0.0, 0.0);
/// let edge = store.add_edge(v0, v1).unwrap();
///
/// assert_eq!(store.vertex_count(), 2);
/// assert!(store.edge(edge).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShapeStore {
    pub(crate) vertices: SlotMap<VertexKey, VertexData>,
    pub(crate) edges: SlotMap<EdgeKey, EdgeData>,
    pub(crate) wires: SlotMap<WireKey, WireData>,
    pub(crate) faces: SlotMap<FaceKey, FaceData>,
    pub(crate) shells: SlotMap<ShellKey, ShellData>,
    pub(crate) solids: SlotMap<SolidKey, SolidData>,
    pub(crate) comp_solids: SlotMap<CompSolidKey, CompSolidData>,
    pub(crate) compounds: SlotMap<CompoundKey, CompoundData>,

    // Upward adjacency: child → shapes that reference it directly
    pub(crate) parents: FxHashMap<Shape, FxHashSet<Shape>>,
}

impl ShapeStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Accessors ---

    /// Returns the vertex data for the given key.
    pub fn vertex(&self, key: VertexKey) -> Option<&VertexData> {
        self.vertices.get(key)
    }

    /// Returns the edge data for the given key.
    pub fn edge(&self, key: EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key)
    }

    /// Returns the wire data for the given key.
    pub fn wire(&self, key: WireKey) -> Option<&WireData> {
        self.wires.get(key)
    }

    /// Returns the face data for the given key.
    pub fn face(&self, key: FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    /// Returns the shell data for the given key.
    pub fn shell(&self, key: ShellKey) -> Option<&ShellData> {
        self.shells.get(key)
    }

    /// Returns the solid data for the given key.
    pub fn solid(&self, key: SolidKey) -> Option<&SolidData> {
        self.solids.get(key)
    }

    /// Returns the comp-solid data for the given key.
    pub fn comp_solid(&self, key: CompSolidKey) -> Option<&CompSolidData> {
        self.comp_solids.get(key)
    }

    /// Returns the compound data for the given key.
    pub fn compound(&self, key: CompoundKey) -> Option<&CompoundData> {
        self.compounds.get(key)
    }

    /// Returns the number of vertices in the store.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of edges in the store.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the number of faces in the store.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns the number of solids in the store.
    pub fn solid_count(&self) -> usize {
        self.solids.len()
    }

    /// Returns `true` if the handle references a live shape.
    pub fn contains(&self, shape: Shape) -> bool {
        match shape {
            Shape::Vertex(k) => self.vertices.contains_key(k),
            Shape::Edge(k) => self.edges.contains_key(k),
            Shape::Wire(k) => self.wires.contains_key(k),
            Shape::Face(k) => self.faces.contains_key(k),
            Shape::Shell(k) => self.shells.contains_key(k),
            Shape::Solid(k) => self.solids.contains_key(k),
            Shape::CompSolid(k) => self.comp_solids.contains_key(k),
            Shape::Compound(k) => self.compounds.contains_key(k),
        }
    }

    /// Fails with [`KernelError::NotFound`] unless the shape is live.
    pub fn ensure(&self, shape: Shape) -> Result<()> {
        if self.contains(shape) {
            Ok(())
        } else {
            Err(KernelError::NotFound(shape))
        }
    }

    /// Shapes that reference `shape` directly.
    pub fn parents(&self, shape: Shape) -> impl Iterator<Item = Shape> + '_ {
        self.parents.get(&shape).into_iter().flatten().copied()
    }

    // --- Compound editing ---

    /// Appends a member to a compound. Adding a shape twice is a no-op.
    pub fn compound_add(&mut self, compound: CompoundKey, member: Shape) -> Result<()> {
        self.ensure(member)?;
        let data = self
            .compounds
            .get_mut(compound)
            .ok_or(KernelError::NotFound(Shape::Compound(compound)))?;
        if data.members.contains(&member) {
            return Ok(());
        }
        data.members.push(member);
        self.link(member, Shape::Compound(compound));
        Ok(())
    }

    /// Removes a member from a compound. Returns `true` if it was present.
    pub fn compound_remove(&mut self, compound: CompoundKey, member: Shape) -> Result<bool> {
        let data = self
            .compounds
            .get_mut(compound)
            .ok_or(KernelError::NotFound(Shape::Compound(compound)))?;
        let before = data.members.len();
        data.members.retain(|m| *m != member);
        let removed = data.members.len() != before;
        if removed {
            self.unlink(member, Shape::Compound(compound));
        }
        Ok(removed)
    }

    /// Removes every member of a compound.
    pub fn compound_clear(&mut self, compound: CompoundKey) -> Result<()> {
        let data = self
            .compounds
            .get_mut(compound)
            .ok_or(KernelError::NotFound(Shape::Compound(compound)))?;
        let members = std::mem::take(&mut data.members);
        for member in members {
            self.unlink(member, Shape::Compound(compound));
        }
        Ok(())
    }

    // --- Adjacency index helpers ---

    /// Register that `parent` references `child` (upward adjacency).
    pub(crate) fn link(&mut self, child: Shape, parent: Shape) {
        self.parents.entry(child).or_default().insert(parent);
    }

    pub(crate) fn unlink(&mut self, child: Shape, parent: Shape) {
        if let Some(set) = self.parents.get_mut(&child) {
            set.remove(&parent);
            if set.is_empty() {
                self.parents.remove(&child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = ShapeStore::new();
        assert_eq!(store.vertex_count(), 0);
        assert_eq!(store.edge_count(), 0);
        assert_eq!(store.face_count(), 0);
        assert_eq!(store.solid_count(), 0);
    }

    #[test]
    fn compound_membership_tracks_parents() {
        let mut store = ShapeStore::new();
        let v = store.add_vertex(1.0, 2.0, 3.0);
        let compound = store.add_compound(&[]).unwrap();
        let Shape::Compound(ck) = compound else {
            panic!("expected compound");
        };

        store.compound_add(ck, Shape::Vertex(v)).unwrap();
        store.compound_add(ck, Shape::Vertex(v)).unwrap();
        assert_eq!(store.compound(ck).unwrap().members.len(), 1);
        assert_eq!(store.parents(Shape::Vertex(v)).count(), 1);

        assert!(store.compound_remove(ck, Shape::Vertex(v)).unwrap());
        assert!(!store.compound_remove(ck, Shape::Vertex(v)).unwrap());
        assert_eq!(store.parents(Shape::Vertex(v)).count(), 0);
    }

    #[test]
    fn compound_clear_unlinks_members() {
        let mut store = ShapeStore::new();
        let a = store.add_vertex(0.0, 0.0, 0.0);
        let b = store.add_vertex(1.0, 0.0, 0.0);
        let compound = store
            .add_compound(&[Shape::Vertex(a), Shape::Vertex(b)])
            .unwrap();
        let Shape::Compound(ck) = compound else {
            panic!("expected compound");
        };

        store.compound_clear(ck).unwrap();
        assert!(store.compound(ck).unwrap().members.is_empty());
        assert_eq!(store.parents(Shape::Vertex(a)).count(), 0);
    }

    #[test]
    fn ensure_reports_missing_shapes() {
        let mut store = ShapeStore::new();
        let v = store.add_vertex(0.0, 0.0, 0.0);
        store.vertices.remove(v);
        assert_eq!(
            store.ensure(Shape::Vertex(v)),
            Err(KernelError::NotFound(Shape::Vertex(v)))
        );
    }
}
