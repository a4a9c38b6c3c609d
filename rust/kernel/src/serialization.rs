// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON snapshots of a single shape and everything below it.
//!
//! Store keys are mapped to sequential per-kind indices, so a snapshot can
//! be read back into any store.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::keys::*;
use crate::store::ShapeStore;

/// Reference to a shape inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRef {
    pub kind: ShapeKind,
    pub index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShapeSnapshot {
    pub root: Option<ShapeRef>,
    pub vertices: Vec<[f64; 3]>,
    pub edges: Vec<[usize; 2]>,
    pub wires: Vec<WireSnapshot>,
    pub faces: Vec<FaceSnapshot>,
    pub shells: Vec<ShellSnapshot>,
    pub solids: Vec<SolidSnapshot>,
    pub comp_solids: Vec<Vec<usize>>,
    pub compounds: Vec<Vec<ShapeRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSnapshot {
    pub edges: Vec<usize>,
    pub orientations: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSnapshot {
    pub outer_wire: usize,
    pub inner_wires: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSnapshot {
    pub faces: Vec<usize>,
    pub reversed: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolidSnapshot {
    pub outer_shell: usize,
    pub inner_shells: Vec<usize>,
}

impl ShapeStore {
    /// Serializes `shape` and its sub-shapes to a JSON string.
    pub fn to_text(&self, shape: Shape) -> Result<String> {
        self.ensure(shape)?;
        let mut writer = SnapshotWriter::default();
        let root = writer.visit(self, shape)?;
        writer.snapshot.root = Some(root);
        serde_json::to_string(&writer.snapshot).map_err(|e| KernelError::Serialization(e.to_string()))
    }

    /// Rebuilds a shape from [`ShapeStore::to_text`] output.
    pub fn from_text(&mut self, json: &str) -> Result<Shape> {
        let snapshot: ShapeSnapshot =
            serde_json::from_str(json).map_err(|e| KernelError::Serialization(e.to_string()))?;
        let root = snapshot
            .root
            .ok_or_else(|| KernelError::Serialization("snapshot has no root".to_string()))?;

        let vertices: Vec<VertexKey> = snapshot
            .vertices
            .iter()
            .map(|[x, y, z]| self.add_vertex(*x, *y, *z))
            .collect();

        let mut edges = Vec::with_capacity(snapshot.edges.len());
        for [start, end] in &snapshot.edges {
            edges.push(self.add_edge(lookup(&vertices, *start)?, lookup(&vertices, *end)?)?);
        }

        let mut wires = Vec::with_capacity(snapshot.wires.len());
        for w in &snapshot.wires {
            let keys = w
                .edges
                .iter()
                .map(|&i| lookup(&edges, i))
                .collect::<Result<Vec<_>>>()?;
            let key = self.add_wire(&keys)?;
            if let Some(data) = self.wires.get_mut(key) {
                if data.orientations.len() == w.orientations.len() {
                    data.orientations = w.orientations.clone();
                }
            }
            wires.push(key);
        }

        let mut faces = Vec::with_capacity(snapshot.faces.len());
        for f in &snapshot.faces {
            let inner = f
                .inner_wires
                .iter()
                .map(|&i| lookup(&wires, i))
                .collect::<Result<Vec<_>>>()?;
            faces.push(self.add_face_with_holes(lookup(&wires, f.outer_wire)?, &inner)?);
        }

        let mut shells = Vec::with_capacity(snapshot.shells.len());
        for s in &snapshot.shells {
            let keys = s
                .faces
                .iter()
                .map(|&i| lookup(&faces, i))
                .collect::<Result<Vec<_>>>()?;
            shells.push(self.add_shell_oriented(&keys, &s.reversed)?);
        }

        let mut solids = Vec::with_capacity(snapshot.solids.len());
        for s in &snapshot.solids {
            let inner = s
                .inner_shells
                .iter()
                .map(|&i| lookup(&shells, i))
                .collect::<Result<Vec<_>>>()?;
            solids.push(self.add_solid_with_voids(lookup(&shells, s.outer_shell)?, &inner)?);
        }

        let mut comp_solids = Vec::with_capacity(snapshot.comp_solids.len());
        for members in &snapshot.comp_solids {
            let keys = members
                .iter()
                .map(|&i| lookup(&solids, i))
                .collect::<Result<Vec<_>>>()?;
            comp_solids.push(self.add_comp_solid(&keys)?);
        }

        // Members of a compound always come earlier in the list
        let mut compounds: Vec<Shape> = Vec::with_capacity(snapshot.compounds.len());
        for members in &snapshot.compounds {
            let mut shapes = Vec::with_capacity(members.len());
            for r in members {
                shapes.push(resolve(
                    *r,
                    &vertices,
                    &edges,
                    &wires,
                    &faces,
                    &shells,
                    &solids,
                    &comp_solids,
                    &compounds,
                )?);
            }
            compounds.push(self.add_compound(&shapes)?);
        }

        resolve(
            root,
            &vertices,
            &edges,
            &wires,
            &faces,
            &shells,
            &solids,
            &comp_solids,
            &compounds,
        )
    }
}

fn lookup<K: Copy>(keys: &[K], index: usize) -> Result<K> {
    keys.get(index)
        .copied()
        .ok_or_else(|| KernelError::Serialization(format!("dangling index {index}")))
}

#[allow(clippy::too_many_arguments)]
fn resolve(
    r: ShapeRef,
    vertices: &[VertexKey],
    edges: &[EdgeKey],
    wires: &[WireKey],
    faces: &[FaceKey],
    shells: &[ShellKey],
    solids: &[SolidKey],
    comp_solids: &[CompSolidKey],
    compounds: &[Shape],
) -> Result<Shape> {
    Ok(match r.kind {
        ShapeKind::Vertex => Shape::Vertex(lookup(vertices, r.index)?),
        ShapeKind::Edge => Shape::Edge(lookup(edges, r.index)?),
        ShapeKind::Wire => Shape::Wire(lookup(wires, r.index)?),
        ShapeKind::Face => Shape::Face(lookup(faces, r.index)?),
        ShapeKind::Shell => Shape::Shell(lookup(shells, r.index)?),
        ShapeKind::Solid => Shape::Solid(lookup(solids, r.index)?),
        ShapeKind::CompSolid => Shape::CompSolid(lookup(comp_solids, r.index)?),
        ShapeKind::Compound => lookup(compounds, r.index)?,
    })
}

#[derive(Default)]
struct SnapshotWriter {
    snapshot: ShapeSnapshot,
    ids: FxHashMap<Shape, usize>,
}

impl SnapshotWriter {
    /// Writes `shape` after its children; returns its reference.
    fn visit(&mut self, store: &ShapeStore, shape: Shape) -> Result<ShapeRef> {
        if let Some(&index) = self.ids.get(&shape) {
            return Ok(ShapeRef {
                kind: shape.kind(),
                index,
            });
        }
        let missing = KernelError::NotFound(shape);
        let index = match shape {
            Shape::Vertex(k) => {
                let v = store.vertex(k).ok_or(missing)?;
                self.snapshot.vertices.push([v.x, v.y, v.z]);
                self.snapshot.vertices.len() - 1
            }
            Shape::Edge(k) => {
                let e = store.edge(k).ok_or(missing)?.clone();
                let start = self.visit(store, Shape::Vertex(e.start))?.index;
                let end = self.visit(store, Shape::Vertex(e.end))?.index;
                self.snapshot.edges.push([start, end]);
                self.snapshot.edges.len() - 1
            }
            Shape::Wire(k) => {
                let w = store.wire(k).ok_or(missing)?.clone();
                let mut edges = Vec::with_capacity(w.edges.len());
                for ek in &w.edges {
                    edges.push(self.visit(store, Shape::Edge(*ek))?.index);
                }
                self.snapshot.wires.push(WireSnapshot {
                    edges,
                    orientations: w.orientations,
                });
                self.snapshot.wires.len() - 1
            }
            Shape::Face(k) => {
                let f = store.face(k).ok_or(missing)?.clone();
                let outer_wire = self.visit(store, Shape::Wire(f.outer_wire))?.index;
                let mut inner_wires = Vec::with_capacity(f.inner_wires.len());
                for wk in &f.inner_wires {
                    inner_wires.push(self.visit(store, Shape::Wire(*wk))?.index);
                }
                self.snapshot.faces.push(FaceSnapshot {
                    outer_wire,
                    inner_wires,
                });
                self.snapshot.faces.len() - 1
            }
            Shape::Shell(k) => {
                let s = store.shell(k).ok_or(missing)?.clone();
                let mut faces = Vec::with_capacity(s.faces.len());
                for fk in &s.faces {
                    faces.push(self.visit(store, Shape::Face(*fk))?.index);
                }
                self.snapshot.shells.push(ShellSnapshot {
                    faces,
                    reversed: s.reversed,
                });
                self.snapshot.shells.len() - 1
            }
            Shape::Solid(k) => {
                let s = store.solid(k).ok_or(missing)?.clone();
                let outer_shell = self.visit(store, Shape::Shell(s.outer_shell))?.index;
                let mut inner_shells = Vec::with_capacity(s.inner_shells.len());
                for sk in &s.inner_shells {
                    inner_shells.push(self.visit(store, Shape::Shell(*sk))?.index);
                }
                self.snapshot.solids.push(SolidSnapshot {
                    outer_shell,
                    inner_shells,
                });
                self.snapshot.solids.len() - 1
            }
            Shape::CompSolid(k) => {
                let c = store.comp_solid(k).ok_or(missing)?.clone();
                let mut solids = Vec::with_capacity(c.solids.len());
                for sk in &c.solids {
                    solids.push(self.visit(store, Shape::Solid(*sk))?.index);
                }
                self.snapshot.comp_solids.push(solids);
                self.snapshot.comp_solids.len() - 1
            }
            Shape::Compound(k) => {
                let members = store.compound(k).ok_or(missing)?.members.clone();
                let mut refs = Vec::with_capacity(members.len());
                for m in members {
                    refs.push(self.visit(store, m)?);
                }
                self.snapshot.compounds.push(refs);
                self.snapshot.compounds.len() - 1
            }
        };
        self.ids.insert(shape, index);
        Ok(ShapeRef {
            kind: shape.kind(),
            index,
        })
    }
}
