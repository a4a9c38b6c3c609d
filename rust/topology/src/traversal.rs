// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Navigation between kinds.
//!
//! Finer kinds are found by decomposition and coarser kinds by searching the
//! shapes containing a topology inside a host. Without a host the search
//! runs over the aggregate, so it only finds what was registered there.

use nmt_kernel::{CellsBuilder, Shape, ShapeKind};
use rustc_hash::FxHashSet;

use crate::entities::{Cell, CellComplex, Cluster, Edge, Entity, Face, Shell, Vertex, Wire};
use crate::error::{Error, Result};
use crate::keys::TopologyType;
use crate::model::Model;
use crate::topology::Topology;

impl Model {
    /// Topologies of kind `target` related to `topology`.
    ///
    /// - finer kind: distinct sub-shapes, in discovery order;
    /// - same kind: `topology` itself;
    /// - coarser kind: distinct shapes of `host` (the aggregate when `None`)
    ///   containing `topology`.
    pub fn navigate(
        &mut self,
        topology: Topology,
        target: TopologyType,
        host: Option<Topology>,
    ) -> Result<Vec<Topology>> {
        if !TopologyType::STRUCTURAL.contains(&target) {
            return Err(Error::precondition(format!(
                "{target} is not a structural kind to navigate to."
            )));
        }
        let kind = target.shape_kind();
        let shape = topology.shape();
        self.store.ensure(shape)?;

        if kind == shape.kind() {
            return Ok(vec![topology]);
        }
        let found = if kind < shape.kind() {
            self.store.sub_shapes(shape, kind)
        } else {
            self.ancestors_in(shape, host, kind)?
        };
        Ok(self.wrap_all(found))
    }

    fn ancestors_in(&self, shape: Shape, host: Option<Topology>, kind: ShapeKind) -> Result<Vec<Shape>> {
        match host {
            Some(host) => {
                self.store.ensure(host.shape())?;
                Ok(self.store.ancestors(shape, host.shape(), kind))
            }
            None => {
                let Some(aggregate) = self.aggregate else {
                    return Ok(Vec::new());
                };
                let aggregate = Shape::Compound(aggregate);
                Ok(self
                    .store
                    .ancestors(shape, aggregate, kind)
                    .into_iter()
                    .filter(|s| *s != aggregate)
                    .collect())
            }
        }
    }

    fn navigate_as<E: Entity>(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<E>> {
        self.navigate(topology, E::TYPE, host)?
            .into_iter()
            .map(E::try_from_topology)
            .collect()
    }

    pub fn vertices(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Vertex>> {
        self.navigate_as(topology, host)
    }

    pub fn edges(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Edge>> {
        self.navigate_as(topology, host)
    }

    pub fn wires(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Wire>> {
        self.navigate_as(topology, host)
    }

    pub fn faces(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Face>> {
        self.navigate_as(topology, host)
    }

    pub fn shells(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Shell>> {
        self.navigate_as(topology, host)
    }

    pub fn cells(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Cell>> {
        self.navigate_as(topology, host)
    }

    pub fn cell_complexes(
        &mut self,
        topology: Topology,
        host: Option<Topology>,
    ) -> Result<Vec<CellComplex>> {
        self.navigate_as(topology, host)
    }

    pub fn clusters(&mut self, topology: Topology, host: Option<Topology>) -> Result<Vec<Cluster>> {
        self.navigate_as(topology, host)
    }

    // --- Adjacency ---

    /// Other ends of the edges meeting at `vertex`.
    pub fn adjacent_vertices(&mut self, vertex: Vertex, host: Option<Topology>) -> Result<Vec<Vertex>> {
        let edges = self.ancestors_in(vertex.shape(), host, ShapeKind::Edge)?;
        let mut out: Vec<Shape> = Vec::new();
        for edge in edges {
            for end in self.store.children(edge) {
                if end != vertex.shape() && !out.contains(&end) {
                    out.push(end);
                }
            }
        }
        self.wrap_all(out).into_iter().map(Vertex::try_from_topology).collect()
    }

    /// Edges sharing a vertex with `edge`.
    pub fn adjacent_edges(&mut self, edge: Edge, host: Option<Topology>) -> Result<Vec<Edge>> {
        self.adjacent(edge, ShapeKind::Vertex, host)
    }

    /// Faces sharing an edge with `face`.
    pub fn adjacent_faces(&mut self, face: Face, host: Option<Topology>) -> Result<Vec<Face>> {
        self.adjacent(face, ShapeKind::Edge, host)
    }

    /// Cells sharing a face with `cell`.
    pub fn adjacent_cells(&mut self, cell: Cell, host: Option<Topology>) -> Result<Vec<Cell>> {
        self.adjacent(cell, ShapeKind::Face, host)
    }

    fn adjacent<E: Entity>(&mut self, entity: E, via: ShapeKind, host: Option<Topology>) -> Result<Vec<E>> {
        let shape = entity.shape();
        let mut seen: FxHashSet<Shape> = FxHashSet::default();
        seen.insert(shape);
        let mut out = Vec::new();
        for joint in self.store.sub_shapes(shape, via) {
            for other in self.ancestors_in(joint, host, E::SHAPE_KIND)? {
                if seen.insert(other) {
                    out.push(other);
                }
            }
        }
        self.wrap_all(out).into_iter().map(E::try_from_topology).collect()
    }

    // --- Cell complexes ---

    /// Faces shared by two or more cells of the complex.
    pub fn internal_faces(&mut self, complex: CellComplex) -> Result<Vec<Face>> {
        let host = complex.shape();
        let faces: Vec<Shape> = self
            .store
            .sub_shapes(host, ShapeKind::Face)
            .into_iter()
            .filter(|&f| self.store.ancestors(f, host, ShapeKind::Solid).len() > 1)
            .collect();
        self.wrap_all(faces).into_iter().map(Face::try_from_topology).collect()
    }

    /// Faces of the complex that are not manifold within it.
    pub fn non_manifold_faces(&mut self, complex: CellComplex) -> Result<Vec<Face>> {
        let mut out = Vec::new();
        for face in self.faces(complex.topology(), None)? {
            if !self.is_manifold(face.topology(), Some(complex.topology()))? {
                out.push(face);
            }
        }
        Ok(out)
    }

    /// The single cell enclosing the whole complex, as a new cell.
    pub fn external_boundary(&mut self, complex: CellComplex) -> Result<Cell> {
        let mut builder = CellsBuilder::new(self.config.fuzzy);
        for cell in self.store.children(complex.shape()) {
            builder.add_argument(cell);
        }
        builder.perform(&mut self.store);
        if builder.has_errors() {
            return Err(nmt_kernel::KernelError::Decomposition(builder.dump_errors()).into());
        }
        builder.add_all_to_result();
        let fused = builder.make_fused(&mut self.store)?;
        let simplest = match fused {
            Some(shape) => self.simplest(shape)?,
            None => None,
        };
        let solid = simplest
            .filter(|s| s.kind() == ShapeKind::Solid)
            .ok_or_else(|| Error::precondition("The cell complex has no single external boundary."))?;
        let boundary = self.wrap(solid);
        Cell::try_from_topology(self.deep_copy(boundary)?)
    }
}
