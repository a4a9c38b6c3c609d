// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed constructors.
//!
//! Constructors build on the shapes they are given: an edge uses the two
//! input vertices, a face uses the input wire. Inputs that have to be
//! rebuilt to connect (edges whose ends only coincide geometrically, faces
//! that are sewn into a shell) pass their attributes on to the rebuilt
//! shapes. Cells and cell complexes made from loose parts are returned as
//! deep copies carrying the attributes of those parts.

use nmt_kernel::{CellsBuilder, EdgeKey, FaceKey, Shape, ShapeKind, SolidKey, Sewer, WireKey};
use tracing::trace;

use crate::entities::{Cell, CellComplex, Cluster, Edge, Entity, Face, Shell, Vertex, Wire};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::topology::Topology;

impl Model {
    fn finish<E: Entity>(&mut self, shape: Shape) -> Result<E> {
        let topology = self.wrap(shape);
        E::try_from_topology(self.constructed(topology)?)
    }

    pub fn vertex_by_coordinates(&mut self, x: f64, y: f64, z: f64) -> Result<Vertex> {
        let key = self.store.add_vertex(x, y, z);
        self.finish(Shape::Vertex(key))
    }

    /// A straight edge between two existing vertices.
    pub fn edge_by_vertices(&mut self, start: Vertex, end: Vertex) -> Result<Edge> {
        if start.key() == end.key() {
            return Err(Error::precondition(
                "The start and end vertices of an edge must differ.",
            ));
        }
        let key = self.store.add_edge(start.key(), end.key())?;
        self.finish(Shape::Edge(key))
    }

    /// A wire through the given edges. Edges whose ends coincide within the
    /// model tolerance are joined.
    pub fn wire_by_edges(&mut self, edges: &[Edge]) -> Result<Wire> {
        if edges.is_empty() {
            return Err(Error::precondition("The input Edge list is empty."));
        }
        let mut sewer = Sewer::new(self.config.tolerance);
        for edge in edges {
            self.store.ensure(edge.shape())?;
            sewer.adopt(&self.store, edge.shape());
        }

        let mut keys: Vec<EdgeKey> = Vec::with_capacity(edges.len());
        let mut rebuilt: Vec<Shape> = Vec::new();
        for edge in edges {
            let (a, b) = self
                .store
                .edge_points(edge.key())
                .ok_or(nmt_kernel::KernelError::NotFound(edge.shape()))?;
            let Some(key) = sewer.edge_by_points(&mut self.store, &a, &b)? else {
                trace!(edge = %edge.topology(), "dropping collapsed edge");
                continue;
            };
            if key != edge.key() {
                rebuilt.push(edge.shape());
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let wire = Shape::Wire(self.store.add_wire(&keys)?);
        for source in rebuilt {
            self.deep_copy_attributes(source, wire);
        }
        self.finish(wire)
    }

    /// A chain of edges through the vertices, closed back to the first one
    /// when `close` is set.
    pub fn wire_by_vertices(&mut self, vertices: &[Vertex], close: bool) -> Result<Wire> {
        let key = self.chain(vertices, close)?;
        self.finish(Shape::Wire(key))
    }

    fn chain(&mut self, vertices: &[Vertex], close: bool) -> Result<WireKey> {
        let mut keys: Vec<_> = vertices.iter().map(|v| v.key()).collect();
        keys.dedup();
        if close && keys.len() > 1 && keys.first() == keys.last() {
            keys.pop();
        }
        if keys.len() < 2 {
            return Err(Error::precondition("A wire needs at least two distinct vertices."));
        }

        let mut edges = Vec::with_capacity(keys.len());
        for pair in keys.windows(2) {
            edges.push(self.store.add_edge(pair[0], pair[1])?);
        }
        if close && keys.len() > 2 {
            edges.push(self.store.add_edge(keys[keys.len() - 1], keys[0])?);
        }
        Ok(self.store.add_wire(&edges)?)
    }

    /// A planar face bounded by a closed wire.
    pub fn face_by_wire(&mut self, wire: Wire) -> Result<Face> {
        self.face_by_wires(wire, &[])
    }

    /// A planar face with an outer boundary and holes.
    pub fn face_by_wires(&mut self, outer: Wire, holes: &[Wire]) -> Result<Face> {
        let inner: Vec<WireKey> = holes.iter().map(|w| w.key()).collect();
        let key = self.store.add_face_with_holes(outer.key(), &inner)?;
        self.finish(Shape::Face(key))
    }

    /// A planar face through the vertices, in order.
    pub fn face_by_vertices(&mut self, vertices: &[Vertex]) -> Result<Face> {
        if vertices.len() < 3 {
            return Err(Error::precondition("A face needs at least three vertices."));
        }
        let wire = self.chain(vertices, true)?;
        let key = self.store.add_face(wire)?;
        self.finish(Shape::Face(key))
    }

    /// A planar face through coordinate triples; coincident points share
    /// one vertex.
    pub fn face_by_coordinates(&mut self, points: &[[f64; 3]]) -> Result<Face> {
        let key = self.store.add_face_by_coords(points)?;
        self.finish(Shape::Face(key))
    }

    /// A shell from faces, sewn along coincident edges.
    pub fn shell_by_faces(&mut self, faces: &[Face]) -> Result<Shell> {
        if faces.is_empty() {
            return Err(Error::precondition("The input Face list is empty."));
        }
        let keys: Vec<FaceKey> = faces.iter().map(|f| f.key()).collect();
        let sewn = self.store.sew_existing_faces(&keys, self.config.tolerance)?;
        let shell = Shape::Shell(self.store.add_shell(&sewn)?);
        self.carry_rebuilt(faces, shell);
        self.finish(shell)
    }

    /// The single cell bounded by `faces`. Faces are sewn within
    /// `tolerance`; the result is a deep copy carrying the faces'
    /// attributes.
    pub fn cell_by_faces(&mut self, faces: &[Face], tolerance: f64) -> Result<Cell> {
        if tolerance <= 0.0 {
            return Err(Error::precondition("The tolerance must have a positive value."));
        }
        if faces.is_empty() {
            return Err(Error::precondition("The input Face list is empty."));
        }
        let keys: Vec<FaceKey> = faces.iter().map(|f| f.key()).collect();
        let volumes = self.store.make_volumes(&keys, tolerance)?;
        let [solid] = volumes.solids[..] else {
            return Err(Error::precondition("The input Faces do not form a Cell."));
        };

        let fixed = self.store.fix(Shape::Solid(solid))?;
        let cell = self.wrap(fixed);
        let origins: Vec<Topology> = faces.iter().map(|f| f.topology()).collect();
        let copy = self.deep_copy_attributes_from(cell, &origins)?;
        Cell::try_from_topology(self.constructed(copy)?)
    }

    /// A cell bounded by a closed shell. The cell shares the shell.
    pub fn cell_by_shell(&mut self, shell: Shell) -> Result<Cell> {
        if !self.store.is_shell_closed(shell.key()) {
            return Err(Error::precondition("The input Shell is open."));
        }
        let key = self.store.add_solid(shell.key())?;
        self.finish(Shape::Solid(key))
    }

    /// An axis-aligned box between two corners.
    pub fn cell_box(&mut self, min: [f64; 3], max: [f64; 3]) -> Result<Cell> {
        if (0..3).any(|i| max[i] - min[i] <= self.config.tolerance) {
            return Err(Error::precondition("A box needs a positive extent on every axis."));
        }
        let (solid, _, _) = self.store.make_box(min, max)?;
        self.finish(Shape::Solid(solid))
    }

    /// Glues cells into one cell complex. Overlapping cells are split
    /// where they overlap; touching cells end up sharing their common
    /// faces. Cells that do not connect are an error.
    pub fn cell_complex_by_cells(&mut self, cells: &[Cell]) -> Result<CellComplex> {
        let solids: Vec<SolidKey> = match cells {
            [] => return Err(Error::precondition("No cell is passed.")),
            [cell] => vec![cell.key()],
            _ => self.glue_cells(cells)?,
        };

        let complex = Shape::CompSolid(self.store.add_comp_solid(&solids)?);
        let complex = self.wrap(complex);
        let origins: Vec<Topology> = cells.iter().map(|c| c.topology()).collect();
        let copy = self.deep_copy_attributes_from(complex, &origins)?;
        CellComplex::try_from_topology(self.constructed(copy)?)
    }

    fn glue_cells(&mut self, cells: &[Cell]) -> Result<Vec<SolidKey>> {
        let mut builder = CellsBuilder::new(self.config.fuzzy);
        for cell in cells {
            builder.add_argument(cell.shape());
        }
        builder.perform(&mut self.store);
        if builder.has_errors() {
            return Err(nmt_kernel::KernelError::Decomposition(builder.dump_errors()).into());
        }
        builder.add_all_to_result();

        let mut faces: Vec<FaceKey> = Vec::new();
        for piece in builder.selection() {
            if piece.kind() != ShapeKind::Solid {
                continue;
            }
            for face in self.store.sub_shapes(piece, ShapeKind::Face) {
                if let Shape::Face(k) = face {
                    faces.push(k);
                }
            }
        }
        let volumes = self.store.make_volumes(&faces, self.config.tolerance)?;

        let pieces: Vec<Shape> = volumes.solids.iter().map(|&s| Shape::Solid(s)).collect();
        let grouped = self.store.make_containers(&pieces)?;
        let connected = grouped.is_some_and(|compound| {
            let members = self.store.children(compound);
            members.len() == 1 && members[0].kind() == ShapeKind::CompSolid
        });
        if !connected {
            return Err(Error::precondition("The input Cells do not form a CellComplex."));
        }
        Ok(volumes.solids)
    }

    /// The cell complex of every region bounded by `faces`.
    pub fn cell_complex_by_faces(&mut self, faces: &[Face], tolerance: f64) -> Result<CellComplex> {
        if tolerance <= 0.0 {
            return Err(Error::precondition("The tolerance must have a positive value."));
        }
        let keys: Vec<FaceKey> = faces.iter().map(|f| f.key()).collect();
        let volumes = self.store.make_volumes(&keys, tolerance)?;
        if volumes.solids.is_empty() {
            return Err(Error::precondition("The input Faces do not form a CellComplex."));
        }

        let complex = Shape::CompSolid(self.store.add_comp_solid(&volumes.solids)?);
        let complex = self.wrap(complex);
        let origins: Vec<Topology> = faces.iter().map(|f| f.topology()).collect();
        let copy = self.deep_copy_attributes_from(complex, &origins)?;
        CellComplex::try_from_topology(self.constructed(copy)?)
    }

    /// A cluster holding the given topologies as they are.
    pub fn cluster_by_topologies(&mut self, topologies: &[Topology]) -> Result<Cluster> {
        let members: Vec<Shape> = topologies.iter().map(|t| t.shape()).collect();
        let compound = self.store.add_compound(&members)?;
        self.finish(compound)
    }

    fn carry_rebuilt(&mut self, faces: &[Face], container: Shape) {
        for face in faces {
            if !self.store.is_sub_shape(face.shape(), container) {
                self.deep_copy_attributes(face.shape(), container);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{DictValue, Dictionary};
    use crate::keys::TopologyType;
    use approx::assert_relative_eq;

    fn square(model: &mut Model, z: f64) -> Vec<Vertex> {
        [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .iter()
            .map(|[x, y]| model.vertex_by_coordinates(*x, *y, z).unwrap())
            .collect()
    }

    #[test]
    fn edge_uses_its_vertices() {
        let mut model = Model::new();
        let a = model.vertex_by_coordinates(0.0, 0.0, 0.0).unwrap();
        let b = model.vertex_by_coordinates(1.0, 0.0, 0.0).unwrap();
        let edge = model.edge_by_vertices(a, b).unwrap();
        let vertices = model.vertices(edge.topology(), None).unwrap();
        assert_eq!(vertices, vec![a, b]);
        assert!(model.edge_by_vertices(a, a).is_err());
    }

    #[test]
    fn wire_by_edges_joins_coincident_ends() {
        let mut model = Model::new();
        let a = model.vertex_by_coordinates(0.0, 0.0, 0.0).unwrap();
        let b = model.vertex_by_coordinates(1.0, 0.0, 0.0).unwrap();
        let b2 = model.vertex_by_coordinates(1.0, 0.0, 0.0).unwrap();
        let c = model.vertex_by_coordinates(1.0, 1.0, 0.0).unwrap();
        let e1 = model.edge_by_vertices(a, b).unwrap();
        let e2 = model.edge_by_vertices(b2, c).unwrap();
        let mut dict = Dictionary::default();
        dict.insert("kind".into(), DictValue::from("rail"));
        model.set_dictionary(e2.topology(), dict.clone());

        let wire = model.wire_by_edges(&[e1, e2]).unwrap();
        assert_eq!(model.vertices(wire.topology(), None).unwrap().len(), 3);
        assert!(!model.wire_is_closed(wire));

        let edges = model.edges(wire.topology(), None).unwrap();
        let rebuilt = edges.iter().find(|e| e.key() != e1.key()).unwrap();
        assert_eq!(model.dictionary(rebuilt.topology()), dict);
    }

    #[test]
    fn closed_wire_makes_a_face() {
        let mut model = Model::new();
        let vertices = square(&mut model, 0.0);
        let wire = model.wire_by_vertices(&vertices, true).unwrap();
        assert!(model.wire_is_closed(wire));
        let face = model.face_by_wire(wire).unwrap();
        assert_relative_eq!(model.face_area(face).unwrap(), 1.0, epsilon = 1e-9);

        let open = model.wire_by_vertices(&vertices, false).unwrap();
        assert!(model.face_by_wire(open).is_err());
    }

    #[test]
    fn face_with_hole() {
        let mut model = Model::new();
        let outer = model
            .face_by_coordinates(&[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 4.0, 0.0], [0.0, 4.0, 0.0]])
            .unwrap();
        let outer_wire = model.wires(outer.topology(), None).unwrap()[0];
        let hole: Vec<Vertex> = [[1.0, 1.0], [1.0, 2.0], [2.0, 2.0], [2.0, 1.0]]
            .iter()
            .map(|[x, y]| model.vertex_by_coordinates(*x, *y, 0.0).unwrap())
            .collect();
        let hole = model.wire_by_vertices(&hole, true).unwrap();

        let face = model.face_by_wires(outer_wire, &[hole]).unwrap();
        assert_relative_eq!(model.face_area(face).unwrap(), 15.0, epsilon = 1e-9);
        assert_eq!(model.wires(face.topology(), None).unwrap().len(), 2);
    }

    #[test]
    fn loose_faces_make_a_cell() {
        let mut model = Model::new();
        let faces: Vec<Face> = nmt_kernel::builders::box_faces([0.0; 3], [1.0; 3])
            .iter()
            .map(|coords| model.face_by_coordinates(coords).unwrap())
            .collect();
        let mut dict = Dictionary::default();
        dict.insert("name".into(), DictValue::from("floor"));
        model.set_dictionary(faces[0].topology(), dict.clone());

        let cell = model.cell_by_faces(&faces, 1e-6).unwrap();
        assert_relative_eq!(model.cell_volume(cell).unwrap(), 1.0, epsilon = 1e-9);
        let tagged: Vec<Face> = model
            .faces(cell.topology(), None)
            .unwrap()
            .into_iter()
            .filter(|f| model.dictionary(f.topology()) == dict)
            .collect();
        assert_eq!(tagged.len(), 1);

        assert!(model.cell_by_faces(&faces[..5], 1e-6).is_err());
        assert!(model.cell_by_faces(&faces, 0.0).is_err());
    }

    #[test]
    fn shell_to_cell() {
        let mut model = Model::new();
        let faces: Vec<Face> = nmt_kernel::builders::box_faces([0.0; 3], [2.0; 3])
            .iter()
            .map(|coords| model.face_by_coordinates(coords).unwrap())
            .collect();
        let open = model.shell_by_faces(&faces[..5]).unwrap();
        assert!(!model.shell_is_closed(open));
        assert!(model.cell_by_shell(open).is_err());

        let shell = model.shell_by_faces(&faces).unwrap();
        assert!(model.shell_is_closed(shell));
        let cell = model.cell_by_shell(shell).unwrap();
        assert_relative_eq!(model.cell_volume(cell).unwrap(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn touching_cells_glue_into_a_complex() {
        let mut model = Model::new();
        let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
        let b = model.cell_box([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]).unwrap();
        let complex = model.cell_complex_by_cells(&[a, b]).unwrap();
        assert_eq!(complex.topology().kind(), TopologyType::CellComplex);
        assert_eq!(model.cells(complex.topology(), None).unwrap().len(), 2);
        assert_eq!(model.faces(complex.topology(), None).unwrap().len(), 11);

        let far = model.cell_box([5.0; 3], [6.0; 3]).unwrap();
        assert!(model.cell_complex_by_cells(&[a, far]).is_err());
    }

    #[test]
    fn faces_with_a_shared_wall_make_two_cells() {
        let mut model = Model::new();
        let mut coords = nmt_kernel::builders::box_faces([0.0; 3], [1.0; 3]);
        coords.extend(nmt_kernel::builders::box_faces([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]));
        let faces: Vec<Face> = coords
            .iter()
            .map(|c| model.face_by_coordinates(c).unwrap())
            .collect();
        let complex = model.cell_complex_by_faces(&faces, 1e-6).unwrap();
        assert_eq!(model.cells(complex.topology(), None).unwrap().len(), 2);
    }

    #[test]
    fn cluster_keeps_members() {
        let mut model = Model::new();
        let v = model.vertex_by_coordinates(0.0, 0.0, 0.0).unwrap().topology();
        let c = model.cell_box([1.0; 3], [2.0; 3]).unwrap().topology();
        let cluster = model.cluster_by_topologies(&[v, c]).unwrap();
        let members = model.sub_topologies(cluster.topology());
        assert_eq!(members.len(), 2);
        assert!(members[0].is_same(&v));
        assert!(members[1].is_same(&c));
    }

    #[test]
    fn constructors_register_in_aggregate_when_configured() {
        let config = crate::ModelConfig {
            register_in_aggregate: true,
            ..Default::default()
        };
        let mut model = Model::with_config(config).unwrap();
        let v = model.vertex_by_coordinates(0.0, 0.0, 0.0).unwrap();
        let members = model.aggregate_members();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_same(&v.topology()));
    }
}
