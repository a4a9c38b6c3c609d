// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries on entities.
//!
//! Thin typed accessors over the kernel. A missing answer from the kernel
//! means the shape is gone from the store, reported as
//! [`KernelError::NotFound`].

use nalgebra::{Point3, Vector3};
use nmt_kernel::{KernelError, Location, Shape};

use crate::entities::{Cell, Edge, Entity, Face, Shell, Vertex, Wire};
use crate::error::Result;
use crate::model::Model;
use crate::topology::Topology;

fn gone(shape: Shape) -> KernelError {
    KernelError::NotFound(shape)
}

impl Model {
    /// Position of a vertex.
    pub fn vertex_point(&self, vertex: Vertex) -> Result<Point3<f64>> {
        Ok(self
            .store
            .vertex_point(vertex.key())
            .ok_or_else(|| gone(vertex.shape()))?)
    }

    /// Coordinates of a vertex as `(x, y, z)`.
    pub fn coordinates(&self, vertex: Vertex) -> Result<(f64, f64, f64)> {
        let p = self.vertex_point(vertex)?;
        Ok((p.x, p.y, p.z))
    }

    pub fn edge_length(&self, edge: Edge) -> Result<f64> {
        Ok(self
            .store
            .edge_length(edge.key())
            .ok_or_else(|| gone(edge.shape()))?)
    }

    /// First vertex of an edge.
    pub fn edge_start(&mut self, edge: Edge) -> Result<Vertex> {
        let start = self
            .store
            .edge(edge.key())
            .ok_or_else(|| gone(edge.shape()))?
            .start;
        self.by_shape_as(Shape::Vertex(start))
    }

    /// Last vertex of an edge.
    pub fn edge_end(&mut self, edge: Edge) -> Result<Vertex> {
        let end = self
            .store
            .edge(edge.key())
            .ok_or_else(|| gone(edge.shape()))?
            .end;
        self.by_shape_as(Shape::Vertex(end))
    }

    pub fn face_area(&self, face: Face) -> Result<f64> {
        Ok(self
            .store
            .face_area(face.key())
            .ok_or_else(|| gone(face.shape()))?)
    }

    /// Unit normal following the outer loop's winding.
    pub fn face_normal(&self, face: Face) -> Result<Vector3<f64>> {
        Ok(self
            .store
            .face_normal(face.key())
            .ok_or_else(|| gone(face.shape()))?)
    }

    pub fn cell_volume(&self, cell: Cell) -> Result<f64> {
        Ok(self
            .store
            .solid_volume(cell.key())
            .ok_or_else(|| gone(cell.shape()))?)
    }

    /// `true` when every vertex of the wire joins exactly two of its edges.
    pub fn wire_is_closed(&self, wire: Wire) -> bool {
        self.store.is_wire_closed(wire.key())
    }

    /// `true` when the shell has no free edges.
    pub fn shell_is_closed(&self, shell: Shell) -> bool {
        self.store.is_shell_closed(shell.key())
    }

    /// Average of the distinct vertices.
    pub fn centroid(&self, topology: Topology) -> Result<Point3<f64>> {
        let shape = topology.shape();
        Ok(self.store.centroid(shape).ok_or_else(|| gone(shape))?)
    }

    /// Length-, area- or volume-weighted centre.
    pub fn center_of_mass(&self, topology: Topology) -> Result<Point3<f64>> {
        let shape = topology.shape();
        Ok(self.store.center_of_mass(shape).ok_or_else(|| gone(shape))?)
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounding_box(&self, topology: Topology) -> Result<(Point3<f64>, Point3<f64>)> {
        let shape = topology.shape();
        Ok(self.store.bounding_box(shape).ok_or_else(|| gone(shape))?)
    }

    /// A point strictly inside the cell, also for re-entrant cells.
    pub fn cell_internal_point(&self, cell: Cell) -> Result<Point3<f64>> {
        Ok(self
            .store
            .interior_point(cell.key())
            .ok_or_else(|| gone(cell.shape()))?)
    }

    /// A point inside the face region, away from holes.
    pub fn face_internal_point(&self, face: Face) -> Result<Point3<f64>> {
        Ok(self
            .face_point(face.key())
            .ok_or_else(|| gone(face.shape()))?)
    }

    fn face_point(&self, key: nmt_kernel::FaceKey) -> Option<Point3<f64>> {
        let centre = self.store.center_of_mass(Shape::Face(key))?;
        if self.store.classify_point_on_face(key, &centre, self.config.tolerance)?
            == Location::In
        {
            return Some(centre);
        }
        let triangles = self.store.triangulate_face(key)?;
        triangles
            .iter()
            .max_by(|a, b| triangle_area(a).total_cmp(&triangle_area(b)))
            .map(|[a, b, c]| Point3::from((a.coords + b.coords + c.coords) / 3.0))
    }

    /// Point used to match a shape against another shape tree: an interior
    /// point for cells and faces, the centre of mass otherwise.
    pub(crate) fn reference_point(&self, shape: Shape) -> Option<Point3<f64>> {
        match shape {
            Shape::Solid(k) => self.store.interior_point(k),
            Shape::Face(k) => self.face_point(k),
            _ => self.store.center_of_mass(shape),
        }
    }
}

fn triangle_area([a, b, c]: &[Point3<f64>; 3]) -> f64 {
    (b - a).cross(&(c - a)).norm() * 0.5
}
