// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Non-regular decomposition of a set of arguments into labelled cells.
//!
//! Every argument is split against every other argument. Each resulting
//! piece ("cell") carries the set of argument indices it lies in. Callers
//! then select cells by label, e.g. "in argument 0 but in none of 1, 2",
//! and assemble the selection into containers.
//!
//! Solids are split pairwise with BSP booleans. A planar free face splits a
//! solid only when it spans the solid's whole section by the face plane.
//! Faces are overlaid with coplanar faces and split by the footprint of
//! every solid in their plane. Edges are split wherever they meet another
//! argument. All pieces are rebuilt through one [`Sewer`], so pieces that
//! touch share their common sub-shapes.

use std::collections::BTreeSet;

use nalgebra::{Point2, Point3, Vector2};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::error::{KernelError, Result};
use crate::geometry::{point_segment_distance, Location};
use crate::keys::*;
use crate::mesh::{self, CsgMesh, MeshOp, PlanarFace, Polygon3};
use crate::planar::{self, PlaneFrame, Region, MIN_REGION_AREA};
use crate::spatial::Sewer;
use crate::store::ShapeStore;

/// Indices of the arguments a cell lies in.
pub type Labels = BTreeSet<usize>;

/// Volume fraction below which a split piece is discarded.
const MIN_VOLUME_FRACTION: f64 = 1e-7;

#[derive(Debug, Clone)]
enum SolidGeometry {
    /// Not split by anything: the argument's own solid.
    Original(SolidKey),
    Mesh(CsgMesh),
}

#[derive(Debug, Clone)]
struct SolidPiece {
    geometry: SolidGeometry,
    labels: Labels,
    bounds: (Point3<f64>, Point3<f64>),
    volume: f64,
}

/// Lowest-level parts of one argument.
#[derive(Debug, Clone, Default)]
struct Primitives {
    solids: Vec<SolidKey>,
    faces: Vec<FaceKey>,
    edges: Vec<EdgeKey>,
    vertices: Vec<VertexKey>,
}

/// A face of some argument, used to split and classify edges.
#[derive(Debug, Clone, Copy)]
struct FaceRef {
    arg: usize,
    face: FaceKey,
    /// `false` for boundary faces of solid arguments.
    free: bool,
}

/// N-ary cell decomposition.
///
/// # Example
///
/// ```
/// use nmt_kernel::{CellsBuilder, ShapeStore, Shape};
///
/// let mut store = ShapeStore::new();
/// let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
/// let (b, _, _) = store.make_box([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]).unwrap();
///
/// let mut builder = CellsBuilder::new(1e-6);
/// builder.add_argument(Shape::Solid(a));
/// builder.add_argument(Shape::Solid(b));
/// builder.perform(&mut store);
/// assert!(!builder.has_errors());
///
/// // A minus B
/// builder.add_to_result(&[0], &[1]);
/// let result = builder.make_containers(&mut store).unwrap();
/// assert!(result.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CellsBuilder {
    fuzzy: f64,
    arguments: Vec<Shape>,
    cells: Vec<Shape>,
    labels: Vec<Labels>,
    // Cell lies inside a higher-dimensional argument
    covered: Vec<bool>,
    index: FxHashMap<Shape, usize>,
    selected: Vec<bool>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl CellsBuilder {
    /// Creates a builder with the given fuzzy tolerance.
    pub fn new(fuzzy: f64) -> Self {
        Self {
            fuzzy: fuzzy.max(1e-9),
            arguments: Vec::new(),
            cells: Vec::new(),
            labels: Vec::new(),
            covered: Vec::new(),
            index: FxHashMap::default(),
            selected: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Adds an argument and returns its label index.
    pub fn add_argument(&mut self, shape: Shape) -> usize {
        self.arguments.push(shape);
        self.arguments.len() - 1
    }

    pub fn arguments(&self) -> &[Shape] {
        &self.arguments
    }

    pub fn fuzzy(&self) -> f64 {
        self.fuzzy
    }

    /// Cells with their labels.
    pub fn cells(&self) -> impl Iterator<Item = (Shape, &Labels)> + '_ {
        self.cells.iter().copied().zip(self.labels.iter())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All recorded errors, one per line.
    pub fn dump_errors(&self) -> String {
        self.errors.join("\n")
    }

    /// All recorded warnings, one per line.
    pub fn dump_warnings(&self) -> String {
        self.warnings.join("\n")
    }

    /// Runs the decomposition. Failures are recorded, see
    /// [`CellsBuilder::has_errors`].
    pub fn perform(&mut self, store: &mut ShapeStore) {
        self.cells.clear();
        self.labels.clear();
        self.covered.clear();
        self.index.clear();
        self.selected.clear();
        self.errors.clear();
        self.warnings.clear();

        if self.arguments.is_empty() {
            self.errors.push("no arguments to decompose".to_string());
            return;
        }
        if let Err(e) = self.decompose(store) {
            self.errors.push(e.to_string());
        }
        self.selected = vec![false; self.cells.len()];
        debug!(
            arguments = self.arguments.len(),
            cells = self.cells.len(),
            errors = self.errors.len(),
            "cell decomposition done"
        );
    }

    // --- Selection ---

    /// Selects cells lying in every argument of `take` and in none of `avoid`.
    pub fn add_to_result(&mut self, take: &[usize], avoid: &[usize]) {
        self.add_to_result_if(|labels| {
            take.iter().all(|t| labels.contains(t)) && !avoid.iter().any(|a| labels.contains(a))
        });
    }

    /// Selects cells whose labels satisfy `predicate`.
    pub fn add_to_result_if(&mut self, predicate: impl Fn(&Labels) -> bool) {
        for (i, labels) in self.labels.iter().enumerate() {
            if predicate(labels) {
                self.selected[i] = true;
            }
        }
    }

    pub fn add_all_to_result(&mut self) {
        self.selected.iter_mut().for_each(|s| *s = true);
    }

    pub fn remove_all_from_result(&mut self) {
        self.selected.iter_mut().for_each(|s| *s = false);
    }

    /// Currently selected cells.
    pub fn selection(&self) -> Vec<Shape> {
        self.cells
            .iter()
            .zip(&self.selected)
            .filter(|(_, s)| **s)
            .map(|(c, _)| *c)
            .collect()
    }

    /// Assembles the selection into containers inside one compound: solids
    /// sharing faces form comp-solids, faces sharing edges form shells,
    /// edges sharing vertices form wires. Cells that are sub-shapes of other
    /// selected cells are dropped. `None` when nothing is selected.
    pub fn make_containers(&self, store: &mut ShapeStore) -> Result<Option<Shape>> {
        let selection = self.selection();
        assemble(store, &selection)
    }

    /// Assembles the selection as a regular union: connected solids melt
    /// into one, coplanar faces merge, and lower-dimensional cells inside
    /// higher-dimensional arguments disappear.
    pub fn make_fused(&self, store: &mut ShapeStore) -> Result<Option<Shape>> {
        let selection: Vec<(Shape, bool)> = self
            .cells
            .iter()
            .zip(&self.selected)
            .zip(&self.covered)
            .filter(|((_, s), _)| **s)
            .map(|((c, _), covered)| (*c, *covered))
            .collect();

        let solids: Vec<Shape> = selection
            .iter()
            .filter(|(c, _)| c.kind() == ShapeKind::Solid)
            .map(|(c, _)| *c)
            .collect();
        let faces: Vec<FaceKey> = selection
            .iter()
            .filter_map(|(c, covered)| match c {
                Shape::Face(f) if !covered => Some(*f),
                _ => None,
            })
            .collect();
        let rest: Vec<Shape> = selection
            .iter()
            .filter(|(c, covered)| c.kind() <= ShapeKind::Edge && !covered)
            .map(|(c, _)| *c)
            .collect();

        let mut sewer = Sewer::new(self.fuzzy);
        for s in &solids {
            sewer.adopt(store, *s);
        }

        let mut members: Vec<Shape> = Vec::new();
        for group in group_by_shared(store, &solids, ShapeKind::Face) {
            if group.len() == 1 {
                members.push(solids[group[0]]);
                continue;
            }
            let keys: Vec<SolidKey> = group
                .iter()
                .filter_map(|&i| match solids[i] {
                    Shape::Solid(k) => Some(k),
                    _ => None,
                })
                .collect();
            for solid in self.melt_solids(store, &mut sewer, &keys)? {
                members.push(Shape::Solid(solid));
            }
        }

        for face in self.merge_coplanar_faces(store, &mut sewer, &faces)? {
            members.push(Shape::Face(face));
        }
        members.extend(rest);
        assemble(store, &members)
    }

    /// Rebuilds a connected group of solids as one solid bounded by the
    /// faces used by exactly one member.
    fn melt_solids(
        &self,
        store: &mut ShapeStore,
        sewer: &mut Sewer,
        solids: &[SolidKey],
    ) -> Result<Vec<SolidKey>> {
        let mut uses: FxHashMap<FaceKey, usize> = FxHashMap::default();
        let mut oriented = Vec::new();
        for &sk in solids {
            let faces = store
                .solid_face_triangles(sk)
                .ok_or(KernelError::NotFound(Shape::Solid(sk)))?;
            for (fk, _) in &faces {
                *uses.entry(*fk).or_default() += 1;
            }
            oriented.extend(faces);
        }

        let polygons: Vec<Polygon3> = oriented
            .iter()
            .filter(|(fk, _)| uses.get(fk) == Some(&1))
            .flat_map(|(_, triangles)| triangles.iter().map(|t| t.to_vec()))
            .collect();
        let mut faces = vec![mesh::merge_coplanar(&polygons, self.fuzzy)];
        mesh::resolve_t_junctions(&mut faces, self.fuzzy);
        trace!(solids = solids.len(), faces = faces[0].len(), "melting solids");
        store.sew_planar_solids(sewer, &faces[0])
    }

    /// Unions coplanar faces into maximal faces.
    fn merge_coplanar_faces(
        &self,
        store: &mut ShapeStore,
        sewer: &mut Sewer,
        faces: &[FaceKey],
    ) -> Result<Vec<FaceKey>> {
        let mut groups: Vec<(PlaneFrame, Vec<Region>, Vec<FaceKey>)> = Vec::new();
        for &fk in faces {
            let (normal, offset) = store
                .face_plane(fk)
                .ok_or(KernelError::NotFound(Shape::Face(fk)))?;
            let (outer, holes) = store
                .face_loops(fk)
                .ok_or(KernelError::NotFound(Shape::Face(fk)))?;
            let index = groups
                .iter()
                .position(|(frame, _, _)| frame.is_coplanar(&normal, offset, self.fuzzy));
            let index = match index {
                Some(i) => i,
                None => {
                    groups.push((PlaneFrame::new(outer[0], normal), Vec::new(), Vec::new()));
                    groups.len() - 1
                }
            };
            let region = planar::project_loops(&groups[index].0, &outer, &holes);
            groups[index].1.push(region);
            groups[index].2.push(fk);
        }

        let mut out = Vec::new();
        for (frame, regions, keys) in groups {
            if keys.len() == 1 {
                out.extend(keys);
                continue;
            }
            for region in planar::union(&regions, &[]) {
                let (outer, holes) = region.to_3d(&frame);
                let (face, _) = sewer.face(store, &outer, &holes)?;
                out.push(face);
            }
        }
        Ok(out)
    }

    // --- Decomposition ---

    fn decompose(&mut self, store: &mut ShapeStore) -> Result<()> {
        for &arg in &self.arguments {
            store.ensure(arg)?;
        }
        let primitives: Vec<Primitives> = self
            .arguments
            .iter()
            .map(|&a| collect_primitives(store, a))
            .collect();

        let mut pieces: Vec<SolidPiece> = Vec::new();
        for (i, prim) in primitives.iter().enumerate() {
            for &solid in &prim.solids {
                self.insert_solid(store, &mut pieces, i, solid)?;
            }
        }
        for prim in &primitives {
            for &face in &prim.faces {
                self.cut_with_face(store, &mut pieces, face)?;
            }
        }
        trace!(pieces = pieces.len(), "solid pieces");

        let solid_args: Vec<(usize, SolidKey)> = primitives
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.solids.iter().map(move |&s| (i, s)))
            .collect();
        let face_args: Vec<(usize, FaceKey)> = primitives
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.faces.iter().map(move |&f| (i, f)))
            .collect();
        let edge_args: Vec<(usize, EdgeKey)> = primitives
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.edges.iter().map(move |&e| (i, e)))
            .collect();
        let face_pieces = self.split_faces(store, &face_args, &solid_args, &edge_args)?;

        let mut sewer = Sewer::new(self.fuzzy);
        for &arg in &self.arguments {
            sewer.adopt(store, arg);
        }
        self.build_solids(store, &mut sewer, pieces, face_pieces)?;

        let mut faces: Vec<FaceRef> = face_args
            .iter()
            .map(|&(arg, face)| FaceRef { arg, face, free: true })
            .collect();
        for &(arg, solid) in &solid_args {
            for f in store.sub_shapes(Shape::Solid(solid), ShapeKind::Face) {
                if let Shape::Face(face) = f {
                    faces.push(FaceRef { arg, face, free: false });
                }
            }
        }
        let vertex_args: Vec<(usize, VertexKey)> = primitives
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.vertices.iter().map(move |&v| (i, v)))
            .collect();

        for &(arg, edge) in &edge_args {
            for (a, b, labels, covered) in
                self.split_edge(store, arg, edge, &edge_args, &faces, &solid_args, &vertex_args)?
            {
                if let Some(piece) = sewer.edge_by_points(store, &a, &b)? {
                    self.add_cell(Shape::Edge(piece), labels, covered);
                }
            }
        }

        for &(arg, vertex) in &vertex_args {
            let p = store
                .vertex_point(vertex)
                .ok_or(KernelError::NotFound(Shape::Vertex(vertex)))?;
            let mut labels = Labels::from([arg]);
            for &(other, ov) in &vertex_args {
                if let Some(q) = store.vertex_point(ov) {
                    if (q - p).norm() <= self.fuzzy {
                        labels.insert(other);
                    }
                }
            }
            let covered =
                self.containing_args(store, &p, &edge_args, &faces, &solid_args, &mut labels);
            let key = sewer.vertex(store, &p);
            self.add_cell(Shape::Vertex(key), labels, covered);
        }
        Ok(())
    }

    fn add_cell(&mut self, shape: Shape, labels: Labels, covered: bool) {
        match self.index.get(&shape) {
            Some(&i) => {
                self.labels[i].extend(labels);
                self.covered[i] |= covered;
            }
            None => {
                self.index.insert(shape, self.cells.len());
                self.cells.push(shape);
                self.labels.push(labels);
                self.covered.push(covered);
            }
        }
    }

    fn volume_epsilon(&self, volume: f64) -> f64 {
        (volume.abs() * MIN_VOLUME_FRACTION).max(self.fuzzy.powi(3))
    }

    /// Refines the solid pieces by a new solid argument.
    fn insert_solid(
        &mut self,
        store: &ShapeStore,
        pieces: &mut Vec<SolidPiece>,
        arg: usize,
        solid: SolidKey,
    ) -> Result<()> {
        let missing = || KernelError::NotFound(Shape::Solid(solid));
        let bounds = store.bounding_box(Shape::Solid(solid)).ok_or_else(missing)?;
        let volume = store.solid_volume(solid).ok_or_else(missing)?;
        let eps = self.volume_epsilon(volume);
        let solid_mesh = mesh::triangles_to_csg(&store.solid_triangles(solid).ok_or_else(missing)?);

        // None while the argument is still whole
        let mut rest: Option<CsgMesh> = None;
        let mut consumed = false;
        let mut next = Vec::with_capacity(pieces.len() + 2);

        for mut piece in pieces.drain(..) {
            if consumed || !mesh::bounds_overlap(&piece.bounds, &bounds, self.fuzzy) {
                next.push(piece);
                continue;
            }
            if self.same_geometry(store, &piece, solid, volume, &bounds) {
                piece.labels.insert(arg);
                consumed = true;
                next.push(piece);
                continue;
            }

            let piece_mesh = piece_mesh(store, &piece)?;
            let common = mesh::mesh_boolean(&piece_mesh, &solid_mesh, MeshOp::Intersect);
            let Some(common_piece) = mesh_piece(common, piece.labels.clone(), eps) else {
                next.push(piece);
                continue;
            };
            let outside = mesh::mesh_boolean(&piece_mesh, &solid_mesh, MeshOp::Difference);

            let current = rest.take().unwrap_or_else(|| solid_mesh.clone());
            rest = Some(mesh::mesh_boolean(&current, &piece_mesh, MeshOp::Difference));

            let mut common_piece = common_piece;
            common_piece.labels.insert(arg);
            next.push(common_piece);
            if let Some(outside_piece) = mesh_piece(outside, piece.labels, eps) {
                next.push(outside_piece);
            }
        }

        if !consumed {
            match rest {
                None => next.push(SolidPiece {
                    geometry: SolidGeometry::Original(solid),
                    labels: Labels::from([arg]),
                    bounds,
                    volume,
                }),
                Some(remaining) => {
                    if let Some(piece) = mesh_piece(remaining, Labels::from([arg]), eps) {
                        next.push(piece);
                    }
                }
            }
        }
        *pieces = next;
        Ok(())
    }

    /// Coincident solids are recognised without a boolean.
    fn same_geometry(
        &self,
        store: &ShapeStore,
        piece: &SolidPiece,
        solid: SolidKey,
        volume: f64,
        bounds: &(Point3<f64>, Point3<f64>),
    ) -> bool {
        if let SolidGeometry::Original(k) = piece.geometry {
            if k == solid {
                return true;
            }
        }
        let tol = self.fuzzy;
        if (piece.volume - volume).abs() > self.volume_epsilon(volume) * 10.0
            || (piece.bounds.0 - bounds.0).norm() > tol
            || (piece.bounds.1 - bounds.1).norm() > tol
        {
            return false;
        }
        let piece_points: Vec<Point3<f64>> = match &piece.geometry {
            SolidGeometry::Original(k) => store
                .sub_shapes(Shape::Solid(*k), ShapeKind::Vertex)
                .into_iter()
                .filter_map(|v| match v {
                    Shape::Vertex(vk) => store.vertex_point(vk),
                    _ => None,
                })
                .collect(),
            SolidGeometry::Mesh(m) => mesh::csg_polygons(m).into_iter().flatten().collect(),
        };
        store
            .sub_shapes(Shape::Solid(solid), ShapeKind::Vertex)
            .into_iter()
            .filter_map(|v| match v {
                Shape::Vertex(vk) => store.vertex_point(vk),
                _ => None,
            })
            .all(|p| piece_points.iter().any(|q| (q - p).norm() <= tol))
    }

    /// Splits solid pieces by a planar face that spans their section.
    fn cut_with_face(
        &mut self,
        store: &ShapeStore,
        pieces: &mut Vec<SolidPiece>,
        face: FaceKey,
    ) -> Result<()> {
        let missing = || KernelError::NotFound(Shape::Face(face));
        let (normal, _) = store.face_plane(face).ok_or_else(missing)?;
        let (outer, holes) = store.face_loops(face).ok_or_else(missing)?;
        let face_bounds = store.bounding_box(Shape::Face(face)).ok_or_else(missing)?;
        let frame = PlaneFrame::new(outer[0], normal);
        let face_region = [planar::project_loops(&frame, &outer, &holes)];

        let mut next = Vec::with_capacity(pieces.len());
        for piece in pieces.drain(..) {
            if !mesh::bounds_overlap(&piece.bounds, &face_bounds, self.fuzzy)
                || !plane_crosses_bounds(&frame, &piece.bounds, self.fuzzy)
            {
                next.push(piece);
                continue;
            }

            let eps = self.volume_epsilon(piece.volume);
            let piece_mesh = piece_mesh(store, &piece)?;
            let half = mesh::half_space_box(&frame, &piece.bounds.0, &piece.bounds.1);
            let above = mesh::mesh_boolean(&piece_mesh, &half, MeshOp::Intersect);
            let below = mesh::mesh_boolean(&piece_mesh, &half, MeshOp::Difference);
            let above_polygons = mesh::csg_polygons(&above);
            if mesh::polygons_volume(&above_polygons).abs() <= eps
                || mesh::polygons_volume(&mesh::csg_polygons(&below)).abs() <= eps
            {
                next.push(piece);
                continue;
            }

            let section: Vec<Vec<Point2<f64>>> = above_polygons
                .iter()
                .filter(|poly| poly.iter().all(|p| frame.distance(p).abs() <= self.fuzzy))
                .map(|poly| poly.iter().map(|p| frame.to_2d(p)).collect())
                .collect();
            let section = planar::union_contours(&section);
            let uncovered = planar::total_area(&planar::difference(&section, &face_region));
            if uncovered > MIN_REGION_AREA.max(self.fuzzy * self.fuzzy) {
                let message = format!(
                    "face {face:?} does not span the section of a solid piece; piece left whole"
                );
                warn!("{message}");
                self.warnings.push(message);
                next.push(piece);
                continue;
            }

            for half_mesh in [above, below] {
                if let Some(p) = mesh_piece(half_mesh, piece.labels.clone(), eps) {
                    next.push(p);
                }
            }
        }
        *pieces = next;
        Ok(())
    }

    /// Overlays free faces with coplanar faces, splits them by the solids
    /// crossing their plane and cuts them along edges lying in the plane.
    fn split_faces(
        &mut self,
        store: &ShapeStore,
        face_args: &[(usize, FaceKey)],
        solid_args: &[(usize, SolidKey)],
        edge_args: &[(usize, EdgeKey)],
    ) -> Result<Vec<(PlaneFrame, Region, Labels, bool)>> {
        let mut planes: Vec<(PlaneFrame, Vec<(Region, Labels)>)> = Vec::new();

        for &(arg, face) in face_args {
            let missing = || KernelError::NotFound(Shape::Face(face));
            let (normal, offset) = store.face_plane(face).ok_or_else(missing)?;
            let (outer, holes) = store.face_loops(face).ok_or_else(missing)?;
            let index = planes
                .iter()
                .position(|(frame, _)| frame.is_coplanar(&normal, offset, self.fuzzy));
            let index = match index {
                Some(i) => i,
                None => {
                    planes.push((PlaneFrame::new(outer[0], normal), Vec::new()));
                    planes.len() - 1
                }
            };
            let (frame, pieces) = &mut planes[index];
            let face_region = vec![planar::project_loops(frame, &outer, &holes)];

            let mut rest = face_region.clone();
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for (region, labels) in pieces.drain(..) {
                let single = [region];
                let common = planar::intersect(&single, &face_region);
                if planar::total_area(&common) <= MIN_REGION_AREA {
                    let [region] = single;
                    next.push((region, labels));
                    continue;
                }
                let mut with_arg = labels.clone();
                with_arg.insert(arg);
                next.extend(common.into_iter().map(|r| (r, with_arg.clone())));
                next.extend(
                    planar::difference(&single, &face_region)
                        .into_iter()
                        .map(|r| (r, labels.clone())),
                );
                rest = planar::difference(&rest, &single);
            }
            next.extend(rest.into_iter().map(|r| (r, Labels::from([arg]))));
            *pieces = next;
        }

        let mut out = Vec::new();
        for (frame, pieces) in planes {
            let mut pieces: Vec<(Region, Labels, bool)> =
                pieces.into_iter().map(|(r, l)| (r, l, false)).collect();
            for &(arg, solid) in solid_args {
                let triangles = store
                    .solid_triangles(solid)
                    .ok_or(KernelError::NotFound(Shape::Solid(solid)))?;
                let footprint = mesh::plane_section(&triangles, &frame, self.fuzzy);
                if footprint.is_empty() {
                    continue;
                }
                let mut next = Vec::with_capacity(pieces.len());
                for (region, labels, covered) in pieces {
                    let single = [region];
                    let inside = planar::intersect(&single, &footprint);
                    if planar::total_area(&inside) <= MIN_REGION_AREA {
                        let [region] = single;
                        next.push((region, labels, covered));
                        continue;
                    }
                    let mut with_arg = labels.clone();
                    with_arg.insert(arg);
                    next.extend(inside.into_iter().map(|r| (r, with_arg.clone(), true)));
                    next.extend(
                        planar::difference(&single, &footprint)
                            .into_iter()
                            .map(|r| (r, labels.clone(), covered)),
                    );
                }
                pieces = next;
            }
            for &(_, edge) in edge_args {
                let Some((a, b)) = store.edge_points(edge) else {
                    continue;
                };
                if frame.distance(&a).abs() > self.fuzzy || frame.distance(&b).abs() > self.fuzzy {
                    continue;
                }
                let (a, b) = (frame.to_2d(&a), frame.to_2d(&b));
                let mut next = Vec::with_capacity(pieces.len() + 1);
                for (region, labels, covered) in pieces {
                    match self.cut_region(&region, a, b) {
                        Some(halves) => next.extend(
                            halves.into_iter().map(|r| (r, labels.clone(), covered)),
                        ),
                        None => next.push((region, labels, covered)),
                    }
                }
                pieces = next;
            }
            out.extend(
                pieces
                    .into_iter()
                    .map(|(region, labels, covered)| (frame, region, labels, covered)),
            );
        }
        Ok(out)
    }

    /// Cuts a region along the segment `a`-`b`. `None` when the line misses
    /// the region or the segment does not reach across it; the latter is
    /// recorded as a warning.
    fn cut_region(
        &mut self,
        region: &Region,
        a: Point2<f64>,
        b: Point2<f64>,
    ) -> Option<Vec<Region>> {
        let length = (b - a).norm();
        if length <= self.fuzzy {
            return None;
        }
        let dir = (b - a) / length;
        let side = Vector2::new(-dir.y, dir.x);

        // Extent of the line inside the region, as distances from `a`
        let mut span: Option<(f64, f64)> = None;
        for contour in std::iter::once(&region.outer).chain(region.holes.iter()) {
            let n = contour.len();
            for i in 0..n {
                let (p, q) = (contour[i], contour[(i + 1) % n]);
                let (dp, dq) = ((p - a).dot(&side), (q - a).dot(&side));
                if (dp > self.fuzzy && dq > self.fuzzy) || (dp < -self.fuzzy && dq < -self.fuzzy) {
                    continue;
                }
                let hits = if (dp - dq).abs() <= self.fuzzy {
                    vec![p, q]
                } else {
                    vec![p + (q - p) * (dp / (dp - dq))]
                };
                for hit in hits {
                    let t = (hit - a).dot(&dir);
                    span = Some(match span {
                        Some((lo, hi)) => (lo.min(t), hi.max(t)),
                        None => (t, t),
                    });
                }
            }
        }
        let (lo, hi) = span?;
        if hi - lo <= self.fuzzy || hi < -self.fuzzy || lo > length + self.fuzzy {
            return None;
        }

        let (min, max) = region.bounds()?;
        let reach = (max - min).norm() + (a - min).norm() + length;
        let half = Region::new(
            vec![
                a - dir * reach,
                a + dir * reach,
                a + dir * reach + side * reach,
                a - dir * reach + side * reach,
            ],
            Vec::new(),
        );
        let single = [region.clone()];
        let left = planar::intersect(&single, std::slice::from_ref(&half));
        let right = planar::difference(&single, std::slice::from_ref(&half));
        if planar::total_area(&left) <= MIN_REGION_AREA
            || planar::total_area(&right) <= MIN_REGION_AREA
        {
            return None;
        }
        if lo < -self.fuzzy || hi > length + self.fuzzy {
            let message = "edge does not reach across a face piece; piece left whole".to_string();
            warn!("{message}");
            self.warnings.push(message);
            return None;
        }
        Some(left.into_iter().chain(right).collect())
    }

    /// Rebuilds solid and face pieces as shapes. Pieces touching along a
    /// common plane are imprinted on each other first, so they come out
    /// sharing the faces in the contact area.
    fn build_solids(
        &mut self,
        store: &mut ShapeStore,
        sewer: &mut Sewer,
        pieces: Vec<SolidPiece>,
        face_pieces: Vec<(PlaneFrame, Region, Labels, bool)>,
    ) -> Result<()> {
        let mut originals: Vec<Option<SolidKey>> = Vec::with_capacity(pieces.len());
        let mut labels: Vec<Labels> = Vec::with_capacity(pieces.len());
        let mut bounds: Vec<(Point3<f64>, Point3<f64>)> = Vec::with_capacity(pieces.len());
        let mut face_sets: Vec<Vec<PlanarFace>> = Vec::with_capacity(pieces.len() + 1);

        for piece in pieces {
            let polygons: Vec<Polygon3> = match &piece.geometry {
                SolidGeometry::Original(k) => store
                    .solid_face_triangles(*k)
                    .ok_or(KernelError::NotFound(Shape::Solid(*k)))?
                    .into_iter()
                    .flat_map(|(_, triangles)| triangles.into_iter().map(|t| t.to_vec()))
                    .collect(),
                SolidGeometry::Mesh(m) => mesh::csg_polygons(m),
            };
            face_sets.push(mesh::merge_coplanar(&polygons, self.fuzzy));
            originals.push(match piece.geometry {
                SolidGeometry::Original(k) => Some(k),
                SolidGeometry::Mesh(_) => None,
            });
            labels.push(piece.labels);
            bounds.push(piece.bounds);
        }

        let mut touched = vec![false; face_sets.len()];
        for j in 1..face_sets.len() {
            for i in 0..j {
                if !mesh::bounds_overlap(&bounds[i], &bounds[j], self.fuzzy) {
                    continue;
                }
                let (head, tail) = face_sets.split_at_mut(j);
                if imprint_coplanar(&mut head[i], &mut tail[0], self.fuzzy) {
                    touched[i] = true;
                    touched[j] = true;
                }
            }
        }
        let contacts = touched.iter().filter(|t| **t).count();
        if contacts > 0 {
            trace!(pieces = contacts, "solid pieces imprinted along shared planes");
        }

        face_sets.push(
            face_pieces
                .iter()
                .map(|(frame, region, _, _)| {
                    let (outer, holes) = region.to_3d(frame);
                    PlanarFace {
                        normal: frame.normal,
                        outer,
                        holes,
                    }
                })
                .collect(),
        );
        mesh::resolve_t_junctions(&mut face_sets, self.fuzzy);

        for (i, piece_labels) in labels.into_iter().enumerate() {
            match originals[i] {
                // Untouched arguments keep their own solid
                Some(solid) if !touched[i] => {
                    self.add_cell(Shape::Solid(solid), piece_labels, false);
                }
                _ => {
                    for solid in store.sew_planar_solids(sewer, &face_sets[i])? {
                        self.add_cell(Shape::Solid(solid), piece_labels.clone(), false);
                    }
                }
            }
        }
        if let Some(planar_faces) = face_sets.last() {
            for (face, (_, _, labels, covered)) in planar_faces.iter().zip(face_pieces) {
                match sewer.face(store, &face.outer, &face.holes) {
                    Ok((key, _)) => self.add_cell(Shape::Face(key), labels, covered),
                    Err(KernelError::DegenerateFace) => trace!("skipping degenerate face piece"),
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    /// Splits an edge argument where it meets other arguments and labels
    /// the sub-segments.
    #[allow(clippy::too_many_arguments)]
    fn split_edge(
        &self,
        store: &ShapeStore,
        arg: usize,
        edge: EdgeKey,
        edge_args: &[(usize, EdgeKey)],
        faces: &[FaceRef],
        solid_args: &[(usize, SolidKey)],
        vertex_args: &[(usize, VertexKey)],
    ) -> Result<Vec<(Point3<f64>, Point3<f64>, Labels, bool)>> {
        let (a, b) = store
            .edge_points(edge)
            .ok_or(KernelError::NotFound(Shape::Edge(edge)))?;
        let length = (b - a).norm();
        if length <= self.fuzzy {
            return Ok(Vec::new());
        }
        let tol = self.fuzzy;
        let mut params: Vec<f64> = vec![0.0, 1.0];

        for &(_, other) in edge_args {
            if other == edge {
                continue;
            }
            if let Some((c, d)) = store.edge_points(other) {
                params.extend(segment_crossings(&a, &b, &c, &d, tol));
            }
        }
        for face_ref in faces {
            let Some((normal, offset)) = store.face_plane(face_ref.face) else {
                continue;
            };
            let da = normal.dot(&a.coords) - offset;
            let db = normal.dot(&b.coords) - offset;
            if da.abs() <= tol && db.abs() <= tol {
                // In the face plane: split at the face boundary
                if let Some((outer, holes)) = store.face_loops(face_ref.face) {
                    for lp in std::iter::once(&outer).chain(holes.iter()) {
                        for i in 0..lp.len() {
                            let (c, d) = (lp[i], lp[(i + 1) % lp.len()]);
                            params.extend(segment_crossings(&a, &b, &c, &d, tol));
                        }
                    }
                }
            } else if (da > tol && db < -tol) || (da < -tol && db > tol) {
                let t = da / (da - db);
                let p = a + (b - a) * t;
                if store.classify_point_on_face(face_ref.face, &p, tol) != Some(Location::Out) {
                    params.push(t);
                }
            }
        }
        for &(_, v) in vertex_args {
            if let Some(p) = store.vertex_point(v) {
                if point_segment_distance(&p, &a, &b) <= tol {
                    params.push((p - a).dot(&(b - a)) / (length * length));
                }
            }
        }

        params.retain(|t| (0.0..=1.0).contains(t));
        params.sort_by(|x, y| x.total_cmp(y));
        params.dedup_by(|x, y| (*x - *y).abs() * length <= tol);
        if let Some(last) = params.last_mut() {
            *last = 1.0;
        }

        let mut pieces: Vec<(Point3<f64>, Point3<f64>, Labels, bool)> = Vec::new();
        for pair in params.windows(2) {
            let p = a + (b - a) * pair[0];
            let q = a + (b - a) * pair[1];
            let mid = nalgebra::center(&p, &q);
            let mut labels = Labels::from([arg]);
            let covered = self.containing_args(store, &mid, &[], faces, solid_args, &mut labels);
            for &(other_arg, other) in edge_args {
                if other == edge {
                    continue;
                }
                if let Some((c, d)) = store.edge_points(other) {
                    if point_segment_distance(&mid, &c, &d) <= tol {
                        labels.insert(other_arg);
                    }
                }
            }
            // Every parameter comes from another shape touching the edge,
            // so neighbouring segments stay apart even with equal labels
            pieces.push((p, q, labels, covered));
        }
        Ok(pieces)
    }

    /// Adds the arguments containing `p` to `labels`. Only arguments of
    /// higher dimension than the cell are passed in, so any hit means the
    /// cell is covered.
    fn containing_args(
        &self,
        store: &ShapeStore,
        p: &Point3<f64>,
        edge_args: &[(usize, EdgeKey)],
        faces: &[FaceRef],
        solid_args: &[(usize, SolidKey)],
        labels: &mut Labels,
    ) -> bool {
        let tol = self.fuzzy;
        let mut covered = false;
        for &(edge_arg, edge) in edge_args {
            if let Some((c, d)) = store.edge_points(edge) {
                if point_segment_distance(p, &c, &d) <= tol {
                    labels.insert(edge_arg);
                    covered = true;
                }
            }
        }
        for face_ref in faces.iter().filter(|f| f.free) {
            if store.classify_point_on_face(face_ref.face, p, tol) != Some(Location::Out) {
                labels.insert(face_ref.arg);
                covered = true;
            }
        }
        for &(solid_arg, solid) in solid_args {
            if store.classify_point_in_solid(solid, p, tol) != Some(Location::Out) {
                labels.insert(solid_arg);
                covered = true;
            }
        }
        covered
    }
}

/// Lowest-level parts of an argument: solids, faces outside those solids,
/// edges outside those faces, vertices outside those edges.
fn collect_primitives(store: &ShapeStore, shape: Shape) -> Primitives {
    let mut prim = Primitives::default();
    let mut bound_faces: BTreeSet<Shape> = BTreeSet::new();
    for s in store.sub_shapes(shape, ShapeKind::Solid) {
        if let Shape::Solid(k) = s {
            prim.solids.push(k);
            bound_faces.extend(store.sub_shapes(s, ShapeKind::Face));
        }
    }
    let mut bound_edges: BTreeSet<Shape> = BTreeSet::new();
    for f in store.sub_shapes(shape, ShapeKind::Face) {
        bound_edges.extend(store.sub_shapes(f, ShapeKind::Edge));
        if let Shape::Face(k) = f {
            if !bound_faces.contains(&f) {
                prim.faces.push(k);
            }
        }
    }
    let mut bound_vertices: BTreeSet<Shape> = BTreeSet::new();
    for e in store.sub_shapes(shape, ShapeKind::Edge) {
        bound_vertices.extend(store.sub_shapes(e, ShapeKind::Vertex));
        if let Shape::Edge(k) = e {
            if !bound_edges.contains(&e) {
                prim.edges.push(k);
            }
        }
    }
    for v in store.sub_shapes(shape, ShapeKind::Vertex) {
        if let Shape::Vertex(k) = v {
            if !bound_vertices.contains(&v) {
                prim.vertices.push(k);
            }
        }
    }
    prim
}

/// Splits the coplanar faces of two face sets along each other's outlines,
/// so their overlap comes out as the same polygons on both sides. `false`
/// when no face of one set overlaps a face of the other.
fn imprint_coplanar(a: &mut Vec<PlanarFace>, b: &mut Vec<PlanarFace>, tolerance: f64) -> bool {
    let split_a: Vec<Option<Vec<PlanarFace>>> =
        a.iter().map(|f| imprint_face(f, b, tolerance)).collect();
    if split_a.iter().all(Option::is_none) {
        return false;
    }
    let split_b: Vec<Option<Vec<PlanarFace>>> =
        b.iter().map(|f| imprint_face(f, a, tolerance)).collect();

    for (faces, splits) in [(a, split_a), (b, split_b)] {
        let old = std::mem::take(faces);
        for (face, split) in old.into_iter().zip(splits) {
            match split {
                Some(pieces) => faces.extend(pieces),
                None => faces.push(face),
            }
        }
    }
    true
}

/// Pieces of `face` inside and outside the coplanar faces of `others`.
fn imprint_face(face: &PlanarFace, others: &[PlanarFace], tolerance: f64) -> Option<Vec<PlanarFace>> {
    let frame = PlaneFrame::new(*face.outer.first()?, face.normal);
    let region = [planar::project_loops(&frame, &face.outer, &face.holes)];

    let mut common: Vec<Region> = Vec::new();
    let mut clip: Vec<Region> = Vec::new();
    for other in others {
        let Some(first) = other.outer.first() else {
            continue;
        };
        if !frame.is_coplanar(&other.normal, other.normal.dot(&first.coords), tolerance) {
            continue;
        }
        let projected = planar::project_loops(&frame, &other.outer, &other.holes);
        let overlap = planar::intersect(&region, std::slice::from_ref(&projected));
        if planar::total_area(&overlap) <= MIN_REGION_AREA {
            continue;
        }
        common.extend(overlap);
        clip.push(projected);
    }
    if common.is_empty() {
        return None;
    }

    let rest = planar::difference(&region, &clip);
    Some(
        common
            .into_iter()
            .chain(rest)
            .filter(|r| r.area() > MIN_REGION_AREA)
            .map(|r| {
                let (outer, holes) = r.to_3d(&frame);
                PlanarFace {
                    normal: face.normal,
                    outer,
                    holes,
                }
            })
            .collect(),
    )
}

fn piece_mesh(store: &ShapeStore, piece: &SolidPiece) -> Result<CsgMesh> {
    match &piece.geometry {
        SolidGeometry::Original(k) => Ok(mesh::triangles_to_csg(
            &store
                .solid_triangles(*k)
                .ok_or(KernelError::NotFound(Shape::Solid(*k)))?,
        )),
        SolidGeometry::Mesh(m) => Ok(m.clone()),
    }
}

fn mesh_piece(geometry: CsgMesh, labels: Labels, eps: f64) -> Option<SolidPiece> {
    let polygons = mesh::csg_polygons(&geometry);
    let volume = mesh::polygons_volume(&polygons);
    if volume <= eps {
        return None;
    }
    let bounds = mesh::points_bounds(polygons.iter().flatten())?;
    Some(SolidPiece {
        geometry: SolidGeometry::Mesh(geometry),
        labels,
        bounds,
        volume,
    })
}

fn plane_crosses_bounds(
    frame: &PlaneFrame,
    bounds: &(Point3<f64>, Point3<f64>),
    tolerance: f64,
) -> bool {
    let (min, max) = bounds;
    let mut above = false;
    let mut below = false;
    for i in 0..8 {
        let corner = Point3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        );
        let d = frame.distance(&corner);
        above |= d > tolerance;
        below |= d < -tolerance;
    }
    above && below
}

/// Parameters along `a`–`b` where the segment `c`–`d` touches it.
pub(crate) fn segment_crossings(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    tolerance: f64,
) -> Vec<f64> {
    let ab = b - a;
    let cd = d - c;
    let len_sq = ab.norm_squared();
    let mut out = Vec::new();
    if len_sq <= tolerance * tolerance {
        return out;
    }

    // Endpoints of the other segment lying on this one
    for p in [c, d] {
        if point_segment_distance(p, a, b) <= tolerance {
            out.push((p - a).dot(&ab) / len_sq);
        }
    }

    // Transversal crossing
    let r = a - c;
    let e = cd.norm_squared();
    let f = cd.dot(&r);
    let bb = ab.dot(&cd);
    let denom = len_sq * e - bb * bb;
    if denom > 1e-12 * len_sq * e.max(1e-30) {
        let cc = ab.dot(&r);
        let s = ((bb * f - cc * e) / denom).clamp(0.0, 1.0);
        let t = ((bb * s + f) / e).clamp(0.0, 1.0);
        let p = a + ab * s;
        let q = c + cd * t;
        if (p - q).norm() <= tolerance {
            out.push(s);
        }
    }
    out
}

/// Groups shapes that share a sub-shape of `kind`. Returns indices.
pub(crate) fn group_by_shared(
    store: &ShapeStore,
    shapes: &[Shape],
    kind: ShapeKind,
) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..shapes.len()).collect();
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut owner: FxHashMap<Shape, usize> = FxHashMap::default();
    for (i, &shape) in shapes.iter().enumerate() {
        for sub in store.sub_shapes(shape, kind) {
            match owner.get(&sub) {
                Some(&j) => {
                    let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                    if ri != rj {
                        parent[ri] = rj;
                    }
                }
                None => {
                    owner.insert(sub, i);
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut index: FxHashMap<usize, usize> = FxHashMap::default();
    for i in 0..shapes.len() {
        let r = root(&mut parent, i);
        let g = *index.entry(r).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[g].push(i);
    }
    groups
}

/// Builds the container compound for a set of cells.
impl ShapeStore {
    /// Groups shapes into containers inside one compound, the way
    /// [`CellsBuilder::make_containers`] assembles a selection.
    pub fn make_containers(&mut self, shapes: &[Shape]) -> Result<Option<Shape>> {
        for &shape in shapes {
            self.ensure(shape)?;
        }
        assemble(self, shapes)
    }
}

fn assemble(store: &mut ShapeStore, cells: &[Shape]) -> Result<Option<Shape>> {
    if cells.is_empty() {
        return Ok(None);
    }
    let kept: Vec<Shape> = cells
        .iter()
        .copied()
        .filter(|s| {
            !cells
                .iter()
                .any(|o| o.kind() > s.kind() && store.is_sub_shape(*s, *o))
        })
        .collect();

    let mut members: Vec<Shape> = Vec::new();
    for (kind, shared) in [
        (ShapeKind::Solid, ShapeKind::Face),
        (ShapeKind::Face, ShapeKind::Edge),
        (ShapeKind::Edge, ShapeKind::Vertex),
    ] {
        let of_kind: Vec<Shape> = kept.iter().copied().filter(|s| s.kind() == kind).collect();
        for group in group_by_shared(store, &of_kind, shared) {
            if group.len() == 1 {
                members.push(of_kind[group[0]]);
                continue;
            }
            let container = match kind {
                ShapeKind::Solid => {
                    let solids: Vec<SolidKey> = group
                        .iter()
                        .filter_map(|&i| match of_kind[i] {
                            Shape::Solid(k) => Some(k),
                            _ => None,
                        })
                        .collect();
                    Shape::CompSolid(store.add_comp_solid(&solids)?)
                }
                ShapeKind::Face => {
                    let faces: Vec<FaceKey> = group
                        .iter()
                        .filter_map(|&i| match of_kind[i] {
                            Shape::Face(k) => Some(k),
                            _ => None,
                        })
                        .collect();
                    Shape::Shell(store.add_shell(&faces)?)
                }
                _ => {
                    let edges: Vec<EdgeKey> = group
                        .iter()
                        .filter_map(|&i| match of_kind[i] {
                            Shape::Edge(k) => Some(k),
                            _ => None,
                        })
                        .collect();
                    Shape::Wire(store.add_wire(&edges)?)
                }
            };
            members.push(container);
        }
    }
    members.extend(kept.iter().copied().filter(|s| {
        !matches!(
            s.kind(),
            ShapeKind::Solid | ShapeKind::Face | ShapeKind::Edge
        )
    }));
    store.add_compound(&members).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn offset_cubes(store: &mut ShapeStore) -> CellsBuilder {
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]).unwrap();
        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(a));
        builder.add_argument(Shape::Solid(b));
        builder.perform(store);
        builder
    }

    fn total_volume(store: &ShapeStore, shape: Shape) -> f64 {
        store
            .sub_shapes(shape, ShapeKind::Solid)
            .into_iter()
            .filter_map(|s| match s {
                Shape::Solid(k) => store.solid_volume(k),
                _ => None,
            })
            .sum()
    }

    #[test]
    fn offset_cubes_make_three_cells() {
        let mut store = ShapeStore::new();
        let builder = offset_cubes(&mut store);
        assert!(!builder.has_errors(), "{}", builder.dump_errors());

        let solids: Vec<_> = builder
            .cells()
            .filter(|(c, _)| c.kind() == ShapeKind::Solid)
            .collect();
        assert_eq!(solids.len(), 3);
        let shared = solids.iter().filter(|(_, l)| l.len() == 2).count();
        assert_eq!(shared, 1);
    }

    #[test]
    fn difference_selection() {
        let mut store = ShapeStore::new();
        let mut builder = offset_cubes(&mut store);
        builder.add_to_result(&[0], &[1]);

        let result = builder.make_containers(&mut store).unwrap().unwrap();
        assert_relative_eq!(total_volume(&store, result), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn all_cells_form_comp_solid() {
        let mut store = ShapeStore::new();
        let mut builder = offset_cubes(&mut store);
        builder.add_all_to_result();

        let result = builder.make_containers(&mut store).unwrap().unwrap();
        let comp_solids = store.sub_shapes(result, ShapeKind::CompSolid);
        assert_eq!(comp_solids.len(), 1);
        assert_eq!(store.sub_shapes(comp_solids[0], ShapeKind::Solid).len(), 3);
        assert_relative_eq!(total_volume(&store, result), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn fused_cells_melt_into_one_solid() {
        let mut store = ShapeStore::new();
        let mut builder = offset_cubes(&mut store);
        builder.add_all_to_result();

        let result = builder.make_fused(&mut store).unwrap().unwrap();
        let solids = store.sub_shapes(result, ShapeKind::Solid);
        assert_eq!(solids.len(), 1);
        assert_eq!(store.sub_shapes(solids[0], ShapeKind::Face).len(), 6);
        assert_relative_eq!(total_volume(&store, result), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn identical_solids_collapse() {
        let mut store = ShapeStore::new();
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(a));
        builder.add_argument(Shape::Solid(a));
        builder.perform(&mut store);

        builder.add_to_result(&[0], &[1]);
        assert!(builder.make_containers(&mut store).unwrap().is_none());
    }

    #[test]
    fn spanning_face_slices_solid() {
        let mut store = ShapeStore::new();
        let (cell, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let cutter = store
            .add_face_by_coords(&[
                [-1.0, -1.0, 0.25],
                [2.0, -1.0, 0.25],
                [2.0, 2.0, 0.25],
                [-1.0, 2.0, 0.25],
            ])
            .unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(cell));
        builder.add_argument(Shape::Face(cutter));
        builder.perform(&mut store);
        assert!(!builder.has_errors(), "{}", builder.dump_errors());
        assert!(!builder.has_warnings());

        builder.add_to_result(&[0], &[]);
        let result = builder.make_containers(&mut store).unwrap().unwrap();
        let comp_solids = store.sub_shapes(result, ShapeKind::CompSolid);
        assert_eq!(comp_solids.len(), 1);
        assert_eq!(store.sub_shapes(result, ShapeKind::Solid).len(), 2);
        assert_eq!(store.sub_shapes(result, ShapeKind::Face).len(), 11);
        assert_relative_eq!(total_volume(&store, result), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn partial_face_leaves_solid_whole() {
        let mut store = ShapeStore::new();
        let (cell, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let cutter = store
            .add_face_by_coords(&[
                [-1.0, -1.0, 0.5],
                [0.5, -1.0, 0.5],
                [0.5, 2.0, 0.5],
                [-1.0, 2.0, 0.5],
            ])
            .unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(cell));
        builder.add_argument(Shape::Face(cutter));
        builder.perform(&mut store);
        assert!(builder.has_warnings());

        let solids = builder
            .cells()
            .filter(|(c, _)| c.kind() == ShapeKind::Solid)
            .count();
        assert_eq!(solids, 1);
    }

    #[test]
    fn crossing_edges_are_split() {
        let mut store = ShapeStore::new();
        let a0 = store.add_vertex(0.0, 0.0, 0.0);
        let a1 = store.add_vertex(2.0, 0.0, 0.0);
        let b0 = store.add_vertex(1.0, -1.0, 0.0);
        let b1 = store.add_vertex(1.0, 1.0, 0.0);
        let ea = store.add_edge(a0, a1).unwrap();
        let eb = store.add_edge(b0, b1).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Edge(ea));
        builder.add_argument(Shape::Edge(eb));
        builder.perform(&mut store);

        let edges = builder
            .cells()
            .filter(|(c, _)| c.kind() == ShapeKind::Edge)
            .count();
        assert_eq!(edges, 4);

        builder.add_all_to_result();
        let result = builder.make_containers(&mut store).unwrap().unwrap();
        // Four edges meeting at the crossing form one wire
        assert_eq!(store.sub_shapes(result, ShapeKind::Wire).len(), 1);
    }

    #[test]
    fn edge_piercing_face_is_split() {
        let mut store = ShapeStore::new();
        let face = store
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])
            .unwrap();
        let v0 = store.add_vertex(0.5, 0.5, -1.0);
        let v1 = store.add_vertex(0.5, 0.5, 1.0);
        let edge = store.add_edge(v0, v1).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Face(face));
        builder.add_argument(Shape::Edge(edge));
        builder.perform(&mut store);
        assert!(!builder.has_errors(), "{}", builder.dump_errors());

        let mut lengths: Vec<f64> = builder
            .cells()
            .filter_map(|(c, _)| match c {
                Shape::Edge(k) => store.edge_length(k),
                _ => None,
            })
            .collect();
        lengths.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(lengths.len(), 2);
        assert_relative_eq!(lengths[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(lengths[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn face_is_cut_by_edge_across_it() {
        let mut store = ShapeStore::new();
        let face = store
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])
            .unwrap();
        let v0 = store.add_vertex(0.5, -1.0, 0.0);
        let v1 = store.add_vertex(0.5, 2.0, 0.0);
        let edge = store.add_edge(v0, v1).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Face(face));
        builder.add_argument(Shape::Edge(edge));
        builder.perform(&mut store);
        assert!(!builder.has_errors(), "{}", builder.dump_errors());
        assert!(!builder.has_warnings());

        let halves: Vec<f64> = builder
            .cells()
            .filter_map(|(c, _)| match c {
                Shape::Face(k) => store.face_area(k),
                _ => None,
            })
            .collect();
        assert_eq!(halves.len(), 2);
        assert!(halves.iter().all(|a| (a - 0.5).abs() < 1e-9));

        builder.add_to_result(&[0], &[]);
        let result = builder.make_containers(&mut store).unwrap().unwrap();
        // Both halves share the cut edge
        let shells = store.sub_shapes(result, ShapeKind::Shell);
        assert_eq!(shells.len(), 1);
        assert_eq!(store.sub_shapes(shells[0], ShapeKind::Face).len(), 2);
    }

    #[test]
    fn short_edge_leaves_face_whole() {
        let mut store = ShapeStore::new();
        let face = store
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])
            .unwrap();
        let v0 = store.add_vertex(0.5, -1.0, 0.0);
        let v1 = store.add_vertex(0.5, 0.5, 0.0);
        let edge = store.add_edge(v0, v1).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Face(face));
        builder.add_argument(Shape::Edge(edge));
        builder.perform(&mut store);
        assert!(builder.has_warnings());
        let faces = builder
            .cells()
            .filter(|(c, _)| c.kind() == ShapeKind::Face)
            .count();
        assert_eq!(faces, 1);
    }

    #[test]
    fn touching_solids_share_their_wall() {
        let mut store = ShapeStore::new();
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(a));
        builder.add_argument(Shape::Solid(b));
        builder.perform(&mut store);
        assert!(!builder.has_errors(), "{}", builder.dump_errors());

        builder.add_all_to_result();
        let result = builder.make_containers(&mut store).unwrap().unwrap();
        let comp_solids = store.sub_shapes(result, ShapeKind::CompSolid);
        assert_eq!(comp_solids.len(), 1);
        assert_eq!(store.sub_shapes(comp_solids[0], ShapeKind::Solid).len(), 2);
        assert_eq!(store.sub_shapes(comp_solids[0], ShapeKind::Face).len(), 11);
        assert_relative_eq!(total_volume(&store, result), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn partly_touching_solids_share_the_contact() {
        let mut store = ShapeStore::new();
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([1.0, 0.0, 0.0], [2.0, 0.5, 1.0]).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(a));
        builder.add_argument(Shape::Solid(b));
        builder.perform(&mut store);
        assert!(!builder.has_errors(), "{}", builder.dump_errors());

        builder.add_all_to_result();
        let result = builder.make_containers(&mut store).unwrap().unwrap();
        let comp_solids = store.sub_shapes(result, ShapeKind::CompSolid);
        assert_eq!(comp_solids.len(), 1);
        let shared: Vec<Shape> = store
            .sub_shapes(comp_solids[0], ShapeKind::Face)
            .into_iter()
            .filter(|&f| store.ancestors(f, comp_solids[0], ShapeKind::Solid).len() == 2)
            .collect();
        assert_eq!(shared.len(), 1);
        let Shape::Face(wall) = shared[0] else {
            panic!("expected face");
        };
        assert_relative_eq!(store.face_area(wall).unwrap(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(total_volume(&store, result), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn touching_solids_fuse_into_one() {
        let mut store = ShapeStore::new();
        let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let (b, _, _) = store.make_box([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]).unwrap();
        let fused = store
            .fuse(&[Shape::Solid(a)], &[Shape::Solid(b)], 1e-6)
            .unwrap()
            .unwrap();
        assert_eq!(store.sub_shapes(fused, ShapeKind::Solid).len(), 1);
        assert_relative_eq!(total_volume(&store, fused), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn edge_through_solid_is_labelled_inside() {
        let mut store = ShapeStore::new();
        let (cell, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let v0 = store.add_vertex(-1.0, 0.5, 0.5);
        let v1 = store.add_vertex(2.0, 0.5, 0.5);
        let edge = store.add_edge(v0, v1).unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Solid(cell));
        builder.add_argument(Shape::Edge(edge));
        builder.perform(&mut store);

        let edges: Vec<_> = builder
            .cells()
            .filter(|(c, _)| c.kind() == ShapeKind::Edge)
            .collect();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges.iter().filter(|(_, l)| l.len() == 2).count(), 1);
    }

    #[test]
    fn coplanar_faces_overlay() {
        let mut store = ShapeStore::new();
        let a = store
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]])
            .unwrap();
        let b = store
            .add_face_by_coords(&[[1.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 2.0, 0.0], [1.0, 2.0, 0.0]])
            .unwrap();

        let mut builder = CellsBuilder::new(1e-6);
        builder.add_argument(Shape::Face(a));
        builder.add_argument(Shape::Face(b));
        builder.perform(&mut store);

        let faces: Vec<_> = builder
            .cells()
            .filter(|(c, _)| c.kind() == ShapeKind::Face)
            .collect();
        assert_eq!(faces.len(), 3);

        builder.add_all_to_result();
        let fused = builder.make_fused(&mut store).unwrap().unwrap();
        let merged = store.sub_shapes(fused, ShapeKind::Face);
        assert_eq!(merged.len(), 1);
        let Shape::Face(fk) = merged[0] else {
            panic!("expected face");
        };
        assert_relative_eq!(store.face_area(fk).unwrap(), 6.0, epsilon = 1e-9);
    }
}
