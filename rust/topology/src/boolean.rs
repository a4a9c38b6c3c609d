// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boolean orchestration.
//!
//! Every operation follows the same pipeline:
//!
//! 1. expand both operands into kernel arguments (a cluster or cell complex
//!    contributes its members, anything else contributes itself);
//! 2. decompose them with the kernel and select cells by argument label,
//!    or call a regular fuse/common/section;
//! 3. assemble the selection into containers, simplify, drop members that
//!    are contained in a sibling, simplify again;
//! 4. deep-copy the result and migrate contents (and optionally
//!    dictionaries) from both operands onto its nearest sub-shapes.
//!
//! A missing second operand returns the first one unchanged.

use nmt_kernel::{CellsBuilder, KernelError, Shape, ShapeKind};
use rustc_hash::FxHashSet;
use tracing::{debug, debug_span, trace, warn};

use crate::dictionary::CopyMode;
use crate::error::{Error, Result};
use crate::keys::{TopologyType, TypeFilter};
use crate::model::Model;
use crate::topology::Topology;

/// Kinds whose attributes follow a boolean result.
const TRANSFER_KINDS: [TopologyType; 5] = [
    TopologyType::Vertex,
    TopologyType::Edge,
    TopologyType::Face,
    TopologyType::Cell,
    TopologyType::CellComplex,
];

/// Cell selection over a decomposition of `a.len() + b.len()` arguments,
/// A first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Difference,
    Impose,
    Imprint,
    Merge,
    Slice,
    Xor,
}

impl Selection {
    fn apply(self, builder: &mut CellsBuilder, a: usize, b: usize) {
        let a_args: Vec<usize> = (0..a).collect();
        let b_args: Vec<usize> = (a..a + b).collect();
        match self {
            Selection::Difference => {
                for &i in &a_args {
                    builder.add_to_result(&[i], &b_args);
                }
            }
            Selection::Impose => {
                for &i in &a_args {
                    builder.add_to_result(&[i], &b_args);
                }
                for &j in &b_args {
                    builder.add_to_result(&[j], &[]);
                }
            }
            Selection::Imprint => {
                for &i in &a_args {
                    for &j in &b_args {
                        builder.add_to_result(&[i, j], &[]);
                    }
                }
                for &i in &a_args {
                    builder.add_to_result(&[i], &b_args);
                }
            }
            Selection::Merge => {
                for i in a_args.iter().chain(&b_args) {
                    builder.add_to_result(&[*i], &[]);
                }
            }
            Selection::Slice => {
                for &i in &a_args {
                    builder.add_to_result(&[i], &[]);
                }
            }
            Selection::Xor => {
                for &i in &a_args {
                    builder.add_to_result(&[i], &b_args);
                }
                for &j in &b_args {
                    builder.add_to_result(&[j], &a_args);
                }
            }
        }
    }

    /// Whether the second operand's contents follow the result.
    fn transfers_tool_contents(self) -> bool {
        self != Selection::Slice
    }
}

impl Model {
    // --- Operations ---

    /// Parts of `a` outside `b`.
    pub fn difference(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("difference").entered();
        self.non_regular(a, b, Selection::Difference, transfer_dictionary)
    }

    /// `a` with `b` imposed: the parts of `a` outside `b`, plus all of `b`.
    pub fn impose(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("impose").entered();
        self.non_regular(a, b, Selection::Impose, transfer_dictionary)
    }

    /// `a` split wherever `b` overlaps it. Nothing of `b` outside `a` is
    /// kept.
    pub fn imprint(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("imprint").entered();
        self.non_regular(a, b, Selection::Imprint, transfer_dictionary)
    }

    /// Both operands decomposed against each other, with every piece kept.
    pub fn merge(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("merge").entered();
        self.non_regular(a, b, Selection::Merge, transfer_dictionary)
    }

    /// `a` cut into pieces by `b`. Only the contents of `a` follow.
    pub fn slice(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("slice").entered();
        self.non_regular(a, b, Selection::Slice, transfer_dictionary)
    }

    /// Parts lying in exactly one of the operands.
    pub fn xor(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("xor").entered();
        self.non_regular(a, b, Selection::Xor, transfer_dictionary)
    }

    /// Regular union: overlapping and touching cells melt into one.
    pub fn union(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("union").entered();
        let Some(b) = b else {
            return self.unchanged(a).map(Some);
        };
        let (args_a, args_b) = self.operands(a, b)?;
        let fused = self.store.fuse(&args_a, &args_b, self.config.fuzzy)?;
        self.finish_boolean(a, Some(b), fused, true, transfer_dictionary)
    }

    /// Regular intersection merged with the boundary section, so lower
    /// dimensional overlap (an edge crossing a face) is kept. `None` when
    /// the operands do not meet.
    pub fn intersect(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let _span = debug_span!("intersect").entered();
        let Some(b) = b else {
            return self.unchanged(a).map(Some);
        };
        let (args_a, args_b) = self.operands(a, b)?;
        let common = self.store.common(&args_a, &args_b, self.config.fuzzy)?;
        let section = self.store.section(&args_a, &args_b, self.config.tolerance)?;
        let common = common.filter(|s| !self.practically_empty(*s));
        let section = section.filter(|s| !self.practically_empty(*s));
        debug!(
            common = common.is_some(),
            section = section.is_some(),
            "intersection legs"
        );

        let combined = match (common, section) {
            (None, None) => return Ok(None),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (Some(common), Some(section)) => {
                let left = self.expand(common);
                let right = self.expand(section);
                let builder = self.decompose(&left, &right, Selection::Merge)?;
                builder.make_containers(&mut self.store)?
            }
        };
        self.finish_boolean(a, Some(b), combined, true, transfer_dictionary)
    }

    /// Decomposes the members of `topology` against each other and rebuilds
    /// closed regions as cells. Returns `topology`'s members as a cluster
    /// when the decomposition reports problems.
    pub fn self_merge(&mut self, topology: Topology) -> Result<Option<Topology>> {
        let _span = debug_span!("self_merge").entered();
        let shape = topology.shape();
        self.store.ensure(shape)?;
        let children = if shape.kind().is_container() {
            self.store.children(shape)
        } else {
            vec![shape]
        };

        let mut builder = CellsBuilder::new(self.config.fuzzy);
        for &child in &children {
            builder.add_argument(child);
        }
        builder.perform(&mut self.store);
        if builder.has_errors() || builder.has_warnings() {
            warn!(
                errors = %builder.dump_errors(),
                warnings = %builder.dump_warnings(),
                "self-merge decomposition failed, returning the members as a cluster"
            );
            let cluster = self.store.add_compound(&children)?;
            let wrapped = self.wrap(cluster);
            return Ok(Some(wrapped));
        }
        builder.add_all_to_result();

        let selection = builder.selection();
        let faces: Vec<_> = selection
            .iter()
            .filter_map(|s| match s {
                Shape::Face(k) => Some(*k),
                _ => None,
            })
            .collect();
        let volumes = self.store.make_volumes(&faces, self.config.tolerance)?;
        debug!(
            cells = volumes.solids.len(),
            unused_faces = volumes.unused.len(),
            "self-merge volumes"
        );

        let mut args: Vec<Shape> = volumes.solids.iter().map(|&s| Shape::Solid(s)).collect();
        args.extend(volumes.unused.iter().map(|&f| Shape::Face(f)));
        args.extend(
            selection
                .iter()
                .copied()
                .filter(|s| s.kind() != ShapeKind::Face && s.kind() != ShapeKind::Solid),
        );

        let assembled = self.store.make_containers(&args)?;
        let processed = match assembled {
            Some(shape) => self.postprocess(shape)?,
            None => None,
        };
        let Some(result) = processed else {
            return Ok(None);
        };
        let fixed = self.store.fix(result)?;
        let wrapped = self.wrap(fixed);
        let copy = self.deep_copy(wrapped)?;
        self.deep_copy_attributes(shape, copy.shape());
        self.transfer_contents(shape, copy)?;
        Ok(Some(copy))
    }

    /// Slices `topology` with `tool` and records each piece of the same kind
    /// as a content of `topology`. Only cells, faces and edges divide.
    /// Returns a deep copy of the outermost single-context ancestor.
    pub fn divide(
        &mut self,
        topology: Topology,
        tool: Option<Topology>,
        transfer_dictionary: bool,
    ) -> Result<Topology> {
        let _span = debug_span!("divide").entered();
        let kind = topology.kind();
        if ![TopologyType::Cell, TopologyType::Face, TopologyType::Edge].contains(&kind) {
            return Err(Error::precondition(format!(
                "Only cells, faces and edges can be divided, not a {kind}."
            )));
        }
        let Some(tool) = tool else {
            return self.unchanged(topology);
        };
        let Some(pieces) = self.slice(topology, Some(tool), false)? else {
            return Err(Error::precondition("Slicing left nothing to divide."));
        };

        let kind = topology.shape().kind();
        let found = self.store.sub_shapes(pieces.shape(), kind);
        debug!(pieces = found.len(), "divided");
        for piece in found {
            if piece == topology.shape() {
                continue;
            }
            let piece = self.wrap(piece);
            self.add_content(topology, piece)?;
        }

        let root = self.track_context_ancestor(topology);
        let result = self.deep_copy(root)?;
        if transfer_dictionary {
            self.boolean_transfer_dictionary(topology, None, result, false);
        }
        Ok(result)
    }

    /// Follows single contexts upwards to the outermost host. Stops at the
    /// first topology with zero or several contexts.
    pub fn track_context_ancestor(&self, topology: Topology) -> Topology {
        let mut current = topology;
        let mut visited = vec![current.shape()];
        loop {
            let contexts = self.relations.contexts(current.shape());
            let [context] = contexts else {
                return current;
            };
            if visited.contains(&context.host.shape()) {
                return current;
            }
            current = context.host;
            visited.push(current.shape());
        }
    }

    // --- Post-processing ---

    /// The simplest form of `topology`: containers with one member collapse
    /// to that member, recursively. `None` for an empty container.
    pub fn simplify(&mut self, topology: Topology) -> Result<Option<Topology>> {
        self.store.ensure(topology.shape())?;
        match self.simplest(topology.shape())? {
            Some(shape) if shape == topology.shape() => Ok(Some(topology)),
            Some(shape) => Ok(Some(self.wrap(shape))),
            None => Ok(None),
        }
    }

    /// Cluster members that are not already part of a sibling. Other kinds
    /// are returned as they are. `None` when the cluster is empty.
    pub fn sub_topology_containment(&mut self, topology: Topology) -> Result<Option<Topology>> {
        self.store.ensure(topology.shape())?;
        match self.containment(topology.shape())? {
            Some(shape) if shape == topology.shape() => Ok(Some(topology)),
            Some(shape) => Ok(Some(self.wrap(shape))),
            None => Ok(None),
        }
    }

    pub(crate) fn simplest(&mut self, shape: Shape) -> Result<Option<Shape>> {
        if !shape.kind().is_container() {
            return Ok(Some(shape));
        }
        let children = self.store.children(shape);
        match children.len() {
            0 => Ok(None),
            1 => Ok(Some(self.descend(shape))),
            _ if shape.kind() != ShapeKind::Compound => Ok(Some(shape)),
            _ => {
                let members: Vec<Shape> = children.iter().map(|&c| self.descend(c)).collect();
                if members == children {
                    return Ok(Some(shape));
                }
                // A fresh compound keeps the input intact
                Ok(Some(self.store.add_compound(&members)?))
            }
        }
    }

    /// Walks down through containers holding exactly one member.
    fn descend(&self, mut shape: Shape) -> Shape {
        while shape.kind().is_container() {
            match self.store.children(shape).as_slice() {
                [only] => shape = *only,
                _ => break,
            }
        }
        shape
    }

    fn containment(&mut self, shape: Shape) -> Result<Option<Shape>> {
        if shape.kind() != ShapeKind::Compound {
            return Ok(Some(shape));
        }
        let members = self.store.children(shape);
        if members.is_empty() {
            return Ok(None);
        }
        let kept: Vec<Shape> = members
            .iter()
            .copied()
            .filter(|&m| {
                !members.iter().any(|&other| {
                    other != m && self.store.sub_shapes(other, m.kind()).contains(&m)
                })
            })
            .collect();
        if kept.len() == members.len() {
            return Ok(Some(shape));
        }
        trace!(dropped = members.len() - kept.len(), "contained members");
        if kept.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.store.add_compound(&kept)?))
    }

    fn postprocess(&mut self, shape: Shape) -> Result<Option<Shape>> {
        let Some(simple) = self.simplest(shape)? else {
            return Ok(None);
        };
        let Some(contained) = self.containment(simple)? else {
            return Ok(None);
        };
        self.simplest(contained)
    }

    // --- Migration ---

    /// Moves every content under `origin` onto the nearest sub-shape of
    /// `result` of a kind its hosts had. Contents with no match land on
    /// `result` itself.
    pub(crate) fn transfer_contents(&mut self, origin: Shape, result: Topology) -> Result<()> {
        let mut moved: FxHashSet<Shape> = FxHashSet::default();
        for content in self.sub_contents_of(origin) {
            if !moved.insert(content.shape()) {
                continue;
            }
            let mut filter = TypeFilter::NONE;
            for context in self.contexts(content) {
                filter |= context.host.structural_kind();
                self.remove_content(context.host, content);
            }

            let host = self.nearest_host(result, content, filter)?;
            let host = match host {
                Some(host) => host,
                None => {
                    warn!(%content, %result, "no matching host for content, attaching to the result");
                    result
                }
            };
            if host.shape() == content.shape() {
                continue;
            }
            self.add_content(host, content)?;
        }
        Ok(())
    }

    fn nearest_host(
        &mut self,
        result: Topology,
        content: Topology,
        filter: TypeFilter,
    ) -> Result<Option<Topology>> {
        if filter.is_empty() || filter.contains(result.structural_kind()) {
            return Ok(Some(result));
        }
        let centre = self.center_of_mass(content)?;
        let found = if filter.contains(TopologyType::Cell) {
            self.host_cell(result.shape(), &centre)
        } else {
            None
        };
        let found = found.or_else(|| {
            self.select_sub_shape(
                result.shape(),
                &centre,
                filter & TypeFilter::SELECTABLE,
                f64::MAX,
            )
        });
        Ok(found.map(|s| self.wrap(s)))
    }

    /// Merges onto every vertex, edge, face, cell and cell complex of
    /// `result` the attributes of the operand sub-shape of the same kind
    /// lying within the transfer distance of its centre of mass. With
    /// `clear`, the result's own attributes are dropped first.
    pub fn boolean_transfer_dictionary(
        &mut self,
        origin: Topology,
        other: Option<Topology>,
        result: Topology,
        clear: bool,
    ) {
        let threshold = self.config.transfer_distance;
        let origins: Vec<Shape> = std::iter::once(origin.shape())
            .chain(other.map(|o| o.shape()))
            .collect();

        for ty in TRANSFER_KINDS {
            let kind = ty.shape_kind();
            for member in self.store.sub_shapes(result.shape(), kind) {
                if clear {
                    self.attributes.clear_one(member);
                }
                let Some(centre) = self.store.center_of_mass(member) else {
                    continue;
                };
                for &root in &origins {
                    if let Some(source) = self.select_sub_shape(root, &centre, ty.into(), threshold)
                    {
                        self.attributes
                            .copy_attributes(source, member, CopyMode::Merge);
                    }
                }
            }
        }
    }

    // --- Pipeline ---

    fn non_regular(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        selection: Selection,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let Some(b) = b else {
            return self.unchanged(a).map(Some);
        };
        let (args_a, args_b) = self.operands(a, b)?;
        let builder = self.decompose(&args_a, &args_b, selection)?;
        let assembled = builder.make_containers(&mut self.store)?;
        self.finish_boolean(
            a,
            Some(b),
            assembled,
            selection.transfers_tool_contents(),
            transfer_dictionary,
        )
    }

    fn decompose(&mut self, a: &[Shape], b: &[Shape], selection: Selection) -> Result<CellsBuilder> {
        let mut builder = CellsBuilder::new(self.config.fuzzy);
        for &shape in a.iter().chain(b) {
            builder.add_argument(shape);
        }
        builder.perform(&mut self.store);
        if builder.has_errors() {
            return Err(KernelError::Decomposition(builder.dump_errors()).into());
        }
        if builder.has_warnings() {
            debug!(warnings = %builder.dump_warnings(), "decomposition warnings");
        }
        selection.apply(&mut builder, a.len(), b.len());
        debug!(
            arguments = a.len() + b.len(),
            cells = builder.cells().count(),
            selected = builder.selection().len(),
            "decomposed"
        );
        Ok(builder)
    }

    fn finish_boolean(
        &mut self,
        a: Topology,
        b: Option<Topology>,
        assembled: Option<Shape>,
        tool_contents: bool,
        transfer_dictionary: bool,
    ) -> Result<Option<Topology>> {
        let processed = match assembled {
            Some(shape) => self.postprocess(shape)?,
            None => None,
        };
        let Some(result) = processed else {
            debug!("empty result");
            return Ok(None);
        };
        let wrapped = self.wrap(result);
        let copy = self.deep_copy(wrapped)?;
        debug!(result = %copy, "boolean result");

        self.transfer_contents(a.shape(), copy)?;
        if let (Some(b), true) = (b, tool_contents) {
            self.transfer_contents(b.shape(), copy)?;
        }
        if transfer_dictionary {
            self.boolean_transfer_dictionary(a, b, copy, true);
        }
        Ok(Some(copy))
    }

    /// `a` re-wrapped under its own class and identity.
    fn unchanged(&mut self, a: Topology) -> Result<Topology> {
        self.store.ensure(a.shape())?;
        let (ty, class) = self.factories.resolve(a.shape(), Some(a.class_guid()));
        let instance = self.instance_guid(a).unwrap_or(class);
        Ok(self.wrap_as(a.shape(), ty, class, instance))
    }

    fn operands(&self, a: Topology, b: Topology) -> Result<(Vec<Shape>, Vec<Shape>)> {
        self.store.ensure(a.shape())?;
        self.store.ensure(b.shape())?;
        let args_a = self.expand(a.shape());
        let args_b = self.expand(b.shape());
        trace!(a = args_a.len(), b = args_b.len(), "operands");
        Ok((args_a, args_b))
    }

    /// Kernel arguments for one operand.
    fn expand(&self, shape: Shape) -> Vec<Shape> {
        match shape.kind() {
            ShapeKind::Compound | ShapeKind::CompSolid => self.store.children(shape),
            _ => vec![shape],
        }
    }

    fn practically_empty(&self, shape: Shape) -> bool {
        shape.kind().is_container() && self.store.children(shape).is_empty()
    }
}
