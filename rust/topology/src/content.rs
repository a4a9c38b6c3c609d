// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content and context relations.
//!
//! A **content** is a topology placed inside a host without becoming part
//! of the host's boundary structure (a window in a wall, furniture in a
//! room). Seen from the member, the same relation is a **context**: the
//! host plus a parametric position (u, v, w).
//!
//! The registry keeps both directions. It does not enforce their symmetry;
//! the [`Model`] operations in this module always update both sides.

use nalgebra::Point3;
use nmt_kernel::{Location, Shape, ShapeKind};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::error::{Error, Result};
use crate::keys::{TopologyType, TypeFilter};
use crate::model::Model;
use crate::topology::Topology;

/// A host seen from one of its contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Context {
    pub host: Topology,
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl Context {
    /// A context at the host's parametric origin.
    pub fn new(host: Topology) -> Self {
        Self::with_parameters(host, 0.0, 0.0, 0.0)
    }

    pub fn with_parameters(host: Topology, u: f64, v: f64, w: f64) -> Self {
        Self { host, u, v, w }
    }
}

/// Host → contents and member → contexts, both keyed by raw shape.
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    contents: FxHashMap<Shape, Vec<Topology>>,
    contexts: FxHashMap<Shape, Vec<Context>>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `member` as a content of `host`.
    pub fn add_content(&mut self, host: Shape, member: Topology) {
        let list = self.contents.entry(host).or_default();
        if !list.iter().any(|m| m.shape() == member.shape()) {
            list.push(member);
        }
    }

    /// Records `context` as a context of `member`.
    pub fn add_context(&mut self, member: Shape, context: Context) {
        let list = self.contexts.entry(member).or_default();
        if !list.iter().any(|c| c.host.shape() == context.host.shape()) {
            list.push(context);
        }
    }

    /// Removes `member` from the contents of `host`. A host left without
    /// contents drops out of the index.
    pub fn remove_content(&mut self, host: Shape, member: Shape) {
        if let Some(list) = self.contents.get_mut(&host) {
            list.retain(|m| m.shape() != member);
            if list.is_empty() {
                self.contents.remove(&host);
            }
        }
    }

    /// Removes `host` from the contexts of `member`.
    pub fn remove_context(&mut self, member: Shape, host: Shape) {
        if let Some(list) = self.contexts.get_mut(&member) {
            list.retain(|c| c.host.shape() != host);
            if list.is_empty() {
                self.contexts.remove(&member);
            }
        }
    }

    pub fn contents(&self, host: Shape) -> &[Topology] {
        self.contents.get(&host).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contexts(&self, member: Shape) -> &[Context] {
        self.contexts.get(&member).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_content(&self, host: Shape, member: Shape) -> bool {
        self.contents(host).iter().any(|m| m.shape() == member)
    }

    /// Forgets every content of `host` and every context of `host` as a
    /// member. The other side of each relation is left alone.
    pub fn clear_one(&mut self, shape: Shape) {
        self.contents.remove(&shape);
        self.contexts.remove(&shape);
    }

    pub fn clear_all(&mut self) {
        self.contents.clear();
        self.contexts.clear();
    }
}

impl Model {
    /// Contents of a topology.
    pub fn contents(&self, topology: Topology) -> Vec<Topology> {
        self.relations.contents(topology.shape()).to_vec()
    }

    /// Contexts of a topology.
    pub fn contexts(&self, topology: Topology) -> Vec<Context> {
        self.relations.contexts(topology.shape()).to_vec()
    }

    /// Contents that are apertures.
    pub fn apertures(&self, topology: Topology) -> Vec<Topology> {
        self.relations
            .contents(topology.shape())
            .iter()
            .filter(|c| c.kind() == TopologyType::Aperture)
            .copied()
            .collect()
    }

    /// Contents of the topology and of every finer sub-topology.
    pub fn sub_contents(&self, topology: Topology) -> Vec<Topology> {
        self.sub_contents_of(topology.shape())
    }

    pub(crate) fn sub_contents_of(&self, shape: Shape) -> Vec<Topology> {
        let mut out: Vec<Topology> = self.relations.contents(shape).to_vec();
        let mut seen: FxHashSet<Shape> = FxHashSet::default();
        seen.insert(shape);
        for kind in shape.kind().finer() {
            for sub in self.store.sub_shapes(shape, kind) {
                if seen.insert(sub) {
                    out.extend_from_slice(self.relations.contents(sub));
                }
            }
        }
        out
    }

    pub fn has_content(&self, host: Topology, member: Topology) -> bool {
        self.relations.has_content(host.shape(), member.shape())
    }

    /// Adds `content` to `host` in place, with a context at the host's
    /// origin. Adding an existing content is a no-op.
    pub fn add_content(&mut self, host: Topology, content: Topology) -> Result<()> {
        if host.shape() == content.shape() {
            return Err(Error::precondition("A topology cannot be its own content."));
        }
        if self.relations.has_content(host.shape(), content.shape()) {
            return Ok(());
        }
        self.relate(host, content, Context::new(host));
        Ok(())
    }

    /// Removes `content` from `host` in place, on both sides.
    pub fn remove_content(&mut self, host: Topology, content: Topology) {
        self.relations.remove_content(host.shape(), content.shape());
        self.relations.remove_context(content.shape(), host.shape());
    }

    /// Adds `context` to `member` in place, on both sides.
    pub fn add_context(&mut self, member: Topology, context: Context) -> Result<()> {
        if context.host.shape() == member.shape() {
            return Err(Error::precondition("A topology cannot be its own context."));
        }
        self.relate(context.host, member, context);
        Ok(())
    }

    /// Removes the context of `member` hosted by `host`, on both sides.
    pub fn remove_context(&mut self, member: Topology, host: Topology) {
        self.remove_content(host, member);
    }

    pub(crate) fn relate(&mut self, host: Topology, member: Topology, context: Context) {
        self.relations.add_content(host.shape(), member);
        self.relations.add_context(member.shape(), context);
    }

    /// Deep-copies `topology` and places a deep copy of each content on it.
    ///
    /// With an empty filter, or one that includes the topology's own kind,
    /// contents go on the copy itself. A filter with cells places each
    /// content in the cell containing its centre of mass. Any other filter
    /// places it on the nearest sub-topology of those kinds.
    pub fn add_contents(
        &mut self,
        topology: Topology,
        contents: &[Topology],
        filter: TypeFilter,
    ) -> Result<Topology> {
        let copy = self.deep_copy(topology)?;

        for &content in contents {
            let target = if filter.is_empty() || filter.contains(topology.kind()) {
                if self.relations.has_content(topology.shape(), content.shape()) {
                    continue;
                }
                Some(copy)
            } else {
                let centre = self.center_of_mass(content)?;
                if filter.contains(TopologyType::Cell) {
                    let already = self
                        .store
                        .sub_shapes(topology.shape(), ShapeKind::Solid)
                        .into_iter()
                        .any(|cell| self.relations.has_content(cell, content.shape()));
                    if already {
                        continue;
                    }
                    self.host_cell(copy.shape(), &centre)
                        .map(|cell| self.wrap(cell))
                } else {
                    self.select_sub_shape(
                        copy.shape(),
                        &centre,
                        filter & TypeFilter::SELECTABLE,
                        f64::MAX,
                    )
                    .map(|s| self.wrap(s))
                }
            };

            let Some(host) = target else {
                trace!(%content, "no host found for content");
                continue;
            };
            let content_copy = self.deep_copy(content)?;
            self.relate(host, content_copy, Context::new(host));
        }
        Ok(copy)
    }

    /// Cell under `root` hosting a point: an adjacent cell of the closest
    /// face holding it in or on its boundary, else any cell holding it.
    pub(crate) fn host_cell(&self, root: Shape, point: &Point3<f64>) -> Option<Shape> {
        let face = self.select_sub_shape(root, point, TopologyType::Face.into(), f64::MAX)?;
        let tolerance = self.config.classify_tolerance;
        let locate = |cell: Shape| match cell {
            Shape::Solid(k) => self.store.classify_point_in_solid(k, point, tolerance),
            _ => None,
        };
        let adjacent = self.store.ancestors(face, root, ShapeKind::Solid);
        adjacent
            .into_iter()
            .find(|&c| matches!(locate(c), Some(Location::In | Location::On)))
            .or_else(|| {
                self.store
                    .sub_shapes(root, ShapeKind::Solid)
                    .into_iter()
                    .find(|&c| locate(c) == Some(Location::In))
            })
    }

    /// A shallow copy of `topology` carrying deep copies of every content
    /// except `removed`.
    pub fn remove_contents(&mut self, topology: Topology, removed: &[Topology]) -> Result<Topology> {
        let kept: Vec<Topology> = self
            .contents(topology)
            .into_iter()
            .filter(|c| !removed.iter().any(|r| r.is_same(c)))
            .collect();
        let mut copies = Vec::with_capacity(kept.len());
        for content in kept {
            copies.push(self.deep_copy(content)?);
        }
        let copy = self.shallow_copy(topology)?;
        self.add_contents(copy, &copies, TypeFilter::NONE)
    }

    /// Deep-copies `topology` and relates it to a deep copy of each host.
    /// Hosts already containing `topology` are skipped.
    pub fn add_contexts(&mut self, topology: Topology, contexts: &[Context]) -> Result<Topology> {
        let copy = self.deep_copy(topology)?;
        for context in contexts {
            if self
                .relations
                .has_content(context.host.shape(), topology.shape())
            {
                continue;
            }
            let host_copy = self.deep_copy(context.host)?;
            self.relate(host_copy, copy, Context::new(host_copy));
        }
        Ok(copy)
    }

    /// A shallow copy of `topology` related to deep copies of every host
    /// except `removed`, keeping their parameters.
    pub fn remove_contexts(&mut self, topology: Topology, removed: &[Topology]) -> Result<Topology> {
        let kept: Vec<Context> = self
            .contexts(topology)
            .into_iter()
            .filter(|c| !removed.iter().any(|r| r.is_same(&c.host)))
            .collect();
        let copy = self.shallow_copy(topology)?;
        for context in kept {
            let host_copy = self.deep_copy(context.host)?;
            let moved = Context::with_parameters(host_copy, context.u, context.v, context.w);
            self.add_context(copy, moved)?;
        }
        Ok(copy)
    }
}
