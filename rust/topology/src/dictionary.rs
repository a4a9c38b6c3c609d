// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed key-value metadata attached to shapes.
//!
//! Dictionaries are keyed by the raw shape, so every handle over the same
//! shape sees the same attributes. Entries are never dropped automatically
//! when a shape stops being used; see [`AttributeStore::clear_one`].

use nalgebra::Point3;
use nmt_kernel::{Shape, ShapeKind};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entities::{Entity, Vertex};
use crate::error::{Error, Result};
use crate::keys::{TopologyType, TypeFilter};
use crate::model::Model;
use crate::topology::Topology;

/// A typed value stored in a dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DictValue {
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<DictValue>),
}

/// A dictionary is a typed key-value map attached to a shape.
pub type Dictionary = FxHashMap<String, DictValue>;

impl From<i64> for DictValue {
    fn from(v: i64) -> Self {
        DictValue::Int(v)
    }
}

impl From<f64> for DictValue {
    fn from(v: f64) -> Self {
        DictValue::Double(v)
    }
}

impl From<&str> for DictValue {
    fn from(v: &str) -> Self {
        DictValue::String(v.to_string())
    }
}

impl From<String> for DictValue {
    fn from(v: String) -> Self {
        DictValue::String(v)
    }
}

impl From<Vec<DictValue>> for DictValue {
    fn from(v: Vec<DictValue>) -> Self {
        DictValue::List(v)
    }
}

/// How [`AttributeStore::copy_attributes`] treats names already present on
/// the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// The incoming value replaces the old one.
    #[default]
    Overwrite,
    /// Colliding values accumulate into a list, in arrival order.
    Merge,
}

/// Shape → dictionary.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    dictionaries: FxHashMap<Shape, Dictionary>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one attribute, replacing a value with the same name.
    pub fn add(&mut self, shape: Shape, name: impl Into<String>, value: DictValue) {
        self.dictionaries
            .entry(shape)
            .or_default()
            .insert(name.into(), value);
    }

    pub fn remove(&mut self, shape: Shape, name: &str) -> Option<DictValue> {
        self.dictionaries.get_mut(&shape)?.remove(name)
    }

    pub fn find(&self, shape: Shape, name: &str) -> Option<&DictValue> {
        self.dictionaries.get(&shape)?.get(name)
    }

    /// The whole dictionary of a shape, if it ever had one.
    pub fn find_all(&self, shape: Shape) -> Option<&Dictionary> {
        self.dictionaries.get(&shape)
    }

    /// Drops the dictionary of one shape.
    pub fn clear_one(&mut self, shape: Shape) {
        self.dictionaries.remove(&shape);
    }

    pub fn clear_all(&mut self) {
        self.dictionaries.clear();
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    /// Copies every attribute of `src` onto `dst`.
    pub fn copy_attributes(&mut self, src: Shape, dst: Shape, mode: CopyMode) {
        if src == dst {
            return;
        }
        let Some(origin) = self.dictionaries.get(&src).cloned() else {
            return;
        };
        let Some(destination) = self.dictionaries.get_mut(&dst) else {
            self.dictionaries.insert(dst, origin);
            return;
        };

        for (name, value) in origin {
            match (mode, destination.remove(&name)) {
                (CopyMode::Merge, Some(DictValue::List(mut list))) => {
                    list.push(value);
                    destination.insert(name, DictValue::List(list));
                }
                (CopyMode::Merge, Some(old)) => {
                    destination.insert(name, DictValue::List(vec![old, value]));
                }
                _ => {
                    destination.insert(name, value);
                }
            }
        }
    }
}

impl Model {
    /// Replaces the dictionary of a topology.
    pub fn set_dictionary(&mut self, topology: Topology, dictionary: Dictionary) {
        let shape = topology.shape();
        self.attributes.clear_one(shape);
        for (name, value) in dictionary {
            self.attributes.add(shape, name, value);
        }
    }

    /// The dictionary of a topology; empty when it has none.
    pub fn dictionary(&self, topology: Topology) -> Dictionary {
        self.attributes
            .find_all(topology.shape())
            .cloned()
            .unwrap_or_default()
    }

    /// Every shape under `root` (root included) that carries attributes,
    /// coarsest first.
    pub fn attributes_in_subshapes(&self, root: Shape) -> Vec<(Shape, Dictionary)> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<Shape> = FxHashSet::default();
        let mut kinds: Vec<ShapeKind> = root.kind().finer().collect();
        kinds.push(root.kind());
        for &kind in kinds.iter().rev() {
            for sub in self.store.sub_shapes(root, kind) {
                if !seen.insert(sub) {
                    continue;
                }
                if let Some(dict) = self.attributes.find_all(sub) {
                    if !dict.is_empty() {
                        out.push((sub, dict.clone()));
                    }
                }
            }
        }
        out
    }

    /// Copies the attributes of `src_root` and of every attributed shape
    /// below it onto the nearest shape of the same kind under `dst_root`.
    ///
    /// Expensive: one nearest search per attributed shape.
    pub fn deep_copy_attributes(&mut self, src_root: Shape, dst_root: Shape) {
        for (sub, _) in self.attributes_in_subshapes(src_root) {
            let Some(point) = self.reference_point(sub) else {
                continue;
            };
            let filter = TypeFilter::from(TopologyType::from_shape_kind(sub.kind()));
            if let Some(target) = self.select_sub_shape(dst_root, &point, filter, f64::MAX) {
                self.attributes
                    .copy_attributes(sub, target, CopyMode::Overwrite);
            }
        }
    }

    /// Deep-copies `topology` and sets one dictionary per selector on the
    /// sub-topology each selector picks.
    ///
    /// A selector whose filter includes cells picks the cell that contains
    /// it, searching the cells next to the closest face first. Other
    /// selectors pick the nearest sub-topology within their filter. Unless
    /// `expect_duplicates` is set, two selectors picking the same
    /// sub-topology is an error.
    pub fn set_dictionaries(
        &mut self,
        topology: Topology,
        selectors: &[Vertex],
        dictionaries: &[Dictionary],
        filters: &[TypeFilter],
        expect_duplicates: bool,
    ) -> Result<Topology> {
        let mut points = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let point = self
                .store
                .vertex_point(selector.key())
                .ok_or(Error::UnregisteredShape(selector.shape()))?;
            points.push(point);
        }
        self.set_dictionaries_at(topology, &points, dictionaries, filters, expect_duplicates)
    }

    pub(crate) fn set_dictionaries_at(
        &mut self,
        topology: Topology,
        selectors: &[Point3<f64>],
        dictionaries: &[Dictionary],
        filters: &[TypeFilter],
        expect_duplicates: bool,
    ) -> Result<Topology> {
        if selectors.len() != dictionaries.len() {
            return Err(Error::precondition(
                "The lists of selectors and dictionaries do not have the same length.",
            ));
        }
        if selectors.len() != filters.len() {
            return Err(Error::precondition(
                "The lists of selectors and type filters do not have the same length.",
            ));
        }

        let copy = self.deep_copy(topology)?;
        let root = copy.shape();
        let mut selected: Vec<Option<Shape>> = Vec::with_capacity(selectors.len());
        for (point, &filter) in selectors.iter().zip(filters) {
            if filter.is_empty() {
                return Err(Error::precondition("No type filter specified."));
            }
            let pick = if filter.contains(TopologyType::Cell) {
                self.cell_containing(root, point)
            } else {
                self.select_sub_shape(root, point, filter, f64::MAX)
            };
            if let Some(shape) = pick {
                if !expect_duplicates && selected.contains(&Some(shape)) {
                    return Err(Error::SelectorConflict);
                }
            }
            selected.push(pick);
        }

        for (pick, dictionary) in selected.into_iter().zip(dictionaries) {
            let Some(shape) = pick else {
                continue;
            };
            self.attributes.clear_one(shape);
            for (name, value) in dictionary {
                self.attributes.add(shape, name.clone(), value.clone());
            }
        }
        Ok(copy)
    }

    /// Cell of `root` containing `point`: cells next to the closest face
    /// are tried before the rest.
    fn cell_containing(&self, root: Shape, point: &Point3<f64>) -> Option<Shape> {
        let face = self.select_sub_shape(root, point, TopologyType::Face.into(), f64::MAX)?;
        let tolerance = self.config.classify_tolerance;
        let is_in = |cell: &Shape| match cell {
            Shape::Solid(k) => {
                self.store.classify_point_in_solid(*k, point, tolerance)
                    == Some(nmt_kernel::Location::In)
            }
            _ => false,
        };
        self.store
            .ancestors(face, root, ShapeKind::Solid)
            .into_iter()
            .find(is_in)
            .or_else(|| {
                self.store
                    .sub_shapes(root, ShapeKind::Solid)
                    .into_iter()
                    .find(is_in)
            })
    }

    /// Copies the attributes found anywhere in `origins` onto the matching
    /// parts of a deep copy of `topology`.
    pub fn deep_copy_attributes_from(
        &mut self,
        topology: Topology,
        origins: &[Topology],
    ) -> Result<Topology> {
        let mut seen: FxHashSet<Shape> = FxHashSet::default();
        let mut points = Vec::new();
        let mut dictionaries = Vec::new();
        let mut filters = Vec::new();
        for origin in origins {
            for (shape, dictionary) in self.attributes_in_subshapes(origin.shape()) {
                if !seen.insert(shape) {
                    continue;
                }
                let Some(point) = self.reference_point(shape) else {
                    trace!(?shape, "no reference point, attributes not carried");
                    continue;
                };
                points.push(point);
                dictionaries.push(dictionary);
                filters.push(TypeFilter::from(TopologyType::from_shape_kind(shape.kind())));
            }
        }
        self.set_dictionaries_at(topology, &points, &dictionaries, &filters, true)
    }
}
