// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NMT Topology
//!
//! Non-manifold topology bookkeeping over the [`nmt_kernel`] shape store.
//!
//! A [`Model`] owns the kernel store together with everything the topology
//! layer records about its shapes:
//!
//! - a stable instance identity per wrapped shape and a factory table that
//!   reinterprets a raw shape as the right entity kind ([`factory`]);
//! - attribute dictionaries keyed by shape ([`dictionary`]);
//! - the content/context graph, where a topology sits inside a host without
//!   joining its boundary, like a window in a wall ([`content`]);
//! - a model-wide aggregate used as the default host for upward queries.
//!
//! Entities are small copyable handles ([`Topology`] and the typed
//! [`Vertex`] … [`Cluster`] wrappers). Every operation goes through the
//! model: navigation between kinds, manifold checks, shallow and deep
//! copies, and booleans that carry contents and dictionaries from their
//! operands onto the result.
//!
//! ```
//! use nmt_topology::{Entity, Model};
//!
//! let mut model = Model::new();
//! let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
//! let b = model.cell_box([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]).unwrap();
//! let union = model
//!     .union(a.topology(), Some(b.topology()), false)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(model.cells(union, None).unwrap().len(), 1);
//! ```

pub mod aggregate;
pub mod aperture;
pub mod boolean;
pub mod config;
pub mod construction;
pub mod content;
pub mod copy;
pub mod dictionary;
pub mod entities;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod identity;
pub mod keys;
pub mod manifold;
pub mod model;
pub mod query;
pub mod serialization;
pub mod topology;
pub mod traversal;

pub use config::ModelConfig;
pub use content::{Context, ContentRegistry};
pub use dictionary::{AttributeStore, CopyMode, DictValue, Dictionary};
pub use entities::{Cell, CellComplex, Cluster, Edge, Entity, Face, Shell, Vertex, Wire};
pub use error::{Error, Result};
pub use factory::{ApertureFactory, Factory, FactoryRegistry, TopologyFactory};
pub use identity::IdentityRegistry;
pub use keys::{
    TopologyType, TypeFilter, APERTURE_CLASS, CELL_CLASS, CELL_COMPLEX_CLASS, CLUSTER_CLASS,
    EDGE_CLASS, FACE_CLASS, SHELL_CLASS, VERTEX_CLASS, WIRE_CLASS,
};
pub use model::Model;
pub use serialization::{DictionaryEntry, TopologyDocument};
pub use topology::Topology;
