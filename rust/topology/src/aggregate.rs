// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The model-wide aggregate: one compound collecting top-level topologies,
//! used as the default host for upward navigation and manifold checks.
//!
//! The compound is created on first use. Membership does not keep anything
//! alive and is independent of the live count, except that releasing the
//! last live handle empties it.

use nmt_kernel::{CompoundKey, Shape};
use tracing::trace;

use crate::entities::Cluster;
use crate::error::{Error, Result};
use crate::keys::TopologyType;
use crate::model::Model;
use crate::topology::Topology;

impl Model {
    fn aggregate_key(&mut self) -> Result<CompoundKey> {
        if let Some(key) = self.aggregate {
            if self.store.contains(Shape::Compound(key)) {
                return Ok(key);
            }
        }
        let created = self.store.add_compound(&[])?;
        let Shape::Compound(key) = created else {
            return Err(Error::WrongKind {
                expected: TopologyType::Cluster,
                found: TopologyType::from_shape_kind(created.kind()),
            });
        };
        self.aggregate = Some(key);
        Ok(key)
    }

    /// Adds `topology` to the aggregate. Adding a member twice is a no-op.
    pub fn aggregate_add(&mut self, topology: Topology) -> Result<()> {
        let shape = topology.shape();
        self.store.ensure(shape)?;
        let key = self.aggregate_key()?;
        if self.store.children(Shape::Compound(key)).contains(&shape) {
            return Ok(());
        }
        self.store.compound_add(key, shape)?;
        trace!(%topology, "added to aggregate");
        Ok(())
    }

    /// Removes `topology` from the aggregate when it is a member.
    pub fn aggregate_remove(&mut self, topology: Topology) -> Result<()> {
        let Some(key) = self.aggregate else {
            return Ok(());
        };
        if self.store.children(Shape::Compound(key)).contains(&topology.shape()) {
            self.store.compound_remove(key, topology.shape())?;
            trace!(%topology, "removed from aggregate");
        }
        Ok(())
    }

    /// Empties the aggregate.
    pub fn aggregate_clear(&mut self) -> Result<()> {
        if let Some(key) = self.aggregate {
            self.store.compound_clear(key)?;
        }
        Ok(())
    }

    /// The aggregate as a cluster.
    pub fn aggregate_cluster(&mut self) -> Result<Cluster> {
        let key = self.aggregate_key()?;
        self.by_shape_as(Shape::Compound(key))
    }

    /// Current members of the aggregate, in insertion order.
    pub fn aggregate_members(&mut self) -> Vec<Topology> {
        match self.aggregate {
            Some(key) => {
                let members = self.store.children(Shape::Compound(key));
                self.wrap_all(members)
            }
            None => Vec::new(),
        }
    }

    /// `true` when `topology` is a member of the aggregate.
    pub fn aggregate_contains(&self, topology: Topology) -> bool {
        self.aggregate
            .is_some_and(|key| self.store.children(Shape::Compound(key)).contains(&topology.shape()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entity;

    #[test]
    fn add_remove_clear() {
        let mut model = Model::new();
        assert!(model.aggregate_members().is_empty());
        let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        let b = model.vertex_by_coordinates(5.0, 0.0, 0.0).unwrap().topology();

        model.aggregate_add(a).unwrap();
        model.aggregate_add(b).unwrap();
        model.aggregate_add(a).unwrap();
        assert_eq!(model.aggregate_members(), vec![a, b]);
        assert!(model.aggregate_contains(b));

        model.aggregate_remove(b).unwrap();
        assert_eq!(model.aggregate_members(), vec![a]);

        model.aggregate_clear().unwrap();
        assert!(model.aggregate_members().is_empty());
        // The cluster survives being emptied
        let cluster = model.aggregate_cluster().unwrap();
        assert_eq!(model.num_sub_topologies(cluster.topology()), 0);
    }

    #[test]
    fn releasing_the_last_handle_clears_the_aggregate() {
        let mut model = Model::new();
        let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        model.aggregate_add(cell).unwrap();
        let live = model.live_count();
        assert!(live > 0);

        for _ in 1..live {
            model.release(cell);
        }
        assert!(model.aggregate_contains(cell));
        model.release(cell);
        assert_eq!(model.live_count(), 0);
        assert!(!model.aggregate_contains(cell));
    }
}
