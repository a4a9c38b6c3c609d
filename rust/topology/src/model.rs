// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The model context.
//!
//! A [`Model`] owns the kernel shape store and every registry the topology
//! layer keeps about those shapes: instance identities, attributes, content
//! and context relations, extension factories and the aggregate. Every
//! operation takes the model explicitly, so independent models can live side
//! by side in one process.

use nmt_kernel::{CompoundKey, Shape, ShapeStore};
use tracing::debug;
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::content::ContentRegistry;
use crate::dictionary::AttributeStore;
use crate::entities::Entity;
use crate::error::{Error, Result};
use crate::factory::{FactoryRegistry, TopologyFactory};
use crate::identity::IdentityRegistry;
use crate::keys::TopologyType;
use crate::topology::Topology;

/// Shape store plus all bookkeeping about its shapes.
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) store: ShapeStore,
    pub(crate) config: ModelConfig,
    pub(crate) identities: IdentityRegistry,
    pub(crate) attributes: AttributeStore,
    pub(crate) relations: ContentRegistry,
    pub(crate) factories: FactoryRegistry,
    pub(crate) aggregate: Option<CompoundKey>,
    pub(crate) live: usize,
}

impl Model {
    /// Creates an empty model with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty model, rejecting invalid settings.
    pub fn with_config(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    /// Direct access to the kernel. Shapes created here are unknown to the
    /// model until wrapped with [`Model::by_shape`].
    pub fn store_mut(&mut self) -> &mut ShapeStore {
        &mut self.store
    }

    pub fn identity_registry(&self) -> &IdentityRegistry {
        &self.identities
    }

    pub fn attribute_store(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn attribute_store_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    pub fn content_registry(&self) -> &ContentRegistry {
        &self.relations
    }

    pub fn factory_registry(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// Registers an extension kind. Returns `false` when the class GUID
    /// belongs to a structural kind.
    pub fn register_factory(&mut self, factory: Box<dyn TopologyFactory>) -> bool {
        self.factories.register(factory)
    }

    /// Wraps a raw shape. The factory is looked up by `instance_guid` when
    /// given, otherwise the shape kind decides. The shape keeps the first
    /// instance identity it is ever given; without one it defaults to the
    /// class GUID.
    pub fn by_shape(&mut self, shape: Shape, instance_guid: Option<Uuid>) -> Result<Topology> {
        self.store.ensure(shape)?;
        let (ty, class) = self.factories.resolve(shape, instance_guid);
        Ok(self.wrap_as(shape, ty, class, instance_guid.unwrap_or(class)))
    }

    /// Wraps a raw shape as a typed entity.
    pub fn by_shape_as<E: Entity>(&mut self, shape: Shape) -> Result<E> {
        let topology = self.by_shape(shape, None)?;
        E::try_from_topology(topology)
    }

    /// Instance GUID of a wrapped shape.
    pub fn instance_guid(&self, topology: Topology) -> Result<Uuid> {
        self.identities
            .find(topology.shape())
            .ok_or(Error::UnregisteredShape(topology.shape()))
    }

    /// Number of handles handed out and not yet released.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Gives a handle back. When the last live handle is released the
    /// aggregate is emptied.
    pub fn release(&mut self, topology: Topology) {
        self.live = self.live.saturating_sub(1);
        if self.live == 0 {
            debug!(released = %topology, "last live topology released, clearing aggregate");
            if let Err(e) = self.aggregate_clear() {
                debug!(error = %e, "aggregate was already gone");
            }
        }
    }

    // --- Wrapping helpers ---

    pub(crate) fn wrap_as(
        &mut self,
        shape: Shape,
        ty: TopologyType,
        class: Uuid,
        instance: Uuid,
    ) -> Topology {
        self.identities.add(shape, instance);
        self.live += 1;
        Topology::new(shape, ty, class)
    }

    /// Wraps as the shape's default kind.
    pub(crate) fn wrap(&mut self, shape: Shape) -> Topology {
        let ty = FactoryRegistry::default_for(shape.kind());
        self.wrap_as(shape, ty, ty.class_guid(), ty.class_guid())
    }

    /// Wraps a copy the way `like` was wrapped: same class when it can wrap
    /// the copy, and the same instance GUID.
    pub(crate) fn wrap_like(&mut self, shape: Shape, like: Topology) -> Result<Topology> {
        let instance = self.instance_guid(like)?;
        let (ty, class) = self.factories.resolve(shape, Some(like.class_guid()));
        Ok(self.wrap_as(shape, ty, class, instance))
    }

    pub(crate) fn wrap_all(&mut self, shapes: impl IntoIterator<Item = Shape>) -> Vec<Topology> {
        shapes.into_iter().map(|s| self.wrap(s)).collect()
    }

    /// Finishes a top-level constructor.
    pub(crate) fn constructed(&mut self, topology: Topology) -> Result<Topology> {
        if self.config.register_in_aggregate {
            self.aggregate_add(topology)?;
        }
        Ok(topology)
    }
}
