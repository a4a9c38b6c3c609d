// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Class-identity dispatch for wrapping raw shapes.
//!
//! The eight structural kinds are a closed table keyed by shape kind. Kinds
//! outside that table plug in through [`TopologyFactory`] and are found by
//! their class GUID.

use std::fmt;

use nmt_kernel::{Shape, ShapeKind};
use rustc_hash::FxHashMap;
use tracing::trace;
use uuid::Uuid;

use crate::keys::{TopologyType, APERTURE_CLASS};

/// A wrapper kind registered beyond the structural eight.
pub trait TopologyFactory: fmt::Debug {
    /// Class GUID the factory is registered under.
    fn class_guid(&self) -> Uuid;

    /// Entity kind reported by topologies this factory makes.
    fn kind(&self) -> TopologyType;

    /// Whether a shape of `kind` can be wrapped by this factory.
    fn accepts(&self, kind: ShapeKind) -> bool;
}

/// Wraps any shape as an [`TopologyType::Aperture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApertureFactory;

impl TopologyFactory for ApertureFactory {
    fn class_guid(&self) -> Uuid {
        APERTURE_CLASS
    }

    fn kind(&self) -> TopologyType {
        TopologyType::Aperture
    }

    fn accepts(&self, _kind: ShapeKind) -> bool {
        true
    }
}

/// What a class GUID resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Factory<'a> {
    Builtin(TopologyType),
    Extension(&'a dyn TopologyFactory),
}

/// Class GUID → factory.
#[derive(Debug)]
pub struct FactoryRegistry {
    extensions: FxHashMap<Uuid, Box<dyn TopologyFactory>>,
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        let mut registry = Self {
            extensions: FxHashMap::default(),
        };
        registry.register(Box::new(ApertureFactory));
        registry
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension factory, replacing one with the same class.
    /// Structural class GUIDs cannot be overridden.
    pub fn register(&mut self, factory: Box<dyn TopologyFactory>) -> bool {
        let class = factory.class_guid();
        if builtin(class).is_some() {
            return false;
        }
        self.extensions.insert(class, factory);
        true
    }

    pub fn find(&self, class: Uuid) -> Option<Factory<'_>> {
        if let Some(ty) = builtin(class) {
            return Some(Factory::Builtin(ty));
        }
        self.extensions
            .get(&class)
            .map(|f| Factory::Extension(f.as_ref()))
    }

    /// The structural kind a raw shape wraps as by default.
    pub fn default_for(kind: ShapeKind) -> TopologyType {
        TopologyType::from_shape_kind(kind)
    }

    /// Entity kind and class for `shape`, looked up by `class` when given.
    /// Unknown classes and classes that cannot wrap the shape fall back to
    /// the shape's default kind.
    pub fn resolve(&self, shape: Shape, class: Option<Uuid>) -> (TopologyType, Uuid) {
        let fallback = Self::default_for(shape.kind());
        let Some(class) = class else {
            return (fallback, fallback.class_guid());
        };
        match self.find(class) {
            Some(Factory::Builtin(ty)) if ty == fallback => (ty, class),
            Some(Factory::Extension(f)) if f.accepts(shape.kind()) => (f.kind(), f.class_guid()),
            _ => {
                trace!(%class, kind = %shape.kind(), "no factory for class, using default");
                (fallback, fallback.class_guid())
            }
        }
    }
}

fn builtin(class: Uuid) -> Option<TopologyType> {
    TopologyType::STRUCTURAL
        .into_iter()
        .find(|ty| ty.class_guid() == class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{CELL_CLASS, FACE_CLASS};
    use nmt_kernel::ShapeStore;

    #[derive(Debug)]
    struct PanelFactory;

    const PANEL_CLASS: Uuid = Uuid::from_u128(0x11111111_2222_3333_4444_555555555555);

    impl TopologyFactory for PanelFactory {
        fn class_guid(&self) -> Uuid {
            PANEL_CLASS
        }

        fn kind(&self) -> TopologyType {
            TopologyType::Face
        }

        fn accepts(&self, kind: ShapeKind) -> bool {
            kind == ShapeKind::Face
        }
    }

    fn face(store: &mut ShapeStore) -> Shape {
        Shape::Face(
            store
                .add_face_by_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]])
                .unwrap(),
        )
    }

    #[test]
    fn structural_classes_resolve_to_their_kind() {
        let registry = FactoryRegistry::new();
        assert!(matches!(
            registry.find(CELL_CLASS),
            Some(Factory::Builtin(TopologyType::Cell))
        ));
        assert!(matches!(
            registry.find(APERTURE_CLASS),
            Some(Factory::Extension(_))
        ));
        assert!(registry.find(Uuid::nil()).is_none());
    }

    #[test]
    fn resolve_falls_back_to_shape_kind() {
        let mut store = ShapeStore::new();
        let f = face(&mut store);
        let registry = FactoryRegistry::new();

        assert_eq!(registry.resolve(f, None), (TopologyType::Face, FACE_CLASS));
        // A cell class cannot wrap a face
        assert_eq!(
            registry.resolve(f, Some(CELL_CLASS)),
            (TopologyType::Face, FACE_CLASS)
        );
        assert_eq!(
            registry.resolve(f, Some(Uuid::new_v4())),
            (TopologyType::Face, FACE_CLASS)
        );
        assert_eq!(
            registry.resolve(f, Some(APERTURE_CLASS)),
            (TopologyType::Aperture, APERTURE_CLASS)
        );
    }

    #[test]
    fn extensions_register_by_class() {
        let mut store = ShapeStore::new();
        let f = face(&mut store);
        let v = Shape::Vertex(store.add_vertex(0.0, 0.0, 0.0));

        let mut registry = FactoryRegistry::new();
        assert!(registry.register(Box::new(PanelFactory)));
        assert_eq!(
            registry.resolve(f, Some(PANEL_CLASS)),
            (TopologyType::Face, PANEL_CLASS)
        );
        assert_eq!(registry.resolve(v, Some(PANEL_CLASS)).0, TopologyType::Vertex);
    }
}
