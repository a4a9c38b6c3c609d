// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shape healing.

use tracing::debug;

use crate::error::Result;
use crate::keys::*;
use crate::store::ShapeStore;

/// Shorter edges and smaller faces are treated as degenerate.
const DEGENERATE_SIZE: f64 = 1e-12;

impl ShapeStore {
    /// Heals a shape in place and returns it.
    ///
    /// Compounds lose members that are degenerate (zero-length edges,
    /// zero-area faces, zero-volume solids) or no longer live; nested
    /// compounds are healed recursively. Other shapes are validated at
    /// construction and come back unchanged. Solid orientation is resolved
    /// at query time, so it needs no repair here.
    pub fn fix(&mut self, shape: Shape) -> Result<Shape> {
        self.ensure(shape)?;
        let Shape::Compound(ck) = shape else {
            return Ok(shape);
        };

        let members = self
            .compound(ck)
            .map(|c| c.members.clone())
            .unwrap_or_default();
        for member in members {
            if let Shape::Compound(_) = member {
                self.fix(member)?;
            }
            if self.is_degenerate(member) {
                debug!(?member, "removing degenerate compound member");
                self.compound_remove(ck, member)?;
            }
        }
        Ok(shape)
    }

    /// Returns `true` for dead shapes and shapes without measure.
    pub fn is_degenerate(&self, shape: Shape) -> bool {
        if !self.contains(shape) {
            return true;
        }
        match shape {
            Shape::Edge(k) => self.edge_length(k).map_or(true, |l| l < DEGENERATE_SIZE),
            Shape::Face(k) => self.face_area(k).map_or(true, |a| a < DEGENERATE_SIZE),
            Shape::Solid(k) => self.solid_volume(k).map_or(true, |v| v < DEGENERATE_SIZE),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_drops_zero_length_edge() {
        let mut store = ShapeStore::new();
        let a = store.add_vertex(0.0, 0.0, 0.0);
        let b = store.add_vertex(0.0, 0.0, 0.0);
        let c = store.add_vertex(1.0, 0.0, 0.0);
        let bad = store.add_edge(a, b).unwrap();
        let good = store.add_edge(a, c).unwrap();
        let compound = store
            .add_compound(&[Shape::Edge(bad), Shape::Edge(good)])
            .unwrap();

        let fixed = store.fix(compound).unwrap();
        let Shape::Compound(ck) = fixed else {
            panic!("expected compound");
        };
        assert_eq!(store.compound(ck).unwrap().members, vec![Shape::Edge(good)]);
    }

    #[test]
    fn fix_leaves_valid_solid() {
        let mut store = ShapeStore::new();
        let (solid, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        assert_eq!(store.fix(Shape::Solid(solid)).unwrap(), Shape::Solid(solid));
        assert!(!store.is_degenerate(Shape::Solid(solid)));
    }
}
