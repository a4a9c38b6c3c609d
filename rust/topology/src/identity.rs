// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance identities bound to raw shapes.

use nmt_kernel::Shape;
use rustc_hash::FxHashMap;
use uuid::Uuid;

/// Maps each wrapped shape to its logical GUID.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    guids: FxHashMap<Shape, Uuid>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `guid` to `shape`. A shape keeps the first identity it was
    /// given.
    pub fn add(&mut self, shape: Shape, guid: Uuid) {
        self.guids.entry(shape).or_insert(guid);
    }

    pub fn find(&self, shape: Shape) -> Option<Uuid> {
        self.guids.get(&shape).copied()
    }

    pub fn remove(&mut self, shape: Shape) -> Option<Uuid> {
        self.guids.remove(&shape)
    }

    pub fn clear(&mut self) {
        self.guids.clear();
    }

    pub fn len(&self) -> usize {
        self.guids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guids.is_empty()
    }
}
