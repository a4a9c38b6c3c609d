// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shallow and deep copies.
//!
//! A shallow copy duplicates the shape tree and its attributes. A deep copy
//! also rebuilds the content/context graph around it: every host the
//! topology sits in and every content anywhere below it is copied once and
//! related to the copy the same way the originals were related. The memo
//! maps each original shape to its copy and is filled before recursing, so
//! cyclic graphs terminate.

use nmt_kernel::{CopyHistory, Shape};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::content::Context;
use crate::dictionary::CopyMode;
use crate::error::Result;
use crate::model::Model;
use crate::topology::Topology;

type CopyMemo = FxHashMap<Shape, Shape>;

impl Model {
    /// Duplicates the shape tree of `topology` with its attributes.
    pub fn shallow_copy(&mut self, topology: Topology) -> Result<Topology> {
        let (copy, history) = self.store.copy_shape(topology.shape())?;
        self.copy_history_attributes(&history);
        self.wrap_like(copy, topology)
    }

    /// Duplicates `topology` together with its reachable content/context
    /// graph. The copy shares no shape with the original.
    pub fn deep_copy(&mut self, topology: Topology) -> Result<Topology> {
        let mut memo = CopyMemo::default();
        self.deep_copy_with(topology, &mut memo)
    }

    fn deep_copy_with(&mut self, topology: Topology, memo: &mut CopyMemo) -> Result<Topology> {
        if let Some(&done) = memo.get(&topology.shape()) {
            return self.wrap_like(done, topology);
        }

        let (shape, history) = self.store.copy_shape(topology.shape())?;
        self.copy_history_attributes(&history);
        for (&original, &copied) in &history {
            memo.insert(original, copied);
        }
        let copy = self.wrap_like(shape, topology)?;

        for context in self.contexts(topology) {
            let host = match memo.get(&context.host.shape()) {
                Some(&host_copy) => self.wrap_like(host_copy, context.host)?,
                None => self.deep_copy_with(context.host, memo)?,
            };
            self.relate(host, copy, moved(context, host));
        }

        for content in self.sub_contents_of(topology.shape()) {
            let content_copy = match memo.get(&content.shape()) {
                Some(&done) => self.wrap_like(done, content)?,
                None => self.deep_copy_with(content, memo)?,
            };
            for context in self.contexts(content) {
                let Some(&host_copy) = history.get(&context.host.shape()) else {
                    continue;
                };
                let host = self.wrap_like(host_copy, context.host)?;
                self.relate(host, content_copy, moved(context, host));
            }
        }

        trace!(original = %topology, copy = %copy, "deep copy done");
        Ok(copy)
    }

    fn copy_history_attributes(&mut self, history: &CopyHistory) {
        for (&original, &copied) in history {
            self.attributes
                .copy_attributes(original, copied, CopyMode::Overwrite);
        }
    }
}

fn moved(context: Context, host: Topology) -> Context {
    Context::with_parameters(host, context.u, context.v, context.w)
}
