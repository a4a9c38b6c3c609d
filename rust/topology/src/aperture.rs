// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Apertures: openings hosted by another topology.
//!
//! An aperture wraps an existing shape under [`APERTURE_CLASS`] and lives as
//! a content of its host, so it follows the host through copies and
//! booleans without becoming part of its boundary.

use crate::content::Context;
use crate::error::{Error, Result};
use crate::keys::{TopologyType, APERTURE_CLASS};
use crate::model::Model;
use crate::topology::Topology;

impl Model {
    /// Wraps `topology` as an aperture placed on the vertex, edge, face or
    /// cell of `host` closest to it.
    pub fn aperture_by_topology_context(&mut self, topology: Topology, host: Topology) -> Result<Topology> {
        let target = self
            .closest_simplest_subshape(host, topology)?
            .unwrap_or(host);
        let context = Context::new(target);
        self.aperture_by_topology_with_context(topology, context)
    }

    /// Wraps `topology` as an aperture related to `context`.
    pub fn aperture_by_topology_with_context(
        &mut self,
        topology: Topology,
        context: Context,
    ) -> Result<Topology> {
        let aperture = self.by_shape(topology.shape(), Some(APERTURE_CLASS))?;
        if aperture.kind() != TopologyType::Aperture {
            return Err(Error::WrongKind {
                expected: TopologyType::Aperture,
                found: aperture.kind(),
            });
        }
        self.add_context(aperture, context)?;
        Ok(aperture)
    }

    /// The shape behind an aperture, wrapped as its structural kind.
    pub fn aperture_topology(&mut self, aperture: Topology) -> Result<Topology> {
        if aperture.kind() != TopologyType::Aperture {
            return Err(Error::WrongKind {
                expected: TopologyType::Aperture,
                found: aperture.kind(),
            });
        }
        Ok(self.wrap(aperture.shape()))
    }
}
