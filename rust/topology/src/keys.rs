// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity kinds, type filters and class identities.
//!
//! Every entity kind has a bit flag so that sets of kinds can be passed
//! around as a [`TypeFilter`], and a well-known class GUID under which its
//! factory is registered.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use nmt_kernel::ShapeKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const VERTEX_CLASS: Uuid = Uuid::from_u128(0xc4a9b420_edaf_4f8f_96eb_c87fbcc92f2b);
pub const EDGE_CLASS: Uuid = Uuid::from_u128(0x1fc6e6e1_9a09_4c0a_985d_758138c49e35);
pub const WIRE_CLASS: Uuid = Uuid::from_u128(0xb99ccd99_6756_401d_ab6c_11162de541a3);
pub const FACE_CLASS: Uuid = Uuid::from_u128(0x3b0a6afe_af86_4d96_a30d_d235e9c98475);
pub const SHELL_CLASS: Uuid = Uuid::from_u128(0x51c1e590_cec9_4e84_8f6b_e4f8c34fd3b3);
pub const CELL_CLASS: Uuid = Uuid::from_u128(0x8bda6c76_fa5c_4288_9830_80d32d283251);
pub const CELL_COMPLEX_CLASS: Uuid = Uuid::from_u128(0x4ec9904b_dc01_42df_9647_2e58c2e08e78);
pub const CLUSTER_CLASS: Uuid = Uuid::from_u128(0x7c498db6_f3e7_4722_be58_9720a4a9c2cc);
pub const APERTURE_CLASS: Uuid = Uuid::from_u128(0x740d9d31_ca8c_47ef_825f_68c607af80aa);

/// Discriminant for topology entity kinds, one bit each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u32)]
pub enum TopologyType {
    Vertex = 1,
    Edge = 2,
    Wire = 4,
    Face = 8,
    Shell = 16,
    Cell = 32,
    CellComplex = 64,
    Cluster = 128,
    Aperture = 256,
}

impl TopologyType {
    /// The eight structural kinds, finest first.
    pub const STRUCTURAL: [TopologyType; 8] = [
        TopologyType::Vertex,
        TopologyType::Edge,
        TopologyType::Wire,
        TopologyType::Face,
        TopologyType::Shell,
        TopologyType::Cell,
        TopologyType::CellComplex,
        TopologyType::Cluster,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyType::Vertex => "Vertex",
            TopologyType::Edge => "Edge",
            TopologyType::Wire => "Wire",
            TopologyType::Face => "Face",
            TopologyType::Shell => "Shell",
            TopologyType::Cell => "Cell",
            TopologyType::CellComplex => "CellComplex",
            TopologyType::Cluster => "Cluster",
            TopologyType::Aperture => "Aperture",
        }
    }

    /// The entity kind a raw shape of `kind` is wrapped as by default.
    pub fn from_shape_kind(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Vertex => TopologyType::Vertex,
            ShapeKind::Edge => TopologyType::Edge,
            ShapeKind::Wire => TopologyType::Wire,
            ShapeKind::Face => TopologyType::Face,
            ShapeKind::Shell => TopologyType::Shell,
            ShapeKind::Solid => TopologyType::Cell,
            ShapeKind::CompSolid => TopologyType::CellComplex,
            ShapeKind::Compound => TopologyType::Cluster,
        }
    }

    /// The raw shape kind behind this entity kind. Apertures are faces.
    pub fn shape_kind(&self) -> ShapeKind {
        match self {
            TopologyType::Vertex => ShapeKind::Vertex,
            TopologyType::Edge => ShapeKind::Edge,
            TopologyType::Wire => ShapeKind::Wire,
            TopologyType::Face | TopologyType::Aperture => ShapeKind::Face,
            TopologyType::Shell => ShapeKind::Shell,
            TopologyType::Cell => ShapeKind::Solid,
            TopologyType::CellComplex => ShapeKind::CompSolid,
            TopologyType::Cluster => ShapeKind::Compound,
        }
    }

    pub fn dimensionality(&self) -> u8 {
        match self {
            TopologyType::Vertex => 0,
            TopologyType::Edge | TopologyType::Wire => 1,
            TopologyType::Face | TopologyType::Shell | TopologyType::Aperture => 2,
            TopologyType::Cell | TopologyType::CellComplex | TopologyType::Cluster => 3,
        }
    }

    /// Kinds whose substructure carries independent topological meaning.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            TopologyType::Wire
                | TopologyType::Shell
                | TopologyType::CellComplex
                | TopologyType::Cluster
        )
    }

    /// The well-known class GUID of this kind.
    pub fn class_guid(&self) -> Uuid {
        match self {
            TopologyType::Vertex => VERTEX_CLASS,
            TopologyType::Edge => EDGE_CLASS,
            TopologyType::Wire => WIRE_CLASS,
            TopologyType::Face => FACE_CLASS,
            TopologyType::Shell => SHELL_CLASS,
            TopologyType::Cell => CELL_CLASS,
            TopologyType::CellComplex => CELL_COMPLEX_CLASS,
            TopologyType::Cluster => CLUSTER_CLASS,
            TopologyType::Aperture => APERTURE_CLASS,
        }
    }
}

impl std::fmt::Display for TopologyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of entity kinds. The empty filter means "no restriction" where an
/// operation documents it so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TypeFilter(u32);

impl TypeFilter {
    pub const NONE: TypeFilter = TypeFilter(0);

    /// Vertex, Edge, Face and Cell: the kinds a point selector can pick.
    pub const SELECTABLE: TypeFilter = TypeFilter(1 | 2 | 8 | 32);

    pub const fn from_bits(bits: u32) -> Self {
        TypeFilter(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, ty: TopologyType) -> bool {
        self.0 & ty.bits() != 0
    }

    /// Structural kinds in the filter, finest first.
    pub fn kinds(self) -> impl Iterator<Item = TopologyType> {
        TopologyType::STRUCTURAL
            .into_iter()
            .filter(move |t| self.contains(*t))
    }
}

impl From<TopologyType> for TypeFilter {
    fn from(ty: TopologyType) -> Self {
        TypeFilter(ty.bits())
    }
}

impl BitOr for TypeFilter {
    type Output = TypeFilter;

    fn bitor(self, rhs: Self) -> Self {
        TypeFilter(self.0 | rhs.0)
    }
}

impl BitOr<TopologyType> for TypeFilter {
    type Output = TypeFilter;

    fn bitor(self, rhs: TopologyType) -> Self {
        TypeFilter(self.0 | rhs.bits())
    }
}

impl BitOr for TopologyType {
    type Output = TypeFilter;

    fn bitor(self, rhs: Self) -> TypeFilter {
        TypeFilter(self.bits() | rhs.bits())
    }
}

impl BitOrAssign<TopologyType> for TypeFilter {
    fn bitor_assign(&mut self, rhs: TopologyType) {
        self.0 |= rhs.bits();
    }
}

impl BitAnd for TypeFilter {
    type Output = TypeFilter;

    fn bitand(self, rhs: Self) -> Self {
        TypeFilter(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_type_names() {
        assert_eq!(TopologyType::Vertex.as_str(), "Vertex");
        assert_eq!(TopologyType::CellComplex.as_str(), "CellComplex");
        assert_eq!(TopologyType::Cluster.to_string(), "Cluster");
    }

    #[test]
    fn flags_are_powers_of_two() {
        let mut seen = 0u32;
        for ty in TopologyType::STRUCTURAL {
            assert_eq!(ty.bits().count_ones(), 1);
            assert_eq!(seen & ty.bits(), 0);
            seen |= ty.bits();
        }
        assert_eq!(seen, 255);
        assert_eq!(TopologyType::Aperture.bits(), 256);
    }

    #[test]
    fn shape_kind_mapping_round_trips() {
        for ty in TopologyType::STRUCTURAL {
            assert_eq!(TopologyType::from_shape_kind(ty.shape_kind()), ty);
        }
        assert_eq!(TopologyType::Aperture.shape_kind(), ShapeKind::Face);
    }

    #[test]
    fn filters_combine() {
        let filter = TopologyType::Face | TopologyType::Cell;
        assert!(filter.contains(TopologyType::Face));
        assert!(!filter.contains(TopologyType::Edge));
        assert_eq!(
            filter.kinds().collect::<Vec<_>>(),
            vec![TopologyType::Face, TopologyType::Cell]
        );
        assert!(TypeFilter::NONE.is_empty());
        assert!(TypeFilter::SELECTABLE.contains(TopologyType::Vertex));
        assert!(!TypeFilter::SELECTABLE.contains(TopologyType::Wire));
    }

    #[test]
    fn containers() {
        assert!(TopologyType::Wire.is_container());
        assert!(TopologyType::Cluster.is_container());
        assert!(!TopologyType::Face.is_container());
        assert!(!TopologyType::Cell.is_container());
    }
}
