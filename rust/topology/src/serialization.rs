// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON documents for a single topology.
//!
//! A document carries the kernel snapshot of the shape tree, the class and
//! instance identity of the root, and every non-empty dictionary in the
//! tree. Dictionaries are addressed by kind and by position in the
//! decomposition order, which the kernel snapshot preserves.

use nmt_kernel::ShapeKind;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::topology::Topology;

/// Serializable form of a topology and the attributes in its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDocument {
    pub class: Uuid,
    pub instance: Uuid,
    pub shape: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dictionaries: Vec<DictionaryEntry>,
}

/// Attributes of the `index`-th sub-shape of `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub kind: ShapeKind,
    pub index: usize,
    pub dictionary: Dictionary,
}

fn json_error(e: serde_json::Error) -> Error {
    Error::Serialization(e.to_string())
}

impl Model {
    /// Serializes `topology` with its identity and dictionaries.
    pub fn to_text(&self, topology: Topology) -> Result<String> {
        let root = topology.shape();
        let text = self.store.to_text(root)?;
        let shape: serde_json::Value = serde_json::from_str(&text).map_err(json_error)?;

        let mut dictionaries = Vec::new();
        for kind in ShapeKind::ALL {
            for (index, sub) in self.store.sub_shapes(root, kind).into_iter().enumerate() {
                if let Some(dictionary) = self.attributes.find_all(sub) {
                    if !dictionary.is_empty() {
                        dictionaries.push(DictionaryEntry {
                            kind,
                            index,
                            dictionary: dictionary.clone(),
                        });
                    }
                }
            }
        }

        let document = TopologyDocument {
            class: topology.class_guid(),
            instance: self.instance_guid(topology)?,
            shape,
            dictionaries,
        };
        serde_json::to_string(&document).map_err(json_error)
    }

    /// Rebuilds a topology from [`Model::to_text`] output as new shapes in
    /// this model.
    pub fn by_text(&mut self, text: &str) -> Result<Topology> {
        let document: TopologyDocument = serde_json::from_str(text).map_err(json_error)?;
        let shape_text = serde_json::to_string(&document.shape).map_err(json_error)?;
        let root = self.store.from_text(&shape_text)?;

        for entry in document.dictionaries {
            let Some(&sub) = self.store.sub_shapes(root, entry.kind).get(entry.index) else {
                return Err(Error::Serialization(format!(
                    "no {} at index {} for a dictionary",
                    entry.kind, entry.index
                )));
            };
            self.attributes.clear_one(sub);
            for (name, value) in entry.dictionary {
                self.attributes.add(sub, name, value);
            }
        }

        let (ty, class) = self.factories.resolve(root, Some(document.class));
        let topology = self.wrap_as(root, ty, class, document.instance);
        debug!(%topology, "read topology");
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::DictValue;
    use crate::entities::Entity;
    use crate::keys::{TopologyType, APERTURE_CLASS};
    use nmt_kernel::Shape;

    #[test]
    fn cell_with_face_dictionary_survives_text() {
        let mut model = Model::new();
        let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        let face = model.faces(cell, None).unwrap()[2].topology();
        let mut dict = Dictionary::default();
        dict.insert("name".into(), DictValue::from("front"));
        dict.insert("level".into(), DictValue::from(3i64));
        model.set_dictionary(face, dict.clone());

        let text = model.to_text(cell).unwrap();
        let back = model.by_text(&text).unwrap();
        assert!(!back.is_same(&cell));
        assert_eq!(back.kind(), TopologyType::Cell);
        assert_eq!(model.faces(back, None).unwrap().len(), 6);

        let faces = model.faces(back, None).unwrap();
        assert_eq!(model.dictionary(faces[2].topology()), dict);
        assert!(model.dictionary(faces[0].topology()).is_empty());
    }

    #[test]
    fn identity_and_class_survive_text() {
        let mut model = Model::new();
        let f = model
            .store_mut()
            .add_face_by_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]])
            .unwrap();
        let aperture = model.by_shape(Shape::Face(f), Some(APERTURE_CLASS)).unwrap();
        let text = model.to_text(aperture).unwrap();
        let back = model.by_text(&text).unwrap();
        assert_eq!(back.kind(), TopologyType::Aperture);
        assert_eq!(back.structural_kind(), TopologyType::Face);

        let v = Shape::Vertex(model.store_mut().add_vertex(1.0, 2.0, 3.0));
        let guid = Uuid::new_v4();
        let vertex = model.by_shape(v, Some(guid)).unwrap();
        let text = model.to_text(vertex).unwrap();
        let back = model.by_text(&text).unwrap();
        assert_eq!(model.instance_guid(back).unwrap(), guid);
    }

    #[test]
    fn malformed_text_is_a_serialization_error() {
        let mut model = Model::new();
        assert!(matches!(model.by_text("{"), Err(Error::Serialization(_))));
    }
}
