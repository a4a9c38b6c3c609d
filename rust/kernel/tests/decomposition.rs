// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use nmt_kernel::builders::box_faces;
use nmt_kernel::{CellsBuilder, Shape, ShapeKind, ShapeStore};

fn total_volume(store: &ShapeStore, shape: Shape) -> f64 {
    store
        .sub_shapes(shape, ShapeKind::Solid)
        .into_iter()
        .filter_map(|s| match s {
            Shape::Solid(k) => store.solid_volume(k),
            _ => None,
        })
        .sum()
}

#[test]
fn sliced_slab_survives_copy_and_text() {
    let mut store = ShapeStore::new();
    let (slab, _, _) = store.make_box([0.0; 3], [2.0, 2.0, 1.0]).unwrap();
    let cutter = store
        .add_face_by_coords(&[
            [1.0, -1.0, -1.0],
            [1.0, 3.0, -1.0],
            [1.0, 3.0, 2.0],
            [1.0, -1.0, 2.0],
        ])
        .unwrap();

    let mut builder = CellsBuilder::new(1e-6);
    builder.add_argument(Shape::Solid(slab));
    builder.add_argument(Shape::Face(cutter));
    builder.perform(&mut store);
    assert!(!builder.has_errors(), "{}", builder.dump_errors());
    builder.add_to_result(&[0], &[]);
    let pieces = builder.make_containers(&mut store).unwrap().unwrap();
    assert_eq!(store.sub_shapes(pieces, ShapeKind::Solid).len(), 2);
    assert_relative_eq!(total_volume(&store, pieces), 4.0, epsilon = 1e-6);

    let (copy, history) = store.copy_shape(pieces).unwrap();
    assert_eq!(history.get(&pieces), Some(&copy));
    assert_relative_eq!(total_volume(&store, copy), 4.0, epsilon = 1e-6);

    let text = store.to_text(copy).unwrap();
    let mut other = ShapeStore::new();
    let back = other.from_text(&text).unwrap();
    assert_eq!(back.kind(), copy.kind());
    assert_eq!(
        other.sub_shapes(back, ShapeKind::Face).len(),
        store.sub_shapes(copy, ShapeKind::Face).len()
    );
    assert_relative_eq!(total_volume(&other, back), 4.0, epsilon = 1e-6);
}

#[test]
fn loose_faces_become_rooms_sharing_a_wall() {
    let mut store = ShapeStore::new();
    let mut faces = Vec::new();
    for points in box_faces([0.0; 3], [1.0; 3])
        .into_iter()
        .chain(box_faces([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]))
    {
        faces.push(store.add_face_by_coords(&points).unwrap());
    }

    let volumes = store.make_volumes(&faces, 1e-6).unwrap();
    assert_eq!(volumes.solids.len(), 2);
    assert!(volumes.unused.is_empty());

    let rooms: Vec<Shape> = volumes.solids.iter().map(|&s| Shape::Solid(s)).collect();
    let building = store.make_containers(&rooms).unwrap().unwrap();
    let complexes = store.sub_shapes(building, ShapeKind::CompSolid);
    assert_eq!(complexes.len(), 1);
    assert_eq!(store.sub_shapes(complexes[0], ShapeKind::Face).len(), 11);

    let wall: Vec<Shape> = store
        .sub_shapes(complexes[0], ShapeKind::Face)
        .into_iter()
        .filter(|&f| store.ancestors(f, complexes[0], ShapeKind::Solid).len() == 2)
        .collect();
    assert_eq!(wall.len(), 1);
}

#[test]
fn fuse_then_section_of_disjoint_shapes() {
    let mut store = ShapeStore::new();
    let (a, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
    let (b, _, _) = store.make_box([2.0; 3], [3.0; 3]).unwrap();
    let (a, b) = (Shape::Solid(a), Shape::Solid(b));

    let fused = store.fuse(&[a], &[b], 1e-6).unwrap().unwrap();
    assert_eq!(store.sub_shapes(fused, ShapeKind::Solid).len(), 2);
    assert_relative_eq!(total_volume(&store, fused), 2.0, epsilon = 1e-6);
    assert!(store.section(&[a], &[b], 1e-6).unwrap().is_none());
    assert!(store.fuse(&[a], &[], 1e-6).is_err());
}
