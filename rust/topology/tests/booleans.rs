// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use nmt_topology::{
    Cell, CellComplex, DictValue, Dictionary, Entity, Model, Topology, TopologyType,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two unit cubes overlapping by half along x.
fn offset_cubes(model: &mut Model) -> (Cell, Cell) {
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
    let b = model.cell_box([0.5, 0.0, 0.0], [1.5, 1.0, 1.0]).unwrap();
    (a, b)
}

fn total_volume(model: &mut Model, topology: Topology) -> f64 {
    model
        .cells(topology, None)
        .unwrap()
        .into_iter()
        .map(|c| model.cell_volume(c).unwrap())
        .sum()
}

fn tagged(name: &str) -> Dictionary {
    let mut dict = Dictionary::default();
    dict.insert("name".into(), DictValue::from(name));
    dict
}

#[test]
fn union_melts_overlapping_cubes() {
    init_tracing();
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let union = model
        .union(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert_eq!(union.kind(), TopologyType::Cell);
    assert_relative_eq!(total_volume(&mut model, union), 1.5, epsilon = 1e-6);
}

#[test]
fn intersect_keeps_the_overlap() {
    init_tracing();
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let common = model
        .intersect(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert_eq!(model.cells(common, None).unwrap().len(), 1);
    assert_relative_eq!(total_volume(&mut model, common), 0.5, epsilon = 1e-6);

    // Same overlap the other way round
    let swapped = model
        .intersect(b.topology(), Some(a.topology()), false)
        .unwrap()
        .unwrap();
    assert_relative_eq!(total_volume(&mut model, swapped), 0.5, epsilon = 1e-6);
}

#[test]
fn intersect_of_disjoint_cells_is_none() {
    let mut model = Model::new();
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
    let b = model.cell_box([3.0; 3], [4.0; 3]).unwrap();
    let none = model.intersect(a.topology(), Some(b.topology()), false).unwrap();
    assert!(none.is_none());
}

#[test]
fn difference_removes_the_overlap() {
    init_tracing();
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let rest = model
        .difference(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert_eq!(rest.kind(), TopologyType::Cell);
    assert_relative_eq!(total_volume(&mut model, rest), 0.5, epsilon = 1e-6);
    let centre = model.center_of_mass(rest).unwrap();
    assert_relative_eq!(centre.x, 0.25, epsilon = 1e-6);
}

#[test]
fn difference_with_itself_is_none() {
    let mut model = Model::new();
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
    assert!(model.difference(a, Some(a), false).unwrap().is_none());
}

#[test]
fn union_with_nothing_is_the_operand() {
    let mut model = Model::new();
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
    let same = model.union(a, None, true).unwrap().unwrap();
    assert!(same.is_same(&a));
}

#[test]
fn non_regular_operations_keep_the_right_pieces() {
    init_tracing();
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let (a, b) = (a.topology(), Some(b.topology()));

    let merged = model.merge(a, b, false).unwrap().unwrap();
    assert_eq!(model.cells(merged, None).unwrap().len(), 3);
    assert_relative_eq!(total_volume(&mut model, merged), 1.5, epsilon = 1e-6);

    let xor = model.xor(a, b, false).unwrap().unwrap();
    assert_eq!(model.cells(xor, None).unwrap().len(), 2);
    assert_relative_eq!(total_volume(&mut model, xor), 1.0, epsilon = 1e-6);

    let imprinted = model.imprint(a, b, false).unwrap().unwrap();
    assert_eq!(model.cells(imprinted, None).unwrap().len(), 2);
    assert_relative_eq!(total_volume(&mut model, imprinted), 1.0, epsilon = 1e-6);

    let imposed = model.impose(a, b, false).unwrap().unwrap();
    assert_eq!(model.cells(imposed, None).unwrap().len(), 3);
    assert_relative_eq!(total_volume(&mut model, imposed), 1.5, epsilon = 1e-6);

    let sliced = model.slice(a, b, false).unwrap().unwrap();
    assert_eq!(model.cells(sliced, None).unwrap().len(), 2);
    assert_relative_eq!(total_volume(&mut model, sliced), 1.0, epsilon = 1e-6);
}

/// Two unit cubes sharing the plane x = 1.
fn touching_cubes(model: &mut Model) -> (Cell, Cell) {
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
    let b = model.cell_box([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]).unwrap();
    (a, b)
}

fn segment(model: &mut Model, from: [f64; 3], to: [f64; 3]) -> Topology {
    let start = model.vertex_by_coordinates(from[0], from[1], from[2]).unwrap();
    let end = model.vertex_by_coordinates(to[0], to[1], to[2]).unwrap();
    model.edge_by_vertices(start, end).unwrap().topology()
}

fn unit_square(model: &mut Model) -> Topology {
    model
        .face_by_coordinates(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])
        .unwrap()
        .topology()
}

#[test]
fn merge_of_touching_cells_shares_the_wall() {
    init_tracing();
    let mut model = Model::new();
    let (a, b) = touching_cubes(&mut model);
    let merged = model
        .merge(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert_eq!(merged.kind(), TopologyType::CellComplex);
    assert_eq!(model.cells(merged, None).unwrap().len(), 2);
    assert_eq!(model.faces(merged, None).unwrap().len(), 11);

    let complex = CellComplex::try_from_topology(merged).unwrap();
    let walls = model.internal_faces(complex).unwrap();
    assert_eq!(walls.len(), 1);
    let centre = model.center_of_mass(walls[0].topology()).unwrap();
    assert_relative_eq!(centre.x, 1.0, epsilon = 1e-9);
    assert_relative_eq!(total_volume(&mut model, merged), 2.0, epsilon = 1e-6);
}

#[test]
fn imprint_of_a_touching_cell_splits_the_wall() {
    let mut model = Model::new();
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
    let b = model.cell_box([1.0, 0.0, 0.0], [2.0, 0.5, 1.0]).unwrap();
    let imprinted = model
        .imprint(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert_eq!(imprinted.kind(), TopologyType::Cell);
    assert_eq!(model.faces(imprinted, None).unwrap().len(), 7);
    assert_relative_eq!(total_volume(&mut model, imprinted), 1.0, epsilon = 1e-6);
}

#[test]
fn crossing_edges_merge_into_four() {
    let mut model = Model::new();
    let a = segment(&mut model, [0.0, 0.0, 0.0], [2.0, 0.0, 0.0]);
    let b = segment(&mut model, [1.0, -1.0, 0.0], [1.0, 1.0, 0.0]);
    let merged = model.merge(a, Some(b), false).unwrap().unwrap();
    assert_eq!(merged.kind(), TopologyType::Wire);
    let edges = model.edges(merged, None).unwrap();
    assert_eq!(edges.len(), 4);
    for edge in edges {
        assert_relative_eq!(model.edge_length(edge).unwrap(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn edge_piercing_a_face_is_split() {
    let mut model = Model::new();
    let face = unit_square(&mut model);
    let pin = segment(&mut model, [0.5, 0.5, -1.0], [0.5, 0.5, 1.0]);
    let merged = model.merge(face, Some(pin), false).unwrap().unwrap();
    assert_eq!(merged.kind(), TopologyType::Cluster);

    let edges = model.edges(merged, None).unwrap();
    assert_eq!(edges.len(), 6);
    for edge in edges {
        assert_relative_eq!(model.edge_length(edge).unwrap(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn slice_of_a_face_by_a_crossing_edge() {
    let mut model = Model::new();
    let face = unit_square(&mut model);
    let cut = segment(&mut model, [0.5, -1.0, 0.0], [0.5, 2.0, 0.0]);
    let sliced = model.slice(face, Some(cut), false).unwrap().unwrap();
    let halves = model.faces(sliced, None).unwrap();
    assert_eq!(halves.len(), 2);
    for half in halves {
        assert_relative_eq!(model.face_area(half).unwrap(), 0.5, epsilon = 1e-9);
    }
}

#[test]
fn divide_records_face_halves_as_contents() {
    let mut model = Model::new();
    let face = unit_square(&mut model);
    let cut = segment(&mut model, [0.5, -1.0, 0.0], [0.5, 2.0, 0.0]);
    model.divide(face, Some(cut), false).unwrap();

    let halves = model.contents(face);
    assert_eq!(halves.len(), 2);
    assert!(halves.iter().all(|h| h.kind() == TopologyType::Face));
    let mut xs: Vec<f64> = halves
        .iter()
        .map(|h| model.center_of_mass(*h).unwrap().x)
        .collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    assert_relative_eq!(xs[0], 0.25, epsilon = 1e-9);
    assert_relative_eq!(xs[1], 0.75, epsilon = 1e-9);
}

#[test]
fn divide_records_edge_halves_as_contents() {
    let mut model = Model::new();
    let edge = segment(&mut model, [0.0, 0.0, 0.0], [2.0, 0.0, 0.0]);
    let tool = segment(&mut model, [1.0, -1.0, 0.0], [1.0, 1.0, 0.0]);
    model.divide(edge, Some(tool), false).unwrap();

    let halves = model.contents(edge);
    assert_eq!(halves.len(), 2);
    assert!(halves.iter().all(|h| h.kind() == TopologyType::Edge));
}

#[test]
fn face_dictionary_survives_union_with_a_disjoint_cell() {
    init_tracing();
    let mut model = Model::new();
    let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
    let b = model.cell_box([3.0; 3], [4.0; 3]).unwrap();

    let north = model
        .faces(a.topology(), None)
        .unwrap()
        .into_iter()
        .find(|f| {
            let c = model.center_of_mass(f.topology()).unwrap();
            (c.y - 1.0).abs() < 1e-9
        })
        .unwrap();
    model.set_dictionary(north.topology(), tagged("north"));

    let union = model
        .union(a.topology(), Some(b.topology()), true)
        .unwrap()
        .unwrap();
    assert_eq!(union.kind(), TopologyType::Cluster);

    let mut found = Vec::new();
    for face in model.faces(union, None).unwrap() {
        let dict = model.dictionary(face.topology());
        if !dict.is_empty() {
            found.push((face, dict));
        }
    }
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1, tagged("north"));
    let c = model.center_of_mass(found[0].0.topology()).unwrap();
    assert_relative_eq!(c.y, 1.0, epsilon = 1e-9);
    assert!(!found[0].0.topology().is_same(&north.topology()));
}

#[test]
fn overlapping_cell_dictionaries_accumulate() {
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    model.set_dictionary(a.topology(), tagged("a"));
    model.set_dictionary(b.topology(), tagged("b"));

    let union = model
        .union(a.topology(), Some(b.topology()), true)
        .unwrap()
        .unwrap();
    let dict = model.dictionary(union);
    assert_eq!(
        dict.get("name"),
        Some(&DictValue::List(vec![
            DictValue::from("a"),
            DictValue::from("b")
        ]))
    );
}

#[test]
fn contents_move_to_the_result() {
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let chair = model.vertex_by_coordinates(0.25, 0.5, 0.5).unwrap().topology();
    model.add_content(a.topology(), chair).unwrap();

    let rest = model
        .difference(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert!(model.contents(a.topology()).is_empty());
    assert_eq!(model.contents(rest), vec![chair]);
    let contexts = model.contexts(chair);
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].host.is_same(&rest));
}

#[test]
fn result_identity_is_fresh_and_stable() {
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let union = model
        .union(a.topology(), Some(b.topology()), false)
        .unwrap()
        .unwrap();
    assert!(!union.is_same(&a.topology()));
    let guid = model.instance_guid(union).unwrap();
    let again = model.by_shape(union.shape(), None).unwrap();
    assert_eq!(model.instance_guid(again).unwrap(), guid);
}

#[test]
fn divide_records_pieces_as_contents() {
    init_tracing();
    let mut model = Model::new();
    let (a, b) = offset_cubes(&mut model);
    let result = model
        .divide(a.topology(), Some(b.topology()), false)
        .unwrap();
    let pieces = model.contents(a.topology());
    assert_eq!(pieces.len(), 2);
    assert!(pieces.iter().all(|p| p.kind() == TopologyType::Cell));
    // `a` has no host, so the copy is of `a` itself
    assert_eq!(model.contents(result).len(), 2);
}

#[test]
fn self_merge_rebuilds_cells_from_faces() {
    init_tracing();
    let mut model = Model::new();
    let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
    let faces: Vec<Topology> = model
        .faces(cell.topology(), None)
        .unwrap()
        .into_iter()
        .map(|f| f.topology())
        .collect();
    let loose = model.cluster_by_topologies(&faces).unwrap();

    let merged = model.self_merge(loose.topology()).unwrap().unwrap();
    assert_eq!(merged.kind(), TopologyType::Cell);
    assert_relative_eq!(total_volume(&mut model, merged), 1.0, epsilon = 1e-6);
}
