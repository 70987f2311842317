//! Tests for the read and write views.

use std::cell::RefCell;
use std::rc::Rc;

use membrain::{
    Dependency, Entry, Key, Membrain, MembrainError, NodeKind, ReadableNode, WritableNode,
};
use serde_json::{json, Value};

fn with_state(state: Value) -> Membrain {
    let Value::Object(map) = state else {
        panic!("state must be an object");
    };
    Membrain::builder().initial_state(map).build()
}

fn keys(membrain: &Membrain, path: &str) -> Vec<Key> {
    membrain
        .dependencies(path)
        .into_iter()
        .map(|dependency| dependency.key)
        .collect()
}

// =============================================================================
// Read membrane
// =============================================================================

#[test]
fn test_reads_are_recorded_at_every_depth() {
    let mut membrain = with_state(json!({"a": {"b": {"c": 1}}}));
    membrain
        .add_getter("deep", |view| {
            let c = view
                .view("a")
                .and_then(|a| a.view("b"))
                .and_then(|b| b.i64("c"));
            Ok(json!(c))
        })
        .unwrap();

    let deps = membrain.dependencies("deep");
    assert_eq!(keys(&membrain, "deep"), vec![Key::from("a"), Key::from("b"), Key::from("c")]);
    assert_eq!(deps[0].node, membrain.root());
    assert_ne!(deps[1].node, deps[2].node);
}

#[test]
fn test_missing_keys_are_recorded() {
    let mut membrain = Membrain::new();
    membrain
        .add_getter("later", |view| Ok(json!(view.str("later"))))
        .unwrap();
    membrain.add_action("fill", |view, _| {
        view.set("later", "now")?;
        Ok(())
    });
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    membrain.watch("later", move |value| sink.borrow_mut().push(value.clone()));

    assert_eq!(membrain.get("later").unwrap(), Value::Null);
    membrain.dispatch("fill", Value::Null).unwrap();

    assert_eq!(*seen.borrow(), vec![json!("now")]);
}

#[test]
fn test_null_property_is_a_leaf() {
    let mut membrain = with_state(json!({"empty": null}));
    membrain
        .add_getter("probe", |view| {
            let entry = view.get("empty").expect("present");
            assert!(entry.is_null());
            assert!(entry.leaf().is_some());
            assert!(view.view("empty").is_none());
            Ok(json!({"null": entry.is_null()}))
        })
        .unwrap();

    assert_eq!(membrain.get("probe").unwrap(), json!({"null": true}));
}

#[test]
fn test_null_property_through_write_view() {
    let mut membrain = with_state(json!({"empty": null}));
    membrain.add_action("probe", |view, _| {
        assert!(view.view("empty").is_none());
        assert!(matches!(view.get("empty"), Some(Entry::Leaf(Value::Null))));
        view.set("empty", json!({"filled": true}))?;
        Ok(())
    });

    membrain.dispatch("probe", Value::Null).unwrap();

    assert_eq!(membrain.state(), json!({"empty": {"filled": true}}));
}

#[test]
fn test_write_through_read_view_is_dropped() {
    let mut membrain = with_state(json!({"count": 3}));
    membrain
        .add_getter("sneaky", |mut view| {
            view.write(Key::from("count"), json!(100))?;
            Ok(json!(view.i64("count")))
        })
        .unwrap();

    assert_eq!(membrain.get("sneaky").unwrap(), json!(3));
    assert_eq!(membrain.state(), json!({"count": 3}));
}

#[test]
fn test_snapshot_records_nothing() {
    let mut membrain = with_state(json!({"user": {"name": "ada"}}));
    membrain
        .add_getter("user", |view| {
            Ok(view.view("user").map_or(Value::Null, |user| user.snapshot()))
        })
        .unwrap();

    assert_eq!(keys(&membrain, "user"), vec![Key::from("user")]);
}

#[test]
fn test_items_records_shape_and_each_key() {
    let mut membrain = with_state(json!({"scores": {"ada": 3, "grace": 4}}));
    membrain
        .add_getter("total", |view| {
            let total: i64 = view
                .view("scores")
                .map(|scores| {
                    scores
                        .items()
                        .iter()
                        .filter_map(|(_, score)| score.as_i64())
                        .sum::<i64>()
                })
                .unwrap_or(0);
            Ok(json!(total))
        })
        .unwrap();

    assert_eq!(membrain.get("total").unwrap(), json!(7));
    assert_eq!(
        keys(&membrain, "total"),
        vec![
            Key::from("scores"),
            Key::Shape,
            Key::from("ada"),
            Key::from("grace")
        ]
    );
}

#[test]
fn test_list_views() {
    let mut membrain = with_state(json!({"items": ["a", "b"]}));
    membrain
        .add_getter("last", |view| {
            let items = view.view("items").expect("items");
            assert!(items.is_list());
            let last = items
                .keys()
                .last()
                .and_then(Key::as_index)
                .and_then(|i| items.str(i));
            Ok(json!(last))
        })
        .unwrap();

    assert_eq!(membrain.get("last").unwrap(), json!("b"));
}

// =============================================================================
// Write membrane
// =============================================================================

#[test]
fn test_write_view_reads_are_not_recorded() {
    let mut membrain = with_state(json!({"a": {"b": 1}}));
    membrain.add_action("read_only", |view, _| {
        let a = view.view("a").expect("a");
        assert_eq!(a.i64("b"), Some(1));
        assert_eq!(a.keys(), vec![Key::from("b")]);
        Ok(())
    });
    membrain.dispatch("read_only", Value::Null).unwrap();

    assert!(membrain.dependencies("read_only").is_empty());
}

#[test]
fn test_write_view_entries() {
    let mut membrain = with_state(json!({"a": {"b": 1}, "n": 2}));
    membrain.add_action("inspect", |view, _| {
        match view.get("n") {
            Some(Entry::Leaf(value)) => assert_eq!(value, json!(2)),
            other => panic!("expected leaf, got {:?}", other),
        }
        let mut a = view.get("a").and_then(Entry::into_node).expect("node");
        a.set("b", 5)?;
        assert_eq!(view.value("a"), Some(json!({"b": 5})));
        Ok(())
    });

    membrain.dispatch("inspect", Value::Null).unwrap();
    assert_eq!(membrain.state(), json!({"a": {"b": 5}, "n": 2}));
}

#[test]
fn test_set_rejects_mismatched_keys() {
    let mut membrain = with_state(json!({"list": [], "map": {}}));
    membrain.add_action("bad_index", |view, _| {
        view.view("map").expect("map").set(0usize, 1)?;
        Ok(())
    });
    membrain.add_action("bad_field", |view, _| {
        view.view("list").expect("list").set("name", 1)?;
        Ok(())
    });
    membrain.add_action("bad_pop", |view, _| {
        view.view("map").expect("map").pop()?;
        Ok(())
    });

    let err = membrain.dispatch("bad_index", Value::Null).unwrap_err();
    assert!(matches!(
        err,
        MembrainError::InvalidKey {
            key: Key::Index(0),
            kind: NodeKind::Map
        }
    ));
    let err = membrain.dispatch("bad_field", Value::Null).unwrap_err();
    assert!(matches!(err, MembrainError::InvalidKey { kind: NodeKind::List, .. }));
    assert!(membrain.dispatch("bad_pop", Value::Null).is_err());
    assert_eq!(membrain.state(), json!({"list": [], "map": {}}));
}

#[test]
fn test_set_past_end_of_list_is_rejected() {
    let mut membrain = with_state(json!({"list": [1]}));
    membrain.add_action("set_at", |view, payload| {
        let index = payload.as_u64().map_or(usize::MAX, |index| index as usize);
        view.view("list").expect("list").set(index, 4)?;
        Ok(())
    });

    let err = membrain.dispatch("set_at", json!(3)).unwrap_err();
    assert!(matches!(
        err,
        MembrainError::IndexOutOfBounds { index: 3, len: 1 }
    ));
    let err = membrain.dispatch("set_at", Value::Null).unwrap_err();
    assert!(matches!(
        err,
        MembrainError::IndexOutOfBounds {
            index: usize::MAX,
            len: 1
        }
    ));
    assert_eq!(membrain.state(), json!({"list": [1]}));
    assert_eq!(membrain.node_count(), 2);

    // Writing at the length appends.
    membrain.dispatch("set_at", json!(1)).unwrap();
    assert_eq!(membrain.state(), json!({"list": [1, 4]}));
}

#[test]
fn test_link_past_end_of_list_is_rejected() {
    let mut membrain = with_state(json!({"list": [], "shared": {}}));
    membrain.add_action("link_far", |view, _| {
        let shared = view.view("shared").expect("shared").node_id();
        view.view("list").expect("list").link(5usize, shared)?;
        Ok(())
    });

    let err = membrain.dispatch("link_far", Value::Null).unwrap_err();

    assert!(matches!(err, MembrainError::IndexOutOfBounds { index: 5, len: 0 }));
}

#[test]
fn test_link_rejects_cycles_and_unknown_nodes() {
    let mut membrain = with_state(json!({"a": {"b": {}}}));
    membrain.add_action("cycle", |view, _| {
        let a = view.view("a").expect("a").node_id();
        let mut a_view = view.view("a").expect("a");
        let mut b = a_view.view("b").expect("b");
        b.link("back", a)?;
        Ok(())
    });
    membrain.add_action("root_under_a", |view, _| {
        let root = view.node_id();
        view.view("a").expect("a").link("root", root)?;
        Ok(())
    });

    let err = membrain.dispatch("cycle", Value::Null).unwrap_err();
    assert!(matches!(err, MembrainError::Cycle { .. }));
    let err = membrain.dispatch("root_under_a", Value::Null).unwrap_err();
    assert!(matches!(err, MembrainError::Cycle { .. }));
    assert_eq!(membrain.state(), json!({"a": {"b": {}}}));
}

#[test]
fn test_remove_missing_field_is_a_noop() {
    let mut membrain = with_state(json!({"a": 1}));
    membrain
        .add_getter("shape", |view| Ok(json!(view.len())))
        .unwrap();
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    membrain.watch("shape", move |_| *counter.borrow_mut() += 1);
    membrain.add_action("remove", |view, payload| {
        let removed = view.remove(payload.as_str().unwrap_or_default())?;
        assert_eq!(removed.is_some(), payload.as_str() == Some("a"));
        Ok(())
    });

    membrain.dispatch("remove", json!("missing")).unwrap();
    assert_eq!(*calls.borrow(), 0);
    membrain.dispatch("remove", json!("a")).unwrap();
    assert_eq!(*calls.borrow(), 1);
}

// =============================================================================
// Node traits
// =============================================================================

fn read_count<N: ReadableNode>(node: &mut N) -> Option<i64> {
    node.read(Key::from("count")).and_then(|entry| entry.as_i64())
}

fn bump<N: ReadableNode + WritableNode>(node: &mut N) -> Result<(), MembrainError> {
    let count = read_count(node).unwrap_or(0);
    node.write(Key::from("count"), json!(count + 1))
}

#[test]
fn test_same_routine_through_both_views() {
    let mut membrain = with_state(json!({"count": 1}));
    membrain
        .add_getter("bumped_in_getter", |mut view| {
            bump(&mut view)?;
            Ok(json!(read_count(&mut view)))
        })
        .unwrap();
    membrain.add_action("bump", |view, _| {
        bump(view)?;
        Ok(())
    });

    // The getter's write is dropped.
    assert_eq!(membrain.get("bumped_in_getter").unwrap(), json!(1));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    membrain.watch("bumped_in_getter", move |value| sink.borrow_mut().push(value.clone()));
    membrain.dispatch("bump", Value::Null).unwrap();

    assert_eq!(*seen.borrow(), vec![json!(2)]);
    assert_eq!(
        membrain.dependencies("bumped_in_getter"),
        vec![Dependency {
            node: membrain.root(),
            key: Key::from("count")
        }]
    );
}
