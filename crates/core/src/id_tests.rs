// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};

#[test]
fn wave_id_new_and_as_str() {
    let id = WaveId::new("abc");
    assert_eq!(id.as_str(), "abc");
    assert_eq!(id.to_string(), "abc");
}

#[test]
fn wave_id_conversions() {
    let owned: WaveId = String::from("owned").into();
    let borrowed: WaveId = "borrowed".into();
    assert_eq!(owned, "owned");
    assert_eq!(borrowed, *"borrowed");
}

#[test]
fn wave_id_map_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(WaveId::new("k"), 42);
    assert_eq!(map.get("k"), Some(&42));

    let id = WaveId::new("key");
    let borrowed: &str = id.borrow();
    assert_eq!(borrowed, "key");
}

#[test]
fn wave_id_orders_for_btree_keys() {
    let mut map = BTreeMap::new();
    map.insert(WaveId::new("b"), 2);
    map.insert(WaveId::new("a"), 1);
    let keys: Vec<_> = map.keys().map(WaveId::as_str).collect();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn wave_id_serializes_as_plain_string() {
    let id = WaveId::new("serde-test");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"serde-test\"");
    let back: WaveId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn uuid_gen_creates_unique_ids() {
    let id_gen = UuidIdGen;
    let id1 = id_gen.next();
    let id2 = id_gen.next();
    assert_ne!(id1, id2);
    assert_eq!(id1.len(), 36);
}

#[test]
fn sequential_gen_creates_predictable_ids() {
    let id_gen = SequentialIdGen::new("test");
    assert_eq!(id_gen.next(), "test-1");
    assert_eq!(id_gen.next(), "test-2");
}

#[test]
fn sequential_gen_clones_share_counter() {
    let id_gen = SequentialIdGen::default();
    let clone = id_gen.clone();
    assert_eq!(id_gen.next(), "wave-1");
    assert_eq!(clone.next(), "wave-2");
}
