// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

// --- define_id! macro tests ---

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn generated_ids_carry_prefix_and_fit_buffer() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn generated_ids_are_unique() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
}

#[test]
fn hash_map_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(TestId::from_string("tst-k"), 42);
    assert_eq!(map.get("tst-k"), Some(&42));
}

#[test]
fn suffix_strips_prefix() {
    let id = TestId::from_string("tst-abcdef");
    assert_eq!(id.suffix(), "abcdef");
}

#[test]
fn short_truncates_suffix() {
    let id = TestId::from_string("tst-abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
    assert_eq!(id.short(100), "abcdefghijklmnop");
}

#[test]
fn serde_is_transparent() {
    let id = TestId::from_string("tst-abc");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"tst-abc\"");
    let parsed: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn deserialize_rejects_oversized_ids() {
    let long = format!("\"{}\"", "x".repeat(ID_MAX_LEN + 1));
    assert!(serde_json::from_str::<TestId>(&long).is_err());
}

// --- short() tests ---

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

// --- IdBuf tests ---

#[test]
fn empty_idbuf_is_empty() {
    assert!(IdBuf::empty().is_empty());
    assert_eq!(IdBuf::empty().as_str(), "");
}
