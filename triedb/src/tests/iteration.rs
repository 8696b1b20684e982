use std::collections::BTreeMap;

use common::MemoryDB;

use crate::secure::{FatTrie, HashedTrie};
use crate::tests::{populated, FOUR_PAIRS};
use crate::trie::Trie;

fn collect(trie: &Trie<'_, MemoryDB>) -> Vec<(Vec<u8>, Vec<u8>)> {
    trie.iter().unwrap().map(|item| item.unwrap()).collect()
}

#[test]
fn yields_pairs_in_key_order() {
    let mut db = MemoryDB::new();
    let trie = populated(&mut db, &FOUR_PAIRS);
    assert_eq!(
        collect(&trie),
        vec![
            (b"do".to_vec(), b"verb".to_vec()),
            (b"dog".to_vec(), b"puppy".to_vec()),
            (b"doge".to_vec(), b"coin".to_vec()),
            (b"horse".to_vec(), b"stallion".to_vec()),
        ]
    );
}

#[test]
fn empty_trie_yields_nothing() {
    let mut db = MemoryDB::new();
    let trie = Trie::new(&mut db).unwrap();
    assert!(collect(&trie).is_empty());
    assert!(trie.iter().unwrap().is_end());
    assert!(trie.iter().unwrap() == trie.end());
}

#[test]
fn branch_value_precedes_descendants() {
    let mut db = MemoryDB::new();
    let trie = populated(&mut db, &[(b"dog", b"puppy"), (b"do", b"verb")]);
    assert_eq!(
        collect(&trie),
        vec![
            (b"do".to_vec(), b"verb".to_vec()),
            (b"dog".to_vec(), b"puppy".to_vec()),
        ]
    );
}

#[test]
fn lower_bound_positions_at_first_key_not_below() {
    let mut db = MemoryDB::new();
    let trie = populated(&mut db, &FOUR_PAIRS);

    let mut iter = trie.lower_bound(b"dog").unwrap();
    assert_eq!(iter.next().unwrap().unwrap().0, b"dog".to_vec());

    // between stored keys
    let mut iter = trie.lower_bound(b"dogf").unwrap();
    assert_eq!(iter.next().unwrap().unwrap().0, b"horse".to_vec());

    // past every key
    let iter = trie.lower_bound(b"zebra").unwrap();
    assert!(iter.is_end());
    assert!(trie.lower_bound(b"zebra").unwrap() == trie.end());
}

#[test]
fn exhausted_iterator_equals_end() {
    let mut db = MemoryDB::new();
    let trie = populated(&mut db, &FOUR_PAIRS);
    let mut iter = trie.iter().unwrap();
    while iter.next().is_some() {}
    assert!(iter == trie.end());
}

#[test]
fn hashed_trie_iteration_is_disabled() {
    let mut db = MemoryDB::new();
    let mut trie = HashedTrie::new(&mut db).unwrap();
    for (key, value) in FOUR_PAIRS {
        trie.insert(key, value).unwrap();
    }
    assert_eq!(trie.iter().count(), 0);
}

#[test]
fn fat_trie_iteration_restores_plaintext_keys() {
    let mut db = MemoryDB::new();
    let mut trie = FatTrie::new(&mut db).unwrap();
    for (key, value) in FOUR_PAIRS {
        trie.insert(key, value).unwrap();
    }

    // order follows the hashed keys, so compare as a map
    let seen: BTreeMap<Vec<u8>, Vec<u8>> = trie
        .iter()
        .unwrap()
        .map(|item| item.unwrap())
        .collect();
    let expected: BTreeMap<Vec<u8>, Vec<u8>> = FOUR_PAIRS
        .iter()
        .map(|(key, value)| (key.to_vec(), value.to_vec()))
        .collect();
    assert_eq!(seen, expected);
}
