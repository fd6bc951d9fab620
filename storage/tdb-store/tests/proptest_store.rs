//! Property-based tests for the node table and the B+Tree

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tdb_store::base::{BlockCache, FileSet, RecordFactory};
use tdb_store::dictionary::term::XSD;
use tdb_store::{
    build_dataset, BPlusTree, BPlusTreeParams, Location, Node, NodeId, RangeIndex, SystemConfig,
    TdbError,
};

fn node_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        ".{0,24}".prop_map(|s| Node::iri(format!("http://example.org/{s}"))),
        ".{0,24}".prop_map(Node::literal),
        (".{0,12}", "[a-z]{2}(-[A-Z]{2})?").prop_map(|(v, l)| Node::lang_literal(v, l)),
        any::<i64>().prop_map(|i| Node::typed_literal(i.to_string(), format!("{XSD}integer"))),
        "[0-9]{1,4}".prop_map(|s| Node::typed_literal(s, format!("{XSD}integer"))),
        any::<bool>().prop_map(|b| Node::typed_literal(b.to_string(), format!("{XSD}boolean"))),
        ".{1,10}".prop_map(Node::blank_node),
        (".{0,12}", ".{0,24}").prop_map(|(v, dt)| Node::typed_literal(v, format!("http://example.org/dt/{dt}"))),
    ]
}

/// Any node the API can construct, including ones with no canonical form
fn raw_node_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        3 => node_strategy(),
        1 => (".{0,8}", prop::option::of(".{0,12}"), prop::option::of(".{0,4}")).prop_map(
            |(value, datatype, language)| Node::Literal { value, datatype, language }
        ),
        1 => ".{0,3}".prop_map(Node::blank_node),
    ]
}

/// No node caches, so every answer comes from the stored tables
fn uncached_config() -> SystemConfig {
    SystemConfig {
        node2id_cache_size: 0,
        id2node_cache_size: 0,
        node_miss_cache_size: 0,
        ..SystemConfig::small()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u16),
    Delete(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u16..400, any::<u16>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (0u16..400).prop_map(Op::Delete),
    ]
}

fn small_tree() -> BPlusTree {
    let rf = RecordFactory::new(2, 2).unwrap();
    let params = BPlusTreeParams::new(128, rf).unwrap();
    BPlusTree::open(
        &FileSet::new(&Location::mem(), "model"),
        params,
        0,
        Arc::new(BlockCache::new(8)),
    )
    .unwrap()
}

fn scan(tree: &BPlusTree, from: Option<u16>, to: Option<u16>) -> Vec<(u16, u16)> {
    let rf = tree.record_factory();
    let from = from.map(|k| rf.create_key(&k.to_be_bytes()).unwrap());
    let to = to.map(|k| rf.create_key(&k.to_be_bytes()).unwrap());
    tree.iter(from.as_ref(), to.as_ref())
        .unwrap()
        .map(|r| {
            let r = r.unwrap();
            (
                u16::from_be_bytes(r.key().try_into().unwrap()),
                u16::from_be_bytes(r.value().try_into().unwrap()),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_node_round_trip(nodes in prop::collection::vec(node_strategy(), 1..20)) {
        let ds = build_dataset(&Location::mem(), &SystemConfig::small()).unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| ds.id_for(n).unwrap()).collect();
        for (node, id) in nodes.iter().zip(&ids) {
            prop_assert_eq!(&ds.node_for(*id).unwrap(), node);
            prop_assert_eq!(ds.id_for(node).unwrap(), *id);
        }
    }

    #[test]
    fn test_canonical_form_parses_back(node in raw_node_strategy()) {
        match node.validate() {
            Ok(()) => prop_assert_eq!(Node::parse(&node.to_canonical()).unwrap(), node),
            Err(_) => prop_assert_ne!(Node::parse(&node.to_canonical()).ok(), Some(node)),
        }
    }

    #[test]
    fn test_ids_are_injective_without_caches(nodes in prop::collection::vec(raw_node_strategy(), 1..20)) {
        let ds = build_dataset(&Location::mem(), &uncached_config()).unwrap();
        let mut issued: Vec<(Node, NodeId)> = Vec::new();
        for node in nodes {
            match ds.id_for(&node) {
                Ok(id) => {
                    prop_assert_eq!(&ds.node_for(id).unwrap(), &node);
                    for (other, other_id) in &issued {
                        prop_assert_eq!(other == &node, *other_id == id);
                    }
                    issued.push((node, id));
                }
                Err(TdbError::InvalidNode(_)) => {
                    prop_assert!(node.validate().is_err());
                    prop_assert!(ds.lookup_id(&node).is_err());
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }
    }

    #[test]
    fn test_bplustree_matches_model(
        ops in prop::collection::vec(op_strategy(), 1..300),
        bounds in (0u16..400, 0u16..400),
    ) {
        let tree = small_tree();
        let rf = tree.record_factory();
        let mut model = BTreeMap::new();
        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let changed = model.insert(k, v) != Some(v);
                    let record = rf.create(&k.to_be_bytes(), &v.to_be_bytes()).unwrap();
                    prop_assert_eq!(tree.insert(record).unwrap(), changed);
                }
                Op::Delete(k) => {
                    let key = rf.create_key(&k.to_be_bytes()).unwrap();
                    prop_assert_eq!(tree.delete(&key).unwrap(), model.remove(&k).is_some());
                }
            }
        }
        let all: Vec<_> = model.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(scan(&tree, None, None), all);
        prop_assert_eq!(tree.count().unwrap(), model.len() as u64);

        let (lo, hi) = (bounds.0.min(bounds.1), bounds.0.max(bounds.1));
        let ranged: Vec<_> = model.range(lo..hi).map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(scan(&tree, Some(lo), Some(hi)), ranged);
    }
}
