use anyhow::Result;
use std::sync::Arc;
use std::thread;
use tdb_store::base::properties;
use tdb_store::dictionary::term::XSD;
use tdb_store::store::DEFAULT_GRAPH;
use tdb_store::{
    build_dataset, DatasetGraphTdb, DatasetRegistry, Location, Node, NodeId, Quad, SystemConfig,
    TdbError, Triple,
};
use tempfile::TempDir;

fn iri(local: &str) -> Node {
    Node::iri(format!("http://example/{local}"))
}

/// Small blocks so that a few hundred tuples already build multi-level trees
fn tiny_config() -> SystemConfig {
    SystemConfig {
        node2id_cache_size: 4,
        id2node_cache_size: 4,
        node_miss_cache_size: 2,
        block_read_cache_size: 8,
        block_write_cache_size: 0,
        block_size: 256,
    }
}

fn sorted_triples(ds: &DatasetGraphTdb, s: Option<&Node>, p: Option<&Node>, o: Option<&Node>) -> Result<Vec<String>> {
    let mut out = ds
        .find_triples(s, p, o)?
        .map(|t| t.map(|t| t.to_string()))
        .collect::<tdb_store::Result<Vec<_>>>()?;
    out.sort();
    Ok(out)
}

#[test]
fn test_end_to_end_in_memory() -> Result<()> {
    let ds = build_dataset(&Location::mem(), &SystemConfig::default())?;
    let a = ds.id_for(&iri("s"))?;
    assert_eq!(ds.id_for(&iri("s"))?, a);
    let p = ds.id_for(&iri("p"))?;
    let o = ds.id_for(&iri("o"))?;
    assert!(ds.insert_triple_ids(&[a, p, o])?);

    let spo = &ds.triple_table().tuple_table().indexes()[0];
    assert_eq!(spo.name(), "SPO");
    let by_subject = spo.find(&[Some(a), None, None])?.collect::<tdb_store::Result<Vec<_>>>()?;
    assert_eq!(by_subject, vec![vec![a, p, o]]);

    let pos = &ds.triple_table().tuple_table().indexes()[1];
    assert_eq!(pos.name(), "POS");
    assert_eq!(pos.all()?.count(), 1);
    assert_eq!(ds.node_for(a)?, iri("s"));
    Ok(())
}

#[test]
fn test_every_index_finds_every_tuple() -> Result<()> {
    let ds = build_dataset(&Location::mem(), &tiny_config())?;
    let mut tuples = Vec::new();
    for i in 0..40 {
        let s = ds.id_for(&iri(&format!("s{}", i % 7)))?;
        let p = ds.id_for(&iri(&format!("p{}", i % 3)))?;
        let o = ds.id_for(&Node::literal(format!("o{i}")))?;
        ds.insert_triple_ids(&[s, p, o])?;
        tuples.push([s, p, o]);
    }
    assert_eq!(ds.count_triples()?, 40);

    for index in ds.triple_table().tuple_table().indexes() {
        for t in &tuples {
            // Bind exactly the leading column of this index's order
            let lead = index.column_map().source_of(0);
            let mut pattern = [None; 3];
            pattern[lead] = Some(t[lead]);
            let found = index.find(&pattern)?.collect::<tdb_store::Result<Vec<_>>>()?;
            assert!(found.contains(&t.to_vec()), "{} missing {:?}", index.name(), t);
            assert!(found.iter().all(|f| f[lead] == t[lead]));
        }
    }
    Ok(())
}

#[test]
fn test_node_round_trip_through_cache_eviction() -> Result<()> {
    let ds = build_dataset(&Location::mem(), &tiny_config())?;
    let nodes: Vec<Node> = (0..50)
        .map(|i| match i % 5 {
            0 => iri(&format!("r{i}")),
            1 => Node::literal(format!("plain \"{i}\"\n")),
            2 => Node::lang_literal(format!("hola {i}"), "es"),
            3 => Node::typed_literal(i.to_string(), format!("{XSD}integer")),
            _ => Node::blank_node(format!("b{i}")),
        })
        .collect();
    let ids = nodes
        .iter()
        .map(|n| ds.id_for(n))
        .collect::<tdb_store::Result<Vec<NodeId>>>()?;
    for (node, id) in nodes.iter().zip(&ids) {
        assert_eq!(&ds.node_for(*id)?, node);
        assert_eq!(ds.id_for(node)?, *id);
        assert_eq!(ds.lookup_id(node)?, Some(*id));
    }
    Ok(())
}

#[test]
fn test_reopen_reproduces_results() -> Result<()> {
    let dir = TempDir::new()?;
    let location = Location::dir(dir.path());
    let subjects: Vec<Node> = (0..5).map(|i| iri(&format!("s{i}"))).collect();

    let before = {
        let ds = build_dataset(&location, &tiny_config())?;
        for i in 0..300 {
            let t = Triple::new(
                subjects[i % 5].clone(),
                iri(&format!("p{}", i % 4)),
                Node::literal(format!("value {i}")),
            );
            ds.add_triple(&t)?;
        }
        ds.add_quad(&Quad::new(iri("g"), iri("s0"), iri("p0"), iri("o")))?;
        ds.prefixes().insert_prefix(DEFAULT_GRAPH, "ex", "http://example/")?;
        let results = (
            sorted_triples(&ds, None, None, None)?,
            sorted_triples(&ds, Some(&subjects[2]), None, None)?,
            sorted_triples(&ds, None, Some(&iri("p3")), None)?,
        );
        ds.sync()?;
        ds.close()?;
        results
    };

    let ds = build_dataset(&location, &tiny_config())?;
    assert_eq!(before.0.len(), 300);
    assert_eq!(sorted_triples(&ds, None, None, None)?, before.0);
    assert_eq!(sorted_triples(&ds, Some(&subjects[2]), None, None)?, before.1);
    assert_eq!(sorted_triples(&ds, None, Some(&iri("p3")), None)?, before.2);
    assert_eq!(ds.count_quads()?, 1);
    assert_eq!(
        ds.prefixes().read_prefix(DEFAULT_GRAPH, "ex")?.as_deref(),
        Some("http://example/")
    );
    Ok(())
}

#[test]
fn test_mismatched_order_on_reopen_is_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    let location = Location::dir(dir.path());
    build_dataset(&location, &tiny_config())?.close()?;

    let meta = dir.path().join("OSP.info");
    let mut props = properties::load(&meta)?;
    let order: usize = props["tdb.bplustree.order"].parse()?;
    props.insert("tdb.bplustree.order".into(), (order + 1).to_string());
    properties::store(&meta, &props, None)?;

    let err = build_dataset(&location, &tiny_config()).unwrap_err();
    assert!(matches!(err, TdbError::CorruptLayout(_)), "{err}");
    assert!(err.is_fatal());
    Ok(())
}

#[test]
fn test_unknown_id_is_local_error() -> Result<()> {
    let ds = build_dataset(&Location::mem(), &SystemConfig::default())?;
    ds.id_for(&iri("x"))?;
    let bogus = NodeId::from_table_offset(1_000_000)?;
    assert!(matches!(ds.node_for(bogus), Err(TdbError::UnknownNodeId(_))));
    // The dataset stays usable
    assert_eq!(ds.node_for(ds.id_for(&iri("x"))?)?, iri("x"));
    Ok(())
}

#[test]
fn test_nodes_without_canonical_form_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let location = Location::dir(dir.path());
    let lang = Node::lang_literal("x", "en");
    let both = Node::Literal {
        value: "x".into(),
        datatype: Some(format!("{XSD}string")),
        language: Some("en".into()),
    };
    let lang_id = {
        let ds = build_dataset(&location, &tiny_config())?;
        let lang_id = ds.id_for(&lang)?;
        for bad in [both.clone(), Node::blank_node(""), Node::lang_literal("x", "")] {
            assert!(matches!(ds.id_for(&bad), Err(TdbError::InvalidNode(_))), "{bad:?}");
            assert!(matches!(
                ds.add_triple(&Triple::new(iri("s"), iri("p"), bad.clone())),
                Err(TdbError::InvalidNode(_))
            ));
        }
        assert_eq!(ds.count_triples()?, 0);
        ds.close()?;
        lang_id
    };

    let ds = build_dataset(&location, &tiny_config())?;
    assert_eq!(ds.node_for(lang_id)?, lang);
    assert_eq!(ds.lookup_id(&lang)?, Some(lang_id));
    assert!(matches!(ds.lookup_id(&both), Err(TdbError::InvalidNode(_))));
    Ok(())
}

#[test]
fn test_concurrent_readers_and_writers() -> Result<()> {
    let ds = Arc::new(build_dataset(&Location::mem(), &tiny_config())?);
    let writers: Vec<_> = (0..4)
        .map(|w| {
            let ds = ds.clone();
            thread::spawn(move || -> tdb_store::Result<()> {
                for i in 0..25 {
                    ds.add_triple(&Triple::new(
                        iri(&format!("w{w}")),
                        iri("p"),
                        Node::literal(i.to_string()),
                    ))?;
                }
                Ok(())
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ds = ds.clone();
            thread::spawn(move || -> tdb_store::Result<()> {
                for _ in 0..25 {
                    ds.count_triples()?;
                    ds.contains_triple(&Triple::new(iri("w0"), iri("p"), Node::literal("0")))?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in writers.into_iter().chain(readers) {
        handle.join().map_err(|_| anyhow::anyhow!("thread panicked"))??;
    }
    assert_eq!(ds.count_triples()?, 100);
    assert_eq!(ds.policy().readers(), 0);
    assert_eq!(ds.policy().writers(), 0);
    Ok(())
}

#[test]
fn test_iteration_invalidated_by_update() -> Result<()> {
    let ds = build_dataset(&Location::mem(), &SystemConfig::default())?;
    let s = ds.id_for(&iri("s"))?;
    let p = ds.id_for(&iri("p"))?;
    for i in 0..3 {
        let o = ds.id_for(&Node::literal(i.to_string()))?;
        ds.insert_triple_ids(&[s, p, o])?;
    }
    let mut scan = ds.scan_triples(&[Some(s), None, None])?;
    assert!(scan.next().is_some());
    ds.delete_triple_ids(&[s, p, ds.id_for(&Node::literal("2"))?])?;
    assert!(matches!(
        scan.next(),
        Some(Err(TdbError::ConcurrentModification { .. }))
    ));

    // A fresh scan sees the new state
    assert_eq!(ds.scan_triples(&[Some(s), None, None])?.count(), 2);
    Ok(())
}

#[test]
fn test_registry_lifecycle() -> Result<()> {
    let dir = TempDir::new()?;
    let registry = DatasetRegistry::new(tiny_config());
    let location = Location::dir(dir.path());
    let ds = registry.open(&location)?;
    ds.add_triple(&Triple::new(iri("s"), iri("p"), iri("o")))?;
    assert!(Arc::ptr_eq(&ds, &registry.open(&location)?));
    registry.close_all()?;
    assert!(matches!(ds.count_triples(), Err(TdbError::Closed(_))));

    let reopened = registry.open(&location)?;
    assert_eq!(reopened.count_triples()?, 1);
    Ok(())
}

#[test]
fn test_legacy_location_opens() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("SPO.idn"), [])?;
    let ds = build_dataset(&Location::dir(dir.path()), &tiny_config())?;
    ds.add_triple(&Triple::new(iri("s"), iri("p"), iri("o")))?;
    ds.close()?;
    let meta = properties::load(&dir.path().join("this.info"))?;
    assert_eq!(meta["tdb.create.version"], "0.8");
    Ok(())
}
