//! # Basic TDB Store Usage Example
//!
//! Creates a dataset in a temporary directory, stores a few triples, a quad
//! and a prefix, queries them, then reopens the location and queries again.

use anyhow::Result;
use tdb_store::dictionary::term::XSD;
use tdb_store::store::DEFAULT_GRAPH;
use tdb_store::{build_dataset, DatasetRegistry, Location, Node, Quad, SystemConfig, Triple};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let location = Location::dir(dir.path());
    let config = SystemConfig::load()?;

    let person = Node::iri("http://example.org/person/john");
    let name = Node::iri("http://xmlns.com/foaf/0.1/name");
    let age = Node::iri("http://example.org/age");
    let rdf_type = Node::iri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
    let person_class = Node::iri("http://xmlns.com/foaf/0.1/Person");

    {
        let ds = build_dataset(&location, &config)?;
        ds.add_triple(&Triple::new(person.clone(), name.clone(), Node::literal("John Doe")))?;
        ds.add_triple(&Triple::new(
            person.clone(),
            age.clone(),
            Node::typed_literal("30", format!("{XSD}integer")),
        ))?;
        ds.add_triple(&Triple::new(person.clone(), rdf_type.clone(), person_class.clone()))?;
        ds.add_quad(&Quad::new(
            Node::iri("http://example.org/graphs/people"),
            person.clone(),
            name.clone(),
            Node::lang_literal("Jean", "fr"),
        ))?;
        ds.prefixes()
            .insert_prefix(DEFAULT_GRAPH, "foaf", "http://xmlns.com/foaf/0.1/")?;

        println!("Stored {} triples and {} quads", ds.count_triples()?, ds.count_quads()?);

        let age_id = ds.id_for(&Node::typed_literal("30", format!("{XSD}integer")))?;
        println!("Inline id for age: {age_id} ({:?})", age_id.kind());

        for triple in ds.find_triples(Some(&person), None, None)? {
            println!("  {}", triple?);
        }
        ds.close()?;
    }

    // Reopen through a registry
    let registry = DatasetRegistry::new(config);
    let ds = registry.open(&location)?;
    println!("Reopened with {} triples", ds.count_triples()?);
    for quad in ds.find_quads(None, None, Some(&name), None)? {
        println!("  {}", quad?);
    }
    for (prefix, uri) in ds.prefixes().read_prefix_map(DEFAULT_GRAPH)? {
        println!("  PREFIX {prefix}: <{uri}>");
    }
    registry.close_all()?;
    Ok(())
}
