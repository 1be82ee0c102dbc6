mod common;

use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use kira_celltype_mapper::domain::{NodeId, Organism};
use kira_celltype_mapper::error::KiraError;
use kira_celltype_mapper::fetch::{OntologyFetcher, fetch_release};
use kira_celltype_mapper::matcher::{CelltypeMatcher, MatchOptions};
use kira_celltype_mapper::ontology::OntologyGraph;
use kira_celltype_mapper::source::{DirectorySource, OntologySource};
use kira_celltype_mapper::store::{OntologyFormat, OntologyStore};

use common::human;

const OBO: &str = r#"format-version: 1.2
data-version: cl/releases/2022-01-05

[Term]
id: UBERON:0001264
name: pancreas

[Term]
id: UBERON:0000006
name: islet of Langerhans
synonym: "pancreatic islet" EXACT []
relationship: part_of UBERON:0001264 ! pancreas

[Term]
id: CL:0000000
name: cell

[Term]
id: CL:0000169
name: type B pancreatic cell
synonym: "beta cell" EXACT []
is_a: CL:0000000 ! cell
relationship: part_of UBERON:0000006 ! islet of Langerhans
"#;

const CL_ONLY: &str = r#"format-version: 1.2
data-version: cl/releases/2022-01-05

[Term]
id: CL:0000000
name: cell

[Term]
id: CL:0000169
name: type B pancreatic cell
synonym: "beta cell" EXACT []
is_a: CL:0000000 ! cell
relationship: part_of UBERON:0000006 ! islet of Langerhans

[Term]
id: CL:0000583
name: alveolar macrophage
is_a: CL:0000000 ! cell
relationship: part_of UBERON:0002299 ! alveolus of lung
"#;

const UBERON: &str = r#"format-version: 1.2
data-version: uberon/releases/2022-02-21/uberon-basic.owl

[Term]
id: UBERON:0001264
name: pancreas

[Term]
id: UBERON:0000006
name: islet of Langerhans
relationship: part_of UBERON:0001264 ! pancreas

[Term]
id: UBERON:0002048
name: lung

[Term]
id: UBERON:0002299
name: alveolus of lung
relationship: part_of UBERON:0002048 ! lung
"#;

const JSON: &str = r#"{
  "organism": "human",
  "version": "2022-01-05",
  "celltypes": [
    { "id": "CL:0000000", "name": "cell" },
    { "id": "CL:0000084", "name": "T cell", "parents": ["CL:0000000"] }
  ]
}"#;

fn store(dir: &TempDir) -> OntologyStore {
    OntologyStore::new_with_root(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
}

fn put(store: &OntologyStore, version: &str, format: OntologyFormat, contents: &[u8]) {
    OntologyStore::write_atomic(&store.release_path(&human(), version, format), contents).unwrap();
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn list_releases_sorted_and_filtered() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert!(store.list_releases(&human()).unwrap().is_empty());

    put(&store, "2022-01-05", OntologyFormat::Obo, OBO.as_bytes());
    put(&store, "2021-02-01", OntologyFormat::OboGz, &gzip(OBO));
    fs::write(store.organism_dir(&human()).join("README.txt"), "notes").unwrap();

    let releases = store.list_releases(&human()).unwrap();
    let listed = releases
        .iter()
        .map(|release| (release.version.as_str(), release.format))
        .collect::<Vec<_>>();
    assert_eq!(
        listed,
        vec![
            ("2021-02-01", OntologyFormat::OboGz),
            ("2022-01-05", OntologyFormat::Obo),
        ]
    );
}

#[test]
fn obo_release_builds_graph_with_anatomy() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    put(&store, "2022-01-05", OntologyFormat::Obo, OBO.as_bytes());
    let source = DirectorySource::new(store);

    let graph = OntologyGraph::build(&source, &human(), None).unwrap();
    assert_eq!(graph.version(), "2022-01-05");
    assert_eq!(graph.celltypes().len(), 2);
    assert_eq!(graph.anatomy().len(), 2);
    let beta = graph.node(&NodeId::new("CL:0000169")).unwrap();
    assert!(beta.located_in.contains(&NodeId::new("UBERON:0000006")));
    assert_eq!(
        graph.lookup_exact("beta cell", true),
        Some(&NodeId::new("CL:0000169"))
    );
}

#[test]
fn cell_ontology_release_merges_stored_anatomy() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    put(&store, "2022-01-05", OntologyFormat::Obo, CL_ONLY.as_bytes());
    let source = DirectorySource::new(store.clone());

    let alone = OntologyGraph::build(&source, &human(), None).unwrap();
    assert!(alone.anatomy().is_empty());
    let options = MatchOptions {
        anatomical_constraint: Some("pancreas".to_string()),
        ..MatchOptions::default()
    };
    let err = CelltypeMatcher::new(alone, options.clone()).unwrap_err();
    assert_matches!(err, KiraError::UnresolvedAnatomy(_));

    let anatomy = store.anatomy_path(&human(), "2022-01-05", OntologyFormat::OboGz);
    OntologyStore::write_atomic(&anatomy, &gzip(UBERON)).unwrap();
    assert_eq!(store.list_releases(&human()).unwrap().len(), 1);

    let merged = OntologyGraph::build(&source, &human(), None).unwrap();
    let beta = merged.node(&NodeId::new("CL:0000169")).unwrap();
    assert!(beta.located_in.contains(&NodeId::new("UBERON:0000006")));
    let matcher = CelltypeMatcher::new(merged, options).unwrap();
    assert_eq!(matcher.match_query("beta cell").names()[0], "type B pancreatic cell");
    assert!(!matcher.match_query("alveolar macrophage").names().contains(&"alveolar macrophage"));
}

#[test]
fn gzipped_release_is_read() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    put(&store, "2021-02-01", OntologyFormat::OboGz, &gzip(OBO));
    let source = DirectorySource::new(store);

    let spec = source.load(&human(), Some("2021-02-01")).unwrap();
    assert_eq!(spec.version, "2021-02-01");
    assert_eq!(spec.celltypes.len(), 2);
}

#[test]
fn json_wins_over_obo_for_same_version() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    put(&store, "2022-01-05", OntologyFormat::Obo, OBO.as_bytes());
    put(&store, "2022-01-05", OntologyFormat::Json, JSON.as_bytes());
    let source = DirectorySource::new(store);

    assert_eq!(source.versions(&human()).unwrap(), vec!["2022-01-05"]);
    let spec = source.load(&human(), None).unwrap();
    assert_eq!(spec.celltypes[1].name, "T cell");
    assert!(spec.anatomy.is_empty());
}

#[test]
fn json_release_must_match_its_path() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    put(&store, "2023-01-01", OntologyFormat::Json, JSON.as_bytes());
    let source = DirectorySource::new(store);

    let err = source.load(&human(), None).unwrap_err();
    assert_matches!(err, KiraError::InvalidOntology(_));
}

#[test]
fn empty_store_reports_unknown_organism() {
    let dir = TempDir::new().unwrap();
    let source = DirectorySource::new(store(&dir));
    let mouse: Organism = "mouse".parse().unwrap();
    let err = source.load(&mouse, None).unwrap_err();
    assert_matches!(err, KiraError::UnknownOrganism(_));
}

struct FakeFetcher {
    payload: &'static str,
    anatomy: &'static str,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn new(payload: &'static str, anatomy: &'static str) -> Self {
        Self {
            payload,
            anatomy,
            calls: AtomicUsize::new(0),
        }
    }
}

impl OntologyFetcher for FakeFetcher {
    fn download_obo(&self, _version: &str) -> Result<Vec<u8>, KiraError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.as_bytes().to_vec())
    }

    fn download_anatomy_obo(&self) -> Result<Vec<u8>, KiraError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.anatomy.as_bytes().to_vec())
    }
}

#[test]
fn fetch_downloads_once_then_uses_cache() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let fetcher = FakeFetcher::new(CL_ONLY, UBERON);

    let first = fetch_release(&fetcher, &store, &human(), "2022-01-05", false).unwrap();
    assert_eq!(first.action, "download");
    assert_eq!(first.data_version.as_deref(), Some("cl/releases/2022-01-05"));
    assert_eq!(
        first.anatomy_data_version.as_deref(),
        Some("uberon/releases/2022-02-21/uberon-basic.owl")
    );
    assert!(first.path.exists());
    assert!(first.anatomy_path.exists());

    let second = fetch_release(&fetcher, &store, &human(), "2022-01-05", false).unwrap();
    assert_eq!(second.action, "cache");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

    let forced = fetch_release(&fetcher, &store, &human(), "2022-01-05", true).unwrap();
    assert_eq!(forced.action, "download");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);

    let source = DirectorySource::new(store);
    assert_eq!(source.versions(&human()).unwrap(), vec!["2022-01-05"]);
}

#[test]
fn fetched_release_supports_anatomical_constraints() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let fetcher = FakeFetcher::new(CL_ONLY, UBERON);
    fetch_release(&fetcher, &store, &human(), "2022-01-05", false).unwrap();

    let graph = OntologyGraph::build(&DirectorySource::new(store), &human(), None).unwrap();
    assert_eq!(graph.anatomy().len(), 4);
    let options = MatchOptions {
        anatomical_constraint: Some("pancreas".to_string()),
        ..MatchOptions::default()
    };
    let matcher = CelltypeMatcher::new(graph, options).unwrap();
    let ids = matcher
        .pool()
        .entries()
        .iter()
        .map(|entry| entry.node_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["CL:0000169", "CL:0000169"]);
    assert_eq!(matcher.match_query("macrophage").names(), vec!["type B pancreatic cell"]);
}

#[test]
fn fetch_rejects_non_obo_payload() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let fetcher = FakeFetcher::new("<html>not found</html>", UBERON);

    let err = fetch_release(&fetcher, &store, &human(), "2022-01-05", false).unwrap_err();
    assert_matches!(err, KiraError::OntologyHttp(_));
    assert!(store.list_releases(&human()).unwrap().is_empty());
}
