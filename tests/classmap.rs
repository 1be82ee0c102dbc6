mod common;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::TempDir;

use kira_celltype_mapper::classmap::{ClassMap, UNKNOWN_ID, classmap_options, default_omit_list};
use kira_celltype_mapper::error::KiraError;
use kira_celltype_mapper::matcher::{CelltypeMatcher, MatchOptions};
use kira_celltype_mapper::ontology::OntologyGraph;
use kira_celltype_mapper::source::BuiltinSource;

use common::{fixture, human, term};

fn graph() -> OntologyGraph {
    OntologyGraph::build(&BuiltinSource, &human(), None).unwrap()
}

fn prepared() -> ClassMap {
    let matcher =
        CelltypeMatcher::new(graph(), classmap_options(&MatchOptions::default())).unwrap();
    let labels = ["Tcell", "unknown", "NK cell", "T cell", "hepatocyte", " Tcell ", ""];
    ClassMap::prepare(&labels, &matcher, &default_omit_list())
}

fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
}

#[test]
fn prepare_suggests_one_target_per_label() {
    let map = prepared();
    let pairs = map
        .rows()
        .iter()
        .map(|row| (row.source.as_str(), row.target.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        pairs,
        vec![
            ("NK cell", "natural killer cell"),
            ("T cell", "T cell"),
            ("Tcell", "T cell"),
            ("hepatocyte", "hepatocyte"),
            ("unknown", "unknown"),
        ]
    );
    assert!(!map.has_ids());
}

#[test]
fn clean_fills_in_ids() {
    let mut map = prepared();
    map.clean(&graph(), &default_omit_list()).unwrap();
    let ids = map
        .rows()
        .iter()
        .map(|row| row.target_id.as_deref().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec!["CL:0000623", "CL:0000084", "CL:0000084", "CL:0000182", UNKNOWN_ID]
    );
}

#[test]
fn clean_reports_targets_outside_the_ontology() {
    let mut map =
        ClassMap::parse_tsv("source\ttarget\nfoo\tnot a term\nTcell\tT cell\n").unwrap();
    let err = map.clean(&graph(), &default_omit_list()).unwrap_err();
    assert_matches!(err, KiraError::InvalidClassMap(message) if message.contains("not a term"));
}

#[test]
fn write_and_read_back() {
    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "nested/celltypes.tsv");
    let mut map = prepared();
    map.clean(&graph(), &default_omit_list()).unwrap();

    map.write(&path, true).unwrap();
    let read = ClassMap::read(&path).unwrap();
    assert_eq!(read, map);
}

#[test]
fn protected_writing_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = temp_path(&dir, "celltypes.tsv");
    let map = prepared();
    map.write(&path, true).unwrap();

    let other = ClassMap::parse_tsv("source\ttarget\nx\tT cell\n").unwrap();
    let err = other.write(&path, true).unwrap_err();
    assert_matches!(err, KiraError::ClassMapExists(_));
    assert_eq!(ClassMap::read(&path).unwrap(), map);

    other.write(&path, false).unwrap();
    assert_eq!(ClassMap::read(&path).unwrap(), other);
}

#[test]
fn reading_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let err = ClassMap::read(&temp_path(&dir, "absent.tsv")).unwrap_err();
    assert_matches!(err, KiraError::Filesystem(_));
}

#[test]
fn verbatim_synonym_maps_to_its_own_term() {
    let source = fixture(vec![
        term("CL:0", "cell", &[], &[]),
        term("CL:1", "Beta cell", &[], &["CL:0"]),
        term("CL:2", "type B pancreatic cell", &["beta cell"], &["CL:0"]),
    ]);
    let graph = OntologyGraph::build(&source, &human(), None).unwrap();
    let matcher =
        CelltypeMatcher::new(graph, classmap_options(&MatchOptions::default())).unwrap();

    let map = ClassMap::prepare(&["beta cell", "Beta cell"], &matcher, &default_omit_list());
    let pairs = map
        .rows()
        .iter()
        .map(|row| (row.source.as_str(), row.target.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        pairs,
        vec![
            ("Beta cell", "Beta cell"),
            ("beta cell", "type B pancreatic cell"),
        ]
    );
}
