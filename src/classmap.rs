//! Curation tables mapping free-text labels of a dataset to ontology terms.

use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::MatchResult;
use crate::error::KiraError;
use crate::matcher::{CelltypeMatcher, MatchOptions};
use crate::ontology::OntologyGraph;
use crate::store::OntologyStore;

pub const SOURCE_COLUMN: &str = "source";
pub const TARGET_COLUMN: &str = "target";
pub const TARGET_ID_COLUMN: &str = "target_id";
pub const UNKNOWN_ID: &str = "UNKNOWN";

pub fn default_omit_list() -> Vec<String> {
    vec!["unknown".to_string(), "not a cell".to_string()]
}

/// Options for preparing a class map: a label that is already a term maps to
/// itself, synonyms are always searched and output is flat.
pub fn classmap_options(base: &MatchOptions) -> MatchOptions {
    MatchOptions {
        include_synonyms: true,
        choices_for_perfect_match: false,
        keep_strategy: false,
        always_return_list: true,
        ..base.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassMapRow {
    pub source: String,
    pub target: String,
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassMap {
    rows: Vec<ClassMapRow>,
}

impl ClassMap {
    /// One row per unique label, sorted by label. Labels in `omit_list`
    /// (case-insensitive) map to themselves; the rest take the first
    /// suggestion of `matcher`, or an empty target when nothing matched.
    pub fn prepare<S: AsRef<str>>(
        labels: &[S],
        matcher: &CelltypeMatcher,
        omit_list: &[String],
    ) -> Self {
        let unique = labels
            .iter()
            .map(|label| label.as_ref().trim().to_string())
            .filter(|label| !label.is_empty())
            .collect::<BTreeSet<_>>();
        let rows = unique
            .into_iter()
            .map(|source| {
                let target = if is_omitted(&source, omit_list) {
                    source.clone()
                } else {
                    suggest(matcher, &source)
                };
                ClassMapRow {
                    source,
                    target,
                    target_id: None,
                }
            })
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), "prepared class map");
        Self { rows }
    }

    pub fn rows(&self) -> &[ClassMapRow] {
        &self.rows
    }

    pub fn has_ids(&self) -> bool {
        self.rows.iter().any(|row| row.target_id.is_some())
    }

    /// Checks every non-omitted target against the ontology and fills in
    /// target ids. Omitted labels get [`UNKNOWN_ID`].
    pub fn clean(&mut self, graph: &OntologyGraph, omit_list: &[String]) -> Result<(), KiraError> {
        let mut invalid = Vec::new();
        for row in &mut self.rows {
            if is_omitted(&row.target, omit_list) {
                row.target_id = Some(UNKNOWN_ID.to_string());
                continue;
            }
            match graph.convert_to_id(&row.target) {
                Ok(id) => row.target_id = Some(id.to_string()),
                Err(_) => invalid.push(format!("{:?} -> {:?}", row.source, row.target)),
            }
        }
        if !invalid.is_empty() {
            return Err(KiraError::InvalidClassMap(format!(
                "targets not in ontology {} {}: {}",
                graph.organism(),
                graph.version(),
                invalid.join(", ")
            )));
        }
        Ok(())
    }

    pub fn to_tsv(&self) -> Result<String, KiraError> {
        let with_ids = self.has_ids();
        let mut out = format!("{SOURCE_COLUMN}\t{TARGET_COLUMN}");
        if with_ids {
            out.push('\t');
            out.push_str(TARGET_ID_COLUMN);
        }
        out.push('\n');
        for row in &self.rows {
            let mut fields = vec![row.source.as_str(), row.target.as_str()];
            if with_ids {
                fields.push(row.target_id.as_deref().unwrap_or(""));
            }
            if let Some(bad) = fields.iter().find(|field| field.contains(['\t', '\n', '\r'])) {
                return Err(KiraError::InvalidClassMap(format!(
                    "field contains a tab or line break: {bad:?}"
                )));
            }
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        Ok(out)
    }

    pub fn parse_tsv(text: &str) -> Result<Self, KiraError> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| KiraError::InvalidClassMap("empty file".to_string()))?;
        let columns = header.split('\t').map(str::trim).collect::<Vec<_>>();
        let with_ids = match columns.as_slice() {
            [SOURCE_COLUMN, TARGET_COLUMN] => false,
            [SOURCE_COLUMN, TARGET_COLUMN, TARGET_ID_COLUMN] => true,
            _ => {
                return Err(KiraError::InvalidClassMap(format!(
                    "unexpected header {header:?}"
                )));
            }
        };
        let mut rows = Vec::new();
        for (idx, line) in lines.enumerate() {
            let fields = line.split('\t').collect::<Vec<_>>();
            if fields.len() != columns.len() {
                return Err(KiraError::InvalidClassMap(format!(
                    "row {} has {} fields, expected {}",
                    idx + 1,
                    fields.len(),
                    columns.len()
                )));
            }
            rows.push(ClassMapRow {
                source: fields[0].to_string(),
                target: fields[1].to_string(),
                target_id: with_ids.then(|| fields[2].to_string()),
            });
        }
        Ok(Self { rows })
    }

    pub fn read(path: &Utf8Path) -> Result<Self, KiraError> {
        let text = fs::read_to_string(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
        Self::parse_tsv(&text)
    }

    /// Writes the table atomically. With `protected_writing`, an existing file
    /// is left untouched.
    pub fn write(&self, path: &Utf8Path, protected_writing: bool) -> Result<(), KiraError> {
        if protected_writing && path.exists() {
            return Err(KiraError::ClassMapExists(path.as_std_path().to_path_buf()));
        }
        OntologyStore::write_atomic(path, self.to_tsv()?.as_bytes())?;
        info!(%path, rows = self.rows.len(), "wrote class map");
        Ok(())
    }
}

fn is_omitted(label: &str, omit_list: &[String]) -> bool {
    let folded = label.to_lowercase();
    omit_list.iter().any(|omit| omit.to_lowercase() == folded)
}

fn suggest(matcher: &CelltypeMatcher, label: &str) -> String {
    match matcher.match_query(label) {
        // a verbatim synonym is replaced by the name it stands for
        MatchResult::Scalar(term) => matcher
            .pool()
            .resolve_text(&term)
            .map(|entry| entry.name.clone())
            .unwrap_or(term),
        other => other
            .names()
            .first()
            .map(|name| name.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn tsv_round_trip_with_ids() {
        let text = "source\ttarget\ttarget_id\nTcell\tT cell\tCL:0000084\n";
        let map = ClassMap::parse_tsv(text).unwrap();
        assert_eq!(map.rows()[0].target_id.as_deref(), Some("CL:0000084"));
        assert_eq!(map.to_tsv().unwrap(), text);
    }

    #[test]
    fn bad_header_is_rejected() {
        let err = ClassMap::parse_tsv("label\tterm\n").unwrap_err();
        assert_matches!(err, KiraError::InvalidClassMap(_));
    }

    #[test]
    fn ragged_row_is_rejected() {
        let err = ClassMap::parse_tsv("source\ttarget\nonly-one\n").unwrap_err();
        assert_matches!(err, KiraError::InvalidClassMap(_));
    }

    #[test]
    fn omit_list_is_case_insensitive() {
        assert!(is_omitted("Unknown", &default_omit_list()));
        assert!(is_omitted("NOT A CELL", &default_omit_list()));
        assert!(!is_omitted("T cell", &default_omit_list()));
    }
}
