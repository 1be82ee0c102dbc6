//! Reader for OBO 1.2 flat files as published by the Cell Ontology and UBERON.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{NodeId, Organism};
use crate::error::KiraError;
use crate::ontology::{OntologySpec, TermRecord};

static SYNONYM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"((?:[^"\\]|\\.)*)"\s+(EXACT|RELATED|BROAD|NARROW)\b"#)
        .expect("synonym pattern is valid")
});

const CELLTYPE_PREFIX: &str = "CL";
const ANATOMY_PREFIX: &str = "UBERON";
const LOCATION_RELATIONS: [&str; 4] = ["part_of", "BFO:0000050", "located_in", "RO:0001025"];

#[derive(Debug, Default)]
struct Stanza {
    line: usize,
    id: Option<String>,
    name: Option<String>,
    synonyms: Vec<String>,
    is_a: Vec<String>,
    part_of: Vec<String>,
    obsolete: bool,
}

/// `data-version` and `date` header values.
pub fn parse_obo_header(content: &[u8]) -> (Option<String>, Option<String>) {
    let mut version = None;
    let mut date = None;
    let text = String::from_utf8_lossy(content);
    for line in text.lines().take(50) {
        if line.starts_with('[') {
            break;
        }
        if let Some(value) = line.strip_prefix("data-version:") {
            version = Some(value.trim().to_string());
        }
        if let Some(value) = line.strip_prefix("date:") {
            date = Some(value.trim().to_string());
        }
    }
    (version, date)
}

/// Parses `[Term]` stanzas into cell-type (`CL:`) and anatomy (`UBERON:`)
/// records. Relations pointing outside the parsed terms are dropped.
pub fn parse_obo(text: &str, organism: &Organism, version: &str) -> Result<OntologySpec, KiraError> {
    parse_obo_documents(&[text], organism, version)
}

/// Like [`parse_obo`] over several documents, e.g. a Cell Ontology release
/// plus an UBERON release holding the anatomy its terms are located in.
/// A term declared in more than one document is taken from the first.
pub fn parse_obo_documents(
    texts: &[&str],
    organism: &Organism,
    version: &str,
) -> Result<OntologySpec, KiraError> {
    let mut stanzas = Vec::new();
    let mut seen = HashSet::new();
    for text in texts {
        for stanza in read_stanzas(text)? {
            if stanza.obsolete {
                continue;
            }
            match &stanza.id {
                Some(id) if !seen.insert(id.clone()) => continue,
                _ => stanzas.push(stanza),
            }
        }
    }
    build_spec(stanzas, organism, version)
}

fn read_stanzas(text: &str) -> Result<Vec<Stanza>, KiraError> {
    let mut stanzas = Vec::new();
    let mut current: Option<Stanza> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            if let Some(stanza) = current.take() {
                stanzas.push(stanza);
            }
            if line == "[Term]" {
                current = Some(Stanza {
                    line: line_no,
                    ..Stanza::default()
                });
            }
            continue;
        }
        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let (tag, value) = line.split_once(':').ok_or_else(|| KiraError::OboParse {
            line: line_no,
            message: format!("expected `tag: value`, got {line:?}"),
        })?;
        let value = value.trim();
        match tag {
            "id" => stanza.id = Some(value.to_string()),
            "name" => stanza.name = Some(value.to_string()),
            "is_a" => stanza.is_a.push(first_token(value).to_string()),
            "is_obsolete" => stanza.obsolete = value == "true",
            "synonym" => {
                let caps = SYNONYM_RE.captures(value).ok_or_else(|| KiraError::OboParse {
                    line: line_no,
                    message: format!("malformed synonym {value:?}"),
                })?;
                stanza.synonyms.push(caps[1].replace("\\\"", "\""));
            }
            "relationship" => {
                let mut parts = value.split_whitespace();
                if let (Some(relation), Some(target)) = (parts.next(), parts.next())
                    && LOCATION_RELATIONS.contains(&relation)
                {
                    stanza.part_of.push(target.to_string());
                }
            }
            _ => {}
        }
    }
    if let Some(stanza) = current.take() {
        stanzas.push(stanza);
    }
    Ok(stanzas)
}

fn build_spec(
    stanzas: Vec<Stanza>,
    organism: &Organism,
    version: &str,
) -> Result<OntologySpec, KiraError> {
    let mut celltypes = Vec::new();
    let mut anatomy = Vec::new();
    for stanza in stanzas {
        let (Some(id), Some(name)) = (stanza.id, stanza.name) else {
            return Err(KiraError::OboParse {
                line: stanza.line,
                message: "term without id or name".to_string(),
            });
        };
        let id = NodeId::new(id);
        let record = |parents: Vec<String>, located_in: Vec<String>| TermRecord {
            id: id.clone(),
            name: name.clone(),
            synonyms: stanza.synonyms.clone(),
            parents: parents.into_iter().map(NodeId::new).collect(),
            located_in: located_in.into_iter().map(NodeId::new).collect(),
        };
        match id.prefix() {
            Some(CELLTYPE_PREFIX) => {
                celltypes.push(record(stanza.is_a.clone(), stanza.part_of.clone()));
            }
            Some(ANATOMY_PREFIX) => {
                // containment is traversed like is-a for anatomy
                let mut parents = stanza.is_a.clone();
                parents.extend(stanza.part_of.iter().cloned());
                anatomy.push(record(parents, Vec::new()));
            }
            _ => {}
        }
    }

    let anatomy_ids: HashSet<NodeId> = anatomy.iter().map(|term| term.id.clone()).collect();
    for term in &mut anatomy {
        term.parents.retain(|parent| anatomy_ids.contains(parent));
        term.parents.dedup();
    }
    let celltype_ids: HashSet<NodeId> = celltypes.iter().map(|term| term.id.clone()).collect();
    for term in &mut celltypes {
        term.parents.retain(|parent| celltype_ids.contains(parent));
        term.located_in.retain(|anat| anatomy_ids.contains(anat));
    }

    Ok(OntologySpec {
        organism: organism.clone(),
        version: version.to_string(),
        celltypes,
        anatomy,
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find(" ! ") {
        Some(pos) if !line.starts_with("synonym:") && !line.starts_with("def:") => &line[..pos],
        _ => line,
    }
}

fn first_token(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or(value)
}
