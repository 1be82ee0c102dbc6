use std::fs;
use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::domain::Organism;
use crate::error::KiraError;
use crate::obo::parse_obo_documents;
use crate::ontology::OntologySpec;
use crate::store::{OntologyFormat, OntologyStore, StoredRelease};

/// Provider of versioned ontology releases, injected into graph construction.
pub trait OntologySource: Send + Sync {
    /// Registered version tags for `organism`, ascending.
    fn versions(&self, organism: &Organism) -> Result<Vec<String>, KiraError>;

    /// Loads one release; `None` selects the latest registered version.
    fn load(&self, organism: &Organism, version: Option<&str>) -> Result<OntologySpec, KiraError>;
}

/// Picks the requested version out of `available`, or the latest one.
pub fn resolve_version(
    organism: &Organism,
    available: &[String],
    requested: Option<&str>,
) -> Result<String, KiraError> {
    if available.is_empty() {
        return Err(KiraError::UnknownOrganism(organism.to_string()));
    }
    match requested {
        Some(version) => available
            .iter()
            .find(|candidate| candidate.as_str() == version)
            .cloned()
            .ok_or_else(|| KiraError::UnknownVersion {
                organism: organism.to_string(),
                version: version.to_string(),
            }),
        None => Ok(available.iter().max().cloned().unwrap_or_default()),
    }
}

struct BuiltinRelease {
    organism: &'static str,
    version: &'static str,
    json: &'static str,
}

const BUILTIN_RELEASES: &[BuiltinRelease] = &[
    BuiltinRelease {
        organism: "human",
        version: "2021-02-01",
        json: include_str!("../resources/ontologies/human/2021-02-01.json"),
    },
    BuiltinRelease {
        organism: "human",
        version: "2021-08-10",
        json: include_str!("../resources/ontologies/human/2021-08-10.json"),
    },
    BuiltinRelease {
        organism: "mouse",
        version: "2021-02-01",
        json: include_str!("../resources/ontologies/mouse/2021-02-01.json"),
    },
];

/// Cell Ontology subsets compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl OntologySource for BuiltinSource {
    fn versions(&self, organism: &Organism) -> Result<Vec<String>, KiraError> {
        let mut versions = BUILTIN_RELEASES
            .iter()
            .filter(|release| release.organism == organism.as_str())
            .map(|release| release.version.to_string())
            .collect::<Vec<_>>();
        versions.sort();
        Ok(versions)
    }

    fn load(&self, organism: &Organism, version: Option<&str>) -> Result<OntologySpec, KiraError> {
        let version = resolve_version(organism, &self.versions(organism)?, version)?;
        let release = BUILTIN_RELEASES
            .iter()
            .find(|release| release.organism == organism.as_str() && release.version == version)
            .ok_or_else(|| KiraError::UnknownVersion {
                organism: organism.to_string(),
                version: version.clone(),
            })?;
        debug!(%organism, %version, "loading built-in ontology");
        serde_json::from_str(release.json)
            .map_err(|err| KiraError::InvalidOntology(format!("built-in {organism}/{version}: {err}")))
    }
}

/// Releases read from an [`OntologyStore`] directory (JSON, OBO or gzipped OBO).
/// OBO releases are merged with their stored anatomy companion, if any.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    store: OntologyStore,
}

impl DirectorySource {
    pub fn new(store: OntologyStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &OntologyStore {
        &self.store
    }
}

impl OntologySource for DirectorySource {
    fn versions(&self, organism: &Organism) -> Result<Vec<String>, KiraError> {
        let mut versions = self
            .store
            .list_releases(organism)?
            .into_iter()
            .map(|release| release.version)
            .collect::<Vec<_>>();
        versions.dedup();
        Ok(versions)
    }

    fn load(&self, organism: &Organism, version: Option<&str>) -> Result<OntologySpec, KiraError> {
        let releases = self.store.list_releases(organism)?;
        let versions = releases
            .iter()
            .map(|release| release.version.clone())
            .collect::<Vec<_>>();
        let version = resolve_version(organism, &versions, version)?;
        // json wins over obo when a version is stored in several formats
        let release = releases
            .iter()
            .filter(|release| release.version == version)
            .min_by_key(|release| match release.format {
                OntologyFormat::Json => 0,
                OntologyFormat::Obo => 1,
                OntologyFormat::OboGz => 2,
            })
            .ok_or_else(|| KiraError::UnknownVersion {
                organism: organism.to_string(),
                version: version.clone(),
            })?;
        debug!(%organism, %version, path = %release.path, "loading ontology from store");

        if release.format == OntologyFormat::Json {
            let bytes = fs::read(release.path.as_std_path())
                .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", release.path)))?;
            let spec: OntologySpec = serde_json::from_slice(&bytes)
                .map_err(|err| KiraError::InvalidOntology(format!("{}: {err}", release.path)))?;
            if spec.organism != *organism || spec.version != version {
                return Err(KiraError::InvalidOntology(format!(
                    "{} declares {}/{}",
                    release.path, spec.organism, spec.version
                )));
            }
            return Ok(spec);
        }

        let mut texts = vec![read_obo_text(release)?];
        if let Some(anatomy) = self.store.find_anatomy(organism, &version) {
            debug!(path = %anatomy.path, "merging anatomy release");
            texts.push(read_obo_text(&anatomy)?);
        }
        let texts = texts.iter().map(String::as_str).collect::<Vec<_>>();
        parse_obo_documents(&texts, organism, &version)
    }
}

fn read_obo_text(release: &StoredRelease) -> Result<String, KiraError> {
    let bytes = fs::read(release.path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", release.path)))?;
    if release.format != OntologyFormat::OboGz {
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }
    let mut text = String::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_string(&mut text)
        .map_err(|err| KiraError::Filesystem(format!("gunzip {}: {err}", release.path)))?;
    Ok(text)
}
