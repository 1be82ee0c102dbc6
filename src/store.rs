use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;

use crate::domain::Organism;
use crate::error::KiraError;

const ANATOMY_DIR: &str = "anatomy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OntologyFormat {
    Json,
    Obo,
    OboGz,
}

impl OntologyFormat {
    const ALL: [OntologyFormat; 3] = [
        OntologyFormat::Json,
        OntologyFormat::Obo,
        OntologyFormat::OboGz,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            OntologyFormat::Json => "json",
            OntologyFormat::Obo => "obo",
            OntologyFormat::OboGz => "obo.gz",
        }
    }

    fn strip(self, file_name: &str) -> Option<&str> {
        file_name
            .strip_suffix(self.extension())
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|version| !version.is_empty())
    }
}

/// Release file found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRelease {
    pub version: String,
    pub format: OntologyFormat,
    pub path: Utf8PathBuf,
}

/// Local ontology store laid out as `<root>/<organism>/<version>.<ext>`.
#[derive(Debug, Clone)]
pub struct OntologyStore {
    root: Utf8PathBuf,
}

impl OntologyStore {
    pub fn new() -> Result<Self, KiraError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.cache_dir()
                        .join("kira-celltype-mapper")
                        .join("ontologies"),
                )
                .ok()
            })
            .ok_or_else(|| {
                KiraError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn organism_dir(&self, organism: &Organism) -> Utf8PathBuf {
        self.root.join(organism.as_str())
    }

    pub fn release_path(
        &self,
        organism: &Organism,
        version: &str,
        format: OntologyFormat,
    ) -> Utf8PathBuf {
        self.organism_dir(organism)
            .join(format!("{version}.{}", format.extension()))
    }

    /// Anatomy (UBERON) companion of an OBO release, kept under
    /// `<root>/<organism>/anatomy/`.
    pub fn anatomy_path(
        &self,
        organism: &Organism,
        version: &str,
        format: OntologyFormat,
    ) -> Utf8PathBuf {
        self.organism_dir(organism)
            .join(ANATOMY_DIR)
            .join(format!("{version}.{}", format.extension()))
    }

    /// Stored anatomy companion for `version`, plain OBO before gzipped.
    pub fn find_anatomy(&self, organism: &Organism, version: &str) -> Option<StoredRelease> {
        [OntologyFormat::Obo, OntologyFormat::OboGz]
            .into_iter()
            .map(|format| StoredRelease {
                version: version.to_string(),
                format,
                path: self.anatomy_path(organism, version, format),
            })
            .find(|release| release.path.is_file())
    }

    /// Releases stored for `organism`, sorted by version. A missing organism
    /// directory yields an empty list.
    pub fn list_releases(&self, organism: &Organism) -> Result<Vec<StoredRelease>, KiraError> {
        let dir = self.organism_dir(organism);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut releases = Vec::new();
        let entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let found = OntologyFormat::ALL
                .iter()
                .find_map(|format| format.strip(file_name).map(|version| (version, *format)));
            if let Some((version, format)) = found {
                releases.push(StoredRelease {
                    version: version.to_string(),
                    format,
                    path: path.clone(),
                });
            }
        }
        releases.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(releases)
    }

    pub fn write_atomic(dest: &Utf8Path, contents: &[u8]) -> Result<(), KiraError> {
        let parent = dest
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("kira-ctm-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), contents).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
