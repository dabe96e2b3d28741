use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a primary app or one of its DLC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric ids are looked up directly, anything else goes through store search.
    pub fn is_numeric(query: &str) -> bool {
        !query.is_empty() && query.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A remote `owner/name` repository that may host manifests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateRepository {
    pub owner: String,
    pub name: String,
}

impl CandidateRepository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for CandidateRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for CandidateRepository {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(format!("repository `{}` is not in owner/name form", s)),
        }
    }
}

impl TryFrom<String> for CandidateRepository {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CandidateRepository> for String {
    fn from(repo: CandidateRepository) -> Self {
        repo.full_name()
    }
}

/// The candidate that answered the existence probe for an app id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMatch {
    pub repository: CandidateRepository,
    pub app_id: AppId,
    /// Commit sha or branch name the artifacts are read from.
    pub git_ref: String,
    /// Only files below this prefix belong to the app.
    pub path_prefix: Option<String>,
}

/// A downloaded repository file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// File name without any directory components.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// An artifact that could not be downloaded or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub name: String,
    pub reason: String,
    pub rate_limited: bool,
}

/// One depot's decoded state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub depot_id: u32,
    pub manifest_id: Option<String>,
    pub decryption_key: Option<String>,
}

impl ManifestRecord {
    pub fn new(depot_id: u32) -> Self {
        Self {
            depot_id,
            manifest_id: None,
            decryption_key: None,
        }
    }

    pub fn with_manifest(mut self, manifest_id: impl Into<String>) -> Self {
        self.manifest_id = Some(manifest_id.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.decryption_key = Some(key.into());
        self
    }

    /// Later values win; absent fields never erase known ones.
    pub fn merge(&mut self, later: ManifestRecord) {
        if later.manifest_id.is_some() {
            self.manifest_id = later.manifest_id;
        }
        if later.decryption_key.is_some() {
            self.decryption_key = later.decryption_key;
        }
    }
}

/// How the client should treat the recorded manifest versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestMode {
    Fixed,
    Latest,
}

impl ManifestMode {
    pub fn from_flag(fixed: bool) -> Self {
        if fixed {
            ManifestMode::Fixed
        } else {
            ManifestMode::Latest
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestMode::Fixed => "fixed",
            ManifestMode::Latest => "latest",
        }
    }
}

/// The persisted unit for one app id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub app_id: AppId,
    pub display_name: Option<String>,
    /// Sorted by depot id.
    pub records: Vec<ManifestRecord>,
    pub mode: ManifestMode,
}

/// Name and DLC list reported by the app catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDetails {
    pub name: Option<String>,
    pub dlc: Vec<AppId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_repository_parse() {
        let repo: CandidateRepository = "SteamAutoCracks/ManifestHub".parse().unwrap();
        assert_eq!(repo.owner, "SteamAutoCracks");
        assert_eq!(repo.name, "ManifestHub");
        assert!("no-slash".parse::<CandidateRepository>().is_err());
        assert!("a/b/c".parse::<CandidateRepository>().is_err());
        assert!("/name".parse::<CandidateRepository>().is_err());
    }

    #[test]
    fn test_record_merge_keeps_known_fields() {
        let mut record = ManifestRecord::new(481).with_key("aa");
        record.merge(ManifestRecord::new(481).with_manifest("123"));
        assert_eq!(record.manifest_id.as_deref(), Some("123"));
        assert_eq!(record.decryption_key.as_deref(), Some("aa"));

        record.merge(ManifestRecord::new(481).with_key("bb"));
        assert_eq!(record.decryption_key.as_deref(), Some("bb"));
    }

    #[test]
    fn test_numeric_query() {
        assert!(AppId::is_numeric("480"));
        assert!(!AppId::is_numeric("Spacewar"));
        assert!(!AppId::is_numeric(""));
    }
}
