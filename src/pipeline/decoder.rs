//! Turns downloaded artifacts into manifest records.
//!
//! Every artifact is decoded on its own; nothing here depends on the outcome
//! of any other artifact.

use crate::constants::KEY_BLOB_MAGIC;
use crate::error::DecodeError;
use crate::types::{AppId, Artifact, ManifestRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

static ADD_APP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"addappid\(\s*(\d+)\s*(?:,\s*\d+\s*,\s*"([0-9A-Fa-f]+)"\s*)?\)"#)
        .expect("valid addappid pattern")
});

static SET_MANIFEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"setManifestid\(\s*(\d+)\s*,\s*"(\d+)"\s*(?:,\s*\d+\s*)?\)"#)
        .expect("valid setManifestid pattern")
});

static VDF_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(\d+)"\s*\{\s*"DecryptionKey"\s*"([0-9A-Fa-f]+)"\s*\}"#)
        .expect("valid vdf pattern")
});

static KEY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(\d+)\s*[;:=\s]\s*([0-9A-Fa-f]{64})\s*$").expect("valid key line pattern")
});

static MANIFEST_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_(\d+)\.manifest$").expect("valid manifest name pattern"));

/// Decode strategy, picked from the artifact's name and leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PlainListing,
    BinaryManifest,
    EncryptedKeyBlob,
}

/// A depot manifest to drop into the client's depot cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedManifest {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArtifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub records: Vec<ManifestRecord>,
    pub cached_manifest: Option<CachedManifest>,
}

pub fn classify(artifact: &Artifact) -> Result<ArtifactKind, DecodeError> {
    let file_name = artifact.file_name();
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "manifest" => Ok(ArtifactKind::BinaryManifest),
        "st" => Ok(ArtifactKind::EncryptedKeyBlob),
        _ if artifact.bytes.starts_with(KEY_BLOB_MAGIC) => Ok(ArtifactKind::EncryptedKeyBlob),
        "lua" | "vdf" | "txt" => Ok(ArtifactKind::PlainListing),
        _ if std::str::from_utf8(&artifact.bytes).is_ok() => Ok(ArtifactKind::PlainListing),
        _ => Err(DecodeError::Unrecognized),
    }
}

pub fn decode(app_id: &AppId, artifact: &Artifact) -> Result<DecodedArtifact, DecodeError> {
    if artifact.bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let kind = classify(artifact)?;
    let (records, cached_manifest) = match kind {
        ArtifactKind::BinaryManifest => {
            let (record, cached) = decode_manifest(artifact)?;
            (vec![record], Some(cached))
        }
        ArtifactKind::PlainListing => {
            let text = std::str::from_utf8(&artifact.bytes).map_err(|_| DecodeError::NotUtf8)?;
            (parse_listing(text)?, None)
        }
        ArtifactKind::EncryptedKeyBlob => {
            let plain = decrypt_key_blob(app_id, &artifact.bytes)?;
            let text = String::from_utf8(plain).map_err(|_| DecodeError::NotUtf8)?;
            (parse_listing(&text)?, None)
        }
    };
    Ok(DecodedArtifact {
        name: artifact.name.clone(),
        kind,
        records,
        cached_manifest,
    })
}

fn decode_manifest(artifact: &Artifact) -> Result<(ManifestRecord, CachedManifest), DecodeError> {
    let file_name = artifact.file_name();
    let captures = MANIFEST_NAME
        .captures(file_name)
        .ok_or_else(|| DecodeError::BadManifestName(file_name.to_string()))?;
    let depot_id: u32 = captures[1]
        .parse()
        .map_err(|_| DecodeError::BadManifestName(file_name.to_string()))?;
    let record = ManifestRecord::new(depot_id).with_manifest(&captures[2]);
    let cached = CachedManifest {
        file_name: file_name.to_string(),
        bytes: artifact.bytes.clone(),
    };
    Ok((record, cached))
}

/// Records from Lua, VDF or `depot;key` text, merged per depot in text order.
pub fn parse_listing(text: &str) -> Result<Vec<ManifestRecord>, DecodeError> {
    let mut found: Vec<(usize, ManifestRecord)> = Vec::new();

    for caps in ADD_APP.captures_iter(text) {
        // A bare addappid names the app itself or a DLC; only keyed ones are depots.
        let (Some(key), Ok(depot_id)) = (caps.get(2), caps[1].parse::<u32>()) else {
            continue;
        };
        let at = caps.get(0).map(|m| m.start()).unwrap_or(0);
        found.push((at, ManifestRecord::new(depot_id).with_key(key.as_str())));
    }
    for caps in SET_MANIFEST.captures_iter(text) {
        let Ok(depot_id) = caps[1].parse::<u32>() else {
            continue;
        };
        let at = caps.get(0).map(|m| m.start()).unwrap_or(0);
        found.push((at, ManifestRecord::new(depot_id).with_manifest(&caps[2])));
    }
    for regex in [&*VDF_KEY, &*KEY_LINE] {
        for caps in regex.captures_iter(text) {
            let Ok(depot_id) = caps[1].parse::<u32>() else {
                continue;
            };
            let at = caps.get(0).map(|m| m.start()).unwrap_or(0);
            found.push((at, ManifestRecord::new(depot_id).with_key(&caps[2])));
        }
    }

    found.sort_by_key(|(at, _)| *at);
    let mut merged: BTreeMap<u32, ManifestRecord> = BTreeMap::new();
    for (_, record) in found {
        match merged.get_mut(&record.depot_id) {
            Some(existing) => existing.merge(record),
            None => {
                merged.insert(record.depot_id, record);
            }
        }
    }

    if merged.is_empty() {
        return Err(DecodeError::NoRecords);
    }
    Ok(merged.into_values().collect())
}

fn keystream(app_id: &AppId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(app_id.as_str().as_bytes());
    hasher.finalize().into()
}

fn apply_keystream(app_id: &AppId, data: &[u8]) -> Vec<u8> {
    let key = keystream(app_id);
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

/// `DFK1` | u32 LE plaintext length | ciphertext, XOR'd with SHA-256(app id).
pub fn decrypt_key_blob(app_id: &AppId, blob: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let header_len = KEY_BLOB_MAGIC.len() + 4;
    if !blob.starts_with(KEY_BLOB_MAGIC) {
        return Err(DecodeError::BadMagic);
    }
    if blob.len() < header_len {
        return Err(DecodeError::Truncated {
            expected: header_len,
            found: blob.len(),
        });
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&blob[KEY_BLOB_MAGIC.len()..header_len]);
    let expected = u32::from_le_bytes(len_bytes) as usize;
    let body = &blob[header_len..];
    if body.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            found: body.len(),
        });
    }
    Ok(apply_keystream(app_id, &body[..expected]))
}

/// Inverse of [`decrypt_key_blob`], used to publish blobs.
pub fn encrypt_key_blob(app_id: &AppId, plaintext: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(KEY_BLOB_MAGIC.len() + 4 + plaintext.len());
    blob.extend_from_slice(KEY_BLOB_MAGIC);
    blob.extend_from_slice(&(plaintext.len() as u32).to_le_bytes());
    blob.extend_from_slice(&apply_keystream(app_id, plaintext));
    blob
}
