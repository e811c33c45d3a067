//! Per-batch upload preparation: safe file names, byte-identical copies
//! dropped, name collisions suffixed.

use std::collections::{HashMap, HashSet};

use blake2::{digest::typenum::U32, Blake2b, Digest};
use tracing::debug;

use super::processor::ResumeUpload;

/// Uploads ready for processing plus the copies that were dropped.
#[derive(Debug, Default)]
pub struct PreparedUploads {
    pub uploads: Vec<ResumeUpload>,
    pub duplicates: Vec<DuplicateUpload>,
}

/// An upload whose bytes match an earlier upload in the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateUpload {
    pub file_name: String,
    pub duplicate_of: String,
}

pub fn content_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Last path component, keeping only letters, digits, space, `.`, `-` and `_`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(raw);
    base.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `cv.pdf` → `cv_2.pdf`, `cv_3.pdf`, … until the name is free.
fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    (2..)
        .map(|n| format!("{stem}_{n}{ext}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Sanitizes names, drops byte-identical copies and disambiguates colliding
/// names. Input order is preserved. State lives only for this call.
pub fn prepare_uploads(raw: Vec<ResumeUpload>) -> PreparedUploads {
    let mut prepared = PreparedUploads::default();
    let mut seen_hashes: HashMap<[u8; 32], String> = HashMap::new();
    let mut taken_names: HashSet<String> = HashSet::new();

    for (i, upload) in raw.into_iter().enumerate() {
        let mut name = sanitize_file_name(&upload.file_name);
        if name.is_empty() || name.starts_with('.') {
            name = format!("arquivo_sem_nome_{}{}", i + 1, name);
        }

        let hash = content_hash(&upload.bytes);
        if let Some(first) = seen_hashes.get(&hash) {
            debug!(
                "{name} has the same content as {first} (blake2 {}), skipping",
                hex::encode(&hash[..8])
            );
            prepared.duplicates.push(DuplicateUpload {
                file_name: name,
                duplicate_of: first.clone(),
            });
            continue;
        }

        let name = unique_name(&name, &taken_names);
        taken_names.insert(name.clone());
        seen_hashes.insert(hash, name.clone());
        prepared.uploads.push(ResumeUpload::new(name, upload.bytes));
    }

    prepared
}
