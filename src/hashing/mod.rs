//! BLAKE3 fingerprints for the document facts cache.

use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use blake3::Hasher;

/// Fingerprint of a source file as seen by the facts cache.
///
/// Covers size, modification time and the number of leading pages whose text is
/// extracted, so a touched file or a changed page setting invalidates the cached facts.
pub fn file_fingerprint(len: u64, modified_nanos: u128, leading_pages: u32) -> String {
    let mut hasher = Hasher::new();
    hasher.update(&len.to_le_bytes());
    hasher.update(b"|");
    hasher.update(&modified_nanos.to_le_bytes());
    hasher.update(b"|");
    hasher.update(&leading_pages.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

/// [`file_fingerprint`] from filesystem metadata. Missing mtimes hash as zero.
pub fn metadata_fingerprint(meta: &Metadata, leading_pages: u32) -> String {
    let modified_nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    file_fingerprint(meta.len(), modified_nanos, leading_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_changes_with_inputs() {
        let base = file_fingerprint(1024, 42, 1);
        assert_eq!(base, file_fingerprint(1024, 42, 1));
        assert_ne!(base, file_fingerprint(1025, 42, 1));
        assert_ne!(base, file_fingerprint(1024, 43, 1));
        assert_ne!(base, file_fingerprint(1024, 42, 3));
        assert_eq!(base.len(), 64);
    }

    #[test]
    fn test_metadata_fingerprint_tracks_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"one").unwrap();
        let first = metadata_fingerprint(&std::fs::metadata(&path).unwrap(), 1);
        assert_eq!(first, metadata_fingerprint(&std::fs::metadata(&path).unwrap(), 1));

        std::fs::write(&path, b"longer contents").unwrap();
        let second = metadata_fingerprint(&std::fs::metadata(&path).unwrap(), 1);
        assert_ne!(first, second);
    }
}
