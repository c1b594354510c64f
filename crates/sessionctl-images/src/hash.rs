//! Content hash over a build spec.

use sessionctl_types::FileSeed;
use sha2::{Digest, Sha256};

const SEP: &[u8] = b"\x00";

/// 16-hex-character prefix of a SHA-256 over `(baseImage, setup lines,
/// sorted (path, content) pairs)`, separated so no adjacent-field
/// concatenation can collide across different splits of the same bytes.
///
/// Files are sorted by path first so insertion order never affects the
/// hash; setup lines are hashed in the order given, so reordering them
/// changes the hash.
pub fn hash_spec(base_image: &str, setup: &[String], files: &[FileSeed]) -> String {
    let mut sorted_files: Vec<&FileSeed> = files.iter().collect();
    sorted_files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = Sha256::new();
    hasher.update(base_image.as_bytes());
    hasher.update(SEP);

    for line in setup {
        hasher.update(line.as_bytes());
        hasher.update(SEP);
    }
    hasher.update(SEP);

    for file in sorted_files {
        hasher.update(file.path.as_bytes());
        hasher.update(SEP);
        hasher.update(&file.content);
        hasher.update(SEP);
    }

    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_16_hex_chars() {
        let h = hash_spec("python:3.11", &["RUN a".into()], &[]);
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn same_inputs_hash_identically() {
        let a = hash_spec("python:3.11", &["RUN a".into(), "RUN b".into()], &[]);
        let b = hash_spec("python:3.11", &["RUN a".into(), "RUN b".into()], &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_base_image_hashes_differently() {
        let a = hash_spec("python:3.11", &[], &[]);
        let b = hash_spec("python:3.12", &[], &[]);
        assert_ne!(a, b);
    }
}
