//! File digests and tolerant checksum comparison.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;
use upkeep_schema::HashAlgorithm;

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("no checksum algorithm available")]
    UnknownAlgorithm,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compute the lowercase hex digest of the file at `path`.
pub fn calculate(path: &Path, algorithm: HashAlgorithm) -> Result<String, ChecksumError> {
    let digest = match algorithm {
        HashAlgorithm::Unknown => return Err(ChecksumError::UnknownAlgorithm),
        HashAlgorithm::Md5 => hash_file::<Md5>(path),
        HashAlgorithm::Sha1 => hash_file::<Sha1>(path),
        HashAlgorithm::Sha256 => hash_file::<Sha256>(path),
        HashAlgorithm::Sha384 => hash_file::<Sha384>(path),
        HashAlgorithm::Sha512 => hash_file::<Sha512>(path),
    };
    digest.map_err(|source| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn hash_file<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase `checksum` and drop everything that is not a hex digit.
///
/// Returns `None` if nothing is left.
pub fn normalize(checksum: &str) -> Option<String> {
    let hex: String = checksum
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!hex.is_empty()).then_some(hex)
}

/// True iff both checksums normalize to the same non-empty hex string.
pub fn are_equal(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
