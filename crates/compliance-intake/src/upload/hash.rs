use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::UploadError;

/// SHA-256 of the file's bytes, lowercase hex.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    hash_file_unless(path, &AtomicBool::new(false))
}

/// Like [`hash_file`], but gives up with `Interrupted` once `abort` is set.
/// The flag is checked before every 64 KiB read.
fn hash_file_unless(path: &Path, abort: &AtomicBool) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        if abort.load(Ordering::Relaxed) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "hashing aborted",
            ));
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes on the blocking pool so transfers on the runtime keep moving.
pub async fn compute_content_hash(path: PathBuf) -> Result<String, UploadError> {
    compute_content_hash_unless(path, Arc::new(AtomicBool::new(false))).await
}

/// Blocking-pool hash that stops reading once `abort` is set. Dropping the
/// returned future does not stop the blocking task; set the flag for that.
pub(crate) async fn compute_content_hash_unless(
    path: PathBuf,
    abort: Arc<AtomicBool>,
) -> Result<String, UploadError> {
    let file_name = crate::telemetry::redact_path(&path);
    tokio::task::spawn_blocking(move || hash_file_unless(&path, &abort))
        .await
        .map_err(|e| UploadError::HashTask(e.to_string()))?
        .map_err(|source| UploadError::Hash { file_name, source })
}
