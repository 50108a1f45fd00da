//! Input staging: normalise a path, URL, or in-memory byte buffer to a
//! local PDF file.
//!
//! ## Why a temp file?
//!
//! pdfium wants a file-system path. Downloads and byte buffers land in
//! tempfile-managed storage whose cleanup happens on drop, even when the
//! job panics — which is what guarantees the "temporary input removed on
//! every exit path" contract without explicit cleanup code in the
//! orchestrator. The `%PDF` magic is validated up front so malformed
//! requests are rejected before any job record exists and callers get a
//! meaningful error rather than a backend crash.

use crate::error::Paper2SpeechError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A staged input document, with whatever storage keeps it alive.
#[derive(Debug)]
pub enum StagedInput {
    /// A caller-owned file; nothing to clean up.
    OnDisk(PathBuf),
    /// Downloaded into a temp directory that lives as long as this value.
    Downloaded { path: PathBuf, _dir: TempDir },
    /// Byte payload written to a managed temp file.
    Buffered { path: PathBuf, _file: NamedTempFile },
}

impl StagedInput {
    /// Path to the document regardless of how it was staged.
    pub fn path(&self) -> &Path {
        match self {
            StagedInput::OnDisk(path) => path,
            StagedInput::Downloaded { path, .. } => path,
            StagedInput::Buffered { path, .. } => path,
        }
    }
}

/// Does the input string name a remote document?
pub fn is_url(input: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| input.starts_with(scheme))
}

/// Stage an input string — local path or URL — as a local PDF file.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<StagedInput, Paper2SpeechError> {
    if input.trim().is_empty() {
        return Err(Paper2SpeechError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        fetch_remote(input, timeout_secs).await
    } else {
        stage_local(input)
    }
}

/// Stage an in-memory byte payload as a managed temp file.
pub fn resolve_bytes(bytes: &[u8]) -> Result<StagedInput, Paper2SpeechError> {
    validate_pdf_bytes(bytes)?;

    let mut file = NamedTempFile::new()
        .map_err(|e| Paper2SpeechError::Internal(format!("tempfile: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| Paper2SpeechError::Internal(format!("tempfile write: {e}")))?;
    let path = file.path().to_path_buf();

    debug!("Staged {} input bytes at {}", bytes.len(), path.display());
    Ok(StagedInput::Buffered { path, _file: file })
}

/// Validate that a byte payload carries the PDF magic, without staging
/// it anywhere. Used to reject malformed requests before a job record
/// exists.
pub(crate) fn validate_pdf_bytes(bytes: &[u8]) -> Result<(), Paper2SpeechError> {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if &magic != PDF_MAGIC {
        return Err(Paper2SpeechError::NotAPdf {
            path: PathBuf::from("<in-memory bytes>"),
            magic,
        });
    }
    Ok(())
}

/// Stage a caller-owned local file after checking existence, readability,
/// and magic bytes.
fn stage_local(path_str: &str) -> Result<StagedInput, Paper2SpeechError> {
    let path = PathBuf::from(path_str);

    let mut magic = [0u8; 4];
    let read = std::fs::File::open(&path).and_then(|mut f| {
        use std::io::Read;
        f.read_exact(&mut magic)
    });

    match read {
        Ok(()) if &magic != PDF_MAGIC => return Err(Paper2SpeechError::NotAPdf { path, magic }),
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Paper2SpeechError::PermissionDenied { path });
        }
        // A document shorter than the magic header is as good as absent.
        Err(_) => return Err(Paper2SpeechError::FileNotFound { path }),
    }

    debug!("Staged local document: {}", path.display());
    Ok(StagedInput::OnDisk(path))
}

/// Download a remote document into a fresh temp directory.
async fn fetch_remote(url: &str, timeout_secs: u64) -> Result<StagedInput, Paper2SpeechError> {
    info!("Fetching document: {}", url);

    let fail = |reason: String| Paper2SpeechError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Paper2SpeechError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            fail(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }

    let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;
    validate_pdf_bytes(&body)?;

    let dir = TempDir::new().map_err(|e| Paper2SpeechError::Internal(e.to_string()))?;
    let path = dir.path().join(remote_filename(url));
    tokio::fs::write(&path, &body)
        .await
        .map_err(|e| Paper2SpeechError::Internal(format!("failed to write temp file: {e}")))?;

    info!("Fetched {} bytes to {}", body.len(), path.display());
    Ok(StagedInput::Downloaded { path, _dir: dir })
}

/// Pick a filename for a downloaded document from the URL's last path
/// segment, falling back to a fixed name.
fn remote_filename(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.path_segments().and_then(|mut segments| {
                segments
                    .next_back()
                    .filter(|last| last.contains('.'))
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| "input.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/paper.pdf"));
        assert!(is_url("http://example.com/paper.pdf"));
        assert!(!is_url("/tmp/paper.pdf"));
        assert!(!is_url("paper.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = stage_local("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Paper2SpeechError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_bytes_are_rejected_before_any_job_exists() {
        let err = resolve_bytes(b"hello world").unwrap_err();
        assert!(matches!(err, Paper2SpeechError::NotAPdf { .. }));
    }

    #[test]
    fn short_payload_is_rejected() {
        assert!(validate_pdf_bytes(b"%P").is_err());
        assert!(validate_pdf_bytes(b"").is_err());
    }

    #[test]
    fn pdf_bytes_are_staged_to_a_temp_file() {
        let staged = resolve_bytes(b"%PDF-1.7\nrest").unwrap();
        assert!(staged.path().exists());
        let path = staged.path().to_path_buf();
        drop(staged);
        // Drop removes the staged input.
        assert!(!path.exists());
    }

    #[test]
    fn non_pdf_local_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"plain text, not a pdf").unwrap();
        let err = stage_local(f.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Paper2SpeechError::NotAPdf { .. }));
    }

    #[test]
    fn remote_filename_from_last_segment() {
        assert_eq!(
            remote_filename("https://arxiv.org/pdf/1706.03762.pdf"),
            "1706.03762.pdf"
        );
        assert_eq!(remote_filename("https://example.com/"), "input.pdf");
    }
}
