//! HuggingFace model downloader
//!
//! Fetches every file of a model repository into a local directory. Partial
//! downloads are kept as `.tmp` files and resumed with a `Range` request.

use crate::storage::StorageError;
use crate::types::ModelInfo;
use reqwest::header::{RANGE, USER_AGENT};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const HF_BASE: &str = "https://huggingface.co";
const CLIENT_AGENT: &str = concat!("recibos/", env!("CARGO_PKG_VERSION"));

/// A repository reference: `owner/repo` plus revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub repo_id: String,
    pub revision: String,
}

impl RepoRef {
    /// Accepts `owner/repo` or a huggingface.co URL (`.../tree/<rev>` picks the revision).
    pub fn parse(reference: &str, default_revision: &str) -> Result<Self, StorageError> {
        let reference = reference.trim();
        let reference = reference.split('?').next().unwrap_or(reference);
        let reference = reference.split('#').next().unwrap_or(reference);

        let path = reference
            .strip_prefix("https://huggingface.co/")
            .or_else(|| reference.strip_prefix("http://huggingface.co/"))
            .unwrap_or(reference);

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }

        let marker = parts[2..]
            .iter()
            .position(|&p| p == "tree" || p == "resolve" || p == "blob")
            .map(|pos| pos + 2);
        let revision = match marker {
            Some(pos) if parts.len() > pos + 1 => parts[pos + 1].to_string(),
            _ => default_revision.to_string(),
        };

        Ok(Self {
            repo_id: format!("{}/{}", parts[0], parts[1]),
            revision,
        })
    }

    /// Build the download URL for a file of this repo
    pub fn file_url(&self, path: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            HF_BASE, self.repo_id, self.revision, path
        )
    }

    fn tree_url(&self) -> String {
        format!(
            "{}/api/models/{}/tree/{}?recursive=1",
            HF_BASE, self.repo_id, self.revision
        )
    }
}

/// A file listed by the HuggingFace tree API
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RepoFile {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

/// Turn a repo-relative path into a safe local file name
pub fn sanitize_local_filename(filename: &str) -> Result<String, StorageError> {
    let invalid = || StorageError::InvalidReference(filename.to_string());

    let trimmed = filename.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let flattened = trimmed.replace('\\', "/").replace('/', "__");

    let mut sanitized = String::with_capacity(flattened.len());
    for ch in flattened.chars() {
        let bad = matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*');
        if bad || ch.is_control() {
            sanitized.push('_');
        } else {
            sanitized.push(ch);
        }
    }

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.' || c == '_') {
        return Err(invalid());
    }

    Ok(sanitized)
}

/// List the files of a repository revision
pub async fn list_repo_files(
    client: &reqwest::Client,
    repo: &RepoRef,
) -> Result<Vec<RepoFile>, StorageError> {
    let url = repo.tree_url();
    let response = client.get(&url).header(USER_AGENT, CLIENT_AGENT).send().await?;

    if !response.status().is_success() {
        return Err(StorageError::BadStatus {
            status: response.status().as_u16(),
            url,
        });
    }

    let entries: Vec<RepoFile> = response.json().await?;
    Ok(entries.into_iter().filter(|e| e.kind == "file").collect())
}

/// Download every file of `repo` into `target_dir`
///
/// `on_progress(bytes_done, bytes_total)` is called after every chunk. Files
/// already present with the expected size are skipped; `.tmp` leftovers resume.
pub async fn download_repo(
    client: &reqwest::Client,
    repo: &RepoRef,
    target_dir: &Path,
    on_progress: impl Fn(u64, u64) + Send + Sync,
) -> Result<ModelInfo, StorageError> {
    let files = list_repo_files(client, repo).await?;
    if files.is_empty() {
        return Err(StorageError::InvalidReference(format!(
            "{} has no files at revision {}",
            repo.repo_id, repo.revision
        )));
    }

    fs::create_dir_all(target_dir).await?;

    let bytes_total: u64 = files.iter().map(|f| f.size).sum();
    let mut bytes_done: u64 = 0;
    let mut local_files = Vec::with_capacity(files.len());

    tracing::info!(
        "Fetching {} files ({}) for {}",
        files.len(),
        format_size(bytes_total),
        repo.repo_id
    );
    on_progress(0, bytes_total);

    for file in &files {
        let local_name = sanitize_local_filename(&file.path)?;
        let output_path = target_dir.join(&local_name);

        if is_complete(&output_path, file.size).await {
            tracing::debug!("Already present: {:?}", output_path);
            bytes_done += file.size;
            on_progress(bytes_done, bytes_total);
            local_files.push(local_name);
            continue;
        }

        let base = bytes_done;
        let written = download_file(client, &repo.file_url(&file.path), &output_path, file.size, |n| {
            on_progress(base + n, bytes_total)
        })
        .await?;

        bytes_done += written;
        local_files.push(local_name);
    }

    on_progress(bytes_total, bytes_total);
    tracing::info!("Model files ready in {:?}", target_dir);

    Ok(ModelInfo {
        model_id: repo.repo_id.clone(),
        directory: target_dir.to_path_buf(),
        files: local_files,
        size_bytes: bytes_total,
    })
}

/// Download one file, resuming from `<output>.tmp` when possible
///
/// Returns the final file size. `on_bytes` receives the running byte count
/// for this file, including any resumed prefix.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    output_path: &Path,
    expected_size: u64,
    on_bytes: impl Fn(u64),
) -> Result<u64, StorageError> {
    let temp_path = temp_path_for(output_path);

    let mut offset = match fs::metadata(&temp_path).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };
    if expected_size > 0 && offset > expected_size {
        offset = 0;
    }

    let mut request = client.get(url).header(USER_AGENT, CLIENT_AGENT);
    if offset > 0 {
        tracing::info!("Resuming {} from byte {}", url, offset);
        request = request.header(RANGE, format!("bytes={}-", offset));
    }

    let mut response = request.send().await?;
    let status = response.status();

    if status == StatusCode::RANGE_NOT_SATISFIABLE && offset == expected_size && offset > 0 {
        // The partial file already holds everything
        fs::rename(&temp_path, output_path).await?;
        on_bytes(offset);
        return Ok(offset);
    }

    if !status.is_success() {
        return Err(StorageError::BadStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
    if offset > 0 && !resumed {
        tracing::warn!("Server ignored range request, restarting {}", url);
        offset = 0;
    }

    let mut temp_file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(resumed)
        .truncate(!resumed)
        .open(&temp_path)
        .await?;

    let mut downloaded = offset;
    on_bytes(downloaded);
    while let Some(chunk) = response.chunk().await? {
        temp_file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_bytes(downloaded);
    }
    temp_file.flush().await?;
    drop(temp_file);

    if expected_size > 0 && downloaded != expected_size {
        return Err(StorageError::Incomplete {
            file: output_path.display().to_string(),
            expected: expected_size,
            actual: downloaded,
        });
    }

    fs::rename(&temp_path, output_path).await?;
    tracing::debug!("Downloaded {:?} ({})", output_path, format_size(downloaded));

    Ok(downloaded)
}

async fn is_complete(path: &Path, expected_size: u64) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && (expected_size == 0 || meta.len() == expected_size),
        Err(_) => false,
    }
}

fn temp_path_for(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    output_path.with_file_name(name)
}

/// Local directory name for a repo id
pub fn repo_dir_name(repo_id: &str) -> String {
    repo_id.replace('/', "--")
}

/// Get a human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one request with a canned response; the task yields the request head.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/model.safetensors", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&head).to_lowercase()
        });

        (url, server)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn test_parse_repo_id() {
        let repo = RepoRef::parse("mlx-community/DeepSeek-OCR-2-4bit", "main").unwrap();
        assert_eq!(repo.repo_id, "mlx-community/DeepSeek-OCR-2-4bit");
        assert_eq!(repo.revision, "main");
    }

    #[test]
    fn test_parse_full_url_with_revision() {
        let repo = RepoRef::parse(
            "https://huggingface.co/mlx-community/DeepSeek-OCR-2-4bit/tree/v2?x=1",
            "main",
        )
        .unwrap();
        assert_eq!(repo.repo_id, "mlx-community/DeepSeek-OCR-2-4bit");
        assert_eq!(repo.revision, "v2");
    }

    #[test]
    fn test_parse_rejects_bare_name() {
        assert!(RepoRef::parse("DeepSeek-OCR", "main").is_err());
        assert!(RepoRef::parse("  ", "main").is_err());
    }

    #[test]
    fn test_file_url() {
        let repo = RepoRef::parse("acme/vlm", "main").unwrap();
        assert_eq!(
            repo.file_url("weights/model.safetensors"),
            "https://huggingface.co/acme/vlm/resolve/main/weights/model.safetensors"
        );
    }

    #[test]
    fn test_sanitize_local_filename() {
        assert_eq!(
            sanitize_local_filename("weights/model.safetensors").unwrap(),
            "weights__model.safetensors"
        );
        assert_eq!(sanitize_local_filename("a:b?.json").unwrap(), "a_b_.json");
        assert_eq!(sanitize_local_filename("config.json. ").unwrap(), "config.json");
        assert!(sanitize_local_filename("").is_err());
        assert!(sanitize_local_filename("..").is_err());
    }

    #[test]
    fn test_temp_path_and_dir_name() {
        let temp = temp_path_for(Path::new("/models/acme--vlm/model.safetensors"));
        assert_eq!(temp, PathBuf::from("/models/acme--vlm/model.safetensors.tmp"));
        assert_eq!(repo_dir_name("acme/vlm"), "acme--vlm");
    }

    #[tokio::test]
    async fn test_is_complete_checks_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(!is_complete(&path, 4).await);

        fs::write(&path, b"{}").await.unwrap();
        assert!(!is_complete(&path, 4).await);
        assert!(is_complete(&path, 2).await);
        assert!(is_complete(&path, 0).await);
    }

    #[tokio::test]
    async fn test_download_resumes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.safetensors");
        fs::write(temp_path_for(&output), b"0123").await.unwrap();
        let (url, server) = serve_once("206 Partial Content", b"456789").await;
        let seen = Mutex::new(Vec::new());

        let written = download_file(&client(), &url, &output, 10, |n| seen.lock().unwrap().push(n))
            .await
            .unwrap();

        assert_eq!(written, 10);
        assert_eq!(fs::read(&output).await.unwrap(), b"0123456789");
        assert!(!fs::try_exists(temp_path_for(&output)).await.unwrap());
        assert!(server.await.unwrap().contains("range: bytes=4-"));

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&4));
        assert_eq!(seen.last(), Some(&10));
    }

    #[tokio::test]
    async fn test_download_restarts_when_range_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.safetensors");
        fs::write(temp_path_for(&output), b"XXXX").await.unwrap();
        let (url, server) = serve_once("200 OK", b"0123456789").await;

        let written = download_file(&client(), &url, &output, 10, |_| {}).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(fs::read(&output).await.unwrap(), b"0123456789");
        assert!(server.await.unwrap().contains("range: bytes=4-"));
    }

    #[tokio::test]
    async fn test_download_keeps_complete_partial_on_416() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.safetensors");
        fs::write(temp_path_for(&output), b"0123456789").await.unwrap();
        let (url, server) = serve_once("416 Range Not Satisfiable", b"").await;

        let written = download_file(&client(), &url, &output, 10, |_| {}).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(fs::read(&output).await.unwrap(), b"0123456789");
        assert!(!fs::try_exists(temp_path_for(&output)).await.unwrap());
        assert!(server.await.unwrap().contains("range: bytes=10-"));
    }

    #[tokio::test]
    async fn test_download_short_body_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.safetensors");
        let (url, server) = serve_once("200 OK", b"01234").await;

        let err = download_file(&client(), &url, &output, 10, |_| {}).await.unwrap_err();

        assert!(matches!(
            err,
            StorageError::Incomplete { expected: 10, actual: 5, .. }
        ));
        assert!(!fs::try_exists(&output).await.unwrap());
        // Partial bytes stay behind for the next attempt to resume
        assert_eq!(fs::read(temp_path_for(&output)).await.unwrap(), b"01234");
        assert!(!server.await.unwrap().contains("range:"));
    }

    #[tokio::test]
    async fn test_download_rejects_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("model.safetensors");
        let (url, _server) = serve_once("404 Not Found", b"missing").await;

        let err = download_file(&client(), &url, &output, 10, |_| {}).await.unwrap_err();

        assert!(matches!(err, StorageError::BadStatus { status: 404, .. }));
        assert!(!fs::try_exists(&output).await.unwrap());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
