//! Asset transports, candidate path discovery and GLB loading.

pub mod discovery;
pub mod loader;

pub use discovery::find_reachable_path;
pub use loader::{AssetError, AssetLoader, LoadProgress, LoadedAsset};

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const LOCAL_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{path}: not reachable ({reason})")]
    Unreachable { path: String, reason: String },
    #[error("{path}: server answered {status}")]
    Status { path: String, status: u16 },
    #[error("{path}: transfer interrupted ({reason})")]
    Interrupted { path: String, reason: String },
    #[error("{path}: escapes the asset root")]
    OutsideRoot { path: String },
}

/// Byte counts reported while an asset streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub received: u64,
    /// Declared length, when the source announced one.
    pub total: Option<u64>,
}

/// Where model assets are fetched from.
pub trait AssetTransport: Send + Sync + 'static {
    /// Headers-only existence check.
    fn probe(&self, path: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fetch the whole asset, reporting progress after every chunk.
    fn fetch(
        &self,
        path: &str,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// HTTP transport: HEAD probes and chunked GETs relative to a base URL.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, probe_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(probe_timeout)
            .build()
            .map_err(|err| TransportError::Unreachable {
                path: base_url.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}

impl AssetTransport for HttpTransport {
    async fn probe(&self, path: &str) -> Result<(), TransportError> {
        let url = self.url_for(path);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|err| TransportError::Unreachable {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn fetch(
        &self,
        path: &str,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.url_for(path);
        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| TransportError::Unreachable {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length();
        let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|err| TransportError::Interrupted {
                    path: path.to_string(),
                    reason: err.to_string(),
                })?;
            let Some(chunk) = chunk else {
                break;
            };
            bytes.extend_from_slice(&chunk);
            on_progress(TransferProgress {
                received: bytes.len() as u64,
                total,
            });
        }

        if let Some(total) = total {
            if (bytes.len() as u64) < total {
                return Err(TransportError::Interrupted {
                    path: path.to_string(),
                    reason: format!("received {} of {} bytes", bytes.len(), total),
                });
            }
        }
        Ok(bytes)
    }
}

/// Serves candidate paths from a directory; `/models/a.glb` maps to
/// `<root>/models/a.glb`.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, TransportError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(TransportError::OutsideRoot {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl AssetTransport for LocalTransport {
    async fn probe(&self, path: &str) -> Result<(), TransportError> {
        let file = self.resolve(path)?;
        match tokio::fs::metadata(&file).await {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(TransportError::Unreachable {
                path: path.to_string(),
                reason: "not a file".to_string(),
            }),
            Err(err) => Err(TransportError::Unreachable {
                path: path.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn fetch(
        &self,
        path: &str,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> Result<Vec<u8>, TransportError> {
        let file = self.resolve(path)?;
        let unreachable = |err: std::io::Error| TransportError::Unreachable {
            path: path.to_string(),
            reason: err.to_string(),
        };
        let mut handle = tokio::fs::File::open(&file).await.map_err(unreachable)?;
        let total = handle.metadata().await.map_err(unreachable)?.len();

        let mut bytes = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; LOCAL_CHUNK_SIZE];
        loop {
            let read = handle
                .read(&mut chunk)
                .await
                .map_err(|err| TransportError::Interrupted {
                    path: path.to_string(),
                    reason: err.to_string(),
                })?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            on_progress(TransferProgress {
                received: bytes.len() as u64,
                total: Some(total),
            });
        }
        Ok(bytes)
    }
}

/// Transport picked at runtime from the configured asset base.
#[derive(Clone)]
pub enum Transport {
    Http(HttpTransport),
    Local(LocalTransport),
}

impl Transport {
    /// `http(s)://` bases use HTTP, anything else is treated as a directory.
    pub fn for_base(base: &str, probe_timeout: Duration) -> Result<Self, TransportError> {
        if base.starts_with("http://") || base.starts_with("https://") {
            Ok(Transport::Http(HttpTransport::new(base, probe_timeout)?))
        } else {
            Ok(Transport::Local(LocalTransport::new(base)))
        }
    }
}

impl AssetTransport for Transport {
    async fn probe(&self, path: &str) -> Result<(), TransportError> {
        match self {
            Transport::Http(http) => http.probe(path).await,
            Transport::Local(local) => local.probe(path).await,
        }
    }

    async fn fetch(
        &self,
        path: &str,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> Result<Vec<u8>, TransportError> {
        match self {
            Transport::Http(http) => http.fetch(path, on_progress).await,
            Transport::Local(local) => local.fetch(path, on_progress).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetTransport, LocalTransport, Transport, TransportError};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn local_transport_probes_and_fetches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/a.glb"), vec![7u8; 600 * 1024]).unwrap();

        let transport = LocalTransport::new(dir.path());
        assert!(transport.probe("/models/a.glb").await.is_ok());
        assert!(transport.probe("/models/missing.glb").await.is_err());
        assert!(transport.probe("/models").await.is_err());

        let seen = Mutex::new(Vec::new());
        let bytes = transport
            .fetch("/models/a.glb", &|progress| {
                seen.lock().unwrap().push(progress);
            })
            .await
            .unwrap();
        assert_eq!(bytes.len(), 600 * 1024);
        let seen = seen.into_inner().unwrap();
        assert!(seen.len() >= 3);
        assert!(seen.iter().all(|p| p.total == Some(600 * 1024)));
        assert_eq!(seen.last().unwrap().received, 600 * 1024);
    }

    #[tokio::test]
    async fn local_transport_rejects_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new(dir.path());
        let err = transport.probe("/../etc/passwd").await.unwrap_err();
        assert!(matches!(err, TransportError::OutsideRoot { .. }));
    }

    #[test]
    fn base_selects_transport_kind() {
        let http = Transport::for_base("https://cdn.example.com/", Duration::from_secs(1)).unwrap();
        assert!(matches!(http, Transport::Http(_)));
        let local = Transport::for_base("./public", Duration::from_secs(1)).unwrap();
        assert!(matches!(local, Transport::Local(_)));
    }
}
