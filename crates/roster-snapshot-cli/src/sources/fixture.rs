use std::path::PathBuf;

use roster_snapshot::{Endpoint, EndpointFetcher, EndpointPayload, FetchError};

/// Serves endpoint payloads from `<dir>/<endpoint>.json` files.
///
/// Useful for replaying captured provider responses and for offline runs.
pub struct DirectoryFetcher {
    label: String,
    dir: PathBuf,
    endpoints: Vec<Endpoint>,
}

impl DirectoryFetcher {
    pub fn new(dir: impl Into<PathBuf>, endpoints: Vec<Endpoint>) -> Self {
        let dir = dir.into();
        Self {
            label: format!("fixtures:{}", dir.display()),
            dir,
            endpoints,
        }
    }

    fn payload_path(&self, endpoint: &Endpoint) -> PathBuf {
        self.dir.join(format!("{}.json", endpoint.name))
    }
}

#[async_trait::async_trait]
impl EndpointFetcher for DirectoryFetcher {
    fn label(&self) -> &str {
        &self.label
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }

    async fn fetch(&self, endpoint: &Endpoint) -> Result<EndpointPayload, FetchError> {
        let path = self.payload_path(endpoint);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Unavailable(format!(
                    "{endpoint}: no fixture at {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(FetchError::Other(format!("{}: {e}", path.display())));
            }
        };
        tracing::debug!(endpoint = %endpoint, path = %path.display(), "Loaded fixture");
        EndpointPayload::from_json(&text)
    }
}
