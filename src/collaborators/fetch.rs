//! HTTP download collaborator for remote file resources.

use converge::{ActionError, RemoteSource};
use std::path::Path;

/// Maximum download size (500 MB covers source tarballs comfortably).
const MAX_BODY_SIZE: u64 = 500 * 1024 * 1024;

/// Fetches URLs over HTTP(S) with a bounded body size.
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl RemoteSource for HttpSource {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), ActionError> {
        log::info!("fetching {url}");

        let fetch_err = |message: String| ActionError::Fetch {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", "sous")
            .call()
            .map_err(|e| fetch_err(e.to_string()))?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(|e| fetch_err(e.to_string()))?;

        std::fs::write(dest, &bytes).map_err(|source| ActionError::Filesystem {
            path: dest.to_path_buf(),
            source,
        })
    }
}
