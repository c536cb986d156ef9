//! XTRA download for the engine's predicted-orbits requests.

use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{debug, warn};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest blob accepted from a server.
const MAX_XTRA_LEN: usize = 1024 * 1024;

/// Servers to try, engine-reported first, then the configured fallbacks.
#[derive(Debug, Clone)]
pub struct XtraSource {
    reported: Vec<String>,
    fallback: Vec<String>,
    client: reqwest::Client,
}

impl XtraSource {
    pub fn new(fallback: Vec<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            reported: Vec::new(),
            fallback,
            client,
        })
    }

    /// Replace the engine-reported servers; empty slots are skipped.
    pub fn update(&mut self, urls: &[String]) {
        self.reported = urls.iter().filter(|u| !u.is_empty()).cloned().collect();
    }

    pub fn candidates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for url in self.reported.iter().chain(&self.fallback) {
            if !out.contains(url) {
                out.push(url.clone());
            }
        }
        out
    }

    /// Fetch from the first server that answers with a usable blob.
    pub async fn download(&self) -> anyhow::Result<Vec<u8>> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            bail!("no XTRA server known");
        }
        for url in &candidates {
            match self.fetch(url).await {
                Ok(blob) => {
                    debug!(url = %url, len = blob.len(), "XTRA downloaded");
                    return Ok(blob);
                }
                Err(e) => warn!(url = %url, error = %e, "XTRA download failed"),
            }
        }
        bail!("all {} XTRA servers failed", candidates.len())
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let body = resp.bytes().await?;
        check_blob(&body)?;
        Ok(body.to_vec())
    }
}

fn check_blob(body: &[u8]) -> anyhow::Result<()> {
    if body.is_empty() {
        bail!("empty XTRA body");
    }
    if body.len() > MAX_XTRA_LEN {
        bail!("XTRA body of {} bytes is too large", body.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_servers_come_first_without_duplicates() {
        let mut src = XtraSource::new(vec![
            "https://fallback/xtra.bin".into(),
            "https://b/xtra.bin".into(),
        ])
        .unwrap();
        assert_eq!(src.candidates().len(), 2);
        src.update(&[
            "https://a/xtra.bin".into(),
            String::new(),
            "https://b/xtra.bin".into(),
        ]);
        assert_eq!(
            src.candidates(),
            vec![
                "https://a/xtra.bin".to_string(),
                "https://b/xtra.bin".to_string(),
                "https://fallback/xtra.bin".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn no_servers_fails_fast() {
        let src = XtraSource::new(Vec::new()).unwrap();
        assert!(src.download().await.is_err());
    }

    #[test]
    fn blob_limits() {
        assert!(check_blob(&[]).is_err());
        assert!(check_blob(&[0u8; 16]).is_ok());
        assert!(check_blob(&vec![0u8; MAX_XTRA_LEN + 1]).is_err());
    }
}
