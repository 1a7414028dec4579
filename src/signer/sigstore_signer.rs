use std::{fs, path::Path};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::{
    context::Context, error::CapabilityError, signer::BundleSigner,
    sigstore_bundle::SigstoreBundle,
};

/// Signer that delegates to a remote Sigstore signing service.
///
/// The service obtains a short-lived certificate for `identity`, signs the
/// message, records it in the transparency log, and answers with a bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigstoreSigner {
    /// Base URL of the signing service
    pub url: String,
    /// API key for authenticating with the service
    pub api_key: String,
    /// Identity the signing certificate is issued to
    pub identity: String,
}

impl SigstoreSigner {
    pub fn new(url: String, api_key: String, identity: String) -> Self {
        Self {
            url,
            api_key,
            identity,
        }
    }

    /// Loads signer settings from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `signer_info_file` - Path to the JSON configuration file.
    pub fn load(signer_info_file: &Path) -> Result<Self> {
        let contents = fs::read_to_string(signer_info_file).map_err(|e| {
            anyhow!(
                "Failed to read Sigstore signer info {}: {e}",
                signer_info_file.display()
            )
        })?;
        let signer = serde_json::from_str::<SigstoreSigner>(&contents)?;
        log::info!("Loaded Sigstore signer for {}", signer.identity);

        Ok(signer)
    }

    async fn request_bundle(&self, data: &[u8]) -> Result<SigstoreBundle> {
        let url = &self.url;

        let request = SignRequest {
            message: BASE64.encode(data),
            identity: self.identity.clone(),
        };

        let request = reqwest::Client::new()
            .post(format!("{url}/api/v1/sign"))
            .bearer_auth(&self.api_key)
            .json(&request);

        log::trace!("Sign request '{:?}'", request);

        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;

        log::debug!("Response status: {status}, body: {text}");

        if !status.is_success() {
            return Err(anyhow!("Request failed with status {status}: {text}"));
        }

        if text.is_empty() {
            return Err(anyhow!("Server returned empty response"));
        }

        let bundle = serde_json::from_str::<SigstoreBundle>(&text)
            .map_err(|e| anyhow!("Failed to parse Sigstore bundle: {e}. Response body: {text}"))?;

        Ok(bundle)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    message: String,
    identity: String,
}

#[async_trait]
impl BundleSigner for SigstoreSigner {
    async fn sign_bundle(
        &self,
        ctx: &Context,
        data: &[u8],
    ) -> Result<SigstoreBundle, CapabilityError> {
        ctx.run(async { self.request_bundle(data).await.map_err(CapabilityError::from) })
            .await
    }

    fn key_id(&self) -> Result<String> {
        if self.identity.is_empty() {
            return Err(anyhow!("Sigstore signer has no identity configured"));
        }
        Ok(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn load_reads_camel_case_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigstore.json");
        fs::write(
            &path,
            r#"{"url": "https://signer.example.com", "apiKey": "k", "identity": "alice@example.com"}"#,
        )
        .unwrap();

        let signer = SigstoreSigner::load(&path).unwrap();
        assert_eq!(signer.url, "https://signer.example.com");
        assert_eq!(signer.key_id().unwrap(), "alice@example.com");
    }

    #[test]
    fn missing_identity_fails_key_resolution() {
        let signer = SigstoreSigner::new("https://x".to_owned(), "k".to_owned(), String::new());
        assert!(signer.key_id().is_err());
    }

    #[tokio::test]
    async fn expired_deadline_aborts_before_request() {
        // Unroutable address; the expired deadline must win before any connect.
        let signer = SigstoreSigner::new(
            "http://10.255.255.1".to_owned(),
            "k".to_owned(),
            "alice@example.com".to_owned(),
        );
        let ctx = Context::new().with_timeout(Duration::ZERO);

        let err = signer.sign_bundle(&ctx, b"data").await.unwrap_err();
        assert!(matches!(err, CapabilityError::DeadlineExceeded));
    }
}
