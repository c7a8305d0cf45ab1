//! AWS credential resolution.
//!
//! Explicit credentials from the session config win; otherwise the default
//! provider chain (environment, profile, IMDS) is consulted. Resolution runs
//! before any session work so credential failures never open a stream.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_credential_types::provider::ProvideCredentials;

use super::config::{AwsRegion, ExplicitCredentials};
use super::error::{SpeechError, SpeechResult};

/// Credentials handed to the duplex transport.
pub type ResolvedCredentials = Credentials;

/// Resolve credentials for the target region.
pub async fn resolve(
    region: AwsRegion,
    explicit: Option<&ExplicitCredentials>,
) -> SpeechResult<ResolvedCredentials> {
    if let Some(creds) = explicit {
        if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
            return Err(SpeechError::Credentials(
                "Explicit credentials are missing an access key id or secret".to_string(),
            ));
        }
        tracing::debug!("Using explicit AWS credentials");
        return Ok(Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token.clone(),
            None,
            "explicit",
        ));
    }

    tracing::debug!(region = region.as_str(), "Resolving AWS credentials from the default chain");
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.as_str()))
        .load()
        .await;

    let provider = config.credentials_provider().ok_or_else(|| {
        SpeechError::Credentials("No credentials provider available in the default chain".to_string())
    })?;

    provider
        .provide_credentials()
        .await
        .map_err(|e| SpeechError::Credentials(format!("Failed to resolve AWS credentials: {}", e)))
}
