//! Resolution of the blob service endpoint and API version
use std::env;

use crate::error::{BlobServiceError, Result};

const BLOB_API_VERSION: &str = "2021-08-06";
const EMULATOR_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

pub(crate) const ENDPOINT_ENV: &str = "AZURE_STORAGE_BLOB_ENDPOINT";
pub(crate) const ACCOUNT_ENV: &str = "AZURE_STORAGE_ACCOUNT";
const API_VERSION_ENV: &str = "AZURE_STORAGE_API_VERSION_OVERRIDE";

/// Where a [`BlobServiceClient`] sends its requests
///
/// [`BlobServiceClient`]: crate::client::BlobServiceClient
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// The blob service URL, e.g. `https://myaccount.blob.core.windows.net`
    pub endpoint: String,
    /// Value of the `x-ms-version` header
    pub api_version: String,
}

impl ClientConfig {
    /// Reads the endpoint from `AZURE_STORAGE_BLOB_ENDPOINT`, falling back to
    /// the public endpoint of `AZURE_STORAGE_ACCOUNT`
    pub fn from_env() -> Result<Self> {
        let endpoint = env::var(ENDPOINT_ENV).ok();
        let account = env::var(ACCOUNT_ENV).ok();
        Self::resolve(endpoint.as_deref(), account.as_deref())
    }

    /// Picks an explicit endpoint over an account name
    pub fn resolve(endpoint: Option<&str>, account: Option<&str>) -> Result<Self> {
        match (endpoint, account) {
            (Some(endpoint), _) if !endpoint.is_empty() => Ok(Self::with_endpoint(endpoint)),
            (_, Some(account)) if !account.is_empty() => Ok(Self::for_account(account)),
            _ => Err(BlobServiceError::MissingEndpoint()),
        }
    }

    pub fn for_account(account: &str) -> Self {
        Self::with_endpoint(&format!("https://{}.blob.core.windows.net", account))
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: Self::get_api_version(),
        }
    }

    /// The local Azurite emulator
    pub fn emulator() -> Self {
        Self::with_endpoint(EMULATOR_ENDPOINT)
    }

    fn get_api_version() -> String {
        env::var(API_VERSION_ENV).unwrap_or_else(|_| BLOB_API_VERSION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_wins_over_account() {
        let config =
            ClientConfig::resolve(Some("http://localhost:10000/dev/"), Some("myaccount")).unwrap();
        assert_eq!(config.endpoint, "http://localhost:10000/dev");
    }

    #[test]
    fn account_builds_public_endpoint() {
        let config = ClientConfig::resolve(None, Some("myaccount")).unwrap();
        assert_eq!(config.endpoint, "https://myaccount.blob.core.windows.net");
    }

    #[test]
    fn empty_values_are_missing() {
        let err = ClientConfig::resolve(Some(""), Some("")).unwrap_err();
        assert!(matches!(err, BlobServiceError::MissingEndpoint()));
    }
}
