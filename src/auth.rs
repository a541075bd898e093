//! Authentication utilities for working with the Blob service
use std::env;

use async_trait::async_trait;

use crate::error::{BlobServiceError, Result};

pub(crate) const SAS_TOKEN_ENV: &str = "AZURE_STORAGE_SAS_TOKEN";

/// A trait for providing a shared access signature (SAS) token.
///
/// The token is sent as the query string of every request, so it must grant
/// the permissions the operation needs (e.g. `l` for list, `w` for put).
///
/// The operation (e.g. list, put, download) and pathname (`container` or
/// `container/blob`) are provided in case a provider hands out narrowly
/// scoped tokens.
#[async_trait]
pub trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn get_token(&self, operation: &str, pathname: Option<&str>) -> Result<String>;
}

pub(crate) async fn get_token(
    provider: Option<&dyn TokenProvider>,
    operation: &str,
    pathname: Option<&str>,
) -> Result<String> {
    let token = if let Some(provider) = provider {
        provider.get_token(operation, pathname).await?
    } else {
        env::var(SAS_TOKEN_ENV).map_err(|_| BlobServiceError::NotAuthenticated())?
    };
    Ok(token.trim_start_matches('?').to_string())
}

/// A token provider that reads the token from an environment variable.
///
/// Handy for testing and for the console sample.
pub struct EnvTokenProvider {
    token: String,
}

// Custom implementation of Debug to avoid printing the token
impl std::fmt::Debug for EnvTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvTokenProvider")
            .field("token", &"**********")
            .finish()
    }
}

impl EnvTokenProvider {
    pub fn try_new(env_var: &str) -> Result<Self> {
        let token = env::var(env_var).map_err(|_| BlobServiceError::NotAuthenticated())?;
        Ok(Self { token })
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn get_token(&self, _operation: &str, _pathname: Option<&str>) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedProvider(&'static str);

    #[async_trait]
    impl TokenProvider for FixedProvider {
        async fn get_token(&self, _operation: &str, _pathname: Option<&str>) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn strips_leading_question_mark() {
        let provider = FixedProvider("?sv=2021-08-06&sig=abc");
        let token = get_token(Some(&provider), "list", Some("quickstart"))
            .await
            .unwrap();
        assert_eq!(token, "sv=2021-08-06&sig=abc");
    }

    #[test]
    fn debug_hides_token() {
        let provider = EnvTokenProvider {
            token: "sig=secret".to_string(),
        };
        let printed = format!("{:?}", provider);
        assert!(!printed.contains("secret"));
    }
}
