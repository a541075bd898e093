//! A small client for [Azure Blob Storage](https://learn.microsoft.com/azure/storage/blobs/)
//! and the console quickstart built on it.
//!
//! The interesting part is [`listing`]: a container listing comes back one
//! segment at a time, and [`PaginatedListing`] follows the continuation
//! markers until the service reports no more.
//!
//! [`PaginatedListing`]: crate::listing::PaginatedListing
//!
//! To use the client, point it at an account and give it a SAS token:
//!
//! ```ignore
//! // AZURE_STORAGE_ACCOUNT=myaccount
//! // AZURE_STORAGE_SAS_TOKEN="sv=2021-08-06&ss=b&srt=sco&sp=rwdlac&sig=..."
//! let client = BlobServiceClient::from_env()?;
//!
//! client.create_container("quickstart").await?;
//! client
//!     .put("quickstart", "SampleBlob.txt", "Hello Azure!", Default::default())
//!     .await?;
//!
//! let mut blobs = list_all(&client, "quickstart", NonZeroU32::new(10));
//! while let Some(blob) = blobs.try_next().await? {
//!     println!("{}", blob.name);
//! }
//! ```
//!
//! Tokens can also come from somewhere other than the environment by
//! implementing [`TokenProvider`], for example to fetch short-lived user
//! delegation SAS tokens from your own service:
//!
//! [`TokenProvider`]: crate::auth::TokenProvider
//!
//! ```ignore
//! #[derive(Debug)]
//! struct MyAppTokenProvider {
//!     request_url: String,
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl TokenProvider for MyAppTokenProvider {
//!     async fn get_token(
//!         &self,
//!         operation: &str,
//!         pathname: Option<&str>,
//!     ) -> Result<String, BlobServiceError> {
//!         let request = self
//!             .client
//!             .get(&self.request_url)
//!             .query(&[("operation", operation), ("path", pathname.unwrap_or(""))]);
//!         Ok(request.send().await?.text().await?)
//!     }
//! }
//!
//! let provider = Arc::new(MyAppTokenProvider {
//!     request_url: "http://localhost:3000/api/sas".to_string(),
//!     client: reqwest::Client::new(),
//! });
//! let client = BlobServiceClient::new_external(ClientConfig::for_account("myaccount"), provider);
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod listing;
