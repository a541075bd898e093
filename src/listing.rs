//! Walking a segmented listing until the continuation marker runs out
//!
//! A list call against a container returns one [`Page`] of items and, when
//! more exist, a [`ContinuationToken`] to pass to the next call.
//! [`PaginatedListing`] drives those calls one after another and exposes the
//! result either page by page or as a flat stream of [`Item`]s:
//!
//! ```ignore
//! let mut blobs = list_all(&client, "quickstart", NonZeroU32::new(10));
//! while let Some(blob) = blobs.try_next().await? {
//!     println!("{}", blob.name);
//! }
//! ```
//!
//! The walk is lazy. Nothing is requested until the stream is polled, the
//! request for page N+1 is only built once page N has been inspected, and
//! dropping the stream between pages stops the walk.
use std::{fmt, num::NonZeroU32};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{BlobServiceError, Result};

/// Opaque cursor returned by a list call when more results exist
///
/// Never empty: an empty marker from the service means the listing is over.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(marker: impl Into<String>) -> Option<Self> {
        let marker = marker.into();
        if marker.is_empty() {
            None
        } else {
            Some(Self(marker))
        }
    }

    pub fn from_marker(marker: Option<String>) -> Option<Self> {
        marker.and_then(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One listed blob
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Item {
    /// The name of the blob within its container
    pub name: String,
    /// Set when the entry is a snapshot rather than the base blob
    pub snapshot: Option<String>,
    /// Set when versions were requested and the account keeps them
    pub version_id: Option<String>,
    /// The size of the blob in bytes
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The result of a single list call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Items in the order the service returned them, possibly none
    pub items: Vec<Item>,
    /// Present when another call is needed to continue the listing
    pub next_token: Option<ContinuationToken>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Arguments of a single list call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// The container to list
    pub collection: String,
    /// Token from the previous page, absent for the first call
    pub token: Option<ContinuationToken>,
    /// How many items per page the service should aim for
    pub page_size_hint: Option<NonZeroU32>,
    /// Only list blobs whose name starts with this prefix
    pub prefix: Option<String>,
    /// Also list snapshots of each blob
    pub include_snapshots: bool,
    /// Also list previous versions of each blob
    pub include_versions: bool,
}

impl ListRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }
}

/// Anything that can answer a single list call
#[async_trait]
pub trait ListPages: Send + Sync {
    /// Fetches one page of a listing
    ///
    /// Fails with [`BlobServiceError::ContainerNotFound`] when the collection
    /// does not exist.
    async fn list_page(&self, request: &ListRequest) -> Result<Page>;
}

/// Where a [`PaginatedListing`] is in its walk
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingState {
    /// The next call will be made with this token
    Fetching(Option<ContinuationToken>),
    /// The last page has been returned
    Done,
    /// A call failed; the listing is incomplete
    Failed,
}

impl ListingState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ListingState::Fetching(_))
    }
}

/// A walk over every page of one container listing
pub struct PaginatedListing<'a, L: ?Sized> {
    source: &'a L,
    request: ListRequest,
    state: ListingState,
    pages_fetched: usize,
}

impl<'a, L: ListPages + ?Sized + 'a> PaginatedListing<'a, L> {
    pub fn new(source: &'a L, collection: impl Into<String>) -> Self {
        Self {
            source,
            request: ListRequest::new(collection),
            state: ListingState::Fetching(None),
            pages_fetched: 0,
        }
    }

    pub fn with_page_size_hint(mut self, page_size_hint: Option<NonZeroU32>) -> Self {
        self.request.page_size_hint = page_size_hint;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request.prefix = Some(prefix.into());
        self
    }

    pub fn with_snapshots(mut self, include_snapshots: bool) -> Self {
        self.request.include_snapshots = include_snapshots;
        self
    }

    pub fn with_versions(mut self, include_versions: bool) -> Self {
        self.request.include_versions = include_versions;
        self
    }

    pub fn state(&self) -> &ListingState {
        &self.state
    }

    /// Number of list calls that have succeeded so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetches the next page
    ///
    /// Returns `None` once the listing is done or has failed.  An error is
    /// returned exactly once, after which the listing stays failed.
    pub async fn next_page(&mut self) -> Option<Result<Page>> {
        let token = match &self.state {
            ListingState::Fetching(token) => token.clone(),
            ListingState::Done | ListingState::Failed => return None,
        };
        let request = ListRequest {
            token,
            ..self.request.clone()
        };

        debug!(
            collection = %request.collection,
            marker = request.token.as_ref().map(ContinuationToken::as_str),
            page = self.pages_fetched + 1,
            "fetching list page"
        );

        match self.source.list_page(&request).await {
            Ok(page) => {
                self.pages_fetched += 1;
                self.state = match &page.next_token {
                    Some(token) => ListingState::Fetching(Some(token.clone())),
                    None => ListingState::Done,
                };
                Some(Ok(page))
            }
            Err(err) => {
                debug!(collection = %request.collection, error = %err, "list page failed");
                self.state = ListingState::Failed;
                Some(Err(err))
            }
        }
    }

    /// Every page of the listing, including empty ones
    pub fn into_pages(self) -> BoxStream<'a, Result<Page>> {
        stream::unfold(self, |mut listing| async move {
            let page = listing.next_page().await?;
            Some((page, listing))
        })
        .boxed()
    }

    /// Every item of the listing, in service order
    pub fn into_items(self) -> BoxStream<'a, Result<Item>> {
        self.into_pages()
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<Item, BlobServiceError>)))
            .try_flatten()
            .boxed()
    }
}

/// Lists every item in `collection`, following continuation tokens
pub fn list_all<'a, L>(
    source: &'a L,
    collection: &str,
    page_size_hint: Option<NonZeroU32>,
) -> BoxStream<'a, Result<Item>>
where
    L: ListPages + ?Sized + 'a,
{
    PaginatedListing::new(source, collection)
        .with_page_size_hint(page_size_hint)
        .into_items()
}
