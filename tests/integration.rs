use std::collections::HashSet;
use std::env;
use std::num::NonZeroU32;
use std::sync::Arc;

use all_asserts::assert_true;
use async_trait::async_trait;
use futures::stream::TryStreamExt;

use blob_quickstart::auth::EnvTokenProvider;
use blob_quickstart::auth::TokenProvider;
use blob_quickstart::client::BlobServiceClient;
use blob_quickstart::client::BlobStorageApi;
use blob_quickstart::client::DownloadOptions;
use blob_quickstart::client::PutBlobOptions;
use blob_quickstart::config::ClientConfig;
use blob_quickstart::error::BlobServiceError;
use blob_quickstart::listing::{list_all, ListingState, PaginatedListing};
use once_cell::sync::Lazy;
use serial_test::serial;

/// These integration tests run against a real storage account (or Azurite).  As a result they
/// are ignored by default.  To run them, set AZURE_STORAGE_TEST_ENDPOINT to the blob endpoint
/// and AZURE_STORAGE_TEST_SAS_TOKEN to an account SAS with read/write/delete/list/create
/// permissions.
///
/// Note that these tests create and delete the container `blob-quickstart-unittest`.

const CONTAINER: &str = "blob-quickstart-unittest";

static PROVIDER: Lazy<Arc<dyn TokenProvider>> =
    Lazy::new(|| Arc::new(EnvTokenProvider::try_new("AZURE_STORAGE_TEST_SAS_TOKEN").unwrap()));

fn test_client() -> BlobServiceClient {
    let endpoint = env::var("AZURE_STORAGE_TEST_ENDPOINT").unwrap();
    BlobServiceClient::new_external(ClientConfig::with_endpoint(&endpoint), PROVIDER.clone())
}

async fn fresh_container(client: &BlobServiceClient) {
    match client.create_container(CONTAINER).await {
        Ok(()) => {}
        Err(err) if err.is_already_exists() => delete_all_blobs(client).await,
        Err(err) => panic!("could not create test container: {err}"),
    }
}

async fn delete_all_blobs(client: &BlobServiceClient) {
    let names: Vec<String> = list_all(client, CONTAINER, None)
        .map_ok(|item| item.name)
        .try_collect()
        .await
        .unwrap();
    for name in names {
        client
            .del(CONTAINER, &name, Default::default())
            .await
            .unwrap();
    }
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_put_list_delete() {
    let client = test_client();
    fresh_container(&client).await;

    client
        .put(
            CONTAINER,
            "a.txt",
            "some content",
            PutBlobOptions {
                content_type: Some("text/plain".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let names: Vec<String> = list_all(&client, CONTAINER, None)
        .map_ok(|item| item.name)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(names, vec!["a.txt"]);

    delete_all_blobs(&client).await;

    let head = client.head(CONTAINER, "a.txt").await.unwrap();
    assert_true!(head.is_none());
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_paging() {
    let client = test_client();
    fresh_container(&client).await;

    for idx in 0..10 {
        client
            .put(
                CONTAINER,
                &format!("a{}.txt", idx),
                "some content",
                Default::default(),
            )
            .await
            .unwrap();
    }

    let mut listing = PaginatedListing::new(&client, CONTAINER)
        .with_page_size_hint(NonZeroU32::new(3));
    let mut all_names = Vec::new();
    while let Some(page) = listing.next_page().await {
        all_names.extend(page.unwrap().items.into_iter().map(|item| item.name));
    }

    assert_eq!(listing.state(), &ListingState::Done);
    assert_eq!(listing.pages_fetched(), 4);
    assert_eq!(all_names.len(), 10);
    assert_eq!(all_names.iter().collect::<HashSet<_>>().len(), 10);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_partial_download() {
    let client = test_client();
    fresh_container(&client).await;

    client
        .put(CONTAINER, "digits.txt", "0123456789", Default::default())
        .await
        .unwrap();

    let ranged = |range| DownloadOptions {
        byte_range: Some(range),
    };

    let all = client
        .download(CONTAINER, "digits.txt", Default::default())
        .await
        .unwrap();
    assert_eq!(all, "0123456789".as_bytes());

    let part = client
        .download(CONTAINER, "digits.txt", ranged(2..7))
        .await
        .unwrap();
    assert_eq!(part, "23456".as_bytes());

    let empty = client
        .download(CONTAINER, "digits.txt", ranged(5..5))
        .await
        .unwrap();
    assert_true!(empty.is_empty());

    // It's ok to request past the end of the blob
    let tail = client
        .download(CONTAINER, "digits.txt", ranged(5..500))
        .await
        .unwrap();
    assert_eq!(tail, "56789".as_bytes());

    // If the start of the request is past the end of the blob it's an error
    let past_end = client
        .download(CONTAINER, "digits.txt", ranged(100..500))
        .await;
    assert_true!(past_end.is_err());
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_missing_container() {
    let client = test_client();
    let err = list_all(&client, "blob-quickstart-does-not-exist", None)
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    match err {
        BlobServiceError::ContainerNotFound(_) => {}
        _ => panic!("Expected ContainerNotFound when listing a missing container"),
    }
}

#[derive(Debug)]
struct HardCodedTokenProvider {
    token: String,
}

#[async_trait]
impl TokenProvider for HardCodedTokenProvider {
    async fn get_token(
        &self,
        _operation: &str,
        _pathname: Option<&str>,
    ) -> std::result::Result<String, BlobServiceError> {
        Ok(self.token.clone())
    }
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_invalid_token() {
    let endpoint = env::var("AZURE_STORAGE_TEST_ENDPOINT").unwrap();
    let bad_provider = Arc::new(HardCodedTokenProvider {
        token: "sv=2021-08-06&sig=bogus".to_string(),
    });
    let client = BlobServiceClient::new_external(ClientConfig::with_endpoint(&endpoint), bad_provider);
    let err = client.create_container(CONTAINER).await.unwrap_err();
    match err {
        BlobServiceError::ServiceError { status, .. } => assert_eq!(status, 403),
        _ => panic!("Expected a 403 service error when passed a bad token"),
    }
}
