use std::{num::NonZeroU32, path::PathBuf};

use anyhow::Context;
use blob_quickstart::{
    client::BlobServiceClient,
    config::ClientConfig,
    console::{create_sample_file, Session, SessionSettings},
};
use clap::Parser;
use tokio::io::BufReader;

#[derive(Parser)]
#[command(name = "blob-quickstart")]
#[command(about = "Upload, list, download and delete blobs from the console")]
#[command(version)]
struct Cli {
    /// Storage account name, used to build the public blob endpoint
    #[arg(long, env = "AZURE_STORAGE_ACCOUNT")]
    account: Option<String>,

    /// Blob service endpoint, overrides --account
    #[arg(long, env = "AZURE_STORAGE_BLOB_ENDPOINT")]
    endpoint: Option<String>,

    /// Talk to a local Azurite emulator, ignoring --account and --endpoint
    #[arg(long)]
    emulator: bool,

    /// Container to create and work in
    #[arg(long, default_value = "quickstart")]
    container: String,

    /// Name of the blob the sample file is uploaded as
    #[arg(long, default_value = "SampleBlob.txt")]
    blob: String,

    /// Maximum number of blobs per list call
    #[arg(long)]
    page_size: Option<NonZeroU32>,

    /// Where downloaded blobs are written (default: a file in the temp dir)
    #[arg(long)]
    download_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blob_quickstart=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if cli.emulator {
        ClientConfig::emulator()
    } else {
        ClientConfig::resolve(cli.endpoint.as_deref(), cli.account.as_deref())?
    };
    let client = BlobServiceClient::new(config);

    let sample_file = create_sample_file().context("creating the sample file")?;
    println!(">> Creating a sample file at: {}", sample_file.path().display());

    let settings = SessionSettings {
        container: cli.container,
        blob: cli.blob,
        sample_file: sample_file.path().to_path_buf(),
        download_path: cli
            .download_path
            .unwrap_or_else(|| std::env::temp_dir().join("downloadedFile.txt")),
        page_size_hint: cli.page_size,
    };
    let session = Session::new(&client, settings);

    let mut stdout = std::io::stdout();
    session
        .ensure_container(&mut stdout)
        .await
        .context("creating the container")?;
    session
        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await?;

    Ok(())
}
