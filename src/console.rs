//! The interactive quickstart loop
//!
//! Reads one command per line and runs it against a [`BlobStorageApi`].
//! Listing goes through [`list_all`]; every other command is a single call.
use std::{
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
    str::FromStr,
};

use futures::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::{
    client::{BlobStorageApi, DeleteBlobOptions, PutBlobOptions},
    error::{BlobServiceError, Result},
    listing::list_all,
};

pub const SAMPLE_CONTENTS: &str = "Hello Azure!";
pub const MENU: &str = "(U)pload Blob | (L)ist Blobs | (G)et Blob | (D)elete Blob | (E)xit";

/// A single console command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Upload,
    List,
    Get,
    Delete,
    Exit,
}

impl FromStr for Command {
    type Err = BlobServiceError;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            // older samples used P for PutBlob
            "U" | "P" => Ok(Command::Upload),
            "L" => Ok(Command::List),
            "G" => Ok(Command::Get),
            "D" => Ok(Command::Delete),
            "E" => Ok(Command::Exit),
            other => Err(BlobServiceError::InvalidInput(format!(
                "unknown command {:?}",
                other
            ))),
        }
    }
}

/// Whether the loop keeps reading commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub container: String,
    pub blob: String,
    /// Local file uploaded by the upload command
    pub sample_file: PathBuf,
    /// Where the get command writes the blob
    pub download_path: PathBuf,
    pub page_size_hint: Option<NonZeroU32>,
}

/// Writes [`SAMPLE_CONTENTS`] to a new temporary file
///
/// The file is removed when the returned handle is dropped.
pub fn create_sample_file() -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("sampleFile")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(SAMPLE_CONTENTS.as_bytes())?;
    file.flush()?;
    Ok(file)
}

pub struct Session<'a, C> {
    client: &'a C,
    settings: SessionSettings,
}

impl<'a, C: BlobStorageApi> Session<'a, C> {
    pub fn new(client: &'a C, settings: SessionSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Creates the container, treating "already exists" as success
    pub async fn ensure_container<W: Write>(&self, out: &mut W) -> Result<()> {
        let container = &self.settings.container;
        match self.client.create_container(container).await {
            Ok(()) => writeln!(out, "Created {} container", container)?,
            Err(err) if err.is_already_exists() => {
                writeln!(out, "{} container already exists", container)?
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Reads commands until `E` or end of input
    ///
    /// Unknown commands are ignored.  End of input leaves the container in
    /// place.
    pub async fn run<R, W>(&self, mut input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "Enter a command")?;
        writeln!(out, "{}", MENU)?;

        let mut line = Vec::new();
        loop {
            writeln!(out, "# Enter a command : ")?;
            line.clear();
            if input.read_until(b'\n', &mut line).await? == 0 {
                info!("input closed, leaving the container in place");
                return Ok(());
            }
            // Stray non-UTF-8 bytes just make the line an unknown command
            let Ok(command) = String::from_utf8_lossy(&line).parse::<Command>() else {
                continue;
            };
            if self.dispatch(command, out).await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Runs one command
    ///
    /// A failing command is reported to `out` and does not end the session.
    pub async fn dispatch<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        let outcome = match command {
            Command::Upload => self.upload(out).await,
            Command::List => self.list(out).await,
            Command::Get => self.get(out).await,
            Command::Delete => self.delete(out).await,
            Command::Exit => return self.exit(out).await.map(|_| Flow::Exit),
        };

        match outcome {
            Ok(()) => Ok(Flow::Continue),
            Err(err) => {
                warn!(?command, error = %err, "command failed");
                writeln!(
                    out,
                    ">> An error encountered during {:?}: {} error: {}",
                    command,
                    err.kind(),
                    err
                )?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn upload<W: Write>(&self, out: &mut W) -> Result<()> {
        let settings = &self.settings;
        writeln!(
            out,
            "Uploading the sample file into the container: {}",
            settings.container
        )?;
        let contents = tokio::fs::read(&settings.sample_file).await?;
        let result = self
            .client
            .put(
                &settings.container,
                &settings.blob,
                contents,
                PutBlobOptions {
                    content_type: Some("text/plain".to_string()),
                    ..Default::default()
                },
            )
            .await?;
        info!(url = %result.url, "uploaded blob");
        writeln!(out, ">> Uploaded {}", result.url)?;
        Ok(())
    }

    async fn list<W: Write>(&self, out: &mut W) -> Result<()> {
        let settings = &self.settings;
        writeln!(out, "Listing blobs in the container: {}", settings.container)?;

        let mut items = list_all(self.client, &settings.container, settings.page_size_hint);
        let mut listed = 0usize;
        while let Some(item) = items.next().await {
            match item {
                Ok(item) => {
                    listed += 1;
                    match &item.snapshot {
                        Some(snapshot) => writeln!(
                            out,
                            "Blob name: {}, Snapshot: {}",
                            item.name, snapshot
                        )?,
                        None => writeln!(out, "Blob name: {}", item.name)?,
                    }
                }
                Err(err) => {
                    writeln!(out, "Listing is incomplete, stopped after {} blob(s)", listed)?;
                    return Err(err);
                }
            }
        }

        if listed == 0 {
            writeln!(out, "There are no blobs to list off.")?;
        }
        Ok(())
    }

    async fn get<W: Write>(&self, out: &mut W) -> Result<()> {
        let settings = &self.settings;
        writeln!(out, "Get the blob: {}/{}", settings.container, settings.blob)?;
        let contents = self
            .client
            .download(&settings.container, &settings.blob, Default::default())
            .await?;
        tokio::fs::write(&settings.download_path, &contents).await?;
        writeln!(
            out,
            "The blob was downloaded to {}",
            settings.download_path.display()
        )?;
        Ok(())
    }

    async fn delete<W: Write>(&self, out: &mut W) -> Result<()> {
        let settings = &self.settings;
        writeln!(out, "Delete the blob: {}/{}", settings.container, settings.blob)?;
        self.client
            .del(
                &settings.container,
                &settings.blob,
                DeleteBlobOptions {
                    include_snapshots: true,
                },
            )
            .await?;
        writeln!(out, ">> Blob deleted: {}/{}", settings.container, settings.blob)?;
        Ok(())
    }

    async fn exit<W: Write>(&self, out: &mut W) -> Result<()> {
        let settings = &self.settings;
        writeln!(out, "Cleaning up the sample and exiting!")?;
        if let Err(err) = self.client.delete_container(&settings.container).await {
            warn!(error = %err, "could not delete container");
            writeln!(
                out,
                ">> An error encountered during cleanup: {} error: {}",
                err.kind(),
                err
            )?;
        }
        remove_if_present(&settings.download_path).await
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
