use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Host capability for persisting fetched bytes as a local file. The browser
/// build routes this to a save-as dialog; the desktop build writes to disk.
#[async_trait]
pub trait FileSaver: Send + Sync {
    async fn save(&self, filename: &str, data: &[u8]) -> anyhow::Result<PathBuf>;
}

/// Host capability for opening an external URL, used for fallback links the
/// server could not download itself.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

pub struct DiskFileSaver {
    dir: PathBuf,
}

impl DiskFileSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Saves into the user's download directory, falling back to the current
    /// directory when the platform reports none.
    pub fn downloads() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    fn part_path_for(output: &Path) -> PathBuf {
        let mut part = output.as_os_str().to_owned();
        part.push(".part");
        PathBuf::from(part)
    }
}

#[async_trait]
impl FileSaver for DiskFileSaver {
    async fn save(&self, filename: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
        let filename = sanitize_filename::sanitize(filename);
        if filename.is_empty() {
            anyhow::bail!("refusing to save under an empty filename");
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let output = self.dir.join(&filename);
        let part = Self::part_path_for(&output);

        let mut file = tokio::fs::File::create(&part).await?;
        file.write_all(data).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part, &output).await?;
        tracing::info!("[saver] wrote {} bytes to {}", data.len(), output.display());
        Ok(output)
    }
}

pub struct SystemLinkOpener;

impl LinkOpener for SystemLinkOpener {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        open::that(url)?;
        Ok(())
    }
}
