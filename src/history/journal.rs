use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use crate::error::{Error, Result};
use crate::index::tick::IndexTick;

/// JSON-lines file of committed ticks, one `IndexTick` per line.
///
/// ## Write path
/// - `append` adds a single line after each committed tick
/// - `rewrite` replaces the whole file after compaction (temp file, then rename)
///
/// ## Recovery
/// - Missing file: empty history, cold start
/// - Truncated last line (crash mid-write): dropped with a warning and the
///   file rewritten without it, so later appends start on a fresh line
/// - Corrupt line anywhere else: `DeserializationError`
pub struct TickJournal {
    path: PathBuf,
}

impl TickJournal {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent).await?;
        }
        Ok(TickJournal { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, tick: &IndexTick) -> Result<()> {
        let line = encode_line(tick)?;

        let mut file = async_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    pub async fn load(&self) -> Result<Vec<IndexTick>> {
        let contents = match async_fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No tick journal at {:?}, starting cold", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::IoError(e)),
        };

        let lines: Vec<(usize, &str)> = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();

        let mut ticks = Vec::with_capacity(lines.len());
        let mut needs_repair = !contents.is_empty() && !contents.ends_with('\n');
        for (position, (line_no, line)) in lines.iter().enumerate() {
            match serde_json::from_str::<IndexTick>(line) {
                Ok(tick) => ticks.push(tick),
                Err(e) if position + 1 == lines.len() => {
                    needs_repair = true;
                    tracing::warn!(
                        "Dropping truncated journal line {} in {:?}: {}",
                        line_no + 1,
                        self.path,
                        e
                    );
                }
                Err(e) => {
                    return Err(Error::DeserializationError(format!(
                        "{:?} line {}: {}",
                        self.path,
                        line_no + 1,
                        e
                    )));
                }
            }
        }

        if needs_repair {
            self.rewrite(&ticks).await?;
            tracing::warn!("Repaired tick journal {:?} after partial write", self.path);
        }

        tracing::info!("Loaded {} ticks from {:?}", ticks.len(), self.path);
        Ok(ticks)
    }

    /// Replace the journal contents with `ticks`.
    pub async fn rewrite<'a, I>(&self, ticks: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a IndexTick>,
    {
        let mut data = String::new();
        for tick in ticks {
            data.push_str(&encode_line(tick)?);
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        async_fs::write(&tmp, data).await?;
        async_fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Rewrote tick journal {:?}", self.path);
        Ok(())
    }
}

fn encode_line(tick: &IndexTick) -> Result<String> {
    let mut line = serde_json::to_string(tick)
        .map_err(|e| Error::SerializationError(e.to_string()))?;
    line.push('\n');
    Ok(line)
}
