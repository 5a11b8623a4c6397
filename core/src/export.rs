//! Export of finished recordings
//!
//! The recorder hands the replay program and its file name to an
//! [`Exporter`]. Where the text ends up is the embedder's business.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Destination for finished replay programs
pub trait Exporter {
    fn export(&mut self, file_name: &str, contents: &str) -> Result<()>;
}

impl<F> Exporter for F
where
    F: FnMut(&str, &str) -> Result<()>,
{
    fn export(&mut self, file_name: &str, contents: &str) -> Result<()> {
        self(file_name, contents)
    }
}

/// Writes replay programs into a directory
#[derive(Debug, Clone)]
pub struct FileExporter {
    pub directory: PathBuf,
}

impl FileExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl Exporter for FileExporter {
    fn export(&mut self, file_name: &str, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.directory)
            .context("Failed to create recording directory")?;
        let path = self.directory.join(file_name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write recording {}", path.display()))?;

        tracing::info!(path = %path.display(), bytes = contents.len(), "Recording saved");
        Ok(())
    }
}

/// An exported replay program held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

/// Keeps exported programs in memory.
///
/// Clones share the same artifact list, so a clone kept by the embedder
/// sees what the recorder exported.
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    artifacts: Rc<RefCell<Vec<Artifact>>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.borrow().clone()
    }
}

impl Exporter for MemoryExporter {
    fn export(&mut self, file_name: &str, contents: &str) -> Result<()> {
        self.artifacts.borrow_mut().push(Artifact {
            file_name: file_name.to_string(),
            contents: contents.to_string(),
        });
        Ok(())
    }
}
