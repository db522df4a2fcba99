//! Builder pattern for opening documents.
//!
//! Provides a fluent API for choosing the source and passwords.
//!
//! # Example
//! ```ignore
//! use quire_core::api::DocumentBuilder;
//!
//! let doc = DocumentBuilder::from_path("protected.pdf")
//!     .owner_password("secret")
//!     .require_password(true)
//!     .open()?;
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;

use crate::document::PDFDocument;
use crate::error::Result;

/// Passwords and policy used when a document is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Tried first against `/O`.
    pub owner_password: Option<String>,
    /// Tried against `/U`; the empty password when unset.
    pub user_password: Option<String>,
    /// Fail to open when no password candidate matches.
    pub require_password: bool,
}

impl OpenOptions {
    pub(crate) fn owner_candidate(&self) -> Option<&[u8]> {
        self.owner_password.as_deref().map(str::as_bytes)
    }

    pub(crate) fn user_candidate(&self) -> Option<&[u8]> {
        self.user_password.as_deref().map(str::as_bytes)
    }
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Bytes),
}

/// A builder for opening a [`PDFDocument`].
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    source: Source,
    options: OpenOptions,
}

impl DocumentBuilder {
    /// Open the file at `path`; it is memory-mapped on [`open`](Self::open).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::Path(path.as_ref().to_path_buf()),
            options: OpenOptions::default(),
        }
    }

    /// Open an in-memory buffer without copying it.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Bytes(data.into()),
            options: OpenOptions::default(),
        }
    }

    /// Use `password` as both the owner and the user candidate.
    pub fn password(mut self, password: &str) -> Self {
        self.options.owner_password = Some(password.to_string());
        self.options.user_password = Some(password.to_string());
        self
    }

    pub fn owner_password(mut self, password: &str) -> Self {
        self.options.owner_password = Some(password.to_string());
        self
    }

    pub fn user_password(mut self, password: &str) -> Self {
        self.options.user_password = Some(password.to_string());
        self
    }

    /// Turn a failed key derivation into an `InvalidPassword` error.
    ///
    /// By default the document still opens and reports the failure through
    /// [`PDFDocument::encryption_failure`].
    pub const fn require_password(mut self, require: bool) -> Self {
        self.options.require_password = require;
        self
    }

    pub const fn options(&self) -> &OpenOptions {
        &self.options
    }

    pub fn open(self) -> Result<PDFDocument> {
        match self.source {
            Source::Bytes(data) => PDFDocument::from_bytes(data, &self.options),
            Source::Path(path) => {
                let file = File::open(&path)?;
                // SAFETY: the mapping is read-only and owned by the document's buffer.
                let mmap = unsafe { Mmap::map(&file) }?;
                tracing::debug!(path = %path.display(), len = mmap.len(), "mapped document");
                PDFDocument::from_mmap(mmap, &self.options)
            }
        }
    }
}
