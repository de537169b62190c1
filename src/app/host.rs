//! An abstraction layer over the host application's document model.
//!
//! The chooser never touches documents itself; once a pick has passed every
//! policy stage it asks the host to save or open through this trait.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Opaque reference to a document open in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentHandle(pub u64);

/// A host operation failed. The host presents its own diagnostics.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Host operation '{operation}' failed: {message}")]
pub struct HostError {
    pub operation: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Operations the chooser may trigger on the host. Each is assumed atomic
/// and is never retried.
pub trait HostBridge {
    /// Path of the active document, if it has been saved before.
    fn current_document_path(&self) -> Option<PathBuf>;

    fn save_document(&mut self, path: &Path) -> Result<(), HostError>;

    fn open_document(&mut self, path: &Path) -> Result<(), HostError>;

    /// Makes the document at `path` the active one and returns its handle.
    fn ensure_active_document(&mut self, path: &Path) -> Result<DocumentHandle, HostError>;

    /// Opens an empty tab for the next document.
    fn open_new_document_container(&mut self) -> Result<(), HostError>;

    fn set_all_effects_offline(&mut self, document: DocumentHandle) -> Result<(), HostError>;
}

/// One recorded bridge call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    SaveDocument { path: PathBuf },
    OpenDocument { path: PathBuf },
    EnsureActiveDocument { path: PathBuf },
    OpenNewDocumentContainer,
    SetAllEffectsOffline { document: DocumentHandle },
}

/// A host that performs nothing and records every call, used by the
/// command-line driver to report what a real host would have been asked to do.
#[derive(Debug, Default)]
pub struct JournalHost {
    pub document_path: Option<PathBuf>,
    pub calls: Vec<HostCall>,
    next_handle: u64,
}

impl JournalHost {
    pub fn new(document_path: Option<PathBuf>) -> Self {
        Self {
            document_path,
            ..Default::default()
        }
    }
}

impl HostBridge for JournalHost {
    fn current_document_path(&self) -> Option<PathBuf> {
        self.document_path.clone()
    }

    fn save_document(&mut self, path: &Path) -> Result<(), HostError> {
        tracing::info!("Host: save document to {:?}", path);
        self.calls.push(HostCall::SaveDocument {
            path: path.to_path_buf(),
        });
        self.document_path = Some(path.to_path_buf());
        Ok(())
    }

    fn open_document(&mut self, path: &Path) -> Result<(), HostError> {
        tracing::info!("Host: open document {:?}", path);
        self.calls.push(HostCall::OpenDocument {
            path: path.to_path_buf(),
        });
        self.document_path = Some(path.to_path_buf());
        Ok(())
    }

    fn ensure_active_document(&mut self, path: &Path) -> Result<DocumentHandle, HostError> {
        self.calls.push(HostCall::EnsureActiveDocument {
            path: path.to_path_buf(),
        });
        self.next_handle += 1;
        Ok(DocumentHandle(self.next_handle))
    }

    fn open_new_document_container(&mut self) -> Result<(), HostError> {
        tracing::info!("Host: open new project tab");
        self.calls.push(HostCall::OpenNewDocumentContainer);
        Ok(())
    }

    fn set_all_effects_offline(&mut self, document: DocumentHandle) -> Result<(), HostError> {
        tracing::info!("Host: set all effects offline in {:?}", document);
        self.calls.push(HostCall::SetAllEffectsOffline { document });
        Ok(())
    }
}
