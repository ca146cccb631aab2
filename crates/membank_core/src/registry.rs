//! Project registry over one shared JSON document.
//!
//! # Responsibility
//! - Track every known project with its storage location and metadata.
//! - Enforce case-insensitive name uniqueness at creation.
//!
//! # Invariants
//! - The backing document is rewritten wholesale on every mutation
//!   (read-all, mutate in memory, write-all). Methods take `&mut self`, so
//!   the read-modify-write span is exclusive within a process; concurrent
//!   writers from other processes remain unsupported (last write wins).
//! - Successful lookups touch `last_accessed` as a fire-and-forget write:
//!   persistence failure is logged, never surfaced to the caller.

use crate::db::pool::PROJECTS_DIR;
use crate::model::epoch_ms_now;
use crate::model::project::Project;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// File name of the shared registry document under the storage root.
pub const REGISTRY_FILE: &str = "projects.json";

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from registry document access.
#[derive(Debug)]
pub enum RegistryError {
    /// Filesystem failure reading or writing the document.
    Io(std::io::Error),
    /// The document exists but cannot be parsed or encoded.
    Codec(serde_json::Error),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "invalid registry document: {err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Codec(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    projects: Vec<Project>,
}

/// Registry of all known projects, backed by [`REGISTRY_FILE`].
pub struct ProjectRegistry {
    root: PathBuf,
    path: PathBuf,
}

impl ProjectRegistry {
    /// Creates a registry rooted at the given storage directory.
    ///
    /// The document itself is created lazily on the first mutation; a
    /// missing file reads as an empty registry.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let path = root.join(REGISTRY_FILE);
        Self { root, path }
    }

    /// Lists all known projects.
    pub fn list(&self) -> RegistryResult<Vec<Project>> {
        Ok(self.read_document()?.projects)
    }

    /// Creates a project, or returns `None` when the name is already used
    /// case-insensitively.
    pub fn create(&mut self, name: &str, description: &str) -> RegistryResult<Option<Project>> {
        let mut doc = self.read_document()?;
        let wanted = name.trim().to_lowercase();
        if doc
            .projects
            .iter()
            .any(|project| project.name.trim().to_lowercase() == wanted)
        {
            return Ok(None);
        }

        let now = epoch_ms_now();
        let id = Uuid::new_v4().to_string();
        let project = Project {
            storage_location: self.root.join(PROJECTS_DIR).join(&id),
            id,
            name: name.trim().to_string(),
            description: description.to_string(),
            created_at: now,
            last_accessed: now,
        };
        doc.projects.push(project.clone());
        self.write_document(&doc)?;
        Ok(Some(project))
    }

    /// Looks a project up by id, touching `last_accessed` on success.
    pub fn get(&mut self, id: &str) -> RegistryResult<Option<Project>> {
        let doc = self.read_document()?;
        let index = doc.projects.iter().position(|project| project.id == id);
        Ok(self.touch(doc, index))
    }

    /// Looks a project up by id first, then by case-insensitive name.
    /// Touches `last_accessed` on success.
    pub fn get_by_name_or_id(&mut self, identifier: &str) -> RegistryResult<Option<Project>> {
        let doc = self.read_document()?;
        let wanted = identifier.trim().to_lowercase();
        let index = doc
            .projects
            .iter()
            .position(|project| project.id == identifier)
            .or_else(|| {
                doc.projects
                    .iter()
                    .position(|project| project.name.trim().to_lowercase() == wanted)
            });
        Ok(self.touch(doc, index))
    }

    /// Removes a project record. Returns `false` when the id is unknown.
    ///
    /// Storage-location removal and connection eviction belong to the
    /// service layer; the registry only owns the document.
    pub fn delete(&mut self, id: &str) -> RegistryResult<bool> {
        let mut doc = self.read_document()?;
        let before = doc.projects.len();
        doc.projects.retain(|project| project.id != id);
        if doc.projects.len() == before {
            return Ok(false);
        }
        self.write_document(&doc)?;
        Ok(true)
    }

    fn touch(&mut self, mut doc: RegistryDocument, index: Option<usize>) -> Option<Project> {
        let index = index?;
        doc.projects[index].last_accessed = epoch_ms_now();
        let project = doc.projects[index].clone();
        if let Err(err) = self.write_document(&doc) {
            warn!(
                "event=registry_touch module=registry status=error project={} error={}",
                project.id, err
            );
        }
        Some(project)
    }

    fn read_document(&self) -> RegistryResult<RegistryDocument> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(RegistryDocument::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write_document(&mut self, doc: &RegistryDocument) -> RegistryResult<()> {
        fs::create_dir_all(&self.root)?;
        let encoded = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, encoded)?;
        Ok(())
    }
}
