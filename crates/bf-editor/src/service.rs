//! Persistence service boundary.
//!
//! The designer never performs I/O itself. It hands [`ServiceRequest`]s to
//! the host and receives the results back through `complete_load` and
//! `complete_save`. [`ProjectService`] is the synchronous shape of the same
//! contract, used by the drive-to-completion helpers and by tests.

use crate::error::DesignerError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub type ProjectId = u64;
pub type Revision = u64;

/// Lowercase hex SHA-256 of `content`.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// File content as delivered by the service, with the checksum computed on
/// the storage side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumedLoadFile {
    pub content: String,
    pub checksum: String,
}

impl ChecksumedLoadFile {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let checksum = checksum(&content);
        Self { content, checksum }
    }

    /// The content, if it matches its checksum.
    pub fn verified(self, file_id: &str) -> Result<String, DesignerError> {
        let actual = checksum(&self.content);
        if !actual.eq_ignore_ascii_case(&self.checksum) {
            return Err(DesignerError::ChecksumedFile {
                file_id: file_id.to_string(),
                expected: self.checksum,
                actual,
            });
        }
        Ok(self.content)
    }
}

/// Work the designer asks the host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRequest {
    Load {
        project_id: ProjectId,
        file_id: String,
    },
    Save {
        /// Echoed back through `complete_save` so a late result for an
        /// abandoned save cannot complete a newer one.
        request_id: u64,
        session_id: String,
        project_id: ProjectId,
        file_id: String,
        content: String,
    },
}

pub trait ProjectService {
    fn load(&mut self, project_id: ProjectId, file_id: &str) -> Result<ChecksumedLoadFile, String>;

    fn save(
        &mut self,
        session_id: &str,
        project_id: ProjectId,
        file_id: &str,
        content: &str,
    ) -> Result<Revision, String>;
}

/// A service backed by a map, for tests and offline hosts.
#[derive(Debug, Default)]
pub struct MemoryProjectService {
    files: HashMap<(ProjectId, String), String>,
    revision: Revision,
    /// Fail this many upcoming saves.
    pub failing_saves: usize,
    /// Deliver loads with a checksum that does not match.
    pub corrupt_loads: bool,
    pub saves: usize,
}

impl MemoryProjectService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, project_id: ProjectId, file_id: &str, content: &str) {
        self.files
            .insert((project_id, file_id.to_string()), content.to_string());
    }

    pub fn file(&self, project_id: ProjectId, file_id: &str) -> Option<&str> {
        self.files
            .get(&(project_id, file_id.to_string()))
            .map(String::as_str)
    }
}

impl ProjectService for MemoryProjectService {
    fn load(&mut self, project_id: ProjectId, file_id: &str) -> Result<ChecksumedLoadFile, String> {
        let content = self
            .file(project_id, file_id)
            .ok_or_else(|| format!("no such file: {file_id}"))?;
        let mut file = ChecksumedLoadFile::new(content);
        if self.corrupt_loads {
            file.checksum = checksum("");
        }
        Ok(file)
    }

    fn save(
        &mut self,
        _session_id: &str,
        project_id: ProjectId,
        file_id: &str,
        content: &str,
    ) -> Result<Revision, String> {
        if self.failing_saves > 0 {
            self.failing_saves -= 1;
            return Err("storage unavailable".into());
        }
        self.insert(project_id, file_id, content);
        self.saves += 1;
        self.revision += 1;
        Ok(self.revision)
    }
}
