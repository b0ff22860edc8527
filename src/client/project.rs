//! Project credentials

/// The project queries run against, with its read key
#[derive(Clone, PartialEq, Eq)]
pub struct KeenProject {
    pub project_id: String,
    pub read_key: String,
}

impl KeenProject {
    pub fn new(project_id: impl Into<String>, read_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            read_key: read_key.into(),
        }
    }
}

impl std::fmt::Debug for KeenProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeenProject")
            .field("project_id", &self.project_id)
            .field("read_key", &"<redacted>")
            .finish()
    }
}
