use std::fmt;

/// Publication status of a story, derived from its metadata tokens.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Status {
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "abandoned")]
    Abandoned,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Complete => "Complete",
            Status::InProgress => "In Progress",
            Status::Abandoned => "Abandoned",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an update failed.
///
/// Callers discriminate by variant; the rendered message is an
/// implementation detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    /// The caller asked for nothing. Raised before any I/O.
    #[error("No chapters to update")]
    NoChapters,
    /// The caller asked for a chapter index below one. Raised before any I/O.
    #[error("{0} is not a valid chapter")]
    InvalidChapter(usize),
    /// One resource failed to load or to yield its required fields.
    ///
    /// Tolerated in best-effort phases, fatal everywhere else.
    #[error("Failed to update the chapter from '{url}'")]
    Chapter { url: String },
    /// The story-level metadata refresh failed. Always fatal.
    #[error("Failed to update informations")]
    Metadata,
}

impl UpdateError {
    /// `true` when the failure is caller misuse, raised before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, UpdateError::NoChapters | UpdateError::InvalidChapter(_))
    }

    /// The offending location, when the failure carries one.
    pub fn url(&self) -> Option<&str> {
        match self {
            UpdateError::Chapter { url } => Some(url),
            _ => None,
        }
    }
}

/// Result of an update on a story or chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Unchanged,
    Success,
    Failure(UpdateError),
}
