//! Error types for wbi-core
//!
//! Fatal conditions surface as [`CoreError`]. Everything a refresh can survive is
//! collected in a [`RefreshReport`] so the last good index keeps serving.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wbi operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // IO Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No cached document at {path}")]
    CacheNotFound { path: PathBuf },

    #[error("Refusing to cache an empty document at {path}")]
    EmptyDocument { path: PathBuf },

    // ===================
    // Parse Errors
    // ===================
    #[error("Malformed XML at byte {position}: {message}")]
    XmlParse { position: usize, message: String },

    #[error("Malformed input: expected <{element}> element")]
    MissingElement { element: &'static str },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl CoreError {
    /// True for errors raised by the parser on structurally invalid input
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            CoreError::XmlParse { .. } | CoreError::MissingElement { .. }
        )
    }
}

/// Severity level for issues recorded during a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical, the index keeps serving current data
    Warning,
    /// Significant, the index keeps serving the previous data
    Error,
}

/// Individual issue entry in a refresh report
#[derive(Debug, Clone)]
pub struct RefreshIssue {
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
    /// Actionable suggestion for the operator (optional)
    pub suggestion: Option<String>,
}

impl RefreshIssue {
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Warning,
            suggestion: None,
        }
    }

    /// Add an actionable suggestion to this issue
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create an operator-friendly issue from a CoreError
    pub fn from_core_error(source: impl Into<String>, error: &CoreError) -> Self {
        let source = source.into();
        let (message, suggestion) = match error {
            CoreError::CacheNotFound { path } => (
                format!("No cached document: {}", path.display()),
                Some("Check network access and run 'wbi refresh'".to_string()),
            ),
            CoreError::FileWrite { path, .. } => (
                format!("Cannot write cache: {}", path.display()),
                Some(format!(
                    "Check permissions of the cache directory: {}",
                    path.parent().unwrap_or(path).display()
                )),
            ),
            CoreError::FileRead { path, .. } => (
                format!("Cannot read cache: {}", path.display()),
                Some(format!("Check permissions: chmod +r {}", path.display())),
            ),
            CoreError::XmlParse { .. } | CoreError::MissingElement { .. } => (
                error.to_string(),
                Some("The source published a malformed document, previous data kept".to_string()),
            ),
            _ => (error.to_string(), None),
        };

        Self {
            source,
            message,
            severity: ErrorSeverity::Error,
            suggestion,
        }
    }
}

/// What happened to the remote document during a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The cache was still fresh, nothing was requested
    Skipped,
    /// A new document was downloaded, parsed and written to the cache
    Fetched { bytes: usize },
    /// The download failed or was unusable, the previous cache is kept
    Failed,
}

/// Report of a refresh attempt
///
/// Refreshes degrade instead of failing: fetch and parse problems are recorded
/// here and the previous index stays in place.
#[derive(Debug)]
pub struct RefreshReport {
    pub fetch: FetchOutcome,
    /// True when the in-memory index was replaced by this refresh
    pub reloaded: bool,
    pub districts: usize,
    pub issues: Vec<RefreshIssue>,
}

impl Default for RefreshReport {
    fn default() -> Self {
        Self {
            fetch: FetchOutcome::Skipped,
            reloaded: false,
            districts: 0,
            issues: Vec::new(),
        }
    }
}

impl RefreshReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: RefreshIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.issues.push(RefreshIssue::warning(source, message));
    }

    /// Returns true if there are any issues (including warnings)
    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }
}
