//! Diagnostic codes and error reporting.
//!
//! Every fallible operation in the crate returns a [`Diagnostic`]. The code
//! determines both the severity and the broad error kind, so callers can
//! branch on "bad value" vs "bad document" vs "storage failure" without
//! matching on message text.

use std::fmt;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// Broad classification of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value failed shape validation
    Parameter,
    /// A document or registry is structurally unusable
    Config,
    /// The remote store failed
    RemoteStore,
}

/// Diagnostic error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    // Parameter errors (E01xx)
    E0101InvalidGuid,
    E0102InvalidEmail,
    E0103InvalidIpAddress,
    E0104InvalidTimezone,
    E0105InvalidEnumValue,
    E0106EmptyValue,
    E0107DuplicateEntry,
    E0108InvalidFqdn,
    E0109InvalidVmSku,
    E0110InvalidIndex,
    E0111FieldNotSet,
    E0112UnknownField,
    E0113ValueTooLong,
    E0114InvalidType,
    E0115InvalidLocation,
    E0116ContextExists,
    E0117ContextNotFound,
    E0118RegistryInvalid,
    E0119SectionInvalid,

    // Config errors (E02xx)
    E0201NoContextSelected,
    E0202FileNotFound,
    E0203YamlParseError,
    E0204NotAMapping,
    E0205SreNotFound,
    E0206TemplateDocument,
    E0207IoError,

    // Remote store errors (E03xx)
    E0301StoreUnavailable,
    E0302StoreIo,
    E0303BlobNotFound,

    // Warnings (W01xx)
    W0101DuplicatesDiscarded,
}

impl DiagnosticCode {
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Self::W0101DuplicatesDiscarded => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::E0201NoContextSelected
            | Self::E0202FileNotFound
            | Self::E0203YamlParseError
            | Self::E0204NotAMapping
            | Self::E0205SreNotFound
            | Self::E0206TemplateDocument
            | Self::E0207IoError => ErrorKind::Config,
            Self::E0301StoreUnavailable | Self::E0302StoreIo | Self::E0303BlobNotFound => {
                ErrorKind::RemoteStore
            }
            _ => ErrorKind::Parameter,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            // E01xx - Parameter
            Self::E0101InvalidGuid => "E0101",
            Self::E0102InvalidEmail => "E0102",
            Self::E0103InvalidIpAddress => "E0103",
            Self::E0104InvalidTimezone => "E0104",
            Self::E0105InvalidEnumValue => "E0105",
            Self::E0106EmptyValue => "E0106",
            Self::E0107DuplicateEntry => "E0107",
            Self::E0108InvalidFqdn => "E0108",
            Self::E0109InvalidVmSku => "E0109",
            Self::E0110InvalidIndex => "E0110",
            Self::E0111FieldNotSet => "E0111",
            Self::E0112UnknownField => "E0112",
            Self::E0113ValueTooLong => "E0113",
            Self::E0114InvalidType => "E0114",
            Self::E0115InvalidLocation => "E0115",
            Self::E0116ContextExists => "E0116",
            Self::E0117ContextNotFound => "E0117",
            Self::E0118RegistryInvalid => "E0118",
            Self::E0119SectionInvalid => "E0119",
            // E02xx - Config
            Self::E0201NoContextSelected => "E0201",
            Self::E0202FileNotFound => "E0202",
            Self::E0203YamlParseError => "E0203",
            Self::E0204NotAMapping => "E0204",
            Self::E0205SreNotFound => "E0205",
            Self::E0206TemplateDocument => "E0206",
            Self::E0207IoError => "E0207",
            // E03xx - Remote store
            Self::E0301StoreUnavailable => "E0301",
            Self::E0302StoreIo => "E0302",
            Self::E0303BlobNotFound => "E0303",
            // W01xx - Warnings
            Self::W0101DuplicatesDiscarded => "W0101",
        }
    }
}

/// A diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    /// What the diagnostic is about: a field path, a file or a blob name
    pub subject: String,
    pub level: DiagnosticLevel,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            level: code.level(),
            code,
            message: message.into(),
            subject: subject.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn is_parameter_error(&self) -> bool {
        self.kind() == ErrorKind::Parameter
    }

    pub fn is_config_error(&self) -> bool {
        self.kind() == ErrorKind::Config
    }

    /// Prefix the subject with an enclosing path segment (`fqdn` -> `shm.fqdn`)
    pub fn within(mut self, parent: &str) -> Self {
        self.subject = if self.subject.is_empty() {
            parent.to_string()
        } else {
            format!("{parent}.{}", self.subject)
        };
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        if self.subject.is_empty() {
            write!(f, "{}[{}]: {}", level_str, self.code.code(), self.message)
        } else {
            write!(
                f,
                "{}[{}]: {} ({})",
                level_str,
                self.code.code(),
                self.message,
                self.subject
            )
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Crate-wide result alias
pub type Result<T, E = Diagnostic> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_grouping() {
        assert_eq!(DiagnosticCode::E0101InvalidGuid.kind(), ErrorKind::Parameter);
        assert_eq!(DiagnosticCode::E0201NoContextSelected.kind(), ErrorKind::Config);
        assert_eq!(DiagnosticCode::E0302StoreIo.kind(), ErrorKind::RemoteStore);
        assert_eq!(
            DiagnosticCode::W0101DuplicatesDiscarded.level(),
            DiagnosticLevel::Warning
        );
    }

    #[test]
    fn test_within_builds_field_path() {
        let diag = Diagnostic::new(DiagnosticCode::E0108InvalidFqdn, "bad", "fqdn")
            .within("shm");
        assert_eq!(diag.subject, "shm.fqdn");
        let diag = Diagnostic::new(DiagnosticCode::E0119SectionInvalid, "bad", "").within("sre");
        assert_eq!(diag.subject, "sre");
    }

    #[test]
    fn test_display_format() {
        let diag = Diagnostic::new(DiagnosticCode::E0205SreNotFound, "SRE sre3 does not exist", "sre3");
        assert_eq!(diag.to_string(), "error[E0205]: SRE sre3 does not exist (sre3)");
    }
}
