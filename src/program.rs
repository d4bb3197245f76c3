//! Configuration consumed by the evaluator.
//!
//! The host program (project orchestration, CLI, config loading) is out of
//! scope; the evaluator only sees the resolved settings below.

/// The target version of the analyzed language.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl PythonVersion {
    pub const PY36: PythonVersion = PythonVersion { major: 3, minor: 6 };
    pub const PY37: PythonVersion = PythonVersion { major: 3, minor: 7 };
    pub const PY38: PythonVersion = PythonVersion { major: 3, minor: 8 };
}

impl Default for PythonVersion {
    fn default() -> Self {
        Self::PY38
    }
}

impl std::fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Severity at which a configurable diagnostic is reported.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DiagnosticLevel {
    /// The diagnostic is suppressed entirely.
    #[default]
    None,
    Warning,
    Error,
}

/// Resolved per-run settings.
///
/// The three `report_optional_*` levels gate the diagnostics for member
/// access, subscripting, and calls on a value whose type includes `None`.
#[derive(Clone, Debug, Default)]
pub struct ProgramSettings {
    pub python_version: PythonVersion,
    pub report_optional_member_access: DiagnosticLevel,
    pub report_optional_subscript: DiagnosticLevel,
    pub report_optional_call: DiagnosticLevel,
}

impl ProgramSettings {
    /// Settings with every configurable diagnostic promoted to an error.
    pub fn strict() -> Self {
        Self {
            python_version: PythonVersion::default(),
            report_optional_member_access: DiagnosticLevel::Error,
            report_optional_subscript: DiagnosticLevel::Error,
            report_optional_call: DiagnosticLevel::Error,
        }
    }
}
