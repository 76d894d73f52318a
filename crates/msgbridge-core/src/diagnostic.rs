//! Diagnostic messages emitted while transforming a class path.

/// A diagnostic message (error, warning, or info) attached to a type or member.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[salsa::accumulator]
pub struct Diagnostic {
    pub message: String,
    /// Type or member the message is about, e.g. `<app.View: void draw()>`.
    pub location: String,
    pub severity: DiagnosticSeverity,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: impl Into<String>, phase: CompilationPhase) -> Self {
        Diagnostic {
            message: message.into(),
            location: location.into(),
            severity: DiagnosticSeverity::Error,
            phase,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Transform stage where a diagnostic was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Classification,
    OutletAdaptation,
    SelectorResolution,
    BridgeSynthesis,
    CallbackSynthesis,
    GenericDispatch,
    Registration,
    Emission,
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "ERROR"),
            DiagnosticSeverity::Warning => write!(f, "WARNING"),
            DiagnosticSeverity::Info => write!(f, "INFO"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:?}] {}: {}",
            self.severity, self.phase, self.location, self.message
        )
    }
}
