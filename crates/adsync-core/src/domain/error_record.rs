//! Error recovery records
//!
//! Every failed operation leaves one [`ErrorRecord`] behind. Records are
//! written once and never mutated; they exist for diagnosis and for a
//! human (or scheduler) to resume with the literal `recovery_command`.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::newtypes::ClientSlug;
use super::window::{DateRange, DATE_FORMAT};

/// Engine operations exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Init,
    Append,
    Repair,
    Validate,
    ForceUnlock,
}

impl Operation {
    /// Command-line spelling of the operation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Append => "append",
            Self::Repair => "repair",
            Self::Validate => "validate",
            Self::ForceUnlock => "force-unlock",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of operation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Another process held the client lock past the timeout
    LockTimeout,
    /// `append`/`repair` ran before `init` produced state and a dataset
    MissingPriorState,
    /// The upstream performance source failed
    FetchFailure,
    /// Schema drift; logged, never aborts an operation
    ValidationWarning,
    /// Filesystem error while persisting the dataset or state
    WriteFailure,
    /// The state file exists but cannot be parsed
    StateCorrupt,
    /// Global or client configuration is missing or invalid
    Config,
    /// Caller supplied unusable arguments
    InvalidInput,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LockTimeout => "lock_timeout",
            Self::MissingPriorState => "missing_prior_state",
            Self::FetchFailure => "fetch_failure",
            Self::ValidationWarning => "validation_warning",
            Self::WriteFailure => "write_failure",
            Self::StateCorrupt => "state_corrupt",
            Self::Config => "config",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the operation was doing when it failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    /// Date range the operation attempted, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DateRange>,
    /// Step of the operation that failed (e.g. `fetching`, `writing`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl OperationContext {
    #[must_use]
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

/// Immutable record of a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub slug: ClientSlug,
    pub error_kind: ErrorKind,
    pub error_message: String,
    pub context: OperationContext,
    pub recovery_command: String,
}

impl ErrorRecord {
    /// Build a record, deriving the recovery command from the failure
    #[must_use]
    pub fn new(
        program: &str,
        operation: Operation,
        slug: ClientSlug,
        error_kind: ErrorKind,
        error_message: impl Into<String>,
        context: OperationContext,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let recovery_command = recovery_command(program, operation, &slug, error_kind, &context);
        Self {
            id: Uuid::new_v4(),
            timestamp,
            operation,
            slug,
            error_kind,
            error_message: error_message.into(),
            context,
            recovery_command,
        }
    }
}

/// The command a human should run to resume a failed operation
///
/// Failed `append`/`repair` runs resume as a `repair` over the attempted
/// range. A client with no prior state resumes with `init`.
#[must_use]
pub fn recovery_command(
    program: &str,
    operation: Operation,
    slug: &ClientSlug,
    kind: ErrorKind,
    context: &OperationContext,
) -> String {
    if kind == ErrorKind::MissingPriorState {
        return format!("{program} init {slug}");
    }

    match (operation, context.range) {
        (Operation::Append | Operation::Repair, Some(range)) => format!(
            "{program} repair {slug} --start {} --end {}",
            range.start.format(DATE_FORMAT),
            range.end.format(DATE_FORMAT)
        ),
        (op, _) => format!("{program} {op} {slug}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug() -> ClientSlug {
        ClientSlug::new("priority-roofing").unwrap()
    }

    #[test]
    fn test_append_failure_recovers_with_repair_over_range() {
        let ctx = OperationContext::default()
            .with_range(DateRange::parse("2025-09-07", "2025-09-19").unwrap())
            .with_phase("fetching");
        let cmd = recovery_command("adsync", Operation::Append, &slug(), ErrorKind::FetchFailure, &ctx);
        assert_eq!(cmd, "adsync repair priority-roofing --start 2025-09-07 --end 2025-09-19");
    }

    #[test]
    fn test_init_failure_recovers_with_init() {
        let cmd = recovery_command(
            "adsync",
            Operation::Init,
            &slug(),
            ErrorKind::WriteFailure,
            &OperationContext::default(),
        );
        assert_eq!(cmd, "adsync init priority-roofing");
    }

    #[test]
    fn test_missing_state_always_points_to_init() {
        let cmd = recovery_command(
            "adsync",
            Operation::Append,
            &slug(),
            ErrorKind::MissingPriorState,
            &OperationContext::default(),
        );
        assert_eq!(cmd, "adsync init priority-roofing");
    }

    #[test]
    fn test_append_without_range_reruns_append() {
        let cmd = recovery_command(
            "adsync",
            Operation::Append,
            &slug(),
            ErrorKind::LockTimeout,
            &OperationContext::default(),
        );
        assert_eq!(cmd, "adsync append priority-roofing");
    }

    #[test]
    fn test_record_serializes_kind_and_context() {
        let record = ErrorRecord::new(
            "adsync",
            Operation::Repair,
            slug(),
            ErrorKind::FetchFailure,
            "upstream returned 500",
            OperationContext::default().with_range(DateRange::parse("2025-09-01", "2025-09-30").unwrap()),
            Utc::now(),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["operation"], "repair");
        assert_eq!(value["error_kind"], "fetch_failure");
        assert_eq!(value["context"]["range"]["start"], "2025-09-01");
        assert_eq!(
            value["recovery_command"],
            "adsync repair priority-roofing --start 2025-09-01 --end 2025-09-30"
        );
    }
}
