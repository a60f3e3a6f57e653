//! Step sequence and failure types of the automation pipeline.

use std::any::Any;
use std::fmt;

use serde::Serialize;

use crate::driver::DriverError;
use crate::job::first_line;
use crate::session::RemoteControlError;

use super::loader::LoadResult;

/// The steps of one automation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AcquireSession,
    AttachDriver,
    OpenSurface,
    ActivateExtension,
    Search,
    LoadContent,
    SelectAll,
    OpenActionMenu,
    AddToCollection,
    NewCollection,
    FillTitle,
    SetVisibility,
    ConfirmCreate,
    ExtractLink,
}

impl Step {
    pub const ALL: [Step; 14] = [
        Step::AcquireSession,
        Step::AttachDriver,
        Step::OpenSurface,
        Step::ActivateExtension,
        Step::Search,
        Step::LoadContent,
        Step::SelectAll,
        Step::OpenActionMenu,
        Step::AddToCollection,
        Step::NewCollection,
        Step::FillTitle,
        Step::SetVisibility,
        Step::ConfirmCreate,
        Step::ExtractLink,
    ];

    /// 1-based position in [`Step::ALL`].
    pub fn number(&self) -> usize {
        Step::ALL
            .iter()
            .position(|s| s == self)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::AcquireSession => "acquire_session",
            Step::AttachDriver => "attach_driver",
            Step::OpenSurface => "open_surface",
            Step::ActivateExtension => "activate_extension",
            Step::Search => "search",
            Step::LoadContent => "load_content",
            Step::SelectAll => "select_all",
            Step::OpenActionMenu => "open_action_menu",
            Step::AddToCollection => "add_to_collection",
            Step::NewCollection => "new_collection",
            Step::FillTitle => "fill_title",
            Step::SetVisibility => "set_visibility",
            Step::ConfirmCreate => "confirm_create",
            Step::ExtractLink => "extract_link",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RemoteControl,
    Attach,
    ElementNotFound,
    Interaction,
    Script,
    Timeout,
    Unparseable,
    Panic,
}

/// Failure of a single pipeline step. The message is always a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: Option<Step>,
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(kind: FailureKind, message: impl AsRef<str>) -> Self {
        Self {
            step: None,
            kind,
            message: first_line(message.as_ref()),
        }
    }

    pub fn timeout(message: impl AsRef<str>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn not_found(message: impl AsRef<str>) -> Self {
        Self::new(FailureKind::ElementNotFound, message)
    }

    pub fn unparseable(message: impl AsRef<str>) -> Self {
        Self::new(FailureKind::Unparseable, message)
    }

    /// Failure for a step whose future panicked.
    pub fn panicked(panic: &(dyn Any + Send)) -> Self {
        Self::new(FailureKind::Panic, format!("panicked: {}", panic_message(panic)))
    }

    /// Tags the failure with the step it happened in, unless already tagged.
    pub fn at(mut self, step: Step) -> Self {
        self.step.get_or_insert(step);
        self
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "step {} ({}) failed: {}", step.number(), step, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StepFailure {}

impl From<DriverError> for StepFailure {
    fn from(e: DriverError) -> Self {
        let kind = match &e {
            DriverError::Attach(_) => FailureKind::Attach,
            DriverError::NoSuchElement(_) => FailureKind::ElementNotFound,
            DriverError::Script(_) => FailureKind::Script,
            DriverError::Timeout(_) => FailureKind::Timeout,
            DriverError::NotInteractable(_)
            | DriverError::Protocol { .. }
            | DriverError::Transport(_) => FailureKind::Interaction,
        };
        StepFailure::new(kind, e.to_string())
    }
}

impl From<RemoteControlError> for StepFailure {
    fn from(e: RemoteControlError) -> Self {
        StepFailure::new(FailureKind::RemoteControl, e.to_string())
    }
}

/// First line of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    first_line(&message)
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub collection_name: String,
    pub collection_link: String,
    pub load: LoadResult,
}
