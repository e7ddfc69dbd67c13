//! View-state value objects and the seam every front-end implements.

use crate::render::Patch;

/// Transient form state. The controller only ever emits [`ViewState::pending`]
/// and [`ViewState::idle`]; views derive the concrete UI facts from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub busy: bool,
}

impl ViewState {
    pub const fn idle() -> Self {
        ViewState { busy: false }
    }

    pub const fn pending() -> Self {
        ViewState { busy: true }
    }

    pub fn spinner_visible(&self) -> bool {
        self.busy
    }

    pub fn submit_enabled(&self) -> bool {
        !self.busy
    }

    pub fn submit_label(&self) -> &'static str {
        if self.busy {
            "Uploading..."
        } else {
            "Upload"
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Danger,
}

impl Severity {
    /// Bootstrap alert variant.
    pub fn alert_class(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Danger => "danger",
        }
    }
}

/// A dismissible banner placed before the form. Never removed automatically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Notification { severity: Severity::Success, message: message.into() }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Notification { severity: Severity::Danger, message: message.into() }
    }
}

pub trait View {
    fn apply_state(&mut self, state: &ViewState);
    fn reveal_results(&mut self);
    fn patch(&mut self, patch: Patch);
    fn notify(&mut self, notification: Notification);
}
