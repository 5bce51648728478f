use serde::Serialize;

/// Conclusions that mark a finished run as failed.
const FAILED_CONCLUSIONS: &[&str] = &["failure", "cancelled", "timed_out", "action_required"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Success,
    Failed,
    InProgress,
    Unknown,
}

impl DisplayStatus {
    pub fn icon(self) -> &'static str {
        match self {
            DisplayStatus::Success => "✅",
            DisplayStatus::Failed => "❌",
            DisplayStatus::InProgress => "⏳",
            DisplayStatus::Unknown => "⚪",
        }
    }
}

/// Collapse a run's lifecycle `status` and terminal `conclusion` into one
/// display state. The conclusion is checked first: a run can report its
/// outcome before the status settles on `completed`.
pub fn derive_display_status(status: Option<&str>, conclusion: Option<&str>) -> DisplayStatus {
    match conclusion {
        Some("success") => DisplayStatus::Success,
        Some(c) if FAILED_CONCLUSIONS.contains(&c) => DisplayStatus::Failed,
        _ if status != Some("completed") => DisplayStatus::InProgress,
        _ => DisplayStatus::Unknown,
    }
}
