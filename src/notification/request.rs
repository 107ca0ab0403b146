//! Alert request and severity

use serde::{Deserialize, Serialize};

pub const CRITICAL_TITLE: &str = "Critical Notification";
pub const CRITICAL_BODY: &str = "It's a critical notification";
pub const NORMAL_TITLE: &str = "Normal Notification";
pub const NORMAL_BODY: &str = "It's a normal notification";

/// Alert severity
///
/// - CRITICAL: bypasses Do Not Disturb and forces the notification stream audible
/// - NORMAL: subject to the device's interruption filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Normal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Normal => "NORMAL",
        }
    }

    /// Whether the delivery channel must bypass the suppression policy
    pub fn bypasses_suppression(&self) -> bool {
        matches!(self, Severity::Critical)
    }
}

/// One alert to post. Built per call, never mutated after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub severity: Severity,
    /// Fraction of the maximum notification volume, 0.0..=1.0
    pub loudness_fraction: Option<f32>,
    pub title: String,
    pub body: String,
}

impl AlertRequest {
    pub fn critical(loudness_fraction: Option<f32>) -> Self {
        Self {
            severity: Severity::Critical,
            loudness_fraction,
            title: CRITICAL_TITLE.to_string(),
            body: CRITICAL_BODY.to_string(),
        }
    }

    pub fn normal() -> Self {
        Self {
            severity: Severity::Normal,
            loudness_fraction: None,
            title: NORMAL_TITLE.to_string(),
            body: NORMAL_BODY.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_texts() {
        let critical = AlertRequest::critical(Some(0.8));
        assert_eq!(critical.title, "Critical Notification");
        assert_eq!(critical.body, "It's a critical notification");
        assert!(critical.is_critical());

        let normal = AlertRequest::normal();
        assert_eq!(normal.title, "Normal Notification");
        assert_eq!(normal.loudness_fraction, None);
        assert!(!normal.is_critical());
    }

    #[test]
    fn test_custom_texts() {
        let req = AlertRequest::normal().with_title("Build").with_body("done");
        assert_eq!(req.title, "Build");
        assert_eq!(req.body, "done");
        assert_eq!(req.severity, Severity::Normal);
    }

    #[test]
    fn test_severity_bypass() {
        assert!(Severity::Critical.bypasses_suppression());
        assert!(!Severity::Normal.bypasses_suppression());
        assert_eq!(format!("{}", Severity::Critical), "CRITICAL");
    }
}
