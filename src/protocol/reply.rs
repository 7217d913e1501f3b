//! Reply payloads for request-style messages.

use serde::{Deserialize, Serialize};

use crate::identifiers::TabId;

/// Reply to `checkScreenshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckScreenshotReply {
    /// Whether a reference image exists.
    #[serde(rename = "hasScreenshot")]
    pub has_screenshot: bool,
}

/// Reply to `stopMonitoringForTab`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTabReply {
    /// Whether a tab id was supplied.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl StopTabReply {
    /// Reply for a stopped tab.
    #[must_use]
    pub fn stopped(tab_id: TabId) -> Self {
        Self {
            success: true,
            message: format!("Monitoring stopped for tab {tab_id}"),
        }
    }

    /// Reply for a request without tab id.
    #[must_use]
    pub fn missing_tab() -> Self {
        Self {
            success: false,
            message: "No tab id provided".to_string(),
        }
    }
}

/// One entry of the `getActiveSessions` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Monitored tab.
    #[serde(rename = "tabId")]
    pub tab_id: TabId,
    /// Completed poll iterations.
    #[serde(rename = "refreshCount")]
    pub refresh_count: u64,
}

/// Reply to `captureArea`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReply {
    /// The capture ran.
    pub started: bool,
}

/// Reply to `compareArea`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompareReply {
    /// The comparison cycle ran.
    pub completed: bool,
    /// Similarity in percent, when a comparison took place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_session_summary_shape() {
        let summary = SessionSummary {
            tab_id: TabId::new(5).expect("valid tab id"),
            refresh_count: 3,
        };
        assert_eq!(
            serde_json::to_value(summary).expect("serialize"),
            json!({"tabId": 5, "refreshCount": 3})
        );
    }

    #[test]
    fn test_stop_tab_reply() {
        let reply = StopTabReply::stopped(TabId::new(8).expect("valid tab id"));
        assert!(reply.success);
        assert!(reply.message.contains('8'));
        assert!(!StopTabReply::missing_tab().success);
    }

    #[test]
    fn test_check_screenshot_shape() {
        let reply = CheckScreenshotReply {
            has_screenshot: true,
        };
        assert_eq!(
            serde_json::to_value(reply).expect("serialize"),
            json!({"hasScreenshot": true})
        );
    }

    #[test]
    fn test_compare_reply_omits_missing_similarity() {
        let reply = CompareReply {
            completed: true,
            similarity: None,
        };
        assert_eq!(
            serde_json::to_value(reply).expect("serialize"),
            json!({"completed": true})
        );
    }
}
