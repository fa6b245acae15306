//! Meeting data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::TabId;

/// Metadata the content script scraped from the meeting page.
///
/// Unknown fields are kept as-is so collaborators can add their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MeetingDetails {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    /// Title for logs and tooltips, falling back to the meeting id.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.meeting_id.as_deref())
            .unwrap_or("Untitled meeting")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInfo {
    #[serde(flatten)]
    pub details: MeetingDetails,
    /// Tab that reported the meeting
    pub tab_id: TabId,
    pub detected_at: DateTime<Utc>,
}

impl MeetingInfo {
    pub fn new(details: MeetingDetails, tab_id: TabId) -> Self {
        Self {
            details,
            tab_id,
            detected_at: Utc::now(),
        }
    }
}
