//! Meeting State Projection
//!
//! ```text
//! NoMeeting
//!   ↓ meeting detected
//! MeetingDetectedNoSession
//!   ↕ session captured / lost
//! MeetingDetectedWithSession
//! ```
//!
//! Navigating the owning tab away returns to `NoMeeting` from either
//! detected state. The state is never stored; it is evaluated from current
//! truth each time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeetingState {
    NoMeeting,
    MeetingDetectedNoSession,
    MeetingDetectedWithSession,
}

impl MeetingState {
    pub fn evaluate(meeting_present: bool, session_valid: bool) -> Self {
        match (meeting_present, session_valid) {
            (false, _) => MeetingState::NoMeeting,
            (true, false) => MeetingState::MeetingDetectedNoSession,
            (true, true) => MeetingState::MeetingDetectedWithSession,
        }
    }

    pub fn badge(&self) -> Badge {
        match self {
            MeetingState::NoMeeting => Badge {
                text: String::new(),
                color: "#9E9E9E".to_string(),
                title: "MeetScribe".to_string(),
            },
            MeetingState::MeetingDetectedNoSession => Badge {
                text: "!".to_string(),
                color: "#F59E0B".to_string(),
                title: "Meeting detected. Play the recording so MeetScribe can pick up your session."
                    .to_string(),
            },
            MeetingState::MeetingDetectedWithSession => Badge {
                text: "✓".to_string(),
                color: "#16A34A".to_string(),
                title: "Meeting detected. Ready to extract the transcript.".to_string(),
            },
        }
    }

    pub fn has_meeting(&self) -> bool {
        !matches!(self, MeetingState::NoMeeting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingState::NoMeeting => "no_meeting",
            MeetingState::MeetingDetectedNoSession => "meeting_no_session",
            MeetingState::MeetingDetectedWithSession => "meeting_with_session",
        }
    }
}

impl std::fmt::Display for MeetingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Toolbar badge for one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub color: String,
    /// Tooltip
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_covers_all_inputs() {
        assert_eq!(MeetingState::evaluate(false, false), MeetingState::NoMeeting);
        assert_eq!(MeetingState::evaluate(false, true), MeetingState::NoMeeting);
        assert_eq!(
            MeetingState::evaluate(true, false),
            MeetingState::MeetingDetectedNoSession
        );
        assert_eq!(
            MeetingState::evaluate(true, true),
            MeetingState::MeetingDetectedWithSession
        );
    }

    #[test]
    fn test_badges_are_distinct() {
        let none = MeetingState::NoMeeting.badge();
        let waiting = MeetingState::MeetingDetectedNoSession.badge();
        let ready = MeetingState::MeetingDetectedWithSession.badge();

        assert!(none.text.is_empty());
        assert_eq!(waiting.text, "!");
        assert_eq!(ready.text, "✓");
        assert_ne!(waiting.color, ready.color);
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_value(MeetingState::MeetingDetectedWithSession).unwrap();
        assert_eq!(json, "meetingDetectedWithSession");
    }
}
