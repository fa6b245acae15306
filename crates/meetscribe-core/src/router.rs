//! Extension message router
//!
//! Answers the popup and content script. Every request gets exactly one
//! [`CommandResult`], including malformed ones; raw credentials never appear
//! in a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use meetscribe_meeting::{
    MeetingDetails, MeetingError, MeetingInfo, MeetingLifecycleTracker, MeetingState, TabId,
};
use meetscribe_session::SessionStore;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} must be sent from a tab")]
    MissingSender(&'static str),

    #[error("Meeting error: {0}")]
    Meeting(#[from] MeetingError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum Request {
    MeetingDetected(MeetingDetails),
    GetSessionStatus,
    GetMeetingInfo,
    ClearSession,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::MeetingDetected(_) => "meetingDetected",
            Request::GetSessionStatus => "getSessionStatus",
            Request::GetMeetingInfo => "getMeetingInfo",
            Request::ClearSession => "clearSession",
        }
    }
}

/// Who sent a message. Popup messages carry no tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    #[serde(default)]
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub url: Option<String>,
}

impl MessageSender {
    pub fn tab(tab_id: TabId) -> Self {
        Self {
            tab_id: Some(tab_id),
            url: None,
        }
    }

    pub fn popup() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize)]
struct MeetingDetectedReply {
    state: MeetingState,
    meeting: Option<MeetingInfo>,
}

pub struct ExtensionMessageRouter {
    store: SessionStore,
    tracker: MeetingLifecycleTracker,
}

impl ExtensionMessageRouter {
    pub fn new(store: SessionStore, tracker: MeetingLifecycleTracker) -> Self {
        Self { store, tracker }
    }

    /// Parse and handle a raw message.
    pub fn dispatch(&self, payload: Value, sender: &MessageSender) -> CommandResult<Value> {
        match serde_json::from_value::<Request>(payload) {
            Ok(request) => self.handle(request, sender),
            Err(e) => {
                let error = HandlerError::InvalidRequest(e.to_string());
                tracing::warn!(error = %error, "Rejected message");
                CommandResult::err(error.to_string())
            }
        }
    }

    pub fn handle(&self, request: Request, sender: &MessageSender) -> CommandResult<Value> {
        let action = request.action();
        match self.handle_request(request, sender) {
            Ok(data) => CommandResult::ok(data),
            Err(e) => {
                tracing::warn!(action, error = %e, "Message handler failed");
                CommandResult::err(e.to_string())
            }
        }
    }

    fn handle_request(
        &self,
        request: Request,
        sender: &MessageSender,
    ) -> Result<Value, HandlerError> {
        match request {
            Request::MeetingDetected(details) => {
                let tab_id = sender
                    .tab_id
                    .ok_or(HandlerError::MissingSender("meetingDetected"))?;
                let state = self.tracker.on_meeting_detected(details, tab_id)?;
                Ok(serde_json::to_value(MeetingDetectedReply {
                    state,
                    meeting: self.tracker.meeting_info(),
                })?)
            }
            Request::GetSessionStatus => Ok(serde_json::to_value(self.store.status())?),
            Request::GetMeetingInfo => Ok(serde_json::to_value(self.tracker.meeting_info())?),
            Request::ClearSession => {
                self.store.clear();
                self.tracker.refresh();
                tracing::info!("Session cleared on request");
                Ok(serde_json::to_value(self.store.status())?)
            }
        }
    }
}
