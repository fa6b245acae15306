//! Frames exchanged with the browser extension

use serde::{Deserialize, Serialize};
use serde_json::Value;

use meetscribe_core::{
    Badge, BackgroundEvent, CommandResult, Cookie, IncomingResponse, LifecycleEvent,
    MessageSender, NetworkEvent, OutgoingRequest, TabId,
};

/// Correlates a `message` frame with its `reply`.
pub type MessageId = u64;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundFrame {
    BeforeSendHeaders(OutgoingRequest),
    HeadersReceived(IncomingResponse),
    TabUpdated {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        url: String,
    },
    TabRemoved {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    Cookies {
        domain: String,
        #[serde(default)]
        cookies: Vec<Cookie>,
    },
    Lifecycle(LifecycleEvent),
    Message {
        id: MessageId,
        #[serde(default, rename = "tabId")]
        tab_id: Option<TabId>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        payload: Value,
    },
}

impl InboundFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::BeforeSendHeaders(_) => "beforeSendHeaders",
            InboundFrame::HeadersReceived(_) => "headersReceived",
            InboundFrame::TabUpdated { .. } => "tabUpdated",
            InboundFrame::TabRemoved { .. } => "tabRemoved",
            InboundFrame::Cookies { .. } => "cookies",
            InboundFrame::Lifecycle(_) => "lifecycle",
            InboundFrame::Message { .. } => "message",
        }
    }

    /// Messages are split off because their reply channel belongs to the caller.
    pub fn route(self) -> Routed {
        let event = match self {
            InboundFrame::BeforeSendHeaders(request) => {
                BackgroundEvent::Network(NetworkEvent::BeforeSendHeaders(request))
            }
            InboundFrame::HeadersReceived(response) => {
                BackgroundEvent::Network(NetworkEvent::HeadersReceived(response))
            }
            InboundFrame::TabUpdated { tab_id, url } => {
                BackgroundEvent::TabNavigated { tab_id, url }
            }
            InboundFrame::TabRemoved { tab_id } => BackgroundEvent::TabRemoved { tab_id },
            InboundFrame::Cookies { domain, cookies } => {
                BackgroundEvent::Cookies { domain, cookies }
            }
            InboundFrame::Lifecycle(event) => BackgroundEvent::Lifecycle(event),
            InboundFrame::Message {
                id,
                tab_id,
                url,
                payload,
            } => {
                return Routed::Message(PendingMessage {
                    id,
                    sender: MessageSender { tab_id, url },
                    payload,
                })
            }
        };
        Routed::Event(event)
    }
}

#[derive(Debug)]
pub enum Routed {
    Event(BackgroundEvent),
    Message(PendingMessage),
}

/// A `message` frame waiting for its reply channel.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub id: MessageId,
    pub sender: MessageSender,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    Reply {
        id: MessageId,
        response: CommandResult<Value>,
    },
    Badge {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        #[serde(flatten)]
        badge: Badge,
    },
}
