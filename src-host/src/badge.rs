//! Badge updates forwarded to the extension

use tokio::sync::mpsc::UnboundedSender;

use meetscribe_core::{Badge, BadgeSink, TabId};

use crate::protocol::OutboundFrame;

/// Queues `badge` frames for the stdout writer.
pub struct ChannelBadgeSink {
    frames: UnboundedSender<OutboundFrame>,
}

impl ChannelBadgeSink {
    pub fn new(frames: UnboundedSender<OutboundFrame>) -> Self {
        Self { frames }
    }
}

impl BadgeSink for ChannelBadgeSink {
    fn apply(&self, tab_id: TabId, badge: &Badge) {
        let frame = OutboundFrame::Badge {
            tab_id,
            badge: badge.clone(),
        };
        if self.frames.send(frame).is_err() {
            tracing::debug!(tab_id, "Badge dropped after writer shut down");
        }
    }
}
