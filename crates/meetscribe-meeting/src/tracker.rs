//! Meeting Lifecycle Tracker
//!
//! Correlates a meeting reported by the content script with its tab and keeps
//! that tab's badge in sync with session validity.

use parking_lot::RwLock;
use std::sync::Arc;

use meetscribe_intercept::MatchPattern;
use meetscribe_session::SessionView;

use crate::error::MeetingError;
use crate::meeting::{MeetingDetails, MeetingInfo};
use crate::state::{Badge, MeetingState};
use crate::Result;

/// Browser tab identifier.
pub type TabId = i64;

/// Where computed badges go (the toolbar, in a real browser).
pub trait BadgeSink: Send + Sync {
    fn apply(&self, tab_id: TabId, badge: &Badge);
}

pub struct MeetingLifecycleTracker {
    /// Single slot: a second detection overwrites the first
    meeting: Arc<RwLock<Option<MeetingInfo>>>,
    session: SessionView,
    meeting_page: MatchPattern,
    badges: Arc<dyn BadgeSink>,
}

impl MeetingLifecycleTracker {
    pub fn new(session: SessionView, meeting_page: MatchPattern, badges: Arc<dyn BadgeSink>) -> Self {
        Self {
            meeting: Arc::new(RwLock::new(None)),
            session,
            meeting_page,
            badges,
        }
    }

    pub fn on_meeting_detected(&self, details: MeetingDetails, tab_id: TabId) -> Result<MeetingState> {
        if tab_id < 0 {
            return Err(MeetingError::InvalidTab(tab_id));
        }

        let info = MeetingInfo::new(details, tab_id);
        let previous_tab = {
            let mut slot = self.meeting.write();
            let previous = slot.as_ref().map(|m| m.tab_id);
            *slot = Some(info.clone());
            previous
        };

        tracing::info!(
            tab_id,
            title = %info.details.display_title(),
            "Meeting detected"
        );

        if let Some(previous) = previous_tab.filter(|p| *p != tab_id) {
            tracing::debug!(tab_id = previous, "Meeting moved to another tab");
            self.badges.apply(previous, &MeetingState::NoMeeting.badge());
        }

        Ok(self.project(Some(tab_id)))
    }

    /// Forget the meeting if its tab left the meeting page.
    pub fn on_tab_navigated(&self, tab_id: TabId, url: &str) -> MeetingState {
        if self.meeting_page.matches_str(url) {
            return self.refresh();
        }

        if self.take_if_owned_by(tab_id) {
            tracing::info!(tab_id, "Meeting tab navigated away");
            self.project(Some(tab_id))
        } else {
            self.state()
        }
    }

    pub fn on_tab_removed(&self, tab_id: TabId) -> MeetingState {
        if self.take_if_owned_by(tab_id) {
            tracing::info!(tab_id, "Meeting tab closed");
        }
        self.state()
    }

    /// Explicit reset, e.g. from the popup.
    pub fn clear(&self) -> MeetingState {
        let owner = self.meeting.write().take().map(|m| m.tab_id);
        if owner.is_some() {
            tracing::info!(tab_id = ?owner, "Meeting cleared");
        }
        self.project(owner)
    }

    /// Re-apply the badge after the session changed.
    ///
    /// The slot stays read-locked until the badge is applied, so an owner
    /// change cannot land between reading the owner and painting its tab.
    pub fn refresh(&self) -> MeetingState {
        let slot = self.meeting.read();
        let state = MeetingState::evaluate(slot.is_some(), self.session.is_valid());
        if let Some(meeting) = slot.as_ref() {
            tracing::debug!(tab_id = meeting.tab_id, state = %state, "Applying badge");
            self.badges.apply(meeting.tab_id, &state.badge());
        }
        state
    }

    pub fn meeting_info(&self) -> Option<MeetingInfo> {
        self.meeting.read().clone()
    }

    pub fn state(&self) -> MeetingState {
        let present = self.meeting.read().is_some();
        MeetingState::evaluate(present, self.session.is_valid())
    }

    fn take_if_owned_by(&self, tab_id: TabId) -> bool {
        let mut slot = self.meeting.write();
        match slot.as_ref() {
            Some(meeting) if meeting.tab_id == tab_id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Evaluate from current truth and push the badge to `tab_id`.
    fn project(&self, tab_id: Option<TabId>) -> MeetingState {
        let state = self.state();
        if let Some(tab_id) = tab_id {
            tracing::debug!(tab_id, state = %state, "Applying badge");
            self.badges.apply(tab_id, &state.badge());
        }
        state
    }
}

impl Clone for MeetingLifecycleTracker {
    fn clone(&self) -> Self {
        Self {
            meeting: Arc::clone(&self.meeting),
            session: self.session.clone(),
            meeting_page: self.meeting_page.clone(),
            badges: Arc::clone(&self.badges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetscribe_session::SessionStore;
    use parking_lot::Mutex;

    const MEETING_URL: &str =
        "https://contoso.sharepoint.com/personal/ana/_layouts/15/stream.aspx?id=%2Fmeeting.mp4";

    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<(TabId, Badge)>>,
    }

    impl RecordingSink {
        fn last_for(&self, tab_id: TabId) -> Option<Badge> {
            self.applied
                .lock()
                .iter()
                .rev()
                .find(|(t, _)| *t == tab_id)
                .map(|(_, b)| b.clone())
        }
    }

    impl BadgeSink for RecordingSink {
        fn apply(&self, tab_id: TabId, badge: &Badge) {
            self.applied.lock().push((tab_id, badge.clone()));
        }
    }

    fn tracker() -> (MeetingLifecycleTracker, SessionStore, Arc<RecordingSink>) {
        let store = SessionStore::new();
        let sink = Arc::new(RecordingSink::default());
        let tracker = MeetingLifecycleTracker::new(
            store.view(),
            MatchPattern::parse("*://*.sharepoint.com/*stream.aspx*").unwrap(),
            sink.clone(),
        );
        (tracker, store, sink)
    }

    #[test]
    fn test_detect_then_navigate_away() {
        let (tracker, _store, sink) = tracker();

        let state = tracker
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();
        assert_eq!(state, MeetingState::MeetingDetectedNoSession);
        assert_eq!(sink.last_for(7).unwrap().text, "!");

        let state = tracker.on_tab_navigated(7, "https://contoso.sharepoint.com/sites/home");
        assert_eq!(state, MeetingState::NoMeeting);
        assert!(tracker.meeting_info().is_none());
        assert!(sink.last_for(7).unwrap().text.is_empty());
    }

    #[test]
    fn test_second_detection_overwrites() {
        let (tracker, _store, sink) = tracker();

        tracker
            .on_meeting_detected(MeetingDetails::titled("First"), 7)
            .unwrap();
        tracker
            .on_meeting_detected(MeetingDetails::titled("Second"), 9)
            .unwrap();

        let info = tracker.meeting_info().unwrap();
        assert_eq!(info.tab_id, 9);
        assert_eq!(info.details.title.as_deref(), Some("Second"));
        assert!(sink.last_for(7).unwrap().text.is_empty());
        assert_eq!(sink.last_for(9).unwrap().text, "!");
    }

    #[test]
    fn test_other_tab_navigation_leaves_meeting() {
        let (tracker, _store, _sink) = tracker();
        tracker
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        tracker.on_tab_navigated(3, "https://example.com/");
        assert_eq!(tracker.meeting_info().unwrap().tab_id, 7);
    }

    #[test]
    fn test_navigation_within_meeting_page_keeps_meeting() {
        let (tracker, _store, _sink) = tracker();
        tracker
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        let state = tracker.on_tab_navigated(7, MEETING_URL);
        assert_eq!(state, MeetingState::MeetingDetectedNoSession);
        assert!(tracker.meeting_info().is_some());
    }

    #[test]
    fn test_session_validity_moves_state_both_ways() {
        let (tracker, store, sink) = tracker();
        tracker
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        store.replace_token("abc123");
        assert_eq!(tracker.refresh(), MeetingState::MeetingDetectedWithSession);
        assert_eq!(sink.last_for(7).unwrap().text, "✓");

        store.clear();
        assert_eq!(tracker.refresh(), MeetingState::MeetingDetectedNoSession);
        assert_eq!(sink.last_for(7).unwrap().text, "!");
    }

    #[test]
    fn test_with_session_requires_meeting() {
        let (tracker, store, sink) = tracker();
        store.replace_token("abc123");

        assert_eq!(tracker.refresh(), MeetingState::NoMeeting);
        assert!(sink.applied.lock().is_empty());
    }

    #[test]
    fn test_tab_removed() {
        let (tracker, _store, _sink) = tracker();
        tracker
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        assert_eq!(tracker.on_tab_removed(8), MeetingState::MeetingDetectedNoSession);
        assert_eq!(tracker.on_tab_removed(7), MeetingState::NoMeeting);
        assert!(tracker.meeting_info().is_none());
    }

    #[test]
    fn test_clear_resets_owner_badge() {
        let (tracker, _store, sink) = tracker();
        tracker
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        assert_eq!(tracker.clear(), MeetingState::NoMeeting);
        assert!(sink.last_for(7).unwrap().text.is_empty());
        assert_eq!(tracker.clear(), MeetingState::NoMeeting);
    }

    #[test]
    fn test_rejects_tabless_sender() {
        let (tracker, _store, _sink) = tracker();
        let result = tracker.on_meeting_detected(MeetingDetails::default(), -1);
        assert_eq!(result, Err(MeetingError::InvalidTab(-1)));
        assert!(tracker.meeting_info().is_none());
    }
}
