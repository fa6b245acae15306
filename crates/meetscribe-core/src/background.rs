//! Background process state container
//!
//! All session and meeting state is owned here. Inbound traffic arrives as
//! [`BackgroundEvent`]s and is handled in arrival order on the loop, token
//! captures and 401/403 clears included. Only cookie lookups, which await,
//! run as their own tasks; their write tickets are taken in order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use meetscribe_intercept::{
    BeforeSendOutcome, Cookie, CookieJar, CookieLookup, CookieOutcome, IncomingResponse,
    NetworkEvent, NetworkOutcome, OutgoingRequest, RequestObserver, ResponseOutcome, TokenCapture,
};
use meetscribe_meeting::{BadgeSink, MeetingLifecycleTracker, TabId};
use meetscribe_session::{AuthHeaderBuilder, SessionStatus, SessionStore, SessionView};

use crate::config::Config;
use crate::router::{CommandResult, ExtensionMessageRouter, MessageSender};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LifecycleEvent {
    Startup,
    Installed { reason: InstallReason },
}

#[derive(Debug)]
pub enum BackgroundEvent {
    Network(NetworkEvent),
    TabNavigated {
        tab_id: TabId,
        url: String,
    },
    TabRemoved {
        tab_id: TabId,
    },
    /// Current cookies for a domain, replacing what was known before
    Cookies {
        domain: String,
        cookies: Vec<Cookie>,
    },
    Lifecycle(LifecycleEvent),
    Message {
        payload: Value,
        sender: MessageSender,
        reply: oneshot::Sender<CommandResult<Value>>,
    },
}

pub struct Background {
    store: SessionStore,
    cookie_jar: CookieJar,
    observer: RequestObserver,
    tracker: MeetingLifecycleTracker,
    router: ExtensionMessageRouter,
    auth_headers: AuthHeaderBuilder,
}

impl Background {
    pub fn new(config: &Config, badges: Arc<dyn BadgeSink>) -> Result<Self> {
        config.validate()?;

        let store = SessionStore::new();
        let cookie_jar = CookieJar::new();
        let observer = RequestObserver::new(
            store.clone(),
            Arc::new(cookie_jar.clone()),
            config.observer_config()?,
        );
        let tracker = MeetingLifecycleTracker::new(store.view(), config.meeting_page()?, badges);
        let router = ExtensionMessageRouter::new(store.clone(), tracker.clone());
        let auth_headers =
            AuthHeaderBuilder::new(store.view()).with_client_headers(config.client_header_pairs());

        tracing::info!(
            api_pattern = %config.api_pattern,
            site_domain = %config.site_domain,
            "Background initialized"
        );

        Ok(Self {
            store,
            cookie_jar,
            observer,
            tracker,
            router,
            auth_headers,
        })
    }

    /// Header builder for the media API client.
    pub fn auth_headers(&self) -> AuthHeaderBuilder {
        self.auth_headers.clone()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.store.status()
    }

    pub fn session_view(&self) -> SessionView {
        self.store.view()
    }

    pub fn tracker(&self) -> &MeetingLifecycleTracker {
        &self.tracker
    }

    pub fn router(&self) -> &ExtensionMessageRouter {
        &self.router
    }

    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    /// Credentials never survive a restart, install or update.
    pub fn on_lifecycle(&self, event: LifecycleEvent) {
        self.store.clear();
        self.cookie_jar.clear();
        self.tracker.clear();
        tracing::info!(?event, "Session state reset");
    }

    pub async fn observe(&self, event: &NetworkEvent) -> NetworkOutcome {
        match event {
            NetworkEvent::BeforeSendHeaders(request) => {
                let capture = self.capture(request);
                let cookies = match capture.cookies {
                    Some(lookup) => self.observer.lookup_cookies(lookup).await,
                    None => CookieOutcome::Skipped,
                };
                NetworkOutcome::BeforeSend(BeforeSendOutcome {
                    token: capture.token,
                    cookies,
                })
            }
            NetworkEvent::HeadersReceived(response) => {
                NetworkOutcome::Response(self.on_response(response))
            }
        }
    }

    /// Handle one event to completion.
    pub async fn handle_event(&self, event: BackgroundEvent) {
        if let Some(lookup) = self.handle_ordered(event) {
            self.observer.lookup_cookies(lookup).await;
        }
    }

    /// Run until every sender is dropped, then wait for in-flight cookie lookups.
    pub async fn run(self, mut events: mpsc::Receiver<BackgroundEvent>) {
        let mut in_flight = JoinSet::new();

        while let Some(event) = events.recv().await {
            if let Some(lookup) = self.handle_ordered(event) {
                let observer = self.observer.clone();
                in_flight.spawn(async move {
                    observer.lookup_cookies(lookup).await;
                });
            }

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Cookie lookup task failed");
                }
            }
        }

        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Cookie lookup task failed");
            }
        }

        tracing::info!("Background event loop stopped");
    }

    /// Apply everything an event does synchronously. Returns the cookie
    /// lookup still owed by a before-send event.
    fn handle_ordered(&self, event: BackgroundEvent) -> Option<CookieLookup> {
        match event {
            BackgroundEvent::Network(NetworkEvent::BeforeSendHeaders(request)) => {
                return self.capture(&request).cookies;
            }
            BackgroundEvent::Network(NetworkEvent::HeadersReceived(response)) => {
                self.on_response(&response);
            }
            BackgroundEvent::TabNavigated { tab_id, url } => {
                self.tracker.on_tab_navigated(tab_id, &url);
            }
            BackgroundEvent::TabRemoved { tab_id } => {
                self.tracker.on_tab_removed(tab_id);
            }
            BackgroundEvent::Cookies { domain, cookies } => {
                self.cookie_jar.replace_domain(&domain, cookies);
            }
            BackgroundEvent::Lifecycle(event) => self.on_lifecycle(event),
            BackgroundEvent::Message {
                payload,
                sender,
                reply,
            } => {
                let response = self.router.dispatch(payload, &sender);
                if reply.send(response).is_err() {
                    tracing::debug!("Message reply dropped by requester");
                }
            }
        }
        None
    }

    fn capture(&self, request: &OutgoingRequest) -> TokenCapture {
        let capture = self.observer.capture_token(request);
        if capture.token_changed() {
            self.session_changed();
        }
        capture
    }

    fn on_response(&self, response: &IncomingResponse) -> ResponseOutcome {
        let outcome = self.observer.on_headers_received(response);
        if matches!(outcome, ResponseOutcome::AuthFailure(_)) {
            self.session_changed();
        }
        outcome
    }

    /// Validity only moves with the token, so cookie writes never repaint.
    fn session_changed(&self) {
        let state = self.tracker.refresh();
        tracing::debug!(state = %state, "Session changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetscribe_intercept::{HttpHeader, IncomingResponse, OutgoingRequest};
    use meetscribe_meeting::{Badge, MeetingDetails};
    use meetscribe_session::SessionError;
    use parking_lot::Mutex;
    use serde_json::json;

    const API_URL: &str = "https://contoso.sharepoint.com/_api/v2.1/drives/b!x/items/1/media";

    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<(TabId, Badge)>>,
    }

    impl BadgeSink for RecordingSink {
        fn apply(&self, tab_id: TabId, badge: &Badge) {
            self.applied.lock().push((tab_id, badge.clone()));
        }
    }

    fn background() -> (Background, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let background = Background::new(&Config::default(), sink.clone()).unwrap();
        (background, sink)
    }

    fn bearer(token: &str) -> BackgroundEvent {
        BackgroundEvent::Network(NetworkEvent::BeforeSendHeaders(OutgoingRequest::new(
            API_URL,
            vec![HttpHeader::new("Authorization", &format!("Bearer {}", token))],
        )))
    }

    fn response(status: u16) -> BackgroundEvent {
        BackgroundEvent::Network(NetworkEvent::HeadersReceived(IncomingResponse::new(
            API_URL, status,
        )))
    }

    #[tokio::test]
    async fn test_build_without_capture_is_error() {
        let (background, _sink) = background();
        let result = background.auth_headers().build();
        assert_eq!(result.unwrap_err(), SessionError::NoValidSession);
    }

    #[tokio::test]
    async fn test_capture_then_forbidden() {
        let (background, _sink) = background();

        background.handle_event(bearer("abc123")).await;
        let status = background.session_status();
        assert!(status.is_valid);
        assert!(status.has_bearer_token);

        let headers = background.auth_headers().build().unwrap();
        assert_eq!(headers.get("Authorization"), Some("Bearer abc123"));

        background.handle_event(response(403)).await;
        assert!(!background.session_status().is_valid);
        assert!(background.auth_headers().build().is_err());
    }

    #[tokio::test]
    async fn test_badge_follows_session() {
        let (background, sink) = background();
        background
            .tracker()
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        background.handle_event(bearer("abc123")).await;
        assert_eq!(sink.applied.lock().last().unwrap().1.text, "✓");

        background.handle_event(response(401)).await;
        assert_eq!(sink.applied.lock().last().unwrap().1.text, "!");
    }

    #[tokio::test]
    async fn test_navigation_clears_meeting() {
        let (background, _sink) = background();
        background
            .tracker()
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        background
            .handle_event(BackgroundEvent::TabNavigated {
                tab_id: 7,
                url: "https://www.example.com/".to_string(),
            })
            .await;
        assert!(background.tracker().meeting_info().is_none());
    }

    #[tokio::test]
    async fn test_cookies_event_feeds_capture() {
        let (background, _sink) = background();
        background
            .handle_event(BackgroundEvent::Cookies {
                domain: "contoso.sharepoint.com".to_string(),
                cookies: vec![
                    Cookie::new("FedAuth", "f", "contoso.sharepoint.com"),
                    Cookie::new("rtFa", "r", ".sharepoint.com"),
                ],
            })
            .await;

        background.handle_event(bearer("abc123")).await;
        let headers = background.auth_headers().build().unwrap();
        assert_eq!(headers.get("cookie"), Some("FedAuth=f; rtFa=r"));
    }

    #[tokio::test]
    async fn test_lifecycle_resets_everything() {
        let (background, _sink) = background();
        background.handle_event(bearer("abc123")).await;
        background
            .tracker()
            .on_meeting_detected(MeetingDetails::titled("Standup"), 7)
            .unwrap();

        background.on_lifecycle(LifecycleEvent::Installed {
            reason: InstallReason::Update,
        });

        assert!(!background.session_status().is_valid);
        assert!(background.tracker().meeting_info().is_none());
        assert!(background.cookie_jar().is_empty());
    }

    #[tokio::test]
    async fn test_run_answers_every_message() {
        let (background, _sink) = background();
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(background.run(rx));

        tx.send(bearer("abc123")).await.unwrap();

        let mut replies = Vec::new();
        for payload in [
            json!({"action": "meetingDetected", "data": {"title": "Standup"}}),
            json!({"action": "getMeetingInfo"}),
            json!({"action": "bogus"}),
        ] {
            let (reply, response) = oneshot::channel();
            tx.send(BackgroundEvent::Message {
                payload,
                sender: MessageSender::tab(7),
                reply,
            })
            .await
            .unwrap();
            replies.push(response);
        }

        let mut results = Vec::new();
        for response in replies {
            results.push(response.await.unwrap());
        }
        assert!(results[0].success);
        assert_eq!(results[1].data.as_ref().unwrap()["tabId"], 7);
        assert!(!results[2].success);

        drop(tx);
        handle.await.unwrap();
    }

    fn message(
        payload: Value,
        sender: MessageSender,
    ) -> (BackgroundEvent, oneshot::Receiver<CommandResult<Value>>) {
        let (reply, response) = oneshot::channel();
        let event = BackgroundEvent::Message {
            payload,
            sender,
            reply,
        };
        (event, response)
    }

    fn sharepoint_cookies() -> BackgroundEvent {
        BackgroundEvent::Cookies {
            domain: "contoso.sharepoint.com".to_string(),
            cookies: vec![Cookie::new("FedAuth", "f", "contoso.sharepoint.com")],
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_auth_failure_wins_over_earlier_capture() {
        for i in 0..200 {
            let (background, _sink) = background();
            let session = background.session_view();
            let (tx, rx) = mpsc::channel(16);
            let handle = tokio::spawn(background.run(rx));

            tx.send(sharepoint_cookies()).await.unwrap();
            tx.send(bearer(&format!("tok{}", i))).await.unwrap();
            tx.send(response(403)).await.unwrap();
            drop(tx);
            handle.await.unwrap();

            let status = session.status();
            assert!(!status.is_valid, "run {} left the session valid", i);
            assert!(!status.has_cookies, "run {} kept cookies", i);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_keeps_session_and_badges_in_order() {
        let (background, sink) = background();
        let session = background.session_view();
        let tracker = background.tracker().clone();
        let (tx, rx) = mpsc::channel(32);
        let handle = tokio::spawn(background.run(rx));

        tx.send(sharepoint_cookies()).await.unwrap();
        tx.send(bearer("abc123")).await.unwrap();

        let (event, detected_first) = message(
            json!({"action": "meetingDetected", "data": {"title": "First"}}),
            MessageSender::tab(7),
        );
        tx.send(event).await.unwrap();
        let (event, detected_second) = message(
            json!({"action": "meetingDetected", "data": {"title": "Second"}}),
            MessageSender::tab(9),
        );
        tx.send(event).await.unwrap();

        tx.send(response(401)).await.unwrap();
        tx.send(bearer("def456")).await.unwrap();
        let (event, cleared) = message(json!({"action": "clearSession"}), MessageSender::popup());
        tx.send(event).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            detected_first.await.unwrap().data.unwrap()["state"],
            "meetingDetectedWithSession"
        );
        assert!(detected_second.await.unwrap().success);
        assert_eq!(cleared.await.unwrap().data.unwrap()["isValid"], false);

        let status = session.status();
        assert!(!status.is_valid);
        assert!(!status.has_cookies);

        let info = tracker.meeting_info().unwrap();
        assert_eq!(info.tab_id, 9);

        let applied = sink.applied.lock();
        let last_for = |tab: TabId| {
            applied
                .iter()
                .rev()
                .find(|(t, _)| *t == tab)
                .map(|(_, b)| b.text.clone())
        };
        assert_eq!(last_for(7).as_deref(), Some(""));
        assert_eq!(last_for(9).as_deref(), Some("!"));
    }

    #[test]
    fn test_lifecycle_event_wire_format() {
        let event: LifecycleEvent =
            serde_json::from_value(json!({"kind": "installed", "reason": "update"})).unwrap();
        assert_eq!(
            event,
            LifecycleEvent::Installed {
                reason: InstallReason::Update
            }
        );

        let event: LifecycleEvent = serde_json::from_value(json!({"kind": "startup"})).unwrap();
        assert_eq!(event, LifecycleEvent::Startup);
    }
}
