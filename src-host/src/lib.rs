//! MeetScribe native messaging host
//!
//! Bridges the extension's native port to the background core:
//! frames arrive on stdin, replies and badges leave on stdout, logs go to stderr.

mod badge;
mod frame;
mod protocol;

use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use meetscribe_core::{Background, BackgroundEvent, CommandResult, Config};

pub use badge::ChannelBadgeSink;
pub use frame::{read_frame, read_message, write_message, FrameError, MAX_FRAME_LEN};
pub use protocol::{InboundFrame, MessageId, OutboundFrame, PendingMessage, Routed};

pub async fn run() -> anyhow::Result<()> {
    meetscribe_core::init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    serve(config, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve one extension connection until `input` reaches EOF.
pub async fn serve<R, W>(config: Config, mut input: R, output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_frames(output, frames_rx));

    let badges = Arc::new(ChannelBadgeSink::new(frames_tx.clone()));
    let background = Background::new(&config, badges).context("Failed to initialize background")?;
    let (events_tx, events_rx) = mpsc::channel(config.event_queue_capacity);
    let background = tokio::spawn(background.run(events_rx));

    tracing::info!("MeetScribe host started");

    let result = read_frames(&mut input, &events_tx, &frames_tx).await;

    drop(events_tx);
    drop(frames_tx);
    background.await.context("Background task failed")?;
    writer.await.context("Writer task failed")??;

    tracing::info!("MeetScribe host stopped");
    result
}

async fn read_frames<R>(
    input: &mut R,
    events: &mpsc::Sender<BackgroundEvent>,
    frames: &UnboundedSender<OutboundFrame>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame: InboundFrame = match read_message(input).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!("Extension closed the port");
                return Ok(());
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "Skipped inbound frame");
                continue;
            }
            Err(e) => return Err(e).context("Failed to read from extension"),
        };

        tracing::trace!(kind = frame.kind(), "Inbound frame");

        let event = match frame.route() {
            Routed::Event(event) => event,
            Routed::Message(message) => {
                let (reply, response) = oneshot::channel();
                tokio::spawn(forward_reply(message.id, response, frames.clone()));
                BackgroundEvent::Message {
                    payload: message.payload,
                    sender: message.sender,
                    reply,
                }
            }
        };

        if events.send(event).await.is_err() {
            anyhow::bail!("Background stopped before the port closed");
        }
    }
}

async fn forward_reply(
    id: MessageId,
    response: oneshot::Receiver<CommandResult<serde_json::Value>>,
    frames: UnboundedSender<OutboundFrame>,
) {
    let response = response
        .await
        .unwrap_or_else(|_| CommandResult::err("Background unavailable".to_string()));

    if frames.send(OutboundFrame::Reply { id, response }).is_err() {
        tracing::debug!(id, "Reply dropped after writer shut down");
    }
}

async fn write_frames<W>(
    mut output: W,
    mut frames: UnboundedReceiver<OutboundFrame>,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        match write_message(&mut output, &frame).await {
            Ok(()) => {}
            Err(FrameError::TooLarge(len)) => {
                tracing::error!(len, "Dropped oversize outbound frame");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
