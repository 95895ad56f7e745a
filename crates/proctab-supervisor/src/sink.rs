//! Output sinks: where human-readable progress for the orchestrator goes.
//!
//! A sink may not be able to accept output (a replayed preview, a client
//! that already went away). Every method has a no-op default, and callers
//! forward through [`forward`] / [`forward_preview`], which log and swallow
//! delivery failures instead of failing the operation that produced them.

use std::sync::{Arc, Mutex};

use proctab_core::PreviewDescription;
use tokio::sync::mpsc;
use tracing::debug;

/// The sink could not take the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("output sink unavailable")]
pub struct SinkUnavailable;

/// Receiver of launch progress and preview descriptions.
pub trait OutputSink: Send + Sync {
    /// A line of progress output.
    fn stdout(&self, _line: &str) -> Result<(), SinkUnavailable> {
        Ok(())
    }

    /// What a preview-mode start would run.
    fn preview(&self, _preview: &PreviewDescription) -> Result<(), SinkUnavailable> {
        Ok(())
    }
}

/// Sink that accepts and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {}

/// Best-effort delivery of a progress line.
pub fn forward(sink: &dyn OutputSink, line: &str) {
    if let Err(e) = sink.stdout(line) {
        debug!(error = %e, line, "Dropping sink output");
    }
}

/// Best-effort delivery of a preview description.
pub fn forward_preview(sink: &dyn OutputSink, preview: &PreviewDescription) {
    if let Err(e) = sink.preview(preview) {
        debug!(error = %e, cmd = %preview.command, "Dropping preview output");
    }
}

/// Messages delivered through a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessage {
    Stdout(String),
    Preview(PreviewDescription),
}

/// Sink backed by an unbounded tokio channel.
///
/// Reports [`SinkUnavailable`] once the receiving half is dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutputSink for ChannelSink {
    fn stdout(&self, line: &str) -> Result<(), SinkUnavailable> {
        self.tx
            .send(SinkMessage::Stdout(line.to_string()))
            .map_err(|_| SinkUnavailable)
    }

    fn preview(&self, preview: &PreviewDescription) -> Result<(), SinkUnavailable> {
        self.tx
            .send(SinkMessage::Preview(preview.clone()))
            .map_err(|_| SinkUnavailable)
    }
}

/// Sink that keeps everything in memory, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<SinkMessage>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    pub fn messages(&self) -> Vec<SinkMessage> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Only the progress lines.
    pub fn lines(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::Stdout(line) => Some(line),
                SinkMessage::Preview(_) => None,
            })
            .collect()
    }

    /// Only the preview descriptions.
    pub fn previews(&self) -> Vec<PreviewDescription> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::Preview(p) => Some(p),
                SinkMessage::Stdout(_) => None,
            })
            .collect()
    }

    fn push(&self, message: SinkMessage) -> Result<(), SinkUnavailable> {
        let mut guard = self.messages.lock().map_err(|_| SinkUnavailable)?;
        guard.push(message);
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn stdout(&self, line: &str) -> Result<(), SinkUnavailable> {
        self.push(SinkMessage::Stdout(line.to_string()))
    }

    fn preview(&self, preview: &PreviewDescription) -> Result<(), SinkUnavailable> {
        self.push(SinkMessage::Preview(preview.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn forward_swallows_closed_channel() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert_eq!(sink.stdout("hello"), Err(SinkUnavailable));
        forward(&sink, "hello");
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        forward(&sink, "starting");
        forward_preview(
            &sink,
            &PreviewDescription {
                command: "node app.js".into(),
                host: "localhost".into(),
            },
        );

        assert_eq!(
            rx.recv().await.unwrap(),
            SinkMessage::Stdout("starting".into())
        );
        assert!(matches!(rx.recv().await.unwrap(), SinkMessage::Preview(p) if p.command == "node app.js"));
    }

    #[test]
    fn null_sink_accepts_everything() {
        assert!(NullSink.stdout("anything").is_ok());
    }

    #[test]
    fn memory_sink_splits_lines_and_previews() {
        let sink = MemorySink::new();
        forward(&sink, "starting");
        forward_preview(
            &sink,
            &PreviewDescription {
                command: "run".into(),
                host: "localhost".into(),
            },
        );
        assert_eq!(sink.lines(), vec!["starting".to_string()]);
        assert_eq!(sink.previews().len(), 1);
    }
}
