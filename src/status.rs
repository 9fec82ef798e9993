// ABOUTME: Status events streamed from a deploy to whoever triggered it.
// ABOUTME: Events are ordered, append-only and carried over an unbounded channel.

use crate::launch::DeploymentRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Verbose,
    Error,
    Debug,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub message: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Vec<DeploymentRecord>>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            data: None,
            log: None,
            deployments: None,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn verbose(message: impl Into<String>) -> Self {
        Self::new(Level::Verbose, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Level::Debug, message)
    }

    pub fn with_log(mut self, log: Vec<String>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_deployments(mut self, deployments: Vec<DeploymentRecord>) -> Self {
        self.deployments = Some(deployments);
        self
    }

    /// Whether this event ends a deploy stream.
    pub fn is_terminal(&self) -> bool {
        self.deployments.is_some() || self.level == Level::Error
    }
}

/// Write side of a deploy's status stream.
///
/// Sends never fail: if the reader went away the event is dropped and the
/// deploy carries on.
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: StatusEvent) {
        match event.level {
            Level::Error => tracing::error!(message = %event.message, "deploy status"),
            Level::Info => tracing::info!(message = %event.message, "deploy status"),
            Level::Verbose | Level::Debug => {
                tracing::trace!(message = %event.message, "deploy status")
            }
        }
        if self.tx.send(event).is_err() {
            tracing::debug!("status receiver dropped");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(StatusEvent::info(message));
    }

    pub fn verbose(&self, message: impl Into<String>) {
        self.send(StatusEvent::verbose(message));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.send(StatusEvent::debug(message));
    }

    pub fn error(&self, message: impl Into<String>, log: Vec<String>) {
        self.send(StatusEvent::error(message).with_log(log));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_value(StatusEvent::verbose("step 1/3")).unwrap();
        assert_eq!(json["level"], "verbose");
        assert_eq!(json["message"], "step 1/3");
        assert!(json.get("log").is_none());
        assert!(json.get("deployments").is_none());
    }

    #[test]
    fn error_events_are_terminal() {
        assert!(StatusEvent::error("boom").is_terminal());
        assert!(!StatusEvent::info("ok").is_terminal());
        assert!(StatusEvent::info("done").with_deployments(vec![]).is_terminal());
    }

    #[tokio::test]
    async fn sink_preserves_order() {
        let (sink, mut rx) = StatusSink::channel();
        sink.info("one");
        sink.verbose("two");
        sink.error("three", vec!["log".to_string()]);
        drop(sink);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event.message);
        }
        assert_eq!(seen, ["one", "two", "three"]);
    }

    #[test]
    fn send_after_receiver_dropped_is_silent() {
        let (sink, rx) = StatusSink::channel();
        drop(rx);
        sink.info("nobody listening");
    }
}
