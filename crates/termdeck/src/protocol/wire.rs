//! Line framing for the stdio bridge.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use termdeck_core::{Command, Error, Event, HostCommand, HostEvent, Result};
use termdeck_session::MessageSink;

/// One input line.
///
/// ```json
/// {"ui":{"type":"createSession","name":"Terminal 1"}}
/// {"host":{"type":"sessionRemoved","id":"a"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Inbound {
    /// Command from the UI
    Ui(Command),
    /// Event from the process host
    Host(HostEvent),
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Outbound {
    /// Notification for the UI
    Event(Event),
    /// Command for the process host
    Host(HostCommand),
}

impl Outbound {
    /// Encode as one JSON line, newline included.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Channel sink that hands host commands to the stdout writer.
#[derive(Debug, Clone)]
pub struct LineSink {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl LineSink {
    /// Sink paired with the receiver the writer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageSink<HostCommand> for LineSink {
    async fn deliver(&self, payload: &HostCommand) -> Result<()> {
        self.tx
            .send(Outbound::Host(payload.clone()))
            .map_err(|_| Error::SendFailure("output writer closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termdeck_core::SessionId;

    #[test]
    fn test_inbound_ui_line() {
        let line = r#"{"ui":{"type":"setActive","id":"a"}}"#;
        let inbound: Inbound = serde_json::from_str(line).unwrap();
        assert_eq!(
            inbound,
            Inbound::Ui(Command::SetActive {
                id: SessionId::from("a")
            })
        );
    }

    #[test]
    fn test_inbound_host_line() {
        let line = r#"{"host":{"type":"output","id":"a","data":"hi"}}"#;
        let inbound: Inbound = serde_json::from_str(line).unwrap();
        assert!(matches!(inbound, Inbound::Host(HostEvent::Output { .. })));
    }

    #[test]
    fn test_outbound_line() {
        let line = Outbound::Host(HostCommand::Kill {
            id: SessionId::from("a"),
        })
        .to_line()
        .unwrap();
        assert_eq!(line, "{\"host\":{\"type\":\"kill\",\"id\":\"a\"}}\n");
    }

    #[tokio::test]
    async fn test_line_sink_reports_closed_writer() {
        let (sink, rx) = LineSink::channel();
        let cmd = HostCommand::Kill {
            id: SessionId::from("a"),
        };
        sink.deliver(&cmd).await.unwrap();

        drop(rx);
        let result = sink.deliver(&cmd).await;
        assert!(matches!(result, Err(Error::SendFailure(_))));
    }
}
