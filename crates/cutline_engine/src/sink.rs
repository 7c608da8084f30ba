use crate::compile::EngineInvocation;
use crate::supervisor::RunResult;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Receives everything a run reports, in order: the invocation, each output
/// line, then the terminal result.
pub trait ReportSink: Send {
    fn invocation(&mut self, invocation: &EngineInvocation);

    fn line(&mut self, line: &str);

    fn finished(&mut self, result: &RunResult);
}

/// A single report, as sent over a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Invocation { argv: Vec<String> },
    Line { text: String },
    Finished { result: RunResult },
}

/// Forwards reports to another task, e.g. a UI event loop.
///
/// Reports are dropped silently once the receiving side has gone away.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

impl ReportSink for ChannelSink {
    fn invocation(&mut self, invocation: &EngineInvocation) {
        self.send(RunEvent::Invocation {
            argv: invocation.argv(),
        });
    }

    fn line(&mut self, line: &str) {
        self.send(RunEvent::Line {
            text: line.to_string(),
        });
    }

    fn finished(&mut self, result: &RunResult) {
        self.send(RunEvent::Finished {
            result: result.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::RunOutcome;
    use std::time::Duration;

    #[test]
    fn channel_sink_preserves_order() {
        let (mut sink, mut rx) = ChannelSink::channel();
        let inv = EngineInvocation::new("ffmpeg", vec!["-version".into()]);
        let result = RunResult::new(RunOutcome::Succeeded, Duration::from_millis(5));

        sink.invocation(&inv);
        sink.line("a");
        sink.line("b");
        sink.finished(&result);

        assert_eq!(
            rx.try_recv().unwrap(),
            RunEvent::Invocation {
                argv: vec!["ffmpeg".into(), "-version".into()]
            }
        );
        assert_eq!(rx.try_recv().unwrap(), RunEvent::Line { text: "a".into() });
        assert_eq!(rx.try_recv().unwrap(), RunEvent::Line { text: "b".into() });
        assert_eq!(rx.try_recv().unwrap(), RunEvent::Finished { result });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_not_an_error() {
        let (mut sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.line("ignored");
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(RunEvent::Line { text: "x".into() }).unwrap();
        assert_eq!(json["event"], "line");
        assert_eq!(json["text"], "x");
    }
}
