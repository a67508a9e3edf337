use tokio::sync::mpsc;

use crate::stream::GenerationEvent;

/// Receives progress updates synchronously from the consume loop.
///
/// `message` is `Some` for `message:` records and `None` for bare
/// `progress:` records.
pub trait ProgressSink {
    fn on_progress(&mut self, percent: u8, message: Option<&str>);
}

impl<F> ProgressSink for F
where
    F: FnMut(u8, Option<&str>),
{
    fn on_progress(&mut self, percent: u8, message: Option<&str>) {
        self(percent, message)
    }
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&mut self, _percent: u8, _message: Option<&str>) {}
}

/// Forwards updates to a run's event channel.
///
/// A closed receiver is ignored; the consume loop keeps folding state.
pub(crate) struct ChannelSink {
    pub(crate) run_id: uuid::Uuid,
    pub(crate) tx: mpsc::UnboundedSender<GenerationEvent>,
}

impl ProgressSink for ChannelSink {
    fn on_progress(&mut self, percent: u8, message: Option<&str>) {
        let event = GenerationEvent::Progress {
            run_id: self.run_id,
            percent,
            message: message.map(ToOwned::to_owned),
        };
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |percent: u8, message: Option<&str>| {
                seen.push((percent, message.map(str::to_string)));
            };
            sink.on_progress(10, None);
            sink.on_progress(10, Some("hi"));
        }
        assert_eq!(seen, vec![(10, None), (10, Some("hi".to_string()))]);
    }

    #[test]
    fn channel_sink_forwards_in_order_and_survives_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink {
            run_id: uuid::Uuid::new_v4(),
            tx,
        };
        sink.on_progress(1, None);
        sink.on_progress(2, Some("two"));
        assert!(matches!(
            rx.try_recv(),
            Ok(GenerationEvent::Progress { percent: 1, message: None, .. })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(GenerationEvent::Progress { percent: 2, message: Some(ref m), .. }) if m == "two"
        ));
        drop(rx);
        sink.on_progress(3, None);
    }
}
