//! Consumer-facing event stream

use futures::Stream;
use shardline_core::ShardEvent;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Events of all shards, interleaved.
///
/// Events of one shard arrive in the order that shard dispatched them. The
/// queue is bounded: a shard whose events are not consumed stops reading its
/// connection until there is room again, but keeps heartbeating.
/// The stream ends once every shard has stopped.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<ShardEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::Receiver<ShardEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once all shards have stopped
    pub async fn recv(&mut self) -> Option<ShardEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ShardEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = ShardEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use shardline_core::Event;

    #[tokio::test]
    async fn test_stream_preserves_order_and_ends() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = EventStream::new(rx);

        tx.send(ShardEvent::new(0, Event::Resumed)).await.unwrap();
        tx.send(ShardEvent::new(1, Event::Resumed)).await.unwrap();
        drop(tx);

        let ids: Vec<u32> = stream.by_ref().map(|event| event.shard_id).collect().await;
        assert_eq!(ids, vec![0, 1]);
        assert!(stream.recv().await.is_none());
    }
}
