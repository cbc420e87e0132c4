//! In-memory gateway
//!
//! Every `connect` hands a [`ServerConnection`] to the test, which then plays
//! the gateway's side of the conversation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shardline_gateway::{
    GatewayConnection, GatewayFrame, GatewayTransport, Inbound, OpCode, TransportError,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Something the client sent
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Frame(GatewayFrame),
    Close(u16),
}

/// Gateway transport whose connections are driven by the test
pub struct MockGateway {
    accepted: mpsc::UnboundedSender<ServerConnection>,
    urls: Mutex<Vec<String>>,
    refuse: AtomicU32,
    panic_next: AtomicBool,
    stall_close: AtomicBool,
}

impl MockGateway {
    pub fn new() -> (Arc<Self>, GatewayServer) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let gateway = Arc::new(Self {
            accepted,
            urls: Mutex::new(Vec::new()),
            refuse: AtomicU32::new(0),
            panic_next: AtomicBool::new(false),
            stall_close: AtomicBool::new(false),
        });
        (gateway, GatewayServer { incoming })
    }

    /// URLs of every connection attempt so far
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Fail the next `count` connection attempts
    pub fn refuse_next(&self, count: u32) {
        self.refuse.store(count, Ordering::SeqCst);
    }

    /// Panic inside the next connection attempt
    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Connections opened from now on report their close frame and then
    /// never finish closing
    pub fn stall_closes(&self) {
        self.stall_close.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl GatewayTransport for MockGateway {
    async fn connect(&self, url: &str) -> Result<Box<dyn GatewayConnection>, TransportError> {
        self.urls.lock().push(url.to_string());
        assert!(
            !self.panic_next.swap(false, Ordering::SeqCst),
            "connect panicked on request"
        );

        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "refused".to_string(),
            });
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let server = ServerConnection {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.accepted
            .send(server)
            .map_err(|_| TransportError::Closed)?;
        Ok(Box::new(MockConnection {
            outbound,
            inbound,
            stall_close: self.stall_close.load(Ordering::SeqCst),
        }))
    }
}

struct MockConnection {
    outbound: mpsc::UnboundedSender<ClientFrame>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    stall_close: bool,
}

#[async_trait]
impl GatewayConnection for MockConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let frame = GatewayFrame::from_json(&text)
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        self.outbound
            .send(ClientFrame::Frame(frame))
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.outbound
            .send(ClientFrame::Close(code))
            .map_err(|_| TransportError::Closed)?;
        if self.stall_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Accepts the connections shards open
pub struct GatewayServer {
    incoming: mpsc::UnboundedReceiver<ServerConnection>,
}

impl GatewayServer {
    /// Next connection
    ///
    /// # Panics
    /// Panics if no connection arrives within a minute of virtual time
    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(Duration::from_secs(60), self.incoming.recv())
            .await
            .expect("no connection within 60s")
            .expect("gateway transport dropped")
    }

    /// Next connection, if one arrives within `wait`
    pub async fn try_accept(&mut self, wait: Duration) -> Option<ServerConnection> {
        tokio::time::timeout(wait, self.incoming.recv())
            .await
            .ok()
            .flatten()
    }
}

/// The gateway's end of one connection
pub struct ServerConnection {
    pub url: String,
    to_client: mpsc::UnboundedSender<Inbound>,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
}

impl ServerConnection {
    pub fn send(&self, frame: &GatewayFrame) {
        let text = frame.to_json().expect("frame encodes");
        let _ = self.to_client.send(Inbound::Text(text));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(Inbound::Text(text.to_string()));
    }

    pub fn hello(&self, interval_ms: u64) {
        self.send(&GatewayFrame::hello(interval_ms));
    }

    pub fn heartbeat_ack(&self) {
        self.send(&GatewayFrame::heartbeat_ack());
    }

    pub fn dispatch(&self, seq: u64, event_type: &str, data: Value) {
        self.send(&GatewayFrame::dispatch(event_type, seq, data));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.to_client.send(Inbound::Close {
            code: Some(code),
            reason: reason.to_string(),
        });
    }

    /// Next thing the client sent; `None` once the client dropped the connection
    pub async fn next(&mut self) -> Option<ClientFrame> {
        tokio::time::timeout(Duration::from_secs(600), self.from_client.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next frame with `op`, skipping heartbeats unless a heartbeat is wanted
    ///
    /// # Panics
    /// Panics if the client closes or drops the connection first
    pub async fn expect(&mut self, op: OpCode) -> GatewayFrame {
        loop {
            match self.next().await {
                Some(ClientFrame::Frame(frame)) if frame.op == op => return frame,
                Some(ClientFrame::Frame(frame)) if frame.op == OpCode::Heartbeat => {}
                Some(other) => panic!("expected {op:?}, got {other:?}"),
                None => panic!("expected {op:?}, connection dropped"),
            }
        }
    }

    /// Wait until the client drops the connection, returning any close code it sent
    pub async fn closed(&mut self) -> Option<u16> {
        let mut code = None;
        while let Some(frame) = self.next().await {
            if let ClientFrame::Close(sent) = frame {
                code = Some(sent);
            }
        }
        code
    }

    /// Answer Hello, accept the identify with READY, and return the shard id
    ///
    /// # Panics
    /// Panics if the client does not identify
    pub async fn handshake(&mut self, session_id: &str, heartbeat_interval_ms: u64, guild_ids: &[u64]) -> u32 {
        self.hello(heartbeat_interval_ms);
        let identify = self.expect(OpCode::Identify).await;
        let shard: [u32; 2] = serde_json::from_value(identify.d["shard"].clone()).expect("identify names its shard");
        self.dispatch(1, "READY", crate::fixtures::ready(session_id, shard, guild_ids, None));
        shard[0]
    }

    /// Answer heartbeats until the client drops the connection
    pub async fn keep_alive(mut self) {
        while let Some(frame) = self.next().await {
            if let ClientFrame::Frame(frame) = frame {
                if frame.op == OpCode::Heartbeat {
                    self.heartbeat_ack();
                }
            }
        }
    }
}
