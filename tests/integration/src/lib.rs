//! Integration test utilities for shardline
//!
//! Scripted stand-ins for the gateway and the HTTP API, so scenario tests
//! can drive shards, the coordinator and the REST pipeline under paused time.

pub mod fixtures;
pub mod gateway;
pub mod http;

pub use fixtures::*;
pub use gateway::{ClientFrame, GatewayServer, MockGateway, ServerConnection};
pub use http::{global_rate_limit, json_response, limited_response, MockHttp, RecordedRequest};
