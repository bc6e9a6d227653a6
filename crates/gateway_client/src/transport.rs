use std::{pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::Stream;
use shared::{
    error::RpcResult,
    protocol::{GatewayRequest, GatewayResponse, StreamPayload, UploadCadChunk},
};
use thiserror::Error;

/// Items delivered by a server-streamed subscription, in source order.
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<StreamPayload, TransportError>> + Send>>;

/// Transport-level failure, as opposed to an application-level result code
/// embedded in a successful exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
    /// The client's own cancellation token ended the operation. Never
    /// surfaced to the consumer.
    #[error("cancelled by client")]
    Cancelled,
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("transport failure: {0}")]
    Internal(String),
}

impl From<TransportError> for RpcResult {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable(message) => RpcResult::unavailable(message),
            other => RpcResult::internal(other.to_string()),
        }
    }
}

/// The write side of a client-streamed upload.
#[async_trait]
pub trait UploadStream: Send {
    async fn write_chunk(&mut self, chunk: UploadCadChunk) -> Result<(), TransportError>;

    /// Close the write side and wait for the gateway acknowledgement.
    async fn finish(self: Box<Self>) -> Result<GatewayResponse, TransportError>;
}

/// One established connection to the gateway.
///
/// The client core only depends on this seam; the production implementation
/// lives in [`crate::http`] and tests substitute fakes.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    /// Sample channel readiness. Implementations should treat the probe as a
    /// connect attempt when the channel is down.
    async fn probe(&self) -> bool;

    /// One request, one response.
    async fn unary(&self, request: GatewayRequest) -> Result<GatewayResponse, TransportError>;

    /// One request, many items delivered over time. Dropping the returned
    /// stream abandons the subscription.
    async fn server_stream(&self, request: GatewayRequest) -> Result<PayloadStream, TransportError>;

    /// Many chunks, one final response.
    async fn open_upload(&self) -> Result<Box<dyn UploadStream>, TransportError>;
}

/// Builds a transport for a gateway address; the seam through which tests
/// inject fake transports.
pub trait TransportFactory: Send + Sync {
    fn create(&self, address: &str) -> Result<Arc<dyn GatewayTransport>, TransportError>;
}
