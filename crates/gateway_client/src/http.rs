//! Production transport: unary calls as JSON over HTTP, subscriptions and the
//! CAD upload as JSON text frames over websockets.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::protocol::{GatewayRequest, GatewayResponse, StreamPayload, UploadCadChunk};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::transport::{
    GatewayTransport, PayloadStream, TransportError, TransportFactory, UploadStream,
};

const PROBE_TIMEOUT: Duration = Duration::from_millis(400);

pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(&self, address: &str) -> Result<Arc<dyn GatewayTransport>, TransportError> {
        Ok(Arc::new(HttpGatewayTransport::new(address)?))
    }
}

pub struct HttpGatewayTransport {
    http: reqwest::Client,
    base_url: String,
    ws_base: String,
}

impl HttpGatewayTransport {
    pub fn new(address: &str) -> Result<Self, TransportError> {
        Url::parse(address)
            .map_err(|err| TransportError::Protocol(format!("invalid gateway address: {err}")))?;
        let base_url = address.trim_end_matches('/').to_string();
        let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(TransportError::Protocol(format!(
                "gateway address must start with http:// or https://: {address}"
            )));
        };
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            ws_base,
        })
    }
}

fn from_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Unavailable(err.to_string())
    } else if err.is_timeout() {
        TransportError::Internal(format!("request timed out: {err}"))
    } else {
        TransportError::Internal(err.to_string())
    }
}

fn from_ws(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::Internal(err.to_string())
}

#[async_trait]
impl GatewayTransport for HttpGatewayTransport {
    async fn probe(&self) -> bool {
        self.http
            .get(format!("{}/healthz", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    async fn unary(&self, request: GatewayRequest) -> Result<GatewayResponse, TransportError> {
        let response = self
            .http
            .post(format!("{}/rpc", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(from_reqwest)?
            .error_for_status()
            .map_err(from_reqwest)?;
        response
            .json::<GatewayResponse>()
            .await
            .map_err(|err| TransportError::Protocol(format!("invalid gateway response: {err}")))
    }

    async fn server_stream(&self, request: GatewayRequest) -> Result<PayloadStream, TransportError> {
        let (ws, _) = connect_async(format!("{}/stream", self.ws_base))
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        let (mut write, read) = ws.split();
        let open = serde_json::to_string(&request)
            .map_err(|err| TransportError::Protocol(err.to_string()))?;
        write.send(Message::Text(open)).await.map_err(from_ws)?;

        // The write half rides along in the unfold state so the socket stays
        // open for the lifetime of the stream; dropping the stream closes it.
        Ok(Box::pin(futures::stream::unfold(
            (write, read),
            |(write, mut read)| async move {
                loop {
                    match read.next().await {
                        None => return None,
                        Some(Ok(Message::Text(text))) => {
                            let item = serde_json::from_str::<StreamPayload>(&text).map_err(|err| {
                                TransportError::Protocol(format!("invalid stream payload: {err}"))
                            });
                            return Some((item, (write, read)));
                        }
                        Some(Ok(Message::Close(_))) => return None,
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return Some((Err(from_ws(err)), (write, read))),
                    }
                }
            },
        )))
    }

    async fn open_upload(&self) -> Result<Box<dyn UploadStream>, TransportError> {
        let (ws, _) = connect_async(format!("{}/upload", self.ws_base))
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        Ok(Box::new(WsUploadStream { ws }))
    }
}

struct WsUploadStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl UploadStream for WsUploadStream {
    async fn write_chunk(&mut self, chunk: UploadCadChunk) -> Result<(), TransportError> {
        let text =
            serde_json::to_string(&chunk).map_err(|err| TransportError::Protocol(err.to_string()))?;
        self.ws.send(Message::Text(text)).await.map_err(from_ws)
    }

    async fn finish(mut self: Box<Self>) -> Result<GatewayResponse, TransportError> {
        loop {
            match self.ws.next().await {
                None | Some(Ok(Message::Close(_))) => {
                    return Err(TransportError::Internal(
                        "upload stream closed before acknowledgement".into(),
                    ))
                }
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<GatewayResponse>(&text).map_err(|err| {
                        TransportError::Protocol(format!("invalid upload acknowledgement: {err}"))
                    })
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(from_ws(err)),
            }
        }
    }
}
