//! WebSocket channel and server endpoint.
//!
//! The gateway runs its own WebSocket server and also connects to it as
//! a client, both to originate sends and to hold long-lived listening
//! connections. Before any payload crosses a connection, both sides run
//! the handshake sub-protocol: the connecting side sends its bare device
//! id until the server recognizes it and answers with the ack string;
//! only a session that saw the ack proceeds to payload exchange.

use crate::channel::{Channel, ChannelError, ChannelResult, MessageQueue};
use async_trait::async_trait;
use fieldlink_core::{encode_command, DeviceRegistry, EnvelopeSchema, Protocol, WebSocketSettings};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Prefix of the server's reply to every payload message.
pub const SERVER_REPLY_PREFIX: &str = "The server has received you message: ";

/// Handshake acknowledgement the server sends for a recognized device.
pub fn handshake_ack(device_id: &str) -> String {
    format!("{device_id} is already connected to the server")
}

/// The gateway's WebSocket server endpoint.
///
/// Answers every connection: handshake first, then an acknowledging
/// reply per payload message. Runs until the listener fails.
pub struct WebSocketServer {
    settings: WebSocketSettings,
    devices: Arc<DeviceRegistry>,
}

impl WebSocketServer {
    /// Create a server for the configured endpoint.
    pub fn new(settings: WebSocketSettings, devices: Arc<DeviceRegistry>) -> Self {
        Self { settings, devices }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> ChannelResult<TcpListener> {
        let addr = self.settings.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("websocket server listening on {addr}");
        Ok(listener)
    }

    /// Bind and serve forever.
    pub async fn run(&self) -> ChannelResult<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> ChannelResult<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let devices = self.devices.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, devices).await {
                    info!("websocket connection from {peer} ended: {e}");
                }
            });
        }
    }
}

/// Run one server-side connection: handshake, then payload echo loop.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    devices: Arc<DeviceRegistry>,
) -> ChannelResult<()> {
    let mut ws = accept_async(stream)
        .await
        .map_err(|e| ChannelError::Connection(e.to_string()))?;

    // Handshake phase: wait for a device id we know, ack it exactly
    // once. Unknown ids get no ack; the client keeps retrying.
    let device_id = loop {
        match ws.next().await {
            Some(Ok(Message::Text(candidate))) => {
                if devices.is_known(&candidate) {
                    ws.send(Message::Text(handshake_ack(&candidate)))
                        .await
                        .map_err(|e| ChannelError::Send(e.to_string()))?;
                    break candidate;
                }
                warn!("handshake attempt from unknown device id: {candidate}");
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ChannelError::Receive(e.to_string())),
        }
    };

    // Payload phase: acknowledge each message back to the sender.
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => {
                info!("server received message from {device_id}: {text}");
                ws.send(Message::Text(format!("{SERVER_REPLY_PREFIX}{text}")))
                    .await
                    .map_err(|e| ChannelError::Send(e.to_string()))?;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(ChannelError::Receive(e.to_string())),
        }
    }
    Ok(())
}

/// Client side of the handshake: send our id until the exact ack
/// string comes back.
async fn client_handshake<S>(ws: &mut WebSocketStream<S>, device_id: &str) -> ChannelResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ack = handshake_ack(device_id);
    loop {
        ws.send(Message::Text(device_id.to_string()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        match ws.next().await {
            Some(Ok(Message::Text(reply))) if reply == ack => return Ok(()),
            Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ChannelError::Receive(e.to_string())),
        }
    }
}

/// WebSocket transport channel (client role).
pub struct WebSocketChannel {
    settings: WebSocketSettings,
    schema: EnvelopeSchema,
    inbound: MessageQueue,
}

impl WebSocketChannel {
    /// Create a channel against the configured endpoint, feeding `inbound`.
    pub fn new(settings: WebSocketSettings, schema: EnvelopeSchema, inbound: MessageQueue) -> Self {
        Self {
            settings,
            schema,
            inbound,
        }
    }
}

#[async_trait]
impl Channel for WebSocketChannel {
    fn protocol(&self) -> Protocol {
        Protocol::WebSocket
    }

    fn inbound(&self) -> &MessageQueue {
        &self.inbound
    }

    async fn send(&self, command: &str, receiver: &str) -> ChannelResult<()> {
        let (mut ws, _) = connect_async(self.settings.url())
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        client_handshake(&mut ws, receiver).await?;

        let payload = encode_command(command, Protocol::WebSocket, receiver);
        ws.send(Message::Text(payload))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;

        match ws.next().await {
            Some(Ok(reply)) => info!("reply from server: {reply}"),
            Some(Err(e)) => warn!("no readable reply from server: {e}"),
            None => warn!("server closed before replying"),
        }

        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "exit".into(),
            }))
            .await;
        Ok(())
    }

    async fn receive(&self, device_id: &str) -> ChannelResult<()> {
        let (mut ws, _) = connect_async(self.settings.url())
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        client_handshake(&mut ws, device_id).await?;
        info!("websocket listener for {device_id} connected");

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => match self.schema.parse(&text) {
                    Ok(envelope) if envelope.sender == device_id => {
                        info!("websocket inbound queue newly adds: {text}");
                        self.inbound.push(text);
                    }
                    Ok(envelope) => {
                        debug!(
                            "ignoring envelope from {} while listening for {device_id}",
                            envelope.sender
                        );
                    }
                    Err(e) => error!("dropping malformed websocket message: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    // A closed connection ends this session; the
                    // supervisor starts the next one.
                    info!("websocket listener for {device_id} closed");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    info!("websocket listener for {device_id} ended: {e}");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_ack_format() {
        assert_eq!(
            handshake_ack("A"),
            "A is already connected to the server"
        );
    }

    #[test]
    fn test_server_reply_prefix() {
        // The reply string is part of the wire protocol and must not be
        // reworded.
        assert_eq!(SERVER_REPLY_PREFIX, "The server has received you message: ");
    }
}
