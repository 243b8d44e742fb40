//! A raw-socket WebSocket client for driving a real listener end to end,
//! mirroring the teacher's `MockWsClient` shape but speaking bare frames
//! instead of a JSON application protocol — this is the harness
//! `services/acceptor`'s integration tests connect with against a real
//! `TcpListener`, exercising the on-wire RFC 6455 path instead of the
//! in-memory [`crate::MockSession`] double.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct MockWsPeer {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl MockWsPeer {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(text.into())).await?;
        Ok(())
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Binary(data.into())).await?;
        Ok(())
    }

    pub async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Ping(payload.into())).await?;
        Ok(())
    }

    /// Waits for the next frame, transparently dropping nothing — callers
    /// that only care about application messages filter `Ping`/`Pong`
    /// themselves, the same way `MockWsClient::recv_message` does.
    pub async fn recv(&mut self) -> Option<Message> {
        self.read.next().await.and_then(Result::ok)
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}
