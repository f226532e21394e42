use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::error::ResponseError;
use crate::message::{Command, Message, MessageCodec};

/// Opens a connection, sends `message` and half-closes so the remote sees
/// the end of the frame.
async fn send_frame(addr: SocketAddr, message: Message) -> Result<Framed<TcpStream, MessageCodec>> {
    let tcp_stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    let mut frame = Framed::new(tcp_stream, MessageCodec);

    frame
        .send(message)
        .await
        .with_context(|| format!("Failed to send message to {}", addr))?;
    frame
        .get_mut()
        .shutdown()
        .await
        .context("Failed to half-close connection")?;

    Ok(frame)
}

/// Sends one message and waits for the single response frame, which ends
/// when the remote closes. `None` means the remote closed without answering.
#[instrument(skip(message), fields(command = %message.command))]
pub async fn request(addr: SocketAddr, message: Message) -> Result<Option<Message>> {
    let mut frame = send_frame(addr, message).await?;

    let response = frame
        .next()
        .await
        .transpose()
        .with_context(|| format!("Failed to read response from {}", addr))?;

    debug!(
        "Response from {}: {}",
        addr,
        response
            .as_ref()
            .map(|message| message.command.as_str())
            .unwrap_or("<none>")
    );
    Ok(response)
}

/// Sends one message that has no response on this connection.
#[instrument(skip(message), fields(command = %message.command))]
pub async fn send(addr: SocketAddr, message: Message) -> Result<()> {
    send_frame(addr, message).await?;
    Ok(())
}

/// Checks a response header, turning `error` into [`ResponseError::Rejected`].
pub fn expect_response(
    response: Option<Message>,
    expected: Command,
) -> Result<Message, ResponseError> {
    match response {
        Some(message) if message.command == expected => Ok(message),
        Some(message) if message.command == Command::Error => Err(ResponseError::Rejected(
            message.text().unwrap_or_default().trim().to_string(),
        )),
        Some(message) => Err(ResponseError::Unexpected(message.command)),
        None => Err(ResponseError::Missing),
    }
}
