use std::future::Future;
use std::io;
use std::net::SocketAddr;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn, Instrument};

use crate::error::ProtocolError;
use crate::message::Message;

const READ_BUFFER_SIZE: usize = 10 * 1024;

/// Completed messages waiting for the dispatch loop.
const INBOUND_QUEUE_SIZE: usize = 64;

/// Logic plugged into a [`MessageServer`].
///
/// Calls are serialized: the server owns the handler and awaits each call
/// before dispatching the next completed message, so implementations can keep
/// plain mutable state.
pub trait MessageHandler: Send + 'static {
    /// Identifies the server in log output.
    fn name(&self) -> &str;

    /// Handles one complete inbound frame. A returned message is written back
    /// on the same connection before it is closed.
    fn handle(
        &mut self,
        from: SocketAddr,
        frame: Bytes,
    ) -> impl Future<Output = Result<Option<Message>>> + Send;
}

/// Accumulation buffer for one connection.
struct TransferState {
    buffer: BytesMut,
}

impl TransferState {
    fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }
}

struct Inbound {
    from: SocketAddr,
    frame: Bytes,
    reply: oneshot::Sender<Option<Message>>,
}

/// Accepts connections on one port and turns each of them into exactly one
/// message, delimited by the remote end half-closing.
pub struct MessageServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl MessageServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until a shutdown signal arrives or every shutdown sender is dropped.
    ///
    /// Connections are accepted and read on their own tasks, so a handler busy
    /// with outbound I/O does not stop this port from taking in new messages.
    pub async fn run<H: MessageHandler>(
        self,
        mut handler: H,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let span = tracing::info_span!("server", name = handler.name(), addr = %self.local_addr);
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Inbound>(INBOUND_QUEUE_SIZE);

        async move {
            info!("Listening on {}", self.local_addr);
            let acceptor = tokio::spawn(accept_loop(self.listener, inbound_tx).in_current_span());

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        debug!("Received shutdown signal");
                        break;
                    }

                    inbound = inbound_rx.recv() => match inbound {
                        Some(inbound) => dispatch(&mut handler, inbound).await,
                        None => {
                            warn!("Accept loop ended unexpectedly");
                            break;
                        }
                    },
                }
            }

            // Dropping the accept loop aborts its connection tasks too
            acceptor.abort();
            info!("Stopped");
        }
        .instrument(span)
        .await;

        Ok(())
    }
}

/// Accepts connections and spawns one reader per connection. Runs until aborted.
async fn accept_loop(listener: TcpListener, inbound_tx: mpsc::Sender<Inbound>) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, from)) => {
                        debug!("Accepted connection from {}", from);
                        connections.spawn(
                            read_message(stream, from, inbound_tx.clone()).in_current_span(),
                        );
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                }
            }

            Some(joined) = connections.join_next() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        warn!("Connection task panicked: {}", e);
                    }
                }
            }
        }
    }
}

async fn dispatch<H: MessageHandler>(handler: &mut H, inbound: Inbound) {
    let Inbound { from, frame, reply } = inbound;

    let response = match handler.handle(from, frame).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to handle message from {}: {:#}", from, e);
            None
        }
    };

    // The connection may already be gone, nothing to do then
    let _ = reply.send(response);
}

/// Reads until the remote half-closes, hands the frame to the dispatch loop
/// and writes back whatever the handler answered.
async fn read_message(mut stream: TcpStream, from: SocketAddr, inbound_tx: mpsc::Sender<Inbound>) {
    let mut state = TransferState::new();

    loop {
        state.buffer.reserve(READ_BUFFER_SIZE);
        match stream.read_buf(&mut state.buffer).await {
            Ok(0) => break,
            Ok(read) => trace!(
                "Received {} bytes from {}, {} buffered",
                read,
                from,
                state.buffer.len()
            ),
            // Indistinguishable from a clean close, the handler gets what arrived
            Err(e) => {
                debug!("Read from {} failed, treating as end of message: {}", from, e);
                break;
            }
        }
    }

    debug!("Message complete from {} ({} bytes)", from, state.buffer.len());

    let (reply_tx, reply_rx) = oneshot::channel();
    let inbound = Inbound {
        from,
        frame: state.buffer.freeze(),
        reply: reply_tx,
    };
    if inbound_tx.send(inbound).await.is_err() {
        return;
    }

    let Ok(Some(response)) = reply_rx.await else {
        return;
    };

    if let Err(e) = write_response(&mut stream, &response).await {
        warn!("Failed to send {} response to {}: {}", response.command, from, e);
    }
}

async fn write_response(stream: &mut TcpStream, response: &Message) -> io::Result<()> {
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await
}

/// Decodes a frame for a handler. Malformed frames and unknown commands are
/// logged and yield `None`; the caller answers nothing and the connection closes.
pub fn parse_inbound(from: SocketAddr, frame: Bytes) -> Option<Message> {
    match Message::parse(frame) {
        Ok(message) => Some(message),
        Err(ProtocolError::UnknownCommand(header)) => {
            warn!("Unknown command {:?} from {}", header, from);
            None
        }
        Err(e) => {
            debug!("Dropping frame from {}: {}", from, e);
            None
        }
    }
}
