//! Host channel transports.
//!
//! The coordinator talks to the host through [`HostChannel`]. Two
//! transports ship with the runtime: JSON lines over any async byte stream
//! (stdin/stdout for a child process) and an in-memory channel pair for
//! embedding the bridge in the host process.

use async_trait::async_trait;
use robopaint_core::{BridgeError, BridgeResult};
use robopaint_mode_api::IpcMessage;
use std::io::ErrorKind;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Bidirectional message channel to the host.
#[async_trait(?Send)]
pub trait HostChannel {
    /// Waits for the next inbound message. `None` means the host hung up.
    async fn recv(&mut self) -> BridgeResult<Option<IpcMessage>>;

    /// Sends a message to the host.
    async fn send(&mut self, message: IpcMessage) -> BridgeResult<()>;
}

/// One JSON message per line.
pub struct LineTransport<R, W> {
    lines: Lines<R>,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
        }
    }
}

impl LineTransport<BufReader<Stdin>, Stdout> {
    /// Reads from stdin and writes to stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

#[async_trait(?Send)]
impl<R, W> HostChannel for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn recv(&mut self) -> BridgeResult<Option<IpcMessage>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    warn!(error = %e, "Skipping undecodable inbound line");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<IpcMessage>(line) {
                Ok(message) => {
                    trace!(channel = %message.channel, "Inbound message");
                    return Ok(Some(message));
                }
                Err(e) => warn!(error = %e, "Skipping unparsable inbound line"),
            }
        }
    }

    async fn send(&mut self, message: IpcMessage) -> BridgeResult<()> {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        trace!(channel = %message.channel, "Outbound message");
        Ok(())
    }
}

/// In-memory transport, the mode side of [`channel_pair`].
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<IpcMessage>,
    outbound: mpsc::UnboundedSender<IpcMessage>,
}

/// The host side of [`channel_pair`].
#[derive(Debug)]
pub struct HostEndpoint {
    /// Messages for the mode.
    pub inbound: mpsc::UnboundedSender<IpcMessage>,
    /// Messages from the mode.
    pub outbound: mpsc::UnboundedReceiver<IpcMessage>,
}

/// Creates a connected in-memory transport and host endpoint.
#[must_use]
pub fn channel_pair() -> (ChannelTransport, HostEndpoint) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            inbound: inbound_rx,
            outbound: outbound_tx,
        },
        HostEndpoint {
            inbound: inbound_tx,
            outbound: outbound_rx,
        },
    )
}

#[async_trait(?Send)]
impl HostChannel for ChannelTransport {
    async fn recv(&mut self) -> BridgeResult<Option<IpcMessage>> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, message: IpcMessage) -> BridgeResult<()> {
        self.outbound
            .send(message)
            .map_err(|e| BridgeError::ChannelClosed(e.0.channel))
    }
}
