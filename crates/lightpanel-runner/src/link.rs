//! Serial link to the panel.
//!
//! The link owns the write half of the serial stream and a reader task that
//! splits inbound bytes into lines with [`LineCodec`] and forwards them to the
//! panel actor as [`LinkEvent`]s. The link never interprets lines; all
//! protocol decisions are made by the state machine inside the actor.

use std::time::Duration;

use lightpanel_protocol::LineCodec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPort, SerialPortBuilderExt};
use tracing::{debug, info, trace, warn};

use crate::config::LinkTarget;
use crate::error::LinkError;

/// Capacity of the inbound line channel.
const LINK_EVENT_CAPACITY: usize = 256;

/// Read buffer size for the reader task.
const READ_BUFFER_SIZE: usize = 1024;

/// Timeout for serial reads and writes.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// A byte stream the link can run over.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkStream for T {}

type BoxedStream = Box<dyn LinkStream>;

/// Notifications from the link's reader task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete line arrived from the panel.
    Line(String),
    /// The stream reached end-of-file or failed.
    Closed {
        /// Which open of the link this refers to.
        generation: u64,
    },
}

/// The serial link and its open/closed state.
pub struct Link {
    target: Option<LinkTarget>,
    writer: Option<WriteHalf<BoxedStream>>,
    reader: Option<JoinHandle<()>>,
    events: mpsc::Sender<LinkEvent>,
    generation: u64,
}

impl Link {
    /// Create a closed link and the receiver for its events.
    ///
    /// With `target` set to `None` the link can only be used through
    /// [`Link::attach`].
    pub fn new(target: Option<LinkTarget>) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (events, receiver) = mpsc::channel(LINK_EVENT_CAPACITY);
        let link = Link {
            target,
            writer: None,
            reader: None,
            events,
            generation: 0,
        };
        (link, receiver)
    }

    /// Whether the link is currently open.
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Generation counter, incremented on every open.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open the configured target. Does nothing if already open.
    pub async fn open(&mut self) -> Result<(), LinkError> {
        if self.is_open() {
            return Ok(());
        }

        let stream: BoxedStream = match &self.target {
            None => return Err(LinkError::NoTarget),
            Some(LinkTarget::Serial { path, baud_rate }) => {
                let port = tokio_serial::new(path, *baud_rate)
                    .timeout(SERIAL_TIMEOUT)
                    .open_native_async()
                    .map_err(|source| LinkError::Serial {
                        path: path.clone(),
                        source,
                    })?;
                // Discard whatever the panel sent while nobody was listening
                if let Err(e) = port.clear(tokio_serial::ClearBuffer::All) {
                    warn!("failed to flush serial buffers on {}: {}", path, e);
                }
                Box::new(port)
            }
            Some(LinkTarget::Tcp { addr }) => {
                let stream = TcpStream::connect(addr).await.map_err(|source| LinkError::Tcp {
                    addr: addr.clone(),
                    source,
                })?;
                Box::new(stream)
            }
        };

        if let Some(target) = &self.target {
            info!("serial link opened: {}", target);
        }
        self.attach(stream);
        Ok(())
    }

    /// Run the link over an already-open stream.
    pub fn attach<S: LinkStream + 'static>(&mut self, stream: S) {
        self.close();

        let boxed: BoxedStream = Box::new(stream);
        let (reader, writer) = tokio::io::split(boxed);

        self.generation += 1;
        self.writer = Some(writer);
        self.reader = Some(tokio::spawn(read_lines(
            reader,
            self.events.clone(),
            self.generation,
        )));
    }

    /// Write one line, appending the terminator.
    ///
    /// A closed link is opened on demand. A failed write closes the link.
    pub async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.is_open() {
            warn!("sending '{}' on a closed serial link, opening on demand", line);
            self.open().await?;
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(LinkError::NoTarget);
        };

        trace!("link TX: {}", line);
        let data = LineCodec::encode_line(line);
        let result = async {
            writer.write_all(&data).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            self.close();
            return Err(LinkError::Write(e));
        }
        Ok(())
    }

    /// Close the link. Does nothing if already closed.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.writer.take().is_some() {
            info!("serial link closed");
        }
    }

    /// Handle a [`LinkEvent::Closed`] from the reader task.
    ///
    /// Returns `true` if it referred to the current open and the link is now
    /// closed, `false` if it was stale.
    pub fn reader_closed(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.is_open() {
            return false;
        }
        self.reader = None;
        self.writer = None;
        true
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Reader task: decode lines and forward them until the stream ends.
async fn read_lines<R: AsyncRead + Unpin>(
    mut reader: R,
    events: mpsc::Sender<LinkEvent>,
    generation: u64,
) {
    let mut codec = LineCodec::new();
    let mut read_buf = [0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut read_buf).await {
            Ok(0) => {
                debug!("serial link reached end of stream");
                break;
            }
            Ok(n) => {
                codec.push(&read_buf[..n]);
                while let Some(line) = codec.decode_line() {
                    trace!("link RX: {}", line);
                    if events.send(LinkEvent::Line(line)).await.is_err() {
                        // Actor has gone away
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("serial link read error: {}", e);
                break;
            }
        }
    }

    let _ = events.send(LinkEvent::Closed { generation }).await;
}
