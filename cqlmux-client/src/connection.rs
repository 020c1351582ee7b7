//! Connection management.
//!
//! One TCP connection carries many concurrent queries. A background read
//! task routes incoming frames by stream id. A background write task owns
//! the write half and writes queued frames one at a time, each in full,
//! so a caller that gives up mid-write cannot leave half a frame on the
//! wire.

use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::framed::FrameReader;
use crate::streams::{StreamAllocator, StreamSlot};
use bytes::Bytes;
use cqlmux_protocol::{
    Consistency, Frame, Opcode, QueryBody, QueryResult, Response, ResultSet, ServerError,
    StartupBody,
};
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Frames that may wait for the write task before senders block.
const WRITE_QUEUE_DEPTH: usize = 128;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the TCP connection.
    Connecting,
    /// STARTUP sent, waiting for READY.
    AwaitingReady,
    /// Queries may be issued.
    Ready,
    /// Terminal. The socket is released and every mailbox has been failed.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::AwaitingReady => write!(f, "awaiting-ready"),
            ConnectionState::Ready => write!(f, "ready"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// One encoded frame queued for the write task.
struct Outbound {
    stream: i16,
    opcode: Opcode,
    bytes: Bytes,
    /// Completed once the frame is fully on the socket or has failed.
    done: oneshot::Sender<Result<(), ClientError>>,
}

/// State shared between the connection handle and its background tasks.
struct Shared {
    config: ConnectionConfig,
    streams: StreamAllocator,
    /// Queue into the write task; `None` once closed.
    outbound: parking_lot::Mutex<Option<mpsc::Sender<Outbound>>>,
    state: watch::Sender<ConnectionState>,
    /// First fatal error, reported by `connect` if it happens during the
    /// handshake.
    failure: parking_lot::Mutex<Option<ClientError>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    writer: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Moves to `next` unless already closed. Returns whether the state
    /// changed.
    fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Enters `Closed`, remembering `failure` if it is the first one, and
    /// fails every waiting mailbox. Returns the number of mailboxes failed.
    ///
    /// Dropping the queue sender lets the write task drain and exit.
    fn mark_closed(&self, failure: Option<ClientError>) -> usize {
        if let Some(err) = failure {
            let mut slot = self.failure.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.transition(ConnectionState::Closed);
        self.outbound.lock().take();
        self.streams.fail_all()
    }

    fn abort_reader(&self) {
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
    }

    /// Queues one frame for the write task and waits until it is on the
    /// socket.
    ///
    /// The slot is marked sent only once the frame is queued. From then on
    /// the write task finishes the frame even if this future is dropped.
    async fn write_frame(
        &self,
        frame: &Frame,
        slot: Option<&mut StreamSlot>,
    ) -> Result<(), ClientError> {
        let bytes = frame.encode()?.freeze();

        let outbound = self
            .outbound
            .lock()
            .clone()
            .ok_or(ClientError::ConnectionClosed)?;
        let permit = outbound
            .reserve()
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;

        if let Some(slot) = slot {
            slot.mark_sent();
        }
        let (done, written) = oneshot::channel();
        permit.send(Outbound {
            stream: frame.stream,
            opcode: frame.opcode,
            bytes,
            done,
        });
        drop(outbound);

        written.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    /// Routes one incoming frame. An error is fatal to the connection.
    fn dispatch(&self, frame: Frame) -> Result<(), ClientError> {
        if self.config.trace_frames {
            tracing::trace!(
                stream = frame.stream,
                opcode = %frame.opcode,
                len = frame.body.len(),
                "frame received"
            );
        }

        if frame.is_control() {
            return self.handle_control(frame);
        }

        let stream = frame.stream;
        let opcode = frame.opcode;
        if !self.streams.deliver(stream, frame) {
            tracing::warn!(
                "dropping {} for unknown or released stream {}",
                opcode,
                stream
            );
        }
        Ok(())
    }

    fn handle_control(&self, frame: Frame) -> Result<(), ClientError> {
        match frame.opcode {
            Opcode::Ready => {
                if self.state() == ConnectionState::AwaitingReady {
                    self.transition(ConnectionState::Ready);
                    tracing::debug!("READY received on stream {}", frame.stream);
                } else {
                    tracing::warn!("ignoring READY while {}", self.state());
                }
                Ok(())
            }
            Opcode::Error => {
                let err = ServerError::decode(frame.body)?;
                tracing::error!("server error on control stream {}: {}", frame.stream, err);
                Err(ClientError::Server(err))
            }
            Opcode::Authenticate => {
                tracing::error!("server requires authentication, which is not supported");
                Err(ClientError::ProtocolViolation(
                    "server requested AUTHENTICATE; authentication is not supported".to_string(),
                ))
            }
            other => {
                tracing::error!(
                    "protocol violation: unexpected {} on control stream {} while {}",
                    other,
                    frame.stream,
                    self.state()
                );
                Err(ClientError::ProtocolViolation(format!(
                    "unexpected {} on control stream {}",
                    other, frame.stream
                )))
            }
        }
    }
}

/// Reads and dispatches frames until EOF or a fatal error, then closes the
/// connection.
async fn read_loop(shared: Arc<Shared>, mut reader: FrameReader<OwnedReadHalf>) {
    tracing::debug!("read loop started");

    let outcome = loop {
        match reader.next_frame().await {
            Ok(Some(frame)) => {
                if let Err(e) = shared.dispatch(frame) {
                    break Err(e);
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    let failure = match outcome {
        Ok(()) => {
            tracing::debug!("read loop finished: server closed the connection");
            None
        }
        Err(e) => {
            tracing::error!("read loop finished: {}", e);
            Some(e)
        }
    };

    let failed = shared.mark_closed(failure);
    tracing::debug!("connection closed, {} pending failed", failed);
}

/// Writes queued frames in order until the queue closes or a write fails.
async fn write_loop(
    shared: Arc<Shared>,
    mut queue: mpsc::Receiver<Outbound>,
    mut writer: OwnedWriteHalf,
) {
    tracing::debug!("write loop started");

    while let Some(out) = queue.recv().await {
        if shared.state() == ConnectionState::Closed {
            let _ = out.done.send(Err(ClientError::ConnectionClosed));
            continue;
        }

        if let Err(e) = writer.write_all(&out.bytes).await {
            tracing::error!("write on stream {} failed: {}", out.stream, e);
            let reported = std::io::Error::new(e.kind(), e.to_string());
            let _ = out.done.send(Err(ClientError::Io(reported)));
            let failed = shared.mark_closed(Some(ClientError::Io(e)));
            shared.abort_reader();
            tracing::debug!("connection closed after write failure, {} pending failed", failed);
            break;
        }

        if shared.config.trace_frames {
            tracing::trace!(
                stream = out.stream,
                opcode = %out.opcode,
                len = out.bytes.len(),
                "frame sent"
            );
        }
        tracing::debug!(
            "sent {} on stream {} ({} bytes)",
            out.opcode,
            out.stream,
            out.bytes.len()
        );
        // The caller may have stopped waiting; the frame is complete either way.
        let _ = out.done.send(Ok(()));
    }

    let _ = writer.shutdown().await;
    tracing::debug!("write loop finished");
}

/// A multiplexed connection to a CQL server.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Connects to `host:port` with default settings.
    pub async fn connect_to(host: impl Into<String>, port: u16) -> Result<Self, ClientError> {
        Self::connect(ConnectionConfig::new(host, port)).await
    }

    /// Connects, performs the STARTUP handshake and waits for READY.
    ///
    /// Only `connect_timeout` and the optional `ready_timeout` bound this
    /// call.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let addr = config.addr();
        tracing::debug!("connecting to {}...", addr);

        let tcp_stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                tracing::debug!("connect to {} timed out", addr);
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::debug!("connect to {} failed: {}", addr, e);
                ClientError::Io(e)
            })?;

        tracing::debug!("TCP connected to {}", addr);
        tcp_stream.set_nodelay(true).ok();

        let (read_half, write_half) = tcp_stream.into_split();
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (outbound, queue) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let reader = FrameReader::new(read_half, config.read_buffer_size);

        let shared = Arc::new(Shared {
            config,
            streams: StreamAllocator::new(),
            outbound: parking_lot::Mutex::new(Some(outbound)),
            state,
            failure: parking_lot::Mutex::new(None),
            reader: parking_lot::Mutex::new(None),
            writer: parking_lot::Mutex::new(None),
        });

        let handle = tokio::spawn(read_loop(Arc::clone(&shared), reader));
        *shared.reader.lock() = Some(handle);
        let handle = tokio::spawn(write_loop(Arc::clone(&shared), queue, write_half));
        *shared.writer.lock() = Some(handle);

        let conn = Self { shared };
        conn.handshake().await?;
        Ok(conn)
    }

    async fn handshake(&self) -> Result<(), ClientError> {
        let config = &self.shared.config;
        let startup = StartupBody::new(config.cql_version.clone()).to_frame(config.protocol_version);

        self.shared.transition(ConnectionState::AwaitingReady);
        self.shared.write_frame(&startup, None).await?;
        tracing::debug!("STARTUP sent (CQL_VERSION {})", config.cql_version);

        let reached = match config.ready_timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_for_ready())
                .await
                .map_err(|_| {
                    tracing::debug!("no READY within {:?}", limit);
                    ClientError::Timeout
                })?,
            None => self.wait_for_ready().await,
        };

        if reached {
            tracing::debug!("connection ready");
            Ok(())
        } else {
            Err(self
                .shared
                .failure
                .lock()
                .take()
                .unwrap_or(ClientError::ConnectionClosed))
        }
    }

    /// Waits until the connection leaves the handshake. Returns `true` for
    /// `Ready`, `false` for `Closed`.
    async fn wait_for_ready(&self) -> bool {
        let mut rx = self.shared.state.subscribe();
        let outcome = rx
            .wait_for(|state| {
                matches!(state, ConnectionState::Ready | ConnectionState::Closed)
            })
            .await;
        match outcome {
            Ok(state) => *state == ConnectionState::Ready,
            Err(_) => false,
        }
    }

    /// Runs a query and returns whatever result kind the server sent.
    pub async fn execute(
        &self,
        query: &str,
        consistency: Consistency,
    ) -> Result<QueryResult, ClientError> {
        if !self.wait_for_ready().await {
            return Err(ClientError::ConnectionClosed);
        }

        let mut slot = self.shared.streams.acquire()?;
        let request = QueryBody::new(query, consistency)
            .to_frame(self.shared.config.protocol_version, slot.id());
        tracing::debug!("query on stream {}: {}", slot.id(), query);

        self.shared.write_frame(&request, Some(&mut slot)).await?;
        let frame = slot.recv().await?;

        match Response::from_frame(&frame)? {
            Response::Result(result) => Ok(result),
            Response::Error(err) => {
                tracing::debug!("stream {} failed: {}", frame.stream, err);
                Err(ClientError::Server(err))
            }
            Response::Ready => Err(ClientError::ProtocolViolation(format!(
                "READY on query stream {}",
                frame.stream
            ))),
        }
    }

    /// Runs a query and returns its rows. Result kinds without rows yield an
    /// empty result set.
    pub async fn query(
        &self,
        query: &str,
        consistency: Consistency,
    ) -> Result<ResultSet, ClientError> {
        Ok(self.execute(query, consistency).await?.into_rows())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Number of stream ids checked out, including ones parked for a late
    /// response.
    pub fn in_flight(&self) -> usize {
        self.shared.streams.in_flight()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Closes the connection. Pending queries fail with `ConnectionClosed`.
    /// Calling this more than once is harmless.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("closing connection...");

        let failed = self.shared.mark_closed(None);
        self.shared.abort_reader();

        // Queued frames are abandoned. Dropping the write half shuts the
        // socket down.
        let writer = self.shared.writer.lock().take();
        if let Some(handle) = writer {
            tracing::debug!("stopping writer");
            handle.abort();
            let _ = handle.await;
        }

        tracing::debug!("connection closed, {} pending failed", failed);
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.abort_reader();
        if let Some(handle) = self.shared.writer.lock().take() {
            handle.abort();
        }
        self.shared.mark_closed(None);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.shared.config.addr())
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
