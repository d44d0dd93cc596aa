// TCP client for connecting to the presence hub.
//
// Provides a non-blocking interface for a frontend's main loop to talk to
// the hub. Architecture:
// - `connect()` performs TCP connect + the `Welcome` handshake on the calling
//   thread, then spawns a background reader thread.
// - The reader thread calls `read_message()` in a loop, deserializes
//   `ServerMessage`, and pushes into an `mpsc` channel.
// - The main thread holds a `BufWriter<TcpStream>` for sending.
// - `poll()` drains the inbox non-blocking, returning all queued messages.
//
// This separation ensures the main thread never blocks on network I/O. The
// reader thread handles the blocking reads, and the writer flushes
// synchronously (acceptable for the small messages we send).
//
// This module lives in the hub crate (not the view crate) because it has
// zero rendering dependencies — it's purely std TCP + protocol framing +
// mpsc. Living here makes it available to any frontend (including the
// integration tests) without pulling in view logic.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use beacon_protocol::framing::{read_message, write_message};
use beacon_protocol::message::{ClientMessage, RawFix, ServerMessage};
use beacon_protocol::types::SessionId;
use thiserror::Error;

/// Failures while connecting to or talking to the hub.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed server message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("expected Welcome, got {0:?}")]
    UnexpectedHandshake(ServerMessage),
}

/// TCP client for hub communication.
pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    session_id: SessionId,
}

impl NetClient {
    /// Connect to a hub, read the `Welcome` handshake, and spawn a reader
    /// thread. Returns the client with its assigned session id on success.
    pub fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;

        // Set a read timeout for the handshake.
        stream
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .ok();

        let reader_stream = stream.try_clone()?;
        let writer = BufWriter::new(stream);

        // The hub sends Welcome unprompted on accept.
        let mut reader = BufReader::new(reader_stream);
        let response_bytes = read_message(&mut reader)?;
        let response: ServerMessage = serde_json::from_slice(&response_bytes)?;

        let session_id = match response {
            ServerMessage::Welcome { session_id } => session_id,
            other => return Err(ClientError::UnexpectedHandshake(other)),
        };

        // Clear the read timeout for the long-lived reader loop.
        if let Ok(inner) = reader.get_ref().try_clone() {
            inner.set_read_timeout(None).ok();
        }

        // Spawn reader thread.
        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            reader_loop(reader, tx);
        });

        Ok(Self {
            writer,
            inbox: rx,
            _reader_thread: Some(reader_thread),
            session_id,
        })
    }

    /// The id the hub assigned to this connection.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Request a display-name change. The hub answers with a `UserInfo`
    /// broadcast, not a direct response.
    pub fn set_username(&mut self, name: &str) -> Result<(), ClientError> {
        send_msg(
            &mut self.writer,
            &ClientMessage::SetUsername { name: name.into() },
        )
    }

    /// Report one geolocation fix. The hub's answer (a `LocationAck`, plus
    /// the echoed broadcast on acceptance) arrives via `poll()`.
    pub fn send_location(&mut self, fix: RawFix) -> Result<(), ClientError> {
        send_msg(&mut self.writer, &ClientMessage::SendLocation { fix })
    }

    /// Send Goodbye and let the hub tear the session down.
    pub fn disconnect(&mut self) {
        let _ = send_msg(&mut self.writer, &ClientMessage::Goodbye);
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

/// Serialize a `ClientMessage` to JSON and write with length-delimited framing.
fn send_msg(writer: &mut BufWriter<TcpStream>, msg: &ClientMessage) -> Result<(), ClientError> {
    let json = serde_json::to_vec(msg)?;
    write_message(writer, &json)?;
    Ok(())
}

/// Reader thread: read framed messages in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    while let Ok(bytes) = read_message(&mut reader) {
        match serde_json::from_slice::<ServerMessage>(&bytes) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break; // Main thread dropped the receiver
                }
            }
            Err(_) => break, // Malformed message
        }
    }
}
