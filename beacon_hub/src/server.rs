// TCP server and main event loop for the presence hub.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per client): call `framing::read_message()` in a
//   loop, deserialize `ClientMessage`, and send `InternalEvent::MessageFrom`
//   to the main thread. On error/EOF, send `InternalEvent::Disconnected`.
// - **Main thread**: owns the `Hub`, receives events from the channel, and
//   dispatches them one at a time to completion. This is the only dispatch
//   context — per-session ordering falls out of the reader threads sending
//   in wire order, and registry mutation needs no locking.
//
// The main thread is the only writer to client TCP streams (via
// `Hub::broadcast`/`send_to`). Reader threads only read from streams. This
// avoids concurrent read/write on the same `TcpStream`, which is safe on
// most platforms but fragile.
//
// Shutdown: the main thread checks a `keep_running` flag (set to false by
// `HubHandle::stop`) and breaks out of the event loop.

use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use beacon_protocol::framing::read_message;
use beacon_protocol::message::ClientMessage;
use beacon_protocol::types::SessionId;

use crate::hub::Hub;
use crate::registry::SessionRegistry;

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    MessageFrom {
        session_id: SessionId,
        message: ClientMessage,
    },
    Disconnected {
        session_id: SessionId,
    },
}

/// How long the main loop waits for an event before re-checking the
/// shutdown flag. There is no periodic work; this only bounds stop latency.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Handle returned by `start_hub` to control the running server.
pub struct HubHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HubHandle {
    /// Signal the hub to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a hub.
pub struct HubConfig {
    pub port: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Start the hub on a background thread. Returns a handle for stopping it
/// and the actual bound address (useful when port 0 is used to let the OS
/// pick a free port).
pub fn start_hub(config: HubConfig) -> std::io::Result<(HubHandle, std::net::SocketAddr)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let thread = thread::spawn(move || {
        run_hub(listener, keep_running_clone);
    });

    Ok((
        HubHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main hub loop. Runs until `keep_running` is set to false.
fn run_hub(listener: TcpListener, keep_running: Arc<AtomicBool>) {
    let mut hub = Hub::new(SessionRegistry::new());

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Set the listener to non-blocking so the accept thread can check
    // keep_running periodically.
    listener.set_nonblocking(true).ok();

    // Listener thread: accepts new connections.
    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(_) => break,
            }
        }
    });

    // Main event loop.
    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(event) => {
                handle_event(&mut hub, event, &tx, &keep_running);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut hub, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Nothing pending — loop back and re-check the flag.
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Dispatch a single event to the hub.
fn handle_event(
    hub: &mut Hub,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(hub, stream, tx, keep_running);
        }
        InternalEvent::MessageFrom {
            session_id,
            message,
        } => {
            handle_message(hub, session_id, message);
        }
        InternalEvent::Disconnected { session_id } => {
            hub.remove_peer(session_id);
        }
    }
}

/// Handle a new TCP connection: register the session (which sends `Welcome`)
/// and spawn a reader thread tagged with its id.
fn handle_new_connection(
    hub: &mut Hub,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    // The hub keeps the write half; the reader thread gets a clone.
    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "dropping connection: stream clone failed");
            return;
        }
    };

    let session_id = hub.add_peer(stream);

    let tx_reader = tx.clone();
    let keep_running_reader = keep_running.clone();
    thread::spawn(move || {
        reader_loop(
            BufReader::new(reader_stream),
            session_id,
            tx_reader,
            keep_running_reader,
        );
    });
}

/// Reader loop for a single client. Runs in its own thread.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    session_id: SessionId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match read_message(&mut reader) {
            Ok(bytes) => match serde_json::from_slice::<ClientMessage>(&bytes) {
                Ok(ClientMessage::Goodbye) => {
                    let _ = tx.send(InternalEvent::Disconnected { session_id });
                    break;
                }
                Ok(message) => {
                    let _ = tx.send(InternalEvent::MessageFrom {
                        session_id,
                        message,
                    });
                }
                Err(_) => {
                    // Malformed message — disconnect.
                    let _ = tx.send(InternalEvent::Disconnected { session_id });
                    break;
                }
            },
            Err(_) => {
                // Read error or EOF — disconnect.
                let _ = tx.send(InternalEvent::Disconnected { session_id });
                break;
            }
        }
    }
}

/// Handle a client message that isn't Goodbye (that one is handled in the
/// reader loop so the thread can wind down immediately).
fn handle_message(hub: &mut Hub, session_id: SessionId, message: ClientMessage) {
    match message {
        ClientMessage::SetUsername { name } => {
            hub.handle_set_username(session_id, &name);
        }
        ClientMessage::SendLocation { fix } => {
            hub.handle_location(session_id, &fix);
        }
        ClientMessage::Goodbye => {
            // Handled in the reader loop.
        }
    }
}
