//! Readiness multiplexer shared by the listener and the send path.
//!
//! A [`Multiplexer`] owns a `mio::Poll` and a registration table mapping each
//! token to either a listening socket or a connection plus its [`Session`]
//! state. [`Multiplexer::wait`] blocks until something is ready and reports
//! what; [`Multiplexer::dispatch`] runs the session's handler for one ready
//! connection.
//!
//! mio delivers edge-triggered readiness. A handler must therefore keep
//! reading or writing until the socket would block, or change its interest;
//! returning the same interest without draining stalls the connection.
//!
//! The dispatch boundary isolates failures: an error or a panic from one
//! session closes that connection and nothing else.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use slab::Slab;
use tracing::{debug, trace, warn};

/// Token reserved for the [`Waker`].
pub const WAKE_TOKEN: Token = Token(usize::MAX);

const EVENT_CAPACITY: usize = 256;

/// Which directions a socket is ready in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    pub const READABLE: Self = Self {
        readable: true,
        writable: false,
    };
    pub const WRITABLE: Self = Self {
        readable: false,
        writable: true,
    };
    pub const BOTH: Self = Self {
        readable: true,
        writable: true,
    };
}

impl From<&Event> for Readiness {
    // Errors and hang-ups are reported as readiness so the handler's next IO
    // call surfaces them.
    fn from(event: &Event) -> Self {
        Self {
            readable: event.is_readable() || event.is_read_closed() || event.is_error(),
            writable: event.is_writable() || event.is_write_closed() || event.is_error(),
        }
    }
}

/// A byte stream a [`Session`] can drive.
pub trait Transport: Read + Write {
    /// Takes the pending socket error, e.g. a refused connect.
    fn take_error(&self) -> io::Result<Option<io::Error>>;

    /// Whether a non-blocking connect has completed.
    fn is_connected(&self) -> bool;
}

impl Transport for TcpStream {
    fn take_error(&self) -> io::Result<Option<io::Error>> {
        TcpStream::take_error(self)
    }

    fn is_connected(&self) -> bool {
        self.peer_addr().is_ok()
    }
}

/// What a session wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Keep the connection registered with this interest.
    Wait(Interest),
    /// The exchange is over; unregister and close.
    Close,
}

/// Per-connection state machine driven by the multiplexer.
pub trait Session {
    type Error: fmt::Display;

    /// Handles one readiness event.
    fn on_ready<T: Transport>(&mut self, io: &mut T, ready: Readiness) -> Result<Next, Self::Error>;
}

/// One readiness notification from [`Multiplexer::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    /// The [`Waker`] fired.
    Wake,
    /// A listening socket has connections to accept.
    Listener(Token),
    /// A connection is ready.
    Connection(Token, Readiness),
}

enum Entry<S> {
    Listener(TcpListener),
    Connection {
        stream: TcpStream,
        peer: SocketAddr,
        interest: Interest,
        session: S,
    },
}

enum Verdict {
    Keep,
    Reregister(Interest),
    Close,
}

/// Readiness-driven registration table.
pub struct Multiplexer<S> {
    poll: Poll,
    events: Events,
    entries: Slab<Entry<S>>,
}

impl<S: Session> Multiplexer<S> {
    /// Creates an empty multiplexer.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENT_CAPACITY),
            entries: Slab::new(),
        })
    }

    /// Creates the waker for this poll instance.
    ///
    /// mio allows one waker per poll; create it once and share it.
    pub fn waker(&self) -> io::Result<Waker> {
        Waker::new(self.poll.registry(), WAKE_TOKEN)
    }

    /// Registers a listening socket, read-only, with no session.
    pub fn add_listener(&mut self, mut listener: TcpListener) -> io::Result<Token> {
        let entry = self.entries.vacant_entry();
        let token = Token(entry.key());
        self.poll
            .registry()
            .register(&mut listener, token, Interest::READABLE)?;
        entry.insert(Entry::Listener(listener));
        Ok(token)
    }

    /// Returns a registered listening socket.
    pub fn listener(&self, token: Token) -> Option<&TcpListener> {
        match self.entries.get(token.0) {
            Some(Entry::Listener(listener)) => Some(listener),
            _ => None,
        }
    }

    /// Registers a connection with its session state.
    pub fn register(
        &mut self,
        mut stream: TcpStream,
        peer: SocketAddr,
        interest: Interest,
        session: S,
    ) -> io::Result<Token> {
        let entry = self.entries.vacant_entry();
        let token = Token(entry.key());
        self.poll.registry().register(&mut stream, token, interest)?;
        entry.insert(Entry::Connection {
            stream,
            peer,
            interest,
            session,
        });
        trace!(%peer, token = token.0, ?interest, "registered");
        Ok(token)
    }

    /// Changes the interest of a registered connection.
    pub fn modify(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        match self.entries.get_mut(token.0) {
            Some(Entry::Connection {
                stream,
                interest: current,
                ..
            }) => {
                self.poll.registry().reregister(stream, token, interest)?;
                *current = interest;
                Ok(())
            }
            _ => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("no connection registered for token {}", token.0),
            )),
        }
    }

    /// Unregisters and closes a socket.
    ///
    /// Returns `false` if nothing was registered under `token`, so a second
    /// call for the same connection is a no-op.
    pub fn unregister(&mut self, token: Token) -> bool {
        if !self.entries.contains(token.0) {
            return false;
        }
        let registry = self.poll.registry();
        match self.entries.remove(token.0) {
            Entry::Listener(mut listener) => {
                if let Err(e) = registry.deregister(&mut listener) {
                    debug!(error = %e, "failed to deregister listener");
                }
            }
            Entry::Connection {
                mut stream, peer, ..
            } => {
                if let Err(e) = registry.deregister(&mut stream) {
                    debug!(%peer, error = %e, "failed to deregister connection");
                }
                trace!(%peer, token = token.0, "closed");
            }
        }
        true
    }

    /// Number of registered sockets, listeners included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Connection { .. }))
            .count()
    }

    /// Returns the session attached to a connection.
    pub fn session(&self, token: Token) -> Option<&S> {
        match self.entries.get(token.0) {
            Some(Entry::Connection { session, .. }) => Some(session),
            _ => None,
        }
    }

    /// Blocks until at least one socket is ready or `timeout` elapses.
    ///
    /// `None` waits indefinitely. An interrupted wait returns no events.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Ready>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        let mut ready = Vec::new();
        for event in self.events.iter() {
            let token = event.token();
            if token == WAKE_TOKEN {
                ready.push(Ready::Wake);
                continue;
            }
            match self.entries.get(token.0) {
                Some(Entry::Listener(_)) => ready.push(Ready::Listener(token)),
                Some(Entry::Connection { .. }) => {
                    ready.push(Ready::Connection(token, Readiness::from(event)));
                }
                // Closed earlier in the same batch.
                None => {}
            }
        }
        Ok(ready)
    }

    /// Runs the session handler of one ready connection.
    ///
    /// Errors and panics close only this connection.
    pub fn dispatch(&mut self, token: Token, ready: Readiness) {
        let verdict = match self.entries.get_mut(token.0) {
            Some(Entry::Connection {
                stream,
                peer,
                interest,
                session,
            }) => {
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| session.on_ready(stream, ready)));
                match outcome {
                    Ok(Ok(Next::Wait(next))) if next == *interest => Verdict::Keep,
                    Ok(Ok(Next::Wait(next))) => Verdict::Reregister(next),
                    Ok(Ok(Next::Close)) => Verdict::Close,
                    Ok(Err(e)) => {
                        warn!(peer = %peer, error = %e, "connection failed, closing");
                        Verdict::Close
                    }
                    Err(_) => {
                        warn!(peer = %peer, "connection handler panicked, closing");
                        Verdict::Close
                    }
                }
            }
            _ => return,
        };

        match verdict {
            Verdict::Keep => {}
            Verdict::Reregister(next) => {
                if let Err(e) = self.modify(token, next) {
                    warn!(error = %e, "failed to change interest, closing");
                    self.unregister(token);
                }
            }
            Verdict::Close => {
                self.unregister(token);
            }
        }
    }
}
