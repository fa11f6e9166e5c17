//! The request loop.
//!
//! [`Server::serve`] reads one frame, answers it, writes and flushes the
//! answer, and only then asks for the next frame. End of input or a
//! termination signal moves the server to [`State::Draining`], where no
//! further frames are read and pending output is flushed, and then to
//! [`State::Stopped`].

use std::fmt;
use std::io::{self, Write};

use logwise::privacy::LogIt;

use crate::codec::{self, DecodeError};
use crate::config::{Config, ConfigError};
use crate::error::RegistryError;
use crate::mcp::{Handled, ServerInfo, Service};
use crate::nexus;
use crate::wire::{Frame, FrameWriter, Inbound, Inbox};

/// Exit status of a clean stop.
pub const EXIT_CLEAN: i32 = 0;
/// Exit status when serving had to stop because a stream failed.
pub const EXIT_FORCED: i32 = 1;
/// Exit status when the server could not be assembled or configured.
pub const EXIT_STARTUP: i32 = 2;

/// Lifecycle of a [`Server`]. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Built, not yet serving.
    Idle,
    /// Reading, dispatching and answering frames.
    Running,
    /// Input is finished or a signal arrived; no further frames are read.
    Draining,
    /// Output has been flushed, or a stream failed.
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::Running => "running",
            State::Draining => "draining",
            State::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a clean stop happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The client closed its end of the input.
    EndOfStream,
    /// A termination signal, by number.
    Signal(i32),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::EndOfStream => f.write_str("end of input"),
            ShutdownReason::Signal(signo) => write!(f, "signal {signo}"),
        }
    }
}

/// Report returned by a clean stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shutdown {
    pub reason: ShutdownReason,
    /// Requests answered, successfully or not.
    pub requests: u64,
    /// Frames rejected as malformed.
    pub malformed: u64,
    /// Notifications accepted; these get no response.
    pub notifications: u64,
    /// Always [`State::Stopped`].
    pub state: State,
}

impl Shutdown {
    /// Process exit status for this stop.
    pub fn exit_code(&self) -> i32 {
        EXIT_CLEAN
    }
}

/// A stream failure that forced the server to stop.
///
/// Client mistakes never end up here; they are answered with error responses
/// and the loop continues.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to read from input: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write to output: {0}")]
    Write(#[source] io::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ServeError {
    /// Always [`EXIT_FORCED`].
    pub fn exit_code(&self) -> i32 {
        EXIT_FORCED
    }
}

/// Failures before the first frame is read.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to start the input reader: {0}")]
    Io(#[from] io::Error),
}

impl StartupError {
    /// Always [`EXIT_STARTUP`].
    pub fn exit_code(&self) -> i32 {
        EXIT_STARTUP
    }
}

/// Builds the Nexus Dashboard service described by `config`.
///
/// # Errors
///
/// Fails when the content directory does not exist or the catalog cannot be
/// registered. Both map to [`EXIT_STARTUP`].
pub fn assemble(config: &Config) -> Result<Service, StartupError> {
    let content = config.content_provider()?;
    let catalog = nexus::catalog(&content)?;
    logwise::info_sync!(
        "assembled {name}: {tools} tools, {resources} resources, {prompts} prompts, content from {content}",
        name = LogIt(&config.server_name),
        tools = LogIt(&catalog.tools.len()),
        resources = LogIt(&catalog.resources.len()),
        prompts = LogIt(&catalog.prompts.len()),
        content = LogIt(&content.describe())
    );
    let info = ServerInfo::new(config.server_name.clone()).with_instructions(nexus::INSTRUCTIONS);
    Ok(Service::new(info, catalog, content))
}

/// Serves one client, strictly one request at a time.
///
/// A `Server` is used once: [`Server::serve`] runs it from [`State::Idle`] to
/// [`State::Stopped`].
pub struct Server {
    service: Service,
    state: State,
}

impl Server {
    /// A server in [`State::Idle`].
    pub fn new(service: Service) -> Self {
        Server {
            service,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        logwise::info_sync!(
            "server {from} -> {to}",
            from = LogIt(&self.state.to_string()),
            to = LogIt(&next.to_string())
        );
        self.state = next;
    }

    /// Serves `inbox` until it closes or reports a termination signal.
    ///
    /// Each frame is decoded, handled and its response written and flushed
    /// before the next frame is requested from `inbox`. Notifications produce
    /// no output. Malformed frames are answered and counted.
    ///
    /// # Errors
    ///
    /// Failing to read or write ends the loop with a [`ServeError`]; the
    /// server is left [`State::Stopped`] either way.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtools::content::EmbeddedContent;
    /// use ndtools::mcp::{Catalog, ServerInfo, Service};
    /// use ndtools::server::{Server, ShutdownReason, State};
    /// use ndtools::wire::FrameReader;
    /// use std::sync::Arc;
    ///
    /// let info = ServerInfo::new("demo");
    /// let service = Service::new(info, Catalog::default(), Arc::new(EmbeddedContent));
    /// let mut server = Server::new(service);
    ///
    /// let input = concat!(
    ///     r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, "\n",
    ///     r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
    ///     "{oops\n",
    /// );
    /// let mut inbox = FrameReader::new(input.as_bytes(), 1024);
    /// let mut output = Vec::new();
    /// let shutdown = server.serve(&mut inbox, &mut output).unwrap();
    ///
    /// assert_eq!(shutdown.reason, ShutdownReason::EndOfStream);
    /// assert_eq!((shutdown.requests, shutdown.notifications, shutdown.malformed), (1, 1, 1));
    /// assert_eq!(server.state(), State::Stopped);
    /// assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
    /// ```
    pub fn serve<I, W>(&mut self, inbox: &mut I, output: W) -> Result<Shutdown, ServeError>
    where
        I: Inbox,
        W: Write,
    {
        let mut writer = FrameWriter::new(output);
        let mut requests = 0u64;
        let mut malformed = 0u64;
        let mut notifications = 0u64;
        self.transition(State::Running);

        let reason = loop {
            let frame = match inbox.next_frame() {
                Ok(Inbound::Frame(frame)) => frame,
                Ok(Inbound::Closed) => break ShutdownReason::EndOfStream,
                Ok(Inbound::Terminated(signo)) => break ShutdownReason::Signal(signo),
                Err(e) => return Err(self.fail(ServeError::Read(e))),
            };
            let handled = match frame {
                Frame::Message(bytes) => self.service.handle_frame(&bytes),
                Frame::Oversized { length, limit } => {
                    self.service.reject(DecodeError::Oversized { length, limit })
                }
            };
            let response = match &handled {
                Handled::Response(response) => {
                    requests += 1;
                    response
                }
                Handled::Rejected(response) => {
                    malformed += 1;
                    response
                }
                Handled::Notification => {
                    notifications += 1;
                    continue;
                }
            };
            let body = match codec::encode_response(response) {
                Ok(body) => body,
                Err(e) => return Err(self.fail(ServeError::Encode(e))),
            };
            if let Err(e) = writer.write_frame(&body) {
                return Err(self.fail(ServeError::Write(e)));
            }
        };

        self.transition(State::Draining);
        if let Err(e) = writer.flush() {
            return Err(self.fail(ServeError::Write(e)));
        }
        self.transition(State::Stopped);

        let shutdown = Shutdown {
            reason,
            requests,
            malformed,
            notifications,
            state: self.state,
        };
        logwise::info_sync!(
            "stopped after {reason}: {requests} requests, {malformed} malformed, {notifications} notifications",
            reason = LogIt(&reason.to_string()),
            requests = LogIt(&requests),
            malformed = LogIt(&malformed),
            notifications = LogIt(&notifications)
        );
        Ok(shutdown)
    }

    fn fail(&mut self, error: ServeError) -> ServeError {
        logwise::error_sync!("serving stopped: {e}", e = LogIt(&error.to_string()));
        self.state = State::Stopped;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EmbeddedContent;
    use crate::mcp::{Catalog, ServerInfo};
    use crate::wire::FrameReader;
    use std::io::Cursor;
    use std::sync::Arc;

    fn server() -> Server {
        Server::new(Service::new(
            ServerInfo::new("test"),
            Catalog::default(),
            Arc::new(EmbeddedContent),
        ))
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Scripted(Vec<io::Result<Inbound>>);

    impl Inbox for Scripted {
        fn next_frame(&mut self) -> io::Result<Inbound> {
            if self.0.is_empty() {
                return Ok(Inbound::Closed);
            }
            self.0.remove(0)
        }
    }

    #[test]
    fn lifecycle_ends_stopped() {
        let mut server = server();
        assert_eq!(server.state(), State::Idle);
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec();
        let mut inbox = FrameReader::new(Cursor::new(input), 1024);
        let mut output = Vec::new();
        let shutdown = server.serve(&mut inbox, &mut output).unwrap();
        assert_eq!(shutdown.reason, ShutdownReason::EndOfStream);
        assert_eq!(shutdown.requests, 1);
        assert_eq!(shutdown.exit_code(), EXIT_CLEAN);
        assert_eq!(server.state(), State::Stopped);
        assert_eq!(output, b"{\"jsonrpc\":\"2.0\",\"result\":{},\"id\":1}\n");
    }

    #[test]
    fn signal_stops_without_reading_further() {
        let mut server = server();
        let mut inbox = Scripted(vec![
            Ok(Inbound::Terminated(15)),
            Ok(Inbound::Frame(Frame::Message(b"{}".to_vec()))),
        ]);
        let mut output = Vec::new();
        let shutdown = server.serve(&mut inbox, &mut output).unwrap();
        assert_eq!(shutdown.reason, ShutdownReason::Signal(15));
        assert_eq!(inbox.0.len(), 1);
        assert!(output.is_empty());
    }

    #[test]
    fn oversized_frames_are_answered() {
        let mut server = server();
        let mut inbox = Scripted(vec![Ok(Inbound::Frame(Frame::Oversized {
            length: 100,
            limit: 10,
        }))]);
        let mut output = Vec::new();
        let shutdown = server.serve(&mut inbox, &mut output).unwrap();
        assert_eq!(shutdown.malformed, 1);
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["error"]["data"]["kind"], "MalformedMessage");
        assert_eq!(value["error"]["data"]["detail"]["limit"], 10);
    }

    #[test]
    fn assemble_uses_configured_name() {
        let config = Config {
            server_name: "nd-dev".to_string(),
            ..Config::default()
        };
        let service = assemble(&config).unwrap();
        assert_eq!(service.info().name, "nd-dev");
        assert!(service.tools().lookup("vrf_payload_example").is_some());

        let broken = Config {
            content_dir: Some("/definitely/not/here".into()),
            ..Config::default()
        };
        let err = assemble(&broken).err().unwrap();
        assert_eq!(err.exit_code(), EXIT_STARTUP);
    }

    #[test]
    fn stream_failures_are_forced_stops() {
        let mut server = server();
        let mut inbox = Scripted(vec![Err(io::Error::other("stdin gone"))]);
        let err = server.serve(&mut inbox, Vec::new()).unwrap_err();
        assert!(matches!(err, ServeError::Read(_)));
        assert_eq!(err.exit_code(), EXIT_FORCED);
        assert_eq!(server.state(), State::Stopped);

        let mut server = self::server();
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec();
        let mut inbox = FrameReader::new(Cursor::new(input), 1024);
        let err = server.serve(&mut inbox, BrokenPipe).unwrap_err();
        assert!(matches!(err, ServeError::Write(_)));
    }
}
