//! One request/response exchange with a server.

use crate::config::IoConfig;
use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::launcher::ServerProcess;
use crate::stream::ClientStream;
use bytes::{Bytes, BytesMut};
use maboss_protocol::{Decoder, Encoder, RequestEnvelope, ResponseEnvelope, END_OF_REQUEST};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of exit checks after SIGTERM before falling back to kill.
const EXIT_POLL_ATTEMPTS: u32 = 10;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the session reached its server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Connected to a server someone else manages.
    Remote,
    /// Connected to a server this session started and will stop.
    LocalSpawned,
}

/// A server process owned by a session.
pub(crate) struct SpawnedServer {
    process: Box<dyn ServerProcess>,
    marker_path: PathBuf,
}

impl SpawnedServer {
    pub(crate) fn new(process: Box<dyn ServerProcess>, marker_path: PathBuf) -> Self {
        Self {
            process,
            marker_path,
        }
    }

    pub(crate) fn id(&self) -> u32 {
        self.process.id()
    }

    pub(crate) fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Stops the server and removes its marker. Errors are logged, not returned.
    pub(crate) fn shutdown(mut self) {
        let pid = self.process.id();

        if let Err(e) = self.process.terminate() {
            tracing::debug!(pid, "Failed to signal server: {}", e);
        }

        let mut exited = false;
        for _ in 0..EXIT_POLL_ATTEMPTS {
            match self.process.try_wait() {
                Ok(true) => {
                    exited = true;
                    break;
                }
                Ok(false) => std::thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => {
                    tracing::debug!(pid, "Failed to check server exit: {}", e);
                    break;
                }
            }
        }

        if !exited {
            tracing::warn!(pid, "Server ignored SIGTERM, killing");
            if let Err(e) = self.process.kill() {
                tracing::debug!(pid, "Failed to kill server: {}", e);
            }
        }

        match std::fs::remove_file(&self.marker_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(
                "Failed to remove {}: {}",
                self.marker_path.display(),
                e
            ),
        }

        tracing::debug!(pid, "Server stopped");
    }
}

/// A connected transport session.
///
/// A session carries exactly one exchange. Dropping it closes the socket and,
/// for spawned servers, stops the server.
pub struct Session {
    endpoint: Endpoint,
    mode: SessionMode,
    stream: Option<ClientStream>,
    server: Option<SpawnedServer>,
    read_buffer_size: usize,
    exchanged: bool,
}

impl Session {
    /// Connects to a running server.
    pub fn connect(endpoint: Endpoint, io: &IoConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", endpoint);

        let stream = ClientStream::connect(&endpoint).map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Connect {
                endpoint: endpoint.to_string(),
                source: e,
            }
        })?;
        stream.set_timeouts(io.timeout())?;

        tracing::debug!("Connected to {}", endpoint);

        Ok(Self {
            endpoint,
            mode: SessionMode::Remote,
            stream: Some(stream),
            server: None,
            read_buffer_size: io.read_buffer_size(),
            exchanged: false,
        })
    }

    /// Hands ownership of a spawned server to the session.
    pub(crate) fn with_server(mut self, server: SpawnedServer) -> Self {
        self.mode = SessionMode::LocalSpawned;
        self.server = Some(server);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Pid of the spawned server, while it is still owned by the session.
    pub fn server_pid(&self) -> Option<u32> {
        self.server.as_ref().map(SpawnedServer::id)
    }

    /// Readiness marker of the spawned server, while it is still owned by the session.
    pub fn marker_path(&self) -> Option<&Path> {
        self.server.as_ref().map(SpawnedServer::marker_path)
    }

    /// Sends an encoded request and reads the whole response.
    ///
    /// The request is followed by a single zero byte; the response ends when
    /// the server closes the connection.
    pub fn send(&mut self, request: &[u8]) -> Result<Bytes, ClientError> {
        let read_buffer_size = self.read_buffer_size;
        let stream = self.stream.as_mut().ok_or(ClientError::SessionClosed)?;
        if self.exchanged {
            return Err(ClientError::ExchangeCompleted);
        }
        self.exchanged = true;

        stream.write_all(request)?;
        stream.write_all(&[END_OF_REQUEST])?;
        stream.flush()?;
        tracing::debug!(bytes = request.len(), "Request sent to {}", self.endpoint);

        let mut response = BytesMut::new();
        let mut chunk = vec![0u8; read_buffer_size];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => response.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!(bytes = response.len(), "Response received from {}", self.endpoint);

        Ok(response.freeze())
    }

    /// Encodes `request`, exchanges it and decodes the reply.
    ///
    /// Protocol failures are reported through the envelope status.
    pub fn launch(&mut self, request: &RequestEnvelope) -> Result<ResponseEnvelope, ClientError> {
        let encoded = Encoder::encode_request(request);
        let data = self.send(&encoded)?;
        let response = Decoder::decode_response(&data);
        if !response.is_success() {
            tracing::info!(
                status = response.status,
                "Simulation failed: {}",
                response.error_message
            );
        }
        Ok(response)
    }

    /// Releases the socket and stops a spawned server. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown() {
                if e.kind() != io::ErrorKind::NotConnected {
                    tracing::debug!("Socket shutdown failed: {}", e);
                }
            }
            tracing::debug!("Closed session to {}", self.endpoint);
        }

        if let Some(server) = self.server.take() {
            server.shutdown();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .field("server_pid", &self.server_pid())
            .field("exchanged", &self.exchanged)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{serve_tcp_once, FakeProcess};
    use maboss_protocol::{DecodeStatus, Section};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_tcp_exchange() {
        let (port, server) = serve_tcp_once(b"RETURN MaBoSS-2.0\nStatus:0\n\n".to_vec());

        let mut session = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap();
        assert_eq!(session.mode(), SessionMode::Remote);
        assert_eq!(session.server_pid(), None);

        let response = session.send(b"LAUNCH MaBoSS-2.0\n\n").unwrap();
        assert_eq!(&response[..], b"RETURN MaBoSS-2.0\nStatus:0\n\n");

        let received = server.join().unwrap();
        assert_eq!(received, b"LAUNCH MaBoSS-2.0\n\n\0");
    }

    #[test]
    fn test_launch_decodes_response() {
        let (port, server) =
            serve_tcp_once(b"RETURN MaBoSS-2.0\nStatus:0\nRun-Log:0-4\n\nhello".to_vec());

        let mut session = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap();
        let request = RequestEnvelope::new("A: 1;", "$0:0;");
        let response = session.launch(&request).unwrap();

        assert_eq!(response.status, 0);
        assert_eq!(response.error_message, "");
        assert_eq!(response.section(Section::RunLog).unwrap().as_ref(), b"hello");

        let received = server.join().unwrap();
        let decoded = Decoder::decode_request(&received).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_launch_reports_protocol_failure_in_envelope() {
        let (port, server) = serve_tcp_once(b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec());

        let mut session = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap();
        let response = session
            .launch(&RequestEnvelope::new("A: 1;", "$0:0;"))
            .unwrap();
        assert_eq!(response.decode_status(), Some(DecodeStatus::MagicMismatch));
        assert!(response.sections.is_empty());
        server.join().unwrap();
    }

    #[test]
    fn test_second_send_rejected() {
        let (port, server) = serve_tcp_once(b"RETURN MaBoSS-2.0\nStatus:0\n\n".to_vec());

        let mut session = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap();
        session.send(b"first").unwrap();
        assert!(matches!(
            session.send(b"second"),
            Err(ClientError::ExchangeCompleted)
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_send_after_close() {
        let (port, _server) = serve_tcp_once(Vec::new());

        let mut session = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap();
        session.close();
        assert!(session.is_closed());
        assert!(matches!(
            session.send(b"late"),
            Err(ClientError::SessionClosed)
        ));

        // Second close is a no-op
        session.close();
    }

    #[test]
    fn test_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[test]
    fn test_missing_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::connect(
            Endpoint::unix(dir.path().join("absent.sock")),
            &IoConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }

    #[test]
    fn test_close_stops_owned_server_once() {
        let (port, server) = serve_tcp_once(b"RETURN MaBoSS-2.0\nStatus:0\n\n".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("MaBoSS_pidfile_1_1");
        std::fs::write(&marker, "1").unwrap();

        let process = FakeProcess::new(4242);
        let terminations = process.terminations();

        let mut session = Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
            .unwrap()
            .with_server(SpawnedServer::new(Box::new(process), marker.clone()));
        assert_eq!(session.mode(), SessionMode::LocalSpawned);
        assert_eq!(session.server_pid(), Some(4242));
        assert_eq!(session.marker_path(), Some(marker.as_path()));

        session.send(b"x").unwrap();
        session.close();
        session.close();
        drop(session);

        assert_eq!(terminations.load(Ordering::SeqCst), 1);
        assert!(!marker.exists());
        server.join().unwrap();
    }

    #[test]
    fn test_drop_stops_owned_server() {
        let (port, _server) = serve_tcp_once(Vec::new());
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("pidfile");
        std::fs::write(&marker, "1").unwrap();

        let process = FakeProcess::new(7);
        let terminations = process.terminations();
        {
            let _session =
                Session::connect(Endpoint::tcp("127.0.0.1", port), &IoConfig::default())
                    .unwrap()
                    .with_server(SpawnedServer::new(Box::new(process), marker.clone()));
        }

        assert_eq!(terminations.load(Ordering::SeqCst), 1);
        assert!(!marker.exists());
    }

    #[test]
    fn test_stubborn_server_is_killed() {
        let process = FakeProcess::new(9).ignoring_sigterm();
        let kills = process.kills();
        let dir = tempfile::tempdir().unwrap();

        SpawnedServer::new(Box::new(process), dir.path().join("pidfile")).shutdown();
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }
}
