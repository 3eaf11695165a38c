//! In-process stand-ins for a MaBoSS server, used by unit tests.

use crate::launcher::{LaunchCommand, ProcessLauncher, ServerProcess};
use maboss_protocol::END_OF_REQUEST;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Reads one request (up to the zero sentinel or EOF), answers and hangs up.
fn answer<S: Read + Write>(mut stream: S, response: &[u8]) -> Vec<u8> {
    let mut received = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return received,
            Ok(n) => {
                received.extend_from_slice(&chunk[..n]);
                if received.last() == Some(&END_OF_REQUEST) {
                    break;
                }
            }
        }
    }
    let _ = stream.write_all(response);
    received
}

/// Serves a single connection on `listener` in a background thread.
pub(crate) fn serve_once(listener: UnixListener, response: Vec<u8>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || match listener.accept() {
        Ok((stream, _)) => answer(stream, &response),
        Err(_) => Vec::new(),
    })
}

/// Serves a single TCP connection on an ephemeral localhost port.
pub(crate) fn serve_tcp_once(response: Vec<u8>) -> (u16, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || match listener.accept() {
        Ok((stream, _)) => answer(stream, &response),
        Err(_) => Vec::new(),
    });
    (port, handle)
}

/// Process handle that records signals instead of sending them.
pub(crate) struct FakeProcess {
    pid: u32,
    terminated: bool,
    ignores_sigterm: bool,
    terminations: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
}

impl FakeProcess {
    pub(crate) fn new(pid: u32) -> Self {
        Self::with_counter(pid, Arc::new(AtomicUsize::new(0)))
    }

    fn with_counter(pid: u32, terminations: Arc<AtomicUsize>) -> Self {
        Self {
            pid,
            terminated: false,
            ignores_sigterm: false,
            terminations,
            kills: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn ignoring_sigterm(mut self) -> Self {
        self.ignores_sigterm = true;
        self
    }

    pub(crate) fn terminations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.terminations)
    }

    pub(crate) fn kills(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.kills)
    }
}

impl ServerProcess for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        if !self.ignores_sigterm {
            self.terminated = true;
        }
        Ok(())
    }

    fn try_wait(&mut self) -> io::Result<bool> {
        Ok(self.terminated)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.terminated = true;
        Ok(())
    }
}

/// Launcher that plays the server in a thread instead of spawning a binary.
///
/// On launch it binds the `--port` socket, starts answering one request with
/// `response`, then creates the `--pidfile` marker.
pub(crate) struct FakeLauncher {
    response: Vec<u8>,
    ready: bool,
    fail: bool,
    next_pid: AtomicUsize,
    launches: Mutex<Vec<LaunchCommand>>,
    servers: Mutex<Vec<JoinHandle<Vec<u8>>>>,
    terminations: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub(crate) fn new(response: &[u8]) -> Self {
        Self {
            response: response.to_vec(),
            ready: true,
            fail: false,
            next_pid: AtomicUsize::new(1000),
            launches: Mutex::new(Vec::new()),
            servers: Mutex::new(Vec::new()),
            terminations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Server that starts but never writes its marker.
    pub(crate) fn never_ready() -> Self {
        Self {
            ready: false,
            ..Self::new(b"")
        }
    }

    /// Launcher whose binary cannot be executed.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(b"")
        }
    }

    pub(crate) fn launches(&self) -> Vec<LaunchCommand> {
        self.launches.lock().unwrap().clone()
    }

    /// Waits for every started server thread and returns what each received.
    pub(crate) fn requests(&self) -> Vec<Vec<u8>> {
        let servers = std::mem::take(&mut *self.servers.lock().unwrap());
        servers.into_iter().map(|h| h.join().unwrap()).collect()
    }

    pub(crate) fn terminations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.terminations)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, command: &LaunchCommand) -> io::Result<Box<dyn ServerProcess>> {
        self.launches.lock().unwrap().push(command.clone());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
        }

        if self.ready {
            let socket = PathBuf::from(command.value_of("--port").unwrap());
            let marker = PathBuf::from(command.value_of("--pidfile").unwrap());

            let listener = UnixListener::bind(&socket)?;
            let handle = serve_once(listener, self.response.clone());
            self.servers.lock().unwrap().push(handle);
            std::fs::write(&marker, "ready")?;
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) as u32;
        Ok(Box::new(FakeProcess::with_counter(
            pid,
            Arc::clone(&self.terminations),
        )))
    }
}
