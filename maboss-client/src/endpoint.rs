//! Server endpoints and local socket allocation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a session connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP server at `host:port`.
    Tcp { host: String, port: u16 },
    /// Unix domain socket at the given path.
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Endpoint::Unix(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Socket and readiness marker paths for one spawned server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEndpoint {
    /// Unix socket the server listens on.
    pub socket_path: PathBuf,
    /// File the server creates once it accepts connections.
    pub marker_path: PathBuf,
}

impl LocalEndpoint {
    pub fn new(socket_path: impl Into<PathBuf>, marker_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            marker_path: marker_path.into(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Unix(self.socket_path.clone())
    }
}

/// Hands out unique socket and marker paths.
///
/// Names embed the client pid and a counter that starts at 1, so concurrent
/// clients and repeated spawns within one client never collide.
#[derive(Debug)]
pub struct EndpointAllocator {
    dir: PathBuf,
    service_name: String,
    pid: u32,
    next: AtomicU64,
}

impl EndpointAllocator {
    pub fn new(dir: impl Into<PathBuf>, service_name: impl Into<String>) -> Self {
        Self::with_pid(dir, service_name, std::process::id())
    }

    pub fn with_pid(dir: impl Into<PathBuf>, service_name: impl Into<String>, pid: u32) -> Self {
        Self {
            dir: dir.into(),
            service_name: service_name.into(),
            pid,
            next: AtomicU64::new(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocates the next pair of paths.
    pub fn allocate(&self) -> LocalEndpoint {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        LocalEndpoint {
            socket_path: self.path_for("pipe", n),
            marker_path: self.path_for("pidfile", n),
        }
    }

    /// Allocates a marker path for a server listening on a caller-chosen socket.
    pub fn allocate_marker(&self) -> PathBuf {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        self.path_for("pidfile", n)
    }

    fn path_for(&self, kind: &str, n: u64) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}_{}", self.service_name, kind, self.pid, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::tcp("localhost", 7777).to_string(), "localhost:7777");
        assert_eq!(
            Endpoint::unix("/tmp/MaBoSS_pipe_1_1").to_string(),
            "/tmp/MaBoSS_pipe_1_1"
        );
        assert!(Endpoint::unix("/tmp/x").is_local());
        assert!(!Endpoint::tcp("h", 1).is_local());
    }

    #[test]
    fn test_allocate_naming() {
        let allocator = EndpointAllocator::with_pid("/tmp", "MaBoSS", 4242);

        let first = allocator.allocate();
        assert_eq!(first.socket_path, PathBuf::from("/tmp/MaBoSS_pipe_4242_1"));
        assert_eq!(first.marker_path, PathBuf::from("/tmp/MaBoSS_pidfile_4242_1"));

        let second = allocator.allocate();
        assert_eq!(second.socket_path, PathBuf::from("/tmp/MaBoSS_pipe_4242_2"));
        assert_eq!(
            second.endpoint(),
            Endpoint::unix("/tmp/MaBoSS_pipe_4242_2")
        );

        assert_eq!(
            allocator.allocate_marker(),
            PathBuf::from("/tmp/MaBoSS_pidfile_4242_3")
        );
    }

    #[test]
    fn test_allocate_unique_across_threads() {
        let allocator = Arc::new(EndpointAllocator::new("/tmp", "MaBoSS"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| allocator.allocate().socket_path)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for path in handle.join().unwrap() {
                assert!(seen.insert(path), "duplicate socket path");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}
