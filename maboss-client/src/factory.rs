//! Session construction.
//!
//! A factory owns the configuration, the endpoint allocator and the process
//! launcher. Every local session it spawns gets its own socket and marker.

use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, EndpointAllocator, LocalEndpoint};
use crate::error::ClientError;
use crate::launcher::{CommandLauncher, LaunchCommand, ProcessLauncher};
use crate::readiness::{self, CancelToken, WaitError};
use crate::session::{Session, SpawnedServer};
use std::path::PathBuf;
use std::sync::OnceLock;

static SHARED: OnceLock<SessionFactory> = OnceLock::new();

/// Builds sessions to remote or locally spawned servers.
pub struct SessionFactory {
    config: ClientConfig,
    allocator: EndpointAllocator,
    launcher: Box<dyn ProcessLauncher>,
}

impl SessionFactory {
    pub fn new(config: ClientConfig) -> Self {
        let allocator =
            EndpointAllocator::new(&config.server.tmp_dir, &config.server.service_name);
        Self {
            config,
            allocator,
            launcher: Box::new(CommandLauncher),
        }
    }

    /// Builds a factory from the YAML file and environment overrides.
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self::new(ClientConfig::load()?))
    }

    /// Process-wide factory, configured from the environment on first use.
    pub fn shared() -> &'static SessionFactory {
        SHARED.get_or_init(|| match Self::from_env() {
            Ok(factory) => factory,
            Err(e) => {
                tracing::warn!("Invalid client configuration, using defaults: {}", e);
                Self::new(ClientConfig::default())
            }
        })
    }

    pub fn with_launcher(mut self, launcher: impl ProcessLauncher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn with_allocator(mut self, allocator: EndpointAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn allocator(&self) -> &EndpointAllocator {
        &self.allocator
    }

    /// Connects to a running server over TCP.
    pub fn connect_remote(&self, host: &str, port: u16) -> Result<Session, ClientError> {
        Session::connect(Endpoint::tcp(host, port), &self.config.io)
    }

    /// Connects to a running server on a Unix socket.
    pub fn connect_unix(&self, path: impl Into<PathBuf>) -> Result<Session, ClientError> {
        Session::connect(Endpoint::unix(path), &self.config.io)
    }

    /// Spawns a private server on a freshly allocated socket and connects to it.
    pub fn spawn_local(&self) -> Result<Session, ClientError> {
        self.spawn(self.allocator.allocate(), None)
    }

    /// Spawns a private server listening on `socket_path`.
    pub fn spawn_local_at(&self, socket_path: impl Into<PathBuf>) -> Result<Session, ClientError> {
        let local = LocalEndpoint::new(socket_path, self.allocator.allocate_marker());
        self.spawn(local, None)
    }

    /// Like [`spawn_local`](Self::spawn_local), but the readiness wait stops
    /// early once `cancel` is triggered.
    pub fn spawn_local_with_cancel(
        &self,
        socket_path: Option<PathBuf>,
        cancel: &CancelToken,
    ) -> Result<Session, ClientError> {
        let local = match socket_path {
            Some(path) => LocalEndpoint::new(path, self.allocator.allocate_marker()),
            None => self.allocator.allocate(),
        };
        self.spawn(local, Some(cancel))
    }

    fn spawn(
        &self,
        local: LocalEndpoint,
        cancel: Option<&CancelToken>,
    ) -> Result<Session, ClientError> {
        let command = LaunchCommand::server(&self.config.server, &local);
        let endpoint = local.endpoint();

        tracing::info!(
            "Starting {} on {}",
            command.program.display(),
            endpoint
        );
        let process = self
            .launcher
            .launch(&command)
            .map_err(|source| ClientError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        let server = SpawnedServer::new(process, local.marker_path.clone());

        // The server is stopped on every failure below
        let policy = self.config.startup.policy();
        match readiness::wait_for_path(&local.marker_path, &policy, cancel) {
            Ok(attempts) => {
                tracing::debug!(attempts, pid = server.id(), "Server ready on {}", endpoint);
            }
            Err(e) => {
                tracing::warn!("Server on {} failed to start: {}", endpoint, e);
                server.shutdown();
                return Err(match e {
                    WaitError::TimedOut { attempts, waited } => ClientError::StartupTimeout {
                        endpoint: endpoint.to_string(),
                        attempts,
                        waited,
                    },
                    WaitError::Cancelled { .. } => ClientError::StartupCancelled {
                        endpoint: endpoint.to_string(),
                    },
                });
            }
        }

        match Session::connect(endpoint, &self.config.io) {
            Ok(session) => Ok(session.with_server(server)),
            Err(e) => {
                server.shutdown();
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("config", &self.config)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}
