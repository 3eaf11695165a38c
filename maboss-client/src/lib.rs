//! # maboss-client
//!
//! Client transport for the MaBoSS simulation server.
//!
//! This crate provides:
//! - Local mode: spawn a server on a private Unix socket, wait for its
//!   pidfile, connect
//! - Remote mode: connect to a running server over TCP (or a known Unix socket)
//! - One blocking request/response exchange per session
//! - Deterministic teardown of the spawned server on close or drop
//!
//! ```no_run
//! use maboss_client::SessionFactory;
//! use maboss_protocol::RequestEnvelope;
//!
//! let factory = SessionFactory::shared();
//! let mut session = factory.spawn_local()?;
//! let response = session.launch(&RequestEnvelope::new("node A { }", "$x = 1;"))?;
//! println!("status {}", response.status);
//! # Ok::<(), maboss_client::ClientError>(())
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod launcher;
pub mod readiness;
pub mod session;
pub mod stream;

#[cfg(all(test, unix))]
mod testing;

pub use config::{ClientConfig, ConfigError};
pub use endpoint::{Endpoint, EndpointAllocator, LocalEndpoint};
pub use error::ClientError;
pub use factory::SessionFactory;
pub use launcher::{CommandLauncher, LaunchCommand, ProcessLauncher, ServerProcess};
pub use readiness::{CancelToken, RetryPolicy, WaitError};
pub use session::{Session, SessionMode};
