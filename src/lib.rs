//! maboss-rpc - client for the MaBoSS simulation server
//!
//! Re-exports the wire protocol and the transport so applications depend on
//! a single crate.
//!
//! ```no_run
//! use maboss_rpc::{RequestEnvelope, SessionFactory};
//!
//! let factory = SessionFactory::from_env()?;
//! let mut session = factory.connect_remote("localhost", 7777)?;
//! let response = session.launch(&RequestEnvelope::new("node A { }", "$x = 1;"))?;
//! if let Some(fixed_points) = response.fixed_points() {
//!     println!("{}", String::from_utf8_lossy(fixed_points));
//! }
//! # Ok::<(), maboss_rpc::ClientError>(())
//! ```

pub use maboss_client as client;
pub use maboss_protocol as protocol;

pub use maboss_client::{
    CancelToken, ClientConfig, ClientError, Endpoint, Session, SessionFactory, SessionMode,
};
pub use maboss_protocol::{
    DecodeStatus, Decoder, Encoder, RequestEnvelope, ResponseEnvelope, Section,
};
