//! A duplex TCP relay for connections dialed through a SOCKS5 proxy
//!
//! ## Relay
//!
//! - Features:
//!     - Concurrent uplink (client -> target) and downlink (target -> client) copy loops
//!     - Half-close on clean EOF when both connections support it
//!     - Full teardown of both connections on any transport error
//!     - Full teardown whenever either connection cannot half-close
//!     - Per-direction byte counts and close outcomes
//!
//! ## Dialing
//!
//! - SOCKS5 CONNECT client ([RFC 1928](https://datatracker.ietf.org/doc/html/rfc1928))
//! - Username/Password Authentication ([RFC 1929](https://datatracker.ietf.org/doc/html/rfc1929))
//! - Pluggable through the [`Dialer`] trait
//!
//! # Example
//! ```no_run
//! use socks_relay::{ProxyConfig, TargetAddr, TcpHandler};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProxyConfig::new("127.0.0.1", 1080)?
//!         .with_credentials(Some("user".into()), Some("pass".into()))?;
//!     let handler = TcpHandler::new(config);
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let (conn, _) = listener.accept().await?;
//!     let session = handler.handle(conn, TargetAddr::domain("example.com", 80)?).await?;
//!     let summary = session.await?;
//!     println!("{} bytes up, {} bytes down", summary.uplink.bytes, summary.downlink.bytes);
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod auth;
pub mod config;
pub mod dial;
pub mod handler;
pub mod protocol;
pub mod relay;
pub mod stream;

// Re-export main types at crate root for convenience
pub use address::TargetAddr;
pub use auth::UserPass;
pub use config::ProxyConfig;
pub use dial::{Dialer, Socks5Dialer};
pub use handler::TcpHandler;
pub use relay::{Closure, Direction, DirectionReport, RelaySummary, StreamEnd, relay};
pub use stream::{FullCloseOnly, StreamConnection};
