use crate::{
    address::TargetAddr,
    config::ProxyConfig,
    dial::{Dialer, Socks5Dialer},
    relay::{RelaySummary, relay},
    stream::StreamConnection,
};
use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

/// TcpHandler bridges accepted client connections to their targets:
/// it dials the target, then relays between the two connections
#[derive(Debug, Clone)]
pub struct TcpHandler<D = Socks5Dialer> {
    dialer: D,
}

impl TcpHandler<Socks5Dialer> {
    /// new builds a handler that dials through the configured SOCKS5 proxy
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_dialer(Socks5Dialer::new(config))
    }
}

/// TcpHandler implementation block
impl<D: Dialer> TcpHandler<D> {
    /// with_dialer uses any dialer for the outbound side
    pub fn with_dialer(dialer: D) -> Self {
        Self { dialer }
    }

    /// handle dials `target` and starts relaying `conn` to it on a new task.
    ///
    /// Dial failures are returned before any relaying starts. The returned
    /// handle resolves once both relay directions have terminated
    pub async fn handle<C>(&self, conn: C, target: TargetAddr) -> Result<JoinHandle<RelaySummary>>
    where
        C: StreamConnection,
    {
        let outbound = self
            .dialer
            .dial(&target)
            .await
            .with_context(|| format!("[ERR] failed to connect to {target}"))?;

        let relay_target = target.clone();
        let session = tokio::spawn(async move {
            let summary = relay(conn, outbound).await;

            // DEBUG
            info!(
                "connection to {} closed: {} bytes from client, {} bytes from server",
                relay_target, summary.uplink.bytes, summary.downlink.bytes
            );

            summary
        });

        // DEBUG
        info!("new proxy connection to {}", target);

        Ok(session)
    }
}
