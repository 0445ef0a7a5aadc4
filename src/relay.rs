//! Duplex relay between an inbound (near) and an outbound (far) connection.
//!
//! Each direction is copied by its own loop. When a loop ends on a clean EOF
//! and both connections support it, only that direction is shut down and the
//! other keeps flowing. Any other ending tears both connections down.

use crate::stream::StreamConnection;
use std::{fmt, io};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// Per-direction copy buffer
const RELAY_BUF_SIZE: usize = 16 * 1024;

/// Direction of a copy loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// near -> far
    Uplink,
    /// far -> near
    Downlink,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Uplink => f.write_str("uplink"),
            Direction::Downlink => f.write_str("downlink"),
        }
    }
}

/// StreamEnd records how a copy loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source returned end-of-stream without an error
    CleanEof,
    /// A read or write failed, or the other direction tore the pair down
    TransportError(io::ErrorKind),
}

/// Closure is the terminal state of one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Only this direction was shut down
    HalfClosed,
    /// Both connections were torn down
    FullyClosed,
}

impl Closure {
    /// decide applies the shutdown policy: a clean EOF half-closes when
    /// both connections allow it, everything else closes fully
    pub fn decide(end: StreamEnd, half_close: bool) -> Self {
        match end {
            StreamEnd::CleanEof if half_close => Closure::HalfClosed,
            _ => Closure::FullyClosed,
        }
    }
}

/// DirectionReport describes one finished direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionReport {
    pub direction: Direction,
    /// Bytes written to the destination
    pub bytes: u64,
    pub end: StreamEnd,
    pub closure: Closure,
}

/// RelaySummary is what a finished relay reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub uplink: DirectionReport,
    pub downlink: DirectionReport,
}

impl RelaySummary {
    /// fully_closed is true when either direction tore the pair down
    pub fn fully_closed(&self) -> bool {
        self.uplink.closure == Closure::FullyClosed || self.downlink.closure == Closure::FullyClosed
    }
}

/// relay copies near -> far on a spawned task and far -> near on the
/// calling task, returning once both directions have terminated.
///
/// Errors never escape: a clean EOF half-closes its direction when both
/// connections support it, anything else fully closes both connections.
/// Dropping the returned future tears the pair down as well.
pub async fn relay<N, F>(near: N, far: F) -> RelaySummary
where
    N: StreamConnection,
    F: StreamConnection,
{
    // Half-close is only expressible when both ends support it
    let half_close = near.supports_half_close() && far.supports_half_close();

    let (near_reader, near_writer) = near.into_split();
    let (far_reader, far_writer) = far.into_split();

    // Cancelled on full close, or when this future is dropped
    let teardown = CancellationToken::new();
    let _guard = teardown.clone().drop_guard();

    // Uplink runs on its own task and signals once it is done
    let (done_tx, done_rx) = oneshot::channel();
    let uplink = Pipe::new(Direction::Uplink, half_close, teardown.clone());
    tokio::spawn(async move {
        let report = uplink.run(near_reader, far_writer).await;
        let _ = done_tx.send(report);
    });

    // Downlink runs inline
    let downlink = Pipe::new(Direction::Downlink, half_close, teardown.clone())
        .run(far_reader, near_writer)
        .await;

    let uplink = match done_rx.await {
        Ok(report) => report,
        Err(_) => {
            warn!("uplink task ended without reporting, tearing down");
            teardown.cancel();
            DirectionReport {
                direction: Direction::Uplink,
                bytes: 0,
                end: StreamEnd::TransportError(io::ErrorKind::Other),
                closure: Closure::FullyClosed,
            }
        }
    };

    // DEBUG
    info!(
        "relay finished: {} bytes uplink ({:?}), {} bytes downlink ({:?})",
        uplink.bytes, uplink.closure, downlink.bytes, downlink.closure
    );

    RelaySummary { uplink, downlink }
}

/// Pipe is one direction of the relay
struct Pipe {
    direction: Direction,
    half_close: bool,
    teardown: CancellationToken,
}

impl Pipe {
    fn new(direction: Direction, half_close: bool, teardown: CancellationToken) -> Self {
        Self {
            direction,
            half_close,
            teardown,
        }
    }

    /// run copies until EOF or error, then applies the close decision.
    /// Takes ownership of both ends so that returning releases them
    async fn run<R, W>(self, mut reader: R, mut writer: W) -> DirectionReport
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut bytes = 0u64;

        let end = match self.copy(&mut reader, &mut writer, &mut bytes).await {
            Ok(()) => StreamEnd::CleanEof,
            Err(e) => {
                debug!("{} interrupted after {} bytes: {}", self.direction, bytes, e);
                StreamEnd::TransportError(e.kind())
            }
        };

        let closure = Closure::decide(end, self.half_close);

        match closure {
            Closure::HalfClosed => {
                // Stop reading the source
                drop(reader);

                // Signal EOF downstream, unless the pair is being torn down anyway
                tokio::select! {
                    res = writer.shutdown() => {
                        if let Err(e) = res {
                            debug!("{} write shutdown failed: {}", self.direction, e);
                        }
                    }
                    _ = self.teardown.cancelled() => {}
                }
            }
            Closure::FullyClosed => {
                // Wakes the other direction, which then drops its ends too
                self.teardown.cancel();
                drop(reader);
                drop(writer);
            }
        }

        debug!(
            "{} closed: {:?} after {} bytes, {:?}",
            self.direction, end, bytes, closure
        );

        DirectionReport {
            direction: self.direction,
            bytes,
            end,
            closure,
        }
    }

    /// copy moves bytes from reader to writer until the reader is exhausted.
    /// Every suspension point also watches the teardown signal
    async fn copy<R, W>(&self, reader: &mut R, writer: &mut W, bytes: &mut u64) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; RELAY_BUF_SIZE];

        loop {
            let n = tokio::select! {
                biased;
                _ = self.teardown.cancelled() => return Err(torn_down()),
                res = reader.read(&mut buf) => res?,
            };

            if n == 0 {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = self.teardown.cancelled() => return Err(torn_down()),
                res = write_chunk(writer, &buf[..n]) => res?,
            }

            *bytes += n as u64;
        }
    }
}

async fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(chunk).await?;
    writer.flush().await
}

fn torn_down() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "relay torn down")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FullCloseOnly;
    use std::time::Duration;
    use tokio::io::duplex;
    use tokio::time::timeout;

    #[test]
    fn policy_table() {
        let reset = StreamEnd::TransportError(io::ErrorKind::ConnectionReset);

        assert_eq!(Closure::decide(StreamEnd::CleanEof, true), Closure::HalfClosed);
        assert_eq!(Closure::decide(StreamEnd::CleanEof, false), Closure::FullyClosed);
        assert_eq!(Closure::decide(reset, true), Closure::FullyClosed);
        assert_eq!(Closure::decide(reset, false), Closure::FullyClosed);
    }

    #[tokio::test]
    async fn half_close_keeps_downlink_flowing() {
        let (mut client, near) = duplex(1024);
        let (far, mut server) = duplex(1024);

        let relay = tokio::spawn(relay(near, far));

        client.write_all(b"ping").await.unwrap();
        client.shutdown().await.unwrap();

        // Server sees the payload, then EOF
        let mut got = Vec::new();
        server.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"ping");

        // The other direction still works
        server.write_all(b"pong").await.unwrap();
        server.shutdown().await.unwrap();

        let mut got = Vec::new();
        client.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"pong");

        let summary = timeout(Duration::from_secs(5), relay).await.unwrap().unwrap();
        assert_eq!(summary.uplink.end, StreamEnd::CleanEof);
        assert_eq!(summary.uplink.closure, Closure::HalfClosed);
        assert_eq!(summary.uplink.bytes, 4);
        assert_eq!(summary.downlink.closure, Closure::HalfClosed);
        assert_eq!(summary.downlink.bytes, 4);
        assert!(!summary.fully_closed());
    }

    #[tokio::test]
    async fn missing_capability_degrades_to_full_close() {
        let (mut client, near) = duplex(1024);
        let (far, mut server) = duplex(1024);

        let relay = tokio::spawn(relay(FullCloseOnly(near), far));

        client.shutdown().await.unwrap();

        // Far is torn down entirely: EOF on read
        let mut got = Vec::new();
        server.read_to_end(&mut got).await.unwrap();
        assert!(got.is_empty());

        let summary = timeout(Duration::from_secs(5), relay).await.unwrap().unwrap();
        assert_eq!(summary.uplink.end, StreamEnd::CleanEof);
        assert_eq!(summary.uplink.closure, Closure::FullyClosed);
        assert_eq!(
            summary.downlink.end,
            StreamEnd::TransportError(io::ErrorKind::ConnectionAborted)
        );
        assert_eq!(summary.downlink.closure, Closure::FullyClosed);
    }
}
