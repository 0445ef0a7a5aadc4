#![allow(dead_code)]

use std::{io, time::Duration};
use tokio::net::{TcpListener, TcpStream};

pub const DEADLINE: Duration = Duration::from_secs(5);

/// init_tracing routes relay logs into the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// tcp_pair returns both ends of a loopback TCP connection
pub async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (connected.unwrap(), accepted.unwrap().0)
}

/// expect_closed checks that draining a stream ended because the peer went
/// away: a clean EOF, or one of the errors a torn-down socket reports
pub fn expect_closed(res: io::Result<usize>) {
    match res {
        Ok(_) => {}
        Err(e) => assert!(
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            "read failed with an unexpected error: {e}"
        ),
    }
}
