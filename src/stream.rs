use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// StreamConnection is a bidirectional byte stream the relay can take apart
/// into a read end and a write end owned by different tasks.
///
/// Closing the write end (`AsyncWriteExt::shutdown`) signals end-of-stream to
/// the peer, dropping the read end stops reading. When
/// [`supports_half_close`](StreamConnection::supports_half_close) is false
/// the transport can only be torn down as a whole, and the relay never
/// attempts a partial shutdown on it.
pub trait StreamConnection: Send + 'static {
    type Reader: AsyncRead + Send + Unpin + 'static;
    type Writer: AsyncWrite + Send + Unpin + 'static;

    /// Whether one direction can be shut down while the other keeps flowing.
    fn supports_half_close(&self) -> bool;

    fn into_split(self) -> (Self::Reader, Self::Writer);
}

impl StreamConnection for TcpStream {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    fn supports_half_close(&self) -> bool {
        true
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        TcpStream::into_split(self)
    }
}

#[cfg(unix)]
impl StreamConnection for tokio::net::UnixStream {
    type Reader = tokio::net::unix::OwnedReadHalf;
    type Writer = tokio::net::unix::OwnedWriteHalf;

    fn supports_half_close(&self) -> bool {
        true
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        tokio::net::UnixStream::into_split(self)
    }
}

// In-memory pipe, shutting down the write side gives the peer EOF
impl StreamConnection for DuplexStream {
    type Reader = ReadHalf<DuplexStream>;
    type Writer = WriteHalf<DuplexStream>;

    fn supports_half_close(&self) -> bool {
        true
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        tokio::io::split(self)
    }
}

/// FullCloseOnly wraps a stream whose transport cannot close one direction
/// independently, e.g. a tunnel or a TLS session. The relay always tears
/// both connections down when a direction on it finishes
#[derive(Debug)]
pub struct FullCloseOnly<S>(pub S);

impl<S> StreamConnection for FullCloseOnly<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Reader = ReadHalf<S>;
    type Writer = WriteHalf<S>;

    fn supports_half_close(&self) -> bool {
        false
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        tokio::io::split(self.0)
    }
}
