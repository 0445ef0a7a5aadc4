use crate::{
    address::TargetAddr,
    auth,
    config::ProxyConfig,
    protocol::{AuthMethod, Command, RSV, ReplyCode, Version},
    stream::StreamConnection,
};
use anyhow::{Context, Result, anyhow, bail};
use std::{future::Future, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

/// Dialer establishes the outbound side of a relay: given a target it
/// returns a live connection, or the reason it could not get one
pub trait Dialer: Send + Sync {
    type Stream: StreamConnection;

    fn dial(&self, target: &TargetAddr) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Socks5Dialer connects to targets through an upstream SOCKS5 proxy
#[derive(Debug, Clone)]
pub struct Socks5Dialer {
    config: Arc<ProxyConfig>,
}

/// Socks5Dialer implementation block
impl Socks5Dialer {
    /// new is a constructor for the Socks5Dialer type
    pub fn new(config: impl Into<Arc<ProxyConfig>>) -> Self {
        Self {
            config: config.into(),
        }
    }
}

impl Dialer for Socks5Dialer {
    type Stream = TcpStream;

    async fn dial(&self, target: &TargetAddr) -> Result<TcpStream> {
        // Connect to the proxy itself
        let mut stream = TcpStream::connect(self.config.proxy_endpoint())
            .await
            .with_context(|| format!("[ERR] failed to reach proxy {}", self.config))?;

        // DEBUG
        debug!("connected to proxy {}, requesting {}", self.config, target);

        connect_through(&mut stream, &self.config, target).await?;

        Ok(stream)
    }
}

/// connect_through runs the SOCKS5 client handshake on an open connection
/// to the proxy and leaves the stream positioned at the tunneled payload
pub async fn connect_through<S>(
    stream: &mut S,
    config: &ProxyConfig,
    target: &TargetAddr,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_method(stream, config).await?;
    request_connect(stream, target).await
}

/// negotiate_method offers our auth methods and completes the one
/// the proxy selects
async fn negotiate_method<S>(stream: &mut S, config: &ProxyConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // ClientHello format
    // +----+----------+----------+
    // |VER | NMETHODS | METHODS  |
    // +----+----------+----------+
    // | 1  |    1     | 1 to 255 |
    // +----+----------+----------+
    let hello: &[u8] = match config.auth {
        Some(_) => &[
            Version::SOCKS5 as u8,
            2,
            AuthMethod::NoAuth as u8,
            AuthMethod::UserPass as u8,
        ],
        None => &[Version::SOCKS5 as u8, 1, AuthMethod::NoAuth as u8],
    };
    stream.write_all(hello).await?;

    // ServerChoice method selection reply format
    // +----+--------+
    // |VER | METHOD |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+
    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;

    if choice[0] != Version::SOCKS5 as u8 {
        bail!("[ERR] proxy is not SOCKS5 (version {:#04x})", choice[0]);
    }

    // Route to appropriate auth handler
    match AuthMethod::from_byte(choice[1]) {
        Some(AuthMethod::NoAuth) => Ok(()),
        Some(AuthMethod::UserPass) => {
            let creds = config.auth.as_ref().ok_or_else(|| {
                anyhow!("[ERR] proxy demands username/password but none is configured")
            })?;
            auth::authenticate_userpass(stream, creds).await
        }
        Some(AuthMethod::NoAcceptable) => bail!("[ERR] proxy accepted none of our auth methods"),
        _ => bail!("[ERR] proxy selected unsupported auth method {:#04x}", choice[1]),
    }
}

/// request_connect sends CONNECT for the target and checks the reply
async fn request_connect<S>(stream: &mut S, target: &TargetAddr) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // SOCKS5 request format
    // +----+-----+-------+------+----------+----------+
    // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+
    let mut request = vec![Version::SOCKS5 as u8, Command::Connect as u8, RSV];
    target.write_to(&mut request);
    stream.write_all(&request).await?;

    // SOCKS5 reply format
    // +----+-----+-------+------+----------+----------+
    // |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+
    let mut head = [0u8; 3];
    stream.read_exact(&mut head).await?;

    if head[0] != Version::SOCKS5 as u8 {
        bail!("[ERR] invalid SOCKS5 reply version {:#04x}", head[0]);
    }

    match ReplyCode::from_byte(head[1]) {
        Some(ReplyCode::Succeeded) => {}
        Some(code) => bail!("[ERR] proxy refused CONNECT to {target}: {code}"),
        None => bail!("[ERR] proxy refused CONNECT to {target}: unknown reply {:#04x}", head[1]),
    }

    // Bound address is informational only
    let bound = TargetAddr::read_from(stream).await?;

    // DEBUG
    debug!("proxy bound {} for {}", bound, target);

    Ok(())
}
