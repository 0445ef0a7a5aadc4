use crate::protocol::AddressType;
use anyhow::{Result, anyhow, bail};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// TargetAddr is the destination a dialer connects to: either a resolved
/// socket address or a domain name left for the proxy to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ip(SocketAddr),
    Domain(String, u16),
}

/// TargetAddr implementation block
impl TargetAddr {
    /// domain builds a domain target, rejecting names that do not fit
    /// the single SOCKS5 length octet
    pub fn domain(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();

        if host.is_empty() {
            bail!("[ERR] domain name cannot be empty");
        }

        if host.len() > u8::MAX as usize {
            bail!("[ERR] domain name too long: {} (max 255 bytes)", host.len());
        }

        Ok(TargetAddr::Domain(host, port))
    }

    /// port returns the destination port
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// write_to appends the address in SOCKS5 request layout
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        // +------+----------+----------+
        // | ATYP | DST.ADDR | DST.PORT |
        // +------+----------+----------+
        // |  1   | Variable |    2     |
        // +------+----------+----------+
        match self {
            TargetAddr::Ip(SocketAddr::V4(addr)) => {
                buf.push(AddressType::IPv4 as u8);
                buf.extend_from_slice(&addr.ip().octets());
            }
            TargetAddr::Ip(SocketAddr::V6(addr)) => {
                buf.push(AddressType::IPv6 as u8);
                buf.extend_from_slice(&addr.ip().octets());
            }
            TargetAddr::Domain(host, _) => {
                // Length is checked on construction
                buf.push(AddressType::DomainName as u8);
                buf.push(host.len() as u8);
                buf.extend_from_slice(host.as_bytes());
            }
        }

        buf.extend_from_slice(&self.port().to_be_bytes());
    }

    /// read_from parses an ATYP-prefixed address and port from a stream,
    /// e.g. the BND.ADDR of a proxy reply
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        // Read address type byte from stream
        let mut atype = [0u8; 1];
        reader.read_exact(&mut atype).await?;

        let addr = match AddressType::from_byte(atype[0]) {
            Some(AddressType::IPv4) => {
                let mut addr = [0u8; 4];
                reader.read_exact(&mut addr).await?;
                let port = read_port(reader).await?;

                TargetAddr::Ip(SocketAddr::new(Ipv4Addr::from(addr).into(), port))
            }
            Some(AddressType::DomainName) => {
                // First octet in DomainName contains the number of
                // octets to follow
                let mut len = [0u8; 1];
                reader.read_exact(&mut len).await?;

                let mut domain = vec![0u8; len[0] as usize];
                reader.read_exact(&mut domain).await?;
                let domain = String::from_utf8(domain)
                    .map_err(|e| anyhow!("[ERR] invalid domain: {e}"))?;
                let port = read_port(reader).await?;

                // Proxies may report an empty BND.ADDR, so skip the
                // construction checks here
                TargetAddr::Domain(domain, port)
            }
            Some(AddressType::IPv6) => {
                let mut addr = [0u8; 16];
                reader.read_exact(&mut addr).await?;
                let port = read_port(reader).await?;

                TargetAddr::Ip(SocketAddr::new(Ipv6Addr::from(addr).into(), port))
            }
            None => bail!("[ERR] unknown address type: {:#04x}", atype[0]),
        };

        Ok(addr)
    }
}

/// read_port reads a network-order port
async fn read_port<R>(reader: &mut R) -> Result<u16>
where
    R: AsyncRead + Unpin,
{
    let mut port_buf = [0u8; 2];
    reader.read_exact(&mut port_buf).await?;
    Ok(u16::from_be_bytes(port_buf))
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{addr}"),
            TargetAddr::Domain(host, port) => write!(f, "{host}:{port}"),
        }
    }
}
