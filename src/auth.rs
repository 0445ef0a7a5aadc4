use crate::protocol::{AuthStatus, USERPASS_VERSION};
use anyhow::{Result, bail};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// UserPass holds the username/password credentials presented
/// to the upstream proxy
#[derive(Clone, PartialEq, Eq)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

/// UserPass implementation block
impl UserPass {
    /// new validates both fields against the RFC 1929 length octets
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.is_empty() || password.is_empty() {
            bail!("[ERR] username and password must not be empty");
        }

        if username.len() > u8::MAX as usize {
            bail!("[ERR] username too long: {} (max 255 bytes)", username.len());
        }

        if password.len() > u8::MAX as usize {
            bail!("[ERR] password too long: {} (max 255 bytes)", password.len());
        }

        Ok(Self { username, password })
    }

    /// from_parts accepts either both credentials or neither. Empty
    /// strings count as absent
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Result<Option<Self>> {
        let username = username.filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());

        match (username, password) {
            (Some(u), Some(p)) => Ok(Some(Self::new(u, p)?)),
            (None, None) => Ok(None),
            _ => bail!("[ERR] must provide both username and password (or neither)"),
        }
    }
}

// Keep the password out of logs
impl fmt::Debug for UserPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPass")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// authenticate_userpass runs the client side of the RFC 1929
/// username/password sub-negotiation
pub async fn authenticate_userpass<S>(stream: &mut S, creds: &UserPass) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Client Username/Password Request
    // +----+------+----------+------+----------+
    // |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
    // +----+------+----------+------+----------+
    // | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
    // +----+------+----------+------+----------+

    // Lengths are checked when the credentials are built
    let mut request = Vec::with_capacity(3 + creds.username.len() + creds.password.len());
    request.push(USERPASS_VERSION);
    request.push(creds.username.len() as u8);
    request.extend_from_slice(creds.username.as_bytes());
    request.push(creds.password.len() as u8);
    request.extend_from_slice(creds.password.as_bytes());

    stream.write_all(&request).await?;

    // Username/Password Server response
    // +----+--------+
    // |VER | STATUS |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;

    if reply[0] != USERPASS_VERSION {
        bail!("[ERR] invalid username/password subnegotiation version: {:#04x}", reply[0]);
    }

    if reply[1] != AuthStatus::Success as u8 {
        bail!("[ERR] authentication failed");
    }

    Ok(())
}
