use crate::auth::UserPass;
use anyhow::{Result, bail};
use std::fmt;

/// ProxyConfig describes the upstream SOCKS5 proxy every outbound
/// connection is dialed through. Built once and shared read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub proxy_host: String,
    pub proxy_port: u16,
    pub auth: Option<UserPass>,
}

/// ProxyConfig implementation block
impl ProxyConfig {
    /// new is a constructor for an unauthenticated proxy
    pub fn new(proxy_host: impl Into<String>, proxy_port: u16) -> Result<Self> {
        let proxy_host = proxy_host.into();

        if proxy_host.is_empty() {
            bail!("[ERR] proxy host must not be empty");
        }

        Ok(Self {
            proxy_host,
            proxy_port,
            auth: None,
        })
    }

    /// with_auth applies the desired authentication
    pub fn with_auth(mut self, auth: Option<UserPass>) -> Self {
        self.auth = auth;
        self
    }

    /// with_credentials takes raw optional username/password values and
    /// fails when only one of them is supplied
    pub fn with_credentials(
        self,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let auth = UserPass::from_parts(username, password)?;
        Ok(self.with_auth(auth))
    }

    /// proxy_endpoint returns a value tokio can resolve and connect to
    pub fn proxy_endpoint(&self) -> (&str, u16) {
        (self.proxy_host.as_str(), self.proxy_port)
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.proxy_host.contains(':') {
            write!(f, "[{}]:{}", self.proxy_host, self.proxy_port)
        } else {
            write!(f, "{}:{}", self.proxy_host, self.proxy_port)
        }
    }
}
