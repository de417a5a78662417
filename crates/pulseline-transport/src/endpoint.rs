use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const TCP_SCHEME: &str = "tcp://";
const UNIX_SCHEME: &str = "unix://";

/// Address a session can be served on or dialed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`, resolved at bind/connect time.
    Tcp(String),
    /// Filesystem-path Unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            #[cfg(unix)]
            Endpoint::Unix(_) => "unix-domain-socket",
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "endpoint must not be empty"));
        }

        if let Some(addr) = trimmed.strip_prefix(TCP_SCHEME) {
            return parse_tcp(input, addr);
        }

        if let Some(path) = trimmed.strip_prefix(UNIX_SCHEME) {
            return parse_unix(input, path);
        }

        if trimmed.contains('/') || trimmed.starts_with('.') {
            return parse_unix(input, trimmed);
        }

        parse_tcp(input, trimmed)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
        }
    }
}

fn parse_tcp(input: &str, addr: &str) -> Result<Endpoint, TransportError> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(invalid(input, "expected host:port"));
    };
    if host.is_empty() {
        return Err(invalid(input, "host must not be empty"));
    }
    port.parse::<u16>()
        .map_err(|_| invalid(input, "port must be a number in 0-65535"))?;
    Ok(Endpoint::Tcp(addr.to_string()))
}

#[cfg(unix)]
fn parse_unix(input: &str, path: &str) -> Result<Endpoint, TransportError> {
    if path.is_empty() {
        return Err(invalid(input, "socket path must not be empty"));
    }
    Ok(Endpoint::Unix(PathBuf::from(path)))
}

#[cfg(not(unix))]
fn parse_unix(input: &str, _path: &str) -> Result<Endpoint, TransportError> {
    Err(invalid(
        input,
        "unix domain sockets are not supported on this platform",
    ))
}

fn invalid(input: &str, reason: &str) -> TransportError {
    TransportError::InvalidEndpoint {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
