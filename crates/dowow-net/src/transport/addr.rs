use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A dial/listen target: either an IPv4 dotted-quad:port pair or a
/// filesystem path for a local-domain (Unix) socket. Hostnames are never
/// resolved — an unparsable or non-literal address is a `ConfigDomain`
/// error, not a DNS lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp(SocketAddrV4),
    Local(PathBuf),
}

impl Address {
    pub fn tcp(addr: SocketAddrV4) -> Self {
        Self::Tcp(addr)
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(path.into())
    }

    /// Parses `a.b.c.d:port` as TCP, anything else as a local-domain path.
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(addr) = SocketAddrV4::from_str(s) {
            return Ok(Self::Tcp(addr));
        }
        if s.is_empty() {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        Ok(Self::Local(PathBuf::from(s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_quad_port() {
        let a = Address::parse("127.0.0.1:9000").unwrap();
        assert!(matches!(a, Address::Tcp(_)));
    }

    #[test]
    fn non_tcp_string_is_a_local_path() {
        let a = Address::parse("/tmp/dowow.sock").unwrap();
        assert_eq!(a, Address::Local(PathBuf::from("/tmp/dowow.sock")));
    }

    #[test]
    fn empty_address_is_invalid() {
        assert!(Address::parse("").is_err());
    }
}
