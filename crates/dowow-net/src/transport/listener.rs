use std::io;
use std::mem;
use std::net::SocketAddrV4;
use std::os::fd::FromRawFd;
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::Path;

use mio::event::Source;
use mio::net::{TcpListener, UnixListener};
use mio::{Interest, Registry, Token};

use super::addr::Address;
use super::stream::StreamEndpoint;
use crate::error::{Error, Result};

/// A bound, listening endpoint. Backlog is the platform maximum
/// (`SOMAXCONN`) and TCP listeners set `SO_REUSEADDR` before binding, built
/// by hand over raw sockets so both properties are guaranteed regardless
/// of what `std::net::TcpListener::bind` defaults to.
pub enum ListenerEndpoint {
    Tcp(TcpListener),
    Local { listener: UnixListener, path: std::path::PathBuf },
}

impl ListenerEndpoint {
    pub fn bind(addr: &Address) -> Result<Self> {
        match addr {
            Address::Tcp(a) => {
                let std_listener = bind_tcp_reuseaddr(*a).map_err(Error::ListenerBind)?;
                std_listener.set_nonblocking(true).map_err(Error::Transport)?;
                Ok(Self::Tcp(TcpListener::from_std(std_listener)))
            }
            Address::Local(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let std_listener = bind_unix_backlog(path).map_err(Error::ListenerBind)?;
                std_listener.set_nonblocking(true).map_err(Error::Transport)?;
                Ok(Self::Local { listener: UnixListener::from_std(std_listener), path: path.clone() })
            }
        }
    }

    /// The address actually bound, useful when binding to port 0 and
    /// letting the OS pick one.
    pub fn local_addr(&self) -> io::Result<Address> {
        match self {
            Self::Tcp(l) => match l.local_addr()? {
                std::net::SocketAddr::V4(v4) => Ok(Address::Tcp(v4)),
                std::net::SocketAddr::V6(_) => unreachable!("TCP listener is IPv4-only"),
            },
            Self::Local { path, .. } => Ok(Address::local(path.clone())),
        }
    }

    pub fn accept(&self) -> io::Result<Option<(StreamEndpoint, Option<Address>)>> {
        let accepted = match self {
            Self::Tcp(l) => l.accept().map(|(s, a)| {
                (StreamEndpoint::Tcp(s), Some(Address::Tcp(match a {
                    std::net::SocketAddr::V4(v4) => v4,
                    std::net::SocketAddr::V6(_) => unreachable!("TCP listener is IPv4-only"),
                })))
            }),
            Self::Local { listener, .. } => listener
                .accept()
                .map(|(s, a)| (StreamEndpoint::Local(s), a.as_pathname().map(Address::local))),
        };
        match accepted {
            Ok(pair) => Ok(Some(pair)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Removes the local-domain socket path. No-op for TCP.
    pub fn unlink(&self) {
        if let Self::Local { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Source for ListenerEndpoint {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Self::Tcp(l) => l.register(registry, token, interests),
            Self::Local { listener, .. } => listener.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Self::Tcp(l) => l.reregister(registry, token, interests),
            Self::Local { listener, .. } => listener.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            Self::Tcp(l) => l.deregister(registry),
            Self::Local { listener, .. } => listener.deregister(registry),
        }
    }
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn bind_tcp_reuseaddr(addr: SocketAddrV4) -> io::Result<std::net::TcpListener> {
    unsafe {
        let fd = cvt(libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0))?;
        let one: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) != 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        let mut sockaddr: libc::sockaddr_in = mem::zeroed();
        sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
        sockaddr.sin_port = addr.port().to_be();
        sockaddr.sin_addr.s_addr = u32::from_ne_bytes(addr.ip().octets());

        let bind_ret = libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if bind_ret != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, libc::SOMAXCONN) != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(std::net::TcpListener::from_raw_fd(fd))
    }
}

fn bind_unix_backlog(path: &Path) -> io::Result<StdUnixListener> {
    unsafe {
        let fd = cvt(libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0))?;

        let mut sockaddr: libc::sockaddr_un = mem::zeroed();
        sockaddr.sun_family = libc::AF_UNIX as libc::sa_family_t;
        let path_bytes = path.as_os_str().as_encoded_bytes();
        if path_bytes.len() >= sockaddr.sun_path.len() {
            libc::close(fd);
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "socket path too long"));
        }
        for (dst, src) in sockaddr.sun_path.iter_mut().zip(path_bytes.iter()) {
            *dst = *src as libc::c_char;
        }
        let addr_len = (mem::size_of::<libc::sa_family_t>() + path_bytes.len() + 1) as libc::socklen_t;

        if libc::bind(fd, &sockaddr as *const _ as *const libc::sockaddr, addr_len) != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, libc::SOMAXCONN) != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(StdUnixListener::from_raw_fd(fd))
    }
}
