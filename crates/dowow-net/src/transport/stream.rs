use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};

use mio::event::Source;
use mio::net::{TcpStream, UnixStream};
use mio::{Interest, Registry, Token};

use super::addr::Address;
use crate::error::{Error, Result};

/// Either half of a connected stream socket, TCP or local-domain. Owned
/// exclusively by a Connection's background loop: nothing else ever reads
/// or writes the file descriptor directly.
pub enum StreamEndpoint {
    Tcp(TcpStream),
    Local(UnixStream),
}

impl StreamEndpoint {
    /// Begins a non-blocking connect. The socket may not be writable yet;
    /// the caller polls for writability and then calls `take_socket_error`
    /// to distinguish a completed connection from a failed one.
    pub fn connect(addr: &Address) -> Result<Self> {
        match addr {
            Address::Tcp(a) => Ok(Self::Tcp(TcpStream::connect((*a).into()).map_err(Error::Transport)?)),
            Address::Local(path) => {
                Ok(Self::Local(UnixStream::connect(path).map_err(Error::Transport)?))
            }
        }
    }

    /// Reads the socket-level error sentinel (`SO_ERROR`), clearing it.
    /// `Ok(None)` means the connect succeeded.
    pub fn take_socket_error(&self) -> io::Result<Option<io::Error>> {
        take_socket_error(self.as_raw_fd())
    }

    pub fn peer_address(&self) -> io::Result<Option<Address>> {
        match self {
            Self::Tcp(s) => Ok(s.peer_addr().ok().and_then(|a| match a {
                std::net::SocketAddr::V4(v4) => Some(Address::Tcp(v4)),
                std::net::SocketAddr::V6(_) => None,
            })),
            Self::Local(s) => Ok(s.peer_addr().ok().and_then(|a| a.as_pathname().map(Address::local))),
        }
    }

    pub fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.shutdown(how),
            Self::Local(s) => s.shutdown(how),
        }
    }
}

fn take_socket_error(fd: RawFd) -> io::Result<Option<io::Error>> {
    let mut err: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    if err == 0 {
        Ok(None)
    } else {
        Ok(Some(io::Error::from_raw_os_error(err)))
    }
}

impl Read for StreamEndpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            Self::Local(s) => s.read(buf),
        }
    }
}

impl Write for StreamEndpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            Self::Local(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            Self::Local(s) => s.flush(),
        }
    }
}

impl Source for StreamEndpoint {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.register(registry, token, interests),
            Self::Local(s) => s.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.reregister(registry, token, interests),
            Self::Local(s) => s.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.deregister(registry),
            Self::Local(s) => s.deregister(registry),
        }
    }
}

impl AsRawFd for StreamEndpoint {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Self::Tcp(s) => s.as_raw_fd(),
            Self::Local(s) => s.as_raw_fd(),
        }
    }
}
