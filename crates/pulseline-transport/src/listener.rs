#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// Default permission mode for created socket paths.
#[cfg(unix)]
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS and the BSDs.
#[cfg(target_os = "linux")]
const MAX_SOCKET_PATH_LEN: usize = 108;
#[cfg(all(unix, not(target_os = "linux")))]
const MAX_SOCKET_PATH_LEN: usize = 104;

/// Accepts incoming connections on an [`Endpoint`].
pub struct Listener {
    inner: ListenerInner,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixSocketListener),
}

#[cfg(unix)]
struct UnixSocketListener {
    listener: tokio::net::UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
    accepted: AtomicU64,
}

impl Listener {
    /// Bind and listen on `endpoint`.
    ///
    /// For Unix sockets, a stale socket file at the path is removed first;
    /// any other kind of file is left alone and the bind fails.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str()).await.map_err(|source| {
                    TransportError::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    }
                })?;
                info!(%endpoint, "listening on tcp");
                Ok(Self {
                    inner: ListenerInner::Tcp(listener),
                })
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let listener = UnixSocketListener::bind(path, DEFAULT_SOCKET_MODE)?;
                info!(%endpoint, "listening on unix domain socket");
                Ok(Self {
                    inner: ListenerInner::Unix(listener),
                })
            }
        }
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<NetStream> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!(%addr, "accepted tcp connection");
                NetStream::from_tcp(stream).map_err(TransportError::Accept)
            }
            #[cfg(unix)]
            ListenerInner::Unix(unix) => {
                let (stream, _addr) = unix
                    .listener
                    .accept()
                    .await
                    .map_err(TransportError::Accept)?;
                let n = unix.accepted.fetch_add(1, Ordering::Relaxed) + 1;
                let label = format!("{}#{n}", unix.path.display());
                debug!(peer = %label, "accepted unix connection");
                Ok(NetStream::from_unix(stream, label))
            }
        }
    }

    /// The endpoint actually bound. For TCP this carries the resolved port,
    /// which matters when binding port 0.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match &self.inner {
            ListenerInner::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            ListenerInner::Unix(unix) => Ok(Endpoint::Unix(unix.path.clone())),
        }
    }
}

/// Dial `endpoint` and return the connected stream.
pub async fn connect(endpoint: &Endpoint) -> Result<NetStream> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr.as_str()).await.map_err(|source| {
                TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                }
            })?;
            debug!(%endpoint, "connected over tcp");
            NetStream::from_tcp(stream).map_err(TransportError::Io)
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path)
                .await
                .map_err(|source| TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            debug!(%endpoint, "connected to unix domain socket");
            Ok(NetStream::from_unix(stream, path.display().to_string()))
        }
    }
}

#[cfg(unix)]
impl UnixSocketListener {
    fn bind(path: &Path, mode: u32) -> Result<Self> {
        let len = path.as_os_str().len();
        if len >= MAX_SOCKET_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path: path.to_path_buf(),
                len,
                max: MAX_SOCKET_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            endpoint: path.display().to_string(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path).map_err(bind_err)?;
        }

        let listener = tokio::net::UnixListener::bind(path).map_err(bind_err)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        let created = std::fs::symlink_metadata(path).map_err(bind_err)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            created_inode: (created.dev(), created.ino()),
            accepted: AtomicU64::new(0),
        })
    }
}

#[cfg(unix)]
impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket() && (metadata.dev(), metadata.ino()) == self.created_inode
        {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn tcp_bind_accept_connect() {
        let listener = Listener::bind(&"127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = connect(&endpoint).await.unwrap();
            assert_eq!(stream.transport_name(), "tcp");
            stream.write_all(b"hello").await.unwrap();
        });

        let mut server = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        assert!(server.peer_label().starts_with("127.0.0.1:"));

        client.await.unwrap();
    }

    #[tokio::test]
    async fn tcp_connect_refused_reports_endpoint() {
        // Bind then drop to obtain a port that is very likely closed.
        let endpoint = {
            let listener = Listener::bind(&"127.0.0.1:0".parse().unwrap())
                .await
                .unwrap();
            listener.local_endpoint().unwrap()
        };
        let err = connect(&endpoint).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[cfg(unix)]
    fn temp_sock(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pulseline-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("test.sock")
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn unix_bind_accept_connect_and_cleanup() {
        let sock_path = temp_sock("uds");
        let endpoint = Endpoint::Unix(sock_path.clone());
        let listener = Listener::bind(&endpoint).await.unwrap();
        assert!(sock_path.exists());

        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, DEFAULT_SOCKET_MODE);

        let dial = endpoint.clone();
        let client = tokio::spawn(async move {
            let mut stream = connect(&dial).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
        });

        let mut server = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        assert!(server.peer_label().ends_with("#1"));
        client.await.unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn unix_bind_rejects_regular_file() {
        let sock_path = temp_sock("regular");
        std::fs::write(&sock_path, b"not a socket").unwrap();

        let result = Listener::bind(&Endpoint::Unix(sock_path.clone())).await;
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(sock_path.exists());

        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn unix_path_too_long() {
        let long_path = PathBuf::from("/tmp/".to_string() + &"a".repeat(200) + ".sock");
        let result = Listener::bind(&Endpoint::Unix(long_path)).await;
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }
}
