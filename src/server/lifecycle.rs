//! Server lifecycle: bind, track connections, hard stop.

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer, HttpService};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// A live transport-level connection the lifecycle manager may destroy on
/// shutdown.
pub trait TrackedConnection: Send + Sync {
    /// Forcibly close the connection. Called once, during shutdown.
    fn destroy(&self) -> io::Result<()>;
}

impl TrackedConnection for TcpStream {
    fn destroy(&self) -> io::Result<()> {
        self.shutdown(std::net::Shutdown::Both)
    }
}

/// Mutable set of live connections: entries added on accept, removed on
/// close, all forcibly destroyed on shutdown.
///
/// `may` schedules coroutines across worker threads, so the set is
/// lock-protected even though each individual event callback is sequential.
#[derive(Default)]
pub struct ConnectionSet {
    connections: Mutex<HashMap<u64, Arc<dyn TrackedConnection>>>,
    next_id: AtomicU64,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection; the returned id unregisters it on close.
    pub fn track(&self, conn: Arc<dyn TrackedConnection>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().unwrap().insert(id, conn);
        id
    }

    /// Remove a connection that closed on its own.
    pub fn untrack(&self, id: u64) {
        self.connections.lock().unwrap().remove(&id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every tracked connection and empty the set. Returns how many
    /// connections were destroyed. Destruction failures are logged, not
    /// propagated; the socket is gone either way.
    pub fn destroy_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut connections = self.connections.lock().unwrap();
            connections.drain().collect()
        };
        let count = drained.len();
        for (id, conn) in drained {
            if let Err(e) = conn.destroy() {
                warn!(connection_id = id, error = %e, "Failed to destroy connection");
            }
        }
        count
    }
}

/// Handle to a running server coroutine.
struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Poll the bound address until the server accepts connections.
    fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the server coroutine and wait for it to finish. Cancellation
    /// tears down the accept loop and its per-connection coroutines.
    fn stop(self) {
        // SAFETY: cancel() is marked unsafe by the may runtime. We hold the
        // handle, the server is shutting down, and cancellation is the
        // intended teardown path.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }
}

/// Owns the transport server instance and the open-connection set.
///
/// `listen` binds and starts accepting; `close` is the hard stop: every
/// tracked connection is destroyed (no graceful drain; shutdown latency is
/// prioritized over in-flight completion) and the server coroutine is
/// cancelled. `close` on a manager that never started, or that already
/// stopped, is a no-op.
///
/// `may_minihttp` exposes no accept hook, so transport sockets reach the
/// [`ConnectionSet`] only when the embedder fronts the server with its own
/// acceptor; the coroutine cancel in `close` tears down `may_minihttp`'s own
/// connections regardless.
#[derive(Default)]
pub struct ServerLifecycle {
    handle: Option<ServerHandle>,
    connections: Arc<ConnectionSet>,
}

impl ServerLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionSet> {
        &self.connections
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.handle.is_some()
    }

    /// The bound address, once listening.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.as_ref().map(|h| h.addr)
    }

    /// Parse `"host:port"`, bind, and start accepting connections.
    /// Resolves once the server accepts TCP connections; bind and parse
    /// errors surface to the caller and are never retried.
    pub fn listen<S>(&mut self, service: S, bind_addr: &str) -> io::Result<SocketAddr>
    where
        S: HttpService + Clone + Send + Sync + 'static,
    {
        if self.handle.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "server is already listening",
            ));
        }
        let addr = bind_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid bind address"))?;

        let handle = match HttpServer(service).start(addr) {
            Ok(handle) => ServerHandle { addr, handle },
            Err(e) => {
                error!(bind_addr = %addr, error = %e, "Failed to start server");
                return Err(e);
            }
        };
        handle.wait_ready()?;
        info!(bind_addr = %addr, "Server listening");
        self.handle = Some(handle);
        Ok(addr)
    }

    /// Hard stop: destroy tracked connections, cancel the server coroutine,
    /// join it. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        let destroyed = self.connections.destroy_all();
        if let Some(handle) = self.handle.take() {
            let addr = handle.addr;
            handle.stop();
            info!(bind_addr = %addr, destroyed_connections = destroyed, "Server stopped");
        }
        Ok(())
    }
}
