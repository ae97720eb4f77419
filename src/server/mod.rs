//! HTTP host adapter.
//!
//! Serves an [`Application`] over HTTP/1.1 and HTTP/2 using the same dispatch
//! cycle as the CGI entry point. Each request is captured into an
//! [`Environment`](crate::core::Environment), dispatched on a blocking thread
//! and emitted through a [`ChannelOutput`] that streams into the hyper
//! response body.
//!
//! # Graceful shutdown
//!
//! [`Server::trigger_shutdown`] stops the accept loop and asks open
//! connections to finish their in-flight requests;
//! [`Server::wait_for_drain`] waits for them to close.
//!
//! ```rust,ignore
//! let server = Arc::new(Server::new(app, config.server.clone()));
//! let runner = Arc::clone(&server);
//! tokio::spawn(async move { runner.run().await });
//!
//! tokio::signal::ctrl_c().await?;
//! server.trigger_shutdown();
//! server.wait_for_drain(server.drain_timeout()).await;
//! ```

mod connection;
mod multipart;
mod output;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub use connection::{capture_environment, ConnectionContext, ResponseBody};
pub use multipart::{parse_multipart, MultipartForm};
pub use output::{body_stream, ChannelOutput, Head, DEFAULT_CHANNEL_CAPACITY};

use crate::app::Application;
use crate::config::ServerConfig;
use crate::core::Result;

const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP server for one application.
pub struct Server {
    app: Arc<Application>,
    config: ServerConfig,
    active_connections: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    shutdown_initiated: AtomicBool,
}

impl Server {
    pub fn new(app: Arc<Application>, config: ServerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            app,
            config,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    /// Number of open connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout
    }

    /// Bind the configured address. Must be called inside a Tokio runtime.
    pub fn bind(&self) -> Result<TcpListener> {
        let listener = create_listener(self.config.listen_addr)?;
        Ok(TcpListener::from_std(listener)?)
    }

    /// Bind and serve until shutdown is triggered.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown is triggered.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        self.app.boot();

        let ctx = Arc::new(ConnectionContext {
            app: Arc::clone(&self.app),
            local_addr,
            max_body_size: self.config.max_body_size,
            header_timeout: HEADER_READ_TIMEOUT,
            active_connections: Arc::clone(&self.active_connections),
        });

        info!(
            "Server listening on http://{} (app: {}, routes: {})",
            local_addr,
            self.app.config().app.name,
            self.app.router().len()
        );

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);
                    let keepalive = TcpKeepalive::new()
                        .with_time(Duration::from_secs(5))
                        .with_interval(Duration::from_secs(1))
                        .with_retries(3);
                    let _ = SockRef::from(&stream).set_tcp_keepalive(&keepalive);

                    let ctx = Arc::clone(&ctx);
                    let conn_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Stop accepting and ask connections to close after their current
    /// request.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for active connections to drain.
    /// Returns true if drained, false if `timeout` was reached first.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_connections();
            if active == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }
            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.listen_addr)
            .field("active_connections", &self.active_connections())
            .finish()
    }
}

fn create_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}
