//! TCP server and the single-threaded event loop.
//!
//! One OS thread runs everything: the acceptor and every connection
//! driver are tasks on a current-thread runtime's `LocalSet`, woken by
//! socket readiness. Command execution, hash/tree mutation, and
//! serialization all happen inline on that thread, so the store needs no
//! locks and every operation is linearized in the order the loop runs
//! them. Within a connection, requests and responses are FIFO; across
//! connections, order follows readiness.

mod config;
mod conn;

pub use config::Config;
pub use conn::Conn;

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use tokio::net::{TcpListener, TcpSocket};
use tokio::task;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::Dict;

/// The server: a listener plus the process-global keyspace.
pub struct Server {
    listener: TcpListener,
    dict: Rc<RefCell<Dict>>,
}

impl Server {
    /// Bind the listener described by `config`. `SO_REUSEADDR` is set so
    /// restarts do not trip over sockets in TIME_WAIT.
    pub async fn bind(config: &Config) -> Result<Self> {
        config.validate()?;
        let addr = config.socket_addr()?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            dict: Rc::new(RefCell::new(Dict::new())),
        })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, spawning one driver task per socket on
    /// the current thread's `LocalSet`.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    let dict = Rc::clone(&self.dict);
                    task::spawn_local(drive(Conn::new(stream), dict));
                }
                Err(e) => {
                    // Transient accept failures (EMFILE, resets) must not
                    // take the listener down.
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Drive one connection: wait for the readiness it asked for, dispatch
/// the read handler then the write handler, and close when the state
/// machine says so. Dropping the `Conn` closes the socket on every exit
/// path.
async fn drive(mut conn: Conn, dict: Rc<RefCell<Dict>>) {
    while conn.is_live() {
        let ready = match conn.stream().ready(conn.interest()).await {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "readiness wait failed");
                break;
            }
        };
        if conn.wants_read() && (ready.is_readable() || ready.is_read_closed()) {
            // Borrow held only for the synchronous dispatch; no awaits.
            conn.handle_read(&mut dict.borrow_mut());
        }
        if conn.wants_write() && (ready.is_writable() || ready.is_write_closed()) {
            conn.handle_write();
        }
    }
    debug!("connection closed");
}

/// Library entry point: run the server on the calling thread until the
/// process exits. Builds the current-thread runtime that everything
/// above assumes.
pub fn serve(bind: &str, port: u16) -> Result<()> {
    let config = Config {
        bind: bind.to_string(),
        port,
        ..Config::default()
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;
    let local = task::LocalSet::new();
    local.block_on(&runtime, async {
        let server = Server::bind(&config).await?;
        server.run().await
    })
}
