use log::{debug, info, warn};
use std::io::{self, BufReader, BufWriter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ServerConfig;
use crate::file_serving::handle_request_cancellable;
use crate::http::{read_request, ResponseWriter};
use crate::log_error;

/// How long a connection may take to deliver its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept, so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Static file server. Each accepted connection is served on its own thread.
pub struct Server {
    config: Arc<ServerConfig>,
    running: Option<Running>,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
    acceptor: JoinHandle<()>,
}

/// Count of connections still being served.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        InFlightGuard(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(|e| e.into_inner());
        }
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap_or_else(|e| e.into_inner());
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

impl Server {
    /// Refuses to build a server around an unusable configuration.
    pub fn new(config: ServerConfig) -> io::Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            running: None,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Binds and starts accepting in the background. Port 0 picks a free port;
    /// the bound address is returned.
    pub fn listen(&mut self, port: u16, address: &str) -> io::Result<SocketAddr> {
        if self.running.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "server is already listening",
            ));
        }

        let listener = TcpListener::bind((address, port))?;
        let local_addr = listener.local_addr()?;
        info!("Listening on: {}", local_addr);
        info!("Serving directory: {}", self.config.document_root.display());

        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(InFlight::default());

        let acceptor = {
            let config = Arc::clone(&self.config);
            let shutdown = Arc::clone(&shutdown);
            let in_flight = Arc::clone(&in_flight);
            thread::spawn(move || accept_loop(listener, config, shutdown, in_flight))
        };

        self.running = Some(Running {
            local_addr,
            shutdown,
            in_flight,
            acceptor,
        });
        Ok(local_addr)
    }

    /// Blocks for as long as the server accepts connections.
    pub fn wait(&mut self) {
        if let Some(running) = self.running.take() {
            if running.acceptor.join().is_err() {
                warn!("Accept loop panicked");
            }
            running.in_flight.wait_idle();
        }
    }

    /// Stops accepting, lets every in-flight response finish, then calls
    /// `callback`.
    pub fn close<F: FnOnce()>(&mut self, callback: F) -> io::Result<()> {
        if let Some(running) = self.running.take() {
            info!("Shutting down {}", running.local_addr);
            running.shutdown.store(true, Ordering::SeqCst);

            // Wake the blocking accept so it can observe the flag
            if let Err(e) = TcpStream::connect(wake_addr(running.local_addr)) {
                debug!("Wake-up connection failed: {}", e);
            }

            if running.acceptor.join().is_err() {
                warn!("Accept loop panicked");
            }
            running.in_flight.wait_idle();
            info!("All connections finished");
        }

        callback();
        Ok(())
    }
}

fn wake_addr(local_addr: SocketAddr) -> SocketAddr {
    match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local_addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local_addr.port())
        }
        _ => local_addr,
    }
}

fn accept_loop(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
) {
    for stream in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log_error!(e, "Error accepting connection");
                thread::sleep(ACCEPT_BACKOFF);
                continue;
            }
        };

        let guard = in_flight.enter();
        let config = Arc::clone(&config);
        thread::spawn(move || {
            let _guard = guard;
            if let Err(e) = handle_connection(stream, &config) {
                log_error!(e, "Error handling connection");
            }
        });
    }
    debug!("Accept loop stopped");
}

/// One request per connection. A client that disconnects while its response
/// is being delayed gets nothing; returning drops the stream and any open file.
pub fn handle_connection(client: TcpStream, config: &ServerConfig) -> io::Result<()> {
    debug!(
        "New connection from {}",
        client
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    );

    client.set_read_timeout(Some(REQUEST_READ_TIMEOUT))?;
    let mut reader = BufReader::new(&client);
    let request = match read_request(&mut reader)? {
        Some(request) => request,
        None => {
            debug!("Connection closed before a request was sent");
            return Ok(());
        }
    };

    let client_gone = || peer_gone(&client);
    let mut out = ResponseWriter::new(BufWriter::new(&client));
    handle_request_cancellable(config, &request, &mut out, &client_gone)?;
    out.flush()
}

/// Whether the client has closed or reset the connection. Only called once
/// the request head has been read, so end-of-stream means the client left.
fn peer_gone(client: &TcpStream) -> bool {
    if let Err(e) = client.set_nonblocking(true) {
        debug!("Cannot check connection state: {}", e);
        return false;
    }

    let mut buf = [0u8; 1];
    let gone = match client.peek(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => !matches!(
            e.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ),
    };

    if let Err(e) = client.set_nonblocking(false) {
        debug!("Failed to restore blocking mode: {}", e);
        return true;
    }
    gone
}
