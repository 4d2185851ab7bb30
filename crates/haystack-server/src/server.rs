//! A blocking, thread-per-connection HTTP/1.1 server (§4.6), and the
//! server-identity file (§6 "Persisted state").

use std::fs;
use std::io::Write as _;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use crate::error::ServerResult;
use crate::http::{read_request, write_response, Request, Response};
use crate::routes::{join_handler, read_handler, write_handler};

/// Accepts connections on `host:port` and dispatches each to one of the
/// three routes, one thread per connection, until `shutdown` is set.
pub struct Server {
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn bind(host: &str, port: u16, shutdown: Arc<AtomicBool>) -> ServerResult<Self> {
        let listener = TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        info!(host, port, "listening");
        Ok(Self { listener, shutdown })
    }

    /// Runs the accept loop inline, blocking the calling thread until
    /// `shutdown` is set (typically by a SIGINT handler).
    pub fn run(&self, log: Arc<dyn haystack_replicate::ConsensusLog>) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    let log = Arc::clone(&log);
                    thread::spawn(move || handle_connection(stream, &*log));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
        info!("shutting down");
    }
}

fn handle_connection(mut stream: TcpStream, log: &dyn haystack_replicate::ConsensusLog) {
    let _ = stream.set_nonblocking(false);
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed request");
            let _ = write_response(&mut stream, &Response::bad_request(e.to_string()));
            return;
        }
    };

    info!(method = %request.method, path = %request.path, "request");
    let response = route(&request, log);
    info!(method = %request.method, path = %request.path, status = response.status, "response");

    if let Err(e) = write_response(&mut stream, &response) {
        error!(error = %e, "failed to write response");
    }
}

fn route(request: &Request, log: &dyn haystack_replicate::ConsensusLog) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/write") => write_handler(request, log),
        ("POST", "/join") => join_handler(request, log),
        (method, path) if method == "GET" && path.starts_with("/read/") => read_route(request, log),
        _ => Response::not_found("no such route"),
    }
}

fn read_route(request: &Request, log: &dyn haystack_replicate::ConsensusLog) -> Response {
    let Some(rest) = request.path.strip_prefix("/read/") else {
        return Response::not_found("no such route");
    };
    let parts: Vec<&str> = rest.split('/').collect();
    let [vid, offset, size, cookie] = parts[..] else {
        return Response::bad_request("expected /read/{vid}/{offset}/{size}/{cookie}");
    };

    let (Ok(vid), Ok(offset), Ok(size), Ok(cookie)) =
        (vid.parse::<u32>(), offset.parse::<u64>(), size.parse::<u32>(), cookie.parse::<u32>())
    else {
        return Response::bad_request("malformed read path segments");
    };

    read_handler(haystack_types::VolumeId::new(vid), offset, size, cookie, log)
}

/// Loads this node's stable 7-hex-digit consensus identity from
/// `<data_path>/name`, generating and persisting one on first start.
pub fn load_or_create_identity(data_path: &Path) -> ServerResult<String> {
    let name_path = data_path.join("name");
    if let Ok(existing) = fs::read_to_string(&name_path) {
        let trimmed = existing.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
    }

    let name: String = (0..7)
        .map(|_| {
            let digit = rand::thread_rng().gen_range(0..16);
            std::char::from_digit(digit, 16).expect("0..16 is a valid hex digit")
        })
        .collect();

    fs::create_dir_all(data_path)?;
    let mut file = fs::File::create(&name_path)?;
    file.write_all(name.as_bytes())?;
    info!(name = %name, "generated consensus identity");
    Ok(name)
}
