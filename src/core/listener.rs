//! Local registration channel: one job id per connection.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::engine::{Intake, IntakeSender};
use crate::core::error::{IngestionError, JobwatchError};
use crate::core::registry::JobRegistry;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

const MAX_REQUEST_BYTES: usize = 1024;
const MAX_ID_LEN: usize = 128;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

static RE_JOB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

/// Decodes one registration request into a job id.
pub fn parse_request(bytes: &[u8]) -> Result<String, IngestionError> {
    if bytes.len() > MAX_REQUEST_BYTES {
        return Err(IngestionError::TooLong {
            limit: MAX_REQUEST_BYTES,
        });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| IngestionError::NotUtf8)?;
    let id = text.trim();
    if id.is_empty() {
        return Err(IngestionError::Empty);
    }
    if id.len() > MAX_ID_LEN || !RE_JOB_ID.is_match(id) {
        return Err(IngestionError::InvalidId(id.to_string()));
    }
    Ok(id.to_string())
}

/// Accepts registrations and forwards them to the engine once persisted.
pub struct IngestionListener {
    listener: TcpListener,
    registry: JobRegistry,
    intake: IntakeSender,
    accepted: u64,
    rejected: u64,
}

impl IngestionListener {
    pub fn bind(
        addr: &str,
        registry: JobRegistry,
        intake: IntakeSender,
    ) -> Result<Self, JobwatchError> {
        let listener = TcpListener::bind(addr).map_err(|source| JobwatchError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self {
            listener,
            registry,
            intake,
            accepted: 0,
            rejected: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("ingestion".to_string())
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, "accepting job registrations");
        }
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
                        tracing::warn!(%peer, "could not set read timeout: {err}");
                    }
                    let _ = self.handle_connection(stream);
                }
                Err(err) => tracing::warn!("accept failed: {err}"),
            }
        }
    }

    /// Serves one request: read, apply, acknowledge. The stream is closed on return.
    pub fn handle_connection<S: Read + Write>(
        &mut self,
        mut stream: S,
    ) -> Result<String, IngestionError> {
        let result = read_request(&mut stream).and_then(|bytes| self.apply(&bytes));

        let reply = match &result {
            Ok(id) => {
                self.accepted += 1;
                format!("GOT: {id}\n")
            }
            Err(err) => {
                self.rejected += 1;
                tracing::warn!(rejected = self.rejected, "registration rejected: {err}");
                format!("ERR: {err}\n")
            }
        };
        if let Err(err) = stream.write_all(reply.as_bytes()).and_then(|_| stream.flush()) {
            tracing::debug!("could not send acknowledgement: {err}");
        }
        result
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn apply(&mut self, bytes: &[u8]) -> Result<String, IngestionError> {
        let id = parse_request(bytes)?;
        let newly_added = self.registry.register(&id)?;
        tracing::info!(job = %id, newly_added, "registration persisted");

        let intake = Intake {
            id: id.clone(),
            announce: newly_added,
        };
        if self.intake.send(intake).is_err() {
            tracing::warn!(job = %id, "engine stopped; job will be picked up on next start");
        }
        Ok(id)
    }
}

/// Reads until newline, EOF, or the size limit. A read timeout ends the
/// request if some bytes have already arrived.
fn read_request<R: Read>(reader: &mut R) -> Result<Vec<u8>, IngestionError> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.len() > MAX_REQUEST_BYTES {
                    return Err(IngestionError::TooLong {
                        limit: MAX_REQUEST_BYTES,
                    });
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) && !request.is_empty() =>
            {
                break
            }
            Err(err) => return Err(IngestionError::Io(err)),
        }
    }
    Ok(request)
}

/// Client side of the channel: asks a running instance to watch `id`.
pub fn send_registration(addr: &str, id: &str) -> Result<String, JobwatchError> {
    let mut stream = TcpStream::connect(addr).map_err(|source| JobwatchError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.write_all(id.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    let reply = reply.trim().to_string();
    if let Some(reason) = reply.strip_prefix("ERR:") {
        return Err(JobwatchError::Rejected(reason.trim().to_string()));
    }
    Ok(reply)
}
