use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{
    config::DeviceConfig,
    device::{
        command::{Ack, DeviceCommand},
        connection::DeviceLink,
    },
    foundation::error::{PixooError, PixooResult, TransferError},
};

/// Request path every panel command is posted to.
pub const COMMAND_PATH: &str = "/post";

const MAX_HEADER_LINES: usize = 64;
const MAX_BODY_BYTES: usize = 1 << 20;

/// Panel link issuing one short-lived HTTP/1.1 request per command.
#[derive(Clone, Debug)]
pub struct HttpLink {
    addr: SocketAddr,
    host: String,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpLink {
    /// Resolve `device` using the port and timeouts in `cfg`.
    ///
    /// Accepts `host`, `host:port`, a bare IPv6 address, or `[v6]` / `[v6]:port`.
    pub fn new(device: &str, cfg: &DeviceConfig) -> PixooResult<Self> {
        let (host, port) = split_host_port(device, cfg.port)?;
        if host.is_empty() {
            return Err(PixooError::validation("device host must not be empty"));
        }
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| PixooError::validation(format!("resolve '{device}': {e}")))?
            .next()
            .ok_or_else(|| PixooError::validation(format!("'{device}' has no address")))?;

        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        Ok(Self {
            addr,
            host,
            command_timeout: Duration::from_millis(cfg.command_timeout_ms),
            probe_timeout: Duration::from_millis(cfg.probe_timeout_ms),
        })
    }

    /// Resolved device address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn round_trip(&self, body: &[u8], timeout: Duration) -> Result<Ack, TransferError> {
        let mut stream =
            TcpStream::connect_timeout(&self.addr, timeout).map_err(TransferError::from_io)?;
        stream
            .set_read_timeout(Some(timeout))
            .map_err(TransferError::from_io)?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(TransferError::from_io)?;

        let head = format!(
            "POST {COMMAND_PATH} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            self.host,
            body.len()
        );
        stream
            .write_all(head.as_bytes())
            .and_then(|_| stream.write_all(body))
            .and_then(|_| stream.flush())
            .map_err(TransferError::from_io)?;

        let (status, body) = read_response(&mut BufReader::new(stream))?;
        if status != 200 {
            return Err(TransferError::Http { status });
        }
        Ack::from_body(&body)
    }
}

impl DeviceLink for HttpLink {
    fn send(&mut self, cmd: &DeviceCommand) -> Result<Ack, TransferError> {
        let timeout = match cmd {
            DeviceCommand::Probe => self.probe_timeout,
            _ => self.command_timeout,
        };
        let body = cmd.to_json()?;
        self.round_trip(&body, timeout)
    }
}

fn split_host_port(device: &str, default_port: u16) -> PixooResult<(&str, u16)> {
    let parse_port = |p: &str| {
        p.parse::<u16>()
            .map_err(|_| PixooError::validation(format!("invalid port in '{device}'")))
    };
    if let Some(rest) = device.strip_prefix('[') {
        let Some((host, tail)) = rest.split_once(']') else {
            return Err(PixooError::validation(format!("unclosed '[' in '{device}'")));
        };
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(p)?,
            None if tail.is_empty() => default_port,
            None => {
                return Err(PixooError::validation(format!(
                    "unexpected '{tail}' after ']' in '{device}'"
                )));
            }
        };
        return Ok((host, port));
    }
    match device.rsplit_once(':') {
        Some((h, p)) if !h.contains(':') => Ok((h, parse_port(p)?)),
        _ => Ok((device, default_port)),
    }
}

/// Read one HTTP/1.x response: status code and body.
///
/// Bodies are delimited by `Content-Length`, chunked encoding, or end of stream.
pub(crate) fn read_response<R: BufRead>(r: &mut R) -> Result<(u16, Vec<u8>), TransferError> {
    let status_line = read_line(r)?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .filter(|_| status_line.starts_with("HTTP/"))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| TransferError::protocol(format!("bad status line '{status_line}'")))?;

    let mut content_length = None;
    let mut chunked = false;
    for _ in 0..MAX_HEADER_LINES {
        let line = read_line(r)?;
        if line.is_empty() {
            let body = if chunked {
                read_chunked(r)?
            } else if let Some(len) = content_length {
                read_exact_body(r, len)?
            } else {
                read_to_close(r)?
            };
            return Ok((status, body));
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(TransferError::protocol(format!("bad header line '{line}'")));
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            let len = value
                .parse::<usize>()
                .map_err(|_| TransferError::protocol(format!("bad content-length '{value}'")))?;
            content_length = Some(len);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }
    Err(TransferError::protocol("too many response headers"))
}

fn read_line<R: BufRead>(r: &mut R) -> Result<String, TransferError> {
    let mut buf = Vec::new();
    let n = r.read_until(b'\n', &mut buf).map_err(TransferError::from_io)?;
    if n == 0 {
        return Err(TransferError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "device closed the connection",
        )));
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| TransferError::protocol("response header is not UTF-8"))
}

fn read_exact_body<R: BufRead>(r: &mut R, len: usize) -> Result<Vec<u8>, TransferError> {
    if len > MAX_BODY_BYTES {
        return Err(TransferError::protocol(format!("response body of {len} bytes")));
    }
    let mut body = vec![0u8; len];
    r.read_exact(&mut body).map_err(TransferError::from_io)?;
    Ok(body)
}

fn read_to_close<R: BufRead>(r: &mut R) -> Result<Vec<u8>, TransferError> {
    let mut body = Vec::new();
    r.take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut body)
        .map_err(TransferError::from_io)?;
    if body.len() > MAX_BODY_BYTES {
        return Err(TransferError::protocol("response body too large"));
    }
    Ok(body)
}

fn read_chunked<R: BufRead>(r: &mut R) -> Result<Vec<u8>, TransferError> {
    let mut body = Vec::new();
    loop {
        let line = read_line(r)?;
        let size_str = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| TransferError::protocol(format!("bad chunk size '{line}'")))?;
        if size == 0 {
            // Trailer section ends with an empty line.
            while !read_line(r)?.is_empty() {}
            return Ok(body);
        }
        if body.len() + size > MAX_BODY_BYTES {
            return Err(TransferError::protocol("response body too large"));
        }
        let start = body.len();
        body.resize(start + size, 0);
        r.read_exact(&mut body[start..])
            .map_err(TransferError::from_io)?;
        if !read_line(r)?.is_empty() {
            return Err(TransferError::protocol("chunk not terminated by CRLF"));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/http.rs"]
mod tests;
