use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    thread,
};

use super::*;

fn parse(raw: &str) -> Result<(u16, Vec<u8>), TransferError> {
    read_response(&mut raw.as_bytes())
}

/// Serve one request with `response`, returning the request head and body.
fn serve_once(response: &'static str) -> (String, thread::JoinHandle<(String, Vec<u8>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" {
                break;
            }
            if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = v.trim().parse().unwrap();
            }
            head.push_str(&line);
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).unwrap();
        reader.get_mut().write_all(response.as_bytes()).unwrap();
        (head, body)
    });
    (addr, handle)
}

#[test]
fn content_length_body() {
    let (status, body) =
        parse("HTTP/1.1 200 OK\r\nContent-Length: 16\r\n\r\n{\"error_code\":0}").unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, br#"{"error_code":0}"#);
}

#[test]
fn chunked_body() {
    let raw = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
               5\r\n{\"err\r\nb;ext=1\r\nor_code\":0}\r\n0\r\n\r\n";
    let (_, body) = parse(raw).unwrap();
    assert_eq!(body, br#"{"error_code":0}"#);
}

#[test]
fn body_until_close() {
    let (status, body) = parse("HTTP/1.0 404 Not Found\r\nServer: x\r\n\r\nmissing").unwrap();
    assert_eq!(status, 404);
    assert_eq!(body, b"missing");
}

#[test]
fn malformed_responses() {
    assert!(matches!(parse("garbage\r\n\r\n"), Err(TransferError::Protocol(_))));
    assert!(matches!(
        parse("HTTP/1.1 200 OK\r\nContent-Length: nope\r\n\r\n"),
        Err(TransferError::Protocol(_))
    ));
    assert!(matches!(parse(""), Err(TransferError::Io(_))));
    assert!(parse("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort").is_err());
}

#[test]
fn device_address_parsing() {
    let cfg = DeviceConfig::default();
    assert_eq!(HttpLink::new("127.0.0.1", &cfg).unwrap().addr().port(), 80);
    assert_eq!(
        HttpLink::new("127.0.0.1:8080", &cfg).unwrap().addr().port(),
        8080
    );
    assert!(HttpLink::new("127.0.0.1:notaport", &cfg).is_err());
    assert!(HttpLink::new("", &cfg).is_err());
}

#[test]
fn bracketed_ipv6_device_addresses() {
    let cfg = DeviceConfig::default();
    let link = HttpLink::new("[::1]:8080", &cfg).unwrap();
    assert_eq!(link.addr(), "[::1]:8080".parse::<std::net::SocketAddr>().unwrap());
    assert_eq!(link.host, "[::1]");

    assert_eq!(HttpLink::new("[::1]", &cfg).unwrap().addr().port(), 80);
    assert_eq!(HttpLink::new("::1", &cfg).unwrap().addr().port(), 80);
    assert!(HttpLink::new("[::1", &cfg).is_err());
    assert!(HttpLink::new("[::1]8080", &cfg).is_err());
    assert!(HttpLink::new("[::1]:port", &cfg).is_err());
    assert!(HttpLink::new("[]:8080", &cfg).is_err());
}

#[test]
fn posts_json_commands_to_the_panel() {
    let (addr, server) = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 16\r\n\r\n{\"error_code\":0}",
    );
    let mut link = HttpLink::new(&addr, &DeviceConfig::default()).unwrap();
    let ack = link.send(&DeviceCommand::ResetBuffer).unwrap();
    assert_eq!(ack.error_code, 0);

    let (head, body) = server.join().unwrap();
    assert!(head.starts_with("POST /post HTTP/1.1\r\n"), "{head}");
    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["Command"], "Draw/ResetHttpGifId");
}

#[test]
fn device_errors_map_to_transfer_errors() {
    let (addr, server) =
        serve_once("HTTP/1.1 200 OK\r\nContent-Length: 16\r\n\r\n{\"error_code\":5}");
    let mut link = HttpLink::new(&addr, &DeviceConfig::default()).unwrap();
    assert!(matches!(
        link.send(&DeviceCommand::Probe),
        Err(TransferError::Rejected { error_code: 5 })
    ));
    server.join().unwrap();

    let (addr, server) = serve_once("HTTP/1.1 503 Busy\r\nContent-Length: 0\r\n\r\n");
    let mut link = HttpLink::new(&addr, &DeviceConfig::default()).unwrap();
    assert!(matches!(
        link.send(&DeviceCommand::Probe),
        Err(TransferError::Http { status: 503 })
    ));
    server.join().unwrap();
}

#[test]
fn silent_device_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let cfg = DeviceConfig {
        probe_timeout_ms: 100,
        ..DeviceConfig::default()
    };
    let mut link = HttpLink::new(&addr, &cfg).unwrap();
    // Accepted by the backlog but never answered.
    assert!(matches!(
        link.send(&DeviceCommand::Probe),
        Err(TransferError::Timeout)
    ));
    drop(listener);
}
