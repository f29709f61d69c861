/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use mooring_http::{BlockingHttpClient, ContentType, HttpClientError};

fn read_head(stream: &mut std::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).unwrap();
        if n == 0 {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).unwrap()
}

fn spawn_server<F, T>(script: F) -> (String, std::thread::JoinHandle<T>)
where
    F: FnOnce(std::net::TcpStream) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        script(stream)
    });
    (format!("http://{addr}"), handle)
}

#[test]
fn blocking_get() {
    let (url, server) = spawn_server(|mut stream| {
        let head = read_head(&mut stream);
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: keep-alive\r\n\r\nhello",
            )
            .unwrap();
        head
    });

    let client = BlockingHttpClient::new();
    let resp = client.get(&url).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body(), b"hello");
    assert!(!client.has_closed());

    let head = server.join().unwrap();
    assert!(head.starts_with("GET / HTTP/1.1\r\n"));
}

#[test]
fn blocking_post_roundtrip() {
    let (url, server) = spawn_server(|mut stream| {
        let head = read_head(&mut stream);
        let mut body = vec![0u8; 4];
        stream.read_exact(&mut body).unwrap();
        stream
            .write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .unwrap();
        (head, body)
    });

    let client = BlockingHttpClient::new();
    let resp = client.post(&url, "data", ContentType::Text).unwrap();
    assert_eq!(resp.status, 201);
    assert!(client.has_closed());

    let (head, body) = server.join().unwrap();
    assert!(head.contains("Content-Length: 4\r\n"));
    assert_eq!(body, b"data");
}

#[test]
fn blocking_timeout() {
    let (url, _server) = spawn_server(|mut stream| {
        let _ = read_head(&mut stream);
        std::thread::sleep(Duration::from_secs(5));
    });

    let client = BlockingHttpClient::new();
    client.set_timeout(Duration::from_millis(100));
    let err = client.get(&url).unwrap_err();
    assert!(matches!(err, HttpClientError::TimedOut));
    assert!(client.has_closed());
}

#[test]
fn blocking_headers_and_redirect_state() {
    let (url, server) = spawn_server(|mut stream| {
        let head = read_head(&mut stream);
        stream
            .write_all(
                b"HTTP/1.1 302 Found\r\nLocation: http://other.example/\r\n\
                  Content-Length: 0\r\nConnection: keep-alive\r\n\r\n",
            )
            .unwrap();
        head
    });

    let client = BlockingHttpClient::new();
    assert!(!client.add_header("Host", "evil.example"));
    assert!(client.add_header("X-Tag", "v"));

    let resp = client.get(&url).unwrap();
    assert_eq!(resp.status, 302);
    assert_eq!(client.redirect_uri().as_deref(), Some("http://other.example/"));

    let head = server.join().unwrap();
    assert!(head.contains("X-Tag: v\r\n"));
    assert!(!head.contains("evil.example"));
}

#[test]
fn drop_joins_event_loop() {
    let client = BlockingHttpClient::new();
    drop(client);
    // nothing to assert: the drop must not hang or panic
}
