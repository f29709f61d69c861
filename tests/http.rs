/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use mooring_http::{HttpClient, HttpClientError};

mod common;
use common::{listen, read_request_head, write_response, write_response_byte_wise};

#[tokio::test]
async fn get_fixed_length_keep_alive() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head = read_request_head(&mut stream).await;
        assert!(head.starts_with("GET / HTTP/1.1\r\n"));
        assert!(head.contains("Connection: keep-alive\r\n"));
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: keep-alive\r\n\r\nhello",
        )
        .await;
        // hold the socket open so a close on the client side would be visible
        read_request_head(&mut stream).await
    });

    let mut client = HttpClient::new();
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body(), b"hello");
    assert!(resp.eof());
    assert!(!client.has_closed());

    // second request goes over the same socket
    let second = client.get(&url).await;
    // the server task only reads the head and then drops the socket
    assert!(second.is_err());
    let head2 = server.await.unwrap();
    assert!(head2.starts_with("GET / HTTP/1.1\r\n"));
}

#[tokio::test]
async fn get_chunked() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
              5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        )
        .await;
    });

    let mut client = HttpClient::new();
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body(), b"hello world");
    assert!(resp.eof());
    // chunked responses force keep alive
    assert!(!client.has_closed());
}

#[tokio::test]
async fn get_chunked_byte_at_a_time() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response_byte_wise(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
              5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        )
        .await;
    });

    let mut client = HttpClient::new();
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body(), b"hello world");
}

#[tokio::test]
async fn get_fixed_byte_at_a_time() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response_byte_wise(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: keep-alive\r\n\r\nhello",
        )
        .await;
    });

    let mut client = HttpClient::new();
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body(), b"hello");
}

#[tokio::test]
async fn head_then_get_reuses_socket() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let head = read_request_head(&mut stream).await;
        assert!(head.starts_with("HEAD / HTTP/1.1\r\n"));
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;

        // same socket must carry the follow-up request
        let head = read_request_head(&mut stream).await;
        assert!(head.starts_with("GET / HTTP/1.1\r\n"));
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nok",
        )
        .await;
    });

    let mut client = HttpClient::new();
    let resp = client.head(&url).await.unwrap();
    assert_eq!(resp.status, 200);
    assert!(resp.body().is_empty());
    assert!(!client.has_closed());

    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.body(), b"ok");
}

#[tokio::test]
async fn pipelined_responses_carry_over() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        // both responses delivered in one burst
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: keep-alive\r\n\r\none\
              HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: keep-alive\r\n\r\ntwo",
        )
        .await;
        read_request_head(&mut stream).await;
    });

    let mut client = HttpClient::new();
    let first = client.get(&url).await.unwrap();
    assert_eq!(first.body(), b"one");
    // the second response is already sitting in the carry-over buffer
    assert!(!first.eof());

    let second = client.get(&url).await.unwrap();
    assert_eq!(second.body(), b"two");
    assert!(second.eof());
}

#[tokio::test]
async fn connection_close_closes_socket() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;
    });

    let mut client = HttpClient::new();
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.body(), b"ok");
    assert!(client.has_closed());
}

#[tokio::test]
async fn reconnect_after_close() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request_head(&mut stream).await;
            write_response(
                &mut stream,
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: keep-alive\r\n\r\nok",
            )
            .await;
        }
    });

    let mut client = HttpClient::new();
    assert!(client.has_closed());
    client.get(&url).await.unwrap();
    assert!(!client.has_closed());

    client.close().await;
    assert!(client.has_closed());

    // a request on a closed client reconnects on its own
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn post_sends_body_and_length() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (head, body) = common::read_request(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;
        (head, body)
    });

    let mut client = HttpClient::new();
    let resp = client
        .post(&url, "{\"k\":1}", mooring_http::ContentType::Json)
        .await
        .unwrap();
    assert_eq!(resp.status, 200);

    let (head, body) = server.await.unwrap();
    assert!(head.starts_with("POST / HTTP/1.1\r\n"));
    assert!(head.contains("Content-Type: application/json\r\n"));
    assert!(head.contains("Content-Length: 7\r\n"));
    assert_eq!(body, b"{\"k\":1}");
}

#[tokio::test]
async fn host_header_not_settable_and_no_duplicates() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head = read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;
        head
    });

    let mut client = HttpClient::new();
    assert!(!client.add_header("Host", "evil.example"));
    assert!(client.add_header("X-Token", "1"));
    // duplicate keys are silently rejected
    assert!(!client.add_header("X-Token", "2"));

    client.get(&url).await.unwrap();
    let head = server.await.unwrap();
    assert_eq!(head.matches("Host: ").count(), 1);
    assert!(!head.contains("evil.example"));
    assert!(head.contains("X-Token: 1\r\n"));
    assert!(!head.contains("X-Token: 2"));
}

#[tokio::test]
async fn user_headers_cleared_after_request() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head1 = read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;
        let head2 = read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;
        (head1, head2)
    });

    let mut client = HttpClient::new();
    client.add_header("X-Once", "yes");
    client.get(&url).await.unwrap();
    client.get(&url).await.unwrap();

    let (head1, head2) = server.await.unwrap();
    assert!(head1.contains("X-Once: yes\r\n"));
    assert!(!head2.contains("X-Once"));
}

#[tokio::test]
async fn redirect_recorded_but_not_followed() {
    let (listener, url) = listen().await;
    let target = format!("{url}/next");
    let location = target.clone();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        let rsp = format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n"
        );
        write_response(&mut stream, rsp.as_bytes()).await;
    });

    let mut client = HttpClient::new();
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 302);
    assert_eq!(client.redirect_uri(), Some(target.as_str()));
}

#[tokio::test]
async fn redirect_followed_once_when_enabled() {
    let (listener, url) = listen().await;
    let location = format!("{url}/next");
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head1 = read_request_head(&mut stream).await;
        let rsp = format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n"
        );
        write_response(&mut stream, rsp.as_bytes()).await;

        let head2 = read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: keep-alive\r\n\r\ndone",
        )
        .await;
        (head1, head2)
    });

    let mut client = HttpClient::new();
    client.enable_follow_redirect(true);
    let resp = client.get(&url).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body(), b"done");

    let (head1, head2) = server.await.unwrap();
    assert!(head1.starts_with("GET / HTTP/1.1\r\n"));
    assert!(head2.starts_with("GET /next HTTP/1.1\r\n"));
}

#[tokio::test]
async fn timeout_is_reported_as_timed_out() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        // never reply
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(stream);
    });

    let mut client = HttpClient::new();
    client.set_timeout(Duration::from_millis(100));
    let err = client.get(&url).await.unwrap_err();
    assert!(matches!(err, HttpClientError::TimedOut));
    assert!(client.has_closed());
}

#[tokio::test]
async fn connect_failure() {
    // bind then drop to get a port nobody listens on
    let (listener, url) = listen().await;
    drop(listener);

    let mut client = HttpClient::new();
    let err = client.get(&url).await.unwrap_err();
    assert!(matches!(err, HttpClientError::ConnectFailed(_)));
    assert!(client.has_closed());
}

#[tokio::test]
async fn https_without_tls_config_fails() {
    let mut client = HttpClient::new();
    let err = client.get("https://127.0.0.1:1/").await.unwrap_err();
    assert!(matches!(err, HttpClientError::TlsNotConfigured));
}

#[tokio::test]
async fn injected_write_failure_maps_to_not_connected() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let mut client = HttpClient::new();
    client.fault_policy_mut().fail_next_write();
    let err = client.get(&url).await.unwrap_err();
    assert!(matches!(err, HttpClientError::NotConnected));
    assert!(client.has_closed());
}

#[tokio::test]
async fn injected_header_failure_maps_to_protocol_error() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;
    });

    let mut client = HttpClient::new();
    client.fault_policy_mut().fail_next_header();
    let err = client.get(&url).await.unwrap_err();
    assert!(matches!(err, HttpClientError::InvalidResponseHeader(_)));
    assert!(client.has_closed());
}

#[tokio::test]
async fn injected_chunk_failure() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        )
        .await;
    });

    let mut client = HttpClient::new();
    client.fault_policy_mut().fail_next_chunk();
    let err = client.get(&url).await.unwrap_err();
    assert!(matches!(err, HttpClientError::InvalidChunkSize));
    assert!(client.has_closed());
}

#[tokio::test]
async fn malformed_status_line_is_protocol_error() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request_head(&mut stream).await;
        write_response(&mut stream, b"NOT-HTTP nonsense\r\n\r\n").await;
    });

    let mut client = HttpClient::new();
    let err = client.get(&url).await.unwrap_err();
    assert!(matches!(err, HttpClientError::InvalidResponseHeader(_)));
    assert!(client.has_closed());
}

#[tokio::test]
async fn scheme_is_completed_for_bare_authority() {
    let (listener, url) = listen().await;
    let bare = url.strip_prefix("http://").unwrap().to_string();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let head = read_request_head(&mut stream).await;
        assert!(head.starts_with("GET / HTTP/1.1\r\n"));
        write_response(
            &mut stream,
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;
    });

    let mut client = HttpClient::new();
    let resp = client.get(&bare).await.unwrap();
    assert_eq!(resp.status, 200);
}
