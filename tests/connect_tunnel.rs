//! CONNECT tunneling through the plain listener.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

mod common;

#[tokio::test]
async fn tunnel_relays_bytes_both_ways() {
    let echo = common::start_tcp_echo().await;
    let proxy = common::start_proxy(common::engine(&[]), None).await;

    let (mut stream, head) = common::connect_via(proxy.plain, &echo.to_string()).await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");

    stream.write_all(b"ping through the tunnel").await.unwrap();
    let mut buf = [0u8; 23];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping through the tunnel");

    stream.write_all(b"again").await.unwrap();
    let mut buf = [0u8; 5];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"again");
}

#[tokio::test]
async fn tunnel_half_close_drains_reply() {
    let echo = common::start_tcp_echo().await;
    let proxy = common::start_proxy(common::engine(&[]), None).await;

    let (mut stream, head) = common::connect_via(proxy.plain, &echo.to_string()).await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");

    stream.write_all(b"last words").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"last words");
}

#[tokio::test]
async fn routed_connect_dials_destination() {
    let echo = common::start_tcp_echo().await;
    let proxy = common::start_proxy(
        common::engine(&[("db.example", format!("http://{echo}"))]),
        None,
    )
    .await;

    let (mut stream, head) = common::connect_via(proxy.plain, "db.example:5432").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");

    stream.write_all(b"routed").await.unwrap();
    let mut buf = [0u8; 6];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"routed");
}

#[tokio::test]
async fn unreachable_target_is_service_unavailable() {
    let dead = common::unused_addr().await;
    let proxy = common::start_proxy(common::engine(&[]), None).await;

    let (mut stream, head) = common::connect_via(proxy.plain, &dead.to_string()).await;
    assert!(head.starts_with("HTTP/1.1 503"), "{head}");

    let length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
        })
        .unwrap();
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();
    let body = String::from_utf8(body).unwrap();
    assert!(body.starts_with("failed to dial"), "{body}");
}
