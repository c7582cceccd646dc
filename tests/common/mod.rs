//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use butler::engine::{EngineSettings, ProxyEngine};
use butler::http::{ProxyServer, ServerSettings};
use butler::lifecycle::Shutdown;
use butler::net::tls::{server_config, TlsMaterial, TlsSource};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

pub fn localhost() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind(localhost()).await.unwrap();
    listener.local_addr().unwrap()
}

/// Self-signed certificate and key for "localhost", PEM encoded.
pub fn self_signed() -> (String, String) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    (cert.cert.pem(), cert.key_pair.serialize_pem())
}

pub fn tls_material(enforce: bool) -> TlsMaterial {
    let (cert, key) = self_signed();
    TlsMaterial {
        source: TlsSource::Pem {
            cert: cert.into_bytes(),
            key: key.into_bytes(),
        },
        enforce,
    }
}

/// Read an HTTP message head, byte by byte, up to and including the blank
/// line. Nothing past the head is consumed.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        if n == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

async fn reply_with_head<S>(mut stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = read_head(&mut stream).await;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        head.len(),
        head
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Backend that answers every request with the request head it received.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind(localhost()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(reply_with_head(socket));
        }
    });
    addr
}

/// Same as [`start_echo_backend`], over TLS with a self-signed certificate.
pub async fn start_tls_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind(localhost()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TlsAcceptor::from(server_config(&tls_material(false)).unwrap());

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(stream) = acceptor.accept(socket).await {
                    reply_with_head(stream).await;
                }
            });
        }
    });
    addr
}

/// Backend that answers every request with the given raw response bytes.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind(localhost()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Backend that reads requests and never answers.
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind(localhost()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut sink = Vec::new();
                let _ = socket.read_to_end(&mut sink).await;
            });
        }
    });
    addr
}

/// TCP echo server; shuts down its write side once the peer stops writing.
pub async fn start_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind(localhost()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.into_split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
                let _ = write.shutdown().await;
            });
        }
    });
    addr
}

/// A proxy serving on loopback until `shutdown` is triggered.
pub struct RunningProxy {
    pub engine: Arc<ProxyEngine>,
    pub plain: SocketAddr,
    pub secure: Option<SocketAddr>,
    pub shutdown: Shutdown,
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn engine_with(settings: EngineSettings, routes: &[(&str, String)]) -> ProxyEngine {
    let engine = ProxyEngine::new(settings).unwrap();
    for (host, target) in routes {
        engine.add_route(host, target).unwrap();
    }
    engine
}

pub fn engine(routes: &[(&str, String)]) -> ProxyEngine {
    engine_with(EngineSettings::default(), routes)
}

pub async fn start_proxy(engine: ProxyEngine, tls: Option<TlsMaterial>) -> RunningProxy {
    let engine = Arc::new(engine);
    let settings = ServerSettings {
        bind_address: localhost(),
        secure_bind_address: localhost(),
        tls,
    };
    let server = ProxyServer::bind(Arc::clone(&engine), settings).await.unwrap();
    let plain = server.local_addr();
    let secure = server.secure_addr();

    let shutdown = Shutdown::new();
    tokio::spawn(server.run_until(shutdown.wait()));

    RunningProxy {
        engine,
        plain,
        secure,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Open a CONNECT tunnel through `proxy` and return the stream plus the
/// proxy's response head.
pub async fn connect_via(proxy: SocketAddr, authority: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let head = read_head(&mut stream).await;
    (stream, head)
}
