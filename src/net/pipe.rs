//! Bidirectional byte pipe with half-close.
//!
//! Used by both the CONNECT tunnel and the raw TCP services.
//!
//! # Design Decisions
//! - When one direction reaches EOF only the write side of its destination
//!   is shut down; the opposite direction keeps draining in-flight bytes
//! - An I/O error in either direction ends the pipe; both streams are owned
//!   here and dropped on every exit path, which closes them

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BUFFER_SIZE: usize = 8192;

/// Bytes moved in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipeStats {
    /// Bytes copied from `a` to `b`.
    pub a_to_b: u64,
    /// Bytes copied from `b` to `a`.
    pub b_to_a: u64,
}

/// Copy bytes between `a` and `b` until both directions finish.
pub async fn pipe<A, B>(a: A, b: B) -> io::Result<PipeStats>
where
    A: AsyncRead + AsyncWrite + Send,
    B: AsyncRead + AsyncWrite + Send,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let (a_to_b, b_to_a) = tokio::try_join!(
        copy_half(&mut a_read, &mut b_write),
        copy_half(&mut b_read, &mut a_write),
    )?;

    Ok(PipeStats { a_to_b, b_to_a })
}

/// Copy one direction, then half-close the destination.
async fn copy_half<R, W>(source: &mut R, dest: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        dest.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    dest.flush().await?;
    dest.shutdown().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn half_close_keeps_other_direction_open() {
        let (mut client, proxy_client_side) = duplex(64);
        let (proxy_server_side, mut server) = duplex(64);

        let pipe_task = tokio::spawn(pipe(proxy_client_side, proxy_server_side));

        client.write_all(b"request").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"request");

        // Client finished writing, but the reply still flows back.
        server.write_all(b"late reply").await.unwrap();
        server.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"late reply");

        let stats = pipe_task.await.unwrap().unwrap();
        assert_eq!(stats, PipeStats { a_to_b: 7, b_to_a: 10 });
    }

    #[tokio::test]
    async fn dropped_peer_ends_pipe() {
        let (client, proxy_client_side) = duplex(64);
        let (proxy_server_side, server) = duplex(64);

        let pipe_task = tokio::spawn(pipe(proxy_client_side, proxy_server_side));
        drop(client);
        drop(server);

        let stats = tokio::time::timeout(std::time::Duration::from_secs(2), pipe_task)
            .await
            .expect("pipe should finish once both peers are gone")
            .unwrap()
            .unwrap();
        assert_eq!(stats, PipeStats::default());
    }
}
