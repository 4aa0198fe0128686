//! ClamAV daemon client over TCP.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use dropkeep_core::config::{AntivirusConfig, ScanMode};

use crate::protocol::{is_pong, parse_reply};
use crate::{ScanVerdict, VirusScanner};

/// Chunk size for `INSTREAM`.
const STREAM_CHUNK: usize = 64 * 1024;

/// Failures talking to the daemon. Converted into [`ScanVerdict::Error`].
#[derive(Debug, Error)]
enum ClamError {
    #[error("failed to connect to clamd at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error("clamd I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("clamd did not answer PING")]
    NoPong,
}

/// ClamAV scanner using the clamd TCP protocol.
///
/// The whole exchange (connect, `PING`, scan, reply) is bounded by a
/// single timeout.
#[derive(Debug, Clone)]
pub struct ClamAvScanner {
    address: String,
    timeout: Duration,
    mode: ScanMode,
}

impl ClamAvScanner {
    /// Create a scanner for `address` (`host:port`).
    pub fn new(address: impl Into<String>, timeout: Duration, mode: ScanMode) -> Self {
        Self {
            address: address.into(),
            timeout,
            mode,
        }
    }

    /// Create a scanner from configuration.
    pub fn from_config(config: &AntivirusConfig) -> Self {
        Self::new(config.address(), config.timeout(), config.mode)
    }

    async fn connect(&self) -> Result<TcpStream, ClamError> {
        TcpStream::connect(&self.address)
            .await
            .map_err(|source| ClamError::Connect {
                addr: self.address.clone(),
                source,
            })
    }

    async fn ping(&self) -> Result<(), ClamError> {
        let mut stream = self.connect().await?;
        stream.write_all(b"zPING\0").await?;
        stream.flush().await?;
        let reply = read_reply(&mut stream).await?;
        if is_pong(&reply) {
            Ok(())
        } else {
            Err(ClamError::NoPong)
        }
    }

    async fn scan_by_path(&self, path: &Path) -> Result<ScanVerdict, ClamError> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        let mut stream = self.connect().await?;
        let command = format!("zSCAN {}\0", absolute.display());
        stream.write_all(command.as_bytes()).await?;
        stream.flush().await?;
        let reply = read_reply(&mut stream).await?;
        Ok(parse_reply(&reply))
    }

    async fn scan_by_stream(&self, path: &Path) -> Result<ScanVerdict, ClamError> {
        let mut file = File::open(path).await?;
        let mut stream = self.connect().await?;
        // Format: zINSTREAM\0 <length:u32 big-endian> <data> ... <0:u32>
        stream.write_all(b"zINSTREAM\0").await?;

        let mut buffer = vec![0u8; STREAM_CHUNK];
        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            stream.write_all(&(n as u32).to_be_bytes()).await?;
            stream.write_all(&buffer[..n]).await?;
        }
        stream.write_all(&0u32.to_be_bytes()).await?;
        stream.flush().await?;

        let reply = read_reply(&mut stream).await?;
        Ok(parse_reply(&reply))
    }

    async fn scan_inner(&self, path: &Path) -> Result<ScanVerdict, ClamError> {
        self.ping().await?;
        match self.mode {
            ScanMode::Path => self.scan_by_path(path).await,
            ScanMode::Stream => self.scan_by_stream(path).await,
        }
    }
}

/// Read until the terminating null byte or EOF.
async fn read_reply(stream: &mut TcpStream) -> Result<Vec<u8>, std::io::Error> {
    let mut reply = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&buf[..n]);
        if reply.contains(&0) {
            break;
        }
    }
    Ok(reply)
}

#[async_trait]
impl VirusScanner for ClamAvScanner {
    async fn scan(&self, path: &Path) -> ScanVerdict {
        let verdict = match tokio::time::timeout(self.timeout, self.scan_inner(path)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "ClamAV scan failed");
                ScanVerdict::Error {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    path = %path.display(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "ClamAV scan timed out"
                );
                ScanVerdict::Error {
                    reason: format!("scan timed out after {:?}", self.timeout),
                }
            }
        };

        match &verdict {
            ScanVerdict::Clean => debug!(path = %path.display(), "ClamAV: clean"),
            ScanVerdict::Infected { signature } => {
                info!(path = %path.display(), signature = %signature, "ClamAV: threat found")
            }
            ScanVerdict::Error { reason } => {
                debug!(path = %path.display(), reason = %reason, "ClamAV: no verdict")
            }
        }
        verdict
    }

    async fn health_check(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.ping()).await,
            Ok(Ok(()))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn read_command(sock: &mut TcpStream) -> String {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while sock.read_exact(&mut byte).await.is_ok() && byte[0] != 0 {
            out.push(byte[0]);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    async fn drain_instream(sock: &mut TcpStream) -> usize {
        let mut total = 0;
        loop {
            let mut len = [0u8; 4];
            if sock.read_exact(&mut len).await.is_err() {
                return total;
            }
            let len = u32::from_be_bytes(len) as usize;
            if len == 0 {
                return total;
            }
            let mut chunk = vec![0u8; len];
            if sock.read_exact(&mut chunk).await.is_err() {
                return total;
            }
            total += len;
        }
    }

    /// Minimal clamd stand-in answering every scan with `verdict`.
    async fn fake_clamd(verdict: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let command = read_command(&mut sock).await;
                    let reply = if command == "zPING" {
                        "PONG\0".to_string()
                    } else if command == "zINSTREAM" {
                        drain_instream(&mut sock).await;
                        format!("stream: {verdict}\0")
                    } else {
                        let path = command.trim_start_matches("zSCAN ");
                        format!("{path}: {verdict}\0")
                    };
                    let _ = sock.write_all(reply.as_bytes()).await;
                });
            }
        });
        addr
    }

    fn sample_file() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![7u8; 200_000]).unwrap();
        file
    }

    #[tokio::test]
    async fn test_path_mode_clean() {
        let addr = fake_clamd("OK").await;
        let scanner = ClamAvScanner::new(addr.to_string(), Duration::from_secs(5), ScanMode::Path);
        let file = sample_file();
        assert_eq!(scanner.scan(file.path()).await, ScanVerdict::Clean);
        assert!(scanner.health_check().await);
    }

    #[tokio::test]
    async fn test_stream_mode_found() {
        let addr = fake_clamd("Eicar-Signature FOUND").await;
        let scanner =
            ClamAvScanner::new(addr.to_string(), Duration::from_secs(5), ScanMode::Stream);
        let file = sample_file();
        assert_eq!(
            scanner.scan(file.path()).await,
            ScanVerdict::Infected {
                signature: "Eicar-Signature".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let scanner = ClamAvScanner::new(addr.to_string(), Duration::from_secs(5), ScanMode::Path);
        let file = sample_file();
        assert!(matches!(
            scanner.scan(file.path()).await,
            ScanVerdict::Error { .. }
        ));
        assert!(!scanner.health_check().await);
    }

    #[tokio::test]
    async fn test_silent_daemon_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let scanner =
            ClamAvScanner::new(addr.to_string(), Duration::from_millis(300), ScanMode::Path);
        let file = sample_file();
        let started = std::time::Instant::now();
        let verdict = scanner.scan(file.path()).await;
        assert!(matches!(verdict, ScanVerdict::Error { ref reason } if reason.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
