//! In-process Modbus TCP server used by the integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the fake server answers
#[derive(Debug, Clone, Default)]
pub struct ServerBehavior {
    /// Delay before every response
    pub delay: Duration,
    /// Close each connection after this many requests
    pub close_after: Option<usize>,
    /// Answer every request with this exception code
    pub exception: Option<u8>,
}

/// Fake Modbus TCP server running as a task on the test runtime.
///
/// Register `n` always holds the value `n`, for both register tables.
pub struct FakeServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    connections: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start() -> Self {
        Self::with_behavior(ServerBehavior::default()).await
    }

    pub async fn with_behavior(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let connections = Arc::new(AtomicUsize::new(0));

        let (req, conns) = (requests.clone(), connections.clone());
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                conns.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, behavior.clone(), req.clone()));
            }
        });

        Self {
            addr,
            requests,
            connections,
            accept_task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn serve(mut stream: TcpStream, behavior: ServerBehavior, requests: Arc<AtomicUsize>) {
    let mut served = 0usize;
    let mut request = [0u8; 12];

    while stream.read_exact(&mut request).await.is_ok() {
        if behavior.close_after.is_some_and(|limit| served >= limit) {
            return;
        }
        served += 1;
        requests.fetch_add(1, Ordering::SeqCst);

        if !behavior.delay.is_zero() {
            tokio::time::sleep(behavior.delay).await;
        }

        if stream.write_all(&response_frame(&request, behavior.exception)).await.is_err() {
            return;
        }
    }
}

fn response_frame(request: &[u8; 12], exception: Option<u8>) -> Vec<u8> {
    let unit_id = request[6];
    let function = request[7];
    let address = u16::from_be_bytes([request[8], request[9]]);
    let count = u16::from_be_bytes([request[10], request[11]]);

    let pdu = match exception {
        Some(code) => vec![function | 0x80, code],
        None => {
            let mut pdu = vec![function, (count * 2) as u8];
            for offset in 0..count {
                pdu.extend_from_slice(&address.wrapping_add(offset).to_be_bytes());
            }
            pdu
        }
    };

    let mut frame = Vec::with_capacity(7 + pdu.len());
    frame.extend_from_slice(&request[0..2]);
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    frame.push(unit_id);
    frame.extend_from_slice(&pdu);
    frame
}
