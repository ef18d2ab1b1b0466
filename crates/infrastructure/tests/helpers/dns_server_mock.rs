#![allow(dead_code)]
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy)]
pub enum MockBehaviour {
    /// One A record for the queried name.
    Answer(Ipv4Addr),
    /// A reply with a foreign transaction ID first, then the real answer.
    MismatchedIdThenAnswer(Ipv4Addr),
    /// NOERROR with an empty answer section.
    Empty,
    /// Never replies.
    Silent,
}

pub struct MockDnsServer {
    addr: SocketAddr,
    queries: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<Vec<u8>>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    /// Binds an ephemeral port on loopback.
    pub async fn start(behaviour: MockBehaviour) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = socket.local_addr()?;
        let queries = Arc::new(AtomicUsize::new(0));
        let last_query = Arc::new(Mutex::new(None));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let counter = Arc::clone(&queries);
        let last = Arc::clone(&last_query);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        let query = buf[..len].to_vec();
                        counter.fetch_add(1, Ordering::SeqCst);
                        *last.lock().unwrap() = Some(query.clone());

                        for reply in Self::replies(&query, behaviour) {
                            let _ = socket.send_to(&reply, peer).await;
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            queries,
            last_query,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Plain upstream address string for this server.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<Vec<u8>> {
        self.last_query.lock().unwrap().clone()
    }

    fn replies(query: &[u8], behaviour: MockBehaviour) -> Vec<Vec<u8>> {
        if query.len() < 12 {
            return vec![];
        }
        match behaviour {
            MockBehaviour::Answer(ip) => vec![Self::build_response(query, Some(ip))],
            MockBehaviour::MismatchedIdThenAnswer(ip) => {
                let mut foreign = Self::build_response(query, Some(Ipv4Addr::new(6, 6, 6, 6)));
                foreign[0] ^= 0xFF;
                foreign[1] ^= 0xFF;
                vec![foreign, Self::build_response(query, Some(ip))]
            }
            MockBehaviour::Empty => vec![Self::build_response(query, None)],
            MockBehaviour::Silent => vec![],
        }
    }

    /// Echoes the question; the answer owner is a pointer to it.
    pub fn build_response(query: &[u8], ip: Option<Ipv4Addr>) -> Vec<u8> {
        let mut response = Vec::with_capacity(512);

        response.extend_from_slice(&query[0..2]);
        response.push(0x81);
        response.push(0x80);
        response.extend_from_slice(&query[4..6]);
        response.extend_from_slice(&[0x00, u8::from(ip.is_some())]);
        response.extend_from_slice(&[0x00, 0x00]);
        response.extend_from_slice(&[0x00, 0x00]);

        let question_end = Self::question_end(query);
        response.extend_from_slice(&query[12..question_end]);

        if let Some(ip) = ip {
            response.extend_from_slice(&[
                0xc0, 0x0c, // name
                0x00, 0x01, // type A
                0x00, 0x01, // class IN
                0x00, 0x00, 0x00, 0x3c, // ttl
                0x00, 0x04,
            ]);
            response.extend_from_slice(&ip.octets());
        }

        response
    }

    fn question_end(query: &[u8]) -> usize {
        let mut pos = 12;
        while pos < query.len() && query[pos] != 0 {
            pos += 1 + query[pos] as usize;
        }
        (pos + 1 + 4).min(query.len())
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
