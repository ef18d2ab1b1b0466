#![allow(dead_code)]
use super::dns_server_mock::MockDnsServer;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Local DNS-over-QUIC resolver with a self-signed certificate for
/// `127.0.0.1`. Every stream gets one A record after `delay`.
pub struct MockDoqServer {
    addr: SocketAddr,
    cert: CertificateDer<'static>,
    endpoint: quinn::Endpoint,
    connections: Arc<AtomicUsize>,
    queries: Arc<AtomicUsize>,
    live: Arc<Mutex<Vec<quinn::Connection>>>,
    last_query: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MockDoqServer {
    pub fn start(answer: Ipv4Addr, delay: Duration) -> Self {
        let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let cert = certified.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            certified.key_pair.serialize_der(),
        ));

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut tls = rustls::ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13])
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert.clone()], key)
            .unwrap();
        tls.alpn_protocols = vec![b"doq".to_vec()];

        let quic = quinn::crypto::rustls::QuicServerConfig::try_from(tls).unwrap();
        let endpoint = quinn::Endpoint::server(
            quinn::ServerConfig::with_crypto(Arc::new(quic)),
            SocketAddr::from(([127, 0, 0, 1], 0)),
        )
        .unwrap();
        let addr = endpoint.local_addr().unwrap();

        let server = Self {
            addr,
            cert,
            endpoint: endpoint.clone(),
            connections: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(Mutex::new(Vec::new())),
            last_query: Arc::new(Mutex::new(None)),
        };

        let connections = Arc::clone(&server.connections);
        let queries = Arc::clone(&server.queries);
        let live = Arc::clone(&server.live);
        let last_query = Arc::clone(&server.last_query);
        tokio::spawn(async move {
            while let Some(incoming) = endpoint.accept().await {
                let Ok(conn) = incoming.await else { continue };
                connections.fetch_add(1, Ordering::SeqCst);
                live.lock().unwrap().push(conn.clone());

                let queries = Arc::clone(&queries);
                let last_query = Arc::clone(&last_query);
                tokio::spawn(async move {
                    while let Ok((send, recv)) = conn.accept_bi().await {
                        queries.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(Self::answer_stream(
                            send,
                            recv,
                            answer,
                            delay,
                            Arc::clone(&last_query),
                        ));
                    }
                });
            }
        });

        server
    }

    async fn answer_stream(
        mut send: quinn::SendStream,
        mut recv: quinn::RecvStream,
        answer: Ipv4Addr,
        delay: Duration,
        last_query: Arc<Mutex<Option<Vec<u8>>>>,
    ) {
        let Ok(raw) = recv.read_to_end(u16::MAX as usize + 2).await else {
            return;
        };
        if raw.len() < 14 {
            return;
        }
        let query = raw[2..].to_vec();
        *last_query.lock().unwrap() = Some(query.clone());

        tokio::time::sleep(delay).await;

        let response = MockDnsServer::build_response(&query, Some(answer));
        let mut framed = (response.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(&response);

        if send.write_all(&framed).await.is_ok() && send.finish().is_ok() {
            let _ = send.stopped().await;
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// DoQ upstream address string for this server.
    pub fn endpoint(&self) -> String {
        format!("quic://{}", self.addr)
    }

    /// Trust store holding only this server's certificate.
    pub fn roots(&self) -> rustls::RootCertStore {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.cert.clone()).unwrap();
        roots
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<Vec<u8>> {
        self.last_query.lock().unwrap().clone()
    }

    /// Closes every accepted connection from the server side.
    pub fn close_connections(&self) {
        for conn in self.live.lock().unwrap().drain(..) {
            conn.close(0u32.into(), b"going away");
        }
    }
}

impl Drop for MockDoqServer {
    fn drop(&mut self) {
        self.endpoint.close(0u32.into(), b"");
    }
}
