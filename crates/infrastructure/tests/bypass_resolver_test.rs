use dnsgate_application::ports::NoopProtector;
use dnsgate_domain::DomainError;
use dnsgate_infrastructure::dns::transport::BypassResolver;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

mod helpers;
use helpers::dns_server_mock::{MockBehaviour, MockDnsServer};

fn resolver(server: SocketAddr, timeout: Duration) -> BypassResolver {
    BypassResolver::new(Arc::new(NoopProtector), server, timeout)
}

#[tokio::test]
async fn test_resolves_first_a_record() {
    let server = MockDnsServer::start(MockBehaviour::Answer(Ipv4Addr::new(9, 9, 9, 9)))
        .await
        .unwrap();

    let ip = resolver(server.addr(), Duration::from_secs(2))
        .resolve("dns.quad9.net")
        .await
        .unwrap();

    assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)));
    assert_eq!(server.query_count(), 1);
}

#[tokio::test]
async fn test_reply_with_foreign_id_is_ignored() {
    let server =
        MockDnsServer::start(MockBehaviour::MismatchedIdThenAnswer(Ipv4Addr::new(1, 2, 3, 4)))
            .await
            .unwrap();

    let ip = resolver(server.addr(), Duration::from_secs(2))
        .resolve("dns.example")
        .await
        .unwrap();

    assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
}

#[tokio::test]
async fn test_ip_literal_skips_lookup() {
    let server = MockDnsServer::start(MockBehaviour::Silent).await.unwrap();

    let ip = resolver(server.addr(), Duration::from_millis(200))
        .resolve("203.0.113.9")
        .await
        .unwrap();

    assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    assert_eq!(server.query_count(), 0);
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let server = MockDnsServer::start(MockBehaviour::Silent).await.unwrap();

    let err = resolver(server.addr(), Duration::from_millis(200))
        .resolve("dns.example")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::TransportTimeout { .. }));
}

#[tokio::test]
async fn test_answer_without_a_record_fails() {
    let server = MockDnsServer::start(MockBehaviour::Empty).await.unwrap();

    let err = resolver(server.addr(), Duration::from_secs(2))
        .resolve("nothing.example")
        .await
        .unwrap_err();

    assert_eq!(err, DomainError::ResolutionFailed("nothing.example".to_string()));
}

#[tokio::test]
async fn test_resolve_socket_attaches_port() {
    let server = MockDnsServer::start(MockBehaviour::Answer(Ipv4Addr::new(8, 8, 8, 8)))
        .await
        .unwrap();

    let addr = resolver(server.addr(), Duration::from_secs(2))
        .resolve_socket("dns.google", 853)
        .await
        .unwrap();

    assert_eq!(addr, "8.8.8.8:853".parse::<SocketAddr>().unwrap());
}
