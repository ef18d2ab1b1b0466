use dnsgate_infrastructure::dns::transport::sni::canonical_host;
use dnsgate_infrastructure::dns::transport::DohTarget;
use std::net::Ipv4Addr;

#[test]
fn test_quad9_literal_gets_canonical_name() {
    let target = DohTarget::parse("https://9.9.9.9").unwrap();

    assert_eq!(target.connect_host(), "9.9.9.9");
    assert_eq!(target.port(), 443);
    assert_eq!(target.server_name(), "dns.quad9.net");
    assert_eq!(target.path(), "/dns-query");
    assert_eq!(target.request_uri(), "https://dns.quad9.net/dns-query");
}

#[test]
fn test_cloudflare_literal_keeps_explicit_path() {
    let target = DohTarget::parse("https://1.1.1.1/dns-query?ct=1").unwrap();

    assert_eq!(target.connect_host(), "1.1.1.1");
    assert_eq!(target.server_name(), "cloudflare-dns.com");
    assert_eq!(target.request_uri(), "https://cloudflare-dns.com/dns-query?ct=1");
}

#[test]
fn test_unknown_literal_keeps_ip_as_server_name() {
    let target = DohTarget::parse("https://203.0.113.7:8443/resolve").unwrap();

    assert_eq!(target.server_name(), "203.0.113.7");
    assert_eq!(target.authority(), "203.0.113.7:8443");
    assert_eq!(target.request_uri(), "https://203.0.113.7:8443/resolve");
}

#[test]
fn test_hostname_passes_through() {
    let target = DohTarget::parse("https://dns.google/dns-query").unwrap();

    assert_eq!(target.connect_host(), "dns.google");
    assert_eq!(target.server_name(), "dns.google");
    assert_eq!(target.url(), "https://dns.google/dns-query");
}

#[test]
fn test_invalid_urls_are_rejected() {
    assert!(DohTarget::parse("http://dns.google/dns-query").is_err());
    assert!(DohTarget::parse("https://").is_err());
    assert!(DohTarget::parse("https://host:notaport/").is_err());
}

#[test]
fn test_canonical_host_table() {
    assert_eq!(canonical_host(Ipv4Addr::new(149, 112, 112, 112)), Some("dns.quad9.net"));
    assert_eq!(canonical_host(Ipv4Addr::new(8, 8, 8, 8)), Some("dns.google"));
    assert_eq!(canonical_host(Ipv4Addr::new(192, 0, 2, 1)), None);
}
