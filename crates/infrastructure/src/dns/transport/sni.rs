use std::net::Ipv4Addr;

/// Well-known DoH literals and the certificate name each one serves.
const CANONICAL_HOSTS: &[(Ipv4Addr, &str)] = &[
    (Ipv4Addr::new(9, 9, 9, 9), "dns.quad9.net"),
    (Ipv4Addr::new(9, 9, 9, 10), "dns.quad9.net"),
    (Ipv4Addr::new(9, 9, 9, 11), "dns.quad9.net"),
    (Ipv4Addr::new(9, 9, 9, 12), "dns.quad9.net"),
    (Ipv4Addr::new(149, 112, 112, 112), "dns.quad9.net"),
    (Ipv4Addr::new(149, 112, 112, 9), "dns.quad9.net"),
    (Ipv4Addr::new(149, 112, 112, 10), "dns.quad9.net"),
    (Ipv4Addr::new(149, 112, 112, 11), "dns.quad9.net"),
    (Ipv4Addr::new(149, 112, 112, 12), "dns.quad9.net"),
    (Ipv4Addr::new(1, 1, 1, 1), "cloudflare-dns.com"),
    (Ipv4Addr::new(1, 0, 0, 1), "cloudflare-dns.com"),
    (Ipv4Addr::new(1, 1, 1, 2), "cloudflare-dns.com"),
    (Ipv4Addr::new(1, 0, 0, 2), "cloudflare-dns.com"),
    (Ipv4Addr::new(1, 1, 1, 3), "cloudflare-dns.com"),
    (Ipv4Addr::new(1, 0, 0, 3), "cloudflare-dns.com"),
    (Ipv4Addr::new(8, 8, 8, 8), "dns.google"),
    (Ipv4Addr::new(8, 8, 4, 4), "dns.google"),
];

pub fn canonical_host(ip: Ipv4Addr) -> Option<&'static str> {
    CANONICAL_HOSTS
        .iter()
        .find(|(literal, _)| *literal == ip)
        .map(|(_, host)| *host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_literals() {
        assert_eq!(canonical_host(Ipv4Addr::new(9, 9, 9, 9)), Some("dns.quad9.net"));
        assert_eq!(canonical_host(Ipv4Addr::new(1, 0, 0, 3)), Some("cloudflare-dns.com"));
        assert_eq!(canonical_host(Ipv4Addr::new(8, 8, 4, 4)), Some("dns.google"));
    }

    #[test]
    fn test_unknown_literal() {
        assert_eq!(canonical_host(Ipv4Addr::new(94, 140, 14, 14)), None);
    }
}
