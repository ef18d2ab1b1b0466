use super::transport::{create_transport, Transport, TransportContext};
use arc_swap::ArcSwap;
use dnsgate_domain::{DomainError, UpstreamEndpoint};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

/// A synthetic resolver address and the upstream it stands for.
pub struct Route {
    pub endpoint: UpstreamEndpoint,
    pub transport: Transport,
}

type RouteTable = HashMap<Ipv4Addr, Arc<Route>>;

/// Maps synthetic resolver addresses to upstream transports.
///
/// The table is rebuilt off to the side and swapped in whole; lookups never
/// see a half-installed mapping.
pub struct UpstreamRouter {
    routes: ArcSwap<RouteTable>,
}

impl Default for UpstreamRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamRouter {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn install(
        &self,
        mappings: &[(Ipv4Addr, UpstreamEndpoint)],
        ctx: &TransportContext,
    ) -> Result<(), DomainError> {
        let mut table = RouteTable::with_capacity(mappings.len());
        for (synthetic, endpoint) in mappings {
            let transport = create_transport(endpoint, ctx)?;
            info!(
                synthetic = %synthetic,
                upstream = %endpoint,
                protocol = transport.protocol_name(),
                "Upstream route installed"
            );
            table.insert(
                *synthetic,
                Arc::new(Route {
                    endpoint: endpoint.clone(),
                    transport,
                }),
            );
        }
        self.routes.store(Arc::new(table));
        Ok(())
    }

    pub fn route(&self, synthetic: Ipv4Addr) -> Option<Arc<Route>> {
        self.routes.load().get(&synthetic).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }

    pub fn clear(&self) {
        self.routes.store(Arc::new(HashMap::new()));
    }
}
