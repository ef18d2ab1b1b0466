//! dnsgate Infrastructure Layer
pub mod dns;
pub mod gateway;
pub mod net;
pub mod packet;
