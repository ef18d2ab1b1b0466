pub mod router;
pub mod transport;
