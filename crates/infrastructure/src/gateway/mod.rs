pub mod engine;
mod workers;

pub use engine::GatewayLoop;
