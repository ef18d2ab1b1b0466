pub mod builders;
pub mod dns_server_mock;
pub mod doq_server_mock;
pub mod mock_tunnel;
