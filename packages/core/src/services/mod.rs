pub mod gps_id;
pub mod mock_provider;
