pub mod gateway;
pub mod influx_client;

pub use influx_client::InfluxHttpClient;
