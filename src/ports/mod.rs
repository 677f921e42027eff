//! Port traits at the boundary between the domain and its collaborators.

pub mod config_port;
pub mod market_data_port;
pub mod report_port;
