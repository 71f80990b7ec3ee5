//! Port traits: the seams between the trading core and the outside world.

pub mod clock_port;
pub mod config_port;
pub mod market_port;
pub mod store_port;
