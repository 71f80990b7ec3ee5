//! overnight: scheduled paper trading of index options, bought before the
//! close and sold after the next open.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`scheduler`] drives the engine
//! and [`cli`] wires everything together.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod scheduler;
pub mod cli;
