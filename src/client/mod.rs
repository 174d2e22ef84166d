//! Client Module
//!
//! Client-side mirror of the frame codec with a uniform result contract.

mod transport;

pub use transport::{Client, Transfer};
