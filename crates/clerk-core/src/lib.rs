pub mod agent;
pub mod config;
pub mod extract;
pub mod kb;
pub mod solver;
pub mod types;

pub use types::*;
