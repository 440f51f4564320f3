pub mod chain;
pub mod config;
pub mod cycle;
pub mod expect;
pub mod jail;
mod misc;
pub mod notify;
pub mod parse;

pub use misc::*;
/// Reexported to reduce dependency wrangling
pub use super_orchestrator;
