//! skirmish - tactical combat engine
//!
//! Turn-based tabletop combat on a square grid: initiative, attacks,
//! healing, movement, cover and death saves, with every resolved action
//! kept in an audit log.

pub mod combat;
pub mod command;
pub mod config;
pub mod grid;
pub mod registry;
pub mod scenario;

pub use command::{execute, Command};
pub use config::Config;
pub use registry::{SessionRegistry, SweeperHandle};
pub use scenario::Scenario;
