pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, ProfileArgs, RunArgs};
pub use config::RunConfig;
