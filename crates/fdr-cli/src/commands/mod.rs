pub mod case;
pub mod config;
pub mod profile;
pub mod run;
