//! # fdr-io: built-in feeder cases
//!
//! Networks are built in code rather than parsed, so the workspace runs with
//! no data files. [`load_standard_feeder`] resolves a case by name:
//!
//! ```rust
//! let network = fdr_io::load_standard_feeder("ieee33").unwrap();
//! assert_eq!(network.stats().num_buses, 33);
//! ```

pub mod sources;

pub use sources::{
    available_feeders, build_case33bw, load_standard_feeder, Case33bwConfig, StandardFeeder,
};
