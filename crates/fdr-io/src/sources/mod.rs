pub mod case33bw;

pub use case33bw::{build_case33bw, Case33bwConfig};

use fdr_core::{FdrError, FdrResult, Network};
use std::str::FromStr;

/// Feeders that ship with the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFeeder {
    Case33bw,
}

impl StandardFeeder {
    /// Accepted names, canonical first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            StandardFeeder::Case33bw => &["case33bw", "ieee33", "ieee-33", "33bus"],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.aliases()[0]
    }

    /// Display name used in plot titles.
    pub fn title(self) -> &'static str {
        match self {
            StandardFeeder::Case33bw => "IEEE-33",
        }
    }

    pub fn all() -> &'static [StandardFeeder] {
        &[StandardFeeder::Case33bw]
    }

    pub fn build(self) -> FdrResult<Network> {
        match self {
            StandardFeeder::Case33bw => build_case33bw(&Case33bwConfig::default()),
        }
    }
}

impl FromStr for StandardFeeder {
    type Err = FdrError;

    fn from_str(name: &str) -> FdrResult<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        StandardFeeder::all()
            .iter()
            .copied()
            .find(|feeder| feeder.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| {
                FdrError::Config(format!(
                    "unknown feeder '{}'; supported names: {}",
                    name,
                    available_feeders().join(", ")
                ))
            })
    }
}

/// Every accepted feeder name, aliases included.
pub fn available_feeders() -> Vec<&'static str> {
    StandardFeeder::all()
        .iter()
        .flat_map(|feeder| feeder.aliases().iter().copied())
        .collect()
}

/// Build a built-in feeder by name (case-insensitive).
pub fn load_standard_feeder(name: &str) -> FdrResult<Network> {
    let feeder: StandardFeeder = name.parse()?;
    let network = feeder.build()?;
    tracing::debug!(feeder = feeder.as_str(), stats = %network.stats(), "loaded feeder");
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_case_insensitively() {
        for name in ["case33bw", "IEEE33", "ieee-33", "33Bus", " case33bw "] {
            assert_eq!(
                name.parse::<StandardFeeder>().unwrap(),
                StandardFeeder::Case33bw,
                "{name}"
            );
        }
    }

    #[test]
    fn unknown_feeder_lists_supported_names() {
        let err = load_standard_feeder("case118").unwrap_err();
        assert!(matches!(err, FdrError::Config(_)));
        let text = err.to_string();
        assert!(text.contains("case118"));
        assert!(text.contains("case33bw"));
        assert!(text.contains("33bus"));
    }

    #[test]
    fn available_feeders_lists_every_alias() {
        assert_eq!(
            available_feeders(),
            vec!["case33bw", "ieee33", "ieee-33", "33bus"]
        );
    }
}
