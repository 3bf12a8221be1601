use fdr_core::{FdrResult, LoadId, Megavars, Megawatts, Network};
use std::collections::BTreeMap;

/// Load demand captured once after the network is built.
///
/// Every step rescales from this snapshot, never from the previous step's
/// values, so scaling does not compound.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalLoads {
    loads: BTreeMap<LoadId, (Megawatts, Megavars)>,
}

impl OriginalLoads {
    pub fn capture(network: &Network) -> Self {
        let loads = network
            .loads()
            .into_iter()
            .map(|l| (l.id, (l.active_power, l.reactive_power)))
            .collect();
        Self { loads }
    }

    /// Overwrite every load with `original × scale`.
    pub fn apply(&self, network: &mut Network, scale: f64) -> FdrResult<()> {
        for (&id, &(p, q)) in &self.loads {
            network.set_load_power(id, p * scale, q * scale)?;
        }
        Ok(())
    }

    pub fn get(&self, id: LoadId) -> Option<(Megawatts, Megavars)> {
        self.loads.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn total_mw(&self) -> f64 {
        self.loads.values().map(|(p, _)| p.value()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescaling_does_not_compound() {
        let mut network = fdr_io::load_standard_feeder("case33bw").unwrap();
        let original = OriginalLoads::capture(&network);
        assert_eq!(original.len(), 32);

        original.apply(&mut network, 1.05).unwrap();
        original.apply(&mut network, 0.8).unwrap();
        let compounded = network.clone();

        let mut direct = fdr_io::load_standard_feeder("case33bw").unwrap();
        original.apply(&mut direct, 0.8).unwrap();

        for (a, b) in compounded.loads().iter().zip(direct.loads().iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.active_power, b.active_power);
            assert_eq!(a.reactive_power, b.reactive_power);
        }
        for load in direct.loads() {
            let (p0, q0) = original.get(load.id).unwrap();
            assert_eq!(load.active_power, p0 * 0.8);
            assert_eq!(load.reactive_power, q0 * 0.8);
        }
    }

    #[test]
    fn snapshot_ignores_later_edits() {
        let mut network = fdr_io::load_standard_feeder("case33bw").unwrap();
        let original = OriginalLoads::capture(&network);
        original.apply(&mut network, 2.0).unwrap();
        assert!((original.total_mw() - 3.715).abs() < 1e-9);
        assert!((network.total_load_mw() - 7.43).abs() < 1e-9);
    }
}
