/// Baran & Wu 33-bus radial distribution feeder
///
/// Programmatic construction of the 12.66 kV test feeder from M. E. Baran and
/// F. F. Wu, "Network reconfiguration in distribution systems for loss
/// reduction and load balancing", IEEE Trans. Power Delivery, 1989.
///
/// Bus ids are 0-based: bus 0 is the substation (slack), buses 1-32 carry the
/// loads. Line impedances are published in ohms and converted to per-unit on
/// the configured voltage and MVA base. The five tie switches are kept in the
/// topology as open branches.
use fdr_core::{
    Branch, BranchId, Bus, BusId, Gen, GenId, Kilovolts, Load, LoadId, Megavars, Megawatts,
    Network, PerUnit,
};
use fdr_core::{FdrError, FdrResult};

/// case33bw builder configuration
#[derive(Debug, Clone)]
pub struct Case33bwConfig {
    /// Nominal voltage in kV (default: 12.66 kV)
    pub base_kv: f64,
    /// System base MVA (default: 10.0)
    pub base_mva: f64,
    /// Multiplier applied to every published load (default: 1.0)
    pub load_scale: f64,
    /// Slack voltage setpoint in per-unit (default: 1.0)
    pub slack_voltage_pu: f64,
    /// Add the five normally-open tie switches (default: true)
    pub include_tie_switches: bool,
}

impl Default for Case33bwConfig {
    fn default() -> Self {
        Self {
            base_kv: 12.66,
            base_mva: 10.0,
            load_scale: 1.0,
            slack_voltage_pu: 1.0,
            include_tie_switches: true,
        }
    }
}

pub const NUM_BUSES: usize = 33;

// (bus, P kW, Q kvar)
const LOADS: [(usize, f64, f64); 32] = [
    (1, 100.0, 60.0),
    (2, 90.0, 40.0),
    (3, 120.0, 80.0),
    (4, 60.0, 30.0),
    (5, 60.0, 20.0),
    (6, 200.0, 100.0),
    (7, 200.0, 100.0),
    (8, 60.0, 20.0),
    (9, 60.0, 20.0),
    (10, 45.0, 30.0),
    (11, 60.0, 35.0),
    (12, 60.0, 35.0),
    (13, 120.0, 80.0),
    (14, 60.0, 10.0),
    (15, 60.0, 20.0),
    (16, 60.0, 20.0),
    (17, 90.0, 40.0),
    (18, 90.0, 40.0),
    (19, 90.0, 40.0),
    (20, 90.0, 40.0),
    (21, 90.0, 40.0),
    (22, 90.0, 50.0),
    (23, 420.0, 200.0),
    (24, 420.0, 200.0),
    (25, 60.0, 25.0),
    (26, 60.0, 25.0),
    (27, 60.0, 20.0),
    (28, 120.0, 70.0),
    (29, 200.0, 600.0),
    (30, 150.0, 70.0),
    (31, 210.0, 100.0),
    (32, 60.0, 40.0),
];

// (from, to, R ohm, X ohm)
const LINES: [(usize, usize, f64, f64); 32] = [
    // Main feeder 0 -> 17
    (0, 1, 0.0922, 0.0470),
    (1, 2, 0.4930, 0.2511),
    (2, 3, 0.3660, 0.1864),
    (3, 4, 0.3811, 0.1941),
    (4, 5, 0.8190, 0.7070),
    (5, 6, 0.1872, 0.6188),
    (6, 7, 0.7114, 0.2351),
    (7, 8, 1.0300, 0.7400),
    (8, 9, 1.0440, 0.7400),
    (9, 10, 0.1966, 0.0650),
    (10, 11, 0.3744, 0.1238),
    (11, 12, 1.4680, 1.1550),
    (12, 13, 0.5416, 0.7129),
    (13, 14, 0.5910, 0.5260),
    (14, 15, 0.7463, 0.5450),
    (15, 16, 1.2890, 1.7210),
    (16, 17, 0.7320, 0.5740),
    // Lateral from bus 1
    (1, 18, 0.1640, 0.1565),
    (18, 19, 1.5042, 1.3554),
    (19, 20, 0.4095, 0.4784),
    (20, 21, 0.7089, 0.9373),
    // Lateral from bus 2
    (2, 22, 0.4512, 0.3083),
    (22, 23, 0.8980, 0.7091),
    (23, 24, 0.8960, 0.7011),
    // Lateral from bus 5
    (5, 25, 0.2030, 0.1034),
    (25, 26, 0.2842, 0.1447),
    (26, 27, 1.0590, 0.9337),
    (27, 28, 0.8042, 0.7006),
    (28, 29, 0.5075, 0.2585),
    (29, 30, 0.9744, 0.9630),
    (30, 31, 0.3105, 0.3619),
    (31, 32, 0.3410, 0.5302),
];

const TIE_SWITCHES: [(usize, usize, f64, f64); 5] = [
    (20, 7, 2.0, 2.0),
    (8, 14, 2.0, 2.0),
    (11, 21, 2.0, 2.0),
    (17, 32, 2.0, 2.0),
    (24, 28, 2.0, 2.0),
];

/// Build the 33-bus feeder.
pub fn build_case33bw(config: &Case33bwConfig) -> FdrResult<Network> {
    if !(config.base_kv > 0.0 && config.base_mva > 0.0) {
        return Err(FdrError::Config(format!(
            "case33bw needs positive bases, got {} kV / {} MVA",
            config.base_kv, config.base_mva
        )));
    }

    let base_kv = Kilovolts(config.base_kv);
    let z_base = base_kv.base_impedance_ohm(config.base_mva);
    let mut network = Network::new().with_base_mva(config.base_mva);

    for i in 0..NUM_BUSES {
        let name = if i == 0 {
            "Substation".to_string()
        } else {
            format!("Bus {}", i)
        };
        network.add_bus(Bus {
            id: BusId::new(i),
            name,
            base_kv,
            vmin_pu: Some(PerUnit(0.9)),
            vmax_pu: Some(PerUnit(1.1)),
            ..Bus::default()
        });
    }

    network.add_gen(
        Gen::new(GenId::new(0), "External Grid".to_string(), BusId::new(0))
            .with_voltage_setpoint(config.slack_voltage_pu),
    );

    for (i, (bus, p_kw, q_kvar)) in LOADS.iter().enumerate() {
        network.add_load(Load {
            id: LoadId::new(i),
            name: format!("Load {}", bus),
            bus: BusId::new(*bus),
            active_power: Megawatts(p_kw / 1000.0 * config.load_scale),
            reactive_power: Megavars(q_kvar / 1000.0 * config.load_scale),
        });
    }

    for (i, (from, to, r_ohm, x_ohm)) in LINES.iter().enumerate() {
        network.connect(Branch::new(
            BranchId::new(i),
            format!("Line {}-{}", from, to),
            BusId::new(*from),
            BusId::new(*to),
            r_ohm / z_base,
            x_ohm / z_base,
        ))?;
    }

    if config.include_tie_switches {
        for (i, (from, to, r_ohm, x_ohm)) in TIE_SWITCHES.iter().enumerate() {
            network.connect(
                Branch::new(
                    BranchId::new(LINES.len() + i),
                    format!("Tie {}-{}", from, to),
                    BusId::new(*from),
                    BusId::new(*to),
                    r_ohm / z_base,
                    x_ohm / z_base,
                )
                .open(),
            )?;
        }
    }

    Ok(network)
}
