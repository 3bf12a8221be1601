use std::io::{self, Write};

use anyhow::Result;
use chrono::SecondsFormat;
use fdr_cli::{ProfileArgs, RunConfig};
use fdr_ts::LoadProfile;
use tabwriter::TabWriter;

pub fn handle(mut config: RunConfig, args: &ProfileArgs) -> Result<()> {
    args.apply_to(&mut config);
    config.validate()?;

    let profile = config.profile.build()?;
    let clock = config.simulation.clock()?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "STEP\tTIME\tSCALE")?;
    for (step, time) in clock.ticks(config.simulation.steps)? {
        writeln!(
            writer,
            "{}\t{}\t{:.4}",
            step,
            time.to_rfc3339_opts(SecondsFormat::Secs, true),
            profile.scale(step)
        )?;
    }
    writer.flush()?;

    let (lo, hi) = profile.bounds();
    println!(
        "base={:.2} amplitude={:.2} period={} range=[{:.2}, {:.2}]",
        profile.base, profile.amplitude, profile.period, lo, hi
    );
    Ok(())
}
