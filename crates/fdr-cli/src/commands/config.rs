use anyhow::Result;
use fdr_cli::RunConfig;

pub fn handle(config: &RunConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
