use anyhow::{bail, Context, Result};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

mod config;
mod scenario;

use config::{SyncConfig, DEFAULT_CONFIG_PATH};

fn main() -> Result<()> {
    let cli = CliOptions::parse(env::args().skip(1))?;

    // Start with RUST_LOG (or info) so config warnings are visible, then
    // switch to the configured filter when RUST_LOG is unset.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut cfg = SyncConfig::load_from_path(&config_path);
    if !has_env_filter {
        filter_handle
            .reload(EnvFilter::new(&cfg.log_filter))
            .context("applying configured log filter")?;
    }

    info!("Starting spawnsync v{}", env!("CARGO_PKG_VERSION"));
    for flag in &cli.ignored {
        warn!(%flag, "ignoring unknown argument");
    }

    if let Some(observers) = cli.observers {
        cfg.observers = observers;
    }
    if let Some(seed) = cli.seed {
        cfg.seed = seed;
    }
    if let Some(ticks) = cli.ticks {
        cfg.ticks = ticks;
    }

    let report = scenario::run(&cfg)?;
    println!("{report}");
    if report.total_awaiting() > 0 {
        warn!(awaiting = report.total_awaiting(), "some objects never synced");
    }
    Ok(())
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    observers: Option<u32>,
    seed: Option<u64>,
    ticks: Option<u32>,
    ignored: Vec<String>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self> {
        let mut opts = CliOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => match args.next() {
                    Some(path) => opts.config = Some(PathBuf::from(path)),
                    None => bail!("--config requires a file path"),
                },
                "--observers" => opts.observers = Some(parse_value(&arg, args.next())?),
                "--seed" => opts.seed = Some(parse_value(&arg, args.next())?),
                "--ticks" => opts.ticks = Some(parse_value(&arg, args.next())?),
                _ => opts.ignored.push(arg),
            }
        }
        Ok(opts)
    }
}

fn parse_value<T>(flag: &str, raw: Option<String>) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        bail!("{flag} requires an integer");
    };
    match raw.parse::<T>() {
        Ok(value) => Ok(value),
        Err(err) => bail!("{flag} must be an integer, got {raw:?}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_known_flags() {
        let opts = CliOptions::parse(args(&["--observers", "4", "--seed", "99", "--config", "x.toml"])).unwrap();
        assert_eq!(opts.observers, Some(4));
        assert_eq!(opts.seed, Some(99));
        assert_eq!(opts.config, Some(PathBuf::from("x.toml")));
        assert!(opts.ignored.is_empty());
    }

    #[test]
    fn unknown_flags_are_collected() {
        let opts = CliOptions::parse(args(&["--verbose", "--ticks", "5"])).unwrap();
        assert_eq!(opts.ignored, vec!["--verbose".to_string()]);
        assert_eq!(opts.ticks, Some(5));
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(CliOptions::parse(args(&["--seed", "abc"])).is_err());
        assert!(CliOptions::parse(args(&["--ticks"])).is_err());
    }
}
