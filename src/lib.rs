//! a library for estimating the area, latency and energy of a compute tile
pub mod circuit;
pub mod cli;
pub mod error;
pub mod pe;
pub mod report;
pub mod tile;
pub mod tools;

#[cfg(test)]
mod test_helpers;

use clap::Parser;
use cli::{AreaArgs, Cli, Operation, RunArgs, SweepArgs};
use eyre::{Context, Result};
use serde::Serialize;
use std::{
    ffi::OsString,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};
pub use tile::Tile;
use tile::config::Config;
use tracing::{info, metadata::LevelFilter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;

pub fn init_logger_with_ansi(
    filter: LevelFilter,
    writer: impl for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
    ansi: bool,
) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .unwrap_or_else(|e| {
            eprintln!("failed to init logger: {}", e);
        });
}

pub fn init_logger(
    filter: LevelFilter,
    writer: impl for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
) {
    init_logger_with_ansi(filter, writer, false);
}

/// log to `neuro_tile.log` in `log_dir`, the guard must live until the command returns
fn init_file_logger(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log dir {log_dir:?}"))?;
    let file_appender = tracing_appender::rolling::hourly(log_dir, "neuro_tile.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    init_logger(LevelFilter::INFO, non_blocking);
    Ok(guard)
}

/// `output/tile.json` + `area` -> `output/tile_area.json`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tile".to_string());
    let file_name = match path.extension() {
        Some(extension) => format!("{stem}_{suffix}.{}", extension.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(file_name)
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).wrap_err_with(|| format!("failed to create {dir:?}"))?;
    }
    let file = File::create(path).wrap_err_with(|| format!("failed to create {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    info!("the result is written to {:?}", path);
    Ok(())
}

/// the main function of the estimator
pub fn main_inner<A, T>(args: A) -> Result<()>
where
    A: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let current_time = Instant::now();

    match cli.subcmd {
        Operation::Run(RunArgs { config: path }) => {
            let config = Config::new(&path)?;
            let _guard = init_file_logger(&config.log_dir)?;
            info!("run with config: {:?}", path);
            let report = report::run(&config, &Config::name(&path))?;
            report.show_results();
            write_json(&config.output_path, &report)?;
        }
        Operation::Area(AreaArgs { config: path }) => {
            let config = Config::new(&path)?;
            let _guard = init_file_logger(&config.log_dir)?;
            info!("area with config: {:?}", path);
            let report = report::run_area(&config, &Config::name(&path))?;
            report.show_results();
            write_json(&with_suffix(&config.output_path, "area"), &report)?;
        }
        Operation::Sweep(SweepArgs { configs, output }) => {
            let configs = configs
                .iter()
                .map(|path| Ok((Config::name(path), Config::new(path)?)))
                .collect::<Result<Vec<_>>>()?;
            let log_dir = configs
                .first()
                .map(|(_, config)| config.log_dir.clone())
                .unwrap_or_else(|| PathBuf::from("output/"));
            let _guard = init_file_logger(&log_dir)?;
            info!("sweep over {} configs", configs.len());
            let report = report::sweep(&configs)?;
            report.show_results();
            write_json(&output, &report)?;
        }
    }
    info!(
        "time elapsed: {}",
        humantime::format_duration(current_time.elapsed())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_keeps_the_directory() {
        assert_eq!(
            with_suffix(Path::new("output/tile.json"), "area"),
            PathBuf::from("output/tile_area.json")
        );
        assert_eq!(with_suffix(Path::new("tile"), "area"), PathBuf::from("tile_area"));
    }

    /// a copy of a shipped config writing into its own temp dir
    fn scratch_config(name: &str, test: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("neuro_tile_{}_{test}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let shipped = fs::read_to_string(format!("configs/{name}.toml")).unwrap();
        let body = shipped
            .lines()
            .filter(|line| !line.starts_with("output_path") && !line.starts_with("log_dir"))
            .collect::<Vec<_>>()
            .join("\n");
        let content = format!(
            "output_path = {:?}\nlog_dir = {:?}\n{body}\n",
            dir.join(format!("{name}.json")).display().to_string(),
            dir.join("log").display().to_string(),
        );
        let path = dir.join(format!("{name}.toml"));
        fs::write(&path, content).unwrap();
        (path, dir)
    }

    #[test]
    fn run_writes_a_report() {
        let (config, dir) = scratch_config("conventional", "run");
        main_inner(["neuro_tile".into(), "run".into(), config.into_os_string()]).unwrap();
        let content = fs::read_to_string(dir.join("conventional.json")).unwrap();
        let report: report::TileReport = serde_json::from_str(&content).unwrap();
        assert_eq!(report.config_name, "conventional");
        assert!(report.performance.is_some());
        assert!(dir.join("log").is_dir());
    }

    #[test]
    fn area_writes_a_report() {
        let (config, dir) = scratch_config("novel", "area");
        main_inner(["neuro_tile".into(), "area".into(), config.into_os_string()]).unwrap();
        let content = fs::read_to_string(dir.join("novel_area.json")).unwrap();
        let report: report::TileReport = serde_json::from_str(&content).unwrap();
        assert!(report.area.total > 0.0);
        assert!(report.performance.is_none());
    }

    #[test]
    fn sweep_writes_a_summary() {
        let mut args: Vec<OsString> = vec!["neuro_tile".into(), "sweep".into()];
        let mut dir = PathBuf::new();
        for name in ["conventional", "novel", "decoder"] {
            let (config, scratch) = scratch_config(name, "sweep");
            args.push(config.into_os_string());
            dir = scratch;
        }
        let output = dir.join("sweep.json");
        args.push("--output".into());
        args.push(output.clone().into_os_string());
        main_inner(args).unwrap();
        let content = fs::read_to_string(output).unwrap();
        let report: report::SweepReport = serde_json::from_str(&content).unwrap();
        assert_eq!(report.points.len(), 3);
        assert_eq!(report.points[2].config_name, "decoder");
    }

    #[test]
    fn missing_config_is_an_error() {
        assert!(main_inner(["neuro_tile", "run", "configs/missing.toml"]).is_err());
    }
}
