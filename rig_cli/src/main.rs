//! `trackrig`: drive the trackability rig from the command line.

mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_MAX_RUN_MS, JSON_MODE};
use eyre::{Result, WrapErr};
use rig_traits::DeviceLink;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error report handler: {e}");
    }

    let code = match real_main(&cli) {
        Ok(()) => 0,
        Err(err) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            error_fmt::exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: &Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    // Dropped on return so buffered file logs are flushed before exit.
    let _log_guard = init_logging(&cfg.logging, cli.log_level.as_deref(), cli.json)?;
    tracing::debug!(config = ?cli.config, "config loaded");

    match &cli.cmd {
        Commands::Run {
            session,
            max_run_ms,
            auto_heat,
        } => {
            let session = rig_config::load_session_file(session)?;
            for label in session.unreachable_curves() {
                tracing::warn!(%label, "curve lies outside the insertion stroke and will never be reached");
            }

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;

            let opts = run::RunOpts {
                max_run_ms: max_run_ms.unwrap_or(DEFAULT_MAX_RUN_MS),
                auto_heat: *auto_heat,
                progress: !cli.json,
            };
            let summary = run::run_session(&cfg, &session, &opts, shutdown)?;
            if cli.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Validate { session } => {
            let session = rig_config::load_session_file(session)?;
            let unreachable = session.unreachable_curves();
            if cli.json {
                let obj = serde_json::json!({
                    "name": session.name,
                    "target_distance_mm": session.target_distance_mm,
                    "curves": session.curves.len(),
                    "unreachable": unreachable,
                });
                println!("{obj}");
            } else {
                println!(
                    "session {:?}: target {:.1} mm, force threshold {:.1} mN, bath {:.1} °C",
                    session.name,
                    session.target_distance_mm,
                    session.force_threshold_mn,
                    session.target_temperature_c
                );
                println!("curves: {}", session.curves.len());
                for label in unreachable {
                    println!("warning: curve {label:?} lies outside the insertion stroke");
                }
                println!("config and session ok");
            }
        }
        Commands::SelfCheck => {
            let mut link = rig_hardware::SimulatedRig::new(run::sim_cfg(&cfg.simulator));
            if !link.check_connection().connected {
                eyre::bail!("self-check: simulated rig reports disconnected");
            }
            let m = link
                .read_sensors(Duration::from_millis(cfg.timeouts.read_ms))
                .map_err(|e| eyre::eyre!("self-check read failed: {e}"))?;
            if cli.json {
                let obj = serde_json::json!({
                    "status": "ok",
                    "distance_mm": m.distance_mm,
                    "force_mn": m.force_mn,
                    "temperature_c": m.temperature_c,
                });
                println!("{obj}");
            } else {
                println!(
                    "self-check ok: distance {:.1} mm, force {:.1} mN, bath {:.1} °C",
                    m.distance_mm, m.force_mn, m.temperature_c
                );
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<rig_config::Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .map_err(|e| eyre::eyre!("read config {:?}: {}", p, e))?;
            rig_config::load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", p, e))?
        }
        None => rig_config::Config::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays reserved for results.
/// Precedence for the console level: RUST_LOG, --log-level, [logging].level, "info".
fn init_logging(
    cfg: &rig_config::Logging,
    cli_level: Option<&str>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let level = cli_level.or(cfg.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed()
    };

    // File sink: JSON lines, always at the configured file level.
    let mut guard = None;
    let file = match cfg.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {:?} has no file name", path))?;
            let appender = match cfg.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(worker);
            let file_filter = EnvFilter::try_new(cfg.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(guard)
}

fn print_summary(s: &run::RunSummary) {
    println!(
        "session {:?}: run complete in {} ms, phase {}",
        s.session, s.duration_ms, s.final_phase
    );
    println!("curves reached: {}/{}", s.curves_reached.len(), s.curves_total);
    for c in &s.curves_reached {
        println!("  {:<16} {:>8.1} mm  {:>8} ms", c.label, c.distance_mm, c.elapsed_ms);
    }
    if s.interlock_pauses > 0 {
        println!("interlock pauses: {}", s.interlock_pauses);
    }
    match &s.run_log {
        Some(p) => println!("samples recorded: {} ({})", s.samples_recorded, p.display()),
        None => println!("samples recorded: {}", s.samples_recorded),
    }
}
