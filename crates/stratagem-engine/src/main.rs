//! Demo host for the Stratagem plan executor.
//!
//! Wires the executor to a scripted world and a simulated dispatcher, feeds
//! it plans and runs the tick loop until the tick bound or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `stratagem-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the executor and its clock
//! 4. Build the scripted world and dispatcher from the `scenario` section
//! 5. Submit plans from the file named on the command line, the scenario's
//!    `plans_file`, or the built-in demo
//! 6. Run the tick loop
//! 7. Log the result
//!
//! ```text
//! stratagem-engine [plans.json]
//! ```

mod error;
mod log_callback;
mod plans;
mod scenario;
mod scripted;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use stratagem_core::config::{LogFormat, LoggingConfig};
use stratagem_core::{EngineConfig, PlanExecutor, RunControl, run_executor, runner};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::log_callback::LogCallback;
use crate::scenario::ScenarioConfig;

/// Configuration file, relative to the working directory.
const CONFIG_PATH: &str = "stratagem-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading engine configuration")?;
    init_tracing(&config.logging)?;

    info!("stratagem-engine starting");
    info!(
        tick_rate_hz = config.simulation.tick_rate_hz,
        max_ticks = config.simulation.max_ticks,
        realtime = config.simulation.realtime,
        max_steps = config.limits.max_steps,
        max_plan_duration_ms = config.limits.max_plan_duration_ms,
        "Configuration loaded"
    );

    let mut executor = PlanExecutor::from_config(&config).map_err(EngineError::from)?;
    info!(
        registered_actions = executor.validator().registry().len(),
        tick_interval_ms = executor.clock().tick_interval_ms(),
        "Executor initialized"
    );

    let scenario = ScenarioConfig::load(Path::new(CONFIG_PATH))?;
    let (mut world, mut dispatcher) = scripted::build(&scenario);

    let plans_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| scenario.plans_file.clone());
    let submissions = match plans_path {
        Some(path) => {
            info!(path = %path.display(), "Loading plans");
            plans::load(&path)?
        }
        None => {
            info!("No plans file given, using the built-in demo");
            plans::demo(world.unit_ids())
        }
    };
    let accepted = plans::submit_all(&executor.handle(), &submissions);
    info!(accepted, submitted = submissions.len(), "Startup plans submitted");

    let control = Arc::new(RunControl::from_config(
        &config.simulation,
        executor.clock().tick_interval_ms(),
    ));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping after the current tick");
                control.request_stop();
            }
        });
    }

    let mut callback = LogCallback::new(u64::from(executor.clock().tick_rate_hz()));
    let result = run_executor(&mut executor, &mut world, &mut dispatcher, &control, &mut callback)
        .await
        .map_err(EngineError::from)?;

    runner::log_run_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        events = callback.events_seen(),
        units_alive = world.alive_count(),
        elapsed_seconds = control.elapsed_seconds(),
        stats = %serde_json::to_string(&result.stats).unwrap_or_default(),
        "stratagem-engine shutdown complete"
    );

    Ok(())
}

/// Load the engine configuration, falling back to defaults when the file
/// does not exist.
fn load_config() -> Result<EngineConfig, EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(EngineConfig::from_file(path)?)
    } else {
        let mut config = EngineConfig::default();
        config.logging.apply_env_override();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log filter `{}`: {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
