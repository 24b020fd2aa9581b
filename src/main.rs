//! Microgrid simulator entry point: CLI wiring and store/bus construction.

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use microgrid_sim::cli::{self, CliOptions, Command, DEFAULT_DEMO_TICKS};
use microgrid_sim::config::{self, MicrogridConfig, StoreCredentials};
use microgrid_sim::error::Result;
use microgrid_sim::jobs::{self, SimulateOptions};
use microgrid_sim::logging;
use microgrid_sim::shutdown::Shutdown;
use microgrid_sim::store::{MemoryStore, RestStore, Store};
use microgrid_sim::transport::MqttBus;
use microgrid_sim::weather::{OpenWeatherMap, Weather, fallback_weather, weather_or_fallback};

/// Timeout for every request to the hosted store.
const STORE_TIMEOUT: StdDuration = StdDuration::from_secs(10);

type SharedStore = Arc<dyn Store + Send + Sync>;

fn load_config(opts: &CliOptions) -> std::result::Result<MicrogridConfig, config::ConfigError> {
    let mut cfg = if let Some(path) = &opts.scenario {
        MicrogridConfig::from_toml_file(path)?
    } else if let Some(name) = &opts.preset {
        MicrogridConfig::from_preset(name)?
    } else {
        MicrogridConfig::baseline()
    };
    if let Some(seed) = opts.seed {
        cfg.simulation.seed = seed;
    }
    Ok(cfg)
}

/// Opens the hosted store, or with `--memory` a local store seeded by the
/// demo pipeline so the batch jobs have a recent history to work on.
fn open_store(cfg: &MicrogridConfig, memory: bool) -> Result<SharedStore> {
    if memory {
        let store = MemoryStore::new();
        let start = jobs::backfill_start(cfg, DEFAULT_DEMO_TICKS, jobs::now())?;
        jobs::demo(cfg, &store, DEFAULT_DEMO_TICKS, start)?;
        return Ok(Arc::new(store));
    }
    let credentials = StoreCredentials::from_env()?;
    Ok(Arc::new(RestStore::new(&credentials, STORE_TIMEOUT)?))
}

fn current_weather(cfg: &MicrogridConfig) -> Weather {
    let mut rng = StdRng::seed_from_u64(cfg.simulation.seed);
    let w = &cfg.weather;
    match OpenWeatherMap::new(
        config::weather_api_key(),
        w.latitude,
        w.longitude,
        StdDuration::from_secs(w.timeout_secs),
    ) {
        Ok(source) => weather_or_fallback(&source, &mut rng),
        Err(err) => {
            warn!(%err, "weather client unavailable, using fallback");
            fallback_weather(&mut rng)
        }
    }
}

fn connect_bus(cfg: &MicrogridConfig, role: &str) -> MqttBus {
    let b = &cfg.broker;
    MqttBus::connect(&b.host, b.port, &format!("{}-{role}", b.client_id))
}

fn interruptible() -> Result<Shutdown> {
    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c()?;
    Ok(shutdown)
}

fn run(opts: &CliOptions, cfg: &MicrogridConfig) -> Result<()> {
    match &opts.command {
        Command::Help => cli::print_usage(),
        Command::Simulate {
            ticks,
            start,
            no_wait,
        } => {
            let shutdown = interruptible()?;
            let weather = current_weather(cfg);
            let mut bus = connect_bus(cfg, "simulator");
            let summary = jobs::run_simulator(
                cfg,
                &mut bus,
                weather,
                &SimulateOptions {
                    ticks: *ticks,
                    start: *start,
                    wait: !no_wait,
                },
                &shutdown,
            )?;
            info!(final_soc = summary.final_state.battery_soc, "simulation finished");
        }
        Command::Ingest => {
            let shutdown = interruptible()?;
            let store = open_store(cfg, opts.memory)?;
            let mut bus = connect_bus(cfg, "ingest");
            jobs::run_ingest(cfg, &mut bus, store.as_ref(), &shutdown)?;
        }
        Command::Rules => {
            let shutdown = interruptible()?;
            let store = open_store(cfg, opts.memory)?;
            jobs::run_rules_engine(cfg, store.as_ref(), &shutdown);
        }
        Command::Analytics => {
            let store = open_store(cfg, opts.memory)?;
            let outcome = jobs::run_batch_analytics(cfg, store.as_ref(), jobs::now())?;
            println!("{}", outcome.summary);
        }
        Command::Efficiency => {
            let store = open_store(cfg, opts.memory)?;
            let proof = jobs::run_efficiency(cfg, store.as_ref(), jobs::now())?;
            println!("{proof}");
        }
        Command::Forecast => {
            let store = open_store(cfg, opts.memory)?;
            let forecast = jobs::run_forecast(cfg, store.as_ref(), jobs::now())?;
            println!("{forecast}");
        }
        Command::Report => {
            let store = open_store(cfg, opts.memory)?;
            let report = jobs::run_report(cfg, store.as_ref(), jobs::now())?;
            println!("{report}");
        }
        Command::Export { out } => {
            let store = open_store(cfg, opts.memory)?;
            let rows = jobs::export_readings(store.as_ref(), Path::new(out))?;
            eprintln!("{rows} readings written to {}", out.display());
        }
        Command::Demo { ticks, start } => {
            let store = MemoryStore::new();
            let start = match start {
                Some(start) => *start,
                None => jobs::backfill_start(cfg, *ticks, jobs::now())?,
            };
            let summary = jobs::demo(cfg, &store, *ticks, start)?;
            if let Some(batch) = &summary.batch {
                println!("{}", batch.summary);
            }
            if let Some(proof) = &summary.efficiency {
                println!("{proof}");
            }
            if let Some(forecast) = &summary.forecast {
                println!("{forecast}");
            }
            if let Some(report) = &summary.report {
                println!("{report}");
            }
        }
        #[cfg(feature = "api")]
        Command::Serve { port } => {
            use std::net::SocketAddr;

            let state = Arc::new(microgrid_sim::api::AppState {
                store: open_store(cfg, opts.memory)?,
                config: cfg.clone(),
            });
            let addr = SocketAddr::from(([0, 0, 0, 0], *port));
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(microgrid_sim::api::serve(state, addr))?;
        }
    }
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    logging::init();

    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };

    let cfg = match load_config(&opts) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    if let Err(err) = run(&opts, &cfg) {
        if err.is_not_enough_data() {
            warn!("{err}");
        } else {
            error!("{err}");
            process::exit(1);
        }
    }
}
