use std::env;
use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Ticks generated by `demo` when `--ticks` is not given: one hour at 5 s.
pub const DEFAULT_DEMO_TICKS: u64 = 720;
#[cfg(feature = "api")]
pub const DEFAULT_PORT: u16 = 3000;

/// Which process or job to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simulate {
        ticks: Option<u64>,
        start: Option<NaiveDateTime>,
        no_wait: bool,
    },
    Ingest,
    Rules,
    Analytics,
    Efficiency,
    Forecast,
    Report,
    Export {
        out: PathBuf,
    },
    Demo {
        ticks: u64,
        start: Option<NaiveDateTime>,
    },
    #[cfg(feature = "api")]
    Serve {
        port: u16,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub command: Command,
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    /// Use the process-local store instead of the hosted database.
    pub memory: bool,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    let Some((name, rest)) = args.split_first() else {
        return Err("missing command".to_string());
    };
    let command = match name.as_str() {
        "--help" | "-h" | "help" => Command::Help,
        "simulate" => Command::Simulate {
            ticks: None,
            start: None,
            no_wait: false,
        },
        "ingest" => Command::Ingest,
        "rules" => Command::Rules,
        "analytics" => Command::Analytics,
        "efficiency" => Command::Efficiency,
        "forecast" => Command::Forecast,
        "report" => Command::Report,
        "export" => Command::Export {
            out: PathBuf::new(),
        },
        "demo" => Command::Demo {
            ticks: DEFAULT_DEMO_TICKS,
            start: None,
        },
        #[cfg(feature = "api")]
        "serve" => Command::Serve { port: DEFAULT_PORT },
        other => return Err(format!("unknown command: {other}")),
    };
    parse_options(command, rest)
}

fn parse_options(mut command: Command, args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut scenario = None;
    let mut preset = None;
    let mut seed = None;
    let mut memory = false;
    let mut out = None;
    let mut help = false;

    while i < args.len() {
        let flag = args[i].as_str();
        match (flag, &mut command) {
            ("--scenario", _) => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            ("--preset", _) => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            ("--seed", _) => {
                i += 1;
                seed = Some(parse_value::<u64>(args, i, "--seed", "a u64")?);
            }
            ("--memory", _) => memory = true,
            ("--help" | "-h", _) => help = true,
            ("--ticks", Command::Simulate { ticks, .. }) => {
                i += 1;
                *ticks = Some(parse_value(args, i, "--ticks", "a tick count")?);
            }
            ("--ticks", Command::Demo { ticks, .. }) => {
                i += 1;
                *ticks = parse_value(args, i, "--ticks", "a tick count")?;
            }
            ("--start", Command::Simulate { start, .. } | Command::Demo { start, .. }) => {
                i += 1;
                *start = Some(parse_value(args, i, "--start", "an ISO timestamp like 2024-06-03T06:00:00")?);
            }
            ("--no-wait", Command::Simulate { no_wait, .. }) => *no_wait = true,
            ("--out", Command::Export { .. }) => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --out (expected a file path)")?;
                out = Some(PathBuf::from(path));
            }
            #[cfg(feature = "api")]
            ("--port", Command::Serve { port }) => {
                i += 1;
                *port = parse_value(args, i, "--port", "a u16")?;
            }
            (other, _) => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if help {
        command = Command::Help;
    }

    if scenario.is_some() && preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if let Command::Export { out: target } = &mut command {
        *target = out.ok_or_else(|| "export requires --out <path>".to_string())?;
    }

    Ok(CliOptions {
        command,
        scenario,
        preset,
        seed,
        memory,
    })
}

fn parse_value<T: std::str::FromStr>(
    args: &[String],
    index: usize,
    flag: &str,
    expected: &str,
) -> Result<T, String> {
    let raw = args.next_or_err(index, &format!("missing value for {flag} (expected {expected})"))?;
    raw.parse()
        .map_err(|_| format!("{flag} value \"{raw}\" is not {expected}"))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("microgrid-sim: microgrid telemetry simulator and analytics jobs");
    eprintln!();
    eprintln!("Usage: microgrid-sim <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  simulate     Publish generated readings (--ticks N --start <iso> --no-wait)");
    eprintln!("  ingest       Bridge the telemetry topic into the store");
    eprintln!("  rules        Run the streaming rules engine");
    eprintln!("  analytics    Batch analytics over the trailing window");
    eprintln!("  efficiency   Recompute the efficiency proof");
    eprintln!("  forecast     Forecast tomorrow's solar output");
    eprintln!("  report       Write the performance report");
    eprintln!("  export       Export stored readings to CSV (--out <path>)");
    eprintln!("  demo         Run the whole pipeline in-process (--ticks N --start <iso>)");
    #[cfg(feature = "api")]
    eprintln!("  serve        Start the REST API (--port <u16>, default 3000)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>   Load configuration from a TOML file");
    eprintln!("  --preset <name>     Use a built-in preset (baseline, high_solar, small_battery)");
    eprintln!("  --seed <u64>        Override the random seed");
    eprintln!("  --memory            Use an in-process store instead of the hosted database");
    eprintln!("  --help              Show this help message");
}
