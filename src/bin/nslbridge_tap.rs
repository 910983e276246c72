//! nslbridge tap
//!
//! Runs both event class monitors over a simulated driver, streams every
//! notification to stdout as JSON lines, injects synthetic link flaps and L2
//! learn/age events, then shuts down.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nslbridge::{
    logging, BridgeConfig, BridgeError, BridgeResult, JsonLineSink, L2Address, L2Operation, LinkStatus, MacAddress,
    MonitorHub, PortInfo, SimulatedDriver, SwitchDriver,
};

/// Tap configuration
struct Options {
    /// JSON config file
    config: Option<PathBuf>,
    /// Events to inject per class
    events: u32,
    /// Pause between injected events
    interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            events: 8,
            interval: Duration::from_millis(50),
        }
    }
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    if let Some(value) = args.get(i + 1) {
        value
    } else {
        eprintln!("error: {flag} requires a value");
        std::process::exit(1);
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> T {
    raw.parse().unwrap_or_else(|_| {
        eprintln!("error: invalid {what}: {raw}");
        std::process::exit(1);
    })
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                opts.config = Some(PathBuf::from(value_of(&args, i, "--config")));
                i += 2;
            }
            "--events" | "-n" => {
                opts.events = parse_number(value_of(&args, i, "--events"), "event count");
                i += 2;
            }
            "--interval-ms" => {
                let ms: u64 = parse_number(value_of(&args, i, "--interval-ms"), "interval");
                opts.interval = Duration::from_millis(ms);
                i += 2;
            }
            "--help" | "-h" => {
                println!("nslbridge-tap - stream simulated switch events as JSON lines");
                println!();
                println!("USAGE:");
                println!("    nslbridge-tap [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <FILE>       JSON configuration file");
                println!("    -n, --events <N>          Events to inject per class [default: 8]");
                println!("        --interval-ms <MS>    Pause between events [default: 50]");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            other => {
                eprintln!("error: unknown argument: {other}");
                eprintln!("Run with --help for usage information");
                std::process::exit(1);
            }
        }
    }

    opts
}

fn main() -> ExitCode {
    let opts = parse_args();

    let cfg = match opts.config.as_ref() {
        Some(path) => match BridgeConfig::from_json_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("error: {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => BridgeConfig::default(),
    };

    logging::init(&cfg.log_level);

    match run(cfg, &opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "nslbridge-tap failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: BridgeConfig, opts: &Options) -> BridgeResult<()> {
    let link_unit = first_unit(&cfg.link.units)?;
    let l2_unit = first_unit(&cfg.l2.units)?;

    let driver = Arc::new(SimulatedDriver::new());
    let hub = MonitorHub::new(Arc::clone(&driver) as Arc<dyn SwitchDriver>, cfg);

    let link_stream = hub.subscribe_link(JsonLineSink::new(std::io::stdout()))?;
    let l2_stream = hub.subscribe_l2(JsonLineSink::new(std::io::stdout()))?;
    tracing::info!(link = %link_stream.id(), l2 = %l2_stream.id(), "Streaming to stdout");

    for i in 0..opts.events {
        let port = i32::try_from(i % 4).unwrap_or(0) + 1;
        let status = if i % 2 == 0 { LinkStatus::Down } else { LinkStatus::Up };
        driver.inject_link(link_unit, port, &PortInfo::with_link(status, 10_000));

        let mac = MacAddress::new([0x02, 0, 0, 0, 0, u8::try_from(i % 256).unwrap_or(0)]);
        let operation = if i % 3 == 2 { L2Operation::AgeEvent } else { L2Operation::LearnEvent };
        driver.inject_l2(l2_unit, &L2Address::new(mac, 1, port), operation);

        thread::sleep(opts.interval);
    }

    wait_for_delivery(&hub, Duration::from_secs(2));
    hub.shutdown();

    for stats in hub.stats() {
        tracing::info!(
            class = %stats.class,
            dispatched = stats.dispatched,
            delivered = stats.delivered,
            completed = stats.completed(),
            "Final counters"
        );
    }
    Ok(())
}

fn first_unit(units: &[i32]) -> BridgeResult<i32> {
    units
        .first()
        .copied()
        .ok_or_else(|| BridgeError::internal("no units configured"))
}

fn wait_for_delivery(hub: &MonitorHub, limit: Duration) {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        let pending = hub
            .stats()
            .iter()
            .any(|s| s.queue_depth > 0 || s.delivered < s.dispatched * s.active_subscribers as u64);
        if !pending {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    tracing::warn!("Timed out waiting for subscribers to catch up");
}
