//! Command-line control for a Joule sous-vide circulator
//!
//! Polls the circulator for telemetry and starts/stops cook programs over BLE.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use joule_ble::{BtleplugTransport, SimulatedJoule};
use joule_controller::{
    Coordinator, CoordinatorConfig, Snapshot, TemperatureUnit, default_config_path,
};

/// Address the simulated device answers to
const SIMULATED_ADDRESS: &str = "00:00:00:00:00:00";

#[derive(Parser)]
#[command(name = "joulectl")]
#[command(about = "Control a Joule sous-vide circulator over Bluetooth LE")]
struct Cli {
    /// Bluetooth address of the circulator
    #[arg(short, long, env = "JOULE_ADDRESS")]
    address: Option<String>,

    /// Config file (default: $JOULE_HOME/config.json)
    #[arg(short, long, env = "JOULE_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to wait for telemetry after each request
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Display unit for temperatures (°C or °F)
    #[arg(short, long)]
    unit: Option<TemperatureUnit>,

    /// Talk to a simulated circulator instead of real hardware
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll once and print the snapshot as JSON
    Status,
    /// Poll repeatedly and print one line per reading
    Watch {
        /// Stop after this many polls
        #[arg(short = 'n', long)]
        count: Option<u64>,
        /// Seconds between polls (default from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Start a cook program
    Start {
        /// Target bath temperature in °C
        #[arg(short, long)]
        temperature: Option<f32>,
        /// Cook time in minutes, 0 for no limit
        #[arg(short, long)]
        minutes: Option<f32>,
    },
    /// Stop the running program
    Stop,
    /// Write the effective settings to the config file
    SaveConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(default_config_path);
    let mut config = match &config_path {
        Some(path) => CoordinatorConfig::load(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(address) = &cli.address {
        config.address = address.clone();
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_feed_timeout(Duration::try_from_secs_f64(timeout)?);
    }
    if let Some(unit) = cli.unit {
        config.temperature_unit = unit;
    }
    if cli.simulate && config.address.is_empty() {
        config.address = SIMULATED_ADDRESS.to_string();
    }

    if let Commands::SaveConfig = cli.command {
        let path = config_path.ok_or("Could not determine config directory, pass --config")?;
        config.save(&path)?;
        println!("Saved {}", path.display());
        return Ok(());
    }

    if config.address.is_empty() {
        return Err("No device address: pass --address or set JOULE_ADDRESS".into());
    }

    let mut joule = if cli.simulate {
        Coordinator::new(config.clone(), SimulatedJoule::new())?
    } else {
        let transport = BtleplugTransport::new(config.scan_timeout());
        Coordinator::new(config.clone(), transport)?
    };

    let result = run(&mut joule, &config, cli.command);
    joule.shutdown();
    result
}

fn run(
    joule: &mut Coordinator,
    config: &CoordinatorConfig,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Status => {
            let snapshot = joule.poll()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Watch { count, interval } => {
            let interval = interval.map(Duration::from_secs).unwrap_or(config.poll_interval());
            watch(joule, count, interval);
        }
        Commands::Start { temperature, minutes } => {
            let snapshot = joule.snapshot();
            let temperature = temperature.unwrap_or(snapshot.target_temperature);
            let minutes = minutes.unwrap_or(snapshot.cook_time_minutes);
            joule.start_cooking(temperature, minutes)?;
            println!("{}", describe(&joule.snapshot()));
        }
        Commands::Stop => {
            joule.stop_cooking()?;
            println!("{}", describe(&joule.snapshot()));
        }
        // Handled before connecting
        Commands::SaveConfig => {}
    }
    Ok(())
}

/// Poll failures are reported and the loop keeps going.
fn watch(joule: &mut Coordinator, count: Option<u64>, interval: Duration) {
    let mut polls = 0;
    loop {
        match joule.poll() {
            Ok(snapshot) => println!("{}", describe(&snapshot)),
            Err(e) => eprintln!("unavailable: {e}"),
        }
        polls += 1;
        if count.is_some_and(|n| polls >= n) {
            break;
        }
        std::thread::sleep(interval);
    }
}

fn describe(snapshot: &Snapshot) -> String {
    let unit = snapshot.temperature_unit;
    let state = if snapshot.is_cooking { "cooking" } else { "idle" };
    let mut line = format!(
        "{:.1}{unit} {state} (target {:.1}{unit}",
        display_temperature(snapshot.current_temperature, unit),
        display_temperature(snapshot.target_temperature, unit),
    );
    if snapshot.cook_time_minutes > 0.0 {
        line.push_str(&format!(", {} min", snapshot.cook_time_minutes));
    }
    line.push(')');
    if let Some(step) = snapshot.program_step {
        line.push_str(&format!(" {step:?}"));
        if snapshot.time_remaining > 0 {
            line.push_str(&format!(", {} s left", snapshot.time_remaining));
        }
    }
    line
}

fn display_temperature(celsius: f32, unit: TemperatureUnit) -> f32 {
    match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
    }
}

#[cfg(test)]
mod tests {
    use joule_controller::ProgramStep;

    use super::*;

    #[test]
    fn describes_idle_snapshot() {
        let snapshot = Snapshot {
            temperature_unit: TemperatureUnit::Celsius,
            ..Snapshot::default()
        };
        assert_eq!(describe(&snapshot), "0.0°C idle (target 60.0°C)");
    }

    #[test]
    fn describes_in_fahrenheit() {
        let snapshot = Snapshot {
            current_temperature: 100.0,
            is_cooking: true,
            cook_time_minutes: 90.0,
            program_step: Some(ProgramStep::Cook),
            time_remaining: 120,
            ..Snapshot::default()
        };
        assert_eq!(
            describe(&snapshot),
            "212.0°F cooking (target 140.0°F, 90 min) Cook, 120 s left"
        );
    }

    #[test]
    fn cli_parses_start() {
        let cli = Cli::try_parse_from([
            "joulectl", "--simulate", "--unit", "°C", "start", "--temperature", "62.5", "-m", "45",
        ])
        .unwrap();
        assert!(cli.simulate);
        assert_eq!(cli.unit, Some(TemperatureUnit::Celsius));
        assert!(matches!(
            cli.command,
            Commands::Start { temperature: Some(t), minutes: Some(m) } if t == 62.5 && m == 45.0
        ));
    }

    #[test]
    fn simulated_status_round() {
        let config = CoordinatorConfig::new(SIMULATED_ADDRESS)
            .with_feed_timeout(Duration::from_millis(500));
        let mut joule = Coordinator::new(config.clone(), SimulatedJoule::new()).unwrap();
        run(&mut joule, &config, Commands::Start { temperature: Some(56.0), minutes: None }).unwrap();
        assert!(joule.snapshot().is_cooking);
        run(&mut joule, &config, Commands::Stop).unwrap();
        assert!(!joule.snapshot().is_cooking);
        joule.shutdown();
    }
}
