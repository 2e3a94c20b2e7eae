//! Cadence Agent CLI
//!
//! Diurnal interaction driver for remote Android devices.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use cadence_agent::{
    agent::Agent,
    config::Config,
    device::{AdbDevice, AdbTransport, DeviceControl, NoopDevice, UnlockMethod},
    schedule::{DaySchedule, SchoolProfile},
    scheduler::now_in,
    vision::{AdbFrameSource, Classifier, CommandClassifier, FrameSource, NoopClassifier, NoopFrameSource},
    VERSION,
};

#[derive(Parser)]
#[command(name = "cadence-agent")]
#[command(version = VERSION)]
#[command(about = "Diurnal interaction driver for remote Android devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Run {
        /// School profile override
        #[arg(long, value_enum)]
        profile: Option<SchoolProfile>,

        /// Unlock with this PIN instead of a swipe
        #[arg(long)]
        pin: Option<String>,

        /// IANA timezone override (e.g. Europe/Lisbon)
        #[arg(long)]
        timezone: Option<String>,

        /// Device serial override for multi-device hosts
        #[arg(long)]
        serial: Option<String>,

        /// Record actions in memory instead of driving a device
        #[arg(long)]
        dry_run: bool,
    },

    /// Preview the schedule that would be drawn for today
    Schedule {
        /// School profile override
        #[arg(long, value_enum)]
        profile: Option<SchoolProfile>,

        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show cumulative label counts
    Counts,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            profile,
            pin,
            timezone,
            serial,
            dry_run,
        } => {
            cmd_run(profile, pin, timezone, serial, dry_run);
        }
        Commands::Schedule { profile, seed } => {
            cmd_schedule(profile, seed);
        }
        Commands::Counts => {
            cmd_counts();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_run(
    profile: Option<SchoolProfile>,
    pin: Option<String>,
    timezone: Option<String>,
    serial: Option<String>,
    dry_run: bool,
) {
    println!("Cadence Agent v{VERSION}");
    println!();

    let mut config = Config::load().unwrap_or_default();
    if let Some(profile) = profile {
        config.profile = profile;
    }
    if let Some(pin) = pin {
        config.unlock = UnlockMethod::Pin(pin);
    }
    if let Some(timezone) = timezone {
        config.timezone = Some(timezone);
    }
    if let Some(serial) = serial {
        config.device_serial = Some(serial);
    }

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let (device, frames): (Arc<dyn DeviceControl>, Arc<dyn FrameSource>) = if dry_run {
        let device = Arc::new(NoopDevice::default());
        (device, Arc::new(NoopFrameSource))
    } else {
        let transport = AdbTransport::new(config.adb_path.clone(), config.device_serial.clone());
        (
            Arc::new(AdbDevice::new(transport.clone())),
            Arc::new(AdbFrameSource::new(transport)),
        )
    };

    let classifier: Arc<dyn Classifier> = match &config.classifier_command {
        Some(command) => match CommandClassifier::from_command_line(command) {
            Some(classifier) => Arc::new(classifier),
            None => {
                eprintln!("Error: classifier_command is empty");
                std::process::exit(1);
            }
        },
        None => Arc::new(NoopClassifier),
    };

    let agent = match Agent::new(&config, device, frames, classifier) {
        Ok(agent) => Arc::new(agent),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("  Profile: {}", config.profile);
    println!(
        "  Timezone: {}",
        config.timezone.as_deref().unwrap_or("host-local")
    );
    println!(
        "  Classifier: {}",
        if config.classifier_command.is_some() {
            "external command"
        } else {
            "none (scroll only)"
        }
    );
    if dry_run {
        println!("  Mode: dry run (no device)");
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if let Err(e) = agent.start() {
        eprintln!("Error starting agent: {e}");
        std::process::exit(1);
    }

    // Block until Ctrl+C, then stop cooperatively.
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        agent.stop();
        std::process::exit(1);
    }
    let _ = rx.recv();

    println!();
    println!("Stopping...");
    agent.stop();

    let snapshot = agent.counts().snapshot();
    let total: u64 = snapshot.values().sum();
    println!("Cumulative label activations: {total}");
}

fn cmd_schedule(profile: Option<SchoolProfile>, seed: Option<u64>) {
    let config = Config::load().unwrap_or_default();
    let profile = profile.unwrap_or(config.profile);
    let timezone = match config.effective_timezone() {
        Ok(tz) => tz,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let now = now_in(timezone);
    let schedule = match seed {
        Some(seed) => {
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            DaySchedule::generate(profile, now.date(), &mut rng)
        }
        None => DaySchedule::generate(profile, now.date(), &mut rand::thread_rng()),
    };

    println!("Schedule for {} ({profile})", schedule.date);
    println!("==============================");
    for window in schedule.windows() {
        let (min_minutes, max_minutes) = window.kind.session_minutes();
        println!(
            "  {:>9}  {}  (session {}-{} min)",
            window.kind.label(),
            window.target.format("%Y-%m-%d %H:%M"),
            min_minutes,
            max_minutes
        );
    }
}

fn cmd_counts() {
    let config = Config::load().unwrap_or_default();
    let counts_path = config.counts_path();

    if !counts_path.exists() {
        println!("No label counts recorded yet at {counts_path:?}");
        println!("Run 'cadence-agent run' to begin.");
        return;
    }

    let content = match std::fs::read_to_string(&counts_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {counts_path:?}: {e}");
            std::process::exit(1);
        }
    };

    match serde_json::from_str::<cadence_agent::counts::LabelCounts>(&content) {
        Ok(counts) => {
            let total: u64 = counts.values().sum();
            println!("Label activations ({total} total)");
            println!("==========================");
            for (label, count) in counts.iter().filter(|(_, c)| **c > 0) {
                println!("  {label}: {count}");
            }
        }
        Err(e) => {
            eprintln!("Error parsing {counts_path:?}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
