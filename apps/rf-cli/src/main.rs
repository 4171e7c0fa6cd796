mod console;
mod error;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rf_profile::{ProfileStore, ProfileTemperature, SolderProfile, setpoint_at};
use rf_results::{RunManifest, RunStore, write_csv};
use rf_runner::{
    ButtonQueue, CaseFan, CaseFanMonitor, CaseFanRegister, LogAnnunciator, ManualController,
    ManualOptions, OvenConfig, Peripherals, ProfileRunner, RunnerError, RunnerOptions,
    ThermocoupleMonitor, ThreadTimer,
};
use rf_sensors::TemperatureAggregator;
use rf_sim::{FaultSwitch, OvenParams, OvenPlant, PlantDriver, SimOven, SimThermocouple, parse_fault};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleReporter, spawn_keyboard};
use crate::error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "rf-cli")]
#[command(about = "Reflow oven controller - profile library and simulated runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the profile library
    #[command(subcommand)]
    Profiles(ProfileCommands),
    /// Execute a profile on the simulated oven
    Run(RunArgs),
    /// Watch the thermocouples; type 1-4 to toggle a channel, enter to quit
    Monitor(MonitorArgs),
    /// Drive the simulated oven by hand: 2 heats, 3/4 step, 1 toggles the fan, enter quits
    Manual(ManualArgs),
    /// Saved run logs
    #[command(subcommand)]
    Runs(RunsCommands),
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List the library slots
    List {
        #[arg(long)]
        library: Option<PathBuf>,
    },
    /// Show one profile and its target curve
    Show {
        /// Slot number or profile description
        profile: String,
        #[arg(long)]
        library: Option<PathBuf>,
        /// Ambient used to resolve ambient points
        #[arg(long, default_value_t = 25.0)]
        ambient: f64,
    },
    /// Check a single-profile YAML file
    Validate { path: PathBuf },
    /// Copy a profile into another slot
    Copy {
        from: String,
        to: usize,
        #[arg(long)]
        library: PathBuf,
    },
    /// Store a single-profile YAML file in a slot
    Import {
        path: PathBuf,
        slot: usize,
        #[arg(long)]
        library: PathBuf,
    },
}

#[derive(Args)]
struct SimArgs {
    /// Oven configuration YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Oven seconds per wall-clock second
    #[arg(long, default_value_t = 20.0)]
    speedup: f64,
    /// Room temperature of the simulated oven
    #[arg(long, default_value_t = 25.0)]
    ambient: f64,
    /// Chamber temperature at start, if warmer than the room
    #[arg(long)]
    start_temp: Option<f64>,
    /// Inject a thermocouple fault, e.g. `2=open` (repeatable)
    #[arg(long = "fault")]
    faults: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    /// Slot number or profile description
    profile: String,
    #[arg(long)]
    library: Option<PathBuf>,
    #[command(flatten)]
    sim: SimArgs,
    /// Save the run log under this directory
    #[arg(long)]
    save: Option<PathBuf>,
    /// Write the run log as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Return as soon as the run ends instead of waiting for enter
    #[arg(long)]
    no_ack: bool,
}

#[derive(Args)]
struct MonitorArgs {
    #[command(flatten)]
    sim: SimArgs,
    /// Stop after this many refreshes
    #[arg(long)]
    cycles: Option<u32>,
}

#[derive(Args)]
struct ManualArgs {
    #[command(flatten)]
    sim: SimArgs,
}

#[derive(Subcommand)]
enum RunsCommands {
    /// List saved runs, newest first
    List { dir: PathBuf },
    /// Export a saved run as CSV
    Export {
        dir: PathBuf,
        run_id: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Profiles(cmd) => match cmd {
            ProfileCommands::List { library } => cmd_profiles_list(library.as_deref()),
            ProfileCommands::Show {
                profile,
                library,
                ambient,
            } => cmd_profiles_show(library.as_deref(), &profile, ambient),
            ProfileCommands::Validate { path } => cmd_profiles_validate(&path),
            ProfileCommands::Copy { from, to, library } => cmd_profiles_copy(&library, &from, to),
            ProfileCommands::Import {
                path,
                slot,
                library,
            } => cmd_profiles_import(&library, &path, slot),
        },
        Commands::Run(args) => cmd_run(args),
        Commands::Monitor(args) => cmd_monitor(args),
        Commands::Manual(args) => cmd_manual(args),
        Commands::Runs(cmd) => match cmd {
            RunsCommands::List { dir } => cmd_runs_list(&dir),
            RunsCommands::Export {
                dir,
                run_id,
                output,
            } => cmd_runs_export(&dir, &run_id, output.as_deref()),
        },
    }
}

fn open_store(library: Option<&Path>) -> CliResult<ProfileStore> {
    match library {
        Some(path) if path.exists() => Ok(ProfileStore::load_yaml(path)?),
        _ => Ok(ProfileStore::with_builtins()),
    }
}

fn resolve_slot(store: &ProfileStore, key: &str) -> CliResult<usize> {
    if let Ok(slot) = key.parse::<usize>() {
        return Ok(slot);
    }
    store
        .find(key)
        .ok_or_else(|| CliError::Usage(format!("no profile named '{key}'")))
}

fn cmd_profiles_list(library: Option<&Path>) -> CliResult<()> {
    let store = open_store(library)?;
    for slot in 0..store.len() {
        match store.get(slot) {
            Ok(p) => println!(
                "  {slot}: {:<40} {:>4}s  peak {:>5.1}  {}",
                p.description,
                p.duration_s(),
                p.peak_c().unwrap_or(f64::NAN),
                if p.editable { "" } else { "(locked)" }
            ),
            Err(_) => println!("  {slot}: <empty>"),
        }
    }
    Ok(())
}

fn cmd_profiles_show(library: Option<&Path>, key: &str, ambient: f64) -> CliResult<()> {
    let store = open_store(library)?;
    let profile = store.get(resolve_slot(&store, key)?)?;
    print_profile(&profile, ambient);
    Ok(())
}

fn print_profile(profile: &SolderProfile, ambient: f64) {
    println!("{}", profile.description);
    println!(
        "  lead free: {}  editable: {}",
        profile.lead_free, profile.editable
    );
    for p in &profile.points {
        let temp = match p.temperature {
            ProfileTemperature::Ambient => "ambient".to_string(),
            ProfileTemperature::Celsius(c) => format!("{c:.1}"),
        };
        println!(
            "  {:>4}s {:>8}  fan {:<6} {}",
            p.time_s,
            temp,
            format!("{:?}", p.fan),
            if p.stop { "stop" } else { "" }
        );
    }
    println!("  target (ambient {ambient:.1}):");
    let mut t = 0;
    while let Some(sp) = setpoint_at(profile, ambient, t) {
        println!("    {t:>4}s {sp:>6.1}");
        t += 30;
    }
}

fn cmd_profiles_validate(path: &Path) -> CliResult<()> {
    println!("Validating profile: {}", path.display());
    let profile = rf_profile::load_profile(path)?;
    println!("✓ {} is valid ({} points)", profile.description, profile.points.len());
    Ok(())
}

fn cmd_profiles_copy(library: &Path, from: &str, to: usize) -> CliResult<()> {
    let mut store = open_store(Some(library))?;
    let src = resolve_slot(&store, from)?;
    store.copy(src, to)?;
    store.save_yaml(library)?;
    println!("✓ Copied slot {src} to slot {to}");
    Ok(())
}

fn cmd_profiles_import(library: &Path, path: &Path, slot: usize) -> CliResult<()> {
    let mut store = open_store(Some(library))?;
    let profile = rf_profile::load_profile(path)?;
    let name = profile.description.clone();
    store.set(slot, profile)?;
    store.save_yaml(library)?;
    println!("✓ Stored '{name}' in slot {slot}");
    Ok(())
}

/// Simulated oven plus the peripherals that read it.
struct SimRig {
    oven: Arc<SimOven>,
    sensors: Arc<TemperatureAggregator>,
    _faults: [FaultSwitch; 4],
}

fn build_rig(args: &SimArgs, config: &OvenConfig) -> CliResult<SimRig> {
    let params = OvenParams {
        ambient: rf_core::degc(args.ambient),
        ..OvenParams::default()
    };
    let oven = Arc::new(SimOven::new(OvenPlant::new(params)?));
    if let Some(t) = args.start_temp {
        oven.set_temperature_c(t);
    }

    let (channels, faults) = SimThermocouple::bank(&oven, [0.0; 4]);
    for fault in &args.faults {
        let (index, status) = parse_fault(fault)?;
        faults[index].inject(status);
    }

    let sensors = Arc::new(TemperatureAggregator::new(channels));
    for (index, settings) in config.thermocouples.iter().enumerate() {
        sensors
            .set_channel_settings(index, *settings)
            .map_err(RunnerError::from)?;
    }
    Ok(SimRig {
        oven,
        sensors,
        _faults: faults,
    })
}

fn load_config(path: Option<&Path>) -> CliResult<OvenConfig> {
    let config = match path {
        Some(path) => OvenConfig::load_yaml(path)?,
        None => OvenConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn scaled(period: Duration, speedup: f64) -> Duration {
    period.div_f64(speedup).max(Duration::from_millis(1))
}

fn check_speedup(speedup: f64) -> CliResult<()> {
    if !(speedup >= 1.0 && speedup <= 1000.0) {
        return Err(CliError::Usage("speedup must be between 1 and 1000".into()));
    }
    Ok(())
}

/// Case fan on its own timer, refreshed once per oven second.
fn start_case_fan(
    rig: &SimRig,
    config: &OvenConfig,
    speedup: f64,
) -> CliResult<(CaseFanMonitor, Arc<CaseFanRegister>)> {
    let fan = Arc::new(CaseFanRegister::new());
    let monitor = CaseFanMonitor::start(
        Arc::clone(&rig.sensors),
        fan.clone(),
        Arc::new(ThreadTimer::new()?),
        config.case_fan,
        scaled(Duration::from_secs(1), speedup),
    )?;
    Ok((monitor, fan))
}

/// Runner options for a simulated run: periods scaled by the speed-up, and
/// the end-of-run wait kept unless `--no-ack` is given.
fn run_options(config: &OvenConfig, args: &RunArgs) -> CliResult<RunnerOptions> {
    let mut options = RunnerOptions::from_config(config)?;
    options.tick_period = scaled(options.tick_period, args.sim.speedup);
    options.supervisor_period = scaled(options.supervisor_period, args.sim.speedup);
    options.await_acknowledge = config.run.await_acknowledge && !args.no_ack;
    Ok(options)
}

fn cmd_run(args: RunArgs) -> CliResult<()> {
    check_speedup(args.sim.speedup)?;
    let store = open_store(args.library.as_deref())?;
    let profile = store.get(resolve_slot(&store, &args.profile)?)?;
    let config = load_config(args.sim.config.as_deref())?;
    let rig = build_rig(&args.sim, &config)?;

    let options = run_options(&config, &args)?;

    let buttons = Arc::new(ButtonQueue::new());
    spawn_keyboard(buttons.sender());
    let reporter = Arc::new(ConsoleReporter::new());
    let runner = ProfileRunner::new(
        Peripherals {
            sensors: Arc::clone(&rig.sensors),
            oven: rig.oven.clone(),
            timer: Arc::new(ThreadTimer::new()?),
            buttons,
            reporter,
            annunciator: Arc::new(LogAnnunciator),
        },
        options,
    )?;

    println!(
        "Running '{}' at {}x; enter aborts and acknowledges the end, 4 then enter switches views",
        profile.description, args.sim.speedup
    );
    let _driver = PlantDriver::spawn(Arc::clone(&rig.oven), args.sim.speedup)?;
    let (_case_fan_monitor, case_fan) = start_case_fan(&rig, &config, args.sim.speedup)?;
    let summary = runner.run(&profile)?;

    println!(
        "✓ {:?} after {} s (ambient {:.1}, {} ticks, worst {:?}, {} skipped)",
        summary.outcome,
        summary.elapsed_s,
        summary.ambient_c,
        summary.ticks,
        summary.worst_tick,
        summary.skipped_ticks
    );
    println!("  Case fan at {}%", case_fan.case_fan_duty());

    let points = runner.plot().points();
    if let Some(dir) = args.save {
        let store = RunStore::new(dir)?;
        let manifest = RunManifest::from_summary(&summary, &profile, &config);
        store.save_run(&manifest, &points)?;
        println!("  Saved run {}", manifest.run_id);
    }
    if let Some(path) = args.csv {
        let mut out = BufWriter::new(File::create(&path)?);
        write_csv(&mut out, &points)?;
        out.flush()?;
        println!("  Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_monitor(args: MonitorArgs) -> CliResult<()> {
    check_speedup(args.sim.speedup)?;
    let config = load_config(args.sim.config.as_deref())?;
    let rig = build_rig(&args.sim, &config)?;
    let _driver = PlantDriver::spawn(Arc::clone(&rig.oven), args.sim.speedup)?;
    let (_case_fan_monitor, _) = start_case_fan(&rig, &config, args.sim.speedup)?;

    let buttons = Arc::new(ButtonQueue::new());
    spawn_keyboard(buttons.sender());
    let monitor = ThermocoupleMonitor::new(
        rig.sensors,
        buttons,
        Arc::new(ConsoleReporter::new()),
        config.supervisor_period(),
    );
    let cycles = monitor.run(args.cycles);
    println!("\n✓ {cycles} refreshes");
    Ok(())
}

/// Manual options for the simulated oven, periods scaled by the speed-up.
fn manual_options(config: &OvenConfig, speedup: f64) -> CliResult<ManualOptions> {
    let mut options = ManualOptions::from_config(config)?;
    options.tick_period = scaled(options.tick_period, speedup);
    options.supervisor_period = scaled(options.supervisor_period, speedup);
    Ok(options)
}

fn cmd_manual(args: ManualArgs) -> CliResult<()> {
    check_speedup(args.sim.speedup)?;
    let config = load_config(args.sim.config.as_deref())?;
    let rig = build_rig(&args.sim, &config)?;
    let options = manual_options(&config, args.sim.speedup)?;

    let buttons = Arc::new(ButtonQueue::new());
    spawn_keyboard(buttons.sender());
    let controller = ManualController::new(
        Peripherals {
            sensors: Arc::clone(&rig.sensors),
            oven: rig.oven.clone(),
            timer: Arc::new(ThreadTimer::new()?),
            buttons,
            reporter: Arc::new(ConsoleReporter::new()),
            annunciator: Arc::new(LogAnnunciator),
        },
        options,
    )?;

    println!(
        "Manual control at {}x; heating stops after {} s",
        args.sim.speedup, config.manual.max_heater_time_s
    );
    let _driver = PlantDriver::spawn(Arc::clone(&rig.oven), args.sim.speedup)?;
    let (_case_fan_monitor, _) = start_case_fan(&rig, &config, args.sim.speedup)?;
    let summary = controller.run()?;
    println!(
        "\n✓ Manual mode ended after {} s{}",
        summary.elapsed_s,
        if summary.heater_timed_out { " (heater time limit reached)" } else { "" }
    );
    Ok(())
}

fn cmd_runs_list(dir: &Path) -> CliResult<()> {
    let store = RunStore::new(dir.to_path_buf())?;
    let runs = store.list_runs()?;
    if runs.is_empty() {
        println!("No saved runs in {}", dir.display());
        return Ok(());
    }
    for run in runs {
        println!(
            "  {}  {}  {:<40} {:?} at {} s",
            run.run_id, run.timestamp, run.profile_name, run.outcome, run.elapsed_s
        );
    }
    Ok(())
}

fn cmd_runs_export(dir: &Path, run_id: &str, output: Option<&Path>) -> CliResult<()> {
    let store = RunStore::new(dir.to_path_buf())?;
    let points = store.load_points(run_id)?;
    match output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write_csv(&mut out, &points)?;
            out.flush()?;
            println!("✓ Exported {} points to {}", points.len(), path.display());
        }
        None => write_csv(&mut io::stdout().lock(), &points)?,
    }
    Ok(())
}
