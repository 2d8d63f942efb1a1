//! Thermal model validation and load review driver.
//!
//! Runs the full pipeline from archived inputs: validates the model against
//! the trailing telemetry window, and when a planned command load is given,
//! forecasts temperatures over it and flags limit violations.
//!
//! Usage:
//! ```
//! cargo run --bin thermal_check -- --model-spec model.json \
//!     --cmd-file cmds.json --telem-file telem.json [--planned-file load.json]
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use thermoscope::config::{
    RunConfig, SeedOverrides, ValidationConfig, CH_T_PRIMARY, CH_T_SECONDARY, TIMELINE_ATTRS,
};
use thermoscope::heater::read_heater_history;
use thermoscope::model::ReferenceModel;
use thermoscope::provider::{
    CommandProvider, JsonCommandLog, JsonTelemetryArchive, TelemetryProvider,
};
use thermoscope::seed::{resolve_seed, SeedPolicy};
use thermoscope::sim::{run_prediction, InitialConditions};
use thermoscope::timeline::{Command, TimelineBuilder};
use thermoscope::violation::detect_all;
use thermoscope::{validate, RunReport, TimeInterval};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "thermal_check",
    about = "Validates a spacecraft thermal model against telemetry and forecasts limit compliance",
    long_about = None
)]
struct Args {
    /// Output directory
    #[arg(long, default_value = "out")]
    outdir: PathBuf,

    /// Thermal model specification file
    #[arg(long)]
    model_spec: PathBuf,

    /// Command history file (JSON)
    #[arg(long)]
    cmd_file: PathBuf,

    /// Telemetry archive file (JSON)
    #[arg(long)]
    telem_file: PathBuf,

    /// Planned command load file (JSON array); enables the forecast run
    #[arg(long)]
    planned_file: Option<PathBuf>,

    /// Heater command history file
    #[arg(long)]
    heater_file: Option<PathBuf>,

    /// Days of validation telemetry
    #[arg(long, default_value_t = 21.0)]
    days: f64,

    /// Reference run start time in seconds; defaults to the last telemetry
    /// sample
    #[arg(long)]
    run_start: Option<f64>,

    /// Verbosity (0=quiet, 1=normal, 2=debug)
    #[arg(long, default_value_t = 1)]
    verbose: u8,

    #[command(flatten)]
    overrides: OverrideArgs,
}

/// Seed-state overrides, all optional.
#[derive(clap::Args, Debug)]
struct OverrideArgs {
    /// Starting pitch (deg)
    #[arg(long)]
    pitch: Option<f64>,

    /// Starting SIM translation position (steps)
    #[arg(long)]
    sim_pos: Option<f64>,

    /// Initial number of CCDs
    #[arg(long)]
    ccd_count: Option<i64>,

    /// Initial number of FEPs
    #[arg(long)]
    fep_count: Option<i64>,

    /// Initial vid board state
    #[arg(long)]
    vid_board: Option<i64>,

    /// Initial clocking state
    #[arg(long)]
    clocking: Option<i64>,

    /// Starting detector housing heater state
    #[arg(long)]
    dh_heater: Option<bool>,

    /// Starting primary temperature (degC)
    #[arg(long)]
    t_primary: Option<f64>,

    /// Starting secondary temperature (degC)
    #[arg(long)]
    t_secondary: Option<f64>,
}

impl From<OverrideArgs> for SeedOverrides {
    fn from(a: OverrideArgs) -> Self {
        SeedOverrides {
            pitch: a.pitch,
            sim_pos: a.sim_pos,
            ccd_count: a.ccd_count,
            fep_count: a.fep_count,
            vid_board: a.vid_board,
            clocking: a.clocking,
            dh_heater: a.dh_heater,
            t_primary: a.t_primary,
            t_secondary: a.t_secondary,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let run_config = RunConfig {
        outdir: args.outdir.clone(),
        model_spec: args.model_spec.clone(),
        days: args.days,
        verbose: args.verbose,
        overrides: SeedOverrides::from(args.overrides),
    };
    let validation_config = ValidationConfig::default();

    info!("#####################################################");
    info!("# thermal_check run");
    info!("# model spec = {}", run_config.model_spec.display());
    info!("# validation window = {:.1} days", run_config.days);
    info!("#####################################################");

    let commands = JsonCommandLog::from_file(&args.cmd_file)
        .with_context(|| format!("loading command history {}", args.cmd_file.display()))?;
    let archive = JsonTelemetryArchive::from_file(&args.telem_file)
        .with_context(|| format!("loading telemetry archive {}", args.telem_file.display()))?;

    let heater = args
        .heater_file
        .as_deref()
        .map(|path| {
            read_heater_history(path)
                .with_context(|| format!("loading heater history {}", path.display()))
        })
        .transpose()?;
    let skipped_heater_rows = heater.as_ref().map_or(0, |h| h.skipped_rows);
    if skipped_heater_rows > 0 {
        warn!("skipped {skipped_heater_rows} malformed heater history row(s)");
    }

    let channel_names = [CH_T_PRIMARY, CH_T_SECONDARY, "pitch", "sim_pos"];
    // A probe fetch establishes the available telemetry end time when no
    // run start is given.
    let run_start = match args.run_start {
        Some(t) => t,
        None => archive
            .fetch(&[CH_T_PRIMARY], f64::MAX, f64::MAX)
            .map(|m| m[CH_T_PRIMARY].last().unwrap().time)
            .context("telemetry archive is empty")?,
    };
    let telemetry = archive.fetch(&channel_names, run_start, run_config.days)?;
    let primary = &telemetry[CH_T_PRIMARY];
    let window = TimeInterval::new(primary.first().unwrap().time, primary.last().unwrap().time);

    let mut report = RunReport {
        window: Some(window),
        skipped_heater_rows,
        ..RunReport::default()
    };

    // Validation: drive the model over the as-flown telemetry window and
    // compare against observations.
    info!(
        "validating over [{:.1}, {:.1}]",
        window.start, window.stop
    );
    let builder = TimelineBuilder::new(TIMELINE_ATTRS);
    let val_seed = commands.state_at(window.start)?;
    let val_timeline = builder.build(
        &val_seed,
        &commands.commands(val_seed.tstop, window.stop)?,
        &[],
        window.stop,
    )?;
    let val_init = InitialConditions {
        t_primary: primary.value_nearest(window.start).unwrap(),
        t_secondary: telemetry[CH_T_SECONDARY].value_nearest(window.start).unwrap(),
        heater_history: heater.as_ref().map(|h| h.series.clone()),
    };
    let val_model = ReferenceModel::from_file(&run_config.model_spec)?;
    let val_prediction = run_prediction(
        Box::new(val_model),
        &val_timeline,
        window.start,
        window.stop,
        &val_init,
    )?;
    let validation = validate(&val_prediction, &telemetry, &validation_config)?;
    for v in &validation.violations {
        warn!(
            "validation violation: {} quant{} residual {:.2} exceeds {:.2}",
            v.channel, v.level, v.residual, v.limit
        );
    }
    report.validation = Some(validation);

    // Forecast: project temperatures over the planned load and flag limit
    // violations.
    if let Some(planned_file) = &args.planned_file {
        let planned = load_planned(planned_file)?;
        let timeline_end = planned
            .last()
            .map(|c| c.time)
            .context("planned command load is empty")?;
        info!("forecasting over planned load ending at {timeline_end:.1}");

        let seed = resolve_seed(
            &run_config.overrides,
            run_start,
            &commands,
            primary,
            &SeedPolicy::default(),
        )?;
        let historical = commands.commands(seed.state.tstop, timeline_end)?;
        let timeline = builder
            .clone()
            .forecast()
            .build(&seed.state, &historical, &planned, timeline_end)?;
        let init = InitialConditions {
            t_primary: seed.t_primary,
            t_secondary: seed.t_secondary,
            heater_history: heater.as_ref().map(|h| h.series.clone()),
        };
        let model = ReferenceModel::from_file(&run_config.model_spec)?;
        let prediction = run_prediction(
            Box::new(model),
            &timeline,
            timeline.start(),
            timeline_end,
            &init,
        )?;
        report.violations = detect_all(&prediction, &validation_config);
        for v in &report.violations {
            warn!(
                "predicted violation: {} [{:.1}, {:.1}] peak {:.2} (limit {:.2})",
                v.channel, v.tstart, v.tstop, v.peak, v.limit
            );
        }
        report.timeline = Some(timeline);
        report.prediction = Some(prediction);
    }

    report.write_all(&run_config.outdir, &validation_config)?;
    info!("run complete, artifacts in {}", run_config.outdir.display());
    Ok(())
}

fn load_planned(path: &std::path::Path) -> anyhow::Result<Vec<Command>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading planned load {}", path.display()))?;
    let mut planned: Vec<Command> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing planned load {}", path.display()))?;
    planned.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    Ok(planned)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
