#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use color_eyre::eyre::{eyre, Result};
use structopt::StructOpt;
use tokio::{runtime::Builder, signal, sync::mpsc};

use lightmatch::{
    bulb,
    grabber::ScreenGrabber,
    image::Sampler,
    models::{CaptureTarget, Config},
    worker::{MatchEvent, MatchParts, MatchRunner, MatchSettings},
};

/// Capacity of the channel between the match loop and its observer
const EVENT_QUEUE_LEN: usize = 64;

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    #[structopt(long)]
    dump_config: bool,
    /// Run without the chart window
    #[structopt(long)]
    headless: bool,
    /// Match a single color and exit
    #[structopt(long)]
    once: bool,
    /// Bulb address, overrides the configuration
    #[structopt(long)]
    bulb: Option<String>,
    /// Capture target (all, display:N or left,top,right,bottom), overrides the configuration
    #[structopt(long)]
    target: Option<CaptureTarget>,
}

async fn load_config(opts: &Opts) -> Result<Config> {
    let mut config = Config::load(opts.config_path.as_deref()).await?;

    if let Some(address) = &opts.bulb {
        config.bulb.address = address.clone();
    }

    if let Some(target) = opts.target {
        config.capture.target = target;
    }

    if opts.once {
        config.matching.continuous = false;
    }

    Ok(config)
}

async fn create_runner(config: &Config, events: mpsc::Sender<MatchEvent>) -> Result<MatchRunner> {
    let parts = MatchParts {
        grabber: Box::new(ScreenGrabber::new(config.capture.target)?),
        sampler: Sampler::from(&config.capture),
        bulb: bulb::from_config(&config.bulb).await?,
    };

    Ok(MatchRunner::new(
        tokio::runtime::Handle::current(),
        parts,
        MatchSettings::from(&config.matching),
        events,
    )
    .await)
}

async fn run_headless(
    mut runner: MatchRunner,
    mut events: mpsc::Receiver<MatchEvent>,
    config: &Config,
) -> Result<()> {
    runner.start(config.matching.initial_color)?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("interrupted, stopping");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(MatchEvent::Started) => info!("color match started"),
                    Some(MatchEvent::Sample(color)) => debug!(color = ?color, "sample"),
                    Some(MatchEvent::DeviceError(error)) => warn!(error = %error, "device error"),
                    Some(MatchEvent::Stopped) | None => break,
                    Some(MatchEvent::Failed(error)) => {
                        error!(error = %error, "color match failed");
                        break;
                    }
                }
            }
        }
    }

    Ok(runner.stop_and_wait().await?)
}

#[cfg(feature = "gui")]
fn run_gui(runner: MatchRunner, events: mpsc::Receiver<MatchEvent>, config: &Config) -> Result<()> {
    // The window runs on the main thread, the match loop on the runtime workers
    lightmatch::gui::run(
        runner,
        events,
        &config.chart,
        config.matching.initial_color,
    )
    .map_err(|error| eyre!("chart window failed: {}", error))
}

#[cfg(not(feature = "gui"))]
fn run_gui(
    _runner: MatchRunner,
    _events: mpsc::Receiver<MatchEvent>,
    _config: &Config,
) -> Result<()> {
    Err(eyre!(
        "this build has no chart window, run with --headless or enable the `gui` feature"
    ))
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("LIGHTMATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "lightmatch=warn",
            1 => "lightmatch=info",
            2 => "lightmatch=debug",
            _ => "lightmatch=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime
    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;

    let config = rt.block_on(load_config(&opts))?;

    // Dump configuration if this was asked
    if opts.dump_config {
        print!("{}", config.to_string()?);
        return Ok(());
    }

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_LEN);
    let runner = rt.block_on(create_runner(&config, tx))?;

    if opts.headless || opts.once {
        rt.block_on(run_headless(runner, rx, &config))
    } else {
        run_gui(runner, rx, &config)
    }
}
