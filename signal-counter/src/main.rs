//! signal-counter - count GPIO signals and deliver them to a remote collector
//!
//! Subcommands:
//! - `run`: watch the input pin and deliver queued signals until interrupted
//! - `flush`: run a single delivery cycle and exit
//! - `status`: show configuration and what is waiting in the queue
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/signal-counter/config.toml (~/.config/signal-counter/config.toml)
//! - Logs: $XDG_STATE_HOME/signal-counter/ (~/.local/state/signal-counter/)

mod process_lock;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use process_lock::acquire_queue_lock;
use signal_counter_core::config::CaptureConfig;
use signal_counter_core::delivery::{identity, HttpTransport};
use signal_counter_core::hardware::{
    ActivityIndicator, GpioBackend, LedIndicator, NoopIndicator, PinMode, Pull, SysfsGpio,
};
use signal_counter_core::queue::{slots_share_device, QueuePaths};
use signal_counter_core::{
    CapturePipeline, Config, DeliveryOutcome, DeliveryWorker, Driver, DurableQueue,
    EdgeQualifier,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "signal-counter")]
#[command(about = "Count GPIO signals and deliver them to a remote collector")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/signal-counter/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also print log output to stdout
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the input pin and deliver signals until interrupted
    Run {
        /// Collector URL (overrides delivery.endpoint_url)
        endpoint: Option<String>,

        /// Minimum pulse length in milliseconds (overrides capture.trigger_interval_ms)
        #[arg(short, long)]
        trigger_interval_ms: Option<u64>,
    },

    /// Run one delivery cycle and exit
    Flush {
        /// Collector URL (overrides delivery.endpoint_url)
        endpoint: Option<String>,
    },

    /// Show configuration and queue state
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    match args.command {
        Command::Run {
            endpoint,
            trigger_interval_ms,
        } => {
            apply_overrides(&mut config, endpoint, trigger_interval_ms);
            cmd_run(&config, args.verbose)
        }
        Command::Flush { endpoint } => {
            apply_overrides(&mut config, endpoint, None);
            cmd_flush(&config, args.verbose)
        }
        Command::Status => cmd_status(&config),
    }
}

fn apply_overrides(
    config: &mut Config,
    endpoint: Option<String>,
    trigger_interval_ms: Option<u64>,
) {
    if let Some(endpoint) = endpoint {
        config.delivery.endpoint_url = Some(endpoint);
    }
    if let Some(ms) = trigger_interval_ms {
        config.capture.trigger_interval_ms = ms;
    }
}

fn cmd_run(config: &Config, verbose: bool) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let _log_guard = signal_counter_core::logging::init(&config.logging, verbose)
        .context("failed to initialize logging")?;

    tracing::info!("signal-counter starting");

    let paths = QueuePaths::from_config(&config.queue);
    let _queue_lock =
        acquire_queue_lock(&paths.active).context("failed to acquire process lock")?;
    warn_if_slots_split(&paths);

    let sysfs = SysfsGpio::new(
        &config.capture.gpio_root,
        Duration::from_millis(config.capture.poll_interval_ms),
    );
    sysfs.probe().context("hardware initialization failed")?;
    let gpio: Arc<dyn GpioBackend> = Arc::new(sysfs);

    init_pins(gpio.as_ref(), &config.capture).context("hardware initialization failed")?;
    let indicator = activity_indicator(&gpio, &config.capture);

    let queue = Arc::new(DurableQueue::new(paths, config.capture.timestamp_unit));
    let capture = Arc::new(CapturePipeline::new(
        EdgeQualifier::new(Duration::from_millis(config.capture.trigger_interval_ms)),
        Arc::clone(&queue),
        indicator,
    ));
    let _subscription = gpio
        .subscribe(config.capture.input_pin, capture.into_callback())
        .context("hardware initialization failed")?;

    let driver = build_driver(config, queue)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    println!(
        "signal-counter started: pin {}, trigger {}ms, delivering to {}",
        config.capture.input_pin,
        config.capture.trigger_interval_ms,
        driver.worker().endpoint()
    );
    tracing::info!(
        input_pin = config.capture.input_pin,
        trigger_interval_ms = config.capture.trigger_interval_ms,
        endpoint = %driver.worker().endpoint(),
        "signal-counter started"
    );

    driver.run_until(&running);

    println!("signal-counter stopped.");
    Ok(())
}

/// Configure the input (pulled down) and, if used, the activity LED.
fn init_pins(gpio: &dyn GpioBackend, capture: &CaptureConfig) -> signal_counter_core::Result<()> {
    if capture.activity_led {
        gpio.set_pin_mode(capture.led_pin, PinMode::Output)?;
    }
    gpio.set_pin_mode(capture.input_pin, PinMode::Input)?;
    // Keep the line from floating when nothing drives it.
    gpio.set_pull(capture.input_pin, Pull::Down)?;
    Ok(())
}

fn activity_indicator(
    gpio: &Arc<dyn GpioBackend>,
    capture: &CaptureConfig,
) -> Arc<dyn ActivityIndicator> {
    if !capture.activity_led {
        return Arc::new(NoopIndicator);
    }

    let led = LedIndicator::new(Arc::clone(gpio), capture.led_pin);
    if let Err(e) = led.announce_ready() {
        tracing::warn!(pin = capture.led_pin, error = %e, "Ready blink failed");
    }
    Arc::new(led)
}

fn build_driver(config: &Config, queue: Arc<DurableQueue>) -> Result<Driver> {
    let endpoint = config.endpoint_url()?.to_string();
    let transport = HttpTransport::new(Duration::from_secs(config.delivery.timeout_secs))
        .context("failed to create HTTP transport")?;
    let worker = DeliveryWorker::new(
        queue,
        Box::new(transport),
        identity::from_config(&config.delivery),
        endpoint,
    );
    Ok(Driver::new(
        Arc::new(worker),
        Duration::from_millis(config.delivery.period_ms),
    ))
}

fn warn_if_slots_split(paths: &QueuePaths) {
    if slots_share_device(paths) == Some(false) {
        tracing::warn!(
            active = %paths.active.display(),
            pending = %paths.pending.display(),
            "Active and pending slots are on different filesystems; rotation will fail"
        );
        eprintln!(
            "Warning: {} and {} are on different filesystems; rotation will fail",
            paths.active.display(),
            paths.pending.display()
        );
    }
}

fn cmd_flush(config: &Config, verbose: bool) -> Result<()> {
    config.validate().context("invalid configuration")?;

    // Initialize logging if verbose
    let _log_guard = if verbose {
        Some(
            signal_counter_core::logging::init(&config.logging, true)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    let paths = QueuePaths::from_config(&config.queue);
    let _queue_lock =
        acquire_queue_lock(&paths.active).context("failed to acquire process lock")?;
    warn_if_slots_split(&paths);

    let queue = Arc::new(DurableQueue::new(paths, config.capture.timestamp_unit));
    let driver = build_driver(config, queue)?;

    match driver.tick() {
        DeliveryOutcome::Idle => println!("Nothing to deliver"),
        DeliveryOutcome::Busy => println!("Delivery already in progress"),
        DeliveryOutcome::Delivered { events, status } => {
            println!("Delivered {} event(s) (HTTP {})", events, status)
        }
        DeliveryOutcome::DeliveredNotCleared { events, status } => println!(
            "Delivered {} event(s) (HTTP {}), but the pending slot could not be removed",
            events, status
        ),
        DeliveryOutcome::Retry { reason } => {
            println!("Delivery failed, batch kept for retry: {}", reason)
        }
        DeliveryOutcome::Failed { reason } => println!("Delivery cycle failed: {}", reason),
    }

    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Signal Counter Configuration");
    println!("============================");
    println!();

    println!(
        "Endpoint:        {}",
        config.delivery.endpoint_url.as_deref().unwrap_or("<not set>")
    );
    println!("Input Pin:       {}", config.capture.input_pin);
    if config.capture.activity_led {
        println!("LED Pin:         {}", config.capture.led_pin);
    } else {
        println!("LED Pin:         <disabled>");
    }
    println!("Trigger:         {}ms", config.capture.trigger_interval_ms);
    println!("Timestamp Unit:  {:?}", config.capture.timestamp_unit);
    println!("Period:          {}ms", config.delivery.period_ms);
    println!("Timeout:         {}s", config.delivery.timeout_secs);
    match &config.delivery.device_id {
        Some(id) => println!("Device ID:       {}", id),
        None => println!(
            "Device ID:       from {}",
            config.delivery.identity_path.display()
        ),
    }

    println!(
        "Log file:        {}",
        signal_counter_core::logging::log_file_path().display()
    );

    println!();
    let paths = QueuePaths::from_config(&config.queue);
    print_slot("Active slot:", &paths.active)?;
    print_slot("Pending slot:", &paths.pending)?;

    if slots_share_device(&paths) == Some(false) {
        println!();
        println!("Warning: slots are on different filesystems; rotation will fail");
    }

    println!();
    match config.validate() {
        Ok(()) => println!("Status: Ready"),
        Err(e) => println!("Status: Not ready ({})", e),
    }

    Ok(())
}

fn print_slot(label: &str, path: &Path) -> Result<()> {
    if path.exists() {
        let events = DurableQueue::count_events(path)?;
        println!("{:<17}{} ({} event(s))", label, path.display(), events);
    } else {
        println!("{:<17}{} (empty)", label, path.display());
    }
    Ok(())
}
