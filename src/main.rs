//! sayd main entry point
//!
//! Acts as the host side of the speech plugin: reads lifecycle commands
//! from stdin (one JSON object per line) and forwards them to the plugin.
//! With `--demo` it plays a short preemption scenario instead.

use anyhow::{Context, Result};
use log::{error, info, warn};
use sayd::config::Config;
use sayd::plugin::{serve, SpeechPlugin, TtsPlugin};
use std::io;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

/// Command line options
struct Args {
    debug: bool,
    demo: bool,
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args {
            debug: false,
            demo: false,
            config: None,
        };

        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" | "-d" => args.debug = true,
                "--demo" => args.demo = true,
                "--config" | "-c" => {
                    let path = iter.next().context("--config requires a path")?;
                    args.config = Some(PathBuf::from(path));
                }
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }

        Ok(args)
    }
}

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: sayd [--debug] [--demo] [--config PATH]");
            process::exit(2);
        }
    };

    init_logging(args.debug);

    if let Err(e) = run(&args) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        // Debug mode: write to sayd.log
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("sayd.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open sayd.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "sayd version {} starting (debug mode, logging to sayd.log)",
            sayd::VERSION
        );
    } else {
        // Normal mode: errors only, unless RUST_LOG says otherwise
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Using default configuration: {}", e);
            Config::default()
        }),
    };

    let mut plugin = SpeechPlugin::new(config);

    if args.demo {
        run_demo(&mut plugin);
        return Ok(());
    }

    let stdin = io::stdin();
    let dispatched = serve(stdin.lock(), &mut plugin).context("Failed to read host commands")?;
    info!("Host closed input after {} commands", dispatched);

    if plugin.is_started() {
        plugin.stop();
    }
    Ok(())
}

/// Speak, preempt mid-utterance, then speak a long text and stop
fn run_demo(plugin: &mut SpeechPlugin) {
    plugin.start();

    println!("Speaking first utterance");
    plugin.say_text("Hello world!");
    thread::sleep(Duration::from_millis(500));

    println!("Preempting with second utterance");
    plugin.say_text("Hi it's me again!");
    thread::sleep(Duration::from_millis(900));

    println!("Speaking a longer passage");
    plugin.say_text(
        "This is a longer passage, long enough that it is still playing when \
         the demo stops the plugin. Stopping cancels the audio player, drops \
         any pending requests, and waits a bounded time for speech workers \
         to wind down.",
    );
    thread::sleep(Duration::from_millis(1500));

    plugin.stop();
    println!("Stopped");
}
