use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use sercount::cli::{Cli, Command};
use sercount::codec::{self, Format};
use sercount::config::Config;
use sercount::publisher::{self, ChannelPublisher, LogPublisher, Progress, Publisher};
use sercount::record::{self, RecordSet};
use sercount::{EnclosureSeed, ProgressCounter};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

/// Publisher for interactive runs: logs through tracing, redraws a status line
/// and forwards every event to `channel` when one is given
fn progress_publisher(label: &'static str, every: u64, channel: Option<ChannelPublisher>) -> Arc<dyn Publisher> {
    let log = LogPublisher::new(label, every);
    Arc::new(publisher::from_fn(move |count, max| {
        log.publish(count, max);
        if let Some(channel) = &channel {
            channel.publish(count, max);
        }
        if log.should_log(count, max) {
            let progress = Progress::new(count, max);
            eprint!("\r{} {} ({}%)", label.cyan(), progress, progress.percent());
            if progress.is_complete() {
                eprintln!();
            }
        }
    }))
}

/// Print what a `--channel` subscriber received during the run
fn report_channel(rx: Option<tokio::sync::broadcast::Receiver<Progress>>) {
    if let Some(mut rx) = rx {
        let stats = publisher::drain_pending(&mut rx);
        let last = stats.last.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} events delivered, {} dropped (last {})",
            "channel:".dimmed(),
            stats.delivered,
            stats.dropped,
            last
        );
    }
}

fn resolve_format(config: &Config, path: &Path, explicit: Option<Format>) -> Format {
    explicit.unwrap_or_else(|| config.format_for(path))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("sercount starting");

    let channel = cli.channel.then(|| ChannelPublisher::new(config.channel_capacity));
    let rx = channel.as_ref().map(ChannelPublisher::subscribe);

    match cli.command {
        Command::Write {
            items,
            output,
            format,
            prefix,
        } => {
            let format = resolve_format(&config, &output, format);
            let enclosure = record::enclose(items, &prefix)
                .with_counter(ProgressCounter::shared())
                .with_publisher(progress_publisher("write", config.log_every, channel.clone()));
            codec::write_file(&output, format, &enclosure, config.pretty)
                .context(format!("Failed to write {}", output.display()))?;
            println!(
                "{} Wrote {} records to {} ({})",
                "✓".green(),
                enclosure.counter().count(),
                output.display().to_string().cyan(),
                format
            );
            report_channel(rx);
        }
        Command::Read { input, format } => {
            let format = resolve_format(&config, &input, format);
            let seed: EnclosureSeed<RecordSet> = EnclosureSeed::new()
                .isolated()
                .with_publisher(progress_publisher("read", config.log_every, channel.clone()));
            let enclosure =
                codec::read_file(&input, format, seed).context(format!("Failed to read {}", input.display()))?;

            let declared = enclosure.declared_total();
            let counted = enclosure.counter().count();
            if counted == declared {
                println!("{} Read {} records from {}", "✓".green(), counted, input.display());
            } else {
                println!(
                    "{} Read {} records from {} (declared {})",
                    "!".yellow(),
                    counted,
                    input.display(),
                    declared
                );
            }
            report_channel(rx);
        }
        Command::Inspect { input, format } => {
            let format = resolve_format(&config, &input, format);
            let total = codec::peek_file(&input, format).context(format!("Failed to inspect {}", input.display()))?;
            println!("{}: {} declared items ({})", input.display().to_string().cyan(), total, format);
        }
    }

    Ok(())
}
