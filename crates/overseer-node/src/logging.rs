use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn display_boot_banner(name: &str, version: &str) {
    println!();
    println!("  ╔══════════════════════════════════════════╗");
    println!("  ║  OVERSEER  contract supervision engine  ║");
    println!("  ╚══════════════════════════════════════════╝");
    println!("     node {name}  ·  version {version}");
    println!();
}

/// Level from `-v` flags, falling back to the configured level.
pub fn effective_level(config: &LoggingConfig, cli_verbose: u8) -> &str {
    match cli_verbose {
        0 => &config.level,
        1 => "debug",
        _ => "trace",
    }
}

fn build_filter(config: &LoggingConfig, level: &str) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("overseer={level},{}", crate_directives(level))),
    );
    for (module, module_level) in &config.module_filters {
        filter = filter.add_directive(format!("{module}={module_level}").parse()?);
    }
    Ok(filter)
}

/// Crate names use underscores in targets.
fn crate_directives(level: &str) -> String {
    [
        "overseer_types",
        "overseer_lifecycle",
        "overseer_contract",
        "overseer_consensus",
        "overseer_observability",
        "overseer_assignment",
        "overseer_supervisor",
        "overseer_node",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

/// Initialize the global subscriber from configuration.
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let level = effective_level(config, cli_verbose);
    let filter = build_filter(config, level)?;
    let subscriber = tracing_subscriber::registry().with(filter);

    let file = match &config.file_output {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };

    match config.format.as_str() {
        "json" => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_line_number(true)
                .with_file(true);
            match file {
                Some(file) => subscriber
                    .with(layer)
                    .with(fmt::layer().json().with_writer(file).with_ansi(false))
                    .try_init()?,
                None => subscriber.with(layer).try_init()?,
            }
        }
        "compact" => {
            let layer = fmt::layer().compact().with_target(false);
            match file {
                Some(file) => subscriber
                    .with(layer)
                    .with(fmt::layer().compact().with_writer(file).with_ansi(false))
                    .try_init()?,
                None => subscriber.with(layer).try_init()?,
            }
        }
        _ => {
            let show_location = matches!(level, "debug" | "trace");
            let layer = fmt::layer()
                .with_target(show_location)
                .with_line_number(show_location)
                .with_file(show_location);
            match file {
                Some(file) => subscriber
                    .with(layer)
                    .with(fmt::layer().with_writer(file).with_ansi(false))
                    .try_init()?,
                None => subscriber.with(layer).try_init()?,
            }
        }
    }

    Ok(())
}
