use anyhow::Context;
use clap::Parser;
use tracing::error;

use headline_cluster::{cli::Cli, config::Config, observability::Telemetry};

fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    let cli = Cli::parse();
    let telemetry = Telemetry::new(cli.log_format).context("failed to initialize telemetry")?;
    let config = Config::from_env().context("failed to load configuration")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    headline_cluster::cli::run(&cli, config, &telemetry, &mut out)
}
