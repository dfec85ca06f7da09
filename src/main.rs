//! incident-mailer - send a monitoring event as an email.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{error, info};

use incident_mailer::cli::{Cli, LogFormat};
use incident_mailer::error::HandlerError;
use incident_mailer::event::Event;
use incident_mailer::handler::{dispatch, dispatch_with};
use incident_mailer::smtp::{MailTransport, StdoutTransport};

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs always go to stderr; stdout is reserved for `--dry-run` output.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    if let Err(e) = run(&cli) {
        error!(error = %e, "Handler failed");
        eprintln!("error executing handler: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let options = cli.resolve_options().map_err(HandlerError::from)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| anyhow!("failed to read event from stdin: {}", e))?;
    let event = Event::from_json(&input).map_err(HandlerError::from)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if cli.dry_run {
        info!("Dry run, message is printed instead of sent");
        runtime.block_on(dispatch_with(options, &event, |_| {
            Arc::new(StdoutTransport) as Arc<dyn MailTransport>
        }))?;
    } else {
        runtime.block_on(dispatch(options, &event))?;
    }
    Ok(())
}
