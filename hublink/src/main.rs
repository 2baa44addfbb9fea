use std::error::Error;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, trace, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod cli;

use hublink_remote as remote;
use hublink_util as util;

use crate::cli::{Cli, Disposition, OutputFormat};
use crate::remote::{CloudMessage, DeviceClient, MessageError, TokenError};

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,hyper=error,reqwest=info")),
        )
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[derive(Debug, thiserror::Error)]
enum PollError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("failed to serialize message: {0}")]
    Output(#[from] serde_json::Error),

    #[error("failed to write message: {0}")]
    Io(#[from] io::Error),
}

impl PollError {
    /// True if polling again cannot succeed without operator action.
    ///
    /// An unsynchronized clock is expected to recover on its own.
    fn is_fatal(&self) -> bool {
        match self {
            Self::Message(MessageError::AuthFailed(TokenError::ClockInvalid)) => false,
            Self::Message(err) => err.is_configuration_error(),
            Self::Output(_) | Self::Io(_) => true,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    initialize_tracing();

    let cli = cli::parse();
    let request = cli.request_config();

    let mut client = DeviceClient::new(&request).endpoint(cli.api_endpoint.clone());
    client.parse_connection_descriptor(&cli.connection_string)?;

    start_poll(client, &cli, request.poll_interval, &mut io::stdout())?;

    Ok(())
}

/// When to poll again after a poll completes.
#[derive(Debug, PartialEq, Eq)]
enum NextPoll {
    Now,
    AfterInterval,
}

/// Decide how the loop continues after a poll, or stop it on a fatal error.
fn next_poll(result: Result<bool, PollError>) -> Result<NextPoll, PollError> {
    match result {
        // keep going while the queue drains
        Ok(true) => Ok(NextPoll::Now),
        Ok(false) => Ok(NextPoll::AfterInterval),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!("poll failed: {err}");
            Ok(NextPoll::AfterInterval)
        }
    }
}

#[instrument(name = "hublink", skip_all, err)]
fn start_poll(
    mut client: DeviceClient,
    cli: &Cli,
    poll_interval: Duration,
    out: &mut impl Write,
) -> Result<(), PollError> {
    let identity = client.credentials().identity();
    info!(
        host = identity.host_name(),
        device = identity.device_id(),
        disposition = ?cli.disposition,
        "polling for messages"
    );

    loop {
        let result = poll_once(&mut client, cli.disposition, cli.format, out);
        if cli.once {
            return result.map(|_| ());
        }

        if next_poll(result)? == NextPoll::AfterInterval {
            trace!(?poll_interval, "waiting for next poll");
            thread::sleep(poll_interval);
        }
    }
}

/// Fetch a message, write it to `out` and apply `disposition` to it.
///
/// Returns `true` if a message was taken off the queue and another one may
/// be pending.
fn poll_once(
    client: &mut DeviceClient,
    disposition: Disposition,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<bool, PollError> {
    let Some(message) = client.fetch_pending_message()? else {
        return Ok(false);
    };
    debug!(
        id = message.message_id.as_deref(),
        delivery_count = message.delivery_count,
        "received message"
    );

    write_message(out, &message, format)?;

    match disposition {
        Disposition::Complete => client.acknowledge_message(&message.etag)?,
        Disposition::Abandon => client.abandon_message(&message.etag)?,
        Disposition::Reject => client.reject_message(&message.etag)?,
        Disposition::Ignore => return Ok(false),
    }
    debug!(?disposition, "message completed");

    Ok(disposition.removes_message())
}

fn write_message(
    out: &mut impl Write,
    message: &CloudMessage,
    format: OutputFormat,
) -> Result<(), PollError> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", message.body)?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, message)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
