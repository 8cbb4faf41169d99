//! Sends one or more multi-frame messages to a relay ingress endpoint.
//! Grounded on the original `app_client.c`, a thin ZeroMQ PUSH client: here
//! the connect-and-write loop is driven by [`relay_net::RelayConnector`]
//! instead, the same non-blocking primitive every relay mode uses.

use std::fs::File;
use std::io::{Read, stdin};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use relay_config::SenderArgs;
use relay_net::{PollEvent, RelayConnector, RelayEndpoint, SendBehavior};

type Message = Vec<Vec<u8>>;

fn main() -> ExitCode {
    let args = SenderArgs::parse();
    init_tracing(args.verbose);

    let endpoint = match RelayEndpoint::parse(&args.endpoint) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            tracing::error!(%err, "relay-sender: bad --endpoint");
            return ExitCode::FAILURE;
        }
    };

    let messages = match build_messages(&args) {
        Ok(messages) => messages,
        Err(err) => {
            tracing::error!(%err, "relay-sender: couldn't build messages");
            return ExitCode::FAILURE;
        }
    };

    if messages.is_empty() {
        tracing::error!("relay-sender: nothing to send; pass ARGS or --filename");
        return ExitCode::FAILURE;
    }

    match send_all(&endpoint, messages) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "relay-sender: send failed");
            ExitCode::FAILURE
        }
    }
}

fn build_messages(args: &SenderArgs) -> std::io::Result<Vec<Message>> {
    if let Some(filename) = &args.filename {
        let mut body = String::new();
        if filename.eq_ignore_ascii_case("stdin") {
            stdin().read_to_string(&mut body)?;
        } else {
            File::open(filename)?.read_to_string(&mut body)?;
        }

        let prefix_len = if args.multipart == 0 { 0 } else { args.multipart.min(args.frames.len()) };
        let prefix: Vec<Vec<u8>> = args.frames[..prefix_len].iter().map(|f| f.as_bytes().to_vec()).collect();

        let mut messages = Vec::new();
        for line in body.lines() {
            let mut message = prefix.clone();
            message.push(line.as_bytes().to_vec());
            messages.push(message);
        }
        Ok(messages)
    } else {
        let chunk_size = args.multipart.max(1);
        let messages = args
            .frames
            .chunks(chunk_size)
            .map(|chunk| chunk.iter().map(|f| f.as_bytes().to_vec()).collect())
            .collect();
        Ok(messages)
    }
}

fn send_all(endpoint: &RelayEndpoint, messages: Vec<Message>) -> std::io::Result<()> {
    let mut connector = RelayConnector::new()?;
    let token = connector.connect(endpoint.clone());

    let mut connected = false;
    let deadline_ticks = 50; // ~5s at 100ms per tick, bounding the wait for a slow/unreachable peer.
    for _ in 0..deadline_ticks {
        let mut seen = false;
        connector.poll_with(Some(Duration::from_millis(100)), |ev| {
            if let PollEvent::Connect { token: t } = ev {
                if t == token {
                    seen = true;
                }
            }
        });
        if seen {
            connected = true;
            break;
        }
    }
    if !connected {
        return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "relay-sender: connect timed out"));
    }

    for message in &messages {
        let last = message.len().saturating_sub(1);
        for (i, frame) in message.iter().enumerate() {
            connector.write_or_enqueue(SendBehavior::Single(token), frame, i != last);
        }
    }

    // Drain buffered writes before exiting; a non-blocking socket may still
    // have data queued immediately after the loop above.
    for _ in 0..deadline_ticks {
        connector.poll_with(Some(Duration::from_millis(100)), |_| {});
    }
    connector.disconnect(token);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
