use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mio::Token;
use relay_comm::InterruptFlag;
use relay_net::{PollEvent, RelayConnector, RelayEndpoint};

use crate::runner::{Message, WorkerRunner};

/// Binds `endpoint` and accumulates complete messages from it, handing each
/// one to a pool of `thread_count` spawner threads sharing a single work
/// queue (spec §4.6; grounded on the original's single frontend PULL socket
/// proxying into an inproc backend that N worker threads connect to and
/// compete over). Runs until `interrupt` is set.
pub fn run(
    endpoint: &RelayEndpoint,
    runner: WorkerRunner,
    thread_count: usize,
    interrupt: InterruptFlag,
) -> std::io::Result<()> {
    let thread_count = thread_count.max(1);
    let (tx, rx): (Sender<Message>, Receiver<Message>) = mpsc::channel();
    let rx = Arc::new(Mutex::new(rx));
    let runner = Arc::new(runner);

    let workers: Vec<_> = (0..thread_count)
        .map(|i| {
            let rx = Arc::clone(&rx);
            let runner = Arc::clone(&runner);
            std::thread::Builder::new()
                .name(format!("relay-worker-{i}"))
                .spawn(move || spawner_loop(&rx, &runner))
                .expect("spawn worker thread")
        })
        .collect();

    let mut connector = RelayConnector::new()?;
    connector.listen_at(endpoint)?;
    let mut pending: HashMap<Token, Message> = HashMap::new();

    while !interrupt.is_set() {
        connector.poll_with(Some(Duration::from_millis(200)), |ev| {
            if let PollEvent::Message { token, payload, more } = ev {
                let message = pending.entry(token).or_default();
                message.push(payload.to_vec());
                if !more {
                    if let Some(message) = pending.remove(&token) {
                        if tx.send(message).is_err() {
                            tracing::error!("relay-worker: spawner pool gone, dropping message");
                        }
                    }
                }
            }
        });
    }

    drop(tx);
    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}

fn spawner_loop(rx: &Arc<Mutex<Receiver<Message>>>, runner: &WorkerRunner) {
    loop {
        let message = {
            let rx = rx.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            rx.recv()
        };
        match message {
            Ok(message) => {
                if let Err(err) = runner.run(&message) {
                    tracing::error!(%err, "relay-worker: command failed");
                }
            }
            Err(_) => break,
        }
    }
}
