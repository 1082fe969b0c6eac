//! The relay thread body.

use crate::error::{Result, StatusError};
use crate::relay::protocol::{DisplayEventSource, RelayMessage};
use log::{debug, info};
use std::thread;
use tokio::sync::mpsc::UnboundedSender;

/// Forward classified events until the source ends or the receiver goes away.
pub fn relay_events<E: DisplayEventSource>(source: &mut E, tx: &UnboundedSender<RelayMessage>) {
    while let Some(event) = source.next_event() {
        let Some(message) = RelayMessage::from_event(event) else {
            debug!("dropping display event {:?}", event);
            continue;
        };
        if tx.send(message).is_err() {
            debug!("relay receiver closed");
            return;
        }
    }
    info!("display connection ended, relay stopping");
}

/// Spawn a blocking thread that waits for display events and forwards them to the multiplexer.
pub fn spawn_relay_thread<E>(
    mut source: E,
    tx: UnboundedSender<RelayMessage>,
) -> Result<thread::JoinHandle<()>>
where
    E: DisplayEventSource + Send + 'static,
{
    thread::Builder::new()
        .name("display-relay".to_string())
        .spawn(move || relay_events(&mut source, &tx))
        .map_err(|err| StatusError::relay(format!("cannot start relay thread: {err}")))
}
