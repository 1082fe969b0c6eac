//! Registry of readiness sources and the single blocking wait over them.
//!
//! Sources are timers, file-change watches, the relay channel and (passed in
//! per wait) the MPD socket. A wait returns every source that is ready at the
//! moment it wakes, so one wake may carry several readiness reports.

use crate::error::{Result, StatusError};
use crate::field::Field;
use crate::relay::RelayMessage;
use futures::future::{FutureExt, OptionFuture};
use log::{debug, info};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::time::Instant;

/// Index of a timer inside the registry.
pub type TimerId = usize;

/// How a timer re-arms after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed period.
    Every(Duration),
    /// One shot; the owner computes the next delay and calls [`Registry::rearm`].
    NextDeadline,
}

#[derive(Debug, Clone, Copy)]
struct FileWatch {
    field: Field,
    on_access: bool,
}

#[derive(Debug)]
struct TimerWatch {
    field: Field,
    schedule: Schedule,
    deadline: Option<Instant>,
}

/// One ready source.
#[derive(Debug)]
pub enum Readiness {
    FileChanged(Field),
    Timer(TimerId),
    Relay(RelayMessage),
    Socket,
    SocketFailed(io::Error),
}

pub struct Registry {
    timers: Vec<TimerWatch>,
    files: HashMap<PathBuf, FileWatch>,
    relay_routes: HashMap<RelayMessage, Field>,
    watcher: RecommendedWatcher,
    file_events: UnboundedReceiver<notify::Result<Event>>,
    relay: Option<UnboundedReceiver<RelayMessage>>,
}

impl Registry {
    /// Create the file-watch backend. Failure here is fatal.
    pub fn new() -> Result<Self> {
        let (tx, file_events) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        })?;

        Ok(Self {
            timers: Vec::new(),
            files: HashMap::new(),
            relay_routes: HashMap::new(),
            watcher,
            file_events,
            relay: None,
        })
    }

    pub fn add_timer(&mut self, field: Field, schedule: Schedule, first_delay: Duration) -> Result<TimerId> {
        if schedule == Schedule::Every(Duration::ZERO) {
            return Err(StatusError::unavailable(
                format!("{field} timer"),
                "period must not be zero",
            ));
        }
        self.timers.push(TimerWatch {
            field,
            schedule,
            deadline: Some(Instant::now() + first_delay),
        });
        Ok(self.timers.len() - 1)
    }

    /// Replace a fired timer with a fresh one expiring after `delay`.
    pub fn rearm(&mut self, id: TimerId, delay: Duration) {
        if let Some(timer) = self.timers.get_mut(id) {
            *timer = TimerWatch {
                field: timer.field,
                schedule: timer.schedule,
                deadline: Some(Instant::now() + delay),
            };
        }
    }

    pub fn timer_field(&self, id: TimerId) -> Option<Field> {
        self.timers.get(id).map(|timer| timer.field)
    }

    pub fn timer_schedule(&self, id: TimerId) -> Option<Schedule> {
        self.timers.get(id).map(|timer| timer.schedule)
    }

    /// Pending deadline of the first armed timer refreshing `field`.
    pub fn timer_deadline(&self, field: Field) -> Option<Instant> {
        self.timers
            .iter()
            .filter(|timer| timer.field == field)
            .find_map(|timer| timer.deadline)
    }

    /// Watch `path` for content or attribute changes, and for opens and
    /// closes by other processes when `on_access` is set.
    pub fn watch_file(&mut self, path: &Path, field: Field, on_access: bool) -> Result<()> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|err| StatusError::unavailable(path.display().to_string(), err))?;
        self.files
            .insert(path.to_path_buf(), FileWatch { field, on_access });
        Ok(())
    }

    pub fn route_relay(&mut self, message: RelayMessage, field: Field) {
        self.relay_routes.insert(message, field);
    }

    pub fn relay_route(&self, message: RelayMessage) -> Option<Field> {
        self.relay_routes.get(&message).copied()
    }

    pub fn attach_relay(&mut self, rx: UnboundedReceiver<RelayMessage>) {
        self.relay = Some(rx);
    }

    /// Drop every watch registered for `field`.
    pub fn forget(&mut self, field: Field) {
        for timer in self.timers.iter_mut().filter(|timer| timer.field == field) {
            timer.deadline = None;
        }

        let paths: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(_, watch)| watch.field == field)
            .map(|(path, _)| path.clone())
            .collect();
        for path in paths {
            if let Err(err) = self.watcher.unwatch(&path) {
                debug!("unwatch {}: {err}", path.display());
            }
            self.files.remove(&path);
        }

        self.relay_routes.retain(|_, owner| *owner != field);
    }

    /// Block until at least one source is ready and return all ready sources.
    pub async fn wait<F>(&mut self, socket: Option<F>) -> Result<Vec<Readiness>>
    where
        F: Future<Output = io::Result<()>>,
    {
        let watch_socket = socket.is_some();
        let socket = OptionFuture::from(socket);
        tokio::pin!(socket);
        let mut socket_done = false;

        loop {
            let mut batch = Vec::new();
            let deadline = self.next_deadline();

            tokio::select! {
                event = self.file_events.recv() => match event {
                    Some(event) => self.collect_file_event(event, &mut batch)?,
                    None => return Err(StatusError::readiness("file watch channel closed")),
                },
                message = recv_relay(&mut self.relay), if self.relay.is_some() => match message {
                    Some(message) => batch.push(Readiness::Relay(message)),
                    None => self.detach_relay(),
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
                Some(result) = &mut socket, if watch_socket && !socket_done => {
                    socket_done = true;
                    batch.push(socket_readiness(result));
                }
            }

            while let Ok(event) = self.file_events.try_recv() {
                self.collect_file_event(event, &mut batch)?;
            }
            self.drain_relay(&mut batch);
            self.collect_expired(Instant::now(), &mut batch);
            if watch_socket && !socket_done {
                if let Some(Some(result)) = socket.as_mut().now_or_never() {
                    socket_done = true;
                    batch.push(socket_readiness(result));
                }
            }

            if !batch.is_empty() {
                return Ok(batch);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().filter_map(|timer| timer.deadline).min()
    }

    fn collect_expired(&mut self, now: Instant, batch: &mut Vec<Readiness>) {
        for (id, timer) in self.timers.iter_mut().enumerate() {
            let Some(deadline) = timer.deadline else {
                continue;
            };
            if deadline > now {
                continue;
            }
            batch.push(Readiness::Timer(id));
            timer.deadline = match timer.schedule {
                Schedule::Every(period) => {
                    let mut next = deadline + period;
                    while next <= now {
                        next += period;
                    }
                    Some(next)
                }
                Schedule::NextDeadline => None,
            };
        }
    }

    fn collect_file_event(&self, event: notify::Result<Event>, batch: &mut Vec<Readiness>) -> Result<()> {
        let event = event?;
        for path in &event.paths {
            let Some(&FileWatch { field, on_access }) = self.files.get(path) else {
                debug!("change on unwatched path {}", path.display());
                continue;
            };
            if !triggers(&event.kind, on_access) {
                continue;
            }
            let seen = batch
                .iter()
                .any(|ready| matches!(ready, Readiness::FileChanged(f) if *f == field));
            if !seen {
                batch.push(Readiness::FileChanged(field));
            }
        }
        Ok(())
    }

    fn drain_relay(&mut self, batch: &mut Vec<Readiness>) {
        let Some(rx) = self.relay.as_mut() else {
            return;
        };
        let closed = loop {
            match rx.try_recv() {
                Ok(message) => batch.push(Readiness::Relay(message)),
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => break true,
            }
        };
        if closed {
            self.detach_relay();
        }
    }

    fn detach_relay(&mut self) {
        info!("display relay ended, no more brightness or hot-key updates");
        self.relay = None;
    }
}

/// Whether an event of `kind` refreshes a watched file's field.
fn triggers(kind: &EventKind, on_access: bool) -> bool {
    match kind {
        EventKind::Modify(_) | EventKind::Create(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(AccessKind::Open(_) | AccessKind::Close(_) | AccessKind::Read) => on_access,
        _ => false,
    }
}

async fn recv_relay(relay: &mut Option<UnboundedReceiver<RelayMessage>>) -> Option<RelayMessage> {
    match relay {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn socket_readiness(result: io::Result<()>) -> Readiness {
    match result {
        Ok(()) => Readiness::Socket,
        Err(err) => Readiness::SocketFailed(err),
    }
}
