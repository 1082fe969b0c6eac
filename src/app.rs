//! The readiness multiplexer.
//!
//! Owns the field table, the provider contexts, the readiness registry, the
//! MPD session and the renderer. One pass of the loop is: wait for a batch of
//! ready sources, refresh the fields they belong to, render one line.

pub mod registry;
pub mod runtime;

use crate::config::CLOCK_FALLBACK_INTERVAL;
use crate::error::Result;
use crate::field::{Field, FieldTable};
use crate::provider::{MpdSession, Provider, Registration, WatchSpec};
use crate::relay::RelayMessage;
use crate::render::LineRenderer;
use log::{debug, warn};
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

pub use registry::{Readiness, Registry, Schedule, TimerId};
pub use runtime::bootstrap;

pub struct Multiplexer<W: Write, S = TcpStream> {
    table: FieldTable,
    providers: Vec<Option<Box<dyn Provider>>>,
    registry: Registry,
    player: Option<MpdSession<S>>,
    renderer: LineRenderer<W>,
}

impl<W, S> Multiplexer<W, S>
where
    W: Write,
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Empty table, empty registry. Fails only if the watch backend cannot start.
    pub fn new(out: W) -> Result<Self> {
        Ok(Self {
            table: FieldTable::new(),
            providers: (0..Field::COUNT).map(|_| None).collect(),
            registry: Registry::new()?,
            player: None,
            renderer: LineRenderer::new(out, Field::LEFT_ALIGNED.index()),
        })
    }

    /// Initialise one provider, store its first value and register its watches.
    ///
    /// Returns `false` if the provider is unavailable; the field then stays
    /// empty for the rest of the run.
    pub fn install<I>(&mut self, field: Field, init: I) -> bool
    where
        I: FnOnce() -> Result<Registration>,
    {
        let Registration {
            mut provider,
            watches,
        } = match init() {
            Ok(registration) => registration,
            Err(err) => {
                warn!("{field}: {err}");
                return false;
            }
        };

        let value = query_logged(field, &mut *provider);
        for watch in &watches {
            if let Err(err) = self.register(field, watch, &*provider) {
                warn!("{field}: {err}");
                self.registry.forget(field);
                return false;
            }
        }

        debug!("{field}: watching {watches:?}");
        self.table.set(field, value);
        self.providers[field.index()] = Some(provider);
        true
    }

    /// Install the MPD session produced by `connect`.
    pub async fn install_player<F>(&mut self, connect: F) -> bool
    where
        F: Future<Output = Result<MpdSession<S>>>,
    {
        let started = match connect.await {
            Ok(mut session) => session.start().await.map(|value| (session, value)),
            Err(err) => Err(err),
        };
        match started {
            Ok((session, value)) => {
                self.table.set(Field::Player, value);
                self.player = Some(session);
                true
            }
            Err(err) => {
                warn!("{}: {err}", Field::Player);
                false
            }
        }
    }

    pub fn attach_relay(&mut self, rx: UnboundedReceiver<RelayMessage>) {
        self.registry.attach_relay(rx);
    }

    fn register(&mut self, field: Field, watch: &WatchSpec, provider: &dyn Provider) -> Result<()> {
        match watch {
            WatchSpec::Every(period) => {
                self.registry.add_timer(field, Schedule::Every(*period), *period)?;
            }
            WatchSpec::NextDeadline => {
                let delay = provider.next_delay().unwrap_or(CLOCK_FALLBACK_INTERVAL);
                self.registry.add_timer(field, Schedule::NextDeadline, delay)?;
            }
            WatchSpec::FileChange(path) => self.registry.watch_file(path, field, false)?,
            WatchSpec::FileAccess(path) => self.registry.watch_file(path, field, true)?,
            WatchSpec::Relay(message) => self.registry.route_relay(*message, field),
        }
        Ok(())
    }

    /// Render the initial line, then wait, dispatch and render forever.
    ///
    /// Only returns on a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        self.render()?;
        loop {
            let batch = self.wait().await?;
            self.process_batch(batch).await?;
        }
    }

    pub async fn wait(&mut self) -> Result<Vec<Readiness>> {
        let socket = self.player.as_mut().map(|session| session.readable());
        self.registry.wait(socket).await
    }

    /// Dispatch a whole batch, then render exactly one line.
    pub async fn process_batch(&mut self, batch: Vec<Readiness>) -> Result<()> {
        self.dispatch(batch).await;
        self.render()
    }

    /// Refresh the field behind every ready source, in the order reported.
    pub async fn dispatch(&mut self, batch: Vec<Readiness>) {
        for ready in batch {
            match ready {
                Readiness::FileChanged(field) => self.refresh(field),
                Readiness::Timer(id) => self.on_timer(id),
                Readiness::Relay(message) => match self.registry.relay_route(message) {
                    Some(field) => self.refresh(field),
                    None => debug!("no provider for {message:?}"),
                },
                Readiness::Socket => self.refresh_player().await,
                Readiness::SocketFailed(err) => {
                    warn!("{}: connection lost: {err}", Field::Player);
                    self.drop_player();
                }
            }
        }
    }

    pub fn render(&mut self) -> Result<()> {
        self.renderer.render(&self.table)
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn renderer(&self) -> &LineRenderer<W> {
        &self.renderer
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    fn on_timer(&mut self, id: TimerId) {
        let Some(field) = self.registry.timer_field(id) else {
            return;
        };
        self.refresh(field);

        if self.registry.timer_schedule(id) == Some(Schedule::NextDeadline) {
            let delay = self.providers[field.index()]
                .as_ref()
                .and_then(|provider| provider.next_delay())
                .unwrap_or(CLOCK_FALLBACK_INTERVAL);
            self.registry.rearm(id, delay);
        }
    }

    fn refresh(&mut self, field: Field) {
        let Some(provider) = self.providers[field.index()].as_mut() else {
            debug!("{field}: no provider installed");
            return;
        };
        let value = query_logged(field, &mut **provider);
        self.table.set(field, value);
    }

    async fn refresh_player(&mut self) {
        let Some(session) = self.player.as_mut() else {
            return;
        };
        match session.on_readable().await {
            Ok(value) => {
                self.table.set(Field::Player, value);
            }
            Err(err) => {
                warn!("{}: {err}", Field::Player);
                self.drop_player();
            }
        }
    }

    fn drop_player(&mut self) {
        self.table.set(Field::Player, None);
        self.player = None;
    }
}

fn query_logged(field: Field, provider: &mut dyn Provider) -> Option<String> {
    match provider.query() {
        Ok(value) => value,
        Err(err) => {
            warn!("{field}: {err}");
            None
        }
    }
}
