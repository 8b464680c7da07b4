//! The presence state machine and its actor.
//!
//! [`PresenceAggregator`] is the only writer of [`LocalConnectionState`]. It
//! merges the network, channel and app-lifecycle signals, holds losses for
//! their debounce window, and publishes recoveries at once. Every published
//! change goes out on a `watch` channel and the event bus; changes to
//! `is_online` also fire the callback registry.

mod machine;
mod recheck;
mod state;


pub use machine::{Effect, Outcome, PresenceMachine, SignalSource};
pub use recheck::run_recheck;
pub use state::{LocalConnectionState, RecheckOutcome};

use std::sync::Arc;

use chrono::Utc;
use rollcall_common::events::{Event, EventBus};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::callbacks::CallbackRegistry;
use crate::error::{report, PresenceError};
use crate::protocol::AppState;
use crate::registrar::PresenceWriter;
use crate::settings::PresenceSettings;

/// Signals the aggregator merges.
pub struct AggregatorInputs {
    pub network: watch::Receiver<bool>,
    pub channel: watch::Receiver<bool>,
    pub app: watch::Receiver<AppState>,
}

/// Where the aggregator's side effects go.
pub struct AggregatorSinks {
    pub callbacks: Arc<CallbackRegistry>,
    pub bus: EventBus,
    pub directory: Arc<Notify>,
    pub writer: PresenceWriter,
}

enum Command {
    Recheck(RecheckOutcome, oneshot::Sender<LocalConnectionState>),
}

pub struct PresenceAggregator {
    state: watch::Receiver<LocalConnectionState>,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl PresenceAggregator {
    pub fn start(
        inputs: AggregatorInputs,
        settings: &PresenceSettings,
        sinks: AggregatorSinks,
    ) -> Self {
        let (state_tx, state) = watch::channel(LocalConnectionState::default());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let actor = Actor {
            machine: PresenceMachine::new(settings.network_debounce, settings.channel_debounce),
            state_tx,
            sinks,
            last_write: None,
        };
        tokio::spawn(actor.run(inputs, command_rx, cancel.clone()));

        Self {
            state,
            commands,
            cancel,
        }
    }

    pub fn current(&self) -> LocalConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalConnectionState> {
        self.state.clone()
    }

    /// Apply a recheck result and return the state published afterwards.
    pub async fn apply_recheck(
        &self,
        outcome: RecheckOutcome,
    ) -> Result<LocalConnectionState, PresenceError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Recheck(outcome, ack))
            .map_err(|_| PresenceError::Closed)?;
        done.await.map_err(|_| PresenceError::Closed)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PresenceAggregator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Actor {
    machine: PresenceMachine,
    state_tx: watch::Sender<LocalConnectionState>,
    sinks: AggregatorSinks,
    // Latest record write; a newer one supersedes it.
    last_write: Option<JoinHandle<()>>,
}

impl Actor {
    async fn run(
        mut self,
        inputs: AggregatorInputs,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        let AggregatorInputs {
            mut network,
            mut channel,
            mut app,
        } = inputs;

        let initial_app = *app.borrow_and_update();
        let outcome = self.machine.set_app_state(initial_app);
        self.apply(outcome);
        let up = *network.borrow_and_update();
        self.signal(SignalSource::Network, up);
        let up = *channel.borrow_and_update();
        self.signal(SignalSource::Channel, up);

        let (mut network_open, mut channel_open, mut app_open) = (true, true, true);

        loop {
            let deadline = self.machine.next_deadline();
            tokio::select! {
                _ = cancel.cancelled() => break,

                changed = network.changed(), if network_open => {
                    let up = match changed {
                        Ok(()) => *network.borrow_and_update(),
                        Err(_) => {
                            network_open = false;
                            false
                        }
                    };
                    self.signal(SignalSource::Network, up);
                }

                changed = channel.changed(), if channel_open => {
                    let up = match changed {
                        Ok(()) => *channel.borrow_and_update(),
                        Err(_) => {
                            channel_open = false;
                            false
                        }
                    };
                    self.signal(SignalSource::Channel, up);
                }

                changed = app.changed(), if app_open => {
                    if changed.is_err() {
                        app_open = false;
                        continue;
                    }
                    let next = *app.borrow_and_update();
                    let outcome = self.machine.set_app_state(next);
                    self.apply(outcome);
                }

                command = commands.recv() => {
                    let Some(Command::Recheck(result, ack)) = command else {
                        break;
                    };
                    let outcome = self.machine.apply_recheck(result, Utc::now());
                    self.apply(outcome);
                    let _ = ack.send(self.machine.state().clone());
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let outcome = self.machine.fire_due(Instant::now());
                    self.apply(outcome);
                }
            }
        }

        if let Some(handle) = self.last_write.take() {
            handle.abort();
        }
        debug!("presence aggregator stopped");
    }

    fn signal(&mut self, source: SignalSource, up: bool) {
        let outcome = self.machine.signal(source, up, Instant::now(), Utc::now());
        if !up && self.machine.is_pending(source) {
            debug!(?source, "signal lost, holding for debounce window");
        }
        self.apply(outcome);
    }

    fn apply(&mut self, outcome: Outcome) {
        if outcome.changed {
            let next = self.machine.state().clone();
            let prev = self.state_tx.send_replace(next.clone());
            self.publish_events(&prev, &next);
        }

        if let Some(online) = outcome.online_transition {
            info!(online, "presence changed");
            self.sinks.callbacks.dispatch(online);
        }

        for effect in outcome.effects {
            match effect {
                Effect::RefreshDirectory => self.sinks.directory.notify_one(),
                Effect::AnnounceOnline => {
                    let app = self.machine.state().app_state;
                    self.write_app_state(app);
                }
                Effect::WriteAppState(app) => self.write_app_state(app),
            }
        }
    }

    fn publish_events(&self, prev: &LocalConnectionState, next: &LocalConnectionState) {
        let bus = &self.sinks.bus;
        if prev.is_network_connected != next.is_network_connected {
            bus.publish(Event::NetworkChanged(next.is_network_connected));
        }
        if prev.is_channel_connected != next.is_channel_connected {
            bus.publish(Event::ChannelChanged(next.is_channel_connected));
        }
        if prev.is_online != next.is_online {
            bus.publish(Event::PresenceChanged {
                is_online: next.is_online,
            });
        }
    }

    fn write_app_state(&mut self, app: AppState) {
        if let Some(prev) = self.last_write.take() {
            prev.abort();
        }
        let writer = self.sinks.writer.clone();
        self.last_write = Some(tokio::spawn(async move {
            if let Err(e) = writer.mark_app_state(app).await {
                report("app state write", &e);
            }
        }));
    }
}
