//! Pure transition logic for the aggregator.
//!
//! [`PresenceMachine`] holds the published state and the pending loss
//! timers. It never touches I/O or the clock itself: callers pass the
//! monotonic `now` used for deadlines and the wall-clock time recorded in
//! the state, and act on the returned [`Outcome`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::state::{LocalConnectionState, RecheckOutcome};
use crate::debounce::Debouncer;
use crate::protocol::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalSource {
    Network,
    Channel,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Re-fetch other users' presence.
    RefreshDirectory,
    /// Write the current user's record as present.
    ///
    /// Does not arm the write-on-disconnect hook. Arming is left to the
    /// `DisconnectRegistrar`, which re-arms on every raw channel connect,
    /// including one published by a successful channel probe.
    AnnounceOnline,
    /// Write the app lifecycle state to the current user's record.
    WriteAppState(AppState),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The published state differs from before.
    pub changed: bool,
    /// `Some(v)` when `is_online` flipped to `v`.
    pub online_transition: Option<bool>,
    pub effects: Vec<Effect>,
}

pub struct PresenceMachine {
    state: LocalConnectionState,
    // Payload is the wall-clock instant the raw signal was lost.
    timers: Debouncer<SignalSource, DateTime<Utc>>,
    network_debounce: Duration,
    channel_debounce: Duration,
}

impl PresenceMachine {
    pub fn new(network_debounce: Duration, channel_debounce: Duration) -> Self {
        Self {
            state: LocalConnectionState::default(),
            timers: Debouncer::new(),
            network_debounce,
            channel_debounce,
        }
    }

    pub fn state(&self) -> &LocalConnectionState {
        &self.state
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn is_pending(&self, source: SignalSource) -> bool {
        self.timers.is_pending(&source)
    }

    /// Apply a raw signal reading.
    pub fn signal(
        &mut self,
        source: SignalSource,
        up: bool,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Outcome {
        let before = self.state.clone();
        let mut effects = Vec::new();

        if up {
            self.timers.cancel(&source);
            self.set_flag(source, true, wall);
            if source == SignalSource::Channel {
                self.state.last_online_at = Some(wall);
                effects.push(Effect::RefreshDirectory);
            }
        } else if self.flag(source) {
            let delay = match source {
                SignalSource::Network => self.network_debounce,
                SignalSource::Channel => self.channel_debounce,
            };
            self.timers.schedule(source, delay, now, wall);
        } else {
            // Already published as lost; nothing to hold.
            self.timers.cancel(&source);
        }

        self.finish(before, effects)
    }

    /// Publish every loss whose debounce window has elapsed.
    pub fn fire_due(&mut self, now: Instant) -> Outcome {
        let before = self.state.clone();
        for (source, lost_at) in self.timers.take_due(now) {
            self.set_flag(source, false, lost_at);
        }
        self.finish(before, Vec::new())
    }

    pub fn apply_recheck(&mut self, outcome: RecheckOutcome, wall: DateTime<Utc>) -> Outcome {
        let before = self.state.clone();
        let mut effects = Vec::new();

        match outcome {
            RecheckOutcome::NoNetwork => {
                self.timers.cancel(&SignalSource::Network);
                self.set_flag(SignalSource::Network, false, wall);
            }
            RecheckOutcome::Limited => {
                self.timers.cancel(&SignalSource::Network);
                self.set_flag(SignalSource::Network, true, wall);
            }
            RecheckOutcome::Online => {
                self.timers.clear();
                self.set_flag(SignalSource::Network, true, wall);
                self.set_flag(SignalSource::Channel, true, wall);
                self.state.last_online_at = Some(wall);
                effects.push(Effect::AnnounceOnline);
                effects.push(Effect::RefreshDirectory);
            }
        }

        self.finish(before, effects)
    }

    pub fn set_app_state(&mut self, app: AppState) -> Outcome {
        if self.state.app_state == app {
            return Outcome::default();
        }
        let before = self.state.clone();
        self.state.app_state = app;

        let mut effects = Vec::new();
        if self.state.is_channel_connected {
            effects.push(Effect::WriteAppState(app));
        }
        self.finish(before, effects)
    }

    fn flag(&self, source: SignalSource) -> bool {
        match source {
            SignalSource::Network => self.state.is_network_connected,
            SignalSource::Channel => self.state.is_channel_connected,
        }
    }

    fn set_flag(&mut self, source: SignalSource, value: bool, at: DateTime<Utc>) {
        let was = self.flag(source);
        match source {
            SignalSource::Network => self.state.is_network_connected = value,
            SignalSource::Channel => self.state.is_channel_connected = value,
        }
        if was && !value && self.state.offline_since.is_none() {
            self.state.offline_since = Some(at);
        }

        let online = self.state.is_network_connected && self.state.is_channel_connected;
        if online != self.state.is_online {
            self.state.is_online = online;
            if online {
                self.state.offline_since = None;
                self.state.last_online_at = Some(at);
            }
        }
    }

    fn finish(&self, before: LocalConnectionState, effects: Vec<Effect>) -> Outcome {
        let online_transition =
            (before.is_online != self.state.is_online).then_some(self.state.is_online);
        Outcome {
            changed: before != self.state,
            online_transition,
            effects,
        }
    }
}
