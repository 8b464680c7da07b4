//! Presence tracking for rollcall.
//!
//! Decides whether the current device and other members are online by
//! merging device reachability, the realtime channel's connection flag and
//! the app lifecycle into one debounced state, keeps the current user's
//! remote record fresh, and serves other users' presence from a short-lived
//! cache.

pub mod aggregator;
pub mod callbacks;
pub mod channel;
pub mod connectivity;
pub mod debounce;
pub mod directory;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod manager;
pub mod memory;
pub mod protocol;
pub mod realtime;
pub mod registrar;
pub mod runtime;
pub mod settings;
pub mod store;

pub use aggregator::{LocalConnectionState, PresenceAggregator, RecheckOutcome};
pub use callbacks::{CallbackHandle, CallbackRegistry, ConnectionCallbacks};
pub use channel::ChannelMonitor;
pub use connectivity::{ConnectivityMonitor, TcpReachability};
pub use debounce::Debouncer;
pub use directory::PresenceDirectory;
pub use error::{classify, report, ErrorClass, PresenceError};
pub use heartbeat::HeartbeatScheduler;
pub use identity::Identity;
pub use manager::PresenceManager;
pub use memory::{ManualReachability, MemoryStore};
pub use protocol::{AppState, PresenceRecord, PresenceState};
pub use realtime::{RealtimeClient, RealtimeClientConfig};
pub use registrar::{DisconnectRegistrar, PresenceWriter};
pub use runtime::PresenceRuntime;
pub use settings::PresenceSettings;
pub use store::{Reachability, RealtimeStore};
