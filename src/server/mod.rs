//! Live engine infrastructure for one watched root
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        EngineState                           │
//! │   RwLock<Registry>   ComponentLocks   broadcast::Sender      │
//! │                                                              │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐   │
//! │  │ FileWatcher  │   │ CommandProcessor │   │     Hub     │   │
//! │  │  (rescans)   │   │   (mutations)    │   │ (websocket) │   │
//! │  └──────────────┘   └──────────────────┘   └─────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The watcher and the processor both reconcile through
//! [`EngineState::resync_component`] while holding the component's lock, so
//! a rescan never overlaps a mutation of the same component.
//!
//! # Modules
//!
//! - `state` - registry service, component locks, broadcaster
//! - `watcher` - debounced file system watching
//! - `events` - broadcast payload builders

pub mod events;
pub mod state;
pub mod watcher;

pub use state::{ComponentLocks, ComponentPhase, EngineState};
pub use watcher::{FileWatcher, PendingBatches, WatcherHandle};
