//! Stream registry
//!
//! The registry tracks every published stream: its record, its room (the set
//! of connections currently joined), and the single broadcaster connection
//! allowed to unpublish it. The three are one entry created and destroyed
//! together, so a stream without a broadcaster cannot exist.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<StreamRegistry>
//!                 ┌──────────────────────────┐
//!                 │ streams: HashMap<Id,     │
//!                 │   StreamEntry {          │
//!                 │     record,              │
//!                 │     broadcaster,         │
//!                 │     members: HashSet,    │
//!                 │   }                      │
//!                 │ >                        │
//!                 └────────────┬─────────────┘
//!                              │ mutate, then notify
//!                              ▼
//!                      Arc<ConnectionHub>
//!            ┌────────────────┼────────────────┐
//!            ▼                ▼                ▼
//!       [Broadcaster]     [Viewer]         [Viewer]
//!       stream-started    viewer-count     stream-ended
//! ```
//!
//! Membership changes on different streams proceed fully in parallel; two
//! racing changes on the same stream serialize on its entry lock, so a stale
//! viewer count can never overwrite a fresh one.

pub mod config;
pub mod error;
pub mod stream;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use store::StreamRegistry;
pub use stream::{PublishRequest, StreamId, StreamRecord, StreamSnapshot};
