//! Message passing for collective decisions
//!
//! Agents talk to the coordinator through typed [`DecisionMessage`]s on an
//! mpsc inbox; the subsystem reports back through [`DecisionEvent`]s on a
//! broadcast [`EventBus`].
//!
//! ```text
//! ┌──────────────┐  DecisionMessage  ┌─────────────┐  DecisionEvent  ┌─────────────┐
//! │    Agents    │──────────────────▶│ Coordinator │────────────────▶│ Subscribers │
//! │  (mpsc tx)   │                   │   (inbox)   │   (broadcast)   │ (per filter)│
//! └──────────────┘                   └─────────────┘                 └─────────────┘
//! ```
//!
//! A subscriber interested in one proposal uses
//! [`EventBus::subscribe_proposal`], which yields only that proposal's events.

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventFilter, FilteredReceiver, SharedEventBus, CHANNEL_CAPACITY};
pub use types::{DecisionEvent, DecisionMessage};
