mod queue;
mod types;

pub use queue::{EVENT_BUFFER_CAPACITY, EventBuffer};
pub use types::{BoxPickupEvent, DisconnectReason, ItemPlacedEvent, PeerEvent};
