pub mod ids;
pub mod session;

pub use ids::{ConnectionId, SessionId};
pub use session::{Session, Slot, SLOT_COUNT};
