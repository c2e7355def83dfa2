//! Turn coordination
//!
//! One [`TurnCoordinator`] per session sequences a turn: audio into
//! recognition, the final utterance into answer retrieval, the answer into
//! synthesis, and the synthesized audio back to the client. Background tasks
//! report through [`BackendEvent`]s consumed by the session's foreground task.

mod coordinator;
mod events;
mod state;

pub use coordinator::{TurnCoordinator, TurnSettings};
pub use events::{BackendEvent, ClientCommand, SessionEvent, TurnId};
pub use state::TurnState;
