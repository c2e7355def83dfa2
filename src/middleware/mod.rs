pub mod connection_limit;

pub use connection_limit::{SessionSlot, connection_limit_middleware};
