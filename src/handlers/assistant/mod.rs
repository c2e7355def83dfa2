//! Voice assistant WebSocket handlers
//!
//! One WebSocket connection carries one assistant session: the client streams
//! microphone audio or sends a typed question, the gateway transcribes it,
//! asks the answer service and streams the spoken answer back.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Binary frames**: 16-bit mono PCM audio. The first frame of a turn
//!   starts recognition.
//! - `{"action": "start_recording"}`: start a turn without sending audio
//! - `{"action": "finalize"}`: the user stopped speaking
//! - `{"type": "text", "text": "..."}`: ask a typed question
//!
//! ## Server → Client
//!
//! - **transcript**: `{"type": "transcript", "text": "...", "final": bool}`
//! - **response**: `{"type": "response", "text": "..."}`
//! - **audio.metadata**: sent before each audio frame when enabled
//! - **Binary frames**: synthesized PCM audio
//! - **audio.end**: the spoken answer is complete
//! - **error**: `{"type": "error", "code": "...", "message": "..."}`

mod handler;
pub mod messages;

pub use handler::assistant_handler;
