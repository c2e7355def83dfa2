use std::fmt;

/// Where the session is in its current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnState {
    /// No turn in progress
    #[default]
    Idle,
    /// Recognition stream open, audio being forwarded
    Listening,
    /// End of audio signalled, waiting for the final transcript
    Finalizing,
    /// Answer lookup in flight
    Querying,
    /// Synthesis stream open, audio being relayed
    Speaking,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Listening => "listening",
            TurnState::Finalizing => "finalizing",
            TurnState::Querying => "querying",
            TurnState::Speaking => "speaking",
        }
    }

    /// Whether client audio is accepted in this state.
    pub fn accepts_audio(&self) -> bool {
        matches!(self, TurnState::Idle | TurnState::Listening)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
