//! Identifiers binding a sounding voice to whatever started it.

/// Who owns a voice. At most one live voice exists per identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoteId {
    /// A touch point or mouse pointer, by host-assigned id.
    Pointer(u64),
    /// A sequencer step on a track.
    Step { track: u8, step: u16 },
    /// A gesture replayed from a recording, keyed by its original pointer id.
    Replay(u64),
    /// The metronome click on a pattern beat. Clicks committed in the
    /// same poll never share an identifier.
    Metronome { beat: u32 },
}

impl NoteId {
    /// Identifier under which a recorded pointer gesture is replayed.
    pub fn replayed(self) -> Self {
        match self {
            NoteId::Pointer(id) | NoteId::Replay(id) => NoteId::Replay(id),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replayed_pointer_gets_its_own_namespace() {
        assert_eq!(NoteId::Pointer(3).replayed(), NoteId::Replay(3));
        assert_ne!(NoteId::Pointer(3).replayed(), NoteId::Pointer(3));
    }

    #[test]
    fn step_ids_are_distinct_per_track() {
        let a = NoteId::Step { track: 0, step: 4 };
        let b = NoteId::Step { track: 1, step: 4 };
        assert_ne!(a, b);
        assert_eq!(a.replayed(), a);
    }
}
