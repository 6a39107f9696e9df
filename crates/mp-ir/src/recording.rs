//! Recorded performance gestures.

use crate::{InstrumentKind, NoteId};

/// A pad gesture as captured while recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    /// A note started at normalized pad coordinates.
    NoteOn {
        id: NoteId,
        x: f32,
        y: f32,
        instrument: Option<InstrumentKind>,
        track: usize,
    },
    /// The note started under `id` was released.
    NoteOff { id: NoteId },
}

impl Gesture {
    pub fn id(&self) -> NoteId {
        match *self {
            Gesture::NoteOn { id, .. } | Gesture::NoteOff { id } => id,
        }
    }
}

/// A gesture stamped with its offset from the start of the recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedEvent {
    /// Seconds since recording started.
    pub offset: f64,
    pub gesture: Gesture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_reports_its_identifier() {
        let on = Gesture::NoteOn {
            id: NoteId::Pointer(7),
            x: 0.2,
            y: 0.4,
            instrument: None,
            track: 1,
        };
        assert_eq!(on.id(), NoteId::Pointer(7));
        assert_eq!(Gesture::NoteOff { id: NoteId::Pointer(7) }.id(), NoteId::Pointer(7));
    }
}
