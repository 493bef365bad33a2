use super::note::Note;

/// A named span of notes.
///
/// The duration is the clip's own window; a note whose `position +
/// duration` pokes past it is legal — whether to truncate is the
/// player's call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub name: String,
    /// Length of the clip window, in beats.
    pub duration: f64,
    pub notes: Vec<Note>,
}

impl Clip {
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            notes: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }

    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Enabled notes in time order. The sort is stable: notes sharing a
    /// position keep their original relative order.
    pub fn playable_notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.notes.iter().filter(|n| n.enabled).cloned().collect();
        notes.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        notes
    }
}
