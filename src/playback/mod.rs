pub mod clip;
pub mod config;
pub mod note;
pub mod param;

pub use clip::{play_clip, play_named_clip, ClipHandle, PlayClipOptions};
pub use config::{map_bend, PlaybackConfig};
pub use note::{play_note, NoteHandle};
pub use param::play_param;
