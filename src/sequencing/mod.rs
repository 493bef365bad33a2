pub mod clip;
pub mod note;
pub mod registry;

pub use clip::Clip;
pub use note::Note;
pub use registry::ClipRegistry;
