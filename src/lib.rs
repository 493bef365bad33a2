pub mod curve; // Keyframed, Bezier-eased control curves
pub mod device;
pub mod playback; // Note, clip, and parameter playback drivers
pub mod sequencing; // Clip/note data model
pub mod timing; // Cooperative scheduling engine

/// Two instants closer than this are treated as the same scheduling step.
pub(crate) const TIME_EPSILON: f64 = 1e-9;
