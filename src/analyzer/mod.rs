pub mod landmark_encoder;
pub mod sequence_clock;

pub use landmark_encoder::{LandmarkEncoder, MAX_SUPPORTED_HANDS};
pub use sequence_clock::{SequenceClock, DEFAULT_FRAME_INTERVAL_MS};
