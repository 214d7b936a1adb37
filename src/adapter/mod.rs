//! Adapters exposing concrete playback engines through the `Track` contract.

pub mod engine;
pub mod segmented;
pub mod video;
pub mod whiteboard;

pub use engine::{BoardEngine, BoardEvent, BoardPhase, MediaEngine, MediaEvent, MediaState};
pub use segmented::SegmentedVideoTrack;
pub use video::VideoTrack;
pub use whiteboard::WhiteboardTrack;
