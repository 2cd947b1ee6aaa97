pub mod buffer;
pub mod resolve;
pub mod session;

pub use buffer::{PickBuffer, PickSample, SAMPLE_HALF_EXTENT};
pub use resolve::{
    MouseEventKind, NO_PART, PickCandidate, PickEntry, PickReason, decode_sample, hover_target, merge_entries,
    scene_candidates, select_target,
};
pub use session::{PickSession, PickState, PickUpdate, update_current_pick};
