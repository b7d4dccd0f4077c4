pub mod bones;
pub mod joint;
pub mod snapshot;

pub use bones::{bone_style, drawable_bones, BoneStyle, BONES};
pub use joint::{JointId, JointSample, TrackingState};
pub use snapshot::{ClippedEdges, SkeletonSnapshot, SkeletonTrackingState};
