pub mod depth;
pub mod located;
pub mod manual;
pub mod rig;
pub mod source;

pub use depth::DepthPoint;
pub use located::{LocatedSensor, SensorPose, SensorSnapshot};
pub use manual::ManualSensor;
pub use rig::SensorRig;
pub use source::{
    ColorFrame, FrameEvent, FrameHandler, SensorBackend, SensorFrameSource, SkeletonFrame,
    SubscriptionId,
};
