//! OMAF structure codec (§3.3, §4.1): bit-exact, big-endian encode/decode of the
//! sphere-region, region-wise-packing, overlay, and viewpoint structures carried in
//! OMAF sample entries and timed metadata samples.
//!
//! Every concrete type in this module follows the same `parse`/`write`/`size`
//! contract built on [`bitstream::BitReader`] / [`bitstream::BitWriter`]. `parse`
//! takes an explicit context object wherever presence of an optional field depends
//! on an ancestor box rather than being self-describing.

pub mod bitstream;
pub mod overlay;
pub mod region;
pub mod sphere;
pub mod viewpoint;

pub use bitstream::{clamp_reserved, BitReader, BitWriter};
pub use overlay::{
    AlphaBlendMode, OverlayControl, OverlayControlEntry, OverlayStruct, SingleOverlay,
    SourceRegion2d, ViewportRelativeRegion,
};
pub use region::{
    GuardBand, PackedPictureRegion, ProjectedPictureRegion, RegionPair, RegionTransform,
    RegionWisePacking,
};
pub use sphere::{Rotation, SphereRegion, SphereRegionContext};
pub use viewpoint::{
    GeomagneticInfo, GpsPosition, LoopingDescriptor, Position, SwitchRegion, TimelineSwitch,
    TransitionEffect, ViewingOrientationMode, Viewpoint, ViewpointGroup, ViewpointPresence,
    ViewpointSwitchRecord, ViewpointSwitchingList,
};
