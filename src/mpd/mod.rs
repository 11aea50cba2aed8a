//! MPD model (§3.1, §4.2): the parsed manifest tree, adaptation-set classification,
//! and the refresh contract.

pub mod classify;
pub mod model;
pub mod refresh;
pub mod url_resolution;

pub use classify::{classify, should_force_mono, AdaptationSetKind, ExtractorBinding};
pub use model::{
    parse, AdaptationSet, BaseURL, ContentCoverage, Descriptor, Preselection, Projection,
    Representation, SegmentBase, SegmentList, SegmentTemplate, StereoRole, MPD,
};
pub use refresh::{validate_refresh, RefreshDelta};
pub use url_resolution::{init_segment_url, merge_baseurls, resolve_base_url, resolve_url_template, segment_media_url};
