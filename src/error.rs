//! Error kinds for the engine (§7 of spec.md).
//!
//! `EndOfStream` is deliberately not a variant here — spec.md calls it "a normal
//! terminal condition, not an error", so it is modeled as an enum value returned from
//! state-machine `step()` methods instead (see [`crate::segment::SegmentState`]).

use thiserror::Error;

/// Errors surfaced by the download/scheduling core.
#[derive(Debug, Error)]
pub enum OmafError {
    /// MPD malformed, a required descriptor is missing, or the declared profile set
    /// is unsupported.
    #[error("manifest configuration error: {0}")]
    Config(String),

    /// HTTP failure, DNS failure, or timeout, after the retry policy in
    /// [`crate::segment`] has been exhausted.
    #[error("transport error fetching {uri}: {source}")]
    Transport {
        uri: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An OMAF bitstream structure claimed more bytes than were available.
    #[error("OMAF structure truncated: expected {expected} bytes, found {found}")]
    StructureTruncated { expected: usize, found: usize },

    /// An OMAF bitstream structure was internally inconsistent (e.g. an enum tag with
    /// no valid mapping that also cannot be clamped to a reserved value).
    #[error("OMAF structure malformed: {0}")]
    StructureMalformed(String),

    /// Adaptation-set cardinality changed across an MPD refresh, or a cache/budget
    /// invariant was violated.
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// The tile budget cannot be satisfied at any quality level for this device.
    #[error("resource error: {0}")]
    Resource(String),

    /// XML parsing failure from `quick-xml` / `serde_path_to_error`, wrapped as a
    /// config error at the MPD parsing boundary.
    #[error("failed to parse MPD: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

pub type Result<T> = std::result::Result<T, OmafError>;
