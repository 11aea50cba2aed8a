//! A viewport-adaptive download and scheduling engine for tiled 360° video delivered
//! as OMAF (ISO/IEC 23090-2) content over MPEG-DASH.
//!
//! The crate is organised around the pipeline a playback client drives once per tick:
//!
//! 1. [`mpd`] parses and classifies a DASH MPD manifest into OMAF-flavoured adaptation
//!    sets (tiles, extractors, overlays, metadata tracks) and validates dynamic-MPD
//!    refreshes against the previous manifest generation.
//! 2. [`tile_picker`] turns a viewport orientation into the set of tiles that cover it,
//!    plus a ring of margin tiles kept warm for the next head turn, with hysteresis so
//!    small viewport jitter doesn't thrash the selection.
//! 3. [`bitrate`] assigns a quality level per tile group (foreground/margin/background)
//!    against the current bandwidth estimate from [`bandwidth`], both periodically and
//!    on a download-problem fast path.
//! 4. [`segment`] drives the per-representation fetch state machine, and
//!    [`extractor`] concatenates an extractor representation's bytes with its
//!    supporting tiles' bytes once every piece for a segment id has arrived.
//! 5. [`download_manager`] owns one [`adaptation_set::AdaptationSet`] per MPD
//!    adaptation set and orchestrates the above across a tick.
//!
//! [`omaf`] holds the bit-exact parse/write/size codecs for the OMAF structures
//! referenced from the manifest and sample entries (sphere regions, region-wise
//! packing, overlay controls, viewpoints). [`http`] is the transport seam: this crate
//! defines the `HttpClient` trait it drives but does not ship a concrete
//! implementation, leaving that to the embedding application.
//!
//! ## Non-goals
//!
//! This crate does not parse ISOBMFF boxes, decode video or audio, render to a GPU
//! surface, mix audio, read platform orientation sensors, or implement DRM. It
//! schedules *which* bytes to fetch and *when*; what happens to those bytes once
//! delivered is the embedder's responsibility.

#![allow(non_snake_case)]

pub mod adaptation_set;
pub mod bandwidth;
pub mod bitrate;
pub mod clock;
pub mod config;
pub mod download_manager;
pub mod error;
pub mod extractor;
pub mod http;
pub mod mpd;
pub mod omaf;
pub mod segment;
pub mod tile_picker;

pub use config::OmafEngineConfig;
pub use download_manager::{DownloadManager, ManagerState};
pub use error::{OmafError, Result};
