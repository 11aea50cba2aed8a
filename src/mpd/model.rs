//! The parsed MPD manifest tree (§3.1, §6.2): `MPD` → `Period` → `AdaptationSet` →
//! `Representation` → `SegmentTemplate`/`SegmentBase`/`SegmentList`, extended with the
//! OMAF descriptors this engine needs: `EssentialProperty`/`SupplementalProperty`,
//! `Preselection`, content coverage, and `@dependencyId`.
//!
//! Struct shape and the `quick_xml::de::from_str` entry point follow the teacher's
//! single-file model; fields this engine never reads (captions, DRM robustness
//! strings, XLink actuate semantics) are dropped rather than carried as dead weight.

use serde::Deserialize;
use std::time::Duration;

use crate::error::OmafError;

pub(crate) fn parse_xs_duration(s: &str) -> Result<Duration, OmafError> {
    match iso8601::duration(s) {
        Ok(iso8601::Duration::Weeks(w)) => Ok(Duration::new(w as u64 * 60 * 60 * 24 * 7, 0)),
        Ok(iso8601::Duration::YMDHMS { year, month, day, hour, minute, second, millisecond }) => {
            let mut secs: u64 = second.into();
            secs += minute as u64 * 60;
            secs += hour as u64 * 60 * 60;
            secs += day as u64 * 60 * 60 * 24;
            secs += month as u64 * 60 * 60 * 24 * 31;
            secs += year as u64 * 60 * 60 * 24 * 31 * 365;
            Ok(Duration::new(secs, millisecond * 1_000_000))
        }
        Err(e) => Err(OmafError::Config(format!("couldn't parse xs:duration {s}: {e:?}"))),
    }
}

fn deserialize_xs_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    match <Option<String>>::deserialize(deserializer) {
        Ok(Some(s)) => parse_xs_duration(&s).map(Some).map_err(serde::de::Error::custom),
        Ok(None) => Ok(None),
        Err(_) => Ok(None),
    }
}

/// An OMAF/DASH descriptor (`EssentialProperty` or `SupplementalProperty`), the
/// vehicle for content coverage, projection, RWPK reference, and viewpoint binding
/// (§6.2: `urn:mpeg:omaf:cc:2018`, `urn:mpeg:mpegI:omaf:2018:vrtt`,
/// `urn:mpeg:mpegI:omaf:2018:rwpk`).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Descriptor {
    pub schemeIdUri: Option<String>,
    pub value: Option<String>,
    pub id: Option<String>,
}

/// A `Preselection` descriptor (§6.2): names a main adaptation set plus the partial
/// (tile) adaptation sets it depends on.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Preselection {
    pub id: Option<String>,
    /// Space-separated adaptation-set ids; first is the main set, rest are partial.
    pub preselectionComponents: Option<String>,
    pub tag: Option<String>,
}

impl Preselection {
    /// Splits `preselectionComponents` into (main id, partial ids), per §3.1.
    pub fn components(&self) -> (Option<&str>, Vec<&str>) {
        let Some(raw) = self.preselectionComponents.as_deref() else {
            return (None, Vec::new());
        };
        let mut parts = raw.split_whitespace();
        let main = parts.next();
        (main, parts.collect())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct S {
    pub t: Option<i64>,
    pub d: i64,
    pub r: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SegmentTimeline {
    #[serde(rename = "S")]
    pub segments: Vec<S>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Initialization {
    pub sourceURL: Option<String>,
    pub range: Option<String>,
}

/// A URL factory from (representation id, bandwidth, segment number/time) to a
/// concrete media segment URL, plus an init-segment URL (§3.2).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SegmentTemplate {
    pub initialization: Option<String>,
    pub media: Option<String>,
    pub index: Option<String>,
    pub SegmentTimeline: Option<SegmentTimeline>,
    pub startNumber: Option<u64>,
    pub duration: Option<u64>,
    pub timescale: Option<u64>,
    pub presentationTimeOffset: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BaseURL {
    #[serde(rename = "$value")]
    pub base: String,
    pub serviceLocation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SegmentBase {
    #[serde(rename = "Initialization")]
    pub initialization: Option<Initialization>,
    pub timescale: Option<u64>,
    pub presentationTimeOffset: Option<u64>,
    pub indexRange: Option<String>,
    pub indexRangeExact: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SegmentURL {
    pub media: Option<String>,
    pub mediaRange: Option<String>,
    pub index: Option<String>,
    pub indexRange: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SegmentList {
    pub duration: Option<u64>,
    pub Initialization: Option<Initialization>,
    #[serde(rename = "SegmentURL")]
    pub segment_urls: Vec<SegmentURL>,
}

/// A version of the content at a specific bitrate/resolution/codec (§3.1).
///
/// Carries the OMAF additions `dependencyId` (loose-coupling extractor binding,
/// §4.2) and `qualityRanking` on top of the teacher's DASH fields.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Representation {
    pub id: Option<String>,
    pub mimeType: Option<String>,
    pub codecs: Option<String>,
    pub bandwidth: Option<u64>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub frameRate: Option<String>,
    pub qualityRanking: Option<u32>,
    /// Space-separated representation ids this representation depends on
    /// (§3.1 "loose coupling", §4.2 classification rule 3).
    pub dependencyId: Option<String>,
    pub BaseURL: Option<BaseURL>,
    pub SegmentTemplate: Option<SegmentTemplate>,
    pub SegmentBase: Option<SegmentBase>,
    pub SegmentList: Option<SegmentList>,
    #[serde(rename = "EssentialProperty", default)]
    pub essential_properties: Vec<Descriptor>,
    #[serde(rename = "SupplementalProperty", default)]
    pub supplemental_properties: Vec<Descriptor>,
}

impl Representation {
    /// Parses `dependencyId` into its component representation ids.
    pub fn dependency_ids(&self) -> Vec<&str> {
        self.dependencyId.as_deref().map(|s| s.split_whitespace().collect()).unwrap_or_default()
    }
}

/// A group of interchangeable (or, for OMAF tiles/extractors, cooperating)
/// representations (§3.1). Classification into an [`crate::mpd::classify::AdaptationSetKind`]
/// happens after parsing; this struct carries only what is present on the wire.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AdaptationSet {
    pub id: Option<i64>,
    pub group: Option<i64>,
    pub contentType: Option<String>,
    pub mimeType: Option<String>,
    pub codecs: Option<String>,
    pub lang: Option<String>,
    pub BaseURL: Option<BaseURL>,
    pub SegmentTemplate: Option<SegmentTemplate>,
    #[serde(rename = "Representation", default)]
    pub representations: Vec<Representation>,
    #[serde(rename = "EssentialProperty", default)]
    pub essential_properties: Vec<Descriptor>,
    #[serde(rename = "SupplementalProperty", default)]
    pub supplemental_properties: Vec<Descriptor>,
}

impl AdaptationSet {
    /// Content coverage rectangle from `urn:mpeg:omaf:cc:2018`, if present, parsed
    /// from its `@value` (`az,el,az_range,el_range,shape,view_idc` per OMAF §3.1).
    pub fn content_coverage(&self) -> Option<ContentCoverage> {
        self.essential_properties
            .iter()
            .chain(self.supplemental_properties.iter())
            .find(|d| d.schemeIdUri.as_deref() == Some("urn:mpeg:omaf:cc:2018"))
            .and_then(|d| d.value.as_deref())
            .and_then(ContentCoverage::parse)
    }

    /// Projection type from the OMAF projection-format descriptor, defaulting to
    /// equirectangular when absent (§3.1: `projection` defaults when unspecified).
    pub fn projection(&self) -> Projection {
        self.essential_properties
            .iter()
            .chain(self.supplemental_properties.iter())
            .find(|d| d.schemeIdUri.as_deref() == Some("urn:mpeg:mpegI:omaf:2018:pf"))
            .and_then(|d| d.value.as_deref())
            .map(|v| if v.trim() == "1" { Projection::Cubemap } else { Projection::Equirectangular })
            .unwrap_or(Projection::Equirectangular)
    }

    pub fn stereo_role(&self) -> StereoRole {
        self.essential_properties
            .iter()
            .chain(self.supplemental_properties.iter())
            .find(|d| d.schemeIdUri.as_deref() == Some("urn:mpeg:mpegI:omaf:2018:fovc"))
            .and_then(|d| d.value.as_deref())
            .map(StereoRole::parse)
            .unwrap_or(StereoRole::Mono)
    }

    /// True if any representation carries `@dependencyId` (§4.2 classification rule 3).
    pub fn has_dependency_ids(&self) -> bool {
        self.representations.iter().any(|r| r.dependencyId.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Equirectangular,
    Cubemap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoRole {
    Mono,
    Left,
    Right,
    FramePacked,
}

impl StereoRole {
    fn parse(v: &str) -> Self {
        match v.trim() {
            "1" => StereoRole::Left,
            "2" => StereoRole::Right,
            "3" => StereoRole::FramePacked,
            _ => StereoRole::Mono,
        }
    }
}

/// A spherical viewport rectangle: centre azimuth/elevation plus azimuth/elevation
/// range, all in units of 2^-16 degrees matching [`crate::omaf::SphereRegion`] (§3.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentCoverage {
    pub centre_azimuth: i32,
    pub centre_elevation: i32,
    pub azimuth_range: u32,
    pub elevation_range: u32,
}

impl ContentCoverage {
    fn parse(value: &str) -> Option<Self> {
        let fields: Vec<&str> = value.split(',').collect();
        if fields.len() < 4 {
            return None;
        }
        Some(ContentCoverage {
            centre_azimuth: fields[0].trim().parse().ok()?,
            centre_elevation: fields[1].trim().parse().ok()?,
            azimuth_range: fields[2].trim().parse().ok()?,
            elevation_range: fields[3].trim().parse().ok()?,
        })
    }
}

/// A chunk of the timeline with its own adaptation sets (§3.1). Only `periods[0]` is
/// honored, per §9's open question resolution (recorded in DESIGN.md).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Period {
    pub id: Option<String>,
    pub start: Option<String>,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_xs_duration")]
    pub duration: Option<Duration>,
    pub BaseURL: Option<BaseURL>,
    pub SegmentTemplate: Option<SegmentTemplate>,
    #[serde(rename = "AdaptationSet", default)]
    pub adaptations: Vec<AdaptationSet>,
    #[serde(rename = "Preselection", default)]
    pub preselections: Vec<Preselection>,
}

/// The root of a parsed DASH MPD manifest (§3.1). Carries `@type`
/// (`static`/`dynamic`), refresh timing, and the profile set; at least one supported
/// ISO-BMFF profile should be present (§3.1's invariant is enforced as a warning, not
/// a parse failure, matching the teacher's permissive parsing style).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MPD {
    #[serde(rename = "type")]
    pub mpdtype: Option<String>,
    pub profiles: Option<String>,
    pub minimumUpdatePeriod: Option<String>,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_xs_duration")]
    pub mediaPresentationDuration: Option<Duration>,
    pub publishTime: Option<String>,
    pub availabilityStartTime: Option<String>,
    #[serde(rename = "Period")]
    pub periods: Vec<Period>,
    #[serde(rename = "BaseURL")]
    pub base_urls: Option<Vec<BaseURL>>,
}

const SUPPORTED_PROFILES: &[&str] = &[
    "urn:mpeg:dash:profile:isoff-live:2011",
    "urn:mpeg:dash:profile:isoff-on-demand:2011",
    "urn:mpeg:dash:profile:isoff-main:2011",
    "urn:mpeg:dash:profile:full:2011",
];

impl MPD {
    /// `true` if this MPD's `@type` is `dynamic` (live/OTT), per §3.1.
    pub fn is_dynamic(&self) -> bool {
        self.mpdtype.as_deref() == Some("dynamic")
    }

    /// Warns-but-proceeds if no supported ISO-BMFF profile is declared, matching
    /// §3.1's invariant: "must be present or the core raises a warning but proceeds".
    pub fn has_supported_profile(&self) -> bool {
        match &self.profiles {
            None => false,
            Some(raw) => raw.split(',').any(|p| SUPPORTED_PROFILES.contains(&p.trim())),
        }
    }

    /// Only `periods[0]` is honored (§9 open question, resolved: kept as the source
    /// does it).
    pub fn first_period(&self) -> Option<&Period> {
        self.periods.first()
    }
}

/// Parses a raw MPD XML document into an [`MPD`] tree, logging (not failing) when the
/// declared profile set is unrecognised.
pub fn parse(xml: &str) -> Result<MPD, OmafError> {
    let mpd: MPD = quick_xml::de::from_str(xml).map_err(OmafError::from)?;
    if !mpd.has_supported_profile() {
        tracing::warn!(profiles = ?mpd.profiles, "MPD declares no recognised ISO-BMFF profile, proceeding anyway");
    }
    Ok(mpd)
}
