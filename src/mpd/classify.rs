//! Adaptation-set classification (§3.1, §4.2): maps a parsed [`AdaptationSet`] to a
//! tagged [`AdaptationSetKind`] by inspecting OMAF descriptors, Preselection
//! membership, `@dependencyId`, and finally codec/mimeType as a fallback.
//!
//! §9 "Inheritance → variants": the base → sub-picture → tile, base → extractor →
//! extractor-with-dependencies / extractor-multi-resolution, base → overlay, base →
//! overlay-meta hierarchy is expressed here as one tagged enum with shared fields
//! hoisted out, dispatched on by `match` rather than virtual calls.

use super::model::{AdaptationSet, Period, Preselection, StereoRole};

/// The classification role an adaptation set plays in the stream (§3.1 `role`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdaptationSetKind {
    /// A single full-sphere or base-layer video track.
    VideoBase,
    /// A partial-coverage tile; never started/stopped/switched directly, only
    /// through the extractor that bundles it (§3.1 "Relationships").
    VideoTile,
    /// An `hvc2` extractor bundling one or more tile sets, tightly coupled via
    /// Preselection or loosely coupled via `@dependencyId`.
    VideoExtractor { binding: ExtractorBinding },
    VideoOverlay,
    Audio,
    MetadataInitialViewingOrientation,
    MetadataDynamicViewpoint,
    MetadataOverlayDynamic,
    MetadataRecommendedViewport,
    /// Audio and video muxed into one adaptation set; not decomposed further.
    Muxed,
}

/// How an extractor adaptation set is bound to its supporting tile sets (§4.2
/// "Extractor bundle binding").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorBinding {
    /// Tight coupling: the ids of the partial adaptation sets named by a
    /// Preselection descriptor.
    Preselection { partial_adaptation_set_ids: Vec<String> },
    /// Loose coupling: per-representation `@dependencyId` values, each a list of
    /// representation ids.
    Dependency { representation_ids: Vec<String> },
    /// Neither binding was resolvable; the extractor has no known supporting sets.
    Unbound,
}

const TILE_CODEC_PREFIXES: &[&str] = &["hvt1", "avc1", "hvc1"];
const EXTRACTOR_CODEC_PREFIXES: &[&str] = &["hvc2"];

fn codec_of(aset: &AdaptationSet) -> Option<&str> {
    aset.codecs
        .as_deref()
        .or_else(|| aset.representations.first().and_then(|r| r.codecs.as_deref()))
}

fn scheme_role(aset: &AdaptationSet) -> Option<AdaptationSetKind> {
    aset.essential_properties
        .iter()
        .chain(aset.supplemental_properties.iter())
        .find_map(|d| match d.schemeIdUri.as_deref() {
            Some("urn:mpeg:mpegI:omaf:2018:vrtt") if d.value.as_deref() == Some("ivo") => {
                Some(AdaptationSetKind::MetadataInitialViewingOrientation)
            }
            Some("urn:mpeg:mpegI:omaf:2018:vrtt") if d.value.as_deref() == Some("dvp") => {
                Some(AdaptationSetKind::MetadataDynamicViewpoint)
            }
            Some("urn:mpeg:mpegI:omaf:2018:ovly") if d.value.as_deref() == Some("dyn") => {
                Some(AdaptationSetKind::MetadataOverlayDynamic)
            }
            Some("urn:mpeg:mpegI:omaf:2018:rcvp") => Some(AdaptationSetKind::MetadataRecommendedViewport),
            Some("urn:mpeg:mpegI:omaf:2018:ovly") => Some(AdaptationSetKind::VideoOverlay),
            _ => None,
        })
}

fn preselection_role(aset: &AdaptationSet, preselections: &[Preselection]) -> Option<AdaptationSetKind> {
    let id = aset.id.map(|i| i.to_string())?;
    for presel in preselections {
        let (main, partials) = presel.components();
        if main == Some(id.as_str()) {
            return Some(AdaptationSetKind::VideoExtractor {
                binding: ExtractorBinding::Preselection {
                    partial_adaptation_set_ids: partials.into_iter().map(str::to_string).collect(),
                },
            });
        }
        if partials.contains(&id.as_str()) {
            return Some(AdaptationSetKind::VideoTile);
        }
    }
    None
}

/// Classifies one adaptation set per the four-step rule in §4.2: OMAF descriptors
/// first, then Preselection membership, then `@dependencyId`, then codec/mimeType.
pub fn classify(aset: &AdaptationSet, period: &Period) -> AdaptationSetKind {
    if let Some(kind) = scheme_role(aset) {
        return kind;
    }
    if let Some(kind) = preselection_role(aset, &period.preselections) {
        return kind;
    }
    if aset.has_dependency_ids() {
        let representation_ids = aset
            .representations
            .iter()
            .flat_map(|r| r.dependency_ids())
            .map(str::to_string)
            .collect();
        return AdaptationSetKind::VideoExtractor {
            binding: ExtractorBinding::Dependency { representation_ids },
        };
    }
    if let Some(ct) = &aset.contentType {
        if ct == "audio" {
            return AdaptationSetKind::Audio;
        }
    }
    if let Some(mt) = &aset.mimeType {
        if mt.starts_with("audio/") {
            return AdaptationSetKind::Audio;
        }
        if mt == "audio/mp4" {
            return AdaptationSetKind::Audio;
        }
    }
    match codec_of(aset) {
        Some(c) if EXTRACTOR_CODEC_PREFIXES.iter().any(|p| c.starts_with(p)) => {
            AdaptationSetKind::VideoExtractor { binding: ExtractorBinding::Unbound }
        }
        Some(c) if TILE_CODEC_PREFIXES.iter().any(|p| c.starts_with(p)) => {
            AdaptationSetKind::VideoTile
        }
        Some(c) if c.starts_with("mp4a") => AdaptationSetKind::Audio,
        _ => {
            if aset.content_coverage().is_some() {
                AdaptationSetKind::VideoTile
            } else {
                AdaptationSetKind::VideoBase
            }
        }
    }
}

/// Whether `force_mono` should collapse this set's stereo presentation, per §4.4 and
/// the §9 open question (kept as the source does it: silent degradation, not fixed).
pub fn should_force_mono(stereo: StereoRole, device_supports_stereo: bool) -> bool {
    !device_supports_stereo && stereo != StereoRole::Mono
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpd::model::{Descriptor, Representation};

    fn empty_aset(id: i64) -> AdaptationSet {
        AdaptationSet {
            id: Some(id),
            group: None,
            contentType: None,
            mimeType: None,
            codecs: None,
            lang: None,
            BaseURL: None,
            SegmentTemplate: None,
            representations: vec![],
            essential_properties: vec![],
            supplemental_properties: vec![],
        }
    }

    fn empty_period() -> Period {
        Period { id: None, start: None, duration: None, BaseURL: None, SegmentTemplate: None, adaptations: vec![], preselections: vec![] }
    }

    #[test]
    fn classifies_audio_by_content_type() {
        let mut a = empty_aset(1);
        a.contentType = Some("audio".to_string());
        assert_eq!(classify(&a, &empty_period()), AdaptationSetKind::Audio);
    }

    #[test]
    fn classifies_tile_by_hvt1_codec() {
        let mut a = empty_aset(2);
        a.codecs = Some("hvt1.1.6.L93.90".to_string());
        assert_eq!(classify(&a, &empty_period()), AdaptationSetKind::VideoTile);
    }

    #[test]
    fn classifies_tile_by_avc1_or_hvc1_codec_with_no_content_coverage() {
        let mut a = empty_aset(20);
        a.codecs = Some("avc1.42001e".to_string());
        assert_eq!(classify(&a, &empty_period()), AdaptationSetKind::VideoTile);

        let mut b = empty_aset(21);
        b.codecs = Some("hvc1.1.6.L93.90".to_string());
        assert_eq!(classify(&b, &empty_period()), AdaptationSetKind::VideoTile);
    }

    #[test]
    fn classifies_extractor_by_hvc2_codec() {
        let mut a = empty_aset(3);
        a.codecs = Some("hvc2.1.6.L93.90".to_string());
        assert_eq!(
            classify(&a, &empty_period()),
            AdaptationSetKind::VideoExtractor { binding: ExtractorBinding::Unbound }
        );
    }

    #[test]
    fn classifies_extractor_via_preselection_main() {
        let a = empty_aset(10);
        let mut period = empty_period();
        period.preselections.push(Preselection {
            id: Some("p1".to_string()),
            preselectionComponents: Some("10 11 12".to_string()),
            tag: None,
        });
        match classify(&a, &period) {
            AdaptationSetKind::VideoExtractor { binding: ExtractorBinding::Preselection { partial_adaptation_set_ids } } => {
                assert_eq!(partial_adaptation_set_ids, vec!["11", "12"]);
            }
            other => panic!("expected preselection extractor, got {other:?}"),
        }
    }

    #[test]
    fn classifies_tile_via_preselection_partial() {
        let a = empty_aset(11);
        let mut period = empty_period();
        period.preselections.push(Preselection {
            id: Some("p1".to_string()),
            preselectionComponents: Some("10 11 12".to_string()),
            tag: None,
        });
        assert_eq!(classify(&a, &period), AdaptationSetKind::VideoTile);
    }

    #[test]
    fn classifies_extractor_via_dependency_id() {
        let mut a = empty_aset(20);
        a.representations.push(Representation {
            id: Some("ext-1".to_string()),
            mimeType: None,
            codecs: Some("hvc2.1.6.L93.90".to_string()),
            bandwidth: None,
            width: None,
            height: None,
            frameRate: None,
            qualityRanking: None,
            dependencyId: Some("tile-1 tile-2".to_string()),
            BaseURL: None,
            SegmentTemplate: None,
            SegmentBase: None,
            SegmentList: None,
            essential_properties: vec![],
            supplemental_properties: vec![],
        });
        match classify(&a, &empty_period()) {
            AdaptationSetKind::VideoExtractor { binding: ExtractorBinding::Dependency { representation_ids } } => {
                assert_eq!(representation_ids, vec!["tile-1", "tile-2"]);
            }
            other => panic!("expected dependency extractor, got {other:?}"),
        }
    }

    #[test]
    fn metadata_scheme_classifies_initial_viewing_orientation() {
        let mut a = empty_aset(30);
        a.essential_properties.push(Descriptor {
            schemeIdUri: Some("urn:mpeg:mpegI:omaf:2018:vrtt".to_string()),
            value: Some("ivo".to_string()),
            id: None,
        });
        assert_eq!(classify(&a, &empty_period()), AdaptationSetKind::MetadataInitialViewingOrientation);
    }

    #[test]
    fn force_mono_only_when_device_lacks_stereo_support() {
        assert!(should_force_mono(StereoRole::FramePacked, false));
        assert!(!should_force_mono(StereoRole::FramePacked, true));
        assert!(!should_force_mono(StereoRole::Mono, false));
    }
}
