//! Round-trip property tests (§8 "Round-trip property tests"): arbitrary subsets of
//! the overlay catalogue and arbitrary dynamic-viewpoint sample contents, rather than
//! the handful of fixed cases exercised by the unit tests alongside each type.

use omaf_dash::omaf::bitstream::{BitReader, BitWriter};
use omaf_dash::omaf::overlay::{
    AlphaBlendMode, OverlayControl, OverlayControlEntry, OverlayStruct, SingleOverlay, SourceRegion2d,
    ViewportRelativeRegion,
};
use omaf_dash::omaf::sphere::Rotation;
use omaf_dash::omaf::viewpoint::{GeomagneticInfo, GpsPosition, Position, Viewpoint, ViewpointPresence};
use proptest::prelude::*;

const CONTROL_COUNT: usize = 14;

/// Builds a representative payload for control `index`, parameterised on a few
/// `proptest`-chosen scalars so the payload itself varies, not just its presence.
fn payload_for(index: usize, seed: u32) -> OverlayControl {
    match index {
        0 => OverlayControl::ViewportRelative(ViewportRelativeRegion {
            rect_left_percent: (seed % 10_000) as u16,
            rect_top_percent: (seed % 5_000) as u16,
            rect_width_percent: 3000,
            rect_height_percent: 4000,
        }),
        3 => OverlayControl::SourceRegion(SourceRegion2d { width: seed, height: seed / 2, top: 0, left: 0 }),
        5 => OverlayControl::LayeringOrder((seed % 1000) as i16 - 500),
        6 => OverlayControl::Opacity((seed % 101) as u8),
        7 => OverlayControl::Interaction { changeable: seed % 2 == 0 },
        8 => OverlayControl::Label(format!("overlay-{seed}")),
        9 => OverlayControl::Priority((seed % 256) as u8),
        11 => OverlayControl::AlphaCompositing(match seed % 3 {
            0 => AlphaBlendMode::SourceOver,
            1 => AlphaBlendMode::Premultiplied,
            _ => AlphaBlendMode::Luminance,
        }),
        _ => OverlayControl::Reserved1(seed),
    }
}

fn overlay_with_subset(overlay_id: u16, present: &[bool], seed: u32) -> SingleOverlay {
    let mut entries: Vec<Option<OverlayControlEntry>> = vec![None; CONTROL_COUNT];
    for (index, &is_present) in present.iter().enumerate() {
        if is_present {
            entries[index] = Some(OverlayControlEntry {
                essential_flag: (seed as usize + index) % 2 == 0,
                payload: Some(payload_for(index, seed.wrapping_add(index as u32))),
            });
        }
    }
    SingleOverlay { overlay_id, entries }
}

proptest! {
    /// §8: "Overlay struct with every subset of the 14 controls and a random
    /// `numFlagBytes ∈ {1,2,3}` round-trips" — unlike the contiguous-prefix subsets the
    /// unit tests exercise, this picks an arbitrary (possibly non-contiguous) subset.
    #[test]
    fn arbitrary_subset_of_controls_round_trips(
        num_flag_bytes in 1u8..=3,
        overlay_id in any::<u16>(),
        seed in any::<u32>(),
        raw_present in prop::collection::vec(any::<bool>(), CONTROL_COUNT),
    ) {
        let max_index = (num_flag_bytes as usize * 8).min(CONTROL_COUNT);
        let mut present = raw_present;
        for slot in present.iter_mut().skip(max_index) {
            *slot = false;
        }

        let overlay = overlay_with_subset(overlay_id, &present, seed);
        let mut w = BitWriter::new();
        overlay.write(&mut w, num_flag_bytes);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let parsed = SingleOverlay::parse(&mut r, num_flag_bytes).unwrap();
        prop_assert_eq!(parsed, overlay);
    }

    /// Same property one level up: a whole `OverlayStruct` of several overlays, each
    /// with its own arbitrary subset, still round-trips.
    #[test]
    fn overlay_struct_with_arbitrary_subsets_round_trips(
        num_flag_bytes in 1u8..=3,
        seeds in prop::collection::vec(any::<u32>(), 1..4),
        presents in prop::collection::vec(prop::collection::vec(any::<bool>(), CONTROL_COUNT), 1..4),
    ) {
        let max_index = (num_flag_bytes as usize * 8).min(CONTROL_COUNT);
        let n = seeds.len().min(presents.len());
        let overlays: Vec<SingleOverlay> = (0..n)
            .map(|i| {
                let mut present = presents[i].clone();
                for slot in present.iter_mut().skip(max_index) {
                    *slot = false;
                }
                overlay_with_subset(i as u16, &present, seeds[i])
            })
            .collect();
        let os = OverlayStruct { num_flag_bytes, overlays };

        let mut w = BitWriter::new();
        os.write(&mut w);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        prop_assert_eq!(OverlayStruct::parse(&mut r).unwrap(), os);
    }

    /// §8: "Dynamic viewpoint sample with randomly chosen context flags round-trips" —
    /// the existing unit test exhaustively covers the 32 presence combinations; this
    /// additionally randomises the scalar contents of every present field.
    #[test]
    fn dynamic_viewpoint_round_trips_with_random_fields(
        gps_present in any::<bool>(),
        geomagnetic_present in any::<bool>(),
        px in any::<i32>(), py in any::<i32>(), pz in any::<i32>(),
        yaw in any::<i32>(), pitch in any::<i32>(), roll in any::<i32>(),
        lat in any::<i32>(), lon in any::<i32>(), alt in any::<i32>(),
        geomagnetic_yaw in any::<i32>(),
    ) {
        let presence = ViewpointPresence {
            gps: gps_present,
            geomagnetic: geomagnetic_present,
            group: false,
            switching: false,
            looping: false,
        };
        let viewpoint = Viewpoint {
            position: Position { x: px, y: py, z: pz },
            global_rotation: Rotation { yaw, pitch, roll },
            gps: gps_present.then_some(GpsPosition { latitude: lat, longitude: lon, altitude: alt }),
            geomagnetic: geomagnetic_present.then_some(GeomagneticInfo { yaw: geomagnetic_yaw }),
            group: None,
            switching: None,
            looping: None,
        };

        let mut w = BitWriter::new();
        viewpoint.write_dynamic(&mut w);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let parsed = Viewpoint::parse_dynamic(&mut r, &presence).unwrap();
        prop_assert_eq!(parsed, viewpoint);
    }
}
