//! Overlay control structures (§3.3): fourteen concrete control payloads behind a
//! tagged `OverlayControl` union, `SingleOverlay` as a bit-flag record of which
//! controls are present, and `OverlayStruct` as a count + vector of overlays.
//!
//! The reference player expresses this catalogue as a class hierarchy rooted at
//! `OverlayControlFlagBase` (§9 "Dynamic dispatch in overlays"). Per the redesign
//! note, this collapses here to one record of fourteen `Option<ControlPayload>`
//! fields plus a flag-byte mask; serialisation walks the mask in declared order
//! rather than dispatching through a vtable.

use super::bitstream::{BitReader, BitWriter};
use super::sphere::{SphereRegion, SphereRegionContext};
use crate::error::OmafError;

/// A rectangle expressed relative to the rendering viewport, in units of 1/10000 of
/// viewport width/height — used by several of the fourteen control payloads below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportRelativeRegion {
    pub rect_left_percent: u16,
    pub rect_top_percent: u16,
    pub rect_width_percent: u16,
    pub rect_height_percent: u16,
}

impl ViewportRelativeRegion {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(ViewportRelativeRegion {
            rect_left_percent: r.read_u16()?,
            rect_top_percent: r.read_u16()?,
            rect_width_percent: r.read_u16()?,
            rect_height_percent: r.read_u16()?,
        })
    }

    fn write(&self, w: &mut BitWriter) {
        w.write_u16(self.rect_left_percent);
        w.write_u16(self.rect_top_percent);
        w.write_u16(self.rect_width_percent);
        w.write_u16(self.rect_height_percent);
    }

    const fn size() -> usize {
        8
    }
}

/// A region on a 2D source picture, for overlays sourced from a flat video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRegion2d {
    pub width: u32,
    pub height: u32,
    pub top: u32,
    pub left: u32,
}

impl SourceRegion2d {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(SourceRegion2d { width: r.read_u32()?, height: r.read_u32()?, top: r.read_u32()?, left: r.read_u32()? })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_u32(self.width);
        w.write_u32(self.height);
        w.write_u32(self.top);
        w.write_u32(self.left);
    }
    const fn size() -> usize {
        16
    }
}

/// The fourteen concrete overlay control payloads, in catalogue declaration order.
/// Each is a tagged variant of the shared `OverlayControl` union (§3.3 "Tagged union
/// discipline" — equality and ordering compare tag first, payload second, which
/// `#[derive(PartialEq)]` on an enum already gives us for free).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayControl {
    /// Overlay rectangle expressed relative to the viewport.
    ViewportRelative(ViewportRelativeRegion),
    /// Overlay placed on the sphere as an omnidirectional region (azimuth/elevation
    /// centre + ranges, no tilt/interpolate).
    SphereRelativeOmni(SphereRegion),
    /// Overlay placed on the sphere but rendered as a flat 2D patch at that location.
    SphereRelative2d { region: SphereRegion, depth: u32 },
    /// Source region on the originating 2D/packed picture this overlay is cut from.
    SourceRegion(SourceRegion2d),
    /// The viewport the content creator recommends for this overlay.
    RecommendedViewport(SphereRegion),
    /// Stacking order among simultaneously visible overlays; lower draws first.
    LayeringOrder(i16),
    /// Opacity in the range 0..=100.
    Opacity(u8),
    /// Whether the user may interact with (move/resize/dismiss) this overlay.
    Interaction { changeable: bool },
    /// A UTF-8 label shown alongside the overlay, e.g. in a picker UI.
    Label(String),
    /// Relative selection priority among overlays competing for a fixed display slot.
    Priority(u8),
    /// The sphere region this overlay is associated with, when it is not itself
    /// sphere-relative (e.g. a viewport-relative overlay tied to a sphere location).
    AssociatedSphereRegion(SphereRegion),
    /// Alpha-compositing blend mode, one of a small fixed set.
    AlphaCompositing(AlphaBlendMode),
    Reserved1(u32),
    Reserved2(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaBlendMode {
    SourceOver = 0,
    Premultiplied = 1,
    Luminance = 2,
}

impl AlphaBlendMode {
    fn from_tag(tag: u8) -> Self {
        match tag {
            1 => AlphaBlendMode::Premultiplied,
            2 => AlphaBlendMode::Luminance,
            _ => AlphaBlendMode::SourceOver,
        }
    }
}

/// Index of each control within the 14-bit presence mask, in declaration order.
const CONTROL_COUNT: usize = 14;

impl OverlayControl {
    fn index(&self) -> usize {
        match self {
            OverlayControl::ViewportRelative(_) => 0,
            OverlayControl::SphereRelativeOmni(_) => 1,
            OverlayControl::SphereRelative2d { .. } => 2,
            OverlayControl::SourceRegion(_) => 3,
            OverlayControl::RecommendedViewport(_) => 4,
            OverlayControl::LayeringOrder(_) => 5,
            OverlayControl::Opacity(_) => 6,
            OverlayControl::Interaction { .. } => 7,
            OverlayControl::Label(_) => 8,
            OverlayControl::Priority(_) => 9,
            OverlayControl::AssociatedSphereRegion(_) => 10,
            OverlayControl::AlphaCompositing(_) => 11,
            OverlayControl::Reserved1(_) => 12,
            OverlayControl::Reserved2(_) => 13,
        }
    }

    fn parse_at(index: usize, r: &mut BitReader) -> Result<Self, OmafError> {
        let omni_ctx = SphereRegionContext::NONE;
        Ok(match index {
            0 => OverlayControl::ViewportRelative(ViewportRelativeRegion::parse(r)?),
            1 => OverlayControl::SphereRelativeOmni(SphereRegion::parse(r, &omni_ctx)?),
            2 => OverlayControl::SphereRelative2d { region: SphereRegion::parse(r, &omni_ctx)?, depth: r.read_u32()? },
            3 => OverlayControl::SourceRegion(SourceRegion2d::parse(r)?),
            4 => OverlayControl::RecommendedViewport(SphereRegion::parse(r, &omni_ctx)?),
            5 => OverlayControl::LayeringOrder(r.read_i16()?),
            6 => OverlayControl::Opacity(r.read_u8()?),
            7 => OverlayControl::Interaction { changeable: r.read_bit()? },
            8 => OverlayControl::Label(r.read_cstring()?),
            9 => OverlayControl::Priority(r.read_u8()?),
            10 => OverlayControl::AssociatedSphereRegion(SphereRegion::parse(r, &omni_ctx)?),
            11 => OverlayControl::AlphaCompositing(AlphaBlendMode::from_tag(r.read_u8()?)),
            12 => OverlayControl::Reserved1(r.read_u32()?),
            _ => OverlayControl::Reserved2(r.read_u32()?),
        })
    }

    fn write(&self, w: &mut BitWriter) {
        let omni_ctx = SphereRegionContext::NONE;
        match self {
            OverlayControl::ViewportRelative(v) => v.write(w),
            OverlayControl::SphereRelativeOmni(v) => v.write(w, &omni_ctx),
            OverlayControl::SphereRelative2d { region, depth } => {
                region.write(w, &omni_ctx);
                w.write_u32(*depth);
            }
            OverlayControl::SourceRegion(v) => v.write(w),
            OverlayControl::RecommendedViewport(v) => v.write(w, &omni_ctx),
            OverlayControl::LayeringOrder(v) => w.write_i16(*v),
            OverlayControl::Opacity(v) => w.write_u8(*v),
            OverlayControl::Interaction { changeable } => {
                w.write_bit(*changeable);
                w.write_bits(0, 7);
            }
            OverlayControl::Label(s) => w.write_cstring(s),
            OverlayControl::Priority(v) => w.write_u8(*v),
            OverlayControl::AssociatedSphereRegion(v) => v.write(w, &omni_ctx),
            OverlayControl::AlphaCompositing(mode) => w.write_u8(*mode as u8),
            OverlayControl::Reserved1(v) | OverlayControl::Reserved2(v) => w.write_u32(*v),
        }
    }
}

/// A base flag carrying `essentialFlag` and a 2-byte size-or-zero header (zero means
/// "inherit from sample entry") shared by every control payload, plus the payload
/// itself once resolved against `numFlagBytes` bits of presence mask.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayControlEntry {
    pub essential_flag: bool,
    /// `None` means "inherit from sample entry" (size-or-zero header was zero).
    pub payload: Option<OverlayControl>,
}

/// A bit-flag record naming which of the fourteen controls are present, plus their
/// resolved payloads in declared order (§3.3 `SingleOverlay`).
#[derive(Debug, Clone, PartialEq)]
pub struct SingleOverlay {
    pub overlay_id: u16,
    pub entries: Vec<Option<OverlayControlEntry>>, // length == CONTROL_COUNT, indexed like OverlayControl::index()
}

impl SingleOverlay {
    /// `num_flag_bytes` controls how many bytes of presence mask precede the
    /// payloads — the catalogue only defines 14 controls today but the mask is
    /// deliberately wider to leave room for future controls without a version bump
    /// (mirrors `numFlagBytes` in the original format).
    pub fn parse(r: &mut BitReader, num_flag_bytes: u8) -> Result<Self, OmafError> {
        let overlay_id = r.read_u16()?;
        let total_mask_bits = num_flag_bytes as usize * 8;
        let mut present = vec![false; total_mask_bits];
        for slot in present.iter_mut() {
            *slot = r.read_bit()?;
        }
        let mut entries: Vec<Option<OverlayControlEntry>> = vec![None; CONTROL_COUNT];
        for index in 0..CONTROL_COUNT {
            if index < present.len() && present[index] {
                let essential_flag = r.read_bit()?;
                r.read_bits(7)?; // reserved
                let size_or_zero = r.read_u16()?;
                let payload = if size_or_zero == 0 {
                    None
                } else {
                    Some(OverlayControl::parse_at(index, r)?)
                };
                entries[index] = Some(OverlayControlEntry { essential_flag, payload });
            }
        }
        Ok(SingleOverlay { overlay_id, entries })
    }

    pub fn write(&self, w: &mut BitWriter, num_flag_bytes: u8) {
        w.write_u16(self.overlay_id);
        let total_mask_bits = num_flag_bytes as usize * 8;
        for index in 0..total_mask_bits {
            let present = index < self.entries.len() && self.entries[index].is_some();
            w.write_bit(present);
        }
        for index in 0..CONTROL_COUNT.min(total_mask_bits) {
            if let Some(Some(entry)) = self.entries.get(index) {
                w.write_bit(entry.essential_flag);
                w.write_bits(0, 7);
                match &entry.payload {
                    None => w.write_u16(0),
                    Some(payload) => {
                        let mut probe = BitWriter::new();
                        payload.write(&mut probe);
                        let size = probe.finish().len() as u16;
                        w.write_u16(size);
                        payload.write(w);
                    }
                }
            }
        }
    }

    pub fn num_flag_bytes_needed(&self) -> u8 {
        let highest = self.entries.iter().enumerate().filter(|(_, e)| e.is_some()).map(|(i, _)| i).max();
        match highest {
            None => 1,
            Some(i) => ((i / 8) + 1) as u8,
        }
    }
}

/// A count plus a vector of [`SingleOverlay`] values (§3.3 `OverlayStruct`).
///
/// Only one accessor is exposed for the element count (`overlays.len()`), per §9
/// "Deprecated parallel field" — the reference format additionally exposes a
/// `numOverlays`/`size` pair that mirror each other; we expose a `Vec` and derive the
/// count from it rather than storing (and risking desynchronising) both.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStruct {
    pub num_flag_bytes: u8,
    pub overlays: Vec<SingleOverlay>,
}

impl OverlayStruct {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let num_flag_bytes = r.read_u8()?;
        let count = r.read_u8()?;
        let mut overlays = Vec::with_capacity(count as usize);
        for _ in 0..count {
            overlays.push(SingleOverlay::parse(r, num_flag_bytes)?);
        }
        Ok(OverlayStruct { num_flag_bytes, overlays })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_u8(self.num_flag_bytes);
        w.write_u8(self.overlays.len() as u8);
        for overlay in &self.overlays {
            overlay.write(w, self.num_flag_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries(present: &[usize]) -> Vec<Option<OverlayControlEntry>> {
        let mut entries = vec![None; CONTROL_COUNT];
        for &index in present {
            let payload = match index {
                0 => OverlayControl::ViewportRelative(ViewportRelativeRegion {
                    rect_left_percent: 100, rect_top_percent: 200, rect_width_percent: 3000, rect_height_percent: 4000,
                }),
                5 => OverlayControl::LayeringOrder(-3),
                6 => OverlayControl::Opacity(80),
                7 => OverlayControl::Interaction { changeable: true },
                8 => OverlayControl::Label("picture-in-picture".to_string()),
                9 => OverlayControl::Priority(1),
                11 => OverlayControl::AlphaCompositing(AlphaBlendMode::Premultiplied),
                _ => OverlayControl::Reserved1(0xDEAD_BEEF),
            };
            entries[index] = Some(OverlayControlEntry { essential_flag: index % 2 == 0, payload: Some(payload) });
        }
        entries
    }

    #[test]
    fn round_trips_every_subset_size() {
        for num_flag_bytes in [1u8, 2, 3] {
            let max_k = CONTROL_COUNT.min(num_flag_bytes as usize * 8);
            for k in 0..=max_k {
                let present: Vec<usize> = (0..k).collect();
                let overlay = SingleOverlay { overlay_id: 7, entries: sample_entries(&present) };
                let mut w = BitWriter::new();
                overlay.write(&mut w, num_flag_bytes);
                let bytes = w.finish();
                let mut r = BitReader::new(&bytes);
                let parsed = SingleOverlay::parse(&mut r, num_flag_bytes).unwrap();
                assert_eq!(parsed, overlay, "num_flag_bytes={num_flag_bytes} k={k}");
            }
        }
    }

    #[test]
    fn inherited_control_has_no_payload() {
        let mut entries = vec![None; CONTROL_COUNT];
        entries[6] = Some(OverlayControlEntry { essential_flag: false, payload: None });
        let overlay = SingleOverlay { overlay_id: 1, entries };
        let mut w = BitWriter::new();
        overlay.write(&mut w, 2);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let parsed = SingleOverlay::parse(&mut r, 2).unwrap();
        assert_eq!(parsed.entries[6].as_ref().unwrap().payload, None);
    }

    #[test]
    fn overlay_struct_round_trip() {
        let a = SingleOverlay { overlay_id: 1, entries: sample_entries(&[6, 8]) };
        let b = SingleOverlay { overlay_id: 2, entries: sample_entries(&[0, 5, 11]) };
        let os = OverlayStruct { num_flag_bytes: 2, overlays: vec![a, b] };
        let mut w = BitWriter::new();
        os.write(&mut w);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(OverlayStruct::parse(&mut r).unwrap(), os);
    }
}
