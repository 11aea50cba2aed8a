//! Projected/packed picture rectangles and region-wise packing (§3.3, RWPK).

use super::bitstream::{clamp_reserved, BitReader, BitWriter};
use crate::error::OmafError;

/// A rectangle over the projected picture, in luma sample units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectedPictureRegion {
    pub width: u32,
    pub height: u32,
    pub top: u32,
    pub left: u32,
}

/// A rectangle over the packed picture, in luma sample units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedPictureRegion {
    pub width: u16,
    pub height: u16,
    pub top: u16,
    pub left: u16,
}

impl ProjectedPictureRegion {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(ProjectedPictureRegion {
            width: r.read_u32()?,
            height: r.read_u32()?,
            top: r.read_u32()?,
            left: r.read_u32()?,
        })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_u32(self.width);
        w.write_u32(self.height);
        w.write_u32(self.top);
        w.write_u32(self.left);
    }

    pub const fn size() -> usize {
        16
    }
}

impl PackedPictureRegion {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(PackedPictureRegion {
            width: r.read_u16()?,
            height: r.read_u16()?,
            top: r.read_u16()?,
            left: r.read_u16()?,
        })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_u16(self.width);
        w.write_u16(self.height);
        w.write_u16(self.top);
        w.write_u16(self.left);
    }

    pub const fn size() -> usize {
        8
    }
}

/// The eight-value transform enum applied to a packed region relative to its
/// projected source, per §3.3. Values 6 and 7 are reserved in the catalogue but are
/// round-tripped rather than rejected, per the §4.1 failure model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTransform {
    Identity = 0,
    MirrorHorizontal = 1,
    Rotate180 = 2,
    Rotate180MirrorHorizontal = 3,
    Rotate90MirrorHorizontal = 4,
    Rotate90 = 5,
    Rotate270MirrorHorizontal = 6,
    Rotate270 = 7,
}

impl RegionTransform {
    const MAX_VALID: u8 = 7;
    const RESERVED: u8 = 7;

    pub fn from_tag(tag: u8) -> Self {
        match clamp_reserved(tag, Self::MAX_VALID, Self::RESERVED) {
            0 => RegionTransform::Identity,
            1 => RegionTransform::MirrorHorizontal,
            2 => RegionTransform::Rotate180,
            3 => RegionTransform::Rotate180MirrorHorizontal,
            4 => RegionTransform::Rotate90MirrorHorizontal,
            5 => RegionTransform::Rotate90,
            6 => RegionTransform::Rotate270MirrorHorizontal,
            _ => RegionTransform::Rotate270,
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }
}

/// An optional guard band around a packed region, carrying its thickness on each side
/// in luma samples and whether the band content is usable for blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardBand {
    pub left: u8,
    pub right: u8,
    pub top: u8,
    pub bottom: u8,
    pub not_used_for_pred_flag: bool,
}

impl GuardBand {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let left = r.read_u8()?;
        let right = r.read_u8()?;
        let top = r.read_u8()?;
        let bottom = r.read_u8()?;
        let not_used_for_pred_flag = r.read_bit()?;
        r.read_bits(7)?; // reserved
        Ok(GuardBand { left, right, top, bottom, not_used_for_pred_flag })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_u8(self.left);
        w.write_u8(self.right);
        w.write_u8(self.top);
        w.write_u8(self.bottom);
        w.write_bit(self.not_used_for_pred_flag);
        w.write_bits(0, 7);
    }

    pub const fn size() -> usize {
        5
    }
}

/// One projected/packed region pair within a [`RegionWisePacking`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPair {
    pub projected: ProjectedPictureRegion,
    pub packed: PackedPictureRegion,
    pub transform: RegionTransform,
    pub guard_band: Option<GuardBand>,
}

impl RegionPair {
    pub fn parse(r: &mut BitReader, has_guard_bands: bool) -> Result<Self, OmafError> {
        let projected = ProjectedPictureRegion::parse(r)?;
        let transform = RegionTransform::from_tag(r.read_bits(3)? as u8);
        r.read_bits(5)?; // reserved
        let packed = PackedPictureRegion::parse(r)?;
        let guard_band = if has_guard_bands { Some(GuardBand::parse(r)?) } else { None };
        Ok(RegionPair { projected, packed, transform, guard_band })
    }

    pub fn write(&self, w: &mut BitWriter, has_guard_bands: bool) {
        self.projected.write(w);
        w.write_bits(self.transform.tag() as u64, 3);
        w.write_bits(0, 5);
        self.packed.write(w);
        if has_guard_bands {
            if let Some(gb) = &self.guard_band {
                gb.write(w);
            } else {
                GuardBand { left: 0, right: 0, top: 0, bottom: 0, not_used_for_pred_flag: false }.write(w);
            }
        }
    }

    pub fn size(has_guard_bands: bool) -> usize {
        ProjectedPictureRegion::size() + 1 + PackedPictureRegion::size()
            + if has_guard_bands { GuardBand::size() } else { 0 }
    }
}

/// Maps a projected picture onto a packed picture via a list of rectangular region
/// pairs, each with an optional guard band (§3.3 "Region-wise packing").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionWisePacking {
    pub constituent_picture_matching: bool,
    pub projected_picture_width: u32,
    pub projected_picture_height: u32,
    pub packed_picture_width: u16,
    pub packed_picture_height: u16,
    pub has_guard_bands: bool,
    pub regions: Vec<RegionPair>,
}

impl RegionWisePacking {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let constituent_picture_matching = r.read_bit()?;
        r.read_bits(7)?; // reserved
        let num_regions = r.read_u8()?;
        let projected_picture_width = r.read_u32()?;
        let projected_picture_height = r.read_u32()?;
        let packed_picture_width = r.read_u16()?;
        let packed_picture_height = r.read_u16()?;
        let has_guard_bands = r.read_bit()?;
        r.read_bits(7)?; // reserved
        let mut regions = Vec::with_capacity(num_regions as usize);
        for _ in 0..num_regions {
            regions.push(RegionPair::parse(r, has_guard_bands)?);
        }
        Ok(RegionWisePacking {
            constituent_picture_matching,
            projected_picture_width,
            projected_picture_height,
            packed_picture_width,
            packed_picture_height,
            has_guard_bands,
            regions,
        })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_bit(self.constituent_picture_matching);
        w.write_bits(0, 7);
        w.write_u8(self.regions.len() as u8);
        w.write_u32(self.projected_picture_width);
        w.write_u32(self.projected_picture_height);
        w.write_u16(self.packed_picture_width);
        w.write_u16(self.packed_picture_height);
        w.write_bit(self.has_guard_bands);
        w.write_bits(0, 7);
        for region in &self.regions {
            region.write(w, self.has_guard_bands);
        }
    }

    pub fn size(&self) -> usize {
        12 + self.regions.iter().map(|_| RegionPair::size(self.has_guard_bands)).sum::<usize>()
    }
}
