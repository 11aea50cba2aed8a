//! Sphere region structures (§3.3, §4.1): `Rotation`, `SphereRegion`, and the context
//! object that controls which optional fields are present when parsing a particular
//! occurrence of a sphere region (sample entry vs. static sample vs. dynamic sample).

use super::bitstream::{BitReader, BitWriter};
use crate::error::OmafError;

/// Three signed 32-bit Euler angles, each in units of 2^-16 degrees (the OMAF
/// convention for angular fixed-point fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub yaw: i32,
    pub pitch: i32,
    pub roll: i32,
}

impl Rotation {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(Rotation { yaw: r.read_i32()?, pitch: r.read_i32()?, roll: r.read_i32()? })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_i32(self.yaw);
        w.write_i32(self.pitch);
        w.write_i32(self.roll);
    }

    pub const fn size() -> usize {
        12
    }
}

/// Controls which optional fields [`SphereRegion::parse`] / [`SphereRegion::write`]
/// expect to be present, since presence is governed by an ancestor flag rather than
/// being self-describing (§4.1 "Context-dependent sizes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SphereRegionContext {
    pub has_range: bool,
    pub has_interpolate: bool,
}

impl SphereRegionContext {
    pub const NONE: SphereRegionContext =
        SphereRegionContext { has_range: false, has_interpolate: false };

    pub const fn static_range() -> Self {
        SphereRegionContext { has_range: true, has_interpolate: false }
    }

    pub const fn dynamic_with_interpolate() -> Self {
        SphereRegionContext { has_range: true, has_interpolate: true }
    }
}

/// A rectangular region on the unit sphere: centre azimuth/elevation/tilt, and
/// optionally an azimuth/elevation range and an interpolate flag. Centre tilt is
/// always present per §3.3, and like azimuth/elevation is a signed 32-bit field
/// (`SphereRegion::write`/`parse` in `commontypes.cpp` write all three via
/// `write32BitsSigned`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SphereRegion {
    pub centre_azimuth: i32,
    pub centre_elevation: i32,
    pub centre_tilt: i32,
    pub azimuth_range: Option<u32>,
    pub elevation_range: Option<u32>,
    pub interpolate: Option<bool>,
}

impl SphereRegion {
    pub fn parse(r: &mut BitReader, ctx: &SphereRegionContext) -> Result<Self, OmafError> {
        let centre_azimuth = r.read_i32()?;
        let centre_elevation = r.read_i32()?;
        let centre_tilt = r.read_i32()?;
        let (azimuth_range, elevation_range) = if ctx.has_range {
            (Some(r.read_u32()?), Some(r.read_u32()?))
        } else {
            (None, None)
        };
        let interpolate = if ctx.has_interpolate {
            let flag = r.read_bit()?;
            // 7 reserved bits follow the interpolate flag to keep this byte-aligned.
            r.read_bits(7)?;
            Some(flag)
        } else {
            None
        };
        Ok(SphereRegion { centre_azimuth, centre_elevation, centre_tilt, azimuth_range, elevation_range, interpolate })
    }

    pub fn write(&self, w: &mut BitWriter, ctx: &SphereRegionContext) {
        w.write_i32(self.centre_azimuth);
        w.write_i32(self.centre_elevation);
        w.write_i32(self.centre_tilt);
        if ctx.has_range {
            w.write_u32(self.azimuth_range.unwrap_or(0));
            w.write_u32(self.elevation_range.unwrap_or(0));
        }
        if ctx.has_interpolate {
            w.write_bit(self.interpolate.unwrap_or(false));
            w.write_bits(0, 7);
        }
    }

    pub fn size(ctx: &SphereRegionContext) -> usize {
        let mut n = 12;
        if ctx.has_range {
            n += 8;
        }
        if ctx.has_interpolate {
            n += 1;
        }
        n
    }
}
