//! Viewpoint structures (§3.3): a static `Viewpoint`, its dynamic per-sample delta,
//! and the viewpoint switching list.

use super::bitstream::{clamp_reserved, BitReader, BitWriter};
use super::sphere::Rotation;
use crate::error::OmafError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(Position { x: r.read_i32()?, y: r.read_i32()?, z: r.read_i32()? })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_i32(self.x);
        w.write_i32(self.y);
        w.write_i32(self.z);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsPosition {
    pub latitude: i32,
    pub longitude: i32,
    pub altitude: i32,
}

impl GpsPosition {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(GpsPosition { latitude: r.read_i32()?, longitude: r.read_i32()?, altitude: r.read_i32()? })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_i32(self.latitude);
        w.write_i32(self.longitude);
        w.write_i32(self.altitude);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeomagneticInfo {
    pub yaw: i32,
}

impl GeomagneticInfo {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(GeomagneticInfo { yaw: r.read_i32()? })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_i32(self.yaw);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewpointGroup {
    pub group_id: u8,
    pub description: Option<String>,
}

impl ViewpointGroup {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let group_id = r.read_u8()?;
        let has_description = r.read_bit()?;
        r.read_bits(7)?;
        let description = if has_description { Some(r.read_cstring()?) } else { None };
        Ok(ViewpointGroup { group_id, description })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_u8(self.group_id);
        w.write_bit(self.description.is_some());
        w.write_bits(0, 7);
        if let Some(d) = &self.description {
            w.write_cstring(d);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopingDescriptor {
    pub loop_count: i16, // -1 means infinite
}

impl LoopingDescriptor {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(LoopingDescriptor { loop_count: r.read_i16()? })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_i16(self.loop_count);
    }
}

/// Four variants controlling how a switch affects viewing orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewingOrientationMode {
    Unchanged = 0,
    RelativeToDestination = 1,
    MappedToDestination = 2,
    Reserved = 3,
}

impl ViewingOrientationMode {
    fn from_tag(tag: u8) -> Self {
        match clamp_reserved(tag, 3, 3) {
            0 => ViewingOrientationMode::Unchanged,
            1 => ViewingOrientationMode::RelativeToDestination,
            2 => ViewingOrientationMode::MappedToDestination,
            _ => ViewingOrientationMode::Reserved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSwitch {
    pub min_time_us: u32,
    pub max_time_us: u32,
    /// `true` ⇒ `offset_us` is relative to the switch trigger; `false` ⇒ absolute.
    pub offset_is_relative: bool,
    pub offset_us: i32,
}

impl TimelineSwitch {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        Ok(TimelineSwitch {
            min_time_us: r.read_u32()?,
            max_time_us: r.read_u32()?,
            offset_is_relative: r.read_bit()?,
            offset_us: { r.read_bits(7)?; r.read_i32()? },
        })
    }
    fn write(&self, w: &mut BitWriter) {
        w.write_u32(self.min_time_us);
        w.write_u32(self.max_time_us);
        w.write_bit(self.offset_is_relative);
        w.write_bits(0, 7);
        w.write_i32(self.offset_us);
    }
}

/// Seven transition-effect variants; two carry a payload (video-track-id or URL).
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionEffect {
    None,
    CrossFade,
    WipeLeft,
    WipeRight,
    Zoom,
    VideoTrack(u32),
    Url(String),
}

impl TransitionEffect {
    fn tag(&self) -> u8 {
        match self {
            TransitionEffect::None => 0,
            TransitionEffect::CrossFade => 1,
            TransitionEffect::WipeLeft => 2,
            TransitionEffect::WipeRight => 3,
            TransitionEffect::Zoom => 4,
            TransitionEffect::VideoTrack(_) => 5,
            TransitionEffect::Url(_) => 6,
        }
    }

    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let tag = clamp_reserved(r.read_u8()?, 6, 0);
        Ok(match tag {
            1 => TransitionEffect::CrossFade,
            2 => TransitionEffect::WipeLeft,
            3 => TransitionEffect::WipeRight,
            4 => TransitionEffect::Zoom,
            5 => TransitionEffect::VideoTrack(r.read_u32()?),
            6 => TransitionEffect::Url(r.read_cstring()?),
            _ => TransitionEffect::None,
        })
    }

    fn write(&self, w: &mut BitWriter) {
        w.write_u8(self.tag());
        match self {
            TransitionEffect::VideoTrack(id) => w.write_u32(*id),
            TransitionEffect::Url(url) => w.write_cstring(url),
            _ => {}
        }
    }
}

/// A switch region naming where on screen/sphere the switch hotspot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchRegion {
    ViewportRelative { left_percent: u16, top_percent: u16, width_percent: u16, height_percent: u16 },
    SphereRelative { centre_azimuth: i32, centre_elevation: i32, azimuth_range: u32, elevation_range: u32 },
    OverlayId(u16),
}

impl SwitchRegion {
    fn tag(&self) -> u8 {
        match self {
            SwitchRegion::ViewportRelative { .. } => 0,
            SwitchRegion::SphereRelative { .. } => 1,
            SwitchRegion::OverlayId(_) => 2,
        }
    }

    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        match clamp_reserved(r.read_u8()?, 2, 2) {
            0 => Ok(SwitchRegion::ViewportRelative {
                left_percent: r.read_u16()?,
                top_percent: r.read_u16()?,
                width_percent: r.read_u16()?,
                height_percent: r.read_u16()?,
            }),
            1 => Ok(SwitchRegion::SphereRelative {
                centre_azimuth: r.read_i32()?,
                centre_elevation: r.read_i32()?,
                azimuth_range: r.read_u32()?,
                elevation_range: r.read_u32()?,
            }),
            _ => Ok(SwitchRegion::OverlayId(r.read_u16()?)),
        }
    }

    fn write(&self, w: &mut BitWriter) {
        w.write_u8(self.tag());
        match self {
            SwitchRegion::ViewportRelative { left_percent, top_percent, width_percent, height_percent } => {
                w.write_u16(*left_percent);
                w.write_u16(*top_percent);
                w.write_u16(*width_percent);
                w.write_u16(*height_percent);
            }
            SwitchRegion::SphereRelative { centre_azimuth, centre_elevation, azimuth_range, elevation_range } => {
                w.write_i32(*centre_azimuth);
                w.write_i32(*centre_elevation);
                w.write_u32(*azimuth_range);
                w.write_u32(*elevation_range);
            }
            SwitchRegion::OverlayId(id) => w.write_u16(*id),
        }
    }
}

/// One entry in a [`ViewpointSwitchingList`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewpointSwitchRecord {
    pub destination_viewpoint_id: u32,
    pub viewing_orientation_mode: Option<ViewingOrientationMode>,
    pub timeline_switch: Option<TimelineSwitch>,
    pub transition_effect: Option<TransitionEffect>,
    pub switch_regions: Vec<SwitchRegion>,
}

impl ViewpointSwitchRecord {
    fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let destination_viewpoint_id = r.read_u32()?;
        let has_orientation = r.read_bit()?;
        let has_timeline = r.read_bit()?;
        let has_transition = r.read_bit()?;
        r.read_bits(5)?; // reserved
        let viewing_orientation_mode =
            if has_orientation { Some(ViewingOrientationMode::from_tag(r.read_bits(2)? as u8)) } else { None };
        if has_orientation {
            r.read_bits(6)?; // pad orientation mode to a byte
        }
        let timeline_switch = if has_timeline { Some(TimelineSwitch::parse(r)?) } else { None };
        let transition_effect = if has_transition { Some(TransitionEffect::parse(r)?) } else { None };
        let n_regions = r.read_u8()?;
        let mut switch_regions = Vec::with_capacity(n_regions as usize);
        for _ in 0..n_regions {
            switch_regions.push(SwitchRegion::parse(r)?);
        }
        Ok(ViewpointSwitchRecord {
            destination_viewpoint_id,
            viewing_orientation_mode,
            timeline_switch,
            transition_effect,
            switch_regions,
        })
    }

    fn write(&self, w: &mut BitWriter) {
        w.write_u32(self.destination_viewpoint_id);
        w.write_bit(self.viewing_orientation_mode.is_some());
        w.write_bit(self.timeline_switch.is_some());
        w.write_bit(self.transition_effect.is_some());
        w.write_bits(0, 5);
        if let Some(mode) = &self.viewing_orientation_mode {
            w.write_bits(*mode as u64, 2);
            w.write_bits(0, 6);
        }
        if let Some(t) = &self.timeline_switch {
            t.write(w);
        }
        if let Some(t) = &self.transition_effect {
            t.write(w);
        }
        w.write_u8(self.switch_regions.len() as u8);
        for region in &self.switch_regions {
            region.write(w);
        }
    }
}

/// An array of [`ViewpointSwitchRecord`]s (§3.3 "Viewpoint switching list").
#[derive(Debug, Clone, PartialEq)]
pub struct ViewpointSwitchingList {
    pub records: Vec<ViewpointSwitchRecord>,
}

impl ViewpointSwitchingList {
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let count = r.read_u8()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            records.push(ViewpointSwitchRecord::parse(r)?);
        }
        Ok(ViewpointSwitchingList { records })
    }

    pub fn write(&self, w: &mut BitWriter) {
        w.write_u8(self.records.len() as u8);
        for record in &self.records {
            record.write(w);
        }
    }
}

/// Which optional fields are present in a static `Viewpoint` value, or (when parsing
/// a dynamic per-sample delta) which fields the sample entry declared as "dynamic"
/// and therefore present per-sample. `parse_dynamic` requires this context to be
/// derived from the sample entry, per §3.3.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewpointPresence {
    pub gps: bool,
    pub geomagnetic: bool,
    pub group: bool,
    pub switching: bool,
    pub looping: bool,
}

/// A camera position in the virtual scene; an asset may offer several switchable
/// viewpoints (§3.3 `Viewpoint`, GLOSSARY).
#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    pub position: Position,
    pub global_rotation: Rotation,
    pub gps: Option<GpsPosition>,
    pub geomagnetic: Option<GeomagneticInfo>,
    pub group: Option<ViewpointGroup>,
    pub switching: Option<ViewpointSwitchingList>,
    pub looping: Option<LoopingDescriptor>,
}

impl Viewpoint {
    /// Parses a self-describing (sample-entry) viewpoint: every optional field
    /// carries its own presence bit inline.
    pub fn parse(r: &mut BitReader) -> Result<Self, OmafError> {
        let position = Position::parse(r)?;
        let global_rotation = Rotation::parse(r)?;
        let has_gps = r.read_bit()?;
        let has_geomagnetic = r.read_bit()?;
        let has_group = r.read_bit()?;
        let has_switching = r.read_bit()?;
        let has_looping = r.read_bit()?;
        r.read_bits(3)?; // reserved
        Self::parse_body(r, has_gps, has_geomagnetic, has_group, has_switching, has_looping, position, global_rotation)
    }

    pub fn write(&self, w: &mut BitWriter) {
        self.position.write(w);
        self.global_rotation.write(w);
        w.write_bit(self.gps.is_some());
        w.write_bit(self.geomagnetic.is_some());
        w.write_bit(self.group.is_some());
        w.write_bit(self.switching.is_some());
        w.write_bit(self.looping.is_some());
        w.write_bits(0, 3);
        self.write_body(w);
    }

    /// Parses a dynamic per-sample delta: each field is present if and only if the
    /// corresponding flag in `presence` (derived from the sample entry) is set —
    /// there is no inline presence bit for a dynamic sample (§3.3).
    pub fn parse_dynamic(r: &mut BitReader, presence: &ViewpointPresence) -> Result<Self, OmafError> {
        let position = Position::parse(r)?;
        let global_rotation = Rotation::parse(r)?;
        Self::parse_body(
            r,
            presence.gps,
            presence.geomagnetic,
            presence.group,
            presence.switching,
            presence.looping,
            position,
            global_rotation,
        )
    }

    pub fn write_dynamic(&self, w: &mut BitWriter) {
        self.position.write(w);
        self.global_rotation.write(w);
        self.write_body(w);
    }

    fn parse_body(
        r: &mut BitReader,
        has_gps: bool,
        has_geomagnetic: bool,
        has_group: bool,
        has_switching: bool,
        has_looping: bool,
        position: Position,
        global_rotation: Rotation,
    ) -> Result<Self, OmafError> {
        let gps = if has_gps { Some(GpsPosition::parse(r)?) } else { None };
        let geomagnetic = if has_geomagnetic { Some(GeomagneticInfo::parse(r)?) } else { None };
        let group = if has_group { Some(ViewpointGroup::parse(r)?) } else { None };
        let switching = if has_switching { Some(ViewpointSwitchingList::parse(r)?) } else { None };
        let looping = if has_looping { Some(LoopingDescriptor::parse(r)?) } else { None };
        Ok(Viewpoint { position, global_rotation, gps, geomagnetic, group, switching, looping })
    }

    fn write_body(&self, w: &mut BitWriter) {
        if let Some(v) = &self.gps {
            v.write(w);
        }
        if let Some(v) = &self.geomagnetic {
            v.write(w);
        }
        if let Some(v) = &self.group {
            v.write(w);
        }
        if let Some(v) = &self.switching {
            v.write(w);
        }
        if let Some(v) = &self.looping {
            v.write(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_viewpoint(gps: bool, geomagnetic: bool, group: bool, switching: bool, looping: bool) -> Viewpoint {
        Viewpoint {
            position: Position { x: 100, y: -200, z: 300 },
            global_rotation: Rotation { yaw: 1000, pitch: -1000, roll: 0 },
            gps: gps.then_some(GpsPosition { latitude: 1, longitude: 2, altitude: 3 }),
            geomagnetic: geomagnetic.then_some(GeomagneticInfo { yaw: 42 }),
            group: group.then_some(ViewpointGroup { group_id: 1, description: Some("group-a".to_string()) }),
            switching: switching.then_some(ViewpointSwitchingList {
                records: vec![ViewpointSwitchRecord {
                    destination_viewpoint_id: 2,
                    viewing_orientation_mode: Some(ViewingOrientationMode::MappedToDestination),
                    timeline_switch: Some(TimelineSwitch { min_time_us: 0, max_time_us: 5_000_000, offset_is_relative: true, offset_us: -1000 }),
                    transition_effect: Some(TransitionEffect::Url("https://example.test/fx".to_string())),
                    switch_regions: vec![SwitchRegion::OverlayId(9), SwitchRegion::ViewportRelative {
                        left_percent: 0, top_percent: 0, width_percent: 10000, height_percent: 10000,
                    }],
                }],
            }),
            looping: looping.then_some(LoopingDescriptor { loop_count: -1 }),
        }
    }

    #[test]
    fn static_viewpoint_round_trip_all_fields_present() {
        let v = sample_viewpoint(true, true, true, true, true);
        let mut w = BitWriter::new();
        v.write(&mut w);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(Viewpoint::parse(&mut r).unwrap(), v);
    }

    #[test]
    fn static_viewpoint_round_trip_no_optionals() {
        let v = sample_viewpoint(false, false, false, false, false);
        let mut w = BitWriter::new();
        v.write(&mut w);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        assert_eq!(Viewpoint::parse(&mut r).unwrap(), v);
    }

    #[test]
    fn dynamic_viewpoint_respects_sample_entry_context() {
        for flags in 0u8..32 {
            let presence = ViewpointPresence {
                gps: flags & 1 != 0,
                geomagnetic: flags & 2 != 0,
                group: flags & 4 != 0,
                switching: flags & 8 != 0,
                looping: flags & 16 != 0,
            };
            let v = sample_viewpoint(presence.gps, presence.geomagnetic, presence.group, presence.switching, presence.looping);
            let mut w = BitWriter::new();
            v.write_dynamic(&mut w);
            let bytes = w.finish();
            let mut r = BitReader::new(&bytes);
            let parsed = Viewpoint::parse_dynamic(&mut r, &presence).unwrap();
            assert_eq!(parsed, v, "flags={flags:#07b}");
        }
    }
}
