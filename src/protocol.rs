//! AUDAC MTX control protocol: frame encoding, reply decoding, unit conversion
//!
//! Request frames look like `#|X001|HA|SV2|18|U|\r\n`: a marker, the
//! destination (device) id, the source (client) id, the command token with the
//! zone embedded, its arguments and a literal `U` field before CR LF.
//!
//! Everything here is pure. The client in `adapters::audac` owns the socket.

use serde::{Deserialize, Serialize};

pub const FRAME_MARKER: &str = "#";
pub const DELIMITER: char = '|';
pub const UNIT_MARKER: &str = "U";
pub const LINE_TERMINATOR: &str = "\r\n";

/// Prefix of the field that precedes the payload in a zone-info reply
pub const ZONE_INFO_MARKER: &str = "ZI";
/// Separator between the five zone-info payload values
pub const PAYLOAD_SEPARATOR: char = '^';

/// Quietest device volume step (0 is loudest)
pub const MAX_DEVICE_VOLUME: u8 = 70;
/// Highest input route; 0 means no source
pub const MAX_SOURCE: u8 = 8;
pub const MAX_PERCENT: u8 = 100;
/// Longest reply line accepted from the device, terminator included
pub const MAX_REPLY_LEN: usize = 512;

/// Input labels of the MTX front-end, indexed by route number
pub const SOURCE_LABELS: [(u8, &str); 8] = [
    (1, "Mic 1"),
    (2, "Mic 2"),
    (3, "Line 3"),
    (4, "Line 4"),
    (5, "Line 5"),
    (6, "Line 6"),
    (7, "WLI/MWX65"),
    (8, "WMI"),
];

/// Build a wire frame. Tokens must not contain `|`, CR or LF.
pub fn encode_frame(device_id: &str, source_id: &str, command: &str, args: &[&str]) -> String {
    let mut fields = vec![FRAME_MARKER, device_id, source_id, command];
    fields.extend_from_slice(args);
    fields.push(UNIT_MARKER);

    let mut frame = fields.join("|");
    frame.push(DELIMITER);
    frame.push_str(LINE_TERMINATOR);
    frame
}

/// A single zone command, already clamped to device ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `SV<zone>` with attenuation in device units
    SetVolume { zone: u8, units: u8 },
    /// `SM<zone:02>` with `1` for muted
    SetMute { zone: u8, muted: bool },
    /// `SR<zone>` with route 0..=8
    SetSource { zone: u8, source: u8 },
    /// `GZI<zone:02>` with the dummy argument `0`
    GetZoneInfo { zone: u8 },
}

impl Command {
    /// Volume command from a 0..100 UI percentage (clamped).
    pub fn set_volume(zone: u8, percent: i32) -> Self {
        Command::SetVolume {
            zone,
            units: percent_to_device_units(percent),
        }
    }

    pub fn set_mute(zone: u8, muted: bool) -> Self {
        Command::SetMute { zone, muted }
    }

    /// Source command; the route is clamped to 0..=8.
    pub fn set_source(zone: u8, source: i32) -> Self {
        Command::SetSource {
            zone,
            source: clamp_source(source),
        }
    }

    pub fn get_zone_info(zone: u8) -> Self {
        Command::GetZoneInfo { zone }
    }

    pub fn zone(&self) -> u8 {
        match *self {
            Command::SetVolume { zone, .. }
            | Command::SetMute { zone, .. }
            | Command::SetSource { zone, .. }
            | Command::GetZoneInfo { zone } => zone,
        }
    }

    /// Command token with the zone embedded. Mute and zone-info pad the zone
    /// to two digits, volume and source do not.
    pub fn token(&self) -> String {
        match *self {
            Command::SetVolume { zone, .. } => format!("SV{}", zone),
            Command::SetMute { zone, .. } => format!("SM{:02}", zone),
            Command::SetSource { zone, .. } => format!("SR{}", zone),
            Command::GetZoneInfo { zone } => format!("GZI{:02}", zone),
        }
    }

    pub fn argument(&self) -> String {
        match *self {
            Command::SetVolume { units, .. } => units.to_string(),
            Command::SetMute { muted: true, .. } => "1".to_string(),
            Command::SetMute { muted: false, .. } => "0".to_string(),
            Command::SetSource { source, .. } => source.to_string(),
            Command::GetZoneInfo { .. } => "0".to_string(),
        }
    }

    pub fn encode(&self, device_id: &str, source_id: &str) -> String {
        encode_frame(device_id, source_id, &self.token(), &[self.argument().as_str()])
    }
}

/// UI percentage (0 = silent, 100 = loudest) to device attenuation steps.
///
/// Inverted linear map, rounded half away from zero: 100 -> 0, 75 -> 18,
/// 25 -> 53, 0 -> 70. Out-of-range input is clamped first.
pub fn percent_to_device_units(percent: i32) -> u8 {
    let percent = percent.clamp(0, MAX_PERCENT as i32);
    let scaled = (MAX_PERCENT as i32 - percent) * MAX_DEVICE_VOLUME as i32;
    ((scaled + MAX_PERCENT as i32 / 2) / MAX_PERCENT as i32) as u8
}

/// Device attenuation steps back to a UI percentage.
pub fn device_units_to_percent(units: i32) -> u8 {
    let units = units.clamp(0, MAX_DEVICE_VOLUME as i32);
    let max = MAX_DEVICE_VOLUME as i32;
    let scaled = (max - units) * MAX_PERCENT as i32;
    ((scaled + max / 2) / max) as u8
}

pub fn clamp_source(source: i32) -> u8 {
    source.clamp(0, MAX_SOURCE as i32) as u8
}

pub fn source_label(index: u8) -> Option<&'static str> {
    SOURCE_LABELS
        .iter()
        .find(|(i, _)| *i == index)
        .map(|(_, label)| *label)
}

pub fn source_index(label: &str) -> Option<u8> {
    SOURCE_LABELS
        .iter()
        .find(|(_, l)| *l == label)
        .map(|(i, _)| *i)
}

/// Zone state decoded from a `GZI` reply. Never cached by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    /// Attenuation in device units, 0 (loudest) ..= 70
    pub volume: u8,
    /// Input route, 0 (none) ..= 8
    pub source: u8,
    pub mute: bool,
    pub bass: i32,
    pub treble: i32,
}

impl ZoneState {
    pub fn volume_percent(&self) -> u8 {
        device_units_to_percent(self.volume as i32)
    }

    pub fn source_label(&self) -> Option<&'static str> {
        source_label(self.source)
    }
}

/// Decode a raw reply line. Invalid UTF-8 is replaced rather than rejected.
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

/// Parse a zone-info reply such as `#|HA|X001|ZI03|12^5^0^07^07|U|`.
///
/// Returns `None` for anything malformed: a missing `ZI` field, a missing
/// payload, anything other than five values, or a non-integer value.
pub fn parse_zone_info(line: &str) -> Option<ZoneState> {
    let fields: Vec<&str> = line
        .trim_matches(|c: char| matches!(c, '|' | '\r' | '\n'))
        .split(DELIMITER)
        .collect();

    let marker = fields
        .iter()
        .position(|f| f.starts_with(ZONE_INFO_MARKER))?;
    let payload = fields.get(marker + 1)?;

    let values: Vec<&str> = payload.split(PAYLOAD_SEPARATOR).collect();
    let [volume, route, mute, bass, treble] = values.as_slice() else {
        return None;
    };

    let volume: i64 = volume.trim().parse().ok()?;
    let route: i64 = route.trim().parse().ok()?;
    let mute: i64 = mute.trim().parse().ok()?;
    let bass: i32 = bass.trim().parse().ok()?;
    let treble: i32 = treble.trim().parse().ok()?;

    Some(ZoneState {
        volume: volume.clamp(0, MAX_DEVICE_VOLUME as i64) as u8,
        source: route.clamp(0, MAX_SOURCE as i64) as u8,
        mute: mute != 0,
        bass,
        treble,
    })
}
