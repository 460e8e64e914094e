//! BaseStation (SBS) message decoder
//!
//!  Decodes one line of the port 30003 text feed into a typed message.
//!  Anything malformed or implausible is rejected; the feed is noisy and
//!  partial lines are expected.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};

/// Feed clock, whole seconds since the Unix epoch (UTC)
pub type Timestamp = i64;

/// Field positions in a `MSG` record
const FIELD_RECORD: usize = 0;
const FIELD_KIND: usize = 1;
const FIELD_HEX: usize = 4;
const FIELD_DATE: usize = 6;
const FIELD_TIME: usize = 7;
const FIELD_CALLSIGN: usize = 10;
const FIELD_ALTITUDE: usize = 11;
const FIELD_SPEED: usize = 12;
const FIELD_LAT: usize = 14;
const FIELD_LON: usize = 15;

pub const MIN_ALTITUDE: i32 = -500;
pub const MAX_ALTITUDE: i32 = 100_000;
pub const MAX_SPEED: i32 = 3000;

/// SBS transmission types we consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// MSG,1 - ES identification and category
    Identity,
    /// MSG,3 - ES airborne position
    Position,
    /// MSG,4 - ES airborne velocity
    Velocity,
}

impl MessageKind {
    fn from_field(field: &str) -> Option<Self> {
        match field.trim() {
            "1" => Some(Self::Identity),
            "3" => Some(Self::Position),
            "4" => Some(Self::Velocity),
            _ => None,
        }
    }
}

/// Kind-specific content of a message
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Identity { callsign: String },
    /// Altitude in feet, coordinates in degrees
    Position { altitude: i32, lat: f64, lon: f64 },
    /// Ground speed in knots
    Velocity { speed: i32 },
}

/// Decoded SBS message
#[derive(Debug, Clone, PartialEq)]
pub struct SbsMessage {
    /// ICAO 24-bit address
    pub addr: u32,
    /// Time the message was generated, rounded to the second
    pub timestamp: Timestamp,
    pub payload: Payload,
}

impl SbsMessage {
    pub fn kind(&self) -> MessageKind {
        match self.payload {
            Payload::Identity { .. } => MessageKind::Identity,
            Payload::Position { .. } => MessageKind::Position,
            Payload::Velocity { .. } => MessageKind::Velocity,
        }
    }
}

impl fmt::Display for SbsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X} @{} ", self.addr, self.timestamp)?;
        match &self.payload {
            Payload::Identity { callsign } => write!(f, "ident {}", callsign),
            Payload::Position { altitude, lat, lon } => {
                write!(f, "pos {} ft {:.5},{:.5}", altitude, lat, lon)
            }
            Payload::Velocity { speed } => write!(f, "vel {} kt", speed),
        }
    }
}

/// Decode one line of the feed.
pub fn decode_sbs_line(line: &str) -> Option<SbsMessage> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();

    if fields.get(FIELD_RECORD)?.trim() != "MSG" {
        return None;
    }
    let kind = MessageKind::from_field(fields.get(FIELD_KIND)?)?;
    let addr = parse_address(fields.get(FIELD_HEX)?)?;
    let timestamp = parse_timestamp(fields.get(FIELD_DATE)?, fields.get(FIELD_TIME)?)?;

    let payload = match kind {
        MessageKind::Identity => {
            let callsign = fields.get(FIELD_CALLSIGN)?.trim();
            if callsign.is_empty() {
                return None;
            }
            Payload::Identity {
                callsign: callsign.to_string(),
            }
        }
        MessageKind::Position => {
            let altitude = parse_rounded(fields.get(FIELD_ALTITUDE)?)?;
            if !(MIN_ALTITUDE..=MAX_ALTITUDE).contains(&altitude) {
                return None;
            }
            let lat = parse_number(fields.get(FIELD_LAT)?)?;
            let lon = parse_number(fields.get(FIELD_LON)?)?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return None;
            }
            Payload::Position { altitude, lat, lon }
        }
        MessageKind::Velocity => {
            let speed = parse_rounded(fields.get(FIELD_SPEED)?)?;
            if speed <= 0 || speed > MAX_SPEED {
                return None;
            }
            Payload::Velocity { speed }
        }
    };

    Some(SbsMessage {
        addr,
        timestamp,
        payload,
    })
}

fn parse_address(field: &str) -> Option<u32> {
    let field = field.trim();
    if field.is_empty() || field.len() > 6 {
        return None;
    }
    u32::from_str_radix(field, 16).ok()
}

fn parse_number(field: &str) -> Option<f64> {
    let value: f64 = field.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_rounded(field: &str) -> Option<i32> {
    let value = parse_number(field)?.round();
    if value < i32::MIN as f64 || value > i32::MAX as f64 {
        return None;
    }
    Some(value as i32)
}

/// `YYYY/MM/DD` + `HH:MM:SS.mmm` as UTC, rounded to the nearest second
/// (half a second rounds up).
pub fn parse_timestamp(date: &str, time: &str) -> Option<Timestamp> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y/%m/%d").ok()?;

    let (hms, fraction) = match time.trim().split_once('.') {
        Some((hms, fraction)) => (hms, fraction),
        None => (time.trim(), ""),
    };
    let time = NaiveTime::parse_from_str(hms, "%H:%M:%S").ok()?;

    let round_up = match fraction.bytes().next() {
        None => false,
        Some(first) => {
            if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            first >= b'5'
        }
    };

    let secs = date.and_time(time).and_utc().timestamp();
    Some(if round_up { secs + 1 } else { secs })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENT: &str = "MSG,1,1,1,A1B2C3,1,2024/03/01,18:30:00.000,2024/03/01,18:30:00.000,SWA1234 ,,,,,,,,,,,0";
    const POSITION: &str = "MSG,3,1,1,A1B2C3,1,2024/03/01,18:30:01.250,2024/03/01,18:30:01.250,,3000,,,34.20000,-118.48000,,,0,0,0,0";
    const VELOCITY: &str = "MSG,4,1,1,A1B2C3,1,2024/03/01,18:30:02.500,2024/03/01,18:30:02.500,,,320,145,,,-640,,0,0,0,0";

    fn ts(date: &str, time: &str) -> Timestamp {
        parse_timestamp(date, time).unwrap()
    }

    #[test]
    fn test_decode_identity() {
        let msg = decode_sbs_line(IDENT).unwrap();
        assert_eq!(msg.addr, 0xA1B2C3);
        assert_eq!(msg.kind(), MessageKind::Identity);
        assert_eq!(
            msg.payload,
            Payload::Identity {
                callsign: "SWA1234".to_string()
            }
        );
        assert_eq!(msg.timestamp, ts("2024/03/01", "18:30:00.000"));
    }

    #[test]
    fn test_decode_position() {
        let msg = decode_sbs_line(POSITION).unwrap();
        assert_eq!(msg.kind(), MessageKind::Position);
        assert_eq!(
            msg.payload,
            Payload::Position {
                altitude: 3000,
                lat: 34.2,
                lon: -118.48
            }
        );
        // .250 rounds down
        assert_eq!(msg.timestamp, ts("2024/03/01", "18:30:01"));
    }

    #[test]
    fn test_decode_velocity() {
        let msg = decode_sbs_line(VELOCITY).unwrap();
        assert_eq!(msg.payload, Payload::Velocity { speed: 320 });
        // .500 rounds up
        assert_eq!(msg.timestamp, ts("2024/03/01", "18:30:03"));
    }

    #[test]
    fn test_sparse_dump1090_line() {
        // dump1090 leaves session/aircraft/flight ids empty
        let line = "MSG,4,,,4840D6,,2024/03/01,18:30:02.100,,,,,451,90,,,0,,0,0,0,0";
        let msg = decode_sbs_line(line).unwrap();
        assert_eq!(msg.addr, 0x4840D6);
        assert_eq!(msg.payload, Payload::Velocity { speed: 451 });
    }

    #[test]
    fn test_decimal_fields_round() {
        let line = "MSG,4,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,,319.6,145,,,,,,,,";
        let msg = decode_sbs_line(line).unwrap();
        assert_eq!(msg.payload, Payload::Velocity { speed: 320 });
    }

    #[test]
    fn test_reject_wrong_record() {
        assert!(decode_sbs_line("SEL,,496,2286,4CA4E5,27215,2010/02/19,18:06:07.710,,,RYR1427").is_none());
        assert!(decode_sbs_line("STA,,5,179,400AE7,10103,2008/11/28,14:58:51.153").is_none());
        assert!(decode_sbs_line("").is_none());
        assert!(decode_sbs_line("MSG").is_none());
    }

    #[test]
    fn test_reject_other_kinds() {
        for kind in ["2", "5", "6", "7", "8", "x", ""] {
            let line = format!(
                "MSG,{},1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,3000,300,,34.2,-118.4,,,,,,",
                kind
            );
            assert!(decode_sbs_line(&line).is_none(), "kind {}", kind);
        }
    }

    #[test]
    fn test_reject_bad_address() {
        let bad = ["", "ZZZZZZ", "1000000", "-1"];
        for hex in bad {
            let line = format!("MSG,4,1,1,{},1,2024/03/01,18:30:02.000,,,,,300,,,,,,,,,", hex);
            assert!(decode_sbs_line(&line).is_none(), "hex {:?}", hex);
        }
    }

    #[test]
    fn test_reject_out_of_range_altitude() {
        for alt in ["-501", "100001", "abc", ""] {
            let line = format!(
                "MSG,3,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,{},,,34.2,-118.4,,,,,,",
                alt
            );
            assert!(decode_sbs_line(&line).is_none(), "alt {:?}", alt);
        }
        for alt in ["-500", "100000"] {
            let line = format!(
                "MSG,3,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,{},,,34.2,-118.4,,,,,,",
                alt
            );
            assert!(decode_sbs_line(&line).is_some(), "alt {:?}", alt);
        }
    }

    #[test]
    fn test_reject_missing_position() {
        // altitude-only MSG,3 as sent before the first CPR pair is decoded
        let line = "MSG,3,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,3000,,,,,,,0,0,0,0";
        assert!(decode_sbs_line(line).is_none());
        let line = "MSG,3,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,3000,,,95.0,-118.4,,,0,0,0,0";
        assert!(decode_sbs_line(line).is_none());
    }

    #[test]
    fn test_reject_out_of_range_speed() {
        for speed in ["0", "-10", "3001", "fast", ""] {
            let line = format!("MSG,4,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,,{},,,,,,,,,", speed);
            assert!(decode_sbs_line(&line).is_none(), "speed {:?}", speed);
        }
        let line = "MSG,4,1,1,A1B2C3,1,2024/03/01,18:30:02.000,,,,,3000,,,,,,,,,";
        assert!(decode_sbs_line(line).is_some());
    }

    #[test]
    fn test_reject_empty_callsign() {
        let line = "MSG,1,1,1,A1B2C3,1,2024/03/01,18:30:00.000,,,   ,,,,,,,,,,,0";
        assert!(decode_sbs_line(line).is_none());
    }

    #[test]
    fn test_reject_bad_timestamp() {
        let bad = [
            ("", "18:30:00.000"),
            ("2024/03/01", ""),
            ("2024-03-01", "18:30:00.000"),
            ("2024/13/01", "18:30:00.000"),
            ("2024/03/01", "25:30:00.000"),
            ("2024/03/01", "18:30:00.x"),
        ];
        for (date, time) in bad {
            let line = format!("MSG,4,1,1,A1B2C3,1,{},{},,,,,300,,,,,,,,,", date, time);
            assert!(decode_sbs_line(&line).is_none(), "{:?} {:?}", date, time);
        }
    }

    #[test]
    fn test_timestamp_rounding() {
        let base = ts("2024/03/01", "23:59:59");
        assert_eq!(ts("2024/03/01", "23:59:59.499"), base);
        assert_eq!(ts("2024/03/01", "23:59:59.5"), base + 1);
        assert_eq!(ts("2024/03/01", "23:59:59.999"), base + 1);
        // rolls over into the next day
        assert_eq!(ts("2024/03/01", "23:59:59.500"), ts("2024/03/02", "00:00:00.000"));
        assert_eq!(ts("1970/01/01", "00:00:10.000"), 10);
    }

    #[test]
    fn test_crlf_terminated() {
        let line = format!("{}\r\n", VELOCITY);
        assert!(decode_sbs_line(&line).is_some());
    }
}
