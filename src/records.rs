//! Typed records decoded from receiver frames.
//!
//! Binary block decoders are pure functions over the full frame bytes; fields
//! are little-endian with the payload starting right after the 6-byte header.
//! Sentence records are parsed from the terminated line. Composite records
//! are assembled by [`crate::composite`] from the latest-value cache.

use std::str::FromStr;

use crate::frame::BLOCK_HEADER_LEN;
use crate::{Error, Result};

/// One elementary record type feeding a composite output. Exactly one
/// latest-value cache slot exists per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constituent {
    PvtGeodetic,
    PosCovGeodetic,
    AttEuler,
    AttCovEuler,
    InsNavGeod,
    ChannelStatus,
    MeasEpoch,
    Dop,
    VelCovGeodetic,
    ReceiverStatus,
    QualityInd,
    ReceiverSetup,
}

/// Geodetic position, velocity and time solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PvtGeodetic {
    /// Milliseconds into the GNSS week.
    pub tow: u32,
    /// GNSS week number.
    pub wnc: u16,
    pub mode: u8,
    pub error: u8,
    /// Latitude in radians.
    pub latitude: f64,
    /// Longitude in radians.
    pub longitude: f64,
    /// Ellipsoidal height in meters.
    pub height: f64,
    pub nr_sv: u8,
}

impl PvtGeodetic {
    pub const ID: u16 = 4007;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 33)?;
        Ok(PvtGeodetic {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            mode: d[6],
            error: d[7],
            latitude: le_f64(d, 8),
            longitude: le_f64(d, 16),
            height: le_f64(d, 24),
            nr_sv: d[32],
        })
    }
}

/// Covariance of the geodetic position solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PosCovGeodetic {
    pub tow: u32,
    pub wnc: u16,
    pub mode: u8,
    pub error: u8,
    pub cov_latlat: f32,
    pub cov_lonlon: f32,
    pub cov_hgthgt: f32,
}

impl PosCovGeodetic {
    pub const ID: u16 = 5906;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 20)?;
        Ok(PosCovGeodetic {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            mode: d[6],
            error: d[7],
            cov_latlat: le_f32(d, 8),
            cov_lonlon: le_f32(d, 12),
            cov_hgthgt: le_f32(d, 16),
        })
    }
}

/// Euler attitude angles from a multi-antenna setup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttEuler {
    pub tow: u32,
    pub wnc: u16,
    pub nr_sv: u8,
    pub error: u8,
    /// Degrees.
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl AttEuler {
    pub const ID: u16 = 5938;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 20)?;
        Ok(AttEuler {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            nr_sv: d[6],
            error: d[7],
            heading: le_f32(d, 8),
            pitch: le_f32(d, 12),
            roll: le_f32(d, 16),
        })
    }
}

/// Covariance of the Euler attitude angles.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttCovEuler {
    pub tow: u32,
    pub wnc: u16,
    pub cov_headhead: f32,
    pub cov_pitchpitch: f32,
    pub cov_rollroll: f32,
}

impl AttCovEuler {
    pub const ID: u16 = 5939;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 20)?;
        Ok(AttCovEuler {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            cov_headhead: le_f32(d, 8),
            cov_pitchpitch: le_f32(d, 12),
            cov_rollroll: le_f32(d, 16),
        })
    }
}

/// Integrated INS/GNSS navigation solution, the alternative primary
/// positioning source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsNavGeod {
    pub tow: u32,
    pub wnc: u16,
    pub mode: u8,
    pub error: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl InsNavGeod {
    pub const ID: u16 = 4226;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 44)?;
        Ok(InsNavGeod {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            mode: d[6],
            error: d[7],
            latitude: le_f64(d, 8),
            longitude: le_f64(d, 16),
            height: le_f64(d, 24),
            heading: le_f32(d, 32),
            pitch: le_f32(d, 36),
            roll: le_f32(d, 40),
        })
    }
}

/// Per-channel tracking status, reduced to the tracked satellite count.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelStatus {
    pub tow: u32,
    pub wnc: u16,
    pub tracked: u8,
}

impl ChannelStatus {
    pub const ID: u16 = 4013;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 8)?;
        Ok(ChannelStatus {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            tracked: d[6],
        })
    }
}

/// Measurement epoch, reduced to its observation count.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasEpoch {
    pub tow: u32,
    pub wnc: u16,
    pub observations: u8,
}

impl MeasEpoch {
    pub const ID: u16 = 4027;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 8)?;
        Ok(MeasEpoch {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            observations: d[6],
        })
    }
}

/// Dilution of precision. Raw values are scaled by 0.01 on the wire.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dop {
    pub tow: u32,
    pub wnc: u16,
    pub nr_sv: u8,
    pub pdop: f32,
    pub tdop: f32,
    pub hdop: f32,
    pub vdop: f32,
}

impl Dop {
    pub const ID: u16 = 4001;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 16)?;
        Ok(Dop {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            nr_sv: d[6],
            pdop: f32::from(le_u16(d, 8)) * 0.01,
            tdop: f32::from(le_u16(d, 10)) * 0.01,
            hdop: f32::from(le_u16(d, 12)) * 0.01,
            vdop: f32::from(le_u16(d, 14)) * 0.01,
        })
    }
}

/// Covariance of the geodetic velocity solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VelCovGeodetic {
    pub tow: u32,
    pub wnc: u16,
    pub mode: u8,
    pub error: u8,
    pub cov_vnvn: f32,
    pub cov_veve: f32,
    pub cov_vuvu: f32,
}

impl VelCovGeodetic {
    pub const ID: u16 = 5908;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 20)?;
        Ok(VelCovGeodetic {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            mode: d[6],
            error: d[7],
            cov_vnvn: le_f32(d, 8),
            cov_veve: le_f32(d, 12),
            cov_vuvu: le_f32(d, 16),
        })
    }
}

/// Overall receiver health.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiverStatus {
    pub tow: u32,
    pub wnc: u16,
    pub cpu_load: u8,
    pub ext_error: u8,
    /// Seconds since receiver startup.
    pub uptime: u32,
    pub rx_status: u32,
    pub rx_error: u32,
}

impl ReceiverStatus {
    pub const ID: u16 = 4014;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 20)?;
        Ok(ReceiverStatus {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            cpu_load: d[6],
            ext_error: d[7],
            uptime: le_u32(d, 8),
            rx_status: le_u32(d, 12),
            rx_error: le_u32(d, 16),
        })
    }
}

/// Per-subsystem quality indicators.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityInd {
    pub tow: u32,
    pub wnc: u16,
    pub indicators: Vec<u16>,
}

impl QualityInd {
    pub const ID: u16 = 4082;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 8)?;
        let n = d[6] as usize;
        if d.len() < 8 + 2 * n {
            return Err(Error::Decode {
                id: "qualityind".into(),
                reason: format!("indicator count {n} exceeds payload"),
            });
        }
        let indicators = (0..n).map(|i| le_u16(d, 8 + 2 * i)).collect();
        Ok(QualityInd {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            indicators,
        })
    }
}

/// Static receiver identification, sent at a very low rate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiverSetup {
    pub tow: u32,
    pub wnc: u16,
    pub rx_serial: String,
    pub rx_name: String,
    pub rx_version: String,
}

impl ReceiverSetup {
    pub const ID: u16 = 5902;

    pub fn decode(dat: &[u8]) -> Result<Self> {
        let d = fields(dat, 68)?;
        Ok(ReceiverSetup {
            tow: le_u32(d, 0),
            wnc: le_u16(d, 4),
            rx_serial: fixed_str(&d[8..28]),
            rx_name: fixed_str(&d[28..48]),
            rx_version: fixed_str(&d[48..68]),
        })
    }
}

/// GGA fix data sentence. Empty wire fields decode to `None`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gga {
    pub utc: String,
    /// Decimal degrees, south negative.
    pub latitude: Option<f64>,
    /// Decimal degrees, west negative.
    pub longitude: Option<f64>,
    pub quality: u8,
    pub num_sv: u8,
    pub hdop: Option<f32>,
    /// Altitude above mean sea level, meters.
    pub altitude: Option<f64>,
}

impl Gga {
    pub fn parse(line: &str) -> Result<Self> {
        let f = split_fields(line);
        if f.len() != 15 {
            return Err(bad("gga", format!("expected 15 fields, got {}", f.len())));
        }
        Ok(Gga {
            utc: f[1].to_string(),
            latitude: parse_angle("gga", f[2], f[3], 2)?,
            longitude: parse_angle("gga", f[4], f[5], 3)?,
            quality: num("gga", f[6])?.unwrap_or(0),
            num_sv: num("gga", f[7])?.unwrap_or(0),
            hdop: num("gga", f[8])?,
            altitude: num("gga", f[9])?,
        })
    }
}

/// RMC recommended minimum sentence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rmc {
    pub utc: String,
    /// Status field is `A` (valid) or `V` (warning).
    pub valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f64>,
    pub course: Option<f64>,
    pub date: String,
}

impl Rmc {
    pub fn parse(line: &str) -> Result<Self> {
        let f = split_fields(line);
        // 12 classic fields, NMEA 2.3 adds mode, 4.1 adds nav status
        if !(12..=14).contains(&f.len()) {
            return Err(bad("rmc", format!("expected 12-14 fields, got {}", f.len())));
        }
        Ok(Rmc {
            utc: f[1].to_string(),
            valid: f[2] == "A",
            latitude: parse_angle("rmc", f[3], f[4], 2)?,
            longitude: parse_angle("rmc", f[5], f[6], 3)?,
            speed_knots: num("rmc", f[7])?,
            course: num("rmc", f[8])?,
            date: f[9].to_string(),
        })
    }
}

/// GSV satellites-in-view sentence, reduced to its counters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gsv {
    pub total: u8,
    pub index: u8,
    pub in_view: u8,
}

impl Gsv {
    pub fn parse(line: &str) -> Result<Self> {
        let f = split_fields(line);
        if f.len() < 4 {
            return Err(bad("gsv", format!("expected at least 4 fields, got {}", f.len())));
        }
        Ok(Gsv {
            total: num("gsv", f[1])?.unwrap_or(0),
            index: num("gsv", f[2])?.unwrap_or(0),
            in_view: num("gsv", f[3])?.unwrap_or(0),
        })
    }
}

/// Reply line to a command sent to the receiver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reply {
    pub text: String,
    /// True for an error reply (`$R?`), false for a normal echo.
    pub error: bool,
}

/// Connection banner sent once after a fresh transport connection, e.g.
/// `IP10>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Banner {
    /// Descriptor without the trailing `>`.
    pub descriptor: String,
}

/// Composite navigation fix assembled from the primary position source plus
/// opportunistic covariance and attitude constituents. Absent optional
/// constituents are `None`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavFix {
    pub tow: u32,
    pub wnc: u16,
    pub mode: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    /// Diagonal of the position covariance: lat, lon, height.
    pub position_covariance: Option<[f32; 3]>,
    /// Euler attitude: heading, pitch, roll.
    pub attitude: Option<[f32; 3]>,
    /// Diagonal of the attitude covariance: heading, pitch, roll.
    pub attitude_covariance: Option<[f32; 3]>,
}

/// Composite satellite/measurement status bundle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SatStatus {
    pub tow: u32,
    pub wnc: u16,
    pub tracked: u8,
    pub used: u8,
    pub observations: u8,
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub tdop: f32,
    /// Diagonal of the velocity covariance: north, east, up.
    pub velocity_covariance: Option<[f32; 3]>,
}

/// Composite receiver diagnostics bundle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostics {
    pub tow: u32,
    pub wnc: u16,
    pub cpu_load: u8,
    pub uptime: u32,
    pub rx_status: u32,
    pub rx_error: u32,
    pub indicators: Vec<u16>,
    pub rx_name: Option<String>,
    pub rx_serial: Option<String>,
}

/// A decoded record, tagged by variant with the frame kind it came from.
#[derive(Debug, Clone, PartialEq, derive_more::From)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Record {
    PvtGeodetic(PvtGeodetic),
    PosCovGeodetic(PosCovGeodetic),
    AttEuler(AttEuler),
    AttCovEuler(AttCovEuler),
    InsNavGeod(InsNavGeod),
    ChannelStatus(ChannelStatus),
    MeasEpoch(MeasEpoch),
    Dop(Dop),
    VelCovGeodetic(VelCovGeodetic),
    ReceiverStatus(ReceiverStatus),
    QualityInd(QualityInd),
    ReceiverSetup(ReceiverSetup),
    Gga(Gga),
    Rmc(Rmc),
    Gsv(Gsv),
    Reply(Reply),
    Banner(Banner),
    NavFix(NavFix),
    SatStatus(SatStatus),
    Diagnostics(Diagnostics),
}

impl Record {
    /// Message key this record is dispatched under.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Record::PvtGeodetic(_) => "pvtgeodetic",
            Record::PosCovGeodetic(_) => "poscovgeodetic",
            Record::AttEuler(_) => "atteuler",
            Record::AttCovEuler(_) => "attcoveuler",
            Record::InsNavGeod(_) => "insnavgeod",
            Record::ChannelStatus(_) => "channelstatus",
            Record::MeasEpoch(_) => "measepoch",
            Record::Dop(_) => "dop",
            Record::VelCovGeodetic(_) => "velcovgeodetic",
            Record::ReceiverStatus(_) => "receiverstatus",
            Record::QualityInd(_) => "qualityind",
            Record::ReceiverSetup(_) => "receiversetup",
            Record::Gga(_) => "gga",
            Record::Rmc(_) => "rmc",
            Record::Gsv(_) => "gsv",
            Record::Reply(_) => "reply",
            Record::Banner(_) => "banner",
            Record::NavFix(_) => "navfix",
            Record::SatStatus(_) => "satstatus",
            Record::Diagnostics(_) => "diagnostics",
        }
    }

    /// The cache slot this record feeds, if it is a constituent.
    #[must_use]
    pub fn constituent(&self) -> Option<Constituent> {
        match self {
            Record::PvtGeodetic(_) => Some(Constituent::PvtGeodetic),
            Record::PosCovGeodetic(_) => Some(Constituent::PosCovGeodetic),
            Record::AttEuler(_) => Some(Constituent::AttEuler),
            Record::AttCovEuler(_) => Some(Constituent::AttCovEuler),
            Record::InsNavGeod(_) => Some(Constituent::InsNavGeod),
            Record::ChannelStatus(_) => Some(Constituent::ChannelStatus),
            Record::MeasEpoch(_) => Some(Constituent::MeasEpoch),
            Record::Dop(_) => Some(Constituent::Dop),
            Record::VelCovGeodetic(_) => Some(Constituent::VelCovGeodetic),
            Record::ReceiverStatus(_) => Some(Constituent::ReceiverStatus),
            Record::QualityInd(_) => Some(Constituent::QualityInd),
            Record::ReceiverSetup(_) => Some(Constituent::ReceiverSetup),
            _ => None,
        }
    }
}

/// Payload bytes of a full frame, after checking it can hold `min` of them.
fn fields(dat: &[u8], min: usize) -> Result<&[u8]> {
    let need = BLOCK_HEADER_LEN + min + 2;
    if dat.len() < need {
        return Err(Error::NotEnoughData {
            actual: dat.len(),
            minimum: need,
        });
    }
    Ok(&dat[BLOCK_HEADER_LEN..dat.len() - 2])
}

fn le_u16(d: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([d[off], d[off + 1]])
}

fn le_u32(d: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([d[off], d[off + 1], d[off + 2], d[off + 3]])
}

fn le_f32(d: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([d[off], d[off + 1], d[off + 2], d[off + 3]])
}

fn le_f64(d: &[u8], off: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&d[off..off + 8]);
    f64::from_le_bytes(b)
}

/// Fixed-width string field, NUL/space padded on the wire.
fn fixed_str(d: &[u8]) -> String {
    String::from_utf8_lossy(d)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

fn bad(id: &str, reason: impl Into<String>) -> Error {
    Error::Decode {
        id: id.into(),
        reason: reason.into(),
    }
}

/// Sentence fields with the checksum suffix and terminator stripped.
fn split_fields(line: &str) -> Vec<&str> {
    let line = line.trim_end();
    let body = match line.find('*') {
        Some(i) => &line[..i],
        None => line,
    };
    body.split(',').collect()
}

fn num<T: FromStr>(id: &str, field: &str) -> Result<Option<T>> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<T>()
        .map(Some)
        .map_err(|_| bad(id, format!("bad numeric field {field:?}")))
}

/// Convert a `ddmm.mmmm`/`dddmm.mmmm` angle plus hemisphere to signed decimal
/// degrees. Both fields empty means the receiver has no fix yet.
fn parse_angle(id: &str, field: &str, hemi: &str, deg_digits: usize) -> Result<Option<f64>> {
    if field.is_empty() && hemi.is_empty() {
        return Ok(None);
    }
    // degree/minute split is by byte index, so the field must be plain ascii
    if !field.is_ascii() {
        return Err(bad(id, format!("bad angle field {field:?}")));
    }
    if field.len() <= deg_digits {
        return Err(bad(id, format!("angle field too short: {field:?}")));
    }
    let deg: f64 = field[..deg_digits]
        .parse()
        .map_err(|_| bad(id, format!("bad angle field {field:?}")))?;
    let min: f64 = field[deg_digits..]
        .parse()
        .map_err(|_| bad(id, format!("bad angle field {field:?}")))?;
    let v = deg + min / 60.0;
    match hemi {
        "N" | "E" => Ok(Some(v)),
        "S" | "W" => Ok(Some(-v)),
        _ => Err(bad(id, format!("bad hemisphere {hemi:?}"))),
    }
}
