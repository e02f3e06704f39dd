use serde::{Deserialize, Deserializer};

/// Which recording family to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalKind {
    /// Digital stethoscope sounds (`/v2/stetho`).
    #[default]
    Stetho,
    /// ECG recordings (`/v2/heart`).
    Heart,
}

impl SignalKind {
    pub fn path(self) -> &'static str {
        match self {
            Self::Stetho => "/v2/stetho",
            Self::Heart => "/v2/heart",
        }
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stetho" => Ok(Self::Stetho),
            "heart" => Ok(Self::Heart),
            other => Err(format!("unknown signal kind `{other}` (expected stetho or heart)")),
        }
    }
}

/// Optional filters of a `list` call; dates are UNIX timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub offset: Option<i64>,
}

/// One recording in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct SignalDescriptor {
    pub id: i64,
    pub timestamp: i64,
    pub device_hash: Option<String>,
}

/// Listing entries carry `signalid` at the top level (stetho) or under
/// `ecg` (heart), and the device as `hash_deviceid` or `deviceid`.
#[derive(Deserialize)]
struct RawDescriptor {
    signalid: Option<i64>,
    ecg: Option<EcgRef>,
    timestamp: i64,
    #[serde(alias = "deviceid")]
    hash_deviceid: Option<String>,
}

#[derive(Deserialize)]
struct EcgRef {
    signalid: i64,
}

impl TryFrom<RawDescriptor> for SignalDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let id = raw
            .signalid
            .or(raw.ecg.map(|e| e.signalid))
            .ok_or_else(|| "recording without signalid".to_string())?;
        Ok(Self {
            id,
            timestamp: raw.timestamp,
            device_hash: raw.hash_deviceid,
        })
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub series: Vec<SignalDescriptor>,
    #[serde(default, deserialize_with = "flag")]
    pub more: bool,
    #[serde(default)]
    pub offset: i64,
}

/// The vendor encodes `more` as a bool or as 0/1.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Int(i) => i != 0,
    })
}

/// Samples of one recording.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalData {
    pub signal: Vec<i64>,
    /// Sampling rate in Hz.
    #[serde(alias = "sampling_frequency")]
    pub frequency: u32,
    /// `1` means A-law encoded samples.
    #[serde(default)]
    pub format: Option<i64>,
    /// Valvular heart disease assessment code.
    #[serde(default)]
    pub vhd: Option<i64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl SignalData {
    pub fn is_alaw(&self) -> bool {
        self.format == Some(1)
    }
}
