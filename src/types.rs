use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single alarm zone, or the whole house.
/// Values are bits: A, B and C are disjoint, ABC is their union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    None = 0,
    A = 1,
    B = 2,
    C = 4,
    Abc = 7,
}

impl Zone {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Zone::None),
            1 => Some(Zone::A),
            2 => Some(Zone::B),
            4 => Some(Zone::C),
            7 => Some(Zone::Abc),
            _ => None,
        }
    }

    /// Zone letters as the panel's web UI writes them.
    pub fn as_panel_str(self) -> &'static str {
        match self {
            Zone::None => "",
            Zone::A => "A",
            Zone::B => "B",
            Zone::C => "C",
            Zone::Abc => "ABC",
        }
    }
}

/// Any combination of zones A, B and C, e.g. the zones armed in "home" mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ZoneMask(u8);

impl ZoneMask {
    pub const EMPTY: ZoneMask = ZoneMask(0);
    pub const ALL: ZoneMask = ZoneMask(Zone::Abc.bits());

    pub fn new(bits: u8) -> Result<Self> {
        if bits & !Zone::Abc.bits() != 0 {
            return Err(Error::InvalidZone(bits));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, zone: Zone) -> bool {
        self.0 & zone.bits() == zone.bits()
    }

    pub fn insert(&mut self, zone: Zone) {
        self.0 |= zone.bits();
    }

    /// Zones to arm one by one to reach this mask. The full mask is a single
    /// ABC command.
    pub fn zones(&self) -> Vec<Zone> {
        if *self == Self::ALL {
            return vec![Zone::Abc];
        }
        [Zone::A, Zone::B, Zone::C]
            .into_iter()
            .filter(|z| self.contains(*z))
            .collect()
    }
}

impl From<Zone> for ZoneMask {
    fn from(zone: Zone) -> Self {
        Self(zone.bits())
    }
}

impl TryFrom<u8> for ZoneMask {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<ZoneMask> for u8 {
    fn from(mask: ZoneMask) -> Self {
        mask.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmingState {
    Disarmed,
    ArmedAway,
    ArmedHome,
    ArmedNight,
    /// Some zones are on, but not a combination the host configured.
    Unknown,
}

/// Known firmware / web UI families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiVariant {
    Protexial,
    Protexiom,
    ProtexialIo,
}

impl ApiVariant {
    /// Order in which detection probes the variants.
    pub const DETECTION_ORDER: [ApiVariant; 3] = [
        ApiVariant::ProtexialIo,
        ApiVariant::Protexial,
        ApiVariant::Protexiom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVariant::Protexial => "protexial",
            ApiVariant::Protexiom => "protexiom",
            ApiVariant::ProtexialIo => "protexial_io",
        }
    }
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authentication card: grid coordinate ("A1".."F5") to secret code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeTable(BTreeMap<String, String>);

impl ChallengeTable {
    pub const COLUMNS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];
    pub const ROWS: usize = 5;
    pub const CELLS: usize = Self::COLUMNS.len() * Self::ROWS;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coordinate: impl Into<String>, code: impl Into<String>) {
        self.0.insert(coordinate.into(), code.into());
    }

    pub fn lookup(&self, challenge: &str) -> Result<&str> {
        self.0
            .get(challenge.trim())
            .map(String::as_str)
            .ok_or_else(|| Error::ChallengeNotFound(challenge.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ChallengeTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Panel-wide values from `status.xml`, lower-cased and ASCII-filtered.
/// Fields whose tag is missing from the document keep their `Default` value,
/// the readings of a healthy disarmed panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub zone_a: String,
    pub zone_b: String,
    pub zone_c: String,
    pub battery: String,
    pub radio: String,
    pub door: String,
    pub alarm: String,
    /// `defaut4`, the state of the panel box itself.
    pub panel: String,
    pub gsm: String,
    pub gsm_signal: String,
    pub gsm_operator: String,
    pub camera: String,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            zone_a: "off".into(),
            zone_b: "off".into(),
            zone_c: "off".into(),
            battery: "ok".into(),
            radio: "ok".into(),
            door: "ok".into(),
            alarm: "ok".into(),
            panel: "ok".into(),
            gsm: "gsm connect au rseau".into(),
            gsm_signal: "4".into(),
            gsm_operator: "orange".into(),
            camera: "disabled".into(),
        }
    }
}

impl Status {
    /// Every field empty; the baseline the first refresh is diffed against.
    pub(crate) fn blank() -> Self {
        Self {
            zone_a: String::new(),
            zone_b: String::new(),
            zone_c: String::new(),
            battery: String::new(),
            radio: String::new(),
            door: String::new(),
            alarm: String::new(),
            panel: String::new(),
            gsm: String::new(),
            gsm_signal: String::new(),
            gsm_operator: String::new(),
            camera: String::new(),
        }
    }

    pub const FIELDS: [&'static str; 12] = [
        "zoneA", "zoneB", "zoneC", "battery", "radio", "door", "alarm", "box", "gsm", "recgsm",
        "opegsm", "camera",
    ];

    /// Field lookup by the names the panel and host configuration use.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "zoneA" => &self.zone_a,
            "zoneB" => &self.zone_b,
            "zoneC" => &self.zone_c,
            "battery" => &self.battery,
            "radio" => &self.radio,
            "door" => &self.door,
            "alarm" => &self.alarm,
            "box" => &self.panel,
            "gsm" => &self.gsm,
            "recgsm" => &self.gsm_signal,
            "opegsm" => &self.gsm_operator,
            "camera" => &self.camera,
            _ => return None,
        };
        Some(value)
    }

    pub fn active_zones(&self) -> ZoneMask {
        let mut mask = ZoneMask::EMPTY;
        for (state, zone) in [
            (&self.zone_a, Zone::A),
            (&self.zone_b, Zone::B),
            (&self.zone_c, Zone::C),
        ] {
            if state == "on" {
                mask.insert(zone);
            }
        }
        mask
    }

    pub fn arming_state(&self, home: ZoneMask, night: ZoneMask) -> ArmingState {
        let active = self.active_zones();
        if active.is_empty() {
            ArmingState::Disarmed
        } else if active == ZoneMask::ALL {
            ArmingState::ArmedAway
        } else if active == night {
            ArmingState::ArmedNight
        } else if active == home {
            ArmingState::ArmedHome
        } else {
            ArmingState::Unknown
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in Self::FIELDS.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}:{}", self.get(name).unwrap_or_default())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFlag {
    Battery,
    Comm,
    House,
    Tamper,
    Door,
    Pause,
}

impl ElementFlag {
    pub const ALL: [ElementFlag; 6] = [
        ElementFlag::Battery,
        ElementFlag::Comm,
        ElementFlag::House,
        ElementFlag::Tamper,
        ElementFlag::Door,
        ElementFlag::Pause,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementFlag::Battery => "battery",
            ElementFlag::Comm => "comm",
            ElementFlag::House => "house",
            ElementFlag::Tamper => "tamper",
            ElementFlag::Door => "door",
            ElementFlag::Pause => "pause",
        }
    }
}

/// One peripheral from the elements page. Flags are raw firmware tokens
/// such as `itembattok`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    pub code: String,
    /// Device type, e.g. "DO", "DM", "Clavier".
    pub label: String,
    pub name: String,
    pub zone: String,
    pub battery: String,
    pub comm: String,
    pub house: String,
    pub tamper: String,
    pub door: String,
    pub pause: String,
}

impl Element {
    pub fn flag(&self, flag: ElementFlag) -> &str {
        match flag {
            ElementFlag::Battery => &self.battery,
            ElementFlag::Comm => &self.comm,
            ElementFlag::House => &self.house,
            ElementFlag::Tamper => &self.tamper,
            ElementFlag::Door => &self.door,
            ElementFlag::Pause => &self.pause,
        }
    }

    fn raw(&self, flag: ElementFlag) -> String {
        self.flag(flag).trim().to_lowercase()
    }

    pub fn battery_ok(&self) -> bool {
        self.raw(ElementFlag::Battery) == "itembattok"
    }

    pub fn comm_ok(&self) -> bool {
        matches!(self.raw(ElementFlag::Comm).as_str(), "itemcomok" | "itemboxok")
    }

    pub fn house_ok(&self) -> bool {
        self.raw(ElementFlag::House) == "itemhouseok"
    }

    pub fn tamper_ok(&self) -> bool {
        self.raw(ElementFlag::Tamper) == "itemboxok"
    }

    pub fn door_closed(&self) -> bool {
        self.raw(ElementFlag::Door) == "itemdoorok"
    }

    /// The pause flag read as an activity state: `running` means active.
    pub fn is_running(&self) -> bool {
        self.raw(ElementFlag::Pause) == "running"
    }

    /// The pause flag read as a fault: any reported value other than `running`.
    /// An element without a pause flag is not paused.
    pub fn is_paused(&self) -> bool {
        let raw = self.raw(ElementFlag::Pause);
        !raw.is_empty() && raw != "running"
    }

    /// Normalizes zone cells like "A (f)" or "AT (f)" to "A"; keeps "SYS" and
    /// "TEC".
    pub fn zone_code(&self) -> Option<&'static str> {
        let zone = self.zone.trim().to_uppercase();
        if zone.starts_with("SYS") {
            Some("SYS")
        } else if zone.starts_with("TEC") {
            Some("TEC")
        } else if zone.starts_with('A') {
            Some("A")
        } else if zone.starts_with('B') {
            Some("B")
        } else if zone.starts_with('C') {
            Some("C")
        } else {
            None
        }
    }
}

/// Everything one refresh returns to the host.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub status: Status,
    pub elements: Vec<Element>,
    pub fetched_at: DateTime<Utc>,
}

/// Emitted by the diff engine when a refresh differs from the previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StatusChanged { field: &'static str, old: String, new: String },
    ArmingChanged { zones: ZoneMask },
    ElementAdded { code: String, name: String },
    ElementRemoved { code: String, name: String },
    ElementFlagChanged { code: String, name: String, flag: ElementFlag, old: String, new: String },
}
