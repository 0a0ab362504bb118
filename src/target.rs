//! Target report tracking
//!
//! Maintains a database of recently seen targets, accumulated from
//! successive decoded CAT21 records.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::record::{Cat21Record, ItemValue};

/// Accumulated state for one target, keyed by its 24-bit address.
#[derive(Debug, Clone)]
pub struct TargetReport {
    /// 24-bit target address (ICAO)
    #[allow(dead_code)]
    pub address: u32,
    /// Hex address string
    pub hex_addr: String,
    /// Track number assigned by the surveillance processing
    pub track_number: Option<u64>,
    /// Mode 3/A code (octal-coded raw value)
    pub mode_3a: Option<u64>,
    /// Flight level in FL units
    pub flight_level: Option<f64>,
    /// Geometric height in feet
    pub geometric_height: Option<f64>,
    /// Barometric vertical rate in ft/min
    pub barometric_vertical_rate: Option<f64>,
    /// Geometric vertical rate in ft/min
    pub geometric_vertical_rate: Option<f64>,
    /// Magnetic heading in degrees
    pub magnetic_heading: Option<f64>,
    /// Roll angle in degrees
    pub roll_angle: Option<f64>,
    /// Time of report transmission in seconds since midnight
    pub time_of_report: Option<f64>,
    /// Number of records seen for this target
    pub records: u64,
    /// Last seen timestamp
    pub seen: Instant,
}

impl TargetReport {
    pub fn new(address: u32) -> Self {
        Self {
            address,
            hex_addr: format!("{:06X}", address),
            track_number: None,
            mode_3a: None,
            flight_level: None,
            geometric_height: None,
            barometric_vertical_rate: None,
            geometric_vertical_rate: None,
            magnetic_heading: None,
            roll_angle: None,
            time_of_report: None,
            records: 0,
            seen: Instant::now(),
        }
    }
}

/// Serializable view of a target for the JSON endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_3a: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometric_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnetic_heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barometric_vertical_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometric_vertical_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_report: Option<f64>,
    pub records: u64,
    pub age_secs: u64,
}

/// Store for tracking multiple targets.
pub struct TargetStore {
    targets: HashMap<u32, TargetReport>,
    ttl: Duration,
    /// Minimum records required before a target is considered confirmed
    min_records: u64,
}

impl TargetStore {
    pub fn new(ttl_secs: u64, min_records: u64) -> Self {
        Self {
            targets: HashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
            min_records,
        }
    }

    /// Update the store from a decoded record.
    ///
    /// Records without a Target Address item are not tracked; the decoded
    /// record itself is still delivered to the caller's outputs.
    pub fn update_from_record(&mut self, record: &Cat21Record) -> Option<&TargetReport> {
        let address = match record.get("Target Address") {
            Some(&ItemValue::Raw(addr)) => addr as u32,
            _ => return None,
        };

        let target = self
            .targets
            .entry(address)
            .or_insert_with(|| TargetReport::new(address));
        target.seen = Instant::now();
        target.records += 1;

        if let Some(v) = value_u64(record, "Track Number") {
            target.track_number = Some(v);
        }
        if let Some(v) = value_u64(record, "Mode 3/A Code") {
            target.mode_3a = Some(v);
        }
        if let Some(v) = value_f64(record, "Flight Level") {
            target.flight_level = Some(v);
        }
        if let Some(v) = value_f64(record, "Geometric Height") {
            target.geometric_height = Some(v);
        }
        if let Some(v) = value_f64(record, "Barometric Vertical Rate") {
            target.barometric_vertical_rate = Some(v);
        }
        if let Some(v) = value_f64(record, "Geometric Vertical Rate") {
            target.geometric_vertical_rate = Some(v);
        }
        if let Some(v) = value_f64(record, "Magnetic Heading") {
            target.magnetic_heading = Some(v);
        }
        if let Some(v) = value_f64(record, "Roll Angle") {
            target.roll_angle = Some(v);
        }
        if let Some(v) = value_f64(record, "Time of Report Transmission") {
            target.time_of_report = Some(v);
        }

        self.targets.get(&address)
    }

    /// Get a target by address.
    #[allow(dead_code)]
    pub fn get(&self, address: u32) -> Option<&TargetReport> {
        self.targets.get(&address)
    }

    /// All targets that meet the minimum record threshold.
    pub fn all(&self) -> impl Iterator<Item = &TargetReport> {
        let min = self.min_records;
        self.targets.values().filter(move |t| t.records >= min)
    }

    /// Serializable summaries of all confirmed targets.
    pub fn summaries(&self) -> Vec<TargetSummary> {
        let now = Instant::now();
        self.all()
            .map(|t| TargetSummary {
                hex: t.hex_addr.clone(),
                track_number: t.track_number,
                mode_3a: t.mode_3a,
                flight_level: t.flight_level,
                geometric_height: t.geometric_height,
                magnetic_heading: t.magnetic_heading,
                roll_angle: t.roll_angle,
                barometric_vertical_rate: t.barometric_vertical_rate,
                geometric_vertical_rate: t.geometric_vertical_rate,
                time_of_report: t.time_of_report,
                records: t.records,
                age_secs: now.duration_since(t.seen).as_secs(),
            })
            .collect()
    }

    /// Remove targets idle longer than the TTL.
    pub fn remove_stale(&mut self) {
        let now = Instant::now();
        self.targets
            .retain(|_, t| now.duration_since(t.seen) <= self.ttl);
    }

    /// Number of confirmed targets.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.all().count()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn value_u64(record: &Cat21Record, name: &str) -> Option<u64> {
    match record.get(name) {
        Some(&ItemValue::Raw(v)) => Some(v),
        _ => None,
    }
}

fn value_f64(record: &Cat21Record, name: &str) -> Option<f64> {
    match record.get(name) {
        Some(&ItemValue::Scaled(v)) => Some(v),
        Some(&ItemValue::Raw(v)) => Some(v as f64),
        None => None,
    }
}
