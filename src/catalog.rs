//! Data item catalog and LSB scaling table
//!
//! The FSPEC bit index to item mapping is configuration, not code: the
//! decoder takes a `Catalog` at construction, so other ASTERIX categories
//! can be decoded by supplying a different table (built-in or JSON file).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Byte width assumed for FSPEC bits with no catalog entry.
pub const UNKNOWN_ITEM_WIDTH: usize = 2;

/// Widest raw value the decoder can hold (a big-endian u64).
pub const MAX_ITEM_WIDTH: usize = 8;

/// One catalogued data item: semantic name plus fixed byte width.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemDescriptor {
    pub name: String,
    pub width: usize,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("item \"{name}\" at FSPEC index {index} has invalid width {width} (must be 1..=8)")]
    BadWidth {
        index: u32,
        name: String,
        width: usize,
    },
}

/// Built-in CAT21 item table: FSPEC bit index, item name, byte width.
///
/// Indices follow the 1-based MSB-first enumeration of the concatenated
/// FSPEC bits in CAT21 UAP order.
const CAT21_ITEMS: &[(u32, &str, usize)] = &[
    (1, "Data Source Identification", 2),
    (2, "Target Report Descriptor", 1),
    (3, "Track Number", 2),
    (4, "Service Identification", 1),
    (5, "Time of Applicability for Position", 3),
    (6, "Position in WGS-84 Coordinates", 6),
    (7, "High-Resolution Position in WGS-84 Coordinates", 8),
    (8, "Time of Applicability for Velocity", 3),
    (9, "Air Speed", 2),
    (10, "True Airspeed", 2),
    (11, "Target Address", 3),
    (12, "Time of Message Reception for Position", 3),
    (13, "Time of Message Reception for Position - High Precision", 4),
    (14, "Time of Message Reception for Velocity", 3),
    (15, "Time of Message Reception for Velocity - High Precision", 4),
    (16, "Geometric Height", 2),
    (17, "Quality Indicators", 1),
    (18, "MOPS Version", 1),
    (19, "Mode 3/A Code", 2),
    (20, "Roll Angle", 2),
    (21, "Flight Level", 2),
    (22, "Magnetic Heading", 2),
    (23, "Target Status", 1),
    (24, "Barometric Vertical Rate", 2),
    (25, "Geometric Vertical Rate", 2),
    (26, "Airborne Ground Vector", 4),
    (27, "Track Angle Rate", 2),
    (28, "Time of Report Transmission", 3),
];

/// Built-in CAT21 scaling table: item name, LSB in engineering units.
///
/// Time items are 1/128 s, heights and vertical rates 6.25 ft, flight
/// level 1/4 FL, heading 360/2^16 degrees, track angle rate 1/32 deg/s.
const CAT21_LSB: &[(&str, f64)] = &[
    ("Time of Applicability for Position", 1.0 / 128.0),
    ("Time of Applicability for Velocity", 1.0 / 128.0),
    ("Time of Message Reception for Position", 1.0 / 128.0),
    ("Time of Message Reception for Velocity", 1.0 / 128.0),
    ("Time of Report Transmission", 1.0 / 128.0),
    ("Geometric Height", 6.25),
    ("Roll Angle", 0.01),
    ("Flight Level", 0.25),
    ("Magnetic Heading", 360.0 / 65536.0),
    ("Barometric Vertical Rate", 6.25),
    ("Geometric Vertical Rate", 6.25),
    ("Track Angle Rate", 1.0 / 32.0),
];

/// Immutable item catalog plus scaling table for one ASTERIX category.
///
/// Never mutated after construction, so it can be shared freely between
/// decode calls and threads.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: HashMap<u32, ItemDescriptor>,
    scaling: HashMap<String, f64>,
}

/// On-disk catalog layout:
/// `{ "items": { "<index>": { "name": ..., "width": ... } }, "scaling": { "<name>": lsb } }`
#[derive(Deserialize)]
struct CatalogFile {
    items: HashMap<u32, ItemDescriptor>,
    #[serde(default)]
    scaling: HashMap<String, f64>,
}

impl Catalog {
    /// Build a catalog from explicit tables, validating item widths.
    pub fn new(
        items: HashMap<u32, ItemDescriptor>,
        scaling: HashMap<String, f64>,
    ) -> Result<Self, CatalogError> {
        for (&index, desc) in &items {
            if desc.width == 0 || desc.width > MAX_ITEM_WIDTH {
                return Err(CatalogError::BadWidth {
                    index,
                    name: desc.name.clone(),
                    width: desc.width,
                });
            }
        }
        Ok(Self { items, scaling })
    }

    /// The built-in CAT21 table.
    pub fn cat21() -> Self {
        let items = CAT21_ITEMS
            .iter()
            .map(|&(index, name, width)| {
                (
                    index,
                    ItemDescriptor {
                        name: name.to_string(),
                        width,
                    },
                )
            })
            .collect();
        let scaling = CAT21_LSB
            .iter()
            .map(|&(name, lsb)| (name.to_string(), lsb))
            .collect();
        Self { items, scaling }
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Parse a catalog from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.items, file.scaling)
    }

    /// Resolve an FSPEC bit index to `(name, width)`.
    ///
    /// Unmapped indices fall back to `"Unknown Data Item {index}"` with a
    /// width of [`UNKNOWN_ITEM_WIDTH`] bytes. This is deliberate policy:
    /// without an extended catalog there is no other width information, and
    /// treating the bit as an error would abort otherwise decodable records.
    pub fn descriptor(&self, index: u32) -> (String, usize) {
        match self.items.get(&index) {
            Some(desc) => (desc.name.clone(), desc.width),
            None => (format!("Unknown Data Item {}", index), UNKNOWN_ITEM_WIDTH),
        }
    }

    /// LSB multiplier for an item name, if the item is scaled.
    pub fn lsb(&self, name: &str) -> Option<f64> {
        self.scaling.get(name).copied()
    }

    /// Number of catalogued items.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cat21_lookup() {
        let catalog = Catalog::cat21();
        assert_eq!(
            catalog.descriptor(1),
            ("Data Source Identification".to_string(), 2)
        );
        assert_eq!(catalog.descriptor(11), ("Target Address".to_string(), 3));
        assert_eq!(catalog.descriptor(21), ("Flight Level".to_string(), 2));
    }

    #[test]
    fn test_unknown_fallback() {
        let catalog = Catalog::cat21();
        let (name, width) = catalog.descriptor(999);
        assert_eq!(name, "Unknown Data Item 999");
        assert_eq!(width, UNKNOWN_ITEM_WIDTH);
    }

    #[test]
    fn test_lsb_lookup() {
        let catalog = Catalog::cat21();
        assert_eq!(catalog.lsb("Flight Level"), Some(0.25));
        assert_eq!(catalog.lsb("Geometric Height"), Some(6.25));
        assert_eq!(catalog.lsb("Track Number"), None);
        assert_eq!(catalog.lsb("no such item"), None);
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "items": {
                "1": { "name": "Alpha", "width": 1 },
                "3": { "name": "Beta", "width": 2 }
            },
            "scaling": { "Beta": 0.5 }
        }"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.descriptor(1), ("Alpha".to_string(), 1));
        assert_eq!(catalog.descriptor(3), ("Beta".to_string(), 2));
        assert_eq!(catalog.lsb("Beta"), Some(0.5));
        // Scaling section is optional
        let catalog = Catalog::from_json_str(r#"{ "items": {} }"#).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_rejects_bad_widths() {
        let zero = r#"{ "items": { "2": { "name": "Bad", "width": 0 } } }"#;
        assert!(matches!(
            Catalog::from_json_str(zero),
            Err(CatalogError::BadWidth { width: 0, .. })
        ));

        let wide = r#"{ "items": { "2": { "name": "Bad", "width": 9 } } }"#;
        assert!(matches!(
            Catalog::from_json_str(wide),
            Err(CatalogError::BadWidth { width: 9, .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Catalog::from_json_str("not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
