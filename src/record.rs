//! Decoded CAT21 record types
//!
//! A record is the ordered list of data items extracted from one packet,
//! plus the diagnostics for items the packet was too short to satisfy.

use std::fmt;

use serde::Serialize;
use serde_json::json;

/// Value of one decoded data item.
///
/// Items with a scaling table entry carry the LSB-scaled engineering value
/// rounded to 6 fractional digits; all others carry the raw integer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ItemValue {
    Raw(u64),
    Scaled(f64),
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Raw(v) => write!(f, "{}", v),
            ItemValue::Scaled(v) => write!(f, "{}", v),
        }
    }
}

/// One decoded data item in FSPEC bit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataItem {
    pub name: String,
    /// Big-endian unsigned value of the item's bytes, before scaling.
    pub raw: u64,
    pub value: ItemValue,
}

/// A data item skipped because the packet ended before its declared width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    pub name: String,
    pub needed: usize,
    pub available: usize,
}

/// Decoded CAT21 record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cat21Record {
    /// Category byte from the header.
    pub category: u8,
    /// Declared record length from the header; reported, not enforced
    /// against the actual packet size.
    pub length: u16,
    /// Raw packet bytes as received.
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// FSPEC bytes (header excluded).
    #[serde(skip)]
    pub fspec: Vec<u8>,
    /// Decoded items, in FSPEC bit order.
    pub items: Vec<DataItem>,
    /// Items present in the FSPEC but not satisfiable from the data bytes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
}

impl Cat21Record {
    pub fn new(category: u8, length: u16, raw: Vec<u8>, fspec: Vec<u8>) -> Self {
        Self {
            category,
            length,
            raw,
            fspec,
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Look up a decoded item by name.
    ///
    /// Names are unique within one record, so the first match is the match.
    pub fn get(&self, name: &str) -> Option<&ItemValue> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.value)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uppercase hex of the packet as received.
    pub fn raw_hex(&self) -> String {
        let mut s = String::with_capacity(self.raw.len() * 2);
        for b in &self.raw {
            s.push_str(&format!("{:02X}", b));
        }
        s
    }

    /// JSON object with the item name to value mapping.
    pub fn to_json(&self) -> serde_json::Value {
        let mut items = serde_json::Map::new();
        for item in &self.items {
            let value = match item.value {
                ItemValue::Raw(v) => json!(v),
                ItemValue::Scaled(v) => json!(v),
            };
            items.insert(item.name.clone(), value);
        }
        json!({
            "category": self.category,
            "length": self.length,
            "items": items,
        })
    }
}

impl fmt::Display for Cat21Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CAT {} record: {}", self.category, self.raw_hex())?;
        writeln!(f, "  Declared length : {} bytes", self.length)?;
        write!(f, "  FSPEC           :")?;
        for b in &self.fspec {
            write!(f, " {:02X}", b)?;
        }
        writeln!(f)?;

        for item in &self.items {
            writeln!(f, "  {:<47} : {}", item.name, item.value)?;
        }
        for skipped in &self.skipped {
            writeln!(
                f,
                "  {:<47} : skipped, needs {} bytes, {} remaining",
                skipped.name, skipped.needed, skipped.available
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Cat21Record {
        let mut record = Cat21Record::new(21, 10, vec![0x15, 0x00, 0x0A, 0x60], vec![0x60]);
        record.items.push(DataItem {
            name: "Track Number".to_string(),
            raw: 4242,
            value: ItemValue::Raw(4242),
        });
        record.items.push(DataItem {
            name: "Flight Level".to_string(),
            raw: 1400,
            value: ItemValue::Scaled(350.0),
        });
        record
    }

    #[test]
    fn test_get_by_name() {
        let record = sample();
        assert_eq!(record.get("Track Number"), Some(&ItemValue::Raw(4242)));
        assert_eq!(record.get("Flight Level"), Some(&ItemValue::Scaled(350.0)));
        assert_eq!(record.get("Roll Angle"), None);
    }

    #[test]
    fn test_raw_hex() {
        let record = sample();
        assert_eq!(record.raw_hex(), "15000A60");
    }

    #[test]
    fn test_to_json_shape() {
        let record = sample();
        let json = record.to_json();
        assert_eq!(json["category"], 21);
        assert_eq!(json["length"], 10);
        assert_eq!(json["items"]["Track Number"], 4242);
        assert_eq!(json["items"]["Flight Level"], 350.0);
    }

    #[test]
    fn test_display_lists_items_and_skips() {
        let mut record = sample();
        record.skipped.push(SkippedItem {
            name: "Target Address".to_string(),
            needed: 3,
            available: 1,
        });
        let text = record.to_string();
        assert!(text.contains("CAT 21 record"));
        assert!(text.contains("Track Number"));
        assert!(text.contains("350"));
        assert!(text.contains("skipped, needs 3 bytes, 1 remaining"));
    }
}
