//! ASTERIX CAT21 record decoder
//!
//! Decodes one record from its hex representation: category and length
//! header, FSPEC continuation-bit walk, then the data items the FSPEC
//! bits announce, each read as a big-endian unsigned integer and scaled
//! by its LSB where the catalog defines one.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::record::{Cat21Record, DataItem, ItemValue, SkippedItem};

/// Minimum well-formed record: category byte plus 16-bit length.
pub const MIN_RECORD_BYTES: usize = 3;

/// Offset of the first FSPEC byte (after CAT and LEN).
const FSPEC_OFFSET: usize = 3;

/// Whole-decode failures. The caller receives no items, only the kind.
///
/// Missing data for a single item is not an error: the item is skipped,
/// recorded in [`Cat21Record::skipped`], and extraction continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Input string is not valid hexadecimal.
    #[error("malformed hex input: {0}")]
    MalformedHex(String),
    /// Fewer than 3 bytes after hex decode.
    #[error("packet too short: {len} bytes, need at least 3")]
    PacketTooShort { len: usize },
    /// No FSPEC bytes after the header.
    #[error("no FSPEC bytes found after header")]
    NoFspec,
}

/// CAT21 record decoder with an injected item catalog.
///
/// Each decode call is a pure computation over its input; the catalog is
/// read-only, so one decoder can serve any number of threads.
pub struct Cat21Decoder {
    catalog: Catalog,
}

impl Cat21Decoder {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Decoder with the built-in CAT21 table.
    pub fn with_default_catalog() -> Self {
        Self::new(Catalog::cat21())
    }

    /// Decode one record from a hex string (case-insensitive, surrounding
    /// whitespace ignored).
    pub fn decode_hex(&self, hex: &str) -> Result<Cat21Record, DecodeError> {
        let bytes = parse_hex(hex.trim())?;
        self.decode(&bytes)
    }

    /// Decode one record from raw bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<Cat21Record, DecodeError> {
        if bytes.len() < MIN_RECORD_BYTES {
            return Err(DecodeError::PacketTooShort { len: bytes.len() });
        }

        let category = bytes[0];
        let length = u16::from_be_bytes([bytes[1], bytes[2]]);

        // FSPEC: bit 7 of each byte is the continuation flag. The scan
        // stops after the first byte with the flag clear, or when the
        // packet ends.
        let mut fspec = Vec::new();
        let mut index = FSPEC_OFFSET;
        while index < bytes.len() {
            let b = bytes[index];
            fspec.push(b);
            index += 1;
            if b & 0x80 == 0 {
                break;
            }
        }
        if fspec.is_empty() {
            return Err(DecodeError::NoFspec);
        }

        let mut record = Cat21Record::new(category, length, bytes.to_vec(), fspec.clone());

        // Walk the full concatenated bit sequence, 1-based, MSB first.
        // Every set bit resolves an item through the catalog; items are
        // extracted in bit order, which is also data byte order.
        let mut cursor = index;
        for (byte_idx, &fspec_byte) in fspec.iter().enumerate() {
            for bit in 0..8 {
                if fspec_byte & (0x80 >> bit) == 0 {
                    continue;
                }
                let bit_index = (byte_idx * 8 + bit + 1) as u32;
                let (name, width) = self.catalog.descriptor(bit_index);

                if cursor + width > bytes.len() {
                    // Best-effort truncation: skip this item, keep going.
                    record.skipped.push(SkippedItem {
                        name,
                        needed: width,
                        available: bytes.len() - cursor,
                    });
                    continue;
                }

                let raw = bytes[cursor..cursor + width]
                    .iter()
                    .fold(0u64, |acc, &b| (acc << 8) | b as u64);
                cursor += width;

                let value = match self.catalog.lsb(&name) {
                    Some(lsb) => ItemValue::Scaled(round6(raw as f64 * lsb)),
                    None => ItemValue::Raw(raw),
                };
                record.items.push(DataItem { name, raw, value });
            }
        }

        Ok(record)
    }
}

/// Round to 6 fractional digits.
fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Parse a hex string into bytes.
///
/// Rejects odd-length input and non-hex digits.
fn parse_hex(hex: &str) -> Result<Vec<u8>, DecodeError> {
    if hex.len() % 2 != 0 {
        return Err(DecodeError::MalformedHex(format!(
            "odd number of digits ({})",
            hex.len()
        )));
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let high = hex_digit_val(chunk[0]);
        let low = hex_digit_val(chunk[1]);
        match (high, low) {
            (Some(h), Some(l)) => bytes.push((h << 4) | l),
            _ => {
                return Err(DecodeError::MalformedHex(format!(
                    "invalid hex digit at byte {}",
                    i
                )));
            }
        }
    }
    Ok(bytes)
}

fn hex_digit_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemDescriptor;
    use std::collections::HashMap;

    /// Small catalog with known indices, independent of the CAT21 table.
    fn test_catalog() -> Catalog {
        let items: HashMap<u32, ItemDescriptor> = [
            (2, ("Alpha", 1)),
            (3, ("Beta", 2)),
            (4, ("Wide", 4)),
            (5, ("Narrow", 1)),
        ]
        .into_iter()
        .map(|(index, (name, width))| {
            (
                index,
                ItemDescriptor {
                    name: name.to_string(),
                    width,
                },
            )
        })
        .collect();
        let scaling = [("Beta".to_string(), 0.25)].into_iter().collect();
        Catalog::new(items, scaling).unwrap()
    }

    fn test_decoder() -> Cat21Decoder {
        Cat21Decoder::new(test_catalog())
    }

    #[test]
    fn test_hex_digit_val() {
        assert_eq!(hex_digit_val(b'0'), Some(0));
        assert_eq!(hex_digit_val(b'9'), Some(9));
        assert_eq!(hex_digit_val(b'a'), Some(10));
        assert_eq!(hex_digit_val(b'F'), Some(15));
        assert_eq!(hex_digit_val(b'g'), None);
    }

    #[test]
    fn test_malformed_hex() {
        let decoder = test_decoder();
        assert!(matches!(
            decoder.decode_hex("150"),
            Err(DecodeError::MalformedHex(_))
        ));
        assert!(matches!(
            decoder.decode_hex("15zz00"),
            Err(DecodeError::MalformedHex(_))
        ));
    }

    #[test]
    fn test_hex_is_case_insensitive_and_trimmed() {
        let decoder = test_decoder();
        let upper = decoder.decode_hex("15000A602A0005").unwrap();
        let lower = decoder.decode_hex("  15000a602a0005\n").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_packet_too_short() {
        let decoder = test_decoder();
        assert_eq!(
            decoder.decode_hex("1500"),
            Err(DecodeError::PacketTooShort { len: 2 })
        );
        assert_eq!(
            decoder.decode(&[]),
            Err(DecodeError::PacketTooShort { len: 0 })
        );
    }

    #[test]
    fn test_no_fspec() {
        let decoder = test_decoder();
        assert_eq!(decoder.decode_hex("150007"), Err(DecodeError::NoFspec));
    }

    #[test]
    fn test_header_extraction() {
        let decoder = test_decoder();
        let record = decoder.decode_hex("15002000").unwrap();
        assert_eq!(record.category, 0x15);
        assert_eq!(record.length, 0x0020);
        // Declared length is reported, not enforced: 4 actual bytes pass.
        assert!(record.is_empty());
    }

    #[test]
    fn test_fspec_terminates_on_clear_continuation_bit() {
        let decoder = test_decoder();
        // 0x60: bits 2 and 3 set, continuation clear. Everything after it
        // is data, not FSPEC.
        let record = decoder.decode_hex("15000A602A0005").unwrap();
        assert_eq!(record.fspec, vec![0x60]);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_extraction_and_scaling() {
        let decoder = test_decoder();
        // FSPEC 0x60 -> Alpha (1 byte), Beta (2 bytes, LSB 0.25)
        let record = decoder.decode_hex("15000A602A0005").unwrap();
        assert_eq!(record.get("Alpha"), Some(&ItemValue::Raw(0x2A)));
        assert_eq!(record.get("Beta"), Some(&ItemValue::Scaled(1.25)));
        assert_eq!(record.items[0].name, "Alpha");
        assert_eq!(record.items[1].name, "Beta");
        assert_eq!(record.items[1].raw, 5);
    }

    #[test]
    fn test_scaling_rounds_to_six_digits() {
        // Raw 1 at LSB 1/3 would be 0.333333... -> 0.333333
        let items = [(
            2,
            ItemDescriptor {
                name: "Ratio".to_string(),
                width: 1,
            },
        )]
        .into_iter()
        .collect();
        let scaling = [("Ratio".to_string(), 1.0 / 3.0)].into_iter().collect();
        let decoder = Cat21Decoder::new(Catalog::new(items, scaling).unwrap());
        let record = decoder.decode_hex("1500054001").unwrap();
        assert_eq!(record.get("Ratio"), Some(&ItemValue::Scaled(0.333333)));
    }

    #[test]
    fn test_truncated_item_is_skipped_earlier_items_kept() {
        let decoder = test_decoder();
        // FSPEC 0x60 -> Alpha then Beta, but only one data byte remains.
        let record = decoder.decode_hex("15000A602A").unwrap();
        assert_eq!(record.get("Alpha"), Some(&ItemValue::Raw(0x2A)));
        assert_eq!(record.get("Beta"), None);
        assert_eq!(record.skipped.len(), 1);
        assert_eq!(record.skipped[0].name, "Beta");
        assert_eq!(record.skipped[0].needed, 2);
        assert_eq!(record.skipped[0].available, 0);
    }

    #[test]
    fn test_extraction_continues_past_skipped_item() {
        let decoder = test_decoder();
        // FSPEC 0x18: bits 4 (Wide, 4 bytes) and 5 (Narrow, 1 byte).
        // One data byte: Wide is skipped, Narrow still decodes from it.
        let record = decoder.decode_hex("1500051807").unwrap();
        assert_eq!(record.get("Wide"), None);
        assert_eq!(record.get("Narrow"), Some(&ItemValue::Raw(7)));
        assert_eq!(record.skipped[0].name, "Wide");
        assert_eq!(record.skipped[0].available, 1);
    }

    #[test]
    fn test_unknown_item_fallback() {
        let decoder = test_decoder();
        // FSPEC 0x02: bit 7 set, no catalog entry -> 2-byte unknown item.
        let record = decoder.decode_hex("15000702ABCD").unwrap();
        assert_eq!(
            record.get("Unknown Data Item 7"),
            Some(&ItemValue::Raw(0xABCD))
        );
    }

    #[test]
    fn test_multi_byte_fspec_bit_indexing() {
        let decoder = test_decoder();
        // FSPEC 0xE0 0x40: continuation set on the first byte, so the
        // second byte's bits count from index 9. Set bits: 1, 2, 3, 10.
        // Indices 1 and 10 are uncatalogued (2 bytes each), 2 is Alpha,
        // 3 is Beta.
        let record = decoder.decode_hex("15000DE0400001112A000400FF").unwrap();
        assert_eq!(
            record.get("Unknown Data Item 1"),
            Some(&ItemValue::Raw(0x0001))
        );
        assert_eq!(record.get("Alpha"), Some(&ItemValue::Raw(0x11)));
        assert_eq!(
            record.get("Beta"),
            Some(&ItemValue::Scaled(round6(0x2A00 as f64 * 0.25)))
        );
        assert_eq!(
            record.get("Unknown Data Item 10"),
            Some(&ItemValue::Raw(0x0400))
        );
        let names: Vec<&str> = record.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Unknown Data Item 1", "Alpha", "Beta", "Unknown Data Item 10"]
        );
    }

    #[test]
    fn test_fspec_scan_stops_at_end_of_packet() {
        let decoder = test_decoder();
        // Continuation bit set but the packet ends: the FSPEC is the one
        // byte read, and its set bits have no data bytes to consume.
        let record = decoder.decode_hex("150004E0").unwrap();
        assert_eq!(record.fspec, vec![0xE0]);
        assert!(record.is_empty());
        assert_eq!(record.skipped.len(), 3);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let decoder = test_decoder();
        let a = decoder.decode_hex("15000DE0400001112A000400FF").unwrap();
        let b = decoder.decode_hex("15000DE0400001112A000400FF").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_catalog_decode() {
        let decoder = Cat21Decoder::with_default_catalog();
        // FSPEC 0x08 -> bit 5, Time of Applicability for Position,
        // 3 bytes, LSB 1/128 s. Raw 0x010000 = 65536 -> 512 s.
        let record = decoder.decode_hex("15000708010000").unwrap();
        assert_eq!(
            record.get("Time of Applicability for Position"),
            Some(&ItemValue::Scaled(512.0))
        );

        // FSPEC 0x40 -> bit 2, Target Report Descriptor, raw byte.
        let record = decoder.decode_hex("15000540A3").unwrap();
        assert_eq!(
            record.get("Target Report Descriptor"),
            Some(&ItemValue::Raw(0xA3))
        );
    }
}
