//! Ericsson experimenter match fields.
//!
//! Experimenter-class OXM entries carry a 4-byte vendor id between the
//! TLV header and the value, and the header length byte covers that id
//! too, so these fields cannot use the fixed-width entry decoder.

use std::sync::Arc;

use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::expect_experimenter;
use crate::ofp_header::Version;
use crate::oxm::{MatchEntry, OxmHeader, EXPERIMENTER_CLASS};
use crate::registry::{CodecKey, CodecRegistry, Decoder, Encoder};

pub const ERICSSON_EXP_ID: u32 = 0x0000_d0f0;

pub const ICMPV6_ND_RESERVED: u8 = 1;
pub const ICMPV6_ND_OPTIONS_TYPE: u8 = 2;

const FIELD_WIDTHS: [(u8, usize); 2] = [(ICMPV6_ND_RESERVED, 4), (ICMPV6_ND_OPTIONS_TYPE, 1)];

pub fn nd_reserved_entry(reserved: u32) -> MatchEntry {
    MatchEntry {
        class: EXPERIMENTER_CLASS,
        field: ICMPV6_ND_RESERVED,
        has_mask: false,
        value: reserved.to_be_bytes().to_vec(),
        mask: None,
    }
}

pub fn nd_options_type_entry(options_type: u8) -> MatchEntry {
    MatchEntry {
        class: EXPERIMENTER_CLASS,
        field: ICMPV6_ND_OPTIONS_TYPE,
        has_mask: false,
        value: vec![options_type],
        mask: None,
    }
}

fn encode_entry(entry: &MatchEntry, cur: &mut EncodeCursor<'_>) -> Result<(), CodecError> {
    if let Some(mask) = &entry.mask {
        if mask.len() != entry.value.len() {
            return Err(CodecError::InvalidMessage {
                reason: "match entry mask length differs from value length",
            });
        }
    }
    let masked = entry.mask.is_some();
    cur.write_u16(EXPERIMENTER_CLASS);
    cur.write_u8((entry.field << 1) | masked as u8);
    let body = if masked {
        2 * entry.value.len()
    } else {
        entry.value.len()
    };
    cur.write_u8((4 + body) as u8);
    cur.write_u32(ERICSSON_EXP_ID);
    cur.write_bytes(&entry.value);
    if let Some(mask) = &entry.mask {
        cur.write_bytes(mask);
    }
    Ok(())
}

fn decode_entry(
    hdr: &OxmHeader,
    cur: &mut DecodeCursor<'_>,
    expected_value_len: usize,
) -> Result<MatchEntry, CodecError> {
    let experimenter = cur.read_u32()?;
    expect_experimenter(experimenter, ERICSSON_EXP_ID)?;
    let body = (hdr.length as usize)
        .checked_sub(4)
        .ok_or(CodecError::InvalidMessage {
            reason: "experimenter match entry shorter than its vendor id",
        })?;
    let value_len = if hdr.has_mask { body / 2 } else { body };
    if value_len != expected_value_len || (hdr.has_mask && body % 2 != 0) {
        return Err(CodecError::InvalidMessage {
            reason: "unexpected match entry value length",
        });
    }
    let value = cur.read_bytes(value_len)?.to_vec();
    let mask = if hdr.has_mask {
        Some(cur.read_bytes(value_len)?.to_vec())
    } else {
        None
    };
    Ok(MatchEntry {
        class: EXPERIMENTER_CLASS,
        field: hdr.field,
        has_mask: hdr.has_mask,
        value,
        mask,
    })
}

fn keys() -> [CodecKey; 2] {
    FIELD_WIDTHS.map(|(field, _)| CodecKey::MatchEntry {
        version: Version::V1_3,
        class: EXPERIMENTER_CLASS,
        field,
    })
}

pub fn register(reg: &CodecRegistry) {
    for (field, width) in FIELD_WIDTHS {
        let key = CodecKey::MatchEntry {
            version: Version::V1_3,
            class: EXPERIMENTER_CLASS,
            field,
        };
        reg.register_encoder(key, Encoder::MatchEntry(Arc::new(encode_entry)));
        reg.register_decoder(
            key,
            Decoder::MatchEntry(Arc::new(move |hdr, cur| decode_entry(hdr, cur, width))),
        );
    }
}

pub fn unregister(reg: &CodecRegistry) {
    for key in keys() {
        reg.unregister(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experimenter::UnknownCodecPolicy;
    use crate::oxm::{decode_match, encode_match, register_basic_entries, Match};

    fn test_registry() -> CodecRegistry {
        let reg = CodecRegistry::new();
        register_basic_entries(&reg, Version::V1_3);
        register(&reg);
        reg
    }

    #[test]
    fn nd_reserved_wire_layout() {
        let reg = test_registry();
        let mut m = Match::new();
        m.extensions.push(nd_reserved_entry(0xe000_0000));
        let mut buf = vec![];
        encode_match(&m, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3).unwrap();
        // 4 match header + 4 TLV header + 4 vendor id + 4 value = 16
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 16);
        assert_eq!(&buf[4..8], &[0xff, 0xff, 0x02, 0x08]);
        assert_eq!(&buf[8..12], &[0x00, 0x00, 0xd0, 0xf0]);
        assert_eq!(&buf[12..16], &[0xe0, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn experimenter_entries_roundtrip() {
        let reg = test_registry();
        let mut m = Match::new();
        m.ip_proto = Some(58);
        m.extensions.push(nd_reserved_entry(0));
        m.extensions.push(nd_options_type_entry(1));
        let mut buf = vec![];
        encode_match(&m, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3).unwrap();
        let decoded = decode_match(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn foreign_vendor_id_is_rejected() {
        let reg = test_registry();
        // nd-reserved TLV carrying the Nicira id instead
        let buf = [
            0x00, 0x01, 0x00, 0x10, 0xff, 0xff, 0x02, 0x08, 0x00, 0x00, 0x23, 0x20, 0, 0, 0, 0,
        ];
        let err = decode_match(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownExperimenter {
                expected: ERICSSON_EXP_ID,
                found: 0x0000_2320,
            }
        );
    }

    #[test]
    fn unregistered_fields_follow_the_policy() {
        let reg = test_registry();
        let mut m = Match::new();
        m.extensions.push(nd_options_type_entry(2));
        let mut buf = vec![];
        encode_match(&m, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3).unwrap();
        unregister(&reg);
        let err = decode_match(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::NoCodecForKey { .. }));
        let decoded = decode_match(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Skip,
        )
        .unwrap();
        assert!(decoded.extensions.is_empty());
    }
}
