//! ONF bundle extension: staging groups of messages that commit
//! atomically.
//!
//! Bundles are framed as ONF experimenter messages. A bundle-add
//! carries a complete inner message, header and all, with its own xid;
//! the property list that may follow it is realigned to 8 bytes because
//! the inner message ends wherever its length says.

use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::warn;

use crate::bits::{bit, test_bit};
use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::{expect_experimenter, UnknownCodecPolicy};
use crate::ofp_header::Version;
use crate::openflow0x04::{decode_from, encode_into, Message, MsgType};
use crate::registry::{CodecKey, CodecRegistry, Decoder, Encoder};

pub const ONF_EXPERIMENTER_ID: u32 = 0x4f4e_4600;

pub const ONF_ET_BUNDLE_CONTROL: u32 = 2300;
pub const ONF_ET_BUNDLE_ADD_MESSAGE: u32 = 2301;

/// Experimenter bundle property type.
pub const OFPBPT_EXPERIMENTER: u16 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum BundleCtrlType {
    OpenRequest = 0,
    OpenReply = 1,
    CloseRequest = 2,
    CloseReply = 3,
    CommitRequest = 4,
    CommitReply = 5,
    DiscardRequest = 6,
    DiscardReply = 7,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleFlags {
    pub atomic: bool,
    pub ordered: bool,
}

impl BundleFlags {
    fn marshal(&self) -> u16 {
        let mut v = 0u64;
        v = bit(0, v, self.atomic);
        v = bit(1, v, self.ordered);
        v as u16
    }

    fn parse(v: u16) -> BundleFlags {
        let v = u64::from(v);
        BundleFlags {
            atomic: test_bit(0, v),
            ordered: test_bit(1, v),
        }
    }
}

/// Vendor-defined bundle property. Only the experimenter property type
/// is modeled; others are skipped on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleProperty {
    pub experimenter: u32,
    pub exp_type: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleControl {
    pub bundle_id: u32,
    pub ctrl_type: BundleCtrlType,
    pub flags: BundleFlags,
    pub properties: Vec<BundleProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleAddMessage {
    pub bundle_id: u32,
    pub flags: BundleFlags,
    /// Transaction id of the bundled message itself; the envelope has
    /// its own.
    pub xid: u32,
    pub message: Box<Message>,
    pub properties: Vec<BundleProperty>,
}

fn encode_properties(
    properties: &[BundleProperty],
    cur: &mut EncodeCursor<'_>,
) -> Result<(), CodecError> {
    for prop in properties {
        let start = cur.pos();
        cur.write_u16(OFPBPT_EXPERIMENTER);
        let slot = cur.reserve_u16();
        cur.write_u32(prop.experimenter);
        cur.write_u32(prop.exp_type);
        cur.write_bytes(&prop.data);
        // property length excludes the pad that follows it
        cur.patch_length(slot, start);
        cur.pad_to_multiple(start, 8);
    }
    Ok(())
}

fn decode_properties(cur: &mut DecodeCursor<'_>) -> Result<Vec<BundleProperty>, CodecError> {
    let mut out = vec![];
    while !cur.is_empty() {
        let mut peek = *cur;
        let prop_type = peek.read_u16()?;
        let declared = peek.read_u16()? as usize;
        if declared < 4 {
            return Err(CodecError::InvalidMessage {
                reason: "bundle property length shorter than the property header",
            });
        }
        let mut span = cur.slice(declared)?;
        span.skip(4)?;
        let pad = (8 - declared % 8) % 8;
        cur.skip(pad.min(cur.remaining()))?;
        if prop_type != OFPBPT_EXPERIMENTER {
            warn!(property = prop_type, "skipping unknown bundle property");
            continue;
        }
        let experimenter = span.read_u32()?;
        let exp_type = span.read_u32()?;
        let data = span.rest().to_vec();
        out.push(BundleProperty {
            experimenter,
            exp_type,
            data,
        });
    }
    Ok(out)
}

fn encode_experimenter_message(
    msg: &Message,
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
) -> Result<(), CodecError> {
    match msg {
        Message::Experimenter(em) => {
            cur.write_u32(em.experimenter);
            cur.write_u32(em.exp_type);
            cur.write_bytes(&em.data);
            Ok(())
        }
        Message::BundleControl(bc) => {
            cur.write_u32(ONF_EXPERIMENTER_ID);
            cur.write_u32(ONF_ET_BUNDLE_CONTROL);
            cur.write_u32(bc.bundle_id);
            cur.write_u16(bc.ctrl_type.into());
            cur.write_u16(bc.flags.marshal());
            encode_properties(&bc.properties, cur)
        }
        Message::BundleAddMessage(bam) => {
            cur.write_u32(ONF_EXPERIMENTER_ID);
            cur.write_u32(ONF_ET_BUNDLE_ADD_MESSAGE);
            cur.write_u32(bam.bundle_id);
            cur.write_zero(2);
            cur.write_u16(bam.flags.marshal());
            let inner_start = cur.pos();
            encode_into(reg, Version::V1_3, bam.xid, &bam.message, cur)?;
            cur.pad_to_multiple(inner_start, 8);
            encode_properties(&bam.properties, cur)
        }
        _ => Err(CodecError::InvalidMessage {
            reason: "message variant does not match its registered type code",
        }),
    }
}

fn decode_bundle_control(cur: &mut DecodeCursor<'_>) -> Result<Message, CodecError> {
    let experimenter = cur.read_u32()?;
    expect_experimenter(experimenter, ONF_EXPERIMENTER_ID)?;
    let _exp_type = cur.read_u32()?;
    let bundle_id = cur.read_u32()?;
    let ctrl_type = BundleCtrlType::try_from(cur.read_u16()?).map_err(|_| {
        CodecError::InvalidMessage {
            reason: "unknown bundle control type",
        }
    })?;
    let flags = BundleFlags::parse(cur.read_u16()?);
    let properties = decode_properties(cur)?;
    Ok(Message::BundleControl(BundleControl {
        bundle_id,
        ctrl_type,
        flags,
        properties,
    }))
}

fn decode_bundle_add(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    policy: UnknownCodecPolicy,
) -> Result<Message, CodecError> {
    let experimenter = cur.read_u32()?;
    expect_experimenter(experimenter, ONF_EXPERIMENTER_ID)?;
    let _exp_type = cur.read_u32()?;
    let bundle_id = cur.read_u32()?;
    cur.skip(2)?;
    let flags = BundleFlags::parse(cur.read_u16()?);
    let inner = decode_from(reg, cur, policy)?;
    if inner.version != Version::V1_3 {
        return Err(CodecError::InvalidMessage {
            reason: "bundled message version differs from the envelope",
        });
    }
    if !cur.is_empty() {
        let pad = (8 - inner.consumed % 8) % 8;
        cur.skip(pad.min(cur.remaining()))?;
    }
    let properties = decode_properties(cur)?;
    Ok(Message::BundleAddMessage(BundleAddMessage {
        bundle_id,
        flags,
        xid: inner.xid,
        message: Box::new(inner.message),
        properties,
    }))
}

fn control_key() -> CodecKey {
    CodecKey::Experimenter {
        version: Version::V1_3,
        experimenter: ONF_EXPERIMENTER_ID,
        subtype: Some(ONF_ET_BUNDLE_CONTROL),
    }
}

fn add_message_key() -> CodecKey {
    CodecKey::Experimenter {
        version: Version::V1_3,
        experimenter: ONF_EXPERIMENTER_ID,
        subtype: Some(ONF_ET_BUNDLE_ADD_MESSAGE),
    }
}

/// Install the bundle codecs. The experimenter message encoder for the
/// protocol is replaced wholesale so the bundle variants become
/// encodable; the replacement still handles plain experimenter
/// messages.
pub fn register(reg: &CodecRegistry) {
    reg.register_encoder(
        CodecKey::Message {
            version: Version::V1_3,
            msg_type: MsgType::Experimenter.into(),
        },
        Encoder::Message(Arc::new(encode_experimenter_message)),
    );
    reg.register_decoder(
        control_key(),
        Decoder::Message(Arc::new(|cur, _reg, _policy| decode_bundle_control(cur))),
    );
    reg.register_decoder(
        add_message_key(),
        Decoder::Message(Arc::new(|cur, reg, policy| {
            decode_bundle_add(cur, reg, policy)
        })),
    );
}

/// Remove the bundle decoders. The experimenter message encoder stays
/// in place; it degrades to the same behavior for non-bundle traffic.
pub fn unregister(reg: &CodecRegistry) {
    reg.unregister(&control_key());
    reg.unregister(&add_message_key());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionKind, Instruction};
    use crate::openflow0x04::{
        decode_message, encode_message, register_core_codecs, ExperimenterMessage, FlowMod,
        OFPP_ANY,
    };
    use crate::oxm::{Ipv4Prefix, Match};

    fn test_registry() -> CodecRegistry {
        let reg = CodecRegistry::new();
        register_core_codecs(&reg);
        register(&reg);
        reg
    }

    #[test]
    fn bundle_control_byte_exact() {
        let reg = test_registry();
        let msg = Message::BundleControl(BundleControl {
            bundle_id: 1,
            ctrl_type: BundleCtrlType::OpenRequest,
            flags: BundleFlags {
                atomic: true,
                ordered: false,
            },
            properties: vec![],
        });
        let mut buf = vec![];
        encode_message(&reg, Version::V1_3, 9, &msg, &mut buf).unwrap();
        assert_eq!(
            buf,
            [
                0x04, 0x04, 0x00, 0x18, 0x00, 0x00, 0x00, 0x09, // header
                0x4f, 0x4e, 0x46, 0x00, // ONF
                0x00, 0x00, 0x08, 0xfc, // bundle control
                0x00, 0x00, 0x00, 0x01, // bundle id
                0x00, 0x00, // open request
                0x00, 0x01, // atomic
            ]
        );
    }

    #[test]
    fn all_control_types_roundtrip() {
        let reg = test_registry();
        for ctrl_type in [
            BundleCtrlType::OpenRequest,
            BundleCtrlType::OpenReply,
            BundleCtrlType::CloseRequest,
            BundleCtrlType::CloseReply,
            BundleCtrlType::CommitRequest,
            BundleCtrlType::CommitReply,
            BundleCtrlType::DiscardRequest,
            BundleCtrlType::DiscardReply,
        ] {
            let msg = Message::BundleControl(BundleControl {
                bundle_id: 77,
                ctrl_type,
                flags: BundleFlags {
                    atomic: false,
                    ordered: true,
                },
                properties: vec![],
            });
            let mut buf = vec![];
            encode_message(&reg, Version::V1_3, 1, &msg, &mut buf).unwrap();
            let decoded = decode_message(&reg, &buf, UnknownCodecPolicy::Fail).unwrap();
            assert_eq!(decoded.message, msg);
        }
    }

    #[test]
    fn bundle_add_carries_a_complete_inner_message() {
        let reg = test_registry();
        let mut fm = FlowMod::add();
        let mut m = Match::new();
        m.ipv4_dst = Some(Ipv4Prefix::parse("10.0.0.0/24").unwrap());
        fm.match_fields = Some(m);
        fm.out_port = Some(OFPP_ANY);
        fm.instructions = vec![Instruction::ApplyActions(vec![Action::new(
            0,
            ActionKind::DecNwTtl,
        )])];
        let msg = Message::BundleAddMessage(BundleAddMessage {
            bundle_id: 3,
            flags: BundleFlags {
                atomic: true,
                ordered: true,
            },
            xid: 555,
            message: Box::new(Message::FlowMod(fm.clone())),
            properties: vec![],
        });
        let mut buf = vec![];
        encode_message(&reg, Version::V1_3, 100, &msg, &mut buf).unwrap();
        let decoded = decode_message(&reg, &buf, UnknownCodecPolicy::Fail).unwrap();
        // the envelope and the bundled message keep separate xids
        assert_eq!(decoded.xid, 100);
        match &decoded.message {
            Message::BundleAddMessage(bam) => assert_eq!(bam.xid, 555),
            other => panic!("unexpected message: {:?}", other),
        }
        // absent flow-mod optionals come back as their wire defaults
        let expected = Message::BundleAddMessage(BundleAddMessage {
            bundle_id: 3,
            flags: BundleFlags {
                atomic: true,
                ordered: true,
            },
            xid: 555,
            message: Box::new(Message::FlowMod(fm.defaulted())),
            properties: vec![],
        });
        assert_eq!(decoded.message, expected);
    }

    #[test]
    fn properties_roundtrip_with_padding() {
        let reg = test_registry();
        let msg = Message::BundleControl(BundleControl {
            bundle_id: 8,
            ctrl_type: BundleCtrlType::CommitRequest,
            flags: BundleFlags::default(),
            properties: vec![BundleProperty {
                experimenter: 0x0000_2320,
                exp_type: 1,
                data: vec![0xab, 0xcd, 0xef], // 15 bytes on the wire, padded to 16
            }],
        });
        let mut buf = vec![];
        encode_message(&reg, Version::V1_3, 4, &msg, &mut buf).unwrap();
        let decoded = decode_message(&reg, &buf, UnknownCodecPolicy::Fail).unwrap();
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn unknown_properties_are_skipped() {
        let reg = test_registry();
        let msg = Message::BundleControl(BundleControl {
            bundle_id: 2,
            ctrl_type: BundleCtrlType::OpenRequest,
            flags: BundleFlags::default(),
            properties: vec![],
        });
        let mut buf = vec![];
        encode_message(&reg, Version::V1_3, 6, &msg, &mut buf).unwrap();
        // append a property of type 1, 8 bytes, then fix the frame length
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x08, 0, 0, 0, 0]);
        let total = buf.len() as u16;
        buf[2..4].copy_from_slice(&total.to_be_bytes());
        let decoded = decode_message(&reg, &buf, UnknownCodecPolicy::Fail).unwrap();
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn bundle_encoding_requires_registration() {
        let reg = CodecRegistry::new();
        register_core_codecs(&reg);
        let msg = Message::BundleControl(BundleControl {
            bundle_id: 1,
            ctrl_type: BundleCtrlType::OpenRequest,
            flags: BundleFlags::default(),
            properties: vec![],
        });
        let mut buf = vec![];
        let err = encode_message(&reg, Version::V1_3, 1, &msg, &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::InvalidMessage { .. }));
    }

    #[test]
    fn plain_experimenter_messages_still_encode_after_registration() {
        let reg = test_registry();
        let msg = Message::Experimenter(ExperimenterMessage {
            experimenter: 0x0000_2320,
            exp_type: 5,
            data: vec![1, 2, 3],
        });
        let mut buf = vec![];
        encode_message(&reg, Version::V1_3, 2, &msg, &mut buf).unwrap();
        let decoded = decode_message(&reg, &buf, UnknownCodecPolicy::Skip).unwrap();
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn unregister_turns_bundles_back_into_raw_experimenter_frames() {
        let reg = test_registry();
        let msg = Message::BundleControl(BundleControl {
            bundle_id: 1,
            ctrl_type: BundleCtrlType::OpenRequest,
            flags: BundleFlags::default(),
            properties: vec![],
        });
        let mut buf = vec![];
        encode_message(&reg, Version::V1_3, 1, &msg, &mut buf).unwrap();
        unregister(&reg);
        let decoded = decode_message(&reg, &buf, UnknownCodecPolicy::Skip).unwrap();
        match decoded.message {
            Message::Experimenter(em) => {
                assert_eq!(em.experimenter, ONF_EXPERIMENTER_ID);
                assert_eq!(em.exp_type, ONF_ET_BUNDLE_CONTROL);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
