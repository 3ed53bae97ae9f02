//! Nicira extension actions (register move / register load).
//!
//! Nicira subtypes are 2 bytes wide, not the 4 the generic layout
//! assumes, so the module registers one per-id dispatcher instead of
//! per-subtype codecs and demultiplexes the subtype itself.

use std::sync::Arc;

use crate::actions::{action_type, Action, ActionKind};
use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::expect_experimenter;
use crate::ofp_header::Version;
use crate::oxm::fixed_len_entry_decoder;
use crate::registry::{CodecKey, CodecRegistry, Decoder, Encoder};

pub const NX_VENDOR_ID: u32 = 0x0000_2320;

pub const NXAST_REG_MOVE: u16 = 6;
pub const NXAST_REG_LOAD: u16 = 7;

/// OXM class of the NXM match fields (registers, tunnel id).
pub const NXM_1_CLASS: u16 = 0x0001;

pub const NXM_NX_REG0: u8 = 0;
pub const NXM_NX_TUN_ID: u8 = 16;

// reg0..reg7 are 4 bytes wide, the tunnel id is 8
const NXM_FIELD_WIDTHS: [(u8, u8); 9] = [
    (NXM_NX_REG0, 4),
    (1, 4),
    (2, 4),
    (3, 4),
    (4, 4),
    (5, 4),
    (6, 4),
    (7, 4),
    (NXM_NX_TUN_ID, 8),
];

/// Copy `n_bits` from a source field to a destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegMove {
    pub n_bits: u16,
    pub src_offset: u16,
    pub dst_offset: u16,
    pub src: u32,
    pub dst: u32,
}

impl RegMove {
    pub fn to_action(&self, order: u32) -> Action {
        let mut payload = vec![];
        payload.extend_from_slice(&self.n_bits.to_be_bytes());
        payload.extend_from_slice(&self.src_offset.to_be_bytes());
        payload.extend_from_slice(&self.dst_offset.to_be_bytes());
        payload.extend_from_slice(&self.src.to_be_bytes());
        payload.extend_from_slice(&self.dst.to_be_bytes());
        Action::new(
            order,
            ActionKind::Experimenter {
                experimenter: NX_VENDOR_ID,
                subtype: NXAST_REG_MOVE.into(),
                payload,
            },
        )
    }

    pub fn from_action(action: &Action) -> Result<RegMove, CodecError> {
        let payload = nicira_payload(action, NXAST_REG_MOVE)?;
        let mut cur = DecodeCursor::new(payload);
        let mv = RegMove {
            n_bits: cur.read_u16()?,
            src_offset: cur.read_u16()?,
            dst_offset: cur.read_u16()?,
            src: cur.read_u32()?,
            dst: cur.read_u32()?,
        };
        Ok(mv)
    }
}

/// Load an immediate value into a bit range of a destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegLoad {
    /// Packed offset and width: `(offset << 6) | (n_bits - 1)`.
    pub ofs_nbits: u16,
    pub dst: u32,
    pub value: u64,
}

impl RegLoad {
    pub fn to_action(&self, order: u32) -> Action {
        let mut payload = vec![];
        payload.extend_from_slice(&self.ofs_nbits.to_be_bytes());
        payload.extend_from_slice(&self.dst.to_be_bytes());
        payload.extend_from_slice(&self.value.to_be_bytes());
        Action::new(
            order,
            ActionKind::Experimenter {
                experimenter: NX_VENDOR_ID,
                subtype: NXAST_REG_LOAD.into(),
                payload,
            },
        )
    }

    pub fn from_action(action: &Action) -> Result<RegLoad, CodecError> {
        let payload = nicira_payload(action, NXAST_REG_LOAD)?;
        let mut cur = DecodeCursor::new(payload);
        let ld = RegLoad {
            ofs_nbits: cur.read_u16()?,
            dst: cur.read_u32()?,
            value: cur.read_u64()?,
        };
        Ok(ld)
    }
}

fn nicira_payload(action: &Action, subtype: u16) -> Result<&[u8], CodecError> {
    match &action.kind {
        ActionKind::Experimenter {
            experimenter,
            subtype: st,
            payload,
        } if *experimenter == NX_VENDOR_ID && *st == u32::from(subtype) => Ok(payload),
        _ => Err(CodecError::InvalidMessage {
            reason: "not a Nicira action of the expected subtype",
        }),
    }
}

fn dispatch_key() -> CodecKey {
    CodecKey::Experimenter {
        version: Version::V1_3,
        experimenter: NX_VENDOR_ID,
        subtype: None,
    }
}

fn encode_nicira_action(action: &Action, cur: &mut EncodeCursor<'_>) -> Result<(), CodecError> {
    let (subtype, payload) = match &action.kind {
        ActionKind::Experimenter {
            experimenter,
            subtype,
            payload,
        } => {
            expect_experimenter(*experimenter, NX_VENDOR_ID)?;
            (*subtype, payload)
        }
        _ => {
            return Err(CodecError::InvalidMessage {
                reason: "not an experimenter action",
            })
        }
    };
    if subtype > u32::from(u16::MAX) {
        return Err(CodecError::InvalidMessage {
            reason: "Nicira subtype wider than 16 bits",
        });
    }
    let start = cur.pos();
    cur.write_u16(action_type::EXPERIMENTER);
    let slot = cur.reserve_u16();
    cur.write_u32(NX_VENDOR_ID);
    cur.write_u16(subtype as u16);
    cur.write_bytes(payload);
    cur.pad_to_multiple(start, 8);
    cur.patch_length(slot, start);
    Ok(())
}

fn decode_nicira_action(cur: &mut DecodeCursor<'_>) -> Result<Action, CodecError> {
    let experimenter = cur.read_u32()?;
    expect_experimenter(experimenter, NX_VENDOR_ID)?;
    let subtype = cur.read_u16()?;
    match subtype {
        NXAST_REG_MOVE | NXAST_REG_LOAD => {}
        _ => {
            return Err(CodecError::NoCodecForKey {
                key: CodecKey::Experimenter {
                    version: Version::V1_3,
                    experimenter: NX_VENDOR_ID,
                    subtype: Some(subtype.into()),
                },
            })
        }
    }
    let payload = cur.rest().to_vec();
    cur.skip(payload.len())?;
    Ok(Action::new(
        0,
        ActionKind::Experimenter {
            experimenter: NX_VENDOR_ID,
            subtype: subtype.into(),
            payload,
        },
    ))
}

fn match_keys() -> impl Iterator<Item = CodecKey> {
    NXM_FIELD_WIDTHS
        .into_iter()
        .map(|(field, _)| CodecKey::MatchEntry {
            version: Version::V1_3,
            class: NXM_1_CLASS,
            field,
        })
}

pub fn register(reg: &CodecRegistry) {
    reg.register_encoder(dispatch_key(), Encoder::Action(Arc::new(encode_nicira_action)));
    reg.register_decoder(
        dispatch_key(),
        Decoder::Action(Arc::new(|cur, _reg| decode_nicira_action(cur))),
    );
    // NXM entries carry no vendor id, so the fixed-width decoder fits
    for (field, width) in NXM_FIELD_WIDTHS {
        reg.register_decoder(
            CodecKey::MatchEntry {
                version: Version::V1_3,
                class: NXM_1_CLASS,
                field,
            },
            Decoder::MatchEntry(fixed_len_entry_decoder(width)),
        );
    }
}

pub fn unregister(reg: &CodecRegistry) {
    reg.unregister(&dispatch_key());
    for key in match_keys() {
        reg.unregister(&key);
    }
}
