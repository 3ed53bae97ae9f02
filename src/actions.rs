//! Action and instruction lists.
//!
//! Action lists are ordered: each action carries an `order` rank and
//! lists are emitted sorted by descending rank with a stable sort, so
//! equal ranks keep their relative position. Decoding assigns ranks
//! back from wire position so that re-encoding reproduces the wire
//! order.

use std::sync::Arc;

use tracing::warn;

use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::{decode_experimenter_action, UnknownCodecPolicy};
use crate::ofp_header::Version;
use crate::oxm::{MatchEntry, OxmHeader};
use crate::registry::{CodecKey, CodecRegistry, Decoder};

/// Wire codes for the action types the core understands.
pub mod action_type {
    pub const OUTPUT: u16 = 0;
    pub const COPY_TTL_OUT: u16 = 11;
    pub const COPY_TTL_IN: u16 = 12;
    pub const SET_MPLS_TTL: u16 = 15;
    pub const DEC_MPLS_TTL: u16 = 16;
    pub const PUSH_VLAN: u16 = 17;
    pub const POP_VLAN: u16 = 18;
    pub const PUSH_MPLS: u16 = 19;
    pub const POP_MPLS: u16 = 20;
    pub const SET_QUEUE: u16 = 21;
    pub const GROUP: u16 = 22;
    pub const SET_NW_TTL: u16 = 23;
    pub const DEC_NW_TTL: u16 = 24;
    pub const SET_FIELD: u16 = 25;
    pub const EXPERIMENTER: u16 = 0xffff;
}

/// Wire codes for instruction types.
pub mod instruction_type {
    pub const GOTO_TABLE: u16 = 1;
    pub const WRITE_METADATA: u16 = 2;
    pub const WRITE_ACTIONS: u16 = 3;
    pub const APPLY_ACTIONS: u16 = 4;
    pub const CLEAR_ACTIONS: u16 = 5;
    pub const METER: u16 = 6;
}

/// One action plus its rank within its list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub order: u32,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(order: u32, kind: ActionKind) -> Action {
        Action { order, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Output { port: u32, max_len: u16 },
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl(u8),
    DecMplsTtl,
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    PopMpls(u16),
    SetQueue(u32),
    Group(u32),
    SetNwTtl(u8),
    DecNwTtl,
    SetField(MatchEntry),
    Experimenter {
        experimenter: u32,
        subtype: u32,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    GoToTable(u8),
    WriteMetadata { metadata: u64, mask: u64 },
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter(u32),
}

/// Serialize one action. Experimenter actions go through the registry;
/// everything else is laid out inline. Action lengths on the wire
/// include their padding, unlike match lengths.
pub fn encode_action(
    action: &Action,
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    match &action.kind {
        ActionKind::Output { port, max_len } => {
            cur.write_u16(action_type::OUTPUT);
            cur.write_u16(16);
            cur.write_u32(*port);
            cur.write_u16(*max_len);
            cur.write_zero(6);
        }
        ActionKind::CopyTtlOut => pad_only_action(cur, action_type::COPY_TTL_OUT),
        ActionKind::CopyTtlIn => pad_only_action(cur, action_type::COPY_TTL_IN),
        ActionKind::SetMplsTtl(ttl) => {
            cur.write_u16(action_type::SET_MPLS_TTL);
            cur.write_u16(8);
            cur.write_u8(*ttl);
            cur.write_zero(3);
        }
        ActionKind::DecMplsTtl => pad_only_action(cur, action_type::DEC_MPLS_TTL),
        ActionKind::PushVlan(ethertype) => push_action(cur, action_type::PUSH_VLAN, *ethertype),
        ActionKind::PopVlan => pad_only_action(cur, action_type::POP_VLAN),
        ActionKind::PushMpls(ethertype) => push_action(cur, action_type::PUSH_MPLS, *ethertype),
        ActionKind::PopMpls(ethertype) => push_action(cur, action_type::POP_MPLS, *ethertype),
        ActionKind::SetQueue(queue_id) => {
            cur.write_u16(action_type::SET_QUEUE);
            cur.write_u16(8);
            cur.write_u32(*queue_id);
        }
        ActionKind::Group(group_id) => {
            cur.write_u16(action_type::GROUP);
            cur.write_u16(8);
            cur.write_u32(*group_id);
        }
        ActionKind::SetNwTtl(ttl) => {
            cur.write_u16(action_type::SET_NW_TTL);
            cur.write_u16(8);
            cur.write_u8(*ttl);
            cur.write_zero(3);
        }
        ActionKind::DecNwTtl => pad_only_action(cur, action_type::DEC_NW_TTL),
        ActionKind::SetField(entry) => {
            let start = cur.pos();
            cur.write_u16(action_type::SET_FIELD);
            let slot = cur.reserve_u16();
            entry.encode(cur)?;
            cur.pad_to_multiple(start, 8);
            cur.patch_length(slot, start);
        }
        ActionKind::Experimenter {
            experimenter,
            subtype,
            payload,
        } => {
            let key = CodecKey::Experimenter {
                version,
                experimenter: *experimenter,
                subtype: Some(*subtype),
            };
            let fallback = CodecKey::Experimenter {
                version,
                experimenter: *experimenter,
                subtype: None,
            };
            if let Ok(f) = reg.action_encoder(&key) {
                f(action, cur)?;
            } else if let Ok(f) = reg.action_encoder(&fallback) {
                f(action, cur)?;
            } else {
                // generic layout: 4-byte subtype after the vendor id
                let start = cur.pos();
                cur.write_u16(action_type::EXPERIMENTER);
                let slot = cur.reserve_u16();
                cur.write_u32(*experimenter);
                cur.write_u32(*subtype);
                cur.write_bytes(payload);
                cur.pad_to_multiple(start, 8);
                cur.patch_length(slot, start);
            }
        }
    }
    Ok(())
}

fn pad_only_action(cur: &mut EncodeCursor<'_>, action_type: u16) {
    cur.write_u16(action_type);
    cur.write_u16(8);
    cur.write_zero(4);
}

fn push_action(cur: &mut EncodeCursor<'_>, action_type: u16, ethertype: u16) {
    cur.write_u16(action_type);
    cur.write_u16(8);
    cur.write_u16(ethertype);
    cur.write_zero(2);
}

/// Serialize an action list in rank order: descending by `order`, ties
/// kept in list order.
pub fn encode_action_list(
    actions: &[Action],
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    let mut sorted: Vec<&Action> = actions.iter().collect();
    sorted.sort_by(|a, b| b.order.cmp(&a.order));
    for action in sorted {
        encode_action(action, cur, reg, version)?;
    }
    Ok(())
}

/// Decode actions until the cursor is exhausted. Each action is decoded
/// against a sub-cursor bounded by its declared length; ranks are
/// assigned descending from the front so a re-encode walks the same
/// wire order.
pub fn decode_actions(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
    policy: UnknownCodecPolicy,
) -> Result<Vec<Action>, CodecError> {
    let mut out = vec![];
    while !cur.is_empty() {
        let mut peek = *cur;
        let action_type = peek.read_u16()?;
        let declared = peek.read_u16()? as usize;
        if declared < 4 {
            return Err(CodecError::InvalidMessage {
                reason: "action length shorter than the action header",
            });
        }
        let mut span = cur.slice(declared)?;
        span.skip(4)?;
        let decoded = if action_type == action_type::EXPERIMENTER {
            decode_experimenter_action(&mut span, reg, version)
        } else {
            let key = CodecKey::Action {
                version,
                action_type,
            };
            match reg.action_decoder(&key) {
                Ok(f) => f(&mut span, reg),
                Err(err) => Err(err),
            }
        };
        match decoded {
            Ok(action) => {
                if !span.is_empty() {
                    return Err(CodecError::TrailingData {
                        context: "action",
                        left: span.remaining(),
                    });
                }
                out.push(action)
            }
            Err(CodecError::NoCodecForKey { key }) => match policy {
                UnknownCodecPolicy::Skip => warn!(%key, "skipping unknown action"),
                UnknownCodecPolicy::Fail => return Err(CodecError::NoCodecForKey { key }),
            },
            Err(err) => return Err(err),
        }
    }
    let n = out.len();
    for (i, action) in out.iter_mut().enumerate() {
        action.order = (n - 1 - i) as u32;
    }
    Ok(out)
}

pub fn encode_instructions(
    instructions: &[Instruction],
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    for instruction in instructions {
        match instruction {
            Instruction::GoToTable(table_id) => {
                cur.write_u16(instruction_type::GOTO_TABLE);
                cur.write_u16(8);
                cur.write_u8(*table_id);
                cur.write_zero(3);
            }
            Instruction::WriteMetadata { metadata, mask } => {
                cur.write_u16(instruction_type::WRITE_METADATA);
                cur.write_u16(24);
                cur.write_zero(4);
                cur.write_u64(*metadata);
                cur.write_u64(*mask);
            }
            Instruction::WriteActions(actions) => {
                encode_action_instruction(instruction_type::WRITE_ACTIONS, actions, cur, reg, version)?;
            }
            Instruction::ApplyActions(actions) => {
                encode_action_instruction(instruction_type::APPLY_ACTIONS, actions, cur, reg, version)?;
            }
            Instruction::ClearActions => {
                cur.write_u16(instruction_type::CLEAR_ACTIONS);
                cur.write_u16(8);
                cur.write_zero(4);
            }
            Instruction::Meter(meter_id) => {
                cur.write_u16(instruction_type::METER);
                cur.write_u16(8);
                cur.write_u32(*meter_id);
            }
        }
    }
    Ok(())
}

fn encode_action_instruction(
    instr_type: u16,
    actions: &[Action],
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    let start = cur.pos();
    cur.write_u16(instr_type);
    let slot = cur.reserve_u16();
    cur.write_zero(4);
    encode_action_list(actions, cur, reg, version)?;
    cur.patch_length(slot, start);
    Ok(())
}

pub fn decode_instructions(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
    policy: UnknownCodecPolicy,
) -> Result<Vec<Instruction>, CodecError> {
    let mut out = vec![];
    while !cur.is_empty() {
        let mut peek = *cur;
        let instr_type = peek.read_u16()?;
        let declared = peek.read_u16()? as usize;
        if declared < 4 {
            return Err(CodecError::InvalidMessage {
                reason: "instruction length shorter than the instruction header",
            });
        }
        let mut span = cur.slice(declared)?;
        span.skip(4)?;
        match instr_type {
            instruction_type::GOTO_TABLE => {
                let table_id = span.read_u8()?;
                span.skip(3)?;
                out.push(Instruction::GoToTable(table_id));
            }
            instruction_type::WRITE_METADATA => {
                span.skip(4)?;
                let metadata = span.read_u64()?;
                let mask = span.read_u64()?;
                out.push(Instruction::WriteMetadata { metadata, mask });
            }
            instruction_type::WRITE_ACTIONS => {
                span.skip(4)?;
                out.push(Instruction::WriteActions(decode_actions(
                    &mut span, reg, version, policy,
                )?));
            }
            instruction_type::APPLY_ACTIONS => {
                span.skip(4)?;
                out.push(Instruction::ApplyActions(decode_actions(
                    &mut span, reg, version, policy,
                )?));
            }
            instruction_type::CLEAR_ACTIONS => {
                span.skip(4)?;
                out.push(Instruction::ClearActions);
            }
            instruction_type::METER => {
                out.push(Instruction::Meter(span.read_u32()?));
            }
            unknown => match policy {
                UnknownCodecPolicy::Skip => {
                    warn!(instruction = unknown, "skipping unknown instruction");
                    continue;
                }
                UnknownCodecPolicy::Fail => {
                    return Err(CodecError::InvalidMessage {
                        reason: "unknown instruction type",
                    });
                }
            },
        }
        if !span.is_empty() {
            return Err(CodecError::TrailingData {
                context: "instruction",
                left: span.remaining(),
            });
        }
    }
    Ok(out)
}

/// Install decoders for the base action set.
pub(crate) fn register_core_actions(reg: &CodecRegistry, version: Version) {
    let fixed = |action_type: u16, f: fn(&mut DecodeCursor<'_>) -> Result<ActionKind, CodecError>| {
        reg.register_decoder(
            CodecKey::Action {
                version,
                action_type,
            },
            Decoder::Action(Arc::new(move |cur, _reg| Ok(Action::new(0, f(cur)?)))),
        );
    };
    fixed(action_type::OUTPUT, |cur| {
        let port = cur.read_u32()?;
        let max_len = cur.read_u16()?;
        cur.skip(6)?;
        Ok(ActionKind::Output { port, max_len })
    });
    fixed(action_type::COPY_TTL_OUT, |cur| {
        cur.skip(4)?;
        Ok(ActionKind::CopyTtlOut)
    });
    fixed(action_type::COPY_TTL_IN, |cur| {
        cur.skip(4)?;
        Ok(ActionKind::CopyTtlIn)
    });
    fixed(action_type::SET_MPLS_TTL, |cur| {
        let ttl = cur.read_u8()?;
        cur.skip(3)?;
        Ok(ActionKind::SetMplsTtl(ttl))
    });
    fixed(action_type::DEC_MPLS_TTL, |cur| {
        cur.skip(4)?;
        Ok(ActionKind::DecMplsTtl)
    });
    fixed(action_type::PUSH_VLAN, |cur| {
        let ethertype = cur.read_u16()?;
        cur.skip(2)?;
        Ok(ActionKind::PushVlan(ethertype))
    });
    fixed(action_type::POP_VLAN, |cur| {
        cur.skip(4)?;
        Ok(ActionKind::PopVlan)
    });
    fixed(action_type::PUSH_MPLS, |cur| {
        let ethertype = cur.read_u16()?;
        cur.skip(2)?;
        Ok(ActionKind::PushMpls(ethertype))
    });
    fixed(action_type::POP_MPLS, |cur| {
        let ethertype = cur.read_u16()?;
        cur.skip(2)?;
        Ok(ActionKind::PopMpls(ethertype))
    });
    fixed(action_type::SET_QUEUE, |cur| {
        Ok(ActionKind::SetQueue(cur.read_u32()?))
    });
    fixed(action_type::GROUP, |cur| {
        Ok(ActionKind::Group(cur.read_u32()?))
    });
    fixed(action_type::SET_NW_TTL, |cur| {
        let ttl = cur.read_u8()?;
        cur.skip(3)?;
        Ok(ActionKind::SetNwTtl(ttl))
    });
    fixed(action_type::DEC_NW_TTL, |cur| {
        cur.skip(4)?;
        Ok(ActionKind::DecNwTtl)
    });
    reg.register_decoder(
        CodecKey::Action {
            version,
            action_type: action_type::SET_FIELD,
        },
        Decoder::Action(Arc::new(move |cur, reg| {
            let hdr = OxmHeader::decode(cur)?;
            let key = CodecKey::MatchEntry {
                version,
                class: hdr.class,
                field: hdr.field,
            };
            let entry = match reg.match_entry_decoder(&key) {
                Ok(f) => {
                    let mut span = cur.slice(hdr.length as usize)?;
                    let entry = f(&hdr, &mut span)?;
                    if !span.is_empty() {
                        return Err(CodecError::TrailingData {
                            context: "set-field entry",
                            left: span.remaining(),
                        });
                    }
                    entry
                }
                // keep the raw bytes when nothing claims the field
                Err(_) => {
                    let value_len = hdr.value_len();
                    let value = cur.read_bytes(value_len)?.to_vec();
                    let mask = if hdr.has_mask {
                        Some(cur.read_bytes(value_len)?.to_vec())
                    } else {
                        None
                    };
                    MatchEntry {
                        class: hdr.class,
                        field: hdr.field,
                        has_mask: hdr.has_mask,
                        value,
                        mask,
                    }
                }
            };
            cur.skip(cur.remaining())?;
            Ok(Action::new(0, ActionKind::SetField(entry)))
        })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oxm::{basic_field, register_basic_entries};

    fn test_registry() -> CodecRegistry {
        let reg = CodecRegistry::new();
        register_core_actions(&reg, Version::V1_3);
        register_basic_entries(&reg, Version::V1_3);
        reg
    }

    #[test]
    fn dec_nw_ttl_wire_layout() {
        let reg = test_registry();
        let mut buf = vec![];
        encode_action(
            &Action::new(0, ActionKind::DecNwTtl),
            &mut EncodeCursor::new(&mut buf),
            &reg,
            Version::V1_3,
        )
        .unwrap();
        assert_eq!(buf, [0x00, 0x18, 0x00, 0x08, 0, 0, 0, 0]);
    }

    #[test]
    fn list_is_sorted_descending_and_stable() {
        let reg = test_registry();
        let actions = vec![
            Action::new(1, ActionKind::PopVlan),
            Action::new(3, ActionKind::DecNwTtl),
            Action::new(1, ActionKind::CopyTtlIn),
            Action::new(2, ActionKind::Group(9)),
        ];
        let mut buf = vec![];
        encode_action_list(&actions, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3)
            .unwrap();
        let decoded = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap();
        let kinds: Vec<&ActionKind> = decoded.iter().map(|a| &a.kind).collect();
        assert_eq!(
            kinds,
            [
                &ActionKind::DecNwTtl,
                &ActionKind::Group(9),
                &ActionKind::PopVlan,
                &ActionKind::CopyTtlIn,
            ],
            "rank 3 first, then 2, then the two rank-1 actions in list order"
        );
        // ranks descend from the front after a decode
        let orders: Vec<u32> = decoded.iter().map(|a| a.order).collect();
        assert_eq!(orders, [3, 2, 1, 0]);
    }

    #[test]
    fn action_list_roundtrip() {
        let reg = test_registry();
        let actions = vec![
            Action::new(3, ActionKind::SetField(MatchEntry::basic(
                basic_field::VLAN_VID,
                vec![0x10, 0x01],
                None,
            ))),
            Action::new(2, ActionKind::PushVlan(0x8100)),
            Action::new(1, ActionKind::SetNwTtl(64)),
            Action::new(0, ActionKind::Output { port: 2, max_len: 0xffff }),
        ];
        let mut buf = vec![];
        encode_action_list(&actions, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3)
            .unwrap();
        assert_eq!(buf.len() % 8, 0);
        let decoded = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap();
        assert_eq!(decoded, actions);
    }

    #[test]
    fn set_field_length_includes_padding() {
        let reg = test_registry();
        let action = Action::new(
            0,
            ActionKind::SetField(MatchEntry::basic(
                basic_field::ETH_TYPE,
                vec![0x08, 0x00],
                None,
            )),
        );
        let mut buf = vec![];
        encode_action(&action, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3).unwrap();
        // 4 header + 4 oxm header + 2 value = 10, padded to 16
        assert_eq!(buf.len(), 16);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 16);
    }

    #[test]
    fn instruction_roundtrip() {
        let reg = test_registry();
        let instructions = vec![
            Instruction::GoToTable(3),
            Instruction::WriteMetadata {
                metadata: 0xdead_beef,
                mask: 0xffff_ffff,
            },
            Instruction::ApplyActions(vec![
                Action::new(1, ActionKind::DecNwTtl),
                Action::new(0, ActionKind::Output { port: 1, max_len: 0 }),
            ]),
            Instruction::ClearActions,
            Instruction::Meter(12),
        ];
        let mut buf = vec![];
        encode_instructions(&instructions, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3)
            .unwrap();
        let decoded = decode_instructions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap();
        assert_eq!(decoded, instructions);
    }

    #[test]
    fn apply_actions_length_is_patched() {
        let reg = test_registry();
        let instructions = vec![Instruction::ApplyActions(vec![Action::new(
            0,
            ActionKind::Output { port: 1, max_len: 0 },
        )])];
        let mut buf = vec![];
        encode_instructions(&instructions, &mut EncodeCursor::new(&mut buf), &reg, Version::V1_3)
            .unwrap();
        // 8 instruction header + 16 output action
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 24);
    }

    #[test]
    fn unknown_action_policy() {
        let reg = test_registry();
        // type 99 does not exist; followed by a valid pop-vlan
        let mut buf = vec![0x00, 99, 0x00, 0x08, 0, 0, 0, 0];
        buf.extend_from_slice(&[0x00, 0x12, 0x00, 0x08, 0, 0, 0, 0]);

        let err = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::NoCodecForKey { .. }));

        let decoded = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Skip,
        )
        .unwrap();
        assert_eq!(decoded, [Action::new(0, ActionKind::PopVlan)]);
    }

    #[test]
    fn trailing_bytes_in_an_instruction_are_rejected() {
        let reg = test_registry();
        // goto-table padded out to 16 bytes instead of 8
        let buf = [0, 1, 0, 16, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = decode_instructions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::TrailingData { .. }));
    }

    #[test]
    fn under_consuming_vendor_decoder_is_rejected() {
        let reg = test_registry();
        reg.register_decoder(
            CodecKey::Experimenter {
                version: Version::V1_3,
                experimenter: 0x7a,
                subtype: None,
            },
            Decoder::Action(Arc::new(|cur, _reg| {
                // reads the vendor id and stops short of the body
                cur.skip(4)?;
                Ok(Action::new(0, ActionKind::PopVlan))
            })),
        );
        let buf = [
            0xff, 0xff, 0x00, 0x10, 0x00, 0x00, 0x00, 0x7a, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let err = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::TrailingData { .. }));
    }

    #[test]
    fn truncated_action_is_typed() {
        let reg = test_registry();
        // output action claims 16 bytes but only 8 are present
        let buf = [0x00, 0x00, 0x00, 0x10, 0, 0, 0, 1];
        let err = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::TruncatedMessage { .. }));
    }
}
