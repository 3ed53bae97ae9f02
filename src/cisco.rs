//! Cisco extension actions (output next-hop, set VRF).
//!
//! Cisco subtypes are 4 bytes wide, matching the generic layout, so
//! each subtype registers its own codec. The switch line speaks both
//! protocol versions, so the keys are registered for each.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::actions::{action_type, Action, ActionKind};
use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::expect_experimenter;
use crate::ofp_header::Version;
use crate::registry::{CodecKey, CodecRegistry, Decoder, Encoder};

pub const COF_VENDOR_ID: u32 = 0x0000_000c;

pub const COF_AT_OUTPUT_NH: u32 = 1;
pub const COF_AT_VRF: u32 = 2;

const VERSIONS: [Version; 2] = [Version::V1_3, Version::V1_0];

/// Forward out of the pipeline to an explicit IPv4 next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub addr: Ipv4Addr,
}

impl NextHop {
    pub fn to_action(&self, order: u32) -> Action {
        Action::new(
            order,
            ActionKind::Experimenter {
                experimenter: COF_VENDOR_ID,
                subtype: COF_AT_OUTPUT_NH,
                payload: self.addr.octets().to_vec(),
            },
        )
    }

    pub fn from_action(action: &Action) -> Result<NextHop, CodecError> {
        let payload = cisco_payload(action, COF_AT_OUTPUT_NH)?;
        let octets: [u8; 4] = payload.try_into().map_err(|_| CodecError::InvalidMessage {
            reason: "next-hop payload is not an IPv4 address",
        })?;
        Ok(NextHop {
            addr: Ipv4Addr::from(octets),
        })
    }
}

/// Switch the packet into a named VRF. The payload is length-prefixed
/// so the name survives the 8-byte action padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vrf {
    pub name: Vec<u8>,
}

impl Vrf {
    pub fn to_action(&self, order: u32) -> Action {
        let mut payload = vec![self.name.len() as u8];
        payload.extend_from_slice(&self.name);
        Action::new(
            order,
            ActionKind::Experimenter {
                experimenter: COF_VENDOR_ID,
                subtype: COF_AT_VRF,
                payload,
            },
        )
    }

    pub fn from_action(action: &Action) -> Result<Vrf, CodecError> {
        let payload = cisco_payload(action, COF_AT_VRF)?;
        let mut cur = DecodeCursor::new(payload);
        let len = cur.read_u8()? as usize;
        let name = cur.read_bytes(len)?.to_vec();
        Ok(Vrf { name })
    }
}

fn cisco_payload(action: &Action, subtype: u32) -> Result<&[u8], CodecError> {
    match &action.kind {
        ActionKind::Experimenter {
            experimenter,
            subtype: st,
            payload,
        } if *experimenter == COF_VENDOR_ID && *st == subtype => Ok(payload),
        _ => Err(CodecError::InvalidMessage {
            reason: "not a Cisco action of the expected subtype",
        }),
    }
}

fn encode_cisco_action(action: &Action, cur: &mut EncodeCursor<'_>) -> Result<(), CodecError> {
    let (subtype, payload) = match &action.kind {
        ActionKind::Experimenter {
            experimenter,
            subtype,
            payload,
        } => {
            expect_experimenter(*experimenter, COF_VENDOR_ID)?;
            (*subtype, payload)
        }
        _ => {
            return Err(CodecError::InvalidMessage {
                reason: "not an experimenter action",
            })
        }
    };
    let start = cur.pos();
    cur.write_u16(action_type::EXPERIMENTER);
    let slot = cur.reserve_u16();
    cur.write_u32(COF_VENDOR_ID);
    cur.write_u32(subtype);
    cur.write_bytes(payload);
    cur.pad_to_multiple(start, 8);
    cur.patch_length(slot, start);
    Ok(())
}

fn decode_cisco_action(cur: &mut DecodeCursor<'_>) -> Result<Action, CodecError> {
    let experimenter = cur.read_u32()?;
    expect_experimenter(experimenter, COF_VENDOR_ID)?;
    let subtype = cur.read_u32()?;
    let payload = match subtype {
        COF_AT_OUTPUT_NH => cur.read_bytes(4)?.to_vec(),
        COF_AT_VRF => {
            let len = cur.read_u8()? as usize;
            let mut payload = vec![len as u8];
            payload.extend_from_slice(cur.read_bytes(len)?);
            payload
        }
        _ => {
            return Err(CodecError::InvalidMessage {
                reason: "unknown Cisco action subtype",
            })
        }
    };
    // the rest of the span is padding
    cur.skip(cur.remaining())?;
    Ok(Action::new(
        0,
        ActionKind::Experimenter {
            experimenter: COF_VENDOR_ID,
            subtype,
            payload,
        },
    ))
}

fn keys() -> Vec<CodecKey> {
    let mut keys = vec![];
    for version in VERSIONS {
        for subtype in [COF_AT_OUTPUT_NH, COF_AT_VRF] {
            keys.push(CodecKey::Experimenter {
                version,
                experimenter: COF_VENDOR_ID,
                subtype: Some(subtype),
            });
        }
    }
    keys
}

pub fn register(reg: &CodecRegistry) {
    for key in keys() {
        reg.register_encoder(key, Encoder::Action(Arc::new(encode_cisco_action)));
        reg.register_decoder(
            key,
            Decoder::Action(Arc::new(|cur, _reg| decode_cisco_action(cur))),
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
    use crate::actions::{decode_actions, encode_action_list, register_core_actions};
    use crate::experimenter::UnknownCodecPolicy;

    fn test_registry() -> CodecRegistry {
        let reg = CodecRegistry::new();
        register_core_actions(&reg, Version::V1_3);
        register(&reg);
        reg
    }

    #[test]
    fn next_hop_wire_layout() {
        let reg = test_registry();
        let nh = NextHop {
            addr: Ipv4Addr::new(10, 1, 2, 3),
        };
        let mut buf = vec![];
        encode_action_list(
            &[nh.to_action(0)],
            &mut EncodeCursor::new(&mut buf),
            &reg,
            Version::V1_3,
        )
        .unwrap();
        assert_eq!(
            buf,
            [
                0xff, 0xff, 0x00, 0x10, // experimenter action, 16 bytes
                0x00, 0x00, 0x00, 0x0c, // vendor id
                0x00, 0x00, 0x00, 0x01, // output next-hop
                10, 1, 2, 3,
            ]
        );
    }

    #[test]
    fn vrf_roundtrip_survives_padding() {
        let reg = test_registry();
        let vrf = Vrf {
            name: b"blue".to_vec(),
        };
        let mut buf = vec![];
        encode_action_list(
            &[vrf.to_action(0)],
            &mut EncodeCursor::new(&mut buf),
            &reg,
            Version::V1_3,
        )
        .unwrap();
        assert_eq!(buf.len() % 8, 0);
        let decoded = decode_actions(
            &mut DecodeCursor::new(&buf),
            &reg,
            Version::V1_3,
            UnknownCodecPolicy::Fail,
        )
        .unwrap();
        assert_eq!(Vrf::from_action(&decoded[0]).unwrap(), vrf);
    }

    #[test]
    fn registered_for_both_versions() {
        let reg = test_registry();
        for version in VERSIONS {
            let key = CodecKey::Experimenter {
                version,
                experimenter: COF_VENDOR_ID,
                subtype: Some(COF_AT_VRF),
            };
            assert!(reg.action_decoder(&key).is_ok());
        }
        unregister(&reg);
        for key in keys() {
            assert!(reg.lookup_decoder(&key).is_none());
        }
    }
}
