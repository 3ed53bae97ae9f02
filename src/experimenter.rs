//! Vendor extension dispatch.
//!
//! Experimenter structures share a framing: the generic type code
//! (0xffff for actions, the experimenter message type for messages),
//! then a 4-byte vendor id, then a vendor-defined subtype. Vendors that
//! use a 4-byte subtype register per-subtype codecs; vendors with other
//! subtype widths register a single per-id dispatcher under a key with
//! no subtype and demultiplex internally.

use crate::actions::Action;
use crate::cursor::DecodeCursor;
use crate::error::CodecError;
use crate::ofp_header::Version;
use crate::registry::{CodecKey, CodecRegistry};

/// What to do when a decoder meets a structure nothing is registered
/// for: propagate the miss, or log it and continue with the rest of the
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownCodecPolicy {
    Fail,
    Skip,
}

/// Fail unless a vendor structure carries the id its codec owns.
pub fn expect_experimenter(found: u32, expected: u32) -> Result<(), CodecError> {
    if found != expected {
        return Err(CodecError::UnknownExperimenter { expected, found });
    }
    Ok(())
}

/// Decode one experimenter action body. `cur` is bounded to the action
/// and positioned at the vendor id; registered decoders see the same
/// position so they can verify the id themselves.
///
/// Lookup order: the exact `(id, subtype)` key first, reading the
/// subtype as the 4 bytes after the id, then the per-id key. A miss on
/// both surfaces the most specific key that was tried.
pub fn decode_experimenter_action(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<Action, CodecError> {
    let mut peek = *cur;
    let experimenter = peek.read_u32()?;
    let subtype = if peek.remaining() >= 4 {
        Some(peek.read_u32()?)
    } else {
        None
    };

    if let Some(st) = subtype {
        let key = CodecKey::Experimenter {
            version,
            experimenter,
            subtype: Some(st),
        };
        if let Ok(f) = reg.action_decoder(&key) {
            return f(cur, reg);
        }
    }
    let key = CodecKey::Experimenter {
        version,
        experimenter,
        subtype: None,
    };
    match reg.action_decoder(&key) {
        Ok(f) => f(cur, reg),
        Err(_) => Err(CodecError::NoCodecForKey {
            key: CodecKey::Experimenter {
                version,
                experimenter,
                subtype,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionKind;
    use crate::registry::Decoder;
    use std::sync::Arc;

    #[test]
    fn expect_experimenter_checks_the_id() {
        assert!(expect_experimenter(0x2320, 0x2320).is_ok());
        assert_eq!(
            expect_experimenter(0x2320, 0x4f4e_4600).unwrap_err(),
            CodecError::UnknownExperimenter {
                expected: 0x4f4e_4600,
                found: 0x2320,
            }
        );
    }

    #[test]
    fn subtype_key_is_preferred_over_the_id_key() {
        let reg = CodecRegistry::new();
        reg.register_decoder(
            CodecKey::Experimenter {
                version: Version::V1_3,
                experimenter: 0x0c,
                subtype: Some(1),
            },
            Decoder::Action(Arc::new(|cur, _| {
                cur.skip(cur.remaining())?;
                Ok(Action::new(0, ActionKind::SetNwTtl(1)))
            })),
        );
        reg.register_decoder(
            CodecKey::Experimenter {
                version: Version::V1_3,
                experimenter: 0x0c,
                subtype: None,
            },
            Decoder::Action(Arc::new(|cur, _| {
                cur.skip(cur.remaining())?;
                Ok(Action::new(0, ActionKind::SetNwTtl(2)))
            })),
        );
        // id 0x0c, subtype 1
        let body = [0, 0, 0, 0x0c, 0, 0, 0, 1, 0, 0, 0, 0];
        let action =
            decode_experimenter_action(&mut DecodeCursor::new(&body), &reg, Version::V1_3)
                .unwrap();
        assert_eq!(action.kind, ActionKind::SetNwTtl(1));

        // subtype 9 has no exact key; the per-id dispatcher catches it
        let body = [0, 0, 0, 0x0c, 0, 0, 0, 9, 0, 0, 0, 0];
        let action =
            decode_experimenter_action(&mut DecodeCursor::new(&body), &reg, Version::V1_3)
                .unwrap();
        assert_eq!(action.kind, ActionKind::SetNwTtl(2));
    }

    #[test]
    fn miss_names_the_most_specific_key() {
        let reg = CodecRegistry::new();
        let body = [0, 0, 0, 0x0c, 0, 0, 0, 7];
        let err = decode_experimenter_action(&mut DecodeCursor::new(&body), &reg, Version::V1_3)
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::NoCodecForKey {
                key: CodecKey::Experimenter {
                    version: Version::V1_3,
                    experimenter: 0x0c,
                    subtype: Some(7),
                },
            }
        );
    }
}
