use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::actions::Action;
use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::UnknownCodecPolicy;
use crate::ofp_header::Version;
use crate::openflow0x04::Message;
use crate::oxm::{MatchEntry, OxmHeader};

/// Identifies one registered encoder or decoder.
///
/// Keys are value objects; equality and hashing are structural. At most
/// one encoder and one decoder exist per key at any time, and the last
/// registration wins on overwrite so vendor modules can hot-swap their
/// codecs on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKey {
    Message {
        version: Version,
        msg_type: u8,
    },
    Action {
        version: Version,
        action_type: u16,
    },
    MatchEntry {
        version: Version,
        class: u16,
        field: u8,
    },
    Experimenter {
        version: Version,
        experimenter: u32,
        subtype: Option<u32>,
    },
}

impl fmt::Display for CodecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CodecKey::Message { version, msg_type } => {
                write!(f, "message key ({:?}, type {})", version, msg_type)
            }
            CodecKey::Action {
                version,
                action_type,
            } => write!(f, "action key ({:?}, type {})", version, action_type),
            CodecKey::MatchEntry {
                version,
                class,
                field,
            } => write!(
                f,
                "match entry key ({:?}, class {:#06x}, field {})",
                version, class, field
            ),
            CodecKey::Experimenter {
                version,
                experimenter,
                subtype,
            } => match subtype {
                Some(st) => write!(
                    f,
                    "experimenter key ({:?}, id {:#010x}, subtype {})",
                    version, experimenter, st
                ),
                None => write!(f, "experimenter key ({:?}, id {:#010x})", version, experimenter),
            },
        }
    }
}

pub type MessageEncodeFn = Arc<
    dyn Fn(&Message, &mut EncodeCursor<'_>, &CodecRegistry) -> Result<(), CodecError>
        + Send
        + Sync,
>;
pub type MessageDecodeFn = Arc<
    dyn Fn(&mut DecodeCursor<'_>, &CodecRegistry, UnknownCodecPolicy) -> Result<Message, CodecError>
        + Send
        + Sync,
>;
pub type ActionEncodeFn =
    Arc<dyn Fn(&Action, &mut EncodeCursor<'_>) -> Result<(), CodecError> + Send + Sync>;
pub type ActionDecodeFn = Arc<
    dyn Fn(&mut DecodeCursor<'_>, &CodecRegistry) -> Result<Action, CodecError> + Send + Sync,
>;
pub type MatchEntryEncodeFn =
    Arc<dyn Fn(&MatchEntry, &mut EncodeCursor<'_>) -> Result<(), CodecError> + Send + Sync>;
pub type MatchEntryDecodeFn = Arc<
    dyn Fn(&OxmHeader, &mut DecodeCursor<'_>) -> Result<MatchEntry, CodecError> + Send + Sync,
>;

#[derive(Clone)]
pub enum Encoder {
    Message(MessageEncodeFn),
    Action(ActionEncodeFn),
    MatchEntry(MatchEntryEncodeFn),
}

#[derive(Clone)]
pub enum Decoder {
    Message(MessageDecodeFn),
    Action(ActionDecodeFn),
    MatchEntry(MatchEntryDecodeFn),
}

/// Thread-safe lookup table from codec key to encoder/decoder.
///
/// The registry is the only shared mutable state in the crate. Lookups
/// on I/O threads proceed without blocking on registration, and a
/// registration becomes visible atomically. The registry is constructed
/// explicitly and passed by reference into every codec that recurses
/// into sub-structures; there is no global instance.
#[derive(Default)]
pub struct CodecRegistry {
    encoders: DashMap<CodecKey, Encoder>,
    decoders: DashMap<CodecKey, Decoder>,
}

impl CodecRegistry {
    pub fn new() -> CodecRegistry {
        CodecRegistry::default()
    }

    pub fn register_encoder(&self, key: CodecKey, encoder: Encoder) {
        if self.encoders.insert(key, encoder).is_some() {
            debug!(%key, "encoder registration overwritten");
        }
    }

    pub fn register_decoder(&self, key: CodecKey, decoder: Decoder) {
        if self.decoders.insert(key, decoder).is_some() {
            debug!(%key, "decoder registration overwritten");
        }
    }

    /// Remove both the encoder and the decoder for `key`, if present.
    pub fn unregister(&self, key: &CodecKey) {
        self.encoders.remove(key);
        self.decoders.remove(key);
    }

    pub fn lookup_encoder(&self, key: &CodecKey) -> Option<Encoder> {
        self.encoders.get(key).map(|e| e.value().clone())
    }

    pub fn lookup_decoder(&self, key: &CodecKey) -> Option<Decoder> {
        self.decoders.get(key).map(|d| d.value().clone())
    }

    pub fn message_encoder(&self, key: &CodecKey) -> Result<MessageEncodeFn, CodecError> {
        match self.lookup_encoder(key) {
            Some(Encoder::Message(f)) => Ok(f),
            _ => Err(CodecError::NoCodecForKey { key: *key }),
        }
    }

    pub fn message_decoder(&self, key: &CodecKey) -> Result<MessageDecodeFn, CodecError> {
        match self.lookup_decoder(key) {
            Some(Decoder::Message(f)) => Ok(f),
            _ => Err(CodecError::NoCodecForKey { key: *key }),
        }
    }

    pub fn action_encoder(&self, key: &CodecKey) -> Result<ActionEncodeFn, CodecError> {
        match self.lookup_encoder(key) {
            Some(Encoder::Action(f)) => Ok(f),
            _ => Err(CodecError::NoCodecForKey { key: *key }),
        }
    }

    pub fn action_decoder(&self, key: &CodecKey) -> Result<ActionDecodeFn, CodecError> {
        match self.lookup_decoder(key) {
            Some(Decoder::Action(f)) => Ok(f),
            _ => Err(CodecError::NoCodecForKey { key: *key }),
        }
    }

    pub fn match_entry_encoder(&self, key: &CodecKey) -> Result<MatchEntryEncodeFn, CodecError> {
        match self.lookup_encoder(key) {
            Some(Encoder::MatchEntry(f)) => Ok(f),
            _ => Err(CodecError::NoCodecForKey { key: *key }),
        }
    }

    pub fn match_entry_decoder(&self, key: &CodecKey) -> Result<MatchEntryDecodeFn, CodecError> {
        match self.lookup_decoder(key) {
            Some(Decoder::MatchEntry(f)) => Ok(f),
            _ => Err(CodecError::NoCodecForKey { key: *key }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionKind;

    fn action_key(action_type: u16) -> CodecKey {
        CodecKey::Action {
            version: Version::V1_3,
            action_type,
        }
    }

    fn decoder_returning(kind: ActionKind) -> Decoder {
        Decoder::Action(Arc::new(move |_cur, _reg| Ok(Action::new(0, kind.clone()))))
    }

    #[test]
    fn lookup_miss_is_typed() {
        let reg = CodecRegistry::new();
        let key = action_key(99);
        assert!(reg.lookup_decoder(&key).is_none());
        assert!(matches!(
            reg.action_decoder(&key),
            Err(CodecError::NoCodecForKey { key: k }) if k == key
        ));
    }

    #[test]
    fn last_registration_wins() {
        let reg = CodecRegistry::new();
        let key = action_key(5);
        reg.register_decoder(key, decoder_returning(ActionKind::PopVlan));
        reg.register_decoder(key, decoder_returning(ActionKind::DecNwTtl));
        let f = reg.action_decoder(&key).unwrap();
        let mut cur = DecodeCursor::new(&[]);
        let action = f(&mut cur, &reg).unwrap();
        assert_eq!(action.kind, ActionKind::DecNwTtl);
    }

    #[test]
    fn unregister_removes_both_sides() {
        let reg = CodecRegistry::new();
        let key = action_key(7);
        reg.register_decoder(key, decoder_returning(ActionKind::DecNwTtl));
        reg.register_encoder(key, Encoder::Action(Arc::new(|_a, _c| Ok(()))));
        reg.unregister(&key);
        assert!(reg.lookup_decoder(&key).is_none());
        assert!(reg.lookup_encoder(&key).is_none());
    }

    #[test]
    fn kind_mismatch_is_a_miss() {
        let reg = CodecRegistry::new();
        let key = action_key(11);
        reg.register_decoder(key, decoder_returning(ActionKind::DecNwTtl));
        assert!(matches!(
            reg.message_decoder(&key),
            Err(CodecError::NoCodecForKey { .. })
        ));
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let reg = std::sync::Arc::new(CodecRegistry::new());
        let writer = {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for t in 0..512u16 {
                    reg.register_decoder(action_key(t), decoder_returning(ActionKind::DecNwTtl));
                }
            })
        };
        let reader = {
            let reg = reg.clone();
            std::thread::spawn(move || {
                for t in 0..512u16 {
                    // half-published registrations must never be observable
                    if let Some(Decoder::Action(f)) = reg.lookup_decoder(&action_key(t)) {
                        let mut cur = DecodeCursor::new(&[]);
                        assert!(f(&mut cur, &reg).is_ok());
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }
}
