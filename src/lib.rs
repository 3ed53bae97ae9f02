#![crate_name = "ofp_codec"]
#![crate_type = "lib"]

//! Wire codec for the OpenFlow southbound protocol.
//!
//! All encoders and decoders hang off a [`CodecRegistry`]: the core
//! message set is installed with [`register_core_codecs`], and vendor
//! modules ([`nicira`], [`cisco`], [`ericsson`], [`bundle`]) add their
//! extensions on top. Decoding never panics on untrusted input; every
//! failure is a typed [`CodecError`].

mod bits;

pub mod actions;
pub mod bundle;
pub mod cisco;
pub mod cursor;
pub mod ericsson;
pub mod error;
pub mod experimenter;
pub mod nicira;
pub mod ofp_header;
pub mod openflow0x04;
pub mod oxm;
pub mod registry;

pub use crate::error::CodecError;
pub use crate::experimenter::UnknownCodecPolicy;
pub use crate::ofp_header::{OfpHeader, Version, OFP_HEADER_LEN};
pub use crate::openflow0x04::{
    decode_message, encode_message, register_core_codecs, DecodedMessage, Message,
};
pub use crate::registry::{CodecKey, CodecRegistry};
