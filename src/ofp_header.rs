use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;

/// Size of the common header shared by every OpenFlow message.
pub const OFP_HEADER_LEN: usize = 8;

/// OpenFlow protocol version tag.
///
/// Nearly every encoding rule is version-dependent, so the version is
/// carried explicitly on every codec key and never implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Version {
    V1_0 = 0x01,
    V1_3 = 0x04,
}

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol
/// version. The transport layer frames on the `length` field at offset 2;
/// the codec writes a placeholder there and backpatches it once the body
/// is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    pub version: Version,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl OfpHeader {
    pub fn encode(&self, cur: &mut EncodeCursor<'_>) {
        cur.write_u8(self.version.into());
        cur.write_u8(self.msg_type);
        cur.write_u16(self.length);
        cur.write_u32(self.xid);
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<OfpHeader, CodecError> {
        let version = Version::try_from(cur.read_u8()?).map_err(|_| {
            CodecError::InvalidMessage {
                reason: "unsupported protocol version",
            }
        })?;
        let msg_type = cur.read_u8()?;
        let length = cur.read_u16()?;
        let xid = cur.read_u32()?;
        if (length as usize) < OFP_HEADER_LEN {
            return Err(CodecError::InvalidMessage {
                reason: "header length shorter than the header itself",
            });
        }
        Ok(OfpHeader {
            version,
            msg_type,
            length,
            xid,
        })
    }
}
