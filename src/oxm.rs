//! Match field list encoding: the self-describing OXM TLV block.
//!
//! Every match is encoded as the OXM variant regardless of its internal
//! representation. Each entry is a `(class, field, has_mask, length)`
//! TLV; the block is length-prefixed (length excludes trailing padding)
//! and zero-padded to a multiple of 8 measured from the block start.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tracing::warn;

use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::UnknownCodecPolicy;
use crate::ofp_header::Version;
use crate::registry::{CodecKey, CodecRegistry, Decoder, MatchEntryDecodeFn};

/// Match type tag: all matches are encoded as OXM.
pub const OFPMT_OXM: u16 = 1;

/// OXM class for the fields defined by the base protocol.
pub const OPENFLOW_BASIC_CLASS: u16 = 0x8000;
/// OXM class marking an experimenter match entry (value is prefixed by a
/// 4-byte experimenter id on the wire).
pub const EXPERIMENTER_CLASS: u16 = 0xffff;

/// Field codes within `OPENFLOW_BASIC_CLASS`.
pub mod basic_field {
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const VLAN_VID: u8 = 6;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
    pub const TCP_SRC: u8 = 13;
    pub const TCP_DST: u8 = 14;
    pub const UDP_SRC: u8 = 15;
    pub const UDP_DST: u8 = 16;
    pub const ARP_OP: u8 = 21;
    pub const ARP_SPA: u8 = 22;
    pub const ARP_TPA: u8 = 23;
    pub const ARP_SHA: u8 = 24;
    pub const ARP_THA: u8 = 25;
    pub const IPV6_SRC: u8 = 26;
    pub const IPV6_DST: u8 = 27;
    pub const TUNNEL_ID: u8 = 38;
}

/// The four-byte header of one OXM TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OxmHeader {
    pub class: u16,
    pub field: u8,
    pub has_mask: bool,
    /// Wire length byte: value length, doubled when masked.
    pub length: u8,
}

impl OxmHeader {
    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<OxmHeader, CodecError> {
        let class = cur.read_u16()?;
        let fm = cur.read_u8()?;
        let length = cur.read_u8()?;
        Ok(OxmHeader {
            class,
            field: fm >> 1,
            has_mask: fm & 1 == 1,
            length,
        })
    }

    /// Length of the value part, mask excluded.
    pub fn value_len(&self) -> usize {
        if self.has_mask {
            self.length as usize / 2
        } else {
            self.length as usize
        }
    }
}

/// One match entry as carried between the codec and its callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    pub class: u16,
    pub field: u8,
    pub has_mask: bool,
    pub value: Vec<u8>,
    pub mask: Option<Vec<u8>>,
}

impl MatchEntry {
    pub fn basic(field: u8, value: Vec<u8>, mask: Option<Vec<u8>>) -> MatchEntry {
        MatchEntry {
            class: OPENFLOW_BASIC_CLASS,
            field,
            has_mask: mask.is_some(),
            value,
            mask,
        }
    }

    /// Serialize this entry as a raw OXM TLV.
    pub fn encode(&self, cur: &mut EncodeCursor<'_>) -> Result<(), CodecError> {
        if let Some(mask) = &self.mask {
            if mask.len() != self.value.len() {
                return Err(CodecError::InvalidMessage {
                    reason: "match entry mask length differs from value length",
                });
            }
        }
        let masked = self.mask.is_some();
        let wire_len = if masked {
            2 * self.value.len()
        } else {
            self.value.len()
        };
        if wire_len > usize::from(u8::MAX) {
            return Err(CodecError::InvalidMessage {
                reason: "match entry value too long for the length byte",
            });
        }
        cur.write_u16(self.class);
        cur.write_u8((self.field << 1) | masked as u8);
        cur.write_u8(wire_len as u8);
        cur.write_bytes(&self.value);
        if let Some(mask) = &self.mask {
            cur.write_bytes(mask);
        }
        Ok(())
    }
}

/// An IPv4 address with an optional CIDR prefix length.
///
/// Parsed from text such as `"192.168.1.1/30"`; the absence of a slash
/// means no mask at all, not an implicit full mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Prefix {
    pub addr: Ipv4Addr,
    pub prefix: Option<u8>,
}

impl Ipv4Prefix {
    pub fn parse(text: &str) -> Result<Ipv4Prefix, CodecError> {
        let (addr_part, prefix) = split_prefix(text, 32)?;
        let addr = addr_part
            .parse::<Ipv4Addr>()
            .map_err(|_| CodecError::InvalidMessage {
                reason: "malformed IPv4 address",
            })?;
        Ok(Ipv4Prefix { addr, prefix })
    }

    pub fn mask_octets(&self) -> Option<[u8; 4]> {
        self.prefix.map(|p| {
            let m = match p {
                0 => 0,
                p if p >= 32 => u32::MAX,
                p => u32::MAX << (32 - u32::from(p)),
            };
            m.to_be_bytes()
        })
    }

    fn from_wire(value: &[u8; 4], mask: Option<&[u8]>) -> Option<Ipv4Prefix> {
        let prefix = match mask {
            None => None,
            Some(m) => Some(contiguous_prefix(m)?),
        };
        Some(Ipv4Prefix {
            addr: Ipv4Addr::from(*value),
            prefix,
        })
    }
}

/// An IPv6 address with an optional prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Prefix {
    pub addr: Ipv6Addr,
    pub prefix: Option<u8>,
}

impl Ipv6Prefix {
    pub fn parse(text: &str) -> Result<Ipv6Prefix, CodecError> {
        let (addr_part, prefix) = split_prefix(text, 128)?;
        let addr = addr_part
            .parse::<Ipv6Addr>()
            .map_err(|_| CodecError::InvalidMessage {
                reason: "malformed IPv6 address",
            })?;
        Ok(Ipv6Prefix { addr, prefix })
    }

    pub fn mask_octets(&self) -> Option<[u8; 16]> {
        self.prefix.map(|p| {
            let m = match p {
                0 => 0,
                p if p >= 128 => u128::MAX,
                p => u128::MAX << (128 - u32::from(p)),
            };
            m.to_be_bytes()
        })
    }

    fn from_wire(value: &[u8; 16], mask: Option<&[u8]>) -> Option<Ipv6Prefix> {
        let prefix = match mask {
            None => None,
            Some(m) => Some(contiguous_prefix(m)?),
        };
        Some(Ipv6Prefix {
            addr: Ipv6Addr::from(*value),
            prefix,
        })
    }
}

fn split_prefix(text: &str, bits: u8) -> Result<(&str, Option<u8>), CodecError> {
    match text.split_once('/') {
        None => Ok((text, None)),
        Some((addr, suffix)) => {
            let prefix = suffix
                .parse::<u8>()
                .map_err(|_| CodecError::InvalidMessage {
                    reason: "malformed prefix length",
                })?;
            if prefix > bits {
                return Err(CodecError::InvalidMaskRange { prefix, bits });
            }
            Ok((addr, Some(prefix)))
        }
    }
}

/// Prefix length of a contiguous netmask, or `None` when the set bits
/// are not a prefix.
fn contiguous_prefix(mask: &[u8]) -> Option<u8> {
    let mut prefix = 0u8;
    let mut body_done = false;
    for &b in mask {
        if body_done {
            if b != 0 {
                return None;
            }
            continue;
        }
        let ones = b.leading_ones() as u8;
        prefix += ones;
        if ones < 8 {
            if b & (0xff >> ones) != 0 {
                return None;
            }
            body_done = true;
        }
    }
    Some(prefix)
}

/// Fields to match against flows, one optional slot per supported
/// dimension. Dimensions are emitted in this declaration order; vendor
/// entries ride in `extensions` and are emitted last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    pub in_port: Option<u32>,
    pub eth_dst: Option<[u8; 6]>,
    pub eth_src: Option<[u8; 6]>,
    pub eth_type: Option<u16>,
    pub vlan_vid: Option<u16>,
    pub ip_proto: Option<u8>,
    pub ipv4_src: Option<Ipv4Prefix>,
    pub ipv4_dst: Option<Ipv4Prefix>,
    pub tcp_src: Option<u16>,
    pub tcp_dst: Option<u16>,
    pub udp_src: Option<u16>,
    pub udp_dst: Option<u16>,
    pub arp_op: Option<u16>,
    pub arp_spa: Option<Ipv4Prefix>,
    pub arp_tpa: Option<Ipv4Prefix>,
    pub arp_sha: Option<[u8; 6]>,
    pub arp_tha: Option<[u8; 6]>,
    pub ipv6_src: Option<Ipv6Prefix>,
    pub ipv6_dst: Option<Ipv6Prefix>,
    pub tunnel_id: Option<u64>,
    pub extensions: Vec<MatchEntry>,
}

impl Match {
    pub fn new() -> Match {
        Match::default()
    }

    /// Flatten the populated dimensions into OXM entries, in the fixed
    /// dimension order.
    pub fn entries(&self) -> Vec<MatchEntry> {
        let mut out = vec![];
        if let Some(p) = self.in_port {
            out.push(MatchEntry::basic(basic_field::IN_PORT, p.to_be_bytes().to_vec(), None));
        }
        if let Some(mac) = self.eth_dst {
            out.push(MatchEntry::basic(basic_field::ETH_DST, mac.to_vec(), None));
        }
        if let Some(mac) = self.eth_src {
            out.push(MatchEntry::basic(basic_field::ETH_SRC, mac.to_vec(), None));
        }
        if let Some(t) = self.eth_type {
            out.push(MatchEntry::basic(basic_field::ETH_TYPE, t.to_be_bytes().to_vec(), None));
        }
        if let Some(v) = self.vlan_vid {
            out.push(MatchEntry::basic(basic_field::VLAN_VID, v.to_be_bytes().to_vec(), None));
        }
        if let Some(p) = self.ip_proto {
            out.push(MatchEntry::basic(basic_field::IP_PROTO, vec![p], None));
        }
        if let Some(pfx) = self.ipv4_src {
            out.push(ipv4_entry(basic_field::IPV4_SRC, pfx));
        }
        if let Some(pfx) = self.ipv4_dst {
            out.push(ipv4_entry(basic_field::IPV4_DST, pfx));
        }
        if let Some(p) = self.tcp_src {
            out.push(MatchEntry::basic(basic_field::TCP_SRC, p.to_be_bytes().to_vec(), None));
        }
        if let Some(p) = self.tcp_dst {
            out.push(MatchEntry::basic(basic_field::TCP_DST, p.to_be_bytes().to_vec(), None));
        }
        if let Some(p) = self.udp_src {
            out.push(MatchEntry::basic(basic_field::UDP_SRC, p.to_be_bytes().to_vec(), None));
        }
        if let Some(p) = self.udp_dst {
            out.push(MatchEntry::basic(basic_field::UDP_DST, p.to_be_bytes().to_vec(), None));
        }
        if let Some(op) = self.arp_op {
            out.push(MatchEntry::basic(basic_field::ARP_OP, op.to_be_bytes().to_vec(), None));
        }
        if let Some(pfx) = self.arp_spa {
            out.push(ipv4_entry(basic_field::ARP_SPA, pfx));
        }
        if let Some(pfx) = self.arp_tpa {
            out.push(ipv4_entry(basic_field::ARP_TPA, pfx));
        }
        if let Some(mac) = self.arp_sha {
            out.push(MatchEntry::basic(basic_field::ARP_SHA, mac.to_vec(), None));
        }
        if let Some(mac) = self.arp_tha {
            out.push(MatchEntry::basic(basic_field::ARP_THA, mac.to_vec(), None));
        }
        if let Some(pfx) = self.ipv6_src {
            out.push(ipv6_entry(basic_field::IPV6_SRC, pfx));
        }
        if let Some(pfx) = self.ipv6_dst {
            out.push(ipv6_entry(basic_field::IPV6_DST, pfx));
        }
        if let Some(id) = self.tunnel_id {
            out.push(MatchEntry::basic(basic_field::TUNNEL_ID, id.to_be_bytes().to_vec(), None));
        }
        out.extend(self.extensions.iter().cloned());
        out
    }

    /// Fold a decoded entry back into the dimension slots. Entries that
    /// do not map onto a known dimension (vendor classes, unexpected
    /// masks, non-contiguous address masks) are kept raw in `extensions`.
    fn absorb(&mut self, entry: MatchEntry) {
        if entry.class != OPENFLOW_BASIC_CLASS {
            self.extensions.push(entry);
            return;
        }
        match (entry.field, entry.value.as_slice(), entry.mask.as_deref()) {
            (basic_field::IN_PORT, v, None) if v.len() == 4 => {
                self.in_port = Some(u32::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::ETH_DST, v, None) if v.len() == 6 => {
                self.eth_dst = Some(v.try_into().unwrap());
            }
            (basic_field::ETH_SRC, v, None) if v.len() == 6 => {
                self.eth_src = Some(v.try_into().unwrap());
            }
            (basic_field::ETH_TYPE, v, None) if v.len() == 2 => {
                self.eth_type = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::VLAN_VID, v, None) if v.len() == 2 => {
                self.vlan_vid = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::IP_PROTO, v, None) if v.len() == 1 => {
                self.ip_proto = Some(v[0]);
            }
            (basic_field::IPV4_SRC, v, mask) if v.len() == 4 => {
                match Ipv4Prefix::from_wire(v.try_into().unwrap(), mask) {
                    Some(pfx) => self.ipv4_src = Some(pfx),
                    None => self.extensions.push(entry),
                }
            }
            (basic_field::IPV4_DST, v, mask) if v.len() == 4 => {
                match Ipv4Prefix::from_wire(v.try_into().unwrap(), mask) {
                    Some(pfx) => self.ipv4_dst = Some(pfx),
                    None => self.extensions.push(entry),
                }
            }
            (basic_field::TCP_SRC, v, None) if v.len() == 2 => {
                self.tcp_src = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::TCP_DST, v, None) if v.len() == 2 => {
                self.tcp_dst = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::UDP_SRC, v, None) if v.len() == 2 => {
                self.udp_src = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::UDP_DST, v, None) if v.len() == 2 => {
                self.udp_dst = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::ARP_OP, v, None) if v.len() == 2 => {
                self.arp_op = Some(u16::from_be_bytes(v.try_into().unwrap()));
            }
            (basic_field::ARP_SPA, v, mask) if v.len() == 4 => {
                match Ipv4Prefix::from_wire(v.try_into().unwrap(), mask) {
                    Some(pfx) => self.arp_spa = Some(pfx),
                    None => self.extensions.push(entry),
                }
            }
            (basic_field::ARP_TPA, v, mask) if v.len() == 4 => {
                match Ipv4Prefix::from_wire(v.try_into().unwrap(), mask) {
                    Some(pfx) => self.arp_tpa = Some(pfx),
                    None => self.extensions.push(entry),
                }
            }
            (basic_field::ARP_SHA, v, None) if v.len() == 6 => {
                self.arp_sha = Some(v.try_into().unwrap());
            }
            (basic_field::ARP_THA, v, None) if v.len() == 6 => {
                self.arp_tha = Some(v.try_into().unwrap());
            }
            (basic_field::IPV6_SRC, v, mask) if v.len() == 16 => {
                match Ipv6Prefix::from_wire(v.try_into().unwrap(), mask) {
                    Some(pfx) => self.ipv6_src = Some(pfx),
                    None => self.extensions.push(entry),
                }
            }
            (basic_field::IPV6_DST, v, mask) if v.len() == 16 => {
                match Ipv6Prefix::from_wire(v.try_into().unwrap(), mask) {
                    Some(pfx) => self.ipv6_dst = Some(pfx),
                    None => self.extensions.push(entry),
                }
            }
            (basic_field::TUNNEL_ID, v, None) if v.len() == 8 => {
                self.tunnel_id = Some(u64::from_be_bytes(v.try_into().unwrap()));
            }
            _ => self.extensions.push(entry),
        }
    }
}

fn ipv4_entry(field: u8, pfx: Ipv4Prefix) -> MatchEntry {
    MatchEntry::basic(
        field,
        pfx.addr.octets().to_vec(),
        pfx.mask_octets().map(|m| m.to_vec()),
    )
}

fn ipv6_entry(field: u8, pfx: Ipv6Prefix) -> MatchEntry {
    MatchEntry::basic(
        field,
        pfx.addr.octets().to_vec(),
        pfx.mask_octets().map(|m| m.to_vec()),
    )
}

/// Encode a match block: type tag, patched length (padding excluded),
/// one TLV per populated dimension, zero-fill to 8 bytes from the block
/// start.
pub fn encode_match(
    m: &Match,
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    let start = cur.pos();
    cur.write_u16(OFPMT_OXM);
    let slot = cur.reserve_u16();
    for entry in m.entries() {
        encode_entry(&entry, cur, reg, version)?;
    }
    cur.patch_length(slot, start);
    cur.pad_to_multiple(start, 8);
    Ok(())
}

fn encode_entry(
    entry: &MatchEntry,
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    if entry.class == OPENFLOW_BASIC_CLASS {
        return entry.encode(cur);
    }
    // vendor classes may carry extra framing (e.g. an experimenter id)
    let key = CodecKey::MatchEntry {
        version,
        class: entry.class,
        field: entry.field,
    };
    match reg.match_entry_encoder(&key) {
        Ok(f) => f(entry, cur),
        Err(_) => entry.encode(cur),
    }
}

/// Decode a match block, dispatching every TLV through the registry so
/// vendor match fields plug in without the core knowing their shapes.
pub fn decode_match(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
    policy: UnknownCodecPolicy,
) -> Result<Match, CodecError> {
    let match_type = cur.read_u16()?;
    if match_type != OFPMT_OXM {
        return Err(CodecError::InvalidMessage {
            reason: "match type is not OXM",
        });
    }
    let declared = cur.read_u16()? as usize;
    if declared < 4 {
        return Err(CodecError::InvalidMessage {
            reason: "match length shorter than the match header",
        });
    }
    let mut body = cur.slice(declared - 4)?;
    let mut m = Match::new();
    while !body.is_empty() {
        let hdr = OxmHeader::decode(&mut body)?;
        let mut span = body.slice(hdr.length as usize)?;
        let key = CodecKey::MatchEntry {
            version,
            class: hdr.class,
            field: hdr.field,
        };
        match reg.match_entry_decoder(&key) {
            Ok(f) => {
                let entry = f(&hdr, &mut span)?;
                if !span.is_empty() {
                    return Err(CodecError::TrailingData {
                        context: "match entry",
                        left: span.remaining(),
                    });
                }
                m.absorb(entry);
            }
            Err(err) => match policy {
                UnknownCodecPolicy::Skip => {
                    warn!(class = hdr.class, field = hdr.field, "skipping unknown match entry");
                }
                UnknownCodecPolicy::Fail => return Err(err),
            },
        }
    }
    // trailing padding follows the same modulus rule as the encoder
    cur.skip((8 - declared % 8) % 8)?;
    Ok(m)
}

/// Registry decoder for entries whose value has a fixed width.
pub(crate) fn fixed_len_entry_decoder(expected_value_len: u8) -> MatchEntryDecodeFn {
    Arc::new(move |hdr, cur| {
        if hdr.has_mask && hdr.length % 2 != 0 {
            return Err(CodecError::InvalidMessage {
                reason: "masked match entry with odd wire length",
            });
        }
        let value_len = hdr.value_len();
        if value_len != expected_value_len as usize {
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
            class: hdr.class,
            field: hdr.field,
            has_mask: hdr.has_mask,
            value,
            mask,
        })
    })
}

/// Install decoders for the OPENFLOW_BASIC fields this crate models.
pub(crate) fn register_basic_entries(reg: &CodecRegistry, version: Version) {
    const WIDTHS: [(u8, u8); 20] = [
        (basic_field::IN_PORT, 4),
        (basic_field::ETH_DST, 6),
        (basic_field::ETH_SRC, 6),
        (basic_field::ETH_TYPE, 2),
        (basic_field::VLAN_VID, 2),
        (basic_field::IP_PROTO, 1),
        (basic_field::IPV4_SRC, 4),
        (basic_field::IPV4_DST, 4),
        (basic_field::TCP_SRC, 2),
        (basic_field::TCP_DST, 2),
        (basic_field::UDP_SRC, 2),
        (basic_field::UDP_DST, 2),
        (basic_field::ARP_OP, 2),
        (basic_field::ARP_SPA, 4),
        (basic_field::ARP_TPA, 4),
        (basic_field::ARP_SHA, 6),
        (basic_field::ARP_THA, 6),
        (basic_field::IPV6_SRC, 16),
        (basic_field::IPV6_DST, 16),
        (basic_field::TUNNEL_ID, 8),
    ];
    for (field, width) in WIDTHS {
        reg.register_decoder(
            CodecKey::MatchEntry {
                version,
                class: OPENFLOW_BASIC_CLASS,
                field,
            },
            Decoder::MatchEntry(fixed_len_entry_decoder(width)),
        );
    }
}
