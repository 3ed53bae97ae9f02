//! OpenFlow 1.3 message types and their codecs.
//!
//! Every message codec is reached through the registry, keyed by
//! `(version, message type)`. `register_core_codecs` installs the
//! codecs below plus the core action and match-entry decoders; vendor
//! modules add theirs on top.

use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::actions::{
    decode_actions, decode_instructions, encode_action_list, encode_instructions, register_core_actions,
    Action, Instruction,
};
use crate::bits::{bit, test_bit};
use crate::bundle::{BundleAddMessage, BundleControl};
use crate::cursor::{DecodeCursor, EncodeCursor};
use crate::error::CodecError;
use crate::experimenter::UnknownCodecPolicy;
use crate::ofp_header::{OfpHeader, Version, OFP_HEADER_LEN};
use crate::oxm::{decode_match, encode_match, register_basic_entries, Match};
use crate::registry::{CodecKey, CodecRegistry, Decoder, Encoder, MessageDecodeFn, MessageEncodeFn};

/// Buffer id meaning "the full packet is in this message".
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;
/// Port wildcard for flow deletion filters.
pub const OFPP_ANY: u32 = 0xffff_ffff;
/// Group wildcard for flow deletion filters.
pub const OFPG_ANY: u32 = 0xffff_ffff;
/// Priority assigned to flows that do not state one.
pub const DEFAULT_FLOW_PRIORITY: u16 = 0x8000;
/// `max_len` value requesting the whole packet in packet-ins.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MsgType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Experimenter = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    GetConfigRequest = 7,
    GetConfigReply = 8,
    SetConfig = 9,
    PacketIn = 10,
    FlowRemoved = 11,
    PortStatus = 12,
    PacketOut = 13,
    FlowMod = 14,
    GroupMod = 15,
    PortMod = 16,
    TableMod = 17,
    MultipartRequest = 18,
    MultipartReply = 19,
    BarrierRequest = 20,
    BarrierReply = 21,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    pub err_type: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

/// Switch capability bits from the features handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub flow_stats: bool,
    pub table_stats: bool,
    pub port_stats: bool,
    pub group_stats: bool,
    pub ip_reasm: bool,
    pub queue_stats: bool,
    pub port_blocked: bool,
}

impl Capabilities {
    fn marshal(&self) -> u32 {
        let mut v = 0u64;
        v = bit(0, v, self.flow_stats);
        v = bit(1, v, self.table_stats);
        v = bit(2, v, self.port_stats);
        v = bit(3, v, self.group_stats);
        v = bit(5, v, self.ip_reasm);
        v = bit(6, v, self.queue_stats);
        v = bit(8, v, self.port_blocked);
        v as u32
    }

    fn parse(v: u32) -> Capabilities {
        let v = u64::from(v);
        Capabilities {
            flow_stats: test_bit(0, v),
            table_stats: test_bit(1, v),
            port_stats: test_bit(2, v),
            group_stats: test_bit(3, v),
            ip_reasm: test_bit(5, v),
            queue_stats: test_bit(6, v),
            port_blocked: test_bit(8, v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub auxiliary_id: u8,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowModFlags {
    pub send_flow_rem: bool,
    pub check_overlap: bool,
    pub reset_counts: bool,
    pub no_pkt_counts: bool,
    pub no_byt_counts: bool,
}

impl FlowModFlags {
    fn marshal(&self) -> u16 {
        let mut v = 0u64;
        v = bit(0, v, self.send_flow_rem);
        v = bit(1, v, self.check_overlap);
        v = bit(2, v, self.reset_counts);
        v = bit(3, v, self.no_pkt_counts);
        v = bit(4, v, self.no_byt_counts);
        v as u16
    }

    fn parse(v: u16) -> FlowModFlags {
        let v = u64::from(v);
        FlowModFlags {
            send_flow_rem: test_bit(0, v),
            check_overlap: test_bit(1, v),
            reset_counts: test_bit(2, v),
            no_pkt_counts: test_bit(3, v),
            no_byt_counts: test_bit(4, v),
        }
    }
}

/// Flow table modification.
///
/// Every field a caller may omit is optional and encoded with the
/// protocol's conventional default; only the match is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCommand,
    pub cookie: Option<u64>,
    pub cookie_mask: Option<u64>,
    pub table_id: Option<u8>,
    pub idle_timeout: Option<u16>,
    pub hard_timeout: Option<u16>,
    pub priority: Option<u16>,
    pub buffer_id: Option<u32>,
    pub out_port: Option<u32>,
    pub out_group: Option<u32>,
    pub flags: FlowModFlags,
    pub match_fields: Option<Match>,
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    pub fn add() -> FlowMod {
        FlowMod {
            command: FlowModCommand::Add,
            cookie: None,
            cookie_mask: None,
            table_id: None,
            idle_timeout: None,
            hard_timeout: None,
            priority: None,
            buffer_id: None,
            out_port: None,
            out_group: None,
            flags: FlowModFlags::default(),
            match_fields: None,
            instructions: vec![],
        }
    }

    /// Copy with every absent optional filled with the value the
    /// encoder emits for it. The wire carries no absence marker, so a
    /// decoded flow-mod always comes back in this form.
    pub fn defaulted(&self) -> FlowMod {
        FlowMod {
            command: self.command,
            cookie: Some(self.cookie.unwrap_or(0)),
            cookie_mask: Some(self.cookie_mask.unwrap_or(0)),
            table_id: Some(self.table_id.unwrap_or(0)),
            idle_timeout: Some(self.idle_timeout.unwrap_or(0)),
            hard_timeout: Some(self.hard_timeout.unwrap_or(0)),
            priority: Some(self.priority.unwrap_or(DEFAULT_FLOW_PRIORITY)),
            buffer_id: Some(self.buffer_id.unwrap_or(OFP_NO_BUFFER)),
            out_port: Some(self.out_port.unwrap_or(OFPP_ANY)),
            out_group: Some(self.out_group.unwrap_or(OFPG_ANY)),
            flags: self.flags,
            match_fields: self.match_fields.clone(),
            instructions: self.instructions.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum GroupModCommand {
    Add = 0,
    Modify = 1,
    Delete = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum GroupType {
    All = 0,
    Select = 1,
    Indirect = 2,
    FastFailover = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub weight: u16,
    pub watch_port: u32,
    pub watch_group: u32,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMod {
    pub command: GroupModCommand,
    pub group_type: GroupType,
    pub group_id: u32,
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMod {
    pub port_no: u32,
    pub hw_addr: [u8; 6],
    pub config: u32,
    pub mask: u32,
    pub advertise: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: u8,
    pub table_id: u8,
    pub cookie: u64,
    pub match_fields: Match,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub payload: Vec<u8>,
}

/// A multipart segment. Bodies are statistics payloads the transport
/// reassembles; the codec carries them opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub mp_type: u16,
    pub flags: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimenterMessage {
    pub experimenter: u32,
    pub exp_type: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Vec<u8>),
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    Experimenter(ExperimenterMessage),
    FeaturesRequest,
    FeaturesReply(SwitchFeatures),
    PacketIn(PacketIn),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    GroupMod(GroupMod),
    PortMod(PortMod),
    MultipartRequest(Multipart),
    MultipartReply(Multipart),
    BarrierRequest,
    BarrierReply,
    BundleControl(BundleControl),
    BundleAddMessage(BundleAddMessage),
}

impl Message {
    /// Wire type code this message is framed under.
    pub fn msg_type(&self) -> u8 {
        let t = match self {
            Message::Hello(_) => MsgType::Hello,
            Message::Error(_) => MsgType::Error,
            Message::EchoRequest(_) => MsgType::EchoRequest,
            Message::EchoReply(_) => MsgType::EchoReply,
            Message::Experimenter(_) => MsgType::Experimenter,
            Message::FeaturesRequest => MsgType::FeaturesRequest,
            Message::FeaturesReply(_) => MsgType::FeaturesReply,
            Message::PacketIn(_) => MsgType::PacketIn,
            Message::PacketOut(_) => MsgType::PacketOut,
            Message::FlowMod(_) => MsgType::FlowMod,
            Message::GroupMod(_) => MsgType::GroupMod,
            Message::PortMod(_) => MsgType::PortMod,
            Message::MultipartRequest(_) => MsgType::MultipartRequest,
            Message::MultipartReply(_) => MsgType::MultipartReply,
            Message::BarrierRequest => MsgType::BarrierRequest,
            Message::BarrierReply => MsgType::BarrierReply,
            // bundle messages are framed as ONF experimenter messages
            Message::BundleControl(_) | Message::BundleAddMessage(_) => MsgType::Experimenter,
        };
        t.into()
    }
}

/// A fully decoded frame plus how many input bytes it consumed, so the
/// transport can resume at the next frame in the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub version: Version,
    pub xid: u32,
    pub message: Message,
    pub consumed: usize,
}

/// Frame and append `message` to `buf`: header, body via the registered
/// encoder, then the header length backpatched over the placeholder.
pub fn encode_message(
    reg: &CodecRegistry,
    version: Version,
    xid: u32,
    message: &Message,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    let mut cur = EncodeCursor::new(buf);
    encode_into(reg, version, xid, message, &mut cur)
}

pub fn encode_into(
    reg: &CodecRegistry,
    version: Version,
    xid: u32,
    message: &Message,
    cur: &mut EncodeCursor<'_>,
) -> Result<(), CodecError> {
    let start = cur.pos();
    let msg_type = message.msg_type();
    cur.write_u8(version.into());
    cur.write_u8(msg_type);
    let slot = cur.reserve_u16();
    cur.write_u32(xid);
    let key = CodecKey::Message { version, msg_type };
    let f = reg.message_encoder(&key)?;
    f(message, cur, reg)?;
    cur.patch_length(slot, start);
    Ok(())
}

/// Decode the frame at the front of `buf`.
pub fn decode_message(
    reg: &CodecRegistry,
    buf: &[u8],
    policy: UnknownCodecPolicy,
) -> Result<DecodedMessage, CodecError> {
    let mut cur = DecodeCursor::new(buf);
    decode_from(reg, &mut cur, policy)
}

/// Decode one frame from the cursor. The body is handed to the
/// registered decoder as a sub-cursor bounded by the header length;
/// residue after the decoder returns is an error, not silently dropped.
pub fn decode_from(
    reg: &CodecRegistry,
    cur: &mut DecodeCursor<'_>,
    policy: UnknownCodecPolicy,
) -> Result<DecodedMessage, CodecError> {
    let start = cur.pos();
    let hdr = OfpHeader::decode(cur)?;
    let mut body = cur.slice(hdr.length as usize - OFP_HEADER_LEN)?;
    let key = CodecKey::Message {
        version: hdr.version,
        msg_type: hdr.msg_type,
    };
    let f = reg.message_decoder(&key)?;
    let message = f(&mut body, reg, policy)?;
    if !body.is_empty() {
        return Err(CodecError::TrailingData {
            context: "message body",
            left: body.remaining(),
        });
    }
    Ok(DecodedMessage {
        version: hdr.version,
        xid: hdr.xid,
        message,
        consumed: cur.pos() - start,
    })
}

fn variant_mismatch() -> CodecError {
    CodecError::InvalidMessage {
        reason: "message variant does not match its registered type code",
    }
}

fn register_message(
    reg: &CodecRegistry,
    version: Version,
    msg_type: MsgType,
    enc: MessageEncodeFn,
    dec: MessageDecodeFn,
) {
    let key = CodecKey::Message {
        version,
        msg_type: msg_type.into(),
    };
    reg.register_encoder(key, Encoder::Message(enc));
    reg.register_decoder(key, Decoder::Message(dec));
}

fn encode_flow_mod(
    fm: &FlowMod,
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    cur.write_u64(fm.cookie.unwrap_or(0));
    cur.write_u64(fm.cookie_mask.unwrap_or(0));
    cur.write_u8(fm.table_id.unwrap_or(0));
    cur.write_u8(fm.command.into());
    cur.write_u16(fm.idle_timeout.unwrap_or(0));
    cur.write_u16(fm.hard_timeout.unwrap_or(0));
    cur.write_u16(fm.priority.unwrap_or(DEFAULT_FLOW_PRIORITY));
    cur.write_u32(fm.buffer_id.unwrap_or(OFP_NO_BUFFER));
    cur.write_u32(fm.out_port.unwrap_or(OFPP_ANY));
    cur.write_u32(fm.out_group.unwrap_or(OFPG_ANY));
    cur.write_u16(fm.flags.marshal());
    cur.write_zero(2);
    let m = fm.match_fields.as_ref().ok_or(CodecError::InvalidMessage {
        reason: "flow-mod without a match",
    })?;
    encode_match(m, cur, reg, version)?;
    encode_instructions(&fm.instructions, cur, reg, version)
}

fn decode_flow_mod(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
    policy: UnknownCodecPolicy,
) -> Result<FlowMod, CodecError> {
    let cookie = cur.read_u64()?;
    let cookie_mask = cur.read_u64()?;
    let table_id = cur.read_u8()?;
    let command = FlowModCommand::try_from(cur.read_u8()?).map_err(|_| {
        CodecError::InvalidMessage {
            reason: "unknown flow-mod command",
        }
    })?;
    let idle_timeout = cur.read_u16()?;
    let hard_timeout = cur.read_u16()?;
    let priority = cur.read_u16()?;
    let buffer_id = cur.read_u32()?;
    let out_port = cur.read_u32()?;
    let out_group = cur.read_u32()?;
    let flags = FlowModFlags::parse(cur.read_u16()?);
    cur.skip(2)?;
    let match_fields = decode_match(cur, reg, version, policy)?;
    let instructions = decode_instructions(cur, reg, version, policy)?;
    Ok(FlowMod {
        command,
        cookie: Some(cookie),
        cookie_mask: Some(cookie_mask),
        table_id: Some(table_id),
        idle_timeout: Some(idle_timeout),
        hard_timeout: Some(hard_timeout),
        priority: Some(priority),
        buffer_id: Some(buffer_id),
        out_port: Some(out_port),
        out_group: Some(out_group),
        flags,
        match_fields: Some(match_fields),
        instructions,
    })
}

fn encode_group_mod(
    gm: &GroupMod,
    cur: &mut EncodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
) -> Result<(), CodecError> {
    cur.write_u16(gm.command.into());
    cur.write_u8(gm.group_type.into());
    cur.write_zero(1);
    cur.write_u32(gm.group_id);
    for bucket in &gm.buckets {
        let start = cur.pos();
        let slot = cur.reserve_u16();
        cur.write_u16(bucket.weight);
        cur.write_u32(bucket.watch_port);
        cur.write_u32(bucket.watch_group);
        cur.write_zero(4);
        encode_action_list(&bucket.actions, cur, reg, version)?;
        cur.patch_length(slot, start);
    }
    Ok(())
}

fn decode_group_mod(
    cur: &mut DecodeCursor<'_>,
    reg: &CodecRegistry,
    version: Version,
    policy: UnknownCodecPolicy,
) -> Result<GroupMod, CodecError> {
    let command = GroupModCommand::try_from(cur.read_u16()?).map_err(|_| {
        CodecError::InvalidMessage {
            reason: "unknown group-mod command",
        }
    })?;
    let group_type = GroupType::try_from(cur.read_u8()?).map_err(|_| {
        CodecError::InvalidMessage {
            reason: "unknown group type",
        }
    })?;
    cur.skip(1)?;
    let group_id = cur.read_u32()?;
    let mut buckets = vec![];
    while !cur.is_empty() {
        let mut peek = *cur;
        let declared = peek.read_u16()? as usize;
        if declared < 16 {
            return Err(CodecError::InvalidMessage {
                reason: "bucket length shorter than the bucket header",
            });
        }
        let mut span = cur.slice(declared)?;
        span.skip(2)?;
        let weight = span.read_u16()?;
        let watch_port = span.read_u32()?;
        let watch_group = span.read_u32()?;
        span.skip(4)?;
        let actions = decode_actions(&mut span, reg, version, policy)?;
        buckets.push(Bucket {
            weight,
            watch_port,
            watch_group,
            actions,
        });
    }
    Ok(GroupMod {
        command,
        group_type,
        group_id,
        buckets,
    })
}

fn encode_port_mod(pm: &PortMod, cur: &mut EncodeCursor<'_>) {
    cur.write_u32(pm.port_no);
    cur.write_zero(4);
    cur.write_bytes(&pm.hw_addr);
    cur.write_zero(2);
    cur.write_u32(pm.config);
    cur.write_u32(pm.mask);
    cur.write_u32(pm.advertise);
    cur.write_zero(4);
}

fn decode_port_mod(cur: &mut DecodeCursor<'_>) -> Result<PortMod, CodecError> {
    let port_no = cur.read_u32()?;
    cur.skip(4)?;
    let mut hw_addr = [0u8; 6];
    hw_addr.copy_from_slice(cur.read_bytes(6)?);
    cur.skip(2)?;
    let config = cur.read_u32()?;
    let mask = cur.read_u32()?;
    let advertise = cur.read_u32()?;
    cur.skip(4)?;
    Ok(PortMod {
        port_no,
        hw_addr,
        config,
        mask,
        advertise,
    })
}

/// Install the codecs for the base protocol.
pub fn register_core_codecs(reg: &CodecRegistry) {
    let version = Version::V1_3;
    register_core_actions(reg, version);
    register_basic_entries(reg, version);

    register_message(
        reg,
        version,
        MsgType::Hello,
        Arc::new(|msg, cur, _reg| match msg {
            Message::Hello(elements) => {
                cur.write_bytes(elements);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let elements = cur.rest().to_vec();
            cur.skip(elements.len())?;
            Ok(Message::Hello(elements))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::Error,
        Arc::new(|msg, cur, _reg| match msg {
            Message::Error(e) => {
                cur.write_u16(e.err_type);
                cur.write_u16(e.code);
                cur.write_bytes(&e.data);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let err_type = cur.read_u16()?;
            let code = cur.read_u16()?;
            let data = cur.rest().to_vec();
            cur.skip(data.len())?;
            Ok(Message::Error(ErrorMsg {
                err_type,
                code,
                data,
            }))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::EchoRequest,
        Arc::new(|msg, cur, _reg| match msg {
            Message::EchoRequest(data) => {
                cur.write_bytes(data);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let data = cur.rest().to_vec();
            cur.skip(data.len())?;
            Ok(Message::EchoRequest(data))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::EchoReply,
        Arc::new(|msg, cur, _reg| match msg {
            Message::EchoReply(data) => {
                cur.write_bytes(data);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let data = cur.rest().to_vec();
            cur.skip(data.len())?;
            Ok(Message::EchoReply(data))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::Experimenter,
        Arc::new(|msg, cur, _reg| match msg {
            Message::Experimenter(em) => {
                cur.write_u32(em.experimenter);
                cur.write_u32(em.exp_type);
                cur.write_bytes(&em.data);
                Ok(())
            }
            Message::BundleControl(_) | Message::BundleAddMessage(_) => {
                Err(CodecError::InvalidMessage {
                    reason: "experimenter message variant requires a vendor codec",
                })
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(move |cur, reg, policy| {
            let mut peek = *cur;
            let experimenter = peek.read_u32()?;
            let exp_type = peek.read_u32()?;
            let key = CodecKey::Experimenter {
                version,
                experimenter,
                subtype: Some(exp_type),
            };
            match reg.message_decoder(&key) {
                Ok(f) => f(cur, reg, policy),
                Err(err) => match policy {
                    // carry the body opaque rather than dropping the frame
                    UnknownCodecPolicy::Skip => {
                        cur.skip(8)?;
                        let data = cur.rest().to_vec();
                        cur.skip(data.len())?;
                        Ok(Message::Experimenter(ExperimenterMessage {
                            experimenter,
                            exp_type,
                            data,
                        }))
                    }
                    UnknownCodecPolicy::Fail => Err(err),
                },
            }
        }),
    );

    register_message(
        reg,
        version,
        MsgType::FeaturesRequest,
        Arc::new(|msg, _cur, _reg| match msg {
            Message::FeaturesRequest => Ok(()),
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|_cur, _reg, _policy| Ok(Message::FeaturesRequest)),
    );

    register_message(
        reg,
        version,
        MsgType::FeaturesReply,
        Arc::new(|msg, cur, _reg| match msg {
            Message::FeaturesReply(f) => {
                cur.write_u64(f.datapath_id);
                cur.write_u32(f.num_buffers);
                cur.write_u8(f.num_tables);
                cur.write_u8(f.auxiliary_id);
                cur.write_zero(2);
                cur.write_u32(f.capabilities.marshal());
                cur.write_u32(0); // reserved
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let datapath_id = cur.read_u64()?;
            let num_buffers = cur.read_u32()?;
            let num_tables = cur.read_u8()?;
            let auxiliary_id = cur.read_u8()?;
            cur.skip(2)?;
            let capabilities = Capabilities::parse(cur.read_u32()?);
            cur.skip(4)?;
            Ok(Message::FeaturesReply(SwitchFeatures {
                datapath_id,
                num_buffers,
                num_tables,
                auxiliary_id,
                capabilities,
            }))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::PacketIn,
        Arc::new(move |msg, cur, reg| match msg {
            Message::PacketIn(pi) => {
                cur.write_u32(pi.buffer_id);
                cur.write_u16(pi.total_len);
                cur.write_u8(pi.reason);
                cur.write_u8(pi.table_id);
                cur.write_u64(pi.cookie);
                encode_match(&pi.match_fields, cur, reg, version)?;
                cur.write_zero(2);
                cur.write_bytes(&pi.payload);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(move |cur, reg, policy| {
            let buffer_id = cur.read_u32()?;
            let total_len = cur.read_u16()?;
            let reason = cur.read_u8()?;
            let table_id = cur.read_u8()?;
            let cookie = cur.read_u64()?;
            let match_fields = decode_match(cur, reg, version, policy)?;
            cur.skip(2)?;
            let payload = cur.rest().to_vec();
            cur.skip(payload.len())?;
            Ok(Message::PacketIn(PacketIn {
                buffer_id,
                total_len,
                reason,
                table_id,
                cookie,
                match_fields,
                payload,
            }))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::PacketOut,
        Arc::new(move |msg, cur, reg| match msg {
            Message::PacketOut(po) => {
                cur.write_u32(po.buffer_id);
                cur.write_u32(po.in_port);
                let slot = cur.reserve_u16();
                cur.write_zero(6);
                let actions_start = cur.pos();
                encode_action_list(&po.actions, cur, reg, version)?;
                cur.patch_length(slot, actions_start);
                cur.write_bytes(&po.payload);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(move |cur, reg, policy| {
            let buffer_id = cur.read_u32()?;
            let in_port = cur.read_u32()?;
            let actions_len = cur.read_u16()? as usize;
            cur.skip(6)?;
            let mut actions_span = cur.slice(actions_len)?;
            let actions = decode_actions(&mut actions_span, reg, version, policy)?;
            let payload = cur.rest().to_vec();
            cur.skip(payload.len())?;
            Ok(Message::PacketOut(PacketOut {
                buffer_id,
                in_port,
                actions,
                payload,
            }))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::FlowMod,
        Arc::new(move |msg, cur, reg| match msg {
            Message::FlowMod(fm) => encode_flow_mod(fm, cur, reg, version),
            _ => Err(variant_mismatch()),
        }),
        Arc::new(move |cur, reg, policy| {
            Ok(Message::FlowMod(decode_flow_mod(cur, reg, version, policy)?))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::GroupMod,
        Arc::new(move |msg, cur, reg| match msg {
            Message::GroupMod(gm) => encode_group_mod(gm, cur, reg, version),
            _ => Err(variant_mismatch()),
        }),
        Arc::new(move |cur, reg, policy| {
            Ok(Message::GroupMod(decode_group_mod(cur, reg, version, policy)?))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::PortMod,
        Arc::new(|msg, cur, _reg| match msg {
            Message::PortMod(pm) => {
                encode_port_mod(pm, cur);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| Ok(Message::PortMod(decode_port_mod(cur)?))),
    );

    register_message(
        reg,
        version,
        MsgType::MultipartRequest,
        Arc::new(|msg, cur, _reg| match msg {
            Message::MultipartRequest(mp) => {
                cur.write_u16(mp.mp_type);
                cur.write_u16(mp.flags);
                cur.write_zero(4);
                cur.write_bytes(&mp.body);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let mp_type = cur.read_u16()?;
            let flags = cur.read_u16()?;
            cur.skip(4)?;
            let body = cur.rest().to_vec();
            cur.skip(body.len())?;
            Ok(Message::MultipartRequest(Multipart {
                mp_type,
                flags,
                body,
            }))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::MultipartReply,
        Arc::new(|msg, cur, _reg| match msg {
            Message::MultipartReply(mp) => {
                cur.write_u16(mp.mp_type);
                cur.write_u16(mp.flags);
                cur.write_zero(4);
                cur.write_bytes(&mp.body);
                Ok(())
            }
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|cur, _reg, _policy| {
            let mp_type = cur.read_u16()?;
            let flags = cur.read_u16()?;
            cur.skip(4)?;
            let body = cur.rest().to_vec();
            cur.skip(body.len())?;
            Ok(Message::MultipartReply(Multipart {
                mp_type,
                flags,
                body,
            }))
        }),
    );

    register_message(
        reg,
        version,
        MsgType::BarrierRequest,
        Arc::new(|msg, _cur, _reg| match msg {
            Message::BarrierRequest => Ok(()),
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|_cur, _reg, _policy| Ok(Message::BarrierRequest)),
    );

    register_message(
        reg,
        version,
        MsgType::BarrierReply,
        Arc::new(|msg, _cur, _reg| match msg {
            Message::BarrierReply => Ok(()),
            _ => Err(variant_mismatch()),
        }),
        Arc::new(|_cur, _reg, _policy| Ok(Message::BarrierReply)),
    );
}
