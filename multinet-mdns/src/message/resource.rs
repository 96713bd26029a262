use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;

use super::name::*;
use super::packer::*;
use super::*;
use shared::error::*;

// A Resource is a DNS resource record.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub header: ResourceHeader,
    pub body: ResourceBody,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource{{Header: {}, Body: {}}}", self.header, self.body)
    }
}

impl Resource {
    /// Builds a record, taking the type from the body.
    pub fn new(name: Name, ttl: u32, body: ResourceBody) -> Self {
        Resource {
            header: ResourceHeader {
                name,
                typ: body.real_type(),
                class: DNSCLASS_INET,
                cache_flush: false,
                ttl,
                length: 0,
            },
            body,
        }
    }

    /// Sets the mDNS cache-flush bit on the record.
    pub fn with_cache_flush(mut self) -> Self {
        self.header.cache_flush = true;
        self
    }

    // pack appends the wire format of the Resource to msg.
    pub(crate) fn pack(&self, msg: Vec<u8>) -> Result<Vec<u8>> {
        let (mut msg, len_off) = self.header.pack(msg, self.body.wire_type())?;
        let pre_len = msg.len();
        msg = self.body.pack(msg)?;
        ResourceHeader::fix_len(&mut msg, len_off, pre_len)?;
        Ok(msg)
    }
}

/// Header for a DNS resource record.
///
/// ```text
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      NAME                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TYPE                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |CF|                  CLASS                     |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      TTL                      |
/// |                                               |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                   RDLENGTH                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// `CF` is the mDNS cache-flush bit.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct ResourceHeader {
    /// The domain name for which this resource record pertains.
    pub name: Name,

    /// The type of the record. Unknown wire types decode as
    /// [`DnsType::Unsupported`]; the raw value is kept in
    /// [`ResourceBody::Unknown`].
    pub typ: DnsType,

    /// The class with the cache-flush bit stripped.
    pub class: DnsClass,

    /// The cache-flush bit (RFC 6762 section 10.2).
    pub cache_flush: bool,

    /// Time to live in seconds. Zero announces that the record is gone.
    pub ttl: u32,

    /// Length of the RDATA as read from the wire.
    pub length: u16,
}

impl fmt::Display for ResourceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceHeader{{Name: {}, Type: {}, Class: {}, CacheFlush: {}, TTL: {}, Length: {}}}",
            self.name, self.typ, self.class, self.cache_flush, self.ttl, self.length,
        )
    }
}

impl ResourceHeader {
    // pack appends the wire format of the ResourceHeader to msg.
    //
    // The returned offset is where the RDLENGTH field was packed.
    pub(crate) fn pack(&self, mut msg: Vec<u8>, typ: u16) -> Result<(Vec<u8>, usize)> {
        msg = self.name.pack(msg)?;
        msg = pack_uint16(msg, typ);
        let mut class = self.class.0 & CLASS_MASK;
        if self.cache_flush {
            class |= CLASS_TOP_BIT;
        }
        msg = pack_uint16(msg, class);
        msg = pack_uint32(msg, self.ttl);
        let len_off = msg.len();
        msg = pack_uint16(msg, 0);
        Ok((msg, len_off))
    }

    // unpack reads the header and returns the offset of the RDATA together
    // with the raw wire type.
    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<(usize, u16)> {
        let new_off = self.name.unpack(msg, off)?;
        let (typ, new_off) = unpack_uint16(msg, new_off)?;
        self.typ = DnsType::from(typ);
        let (class, new_off) = unpack_uint16(msg, new_off)?;
        self.class = DnsClass(class & CLASS_MASK);
        self.cache_flush = class & CLASS_TOP_BIT != 0;
        let (ttl, new_off) = unpack_uint32(msg, new_off)?;
        self.ttl = ttl;
        let (length, new_off) = unpack_uint16(msg, new_off)?;
        self.length = length;
        Ok((new_off, typ))
    }

    // fix_len fills in the RDLENGTH field at len_off now that the body,
    // which starts at pre_len, has been packed.
    pub(crate) fn fix_len(msg: &mut [u8], len_off: usize, pre_len: usize) -> Result<()> {
        if msg.len() < pre_len || msg.len() > pre_len + u16::MAX as usize {
            return Err(Error::ErrResTooLong);
        }

        let con_len = (msg.len() - pre_len) as u16;
        msg[len_off..len_off + UINT16LEN].copy_from_slice(&con_len.to_be_bytes());
        Ok(())
    }
}

/// RDATA of a record, for the types mDNS discovery cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceBody {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(Name),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name,
    },
    /// TXT character strings, in wire order.
    Txt(Vec<Bytes>),
    Nsec {
        next_domain: Name,
        types: Vec<u16>,
    },
    /// Any other type: the raw wire type and RDATA.
    Unknown { typ: u16, data: Bytes },
}

impl Default for ResourceBody {
    fn default() -> Self {
        ResourceBody::Unknown {
            typ: 0,
            data: Bytes::new(),
        }
    }
}

impl fmt::Display for ResourceBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceBody::A(a) => write!(f, "A{{{a}}}"),
            ResourceBody::Aaaa(aaaa) => write!(f, "AAAA{{{aaaa}}}"),
            ResourceBody::Ptr(ptr) => write!(f, "PTR{{{ptr}}}"),
            ResourceBody::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(
                f,
                "SRV{{Priority: {priority}, Weight: {weight}, Port: {port}, Target: {target}}}"
            ),
            ResourceBody::Txt(entries) => {
                let v: Vec<String> = entries
                    .iter()
                    .map(|e| String::from_utf8_lossy(e).into_owned())
                    .collect();
                write!(f, "TXT{{{}}}", v.join(", "))
            }
            ResourceBody::Nsec { next_domain, types } => {
                write!(f, "NSEC{{Next: {next_domain}, Types: {types:?}}}")
            }
            ResourceBody::Unknown { typ, data } => {
                write!(f, "TYPE{typ}{{{} bytes}}", data.len())
            }
        }
    }
}

impl ResourceBody {
    // real_type returns the type that goes in the record header.
    pub fn real_type(&self) -> DnsType {
        match self {
            ResourceBody::A(_) => DnsType::A,
            ResourceBody::Aaaa(_) => DnsType::Aaaa,
            ResourceBody::Ptr(_) => DnsType::Ptr,
            ResourceBody::Srv { .. } => DnsType::Srv,
            ResourceBody::Txt(_) => DnsType::Txt,
            ResourceBody::Nsec { .. } => DnsType::Nsec,
            ResourceBody::Unknown { typ, .. } => DnsType::from(*typ),
        }
    }

    // wire_type is real_type as a number, keeping the raw value of unknown types.
    pub(crate) fn wire_type(&self) -> u16 {
        match self {
            ResourceBody::Unknown { typ, .. } => *typ,
            _ => self.real_type() as u16,
        }
    }

    pub(crate) fn pack(&self, mut msg: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            ResourceBody::A(a) => Ok(pack_bytes(msg, &a.octets())),
            ResourceBody::Aaaa(aaaa) => Ok(pack_bytes(msg, &aaaa.octets())),
            ResourceBody::Ptr(ptr) => ptr.pack(msg),
            ResourceBody::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                msg = pack_uint16(msg, *priority);
                msg = pack_uint16(msg, *weight);
                msg = pack_uint16(msg, *port);
                target.pack(msg)
            }
            ResourceBody::Txt(entries) => {
                for entry in entries {
                    msg = pack_character_string(msg, entry)?;
                }
                Ok(msg)
            }
            ResourceBody::Nsec { next_domain, types } => {
                msg = next_domain.pack(msg)?;
                Ok(pack_type_bitmap(msg, types))
            }
            ResourceBody::Unknown { data, .. } => Ok(pack_bytes(msg, data)),
        }
    }

    // unpack reads the RDATA of a record of wire type typ, occupying
    // msg[off..off + length]. Names inside the RDATA may point anywhere
    // earlier in msg but must end inside the RDATA.
    pub(crate) fn unpack(typ: u16, msg: &[u8], off: usize, length: usize) -> Result<Self> {
        let end = off + length;
        if end > msg.len() {
            return Err(Error::ErrResourceLen);
        }
        let rdata = &msg[..end];

        let body = match DnsType::from(typ) {
            DnsType::A => {
                if length != 4 {
                    return Err(Error::ErrResourceLen);
                }
                let (a, _) = unpack_bytes(rdata, off, 4)?;
                ResourceBody::A(Ipv4Addr::new(a[0], a[1], a[2], a[3]))
            }
            DnsType::Aaaa => {
                if length != 16 {
                    return Err(Error::ErrResourceLen);
                }
                let (aaaa, _) = unpack_bytes(rdata, off, 16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(aaaa);
                ResourceBody::Aaaa(Ipv6Addr::from(octets))
            }
            DnsType::Ptr => {
                let mut ptr = Name::default();
                ptr.unpack(rdata, off)?;
                ResourceBody::Ptr(ptr)
            }
            DnsType::Srv => {
                let (priority, new_off) = unpack_uint16(rdata, off)?;
                let (weight, new_off) = unpack_uint16(rdata, new_off)?;
                let (port, new_off) = unpack_uint16(rdata, new_off)?;
                let mut target = Name::default();
                target.unpack(rdata, new_off)?;
                ResourceBody::Srv {
                    priority,
                    weight,
                    port,
                    target,
                }
            }
            DnsType::Txt => {
                let mut entries = Vec::new();
                let mut new_off = off;
                while new_off < end {
                    let (entry, o) = unpack_character_string(rdata, new_off)?;
                    entries.push(Bytes::copy_from_slice(entry));
                    new_off = o;
                }
                ResourceBody::Txt(entries)
            }
            DnsType::Nsec => {
                let mut next_domain = Name::default();
                let new_off = next_domain.unpack(rdata, off)?;
                let types = unpack_type_bitmap(rdata, new_off, end)?;
                ResourceBody::Nsec { next_domain, types }
            }
            _ => ResourceBody::Unknown {
                typ,
                data: Bytes::copy_from_slice(&msg[off..end]),
            },
        };

        Ok(body)
    }
}

// pack_type_bitmap appends the NSEC type bitmap (RFC 4034 section 4.1.2)
// for types to msg.
fn pack_type_bitmap(mut msg: Vec<u8>, types: &[u16]) -> Vec<u8> {
    let mut sorted = types.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut i = 0;
    while i < sorted.len() {
        let window = sorted[i] >> 8;
        let mut bitmap = [0u8; 32];
        let mut len = 0;
        while i < sorted.len() && sorted[i] >> 8 == window {
            let low = (sorted[i] & 0xFF) as usize;
            bitmap[low / 8] |= 0x80 >> (low % 8);
            len = low / 8 + 1;
            i += 1;
        }
        msg.push(window as u8);
        msg.push(len as u8);
        msg.extend_from_slice(&bitmap[..len]);
    }
    msg
}

fn unpack_type_bitmap(msg: &[u8], mut off: usize, end: usize) -> Result<Vec<u16>> {
    let mut types = Vec::new();
    while off < end {
        if off + 2 > end {
            return Err(Error::ErrInvalidTypeBitmap);
        }
        let window = msg[off] as u16;
        let len = msg[off + 1] as usize;
        off += 2;
        if len == 0 || len > 32 || off + len > end {
            return Err(Error::ErrInvalidTypeBitmap);
        }
        for (i, byte) in msg[off..off + len].iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    types.push((window << 8) | (i * 8 + bit) as u16);
                }
            }
        }
        off += len;
    }
    Ok(types)
}
