//! DNS message model for mDNS packets.
//!
//! [`MdnsPacket`] holds a decoded message; [`MdnsPacket::pack`] writes one
//! back to wire format (without name compression). Decoding with
//! classified errors is done by [`MdnsResponseDecoder`](crate::MdnsResponseDecoder).

#[cfg(test)]
mod message_test;

pub(crate) mod header;
pub(crate) mod name;
pub(crate) mod packer;
pub(crate) mod question;
pub(crate) mod resource;

use std::fmt;

use header::*;
use packer::*;

pub use name::Name;
pub use question::Question;
pub use resource::{Resource, ResourceBody, ResourceHeader};

use shared::error::*;

// A Type is a type of DNS request and response.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DnsType {
    // ResourceHeader.Type and question.Type
    A = 1,
    Ns = 2,
    Cname = 5,
    Soa = 6,
    Ptr = 12,
    Mx = 15,
    Txt = 16,
    Aaaa = 28,
    Srv = 33,
    Opt = 41,
    Nsec = 47,

    // question.Type
    All = 255,

    #[default]
    Unsupported = 0,
}

impl From<u16> for DnsType {
    fn from(v: u16) -> Self {
        match v {
            1 => DnsType::A,
            2 => DnsType::Ns,
            5 => DnsType::Cname,
            6 => DnsType::Soa,
            12 => DnsType::Ptr,
            15 => DnsType::Mx,
            16 => DnsType::Txt,
            28 => DnsType::Aaaa,
            33 => DnsType::Srv,
            41 => DnsType::Opt,
            47 => DnsType::Nsec,
            255 => DnsType::All,
            _ => DnsType::Unsupported,
        }
    }
}

impl fmt::Display for DnsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DnsType::A => "A",
            DnsType::Ns => "NS",
            DnsType::Cname => "CNAME",
            DnsType::Soa => "SOA",
            DnsType::Ptr => "PTR",
            DnsType::Mx => "MX",
            DnsType::Txt => "TXT",
            DnsType::Aaaa => "AAAA",
            DnsType::Srv => "SRV",
            DnsType::Opt => "OPT",
            DnsType::Nsec => "NSEC",
            DnsType::All => "ANY",
            DnsType::Unsupported => "Unsupported",
        };
        write!(f, "{s}")
    }
}

/// DNS class of a question or record, with the mDNS top bit stripped.
///
/// In mDNS the top bit of the class field is reused: on questions it asks
/// for a unicast response (RFC 6762 section 5.4), on records it is the
/// cache-flush bit (RFC 6762 section 10.2). Both are carried separately
/// on [`Question`] and [`ResourceHeader`].
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DnsClass(pub u16);

/// Internet class (IN).
pub const DNSCLASS_INET: DnsClass = DnsClass(1);

/// Any class (*), valid only in questions.
pub const DNSCLASS_ANY: DnsClass = DnsClass(255);

impl fmt::Display for DnsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DNSCLASS_INET => write!(f, "IN"),
            DNSCLASS_ANY => write!(f, "ANY"),
            DnsClass(other) => write!(f, "CLASS{other}"),
        }
    }
}

// CLASS_TOP_BIT is the unicast-response bit on questions and the
// cache-flush bit on records.
pub(crate) const CLASS_TOP_BIT: u16 = 0x8000;
pub(crate) const CLASS_MASK: u16 = 0x7FFF;

// UINT16LEN is the length (in bytes) of a uint16.
const UINT16LEN: usize = 2;

// UINT32LEN is the length (in bytes) of a uint32.
const UINT32LEN: usize = 4;

// HEADER_LEN is the length (in bytes) of a DNS header.
//
// A header is comprised of 6 uint16s and no padding.
pub(crate) const HEADER_LEN: usize = 6 * UINT16LEN;

/// Flags of a standard query.
pub const FLAGS_QUERY: u16 = 0x0000;
/// Bits compared when deciding whether a message is a response: QR, the
/// four opcode bits and the four rcode bits.
pub const FLAGS_RESPONSE_MASK: u16 = 0xF80F;
/// Expected value of `flags & FLAGS_RESPONSE_MASK` for a response.
pub const FLAGS_RESPONSE: u16 = 0x8000;
/// Authoritative answer bit, set on all mDNS responses.
pub const FLAGS_AUTHORITATIVE: u16 = 0x0400;
/// Truncated bit, set on queries whose known answers continue in another packet.
pub const FLAGS_TRUNCATED: u16 = 0x0200;

/// A decoded mDNS message.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MdnsPacket {
    pub transaction_id: u16,
    pub flags: u16,
    pub questions: Vec<Question>,
    pub answers: Vec<Resource>,
    pub authority_records: Vec<Resource>,
    pub additional_records: Vec<Resource>,
}

impl fmt::Display for MdnsPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MdnsPacket{{id: {}, flags: {:#06x}, questions: {}, answers: {}, authorities: {}, additionals: {}}}",
            self.transaction_id,
            self.flags,
            self.questions.len(),
            self.answers.len(),
            self.authority_records.len(),
            self.additional_records.len(),
        )
    }
}

impl MdnsPacket {
    /// A standard mDNS query carrying `questions`.
    pub fn query(questions: Vec<Question>) -> Self {
        MdnsPacket {
            flags: FLAGS_QUERY,
            questions,
            ..Default::default()
        }
    }

    /// An authoritative mDNS response carrying `answers`.
    pub fn response(answers: Vec<Resource>) -> Self {
        MdnsPacket {
            flags: FLAGS_RESPONSE | FLAGS_AUTHORITATIVE,
            answers,
            ..Default::default()
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAGS_RESPONSE_MASK == FLAGS_RESPONSE
    }

    /// Iterates answers, authority and additional records in wire order.
    pub fn records(&self) -> impl Iterator<Item = &Resource> {
        self.answers
            .iter()
            .chain(self.authority_records.iter())
            .chain(self.additional_records.iter())
    }

    /// Packs the message into wire format.
    pub fn pack(&self) -> Result<Vec<u8>> {
        if self.questions.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyQuestions);
        }
        if self.answers.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAnswers);
        }
        if self.authority_records.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAuthorities);
        }
        if self.additional_records.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAdditionals);
        }

        let h = HeaderInternal {
            id: self.transaction_id,
            bits: self.flags,
            questions: self.questions.len() as u16,
            answers: self.answers.len() as u16,
            authorities: self.authority_records.len() as u16,
            additionals: self.additional_records.len() as u16,
        };

        let mut msg = h.pack(Vec::with_capacity(PACK_STARTING_CAP));
        for question in &self.questions {
            msg = question.pack(msg)?;
        }
        for record in self.records() {
            msg = record.pack(msg)?;
        }

        if msg.len() > MAX_PACKET_SIZE {
            return Err(Error::ErrPacketTooBig);
        }
        Ok(msg)
    }
}

// PACK_STARTING_CAP is the default initial buffer size allocated during
// packing.
const PACK_STARTING_CAP: usize = 512;

/// Largest mDNS message, RFC 6762 section 17.
pub const MAX_PACKET_SIZE: usize = 9000;
