use std::fmt;

use super::name::*;
use super::*;
use shared::error::Result;

// A question is a DNS query.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Question {
    pub name: Name,
    pub typ: DnsType,
    pub class: DnsClass,
    /// The QU bit: the querier prefers a unicast reply.
    pub unicast_response: bool,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Question{{Name: {}, Type: {}, Class: {}, QU: {}}}",
            self.name, self.typ, self.class, self.unicast_response
        )
    }
}

impl Question {
    pub fn new(name: Name, typ: DnsType) -> Self {
        Question {
            name,
            typ,
            class: DNSCLASS_INET,
            unicast_response: false,
        }
    }

    // pack appends the wire format of the question to msg.
    pub(crate) fn pack(&self, mut msg: Vec<u8>) -> Result<Vec<u8>> {
        msg = self.name.pack(msg)?;
        msg = pack_uint16(msg, self.typ as u16);
        let mut class = self.class.0 & CLASS_MASK;
        if self.unicast_response {
            class |= CLASS_TOP_BIT;
        }
        Ok(pack_uint16(msg, class))
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let new_off = self.name.unpack(msg, off)?;
        let (typ, new_off) = unpack_uint16(msg, new_off)?;
        self.typ = DnsType::from(typ);
        let (class, new_off) = unpack_uint16(msg, new_off)?;
        self.class = DnsClass(class & CLASS_MASK);
        self.unicast_response = class & CLASS_TOP_BIT != 0;
        Ok(new_off)
    }
}
