use super::*;

// HeaderInternal is the wire layout of a DNS message header: the id, the
// flag bits and the four section counts.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct HeaderInternal {
    pub(crate) id: u16,
    pub(crate) bits: u16,
    pub(crate) questions: u16,
    pub(crate) answers: u16,
    pub(crate) authorities: u16,
    pub(crate) additionals: u16,
}

impl HeaderInternal {
    pub(crate) fn pack(&self, mut msg: Vec<u8>) -> Vec<u8> {
        msg = pack_uint16(msg, self.id);
        msg = pack_uint16(msg, self.bits);
        msg = pack_uint16(msg, self.questions);
        msg = pack_uint16(msg, self.answers);
        msg = pack_uint16(msg, self.authorities);
        pack_uint16(msg, self.additionals)
    }

    // unpack_id_and_bits reads only the first two fields, which is enough to
    // tell queries from responses.
    pub(crate) fn unpack_id_and_bits(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (id, new_off) = unpack_uint16(msg, off)?;
        self.id = id;
        let (bits, new_off) = unpack_uint16(msg, new_off)?;
        self.bits = bits;
        Ok(new_off)
    }

    pub(crate) fn unpack_counts(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (questions, new_off) = unpack_uint16(msg, off)?;
        self.questions = questions;
        let (answers, new_off) = unpack_uint16(msg, new_off)?;
        self.answers = answers;
        let (authorities, new_off) = unpack_uint16(msg, new_off)?;
        self.authorities = authorities;
        let (additionals, new_off) = unpack_uint16(msg, new_off)?;
        self.additionals = additionals;
        Ok(new_off)
    }
}
