//! Response decoding with classified errors.
//!
//! [`MdnsResponseDecoder::parse_response`] turns a received UDP payload into
//! an [`MdnsPacket`]. Failures carry an [`MdnsResponseErrorCode`] so callers
//! can tell the expected, high-frequency case of overhearing a query on the
//! multicast group ([`MdnsResponseErrorCode::NotResponseMessage`]) from a
//! malformed response.

use std::fmt;

use shared::error::Error;
use thiserror::Error;

use crate::message::header::HeaderInternal;
use crate::message::{
    FLAGS_RESPONSE, FLAGS_RESPONSE_MASK, MdnsPacket, Name, Question, Resource, ResourceBody,
    ResourceHeader,
};

/// Classification of a failed response decode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MdnsResponseErrorCode {
    /// The packet is a query or carries a non-zero opcode/rcode.
    NotResponseMessage = 1,
    NoAnswers = 2,
    ReadingRecordName = 3,
    ReadingARdata = 4,
    ReadingAaaaRdata = 5,
    ReadingPtrRdata = 6,
    SkippingPtrRdata = 7,
    ReadingSrvRdata = 8,
    SkippingSrvRdata = 9,
    ReadingTxtRdata = 10,
    SkippingUnknownRecord = 11,
    EndOfFile = 12,
    ReadingNsecRdata = 13,
    ReadingAnyRdata = 14,
}

impl MdnsResponseErrorCode {
    pub fn code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for MdnsResponseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MdnsResponseErrorCode::NotResponseMessage => "ERROR_NOT_RESPONSE_MESSAGE",
            MdnsResponseErrorCode::NoAnswers => "ERROR_NO_ANSWERS",
            MdnsResponseErrorCode::ReadingRecordName => "ERROR_READING_RECORD_NAME",
            MdnsResponseErrorCode::ReadingARdata => "ERROR_READING_A_RDATA",
            MdnsResponseErrorCode::ReadingAaaaRdata => "ERROR_READING_AAAA_RDATA",
            MdnsResponseErrorCode::ReadingPtrRdata => "ERROR_READING_PTR_RDATA",
            MdnsResponseErrorCode::SkippingPtrRdata => "ERROR_SKIPPING_PTR_RDATA",
            MdnsResponseErrorCode::ReadingSrvRdata => "ERROR_READING_SRV_RDATA",
            MdnsResponseErrorCode::SkippingSrvRdata => "ERROR_SKIPPING_SRV_RDATA",
            MdnsResponseErrorCode::ReadingTxtRdata => "ERROR_READING_TXT_RDATA",
            MdnsResponseErrorCode::SkippingUnknownRecord => "ERROR_SKIPPING_UNKNOWN_RECORD",
            MdnsResponseErrorCode::EndOfFile => "ERROR_END_OF_FILE",
            MdnsResponseErrorCode::ReadingNsecRdata => "ERROR_READING_NSEC_RDATA",
            MdnsResponseErrorCode::ReadingAnyRdata => "ERROR_READING_ANY_RDATA",
        };
        write!(f, "{s}")
    }
}

/// A response that could not be decoded.
#[derive(Error, Debug, PartialEq)]
#[error("{code} ({}): {cause}", .code.code())]
pub struct ParseError {
    pub code: MdnsResponseErrorCode,
    #[source]
    pub cause: Error,
}

impl ParseError {
    fn new(code: MdnsResponseErrorCode, cause: Error) -> Self {
        ParseError { code, cause }
    }
}

/// Decodes received mDNS payloads.
pub struct MdnsResponseDecoder;

impl MdnsResponseDecoder {
    /// Parses `buf` as an mDNS response.
    ///
    /// Fails with [`MdnsResponseErrorCode::NotResponseMessage`] for queries,
    /// with [`MdnsResponseErrorCode::NoAnswers`] for responses without any
    /// answer record, and with a record-specific code otherwise.
    pub fn parse_response(buf: &[u8]) -> Result<MdnsPacket, ParseError> {
        let eof = |cause| ParseError::new(MdnsResponseErrorCode::EndOfFile, cause);

        let mut h = HeaderInternal::default();
        let off = h.unpack_id_and_bits(buf, 0).map_err(eof)?;
        if h.bits & FLAGS_RESPONSE_MASK != FLAGS_RESPONSE {
            return Err(ParseError::new(
                MdnsResponseErrorCode::NotResponseMessage,
                Error::OtherMdnsErr(format!("not a response, flags {:#06x}", h.bits)),
            ));
        }
        let mut off = h.unpack_counts(buf, off).map_err(eof)?;
        if h.answers == 0 {
            return Err(ParseError::new(
                MdnsResponseErrorCode::NoAnswers,
                Error::OtherMdnsErr("response has no answers".to_owned()),
            ));
        }

        let mut packet = MdnsPacket {
            transaction_id: h.id,
            flags: h.bits,
            ..Default::default()
        };

        for _ in 0..h.questions {
            let (question, new_off) = parse_question(buf, off)?;
            packet.questions.push(question);
            off = new_off;
        }
        for (count, records) in [
            (h.answers, &mut packet.answers),
            (h.authorities, &mut packet.authority_records),
            (h.additionals, &mut packet.additional_records),
        ] {
            for _ in 0..count {
                let (record, new_off) = parse_record(buf, off)?;
                records.push(record);
                off = new_off;
            }
        }

        Ok(packet)
    }
}

fn parse_question(buf: &[u8], off: usize) -> Result<(Question, usize), ParseError> {
    Name::skip(buf, off)
        .map_err(|e| ParseError::new(MdnsResponseErrorCode::ReadingRecordName, e))?;

    let mut question = Question::default();
    let new_off = question
        .unpack(buf, off)
        .map_err(|e| ParseError::new(MdnsResponseErrorCode::EndOfFile, e))?;
    Ok((question, new_off))
}

fn parse_record(buf: &[u8], off: usize) -> Result<(Resource, usize), ParseError> {
    Name::skip(buf, off)
        .map_err(|e| ParseError::new(MdnsResponseErrorCode::ReadingRecordName, e))?;

    let mut header = ResourceHeader::default();
    let (rdata_off, typ) = header
        .unpack(buf, off)
        .map_err(|e| ParseError::new(MdnsResponseErrorCode::EndOfFile, e))?;

    let length = header.length as usize;
    let body = ResourceBody::unpack(typ, buf, rdata_off, length)
        .map_err(|e| ParseError::new(rdata_error_code(&header), e))?;

    Ok((Resource { header, body }, rdata_off + length))
}

fn rdata_error_code(header: &ResourceHeader) -> MdnsResponseErrorCode {
    use crate::message::DnsType;

    match header.typ {
        DnsType::A => MdnsResponseErrorCode::ReadingARdata,
        DnsType::Aaaa => MdnsResponseErrorCode::ReadingAaaaRdata,
        DnsType::Ptr => MdnsResponseErrorCode::ReadingPtrRdata,
        DnsType::Srv => MdnsResponseErrorCode::ReadingSrvRdata,
        DnsType::Txt => MdnsResponseErrorCode::ReadingTxtRdata,
        DnsType::Nsec => MdnsResponseErrorCode::ReadingNsecRdata,
        DnsType::All => MdnsResponseErrorCode::ReadingAnyRdata,
        _ => MdnsResponseErrorCode::SkippingUnknownRecord,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::{DnsType, FLAGS_AUTHORITATIVE, Question};
    use std::net::Ipv4Addr;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn a_response() -> MdnsPacket {
        MdnsPacket::response(vec![
            Resource::new(
                name("printer.local"),
                120,
                ResourceBody::A(Ipv4Addr::new(192, 168, 1, 20)),
            )
            .with_cache_flush(),
        ])
    }

    #[test]
    fn test_parse_response() {
        let raw = a_response().pack().unwrap();
        let packet = MdnsResponseDecoder::parse_response(&raw).unwrap();

        assert!(packet.is_response());
        assert_eq!(packet.flags & FLAGS_AUTHORITATIVE, FLAGS_AUTHORITATIVE);
        assert_eq!(packet.answers.len(), 1);
        let answer = &packet.answers[0];
        assert_eq!(answer.header.name.to_string(), "printer.local.");
        assert_eq!(answer.header.typ, DnsType::A);
        assert!(answer.header.cache_flush);
        assert_eq!(answer.header.ttl, 120);
        assert_eq!(answer.body, ResourceBody::A(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn test_query_is_not_a_response() {
        let raw = MdnsPacket::query(vec![Question::new(name("_http._tcp.local"), DnsType::Ptr)])
            .pack()
            .unwrap();
        let err = MdnsResponseDecoder::parse_response(&raw).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::NotResponseMessage);
    }

    #[test]
    fn test_response_with_error_rcode_is_not_a_response() {
        let mut packet = a_response();
        packet.flags |= 0x0003; // NXDOMAIN
        let raw = packet.pack().unwrap();
        let err = MdnsResponseDecoder::parse_response(&raw).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::NotResponseMessage);
    }

    #[test]
    fn test_response_without_answers() {
        let raw = MdnsPacket::response(vec![]).pack().unwrap();
        let err = MdnsResponseDecoder::parse_response(&raw).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::NoAnswers);
    }

    #[test]
    fn test_response_without_answers_skips_other_sections() {
        let mut packet = MdnsPacket::response(vec![]);
        packet.additional_records = a_response().answers;
        let mut raw = packet.pack().unwrap();
        // A broken additional record must not mask the missing answers.
        raw.pop();
        let err = MdnsResponseDecoder::parse_response(&raw).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::NoAnswers);
    }

    #[test]
    fn test_label_with_invalid_utf8_is_decoded_lossily() {
        let mut raw = a_response().pack().unwrap();
        // Second byte of the "printer" label.
        raw[14] = 0xE9;
        let packet = MdnsResponseDecoder::parse_response(&raw).unwrap();
        assert_eq!(packet.answers.len(), 1);
        assert_eq!(
            packet.answers[0].header.name.labels()[0],
            "p\u{FFFD}inter"
        );
        assert_eq!(
            packet.answers[0].body,
            ResourceBody::A(Ipv4Addr::new(192, 168, 1, 20))
        );
    }

    #[test]
    fn test_truncated_header() {
        let err = MdnsResponseDecoder::parse_response(&[0x00, 0x00, 0x84]).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::EndOfFile);
        assert_eq!(err.cause, Error::ErrBaseLen);

        let err = MdnsResponseDecoder::parse_response(&[0x00, 0x00, 0x84, 0x00, 0x00]).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::EndOfFile);
    }

    #[test]
    fn test_truncated_record_fields() {
        let raw = a_response().pack().unwrap();
        // Cut inside the TTL of the answer: the name is intact.
        let name_end = 12 + name("printer.local").pack(vec![]).unwrap().len();
        let err = MdnsResponseDecoder::parse_response(&raw[..name_end + 6]).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::EndOfFile);
    }

    #[test]
    fn test_bad_a_rdata() {
        let mut raw = a_response().pack().unwrap();
        // Drop the last address octet and shrink RDLENGTH to match.
        raw.pop();
        let len_off = raw.len() - 3 - 2;
        raw[len_off..len_off + 2].copy_from_slice(&3u16.to_be_bytes());
        let err = MdnsResponseDecoder::parse_response(&raw).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::ReadingARdata);
        assert_eq!(err.cause, Error::ErrResourceLen);
    }

    #[test]
    fn test_bad_record_name() {
        let mut raw = a_response().pack().unwrap();
        // Turn the first label length into a forward pointer past the end.
        raw[12] = 0xC0 | 0x3F;
        raw[13] = 0xFF;
        let err = MdnsResponseDecoder::parse_response(&raw).unwrap_err();
        assert_eq!(err.code, MdnsResponseErrorCode::ReadingRecordName);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(MdnsResponseErrorCode::NoAnswers, Error::ErrBaseLen);
        assert_eq!(
            err.to_string(),
            "ERROR_NO_ANSWERS (2): insufficient data for base length type"
        );
    }
}
