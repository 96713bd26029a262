use super::*;
use crate::decoder::MdnsResponseDecoder;
use bytes::Bytes;
use std::net::Ipv6Addr;

fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

#[test]
fn test_name_new() -> Result<()> {
    assert_eq!(Name::new("_http._tcp.local")?, Name::new("_http._tcp.local.")?);
    assert_eq!(Name::new("_http._tcp.local")?.to_string(), "_http._tcp.local.");
    assert_eq!(Name::new(".")?.to_string(), ".");
    assert_eq!(
        Name::from_labels(["My Printer", "_ipp", "_tcp", "local"])?.labels().len(),
        4
    );

    assert_eq!(Name::new("a..local"), Err(Error::ErrZeroSegLen));
    assert_eq!(
        Name::new(&format!("{}.local", "x".repeat(64))),
        Err(Error::ErrSegTooLong)
    );
    let long = vec!["x".repeat(63); 4].join(".");
    assert_eq!(Name::new(&long), Err(Error::ErrNameTooLong));

    Ok(())
}

#[test]
fn test_name_eq_ignore_case() {
    assert!(name("Printer.LOCAL").eq_ignore_case(&name("printer.local")));
    assert!(!name("printer.local").eq_ignore_case(&name("printer.lan")));
    assert_ne!(name("Printer.local"), name("printer.local"));
}

#[test]
fn test_name_unpack_compressed() -> Result<()> {
    // "local." at offset 0, then "printer" followed by a pointer to it.
    let mut msg = name("local").pack(vec![])?;
    let second = msg.len();
    msg.push(7);
    msg.extend_from_slice(b"printer");
    msg.extend_from_slice(&[0xC0, 0x00]);
    msg.push(0xAA);

    let mut n = Name::default();
    let off = n.unpack(&msg, second)?;
    assert_eq!(n.to_string(), "printer.local.");
    // Resumes right after the pointer, not after the pointed-to name.
    assert_eq!(off, msg.len() - 1);

    Ok(())
}

#[test]
fn test_name_unpack_pointer_loop() {
    let msg = [0xC0, 0x00];
    let mut n = Name::default();
    assert_eq!(n.unpack(&msg, 0), Err(Error::ErrTooManyPtr));
}

#[test]
fn test_name_unpack_reserved_prefix() {
    let msg = [0x80, 0x00];
    let mut n = Name::default();
    assert_eq!(n.unpack(&msg, 0), Err(Error::ErrInvalidPtr));
}

#[test]
fn test_name_unpack_label_past_end() {
    let msg = [0x05, b'a', b'b'];
    let mut n = Name::default();
    assert_eq!(n.unpack(&msg, 0), Err(Error::ErrCalcLen));
}

#[test]
fn test_question_unicast_bit() -> Result<()> {
    let mut q = Question::new(name("_ipp._tcp.local"), DnsType::Ptr);
    q.unicast_response = true;
    let msg = q.pack(vec![])?;

    let mut got = Question::default();
    let off = got.unpack(&msg, 0)?;
    assert_eq!(off, msg.len());
    assert!(got.unicast_response);
    assert_eq!(got.class, DNSCLASS_INET);
    assert_eq!(got, q);

    Ok(())
}

#[test]
fn test_service_response() -> Result<()> {
    let instance = name("My Printer._ipp._tcp.local");
    let host = name("printer.local");

    let mut packet = MdnsPacket::response(vec![Resource::new(
        name("_ipp._tcp.local"),
        4500,
        ResourceBody::Ptr(instance.clone()),
    )]);
    packet.additional_records = vec![
        Resource::new(
            instance.clone(),
            120,
            ResourceBody::Srv {
                priority: 0,
                weight: 0,
                port: 631,
                target: host.clone(),
            },
        )
        .with_cache_flush(),
        Resource::new(
            instance.clone(),
            4500,
            ResourceBody::Txt(vec![
                Bytes::from_static(b"rp=ipp/print"),
                Bytes::from_static(b""),
            ]),
        ),
        Resource::new(
            host.clone(),
            120,
            ResourceBody::Aaaa(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
        ),
        Resource::new(
            host.clone(),
            120,
            ResourceBody::Nsec {
                next_domain: host.clone(),
                types: vec![1, 28, 47],
            },
        ),
    ];

    let raw = packet.pack()?;
    let got = MdnsResponseDecoder::parse_response(&raw).unwrap();

    assert_eq!(got.answers[0].body, ResourceBody::Ptr(instance));
    assert_eq!(got.records().count(), 5);
    for (want, have) in packet.records().zip(got.records()) {
        assert_eq!(want.body, have.body);
        assert_eq!(want.header.typ, have.header.typ);
        assert_eq!(want.header.cache_flush, have.header.cache_flush);
    }

    Ok(())
}

#[test]
fn test_unknown_type_keeps_raw_type() -> Result<()> {
    let body = ResourceBody::Unknown {
        typ: 65280,
        data: Bytes::from_static(&[1, 2, 3]),
    };
    let raw = MdnsPacket::response(vec![Resource::new(name("x.local"), 10, body.clone())]).pack()?;
    let got = MdnsResponseDecoder::parse_response(&raw).unwrap();

    assert_eq!(got.answers[0].header.typ, DnsType::Unsupported);
    assert_eq!(got.answers[0].body, body);

    Ok(())
}

#[test]
fn test_txt_entry_too_long() {
    let packet = MdnsPacket::response(vec![Resource::new(
        name("x.local"),
        10,
        ResourceBody::Txt(vec![Bytes::from(vec![b'a'; 256])]),
    )]);
    assert_eq!(packet.pack(), Err(Error::ErrStringTooLong));
}

#[test]
fn test_packet_too_big() {
    let entries = vec![Bytes::from(vec![b'a'; 255]); 40];
    let packet = MdnsPacket::response(vec![Resource::new(
        name("x.local"),
        10,
        ResourceBody::Txt(entries),
    )]);
    assert_eq!(packet.pack(), Err(Error::ErrPacketTooBig));
}
