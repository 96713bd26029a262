use std::fmt;

use super::packer::*;
use shared::error::{Error, Result};

// Maximum wire length of a name, including length octets and the root label.
const NAME_LEN: usize = 255;

// Maximum length of a single label.
const LABEL_LEN: usize = 63;

// Maximum number of compression pointers followed while reading one name.
const MAX_POINTERS: usize = 10;

/// A domain name, stored as its decoded labels without the root label.
///
/// `Name::new("_http._tcp.local")` and `Name::new("_http._tcp.local.")`
/// produce the same name.
#[derive(Default, Debug, PartialEq, Eq, Clone, Hash)]
pub struct Name {
    labels: Vec<String>,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{label}.")?;
        }
        Ok(())
    }
}

impl Name {
    pub fn new(name: &str) -> Result<Self> {
        let trimmed = name.strip_suffix('.').unwrap_or(name);
        if trimmed.is_empty() {
            return Ok(Name::default());
        }

        let mut labels = Vec::new();
        let mut wire_len = 1;
        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(Error::ErrZeroSegLen);
            }
            if label.len() > LABEL_LEN {
                return Err(Error::ErrSegTooLong);
            }
            wire_len += label.len() + 1;
            labels.push(label.to_owned());
        }
        if wire_len > NAME_LEN {
            return Err(Error::ErrNameTooLong);
        }

        Ok(Name { labels })
    }

    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        Name::new(&labels.join("."))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Compares names case-insensitively, as DNS requires.
    pub fn eq_ignore_case(&self, other: &Name) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    // pack appends the uncompressed wire format of the name to msg.
    pub(crate) fn pack(&self, mut msg: Vec<u8>) -> Result<Vec<u8>> {
        for label in &self.labels {
            if label.len() > LABEL_LEN {
                return Err(Error::ErrSegTooLong);
            }
            msg.push(label.len() as u8);
            msg = pack_bytes(msg, label.as_bytes());
        }
        msg.push(0);
        Ok(msg)
    }

    // unpack reads a (possibly compressed) name starting at off and returns
    // the offset just past the name as it appears at off.
    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        // curr is the read position, which moves when a pointer is followed.
        // new_off is where the caller resumes: just past the first pointer,
        // or past the terminating zero when the name is uncompressed.
        let mut curr = off;
        let mut new_off = off;
        let mut ptr = 0;
        let mut wire_len = 1;
        let mut labels = Vec::new();

        loop {
            if curr >= msg.len() {
                return Err(Error::ErrBaseLen);
            }
            let c = msg[curr] as usize;
            curr += 1;
            match c & 0xC0 {
                0x00 => {
                    if c == 0x00 {
                        break;
                    }
                    let end = curr + c;
                    if end > msg.len() {
                        return Err(Error::ErrCalcLen);
                    }
                    wire_len += c + 1;
                    if wire_len > NAME_LEN {
                        return Err(Error::ErrNameTooLong);
                    }
                    labels.push(String::from_utf8_lossy(&msg[curr..end]).into_owned());
                    curr = end;
                }
                0xC0 => {
                    if curr >= msg.len() {
                        return Err(Error::ErrInvalidPtr);
                    }
                    let c1 = msg[curr] as usize;
                    curr += 1;
                    if ptr == 0 {
                        new_off = curr;
                    }
                    ptr += 1;
                    if ptr > MAX_POINTERS {
                        return Err(Error::ErrTooManyPtr);
                    }
                    curr = ((c ^ 0xC0) << 8) | c1;
                }
                // Prefixes 0x80 and 0x40 are reserved.
                _ => return Err(Error::ErrInvalidPtr),
            }
        }
        if ptr == 0 {
            new_off = curr;
        }

        self.labels = labels;
        Ok(new_off)
    }

    pub(crate) fn skip(msg: &[u8], off: usize) -> Result<usize> {
        let mut name = Name::default();
        name.unpack(msg, off)
    }
}
