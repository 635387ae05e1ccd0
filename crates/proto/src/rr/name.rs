// Copyright 2015-2021 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Domain name associated types, i.e. `Name`

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ProtoErrorKind, ProtoResult};
use crate::serialize::binary::{BinDecodable, BinDecoder};

/// Maximum legal length of a domain name, in wire octets
const MAX_DOMAIN_NAME_LENGTH: usize = 255;
/// Maximum legal length of a single label
const MAX_LABEL_LENGTH: usize = 63;

/// A domain name: an ordered sequence of labels, root last and omitted.
///
/// Labels are stored lowercased, comparisons are therefore case-insensitive as
/// the wire protocol requires. `www.example.com` is the labels
/// `[www, example, com]`; the root name has no labels at all.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct Name {
    labels: Vec<Box<[u8]>>,
}

impl Name {
    /// Create the root name, i.e. no labels
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns true if there are no labels, i.e. it's empty.
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the number of labels in the name, discounting the root
    pub fn num_labels(&self) -> u8 {
        self.labels.len() as u8
    }

    /// Returns an iterator over the labels
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &[u8]> {
        self.labels.iter().map(|l| &**l)
    }

    /// Parse a name from an ASCII string, e.g. `"www.example.com"`.
    ///
    /// A trailing dot is accepted and ignored; `"."` and `""` are the root.
    pub fn from_ascii<S: AsRef<str>>(name: S) -> ProtoResult<Self> {
        let name = name.as_ref().trim_end_matches('.');
        if name.is_empty() {
            return Ok(Self::root());
        }

        let mut labels = Vec::new();
        let mut length = 0;
        for label in name.split('.') {
            if label.is_empty() {
                return Err(format!("malformed domain name: {name}").into());
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(ProtoErrorKind::LabelBytesTooLong(label.len()).into());
            }

            // each label costs its length octet as well
            length += label.len() + 1;
            if length > MAX_DOMAIN_NAME_LENGTH {
                return Err(ProtoErrorKind::DomainNameTooLong(length).into());
            }

            labels.push(label.to_ascii_lowercase().into_bytes().into_boxed_slice());
        }

        Ok(Self { labels })
    }

    /// Returns true if `self` is the zone (label suffix) of `name`.
    ///
    /// The root is the zone of all names, and every name is a zone of itself.
    pub fn zone_of(&self, name: &Self) -> bool {
        if self.labels.len() > name.labels.len() {
            return false;
        }

        let self_iter = self.iter().rev();
        let name_iter = name.iter().rev();
        self_iter.zip(name_iter).all(|(a, b)| a == b)
    }
}

impl<'r> BinDecodable<'r> for Name {
    /// Parses a name from the wire format, following compression pointers.
    ///
    /// Pointers may only refer backwards in the message (RFC 1035 §4.1.4);
    /// a forward or self pointer is rejected, which also bounds the chase.
    fn read(decoder: &mut BinDecoder<'r>) -> ProtoResult<Self> {
        let mut labels: Vec<Box<[u8]>> = Vec::new();
        let mut length = 0;

        // after the first pointer the original decoder no longer advances
        let mut cursor: Option<BinDecoder<'r>> = None;

        loop {
            let here = cursor.as_ref().unwrap_or(decoder).index();
            let first = match cursor.as_mut() {
                Some(c) => c.pop()?,
                None => decoder.pop()?,
            };

            match first & 0b1100_0000 {
                0b0000_0000 => {
                    let len = first as usize;
                    if len == 0 {
                        // root: end of name
                        return Ok(Self { labels });
                    }

                    length += len + 1;
                    if length > MAX_DOMAIN_NAME_LENGTH {
                        return Err(ProtoErrorKind::DomainNameTooLong(length).into());
                    }

                    let label = match cursor.as_mut() {
                        Some(c) => c.read_slice(len)?,
                        None => decoder.read_slice(len)?,
                    };
                    labels.push(label.to_ascii_lowercase().into_boxed_slice());
                }
                0b1100_0000 => {
                    let second = match cursor.as_mut() {
                        Some(c) => c.pop()?,
                        None => decoder.pop()?,
                    };
                    let ptr = u16::from_be_bytes([first & 0b0011_1111, second]);

                    if ptr as usize >= here {
                        return Err(ProtoErrorKind::PointerNotPriorToLabel {
                            idx: here,
                            ptr,
                        }
                        .into());
                    }

                    cursor = Some(decoder.clone(ptr));
                }
                // 0b1000_0000 and 0b0100_0000 are reserved
                _ => return Err(format!("unrecognized label code: {first:b}").into()),
            }
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        if self.is_root() {
            return f.write_str(".");
        }

        let mut first = true;
        for label in self.iter() {
            if !first {
                f.write_str(".")?;
            }
            first = false;

            for b in label {
                match b {
                    b'.' => f.write_str("\\.")?,
                    0x20..=0x7e => write!(f, "{}", *b as char)?,
                    _ => write!(f, "\\{b:03}")?,
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Name(\"{self}\")")
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.labels.cmp(&other.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn test_from_ascii() {
        let n = name("WWW.Example.Com");
        assert_eq!(n.num_labels(), 3);
        assert_eq!(n.to_string(), "www.example.com");

        assert!(name("example.com.").iter().eq(name("example.com").iter()));
        assert!(name(".").is_root());
        assert!(name("").is_root());
        assert!(Name::from_ascii("www..com").is_err());
    }

    #[test]
    fn test_zone_of() {
        let example = name("example.com");
        assert!(example.zone_of(&name("www.example.com")));
        assert!(example.zone_of(&name("example.com")));
        assert!(!example.zone_of(&name("com")));
        assert!(!example.zone_of(&name("www.example.net")));
        // label-wise, not substring-wise
        assert!(!example.zone_of(&name("www.badexample.com")));
        assert!(Name::root().zone_of(&example));
    }

    #[test]
    fn test_zone_of_case_insensitive() {
        assert!(name("EXAMPLE.com").zone_of(&name("www.example.COM")));
    }

    #[test]
    fn test_read_simple() {
        // 3www7example3com0
        let raw = b"\x03www\x07example\x03com\x00";
        let n = Name::from_bytes(&raw[..]).unwrap();
        assert_eq!(n, name("www.example.com"));
    }

    #[test]
    fn test_read_pointer() {
        // name at offset 0, then a second name "mail" + pointer to offset 4
        let mut raw = Vec::new();
        raw.extend_from_slice(b"\x03www\x07example\x03com\x00");
        let second = raw.len();
        raw.extend_from_slice(b"\x04mail\xc0\x04");

        let mut decoder = BinDecoder::new(&raw);
        let _ = Name::read(&mut decoder).unwrap();

        let mut decoder = decoder.clone(second as u16);
        let n = Name::read(&mut decoder).unwrap();
        assert_eq!(n, name("mail.example.com"));
    }

    #[test]
    fn test_read_forward_pointer_rejected() {
        // a pointer to itself would loop forever
        let raw = b"\xc0\x00";
        assert!(Name::from_bytes(&raw[..]).is_err());
    }

    #[test]
    fn test_read_truncated() {
        let raw = b"\x03ww";
        assert!(Name::from_bytes(&raw[..]).unwrap_err().is_eof());
    }

    #[test]
    fn test_name_too_long() {
        let label = "a".repeat(63);
        let long = format!("{label}.{label}.{label}.{label}.{label}");
        assert!(Name::from_ascii(long).is_err());
    }
}
