//! Decoding of serialized macaroons, the format behind devpi tokens.
//!
//! Only deserialization is supported: tokens are inspected, never minted or
//! verified, so no key material is involved.

use std::borrow::Cow;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{DevpiError, Result};

const SIGNATURE_LEN: usize = 32;

const V2_EOS: u64 = 0;
const V2_LOCATION: u64 = 1;
const V2_IDENTIFIER: u64 = 2;
const V2_VID: u64 = 4;
const V2_SIGNATURE: u64 = 6;

/// A first- or third-party caveat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    pub id: Vec<u8>,
    /// Present only on third-party caveats.
    pub verification_id: Option<Vec<u8>>,
    pub location: Option<String>,
}

impl Caveat {
    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.id)
    }

    pub fn is_first_party(&self) -> bool {
        self.verification_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    pub location: Option<String>,
    pub identifier: Vec<u8>,
    pub caveats: Vec<Caveat>,
    pub signature: [u8; SIGNATURE_LEN],
}

impl Macaroon {
    /// Decode a base64 serialized macaroon in V1 or V2 binary format.
    ///
    /// Standard and URL-safe alphabets are accepted, with or without padding.
    pub fn deserialize(token: &str) -> Result<Self> {
        let bytes = decode_base64(token)?;
        match bytes.first() {
            None => Err(invalid("empty token")),
            Some(2) => parse_v2(&bytes),
            Some(_) => parse_v1(&bytes),
        }
    }

    pub fn identifier_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.identifier).map_err(|_| invalid("identifier is not valid UTF-8"))
    }
}

fn invalid(detail: impl Into<String>) -> DevpiError {
    DevpiError::InvalidToken {
        detail: detail.into(),
    }
}

fn decode_base64(token: &str) -> Result<Vec<u8>> {
    let normalized: String = token
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| invalid(format!("invalid base64: {e}")))
}

fn parse_v1(bytes: &[u8]) -> Result<Macaroon> {
    let mut location = None;
    let mut identifier = None;
    let mut caveats: Vec<Caveat> = Vec::new();
    let mut signature = None;

    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(invalid("truncated packet header"));
        }
        let len = std::str::from_utf8(&rest[..4])
            .ok()
            .and_then(|hex| usize::from_str_radix(hex, 16).ok())
            .ok_or_else(|| invalid("malformed packet length"))?;
        if len < 5 || len > rest.len() {
            return Err(invalid("packet length out of range"));
        }
        let packet = rest[4..len]
            .strip_suffix(b"\n")
            .ok_or_else(|| invalid("packet not newline terminated"))?;
        rest = &rest[len..];

        let split = packet
            .iter()
            .position(|b| *b == b' ')
            .ok_or_else(|| invalid("packet has no key"))?;
        let (key, value) = (&packet[..split], &packet[split + 1..]);

        match key {
            b"location" => location = Some(String::from_utf8_lossy(value).into_owned()),
            b"identifier" => identifier = Some(value.to_vec()),
            b"cid" => caveats.push(Caveat {
                id: value.to_vec(),
                verification_id: None,
                location: None,
            }),
            b"vid" => {
                let caveat = caveats
                    .last_mut()
                    .ok_or_else(|| invalid("vid packet before any cid"))?;
                caveat.verification_id = Some(value.to_vec());
            }
            b"cl" => {
                let caveat = caveats
                    .last_mut()
                    .ok_or_else(|| invalid("cl packet before any cid"))?;
                caveat.location = Some(String::from_utf8_lossy(value).into_owned());
            }
            b"signature" => signature = Some(signature_bytes(value)?),
            other => {
                return Err(invalid(format!(
                    "unknown packet '{}'",
                    String::from_utf8_lossy(other)
                )))
            }
        }
    }

    Ok(Macaroon {
        location,
        identifier: identifier.ok_or_else(|| invalid("missing identifier"))?,
        caveats,
        signature: signature.ok_or_else(|| invalid("missing signature"))?,
    })
}

fn signature_bytes(value: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    value
        .try_into()
        .map_err(|_| invalid(format!("signature must be {SIGNATURE_LEN} bytes")))
}

struct V2Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> V2Reader<'a> {
    fn varint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| invalid("truncated varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(invalid("varint overflow"))
    }

    /// Next `(type, data)` field, or `None` at an end-of-section marker.
    fn field(&mut self) -> Result<Option<(u64, &'a [u8])>> {
        let kind = self.varint()?;
        if kind == V2_EOS {
            return Ok(None);
        }
        let len = usize::try_from(self.varint()?).map_err(|_| invalid("field too large"))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| invalid("truncated field"))?;
        let data = &self.buf[self.pos..end];
        self.pos = end;
        Ok(Some((kind, data)))
    }

    fn section(&mut self) -> Result<Vec<(u64, &'a [u8])>> {
        let mut fields = Vec::new();
        while let Some(field) = self.field()? {
            fields.push(field);
        }
        Ok(fields)
    }
}

fn parse_v2(bytes: &[u8]) -> Result<Macaroon> {
    let mut reader = V2Reader { buf: bytes, pos: 1 };

    let mut location = None;
    let mut identifier = None;
    for (kind, data) in reader.section()? {
        match kind {
            V2_LOCATION => location = Some(String::from_utf8_lossy(data).into_owned()),
            V2_IDENTIFIER => identifier = Some(data.to_vec()),
            other => return Err(invalid(format!("unexpected field {other} in header"))),
        }
    }
    let identifier = identifier.ok_or_else(|| invalid("missing identifier"))?;

    // Caveat sections follow until an empty one.
    let mut caveats = Vec::new();
    loop {
        let fields = reader.section()?;
        if fields.is_empty() {
            break;
        }
        let mut caveat = Caveat {
            id: Vec::new(),
            verification_id: None,
            location: None,
        };
        let mut has_id = false;
        for (kind, data) in fields {
            match kind {
                V2_LOCATION => caveat.location = Some(String::from_utf8_lossy(data).into_owned()),
                V2_IDENTIFIER => {
                    caveat.id = data.to_vec();
                    has_id = true;
                }
                V2_VID => caveat.verification_id = Some(data.to_vec()),
                other => return Err(invalid(format!("unexpected field {other} in caveat"))),
            }
        }
        if !has_id {
            return Err(invalid("caveat without identifier"));
        }
        caveats.push(caveat);
    }

    let signature = match reader.field()? {
        Some((V2_SIGNATURE, data)) => signature_bytes(data)?,
        _ => return Err(invalid("missing signature")),
    };

    Ok(Macaroon {
        location,
        identifier,
        caveats,
        signature,
    })
}
