//! UTF-8 <-> Modified UTF-8 conversion (spec.md §4.1).
//!
//! Modified UTF-8 is the class-file string encoding: U+0000 is encoded as
//! the overlong two-byte form `C0 80`, and each supplementary-plane
//! codepoint is encoded as a pair of three-byte surrogate sequences (six
//! bytes total) instead of the four-byte UTF-8 form.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedEncoding;

/// Decode one UTF-8 codepoint starting at `bytes[0]`, returning the
/// codepoint and the number of bytes consumed.
fn utf8_codepoint(bytes: &[u8]) -> Result<(u32, usize), MalformedEncoding> {
    let b0 = *bytes.first().ok_or(MalformedEncoding)?;
    if b0 <= 0x7f {
        Ok((b0 as u32, 1))
    } else if b0 & 0xe0 == 0xc0 {
        let b1 = *bytes.get(1).ok_or(MalformedEncoding)?;
        Ok(((((b0 & 0x1f) as u32) << 6) | (b1 & 0x3f) as u32, 2))
    } else if b0 & 0xf0 == 0xe0 {
        let b1 = *bytes.get(1).ok_or(MalformedEncoding)?;
        let b2 = *bytes.get(2).ok_or(MalformedEncoding)?;
        Ok((
            (((b0 & 0x0f) as u32) << 12) | (((b1 & 0x3f) as u32) << 6) | (b2 & 0x3f) as u32,
            3,
        ))
    } else if b0 & 0xf8 == 0xf0 {
        let b1 = *bytes.get(1).ok_or(MalformedEncoding)?;
        let b2 = *bytes.get(2).ok_or(MalformedEncoding)?;
        let b3 = *bytes.get(3).ok_or(MalformedEncoding)?;
        Ok((
            (((b0 & 0x07) as u32) << 18)
                | (((b1 & 0x3f) as u32) << 12)
                | (((b2 & 0x3f) as u32) << 6)
                | (b3 & 0x3f) as u32,
            4,
        ))
    } else {
        Err(MalformedEncoding)
    }
}

fn push_utf8_char(out: &mut Vec<u8>, codepoint: u32) {
    if codepoint <= 0x7f {
        out.push(codepoint as u8);
    } else if codepoint <= 0x7ff {
        out.push(0xc0 | ((codepoint >> 6) & 0x1f) as u8);
        out.push(0x80 | (codepoint & 0x3f) as u8);
    } else if codepoint <= 0xffff {
        out.push(0xe0 | ((codepoint >> 12) & 0x0f) as u8);
        out.push(0x80 | ((codepoint >> 6) & 0x3f) as u8);
        out.push(0x80 | (codepoint & 0x3f) as u8);
    } else {
        out.push(0xf0 | ((codepoint >> 18) & 0x07) as u8);
        out.push(0x80 | ((codepoint >> 12) & 0x3f) as u8);
        out.push(0x80 | ((codepoint >> 6) & 0x3f) as u8);
        out.push(0x80 | (codepoint & 0x3f) as u8);
    }
}

/// Decode one Modified-UTF-8 codepoint, returning the codepoint and the
/// number of bytes consumed (2 for the `C0 80` null overlong, 6 for a
/// supplementary-plane surrogate pair).
fn mutf8_codepoint(bytes: &[u8]) -> Result<(u32, usize), MalformedEncoding> {
    let b0 = *bytes.first().ok_or(MalformedEncoding)?;
    if (0x01..=0x7f).contains(&b0) {
        Ok((b0 as u32, 1))
    } else if b0 & 0xe0 == 0xc0 {
        let b1 = *bytes.get(1).ok_or(MalformedEncoding)?;
        Ok(((((b0 & 0x1f) as u32) << 6) | (b1 & 0x3f) as u32, 2))
    } else if b0 & 0xf0 == 0xe0 {
        let b1 = *bytes.get(1).ok_or(MalformedEncoding)?;
        let b2 = *bytes.get(2).ok_or(MalformedEncoding)?;
        Ok((
            (((b0 & 0x0f) as u32) << 12) | (((b1 & 0x3f) as u32) << 6) | (b2 & 0x3f) as u32,
            3,
        ))
    } else if b0 == 0xed {
        let b3 = *bytes.get(3).ok_or(MalformedEncoding)?;
        if b3 != 0xed {
            return Err(MalformedEncoding);
        }
        let b1 = *bytes.get(1).ok_or(MalformedEncoding)?;
        let b2 = *bytes.get(2).ok_or(MalformedEncoding)?;
        let b4 = *bytes.get(4).ok_or(MalformedEncoding)?;
        let b5 = *bytes.get(5).ok_or(MalformedEncoding)?;
        let cp = (0x10000 + (((b1 & 0x0f) as u32) << 16))
            | (((b2 & 0x3f) as u32) << 10)
            | (((b4 & 0x0f) as u32) << 6)
            | (b5 & 0x3f) as u32;
        Ok((cp, 6))
    } else {
        Err(MalformedEncoding)
    }
}

fn push_mutf8_char(out: &mut Vec<u8>, codepoint: u32) {
    if (0x01..=0x7f).contains(&codepoint) {
        out.push(codepoint as u8);
    } else if codepoint == 0x00 || (0x80..=0x7ff).contains(&codepoint) {
        out.push(0xc0 | ((codepoint >> 6) & 0x1f) as u8);
        out.push(0x80 | (codepoint & 0x3f) as u8);
    } else if (0x800..=0xffff).contains(&codepoint) {
        out.push(0xe0 | ((codepoint >> 12) & 0x0f) as u8);
        out.push(0x80 | ((codepoint >> 6) & 0x3f) as u8);
        out.push(0x80 | (codepoint & 0x3f) as u8);
    } else {
        // supplementary plane: two three-byte surrogate halves, six bytes total
        out.push(0xed);
        out.push(0xa0 | (((codepoint >> 16) & 0x1f) as u8).wrapping_sub(1));
        out.push(0x80 | ((codepoint >> 10) & 0x3f) as u8);
        out.push(0xed);
        out.push(0xb0 | ((codepoint >> 6) & 0x0f) as u8);
        out.push(0x80 | (codepoint & 0x3f) as u8);
    }
}

/// Convert a UTF-8 byte sequence to Modified UTF-8.
pub fn to_modified(utf8: &[u8]) -> Result<Vec<u8>, MalformedEncoding> {
    let mut out = Vec::with_capacity(utf8.len());
    let mut rest = utf8;
    while !rest.is_empty() {
        let (codepoint, advance) = utf8_codepoint(rest)?;
        push_mutf8_char(&mut out, codepoint);
        rest = &rest[advance..];
    }
    Ok(out)
}

/// Convert a Modified-UTF-8 byte sequence to UTF-8.
pub fn from_modified(mutf8: &[u8]) -> Result<Vec<u8>, MalformedEncoding> {
    let mut out = Vec::with_capacity(mutf8.len());
    let mut rest = mutf8;
    while !rest.is_empty() {
        let (codepoint, advance) = mutf8_codepoint(rest)?;
        push_utf8_char(&mut out, codepoint);
        rest = &rest[advance..];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_codepoint_is_overlong() {
        let encoded = to_modified(&[0u8]).unwrap();
        assert_eq!(encoded, vec![0xc0, 0x80]);
        assert_eq!(from_modified(&encoded).unwrap(), vec![0u8]);
    }

    #[test]
    fn supplementary_plane_round_trips_as_six_bytes() {
        let s = "\u{10348}"; // outside the BMP
        let encoded = to_modified(s.as_bytes()).unwrap();
        assert_eq!(encoded.len(), 6);
        assert_eq!(from_modified(&encoded).unwrap(), s.as_bytes());
    }

    #[test]
    fn ascii_round_trips_unchanged() {
        let s = b"hello, nanojvm";
        assert_eq!(to_modified(s).unwrap(), s);
        assert_eq!(from_modified(s).unwrap(), s);
    }

    #[test]
    fn malformed_lead_byte_fails_whole_conversion() {
        assert!(to_modified(&[0xff]).is_err());
        assert!(from_modified(&[0xff]).is_err());
    }

    #[test]
    fn bmp_codepoint_round_trips() {
        let s = "héllo wörld";
        let encoded = to_modified(s.as_bytes()).unwrap();
        assert_eq!(from_modified(&encoded).unwrap(), s.as_bytes());
    }
}
