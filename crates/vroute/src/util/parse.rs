//! Numeric argument parsing in iproute2 conventions.

use crate::netlink::types::mpls::mpls_label;

/// Error type for parsing.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("number out of range: {0}")]
    OutOfRange(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unknown unit: {0}")]
    UnknownUnit(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse a u8 from string.
pub fn get_u8(s: &str) -> Result<u8> {
    parse_int(s)
}

/// Parse a u16 from string.
pub fn get_u16(s: &str) -> Result<u16> {
    parse_int(s)
}

/// Parse a u32 from string.
pub fn get_u32(s: &str) -> Result<u32> {
    parse_int(s)
}

/// Parse a u64 from string.
pub fn get_u64(s: &str) -> Result<u64> {
    parse_int(s)
}

/// Integer parsing with `0x` hex and leading-zero octal, like `strtoul(.., 0)`.
fn parse_int<T: TryFrom<u64>>(s: &str) -> Result<T> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    if digits.is_empty() || digits.starts_with('+') {
        return Err(ParseError::InvalidNumber(s.to_string()));
    }

    let val = u64::from_str_radix(digits, radix)
        .map_err(|_| ParseError::InvalidNumber(s.to_string()))?;
    T::try_from(val).map_err(|_| ParseError::OutOfRange(s.to_string()))
}

/// Split "12ms" into ("12", "ms").
fn split_number_unit(s: &str) -> (&str, &str) {
    let idx = s
        .find(|c: char| !c.is_ascii_hexdigit() && c != '.' && c != 'x' && c != 'X')
        .unwrap_or(s.len());
    s.split_at(idx)
}

/// Parse an rtt-style time value.
///
/// Returns `(value, raw)`: with a unit suffix (`s`, `sec`, `secs`, `ms`,
/// `msec`, `msecs`) the value is in milliseconds and `raw` is false; a bare
/// number is passed through in kernel units and `raw` is true. Fractions
/// round up.
pub fn get_time_rtt(s: &str) -> Result<(u32, bool)> {
    let (num_str, unit) = split_number_unit(s);
    if num_str.is_empty() {
        return Err(ParseError::InvalidNumber(s.to_string()));
    }

    let value: f64 = if num_str.contains('.') {
        num_str
            .parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_string()))?
    } else {
        get_u32(num_str)? as f64
    };

    let (value, raw) = match unit.to_ascii_lowercase().as_str() {
        "" => (value, true),
        "s" | "sec" | "secs" => (value * 1000.0, false),
        "ms" | "msec" | "msecs" => (value, false),
        _ => return Err(ParseError::UnknownUnit(unit.to_string())),
    };

    let rounded = value.ceil();
    if !(0.0..=u32::MAX as f64).contains(&rounded) {
        return Err(ParseError::OutOfRange(s.to_string()));
    }
    Ok((rounded as u32, raw))
}

/// Parse a realms value: a raw u32, `to`, or `from/to`.
pub fn get_realms(s: &str) -> Result<u32> {
    if let Ok(raw) = get_u32(s) {
        return Ok(raw);
    }
    let (from, to) = s
        .split_once('/')
        .ok_or_else(|| ParseError::InvalidFormat(s.to_string()))?;
    let from = if from.is_empty() { 0 } else { get_u16(from)? };
    let to = get_u16(to)?;
    Ok(((from as u32) << 16) | to as u32)
}

/// Parse a 64-bit ILA locator written as four 16-bit hex groups.
pub fn get_addr64(s: &str) -> Result<u64> {
    let groups: Vec<&str> = s.split(':').collect();
    if groups.len() != 4 {
        return Err(ParseError::InvalidFormat(s.to_string()));
    }

    groups.iter().try_fold(0u64, |acc, group| {
        if group.is_empty() || group.len() > 4 {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }
        let v = u16::from_str_radix(group, 16)
            .map_err(|_| ParseError::InvalidFormat(s.to_string()))?;
        Ok((acc << 16) | v as u64)
    })
}

/// Format a 64-bit ILA locator as four 16-bit hex groups.
pub fn format_addr64(v: u64) -> String {
    format!(
        "{:04x}:{:04x}:{:04x}:{:04x}",
        (v >> 48) & 0xffff,
        (v >> 32) & 0xffff,
        (v >> 16) & 0xffff,
        v & 0xffff
    )
}

/// Parse an MPLS label stack written as `label[/label...]`.
pub fn get_mpls_labels(s: &str) -> Result<Vec<u32>> {
    let labels = s
        .split('/')
        .map(|part| {
            let label = get_u32(part)?;
            if label > mpls_label::MAX {
                return Err(ParseError::OutOfRange(part.to_string()));
            }
            Ok(label)
        })
        .collect::<Result<Vec<_>>>()?;

    if labels.len() > mpls_label::MAX_LABELS {
        return Err(ParseError::OutOfRange(format!(
            "{} labels (maximum {})",
            labels.len(),
            mpls_label::MAX_LABELS
        )));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_u32_bases() {
        assert_eq!(get_u32("42"), Ok(42));
        assert_eq!(get_u32("0x2a"), Ok(42));
        assert_eq!(get_u32("052"), Ok(42));
        assert_eq!(get_u32("0"), Ok(0));
        assert!(get_u32("").is_err());
        assert!(get_u32("0x").is_err());
        assert!(get_u32("-1").is_err());
        assert!(get_u32("12abc").is_err());
        assert!(matches!(get_u8("256"), Err(ParseError::OutOfRange(_))));
    }

    #[test]
    fn test_get_time_rtt() {
        assert_eq!(get_time_rtt("100"), Ok((100, true)));
        assert_eq!(get_time_rtt("100ms"), Ok((100, false)));
        assert_eq!(get_time_rtt("2s"), Ok((2000, false)));
        assert_eq!(get_time_rtt("1.5ms"), Ok((2, false)));
        assert_eq!(get_time_rtt("0.25s"), Ok((250, false)));
        assert!(matches!(
            get_time_rtt("5min"),
            Err(ParseError::UnknownUnit(_))
        ));
        assert!(get_time_rtt("ms").is_err());
    }

    #[test]
    fn test_get_realms() {
        assert_eq!(get_realms("7"), Ok(7));
        assert_eq!(get_realms("1/2"), Ok((1 << 16) | 2));
        assert_eq!(get_realms("/2"), Ok(2));
        assert!(get_realms("1/70000").is_err());
        assert!(get_realms("web").is_err());
    }

    #[test]
    fn test_addr64() {
        let v = get_addr64("2001:db8:0:1").unwrap();
        assert_eq!(v, 0x2001_0db8_0000_0001);
        assert_eq!(format_addr64(v), "2001:0db8:0000:0001");
        assert!(get_addr64("2001:db8::1").is_err());
        assert!(get_addr64("1:2:3").is_err());
    }

    #[test]
    fn test_mpls_labels() {
        assert_eq!(get_mpls_labels("100/200"), Ok(vec![100, 200]));
        assert_eq!(get_mpls_labels("16"), Ok(vec![16]));
        assert!(get_mpls_labels("1048576").is_err());
        assert!(get_mpls_labels("100//200").is_err());
        let deep = vec!["1"; 31].join("/");
        assert!(get_mpls_labels(&deep).is_err());
    }
}
