//! Integer parsing with truncation and 64-bit wraparound.
//!
//! Parsing consumes an optional sign and then decimal digits up to the first
//! non-digit; the rest of the text is ignored. The consumed number is reduced
//! modulo 2^64, so `"18446744073709551615"` reads back as `-1` for signed
//! targets and `"-1"` as `u64::MAX` for unsigned ones.

use super::{CoercionResult, InvalidType};

/// Parses the leading signed decimal integer of `text` and returns its value
/// modulo 2^64 as a raw bit pattern.
///
/// Returns `None` when no digit could be consumed.
pub fn wrapping_parse(text: &str) -> Option<u64> {
    let bytes = text.as_bytes();
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let mut acc: u64 = 0;
    let mut consumed = 0usize;
    for &b in digits {
        if !b.is_ascii_digit() {
            break;
        }
        acc = acc.wrapping_mul(10).wrapping_add(u64::from(b - b'0'));
        consumed += 1;
    }

    if consumed == 0 {
        return None;
    }

    Some(if negative { acc.wrapping_neg() } else { acc })
}

pub fn parse_int64(text: &str) -> CoercionResult<i64> {
    wrapping_parse(text).map(|bits| bits as i64).ok_or(InvalidType)
}

pub fn parse_uint64(text: &str) -> CoercionResult<u64> {
    wrapping_parse(text).ok_or(InvalidType)
}

/// Shortest decimal text that round-trips to `value`, never in exponent
/// notation.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { '+' } else { '-' };
        format!("{}Inf", sign)
    } else {
        format!("{}", value)
    }
}

/// Float to signed integer: render as decimal text, then truncating parse.
/// Fractional digits are dropped by the parser, not by rounding.
pub fn float_to_int64(value: f64) -> CoercionResult<i64> {
    if !value.is_finite() {
        return Err(InvalidType);
    }
    parse_int64(&format_float(value))
}

pub fn float_to_uint64(value: f64) -> CoercionResult<u64> {
    if !value.is_finite() {
        return Err(InvalidType);
    }
    parse_uint64(&format_float(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncating_parse() {
        assert_eq!(parse_int64("5.6"), Ok(5));
        assert_eq!(parse_int64("1.1"), Ok(1));
        assert_eq!(parse_int64("5 apples"), Ok(5));
        assert_eq!(parse_int64("-199631"), Ok(-199631));
        assert_eq!(parse_int64("+7"), Ok(7));
        assert_eq!(parse_int64("00"), Ok(0));
    }

    #[test]
    fn test_no_digits_is_invalid() {
        assert_eq!(parse_int64("abc"), Err(InvalidType));
        assert_eq!(parse_int64(""), Err(InvalidType));
        assert_eq!(parse_int64("-"), Err(InvalidType));
        assert_eq!(parse_uint64(" 5"), Err(InvalidType));
    }

    #[test]
    fn test_wraparound() {
        assert_eq!(parse_int64("18446744073709551615"), Ok(-1));
        assert_eq!(parse_int64("9223372036854775808"), Ok(i64::MIN));
        assert_eq!(parse_uint64("-1"), Ok(u64::MAX));
        assert_eq!(parse_uint64("18446744073709551616"), Ok(0));
        assert_eq!(parse_uint64("18446744073709551617"), Ok(1));
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(format_float(1.1), "1.1");
        assert_eq!(format_float(5.0), "5");
        assert_eq!(format_float(1e21), "1000000000000000000000");
        assert_eq!(format_float(0.0000001), "0.0000001");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
    }

    #[test]
    fn test_float_to_integer() {
        assert_eq!(float_to_int64(5.6), Ok(5));
        assert_eq!(float_to_int64(-2.9), Ok(-2));
        assert_eq!(float_to_uint64(-1.5), Ok(u64::MAX));
        // 2^64 as a float renders as 18446744073709552000, which wraps to 384
        assert_eq!(float_to_uint64(18446744073709551615.0), Ok(384));
        assert_eq!(float_to_int64(f64::NAN), Err(InvalidType));
    }
}
