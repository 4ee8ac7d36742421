//! Text-to-number conversion for cell and property values.
//!
//! A value converts when it holds a base-10 number (optionally preceded by
//! whitespace and a sign) followed by nothing, or by a space. Anything else
//! after the number fails the conversion.

fn accepts_tail(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with(' ')
}

fn digits_len(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

fn sign_len(s: &str) -> usize {
    usize::from(s.starts_with(['+', '-']))
}

pub fn parse_int(value: &str) -> Option<i64> {
    let s = value.trim_start();
    let sign = sign_len(s);
    let digits = digits_len(&s[sign..]);
    if digits == 0 {
        return None;
    }
    let end = sign + digits;
    if !accepts_tail(&s[end..]) {
        return None;
    }
    s[..end].parse().ok()
}

/// Length of the longest prefix of `s` that reads as a float.
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut pos = sign_len(s);

    let rest = &s[pos..];
    for special in ["infinity", "inf", "nan"] {
        if rest
            .get(..special.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(special))
        {
            return pos + special.len();
        }
    }

    let int_digits = digits_len(&s[pos..]);
    pos += int_digits;
    let mut frac_digits = 0;
    if bytes.get(pos) == Some(&b'.') {
        frac_digits = digits_len(&s[pos + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let exp_sign = sign_len(&s[pos + 1..]);
        let exp_digits = digits_len(&s[pos + 1 + exp_sign..]);
        if exp_digits > 0 {
            pos += 1 + exp_sign + exp_digits;
        }
    }
    pos
}

pub fn parse_float(value: &str) -> Option<f64> {
    let s = value.trim_start();
    let end = float_prefix_len(s);
    if end == 0 || !accepts_tail(&s[end..]) {
        return None;
    }
    s[..end].parse().ok()
}

/// Formats like C's `%.15g`: 15 significant digits, trailing zeros
/// dropped, exponent form outside `1e-5 ..= 1e15`.
pub fn format_float_g15(value: f64) -> String {
    const PRECISION: i32 = 15;
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
