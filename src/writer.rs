//! Template rendering engine
//!
//! One engine serves both passes of the size-then-write protocol: rendering
//! runs against a [`Sink`] that counts every byte it is asked to produce and
//! stores only the ones that fit. With a zero-capacity sink the engine is a
//! pure measuring pass; with a real buffer it writes, truncates safely, and
//! always NUL-terminates. The two modes share every code path, so they can
//! never disagree on accounting.
//!
//! All counts are byte counts of the UTF-8 output.

use crate::args::ArgCursor;
use crate::spec::{parse_spec, Conversion, Flags, FormatError, FormatSpec, Precision, Width};

/// Compute the exact number of bytes the rendered template occupies, without
/// writing anything. Consumes arguments from `args`.
pub fn measure(template: &str, args: &mut ArgCursor<'_>) -> Result<usize, FormatError> {
    let mut sink = Sink::measuring();
    render(template, args, &mut sink)?;
    Ok(sink.finish())
}

/// Render the template into `buf`, writing at most `buf.len() - 1` bytes and
/// NUL-terminating whenever `buf` is non-empty. Returns the byte count the
/// full output occupies, so truncation shows up as a count >= the capacity.
pub fn write_into(template: &str, args: &mut ArgCursor<'_>, buf: &mut [u8]) -> Result<usize, FormatError> {
    let mut sink = Sink::bounded(buf);
    render(template, args, &mut sink)?;
    Ok(sink.finish())
}

/// Capacity-bounded byte sink. `produced` counts the unbounded output length;
/// bytes beyond `limit` are accounted but not stored.
struct Sink<'a> {
    dst: &'a mut [u8],
    limit: usize,
    produced: usize,
}

impl<'a> Sink<'a> {
    fn measuring() -> Sink<'static> {
        Sink {
            dst: &mut [],
            limit: 0,
            produced: 0,
        }
    }

    fn bounded(dst: &'a mut [u8]) -> Sink<'a> {
        // One byte is reserved for the terminator
        let limit = dst.len().saturating_sub(1);
        Sink { dst, limit, produced: 0 }
    }

    fn push(&mut self, byte: u8) {
        if self.produced < self.limit {
            self.dst[self.produced] = byte;
        }
        self.produced += 1;
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        if self.produced < self.limit {
            let stored = bytes.len().min(self.limit - self.produced);
            self.dst[self.produced..self.produced + stored].copy_from_slice(&bytes[..stored]);
        }
        self.produced += bytes.len();
    }

    fn push_str(&mut self, s: &str) {
        self.push_bytes(s.as_bytes());
    }

    fn pad(&mut self, fill: u8, count: usize) {
        if self.produced < self.limit {
            let stored = count.min(self.limit - self.produced);
            self.dst[self.produced..self.produced + stored].fill(fill);
        }
        self.produced += count;
    }

    fn produced(&self) -> usize {
        self.produced
    }

    /// Place the terminator and report the unbounded count
    fn finish(self) -> usize {
        if !self.dst.is_empty() {
            self.dst[self.produced.min(self.limit)] = 0;
        }
        self.produced
    }
}

fn render(template: &str, args: &mut ArgCursor<'_>, sink: &mut Sink<'_>) -> Result<(), FormatError> {
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'%' {
                i += 1;
            }
            sink.push_bytes(&bytes[start..i]);
            continue;
        }
        let (spec, next) = parse_spec(template, i + 1)?;
        i = next;
        render_directive(&spec, args, sink)?;
    }
    Ok(())
}

fn render_directive(
    spec: &FormatSpec,
    args: &mut ArgCursor<'_>,
    sink: &mut Sink<'_>,
) -> Result<(), FormatError> {
    match spec.conversion {
        Conversion::Percent => {
            sink.push(b'%');
            return Ok(());
        }
        Conversion::Count => {
            let slot = args.next_count()?;
            slot.set(sink.produced() as i64);
            return Ok(());
        }
        _ => {}
    }

    // Star arguments are consumed in template order: width, then precision,
    // then the converted value.
    let (width, star_left) = match spec.width {
        Width::None => (0, false),
        Width::Fixed(w) => (w as usize, false),
        Width::FromArg => {
            let w = args.next_star()?;
            if w < 0 {
                (w.unsigned_abs() as usize, true)
            } else {
                (w as usize, false)
            }
        }
    };
    let left = spec.flags.left || star_left;
    let precision = match spec.precision {
        Precision::None => None,
        Precision::Fixed(p) => Some(p as usize),
        Precision::FromArg => {
            let p = args.next_star()?;
            if p < 0 {
                None
            } else {
                Some(p as usize)
            }
        }
    };

    match spec.conversion {
        Conversion::Signed => {
            let v = args.next_int()?;
            let sign = sign_for(v < 0, &spec.flags);
            emit_int(sink, &spec.flags, width, left, precision, sign, "", v.unsigned_abs().to_string(), false);
        }
        Conversion::Unsigned => {
            let v = args.next_uint()?;
            emit_int(sink, &spec.flags, width, left, precision, "", "", v.to_string(), false);
        }
        Conversion::Octal => {
            let v = args.next_uint()?;
            emit_int(sink, &spec.flags, width, left, precision, "", "", format!("{:o}", v), spec.flags.alt);
        }
        Conversion::HexLower => {
            let v = args.next_uint()?;
            let prefix = if spec.flags.alt && v != 0 { "0x" } else { "" };
            emit_int(sink, &spec.flags, width, left, precision, "", prefix, format!("{:x}", v), false);
        }
        Conversion::HexUpper => {
            let v = args.next_uint()?;
            let prefix = if spec.flags.alt && v != 0 { "0X" } else { "" };
            emit_int(sink, &spec.flags, width, left, precision, "", prefix, format!("{:X}", v), false);
        }
        Conversion::Fixed { upper } => {
            let v = args.next_float()?;
            emit_float(sink, &spec.flags, width, left, precision, v, FloatStyle::Fixed, upper);
        }
        Conversion::Scientific { upper } => {
            let v = args.next_float()?;
            emit_float(sink, &spec.flags, width, left, precision, v, FloatStyle::Scientific, upper);
        }
        Conversion::Shortest { upper } => {
            let v = args.next_float()?;
            emit_float(sink, &spec.flags, width, left, precision, v, FloatStyle::Shortest, upper);
        }
        Conversion::HexFloat { upper } => {
            let v = args.next_float()?;
            emit_float(sink, &spec.flags, width, left, precision, v, FloatStyle::Hex, upper);
        }
        Conversion::Str => {
            let s = args.next_str()?;
            let clipped = match precision {
                Some(p) if p < s.len() => {
                    // Byte-count truncation, floored to a code point boundary
                    let mut end = p;
                    while !s.is_char_boundary(end) {
                        end -= 1;
                    }
                    &s[..end]
                }
                _ => s,
            };
            emit_padded(sink, width, left, clipped.as_bytes());
        }
        Conversion::Char => {
            let c = args.next_char()?;
            let mut utf8 = [0u8; 4];
            emit_padded(sink, width, left, c.encode_utf8(&mut utf8).as_bytes());
        }
        Conversion::Ptr => {
            let p = args.next_ptr()?;
            emit_number(sink, &spec.flags, width, left, "", "0x", &format!("{:x}", p), false);
        }
        Conversion::Percent | Conversion::Count => {}
    }
    Ok(())
}

fn sign_for(negative: bool, flags: &Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

/// Emit an integer body: apply precision (minimum digits), the forced octal
/// leading zero, then field padding.
fn emit_int(
    sink: &mut Sink<'_>,
    flags: &Flags,
    width: usize,
    left: bool,
    precision: Option<usize>,
    sign: &str,
    prefix: &str,
    digits: String,
    force_leading_zero: bool,
) {
    let mut body = digits;
    if let Some(p) = precision {
        if p == 0 && body == "0" {
            // Zero with precision 0 prints no digits
            body.clear();
        }
        if body.len() < p {
            body = format!("{}{}", "0".repeat(p - body.len()), body);
        }
    }
    if force_leading_zero && !body.starts_with('0') {
        body.insert(0, '0');
    }
    // An explicit precision disables zero padding for integers
    let zero_pad = precision.is_none();
    emit_number(sink, flags, width, left, sign, prefix, &body, zero_pad);
}

#[derive(Clone, Copy)]
enum FloatStyle {
    Fixed,
    Scientific,
    Shortest,
    Hex,
}

fn emit_float(
    sink: &mut Sink<'_>,
    flags: &Flags,
    width: usize,
    left: bool,
    precision: Option<usize>,
    value: f64,
    style: FloatStyle,
    upper: bool,
) {
    let sign = sign_for(value.is_sign_negative(), flags);

    if !value.is_finite() {
        let body = match (value.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        emit_number(sink, flags, width, left, sign, "", body, false);
        return;
    }

    let magnitude = value.abs();
    let mut prefix = "";
    let mut body = match style {
        FloatStyle::Fixed => {
            let p = precision.unwrap_or(6);
            let mut s = format!("{:.*}", p, magnitude);
            if flags.alt && !s.contains('.') {
                s.push('.');
            }
            s
        }
        FloatStyle::Scientific => {
            let p = precision.unwrap_or(6);
            let (mantissa, exponent) = sci_parts(magnitude, p);
            assemble_sci(&mantissa, exponent, flags.alt)
        }
        FloatStyle::Shortest => shortest_body(magnitude, precision, flags.alt),
        FloatStyle::Hex => {
            prefix = if upper { "0X" } else { "0x" };
            hex_float_body(magnitude, precision, flags.alt)
        }
    };
    if upper {
        body = body.to_uppercase();
    }
    emit_number(sink, flags, width, left, sign, prefix, &body, true);
}

/// Split `value` formatted at `precision` fractional mantissa digits into
/// (mantissa, decimal exponent).
fn sci_parts(value: f64, precision: usize) -> (String, i32) {
    let s = format!("{:.*e}", precision, value);
    match s.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (s, 0),
    }
}

/// `mantissa` + `e` + explicit sign + at-least-two-digit exponent
fn assemble_sci(mantissa: &str, exponent: i32, alt: bool) -> String {
    let mut body = String::from(mantissa);
    if alt && !body.contains('.') {
        body.push('.');
    }
    body.push('e');
    body.push(if exponent < 0 { '-' } else { '+' });
    let magnitude = exponent.unsigned_abs();
    if magnitude < 10 {
        body.push('0');
    }
    body.push_str(&magnitude.to_string());
    body
}

fn strip_fraction_zeros(body: &mut String) {
    if body.contains('.') {
        while body.ends_with('0') {
            body.pop();
        }
        if body.ends_with('.') {
            body.pop();
        }
    }
}

/// Shortest-form rendering: fixed or scientific notation depending on the
/// rounded decimal exponent, with trailing zeros stripped unless `alt`.
fn shortest_body(magnitude: f64, precision: Option<usize>, alt: bool) -> String {
    let mut digits = precision.unwrap_or(6);
    if digits == 0 {
        digits = 1;
    }

    let (mantissa, exponent) = sci_parts(magnitude, digits - 1);
    if exponent >= -4 && (exponent as i64) < digits as i64 {
        let fraction = (digits as i64 - 1 - exponent as i64) as usize;
        let mut body = format!("{:.*}", fraction, magnitude);
        if alt && !body.contains('.') {
            body.push('.');
        } else if !alt {
            strip_fraction_zeros(&mut body);
        }
        body
    } else {
        let mut mantissa = mantissa;
        if !alt {
            strip_fraction_zeros(&mut mantissa);
        }
        assemble_sci(&mantissa, exponent, alt)
    }
}

/// Hexadecimal-exponent rendering of a non-negative finite value, without the
/// `0x` prefix. Subnormals are normalized so the leading digit is 1, with the
/// binary exponent adjusted below -1022 to match.
fn hex_float_body(magnitude: f64, precision: Option<usize>, alt: bool) -> String {
    const FRAC_BITS: u32 = 52;
    const FRAC_MASK: u64 = (1 << FRAC_BITS) - 1;

    let bits = magnitude.to_bits();
    let exp_field = (bits >> FRAC_BITS) & 0x7ff;
    let mut frac = bits & FRAC_MASK;
    let mut lead: u64;
    let exponent: i64;

    if exp_field == 0 {
        if frac == 0 {
            lead = 0;
            exponent = 0;
        } else {
            let shift = frac.leading_zeros() - 11;
            frac = (frac << shift) & FRAC_MASK;
            exponent = -1022 - shift as i64;
            lead = 1;
        }
    } else {
        lead = 1;
        exponent = exp_field as i64 - 1023;
    }

    let digits = match precision {
        None => {
            // Exact form: all 52 fraction bits, trailing zeros dropped
            let mut s = format!("{:013x}", frac);
            while s.ends_with('0') {
                s.pop();
            }
            s
        }
        Some(0) => {
            // Round the whole fraction into the leading digit, ties to even
            let half = 1u64 << (FRAC_BITS - 1);
            if frac > half || (frac == half && lead & 1 == 1) {
                lead += 1;
            }
            String::new()
        }
        Some(p) if p >= 13 => format!("{:013x}{}", frac, "0".repeat(p - 13)),
        Some(p) => {
            let dropped_bits = FRAC_BITS - 4 * p as u32;
            let mut kept = frac >> dropped_bits;
            let remainder = frac & ((1 << dropped_bits) - 1);
            let half = 1u64 << (dropped_bits - 1);
            if remainder > half || (remainder == half && kept & 1 == 1) {
                kept += 1;
            }
            if kept >> (4 * p as u32) != 0 {
                kept = 0;
                lead += 1;
            }
            format!("{:0width$x}", kept, width = p)
        }
    };

    let mut body = lead.to_string();
    if !digits.is_empty() {
        body.push('.');
        body.push_str(&digits);
    } else if alt {
        body.push('.');
    }
    body.push('p');
    body.push_str(&format!("{:+}", exponent));
    body
}

/// Emit sign + prefix + body inside the field width. Zero padding goes
/// between the prefix and the body; space padding goes outside.
fn emit_number(
    sink: &mut Sink<'_>,
    flags: &Flags,
    width: usize,
    left: bool,
    sign: &str,
    prefix: &str,
    body: &str,
    zero_pad_allowed: bool,
) {
    let content = sign.len() + prefix.len() + body.len();
    let pad = width.saturating_sub(content);
    if left {
        sink.push_str(sign);
        sink.push_str(prefix);
        sink.push_str(body);
        sink.pad(b' ', pad);
    } else if flags.zero && zero_pad_allowed {
        sink.push_str(sign);
        sink.push_str(prefix);
        sink.pad(b'0', pad);
        sink.push_str(body);
    } else {
        sink.pad(b' ', pad);
        sink.push_str(sign);
        sink.push_str(prefix);
        sink.push_str(body);
    }
}

fn emit_padded(sink: &mut Sink<'_>, width: usize, left: bool, bytes: &[u8]) {
    let pad = width.saturating_sub(bytes.len());
    if left {
        sink.push_bytes(bytes);
        sink.pad(b' ', pad);
    } else {
        sink.pad(b' ', pad);
        sink.push_bytes(bytes);
    }
}
