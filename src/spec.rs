//! Conversion directive parser
//!
//! A directive has the shape `%[flags][width][.precision][length]conversion`.
//! Parsing is byte-oriented: every character with syntactic meaning is ASCII,
//! so a multibyte code point can only ever show up as an unknown conversion.

use std::fmt;

/// Optional directive flags (`-`, `+`, space, `0`, `#`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Left-justify within the field width
    pub left: bool,
    /// Always print a sign for signed conversions
    pub plus: bool,
    /// Print a space where the sign would go for non-negative values
    pub space: bool,
    /// Pad numeric conversions with zeros instead of spaces
    pub zero: bool,
    /// Alternate form (`0x` prefix, forced leading octal zero, forced point)
    pub alt: bool,
}

/// Minimum field width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// No width given
    None,
    /// Width written in the template
    Fixed(i32),
    /// `*`: the next argument supplies the width
    FromArg,
}

/// Conversion precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// No precision given
    None,
    /// Precision written in the template (`.` alone means 0)
    Fixed(i32),
    /// `.*`: the next argument supplies the precision
    FromArg,
}

/// Length modifier. Argument values are already materialized at full width,
/// so these only select the wide conversions (`%lc`, `%ls`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthMod {
    #[default]
    None,
    /// `hh`
    Char,
    /// `h`
    Short,
    /// `l`
    Long,
    /// `ll`
    LongLong,
    /// `z`
    Size,
    /// `j`
    Intmax,
    /// `t`
    Ptrdiff,
    /// `L`
    LongDouble,
}

/// The conversion a directive requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `d` / `i`
    Signed,
    /// `u`
    Unsigned,
    /// `o`
    Octal,
    /// `x`
    HexLower,
    /// `X`
    HexUpper,
    /// `f` / `F`
    Fixed { upper: bool },
    /// `e` / `E`
    Scientific { upper: bool },
    /// `g` / `G`
    Shortest { upper: bool },
    /// `a` / `A`
    HexFloat { upper: bool },
    /// `s` (and `ls`)
    Str,
    /// `c` (and `lc`)
    Char,
    /// `p`
    Ptr,
    /// `n`: store the byte count produced so far
    Count,
    /// `%%`
    Percent,
}

/// A fully parsed conversion directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub flags: Flags,
    pub width: Width,
    pub precision: Precision,
    pub length: LengthMod,
    pub conversion: Conversion,
}

/// Error type for template parsing and argument binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The template ends in the middle of a directive
    UnterminatedDirective { offset: usize },

    /// The conversion character is not part of the grammar
    UnknownConversion { conversion: char, offset: usize },

    /// A literal field width or precision does not fit an `i32`
    WidthOutOfRange { offset: usize },

    /// A directive needs an argument the list does not have
    MissingArgument { index: usize },

    /// The argument at `index` cannot satisfy the directive's conversion
    WrongArgType { index: usize, expected: &'static str },

    /// A `*` width or precision argument does not fit an `i32`
    StarOutOfRange { index: usize },

    /// The write pass produced a different count than the measuring pass
    LengthMismatch { measured: usize, written: usize },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnterminatedDirective { offset } => {
                write!(f, "Unterminated conversion directive at byte {}", offset)
            }
            FormatError::UnknownConversion { conversion, offset } => {
                write!(f, "Unknown conversion '%{}' at byte {}", conversion, offset)
            }
            FormatError::WidthOutOfRange { offset } => {
                write!(f, "Field width or precision out of range at byte {}", offset)
            }
            FormatError::MissingArgument { index } => {
                write!(f, "Missing argument {} for conversion directive", index)
            }
            FormatError::WrongArgType { index, expected } => {
                write!(f, "Argument {} is not usable as {}", index, expected)
            }
            FormatError::StarOutOfRange { index } => {
                write!(f, "Argument {} is out of range for a field width or precision", index)
            }
            FormatError::LengthMismatch { measured, written } => {
                write!(
                    f,
                    "Write pass produced {} bytes but the measuring pass expected {}",
                    written, measured
                )
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Parse one directive starting at `start`, the byte offset just past the
/// introducing `%`. Returns the parsed spec and the offset of the first byte
/// after the conversion character.
pub fn parse_spec(template: &str, start: usize) -> Result<(FormatSpec, usize), FormatError> {
    let bytes = template.as_bytes();
    let mut pos = start;

    let mut flags = Flags::default();
    loop {
        match bytes.get(pos) {
            Some(b'-') => flags.left = true,
            Some(b'+') => flags.plus = true,
            Some(b' ') => flags.space = true,
            Some(b'0') => flags.zero = true,
            Some(b'#') => flags.alt = true,
            _ => break,
        }
        pos += 1;
    }

    let mut width = Width::None;
    if bytes.get(pos) == Some(&b'*') {
        width = Width::FromArg;
        pos += 1;
    } else if matches!(bytes.get(pos), Some(b'1'..=b'9')) {
        width = Width::Fixed(parse_number(bytes, &mut pos)?);
    }

    let mut precision = Precision::None;
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        if bytes.get(pos) == Some(&b'*') {
            precision = Precision::FromArg;
            pos += 1;
        } else {
            // A bare "." counts as precision 0
            precision = Precision::Fixed(parse_number(bytes, &mut pos)?);
        }
    }

    let mut length = LengthMod::None;
    match bytes.get(pos) {
        Some(b'h') => {
            pos += 1;
            if bytes.get(pos) == Some(&b'h') {
                pos += 1;
                length = LengthMod::Char;
            } else {
                length = LengthMod::Short;
            }
        }
        Some(b'l') => {
            pos += 1;
            if bytes.get(pos) == Some(&b'l') {
                pos += 1;
                length = LengthMod::LongLong;
            } else {
                length = LengthMod::Long;
            }
        }
        Some(b'z') => {
            pos += 1;
            length = LengthMod::Size;
        }
        Some(b'j') => {
            pos += 1;
            length = LengthMod::Intmax;
        }
        Some(b't') => {
            pos += 1;
            length = LengthMod::Ptrdiff;
        }
        Some(b'L') => {
            pos += 1;
            length = LengthMod::LongDouble;
        }
        _ => {}
    }

    let Some(&conv) = bytes.get(pos) else {
        return Err(FormatError::UnterminatedDirective {
            offset: start.saturating_sub(1),
        });
    };

    let conversion = match conv {
        b'd' | b'i' => Conversion::Signed,
        b'u' => Conversion::Unsigned,
        b'o' => Conversion::Octal,
        b'x' => Conversion::HexLower,
        b'X' => Conversion::HexUpper,
        b'f' => Conversion::Fixed { upper: false },
        b'F' => Conversion::Fixed { upper: true },
        b'e' => Conversion::Scientific { upper: false },
        b'E' => Conversion::Scientific { upper: true },
        b'g' => Conversion::Shortest { upper: false },
        b'G' => Conversion::Shortest { upper: true },
        b'a' => Conversion::HexFloat { upper: false },
        b'A' => Conversion::HexFloat { upper: true },
        b's' => Conversion::Str,
        b'c' => Conversion::Char,
        b'p' => Conversion::Ptr,
        b'n' => Conversion::Count,
        b'%' => Conversion::Percent,
        _ => {
            let conversion = template[pos..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER);
            return Err(FormatError::UnknownConversion { conversion, offset: pos });
        }
    };

    Ok((
        FormatSpec {
            flags,
            width,
            precision,
            length,
            conversion,
        },
        pos + 1,
    ))
}

/// Parse a run of decimal digits at `*pos` into an `i32`, advancing the
/// position past them. An empty run yields 0.
fn parse_number(bytes: &[u8], pos: &mut usize) -> Result<i32, FormatError> {
    let mut value: i32 = 0;
    while let Some(digit) = bytes.get(*pos).filter(|b| b.is_ascii_digit()) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((digit - b'0') as i32))
            .ok_or(FormatError::WidthOutOfRange { offset: *pos })?;
        *pos += 1;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(directive: &str) -> FormatSpec {
        // Helper: directive text without the leading '%'
        let (spec, end) = parse_spec(directive, 0).unwrap();
        assert_eq!(end, directive.len());
        spec
    }

    #[test]
    fn test_parse_plain_signed() {
        let spec = parse("d");
        assert_eq!(spec.conversion, Conversion::Signed);
        assert_eq!(spec.width, Width::None);
        assert_eq!(spec.precision, Precision::None);
        assert_eq!(spec.flags, Flags::default());
    }

    #[test]
    fn test_parse_flag_combination() {
        let spec = parse("+0#x");
        assert!(spec.flags.plus);
        assert!(spec.flags.zero);
        assert!(spec.flags.alt);
        assert_eq!(spec.conversion, Conversion::HexLower);
    }

    #[test]
    fn test_parse_width_and_precision() {
        let spec = parse("-10.3f");
        assert!(spec.flags.left);
        assert_eq!(spec.width, Width::Fixed(10));
        assert_eq!(spec.precision, Precision::Fixed(3));
        assert_eq!(spec.conversion, Conversion::Fixed { upper: false });
    }

    #[test]
    fn test_parse_star_width_and_precision() {
        let spec = parse("*.*f");
        assert_eq!(spec.width, Width::FromArg);
        assert_eq!(spec.precision, Precision::FromArg);
    }

    #[test]
    fn test_parse_bare_dot_is_zero_precision() {
        let spec = parse(".e");
        assert_eq!(spec.precision, Precision::Fixed(0));
    }

    #[test]
    fn test_parse_length_modifiers() {
        assert_eq!(parse("lld").length, LengthMod::LongLong);
        assert_eq!(parse("hhu").length, LengthMod::Char);
        assert_eq!(parse("zu").length, LengthMod::Size);
        assert_eq!(parse("lc").length, LengthMod::Long);
        assert_eq!(parse("lc").conversion, Conversion::Char);
        assert_eq!(parse("ls").conversion, Conversion::Str);
    }

    #[test]
    fn test_parse_zero_width_is_flag() {
        // "%0d" has a zero flag, not a width of 0
        let spec = parse("07d");
        assert!(spec.flags.zero);
        assert_eq!(spec.width, Width::Fixed(7));
    }

    #[test]
    fn test_parse_percent_escape() {
        assert_eq!(parse("%").conversion, Conversion::Percent);
    }

    #[test]
    fn test_parse_unknown_conversion() {
        let err = parse_spec("q", 0).unwrap_err();
        assert_eq!(
            err,
            FormatError::UnknownConversion {
                conversion: 'q',
                offset: 0
            }
        );
    }

    #[test]
    fn test_parse_unterminated_directive() {
        let err = parse_spec("-08", 0).unwrap_err();
        assert!(matches!(err, FormatError::UnterminatedDirective { .. }));
    }

    #[test]
    fn test_parse_width_overflow() {
        let err = parse_spec("99999999999d", 0).unwrap_err();
        assert!(matches!(err, FormatError::WidthOutOfRange { .. }));
    }
}
