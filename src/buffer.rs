//! Formatting into freshly allocated buffers
//!
//! [`vasprintf`] is the dynamic-sizing layer over the rendering engine: it
//! measures the template against a duplicated argument cursor, allocates a
//! buffer of exactly the measured length plus one terminator byte, then runs
//! the write pass with the original cursor. The buffer is never guessed,
//! grown, truncated, or over-allocated.

use std::fmt;
use std::ops::Deref;

use crate::args::ArgCursor;
use crate::spec::FormatError;
use crate::writer;

/// A heap-allocated, NUL-terminated formatting result.
///
/// The buffer holds exactly the formatted bytes followed by one terminator
/// byte, nothing more. It exists only on the success path, so a failed call
/// can never leave ownership behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedBuf {
    bytes: Vec<u8>,
}

impl FormattedBuf {
    /// Formatted length in bytes, excluding the terminator
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The formatted text
    pub fn as_str(&self) -> &str {
        // The write pass fills the exact measured size with complete UTF-8
        // sequences; no truncation can leave a partial code point behind.
        std::str::from_utf8(&self.bytes[..self.len()]).expect("formatted output is valid UTF-8")
    }

    /// Formatted bytes without the terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Formatted bytes including the terminator
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the underlying allocation, terminator included
    pub fn into_bytes_with_nul(self) -> Vec<u8> {
        self.bytes
    }
}

impl Deref for FormattedBuf {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for FormattedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for a buffer allocation that cannot be satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocError {
    /// The byte count that was requested (or `usize::MAX` when the measured
    /// length plus the terminator is not representable at all)
    pub requested: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot allocate {} bytes for formatted output", self.requested)
    }
}

impl std::error::Error for AllocError {}

/// Error type for [`vasprintf`] and the `asprintf!` macro
#[derive(Debug, Clone, PartialEq)]
pub enum SprintfError {
    /// The template is malformed for the given arguments, or the write pass
    /// disagreed with the measurement
    Format(FormatError),
    /// The measured size could not be allocated
    Alloc(AllocError),
}

impl fmt::Display for SprintfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SprintfError::Format(err) => write!(f, "Format error: {}", err),
            SprintfError::Alloc(err) => write!(f, "Allocation error: {}", err),
        }
    }
}

impl std::error::Error for SprintfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SprintfError::Format(err) => Some(err),
            SprintfError::Alloc(err) => Some(err),
        }
    }
}

impl From<FormatError> for SprintfError {
    fn from(err: FormatError) -> Self {
        SprintfError::Format(err)
    }
}

impl From<AllocError> for SprintfError {
    fn from(err: AllocError) -> Self {
        SprintfError::Alloc(err)
    }
}

/// Format `template` with the arguments behind `args` into a freshly
/// allocated, exactly-sized, NUL-terminated buffer.
///
/// The cursor is duplicated for the measuring pass so the write pass reads a
/// fresh copy of the same values. On any error no allocation survives: the
/// measuring pass fails before allocating, and a write-pass failure releases
/// the buffer before returning.
///
/// ```rust
/// use emx_sprintf::{vasprintf, ArgList, Value};
///
/// let args = ArgList::from_values(vec![Value::Int(10), Value::Str("Test".into())]);
/// let buf = vasprintf("%d %s", args.cursor())?;
/// assert_eq!(buf.as_str(), "10 Test");
/// assert_eq!(buf.len(), 7);
/// # Ok::<(), emx_sprintf::SprintfError>(())
/// ```
pub fn vasprintf(template: &str, mut args: ArgCursor<'_>) -> Result<FormattedBuf, SprintfError> {
    // Sizing pass runs on a duplicate; the write pass gets the original.
    let mut sizing = args.duplicate();
    let size = writer::measure(template, &mut sizing)?;

    let capacity = size.checked_add(1).ok_or(AllocError { requested: usize::MAX })?;
    let mut bytes: Vec<u8> = Vec::new();
    bytes
        .try_reserve_exact(capacity)
        .map_err(|_| AllocError { requested: capacity })?;
    bytes.resize(capacity, 0);

    let written = writer::write_into(template, &mut args, &mut bytes)?;
    if written != size {
        return Err(SprintfError::Format(FormatError::LengthMismatch {
            measured: size,
            written,
        }));
    }

    Ok(FormattedBuf { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ArgList, CountSlot, Value};
    use crate::asprintf;

    #[test]
    fn test_basic_allocation() {
        let buf = asprintf!("foo").unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_str(), "foo");
    }

    #[test]
    fn test_empty_template() {
        let buf = asprintf!("").unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.as_bytes_with_nul(), b"\0");
    }

    #[test]
    fn test_empty_string_argument() {
        let buf = asprintf!("%s", "").unwrap();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.as_str(), "");
    }

    #[test]
    fn test_formatting_variations() {
        let buf = asprintf!("%d %s", 10, "Test").unwrap();
        assert_eq!(buf.len(), 7);
        assert_eq!(buf.as_str(), "10 Test");
    }

    #[test]
    fn test_special_characters() {
        let buf = asprintf!("Special chars: %% \\").unwrap();
        assert_eq!(buf.as_str(), "Special chars: % \\");
    }

    #[test]
    fn test_integer_boundaries() {
        let buf = asprintf!("%d %d", i32::MIN, i32::MAX).unwrap();
        assert_eq!(buf.as_str(), "-2147483648 2147483647");
    }

    #[test]
    fn test_float_corner_values() {
        let buf = asprintf!("%.3f %.3f", f32::MIN_POSITIVE as f64, f32::MAX as f64).unwrap();
        assert!(buf.len() > 0);
        assert!(buf.starts_with("0.000 "));
    }

    #[test]
    fn test_flag_and_specifier_combination() {
        let buf = asprintf!("%+d %0#x", 123, 255u32).unwrap();
        assert_eq!(buf.len(), 9);
        assert_eq!(buf.as_str(), "+123 0xff");
    }

    #[test]
    fn test_null_termination_and_length() {
        let buf = asprintf!("%s", "St.ing").unwrap();
        assert_eq!(buf.len(), buf.as_str().len());
        assert_eq!(buf.as_bytes_with_nul()[buf.len()], 0);
    }

    #[test]
    fn test_three_argument_kinds() {
        let buf = asprintf!("3 args: %d, %f, %s", 20, 3.14, "bar").unwrap();
        assert_eq!(buf.as_str(), "3 args: 20, 3.140000, bar");
    }

    #[test]
    fn test_large_width_allocates() {
        let buf = asprintf!("%*s", 10_000_000, "large str fmt").unwrap();
        assert_eq!(buf.len(), 10_000_000);
        assert!(buf.ends_with("large str fmt"));
    }

    #[test]
    fn test_escape_characters() {
        let buf = asprintf!("Escape chars: %d\t%d\n", 10, 20).unwrap();
        assert_eq!(buf.as_str(), "Escape chars: 10\t20\n");
    }

    #[test]
    fn test_pointer_values() {
        let buf = asprintf!("Pointer value: %p", std::ptr::null::<u8>()).unwrap();
        assert_eq!(buf.as_str(), "Pointer value: 0x0");
    }

    #[test]
    fn test_string_truncation_scenarios() {
        // Width larger than the string pads on the left
        let long = "This is a long string";
        let buf = asprintf!("%1000s", long).unwrap();
        assert_eq!(buf.len(), 1000);
        assert!(buf.ends_with(long));

        // Precision smaller than the string truncates
        let buf = asprintf!("%.*s", 10, "This string is longer than allowed length").unwrap();
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_str(), "This strin");

        // Precision larger than the string leaves it alone
        let buf = asprintf!("%.*s", 1000, long).unwrap();
        assert_eq!(buf.as_str(), long);
    }

    #[test]
    fn test_wide_and_multibyte_characters() {
        let buf = asprintf!("Wide char: %lc %s", '\u{00A9}', "A").unwrap();
        assert_eq!(buf.as_str(), "Wide char: \u{00A9} A");

        let buf = asprintf!("%s %lc", "日本語", '\u{00A9}').unwrap();
        assert_eq!(buf.as_str(), "日本語 \u{00A9}");
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn test_combined_specifiers() {
        let buf = asprintf!("%04d %s %#x", 5, "Test", 255u32).unwrap();
        assert_eq!(buf.as_str(), "0005 Test 0xff");
    }

    #[test]
    fn test_float_substitution() {
        let buf = asprintf!("val: %.2f", 3.14159).unwrap();
        assert_eq!(buf.len(), 9);
        assert_eq!(buf.as_str(), "val: 3.14");
    }

    #[test]
    fn test_hex_float_specifier() {
        let expected = "Hex: 0x1.921f9f01b866ep+1";
        let buf = asprintf!("Hex: %a", 3.14159).unwrap();
        assert_eq!(buf.len(), expected.len());
        assert_eq!(buf.as_str(), expected);
    }

    #[test]
    fn test_scientific_notation_specifier() {
        let buf = asprintf!("%e", 12345.6789).unwrap();
        assert_eq!(buf.as_str(), "1.234568e+04");
    }

    #[test]
    fn test_star_width_and_precision() {
        let buf = asprintf!("%*.*f", 8, 2, 1234.5678).unwrap();
        assert_eq!(buf.as_str(), " 1234.57");
    }

    #[test]
    fn test_quotes_and_escapes() {
        let buf = asprintf!("Quoted: \"%s\" Escaped quotes: '%c'", "example", '"').unwrap();
        assert_eq!(buf.as_str(), "Quoted: \"example\" Escaped quotes: '\"'");
    }

    #[test]
    fn test_count_directive() {
        let chars = CountSlot::new();
        let buf = asprintf!("Chars written: %n", chars.clone()).unwrap();
        assert_eq!(chars.get(), buf.len() as i64);
        assert_eq!(buf.len(), 15);
    }

    #[test]
    fn test_exact_formatted_lengths() {
        assert_eq!(asprintf!("this is a %s", "string").unwrap().len(), 16);
        assert_eq!(asprintf!("%d + %d = %d", 1, 1, 2).unwrap().len(), 9);
        assert_eq!(
            asprintf!(
                "bradley likes %s, %s, %s, and %s",
                "kinkajous",
                "bananas",
                "monkeys",
                "the beach"
            )
            .unwrap()
            .len(),
            56
        );
    }

    #[test]
    fn test_reformatting_is_idempotent() {
        let first = asprintf!("%d %s %.2f", 7, "seven", 7.0).unwrap();
        let second = asprintf!("%d %s %.2f", 7, "seven", 7.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_bytes_with_nul(), second.as_bytes_with_nul());
    }

    #[test]
    fn test_malformed_template_fails_without_buffer() {
        let err = asprintf!("%q", 1).unwrap_err();
        assert!(matches!(err, SprintfError::Format(_)));

        let err = asprintf!("trailing %").unwrap_err();
        assert!(matches!(
            err,
            SprintfError::Format(FormatError::UnterminatedDirective { .. })
        ));
    }

    #[test]
    fn test_missing_argument_fails() {
        let err = asprintf!("%d %d", 1).unwrap_err();
        assert_eq!(
            err,
            SprintfError::Format(FormatError::MissingArgument { index: 1 })
        );
    }

    #[test]
    fn test_out_of_range_star_width_fails() {
        let err = asprintf!("%*d", 3_000_000_000i64, 1).unwrap_err();
        assert_eq!(
            err,
            SprintfError::Format(FormatError::StarOutOfRange { index: 0 })
        );
    }

    #[test]
    fn test_overflowing_capacity_is_alloc_error() {
        // The guard sits between measuring and allocating; exercise it the
        // way vasprintf computes the request.
        let measured = usize::MAX;
        let err: SprintfError = match measured.checked_add(1) {
            Some(_) => panic!("usize::MAX + 1 must not be representable"),
            None => AllocError { requested: usize::MAX }.into(),
        };
        assert_eq!(
            err,
            SprintfError::Alloc(AllocError { requested: usize::MAX })
        );
    }

    #[test]
    fn test_unsatisfiable_reservation_is_alloc_error() {
        // Vec rejects reservations beyond isize::MAX before touching the
        // allocator, which is the same surface vasprintf reports.
        let mut bytes: Vec<u8> = Vec::new();
        let requested = (isize::MAX as usize) + 1;
        let result = bytes
            .try_reserve_exact(requested)
            .map_err(|_| AllocError { requested });
        assert_eq!(result.unwrap_err(), AllocError { requested });
    }

    #[test]
    fn test_vasprintf_with_programmatic_list() {
        let mut args = ArgList::new();
        args.push(42);
        args.push("answer");
        let buf = vasprintf("%d is the %s", args.cursor()).unwrap();
        assert_eq!(buf.as_str(), "42 is the answer");
    }

    #[test]
    fn test_cursor_can_start_mid_list() {
        // A caller may hand vasprintf a cursor that already consumed values.
        let args = ArgList::from_values(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let mut cursor = args.cursor();
        cursor.next_int().unwrap();
        let buf = vasprintf("%d %d", cursor).unwrap();
        assert_eq!(buf.as_str(), "2 3");
    }

    #[test]
    fn test_display_and_deref() {
        let buf = asprintf!("%05.1f", 9.87).unwrap();
        assert_eq!(format!("{}", buf), "009.9");
        assert_eq!(&buf[..3], "009");
    }

    #[test]
    fn test_into_bytes_keeps_terminator() {
        let bytes = asprintf!("ab").unwrap().into_bytes_with_nul();
        assert_eq!(bytes, b"ab\0");
    }
}
