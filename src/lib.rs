//! # emx-sprintf
//!
//! C `printf`-style formatting into exactly-sized, freshly allocated buffers.
//!
//! This crate renders a template in two passes: a measuring pass computes the
//! exact output length without writing anything, then a single allocation of
//! `length + 1` bytes is filled by the write pass and NUL-terminated. There
//! is no guess-and-grow: the result is never truncated and never
//! over-allocated, and a failed call never leaves a buffer behind.
//!
//! ## Template Format
//!
//! A template is literal text interleaved with conversion directives:
//!
//! ```text
//! %[flags][width][.precision][length]conversion
//! ```
//!
//! Supported conversions:
//!
//! - `d` / `i`, `u`, `o`, `x` / `X` — integers in decimal, octal, hex
//! - `f` / `F`, `e` / `E`, `g` / `G`, `a` / `A` — floats in fixed,
//!   scientific, shortest, and hexadecimal-exponent notation
//! - `s`, `c` — strings and single code points (`ls` / `lc` accept the same
//!   arguments; a wide code point expands to its multibyte form)
//! - `p` — pointer values
//! - `n` — store the byte count produced so far into a [`CountSlot`]
//! - `%%` — a literal `%`
//!
//! Flags `-`, `+`, space, `0`, and `#` behave as in C, width and precision
//! may be given as `*` to take the next argument, and all counts are byte
//! counts of the UTF-8 output.
//!
//! ## Two Entry Points
//!
//! [`asprintf!`] captures its trailing arguments the way a variadic call
//! would; [`vasprintf`] takes an already-captured [`ArgList`] cursor for
//! programmatic delegation:
//!
//! ```rust
//! use emx_sprintf::asprintf;
//!
//! let buf = asprintf!("%d %s", 10, "Test")?;
//! assert_eq!(buf.as_str(), "10 Test");
//! assert_eq!(buf.len(), 7);
//! # Ok::<(), emx_sprintf::SprintfError>(())
//! ```
//!
//! ## Argument Duplication
//!
//! A captured argument list is consumed positionally, and the two rendering
//! passes both need to read it. [`ArgCursor::duplicate`] yields an
//! independent cursor over the same values, so [`vasprintf`] duplicates the
//! caller's cursor for the measuring pass and keeps the original fresh for
//! the write pass.

pub mod args;
pub mod spec;
pub mod writer;
pub mod buffer;

pub use args::{ArgCursor, ArgList, CountSlot, ToValue, Value};
pub use spec::{
    parse_spec, Conversion, Flags, FormatError, FormatSpec, LengthMod, Precision, Width,
};
pub use writer::{measure, write_into};
pub use buffer::{vasprintf, AllocError, FormattedBuf, SprintfError};

/// Format a template with the trailing arguments into a freshly allocated,
/// exactly-sized, NUL-terminated buffer.
///
/// Every trailing expression is captured by value through [`ToValue`], then
/// the call delegates to [`vasprintf`]. Returns
/// `Result<FormattedBuf, SprintfError>`.
///
/// ```rust
/// use emx_sprintf::asprintf;
///
/// let buf = asprintf!("val: %.2f", 3.14159)?;
/// assert_eq!(buf.as_str(), "val: 3.14");
/// # Ok::<(), emx_sprintf::SprintfError>(())
/// ```
#[macro_export]
macro_rules! asprintf {
    ($template:expr $(, $arg:expr)* $(,)?) => {{
        let args = $crate::ArgList::from_values(vec![
            $($crate::ToValue::to_value(&$arg)),*
        ]);
        $crate::vasprintf($template, args.cursor())
    }};
}
