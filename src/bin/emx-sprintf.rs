//! emx-sprintf CLI
//!
//! Format printf-style templates from the command line, measure them without
//! allocating the result, or run the built-in scenario battery.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use emx_sprintf::{
    asprintf, measure, parse_spec, vasprintf, ArgList, Conversion, CountSlot, FormatError,
    Precision, Value, Width,
};
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "emx-sprintf")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "C printf-style formatting tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Format a template with arguments into an exactly-sized buffer
    Format {
        /// Template with printf-style conversion directives
        template: String,

        /// Arguments bound to the template's directives, in order
        args: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Report the formatted length on stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the measured output length without allocating the result
    #[command(name = "m")]
    Measure {
        /// Template with printf-style conversion directives
        template: String,

        /// Arguments bound to the template's directives, in order
        args: Vec<String>,
    },

    /// Run the built-in formatting scenarios
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Format { template, args, output, verbose } => {
            format_template(template, args, output, verbose)?;
        }
        Commands::Measure { template, args } => {
            measure_template(template, args)?;
        }
        Commands::Check => {
            run_scenarios()?;
        }
    }

    Ok(())
}

fn format_template(
    template: String,
    raw_args: Vec<String>,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let (args, counters) = capture_args(&template, &raw_args)?;
    let buf = vasprintf(&template, args.cursor())
        .with_context(|| format!("Failed to format template: {}", template))?;

    if let Some(output_path) = output {
        fs::write(&output_path, buf.as_bytes())
            .with_context(|| format!("Failed to write: {}", output_path.display()))?;
    } else {
        print!("{}", buf);
        io::stdout().flush()?;
    }

    if verbose {
        eprintln!("{} bytes", buf.len());
        for (i, counter) in counters.iter().enumerate() {
            eprintln!("counter {}: {}", i, counter.get());
        }
    }

    Ok(())
}

fn measure_template(template: String, raw_args: Vec<String>) -> Result<()> {
    let (args, _) = capture_args(&template, &raw_args)?;
    let size = measure(&template, &mut args.cursor())
        .with_context(|| format!("Failed to measure template: {}", template))?;
    println!("{}", size);
    Ok(())
}

/// Bind command-line strings to the template's directives, coercing each one
/// to the type its conversion expects.
fn capture_args(template: &str, raw: &[String]) -> Result<(ArgList, Vec<CountSlot>)> {
    let mut args = ArgList::new();
    let mut counters = Vec::new();
    let mut next = 0usize;

    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let (spec, end) = parse_spec(template, i + 1)?;
        i = end;

        if spec.width == Width::FromArg {
            args.push(take_int(raw, &mut next, "field width")?);
        }
        if spec.precision == Precision::FromArg {
            args.push(take_int(raw, &mut next, "precision")?);
        }

        match spec.conversion {
            Conversion::Signed => {
                args.push(take_int(raw, &mut next, "integer")?);
            }
            Conversion::Unsigned
            | Conversion::Octal
            | Conversion::HexLower
            | Conversion::HexUpper => {
                let word = take_raw(raw, &mut next, "unsigned integer")?;
                let value: u64 = word
                    .parse()
                    .with_context(|| format!("Not an unsigned integer: {}", word))?;
                args.push(value);
            }
            Conversion::Fixed { .. }
            | Conversion::Scientific { .. }
            | Conversion::Shortest { .. }
            | Conversion::HexFloat { .. } => {
                let word = take_raw(raw, &mut next, "float")?;
                let value: f64 = word
                    .parse()
                    .with_context(|| format!("Not a float: {}", word))?;
                args.push(value);
            }
            Conversion::Str => {
                args.push(take_raw(raw, &mut next, "string")?.as_str());
            }
            Conversion::Char => {
                let word = take_raw(raw, &mut next, "char")?;
                let value = word
                    .chars()
                    .next()
                    .with_context(|| "Empty argument where a char is expected".to_string())?;
                args.push(value);
            }
            Conversion::Ptr => {
                let word = take_raw(raw, &mut next, "pointer")?;
                let digits = word.strip_prefix("0x").unwrap_or(word.as_str());
                let value = usize::from_str_radix(digits, 16)
                    .with_context(|| format!("Not a pointer value: {}", word))?;
                args.push(Value::Ptr(value));
            }
            Conversion::Count => {
                let slot = CountSlot::new();
                counters.push(slot.clone());
                args.push(slot);
            }
            Conversion::Percent => {}
        }
    }

    if next < raw.len() {
        bail!("{} extra argument(s) beyond the template's directives", raw.len() - next);
    }

    Ok((args, counters))
}

fn take_raw<'a>(raw: &'a [String], next: &mut usize, what: &str) -> Result<&'a String> {
    let word = raw
        .get(*next)
        .with_context(|| format!("Missing {} argument for directive {}", what, *next + 1))?;
    *next += 1;
    Ok(word)
}

fn take_int(raw: &[String], next: &mut usize, what: &str) -> Result<i64> {
    let word = take_raw(raw, next, what)?;
    word.parse()
        .with_context(|| format!("Not an integer: {}", word))
}

/// Pass/fail bookkeeping for the scenario battery
struct Report {
    success: u32,
    failure: u32,
}

impl Report {
    fn new() -> Self {
        Self { success: 0, failure: 0 }
    }

    fn check(&mut self, cond: bool, msg: &str) {
        if cond {
            self.success += 1;
            println!("{} {}", format!("{:>8}", "Ok").as_str().green().bold(), msg);
        } else {
            self.failure += 1;
            println!("{} {}", format!("{:>8}", "Err").as_str().magenta().bold(), msg.magenta());
        }
    }

    fn summary(&self) {
        println!();
        println!("  -------------");
        if self.failure > 0 {
            println!("{}: {}", format!("{:>11}", "Passing").as_str().green().bold(), self.success);
            println!("{}: {}", format!("{:>11}", "Failed").as_str().magenta().bold(), self.failure);
            println!("{}: {}", format!("{:>11}", "Total").as_str().blue().bold(), self.success + self.failure);
        } else {
            println!("{}: {}", format!("{:>11}", "Total").as_str().green().bold(), self.success + self.failure);
        }
    }
}

fn run_scenarios() -> Result<()> {
    let mut report = Report::new();

    let r = asprintf!("foo");
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "foo" && buf.len() == 3),
        "Basic memory allocation",
    );

    let r = asprintf!("%s", "");
    report.check(
        matches!(&r, Ok(buf) if buf.is_empty()),
        "Empty string as input",
    );

    let r = asprintf!("%d %s", 10, "Test");
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "10 Test"),
        "String formatting variations",
    );

    let r = asprintf!("Special chars: %% \\");
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "Special chars: % \\"),
        "Special characters in format string",
    );

    let r = asprintf!("%d %d", i32::MIN, i32::MAX);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "-2147483648 2147483647"),
        "Boundary cases for integers",
    );

    let r = asprintf!("%.3f %.3f", f32::MIN_POSITIVE as f64, f32::MAX as f64);
    report.check(matches!(&r, Ok(buf) if buf.len() > 0), "Corner cases for floating point numbers");

    let r = asprintf!("%+d %0#x", 123, 255u32);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "+123 0xff"),
        "Combination of flags and specifiers",
    );

    let r = asprintf!("");
    report.check(
        matches!(&r, Ok(buf) if buf.len() == 0 && buf.as_str().is_empty()),
        "Empty format string",
    );

    let r = asprintf!("%s", "St.ing");
    report.check(
        matches!(&r, Ok(buf) if buf.len() == buf.as_str().len()
            && buf.as_bytes_with_nul()[buf.len()] == 0),
        "Null termination and string length",
    );

    let r = asprintf!("3 args: %d, %f, %s", 20, 3.14, "bar");
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "3 args: 20, 3.140000, bar"),
        "Multiple argument counts",
    );

    let r = asprintf!("%*s", 10_000_000, "large str fmt");
    report.check(
        matches!(&r, Ok(buf) if buf.len() == 10_000_000),
        "Allocate specified large width",
    );

    let r = asprintf!("Escape chars: %d\t%d\n", 10, 20);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "Escape chars: 10\t20\n"),
        "Escape characters",
    );

    let r = asprintf!("%s", "(null)");
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "(null)"),
        "Null pointers formatting",
    );

    let r = asprintf!("Pointer value: %p", std::ptr::null::<u8>());
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "Pointer value: 0x0"),
        "Pointer formatting corner cases",
    );

    let long = "This is a long string";
    let istr = "This string is longer than allowed length";
    let wide = asprintf!("%1000s", long);
    let clipped = asprintf!("%.*s", 10, istr);
    let roomy = asprintf!("%.*s", 1000, long);
    report.check(
        matches!(&wide, Ok(buf) if buf.len() == 1000)
            && matches!(&clipped, Ok(buf) if buf.as_str() == "This strin")
            && matches!(&roomy, Ok(buf) if buf.as_str() == long),
        "String truncation scenarios",
    );

    let r = asprintf!("Wide char: %lc %s", '\u{00A9}', "A");
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "Wide char: \u{00A9} A"),
        "Regular and wide characters",
    );

    let r = asprintf!("%s %lc", "日本語", '\u{00A9}');
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "日本語 \u{00A9}" && buf.len() == 12),
        "Locale and multibyte characters",
    );

    let r = asprintf!("%04d %s %#x", 5, "Test", 255u32);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "0005 Test 0xff"),
        "Combining multiple specifiers",
    );

    let r = asprintf!("res: %d", 42);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "res: 42"),
        "Integer and string substitution",
    );

    let r = asprintf!("val: %.2f", 3.14159);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "val: 3.14"),
        "Using %f float substitution specifier",
    );

    let expected = "Hex: 0x1.921f9f01b866ep+1";
    let r = asprintf!("Hex: %a", 3.14159);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == expected && buf.len() == expected.len()),
        "Using %a hexadecimal floating-point specifier",
    );

    let r = asprintf!("%e", 12345.6789);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "1.234568e+04"),
        "Using %e scientific notation specifier",
    );

    let r = asprintf!("%*.*f", 8, 2, 1234.5678);
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == " 1234.57"),
        "Using * as width and precision specifier",
    );

    let r = asprintf!("Quoted: \"%s\" Escaped quotes: '%c'", "example", '"');
    report.check(
        matches!(&r, Ok(buf) if buf.as_str() == "Quoted: \"example\" Escaped quotes: '\"'"),
        "Quoted strings with different escape characters",
    );

    let chars = CountSlot::new();
    let r = asprintf!("Chars written: %n", chars.clone());
    report.check(
        matches!(&r, Ok(buf) if chars.get() == buf.len() as i64),
        "Using %n to get the number of characters written",
    );

    report.check(
        asprintf!("this is a %s", "string").map(|b| b.len()) == Ok(16)
            && asprintf!("%d + %d = %d", 1, 1, 2).map(|b| b.len()) == Ok(9)
            && asprintf!(
                "bradley likes %s, %s, %s, and %s",
                "kinkajous",
                "bananas",
                "monkeys",
                "the beach"
            )
            .map(|b| b.len())
                == Ok(56),
        "Exact formatted lengths",
    );

    let r = asprintf!("%q", 1);
    report.check(
        matches!(&r, Err(emx_sprintf::SprintfError::Format(_))),
        "Malformed directives are rejected",
    );

    let r = asprintf!("%*d", 3_000_000_000i64, 1);
    report.check(
        matches!(
            &r,
            Err(emx_sprintf::SprintfError::Format(FormatError::StarOutOfRange { .. }))
        ),
        "Out-of-range width is rejected",
    );

    report.summary();

    if report.failure > 0 {
        bail!("{} scenario(s) failed", report.failure);
    }
    Ok(())
}
