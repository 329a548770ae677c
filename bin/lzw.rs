#![forbid(unsafe_code)]
use std::io::Write;
use std::path::PathBuf;
use std::{env, ffi, fs, io};

use lzwpage::{
    decode::Decoder, encode::Encoder, ByteSink, ByteSource, Code, IoSink, IoSource, LzwError,
    SliceSource,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> CodingResult {
    let flags = match Flags::from_args(env::args_os()) {
        Ok(flags) => flags,
        Err(ParamError(msg)) => command()
            .error(clap::error::ErrorKind::ValueValidation, msg)
            .exit(),
    };
    if let Err(err) = init_logging(&flags) {
        return CodingResult::Err(err.into());
    }
    CodingResult::catch_panic(move || run_coding(flags))
}

/// Filter directives for the codec and this tool, `env` directives take precedence.
fn log_directives(flags: &Flags, env: Option<String>) -> String {
    let level = match flags.verbose {
        0 if flags.trace_ratio => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let mut directives = format!("lzwpage={0},lzw={0}", level);
    if let Some(env) = env {
        directives.push(',');
        directives.push_str(&env);
    }
    directives
}

fn init_logging(flags: &Flags) -> io::Result<()> {
    let env = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::new(log_directives(flags, env));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &flags.ratio_log {
        Some(path) => {
            let file = fs::File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn run_coding(flags: Flags) -> Result<(), LzwError> {
    if flags.trace_ratio && !flags.adaptive_reset {
        warn!("ratio tracing without adaptive reset only reports, it never resets");
    }
    debug!(max_code = flags.max_code, page_size = flags.page_size, "configuration");

    let input: Box<dyn io::BufRead> = match &flags.input {
        Input::File(file) => {
            let data = fs::File::open(file)?;
            Box::new(io::BufReader::with_capacity(1 << 20, data))
        }
        Input::Stdin => Box::new(io::BufReader::with_capacity(1 << 20, io::stdin())),
    };
    let output: Box<dyn io::Write> = match &flags.output {
        Some(path) => {
            let file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
            Box::new(file)
        }
        None => Box::new(io::stdout()),
    };
    let mut output = io::BufWriter::new(output);

    match flags.operation {
        Operation::Encode => {
            encode_pages(&flags, IoSource::new(input), IoSink::new(&mut output))?;
        }
        Operation::Decode => {
            decode_pages(&flags, IoSource::new(input), IoSink::new(&mut output))?;
        }
        Operation::Check => check_roundtrip(&flags, input, &mut output)?,
    }

    output.flush()?;
    Ok(())
}

/// Compress in pages and let the ratio monitor decide on clear codes between them.
fn encode_pages(
    flags: &Flags,
    mut source: impl ByteSource,
    mut sink: impl ByteSink,
) -> Result<(u64, u64), LzwError> {
    let mut encoder = Encoder::with_max_code(flags.max_code)?;
    let mut monitor = RatioMonitor::new();

    loop {
        let (read, written) = (encoder.bytes_read(), encoder.bytes_written());
        if encoder.process_chunk(&mut source, &mut sink, flags.page_size)? == 0 {
            break;
        }

        let page_read = encoder.bytes_read() - read;
        let page_written = encoder.bytes_written() - written;
        let ratio = page_written as f64 / page_read as f64;
        let reset = monitor.observe(ratio);

        if flags.trace_ratio {
            info!(
                ratio,
                ema_slow = monitor.slow,
                ema_fast = monitor.fast,
                page_read,
                page_written,
                "compression"
            );
        }

        if flags.adaptive_reset && reset {
            info!(pages = monitor.pages, "resetting");
            encoder.emit_clear_code(&mut sink)?;
            monitor = RatioMonitor::new();
        }
    }

    encoder.finish(&mut sink)?;
    Ok((encoder.bytes_read(), encoder.bytes_written()))
}

fn decode_pages(
    flags: &Flags,
    mut source: impl ByteSource,
    mut sink: impl ByteSink,
) -> Result<(u64, u64), LzwError> {
    let mut decoder = Decoder::with_max_code(flags.max_code)?;

    loop {
        let read = decoder.bytes_read();
        let produced = decoder.process_chunk(&mut source, &mut sink, flags.page_size)?;
        if produced == 0 {
            break;
        }

        if flags.trace_ratio {
            let page_read = decoder.bytes_read() - read;
            let ratio = page_read as f64 / produced as f64;
            info!(ratio, page_read, page_written = produced, "decompression");
        }
    }

    Ok((decoder.bytes_read(), decoder.bytes_written()))
}

/// Compress the whole input in memory, decompress it again and compare.
fn check_roundtrip(
    flags: &Flags,
    mut input: impl io::BufRead,
    output: &mut impl io::Write,
) -> Result<(), LzwError> {
    let mut data = vec![];
    io::Read::read_to_end(&mut input, &mut data)?;

    let mut compressed = vec![];
    let (read, written) = encode_pages(flags, SliceSource::new(&data), &mut compressed)?;
    let mut decompressed = Vec::with_capacity(data.len());
    decode_pages(flags, SliceSource::new(&compressed), &mut decompressed)?;

    if decompressed != data {
        let msg = "round trip does not reproduce the input";
        return Err(LzwError::Io(io::Error::new(io::ErrorKind::InvalidData, msg)));
    }

    writeln!(
        output,
        "round trip ok: {} -> {} bytes ({:.3})",
        read,
        written,
        written as f64 / read.max(1) as f64,
    )?;
    Ok(())
}

/// Tracks the per page compression ratio with a slow and a fast moving average.
///
/// A rise of the fast average well above the slow one means the data changed its character
/// and the dictionary learned so far no longer fits.
#[derive(Debug)]
struct RatioMonitor {
    pages: u32,
    slow: f64,
    fast: f64,
}

impl RatioMonitor {
    /// Pages during which both averages just follow the raw ratio.
    const SEED_PAGES: u32 = 64;
    const SLOW_ALPHA: f64 = 0.0005;
    const FAST_ALPHA: f64 = 0.05;
    /// A page ratio above this is treated as incompressible.
    const POOR_RATIO: f64 = 0.8;

    fn new() -> Self {
        RatioMonitor {
            pages: 0,
            slow: 0.0,
            fast: 0.0,
        }
    }

    /// Record the ratio of one page, returns whether the dictionary should be reset.
    fn observe(&mut self, ratio: f64) -> bool {
        let seeded = self.pages >= Self::SEED_PAGES;
        if seeded {
            self.slow += Self::SLOW_ALPHA * (ratio - self.slow);
            self.fast += Self::FAST_ALPHA * (ratio - self.fast);
        } else {
            self.slow = ratio;
            self.fast = ratio;
        }
        self.pages += 1;

        seeded && (self.slow * 1.5 < self.fast || ratio > Self::POOR_RATIO)
    }
}

struct Flags {
    input: Input,
    output: Option<PathBuf>,
    operation: Operation,
    max_code: Code,
    page_size: usize,
    adaptive_reset: bool,
    trace_ratio: bool,
    /// Where log output goes instead of stderr.
    ratio_log: Option<PathBuf>,
    verbose: u8,
}

struct ParamError(String);

#[derive(Debug)]
enum Input {
    File(PathBuf),
    Stdin,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Encode,
    Decode,
    Check,
}

impl Default for Flags {
    fn default() -> Flags {
        Flags {
            input: Input::Stdin,
            output: None,
            operation: Operation::Encode,
            max_code: 0,
            page_size: 4096,
            adaptive_reset: false,
            trace_ratio: false,
            ratio_log: None,
            verbose: 0,
        }
    }
}

fn command() -> clap::Command {
    clap::Command::new("lzw")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compress and decompress raw LZW code streams")
        .arg(
            clap::Arg::new("encode")
                .short('e')
                .long("encode")
                .action(clap::ArgAction::SetTrue)
                .help("Compress the input (default)"),
        )
        .arg(
            clap::Arg::new("decode")
                .short('d')
                .long("decode")
                .action(clap::ArgAction::SetTrue)
                .help("Decompress the input"),
        )
        .arg(
            clap::Arg::new("check")
                .short('c')
                .long("check")
                .action(clap::ArgAction::SetTrue)
                .help("Compress and decompress in memory and compare"),
        )
        .group(
            clap::ArgGroup::new("operation")
                .args(["encode", "decode", "check"])
                .multiple(false),
        )
        .arg(
            clap::Arg::new("max_code")
                .short('m')
                .long("max-code")
                .value_parser(clap::value_parser!(Code))
                .help("Highest code the dictionary assigns, 0 for unbounded"),
        )
        .arg(
            clap::Arg::new("page_size")
                .short('p')
                .long("page-size")
                .value_parser(clap::value_parser!(usize))
                .help("Bytes handled between two ratio measurements"),
        )
        .arg(
            clap::Arg::new("adaptive_reset")
                .short('x')
                .long("adaptive-reset")
                .action(clap::ArgAction::SetTrue)
                .help("Emit a clear code when the compression ratio degrades"),
        )
        .arg(
            clap::Arg::new("trace_ratio")
                .short('q')
                .long("trace-ratio")
                .value_name("FILE")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("-")
                .value_parser(clap::builder::ValueParser::path_buf())
                .help("Log the ratio of every page, into FILE instead of stderr if given"),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(clap::builder::ValueParser::path_buf())
                .help("Write to a new file instead of stdout"),
        )
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count),
        )
        .arg(
            clap::Arg::new("file")
                .default_value("-")
                .value_parser(clap::builder::ValueParser::path_buf()),
        )
}

impl Flags {
    fn from_args(args: impl IntoIterator<Item = ffi::OsString>) -> Result<Self, ParamError> {
        let mut flags = Flags::default();
        let matches = command().get_matches_from(args);

        if matches.get_flag("decode") {
            flags.operation = Operation::Decode;
        } else if matches.get_flag("check") {
            flags.operation = Operation::Check;
        }

        if let Some(&m) = matches.get_one::<Code>("max_code") {
            flags.max_code = m;
        }

        match matches.get_one::<usize>("page_size") {
            Some(0) => return Err(ParamError("the page size must not be zero".into())),
            Some(&p) => flags.page_size = p,
            None => {}
        }

        flags.adaptive_reset = matches.get_flag("adaptive_reset");
        match matches.get_one::<PathBuf>("trace_ratio") {
            None => {}
            Some(p) if *p == PathBuf::from("-") => flags.trace_ratio = true,
            Some(p) => {
                flags.trace_ratio = true;
                flags.ratio_log = Some(p.clone());
            }
        }
        flags.verbose = matches.get_count("verbose");
        flags.output = matches.get_one::<PathBuf>("output").cloned();

        match matches.get_one::<PathBuf>("file") {
            None => flags.input = Input::Stdin,
            Some(p) if *p == PathBuf::from("-") => flags.input = Input::Stdin,
            Some(p) => flags.input = Input::File(p.clone()),
        }

        Ok(flags)
    }
}

enum CodingResult {
    Ok,
    Err(LzwError),
    Panic,
}

impl CodingResult {
    fn catch_panic(op: impl FnOnce() -> Result<(), LzwError> + std::panic::UnwindSafe) -> Self {
        std::panic::catch_unwind(|| match op() {
            Ok(()) => CodingResult::Ok,
            Err(err) => CodingResult::Err(err),
        })
        .unwrap_or(CodingResult::Panic)
    }
}

impl std::process::Termination for CodingResult {
    fn report(self) -> std::process::ExitCode {
        match self {
            CodingResult::Ok => std::process::ExitCode::SUCCESS,
            CodingResult::Err(err) => {
                eprintln!("lzw: {}", err);
                std::process::ExitCode::FAILURE
            }
            CodingResult::Panic => {
                eprintln!(
                    "The process failed irrecoverably! This should never happen and is a bug."
                );
                std::process::ExitCode::from(128)
            }
        }
    }
}
