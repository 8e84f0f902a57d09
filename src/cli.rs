// Command-line front end for p2bin.
//
//   p2bin INPUT.p OUTPUT.bin [SHARE.h]
//
// Converts the object file, deletes the output on failure, and appends the
// compressed driver size to the share file when there is one.

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, ValueHint};

use crate::build::{BuildOptions, DEFAULT_MAX_IMAGE_SIZE};
use crate::codec::Codec;
use crate::io::{self, BuildStats};
use crate::placement::SegmentKind;
use crate::report::{DEFAULT_SYMBOL, ShareFile};

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Parse a number given in decimal, `0x` hex or `$` hex.
fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(hex) = s.strip_prefix('$') {
        (hex, 16)
    } else {
        (s, 10)
    };
    if digits.is_empty() {
        return Err(format!("invalid number '{s}'"));
    }
    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid number '{s}': {e}"))
}

fn parse_fill(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("fill byte out of range: '{s}'"))
}

fn parse_codec(s: &str) -> Result<Codec, String> {
    s.parse::<Codec>().map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Convert an AS .p object file into a flat ROM image.
#[derive(Parser, Debug)]
#[command(
    name = "p2bin",
    version,
    about = "Convert AS .p object files into ROM images",
    arg_required_else_help = true
)]
struct Cli {
    /// Object file produced by the assembler.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// ROM image to write.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Header file that receives the compressed driver size.
    #[arg(value_hint = ValueHint::FilePath)]
    share: Option<PathBuf>,

    /// Codec for the Z80 sound driver (kosinski, zlib, lzma). Only
    /// kosinski produces a bootable ROM; the others are for size comparisons.
    #[arg(long, value_parser = parse_codec, default_value = "kosinski")]
    codec: Codec,

    /// Byte used to pad gaps between segments.
    #[arg(long, value_parser = parse_fill, default_value = "0")]
    fill: u8,

    /// Name of the define written to the share file.
    #[arg(long, default_value = DEFAULT_SYMBOL)]
    symbol: String,

    /// Maximum image size (decimal, 0x or $ hex).
    #[arg(long = "max-size", value_parser = parse_number, default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
    max_size: u64,

    /// Print the segment map after a successful build.
    #[arg(long)]
    segments: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stdout.
    #[arg(long = "json")]
    json_output: bool,
}

impl Cli {
    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            codec: self.codec,
            fill: self.fill,
            max_image_size: self.max_size,
        }
    }

    fn share_file(&self) -> Option<ShareFile> {
        self.share
            .as_ref()
            .map(|path| ShareFile::new(path).with_symbol(&self.symbol))
    }

    fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("p2bin".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = cli.build_options();
        let _ = cli.share_file();
        let _ = cli.log_filter();
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn hex_digest(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn print_segment_map(stats: &BuildStats) {
    println!("  cpu  type  start     length  offset    written  kind");
    for seg in &stats.segments {
        let seg_type = seg
            .segment_type
            .map_or_else(|| "--".to_string(), |t| format!("{t:02X}"));
        let kind = match seg.kind {
            SegmentKind::Verbatim => "verbatim".to_string(),
            SegmentKind::CompressedDriver { context_address } => {
                format!("compressed (follows ${context_address:X})")
            }
        };
        println!(
            "  ${:02X}  {seg_type:>4}  ${:08X} ${:05X} ${:08X} ${:05X}  {kind}",
            seg.cpu_type, seg.start_address, seg.length, seg.image_offset, seg.written
        );
    }
}

fn stats_json(cli: &Cli, stats: &BuildStats) -> serde_json::Value {
    let segments: Vec<_> = stats
        .segments
        .iter()
        .map(|seg| {
            let context_address = match seg.kind {
                SegmentKind::CompressedDriver { context_address } => Some(context_address),
                SegmentKind::Verbatim => None,
            };
            serde_json::json!({
                "cpu_type": seg.cpu_type,
                "segment_type": seg.segment_type,
                "start_address": seg.start_address,
                "length": seg.length,
                "image_offset": seg.image_offset,
                "written": seg.written,
                "compressed": context_address.is_some(),
                "context_address": context_address,
            })
        })
        .collect();

    serde_json::json!({
        "input": cli.input.display().to_string(),
        "output": cli.output.display().to_string(),
        "input_size": stats.input_size,
        "image_size": stats.image_size,
        "codec": stats.codec,
        "compressed_length": stats.compressed_length,
        "share_updated": stats.share_updated,
        "warnings": stats.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        "segments": segments,
        "image_sha256": stats.image_sha256.as_ref().map(hex_digest),
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_build(cli: &Cli) -> i32 {
    let opts = cli.build_options();
    let share = cli.share_file();

    if !cli.quiet && !cli.json_output {
        println!(
            "p2bin: generating {} from {}...",
            cli.output.display(),
            cli.input.display()
        );
    }

    let stats = match io::build_file(&cli.input, &cli.output, share.as_ref(), &opts) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("p2bin: ERROR: {e}");
            return 1;
        }
    };

    if cli.json_output {
        println!("{}", stats_json(cli, &stats));
        return 0;
    }

    if cli.segments {
        print_segment_map(&stats);
    }

    if !cli.quiet {
        if stats.compressed_length > 0 {
            println!(
                "p2bin: compressed driver size: 0x{:X} ({})",
                stats.compressed_length, stats.codec
            );
        }
        println!("p2bin: done ({} bytes)", stats.image_size);
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap and runs the build.
pub fn run() -> ! {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    process::exit(cmd_build(&cli));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let argv = std::iter::once("p2bin").chain(args.iter().copied());
        Cli::try_parse_from(argv)
    }

    #[test]
    fn parse_number_forms() {
        assert_eq!(parse_number("16").unwrap(), 16);
        assert_eq!(parse_number("0x10").unwrap(), 16);
        assert_eq!(parse_number("$FF").unwrap(), 255);
        assert!(parse_number("0x").is_err());
        assert!(parse_number("ten").is_err());
        assert!(parse_fill("0x100").is_err());
        assert_eq!(parse_fill("0xFF").unwrap(), 0xFF);
    }

    #[test]
    fn positional_arguments() {
        let cli = parse(&["code.p", "rom.bin", "share.h"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("code.p"));
        assert_eq!(cli.output, PathBuf::from("rom.bin"));
        assert_eq!(cli.share, Some(PathBuf::from("share.h")));

        let share = cli.share_file().unwrap();
        assert_eq!(share.symbol, DEFAULT_SYMBOL);
    }

    #[test]
    fn share_file_is_optional() {
        let cli = parse(&["code.p", "rom.bin"]).unwrap();
        assert!(cli.share.is_none());
        assert!(cli.share_file().is_none());
    }

    #[test]
    fn one_positional_is_rejected() {
        assert!(parse(&["code.p"]).is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn defaults_match_build_options() {
        let cli = parse(&["in.p", "out.bin"]).unwrap();
        let opts = cli.build_options();
        let defaults = BuildOptions::default();
        assert_eq!(opts.codec, defaults.codec);
        assert_eq!(opts.fill, defaults.fill);
        assert_eq!(opts.max_image_size, defaults.max_image_size);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn tuning_flags() {
        let cli = parse(&[
            "--fill",
            "0xFF",
            "--symbol",
            "Snd_Driver_Size",
            "--max-size",
            "$400000",
            "--segments",
            "in.p",
            "out.bin",
            "share.h",
        ])
        .unwrap();
        assert_eq!(cli.fill, 0xFF);
        assert_eq!(cli.max_size, 0x40_0000);
        assert!(cli.segments);
        assert_eq!(cli.share_file().unwrap().symbol, "Snd_Driver_Size");
    }

    #[cfg(feature = "zlib-codec")]
    #[test]
    fn codec_flag() {
        let cli = parse(&["--codec", "zlib", "in.p", "out.bin"]).unwrap();
        assert_eq!(cli.codec, Codec::Zlib { level: 9 });
        assert!(parse(&["--codec", "nemesis", "in.p", "out.bin"]).is_err());
    }

    #[test]
    fn fuzz_hook_tolerates_garbage() {
        let args: Vec<String> = ["--fill", "0x1FF", "x"].iter().map(|s| s.to_string()).collect();
        fuzz_try_parse_args(&args);
        fuzz_try_parse_args(&["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(parse(&["-q", "a", "b"]).unwrap().log_filter(), "error");
        assert_eq!(parse(&["-v", "a", "b"]).unwrap().log_filter(), "info");
        assert_eq!(parse(&["-vvv", "a", "b"]).unwrap().log_filter(), "trace");
        assert!(parse(&["-q", "-v", "a", "b"]).is_err());
    }
}
