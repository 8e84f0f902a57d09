//! p2bin: turn AS assembler `.p` object files into flat ROM images.
//!
//! The crate provides:
//! - A segment stream decoder for the `.p` format (`segment`)
//! - The image placement engine, including the compressed Z80
//!   sound-driver path (`placement`)
//! - Driver compression codecs, Kosinski by default (`codec`)
//! - In-memory and file-oriented build entry points (`build`, `io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use p2bin::build::{build_rom, BuildOptions};
//!
//! // magic, legacy 68000 segment at $0 with two bytes, end marker
//! let object = [0x89, 0x14, 0x01, 0, 0, 0, 0, 0x02, 0x00, 0xAA, 0xBB, 0x00];
//! let result = build_rom(&object[..], &BuildOptions::default()).unwrap();
//! assert_eq!(result.image, [0xAA, 0xBB]);
//! assert!(result.report().define_line("comp_z80_size").is_none());
//! ```

pub mod build;
pub mod codec;
pub mod io;
pub mod placement;
pub mod reader;
pub mod report;
pub mod segment;

#[cfg(feature = "cli")]
pub mod cli;

pub use build::{BuildError, BuildOptions, Warning, build_rom};
pub use placement::ImageBuildResult;
