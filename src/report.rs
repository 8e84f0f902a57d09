// Build report: the compressed driver size, exported as a C-style define.
//
// The assembler source includes the share file to learn how much space the
// compressed sound driver really takes.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Symbol written to the share file unless overridden.
pub const DEFAULT_SYMBOL: &str = "comp_z80_size";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// 0 when no driver segment was compressed.
    pub compressed_length: u32,
}

impl BuildReport {
    pub fn new(compressed_length: u32) -> Self {
        Self { compressed_length }
    }

    pub fn has_compressed_driver(&self) -> bool {
        self.compressed_length > 0
    }

    /// `#define <symbol> 0x<HEX>`, or `None` if there is nothing to report.
    pub fn define_line(&self, symbol: &str) -> Option<String> {
        self.has_compressed_driver()
            .then(|| format!("#define {symbol} 0x{:X}", self.compressed_length))
    }
}

/// Text file that receives the define line, opened in append mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFile {
    pub path: PathBuf,
    pub symbol: String,
}

impl ShareFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            symbol: DEFAULT_SYMBOL.to_string(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the report line. Returns `false` (and leaves the file alone)
    /// when there is no compressed driver.
    pub fn append(&self, report: &BuildReport) -> io::Result<bool> {
        let Some(line) = report.define_line(&self.symbol) else {
            return Ok(false);
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(true)
    }
}
