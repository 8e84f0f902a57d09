// File-level driver for ROM builds.
//
// Opens the input, creates the output, runs `build_rom`, and deletes the
// output again if the build fails so that no half-written ROM survives.
// Optionally computes a SHA-256 of the image (feature-gated behind
// `file-io`).

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::build::{self, BuildError, BuildOptions, Warning};
use crate::placement::PlacedSegment;
use crate::report::ShareFile;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `build_file()`.
#[derive(Debug, Clone)]
pub struct BuildStats {
    /// Input object file size in bytes.
    pub input_size: u64,
    /// Written image size in bytes.
    pub image_size: u64,
    /// Compressed driver size (0 if none).
    pub compressed_length: u32,
    /// Codec used for the driver.
    pub codec: &'static str,
    /// Whether the share file received a line.
    pub share_updated: bool,
    pub warnings: Vec<Warning>,
    pub segments: Vec<PlacedSegment>,
    /// SHA-256 of the image (if `file-io` feature is enabled).
    pub image_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("failed to load file '{}': {source}", .path.display())]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("failed to access file '{}': {source}", .path.display())]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error("failed to write '{}': {source}", .path.display())]
    WriteOutput { path: PathBuf, source: io::Error },

    #[error("failed to update share file '{}': {source}", .path.display())]
    Share { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Build(#[from] BuildError),
}

// ---------------------------------------------------------------------------
// build_file
// ---------------------------------------------------------------------------

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("could not remove '{}': {e}", path.display());
    }
}

/// Build `output_path` from the object file at `input_path`.
///
/// The input is streamed through a `BufReader`; the image is assembled in
/// memory and written in one go. If `share` is given and a driver segment
/// was compressed, its size is appended to the share file.
pub fn build_file(
    input_path: &Path,
    output_path: &Path,
    share: Option<&ShareFile>,
    opts: &BuildOptions,
) -> Result<BuildStats, IoError> {
    let input = File::open(input_path).map_err(|source| IoError::OpenInput {
        path: input_path.to_path_buf(),
        source,
    })?;
    let input_size = input.metadata().map(|m| m.len()).unwrap_or(0);

    let output = File::create(output_path).map_err(|source| IoError::CreateOutput {
        path: output_path.to_path_buf(),
        source,
    })?;

    let result = match build::build_rom(BufReader::with_capacity(BUF_SIZE, input), opts) {
        Ok(result) => result,
        Err(e) => {
            drop(output);
            discard(output_path);
            return Err(e.into());
        }
    };

    let mut writer = BufWriter::with_capacity(BUF_SIZE, output);
    if let Err(source) = writer.write_all(&result.image).and_then(|()| writer.flush()) {
        drop(writer);
        discard(output_path);
        return Err(IoError::WriteOutput {
            path: output_path.to_path_buf(),
            source,
        });
    }
    drop(writer);

    let report = result.report();
    let share_updated = match share {
        Some(share) => share.append(&report).map_err(|source| IoError::Share {
            path: share.path().to_path_buf(),
            source,
        })?,
        None => false,
    };

    #[cfg(feature = "file-io")]
    let image_sha256 = {
        use sha2::Digest;
        Some(sha2::Sha256::digest(&result.image).into())
    };
    #[cfg(not(feature = "file-io"))]
    let image_sha256: Option<[u8; 32]> = None;

    Ok(BuildStats {
        input_size,
        image_size: result.image.len() as u64,
        compressed_length: result.compressed_length,
        codec: opts.codec.name(),
        share_updated,
        warnings: result.warnings,
        segments: result.segments,
        image_sha256,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
