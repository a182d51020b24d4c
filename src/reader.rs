use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::mdcrd::MdcrdReader;
use crate::xyz::XyzReader;
use crate::Frame;

/// A trajectory that can be read one frame at a time, in any order.
///
/// Reads take `&self`. A source never keeps a read cursor of its own, so any number of iterations
/// can read from the same source at the same time without disturbing each other.
pub trait FrameSource: Send + Sync {
    /// The path of the backing file.
    fn path(&self) -> &Path;

    /// The number of atoms in every frame.
    fn natoms(&self) -> usize;

    /// The number of complete frames that can be read.
    fn frame_count(&self) -> usize;

    /// Read the frame at `index` into `frame`.
    ///
    /// The frame is resized to [`FrameSource::natoms`] if necessary. An `index` that is not
    /// smaller than [`FrameSource::frame_count`] is a [`Error::Range`].
    fn read_frame(&self, index: usize, frame: &mut Frame) -> Result<()>;

    /// Read up to `count` consecutive frames starting at `start`, appending them to `frames`.
    ///
    /// Returns the number of frames that were read, which is only smaller than `count` when the
    /// end of the source is reached.
    fn read_chunk(&self, start: usize, count: usize, frames: &mut Vec<Frame>) -> Result<usize> {
        if start > self.frame_count() {
            return Err(out_of_range(self.path(), start, self.frame_count()));
        }
        let stop = start.saturating_add(count).min(self.frame_count());
        frames.reserve(stop - start);
        for index in start..stop {
            let mut frame = Frame::new(self.natoms());
            self.read_frame(index, &mut frame)?;
            frames.push(frame);
        }
        Ok(stop - start)
    }
}

/// Open a trajectory file, choosing the reader by its extension.
///
/// - `.xyz`: extended XYZ.
/// - `.crd`, `.mdcrd`, `.x`, `.trj`: Amber ASCII trajectories. These do not store their own
///   atom count, so `natoms` must be given.
pub fn open_source(path: impl AsRef<Path>, natoms: usize) -> Result<Box<dyn FrameSource>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let source: Box<dyn FrameSource> = match extension.as_deref() {
        Some("xyz") => Box::new(XyzReader::open(path)?),
        Some("crd" | "mdcrd" | "x" | "trj") => Box::new(MdcrdReader::open(path, natoms)?),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "cannot tell the trajectory format of '{}' from its extension",
                path.display()
            )))
        }
    };
    log::info!(
        "opened '{}' with {} frames of {} atoms",
        path.display(),
        source.frame_count(),
        source.natoms()
    );
    Ok(source)
}

pub(crate) fn out_of_range(path: &Path, index: usize, frame_count: usize) -> Error {
    Error::Range(format!(
        "frame {index} lies beyond the {frame_count} frames of '{}'",
        path.display()
    ))
}

/// A read-only memory map of a whole file.
#[derive(Debug)]
pub(crate) struct MappedFile {
    path: PathBuf,
    mmap: Mmap,
}

impl MappedFile {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::io(path, err))?;
        // The map is only ever read. Changing the file underneath a running iteration is not
        // supported.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|err| Error::io(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Lines starting at byte `offset`, which is on line `line`.
    pub(crate) fn lines_from(&self, offset: usize, line: usize) -> Lines<'_> {
        Lines {
            bytes: self.bytes(),
            pos: offset,
            line,
        }
    }

    pub(crate) fn format_error(&self, line: usize, message: impl Into<String>) -> Error {
        Error::format(&self.path, line, message)
    }
}

/// A cursor over the lines of a byte slice.
///
/// Line terminators (`\n` or `\r\n`) are stripped.
#[derive(Clone)]
pub(crate) struct Lines<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lines<'a> {
    /// The byte offset of the next line.
    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    /// The one-based number of the next line.
    pub(crate) fn line(&self) -> usize {
        self.line
    }

    /// Whether the remainder consists of nothing but whitespace.
    pub(crate) fn rest_is_blank(&self) -> bool {
        self.bytes[self.pos..].iter().all(u8::is_ascii_whitespace)
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let rest = &self.bytes[self.pos..];
        let (line, advance) = match memchr::memchr(b'\n', rest) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        self.line += 1;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }
}
