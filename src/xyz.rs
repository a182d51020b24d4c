//! Extended XYZ trajectories.
//!
//! Every frame consists of a line with the number of atoms, a comment line, and one line per atom
//! with its name followed by its x, y and z coordinates. A comment of the form
//! `Lattice="ax ay az bx by bz cx cy cz"` carries the three box vectors of the frame.

use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::reader::{out_of_range, FrameSource, MappedFile};
use crate::{BoxVec, Frame};

const LATTICE_KEY: &[u8] = b"Lattice=\"";

#[derive(Debug, Clone, Copy)]
struct FrameOffset {
    offset: usize,
    line: usize,
}

/// A memory-mapped extended XYZ trajectory.
#[derive(Debug)]
pub struct XyzReader {
    file: MappedFile,
    natoms: usize,
    frames: Vec<FrameOffset>,
}

impl XyzReader {
    /// Open the file at `path` and index the start of every frame.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = MappedFile::open(path.as_ref())?;
        let (natoms, frames) = index_frames(&file)?;
        Ok(Self {
            file,
            natoms,
            frames,
        })
    }
}

fn parse_count(line: &[u8]) -> Option<usize> {
    std::str::from_utf8(line).ok()?.trim().parse().ok()
}

fn index_frames(file: &MappedFile) -> Result<(usize, Vec<FrameOffset>)> {
    let mut lines = file.lines_from(0, 1);
    let mut natoms = None;
    let mut frames = Vec::new();
    loop {
        let (offset, line) = (lines.offset(), lines.line());
        let Some(header) = lines.next() else {
            break;
        };
        if header.iter().all(u8::is_ascii_whitespace) {
            if lines.rest_is_blank() {
                break;
            }
            return Err(file.format_error(line, "blank line between frames"));
        }

        let count = parse_count(header)
            .ok_or_else(|| file.format_error(line, "expected the number of atoms in the frame"))?;
        match natoms {
            None => natoms = Some(count),
            Some(natoms) if natoms != count => {
                return Err(file.format_error(
                    line,
                    format!("frame {} has {count} atoms instead of {natoms}", frames.len()),
                ))
            }
            Some(_) => {}
        }

        // The comment line and the atom lines.
        let nlines = count + 1;
        if lines.by_ref().take(nlines).count() < nlines {
            log::warn!(
                "ignoring the truncated frame {} at the end of '{}'",
                frames.len(),
                file.path().display()
            );
            break;
        }
        frames.push(FrameOffset { offset, line });
    }
    Ok((natoms.unwrap_or(0), frames))
}

fn parse_lattice(comment: &[u8]) -> std::result::Result<Option<BoxVec>, String> {
    let Some(start) = memchr::memmem::find(comment, LATTICE_KEY) else {
        return Ok(None);
    };
    let rest = &comment[start + LATTICE_KEY.len()..];
    let end = memchr::memchr(b'"', rest).ok_or("unterminated lattice")?;
    let text = std::str::from_utf8(&rest[..end]).map_err(|err| err.to_string())?;

    let mut cols = [0.0; 9];
    let mut values = text.split_ascii_whitespace();
    for col in &mut cols {
        *col = values
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or("expected nine lattice values")?;
    }
    if values.next().is_some() {
        return Err("expected nine lattice values".to_string());
    }
    Ok(Some(BoxVec::from_cols_array(&cols)))
}

impl FrameSource for XyzReader {
    fn path(&self) -> &Path {
        self.file.path()
    }

    fn natoms(&self) -> usize {
        self.natoms
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn read_frame(&self, index: usize, frame: &mut Frame) -> Result<()> {
        let start = self
            .frames
            .get(index)
            .ok_or_else(|| out_of_range(self.path(), index, self.frame_count()))?;
        let mut lines = self.file.lines_from(start.offset, start.line);
        lines.next();

        let comment_line = lines.line();
        let comment = lines.next().unwrap_or_default();
        frame.boxvec =
            parse_lattice(comment).map_err(|msg| self.file.format_error(comment_line, msg))?;

        frame.resize(self.natoms);
        for position in frame.positions_mut().chunks_exact_mut(3) {
            let line = lines.line();
            let bad_atom =
                || self.file.format_error(line, "expected an atom name and three coordinates");
            let text = lines.next().ok_or_else(bad_atom)?;
            let text = std::str::from_utf8(text).map_err(|_| bad_atom())?;
            let mut fields = text.split_ascii_whitespace().skip(1);
            for value in position {
                *value = fields
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(bad_atom)?;
            }
        }
        Ok(())
    }
}

/// Writes frames as an extended XYZ trajectory.
pub struct XyzWriter<W: Write> {
    writer: W,
    names: Vec<String>,
}

impl<W: Write> XyzWriter<W> {
    /// Create a writer for frames whose atoms carry the given `names`.
    pub fn new(writer: W, names: Vec<String>) -> Self {
        Self { writer, names }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        if frame.natoms() != self.names.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot write a frame of {} atoms with {} atom names",
                    frame.natoms(),
                    self.names.len()
                ),
            ));
        }

        writeln!(self.writer, "{}", frame.natoms())?;
        match frame.boxvec {
            Some(boxvec) => {
                let cols = boxvec.to_cols_array().map(|v| v.to_string());
                writeln!(self.writer, "Lattice=\"{}\"", cols.join(" "))?;
            }
            None => writeln!(self.writer)?,
        }
        for (name, coord) in self.names.iter().zip(frame.coords()) {
            writeln!(self.writer, "{name} {} {} {}", coord.x, coord.y, coord.z)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
