//! Amber ASCII trajectories (`.crd`, `.mdcrd`).
//!
//! After a title line, every frame holds `3 * natoms` coordinates in fields of eight characters,
//! ten to a line. Each frame may be followed by a box line with either the three box lengths or
//! the lengths and the three angles. The file itself does not record the number of atoms.

use std::path::Path;

use glam::Vec3;

use crate::error::{Error, Result};
use crate::reader::{out_of_range, FrameSource, MappedFile};
use crate::{boxvec_from_lengths_angles, BoxVec, Frame};

const FIELD_WIDTH: usize = 8;
const FIELDS_PER_LINE: usize = 10;

#[derive(Debug, Clone, Copy)]
struct FrameOffset {
    offset: usize,
    line: usize,
}

/// A memory-mapped Amber ASCII trajectory.
#[derive(Debug)]
pub struct MdcrdReader {
    file: MappedFile,
    natoms: usize,
    /// The number of values on the box line following each frame, or zero without a box.
    box_values: usize,
    frames: Vec<FrameOffset>,
}

fn fields(line: &[u8]) -> std::slice::Chunks<'_, u8> {
    line.trim_ascii_end().chunks(FIELD_WIDTH)
}

fn parse_field(field: &[u8]) -> Option<f32> {
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

impl MdcrdReader {
    /// Open the file at `path` with frames of `natoms` atoms and index the start of every frame.
    ///
    /// Whether frames carry a box is decided from the line that follows the first frame. For
    /// trajectories of one or two atoms a box line cannot be told apart from the next frame, and
    /// is assumed to be absent.
    pub fn open(path: impl AsRef<Path>, natoms: usize) -> Result<Self> {
        let path = path.as_ref();
        if natoms == 0 {
            return Err(Error::InvalidArgument(format!(
                "cannot read '{}' with zero atoms per frame",
                path.display()
            )));
        }
        let file = MappedFile::open(path)?;
        let lines_per_frame = (3 * natoms).div_ceil(FIELDS_PER_LINE);

        let mut lines = file.lines_from(0, 1);
        // The title.
        lines.next();

        let mut probe = lines.clone();
        let box_values = if probe.by_ref().take(lines_per_frame).count() == lines_per_frame {
            let first_line_values = (3 * natoms).min(FIELDS_PER_LINE);
            match probe.next().filter(|line| !is_blank(line)).map(|l| fields(l).len()) {
                Some(n @ (3 | 6)) if n != first_line_values => n,
                _ => 0,
            }
        } else {
            0
        };
        let lines_per_record = lines_per_frame + usize::from(box_values > 0);

        let mut frames = Vec::new();
        loop {
            let (offset, line) = (lines.offset(), lines.line());
            let Some(first) = lines.next() else {
                break;
            };
            if is_blank(first) {
                if lines.rest_is_blank() {
                    break;
                }
                return Err(file.format_error(line, "blank line between frames"));
            }
            if lines.by_ref().take(lines_per_record - 1).count() < lines_per_record - 1 {
                log::warn!(
                    "ignoring the truncated frame {} at the end of '{}'",
                    frames.len(),
                    path.display()
                );
                break;
            }
            frames.push(FrameOffset { offset, line });
        }

        log::debug!(
            "indexed {} frames in '{}', box values per frame: {box_values}",
            frames.len(),
            path.display()
        );
        Ok(Self {
            file,
            natoms,
            box_values,
            frames,
        })
    }

    /// Whether the frames of this trajectory carry a periodic box.
    pub fn has_box(&self) -> bool {
        self.box_values > 0
    }
}

impl FrameSource for MdcrdReader {
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

        frame.resize(self.natoms);
        let mut values = frame.positions_mut().iter_mut();
        let mut remaining = values.len();
        while remaining > 0 {
            let line = lines.line();
            let text = lines
                .next()
                .ok_or_else(|| self.file.format_error(line, "unexpected end of frame"))?;
            for field in fields(text) {
                let value = values.next().ok_or_else(|| {
                    self.file
                        .format_error(line, "more coordinates than atoms in the frame")
                })?;
                *value = parse_field(field).ok_or_else(|| {
                    self.file.format_error(
                        line,
                        format!("bad coordinate '{}'", String::from_utf8_lossy(field).trim()),
                    )
                })?;
                remaining -= 1;
            }
            if text.trim_ascii_end().is_empty() {
                return Err(self.file.format_error(line, "blank line inside a frame"));
            }
        }

        frame.boxvec = if self.has_box() {
            let line = lines.line();
            let text = lines.next().unwrap_or_default();
            let bad_box = || self.file.format_error(line, "malformed box line");
            let values = fields(text)
                .map(parse_field)
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(bad_box)?;
            Some(match values[..] {
                [a, b, c] => BoxVec::from_diagonal(Vec3::new(a, b, c)),
                [a, b, c, alpha, beta, gamma] => {
                    boxvec_from_lengths_angles([a, b, c], [alpha, beta, gamma])
                }
                _ => return Err(bad_box()),
            })
        } else {
            None
        };
        Ok(())
    }
}
