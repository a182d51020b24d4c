use std::num::{NonZeroUsize, ParseIntError};
use std::str::FromStr;

use crate::error::{Error, Result};

/// A resolved selection of atoms.
///
/// The indices are unique and sorted in ascending order. A selection is only meaningful for the
/// topology it was resolved against, and every index is checked against the atom count of the
/// frame it is applied to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AtomSelection {
    indices: Vec<usize>,
}

impl AtomSelection {
    /// Select all `natoms` atoms.
    pub fn all(natoms: usize) -> Self {
        Self {
            indices: (0..natoms).collect(),
        }
    }

    /// Create a selection from a list of indices. Duplicates are removed and the order is
    /// normalized.
    pub fn from_index_list(indices: &[usize]) -> Self {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    /// Create a selection from a boolean mask.
    ///
    /// If the value of the mask at an index `n` is `true`, the atom at that same index `n` is
    /// included in the selection.
    pub fn from_mask(mask: &[bool]) -> Self {
        let indices = mask
            .iter()
            .enumerate()
            .filter_map(|(idx, &include)| include.then_some(idx))
            .collect();
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    /// Returns whether every index in this selection refers to one of `natoms` atoms.
    pub fn fits(&self, natoms: usize) -> bool {
        self.indices.last().map_or(true, |&last| last < natoms)
    }
}

/// A mask as it is handed in by a caller, before it is resolved against a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mask {
    /// A mask expression, such as `@CA` or `:1-10&!@H*`.
    Selector(String),
    /// An explicit list of zero-based atom indices.
    Indices(Vec<usize>),
}

impl From<&str> for Mask {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for Mask {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<Vec<usize>> for Mask {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}

impl From<&[usize]> for Mask {
    fn from(indices: &[usize]) -> Self {
        Self::Indices(indices.to_vec())
    }
}

impl From<&AtomSelection> for Mask {
    fn from(selection: &AtomSelection) -> Self {
        Self::Indices(selection.indices.clone())
    }
}

/// A range of frames to be read from a source.
///
/// The `start` of a [`FrameRange`] is always bounded, and is zero by default.
/// The `stop` may be bounded or unbounded. In case it is unbounded ([`None`]), the range runs up
/// to and including the last frame. If it is bounded by [`Some`] value, it is an exclusive bound.
/// The `stride` describes the number of frames that pass in each step. The number of skipped
/// frames is equal to `stride` - 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: usize,
    pub stop: Option<usize>,
    pub stride: NonZeroUsize,
}

impl FrameRange {
    pub fn new(start: Option<usize>, stop: Option<usize>, stride: Option<NonZeroUsize>) -> Self {
        let mut range = Self {
            stop,
            ..Self::default()
        };
        if let Some(start) = start {
            range.start = start;
        }
        if let Some(stride) = stride {
            range.stride = stride;
        }
        range
    }

    /// Create a range from a `(start, stop, stride)` triple where a `stop` of -1 stands for
    /// "through the last frame".
    pub fn from_slice(start: usize, stop: isize, stride: usize) -> Result<Self> {
        let stop = match stop {
            -1 => None,
            stop if stop < 0 => {
                return Err(Error::Range(format!(
                    "stop must be -1 or non-negative, found {stop}"
                )))
            }
            stop => Some(stop as usize),
        };
        let stride = NonZeroUsize::new(stride)
            .ok_or_else(|| Error::Range("stride must be at least 1".to_string()))?;
        Ok(Self {
            start,
            stop,
            stride,
        })
    }

    /// Resolve this range against the `nframes` that are actually available.
    ///
    /// A `start` or `stop` beyond `nframes` is an error. A `start` at or past the `stop` is
    /// valid and produces an empty range.
    pub fn resolve(&self, nframes: usize) -> Result<ResolvedRange> {
        let stop = self.stop.unwrap_or(nframes);
        if self.start > nframes {
            return Err(Error::Range(format!(
                "start {} lies beyond the {nframes} available frames",
                self.start
            )));
        }
        if stop > nframes {
            return Err(Error::Range(format!(
                "stop {stop} lies beyond the {nframes} available frames"
            )));
        }
        Ok(ResolvedRange {
            start: self.start,
            stop: stop.max(self.start),
            stride: self.stride.get(),
        })
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self {
            start: 0,
            stop: None,
            stride: NonZeroUsize::MIN,
        }
    }
}

/// Parse a range in the format `start:stop:stride`. Each of these values is optional.
///
/// - `:100` selects the first 100 frames.
/// - `3:14` selects the 4th up to and including the 14th frame, 11 frames in total.
/// - `:100:2` selects every second frame from the first 100 frames, 50 in total.
impl FromStr for FrameRange {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        fn component<T: FromStr<Err = ParseIntError>>(
            c: Option<&str>,
        ) -> std::result::Result<Option<T>, ParseIntError> {
            c.filter(|s| !s.is_empty()).map(str::parse).transpose()
        }

        let mut components = s.split(':');
        let start = component(components.next())?;
        let stop = component(components.next())?;
        let stride = component(components.next())?;
        Ok(Self::new(start, stop, stride))
    }
}

/// A [`FrameRange`] that has been checked against the number of frames in a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: usize,
    /// Exclusive, and never smaller than `start`.
    pub stop: usize,
    pub stride: usize,
}

impl ResolvedRange {
    /// The number of frames in this range.
    pub fn count(&self) -> usize {
        if self.stop > self.start {
            (self.stop - self.start - 1) / self.stride + 1
        } else {
            0
        }
    }

    /// The frame index of the `n`th frame in this range.
    pub fn index(&self, n: usize) -> usize {
        self.start + n * self.stride
    }
}

/// The frame ranges that are requested for a set of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSlices {
    /// The same range for every file.
    Shared(FrameRange),
    /// One range per file, in file order.
    PerFile(Vec<FrameRange>),
}

impl Default for FrameSlices {
    fn default() -> Self {
        Self::Shared(FrameRange::default())
    }
}

impl From<FrameRange> for FrameSlices {
    fn from(range: FrameRange) -> Self {
        Self::Shared(range)
    }
}

impl From<Vec<FrameRange>> for FrameSlices {
    fn from(ranges: Vec<FrameRange>) -> Self {
        Self::PerFile(ranges)
    }
}

/// Produce exactly one [`FrameRange`] for each of `nfiles` files.
///
/// A shared range is repeated for every file. A per-file list that is shorter than `nfiles` is
/// padded by repeating its last element, and a longer list is truncated. An empty per-file list
/// is an error.
pub fn resolve_frame_slices(nfiles: usize, slices: &FrameSlices) -> Result<Vec<FrameRange>> {
    match slices {
        FrameSlices::Shared(range) => Ok(vec![*range; nfiles]),
        FrameSlices::PerFile(ranges) => {
            let Some(&last) = ranges.last() else {
                return Err(Error::Range(
                    "at least one frame range must be given".to_string(),
                ));
            };
            if ranges.len() < nfiles {
                log::debug!(
                    "padding {} frame ranges to {nfiles} files with {last:?}",
                    ranges.len()
                );
            } else if ranges.len() > nfiles {
                log::warn!(
                    "{} frame ranges were given for {nfiles} files, ignoring the surplus",
                    ranges.len()
                );
            }
            let mut resolved: Vec<_> = ranges.iter().copied().take(nfiles).collect();
            resolved.resize(nfiles, last);
            Ok(resolved)
        }
    }
}
