use std::fmt;
use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fanout::{tee, Slice, Tee};
use crate::pipeline::{Pipeline, RmsFit};
use crate::reader::{open_source, FrameSource};
use crate::selection::{resolve_frame_slices, FrameRange, FrameSlices, Mask, ResolvedRange};
use crate::source::SourceSequence;
use crate::{Frame, Topology, Trajectory};

/// One or more trajectory files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filenames {
    Single(PathBuf),
    List(Vec<PathBuf>),
}

impl Filenames {
    fn into_paths(self) -> Vec<PathBuf> {
        match self {
            Filenames::Single(path) => vec![path],
            Filenames::List(paths) => paths,
        }
    }
}

impl From<&str> for Filenames {
    fn from(path: &str) -> Self {
        Self::Single(path.into())
    }
}

impl From<String> for Filenames {
    fn from(path: String) -> Self {
        Self::Single(path.into())
    }
}

impl From<&Path> for Filenames {
    fn from(path: &Path) -> Self {
        Self::Single(path.to_path_buf())
    }
}

impl From<PathBuf> for Filenames {
    fn from(path: PathBuf) -> Self {
        Self::Single(path)
    }
}

impl From<&PathBuf> for Filenames {
    fn from(path: &PathBuf) -> Self {
        Self::Single(path.clone())
    }
}

impl<P: AsRef<Path>> From<Vec<P>> for Filenames {
    fn from(paths: Vec<P>) -> Self {
        Self::List(paths.iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

impl<P: AsRef<Path>> From<&[P]> for Filenames {
    fn from(paths: &[P]) -> Self {
        Self::List(paths.iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

impl<P: AsRef<Path>, const N: usize> From<[P; N]> for Filenames {
    fn from(paths: [P; N]) -> Self {
        Self::List(paths.iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

/// Parameters for [`TrajectoryIterator::frame_iter`].
#[derive(Debug, Clone, Default)]
pub struct FrameIterOptions {
    /// The logical frames to visit.
    pub range: FrameRange,
    /// Only return these atoms.
    pub mask: Option<Mask>,
    /// Re-image every frame into its periodic box.
    pub autoimage: bool,
    /// Superpose every frame onto a reference.
    pub rmsfit: Option<RmsFit>,
}

impl FrameIterOptions {
    pub fn with_range(mut self, range: FrameRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_mask(mut self, mask: impl Into<Mask>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn with_autoimage(mut self, autoimage: bool) -> Self {
        self.autoimage = autoimage;
        self
    }

    pub fn with_rmsfit(mut self, reference: Frame, mask: impl Into<Mask>) -> Self {
        self.rmsfit = Some(RmsFit::new(reference, mask));
        self
    }
}

/// Parameters for [`TrajectoryIterator::chunk_iter`].
#[derive(Debug, Clone)]
pub struct ChunkIterOptions {
    /// The number of frames per chunk. The last chunk may be shorter.
    pub chunk: usize,
    pub start: usize,
    /// Exclusive. Runs through the last frame if [`None`].
    pub stop: Option<usize>,
    pub autoimage: bool,
    pub rmsfit: Option<RmsFit>,
    /// Give every chunk its own copy of the topology instead of sharing the one of the iterator.
    pub copy_top: bool,
}

impl Default for ChunkIterOptions {
    fn default() -> Self {
        Self {
            chunk: 2,
            start: 0,
            stop: None,
            autoimage: false,
            rmsfit: None,
            copy_top: false,
        }
    }
}

impl ChunkIterOptions {
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn with_stop(mut self, stop: usize) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_autoimage(mut self, autoimage: bool) -> Self {
        self.autoimage = autoimage;
        self
    }

    pub fn with_rmsfit(mut self, reference: Frame, mask: impl Into<Mask>) -> Self {
        self.rmsfit = Some(RmsFit::new(reference, mask));
        self
    }

    pub fn with_copy_top(mut self, copy_top: bool) -> Self {
        self.copy_top = copy_top;
        self
    }
}

/// A source together with the range of its frames that belongs to the trajectory.
struct LoadedSource {
    source: Box<dyn FrameSource>,
    range: ResolvedRange,
}

/// A lazily read trajectory, stitched together from one or more files.
///
/// The frames of all loaded files, each restricted to its own frame range, form one logical
/// sequence of frames. Nothing is read until frames are iterated over. The files stay open for as
/// long as the iterator lives, and any number of iterations can run over them at once.
pub struct TrajectoryIterator {
    topology: Arc<Topology>,
    sources: Vec<LoadedSource>,
}

impl TrajectoryIterator {
    /// Create an iterator without any frames.
    pub fn new(topology: impl Into<Arc<Topology>>) -> Self {
        Self {
            topology: topology.into(),
            sources: Vec::new(),
        }
    }

    /// Create an iterator over one or more files.
    pub fn open(
        filenames: impl Into<Filenames>,
        topology: impl Into<Arc<Topology>>,
        slices: impl Into<FrameSlices>,
    ) -> Result<Self> {
        let mut trajectory = Self::new(topology);
        trajectory.load(filenames, slices)?;
        Ok(trajectory)
    }

    /// Append the frames of one or more files.
    ///
    /// `slices` holds either one range for all files or one range per file. A shorter list of
    /// ranges is padded with its last range, and a longer one is cut off. The files are appended
    /// in the order they are given. If any of them cannot be loaded, none of them are.
    pub fn load(
        &mut self,
        filenames: impl Into<Filenames>,
        slices: impl Into<FrameSlices>,
    ) -> Result<()> {
        let paths = filenames.into().into_paths();
        if paths.is_empty() {
            return Err(Error::InvalidArgument(
                "no trajectory files were given".to_string(),
            ));
        }
        let ranges = resolve_frame_slices(paths.len(), &slices.into())?;

        let mut loaded = Vec::with_capacity(paths.len());
        for (path, range) in paths.iter().zip(ranges) {
            let source = open_source(path, self.n_atoms())?;
            loaded.push(self.check_source(source, range)?);
        }
        self.sources.extend(loaded);
        Ok(())
    }

    /// Append the frames of an already opened source.
    pub fn load_source(&mut self, source: Box<dyn FrameSource>, range: FrameRange) -> Result<()> {
        let loaded = self.check_source(source, range)?;
        self.sources.push(loaded);
        Ok(())
    }

    fn check_source(
        &self,
        source: Box<dyn FrameSource>,
        range: FrameRange,
    ) -> Result<LoadedSource> {
        // A source without frames has nothing to say about its atoms.
        if source.frame_count() > 0 && source.natoms() != self.n_atoms() {
            return Err(Error::ShapeMismatch(format!(
                "'{}' has {} atoms, but the topology has {}",
                source.path().display(),
                source.natoms(),
                self.n_atoms()
            )));
        }
        let range = SourceSequence::open(source.as_ref(), range)?.range();
        log::info!(
            "loaded {} of the {} frames in '{}'",
            range.count(),
            source.frame_count(),
            source.path().display()
        );
        Ok(LoadedSource { source, range })
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Replace the topology. Once files are loaded, the new topology must have the same number
    /// of atoms.
    pub fn set_topology(&mut self, topology: impl Into<Arc<Topology>>) -> Result<()> {
        let topology = topology.into();
        if !self.sources.is_empty() && topology.natoms() != self.n_atoms() {
            return Err(Error::ShapeMismatch(format!(
                "cannot replace a topology of {} atoms with one of {} atoms",
                self.n_atoms(),
                topology.natoms()
            )));
        }
        self.topology = topology;
        Ok(())
    }

    /// The number of logical frames.
    pub fn n_frames(&self) -> usize {
        self.sources.iter().map(|loaded| loaded.range.count()).sum()
    }

    /// The number of atoms per frame, as given by the topology.
    pub fn n_atoms(&self) -> usize {
        self.topology.natoms()
    }

    /// `(n_frames, n_atoms, 3)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_frames(), self.n_atoms(), 3)
    }

    pub fn is_empty(&self) -> bool {
        self.n_frames() == 0
    }

    /// The number of frames a full iteration produces.
    pub fn max_frames(&self) -> usize {
        self.n_frames()
    }

    /// The path of the first loaded file.
    pub fn filename(&self) -> Option<&Path> {
        self.sources.first().map(|loaded| loaded.source.path())
    }

    pub fn filenames(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .map(|loaded| loaded.source.path())
            .collect()
    }

    /// Read the logical frame at `index`, without any transformation.
    pub fn get_frame(&self, index: usize) -> Result<Frame> {
        if index >= self.n_frames() {
            return Err(Error::Range(format!(
                "frame {index} lies beyond the {} frames of the trajectory",
                self.n_frames()
            )));
        }
        let range = ResolvedRange {
            start: index,
            stop: index + 1,
            stride: 1,
        };
        match Cursor::new(&self.sources, range).next_frame() {
            Some(frame) => frame,
            None => Err(Error::Range(format!("frame {index} could not be located"))),
        }
    }

    /// Iterate over the frames without any transformation.
    fn raw_iter(&self) -> FrameIter<'_> {
        let range = ResolvedRange {
            start: 0,
            stop: self.n_frames(),
            stride: 1,
        };
        FrameIter {
            cursor: Cursor::new(&self.sources, range),
            pipeline: Pipeline::identity(Arc::clone(&self.topology)),
            fused: false,
        }
    }

    /// Iterate over the frames in `options.range`, transforming each according to `options`.
    ///
    /// Every call starts a new, independent pass over the files.
    pub fn frame_iter(&self, options: FrameIterOptions) -> Result<FrameIter<'_>> {
        let range = options.range.resolve(self.n_frames())?;
        let pipeline = Pipeline::new(
            Arc::clone(&self.topology),
            options.autoimage,
            options.rmsfit.as_ref(),
            options.mask.as_ref(),
        )?;
        log::debug!("iterating over {} frames of {:?}", range.count(), range);
        Ok(FrameIter {
            cursor: Cursor::new(&self.sources, range),
            pipeline,
            fused: false,
        })
    }

    /// Iterate over the frames in chunks of `options.chunk` frames.
    ///
    /// The frames of every chunk are re-imaged and superposed in exactly the same way as by
    /// [`TrajectoryIterator::frame_iter`].
    pub fn chunk_iter(&self, options: ChunkIterOptions) -> Result<ChunkIter<'_>> {
        if options.chunk == 0 {
            return Err(Error::InvalidArgument(
                "chunks must hold at least one frame".to_string(),
            ));
        }
        let range = FrameRange::new(Some(options.start), options.stop, None);
        let range = range.resolve(self.n_frames())?;
        let pipeline = Pipeline::new(
            Arc::clone(&self.topology),
            options.autoimage,
            options.rmsfit.as_ref(),
            None,
        )?;
        log::debug!(
            "iterating over {} frames of {:?} in chunks of {}",
            range.count(),
            range,
            options.chunk
        );
        Ok(ChunkIter {
            cursor: Cursor::new(&self.sources, range),
            chunk: options.chunk,
            copy_top: options.copy_top,
            topology: Arc::clone(&self.topology),
            pipeline,
            fused: false,
        })
    }

    /// A view of the untransformed frames from `start` up to `stop` in steps of `stride`.
    ///
    /// Frames that are stepped over are never read.
    pub fn iterator_slice(
        &self,
        start: usize,
        stop: Option<usize>,
        stride: NonZeroUsize,
    ) -> Slice<FrameIter<'_>> {
        Slice::new(self.raw_iter(), start, stop, stride)
    }

    /// `n` iterators that each produce all untransformed frames, sharing a single pass over the
    /// files.
    pub fn make_independent_iterators(&self, n: usize) -> Vec<Tee<FrameIter<'_>>> {
        tee(self.raw_iter(), n)
    }

    /// Read all frames into memory.
    pub fn to_mutable_trajectory(&self) -> Result<Trajectory> {
        let frames = self.raw_iter().collect::<Result<Vec<_>>>()?;
        Ok(Trajectory::from_parts(Arc::clone(&self.topology), frames))
    }
}

impl fmt::Debug for TrajectoryIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrajectoryIterator")
            .field("filenames", &self.filenames())
            .field("shape", &self.shape())
            .finish()
    }
}

impl<'a> IntoIterator for &'a TrajectoryIterator {
    type Item = Result<Frame>;
    type IntoIter = FrameIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.raw_iter()
    }
}

/// The read position of one iteration over the logical frames of a [`TrajectoryIterator`].
///
/// The logical frame `next` is frame `next - base` of the range of the source at `file`.
/// `current` reads the frames of that source which belong to this iteration.
struct Cursor<'a> {
    sources: &'a [LoadedSource],
    next: usize,
    stop: usize,
    stride: usize,
    file: usize,
    base: usize,
    current: Option<SourceSequence<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(sources: &'a [LoadedSource], range: ResolvedRange) -> Self {
        Self {
            sources,
            next: range.start,
            stop: range.stop,
            stride: range.stride,
            file: 0,
            base: 0,
            current: None,
        }
    }

    fn remaining(&self) -> usize {
        ResolvedRange {
            start: self.next.min(self.stop),
            stop: self.stop,
            stride: self.stride,
        }
        .count()
    }

    /// The sequence that holds the next logical frame, if there is one.
    fn sequence(&mut self) -> Option<&mut SourceSequence<'a>> {
        if self.current.as_ref().is_some_and(|current| current.len() > 0) {
            return self.current.as_mut();
        }
        if self.next >= self.stop {
            return None;
        }
        while self.next >= self.base + self.sources.get(self.file)?.range.count() {
            self.base += self.sources[self.file].range.count();
            self.file += 1;
        }

        let sources = self.sources;
        let loaded = &sources[self.file];
        let range = loaded.range;
        let first = self.next - self.base;
        let end = range.count().min(self.stop - self.base);
        let in_file = ResolvedRange {
            start: range.index(first),
            stop: range.index(end - 1) + 1,
            stride: range.stride.saturating_mul(self.stride),
        };
        log::debug!(
            "reading frames {in_file:?} of '{}'",
            loaded.source.path().display()
        );
        self.current = Some(SourceSequence::resolved(loaded.source.as_ref(), in_file));
        self.current.as_mut()
    }

    fn next_frame(&mut self) -> Option<Result<Frame>> {
        let stride = self.stride;
        let frame = self.sequence()?.next()?;
        self.next += stride;
        Some(frame)
    }

    /// Read up to `max` frames into `frames`, crossing into the next files where necessary.
    fn read_into(&mut self, max: usize, frames: &mut Vec<Frame>) -> Result<usize> {
        let stride = self.stride;
        let mut total = 0;
        while total < max {
            let Some(sequence) = self.sequence() else {
                break;
            };
            let read = sequence.read_into(max - total, frames);
            let read = read.inspect_err(|_| self.next = self.stop)?;
            if read == 0 {
                break;
            }
            self.next += read * stride;
            total += read;
        }
        Ok(total)
    }

    /// Pass over `n` frames without reading them.
    fn skip(&mut self, n: usize) {
        let skipped = n.min(self.remaining());
        if skipped == 0 {
            return;
        }
        self.next += skipped * self.stride;
        if let Some(current) = &mut self.current {
            if current.skip_frames(skipped) < skipped {
                // The skip reaches into a later file, which `sequence` will locate.
                self.current = None;
            }
        }
    }
}

/// An iterator over the frames of a [`TrajectoryIterator`], created by
/// [`TrajectoryIterator::frame_iter`].
///
/// Produces one frame per call to `next`, reading it and running it through the transformation
/// pipeline. The first error ends the iteration.
pub struct FrameIter<'a> {
    cursor: Cursor<'a>,
    pipeline: Pipeline,
    fused: bool,
}

impl FrameIter<'_> {
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let frame = self
            .cursor
            .next_frame()?
            .and_then(|frame| self.pipeline.apply(frame));
        self.fused = frame.is_err();
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.fused { 0 } else { self.cursor.remaining() };
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        self.cursor.skip(n);
        self.next()
    }
}

impl ExactSizeIterator for FrameIter<'_> {}

impl FusedIterator for FrameIter<'_> {}

/// An iterator over chunks of frames of a [`TrajectoryIterator`], created by
/// [`TrajectoryIterator::chunk_iter`].
pub struct ChunkIter<'a> {
    cursor: Cursor<'a>,
    chunk: usize,
    copy_top: bool,
    topology: Arc<Topology>,
    pipeline: Pipeline,
    fused: bool,
}

impl ChunkIter<'_> {
    fn next_chunk(&mut self) -> Result<Option<Trajectory>> {
        let mut frames = Vec::with_capacity(self.chunk.min(self.cursor.remaining()));
        if self.cursor.read_into(self.chunk, &mut frames)? == 0 {
            return Ok(None);
        }
        let topology = if self.copy_top {
            Arc::new(Topology::clone(&self.topology))
        } else {
            Arc::clone(&self.topology)
        };
        let mut chunk = Trajectory::from_parts(topology, frames);
        self.pipeline.transform_chunk(&mut chunk)?;
        log::debug!("assembled a chunk of {} frames", chunk.n_frames());
        Ok(Some(chunk))
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = Result<Trajectory>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let chunk = self.next_chunk().transpose()?;
        self.fused = chunk.is_err();
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.fused {
            0
        } else {
            self.cursor.remaining().div_ceil(self.chunk)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIter<'_> {}

impl FusedIterator for ChunkIter<'_> {}
