use std::iter::FusedIterator;

use crate::error::Result;
use crate::reader::FrameSource;
use crate::selection::{FrameRange, ResolvedRange};
use crate::Frame;

/// A lazy sequence of the frames in one [`FrameSource`] that fall within a range.
///
/// Frames are produced in increasing order. The source is only read when the next frame is asked
/// for, and a sequence can be restarted to produce the same frames again.
pub struct SourceSequence<'a> {
    source: &'a dyn FrameSource,
    range: ResolvedRange,
    /// The position within `range` of the next frame.
    position: usize,
}

impl<'a> SourceSequence<'a> {
    /// Create a sequence over the frames of `source` within `range`.
    ///
    /// A range that reaches beyond the frames of the source is a [`crate::Error::Range`].
    pub fn open(source: &'a dyn FrameSource, range: FrameRange) -> Result<Self> {
        let resolved = range.resolve(source.frame_count()).map_err(|err| {
            log::debug!("cannot select {range:?} from '{}'", source.path().display());
            err
        })?;
        Ok(Self::resolved(source, resolved))
    }

    /// Create a sequence over a range that is already known to fit `source`.
    pub(crate) fn resolved(source: &'a dyn FrameSource, range: ResolvedRange) -> Self {
        Self {
            source,
            range,
            position: 0,
        }
    }

    pub fn range(&self) -> ResolvedRange {
        self.range
    }

    /// Start over at the first frame of the range.
    pub fn restart(&mut self) {
        self.position = 0;
    }

    /// Pass over up to `n` frames without reading them. Returns the number of frames skipped.
    pub fn skip_frames(&mut self, n: usize) -> usize {
        let skipped = n.min(self.len());
        self.position += skipped;
        skipped
    }

    /// Read up to `max` of the next frames, appending them to `frames`. Returns the number of
    /// frames that were read.
    ///
    /// Contiguous ranges are read as one chunk from the source.
    pub fn read_into(&mut self, max: usize, frames: &mut Vec<Frame>) -> Result<usize> {
        let count = max.min(self.len());
        if count == 0 {
            return Ok(0);
        }
        if self.range.stride == 1 {
            let start = self.range.index(self.position);
            let read = self.source.read_chunk(start, count, frames);
            // A failed read ends the sequence.
            let read = read.inspect_err(|_| self.position = self.range.count())?;
            self.position += read;
            return Ok(read);
        }
        for _ in 0..count {
            match self.next() {
                Some(frame) => frames.push(frame?),
                None => break,
            }
        }
        Ok(count)
    }
}

impl Iterator for SourceSequence<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.range.count() {
            return None;
        }
        let index = self.range.index(self.position);
        let mut frame = Frame::new(self.source.natoms());
        match self.source.read_frame(index, &mut frame) {
            Ok(()) => {
                self.position += 1;
                Some(Ok(frame))
            }
            Err(err) => {
                self.position = self.range.count();
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.range.count() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SourceSequence<'_> {}

impl FusedIterator for SourceSequence<'_> {}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::path::Path;

    use super::*;
    use crate::Error;

    /// Frames whose single atom sits at `(index, 0, 0)`. Reading `fail_at` fails.
    struct Counting {
        nframes: usize,
        fail_at: Option<usize>,
    }

    impl FrameSource for Counting {
        fn path(&self) -> &Path {
            Path::new("counting")
        }

        fn natoms(&self) -> usize {
            1
        }

        fn frame_count(&self) -> usize {
            self.nframes
        }

        fn read_frame(&self, index: usize, frame: &mut Frame) -> Result<()> {
            if Some(index) == self.fail_at {
                return Err(Error::format("counting", index, "unreadable"));
            }
            frame.positions_mut().copy_from_slice(&[index as f32, 0.0, 0.0]);
            Ok(())
        }
    }

    fn indices(frames: impl IntoIterator<Item = Result<Frame>>) -> Vec<usize> {
        frames
            .into_iter()
            .map(|frame| frame.unwrap().positions()[0] as usize)
            .collect()
    }

    fn range(start: usize, stop: Option<usize>, stride: usize) -> FrameRange {
        FrameRange::new(Some(start), stop, NonZeroUsize::new(stride))
    }

    #[test]
    fn strided() {
        let source = Counting { nframes: 10, fail_at: None };
        let sequence = SourceSequence::open(&source, range(1, Some(8), 3)).unwrap();
        assert_eq!(sequence.len(), 3);
        assert_eq!(indices(sequence), vec![1, 4, 7]);
    }

    #[test]
    fn restart() {
        let source = Counting { nframes: 5, fail_at: None };
        let mut sequence = SourceSequence::open(&source, FrameRange::default()).unwrap();
        let first = indices(sequence.by_ref());
        assert_eq!(sequence.next().map(|_| ()), None);
        sequence.restart();
        assert_eq!(indices(sequence), first);
    }

    #[test]
    fn out_of_bounds() {
        let source = Counting { nframes: 5, fail_at: None };
        assert!(matches!(
            SourceSequence::open(&source, range(6, None, 1)),
            Err(Error::Range(_))
        ));
        assert!(matches!(
            SourceSequence::open(&source, range(0, Some(6), 1)),
            Err(Error::Range(_))
        ));
        assert_eq!(
            SourceSequence::open(&source, range(5, None, 1)).unwrap().len(),
            0
        );
    }

    #[test]
    fn read_into() {
        let source = Counting { nframes: 10, fail_at: None };
        let mut frames = Vec::new();

        let mut contiguous = SourceSequence::open(&source, range(2, None, 1)).unwrap();
        assert_eq!(contiguous.read_into(5, &mut frames).unwrap(), 5);
        assert_eq!(contiguous.read_into(5, &mut frames).unwrap(), 3);
        assert_eq!(contiguous.read_into(5, &mut frames).unwrap(), 0);

        let mut strided = SourceSequence::open(&source, range(0, None, 4)).unwrap();
        assert_eq!(strided.read_into(5, &mut frames).unwrap(), 3);

        assert_eq!(
            indices(frames.into_iter().map(Ok)),
            vec![2, 3, 4, 5, 6, 7, 8, 9, 0, 4, 8]
        );
    }

    #[test]
    fn skip_frames() {
        let source = Counting { nframes: 10, fail_at: None };
        let mut sequence = SourceSequence::open(&source, range(0, None, 2)).unwrap();
        assert_eq!(sequence.skip_frames(2), 2);
        assert_eq!(indices(sequence.by_ref().take(1)), vec![4]);
        assert_eq!(sequence.skip_frames(10), 2);
        assert!(sequence.next().is_none());
    }

    #[test]
    fn error_ends_the_sequence() {
        let source = Counting { nframes: 10, fail_at: Some(3) };
        let mut sequence = SourceSequence::open(&source, FrameRange::default()).unwrap();
        assert_eq!(indices(sequence.by_ref().take(3)), vec![0, 1, 2]);
        assert!(matches!(sequence.next(), Some(Err(Error::Format { .. }))));
        assert!(sequence.next().is_none());

        let mut chunked = SourceSequence::open(&source, FrameRange::default()).unwrap();
        assert!(chunked.read_into(5, &mut Vec::new()).is_err());
        assert_eq!(chunked.len(), 0);
    }
}
