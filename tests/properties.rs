//! Properties of iteration over sources that label every frame with its index.
use std::num::NonZeroUsize;
use std::path::Path;

use proptest::prelude::*;
use trajiter::{
    Atom, ChunkIterOptions, FanOutExt, Frame, FrameIterOptions, FrameRange, FrameSource,
    Topology, TrajectoryIterator,
};

/// Frames of a single atom at `(offset + index, 0, 0)`.
struct Labeled {
    offset: usize,
    nframes: usize,
}

impl FrameSource for Labeled {
    fn path(&self) -> &Path {
        Path::new("labeled")
    }

    fn natoms(&self) -> usize {
        1
    }

    fn frame_count(&self) -> usize {
        self.nframes
    }

    fn read_frame(&self, index: usize, frame: &mut Frame) -> trajiter::Result<()> {
        frame.positions_mut().copy_from_slice(&[(self.offset + index) as f32, 0.0, 0.0]);
        Ok(())
    }
}

fn label(frame: trajiter::Result<Frame>) -> usize {
    frame.unwrap().positions()[0] as usize
}

/// A trajectory over files of the given lengths, whose frames are labeled `0, 1, 2, ...` in
/// logical order.
fn trajectory(lengths: &[usize]) -> TrajectoryIterator {
    let topology = Topology::new(vec![Atom::new("X", "MOL", 0, 1)]);
    let mut traj = TrajectoryIterator::new(topology);
    let mut offset = 0;
    for &nframes in lengths {
        let source = Labeled { offset, nframes };
        traj.load_source(Box::new(source), FrameRange::default()).unwrap();
        offset += nframes;
    }
    traj
}

fn expected(n: usize, start: usize, stop: Option<usize>, stride: usize) -> Vec<usize> {
    let stop = stop.unwrap_or(n).min(n);
    (start..stop.max(start)).step_by(stride).collect()
}

fn file_lengths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..12, 1..5)
}

proptest! {
    #[test]
    fn frame_ranges(
        lengths in file_lengths(),
        start in 0usize..40,
        stop in 0usize..40,
        stride in 1usize..7,
    ) {
        let traj = trajectory(&lengths);
        let n = traj.n_frames();
        let range = FrameRange::new(Some(start), Some(stop), NonZeroUsize::new(stride));
        let result = traj.frame_iter(FrameIterOptions::default().with_range(range));
        if start > n || stop > n {
            prop_assert!(matches!(result, Err(trajiter::Error::Range(_))));
        } else {
            let iter = result.unwrap();
            let expected = expected(n, start, Some(stop), stride);
            prop_assert_eq!(iter.len(), expected.len());
            prop_assert_eq!(iter.map(label).collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn chunks_cover_every_frame(lengths in file_lengths(), chunk in 1usize..8) {
        let traj = trajectory(&lengths);
        let options = ChunkIterOptions::default().with_chunk(chunk);
        let chunks: Vec<_> = traj.chunk_iter(options).unwrap().map(Result::unwrap).collect();
        if let Some((last, full)) = chunks.split_last() {
            prop_assert!(full.iter().all(|c| c.n_frames() == chunk));
            prop_assert!(last.n_frames() >= 1 && last.n_frames() <= chunk);
        }
        let labels: Vec<_> = chunks
            .into_iter()
            .flat_map(|c| c.into_frames())
            .map(|frame| label(Ok(frame)))
            .collect();
        prop_assert_eq!(labels, (0..traj.n_frames()).collect::<Vec<_>>());
    }

    #[test]
    fn slices(
        lengths in file_lengths(),
        start in 0usize..40,
        stop in prop::option::of(0usize..40),
        stride in 1usize..7,
    ) {
        let traj = trajectory(&lengths);
        let stride = NonZeroUsize::new(stride).unwrap();
        let sliced: Vec<_> = traj.iterator_slice(start, stop, stride).map(label).collect();
        prop_assert_eq!(sliced, expected(traj.n_frames(), start, stop, stride.get()));
    }

    #[test]
    fn slices_of_slices(start in 0usize..10, stride in 1usize..4, inner_start in 0usize..5) {
        let traj = trajectory(&[7, 8]);
        let stride = NonZeroUsize::new(stride).unwrap();
        let outer = traj.iterator_slice(start, None, stride);
        let nested: Vec<_> = outer.slice(inner_start, None, NonZeroUsize::MIN).map(label).collect();
        let expected: Vec<_> = expected(15, start, None, stride.get())
            .into_iter()
            .skip(inner_start)
            .collect();
        prop_assert_eq!(nested, expected);
    }

    #[test]
    fn independent_iterators(
        lengths in file_lengths(),
        n in 1usize..4,
        order in prop::collection::vec(0usize..4, 0..60),
    ) {
        let traj = trajectory(&lengths);
        let mut views = traj.make_independent_iterators(n);
        let mut seen = vec![Vec::new(); n];
        for view in order.into_iter().filter(|&view| view < n) {
            if let Some(frame) = views[view].next() {
                seen[view].push(label(frame));
            }
        }
        for (view, seen) in views.into_iter().zip(&mut seen) {
            seen.extend(view.map(label));
        }
        let all: Vec<_> = (0..traj.n_frames()).collect();
        for seen in seen {
            prop_assert_eq!(&seen, &all);
        }
    }
}

#[test]
fn no_independent_iterators() {
    assert!(trajectory(&[3]).make_independent_iterators(0).is_empty());
}
