//! Slicing and forking of iterators.
//!
//! [`Slice`] takes a strided window out of a running iterator. [`tee`] splits one iterator into
//! several that all produce the same items, while the underlying iterator is only advanced once.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::iter::{Fuse, FusedIterator};
use std::num::NonZeroUsize;
use std::rc::Rc;

/// The items of an iterator from `start` up to `stop` in steps of `stride`.
///
/// The positions are counted from where the wrapped iterator stands when the slice is created.
/// Items in between are stepped over with [`Iterator::nth`], so iterators that can skip cheaply
/// never produce them.
#[derive(Debug, Clone)]
pub struct Slice<I> {
    inner: I,
    /// The position of the next item of `inner`.
    position: usize,
    /// The position of the next item to yield.
    next: usize,
    stop: Option<usize>,
    stride: usize,
}

impl<I: Iterator> Slice<I> {
    pub fn new(inner: I, start: usize, stop: Option<usize>, stride: NonZeroUsize) -> Self {
        Self {
            inner,
            position: 0,
            next: start,
            stop,
            stride: stride.get(),
        }
    }
}

impl<I: Iterator> Iterator for Slice<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop.is_some_and(|stop| self.next >= stop) {
            return None;
        }
        let item = self.inner.nth(self.next - self.position);
        self.position = self.next + 1;
        self.next = self.next.saturating_add(self.stride);
        if item.is_none() {
            // Exhausted. Make sure the wrapped iterator is not touched again.
            self.stop = Some(0);
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.stop.is_some_and(|stop| self.next >= stop) {
            return (0, Some(0));
        }
        let count = |available: usize| {
            let skip = self.next - self.position;
            let mut n = available.saturating_sub(skip).div_ceil(self.stride);
            if let Some(stop) = self.stop {
                n = n.min((stop - self.next).div_ceil(self.stride));
            }
            n
        };
        let (lower, upper) = self.inner.size_hint();
        (count(lower), upper.map(count).or_else(|| self.stop.map(|_| count(usize::MAX))))
    }
}

impl<I: Iterator> FusedIterator for Slice<I> {}

struct TeeState<I: Iterator> {
    source: Fuse<I>,
    /// Items that have been taken from `source` but not yet seen by every view.
    buffer: VecDeque<I::Item>,
    /// The position of the first item in `buffer`.
    base: usize,
    /// The position of the next item of every view, or [`None`] for dropped views.
    positions: Vec<Option<usize>>,
}

impl<I: Iterator> TeeState<I> {
    /// Drop the items that every remaining view has passed.
    fn trim(&mut self) {
        let slowest = self.positions.iter().flatten().min().copied();
        let slowest = slowest.unwrap_or(self.base + self.buffer.len());
        while self.base < slowest && self.buffer.pop_front().is_some() {
            self.base += 1;
        }
    }
}

/// One of the iterators created by [`tee`].
///
/// All views share a buffer that holds the items between the slowest and the fastest view.
pub struct Tee<I: Iterator> {
    state: Rc<RefCell<TeeState<I>>>,
    id: usize,
}

/// Split `iter` into `n` iterators that each produce all of its items, in the same order.
///
/// The views can be advanced in any order. Each item is taken from `iter` once and cloned for the
/// views that have not seen it yet.
pub fn tee<I>(iter: I, n: usize) -> Vec<Tee<I>>
where
    I: Iterator,
    I::Item: Clone,
{
    let state = Rc::new(RefCell::new(TeeState {
        source: iter.fuse(),
        buffer: VecDeque::new(),
        base: 0,
        positions: vec![Some(0); n],
    }));
    (0..n)
        .map(|id| Tee {
            state: Rc::clone(&state),
            id,
        })
        .collect()
}

impl<I> Iterator for Tee<I>
where
    I: Iterator,
    I::Item: Clone,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let mut state = self.state.borrow_mut();
        let position = state.positions[self.id]?;
        let offset = position - state.base;
        let item = match state.buffer.get(offset) {
            Some(item) => item.clone(),
            None => {
                let item = state.source.next()?;
                state.buffer.push_back(item.clone());
                item
            }
        };
        state.positions[self.id] = Some(position + 1);
        state.trim();
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let state = self.state.borrow();
        let buffered = match state.positions[self.id] {
            Some(position) => state.base + state.buffer.len() - position,
            None => 0,
        };
        let (lower, upper) = state.source.size_hint();
        (
            lower.saturating_add(buffered),
            upper.and_then(|upper| upper.checked_add(buffered)),
        )
    }
}

impl<I> FusedIterator for Tee<I>
where
    I: Iterator,
    I::Item: Clone,
{
}

impl<I: Iterator> Drop for Tee<I> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.positions[self.id] = None;
            state.trim();
        }
    }
}

/// Slicing and forking for every iterator.
pub trait FanOutExt: Iterator + Sized {
    /// See [`Slice`].
    fn slice(self, start: usize, stop: Option<usize>, stride: NonZeroUsize) -> Slice<Self> {
        Slice::new(self, start, stop, stride)
    }

    /// See [`tee`].
    fn tee(self, n: usize) -> Vec<Tee<Self>>
    where
        Self::Item: Clone,
    {
        tee(self, n)
    }
}

impl<I: Iterator> FanOutExt for I {}

#[cfg(test)]
mod tests {
    use super::*;

    fn stride(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn slice() {
        let sliced: Vec<_> = (0..20).slice(3, Some(12), stride(4)).collect();
        assert_eq!(sliced, vec![3, 7, 11]);
        let open: Vec<_> = (0..10).slice(5, None, stride(2)).collect();
        assert_eq!(open, vec![5, 7, 9]);
        assert_eq!((0..10).slice(12, None, stride(1)).count(), 0);
        assert_eq!((0..10).slice(4, Some(2), stride(1)).count(), 0);
    }

    #[test]
    fn slice_continues_from_the_current_position() {
        let mut numbers = 0..10;
        numbers.next();
        numbers.next();
        let sliced: Vec<_> = numbers.by_ref().slice(1, Some(4), stride(2)).collect();
        assert_eq!(sliced, vec![3, 5]);
        // Nothing beyond the last yielded item was taken.
        assert_eq!(numbers.next(), Some(6));
    }

    #[test]
    fn slice_size_hint() {
        let sliced = (0..20).slice(3, Some(12), stride(4));
        assert_eq!(sliced.size_hint(), (3, Some(3)));
        let sliced = (0..10).slice(5, None, stride(2));
        assert_eq!(sliced.size_hint(), (3, Some(3)));
        assert_eq!(sliced.count(), 3);
    }

    #[test]
    fn tee_in_lockstep() {
        let mut views = (0..5).tee(3);
        let mut seen = vec![Vec::new(); 3];
        for _ in 0..5 {
            for (view, seen) in views.iter_mut().zip(&mut seen) {
                seen.push(view.next().unwrap());
            }
        }
        assert!(views.iter_mut().all(|view| view.next().is_none()));
        assert!(seen.iter().all(|seen| seen == &[0, 1, 2, 3, 4]));
    }

    #[test]
    fn tee_one_after_the_other() {
        let mut views = tee("abcdef".chars(), 2);
        let second = views.pop().unwrap();
        let first = views.pop().unwrap();
        let first: String = first.collect();
        // The first view is gone, so its items are only kept for the second one.
        assert_eq!(second.state.borrow().buffer.len(), 6);
        assert_eq!(second.collect::<String>(), first);
    }

    #[test]
    fn tee_buffer_is_bounded_by_the_slowest_view() {
        let mut views = (0..100).tee(2);
        for _ in 0..10 {
            views[0].next();
        }
        assert_eq!(views[0].state.borrow().buffer.len(), 10);
        for _ in 0..4 {
            views[1].next();
        }
        assert_eq!(views[0].state.borrow().buffer.len(), 6);
        // Dropping the slow view releases what only it still needed.
        views.pop();
        assert_eq!(views[0].state.borrow().buffer.len(), 0);
        assert_eq!(views[0].size_hint(), (90, Some(90)));
    }

    #[test]
    fn tee_of_none() {
        assert!((0..3).tee(0).is_empty());
    }

    #[test]
    fn tee_takes_each_item_once() {
        let calls = std::cell::Cell::new(0);
        let counted = (0..4).inspect(|_| calls.set(calls.get() + 1));
        let views = counted.tee(3);
        for view in views {
            assert_eq!(view.count(), 4);
        }
        assert_eq!(calls.get(), 4);
    }
}
