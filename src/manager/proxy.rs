/*!
 * Construction Proxy
 * Deferred-invocation helper returned by construct()/find_or_construct()
 */

use super::types::Handle;
use super::SegmentManager;
use crate::algo::MemoryAlgorithm;
use crate::block::{array_construct, CtorTable};
use crate::core::errors::SegmentError;
use crate::core::types::SegmentResult;
use std::marker::PhantomData;
use std::mem::size_of;

/// What a construction will be registered as.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'n> {
    Named(&'n str),
    Unique,
    Anonymous,
}

/// Short-lived value capturing a pending construction.
///
/// Owns nothing; nothing happens until one of the invocation methods is
/// called, which consumes the proxy and runs the full two-phase protocol.
#[must_use = "a construction proxy does nothing until invoked"]
pub struct ConstructProxy<'a, 'n, T, A: MemoryAlgorithm> {
    mgr: &'a SegmentManager<A>,
    target: Target<'n>,
    try_find: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, 'n, T, A: MemoryAlgorithm> ConstructProxy<'a, 'n, T, A> {
    pub(crate) fn new(mgr: &'a SegmentManager<A>, target: Target<'n>, try_find: bool) -> Self {
        Self {
            mgr,
            target,
            try_find,
            _marker: PhantomData,
        }
    }

    /// Construct a single element from `value`.
    pub fn one(self, value: T) -> SegmentResult<Handle<T>> {
        let mut slot = Some(value);
        self.invoke(1, &mut |_| {
            slot.take().ok_or(SegmentError::ConstructorFailed { index: 0 })
        })
    }

    /// Construct `count` clones of `value`.
    pub fn fill(self, count: usize, value: T) -> SegmentResult<Handle<T>>
    where
        T: Clone,
    {
        self.invoke(count, &mut |_| Ok(value.clone()))
    }

    /// Construct `count` elements, one `make(i)` each.
    pub fn with(self, count: usize, mut make: impl FnMut(usize) -> T) -> SegmentResult<Handle<T>> {
        self.invoke(count, &mut |i| Ok(make(i)))
    }

    /// Construct `count` elements from a fallible constructor. A failure
    /// at any index rolls the whole construction back before it surfaces.
    pub fn try_with(
        self,
        count: usize,
        mut make: impl FnMut(usize) -> SegmentResult<T>,
    ) -> SegmentResult<Handle<T>> {
        self.invoke(count, &mut make)
    }

    /// Construct one element per iterator item.
    pub fn from_iter<I>(self, iter: I) -> SegmentResult<Handle<T>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let mut iter = iter.into_iter();
        let count = iter.len();
        self.invoke(count, &mut |i| {
            iter.next().ok_or(SegmentError::ConstructorFailed { index: i })
        })
    }

    fn invoke(
        self,
        count: usize,
        make: &mut dyn FnMut(usize) -> SegmentResult<T>,
    ) -> SegmentResult<Handle<T>> {
        assert!(size_of::<T>() != 0, "zero-sized types are not managed");
        let mut filler =
            |dst: *mut u8, n: usize| array_construct(dst as *mut T, n, make);
        let mut table = CtorTable::with_ctor::<T>(&mut filler);
        let (payload_off, len) =
            self.mgr
                .generic_construct(self.target, count, self.try_find, &mut table)?;
        Ok(Handle::new(payload_off, len))
    }
}
