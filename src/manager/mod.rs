/*!
 * Segment Manager
 * Named, unique and anonymous object allocation over a managed region
 *
 * Composes the raw allocation facade with two name directories behind one
 * process-shareable recursive lock. Lookups resolve names to payload
 * handles; constructs run a two-phase check-then-commit insert with full
 * rollback on partial failure; destroys erase the directory entry strictly
 * before tearing the object down.
 */

mod named;
mod proxy;
mod raw;
mod typed;
mod types;

pub use proxy::ConstructProxy;
pub use typed::{TypedAllocator, TypedDeleter};
pub use types::{Handle, SegmentStats};

use crate::algo::{MemoryAlgorithm, SeqFit};
use crate::core::limits::{ALLOC_ALIGN, DEFAULT_SEGMENT_SIZE};
use crate::core::region::Region;
use crate::core::types::{align_up, Offset, SegmentResult, Size};
use crate::index::{Directory, IndexShape};
use log::info;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::ptr::NonNull;

/// The raw allocation facade: the region plus the memory algorithm behind
/// its own mutex (the algorithm's "mutex family").
pub(crate) struct RawMem<A> {
    region: Region,
    algo: Mutex<A>,
}

/// The single mutable directory root: both indexes behind the
/// cross-cutting recursive lock. Constructed once, never moved.
pub(crate) struct ManagerHeader {
    lock: ReentrantMutex<RefCell<Directories>>,
}

pub(crate) struct Directories {
    named: Directory,
    unique: Directory,
}

/// Which directory an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirSel {
    Named,
    Unique,
}

impl Directories {
    fn dir(&self, sel: DirSel) -> &Directory {
        match sel {
            DirSel::Named => &self.named,
            DirSel::Unique => &self.unique,
        }
    }

    fn dir_mut(&mut self, sel: DirSel) -> &mut Directory {
        match sel {
            DirSel::Named => &mut self.named,
            DirSel::Unique => &mut self.unique,
        }
    }
}

/// Named-object directory layered over a pluggable raw allocator.
///
/// Callers may be threads of one process or separate processes sharing the
/// region; every mutating call and every default find is serialized by one
/// recursive lock, so operations compose under [`SegmentManager::atomic`]
/// without self-deadlock.
pub struct SegmentManager<A: MemoryAlgorithm = SeqFit> {
    mem: RawMem<A>,
    header: ManagerHeader,
}

impl Default for SegmentManager<SeqFit> {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE).expect("default-sized segment allocation")
    }
}

impl SegmentManager<SeqFit> {
    /// Manager over a fresh owned region of `size` bytes with the default
    /// algorithm and the default (intrusive) index shape.
    pub fn new(size: Size) -> SegmentResult<Self> {
        Self::with_shape(size, IndexShape::Intrusive)
    }

    /// Manager over a fresh owned region with an explicit index shape.
    pub fn with_shape(size: Size, shape: IndexShape) -> SegmentResult<Self> {
        Ok(Self::from_region(Region::new(size)?, shape))
    }
}

impl<A: MemoryAlgorithm> SegmentManager<A> {
    /// Manager over an existing region (owned or externally mapped), with
    /// any memory algorithm.
    pub fn from_region(region: Region, shape: IndexShape) -> Self {
        let algo = A::format(region.len(), region.base_addr());
        info!(
            "segment manager initialized: {} bytes, {:?} index shape",
            region.len(),
            shape
        );
        Self {
            mem: RawMem {
                region,
                algo: Mutex::new(algo),
            },
            header: ManagerHeader {
                lock: ReentrantMutex::new(RefCell::new(Directories {
                    named: Directory::new(shape),
                    unique: Directory::new(shape),
                })),
            },
        }
    }

    /// Shape both directories were built with.
    pub fn index_shape(&self) -> IndexShape {
        let guard = self.header.lock.lock();
        let shape = guard.borrow().named.shape();
        shape
    }

    /// Run `f` as one indivisible unit against every other mutator.
    ///
    /// The lock is recursive: `f` may freely call any locked operation of
    /// this manager without deadlocking.
    pub fn atomic<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.header.lock.lock();
        f(self)
    }

    /// Size of the managed byte range.
    pub fn get_size(&self) -> Size {
        self.mem.algo.lock().get_size()
    }

    /// Bytes not currently allocated.
    pub fn get_free_memory(&self) -> Size {
        self.mem.algo.lock().get_free_memory()
    }

    /// Minimum region size able to hold `payload` user bytes.
    pub fn get_min_size(payload: Size) -> Size {
        A::get_min_size(payload)
    }

    /// Point-in-time counters for diagnostics.
    pub fn stats(&self) -> SegmentStats {
        SegmentStats {
            size: self.get_size(),
            free_memory: self.get_free_memory(),
            named_objects: self.num_named_objects(),
            unique_objects: self.num_unique_objects(),
            index_shape: self.index_shape(),
        }
    }

    /// Grow the managed range by `extra` bytes (owned regions only).
    ///
    /// Handles stay valid; raw pointers resolved before the grow do not,
    /// because the base address may move.
    pub fn grow(&mut self, extra: Size) -> SegmentResult<()> {
        let extra = align_up(extra, ALLOC_ALIGN);
        self.mem.region.grow(extra)?;
        let base = self.mem.region.base_addr();
        let algo = self.mem.algo.get_mut();
        algo.rebase(base);
        algo.grow(extra);
        Ok(())
    }

    /// Release trailing free space back to the host.
    pub fn shrink_to_fit(&mut self) {
        let new_size = self.mem.algo.get_mut().shrink_to_fit();
        self.mem.region.shrink(new_size);
        let base = self.mem.region.base_addr();
        self.mem.algo.get_mut().rebase(base);
    }

    /// Resolve a handle to a typed pointer into the region.
    pub fn resolve<T>(&self, handle: Handle<T>) -> NonNull<T> {
        // SAFETY: handles are only minted for offsets inside the region.
        NonNull::new(self.mem.region.ptr_at(handle.offset()) as *mut T)
            .expect("region pointers are never null")
    }

    /// Resolve a raw allocation offset to a pointer.
    pub fn resolve_offset(&self, offset: Offset) -> NonNull<u8> {
        NonNull::new(self.mem.region.ptr_at(offset)).expect("region pointers are never null")
    }

    /// View a constructed handle's elements.
    ///
    /// # Safety
    ///
    /// The handle's objects must be alive (not destroyed, not grown over)
    /// and nobody may mutate them while the slice is held.
    pub unsafe fn slice<T>(&self, handle: Handle<T>) -> &[T] {
        std::slice::from_raw_parts(self.resolve(handle).as_ptr(), handle.len())
    }

    /// Mutably view a constructed handle's elements.
    ///
    /// # Safety
    ///
    /// As [`SegmentManager::slice`], and the caller must guarantee no other
    /// reference to these elements exists anywhere.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut<T>(&self, handle: Handle<T>) -> &mut [T] {
        std::slice::from_raw_parts_mut(self.resolve(handle).as_ptr(), handle.len())
    }

    /// Typed raw-array allocator bound to this manager.
    pub fn allocator<T>(&self) -> TypedAllocator<'_, T, A> {
        TypedAllocator::new(self)
    }

    /// Typed deleter bound to this manager.
    pub fn deleter<T>(&self) -> TypedDeleter<'_, T, A> {
        TypedDeleter::new(self)
    }

    pub(crate) fn region(&self) -> &Region {
        &self.mem.region
    }

    pub(crate) fn oom(&self, requested: Size) -> crate::core::errors::SegmentError {
        let free = self.get_free_memory();
        log::error!(
            "out of memory: requested {} bytes, {} bytes free",
            requested,
            free
        );
        crate::core::errors::SegmentError::OutOfMemory { requested, free }
    }
}
