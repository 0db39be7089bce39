/*!
 * Named Object Protocol
 * find / construct / destroy over the two directories
 */

use super::proxy::Target;
use super::types::Handle;
use super::{ConstructProxy, DirSel, Directories, SegmentManager};
use crate::algo::MemoryAlgorithm;
use crate::block::{BlockHeader, BlockPlacement, CtorTable};
use crate::core::errors::SegmentError;
use crate::core::limits::{MAX_NAME_LEN, MAX_PAYLOAD_ALIGN};
use crate::core::types::{ObjectKind, Offset, SegmentResult};
use crate::index::DirEntry;
use log::{debug, info};
use std::any::type_name;
use std::cell::RefCell;
use std::mem::size_of;

impl<A: MemoryAlgorithm> SegmentManager<A> {
    /// Look up a previously constructed named object.
    ///
    /// Returns the handle (payload + element count) on a hit, `None` on a
    /// miss. The stored type is not verified beyond a size check; asking
    /// with the wrong `T` is as wrong as it is in any shared-memory ABI.
    pub fn find<T>(&self, name: &str) -> Option<Handle<T>> {
        self.generic_find::<T>(DirSel::Named, name, true)
    }

    /// Look up the unique instance of `T`.
    pub fn find_unique<T>(&self) -> Option<Handle<T>> {
        self.generic_find::<T>(DirSel::Unique, type_name::<T>(), true)
    }

    /// Lock-free lookup for callers that guarantee external mutual
    /// exclusion.
    ///
    /// # Safety
    ///
    /// No other actor may mutate this manager's directories for the whole
    /// call. Violating that is a data race, exactly as the lockless find of
    /// any shared directory would be.
    pub unsafe fn find_no_lock<T>(&self, name: &str) -> Option<Handle<T>> {
        self.generic_find::<T>(DirSel::Named, name, false)
    }

    /// Unique-instance variant of [`SegmentManager::find_no_lock`].
    ///
    /// # Safety
    ///
    /// As [`SegmentManager::find_no_lock`].
    pub unsafe fn find_unique_no_lock<T>(&self) -> Option<Handle<T>> {
        self.generic_find::<T>(DirSel::Unique, type_name::<T>(), false)
    }

    /// Deferred construction of a named object; fails on name collision.
    pub fn construct<'a, 'n, T>(&'a self, name: &'n str) -> ConstructProxy<'a, 'n, T, A> {
        ConstructProxy::new(self, Target::Named(name), false)
    }

    /// Deferred construction returning the existing object on collision.
    pub fn find_or_construct<'a, 'n, T>(&'a self, name: &'n str) -> ConstructProxy<'a, 'n, T, A> {
        ConstructProxy::new(self, Target::Named(name), true)
    }

    /// Deferred construction of the unique instance of `T`.
    pub fn construct_unique<T>(&self) -> ConstructProxy<'_, 'static, T, A> {
        ConstructProxy::new(self, Target::Unique, false)
    }

    /// Unique-instance variant of [`SegmentManager::find_or_construct`].
    pub fn find_or_construct_unique<T>(&self) -> ConstructProxy<'_, 'static, T, A> {
        ConstructProxy::new(self, Target::Unique, true)
    }

    /// Deferred construction of an anonymous object, reachable only
    /// through the returned handle.
    pub fn construct_anonymous<T>(&self) -> ConstructProxy<'_, 'static, T, A> {
        ConstructProxy::new(self, Target::Anonymous, false)
    }

    /// Destroy the named object `name`. Returns false if it is not
    /// present; never raises.
    pub fn destroy<T>(&self, name: &str) -> bool {
        let table = CtorTable::dtor_only::<T>();
        self.generic_destroy(DirSel::Named, name, &table)
    }

    /// Destroy the unique instance of `T`. Returns false if absent.
    pub fn destroy_unique<T>(&self) -> bool {
        let table = CtorTable::dtor_only::<T>();
        self.generic_destroy(DirSel::Unique, type_name::<T>(), &table)
    }

    /// Destroy an anonymous, named or unique object through its handle,
    /// dispatching on the kind recovered from the block header.
    ///
    /// A handle that does not refer to a live object of type `T` is a
    /// programming error and trips a defensive assertion.
    pub fn destroy_handle<T>(&self, handle: Handle<T>) {
        let table = CtorTable::dtor_only::<T>();
        let region = self.region();
        let header_off = BlockHeader::header_offset(handle.offset());
        let header = BlockHeader::decode_at(region, header_off);
        match header.kind {
            ObjectKind::Anonymous => self.anonymous_destroy(handle.offset(), &table),
            kind => {
                // for the node index shape, erasing the entry also releases
                // the directory-owned node; the intrusive shape frees
                // nothing beyond the block itself
                let sel = if kind == ObjectKind::Named {
                    DirSel::Named
                } else {
                    DirSel::Unique
                };
                let name = header.name_string(region, header_off);
                let destroyed = self.generic_destroy(sel, &name, &table);
                assert!(destroyed, "handle does not refer to a live object");
            }
        }
    }

    /// Name an object was constructed under; `None` for anonymous and
    /// unique objects. Pure header decode, takes no lock.
    pub fn instance_name<T>(&self, handle: Handle<T>) -> Option<String> {
        let region = self.region();
        let header_off = BlockHeader::header_offset(handle.offset());
        let header = BlockHeader::decode_at(region, header_off);
        match header.kind {
            ObjectKind::Named => Some(header.name_string(region, header_off)),
            _ => None,
        }
    }

    /// Element count an object was constructed with. Pure header decode.
    pub fn instance_len<T>(&self, handle: Handle<T>) -> usize {
        let header = BlockHeader::decode_at(
            self.region(),
            BlockHeader::header_offset(handle.offset()),
        );
        debug_assert_eq!(header.value_bytes as usize % size_of::<T>(), 0);
        header.value_bytes as usize / size_of::<T>()
    }

    /// How the object was published. Pure header decode.
    pub fn instance_kind<T>(&self, handle: Handle<T>) -> ObjectKind {
        BlockHeader::decode_at(
            self.region(),
            BlockHeader::header_offset(handle.offset()),
        )
        .kind
    }

    /// Number of live named objects.
    pub fn num_named_objects(&self) -> usize {
        let guard = self.header.lock.lock();
        let n = guard.borrow().dir(DirSel::Named).len();
        n
    }

    /// Number of live unique objects.
    pub fn num_unique_objects(&self) -> usize {
        let guard = self.header.lock.lock();
        let n = guard.borrow().dir(DirSel::Unique).len();
        n
    }

    /// Pre-size the named index for `count` more objects.
    pub fn reserve_named_objects(&self, count: usize) -> SegmentResult<()> {
        let guard = self.header.lock.lock();
        let result = guard.borrow_mut().dir_mut(DirSel::Named).reserve(count);
        result
    }

    /// Pre-size the unique index for `count` more objects.
    pub fn reserve_unique_objects(&self, count: usize) -> SegmentResult<()> {
        let guard = self.header.lock.lock();
        let result = guard.borrow_mut().dir_mut(DirSel::Unique).reserve(count);
        result
    }

    /// Release internal slack from both indexes.
    pub fn shrink_to_fit_indexes(&self) {
        let guard = self.header.lock.lock();
        let mut dirs = guard.borrow_mut();
        dirs.dir_mut(DirSel::Named).shrink_to_fit();
        dirs.dir_mut(DirSel::Unique).shrink_to_fit();
    }

    /// Snapshot of the named directory, in name order. Collected under the
    /// lock; callers needing multi-step consistency wrap the traversal in
    /// [`SegmentManager::atomic`].
    pub fn named_entries(&self) -> Vec<DirEntry> {
        let guard = self.header.lock.lock();
        let entries = guard.borrow().dir(DirSel::Named).entries(self.region());
        entries
    }

    /// Snapshot of the unique directory, in key order.
    pub fn unique_entries(&self) -> Vec<DirEntry> {
        let guard = self.header.lock.lock();
        let entries = guard.borrow().dir(DirSel::Unique).entries(self.region());
        entries
    }

    fn generic_find<T>(&self, sel: DirSel, name: &str, use_lock: bool) -> Option<Handle<T>> {
        assert!(size_of::<T>() != 0, "zero-sized types are not managed");
        let region = self.region();
        let guard = if use_lock {
            Some(self.header.lock.lock())
        } else {
            None
        };
        let cell: &RefCell<Directories> = match guard.as_ref() {
            Some(g) => g,
            // SAFETY: the caller of the no-lock variant guarantees external
            // mutual exclusion, so reading without the lock cannot race.
            None => unsafe { &*self.header.lock.data_ptr() },
        };
        let dirs = cell.borrow();
        let header_off = dirs.dir(sel).find(name, region)?;
        let header = BlockHeader::decode_at(region, header_off);
        if header.value_bytes as usize % size_of::<T>() != 0 {
            debug_assert!(false, "stored payload does not divide into T");
            return None;
        }
        Some(Handle::new(
            BlockHeader::payload_offset(header_off),
            header.value_bytes as usize / size_of::<T>(),
        ))
    }

    /// Generic named/unique/anonymous construction. The named path runs the
    /// two-phase check-then-commit insert under the cross-cutting lock.
    pub(crate) fn generic_construct(
        &self,
        target: Target<'_>,
        count: usize,
        try_find: bool,
        table: &mut CtorTable<'_>,
    ) -> SegmentResult<(Offset, usize)> {
        match target {
            Target::Anonymous => self.anonymous_construct(count, table),
            Target::Named(name) => {
                self.named_construct(name, ObjectKind::Named, DirSel::Named, count, try_find, table)
            }
            Target::Unique => self.named_construct(
                table.type_name,
                ObjectKind::Unique,
                DirSel::Unique,
                count,
                try_find,
                table,
            ),
        }
    }

    fn named_construct(
        &self,
        name: &str,
        kind: ObjectKind,
        sel: DirSel,
        count: usize,
        try_find: bool,
        table: &mut CtorTable<'_>,
    ) -> SegmentResult<(Offset, usize)> {
        if name.len() > MAX_NAME_LEN {
            return Err(SegmentError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        assert!(
            table.elem_align <= MAX_PAYLOAD_ALIGN,
            "payload alignment above the supported maximum"
        );
        let value_bytes = count
            .checked_mul(table.elem_size)
            .ok_or(SegmentError::Overflow {
                count,
                elem_size: table.elem_size,
            })?;
        let total = BlockPlacement::total_size(name.len(), value_bytes, table.elem_align)?;
        let region = self.region();

        let guard = self.header.lock.lock();

        // phase one: locate the position before touching any memory, so an
        // allocation failure never leaves a half-inserted entry
        let commit = {
            let dirs = guard.borrow();
            match dirs.dir(sel).insert_check(name, region) {
                Err(existing) => {
                    if try_find {
                        let header = BlockHeader::decode_at(region, existing);
                        debug_assert_eq!(
                            header.value_bytes as usize % table.elem_size,
                            0,
                            "existing object does not divide into the requested type"
                        );
                        return Ok((
                            BlockHeader::payload_offset(existing),
                            header.value_bytes as usize / table.elem_size,
                        ));
                    }
                    return Err(SegmentError::AlreadyExists(name.to_string()));
                }
                Ok(commit) => commit,
            }
        };

        // one combined block for {name, header, payload}
        let block_off = self.try_allocate(total).ok_or_else(|| self.oom(total))?;
        let placement =
            BlockPlacement::resolve(region.base_addr(), block_off, name.len(), table.elem_align);
        region.write(placement.name_off, name.as_bytes());
        let mut header = BlockHeader::new(value_bytes, table.elem_size, table.elem_align, kind, name.len());
        header.back_pad = placement.back_pad();
        header.encode_at(region, placement.header_off);

        // phase two: commit the entry now that the block exists
        guard
            .borrow_mut()
            .dir_mut(sel)
            .insert_commit(name, placement.header_off, commit);

        // element constructors run with the lock held but the directory
        // borrow released, so reentrant ctors may use the manager
        match table.construct(region.ptr_at(placement.payload_off), count) {
            Ok(()) => {
                debug!(
                    "constructed {:?} object \"{}\": {} x {} bytes at offset {}",
                    kind, name, count, table.elem_size, placement.payload_off
                );
                Ok((placement.payload_off, count))
            }
            Err(e) => {
                // no leaked entry, no leaked memory
                guard.borrow_mut().dir_mut(sel).erase(name, region);
                self.deallocate(block_off);
                Err(e)
            }
        }
    }

    fn generic_destroy(&self, sel: DirSel, name: &str, table: &CtorTable<'_>) -> bool {
        let region = self.region();
        let guard = self.header.lock.lock();
        let header_off = {
            let mut dirs = guard.borrow_mut();
            let dir = dirs.dir_mut(sel);
            let node_owned = dir.is_node_index();
            match dir.erase(name, region) {
                Some(off) => {
                    if node_owned {
                        // erasing a node-shaped entry also released the
                        // directory-owned index node
                        debug!("released index node for \"{}\"", name);
                    }
                    off
                }
                None => return false,
            }
        };
        // the entry is out of the directory: no lookup can observe the
        // object from here on, even though the lock is still held
        let header = BlockHeader::decode_at(region, header_off);
        assert_eq!(
            header.value_bytes as usize % table.elem_size,
            0,
            "destroying with a mismatched element type"
        );
        let count = header.value_bytes as usize / table.elem_size;
        let payload_off = BlockHeader::payload_offset(header_off);
        // SAFETY: the directory owned this block until the erase above;
        // `count` live elements of the table's type start at the payload.
        unsafe { table.destroy(region.ptr_at(payload_off), count) };
        self.deallocate(header.block_offset(header_off));
        info!("destroyed {:?} object \"{}\"", header.kind, name);
        true
    }
}
