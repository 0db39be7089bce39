/*!
 * Typed Construction Table
 * Type-erased descriptor for building and tearing down payload arrays
 */

use crate::core::types::SegmentResult;
use std::any::type_name;
use std::mem::{align_of, size_of};
use std::ptr;

/// Type-erased construction descriptor.
///
/// Carries everything generic code needs to build or destroy N elements of
/// a type it cannot name: element size, alignment, the process-stable
/// type-identity string, an array constructor and an array destructor.
/// Lookup/destroy paths use a destructor-only table.
pub(crate) struct CtorTable<'c> {
    pub elem_size: usize,
    pub elem_align: usize,
    pub type_name: &'static str,
    construct: Option<&'c mut dyn FnMut(*mut u8, usize) -> SegmentResult<()>>,
    destroy: unsafe fn(*mut u8, usize),
}

impl<'c> CtorTable<'c> {
    /// Table for paths that only ever destroy (find, destroy, reverse
    /// lookups).
    pub fn dtor_only<T>() -> CtorTable<'static> {
        CtorTable {
            elem_size: size_of::<T>(),
            elem_align: align_of::<T>(),
            type_name: type_name::<T>(),
            construct: None,
            destroy: drop_array::<T>,
        }
    }

    /// Table carrying an array constructor for construct paths.
    pub fn with_ctor<T>(
        ctor: &'c mut dyn FnMut(*mut u8, usize) -> SegmentResult<()>,
    ) -> CtorTable<'c> {
        CtorTable {
            elem_size: size_of::<T>(),
            elem_align: align_of::<T>(),
            type_name: type_name::<T>(),
            construct: Some(ctor),
            destroy: drop_array::<T>,
        }
    }

    /// Run the array constructor over `count` elements at `dst`.
    ///
    /// On error the constructor has already torn down whatever it built;
    /// nothing at `dst` is live.
    pub fn construct(&mut self, dst: *mut u8, count: usize) -> SegmentResult<()> {
        let ctor = self
            .construct
            .as_mut()
            .expect("destructor-only table used on a construct path");
        ctor(dst, count)
    }

    /// Drop `count` elements at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point at `count` live, properly aligned elements of the
    /// table's type, and nothing may touch them afterwards.
    pub unsafe fn destroy(&self, ptr: *mut u8, count: usize) {
        (self.destroy)(ptr, count)
    }
}

/// Construct `count` elements at `dst` from `make`, tearing down every
/// already-built element if one fails, so no partial object survives.
pub(crate) fn array_construct<T>(
    dst: *mut T,
    count: usize,
    make: &mut dyn FnMut(usize) -> SegmentResult<T>,
) -> SegmentResult<()> {
    for i in 0..count {
        match make(i) {
            // SAFETY: dst points at capacity for `count` elements; slot i
            // is unoccupied until this write.
            Ok(value) => unsafe { dst.add(i).write(value) },
            Err(e) => {
                for j in 0..i {
                    // SAFETY: slots 0..i were written above and not yet
                    // dropped.
                    unsafe { ptr::drop_in_place(dst.add(j)) };
                }
                return Err(e);
            }
        }
    }
    Ok(())
}

unsafe fn drop_array<T>(ptr: *mut u8, count: usize) {
    let typed = ptr as *mut T;
    for i in 0..count {
        ptr::drop_in_place(typed.add(i));
    }
}
