//! Heap string arrays passed across the boundary.
//!
//! The array and every string in it live on the C heap (`calloc`/`strdup`,
//! released with `free`), so the managed side and the SDK agree on who
//! frees what. Lifecycle: create with all slots null, fill slots by index,
//! release everything in one call.

use std::ffi::{c_char, CStr};
use std::mem::{size_of, ManuallyDrop};
use std::ptr::{self, NonNull};

use crate::error::{BridgeError, BridgeResult};

/// Fixed-size array of owned, nullable C strings.
#[derive(Debug)]
pub struct StringArray {
    slots: NonNull<*mut c_char>,
    len: usize,
}

// Slots are uniquely owned heap strings.
unsafe impl Send for StringArray {}

impl StringArray {
    /// Allocates `len` empty slots. Returns `None` if allocation fails.
    pub fn with_len(len: usize) -> Option<Self> {
        // calloc(0, _) may legally return null, so always reserve one slot.
        let slots = unsafe { libc::calloc(len.max(1), size_of::<*mut c_char>()) };
        NonNull::new(slots.cast::<*mut c_char>()).map(|slots| Self { slots, len })
    }

    /// Takes ownership of an array produced by [`StringArray::into_raw`] or
    /// `make_char_array`.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a live array from this module with at least
    /// `len` slots, and must not be used by the caller afterwards.
    pub unsafe fn from_raw(raw: *mut *mut c_char, len: usize) -> Option<Self> {
        NonNull::new(raw).map(|slots| Self { slots, len })
    }

    /// Hands the array to a foreign owner.
    pub fn into_raw(self) -> *mut *mut c_char {
        ManuallyDrop::new(self).slots.as_ptr()
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array has no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to the first slot.
    pub fn as_ptr(&self) -> *const *mut c_char {
        self.slots.as_ptr()
    }

    /// Copies `value` into slot `index`, releasing whatever was there.
    pub fn set(&mut self, index: usize, value: &CStr) -> BridgeResult<()> {
        if index >= self.len {
            return Err(BridgeError::invalid_argument(
                "index",
                format!("{} out of range for {} slots", index, self.len),
            ));
        }
        let copy = unsafe { libc::strdup(value.as_ptr()) };
        if copy.is_null() {
            return Err(BridgeError::invalid_argument("value", "string allocation failed"));
        }
        unsafe {
            let slot = self.slots.as_ptr().add(index);
            libc::free((*slot).cast());
            *slot = copy;
        }
        Ok(())
    }

    /// Reads slot `index`; `None` if it is out of range or unset.
    pub fn get(&self, index: usize) -> Option<&CStr> {
        if index >= self.len {
            return None;
        }
        let value = unsafe { *self.slots.as_ptr().add(index) };
        (!value.is_null()).then(|| unsafe { CStr::from_ptr(value) })
    }

    /// Frees every set slot and the array. Returns how many strings were freed.
    pub fn release(self) -> usize {
        let mut this = ManuallyDrop::new(self);
        unsafe { this.free_all() }
    }

    unsafe fn free_all(&mut self) -> usize {
        let base = self.slots.as_ptr();
        let mut released = 0;
        for index in 0..self.len {
            let value = *base.add(index);
            if !value.is_null() {
                libc::free(value.cast());
                *base.add(index) = ptr::null_mut();
                released += 1;
            }
        }
        libc::free(base.cast());
        released
    }
}

impl Drop for StringArray {
    fn drop(&mut self) {
        unsafe {
            self.free_all();
        }
    }
}

/// Allocates an array of `size` null slots; null on failure or negative size.
pub fn make_raw(size: i32) -> *mut *mut c_char {
    usize::try_from(size)
        .ok()
        .and_then(StringArray::with_len)
        .map_or(ptr::null_mut(), StringArray::into_raw)
}

/// Stores `value` in slot `index`, taking ownership of it.
///
/// # Safety
///
/// - `array` must come from [`make_raw`] and `index` must be below its size.
/// - `value` must be null or a `malloc`-family allocation (see [`duplicate`]).
/// - A previously stored value at `index` is overwritten, not freed.
pub unsafe fn set_raw(array: *mut *mut c_char, value: *mut c_char, index: usize) {
    *array.add(index) = value;
}

/// Frees the first `size` slots and the array. Returns how many strings were freed.
///
/// # Safety
///
/// `array` must be null or come from [`make_raw`] with at least `size` slots,
/// and must not be used again.
pub unsafe fn free_raw(array: *mut *mut c_char, size: usize) -> usize {
    StringArray::from_raw(array, size).map_or(0, StringArray::release)
}

/// Copies a C string onto the C heap so it can be stored with [`set_raw`].
///
/// # Safety
///
/// `value` must be null or a valid NUL-terminated string.
pub unsafe fn duplicate(value: *const c_char) -> *mut c_char {
    if value.is_null() {
        return ptr::null_mut();
    }
    libc::strdup(value)
}
