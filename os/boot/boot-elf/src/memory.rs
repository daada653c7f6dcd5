//! # Physical Memory Primitives
//!
//! The loader never dereferences a target address itself; it asks a
//! [`PhysicalMemory`] to copy or zero a range. On bare metal that is
//! [`IdentityMemory`], which writes straight through raw pointers. In a hosted
//! or hardened context [`WindowMemory`] confines every write to a buffer that
//! stands in for a physical range.

use crate::error::LoadError;
use crate::image::RawImage;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

/// Copy and zero primitives over a physical address space.
pub trait PhysicalMemory {
    /// Copy `bytes` to `target`.
    ///
    /// # Errors
    /// [`LoadError::TargetOutOfRange`] if the range cannot be written.
    fn copy_in(&mut self, target: u64, bytes: &[u8]) -> Result<(), LoadError>;

    /// Fill `len` bytes at `target` with zero.
    ///
    /// # Errors
    /// [`LoadError::TargetOutOfRange`] if the range cannot be written.
    fn zero(&mut self, target: u64, len: u64) -> Result<(), LoadError>;

    /// Move `len` bytes from `source` to `target`; the ranges may overlap.
    ///
    /// # Errors
    /// [`LoadError::TargetOutOfRange`] if either range is not accessible.
    fn copy_within(&mut self, target: u64, source: u64, len: u64) -> Result<(), LoadError>;

    /// An image view over `len` bytes at `address`.
    ///
    /// # Safety
    /// The returned image aliases this memory. It must not be read after the
    /// bytes it covers were written, and not after `self` is dropped.
    ///
    /// # Errors
    /// [`LoadError::TargetOutOfRange`] if the range is not accessible.
    unsafe fn image_at(&self, address: u64, len: u64) -> Result<RawImage, LoadError>;
}

/// Physical memory accessed through identity-mapped raw pointers.
///
/// Physical page 0 is reachable only from address 1 upward: a range starting
/// at address 0 would need a null pointer and fails with
/// [`LoadError::TargetOutOfRange`], whatever the validation level.
#[derive(Debug)]
pub struct IdentityMemory {
    _private: (),
}

impl IdentityMemory {
    /// # Safety
    /// Physical addresses must be identity mapped and every range the loader is
    /// asked to write must be RAM that nothing else still needs.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn pointer(address: u64, len: u64) -> Result<(NonNull<u8>, usize), LoadError> {
        let out_of_range = LoadError::TargetOutOfRange { address, len };
        let addr = usize::try_from(address).map_err(|_| out_of_range)?;
        let count = usize::try_from(len).map_err(|_| out_of_range)?;
        let ptr = NonNull::new(addr as *mut u8).ok_or(out_of_range)?;
        Ok((ptr, count))
    }
}

impl PhysicalMemory for IdentityMemory {
    fn copy_in(&mut self, target: u64, bytes: &[u8]) -> Result<(), LoadError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let (dst, count) = Self::pointer(target, bytes.len() as u64)?;
        // SAFETY: the constructor's contract makes the target writable; the
        // memory layout keeps images and their targets apart.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst.as_ptr(), count) };
        Ok(())
    }

    fn zero(&mut self, target: u64, len: u64) -> Result<(), LoadError> {
        if len == 0 {
            return Ok(());
        }
        let (dst, count) = Self::pointer(target, len)?;
        // SAFETY: see `copy_in`.
        unsafe { ptr::write_bytes(dst.as_ptr(), 0, count) };
        Ok(())
    }

    fn copy_within(&mut self, target: u64, source: u64, len: u64) -> Result<(), LoadError> {
        if len == 0 {
            return Ok(());
        }
        let (dst, count) = Self::pointer(target, len)?;
        let (src, _) = Self::pointer(source, len)?;
        // SAFETY: see `copy_in`; `ptr::copy` tolerates overlap.
        unsafe { ptr::copy(src.as_ptr(), dst.as_ptr(), count) };
        Ok(())
    }

    unsafe fn image_at(&self, address: u64, len: u64) -> Result<RawImage, LoadError> {
        let (base, _) = Self::pointer(address, len)?;
        // SAFETY: identity-mapped RAM; lifetime per this method's contract.
        Ok(unsafe { RawImage::new(base, len) })
    }
}

/// A buffer standing in for the physical range `[base, base + buffer.len())`.
///
/// Every access is checked against the window.
#[derive(Debug)]
pub struct WindowMemory<'a> {
    base: u64,
    ptr: NonNull<u8>,
    len: usize,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a> WindowMemory<'a> {
    #[must_use]
    pub fn new(base: u64, buffer: &'a mut [u8]) -> Self {
        let len = buffer.len();
        Self {
            base,
            ptr: NonNull::from(buffer).cast::<u8>(),
            len,
            _buffer: PhantomData,
        }
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of `[address, address + len)` inside the window.
    fn offset(&self, address: u64, len: u64) -> Result<(usize, usize), LoadError> {
        let out_of_range = LoadError::TargetOutOfRange { address, len };
        let start = address
            .checked_sub(self.base)
            .and_then(|rel| usize::try_from(rel).ok())
            .ok_or(out_of_range)?;
        let count = usize::try_from(len).map_err(|_| out_of_range)?;
        match start.checked_add(count) {
            Some(end) if end <= self.len => Ok((start, count)),
            _ => Err(out_of_range),
        }
    }

    /// Inspect `len` bytes at physical `address`.
    #[must_use]
    pub fn bytes(&self, address: u64, len: u64) -> Option<&[u8]> {
        let (start, count) = self.offset(address, len).ok()?;
        // SAFETY: the range lies within the borrowed buffer.
        Some(unsafe { core::slice::from_raw_parts(self.ptr.as_ptr().add(start), count) })
    }
}

impl PhysicalMemory for WindowMemory<'_> {
    fn copy_in(&mut self, target: u64, bytes: &[u8]) -> Result<(), LoadError> {
        let (start, count) = self.offset(target, bytes.len() as u64)?;
        // SAFETY: the range lies within the borrowed buffer; `ptr::copy`
        // tolerates a source that aliases the window.
        unsafe { ptr::copy(bytes.as_ptr(), self.ptr.as_ptr().add(start), count) };
        Ok(())
    }

    fn zero(&mut self, target: u64, len: u64) -> Result<(), LoadError> {
        let (start, count) = self.offset(target, len)?;
        // SAFETY: the range lies within the borrowed buffer.
        unsafe { ptr::write_bytes(self.ptr.as_ptr().add(start), 0, count) };
        Ok(())
    }

    fn copy_within(&mut self, target: u64, source: u64, len: u64) -> Result<(), LoadError> {
        let (dst, count) = self.offset(target, len)?;
        let (src, _) = self.offset(source, len)?;
        // SAFETY: both ranges lie within the borrowed buffer.
        unsafe {
            ptr::copy(
                self.ptr.as_ptr().add(src),
                self.ptr.as_ptr().add(dst),
                count,
            );
        }
        Ok(())
    }

    unsafe fn image_at(&self, address: u64, len: u64) -> Result<RawImage, LoadError> {
        let (start, _) = self.offset(address, len)?;
        // SAFETY: inside the borrowed buffer; lifetime per this method's contract.
        Ok(unsafe { RawImage::new(self.ptr.add(start), len) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_translates_physical_addresses() {
        let mut buffer = [0xFFu8; 64];
        let mut memory = WindowMemory::new(0x1000, &mut buffer);
        memory.copy_in(0x1010, &[1, 2, 3]).unwrap();
        memory.zero(0x1020, 4).unwrap();
        assert_eq!(memory.bytes(0x1010, 3), Some(&[1u8, 2, 3][..]));
        assert_eq!(memory.bytes(0x1020, 4), Some(&[0u8; 4][..]));
        assert_eq!(memory.bytes(0x1013, 1), Some(&[0xFFu8][..]));
    }

    #[test]
    fn window_rejects_writes_outside() {
        let mut buffer = [0u8; 16];
        let mut memory = WindowMemory::new(0x1000, &mut buffer);
        assert_eq!(
            memory.copy_in(0xFFF, &[1]),
            Err(LoadError::TargetOutOfRange {
                address: 0xFFF,
                len: 1
            })
        );
        assert!(memory.zero(0x1008, 9).is_err());
        assert!(memory.zero(0x1008, 8).is_ok());
        assert!(memory.copy_within(0x1000, 0x1008, 9).is_err());
    }

    #[test]
    fn window_copy_within_handles_overlap() {
        let mut buffer = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut memory = WindowMemory::new(0, &mut buffer);
        memory.copy_within(2, 0, 4).unwrap();
        assert_eq!(memory.bytes(0, 8), Some(&[1u8, 2, 1, 2, 3, 4, 7, 8][..]));
    }

    #[test]
    fn identity_memory_writes_through_pointers() {
        let mut buffer = [0xEEu8; 8];
        let base = buffer.as_mut_ptr() as u64;
        let mut memory = unsafe { IdentityMemory::new() };
        memory.copy_in(base, &[1, 2]).unwrap();
        memory.zero(base + 2, 2).unwrap();
        memory.copy_within(base + 4, base, 2).unwrap();
        assert_eq!(buffer, [1, 2, 0, 0, 1, 2, 0xEE, 0xEE]);
    }

    #[test]
    fn identity_memory_refuses_null() {
        let mut memory = unsafe { IdentityMemory::new() };
        assert!(memory.copy_in(0, &[1]).is_err());
        assert!(memory.zero(0, 0).is_ok());
    }
}
