//! # Image Sources

use crate::error::LoadError;
use core::ptr::NonNull;

/// Read access to a complete ELF file.
pub trait ImageSource {
    /// Borrow `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// [`LoadError::ImageOutOfBounds`] if the range exceeds the image.
    fn read(&self, offset: u64, len: u64) -> Result<&[u8], LoadError>;

    /// Size of the image in bytes.
    fn size(&self) -> u64;

    /// Whether `[offset, offset + len)` lies inside the image.
    fn contains(&self, offset: u64, len: u64) -> bool {
        offset
            .checked_add(len)
            .is_some_and(|end| end <= self.size())
    }
}

impl ImageSource for [u8] {
    fn read(&self, offset: u64, len: u64) -> Result<&[u8], LoadError> {
        let oob = LoadError::ImageOutOfBounds { offset, len };
        let start = usize::try_from(offset).map_err(|_| oob)?;
        let count = usize::try_from(len).map_err(|_| oob)?;
        let end = start.checked_add(count).ok_or(oob)?;
        self.get(start..end).ok_or(oob)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// An image addressed by a raw pointer, e.g. a boot module staged in
/// physical memory.
#[derive(Debug, Copy, Clone)]
pub struct RawImage {
    base: NonNull<u8>,
    len: u64,
}

impl RawImage {
    /// # Safety
    /// `len` bytes at `base` must be readable for as long as the image is used.
    #[must_use]
    pub const unsafe fn new(base: NonNull<u8>, len: u64) -> Self {
        Self { base, len }
    }

    #[must_use]
    pub const fn base(&self) -> NonNull<u8> {
        self.base
    }
}

impl ImageSource for RawImage {
    fn read(&self, offset: u64, len: u64) -> Result<&[u8], LoadError> {
        let oob = LoadError::ImageOutOfBounds { offset, len };
        if !self.contains(offset, len) {
            return Err(oob);
        }
        let start = usize::try_from(offset).map_err(|_| oob)?;
        let count = usize::try_from(len).map_err(|_| oob)?;
        // SAFETY: the range was checked against the length the constructor
        // vouched for.
        Ok(unsafe { core::slice::from_raw_parts(self.base.as_ptr().add(start), count) })
    }

    fn size(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_reads_are_bounds_checked() {
        let bytes = [1u8, 2, 3, 4];
        let image: &[u8] = &bytes;
        assert_eq!(image.read(1, 2), Ok(&bytes[1..3]));
        assert_eq!(
            image.read(3, 2),
            Err(LoadError::ImageOutOfBounds { offset: 3, len: 2 })
        );
        assert_eq!(
            image.read(u64::MAX, 2),
            Err(LoadError::ImageOutOfBounds {
                offset: u64::MAX,
                len: 2
            })
        );
    }

    #[test]
    fn raw_image_checks_reads() {
        let bytes = [9u8; 16];
        let base = NonNull::from(&bytes).cast::<u8>();
        let image = unsafe { RawImage::new(base, 16) };
        assert_eq!(image.read(8, 8).unwrap(), &[9u8; 8]);
        assert!(image.read(8, 9).is_err());
        assert!(image.read(u64::MAX, 1).is_err());
        assert_eq!(image.size(), 16);
    }

    #[test]
    fn containment_handles_overflow() {
        let image: &[u8] = &[0; 8];
        assert!(ImageSource::contains(image, 0, 8));
        assert!(ImageSource::contains(image, 8, 0));
        assert!(!ImageSource::contains(image, 4, 5));
        assert!(!ImageSource::contains(image, 1, u64::MAX));
    }
}
