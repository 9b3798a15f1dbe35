//! Read descriptor passed through the device dispatch path.

/// A caller-supplied read request: an absolute byte offset into the
/// device plus a destination buffer to fill.
///
/// Modeled on the kernel's scatter/gather I/O descriptor, but restricted
/// to the single-segment read case the pmem devices support. The
/// descriptor tracks its own progress: [`copy_out`](Self::copy_out)
/// advances the offset and shrinks the residual count, so an engine can
/// satisfy a request in several page-sized installments.
#[derive(Debug)]
pub struct IoRequest<'a> {
    /// Absolute device offset of the next byte to produce.
    offset: u64,
    buf: &'a mut [u8],
    filled: usize,
}

impl<'a> IoRequest<'a> {
    /// A read of `buf.len()` bytes starting at device offset `offset`.
    pub fn new(offset: u64, buf: &'a mut [u8]) -> Self {
        Self {
            offset,
            buf,
            filled: 0,
        }
    }

    /// Device offset of the next byte to produce.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes the caller still wants.
    #[must_use]
    pub const fn resid(&self) -> usize {
        self.buf.len() - self.filled
    }

    /// Whether the request has been fully satisfied.
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        self.resid() == 0
    }

    /// Copy `src` (or as much of it as still fits) into the destination,
    /// advancing offset and residual. Returns the number of bytes taken.
    ///
    /// Copying an empty slice is a no-op; copying more than `resid()`
    /// silently truncates to the residual, mirroring the kernel
    /// `uiomove` contract.
    pub fn copy_out(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.resid());
        self.buf[self.filled..self.filled + n].copy_from_slice(&src[..n]);
        self.filled += n;
        self.offset += n as u64;
        n
    }

    /// The bytes produced so far.
    #[must_use]
    pub fn filled_bytes(&self) -> &[u8] {
        &self.buf[..self.filled]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_out_advances_offset_and_residual() {
        let mut buf = [0u8; 8];
        let mut io = IoRequest::new(100, &mut buf);
        assert_eq!(io.copy_out(&[1, 2, 3]), 3);
        assert_eq!(io.offset(), 103);
        assert_eq!(io.resid(), 5);
        assert_eq!(io.filled_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn copy_out_truncates_to_residual() {
        let mut buf = [0u8; 4];
        let mut io = IoRequest::new(0, &mut buf);
        assert_eq!(io.copy_out(&[9; 10]), 4);
        assert!(io.is_satisfied());
        assert_eq!(io.copy_out(&[7]), 0);
        assert_eq!(io.filled_bytes(), &[9; 4]);
    }

    #[test]
    fn empty_copy_is_a_noop() {
        let mut buf = [0u8; 4];
        let mut io = IoRequest::new(5, &mut buf);
        assert_eq!(io.copy_out(&[]), 0);
        assert_eq!(io.offset(), 5);
        assert_eq!(io.resid(), 4);
    }
}
