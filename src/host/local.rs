//! This module contains a [`ProcessMemory`] backend for the current process.
//!
//! Writes temporarily lift the page protection of the target byte, the same way an in-process debugger stub or
//! a loader hook would patch read-only code, and put the original protection back afterwards.

use std::ptr;

use region::Protection;

use super::ProcessMemory;
use crate::error::LocalMemoryError;

/// Byte access to the memory of the current process
pub struct LocalMemory {
    /// Only constructible through [`LocalMemory::new`]
    _private: (),
}

impl LocalMemory {
    /// Creates a new [`LocalMemory`]
    ///
    /// # Safety
    ///
    /// Every address passed to [`ProcessMemory::write_byte`] must be memory that is not tracked by Rust,
    /// or that can be changed without Rust observing it (e.g. code or data of a module loaded by the host).
    /// Reads are checked against the page protection, writes are not restricted beyond the address being mapped.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Converts a debuggee address to a pointer, rejecting addresses this process can't represent
    fn pointer(address: u64) -> Result<*mut u8, LocalMemoryError> {
        usize::try_from(address)
            .map(|a| a as *mut u8)
            .map_err(|_| LocalMemoryError::OutOfRange(address))
    }
}

impl ProcessMemory for LocalMemory {
    type Error = LocalMemoryError;

    fn read_byte(&self, address: u64) -> Result<u8, Self::Error> {
        let location = Self::pointer(address)?;
        let region = region::query(location as *const u8)?;
        if region.is_guarded() || !region.protection().contains(Protection::READ) {
            return Err(LocalMemoryError::NotReadable(address));
        }
        // Safety: the page is mapped and readable
        Ok(unsafe { ptr::read_volatile(location) })
    }

    fn write_byte(&mut self, address: u64, value: u8) -> Result<(), Self::Error> {
        let location = Self::pointer(address)?;
        // Safety: the guard restores the previous protection when dropped, and the caller of `new` vouched for the target
        unsafe {
            let _guard = region::protect_with_handle(location, 1, Protection::READ_WRITE_EXECUTE)?;
            ptr::write_volatile(location, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use region::Protection;

    use super::LocalMemory;
    use crate::error::LocalMemoryError;
    use crate::host::ProcessMemory;

    #[test]
    /// Test read and write on ordinary heap memory
    fn test_read_write() {
        let mut data = Box::new([1u8, 2, 3, 4]);
        let base = data.as_mut_ptr() as u64;

        let mut memory = unsafe { LocalMemory::new() };

        // sanity check
        assert_eq!(memory.read_byte(base + 2).unwrap(), 3);

        memory.write_byte(base + 2, 9).unwrap();

        // only the targeted byte changes
        assert_eq!(*data, [1, 2, 9, 4]);
    }

    #[test]
    /// Tests that read-only pages get written and their protection is put back afterwards
    fn test_perms() {
        let mut allocation = region::alloc(region::page::size(), Protection::READ_WRITE).unwrap();
        let ptr = allocation.as_mut_ptr::<u8>();
        unsafe {
            ptr.write(0x90);
            region::protect(ptr, 1, Protection::READ).unwrap();
        }
        let address = ptr as u64;

        let mut memory = unsafe { LocalMemory::new() };
        assert_eq!(memory.read_byte(address).unwrap(), 0x90);

        memory.write_byte(address, 0xEB).unwrap();
        assert_eq!(memory.read_byte(address).unwrap(), 0xEB);

        // make sure permissions reverted correctly after the write
        let region = region::query(ptr as *const u8).unwrap();
        assert_eq!(region.protection(), Protection::READ);
    }

    #[test]
    /// Pages without read access are refused instead of faulting
    fn test_unreadable() {
        let allocation = region::alloc(region::page::size(), Protection::NONE).unwrap();
        let address = allocation.as_ptr::<u8>() as u64;

        let memory = unsafe { LocalMemory::new() };
        assert!(matches!(
            memory.read_byte(address),
            Err(LocalMemoryError::NotReadable(a)) if a == address
        ));
    }
}
