//! Address spaces the engine reads source structures from.

/// Base address of [`SimMemory`], in the kernel direct-map range.
pub const SIM_BASE: u64 = 0xffff_8880_0000_0000;

/// Unmapped bytes left before every simulated allocation.
const GUARD: u64 = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("{len} bytes at {address:#x} are not mapped")]
    Unmapped { address: u64, len: usize },
    #[error("simulated address space exhausted allocating {size} bytes")]
    Exhausted { size: usize },
}

/// Read access to the address space being captured.
///
/// The engine assumes the view is stable for the duration of a run.
pub trait SourceMemory {
    /// Fill `buf` with the bytes at `address`.
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    fn is_readable(&self, address: u64, len: usize) -> bool;

    fn read_u64(&self, address: u64) -> Result<u64, MemoryError> {
        let mut raw = [0u8; 8];
        self.read(address, &mut raw)?;
        Ok(u64::from_le_bytes(raw))
    }
}

/// Simulated address space with a zeroing bump allocator.
///
/// Allocations are separated by unmapped guard gaps, so reads that stray
/// past an object fail the way they would on a real kernel heap.
#[derive(Debug, Clone)]
pub struct SimMemory {
    base: u64,
    bytes: Vec<u8>,
    /// `(start, len)` of every allocation, ordered by start.
    regions: Vec<(u64, usize)>,
}

impl Default for SimMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SimMemory {
    pub fn new() -> Self {
        Self::with_base(SIM_BASE)
    }

    pub fn with_base(base: u64) -> Self {
        Self {
            base,
            bytes: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Allocate `size` zeroed bytes aligned to `align`.
    pub fn alloc(&mut self, size: usize, align: usize) -> Result<u64, MemoryError> {
        let align = align.max(1) as u64;
        let end = self.base + self.bytes.len() as u64;
        let start = end
            .checked_add(GUARD + align - 1)
            .map(|v| v & !(align - 1))
            .ok_or(MemoryError::Exhausted { size })?;
        let used = (start - self.base) as usize + size;
        self.bytes
            .try_reserve(used - self.bytes.len())
            .map_err(|_| MemoryError::Exhausted { size })?;
        self.bytes.resize(used, 0);
        self.regions.push((start, size));
        Ok(start)
    }

    /// Allocate a copy of `text` with its NUL terminator.
    pub fn alloc_cstr(&mut self, text: &str) -> Result<u64, MemoryError> {
        let address = self.alloc(text.len() + 1, 1)?;
        self.write_cstr(address, text)?;
        Ok(address)
    }

    pub fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let start = self.locate(address, bytes.len())?;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_u32(&mut self, address: u64, value: u32) -> Result<(), MemoryError> {
        self.write(address, &value.to_le_bytes())
    }

    pub fn write_u64(&mut self, address: u64, value: u64) -> Result<(), MemoryError> {
        self.write(address, &value.to_le_bytes())
    }

    pub fn write_cstr(&mut self, address: u64, text: &str) -> Result<(), MemoryError> {
        self.write(address, text.as_bytes())?;
        self.write(address + text.len() as u64, &[0])
    }

    /// Number of live allocations.
    pub fn allocations(&self) -> usize {
        self.regions.len()
    }

    /// Index into `bytes` of a range lying inside one allocation.
    fn locate(&self, address: u64, len: usize) -> Result<usize, MemoryError> {
        let unmapped = MemoryError::Unmapped { address, len };
        let idx = self.regions.partition_point(|&(start, _)| start <= address);
        let Some(&(start, size)) = idx.checked_sub(1).map(|i| &self.regions[i]) else {
            return Err(unmapped);
        };
        let end = address.checked_add(len as u64).ok_or(unmapped.clone())?;
        if end > start + size as u64 {
            return Err(unmapped);
        }
        Ok((address - self.base) as usize)
    }
}

impl SourceMemory for SimMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let start = self.locate(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn is_readable(&self, address: u64, len: usize) -> bool {
        self.locate(address, len).is_ok()
    }
}

/// The current process's own memory, read through raw pointers.
#[derive(Debug)]
pub struct LocalMemory {
    _private: (),
}

impl LocalMemory {
    /// # Safety
    /// Every address the engine reaches from the captured roots, through
    /// the descriptors in use, must be valid for reads of the described size
    /// and must not be written to while a run is in progress.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl SourceMemory for LocalMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        if !self.is_readable(address, buf.len()) {
            return Err(MemoryError::Unmapped {
                address,
                len: buf.len(),
            });
        }
        // SAFETY: validity of reachable addresses is the contract of `new`.
        unsafe {
            std::ptr::copy_nonoverlapping(address as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn is_readable(&self, address: u64, len: usize) -> bool {
        address != 0 && address.checked_add(len as u64).is_some()
    }
}
