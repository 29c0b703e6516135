use crate::isa::MEMORY_SIZE;

/// Flat byte-addressed memory. Accessors return `None` past the end.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("size", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn read(&self, address: u32) -> Option<u8> {
        self.bytes.get(address as usize).copied()
    }

    pub fn write(&mut self, address: u32, value: u8) -> Option<()> {
        *self.bytes.get_mut(address as usize)? = value;
        Some(())
    }

    /// Big-endian 16-bit value at `address`.
    #[must_use]
    pub fn read_u16(&self, address: u32) -> Option<u16> {
        let high = self.read(address)?;
        let low = self.read(address.checked_add(1)?)?;
        Some(u16::from_be_bytes([high, low]))
    }

    /// Big-endian 32-bit word at `address`.
    #[must_use]
    pub fn read_word(&self, address: u32) -> Option<u32> {
        let start = address as usize;
        let bytes = self.bytes.get(start..start.checked_add(4)?)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Zeroes memory and copies `data` to `offset`. The caller checks that
    /// it fits.
    pub fn load(&mut self, offset: usize, data: &[u8]) {
        self.bytes.fill(0);
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut memory = Memory::new();
        assert_eq!(memory.len(), 4096);
        assert_eq!(memory.write(4095, 9), Some(()));
        assert_eq!(memory.read(4095), Some(9));
        assert_eq!(memory.read(4096), None);
        assert_eq!(memory.write(4096, 1), None);
        assert_eq!(memory.read_u16(4095), None);
        assert_eq!(memory.read_word(4093), None);
    }

    #[test]
    fn test_big_endian_reads() {
        let mut memory = Memory::new();
        memory.load(0x200, &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(memory.read_u16(0x200), Some(0x1234));
        assert_eq!(memory.read_word(0x200), Some(0x1234_5678));
    }

    #[test]
    fn test_load_clears_previous_contents() {
        let mut memory = Memory::new();
        memory.write(0, 1).unwrap();
        memory.load(0x200, &[]);
        assert_eq!(memory.read(0), Some(0));
    }
}
