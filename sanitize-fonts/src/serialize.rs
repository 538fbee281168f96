//! serializer
//!
//! An append-only, size-limited output buffer. Writes fail once the buffer
//! is out of room, and the failure is sticky: every later write reports the
//! same error flags.

use font_types::Scalar;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeErrorFlags(u16);

impl SerializeErrorFlags {
    pub const SERIALIZE_ERROR_NONE: Self = Self(0x0000);
    pub const SERIALIZE_ERROR_OTHER: Self = Self(0x0001);
    pub const SERIALIZE_ERROR_OUT_OF_ROOM: Self = Self(0x0004);
    pub const SERIALIZE_ERROR_INT_OVERFLOW: Self = Self(0x0008);

    /// Returns `true` if all of the flags in `other` are contained within `self`.
    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }
}

impl Default for SerializeErrorFlags {
    fn default() -> Self {
        Self::SERIALIZE_ERROR_NONE
    }
}

impl std::ops::BitOrAssign for SerializeErrorFlags {
    /// Adds the set of flags.
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::Not for SerializeErrorFlags {
    type Output = bool;
    #[inline]
    fn not(self) -> bool {
        self == SerializeErrorFlags::SERIALIZE_ERROR_NONE
    }
}

impl std::fmt::Display for SerializeErrorFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.contains(Self::SERIALIZE_ERROR_OUT_OF_ROOM) {
            write!(f, "out of room")
        } else if self.contains(Self::SERIALIZE_ERROR_INT_OVERFLOW) {
            write!(f, "integer overflow")
        } else if !*self {
            write!(f, "no error")
        } else {
            write!(f, "error flags 0x{:04X}", self.0)
        }
    }
}

#[derive(Debug, Default)]
pub struct Serializer {
    head: usize,
    end: usize,
    errors: SerializeErrorFlags,
    data: Vec<u8>,
}

impl Serializer {
    /// Create a serializer that accepts at most `size` bytes.
    ///
    /// The buffer grows on demand; `size` is a limit, not an allocation.
    pub fn new(size: usize) -> Self {
        Serializer {
            end: size,
            ..Default::default()
        }
    }

    // Embed a single Scalar type
    pub fn embed(&mut self, obj: impl Scalar) -> Result<usize, SerializeErrorFlags> {
        let raw = obj.to_raw();
        self.embed_bytes(raw.as_ref())
    }

    /// Append a run of raw bytes, returning the position they were written at.
    pub fn embed_bytes(&mut self, bytes: &[u8]) -> Result<usize, SerializeErrorFlags> {
        let ret = self.allocate_size(bytes.len())?;
        self.data[ret..ret + bytes.len()].copy_from_slice(bytes);
        Ok(ret)
    }

    /// Append `len` zero bytes.
    pub fn embed_zeros(&mut self, len: usize) -> Result<usize, SerializeErrorFlags> {
        self.allocate_size(len)
    }

    // Allocate size; newly allocated bytes are zeroed
    pub fn allocate_size(&mut self, size: usize) -> Result<usize, SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }

        if size > u32::MAX as usize || self.end - self.head < size {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OUT_OF_ROOM));
        }

        let ret = self.head;
        self.head += size;
        self.data.resize(self.head, 0);
        Ok(ret)
    }

    /// Overwrite a previously written value at `pos`.
    pub fn copy_assign(&mut self, pos: usize, obj: impl Scalar) -> Result<(), SerializeErrorFlags> {
        if self.in_error() {
            return Err(self.errors);
        }
        let raw = obj.to_raw();
        let bytes = raw.as_ref();
        let Some(dest) = pos
            .checked_add(bytes.len())
            .and_then(|end| self.data.get_mut(pos..end))
        else {
            return Err(self.set_err(SerializeErrorFlags::SERIALIZE_ERROR_OTHER));
        };
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// The number of bytes written so far.
    pub fn len(&self) -> usize {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == 0
    }

    pub fn successful(&self) -> bool {
        !self.errors
    }

    pub fn in_error(&self) -> bool {
        !!self.errors
    }

    pub fn errors(&self) -> SerializeErrorFlags {
        self.errors
    }

    pub fn set_err(&mut self, error_type: SerializeErrorFlags) -> SerializeErrorFlags {
        self.errors |= error_type;
        self.errors
    }

    pub fn copy_bytes(self) -> Result<Vec<u8>, SerializeErrorFlags> {
        if !self.successful() {
            return Err(self.errors);
        }
        Ok(self.data)
    }
}
