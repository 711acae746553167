//! Entry types for the scatter request builder.

use strum::{Display, IntoStaticStr};

/// Semantic tag selecting the decode routine for an entry.
///
/// Fixed-size tags carry their own byte size; the rest take it from the
/// entry's size source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum TypeTag {
    /// 64-bit pointer. A decoded zero is a failure, not a value.
    Ptr,
    I32,
    F32,
    Bool,
    /// Two packed little-endian f32s.
    Vec2,
    /// Fixed-length opaque buffer, passed through undecoded.
    Bytes,
    /// Single-byte-codec string, truncated at the first terminator.
    Str,
    /// UTF-16 string, trailing terminators trimmed.
    WStr,
    /// Packed little-endian i32 sequence.
    I32List,
    /// Packed 16-byte (4 x f32) records.
    Vec4List,
}

impl TypeTag {
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            TypeTag::Ptr => Some(8),
            TypeTag::I32 | TypeTag::F32 => Some(4),
            TypeTag::Bool => Some(1),
            TypeTag::Vec2 => Some(8),
            TypeTag::Bytes
            | TypeTag::Str
            | TypeTag::WStr
            | TypeTag::I32List
            | TypeTag::Vec4List => None,
        }
    }
}

/// Opaque reference to an entry in a [`ScatterMap`](crate::ScatterMap).
///
/// Handles from an earlier round can serve as the address or size source
/// of a later round's entry, forming an explicit cross-round dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle(pub(crate) usize);

/// Where an entry's address comes from.
#[derive(Debug, Clone, Copy)]
pub enum AddressSource {
    /// Absolute virtual address.
    Literal(u64),
    /// An earlier round's decoded pointer. A failed reference resolves to
    /// zero and the dependent entry is skipped.
    FromEntry(EntryHandle),
}

impl From<u64> for AddressSource {
    fn from(addr: u64) -> Self {
        AddressSource::Literal(addr)
    }
}

impl From<EntryHandle> for AddressSource {
    fn from(handle: EntryHandle) -> Self {
        AddressSource::FromEntry(handle)
    }
}

/// Where an entry's size comes from.
#[derive(Debug, Clone, Copy, Default)]
pub enum SizeSource {
    /// The type tag's intrinsic size.
    #[default]
    Fixed,
    Literal(usize),
    /// An earlier round's decoded i32. A failed or non-positive reference
    /// resolves to zero and the dependent entry is skipped.
    FromEntry(EntryHandle),
}

impl From<usize> for SizeSource {
    fn from(size: usize) -> Self {
        SizeSource::Literal(size)
    }
}

impl From<EntryHandle> for SizeSource {
    fn from(handle: EntryHandle) -> Self {
        SizeSource::FromEntry(handle)
    }
}

/// Decoded result of one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ScatterValue {
    Ptr(u64),
    I32(i32),
    F32(f32),
    Bool(bool),
    Vec2([f32; 2]),
    Bytes(Vec<u8>),
    Str(String),
    I32List(Vec<i32>),
    Vec4List(Vec<[f32; 4]>),
}

impl ScatterValue {
    pub fn as_ptr(&self) -> Option<u64> {
        match self {
            ScatterValue::Ptr(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ScatterValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ScatterValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScatterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            ScatterValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScatterValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScatterValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32_list(&self) -> Option<&[i32]> {
        match self {
            ScatterValue::I32List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec4_list(&self) -> Option<&[[f32; 4]]> {
        match self {
            ScatterValue::Vec4List(v) => Some(v),
            _ => None,
        }
    }

    /// Address this value contributes when referenced as an address source.
    pub(crate) fn as_address(&self) -> Option<u64> {
        self.as_ptr()
    }

    /// Element count this value contributes when referenced as a size source.
    pub(crate) fn as_size(&self) -> Option<usize> {
        match self {
            ScatterValue::I32(v) if *v > 0 => Some(*v as usize),
            _ => None,
        }
    }
}

/// One typed read request within a round. Construct through
/// [`ScatterRound::add_entry`](crate::scatter::ScatterRound::add_entry).
#[derive(Debug, Clone)]
pub struct ScatterEntry {
    /// Caller-side grouping key, typically a loop index.
    pub group: usize,
    /// Identifier of the entry's purpose within its group.
    pub id: u32,
    pub addr: AddressSource,
    /// Added to the resolved address, useful when `addr` references an
    /// earlier entry.
    pub offset: u64,
    pub size: SizeSource,
    /// Multiplies the resolved size (UTF-16 strings read length * 2).
    pub size_mult: usize,
    pub tag: TypeTag,
    pub(crate) result: Option<ScatterValue>,
}

impl ScatterEntry {
    /// Decoded value, or `None` for skipped and failed entries.
    pub fn result(&self) -> Option<&ScatterValue> {
        self.result.as_ref()
    }
}
