//! Primitive type tags
//!
//! Every stack slot and tape cell carries a `TypeTag` next to its word. The
//! interpreter enforces that binary operands agree on their tag; the TAC
//! backend records one tag per temp and lets `Unknown` flow through.

use crate::word::Word;
use std::fmt;
use std::str::FromStr;

/// Tag describing how the word next to it is to be interpreted.
///
/// `Ptr` values are non-negative tape indices. `Void` marks slots that carry
/// no payload (an empty `return`). `Unknown` is the absence of information
/// and is only produced by the lowering backend, never by the parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TypeTag {
    #[default]
    Unknown,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    Ptr,
    Void,
}

impl TypeTag {
    /// All tags in encoding order. The bytecode stores a tag as its index
    /// into this table.
    pub const ALL: [TypeTag; 14] = [
        TypeTag::Unknown,
        TypeTag::I8,
        TypeTag::U8,
        TypeTag::I16,
        TypeTag::U16,
        TypeTag::I32,
        TypeTag::U32,
        TypeTag::I64,
        TypeTag::U64,
        TypeTag::F32,
        TypeTag::F64,
        TypeTag::Bool,
        TypeTag::Ptr,
        TypeTag::Void,
    ];

    /// Decode a tag from its bytecode word.
    pub fn from_word(w: Word) -> Option<TypeTag> {
        usize::try_from(w).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// The bytecode word encoding this tag.
    pub fn to_word(self) -> Word {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0) as Word
    }

    /// Bit width of the integer tags. Floats report their storage width;
    /// `Bool`, `Ptr`, `Void` and `Unknown` have no meaningful width.
    pub fn bits(self) -> Option<u32> {
        match self {
            TypeTag::I8 | TypeTag::U8 => Some(8),
            TypeTag::I16 | TypeTag::U16 => Some(16),
            TypeTag::I32 | TypeTag::U32 | TypeTag::F32 => Some(32),
            TypeTag::I64 | TypeTag::U64 | TypeTag::F64 => Some(64),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeTag::F32 | TypeTag::F64)
    }

    /// Tags printed as unsigned integers.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeTag::U8 | TypeTag::U16 | TypeTag::U32 | TypeTag::U64
        )
    }

    /// Normalize an immediate for storage under this tag: signed integers
    /// are truncated then sign-extended, unsigned ones masked to width.
    /// Floats and the widthless tags pass through untouched.
    pub fn normalize(self, w: Word) -> Word {
        match self {
            TypeTag::I8 => w as i8 as Word,
            TypeTag::I16 => w as i16 as Word,
            TypeTag::I32 => w as i32 as Word,
            TypeTag::U8 => w & 0xFF,
            TypeTag::U16 => w & 0xFFFF,
            TypeTag::U32 => w & 0xFFFF_FFFF,
            TypeTag::Bool => Word::from(w != 0),
            _ => w,
        }
    }
}

impl FromStr for TypeTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i8" => Ok(TypeTag::I8),
            "u8" => Ok(TypeTag::U8),
            "i16" => Ok(TypeTag::I16),
            "u16" => Ok(TypeTag::U16),
            "i32" => Ok(TypeTag::I32),
            "u32" => Ok(TypeTag::U32),
            "i64" => Ok(TypeTag::I64),
            "u64" => Ok(TypeTag::U64),
            "f32" => Ok(TypeTag::F32),
            "f64" => Ok(TypeTag::F64),
            "bool" => Ok(TypeTag::Bool),
            "ptr" => Ok(TypeTag::Ptr),
            "void" => Ok(TypeTag::Void),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Unknown => "unknown",
            TypeTag::I8 => "i8",
            TypeTag::U8 => "u8",
            TypeTag::I16 => "i16",
            TypeTag::U16 => "u16",
            TypeTag::I32 => "i32",
            TypeTag::U32 => "u32",
            TypeTag::I64 => "i64",
            TypeTag::U64 => "u64",
            TypeTag::F32 => "f32",
            TypeTag::F64 => "f64",
            TypeTag::Bool => "bool",
            TypeTag::Ptr => "ptr",
            TypeTag::Void => "void",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_encoding_round_trips() {
        for tag in TypeTag::ALL {
            assert_eq!(TypeTag::from_word(tag.to_word()), Some(tag));
        }
        assert_eq!(TypeTag::from_word(-1), None);
        assert_eq!(TypeTag::from_word(TypeTag::ALL.len() as Word), None);
    }

    #[test]
    fn names_round_trip_through_display() {
        for tag in &TypeTag::ALL[1..] {
            assert_eq!(tag.to_string().parse::<TypeTag>(), Ok(*tag));
        }
        assert!("unknown".parse::<TypeTag>().is_err());
        assert!("int".parse::<TypeTag>().is_err());
    }

    #[test]
    fn normalize_extends_and_masks() {
        assert_eq!(TypeTag::I8.normalize(0xFF), -1);
        assert_eq!(TypeTag::U8.normalize(-1), 0xFF);
        assert_eq!(TypeTag::I16.normalize(0x8000), -32768);
        assert_eq!(TypeTag::U32.normalize(-1), 0xFFFF_FFFF);
        assert_eq!(TypeTag::Bool.normalize(42), 1);
        assert_eq!(TypeTag::I64.normalize(-5), -5);
    }
}
