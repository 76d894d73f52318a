//! Versioned layouts of the descriptor block published for custom classes.

use msgbridge_core::PointerWidth;
use target_lexicon::Endianness;

use crate::errors::{EmitErrorKind, EmitResult};

/// A descriptor made of pointer-sized words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorLayout {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

/// The foreign runtime's class structure: isa, superclass, cache, vtable and data pointers.
pub const CLASS_DESCRIPTOR_V1: DescriptorLayout = DescriptorLayout {
    name: "class_descriptor_v1",
    fields: &["isa", "superclass", "cache", "vtable", "data"],
};

impl DescriptorLayout {
    pub fn size(&self, width: PointerWidth) -> usize {
        self.fields.len() * width.bytes()
    }

    /// Byte offset of `field`, if the layout has it.
    pub fn offset_of(&self, field: &str, width: PointerWidth) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| *f == field)
            .map(|index| index * width.bytes())
    }

    /// Serialize one word per field. Words wider than the pointer width are truncated.
    pub fn encode(&self, words: &[u64], width: PointerWidth, endianness: Endianness) -> EmitResult<Vec<u8>> {
        if words.len() != self.fields.len() {
            return Err(self.mismatch(words.len() * width.bytes(), width));
        }
        let mut out = Vec::with_capacity(self.size(width));
        for &word in words {
            match (width, endianness) {
                (PointerWidth::U64, Endianness::Little) => out.extend_from_slice(&word.to_le_bytes()),
                (PointerWidth::U64, Endianness::Big) => out.extend_from_slice(&word.to_be_bytes()),
                (PointerWidth::U32, Endianness::Little) => out.extend_from_slice(&(word as u32).to_le_bytes()),
                (PointerWidth::U32, Endianness::Big) => out.extend_from_slice(&(word as u32).to_be_bytes()),
            }
        }
        Ok(out)
    }

    pub fn decode(&self, bytes: &[u8], width: PointerWidth, endianness: Endianness) -> EmitResult<Vec<u64>> {
        if bytes.len() != self.size(width) {
            return Err(self.mismatch(bytes.len(), width));
        }
        let words = bytes
            .chunks_exact(width.bytes())
            .map(|chunk| {
                let mut buf = [0u8; 8];
                match endianness {
                    Endianness::Little => {
                        buf[..chunk.len()].copy_from_slice(chunk);
                        u64::from_le_bytes(buf)
                    }
                    Endianness::Big => {
                        buf[8 - chunk.len()..].copy_from_slice(chunk);
                        u64::from_be_bytes(buf)
                    }
                }
            })
            .collect();
        Ok(words)
    }

    /// Copy a live descriptor into published storage. Both sides must be exactly one layout in size.
    pub fn copy_descriptor(&self, width: PointerWidth, src: &[u8], dst: &mut [u8]) -> EmitResult<()> {
        let expected = self.size(width);
        for found in [src.len(), dst.len()] {
            if found != expected {
                return Err(self.mismatch(found, width));
            }
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn mismatch(&self, found: usize, width: PointerWidth) -> crate::errors::EmitError {
        EmitErrorKind::LayoutMismatch {
            layout: self.name,
            expected: self.size(width),
            found,
        }
        .into()
    }
}
