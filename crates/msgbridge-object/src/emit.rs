//! Object-file emission of published descriptor storage.
//!
//! Every exported custom class gets a zero-filled, globally visible data symbol of exactly one
//! descriptor in size. The runtime fills it during the class's static initialization.

use msgbridge_core::TargetInfo;
use msgbridge_model::DescriptorExport;
use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};
use tracing::debug;

use crate::errors::{EmitErrorKind, EmitResult};
use crate::layout::DescriptorLayout;

/// Symbol holding the classes a framework preloads when it is opened.
pub const FRAMEWORK_PRELOAD_SYMBOL: &str = "msgbridge_framework_preload_classes";

/// NUL-terminated internal class names followed by a final NUL, or `None` when nothing is exported.
pub fn framework_preload_blob(exports: &[DescriptorExport]) -> Option<Vec<u8>> {
    if exports.is_empty() {
        return None;
    }
    let mut blob = Vec::new();
    for export in exports {
        blob.extend_from_slice(export.class.as_str().replace('.', "/").as_bytes());
        blob.push(0);
    }
    blob.push(0);
    Some(blob)
}

/// Build a relocatable object defining one descriptor symbol per export.
pub fn emit_descriptors(
    target: &TargetInfo,
    layout: &DescriptorLayout,
    exports: &[DescriptorExport],
    framework: bool,
) -> EmitResult<Vec<u8>> {
    let (format, arch, endianness) = object_format(target)?;
    let mut object = Object::new(format, arch, endianness);
    let section = object.section_id(StandardSection::Data);
    let width = target.pointer_width;
    let zeros = vec![0u8; layout.size(width)];

    for export in exports {
        let symbol = object.add_symbol(data_symbol(&export.symbol));
        object.add_symbol_data(symbol, section, &zeros, width.bytes() as u64);
        debug!(symbol = %export.symbol, size = zeros.len(), "emitted descriptor storage");
    }

    if framework {
        if let Some(blob) = framework_preload_blob(exports) {
            let symbol = object.add_symbol(data_symbol(FRAMEWORK_PRELOAD_SYMBOL));
            object.add_symbol_data(symbol, section, &blob, 1);
        }
    }

    Ok(object.write()?)
}

fn data_symbol(name: &str) -> Symbol {
    Symbol {
        name: name.as_bytes().to_vec(),
        value: 0,
        size: 0,
        kind: SymbolKind::Data,
        scope: SymbolScope::Dynamic,
        weak: false,
        section: SymbolSection::Undefined,
        flags: SymbolFlags::None,
    }
}

fn object_format(target: &TargetInfo) -> EmitResult<(BinaryFormat, Architecture, Endianness)> {
    use target_lexicon::{Architecture as Arch, BinaryFormat as Format, Endianness as Endian};

    let unsupported = || EmitErrorKind::UnsupportedTarget(target.triple.to_string());
    let format = match target.binary_format {
        Format::Elf => BinaryFormat::Elf,
        Format::Macho => BinaryFormat::MachO,
        Format::Coff => BinaryFormat::Coff,
        _ => return Err(unsupported().into()),
    };
    let arch = match target.architecture {
        Arch::X86_64 => Architecture::X86_64,
        Arch::X86_32(_) => Architecture::I386,
        Arch::Aarch64(_) => Architecture::Aarch64,
        Arch::Arm(_) => Architecture::Arm,
        _ => return Err(unsupported().into()),
    };
    let endianness = match target.endianness {
        Endian::Little => Endianness::Little,
        Endian::Big => Endianness::Big,
    };
    Ok((format, arch, endianness))
}
