//! Field offset tables for the decoded structures.
//!
//! Every structure kind has one constant [`FieldLayout`] mapping a symbolic field to its
//! offset and width. The two optional header variants differ only in their tables.

use crate::{errors::*, types::DataDirectoryType, view::*};

/// Width of a field in bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Qword,
}
impl Width {
    pub const fn size(&self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Dword => 4,
            Width::Qword => 8,
        }
    }
}

/// Offset and width of a field inside its structure.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldSpan {
    pub offset: usize,
    pub width:  Width,
}
impl FieldSpan {
    pub const fn end(&self) -> usize { self.offset + self.width.size() }
}

const fn at(offset: usize, width: Width) -> FieldSpan { FieldSpan { offset, width } }

/// Immutable mapping from field identifiers to their spans in one structure kind.
#[derive(Debug)]
pub struct FieldLayout<F: 'static> {
    name:    &'static str,
    entries: &'static [(F, FieldSpan)],
}
impl<F: Copy + Eq> FieldLayout<F> {
    pub const fn new(name: &'static str, entries: &'static [(F, FieldSpan)]) -> Self {
        Self { name, entries }
    }

    pub fn name(&self) -> &'static str { self.name }

    /// Returns the span of a field, or `None` if the structure doesn't contain it.
    pub fn get(&self, field: F) -> Option<FieldSpan> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == field)
            .map(|(_, span)| *span)
    }

    pub fn contains(&self, field: F) -> bool { self.get(field).is_some() }

    /// Returns the number of bytes covered by the layout.
    pub fn size(&self) -> usize { self.entries.iter().map(|(_, span)| span.end()).max().unwrap_or(0) }

    pub fn iter(&self) -> impl Iterator<Item = (F, FieldSpan)> + '_ { self.entries.iter().copied() }

    /// Read an unsigned field. A field absent from the layout reads as zero.
    pub fn read(&self, view: &ByteOrderView, field: F) -> Result<u64, ViewError> {
        match self.get(field) {
            Some(span) => view.read_unsigned(span),
            None => Ok(0),
        }
    }

    /// Returns the offset of a field the structure is known to contain.
    pub(crate) fn offset(&self, field: F) -> usize { self.get(field).map_or(0, |span| span.offset) }
}

/// File header fields.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CoffField {
    Machine,
    NumberOfSections,
    TimeDateStamp,
    PointerToSymbolTable,
    NumberOfSymbols,
    SizeOfOptionalHeader,
    Characteristics,
}

/// Optional header fields, shared by both variants except for `BaseOfData`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OptionalField {
    Magic,
    MajorLinkerVersion,
    MinorLinkerVersion,
    SizeOfCode,
    SizeOfInitializedData,
    SizeOfUninitializedData,
    AddressOfEntryPoint,
    BaseOfCode,
    BaseOfData,
    ImageBase,
    SectionAlignment,
    FileAlignment,
    MajorOperatingSystemVersion,
    MinorOperatingSystemVersion,
    MajorImageVersion,
    MinorImageVersion,
    MajorSubsystemVersion,
    MinorSubsystemVersion,
    Win32VersionValue,
    SizeOfImage,
    SizeOfHeaders,
    CheckSum,
    Subsystem,
    DllCharacteristics,
    SizeOfStackReserve,
    SizeOfStackCommit,
    SizeOfHeapReserve,
    SizeOfHeapCommit,
    LoaderFlags,
    NumberOfRvaAndSizes,
    Directory(DataDirectoryType),
}

/// Section header fields.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SectionField {
    Name,
    VirtualSize,
    VirtualAddress,
    SizeOfRawData,
    PointerToRawData,
    PointerToRelocations,
    PointerToLinenumbers,
    NumberOfRelocations,
    NumberOfLinenumbers,
    Characteristics,
}

/// Export directory table fields.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ExportField {
    ExportFlags,
    TimeDateStamp,
    MajorVersion,
    MinorVersion,
    NameRva,
    OrdinalBase,
    AddressTableEntries,
    NumberOfNamePointers,
    ExportAddressTableRva,
    NamePointerRva,
    OrdinalTableRva,
}

const COFF_HEADER_FIELDS: [(CoffField, FieldSpan); 7] = [
    (CoffField::Machine, at(0, Width::Word)),
    (CoffField::NumberOfSections, at(2, Width::Word)),
    (CoffField::TimeDateStamp, at(4, Width::Dword)),
    (CoffField::PointerToSymbolTable, at(8, Width::Dword)),
    (CoffField::NumberOfSymbols, at(12, Width::Dword)),
    (CoffField::SizeOfOptionalHeader, at(16, Width::Word)),
    (CoffField::Characteristics, at(18, Width::Word)),
];

macro_rules! directories {
    ($base:expr) => {
        [
            (OptionalField::Directory(DataDirectoryType::ExportTable), at($base, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::ImportTable), at($base + 8, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::ResourceTable), at($base + 16, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::ExceptionTable), at($base + 24, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::CertificateTable), at($base + 32, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::BaseRelocationTable), at($base + 40, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::Debug), at($base + 48, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::Architecture), at($base + 56, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::GlobalPtr), at($base + 64, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::TLSTable), at($base + 72, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::LoadConfigTable), at($base + 80, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::BoundImport), at($base + 88, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::IAT), at($base + 96, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::DelayImportDescriptor), at($base + 104, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::CLRRuntimeHeader), at($base + 112, Width::Qword)),
            (OptionalField::Directory(DataDirectoryType::Reserved), at($base + 120, Width::Qword)),
        ]
    };
}

const fn concat<const A: usize, const B: usize, const N: usize>(
    fields: [(OptionalField, FieldSpan); A], directories: [(OptionalField, FieldSpan); B],
) -> [(OptionalField, FieldSpan); N] {
    let mut table = [(OptionalField::Magic, at(0, Width::Word)); N];
    let mut index = 0;
    while index < A {
        table[index] = fields[index];
        index += 1;
    }
    while index < N {
        table[index] = directories[index - A];
        index += 1;
    }
    table
}

const PE32_FIELDS: [(OptionalField, FieldSpan); 30] = [
    (OptionalField::Magic, at(0, Width::Word)),
    (OptionalField::MajorLinkerVersion, at(2, Width::Byte)),
    (OptionalField::MinorLinkerVersion, at(3, Width::Byte)),
    (OptionalField::SizeOfCode, at(4, Width::Dword)),
    (OptionalField::SizeOfInitializedData, at(8, Width::Dword)),
    (OptionalField::SizeOfUninitializedData, at(12, Width::Dword)),
    (OptionalField::AddressOfEntryPoint, at(16, Width::Dword)),
    (OptionalField::BaseOfCode, at(20, Width::Dword)),
    (OptionalField::BaseOfData, at(24, Width::Dword)),
    (OptionalField::ImageBase, at(28, Width::Dword)),
    (OptionalField::SectionAlignment, at(32, Width::Dword)),
    (OptionalField::FileAlignment, at(36, Width::Dword)),
    (OptionalField::MajorOperatingSystemVersion, at(40, Width::Word)),
    (OptionalField::MinorOperatingSystemVersion, at(42, Width::Word)),
    (OptionalField::MajorImageVersion, at(44, Width::Word)),
    (OptionalField::MinorImageVersion, at(46, Width::Word)),
    (OptionalField::MajorSubsystemVersion, at(48, Width::Word)),
    (OptionalField::MinorSubsystemVersion, at(50, Width::Word)),
    (OptionalField::Win32VersionValue, at(52, Width::Dword)),
    (OptionalField::SizeOfImage, at(56, Width::Dword)),
    (OptionalField::SizeOfHeaders, at(60, Width::Dword)),
    (OptionalField::CheckSum, at(64, Width::Dword)),
    (OptionalField::Subsystem, at(68, Width::Word)),
    (OptionalField::DllCharacteristics, at(70, Width::Word)),
    (OptionalField::SizeOfStackReserve, at(72, Width::Dword)),
    (OptionalField::SizeOfStackCommit, at(76, Width::Dword)),
    (OptionalField::SizeOfHeapReserve, at(80, Width::Dword)),
    (OptionalField::SizeOfHeapCommit, at(84, Width::Dword)),
    (OptionalField::LoaderFlags, at(88, Width::Dword)),
    (OptionalField::NumberOfRvaAndSizes, at(92, Width::Dword)),
];

const PE32_PLUS_FIELDS: [(OptionalField, FieldSpan); 29] = [
    (OptionalField::Magic, at(0, Width::Word)),
    (OptionalField::MajorLinkerVersion, at(2, Width::Byte)),
    (OptionalField::MinorLinkerVersion, at(3, Width::Byte)),
    (OptionalField::SizeOfCode, at(4, Width::Dword)),
    (OptionalField::SizeOfInitializedData, at(8, Width::Dword)),
    (OptionalField::SizeOfUninitializedData, at(12, Width::Dword)),
    (OptionalField::AddressOfEntryPoint, at(16, Width::Dword)),
    (OptionalField::BaseOfCode, at(20, Width::Dword)),
    (OptionalField::ImageBase, at(24, Width::Qword)),
    (OptionalField::SectionAlignment, at(32, Width::Dword)),
    (OptionalField::FileAlignment, at(36, Width::Dword)),
    (OptionalField::MajorOperatingSystemVersion, at(40, Width::Word)),
    (OptionalField::MinorOperatingSystemVersion, at(42, Width::Word)),
    (OptionalField::MajorImageVersion, at(44, Width::Word)),
    (OptionalField::MinorImageVersion, at(46, Width::Word)),
    (OptionalField::MajorSubsystemVersion, at(48, Width::Word)),
    (OptionalField::MinorSubsystemVersion, at(50, Width::Word)),
    (OptionalField::Win32VersionValue, at(52, Width::Dword)),
    (OptionalField::SizeOfImage, at(56, Width::Dword)),
    (OptionalField::SizeOfHeaders, at(60, Width::Dword)),
    (OptionalField::CheckSum, at(64, Width::Dword)),
    (OptionalField::Subsystem, at(68, Width::Word)),
    (OptionalField::DllCharacteristics, at(70, Width::Word)),
    (OptionalField::SizeOfStackReserve, at(72, Width::Qword)),
    (OptionalField::SizeOfStackCommit, at(80, Width::Qword)),
    (OptionalField::SizeOfHeapReserve, at(88, Width::Qword)),
    (OptionalField::SizeOfHeapCommit, at(96, Width::Qword)),
    (OptionalField::LoaderFlags, at(104, Width::Dword)),
    (OptionalField::NumberOfRvaAndSizes, at(108, Width::Dword)),
];

const PE32_TABLE: [(OptionalField, FieldSpan); 46] = concat(PE32_FIELDS, directories!(96));
const PE32_PLUS_TABLE: [(OptionalField, FieldSpan); 45] = concat(PE32_PLUS_FIELDS, directories!(112));


const SECTION_HEADER_FIELDS: [(SectionField, FieldSpan); 10] = [
    (SectionField::Name, at(0, Width::Qword)),
    (SectionField::VirtualSize, at(8, Width::Dword)),
    (SectionField::VirtualAddress, at(12, Width::Dword)),
    (SectionField::SizeOfRawData, at(16, Width::Dword)),
    (SectionField::PointerToRawData, at(20, Width::Dword)),
    (SectionField::PointerToRelocations, at(24, Width::Dword)),
    (SectionField::PointerToLinenumbers, at(28, Width::Dword)),
    (SectionField::NumberOfRelocations, at(32, Width::Word)),
    (SectionField::NumberOfLinenumbers, at(34, Width::Word)),
    (SectionField::Characteristics, at(36, Width::Dword)),
];

const EXPORT_DIRECTORY_FIELDS: [(ExportField, FieldSpan); 11] = [
    (ExportField::ExportFlags, at(0, Width::Dword)),
    (ExportField::TimeDateStamp, at(4, Width::Dword)),
    (ExportField::MajorVersion, at(8, Width::Word)),
    (ExportField::MinorVersion, at(10, Width::Word)),
    (ExportField::NameRva, at(12, Width::Dword)),
    (ExportField::OrdinalBase, at(16, Width::Dword)),
    (ExportField::AddressTableEntries, at(20, Width::Dword)),
    (ExportField::NumberOfNamePointers, at(24, Width::Dword)),
    (ExportField::ExportAddressTableRva, at(28, Width::Dword)),
    (ExportField::NamePointerRva, at(32, Width::Dword)),
    (ExportField::OrdinalTableRva, at(36, Width::Dword)),
];

pub static COFF_HEADER_LAYOUT: FieldLayout<CoffField> =
    FieldLayout::new("file header", &COFF_HEADER_FIELDS);
pub static PE32_LAYOUT: FieldLayout<OptionalField> = FieldLayout::new("PE32 optional header", &PE32_TABLE);
pub static PE32_PLUS_LAYOUT: FieldLayout<OptionalField> =
    FieldLayout::new("PE32+ optional header", &PE32_PLUS_TABLE);
pub static SECTION_HEADER_LAYOUT: FieldLayout<SectionField> =
    FieldLayout::new("section header", &SECTION_HEADER_FIELDS);
pub static EXPORT_DIRECTORY_LAYOUT: FieldLayout<ExportField> =
    FieldLayout::new("export directory", &EXPORT_DIRECTORY_FIELDS);
