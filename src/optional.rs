//! Optional header decoding for the PE32 and PE32+ variants.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#optional-header-image-only>.
//!
//! Both variants are decoded by the same function. Only the field layout table selected by
//! the magic number differs.

use log::{debug, trace};

use crate::{constants::*, errors::*, layout::*, types::*, view::*};

/// Optional header size class, selected by the magic number.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OptionalHeaderVariant {
    /// PE32, magic `0x010b`.
    Std,
    /// PE32+, magic `0x020b`.
    Plus,
}
impl OptionalHeaderVariant {
    pub const fn from_magic(magic: WORD) -> Option<Self> {
        match magic {
            PE_32_MAGIC => Some(OptionalHeaderVariant::Std),
            PE_64_MAGIC => Some(OptionalHeaderVariant::Plus),
            _ => None,
        }
    }

    pub const fn magic(&self) -> WORD {
        match self {
            OptionalHeaderVariant::Std => PE_32_MAGIC,
            OptionalHeaderVariant::Plus => PE_64_MAGIC,
        }
    }

    /// Returns the field layout of the variant.
    pub fn layout(&self) -> &'static FieldLayout<OptionalField> {
        match self {
            OptionalHeaderVariant::Std => &PE32_LAYOUT,
            OptionalHeaderVariant::Plus => &PE32_PLUS_LAYOUT,
        }
    }
}

/// Unsigned word whose width differs between the variants.
pub trait ImageWord: Copy + Into<u64> {
    fn from_field(value: u64) -> Self;
}
impl ImageWord for u32 {
    fn from_field(value: u64) -> Self { value as u32 }
}
impl ImageWord for u64 {
    fn from_field(value: u64) -> Self { value }
}

/// Optional header fields, with the image base and memory sizes stored as `UXX`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OptionalHeaderData<UXX> {
    pub linker_version:             Version,
    pub size_of_code:               u32,
    pub size_of_initialized_data:   u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point:     u32,
    pub base_of_code:               u32,
    /// Zero for PE32+ images, which don't have this field.
    pub base_of_data:               u32,
    pub image_base:                 UXX,
    pub section_alignment:          u32,
    pub file_alignment:             u32,
    pub operating_system_version:   Version,
    pub image_version:              Version,
    pub subsystem_version:          Version,
    pub win32_version_value:        u32,
    pub size_of_image:              u32,
    pub size_of_headers:            u32,
    pub check_sum:                  u32,
    pub subsystem:                  Subsystem,
    pub dll_characteristics:        DllCharacteristics,
    pub size_of_stack_reserve:      UXX,
    pub size_of_stack_commit:       UXX,
    pub size_of_heap_reserve:       UXX,
    pub size_of_heap_commit:        UXX,
    pub loader_flags:               u32,
    pub number_of_rva_and_sizes:    u32,
    pub data_directories:           DirectoryTable,
}

/// Decoded optional header.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OptionalHeader {
    Std(OptionalHeaderData<u32>),
    Plus(OptionalHeaderData<u64>),
}

impl OptionalHeader {
    /// Decode the optional header from a view over its declared length.
    ///
    /// # Returns
    /// Returns an error if the magic number is unknown, a reserved field is not zero or the
    /// view is too short for the fixed fields of the selected variant.
    pub fn parse(view: &ByteOrderView) -> Result<Self, DecodeError> {
        let magic = view.read_u16(0)?;
        debug!("optional header magic: {:#06x}", magic);
        let variant = OptionalHeaderVariant::from_magic(magic)
            .ok_or(DecodeError::UnknownVariant { magic })?;

        let header = match variant {
            OptionalHeaderVariant::Std => OptionalHeader::Std(decode(view, variant.layout())?),
            OptionalHeaderVariant::Plus => OptionalHeader::Plus(decode(view, variant.layout())?),
        };
        debug!("{:#x?}: {:#x?}", view.origin(), header);

        if header.loader_flags() != 0 {
            return Err(DecodeError::ReservedFieldViolation {
                field: "loader_flags",
                value: header.loader_flags().into(),
            });
        }
        if header.win32_version_value() != 0 {
            return Err(DecodeError::ReservedFieldViolation {
                field: "win32_version_value",
                value: header.win32_version_value().into(),
            });
        }
        Ok(header)
    }

    pub const fn variant(&self) -> OptionalHeaderVariant {
        match self {
            OptionalHeader::Std(_) => OptionalHeaderVariant::Std,
            OptionalHeader::Plus(_) => OptionalHeaderVariant::Plus,
        }
    }

    pub const fn magic(&self) -> WORD { self.variant().magic() }

    pub fn image_base(&self) -> u64 {
        match self {
            OptionalHeader::Std(header) => header.image_base.into(),
            OptionalHeader::Plus(header) => header.image_base,
        }
    }

    pub fn stack_size(&self) -> MemorySize {
        match self {
            OptionalHeader::Std(header) => MemorySize {
                reserve: header.size_of_stack_reserve.into(),
                commit:  header.size_of_stack_commit.into(),
            },
            OptionalHeader::Plus(header) => MemorySize {
                reserve: header.size_of_stack_reserve,
                commit:  header.size_of_stack_commit,
            },
        }
    }

    pub fn heap_size(&self) -> MemorySize {
        match self {
            OptionalHeader::Std(header) => MemorySize {
                reserve: header.size_of_heap_reserve.into(),
                commit:  header.size_of_heap_commit.into(),
            },
            OptionalHeader::Plus(header) => MemorySize {
                reserve: header.size_of_heap_reserve,
                commit:  header.size_of_heap_commit,
            },
        }
    }

    pub fn data_directories(&self) -> &DirectoryTable {
        match self {
            OptionalHeader::Std(header) => &header.data_directories,
            OptionalHeader::Plus(header) => &header.data_directories,
        }
    }

    pub fn data_directory(&self, kind: DataDirectoryType) -> DataDirectory {
        self.data_directories().get(kind)
    }
}

macro_rules! shared_accessors {
    ($($name:ident: $type:ty),* $(,)?) => {
        impl OptionalHeader {
            $(
                pub const fn $name(&self) -> $type {
                    match self {
                        OptionalHeader::Std(header) => header.$name,
                        OptionalHeader::Plus(header) => header.$name,
                    }
                }
            )*
        }
    };
}

shared_accessors! {
    linker_version: Version,
    size_of_code: u32,
    size_of_initialized_data: u32,
    size_of_uninitialized_data: u32,
    address_of_entry_point: u32,
    base_of_code: u32,
    base_of_data: u32,
    section_alignment: u32,
    file_alignment: u32,
    operating_system_version: Version,
    image_version: Version,
    subsystem_version: Version,
    win32_version_value: u32,
    size_of_image: u32,
    size_of_headers: u32,
    check_sum: u32,
    subsystem: Subsystem,
    dll_characteristics: DllCharacteristics,
    loader_flags: u32,
    number_of_rva_and_sizes: u32,
}

fn decode<UXX: ImageWord>(
    view: &ByteOrderView, layout: &FieldLayout<OptionalField>,
) -> Result<OptionalHeaderData<UXX>, DecodeError> {
    use OptionalField as F;
    let u32_field = |field| -> Result<u32, ViewError> { Ok(layout.read(view, field)? as u32) };
    let u16_field = |field| -> Result<u16, ViewError> { Ok(layout.read(view, field)? as u16) };
    let word_field = |field| -> Result<UXX, ViewError> { Ok(UXX::from_field(layout.read(view, field)?)) };
    let version = |major, minor| -> Result<Version, ViewError> {
        Ok(Version {
            major: u16_field(major)?,
            minor: u16_field(minor)?,
        })
    };

    let number_of_rva_and_sizes = u32_field(F::NumberOfRvaAndSizes)?;

    Ok(OptionalHeaderData {
        linker_version: version(F::MajorLinkerVersion, F::MinorLinkerVersion)?,
        size_of_code: u32_field(F::SizeOfCode)?,
        size_of_initialized_data: u32_field(F::SizeOfInitializedData)?,
        size_of_uninitialized_data: u32_field(F::SizeOfUninitializedData)?,
        address_of_entry_point: u32_field(F::AddressOfEntryPoint)?,
        base_of_code: u32_field(F::BaseOfCode)?,
        base_of_data: u32_field(F::BaseOfData)?,
        image_base: word_field(F::ImageBase)?,
        section_alignment: u32_field(F::SectionAlignment)?,
        file_alignment: u32_field(F::FileAlignment)?,
        operating_system_version: version(F::MajorOperatingSystemVersion, F::MinorOperatingSystemVersion)?,
        image_version: version(F::MajorImageVersion, F::MinorImageVersion)?,
        subsystem_version: version(F::MajorSubsystemVersion, F::MinorSubsystemVersion)?,
        win32_version_value: u32_field(F::Win32VersionValue)?,
        size_of_image: u32_field(F::SizeOfImage)?,
        size_of_headers: u32_field(F::SizeOfHeaders)?,
        check_sum: u32_field(F::CheckSum)?,
        subsystem: Subsystem::from_code(u16_field(F::Subsystem)?),
        dll_characteristics: DllCharacteristics::from_bits_truncate(u16_field(F::DllCharacteristics)?),
        size_of_stack_reserve: word_field(F::SizeOfStackReserve)?,
        size_of_stack_commit: word_field(F::SizeOfStackCommit)?,
        size_of_heap_reserve: word_field(F::SizeOfHeapReserve)?,
        size_of_heap_commit: word_field(F::SizeOfHeapCommit)?,
        loader_flags: u32_field(F::LoaderFlags)?,
        number_of_rva_and_sizes,
        data_directories: decode_directories(view, layout, number_of_rva_and_sizes)?,
    })
}

/// Decode the directory table. Slots past the declared count or past the end of the
/// optional header are left as `(0, 0)`.
fn decode_directories(
    view: &ByteOrderView, layout: &FieldLayout<OptionalField>, number_of_rva_and_sizes: u32,
) -> Result<DirectoryTable, DecodeError> {
    let mut table = DirectoryTable::default();
    for kind in DataDirectoryType::ALL {
        let Some(span) = layout.get(OptionalField::Directory(kind)) else {
            continue;
        };
        if kind.index() as u32 >= number_of_rva_and_sizes || span.end() > view.len() {
            trace!("{:#x?}: {:?}: not present", view.origin() + span.offset as u64, kind);
            continue;
        }
        let directory = DataDirectory {
            virtual_address: view.read_u32(span.offset)?,
            size:            view.read_u32(span.offset + 4)?,
        };
        trace!("{:#x?}: {:?}: {:#x?}", view.origin() + span.offset as u64, kind, directory);
        table.set(kind, directory);
    }
    Ok(table)
}
