//! Section table decoding.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#section-table-section-headers>.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::{constants::*, errors::*, layout::*, types::*, view::*};

/// Decoded section header.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Section {
    pub name:                   String,
    pub virtual_size:           u32,
    pub virtual_address:        u32,
    pub size_of_raw_data:       u32,
    pub pointer_to_raw_data:    u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations:  u16,
    pub number_of_linenumbers:  u16,
    pub characteristics:        SectionCharacteristics,
    pub alignment:              Option<SectionAlignment>,
}

impl Section {
    /// Decode a section header from a view over its 40 bytes.
    pub fn parse(view: &ByteOrderView) -> Result<Self, DecodeError> {
        use SectionField as F;
        let layout = &SECTION_HEADER_LAYOUT;
        let u32_field = |field| -> Result<u32, ViewError> { Ok(layout.read(view, field)? as u32) };
        let u16_field = |field| -> Result<u16, ViewError> { Ok(layout.read(view, field)? as u16) };

        let name = match layout.get(F::Name) {
            Some(span) => section_name(view.field_bytes(span)?),
            None => String::new(),
        };
        let characteristics = u32_field(F::Characteristics)?;

        Ok(Self {
            name,
            virtual_size: u32_field(F::VirtualSize)?,
            virtual_address: u32_field(F::VirtualAddress)?,
            size_of_raw_data: u32_field(F::SizeOfRawData)?,
            pointer_to_raw_data: u32_field(F::PointerToRawData)?,
            pointer_to_relocations: u32_field(F::PointerToRelocations)?,
            pointer_to_linenumbers: u32_field(F::PointerToLinenumbers)?,
            number_of_relocations: u16_field(F::NumberOfRelocations)?,
            number_of_linenumbers: u16_field(F::NumberOfLinenumbers)?,
            characteristics: SectionCharacteristics::from_bits_truncate(characteristics),
            alignment: SectionAlignment::from_characteristics(characteristics),
        })
    }

    /// Returns whether the RVA lies inside the section once it's mapped into memory.
    pub fn contains_rva(&self, rva: u32) -> bool {
        let size = self.virtual_size.max(self.size_of_raw_data);
        rva >= self.virtual_address && u64::from(rva) < u64::from(self.virtual_address) + u64::from(size)
    }

    /// Returns the file position of an RVA inside the section, or `None` if the section doesn't contain it.
    pub fn rva_to_offset(&self, rva: u32) -> Option<u64> {
        if !self.contains_rva(rva) {
            return None;
        }
        Some(u64::from(rva - self.virtual_address) + u64::from(self.pointer_to_raw_data))
    }

    /// Returns the range of the raw section data in the file.
    pub fn file_range(&self) -> core::ops::Range<u64> {
        let start = u64::from(self.pointer_to_raw_data);
        start..start + u64::from(self.size_of_raw_data)
    }
}

/// Decoded sections, keyed and ordered by name.
pub type SectionTable = BTreeMap<String, Section>;

/// Decode `count` consecutive section headers in table order.
///
/// The view has to span exactly `count * 40` bytes.
pub fn parse_section_headers(view: &ByteOrderView, count: u16) -> Result<Vec<Section>, DecodeError> {
    let expected = usize::from(count) * SECTION_HEADER_SIZE;
    if view.len() != expected {
        return Err(DecodeError::OutOfBounds {
            offset: view.origin(),
            length: expected,
            path:   None,
        });
    }

    let mut headers = Vec::with_capacity(usize::from(count));
    for index in 0..usize::from(count) {
        let record = view.subview(index * SECTION_HEADER_SIZE, SECTION_HEADER_SIZE)?;
        let section = Section::parse(&record)?;
        debug!("{:#x?}: {}: {:#x?}", record.origin(), section.name, section);
        headers.push(section);
    }
    Ok(headers)
}

/// Key decoded section headers by name. Sections with the same name replace earlier ones.
pub fn section_table<I: IntoIterator<Item = Section>>(headers: I) -> SectionTable {
    let mut sections = SectionTable::new();
    for section in headers {
        if let Some(previous) = sections.insert(section.name.clone(), section) {
            warn!("duplicate section name {}, replacing section at {:#x?}", previous.name, previous.virtual_address);
        }
    }
    sections
}

/// Decode `count` consecutive section headers keyed by name.
///
/// The view has to span exactly `count * 40` bytes. Sections with the same name replace
/// earlier ones.
pub fn parse_section_table(view: &ByteOrderView, count: u16) -> Result<SectionTable, DecodeError> {
    Ok(section_table(parse_section_headers(view, count)?))
}

/// Decode a section name: the bytes up to the first zero, or all eight if there is none.
pub fn section_name(bytes: &[u8]) -> String {
    let bytes = &bytes[..bytes.len().min(SECTION_NAME_SIZE)];
    let end = bytes.iter().position(|&c| c == b'\0').unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
