//! Export directory decoding and RVA resolution.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-edata-section-image-only>.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};

use crate::{constants::*, cursor::*, errors::*, layout::*, section::*, types::*, view::*};

/// How relative virtual addresses are turned into file positions.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum RvaResolution {
    /// Use every RVA directly as a file position.
    ///
    /// Only correct for images whose sections have the same file and memory offsets.
    #[default]
    Identity,
    /// Map the RVA through the section that contains it, the way the loader does.
    ///
    /// Every section header is searched in table order, including ones whose name is shared
    /// with a later section.
    SectionMapped,
}

/// Options for decoding an image.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct ParseOptions {
    pub rva_resolution: RvaResolution,
}
impl ParseOptions {
    pub const fn new() -> Self {
        Self {
            rva_resolution: RvaResolution::Identity,
        }
    }

    pub const fn with_rva_resolution(mut self, rva_resolution: RvaResolution) -> Self {
        self.rva_resolution = rva_resolution;
        self
    }
}

/// Resolves RVAs against the section headers in table order.
#[derive(Debug, Clone, Copy)]
pub struct RvaResolver<'a> {
    mode:     RvaResolution,
    sections: &'a [Section],
}
impl<'a> RvaResolver<'a> {
    pub fn new(mode: RvaResolution, sections: &'a [Section]) -> Self { Self { mode, sections } }

    pub fn mode(&self) -> RvaResolution { self.mode }

    /// Returns the file position of an RVA.
    pub fn resolve(&self, rva: u32) -> Result<u64, DecodeError> {
        let offset = match self.mode {
            RvaResolution::Identity => u64::from(rva),
            RvaResolution::SectionMapped => self
                .sections
                .iter()
                .find_map(|section| section.rva_to_offset(rva))
                .ok_or(DecodeError::UnmappedRva { rva })?,
        };
        trace!("rva {:#x?} -> {:#x?}", rva, offset);
        Ok(offset)
    }
}

/// Exported symbol name and its ordinal.
///
/// Entries compare, order and hash by name only, so a set keeps the first entry of a name.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub name:    String,
    pub ordinal: u16,
}

impl PartialEq for ExportEntry {
    fn eq(&self, other: &Self) -> bool { self.name == other.name }
}
impl Eq for ExportEntry {}

impl PartialOrd for ExportEntry {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> { Some(self.cmp(other)) }
}
impl Ord for ExportEntry {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering { self.name.cmp(&other.name) }
}

impl core::hash::Hash for ExportEntry {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) { self.name.hash(state) }
}

impl core::borrow::Borrow<str> for ExportEntry {
    fn borrow(&self) -> &str { &self.name }
}

/// Decoded export directory with its resolved name and ordinal pairs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExportDirectory {
    pub export_flags:             u32,
    pub time_date_stamp:          DateTime<Utc>,
    pub version:                  Version,
    /// File name the module was linked as.
    pub name:                     String,
    pub ordinal_base:             u32,
    pub address_table_entries:    u32,
    pub number_of_names:          u32,
    pub export_address_table_rva: u32,
    pub name_pointer_rva:         u32,
    pub ordinal_table_rva:        u32,
    pub entries:                  BTreeSet<ExportEntry>,
}

impl ExportDirectory {
    /// Decode the export directory the directory entry points to.
    ///
    /// # Returns
    /// Returns an error if the export flags aren't zero, an RVA can't be resolved or any of the
    /// tables or strings lies outside the source.
    pub fn parse<S: ByteSource>(
        cursor: &mut FileCursor<S>, entry: DataDirectory, endianness: Endianness, resolver: &RvaResolver,
    ) -> Result<Self, DecodeError> {
        use ExportField as F;
        let layout = &EXPORT_DIRECTORY_LAYOUT;

        let offset = resolver.resolve(entry.virtual_address)?;
        debug!("export directory: {:#x?} (file offset {:#x?})", entry, offset);
        let bytes = cursor.seek_and_read(offset, EXPORT_DIRECTORY_SIZE)?;
        let view = ByteOrderView::new(&bytes, endianness).with_origin(offset);
        let u32_field = |field| -> Result<u32, ViewError> { Ok(layout.read(&view, field)? as u32) };
        let u16_field = |field| -> Result<u16, ViewError> { Ok(layout.read(&view, field)? as u16) };

        let export_flags = u32_field(F::ExportFlags)?;
        if export_flags != 0 {
            return Err(DecodeError::ReservedFieldViolation {
                field: "export_flags",
                value: export_flags.into(),
            });
        }

        let number_of_names = u32_field(F::NumberOfNamePointers)?;
        let name_pointer_rva = u32_field(F::NamePointerRva)?;
        let ordinal_table_rva = u32_field(F::OrdinalTableRva)?;
        let name_rva = u32_field(F::NameRva)?;

        let mut directory = Self {
            export_flags,
            time_date_stamp: view.read_timestamp(layout.offset(F::TimeDateStamp))?,
            version: Version {
                major: u16_field(F::MajorVersion)?,
                minor: u16_field(F::MinorVersion)?,
            },
            name: String::new(),
            ordinal_base: u32_field(F::OrdinalBase)?,
            address_table_entries: u32_field(F::AddressTableEntries)?,
            number_of_names,
            export_address_table_rva: u32_field(F::ExportAddressTableRva)?,
            name_pointer_rva,
            ordinal_table_rva,
            entries: BTreeSet::new(),
        };

        let count = number_of_names as usize;
        let (name_pointers, name_pointers_offset) = read_table(cursor, resolver, name_pointer_rva, count * 4)?;
        let (ordinals, ordinals_offset) = read_table(cursor, resolver, ordinal_table_rva, count * 2)?;
        let name_pointers = ByteOrderView::new(&name_pointers, endianness).with_origin(name_pointers_offset);
        let ordinals = ByteOrderView::new(&ordinals, endianness).with_origin(ordinals_offset);

        for index in 0..count {
            let pointer = name_pointers.read_u32(index * 4)?;
            let ordinal = ordinals.read_u16(index * 2)?;
            let name = cursor.read_string(resolver.resolve(pointer)?)?;
            trace!("export {}: {} @ {:#x?}", ordinal, name, pointer);
            if directory.entries.contains(name.as_str()) {
                warn!("duplicate export name {} at index {}, keeping the first ordinal", name, index);
                continue;
            }
            directory.entries.insert(ExportEntry { name, ordinal });
        }

        directory.name = cursor.read_string(resolver.resolve(name_rva)?)?;
        debug!("{:#x?}: {:#x?}", offset, directory);
        Ok(directory)
    }

    /// Iterates the exported names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ { self.entries.iter().map(|entry| entry.name.as_str()) }

    /// Returns the ordinal of an exported name.
    pub fn ordinal(&self, name: &str) -> Option<u16> { self.entries.get(name).map(|entry| entry.ordinal) }

    /// Returns the number of decoded name and ordinal pairs.
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Read one of the tables parallel to the name pointers. Empty tables aren't resolved.
fn read_table<S: ByteSource>(
    cursor: &mut FileCursor<S>, resolver: &RvaResolver, rva: u32, length: usize,
) -> Result<(Vec<u8>, u64), DecodeError> {
    if length == 0 {
        return Ok((Vec::new(), 0));
    }
    let offset = resolver.resolve(rva)?;
    Ok((cursor.seek_and_read(offset, length)?, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_keyed_by_name() {
        let mut entries = BTreeSet::new();
        assert!(entries.insert(ExportEntry {
            name:    "Beta".into(),
            ordinal: 3,
        }));
        assert!(entries.insert(ExportEntry {
            name:    "Alpha".into(),
            ordinal: 5,
        }));
        assert!(!entries.insert(ExportEntry {
            name:    "Alpha".into(),
            ordinal: 1,
        }));
        let order: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.ordinal)).collect();
        assert_eq!(order, vec![("Alpha", 5), ("Beta", 3)]);
        assert_eq!(entries.get("Beta").map(|e| e.ordinal), Some(3));
    }

    #[test]
    fn identity_and_mapped_resolution() {
        let sections = [Section {
            name:                   ".edata".into(),
            virtual_size:           0x100,
            virtual_address:        0x2000,
            size_of_raw_data:       0x200,
            pointer_to_raw_data:    0x400,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations:  0,
            number_of_linenumbers:  0,
            characteristics:        SectionCharacteristics::empty(),
            alignment:              None,
        }];

        let identity = RvaResolver::new(RvaResolution::Identity, &sections);
        assert_eq!(identity.resolve(0x2010).unwrap(), 0x2010);
        assert_eq!(identity.resolve(0x9000).unwrap(), 0x9000);

        let mapped = RvaResolver::new(RvaResolution::SectionMapped, &sections);
        assert_eq!(mapped.resolve(0x2010).unwrap(), 0x410);
        assert_eq!(mapped.resolve(0x21ff).unwrap(), 0x5ff);
        assert!(matches!(mapped.resolve(0x9000), Err(DecodeError::UnmappedRva { rva: 0x9000 })));
    }

    #[test]
    fn default_options_use_identity() {
        assert_eq!(ParseOptions::default().rva_resolution, RvaResolution::Identity);
        assert_eq!(ParseOptions::new(), ParseOptions::default());
        assert_eq!(
            ParseOptions::new()
                .with_rva_resolution(RvaResolution::SectionMapped)
                .rva_resolution,
            RvaResolution::SectionMapped
        );
    }
}
