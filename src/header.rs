//! PE signature location and file header decoding.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#coff-file-header-object-and-image>.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::{constants::*, cursor::*, errors::*, layout::*, types::*, view::*};

/// Position and byte order of the PE header, found through the legacy header pointer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Signature {
    /// File position of the `PE\0\0` signature.
    pub offset:     u64,
    pub endianness: Endianness,
}
impl Signature {
    /// File position of the file header.
    pub const fn coff_header_offset(&self) -> u64 { self.offset + PE_SIGNATURE_SIZE }

    /// File position of the optional header.
    pub const fn optional_header_offset(&self) -> u64 {
        self.coff_header_offset() + COFF_HEADER_SIZE as u64
    }

    /// Locate and validate the PE signature and establish the byte order of the image.
    ///
    /// The signature pointer is the single byte at offset 60. The machine field following the
    /// signature is first read big-endian; a value that isn't a known machine means the image is
    /// little-endian.
    pub fn locate<S: ByteSource>(cursor: &mut FileCursor<S>) -> Result<Self, DecodeError> {
        let offset = u64::from(cursor.read_byte_at(PE_PTR_OFFSET)?);
        debug!("pe_signature_offset: {:#x?}", offset);

        let bytes = cursor.seek_and_read(offset, PE_SIGNATURE.len())?;
        if bytes != PE_SIGNATURE {
            let mut found = [0; 4];
            found.copy_from_slice(&bytes);
            return Err(DecodeError::SignatureMismatch {
                path: cursor.path().map(|path| path.to_path_buf()),
                found,
            });
        }

        let machine = cursor.seek_and_read(offset + PE_SIGNATURE_SIZE, 2)?;
        let machine = ByteOrderView::new(&machine, Endianness::Big).read_u16(0)?;
        let endianness = match MachineType::from_code(machine) {
            MachineType::Unknown => Endianness::Little,
            _ => Endianness::Big,
        };
        debug!("endianness: {:?}", endianness);

        Ok(Self { offset, endianness })
    }
}

/// Decoded file header.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct CoffHeader {
    pub machine:                 MachineType,
    pub number_of_sections:      u16,
    pub time_date_stamp:         DateTime<Utc>,
    pub pointer_to_symbol_table: i32,
    pub number_of_symbols:       i32,
    pub size_of_optional_header: u16,
    pub characteristics:         FileCharacteristics,
}

impl CoffHeader {
    /// Decode the file header from a view over its 20 bytes.
    pub fn parse(view: &ByteOrderView) -> Result<Self, DecodeError> {
        let layout = &COFF_HEADER_LAYOUT;

        let machine_code = layout.read(view, CoffField::Machine)? as u16;
        let machine = MachineType::from_code(machine_code);
        if machine == MachineType::Unknown && machine_code != IMAGE_FILE_MACHINE_UNKNOWN {
            warn!("unknown machine type {:#06x}", machine_code);
        }

        let characteristics = layout.read(view, CoffField::Characteristics)? as u16;

        let header = Self {
            machine,
            number_of_sections: layout.read(view, CoffField::NumberOfSections)? as u16,
            time_date_stamp: view.read_timestamp(layout.offset(CoffField::TimeDateStamp))?,
            pointer_to_symbol_table: view.read_i32(layout.offset(CoffField::PointerToSymbolTable))?,
            number_of_symbols: view.read_i32(layout.offset(CoffField::NumberOfSymbols))?,
            size_of_optional_header: layout.read(view, CoffField::SizeOfOptionalHeader)? as u16,
            characteristics: FileCharacteristics::from_bits_truncate(characteristics),
        };
        debug!("{:#x?}: {:#x?}", view.origin(), header);
        Ok(header)
    }

    /// Returns the size of the section table that follows the optional header.
    pub const fn section_table_size(&self) -> usize {
        self.number_of_sections as usize * SECTION_HEADER_SIZE
    }
}
