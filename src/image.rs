//! Portable executable image representation.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format> for more information.

use std::{
    fs::File,
    io::Cursor,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    constants::*,
    cursor::*,
    errors::*,
    export::*,
    header::*,
    optional::*,
    section::*,
    types::*,
    view::*,
};

/// Decoded portable executable headers.
///
/// This struct is the main entry point for decoding a portable executable image. Decoding is
/// one-shot: the source is read once, in order, and released before the image is returned.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PeFile {
    pub(crate) path:             Option<PathBuf>,
    pub(crate) endianness:       Endianness,
    pub(crate) signature_offset: u64,
    pub(crate) coff_header:      CoffHeader,
    pub(crate) optional_header:  OptionalHeader,
    pub(crate) sections:         SectionTable,
    pub(crate) exports:          Option<ExportDirectory>,
}

impl PeFile {
    /// Decode a portable executable image from a file.
    ///
    /// The file is opened read-only and closed before returning.
    ///
    /// # Returns
    /// Returns the `PeFile`, or an error if the file can't be read or isn't a valid portable executable image.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        Self::parse_file_with_options(path, ParseOptions::default())
    }

    /// Decode a portable executable image from a file with the given options.
    pub fn parse_file_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self, DecodeError> {
        let cursor = FileCursor::<File>::open(path)?;
        info!("decoding {:?}", cursor.path());
        Self::decode(cursor, options)
    }

    /// Decode a portable executable image from bytes in memory.
    ///
    /// # Returns
    /// Returns the `PeFile`, or an error if the bytes aren't a valid portable executable image.
    pub fn parse<B: AsRef<[u8]>>(bytes: B) -> Result<Self, DecodeError> {
        Self::parse_with_options(bytes, ParseOptions::default())
    }

    /// Decode a portable executable image from bytes in memory with the given options.
    pub fn parse_with_options<B: AsRef<[u8]>>(bytes: B, options: ParseOptions) -> Result<Self, DecodeError> {
        Self::decode(FileCursor::new(Cursor::new(bytes), None)?, options)
    }

    /// Decode a portable executable image from a seekable reader.
    ///
    /// The reader is released through [`ByteSource::release`] once decoding has finished.
    /// Wrap plain [`Read`](std::io::Read) and [`Seek`](std::io::Seek) types in a
    /// [`BufReader`](std::io::BufReader).
    pub fn parse_reader<R: ByteSource>(reader: R) -> Result<Self, DecodeError> {
        Self::parse_reader_with_options(reader, ParseOptions::default())
    }

    /// Decode a portable executable image from a seekable reader with the given options.
    pub fn parse_reader_with_options<R: ByteSource>(reader: R, options: ParseOptions) -> Result<Self, DecodeError> {
        Self::decode(FileCursor::new(reader, None)?, options)
    }

    fn decode<S: ByteSource>(mut cursor: FileCursor<S>, options: ParseOptions) -> Result<Self, DecodeError> {
        let result = Self::decode_from(&mut cursor, options);
        let closed = cursor.close();
        let image = result.map_err(|error| error.with_path(cursor.path()))?;
        closed?;
        Ok(image)
    }

    fn decode_from<S: ByteSource>(cursor: &mut FileCursor<S>, options: ParseOptions) -> Result<Self, DecodeError> {
        let signature = Signature::locate(cursor)?;
        let endianness = signature.endianness;

        let coff_header_offset = signature.coff_header_offset();
        let bytes = cursor.seek_and_read(coff_header_offset, COFF_HEADER_SIZE)?;
        let coff_header =
            CoffHeader::parse(&ByteOrderView::new(&bytes, endianness).with_origin(coff_header_offset))?;

        let optional_header_offset = signature.optional_header_offset();
        let optional_header_size = usize::from(coff_header.size_of_optional_header);
        let bytes = cursor.seek_and_read(optional_header_offset, optional_header_size)?;
        let optional_header =
            OptionalHeader::parse(&ByteOrderView::new(&bytes, endianness).with_origin(optional_header_offset))?;

        let section_table_offset = optional_header_offset + optional_header_size as u64;
        debug!("section_table_offset: {:#x?}", section_table_offset);
        let bytes = cursor.seek_and_read(section_table_offset, coff_header.section_table_size())?;
        let headers = parse_section_headers(
            &ByteOrderView::new(&bytes, endianness).with_origin(section_table_offset),
            coff_header.number_of_sections,
        )?;

        let export_table = optional_header.data_directory(DataDirectoryType::ExportTable);
        let exports = if export_table.is_present() {
            let resolver = RvaResolver::new(options.rva_resolution, &headers);
            Some(ExportDirectory::parse(cursor, export_table, endianness, &resolver)?)
        } else {
            debug!("no export directory");
            None
        };
        let sections = section_table(headers);

        Ok(Self {
            path: cursor.path().map(Path::to_path_buf),
            endianness,
            signature_offset: signature.offset,
            coff_header,
            optional_header,
            sections,
            exports,
        })
    }

    /// Returns the path of the decoded file, or `None` if the image was decoded from memory or a reader.
    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Returns the byte order of the image.
    pub fn endianness(&self) -> Endianness { self.endianness }

    /// Returns the file position of the `PE\0\0` signature.
    pub fn signature_offset(&self) -> u64 { self.signature_offset }

    pub fn coff_header(&self) -> &CoffHeader { &self.coff_header }

    pub fn optional_header(&self) -> &OptionalHeader { &self.optional_header }

    /// Returns the sections keyed by name.
    pub fn sections(&self) -> &SectionTable { &self.sections }

    /// Returns the section with the given name.
    pub fn section(&self, name: &str) -> Option<&Section> { self.sections.get(name) }

    /// Returns the export directory, or `None` if the image doesn't declare one.
    pub fn exports(&self) -> Option<&ExportDirectory> { self.exports.as_ref() }

    /// Returns the exported names in order. Empty if the image doesn't export anything.
    pub fn export_names(&self) -> Vec<&str> {
        self.exports
            .as_ref()
            .map(|exports| exports.names().collect())
            .unwrap_or_default()
    }

    /// Returns the data directory entry of the given kind.
    pub fn data_directory(&self, kind: DataDirectoryType) -> DataDirectory {
        self.optional_header.data_directory(kind)
    }
}
