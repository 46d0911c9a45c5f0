use peinspect::{types::*, *};
use std::{
    cell::Cell,
    io::{Cursor, Error as IOError, ErrorKind, Read, Seek, SeekFrom},
    path::PathBuf,
    rc::Rc,
    sync::Once,
};

static INIT_LOGGER: Once = Once::new();
fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::builder()
            .is_test(false)
            .filter_level(log::LevelFilter::Info)
            .format_timestamp(None)
            .format_module_path(false)
            .format_level(true)
            .format_target(false)
            .write_style(env_logger::WriteStyle::Auto)
            .init();
    });
}

const SIGNATURE_OFFSET: usize = 0x40;
const COFF_OFFSET: usize = SIGNATURE_OFFSET + 4;
const OPTIONAL_OFFSET: usize = COFF_OFFSET + 20;
const TIMESTAMP: u32 = 0x5f5e_1000;

/// Writes fields of a synthetic image in a fixed byte order, growing the buffer as needed.
struct Writer {
    bytes:      Vec<u8>,
    endianness: Endianness,
}
impl Writer {
    fn new(endianness: Endianness) -> Self {
        Self {
            bytes: Vec::new(),
            endianness,
        }
    }

    fn put(&mut self, offset: usize, data: &[u8]) {
        if self.bytes.len() < offset + data.len() {
            self.bytes.resize(offset + data.len(), 0);
        }
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        match self.endianness {
            Endianness::Big => self.put(offset, &value.to_be_bytes()),
            Endianness::Little => self.put(offset, &value.to_le_bytes()),
        }
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        match self.endianness {
            Endianness::Big => self.put(offset, &value.to_be_bytes()),
            Endianness::Little => self.put(offset, &value.to_le_bytes()),
        }
    }

    fn put_u64(&mut self, offset: usize, value: u64) {
        match self.endianness {
            Endianness::Big => self.put(offset, &value.to_be_bytes()),
            Endianness::Little => self.put(offset, &value.to_le_bytes()),
        }
    }

    fn put_str(&mut self, offset: usize, value: &str) {
        self.put(offset, value.as_bytes());
        self.put(offset + value.len(), &[0]);
    }
}

struct SectionSpec {
    name:                [u8; 8],
    virtual_size:        u32,
    virtual_address:     u32,
    size_of_raw_data:    u32,
    pointer_to_raw_data: u32,
    characteristics:     u32,
}

/// Layout of a synthetic image: a stub, the signature at 0x40, the file header, an optional
/// header and a section table.
struct Synthetic {
    endianness:              Endianness,
    machine:                 u16,
    magic:                   u16,
    optional_header_size:    u16,
    loader_flags:            u32,
    win32_version_value:     u32,
    number_of_rva_and_sizes: u32,
    export_table:            (u32, u32),
    sections:                Vec<SectionSpec>,
}
impl Synthetic {
    fn pe32() -> Self {
        Self {
            endianness:              Endianness::Little,
            machine:                 0x014c,
            magic:                   0x010b,
            optional_header_size:    224,
            loader_flags:            0,
            win32_version_value:     0,
            number_of_rva_and_sizes: 16,
            export_table:            (0, 0),
            sections:                Vec::new(),
        }
    }

    fn pe32_plus() -> Self {
        Self {
            machine: 0x8664,
            magic: 0x020b,
            optional_header_size: 240,
            ..Self::pe32()
        }
    }

    /// The minimal image: no sections, a 96 byte PE32 header without directory table.
    fn minimal() -> Self {
        Self {
            machine: 0x0000,
            optional_header_size: 96,
            ..Self::pe32()
        }
    }

    fn section_table_offset(&self) -> usize { OPTIONAL_OFFSET + self.optional_header_size as usize }

    fn build(&self) -> Writer {
        let mut w = Writer::new(self.endianness);
        w.put(0, b"MZ");
        w.put(0x3c, &[SIGNATURE_OFFSET as u8]);
        w.put(SIGNATURE_OFFSET, b"PE\0\0");

        w.put_u16(COFF_OFFSET, self.machine);
        w.put_u16(COFF_OFFSET + 2, self.sections.len() as u16);
        w.put_u32(COFF_OFFSET + 4, TIMESTAMP);
        w.put_u32(COFF_OFFSET + 8, 0);
        w.put_u32(COFF_OFFSET + 12, 0);
        w.put_u16(COFF_OFFSET + 16, self.optional_header_size);
        w.put_u16(COFF_OFFSET + 18, 0x2102);

        let o = OPTIONAL_OFFSET;
        w.put_u16(o, self.magic);
        w.put(o + 2, &[14, 29]);
        w.put_u32(o + 4, 0x1000);
        w.put_u32(o + 16, 0x1234);
        w.put_u32(o + 20, 0x1000);
        w.put_u32(o + 32, 0x1000);
        w.put_u32(o + 36, 0x200);
        w.put_u16(o + 40, 6);
        w.put_u16(o + 48, 6);
        w.put_u16(o + 50, 1);
        w.put_u32(o + 52, self.win32_version_value);
        w.put_u32(o + 56, 0x5000);
        w.put_u32(o + 60, 0x400);
        w.put_u16(o + 68, 3);
        w.put_u16(o + 70, 0x8160);

        let directories = if self.magic == 0x020b {
            w.put_u64(o + 24, 0x1_4000_0000);
            w.put_u64(o + 72, 0x10_0000);
            w.put_u64(o + 80, 0x1000);
            w.put_u64(o + 88, 0x10_0000);
            w.put_u64(o + 96, 0x1000);
            w.put_u32(o + 104, self.loader_flags);
            w.put_u32(o + 108, self.number_of_rva_and_sizes);
            o + 112
        } else {
            w.put_u32(o + 24, 0x2000);
            w.put_u32(o + 28, 0x40_0000);
            w.put_u32(o + 72, 0x10_0000);
            w.put_u32(o + 76, 0x1000);
            w.put_u32(o + 80, 0x10_0000);
            w.put_u32(o + 84, 0x1000);
            w.put_u32(o + 88, self.loader_flags);
            w.put_u32(o + 92, self.number_of_rva_and_sizes);
            o + 96
        };
        let end = self.section_table_offset();
        if directories + 8 <= end {
            w.put_u32(directories, self.export_table.0);
            w.put_u32(directories + 4, self.export_table.1);
        }
        // pad to the declared optional header size
        if w.bytes.len() < end {
            w.bytes.resize(end, 0);
        }

        for (index, section) in self.sections.iter().enumerate() {
            let s = end + index * 40;
            w.put(s, &section.name);
            w.put_u32(s + 8, section.virtual_size);
            w.put_u32(s + 12, section.virtual_address);
            w.put_u32(s + 16, section.size_of_raw_data);
            w.put_u32(s + 20, section.pointer_to_raw_data);
            w.put_u32(s + 36, section.characteristics);
        }
        w
    }
}

/// Write an export directory with the names `Alpha` and `Beta` and the ordinals `5` and `3`.
///
/// `base` is the file position of the directory, `rva` the address the tables point to.
fn write_exports(w: &mut Writer, base: usize, rva: u32) {
    w.put_u32(base, 0);
    w.put_u32(base + 4, TIMESTAMP);
    w.put_u16(base + 8, 1);
    w.put_u16(base + 10, 2);
    w.put_u32(base + 12, rva + 0x80);
    w.put_u32(base + 16, 1);
    w.put_u32(base + 20, 6);
    w.put_u32(base + 24, 2);
    w.put_u32(base + 28, rva + 0x30);
    w.put_u32(base + 32, rva + 0x40);
    w.put_u32(base + 36, rva + 0x50);

    w.put_u32(base + 0x40, rva + 0x60);
    w.put_u32(base + 0x44, rva + 0x70);
    w.put_u16(base + 0x50, 5);
    w.put_u16(base + 0x52, 3);
    w.put_str(base + 0x60, "Alpha");
    w.put_str(base + 0x70, "Beta");
    w.put_str(base + 0x80, "synthetic.dll");
}

fn exporting_image(endianness: Endianness) -> Vec<u8> {
    let mut w = Synthetic {
        endianness,
        export_table: (0x200, 0x100),
        ..Synthetic::pe32()
    }
    .build();
    write_exports(&mut w, 0x200, 0x200);
    w.bytes
}

fn entries(image: &PeFile) -> Vec<(String, u16)> {
    image
        .exports()
        .unwrap()
        .entries
        .iter()
        .map(|entry| (entry.name.clone(), entry.ordinal))
        .collect()
}

fn temp_file(name: &str, data: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("peinspect-{}-{}", std::process::id(), name));
    std::fs::write(&path, data).unwrap();
    path
}

/// Byte source that records whether it was released, and optionally fails to release.
struct TrackedSource {
    inner:    Cursor<Vec<u8>>,
    released: Rc<Cell<bool>>,
    fail:     bool,
}
impl Read for TrackedSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> { self.inner.read(buf) }
}
impl Seek for TrackedSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> { self.inner.seek(pos) }
}
impl ByteSource for TrackedSource {
    fn release(self) -> Result<(), IOError> {
        self.released.set(true);
        if self.fail {
            return Err(IOError::new(ErrorKind::Other, "handle already invalidated"));
        }
        Ok(())
    }
}

#[test]
fn parse_minimal_image() {
    init_logger();

    let data = Synthetic::minimal().build().bytes;
    assert_eq!(data.len(), OPTIONAL_OFFSET + 96);

    let image = PeFile::parse(&data).unwrap();
    assert_eq!(image.endianness(), Endianness::Little);
    assert_eq!(image.signature_offset(), SIGNATURE_OFFSET as u64);
    assert_eq!(image.coff_header().machine, MachineType::Unknown);
    assert_eq!(image.coff_header().number_of_sections, 0);
    assert_eq!(image.optional_header().variant(), OptionalHeaderVariant::Std);
    assert!(image.sections().is_empty());
    assert!(image.exports().is_none());
    assert!(image.export_names().is_empty());
    for (_, directory) in image.optional_header().data_directories().iter() {
        assert_eq!(directory, DataDirectory::default());
    }
    assert!(image.path().is_none());
}

#[test]
fn parse_pe32_header() {
    init_logger();

    let data = Synthetic::pe32().build().bytes;
    let image = PeFile::parse(&data).unwrap();

    let coff = image.coff_header();
    assert_eq!(coff.machine, MachineType::I386);
    assert_eq!(coff.time_date_stamp, chrono::DateTime::<chrono::Utc>::from_timestamp(TIMESTAMP as i64, 0).unwrap());
    assert_eq!(coff.size_of_optional_header, 224);
    assert!(coff.characteristics.contains(FileCharacteristics::EXECUTABLE_IMAGE));
    assert!(coff.characteristics.contains(FileCharacteristics::MACHINE_32BIT));
    assert!(coff.characteristics.contains(FileCharacteristics::DLL));

    let header = image.optional_header();
    assert_eq!(header.magic(), 0x010b);
    assert_eq!(header.linker_version(), Version { major: 14, minor: 29 });
    assert_eq!(header.address_of_entry_point(), 0x1234);
    assert_eq!(header.base_of_data(), 0x2000);
    assert_eq!(header.image_base(), 0x40_0000);
    assert_eq!(header.subsystem(), Subsystem::WindowsCui);
    assert_eq!(header.subsystem_version(), Version { major: 6, minor: 1 });
    assert!(header.dll_characteristics().contains(DllCharacteristics::DYNAMIC_BASE));
    assert!(header.dll_characteristics().contains(DllCharacteristics::NX_COMPAT));
    assert!(header.dll_characteristics().contains(DllCharacteristics::TERMINAL_SERVER_AWARE));
    assert_eq!(header.stack_size(), MemorySize {
        reserve: 0x10_0000,
        commit:  0x1000,
    });
    assert_eq!(header.number_of_rva_and_sizes(), 16);
    match header {
        OptionalHeader::Std(data) => assert_eq!(data.size_of_stack_reserve, 0x10_0000u32),
        OptionalHeader::Plus(_) => panic!("expected PE32 header"),
    }
}

#[test]
fn parse_pe32_plus_header() {
    init_logger();

    let data = Synthetic::pe32_plus().build().bytes;
    let image = PeFile::parse(&data).unwrap();

    let header = image.optional_header();
    assert_eq!(image.coff_header().machine, MachineType::AMD64);
    assert_eq!(header.variant(), OptionalHeaderVariant::Plus);
    assert_eq!(header.magic(), 0x020b);
    assert_eq!(header.image_base(), 0x1_4000_0000);
    assert_eq!(header.base_of_data(), 0);
    assert_eq!(header.heap_size(), MemorySize {
        reserve: 0x10_0000,
        commit:  0x1000,
    });
    assert!(matches!(header, OptionalHeader::Plus(_)));
}

#[test]
fn variant_layouts_differ() {
    assert_eq!(layout::PE32_LAYOUT.get(layout::OptionalField::ImageBase).unwrap().width.size(), 4);
    assert_eq!(layout::PE32_PLUS_LAYOUT.get(layout::OptionalField::ImageBase).unwrap().width.size(), 8);
    assert!(layout::PE32_LAYOUT.contains(layout::OptionalField::BaseOfData));
    assert!(!layout::PE32_PLUS_LAYOUT.contains(layout::OptionalField::BaseOfData));

    let export = layout::OptionalField::Directory(DataDirectoryType::ExportTable);
    assert_eq!(layout::PE32_LAYOUT.get(export).unwrap().offset, 96);
    assert_eq!(layout::PE32_PLUS_LAYOUT.get(export).unwrap().offset, 112);
}

#[test]
fn unknown_magic() {
    init_logger();

    let data = Synthetic {
        magic: 0x0107,
        ..Synthetic::pe32()
    }
    .build()
    .bytes;
    match PeFile::parse(&data) {
        Err(DecodeError::UnknownVariant { magic }) => assert_eq!(magic, 0x0107),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn signature_mismatch() {
    init_logger();

    let mut w = Synthetic::pe32().build();
    w.put(SIGNATURE_OFFSET, b"PX\0\0");
    match PeFile::parse(&w.bytes) {
        Err(DecodeError::SignatureMismatch { path, found }) => {
            assert_eq!(path, None);
            assert_eq!(&found, b"PX\0\0");
        }
        other => panic!("unexpected result {:?}", other),
    }

    // the file header is never read, so a truncated image fails the same way
    w.bytes.truncate(SIGNATURE_OFFSET + 4);
    assert!(matches!(PeFile::parse(&w.bytes), Err(DecodeError::SignatureMismatch { .. })));
}

#[test]
fn loader_flags_must_be_zero() {
    init_logger();

    let data = Synthetic {
        loader_flags: 1,
        ..Synthetic::minimal()
    }
    .build()
    .bytes;
    match PeFile::parse(&data) {
        Err(DecodeError::ReservedFieldViolation { field, value }) => {
            assert_eq!(field, "loader_flags");
            assert_eq!(value, 1);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn win32_version_value_must_be_zero() {
    init_logger();

    let data = Synthetic {
        win32_version_value: 0x0a00,
        ..Synthetic::pe32_plus()
    }
    .build()
    .bytes;
    match PeFile::parse(&data) {
        Err(DecodeError::ReservedFieldViolation { field, value }) => {
            assert_eq!(field, "win32_version_value");
            assert_eq!(value, 0x0a00);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn truncated_optional_header() {
    init_logger();

    let mut data = Synthetic::pe32().build().bytes;
    data.truncate(OPTIONAL_OFFSET + 100);
    match PeFile::parse(&data) {
        Err(DecodeError::OutOfBounds { offset, length, .. }) => {
            assert_eq!(offset, OPTIONAL_OFFSET as u64);
            assert_eq!(length, 224);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn directory_count_limits_table() {
    init_logger();

    let data = Synthetic {
        number_of_rva_and_sizes: 0,
        export_table: (0x200, 0x100),
        ..Synthetic::pe32()
    }
    .build()
    .bytes;
    let image = PeFile::parse(&data).unwrap();
    assert_eq!(image.data_directory(DataDirectoryType::ExportTable), DataDirectory::default());
    assert!(image.exports().is_none());
}

#[test]
fn parse_sections() {
    init_logger();

    let data = Synthetic {
        sections: vec![
            SectionSpec {
                name:                *b".text\0\0\0",
                virtual_size:        0x0fe0,
                virtual_address:     0x1000,
                size_of_raw_data:    0x1000,
                pointer_to_raw_data: 0x400,
                characteristics:     0x6000_0020,
            },
            SectionSpec {
                name:                *b".textbss",
                virtual_size:        0x2000,
                virtual_address:     0x2000,
                size_of_raw_data:    0,
                pointer_to_raw_data: 0,
                characteristics:     0xe050_0080,
            },
            SectionSpec {
                name:                *b"ab\0cdefg",
                virtual_size:        0x10,
                virtual_address:     0x4000,
                size_of_raw_data:    0x200,
                pointer_to_raw_data: 0x1400,
                characteristics:     0x4000_0040,
            },
        ],
        ..Synthetic::pe32()
    }
    .build()
    .bytes;
    let image = PeFile::parse(&data).unwrap();

    let names: Vec<_> = image.sections().keys().map(String::as_str).collect();
    assert_eq!(names, vec![".text", ".textbss", "ab"]);

    let text = image.section(".text").unwrap();
    assert_eq!(text.virtual_address, 0x1000);
    assert_eq!(text.file_range(), 0x400..0x1400);
    assert!(text.characteristics.contains(SectionCharacteristics::CNT_CODE));
    assert!(text.characteristics.contains(SectionCharacteristics::MEM_EXECUTE));
    assert!(text.contains_rva(0x1fff));
    assert_eq!(text.alignment, None);

    let bss = image.section(".textbss").unwrap();
    assert_eq!(bss.name.len(), 8);
    assert_eq!(bss.alignment, Some(SectionAlignment::Bytes16));
    assert_eq!(bss.alignment.unwrap().bytes(), 16);
    assert!(bss.characteristics.contains(SectionCharacteristics::MEM_WRITE));

    assert_eq!(image.section("ab").unwrap().name.len(), 2);
}

#[test]
fn duplicate_section_names_overwrite() {
    init_logger();

    let section = |virtual_address| SectionSpec {
        name: *b".data\0\0\0",
        virtual_size: 0x100,
        virtual_address,
        size_of_raw_data: 0x200,
        pointer_to_raw_data: 0x400,
        characteristics: 0xc000_0040,
    };
    let data = Synthetic {
        sections: vec![section(0x1000), section(0x3000)],
        ..Synthetic::pe32()
    }
    .build()
    .bytes;
    let image = PeFile::parse(&data).unwrap();
    assert_eq!(image.coff_header().number_of_sections, 2);
    assert_eq!(image.sections().len(), 1);
    assert_eq!(image.section(".data").unwrap().virtual_address, 0x3000);
}

#[test]
fn truncated_section_table() {
    init_logger();

    let spec = Synthetic {
        sections: vec![SectionSpec {
            name:                *b".text\0\0\0",
            virtual_size:        0x100,
            virtual_address:     0x1000,
            size_of_raw_data:    0x200,
            pointer_to_raw_data: 0x400,
            characteristics:     0,
        }],
        ..Synthetic::pe32()
    };
    let mut data = spec.build().bytes;
    data.truncate(spec.section_table_offset() + 39);
    match PeFile::parse(&data) {
        Err(DecodeError::OutOfBounds { offset, length, .. }) => {
            assert_eq!(offset, spec.section_table_offset() as u64);
            assert_eq!(length, 40);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn parse_exports() {
    init_logger();

    let image = PeFile::parse(exporting_image(Endianness::Little)).unwrap();
    assert_eq!(image.data_directory(DataDirectoryType::ExportTable), DataDirectory {
        virtual_address: 0x200,
        size:            0x100,
    });

    let exports = image.exports().unwrap();
    assert_eq!(exports.name, "synthetic.dll");
    assert_eq!(exports.version, Version { major: 1, minor: 2 });
    assert_eq!(exports.ordinal_base, 1);
    assert_eq!(exports.address_table_entries, 6);
    assert_eq!(exports.number_of_names, 2);
    assert_eq!(exports.len(), 2);
    assert_eq!(exports.ordinal("Beta"), Some(3));
    assert_eq!(exports.ordinal("Gamma"), None);

    assert_eq!(entries(&image), vec![("Alpha".to_string(), 5), ("Beta".to_string(), 3)]);
    assert_eq!(image.export_names(), vec!["Alpha", "Beta"]);
}

#[test]
fn export_flags_must_be_zero() {
    init_logger();

    let mut data = exporting_image(Endianness::Little);
    data[0x200] = 1;
    match PeFile::parse(&data) {
        Err(DecodeError::ReservedFieldViolation { field, value }) => {
            assert_eq!(field, "export_flags");
            assert_eq!(value, 1);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn unterminated_export_name() {
    init_logger();

    let mut data = exporting_image(Endianness::Little);
    let end = 0x200 + 0x80 + "synthetic.dll".len();
    data.truncate(end);
    match PeFile::parse(&data) {
        Err(DecodeError::OutOfBounds { offset, length, .. }) => {
            assert_eq!(offset, end as u64);
            assert_eq!(length, 1);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn big_endian_image() {
    init_logger();

    let little = PeFile::parse(exporting_image(Endianness::Little)).unwrap();
    let big = PeFile::parse(exporting_image(Endianness::Big)).unwrap();

    assert_eq!(little.endianness(), Endianness::Little);
    assert_eq!(big.endianness(), Endianness::Big);
    assert_eq!(big.coff_header(), little.coff_header());
    assert_eq!(big.optional_header(), little.optional_header());
    assert_eq!(big.exports(), little.exports());
    assert_eq!(entries(&big), vec![("Alpha".to_string(), 5), ("Beta".to_string(), 3)]);
}

/// Exports in a section whose file position differs from its virtual address.
fn mapped_exporting_image() -> Vec<u8> {
    let mut w = Synthetic {
        export_table: (0x3000, 0x100),
        sections: vec![SectionSpec {
            name:                *b".edata\0\0",
            virtual_size:        0x100,
            virtual_address:     0x3000,
            size_of_raw_data:    0x200,
            pointer_to_raw_data: 0x200,
            characteristics:     0x4000_0040,
        }],
        ..Synthetic::pe32()
    }
    .build();
    write_exports(&mut w, 0x200, 0x3000);
    w.bytes.resize(0x400, 0);
    w.bytes
}

#[test]
fn identity_resolution_reads_rvas_as_file_positions() {
    init_logger();

    let data = mapped_exporting_image();
    match PeFile::parse(&data) {
        Err(DecodeError::OutOfBounds { offset, .. }) => assert_eq!(offset, 0x3000),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn section_mapped_resolution() {
    init_logger();

    let options = ParseOptions::new().with_rva_resolution(RvaResolution::SectionMapped);
    let image = PeFile::parse_with_options(mapped_exporting_image(), options).unwrap();
    assert_eq!(image.exports().unwrap().name, "synthetic.dll");
    assert_eq!(entries(&image), vec![("Alpha".to_string(), 5), ("Beta".to_string(), 3)]);

    // rvas outside every section can't be mapped
    let mut data = mapped_exporting_image();
    data[OPTIONAL_OFFSET + 96..OPTIONAL_OFFSET + 100].copy_from_slice(&0x9000u32.to_le_bytes());
    match PeFile::parse_with_options(&data, options) {
        Err(DecodeError::UnmappedRva { rva }) => assert_eq!(rva, 0x9000),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn parse_file() {
    init_logger();

    let data = exporting_image(Endianness::Little);
    let path = temp_file("exports.dll", &data);
    let image = PeFile::parse_file(&path);
    std::fs::remove_file(&path).unwrap();

    let image = image.unwrap();
    assert!(image.path().unwrap().ends_with(path.file_name().unwrap()));
    assert_eq!(image.export_names(), vec!["Alpha", "Beta"]);

    let memory = PeFile::parse(&data).unwrap();
    assert_eq!(image.coff_header(), memory.coff_header());
    assert_eq!(image.optional_header(), memory.optional_header());
    assert_eq!(image.sections(), memory.sections());
    assert_eq!(image.exports(), memory.exports());
}

#[test]
fn file_errors_carry_path() {
    init_logger();

    let mut w = Synthetic::pe32().build();
    w.put(SIGNATURE_OFFSET, b"NE\0\0");
    let path = temp_file("not-pe.exe", &w.bytes);
    let result = PeFile::parse_file(&path);
    std::fs::remove_file(&path).unwrap();
    match result {
        Err(error @ DecodeError::SignatureMismatch { .. }) => {
            assert!(error.to_string().contains("not-pe.exe"), "{error}");
            if let DecodeError::SignatureMismatch { path, found } = error {
                assert!(path.unwrap().ends_with(format!("peinspect-{}-not-pe.exe", std::process::id())));
                assert_eq!(&found, b"NE\0\0");
            }
        }
        other => panic!("unexpected result {:?}", other),
    }

    let mut data = Synthetic::pe32().build().bytes;
    data.truncate(OPTIONAL_OFFSET + 10);
    let path = temp_file("truncated.exe", &data);
    let result = PeFile::parse_file(&path);
    std::fs::remove_file(&path).unwrap();
    match result {
        Err(DecodeError::OutOfBounds { offset, path, .. }) => {
            assert_eq!(offset, OPTIONAL_OFFSET as u64);
            assert!(path.unwrap().ends_with(format!("peinspect-{}-truncated.exe", std::process::id())));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn missing_file() {
    init_logger();

    let path = std::env::temp_dir().join(format!("peinspect-{}-missing.exe", std::process::id()));
    match PeFile::parse_file(&path) {
        Err(DecodeError::Io { source, path: Some(_), .. }) => assert_eq!(source.kind(), ErrorKind::NotFound),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn parse_reader() {
    init_logger();

    let reader = std::io::BufReader::new(Cursor::new(exporting_image(Endianness::Big)));
    let image = PeFile::parse_reader(reader).unwrap();
    assert_eq!(image.endianness(), Endianness::Big);
    assert_eq!(image.export_names(), vec!["Alpha", "Beta"]);
}

#[test]
fn source_is_released() {
    init_logger();

    let released = Rc::new(Cell::new(false));
    let source = TrackedSource {
        inner:    Cursor::new(exporting_image(Endianness::Little)),
        released: released.clone(),
        fail:     false,
    };
    assert!(PeFile::parse_reader(source).is_ok());
    assert!(released.get());

    // released when decoding fails too
    let released = Rc::new(Cell::new(false));
    let source = TrackedSource {
        inner:    Cursor::new(Synthetic {
            loader_flags: 1,
            ..Synthetic::pe32()
        }
        .build()
        .bytes),
        released: released.clone(),
        fail:     false,
    };
    assert!(matches!(
        PeFile::parse_reader(source),
        Err(DecodeError::ReservedFieldViolation { .. })
    ));
    assert!(released.get());
}

#[test]
fn release_failure() {
    init_logger();

    let released = Rc::new(Cell::new(false));
    let source = TrackedSource {
        inner:    Cursor::new(exporting_image(Endianness::Little)),
        released: released.clone(),
        fail:     true,
    };
    match PeFile::parse_reader(source) {
        Err(DecodeError::ResourceRelease { source, .. }) => assert_eq!(source.kind(), ErrorKind::Other),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(released.get());

    // a decode error takes precedence over the release error
    let mut w = Synthetic::pe32().build();
    w.put(SIGNATURE_OFFSET, b"PX\0\0");
    let source = TrackedSource {
        inner:    Cursor::new(w.bytes),
        released: Rc::new(Cell::new(false)),
        fail:     true,
    };
    assert!(matches!(
        PeFile::parse_reader(source),
        Err(DecodeError::SignatureMismatch { .. })
    ));
}

#[test]
fn endianness_symmetry() {
    let patterns: [u64; 6] = [0, 1, 0x7f, 0x8000_0000_0000_0001, 0x0123_4567_89ab_cdef, u64::MAX];
    for pattern in patterns {
        let little = (pattern as u16).to_le_bytes();
        let mut big = little;
        big.reverse();
        assert_eq!(
            ByteOrderView::new(&little, Endianness::Little).read_u16(0).unwrap(),
            ByteOrderView::new(&big, Endianness::Big).read_u16(0).unwrap()
        );
        assert_eq!(
            ByteOrderView::new(&little, Endianness::Little).read_i16(0).unwrap(),
            ByteOrderView::new(&big, Endianness::Big).read_i16(0).unwrap()
        );

        let little = (pattern as u32).to_le_bytes();
        let mut big = little;
        big.reverse();
        assert_eq!(
            ByteOrderView::new(&little, Endianness::Little).read_u32(0).unwrap(),
            ByteOrderView::new(&big, Endianness::Big).read_u32(0).unwrap()
        );
        assert_eq!(
            ByteOrderView::new(&little, Endianness::Little).read_i32(0).unwrap(),
            ByteOrderView::new(&big, Endianness::Big).read_i32(0).unwrap()
        );

        let little = pattern.to_le_bytes();
        let mut big = little;
        big.reverse();
        let value = ByteOrderView::new(&little, Endianness::Little).read_u64(0).unwrap();
        assert_eq!(value, pattern);
        assert_eq!(value, ByteOrderView::new(&big, Endianness::Big).read_u64(0).unwrap());
        assert_eq!(
            ByteOrderView::new(&little, Endianness::Little).read_i64(0).unwrap(),
            ByteOrderView::new(&big, Endianness::Big).read_i64(0).unwrap()
        );
    }
}

#[test]
fn unsigned_reads_are_never_negative() {
    let view = ByteOrderView::new(&[0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], Endianness::Big);
    assert_eq!(view.read_i8(0).unwrap(), i8::MIN);
    assert_eq!(view.read_u8(0).unwrap(), 0x80);
    assert_eq!(view.read_i16(0).unwrap(), i16::MIN);
    assert_eq!(view.read_u16(0).unwrap(), 1 << 15);
    assert_eq!(view.read_i32(0).unwrap(), i32::MIN);
    assert_eq!(view.read_u32(0).unwrap(), 1 << 31);
    assert_eq!(view.read_i64(0).unwrap(), i64::MIN);
    assert_eq!(view.read_u64(0).unwrap(), 1 << 63);

    let view = ByteOrderView::new(&[0xff; 8], Endianness::Little);
    assert_eq!(view.read_i32(0).unwrap(), -1);
    assert_eq!(view.read_u16(0).unwrap(), u16::MAX);
    assert_eq!(view.read_u32(0).unwrap(), u32::MAX);
    assert_eq!(view.read_u64(0).unwrap(), u64::MAX);
}

#[test]
fn section_table_requires_exact_length() {
    let mut record = [0u8; 40];
    record[..8].copy_from_slice(b"abcdefgh");
    let view = ByteOrderView::new(&record, Endianness::Little);
    let sections = parse_section_table(&view, 1).unwrap();
    assert_eq!(sections["abcdefgh"].name.len(), 8);

    assert!(matches!(parse_section_table(&view, 2), Err(DecodeError::OutOfBounds { .. })));
    assert!(parse_section_table(&view.subview(0, 0).unwrap(), 0).unwrap().is_empty());

    for k in 0..8 {
        let mut name = *b"abcdefgh";
        name[k] = 0;
        assert_eq!(section_name(&name).len(), k);
    }
}

#[test]
fn duplicate_export_names_keep_first_ordinal() {
    init_logger();

    let mut w = Synthetic {
        export_table: (0x200, 0x100),
        ..Synthetic::pe32()
    }
    .build();
    write_exports(&mut w, 0x200, 0x200);
    // second name pointer refers to "Alpha" as well
    w.put_u32(0x200 + 0x44, 0x260);

    let image = PeFile::parse(&w.bytes).unwrap();
    let exports = image.exports().unwrap();
    assert_eq!(exports.number_of_names, 2);
    assert_eq!(exports.len(), 1);
    assert_eq!(entries(&image), vec![("Alpha".to_string(), 5)]);
    assert_eq!(exports.ordinal("Alpha"), Some(5));
    assert_eq!(exports.ordinal("Beta"), None);
}

#[test]
fn section_mapped_resolution_uses_replaced_sections() {
    init_logger();

    let section = |virtual_address, pointer_to_raw_data| SectionSpec {
        name: *b".edata\0\0",
        virtual_size: 0x100,
        virtual_address,
        size_of_raw_data: 0x100,
        pointer_to_raw_data,
        characteristics: 0x4000_0040,
    };
    let mut w = Synthetic {
        export_table: (0x3000, 0x100),
        sections: vec![section(0x3000, 0x200), section(0x8000, 0x300)],
        ..Synthetic::pe32()
    }
    .build();
    write_exports(&mut w, 0x200, 0x3000);
    w.bytes.resize(0x400, 0);

    let options = ParseOptions::new().with_rva_resolution(RvaResolution::SectionMapped);
    let image = PeFile::parse_with_options(&w.bytes, options).unwrap();
    assert_eq!(image.sections().len(), 1);
    assert_eq!(image.section(".edata").unwrap().virtual_address, 0x8000);
    assert_eq!(image.exports().unwrap().name, "synthetic.dll");
    assert_eq!(entries(&image), vec![("Alpha".to_string(), 5), ("Beta".to_string(), 3)]);
}
