//! Binary format constants.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format>.

pub type DWORD = u32;
pub type WORD = u16;


// https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#signature-image-only

pub const PE_PTR_OFFSET: u64 = 0x03c;
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE_SIGNATURE_SIZE: u64 = 4;

pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
pub const EXPORT_DIRECTORY_SIZE: usize = 40;
pub const DATA_DIRECTORY_SIZE: usize = 8;
pub const DATA_DIRECTORY_COUNT: usize = 16;
pub const SECTION_NAME_SIZE: usize = 8;


// https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#optional-header-image-only

pub const PE_32_MAGIC: WORD = 0x010b;
pub const PE_64_MAGIC: WORD = 0x020b;


// https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#machine-types

pub const IMAGE_FILE_MACHINE_UNKNOWN: WORD = 0x0000;
pub const IMAGE_FILE_MACHINE_ALPHA: WORD = 0x0184;
pub const IMAGE_FILE_MACHINE_ALPHA64: WORD = 0x0284;
pub const IMAGE_FILE_MACHINE_AM33: WORD = 0x01d3;
pub const IMAGE_FILE_MACHINE_AMD64: WORD = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM: WORD = 0x01c0;
pub const IMAGE_FILE_MACHINE_ARM64: WORD = 0xaa64;
pub const IMAGE_FILE_MACHINE_ARMNT: WORD = 0x01c4;
pub const IMAGE_FILE_MACHINE_EBC: WORD = 0x0ebc;
pub const IMAGE_FILE_MACHINE_I386: WORD = 0x014c;
pub const IMAGE_FILE_MACHINE_IA64: WORD = 0x0200;
pub const IMAGE_FILE_MACHINE_LOONGARCH32: WORD = 0x6232;
pub const IMAGE_FILE_MACHINE_LOONGARCH64: WORD = 0x6264;
pub const IMAGE_FILE_MACHINE_M32R: WORD = 0x9041;
pub const IMAGE_FILE_MACHINE_MIPS16: WORD = 0x0266;
pub const IMAGE_FILE_MACHINE_MIPSFPU: WORD = 0x0366;
pub const IMAGE_FILE_MACHINE_MIPSFPU16: WORD = 0x0466;
pub const IMAGE_FILE_MACHINE_POWERPC: WORD = 0x01f0;
pub const IMAGE_FILE_MACHINE_POWERPCFP: WORD = 0x01f1;
pub const IMAGE_FILE_MACHINE_R4000: WORD = 0x0166;
pub const IMAGE_FILE_MACHINE_RISCV32: WORD = 0x5032;
pub const IMAGE_FILE_MACHINE_RISCV64: WORD = 0x5064;
pub const IMAGE_FILE_MACHINE_RISCV128: WORD = 0x5128;
pub const IMAGE_FILE_MACHINE_SH3: WORD = 0x01a2;
pub const IMAGE_FILE_MACHINE_SH3DSP: WORD = 0x01a3;
pub const IMAGE_FILE_MACHINE_SH4: WORD = 0x01a6;
pub const IMAGE_FILE_MACHINE_SH5: WORD = 0x01a8;
pub const IMAGE_FILE_MACHINE_THUMB: WORD = 0x01c2;
pub const IMAGE_FILE_MACHINE_WCEMIPSV2: WORD = 0x0169;


// https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#windows-subsystem

pub const IMAGE_SUBSYSTEM_UNKNOWN: WORD = 0;
pub const IMAGE_SUBSYSTEM_NATIVE: WORD = 1;
pub const IMAGE_SUBSYSTEM_WINDOWS_GUI: WORD = 2;
pub const IMAGE_SUBSYSTEM_WINDOWS_CUI: WORD = 3;
pub const IMAGE_SUBSYSTEM_OS2_CUI: WORD = 5;
pub const IMAGE_SUBSYSTEM_POSIX_CUI: WORD = 7;
pub const IMAGE_SUBSYSTEM_NATIVE_WINDOWS: WORD = 8;
pub const IMAGE_SUBSYSTEM_WINDOWS_CE_GUI: WORD = 9;
pub const IMAGE_SUBSYSTEM_EFI_APPLICATION: WORD = 10;
pub const IMAGE_SUBSYSTEM_EFI_BOOT_SERVICE_DRIVER: WORD = 11;
pub const IMAGE_SUBSYSTEM_EFI_RUNTIME_DRIVER: WORD = 12;
pub const IMAGE_SUBSYSTEM_EFI_ROM: WORD = 13;
pub const IMAGE_SUBSYSTEM_XBOX: WORD = 14;
pub const IMAGE_SUBSYSTEM_WINDOWS_BOOT_APPLICATION: WORD = 16;


// https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#section-flags

pub const IMAGE_SCN_ALIGN_MASK: DWORD = 0x00f00000;
pub const IMAGE_SCN_ALIGN_SHIFT: u32 = 20;
