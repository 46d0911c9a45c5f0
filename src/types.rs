//! Portable executable value types shared by the decoders.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format>.

use ahash::RandomState;
use bitflags::bitflags;
use indexmap::IndexMap;

use crate::constants::*;

/// Major/minor version pair.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

/// Reserved and committed memory size pair, used for the stack and the heap.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct MemorySize {
    pub reserve: u64,
    pub commit:  u64,
}

/// Target machine of an image.
///
/// Codes without a known machine map to [`MachineType::Unknown`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum MachineType {
    #[default]
    Unknown,
    Alpha,
    Alpha64,
    AM33,
    AMD64,
    ARM,
    ARM64,
    ARMNT,
    EBC,
    I386,
    IA64,
    LoongArch32,
    LoongArch64,
    M32R,
    MIPS16,
    MIPSFPU,
    MIPSFPU16,
    PowerPC,
    PowerPCFP,
    R4000,
    RISCV32,
    RISCV64,
    RISCV128,
    SH3,
    SH3DSP,
    SH4,
    SH5,
    Thumb,
    WCEMIPSv2,
}
impl MachineType {
    pub const fn from_code(code: WORD) -> Self {
        use MachineType::*;
        match code {
            IMAGE_FILE_MACHINE_ALPHA => Alpha,
            IMAGE_FILE_MACHINE_ALPHA64 => Alpha64,
            IMAGE_FILE_MACHINE_AM33 => AM33,
            IMAGE_FILE_MACHINE_AMD64 => AMD64,
            IMAGE_FILE_MACHINE_ARM => ARM,
            IMAGE_FILE_MACHINE_ARM64 => ARM64,
            IMAGE_FILE_MACHINE_ARMNT => ARMNT,
            IMAGE_FILE_MACHINE_EBC => EBC,
            IMAGE_FILE_MACHINE_I386 => I386,
            IMAGE_FILE_MACHINE_IA64 => IA64,
            IMAGE_FILE_MACHINE_LOONGARCH32 => LoongArch32,
            IMAGE_FILE_MACHINE_LOONGARCH64 => LoongArch64,
            IMAGE_FILE_MACHINE_M32R => M32R,
            IMAGE_FILE_MACHINE_MIPS16 => MIPS16,
            IMAGE_FILE_MACHINE_MIPSFPU => MIPSFPU,
            IMAGE_FILE_MACHINE_MIPSFPU16 => MIPSFPU16,
            IMAGE_FILE_MACHINE_POWERPC => PowerPC,
            IMAGE_FILE_MACHINE_POWERPCFP => PowerPCFP,
            IMAGE_FILE_MACHINE_R4000 => R4000,
            IMAGE_FILE_MACHINE_RISCV32 => RISCV32,
            IMAGE_FILE_MACHINE_RISCV64 => RISCV64,
            IMAGE_FILE_MACHINE_RISCV128 => RISCV128,
            IMAGE_FILE_MACHINE_SH3 => SH3,
            IMAGE_FILE_MACHINE_SH3DSP => SH3DSP,
            IMAGE_FILE_MACHINE_SH4 => SH4,
            IMAGE_FILE_MACHINE_SH5 => SH5,
            IMAGE_FILE_MACHINE_THUMB => Thumb,
            IMAGE_FILE_MACHINE_WCEMIPSV2 => WCEMIPSv2,
            _ => Unknown,
        }
    }

    pub const fn code(&self) -> WORD {
        use MachineType::*;
        match self {
            Unknown => IMAGE_FILE_MACHINE_UNKNOWN,
            Alpha => IMAGE_FILE_MACHINE_ALPHA,
            Alpha64 => IMAGE_FILE_MACHINE_ALPHA64,
            AM33 => IMAGE_FILE_MACHINE_AM33,
            AMD64 => IMAGE_FILE_MACHINE_AMD64,
            ARM => IMAGE_FILE_MACHINE_ARM,
            ARM64 => IMAGE_FILE_MACHINE_ARM64,
            ARMNT => IMAGE_FILE_MACHINE_ARMNT,
            EBC => IMAGE_FILE_MACHINE_EBC,
            I386 => IMAGE_FILE_MACHINE_I386,
            IA64 => IMAGE_FILE_MACHINE_IA64,
            LoongArch32 => IMAGE_FILE_MACHINE_LOONGARCH32,
            LoongArch64 => IMAGE_FILE_MACHINE_LOONGARCH64,
            M32R => IMAGE_FILE_MACHINE_M32R,
            MIPS16 => IMAGE_FILE_MACHINE_MIPS16,
            MIPSFPU => IMAGE_FILE_MACHINE_MIPSFPU,
            MIPSFPU16 => IMAGE_FILE_MACHINE_MIPSFPU16,
            PowerPC => IMAGE_FILE_MACHINE_POWERPC,
            PowerPCFP => IMAGE_FILE_MACHINE_POWERPCFP,
            R4000 => IMAGE_FILE_MACHINE_R4000,
            RISCV32 => IMAGE_FILE_MACHINE_RISCV32,
            RISCV64 => IMAGE_FILE_MACHINE_RISCV64,
            RISCV128 => IMAGE_FILE_MACHINE_RISCV128,
            SH3 => IMAGE_FILE_MACHINE_SH3,
            SH3DSP => IMAGE_FILE_MACHINE_SH3DSP,
            SH4 => IMAGE_FILE_MACHINE_SH4,
            SH5 => IMAGE_FILE_MACHINE_SH5,
            Thumb => IMAGE_FILE_MACHINE_THUMB,
            WCEMIPSv2 => IMAGE_FILE_MACHINE_WCEMIPSV2,
        }
    }
}

/// Windows subsystem required to run an image.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum Subsystem {
    #[default]
    Unknown,
    Native,
    WindowsGui,
    WindowsCui,
    Os2Cui,
    PosixCui,
    NativeWindows,
    WindowsCeGui,
    EfiApplication,
    EfiBootServiceDriver,
    EfiRuntimeDriver,
    EfiRom,
    Xbox,
    WindowsBootApplication,
}
impl Subsystem {
    pub const fn from_code(code: WORD) -> Self {
        use Subsystem::*;
        match code {
            IMAGE_SUBSYSTEM_NATIVE => Native,
            IMAGE_SUBSYSTEM_WINDOWS_GUI => WindowsGui,
            IMAGE_SUBSYSTEM_WINDOWS_CUI => WindowsCui,
            IMAGE_SUBSYSTEM_OS2_CUI => Os2Cui,
            IMAGE_SUBSYSTEM_POSIX_CUI => PosixCui,
            IMAGE_SUBSYSTEM_NATIVE_WINDOWS => NativeWindows,
            IMAGE_SUBSYSTEM_WINDOWS_CE_GUI => WindowsCeGui,
            IMAGE_SUBSYSTEM_EFI_APPLICATION => EfiApplication,
            IMAGE_SUBSYSTEM_EFI_BOOT_SERVICE_DRIVER => EfiBootServiceDriver,
            IMAGE_SUBSYSTEM_EFI_RUNTIME_DRIVER => EfiRuntimeDriver,
            IMAGE_SUBSYSTEM_EFI_ROM => EfiRom,
            IMAGE_SUBSYSTEM_XBOX => Xbox,
            IMAGE_SUBSYSTEM_WINDOWS_BOOT_APPLICATION => WindowsBootApplication,
            _ => Unknown,
        }
    }
}

bitflags! {
    /// File header characteristics.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
    pub struct FileCharacteristics: u16 {
        const RELOCS_STRIPPED = 0x0001;
        const EXECUTABLE_IMAGE = 0x0002;
        const LINE_NUMS_STRIPPED = 0x0004;
        const LOCAL_SYMS_STRIPPED = 0x0008;
        const AGGRESSIVE_WS_TRIM = 0x0010;
        const LARGE_ADDRESS_AWARE = 0x0020;
        const RESERVED = 0x0040;
        const BYTES_REVERSED_LO = 0x0080;
        const MACHINE_32BIT = 0x0100;
        const DEBUG_STRIPPED = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP = 0x0800;
        const SYSTEM = 0x1000;
        const DLL = 0x2000;
        const UP_SYSTEM_ONLY = 0x4000;
        const BYTES_REVERSED_HI = 0x8000;
    }
}

bitflags! {
    /// Optional header DLL characteristics.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA = 0x0020;
        const DYNAMIC_BASE = 0x0040;
        const FORCE_INTEGRITY = 0x0080;
        const NX_COMPAT = 0x0100;
        const NO_ISOLATION = 0x0200;
        const NO_SEH = 0x0400;
        const NO_BIND = 0x0800;
        const APPCONTAINER = 0x1000;
        const WDM_DRIVER = 0x2000;
        const GUARD_CF = 0x4000;
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

bitflags! {
    /// Section characteristics, excluding the alignment sub-field.
    #[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
    pub struct SectionCharacteristics: u32 {
        const TYPE_NO_PAD = 0x00000008;
        const CNT_CODE = 0x00000020;
        const CNT_INITIALIZED_DATA = 0x00000040;
        const CNT_UNINITIALIZED_DATA = 0x00000080;
        const LNK_OTHER = 0x00000100;
        const LNK_INFO = 0x00000200;
        const LNK_REMOVE = 0x00000800;
        const LNK_COMDAT = 0x00001000;
        const GPREL = 0x00008000;
        const MEM_PURGEABLE = 0x00020000;
        const MEM_16BIT = 0x00020000;
        const MEM_LOCKED = 0x00040000;
        const MEM_PRELOAD = 0x00080000;
        const LNK_NRELOC_OVFL = 0x01000000;
        const MEM_DISCARDABLE = 0x02000000;
        const MEM_NOT_CACHED = 0x04000000;
        const MEM_NOT_PAGED = 0x08000000;
        const MEM_SHARED = 0x10000000;
        const MEM_EXECUTE = 0x20000000;
        const MEM_READ = 0x40000000;
        const MEM_WRITE = 0x80000000;
    }
}

/// Section data alignment, encoded in bits 20 to 23 of the section characteristics.
///
/// Only meaningful for object files.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SectionAlignment {
    Bytes1,
    Bytes2,
    Bytes4,
    Bytes8,
    Bytes16,
    Bytes32,
    Bytes64,
    Bytes128,
    Bytes256,
    Bytes512,
    Bytes1024,
    Bytes2048,
    Bytes4096,
    Bytes8192,
}
impl SectionAlignment {
    pub const fn from_characteristics(characteristics: DWORD) -> Option<Self> {
        use SectionAlignment::*;
        match (characteristics & IMAGE_SCN_ALIGN_MASK) >> IMAGE_SCN_ALIGN_SHIFT {
            0x1 => Some(Bytes1),
            0x2 => Some(Bytes2),
            0x3 => Some(Bytes4),
            0x4 => Some(Bytes8),
            0x5 => Some(Bytes16),
            0x6 => Some(Bytes32),
            0x7 => Some(Bytes64),
            0x8 => Some(Bytes128),
            0x9 => Some(Bytes256),
            0xa => Some(Bytes512),
            0xb => Some(Bytes1024),
            0xc => Some(Bytes2048),
            0xd => Some(Bytes4096),
            0xe => Some(Bytes8192),
            _ => None,
        }
    }

    /// Returns the alignment in bytes.
    pub const fn bytes(&self) -> u32 { 1 << (*self as u32) }
}

/// Image data directory type enumeration, in directory table order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DataDirectoryType {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TLSTable,
    LoadConfigTable,
    BoundImport,
    IAT,
    DelayImportDescriptor,
    CLRRuntimeHeader,
    Reserved,
}
impl DataDirectoryType {
    pub const ALL: [DataDirectoryType; DATA_DIRECTORY_COUNT] = {
        use DataDirectoryType::*;
        [
            ExportTable,
            ImportTable,
            ResourceTable,
            ExceptionTable,
            CertificateTable,
            BaseRelocationTable,
            Debug,
            Architecture,
            GlobalPtr,
            TLSTable,
            LoadConfigTable,
            BoundImport,
            IAT,
            DelayImportDescriptor,
            CLRRuntimeHeader,
            Reserved,
        ]
    };

    /// Returns the slot of the directory in the directory table.
    pub const fn index(&self) -> usize { *self as usize }
}

/// Location of an auxiliary structure, as an RVA and a size.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size:            u32,
}
impl DataDirectory {
    /// Returns whether the directory points at any data.
    pub const fn is_present(&self) -> bool { self.virtual_address > 0 && self.size > 0 }
}

/// The sixteen data directories of the optional header, in table order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DirectoryTable {
    pub(crate) entries: IndexMap<DataDirectoryType, DataDirectory, RandomState>,
}
impl Default for DirectoryTable {
    fn default() -> Self {
        let mut entries = IndexMap::with_capacity_and_hasher(DATA_DIRECTORY_COUNT, RandomState::new());
        for kind in DataDirectoryType::ALL {
            entries.insert(kind, DataDirectory::default());
        }
        Self { entries }
    }
}
impl DirectoryTable {
    /// Returns the directory entry of the given kind, `(0, 0)` if the image doesn't declare it.
    pub fn get(&self, kind: DataDirectoryType) -> DataDirectory {
        self.entries.get(&kind).copied().unwrap_or_default()
    }

    /// Iterates the entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (DataDirectoryType, DataDirectory)> + '_ {
        self.entries.iter().map(|(kind, directory)| (*kind, *directory))
    }

    pub(crate) fn set(&mut self, kind: DataDirectoryType, directory: DataDirectory) {
        self.entries.insert(kind, directory);
    }
}
