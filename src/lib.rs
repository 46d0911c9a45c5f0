//! **P**ortable **E**xecutable header **inspect**or.
//!
//! Supports:
//! * Locating and validating the PE signature
//! * Decoding the COFF file header and the PE32 and PE32+ optional headers
//! * Decoding the section table
//! * Resolving the export directory into its exported names and ordinals
//! * Little- and big-endian images
//!
//! See [`PeFile`] for the main entry point for decoding a portable executable image.
//!
//! # Examples
//!
//! ### Listing exports
//! ```
//! use peinspect::PeFile;
//!
//! // decode the headers, the file is closed before returning
//! let image = PeFile::parse_file(BINARY_PATH)?;
//!
//! // iterate the exported names in order
//! for name in image.export_names() {
//!     println!("{name}");
//! }
//! ```
//!
//! ### Mapping RVAs through sections
//! ```
//! use peinspect::{ParseOptions, PeFile, RvaResolution};
//!
//! let data = std::fs::read(BINARY_PATH)?;
//!
//! // resolve the export tables through the section table instead of using RVAs as file positions
//! let options = ParseOptions::new().with_rva_resolution(RvaResolution::SectionMapped);
//! let image = PeFile::parse_with_options(&data, options)?;
//!
//! let text = image.section(".text");
//! let exports = image.exports();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(doc)))]

pub(crate) mod cursor;
pub(crate) mod errors;
pub(crate) mod export;
pub(crate) mod header;
pub(crate) mod image;
pub(crate) mod optional;
pub(crate) mod section;
pub(crate) mod view;

pub mod constants;
pub mod layout;
pub mod types;

pub use crate::{cursor::*, errors::*, export::*, header::*, image::*, optional::*, section::*, view::*};
