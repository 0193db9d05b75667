//! VAK journal catalog components.
//!
//! Each module handles one stage. [`crate::catalog`] wires them together:
//!
//! ```text
//! retrieve ──► pdf ──► parser ──┐
//!    │                          ├──► filter ──► CSV
//!    ├──────► whitelist ────────┘
//!    └──────► nomenclature
//! ```

pub mod filter;
pub mod nomenclature;
pub mod parser;
pub mod pdf;
pub mod retrieve;
pub mod whitelist;

pub use filter::{CodeMatch, ExportRow, ALL_CODES, FilterOptions, FilterResult, WhitelistMode};
pub use nomenclature::{Nomenclature, NomenclatureEntry};
pub use parser::{JournalRecord, ParseReport, SourceRef, Specialty};
pub use retrieve::{CatalogRetriever, FetchedResource, RefreshReport};
pub use whitelist::{Whitelist, WhitelistEntry};
