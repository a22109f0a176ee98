//! # OxidizeML
//!
//! Lazy, composable tabular data access for machine learning.
//!
//! ## Modules
//!
//! - **core**: missing sentinel, column roles, field infos, string maps, statistics, errors
//! - **vmat**: in-memory and file backings, sub-windows, row concatenation, column selection, row sorting, nearest-neighbour expansion
//! - **splitters**: train/test, k-fold, walk-forward, train/valid/test, test-in-train, stacked
//! - **io**: text dumps, CSV, field and string-map sidecars, JSON configs

/// Values, metadata and errors.
pub use oxidize_ml_core as core;

/// Virtual matrices and views.
pub use oxidize_ml_vmat as vmat;

/// Dataset splitters.
pub use oxidize_ml_splitters as splitters;

/// I/O utilities.
pub use oxidize_ml_io as io;

/// The types most programs need.
pub mod prelude {
    pub use oxidize_ml_core::{FieldInfo, FieldType, RoleSizes, VMatError, VMatResult, MISSING};
    pub use oxidize_ml_splitters::{Splitter, SplitterConfig};
    pub use oxidize_ml_vmat::{MemoryVMatrix, VMat, VMatExt, VMatrix};
}
