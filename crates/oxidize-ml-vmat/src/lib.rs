//! Virtual matrices: a uniform row/column interface over in-memory tables,
//! binary files and lazily composed views of other matrices.

pub mod meta;
pub mod vmatrix;
pub mod memory;
pub mod file;
pub mod sub;
pub mod select_rows;
pub mod select_columns;
pub mod concat_rows;
pub mod sort;
pub mod sort_rows;
pub mod kernel;
pub mod knn;

pub use concat_rows::{ConcatRowsConfig, ConcatRowsVMatrix};
pub use file::FileVMatrix;
pub use kernel::{DistanceKernel, GaussianKernel, Kernel, KernelSpec};
pub use knn::{KNNConfig, KNNVMatrix, NeighborRef};
pub use memory::MemoryVMatrix;
pub use meta::VMatMeta;
pub use select_columns::{SelectColumnsConfig, SelectColumnsVMatrix};
pub use select_rows::SelectRowsVMatrix;
pub use sort_rows::{SortRowsConfig, SortRowsVMatrix};
pub use sub::{SubVMatrix, SubVMatrixConfig};
pub use vmatrix::{Example, VMat, VMatExt, VMatrix};
