//! Reading and writing virtual matrices and their metadata.

pub mod text;
pub mod sidecar;
pub mod csv_io;
pub mod config;

pub use config::{read_config, write_config};
pub use csv_io::{read_csv, write_csv};
pub use sidecar::{load_field_infos, load_string_mapping, save_field_infos, save_string_mapping};
pub use text::{load_ascii, save_ascii};
