pub mod error;
pub mod value;
pub mod field;
pub mod sizes;
pub mod string_map;
pub mod stats;

pub use error::{VMatError, VMatResult};
pub use value::{is_missing, MISSING};
pub use field::{FieldInfo, FieldType};
pub use sizes::RoleSizes;
pub use string_map::StringMap;
pub use stats::{FieldStats, MatrixStats};
