pub mod error;
pub mod extract;
pub mod load;
pub mod structs;
pub mod transform;

// Re-export public API
pub use error::{LoadError, PersistError, PipelineError, Result, TransformError};
pub use extract::{load_data, merge, read_csv, read_table};
pub use load::{save_data, write_csv, write_json, write_parquet};
pub use structs::{
    Column, ColumnType, DuplicateIdPolicy, IfExists, LoadConfig, PersistConfig, SimpleLogger,
    Table, TransformConfig, Value, ValuePolicy,
};
pub use transform::{CategorySchema, clean_data, drop_duplicates, expand_categories};
