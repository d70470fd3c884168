//! Models for the ETL pipeline

pub mod column;
pub mod enums;
pub mod table;
pub mod value;

pub use column::{ColumnSpec, ColumnType};
pub use enums::TableRole;
pub use table::{RawRecord, RawTable, TableSchema, TypedTable};
pub use value::CellValue;
