pub mod structs;

// Re-export the core types to provide a clean public API.
pub use structs::{NewTable1, NewTable2, Table1, Table1WithTable2, Table2};
