//! Database introspection for pgmask.
//!
//! Builds a column-map skeleton from live Postgres metadata and produces the
//! row-count artifact used by load-time verification.

pub mod error;
pub mod options;
pub mod postgres;
pub mod rowcount;

pub use error::IntrospectError;
pub use options::IntrospectOptions;
pub use postgres::build_map_skeleton;
pub use rowcount::{RowCount, read_row_counts, table_row_counts, verify_row_counts, write_row_counts};
