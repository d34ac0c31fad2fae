//! Catalog metadata seen by the validator and the plan translator.
//!
//! [`CatalogReader`] is the read-only seam; [`InMemoryCatalog`] is the
//! JSON-loadable implementation used by the CLI and tests.
//!
//! | Rust Type            | Describes                                   |
//! |----------------------|---------------------------------------------|
//! | [`TableDescriptor`]  | table id, qualified name, ordered columns   |
//! | [`ColumnDescriptor`] | column id, name and field type              |

mod memory;

pub use memory::{CatalogFile, ColumnSpec, InMemoryCatalog, TableSpec};

use std::sync::Arc;

use serde::Serialize;

use crate::ident::{QualifiedName, QueryDefaults};
use crate::types::RelDataType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub column_id: i32,
    pub name: String,
    #[serde(flatten)]
    pub ty: RelDataType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub table_id: i32,
    pub database: String,
    pub schema: String,
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.database.clone(), self.schema.clone(), self.name.clone())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_id(&self, column_id: i32) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Resolves tables against a metadata store.
pub trait CatalogReader: Send + Sync {
    /// Database and schema applied to partially qualified names.
    fn defaults(&self) -> &QueryDefaults;

    fn get_table(&self, name: &QualifiedName) -> Option<Arc<TableDescriptor>>;

    fn get_table_by_id(&self, table_id: i32) -> Option<Arc<TableDescriptor>>;

    /// All known table names, sorted.
    fn table_names(&self) -> Vec<QualifiedName>;
}
