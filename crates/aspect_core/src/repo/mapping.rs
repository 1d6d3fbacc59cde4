//! Custom table mappings for aspect definitions.
//!
//! # Responsibility
//! - Describe how one definition's properties land in dedicated columns.
//! - Derive key, write, clear and read statements from the address pattern.
//!
//! # Invariants
//! - Every property is mapped to exactly one column; multivalued
//!   properties cannot be mapped.
//! - Table and column names are plain identifiers.
//! - The registry holds at most one mapping per definition name.

use crate::db::{ColumnDef, Dialect};
use crate::model::aspect_def::AspectDef;
use crate::model::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

/// Which addressing columns a mapped table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPattern {
    /// No catalog, no entity column: one row set per table.
    Unscoped,
    /// Catalog column only.
    CatalogScoped,
    /// Entity column only; the entity is the primary key.
    EntityKeyed,
    /// Both; primary key `(catalog, entity)`.
    CatalogEntityKeyed,
}

impl AddressPattern {
    pub fn from_columns(has_catalog: bool, has_entity: bool) -> Self {
        match (has_catalog, has_entity) {
            (false, false) => Self::Unscoped,
            (true, false) => Self::CatalogScoped,
            (false, true) => Self::EntityKeyed,
            (true, true) => Self::CatalogEntityKeyed,
        }
    }

    pub fn has_catalog_column(self) -> bool {
        matches!(self, Self::CatalogScoped | Self::CatalogEntityKeyed)
    }

    pub fn has_entity_column(self) -> bool {
        matches!(self, Self::EntityKeyed | Self::CatalogEntityKeyed)
    }

    /// Whether writes can upsert on a primary key.
    pub fn is_keyed(self) -> bool {
        self.has_entity_column()
    }

    /// Whether rows of one catalog can be removed without touching others.
    pub fn clears_by_catalog(self) -> bool {
        self.has_catalog_column()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMapping {
    aspect_def: Arc<AspectDef>,
    table: String,
    catalog_column: Option<String>,
    entity_column: Option<String>,
    /// `(property, column)` in definition order.
    columns: Vec<(String, String)>,
}

impl TableMapping {
    pub fn builder(aspect_def: Arc<AspectDef>, table: impl Into<String>) -> TableMappingBuilder {
        TableMappingBuilder {
            aspect_def,
            table: table.into(),
            catalog_column: None,
            entity_column: None,
            columns: HashMap::new(),
        }
    }

    pub fn aspect_def(&self) -> &Arc<AspectDef> {
        &self.aspect_def
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pattern(&self) -> AddressPattern {
        AddressPattern::from_columns(self.catalog_column.is_some(), self.entity_column.is_some())
    }

    pub fn catalog_column(&self) -> Option<&str> {
        self.catalog_column.as_deref()
    }

    pub fn entity_column(&self) -> Option<&str> {
        self.entity_column.as_deref()
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    pub fn column_for(&self, property: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, column)| column.as_str())
    }

    /// Fails when `def` no longer has the structure this mapping was built
    /// for.
    pub fn check_compatible(&self, def: &AspectDef) -> Result<(), ValidationError> {
        if *self.aspect_def != *def {
            return Err(ValidationError::InvalidMapping {
                table: self.table.clone(),
                message: format!(
                    "aspect def `{}` changed since the mapping was built",
                    def.name()
                ),
            });
        }
        Ok(())
    }

    fn key_columns(&self) -> Vec<&str> {
        self.catalog_column
            .iter()
            .chain(self.entity_column.iter())
            .map(String::as_str)
            .collect()
    }

    /// Column order shared by writes: catalog, entity, then properties.
    pub fn write_columns(&self) -> Vec<&str> {
        let mut columns = self.key_columns();
        columns.extend(self.columns.iter().map(|(_, column)| column.as_str()));
        columns
    }

    /// Column order of reads: entity, then properties.
    pub fn read_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.entity_column.iter().map(String::as_str).collect();
        columns.extend(self.columns.iter().map(|(_, column)| column.as_str()));
        columns
    }

    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut columns: Vec<ColumnDef> = self
            .key_columns()
            .into_iter()
            .map(|name| ColumnDef {
                name: name.to_string(),
                sql_type: dialect.id_column_type(),
                nullable: false,
            })
            .collect();
        for (property, column) in &self.columns {
            if let Some(def) = self.aspect_def.property(property) {
                columns.push(ColumnDef {
                    name: column.clone(),
                    sql_type: dialect.column_type(def.property_type()),
                    nullable: def.is_nullable(),
                });
            }
        }
        let primary_key = if self.pattern().is_keyed() {
            self.key_columns()
        } else {
            Vec::new()
        };
        dialect.create_table(&self.table, &columns, &primary_key)
    }

    /// Keyed patterns upsert; unkeyed ones plain insert after a clear.
    pub fn write_sql(&self, dialect: Dialect) -> String {
        let columns = self.write_columns();
        if self.pattern().is_keyed() {
            dialect.upsert(&self.table, &columns, &self.key_columns())
        } else {
            dialect.insert(&self.table, &columns)
        }
    }

    /// Removes one catalog's rows, or the whole table when the table has no
    /// catalog column.
    pub fn clear_sql(&self, dialect: Dialect) -> String {
        match &self.catalog_column {
            Some(column) => dialect.delete_where(&self.table, &[column.as_str()]),
            None => dialect.truncate(&self.table),
        }
    }

    /// Deletes one entity's row. Parameters: catalog (if any), entity.
    pub fn delete_entity_sql(&self, dialect: Dialect) -> Option<String> {
        self.entity_column
            .as_ref()
            .map(|_| dialect.delete_where(&self.table, &self.key_columns()))
    }

    /// Paged read. Parameters: catalog (if any), limit, offset.
    pub fn select_page_sql(&self, dialect: Dialect) -> String {
        let filter: Vec<&str> = self.catalog_column.iter().map(String::as_str).collect();
        let order: Vec<&str> = self.entity_column.iter().map(String::as_str).collect();
        dialect.select_page(&self.table, &self.read_columns(), &filter, &order)
    }
}

pub struct TableMappingBuilder {
    aspect_def: Arc<AspectDef>,
    table: String,
    catalog_column: Option<String>,
    entity_column: Option<String>,
    columns: HashMap<String, String>,
}

impl TableMappingBuilder {
    pub fn catalog_column(mut self, column: impl Into<String>) -> Self {
        self.catalog_column = Some(column.into());
        self
    }

    pub fn entity_column(mut self, column: impl Into<String>) -> Self {
        self.entity_column = Some(column.into());
        self
    }

    /// Maps `property` to `column`. Unmapped properties use their own name.
    pub fn column(mut self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(property.into(), column.into());
        self
    }

    pub fn build(mut self) -> Result<TableMapping, ValidationError> {
        let table = self.table.clone();
        let invalid = |message: String| ValidationError::InvalidMapping {
            table: table.clone(),
            message,
        };
        if !IDENT_RE.is_match(&self.table) {
            return Err(invalid("table name is not a plain identifier".to_string()));
        }
        if let Some(unknown) = self
            .columns
            .keys()
            .find(|property| self.aspect_def.property(property).is_none())
        {
            return Err(invalid(format!("unknown property `{unknown}`")));
        }

        let mut columns = Vec::with_capacity(self.aspect_def.properties().len());
        for property in self.aspect_def.properties() {
            if property.is_multivalued() {
                return Err(invalid(format!(
                    "multivalued property `{}` cannot be mapped to a column",
                    property.name()
                )));
            }
            let column = self
                .columns
                .remove(property.name())
                .unwrap_or_else(|| property.name().to_string());
            columns.push((property.name().to_string(), column));
        }

        let all_columns = self
            .catalog_column
            .iter()
            .chain(self.entity_column.iter())
            .chain(columns.iter().map(|(_, column)| column));
        let mut seen: Vec<&str> = Vec::new();
        for column in all_columns {
            if !IDENT_RE.is_match(column) {
                return Err(invalid(format!("column `{column}` is not a plain identifier")));
            }
            if seen.iter().any(|other| other.eq_ignore_ascii_case(column)) {
                return Err(invalid(format!("column `{column}` is used twice")));
            }
            seen.push(column);
        }

        Ok(TableMapping {
            aspect_def: self.aspect_def,
            table: self.table,
            catalog_column: self.catalog_column,
            entity_column: self.entity_column,
            columns,
        })
    }
}

/// Registered mappings, keyed by definition name.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    by_def: RwLock<HashMap<String, Arc<TableMapping>>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `mapping`, replacing any previous mapping of the definition.
    pub fn register(&self, mapping: TableMapping) -> Arc<TableMapping> {
        let mapping = Arc::new(mapping);
        self.by_def
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mapping.aspect_def().name().to_string(), Arc::clone(&mapping));
        mapping
    }

    pub fn get(&self, aspect_def: &str) -> Option<Arc<TableMapping>> {
        self.by_def
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(aspect_def)
            .cloned()
    }

    pub fn unregister(&self, aspect_def: &str) -> Option<Arc<TableMapping>> {
        self.by_def
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(aspect_def)
    }

    pub fn all(&self) -> Vec<Arc<TableMapping>> {
        self.by_def
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
