//! SQL text differences between the supported backends.
//!
//! Only statement text lives here. Callers validate identifiers before
//! handing them in; quoting is still applied to every identifier.

use crate::model::value::PropertyType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

/// One column of a generated `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: &'static str,
    pub nullable: bool,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Self::Sqlite, Self::Postgres, Self::Mysql];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == value)
    }

    /// Bind marker for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite => format!("?{index}"),
            Self::Postgres => format!("${index}"),
            Self::Mysql => "?".to_string(),
        }
    }

    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::Mysql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    pub fn column_type(self, property_type: PropertyType) -> &'static str {
        use PropertyType as T;
        match (self, property_type) {
            (Self::Sqlite, T::Integer | T::Boolean) => "INTEGER",
            (Self::Sqlite, T::Float) => "REAL",
            (Self::Sqlite, T::Blob) => "BLOB",
            (Self::Sqlite, _) => "TEXT",

            (Self::Postgres, T::Integer) => "BIGINT",
            (Self::Postgres, T::Boolean) => "BOOLEAN",
            (Self::Postgres, T::Float) => "DOUBLE PRECISION",
            (Self::Postgres, T::BigInteger | T::BigDecimal) => "NUMERIC",
            (Self::Postgres, T::Timestamp) => "TIMESTAMPTZ",
            (Self::Postgres, T::Uuid) => "UUID",
            (Self::Postgres, T::Blob) => "BYTEA",
            (Self::Postgres, T::String | T::Uri | T::Clob) => "TEXT",

            (Self::Mysql, T::Integer) => "BIGINT",
            (Self::Mysql, T::Boolean) => "BOOLEAN",
            (Self::Mysql, T::Float) => "DOUBLE",
            (Self::Mysql, T::BigInteger) => "DECIMAL(65,0)",
            (Self::Mysql, T::BigDecimal) => "DECIMAL(65,30)",
            (Self::Mysql, T::Timestamp) => "DATETIME(6)",
            (Self::Mysql, T::Uuid) => "CHAR(36)",
            (Self::Mysql, T::String | T::Uri) => "VARCHAR(2048)",
            (Self::Mysql, T::Clob) => "LONGTEXT",
            (Self::Mysql, T::Blob) => "LONGBLOB",
        }
    }

    /// Column type for entity and catalog identifiers.
    pub fn id_column_type(self) -> &'static str {
        match self {
            Self::Sqlite => "TEXT",
            Self::Postgres => "UUID",
            Self::Mysql => "CHAR(36)",
        }
    }

    fn markers(self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|index| self.placeholder(index))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn column_list(self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|column| self.quote(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn insert(self, table: &str, columns: &[&str]) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote(table),
            self.column_list(columns),
            self.markers(1, columns.len())
        )
    }

    /// Insert that updates the non-key columns when `key_columns` collide.
    pub fn upsert(self, table: &str, columns: &[&str], key_columns: &[&str]) -> String {
        let updates: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|column| !key_columns.contains(column))
            .collect();
        match self {
            Self::Sqlite | Self::Postgres => {
                let action = if updates.is_empty() {
                    "DO NOTHING".to_string()
                } else {
                    let sets = updates
                        .iter()
                        .map(|column| {
                            let quoted = self.quote(column);
                            format!("{quoted} = excluded.{quoted}")
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("DO UPDATE SET {sets}")
                };
                format!(
                    "{} ON CONFLICT ({}) {action}",
                    self.insert(table, columns),
                    self.column_list(key_columns)
                )
            }
            Self::Mysql if updates.is_empty() => self.insert(table, columns).replacen(
                "INSERT INTO",
                "INSERT IGNORE INTO",
                1,
            ),
            Self::Mysql => {
                let sets = updates
                    .iter()
                    .map(|column| {
                        let quoted = self.quote(column);
                        format!("{quoted} = VALUES({quoted})")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{} ON DUPLICATE KEY UPDATE {sets}",
                    self.insert(table, columns)
                )
            }
        }
    }

    /// Removes every row of `table`. SQLite has no `TRUNCATE`.
    pub fn truncate(self, table: &str) -> String {
        match self {
            Self::Sqlite => format!("DELETE FROM {}", self.quote(table)),
            Self::Postgres | Self::Mysql => format!("TRUNCATE TABLE {}", self.quote(table)),
        }
    }

    /// `DELETE` filtered by equality on `filter_columns`.
    pub fn delete_where(self, table: &str, filter_columns: &[&str]) -> String {
        format!(
            "DELETE FROM {}{}",
            self.quote(table),
            self.where_clause(filter_columns, 1)
        )
    }

    fn where_clause(self, filter_columns: &[&str], start: usize) -> String {
        if filter_columns.is_empty() {
            return String::new();
        }
        let conditions = filter_columns
            .iter()
            .enumerate()
            .map(|(offset, column)| {
                format!("{} = {}", self.quote(column), self.placeholder(start + offset))
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {conditions}")
    }

    /// Ordering that reflects insertion order when the table has no explicit
    /// ordering column.
    pub fn natural_order(self) -> Option<&'static str> {
        match self {
            Self::Sqlite => Some("rowid"),
            Self::Postgres => Some("ctid"),
            Self::Mysql => None,
        }
    }

    /// Paged `SELECT`. The two trailing parameters are limit and offset.
    pub fn select_page(
        self,
        table: &str,
        columns: &[&str],
        filter_columns: &[&str],
        order_columns: &[&str],
    ) -> String {
        let order = if order_columns.is_empty() {
            self.natural_order()
                .map(|order| format!(" ORDER BY {order}"))
                .unwrap_or_default()
        } else {
            format!(" ORDER BY {}", self.column_list(order_columns))
        };
        let next = filter_columns.len() + 1;
        format!(
            "SELECT {} FROM {}{}{order} LIMIT {} OFFSET {}",
            self.column_list(columns),
            self.quote(table),
            self.where_clause(filter_columns, 1),
            self.placeholder(next),
            self.placeholder(next + 1)
        )
    }

    pub fn create_table(self, table: &str, columns: &[ColumnDef], primary_key: &[&str]) -> String {
        let mut parts: Vec<String> = columns
            .iter()
            .map(|column| {
                let null = if column.nullable { "" } else { " NOT NULL" };
                format!("{} {}{null}", self.quote(&column.name), column.sql_type)
            })
            .collect();
        if !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(primary_key)));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote(table),
            parts.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDef, Dialect};
    use crate::model::value::PropertyType;

    #[test]
    fn placeholders_differ_per_backend() {
        assert_eq!(Dialect::Sqlite.placeholder(2), "?2");
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::Mysql.placeholder(2), "?");
    }

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(Dialect::Sqlite.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Mysql.quote("a`b"), "`a``b`");
    }

    #[test]
    fn upsert_text() {
        assert_eq!(
            Dialect::Sqlite.upsert("t", &["id", "v"], &["id"]),
            "INSERT INTO \"t\" (\"id\", \"v\") VALUES (?1, ?2) ON CONFLICT (\"id\") DO UPDATE SET \"v\" = excluded.\"v\""
        );
        assert_eq!(
            Dialect::Postgres.upsert("t", &["id"], &["id"]),
            "INSERT INTO \"t\" (\"id\") VALUES ($1) ON CONFLICT (\"id\") DO NOTHING"
        );
        assert_eq!(
            Dialect::Mysql.upsert("t", &["id", "v"], &["id"]),
            "INSERT INTO `t` (`id`, `v`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `v` = VALUES(`v`)"
        );
        assert_eq!(
            Dialect::Mysql.upsert("t", &["id"], &["id"]),
            "INSERT IGNORE INTO `t` (`id`) VALUES (?)"
        );
    }

    #[test]
    fn truncate_text() {
        assert_eq!(Dialect::Sqlite.truncate("t"), "DELETE FROM \"t\"");
        assert_eq!(Dialect::Postgres.truncate("t"), "TRUNCATE TABLE \"t\"");
        assert_eq!(Dialect::Mysql.truncate("t"), "TRUNCATE TABLE `t`");
    }

    #[test]
    fn paged_select_appends_limit_and_offset() {
        assert_eq!(
            Dialect::Postgres.select_page("t", &["a"], &["c"], &[]),
            "SELECT \"a\" FROM \"t\" WHERE \"c\" = $1 ORDER BY ctid LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            Dialect::Mysql.select_page("t", &["a"], &[], &["a"]),
            "SELECT `a` FROM `t` ORDER BY `a` LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn create_table_text() {
        let columns = vec![
            ColumnDef {
                name: "entity_id".to_string(),
                sql_type: Dialect::Mysql.id_column_type(),
                nullable: false,
            },
            ColumnDef {
                name: "score".to_string(),
                sql_type: Dialect::Mysql.column_type(PropertyType::BigDecimal),
                nullable: true,
            },
        ];
        assert_eq!(
            Dialect::Mysql.create_table("scores", &columns, &["entity_id"]),
            "CREATE TABLE IF NOT EXISTS `scores` (`entity_id` CHAR(36) NOT NULL, `score` DECIMAL(65,30), PRIMARY KEY (`entity_id`))"
        );
    }

    #[test]
    fn every_type_has_a_column_type() {
        for dialect in Dialect::ALL {
            for ty in PropertyType::ALL {
                assert!(!dialect.column_type(ty).is_empty());
            }
        }
    }
}
