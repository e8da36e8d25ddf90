use crate::error::DbError;
use crate::model::{EntityType, Model};
use sqlx::{FromRow, PgPool};
use std::fmt;

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LiveColumn {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: String,
}

/// One difference between the declared model and the connected database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDrift {
    MissingTable(String),
    MissingColumn { table: String, column: String },
    ColumnType { table: String, column: String, expected: String, found: String },
    Nullability { table: String, column: String, expected_nullable: bool },
    MissingConstraint { table: String, constraint: String },
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDrift::MissingTable(table) => write!(f, "table \"{table}\" does not exist"),
            SchemaDrift::MissingColumn { table, column } => {
                write!(f, "column \"{table}\".\"{column}\" does not exist")
            }
            SchemaDrift::ColumnType { table, column, expected, found } => {
                write!(f, "column \"{table}\".\"{column}\" is {found}, expected {expected}")
            }
            SchemaDrift::Nullability { table, column, expected_nullable } => {
                let expected = if *expected_nullable { "nullable" } else { "NOT NULL" };
                write!(f, "column \"{table}\".\"{column}\" should be {expected}")
            }
            SchemaDrift::MissingConstraint { table, constraint } => {
                write!(f, "constraint \"{constraint}\" on \"{table}\" does not exist")
            }
        }
    }
}

/// Compares one entity with what the database reports for its table.
///
/// An empty `columns` slice means the table does not exist.
pub fn compare_table(
    model: &Model,
    entity: &EntityType,
    columns: &[LiveColumn],
    constraints: &[String],
) -> Vec<SchemaDrift> {
    let table = &entity.table;
    if columns.is_empty() {
        return vec![SchemaDrift::MissingTable(table.clone())];
    }

    let mut drift = Vec::new();
    for column in &entity.columns {
        let Some(live) = columns.iter().find(|c| c.column_name == column.name) else {
            drift.push(SchemaDrift::MissingColumn {
                table: table.clone(),
                column: column.name.clone(),
            });
            continue;
        };

        let expected = column.column_type.information_schema_name();
        if live.data_type != expected {
            drift.push(SchemaDrift::ColumnType {
                table: table.clone(),
                column: column.name.clone(),
                expected: expected.to_string(),
                found: live.data_type.clone(),
            });
        }
        if (live.is_nullable == "YES") != column.nullable {
            drift.push(SchemaDrift::Nullability {
                table: table.clone(),
                column: column.name.clone(),
                expected_nullable: column.nullable,
            });
        }
    }

    let expected_constraints =
        std::iter::once(entity.primary_key_name()).chain(model.foreign_keys_of(table).map(|fk| fk.name.clone()));
    for constraint in expected_constraints {
        if !constraints.contains(&constraint) {
            drift.push(SchemaDrift::MissingConstraint {
                table: table.clone(),
                constraint,
            });
        }
    }
    drift
}

/// Checks every table of `model` against the connected database.
pub async fn verify_schema(pool: &PgPool, model: &Model) -> Result<Vec<SchemaDrift>, DbError> {
    let mut drift = Vec::new();
    for entity in &model.entities {
        let columns: Vec<LiveColumn> = sqlx::query_as(
            r#"
            SELECT column_name::text AS column_name, data_type::text AS data_type, is_nullable::text AS is_nullable
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(&entity.table)
        .fetch_all(pool)
        .await?;

        let constraints: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT constraint_name::text
            FROM information_schema.table_constraints
            WHERE table_schema = current_schema() AND table_name = $1
            "#,
        )
        .bind(&entity.table)
        .fetch_all(pool)
        .await?;

        drift.extend(compare_table(model, entity, &columns, &constraints));
    }

    if drift.is_empty() {
        tracing::info!(tables = model.entities.len(), "Live schema matches the model.");
    } else {
        for d in &drift {
            tracing::warn!("Schema drift: {}", d);
        }
    }
    Ok(drift)
}
