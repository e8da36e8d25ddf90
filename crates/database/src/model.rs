//! The declared shape of the schema.
//!
//! Entities and their relationships are declared in code through
//! [`ModelBuilder`]. The resolved [`Model`] renders `CREATE TABLE` statements
//! and is what the live database is verified against.

use thiserror::Error;

pub const TABLE1S: &str = "Table1s";
pub const TABLE2S: &str = "Table2s";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Entity '{0}' is not part of the model.")]
    UnknownEntity(String),

    #[error("Entity '{0}' has no primary key.")]
    MissingPrimaryKey(String),

    #[error("Column '{column}' is not declared on entity '{table}'.")]
    UnknownColumn { table: String, column: String },

    #[error("Foreign key '{0}' must consist of the dependent's primary key in a one-to-one relationship.")]
    NotSharedKey(String),

    #[error("Foreign key '{0}' does not match the principal key's arity or column types.")]
    KeyMismatch(String),
}

/// Store types used by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    TimestampTz,
}

impl ColumnType {
    /// The name `information_schema.columns.data_type` reports for this type.
    pub fn information_schema_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Text => "text",
            ColumnType::TimestampTz => "timestamp with time zone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Value generated by the server from a sequence.
    pub identity: bool,
}

impl Column {
    pub fn required(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            identity: false,
        }
    }

    pub fn optional(name: &str, column_type: ColumnType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, column_type)
        }
    }

    /// An integer key the server fills in from a sequence.
    pub fn identity(name: &str) -> Self {
        Self {
            identity: true,
            ..Self::required(name, ColumnType::Integer)
        }
    }

    fn ddl_type(&self) -> &'static str {
        match (self.column_type, self.identity) {
            (ColumnType::Integer, true) => "serial",
            (column_type, _) => column_type.information_schema_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub table: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
}

impl EntityType {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_name(&self) -> String {
        format!("PK_{}", self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
}

impl OnDelete {
    fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub dependent: String,
    pub columns: Vec<String>,
    pub principal: String,
    pub principal_columns: Vec<String>,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// The dependent's primary key is its foreign key.
    OneToOne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub foreign_key: ForeignKey,
}

/// A resolved, validated schema model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub entities: Vec<EntityType>,
    pub relationships: Vec<Relationship>,
}

impl Model {
    pub fn entity(&self, table: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.table == table)
    }

    /// Foreign keys declared on `table` as the dependent side.
    pub fn foreign_keys_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKey> + 'a {
        self.relationships
            .iter()
            .map(|r| &r.foreign_key)
            .filter(move |fk| fk.dependent == table)
    }

    /// Checks that every relationship is a proper shared-key one-to-one.
    pub fn validate(&self) -> Result<(), ModelError> {
        for entity in &self.entities {
            if entity.primary_key.is_empty() {
                return Err(ModelError::MissingPrimaryKey(entity.table.clone()));
            }
            for key in &entity.primary_key {
                if entity.find_column(key).is_none() {
                    return Err(ModelError::UnknownColumn {
                        table: entity.table.clone(),
                        column: key.clone(),
                    });
                }
            }
        }

        for relationship in &self.relationships {
            let fk = &relationship.foreign_key;
            let dependent = self
                .entity(&fk.dependent)
                .ok_or_else(|| ModelError::UnknownEntity(fk.dependent.clone()))?;
            let principal = self
                .entity(&fk.principal)
                .ok_or_else(|| ModelError::UnknownEntity(fk.principal.clone()))?;

            match relationship.kind {
                RelationshipKind::OneToOne => {
                    if fk.columns != dependent.primary_key {
                        return Err(ModelError::NotSharedKey(fk.name.clone()));
                    }
                }
            }

            if fk.principal_columns != principal.primary_key || fk.columns.len() != fk.principal_columns.len() {
                return Err(ModelError::KeyMismatch(fk.name.clone()));
            }
            for (column, principal_column) in fk.columns.iter().zip(&fk.principal_columns) {
                let dependent_type = dependent.find_column(column).map(|c| c.column_type);
                let principal_type = principal.find_column(principal_column).map(|c| c.column_type);
                if dependent_type.is_none() || dependent_type != principal_type {
                    return Err(ModelError::KeyMismatch(fk.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Renders the `CREATE TABLE` statement for `table`, including its
    /// primary key and any foreign keys it declares.
    pub fn create_table_sql(&self, table: &str) -> Result<String, ModelError> {
        let entity = self
            .entity(table)
            .ok_or_else(|| ModelError::UnknownEntity(table.to_string()))?;

        let mut lines: Vec<String> = entity
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "NULL" } else { "NOT NULL" };
                format!("    \"{}\" {} {}", c.name, c.ddl_type(), null)
            })
            .collect();

        lines.push(format!(
            "    CONSTRAINT \"{}\" PRIMARY KEY ({})",
            entity.primary_key_name(),
            quoted_list(&entity.primary_key)
        ));

        for fk in self.foreign_keys_of(table) {
            lines.push(format!(
                "    CONSTRAINT \"{}\" FOREIGN KEY ({}) REFERENCES \"{}\" ({}) ON DELETE {}",
                fk.name,
                quoted_list(&fk.columns),
                fk.principal,
                quoted_list(&fk.principal_columns),
                fk.on_delete.sql()
            ));
        }

        Ok(format!("CREATE TABLE \"{}\" (\n{}\n);", entity.table, lines.join(",\n")))
    }

    pub fn drop_table_sql(&self, table: &str) -> Result<String, ModelError> {
        let entity = self
            .entity(table)
            .ok_or_else(|| ModelError::UnknownEntity(table.to_string()))?;
        Ok(format!("DROP TABLE \"{}\";", entity.table))
    }
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects entity declarations and relationships, then resolves them into a [`Model`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    entities: Vec<EntityType>,
    one_to_one: Vec<(String, String)>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    /// Declares that `dependent` has one `principal` which has one `dependent`.
    ///
    /// The dependent's primary key doubles as the foreign key, which is what
    /// limits each principal row to a single dependent row.
    pub fn has_one_with_one(mut self, dependent: &str, principal: &str) -> Self {
        self.one_to_one.push((dependent.to_string(), principal.to_string()));
        self
    }

    pub fn build(self) -> Result<Model, ModelError> {
        let mut relationships = Vec::with_capacity(self.one_to_one.len());
        for (dependent, principal) in &self.one_to_one {
            let find = |table: &str| {
                self.entities
                    .iter()
                    .find(|e| e.table == table)
                    .ok_or_else(|| ModelError::UnknownEntity(table.to_string()))
            };
            let dependent_entity = find(dependent.as_str())?;
            let principal_entity = find(principal.as_str())?;

            let columns = dependent_entity.primary_key.clone();
            let name = format!("FK_{}_{}_{}", dependent, principal, columns.join("_"));
            relationships.push(Relationship {
                kind: RelationshipKind::OneToOne,
                foreign_key: ForeignKey {
                    name,
                    dependent: dependent.clone(),
                    columns,
                    principal: principal.clone(),
                    principal_columns: principal_entity.primary_key.clone(),
                    // A required dependent cannot outlive its principal.
                    on_delete: OnDelete::Cascade,
                },
            });
        }

        let model = Model {
            entities: self.entities,
            relationships,
        };
        model.validate()?;
        Ok(model)
    }
}

/// The application's schema: `Table1s` and its one-to-one dependent `Table2s`.
pub fn build_model() -> Result<Model, ModelError> {
    ModelBuilder::new()
        .entity(
            EntityType::new(TABLE1S)
                .column(Column::identity("Id"))
                .column(Column::optional("Name", ColumnType::Text))
                .column(Column::required("Starts", ColumnType::TimestampTz))
                .column(Column::required("Ends", ColumnType::TimestampTz))
                .primary_key(&["Id"]),
        )
        .entity(
            EntityType::new(TABLE2S)
                .column(Column::required("Table1Id", ColumnType::Integer))
                .column(Column::required("Starts", ColumnType::TimestampTz))
                .column(Column::required("Ends", ColumnType::TimestampTz))
                .primary_key(&["Table1Id"]),
        )
        .has_one_with_one(TABLE2S, TABLE1S)
        .build()
}
