use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `Table1s` table, the principal side of the one-to-one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Table1 {
    /// Server-generated serial identity.
    #[sqlx(rename = "Id")]
    pub id: i32,
    #[sqlx(rename = "Name")]
    pub name: Option<String>,
    #[sqlx(rename = "Starts")]
    pub starts: DateTime<Utc>,
    #[sqlx(rename = "Ends")]
    pub ends: DateTime<Utc>,
}

/// A row of the `Table2s` table.
///
/// `table1_id` is both the primary key and the foreign key to [`Table1::id`],
/// so every `Table1` has at most one `Table2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Table2 {
    #[sqlx(rename = "Table1Id")]
    pub table1_id: i32,
    #[sqlx(rename = "Starts")]
    pub starts: DateTime<Utc>,
    #[sqlx(rename = "Ends")]
    pub ends: DateTime<Utc>,
}

/// The values needed to insert a `Table1`; the id is assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTable1 {
    pub name: Option<String>,
    pub starts: DateTime<Utc>,
    pub ends: DateTime<Utc>,
}

/// The values needed to insert a `Table2` for an existing `Table1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTable2 {
    pub table1_id: i32,
    pub starts: DateTime<Utc>,
    pub ends: DateTime<Utc>,
}

/// A `Table1` together with its dependent `Table2`, if one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table1WithTable2 {
    pub table1: Table1,
    pub table2: Option<Table2>,
}

impl Table1 {
    /// Builds the dependent row that belongs to this entity.
    pub fn new_table2(&self, starts: DateTime<Utc>, ends: DateTime<Utc>) -> NewTable2 {
        NewTable2 {
            table1_id: self.id,
            starts,
            ends,
        }
    }
}

impl Table2 {
    /// The primary key of the principal row this entity hangs off.
    pub fn principal_key(&self) -> i32 {
        self.table1_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_table2_shares_principal_key() {
        let starts = Utc.with_ymd_and_hms(2019, 5, 2, 16, 33, 33).unwrap();
        let ends = Utc.with_ymd_and_hms(2019, 5, 3, 0, 0, 0).unwrap();
        let table1 = Table1 {
            id: 42,
            name: Some("first".to_string()),
            starts,
            ends,
        };

        let new_table2 = table1.new_table2(starts, ends);

        assert_eq!(new_table2.table1_id, 42);
    }

    #[test]
    fn test_optional_name_serializes_as_null() {
        let starts = Utc.with_ymd_and_hms(2019, 5, 2, 0, 0, 0).unwrap();
        let table1 = Table1 {
            id: 1,
            name: None,
            starts,
            ends: starts,
        };

        let value = serde_json::to_value(&table1).unwrap();

        assert!(value["name"].is_null());
        assert_eq!(value["starts"], "2019-05-02T00:00:00Z");
    }
}
