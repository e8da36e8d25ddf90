use crate::context::DbContext;
use crate::DbError;
use chrono::{DateTime, Utc};
use core_types::{NewTable1, NewTable2, Table1, Table1WithTable2, Table2};
use sqlx::postgres::PgRow;
use sqlx::Row;

/// The `DbRepository` provides a high-level interface to the two tables.
/// Every call runs under the context's retry policy.
#[derive(Debug, Clone)]
pub struct DbRepository {
    ctx: DbContext,
}

impl DbRepository {
    /// Creates a new `DbRepository` over an open context.
    pub fn new(ctx: DbContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DbContext {
        &self.ctx
    }

    /// Inserts a `Table1`; the server assigns its id.
    pub async fn insert_table1(&self, new: &NewTable1) -> Result<Table1, DbError> {
        self.ctx.log_operation("insert_table1", new);
        self.ctx
            .execute_with_retry(|| {
                sqlx::query_as::<_, Table1>(
                    r#"
                    INSERT INTO "Table1s" ("Name", "Starts", "Ends")
                    VALUES ($1, $2, $3)
                    RETURNING "Id", "Name", "Starts", "Ends"
                    "#,
                )
                .bind(new.name.as_deref())
                .bind(new.starts)
                .bind(new.ends)
                .fetch_one(self.ctx.pool())
            })
            .await
    }

    pub async fn get_table1(&self, id: i32) -> Result<Table1, DbError> {
        self.ctx.log_operation("get_table1", &id);
        self.ctx
            .execute_with_retry(|| {
                sqlx::query_as::<_, Table1>(r#"SELECT "Id", "Name", "Starts", "Ends" FROM "Table1s" WHERE "Id" = $1"#)
                    .bind(id)
                    .fetch_one(self.ctx.pool())
            })
            .await
    }

    pub async fn list_table1s(&self) -> Result<Vec<Table1>, DbError> {
        self.ctx.log_operation("list_table1s", &());
        self.ctx
            .execute_with_retry(|| {
                sqlx::query_as::<_, Table1>(r#"SELECT "Id", "Name", "Starts", "Ends" FROM "Table1s" ORDER BY "Id""#)
                    .fetch_all(self.ctx.pool())
            })
            .await
    }

    /// Overwrites the mutable columns of an existing `Table1`.
    pub async fn update_table1(&self, table1: &Table1) -> Result<(), DbError> {
        self.ctx.log_operation("update_table1", table1);
        let result = self
            .ctx
            .execute_with_retry(|| {
                sqlx::query(r#"UPDATE "Table1s" SET "Name" = $1, "Starts" = $2, "Ends" = $3 WHERE "Id" = $4"#)
                    .bind(table1.name.as_deref())
                    .bind(table1.starts)
                    .bind(table1.ends)
                    .bind(table1.id)
                    .execute(self.ctx.pool())
            })
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Deletes a `Table1`. Its `Table2`, if any, goes with it.
    pub async fn delete_table1(&self, id: i32) -> Result<(), DbError> {
        self.ctx.log_operation("delete_table1", &id);
        let result = self
            .ctx
            .execute_with_retry(|| {
                sqlx::query(r#"DELETE FROM "Table1s" WHERE "Id" = $1"#)
                    .bind(id)
                    .execute(self.ctx.pool())
            })
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Inserts the `Table2` of an existing `Table1`.
    ///
    /// Fails with [`DbError::ForeignKeyViolation`] when no such `Table1`
    /// exists and with [`DbError::UniqueViolation`] when it already has one.
    pub async fn insert_table2(&self, new: &NewTable2) -> Result<Table2, DbError> {
        self.ctx.log_operation("insert_table2", new);
        self.ctx
            .execute_with_retry(|| {
                sqlx::query_as::<_, Table2>(
                    r#"
                    INSERT INTO "Table2s" ("Table1Id", "Starts", "Ends")
                    VALUES ($1, $2, $3)
                    RETURNING "Table1Id", "Starts", "Ends"
                    "#,
                )
                .bind(new.table1_id)
                .bind(new.starts)
                .bind(new.ends)
                .fetch_one(self.ctx.pool())
            })
            .await
    }

    /// Fetches a `Table2` by its key, which is also its `Table1`'s id.
    pub async fn get_table2(&self, table1_id: i32) -> Result<Table2, DbError> {
        self.ctx.log_operation("get_table2", &table1_id);
        self.ctx
            .execute_with_retry(|| {
                sqlx::query_as::<_, Table2>(
                    r#"SELECT "Table1Id", "Starts", "Ends" FROM "Table2s" WHERE "Table1Id" = $1"#,
                )
                .bind(table1_id)
                .fetch_one(self.ctx.pool())
            })
            .await
    }

    /// The dependent of a `Table1`, or `None` when it has none.
    pub async fn get_table2_for_table1(&self, table1: &Table1) -> Result<Option<Table2>, DbError> {
        match self.get_table2(table1.id).await {
            Ok(table2) => Ok(Some(table2)),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The principal of a `Table2`. It always exists while the foreign key holds.
    pub async fn get_table1_for_table2(&self, table2: &Table2) -> Result<Table1, DbError> {
        self.get_table1(table2.principal_key()).await
    }

    pub async fn delete_table2(&self, table1_id: i32) -> Result<(), DbError> {
        self.ctx.log_operation("delete_table2", &table1_id);
        let result = self
            .ctx
            .execute_with_retry(|| {
                sqlx::query(r#"DELETE FROM "Table2s" WHERE "Table1Id" = $1"#)
                    .bind(table1_id)
                    .execute(self.ctx.pool())
            })
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Every `Table1` with its `Table2`, if it has one, ordered by id.
    pub async fn list_with_table2(&self) -> Result<Vec<Table1WithTable2>, DbError> {
        self.ctx.log_operation("list_with_table2", &());
        let rows = self
            .ctx
            .execute_with_retry(|| {
                sqlx::query(
                    r#"
                    SELECT t1."Id", t1."Name", t1."Starts", t1."Ends",
                           t2."Table1Id", t2."Starts" AS "Table2Starts", t2."Ends" AS "Table2Ends"
                    FROM "Table1s" AS t1
                    LEFT JOIN "Table2s" AS t2 ON t2."Table1Id" = t1."Id"
                    ORDER BY t1."Id"
                    "#,
                )
                .fetch_all(self.ctx.pool())
            })
            .await?;

        rows.iter().map(|row| joined_row(row).map_err(DbError::from)).collect()
    }
}

fn joined_row(row: &PgRow) -> Result<Table1WithTable2, sqlx::Error> {
    let table1 = Table1 {
        id: row.try_get("Id")?,
        name: row.try_get("Name")?,
        starts: row.try_get("Starts")?,
        ends: row.try_get("Ends")?,
    };

    let table1_id: Option<i32> = row.try_get("Table1Id")?;
    let table2 = match table1_id {
        Some(table1_id) => {
            let starts: DateTime<Utc> = row.try_get("Table2Starts")?;
            let ends: DateTime<Utc> = row.try_get("Table2Ends")?;
            Some(Table2 { table1_id, starts, ends })
        }
        None => None,
    };

    Ok(Table1WithTable2 { table1, table2 })
}
