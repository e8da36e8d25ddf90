//! Tests against a real PostgreSQL server.
//!
//! Set `TEST_DATABASE_URL` to a scratch database to run them; they return
//! early otherwise. The schema of that database is dropped and recreated.

use chrono::{TimeZone, Utc};
use core_types::{NewTable1, NewTable2};
use database::{build_model, migrations, verify_schema, ContextOptions, DbContext, DbError, DbRepository};
use serial_test::serial;

async fn test_context() -> Option<DbContext> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let options = ContextOptions::new(url).with_diagnostics(true).with_max_connections(2);
    Some(DbContext::from_options(options).await.expect("failed to connect to TEST_DATABASE_URL"))
}

async fn user_columns(ctx: &DbContext) -> Vec<(String, String, String)> {
    sqlx::query_as(
        r#"
        SELECT table_name::text, column_name::text, data_type::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name <> '_sqlx_migrations'
        ORDER BY table_name, ordinal_position
        "#,
    )
    .fetch_all(ctx.pool())
    .await
    .unwrap()
}

fn new_table1(name: Option<&str>) -> NewTable1 {
    NewTable1 {
        name: name.map(str::to_string),
        starts: Utc.with_ymd_and_hms(2019, 5, 2, 8, 0, 0).unwrap(),
        ends: Utc.with_ymd_and_hms(2019, 5, 2, 17, 0, 0).unwrap(),
    }
}

#[tokio::test]
#[serial]
async fn test_migrations_apply_idempotently_and_revert_cleanly() {
    let Some(ctx) = test_context().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    migrations::revert(ctx.pool(), Some(0)).await.unwrap();
    let before = user_columns(&ctx).await;

    let applied = migrations::apply(ctx.pool()).await.unwrap();
    assert_eq!(applied.len(), 2);
    assert!(migrations::apply(ctx.pool()).await.unwrap().is_empty());
    assert!(migrations::status(ctx.pool()).await.unwrap().iter().all(|m| m.is_applied()));

    let columns: Vec<_> = user_columns(&ctx)
        .await
        .into_iter()
        .filter(|(table, _, _)| table == "Table1s")
        .map(|(_, column, _)| column)
        .collect();
    assert_eq!(columns, ["Id", "Name", "Starts", "Ends"]);

    let model = build_model().unwrap();
    assert!(verify_schema(ctx.pool(), &model).await.unwrap().is_empty());

    // Reverting only the latest migration leaves Table1s in place.
    let reverted = migrations::revert(ctx.pool(), None).await.unwrap();
    assert_eq!(reverted.len(), 1);
    assert_eq!(reverted[0].description, "AddTable2");
    assert!(!verify_schema(ctx.pool(), &model).await.unwrap().is_empty());

    migrations::revert(ctx.pool(), Some(0)).await.unwrap();
    assert_eq!(user_columns(&ctx).await, before);

    ctx.close().await;
}

#[tokio::test]
#[serial]
async fn test_one_to_one_is_enforced() {
    let Some(ctx) = test_context().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    migrations::revert(ctx.pool(), Some(0)).await.unwrap();
    migrations::apply(ctx.pool()).await.unwrap();
    let repo = DbRepository::new(ctx.clone());

    let table1 = repo.insert_table1(&new_table1(Some("first"))).await.unwrap();
    let loner = repo.insert_table1(&new_table1(None)).await.unwrap();
    assert!(loner.id > table1.id);
    assert_eq!(loner.name, None);

    // No principal row with this id.
    let orphan = NewTable2 {
        table1_id: loner.id + 1000,
        starts: table1.starts,
        ends: table1.ends,
    };
    let err = repo.insert_table2(&orphan).await.unwrap_err();
    assert!(matches!(
        &err,
        DbError::ForeignKeyViolation { constraint: Some(name), .. } if name == "FK_Table2s_Table1s_Table1Id"
    ));
    assert!(ctx.describe_error(&err).contains("23503"));

    let table2 = repo.insert_table2(&table1.new_table2(table1.starts, table1.ends)).await.unwrap();
    assert_eq!(table2.table1_id, table1.id);
    assert_eq!(repo.get_table1_for_table2(&table2).await.unwrap(), table1);
    assert_eq!(repo.get_table2_for_table1(&table1).await.unwrap(), Some(table2.clone()));
    assert_eq!(repo.get_table2_for_table1(&loner).await.unwrap(), None);

    // A second dependent for the same principal collides on the primary key.
    let err = repo.insert_table2(&table1.new_table2(table1.starts, table1.ends)).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    let joined = repo.list_with_table2().await.unwrap();
    assert_eq!(joined.len(), 2);
    assert_eq!(joined[0].table2, Some(table2));
    assert_eq!(joined[1].table2, None);

    let mut renamed = table1.clone();
    renamed.name = Some("renamed".to_string());
    repo.update_table1(&renamed).await.unwrap();
    assert_eq!(repo.get_table1(table1.id).await.unwrap().name.as_deref(), Some("renamed"));

    // Deleting the principal takes the dependent with it.
    repo.delete_table1(table1.id).await.unwrap();
    assert!(matches!(repo.get_table2(table1.id).await, Err(DbError::NotFound)));
    assert!(matches!(repo.delete_table1(table1.id).await, Err(DbError::NotFound)));
    assert_eq!(repo.list_table1s().await.unwrap(), vec![loner]);

    migrations::revert(ctx.pool(), Some(0)).await.unwrap();
    ctx.close().await;
}
