
use std::sync::Arc;

use common::*;
use shelf::engine::EngineResult;
use shelf::{json, ErrorKind, IndexSpec, Key, Migration, MigrationContext, MigrationOperation, SchemaSpec, TableSpec};

#[tokio::test]
async fn create_db_runs_only_on_version_increase() -> Result<(), anyhow::Error> {
    let (engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;
    db.close_db().await?;

    // same version again: success, no re-seeding
    db.create_db("shop", 1, items_table()).await?;
    assert_eq!(db.get_all("items").await?.len(), 1);
    db.close_db().await?;

    // higher version: the table exists, so nothing is created or seeded
    db.create_db("shop", 2, items_table()).await?;
    assert_eq!(db.get_all("items").await?.len(), 1);
    assert_eq!(engine.version_of("shop"), Some(2));

    let session = db.session().expect("session");
    let store = session.transaction(&["items"], shelf::engine::TransactionMode::ReadOnly)?.object_store("items")?;
    assert_eq!(store.index_names(), vec!["sku".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn create_table_outside_a_migration() -> Result<(), anyhow::Error> {
    let (engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;

    let orders = TableSpec::new("orders").key_path("order_id").index(IndexSpec::new("item", "item"));
    db.create_table(orders.clone()).await?;
    assert_eq!(engine.version_of("shop"), Some(2));
    assert!(db.session().expect("session").contains_store("orders"));

    // the second attempt reports the existing table
    let err = db.create_table(orders).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(engine.version_of("shop"), Some(2));

    // existing data survives the upgrade
    assert_eq!(db.get_all("items").await?.len(), 1);
    db.save_data("orders", json!({"order_id": "o-1", "item": 1})).await?;
    assert_eq!(db.get_data_by_key("orders", "item", 1).await?.key, Key::from("o-1"));
    Ok(())
}

#[tokio::test]
async fn create_table_needs_an_open_session() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    let err = db.create_table(TableSpec::new("orders")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    Ok(())
}

#[tokio::test]
async fn delete_table_drops_records_and_indexes() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;

    db.delete_table("items").await?;
    assert!(!db.session().expect("session").contains_store("items"));
    assert_eq!(db.get_all("items").await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(db.delete_table("items").await.unwrap_err().kind(), ErrorKind::NotFound);

    // recreating starts from scratch, seed included
    db.create_table(items_table()).await?;
    let items = db.get_all("items").await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].key, Key::from(1));
    Ok(())
}

#[tokio::test]
async fn failing_seed_aborts_the_upgrade() -> Result<(), anyhow::Error> {
    let (engine, db) = setup()?;
    let broken = TableSpec::new("items")
        .index(IndexSpec::new("sku", "sku").unique())
        .seed([json!({"sku": "A1"}), json!({"sku": "A1"})]);

    let err = db.create_db("shop", 1, broken).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.diagnostic().starts_with("AbortError"), "{}", err.diagnostic());
    assert_eq!(engine.version_of("shop"), None);

    // a corrected schema at the same version applies cleanly
    db.create_db("shop", 1, items_table()).await?;
    assert_eq!(db.get_all("items").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn open_schema_from_json() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    let schema = SchemaSpec::from_json(
        r#"{
            "name": "library",
            "version": 1,
            "tables": [
                {"name": "books", "key_path": "isbn", "indexes": [{"name": "title", "attr": "title", "unique": true}]},
                {"name": "loans", "indexes": [{"name": "isbn", "attr": "isbn"}], "seed": [{"isbn": "978-0"}]}
            ]
        }"#,
    )?;
    db.open_schema(&schema).await?;

    let session = db.session().expect("session");
    assert_eq!(session.store_names(), vec!["books".to_owned(), "loans".to_owned()]);
    assert_eq!(db.get_data_by_key("loans", "isbn", "978-0").await?.key, Key::from(1));

    db.save_data("books", json!({"isbn": "978-1", "title": "Dune"})).await?;
    let err = db.save_data("books", json!({"isbn": "978-2", "title": "Dune"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    Ok(())
}

struct RenameSku;

impl Migration for RenameSku {
    fn name(&self) -> &str { "split_items" }

    fn apply(&self, ctx: &mut MigrationContext<'_>) -> EngineResult<()> {
        assert_eq!(ctx.version_change().old_version, 1);
        ctx.delete_table("items")?;
        ctx.create_table(&TableSpec::new("products").key_path("sku"))?;
        assert_eq!(
            ctx.operations(),
            &[MigrationOperation::DropTable { name: "items".into() }, MigrationOperation::CreateTable { name: "products".into() }]
        );
        Ok(())
    }
}

#[tokio::test]
async fn custom_migrations_run_inside_the_upgrade() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;
    db.close_db().await?;

    db.open_with("shop", 2, Arc::new(RenameSku)).await?;
    assert_eq!(db.session().expect("session").store_names(), vec!["products".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn failed_create_table_keeps_the_database_usable() -> Result<(), anyhow::Error> {
    let (engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;

    // the duplicate seed violates the unique index and aborts the upgrade
    let orders = TableSpec::new("orders").index(IndexSpec::new("n", "n").unique()).seed([json!({"n": 1}), json!({"n": 1})]);
    let err = db.create_table(orders).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);

    assert_eq!(db.status(), shelf::ConnectionStatus::Open);
    assert_eq!(engine.version_of("shop"), Some(1));
    assert!(!db.session().expect("session").contains_store("orders"));
    assert_eq!(db.get_all("items").await?.len(), 1);
    Ok(())
}
