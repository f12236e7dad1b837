
use std::sync::Arc;

use common::*;
use shelf::memory::{MemoryConfig, MemoryEngine};
use shelf::{json, ConnectionManager, ConnectionStatus, EngineError, ErrorKind};

#[tokio::test]
async fn open_then_close() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    assert!(db.is_supported());
    assert_eq!(db.status(), ConnectionStatus::Closed);

    db.open("lifecycle", 1).await?;
    assert_eq!(db.status(), ConnectionStatus::Open);
    db.close_db().await?;
    assert_eq!(db.status(), ConnectionStatus::Closed);

    // the raw session is still tracked, but closed
    assert!(db.session().expect("tracked session").is_closed());
    Ok(())
}

#[tokio::test]
async fn operations_after_close_are_not_supported() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;
    db.close_db().await?;

    assert_eq!(db.get_all("items").await.unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(db.save_data("items", json!({"sku": "B1"})).await.unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(db.get_data("items", 1).await.unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(db.close_db().await.unwrap_err().kind(), ErrorKind::NotSupported);
    Ok(())
}

#[tokio::test]
async fn operations_before_open_are_not_supported() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    assert_eq!(db.clear_data("items").await.unwrap_err().kind(), ErrorKind::NotSupported);
    assert!(db.session().is_none());
    Ok(())
}

#[tokio::test]
async fn unavailable_engine_is_reported() -> Result<(), anyhow::Error> {
    let engine = MemoryEngine::with_config(MemoryConfig::builder().available(false).build())?;
    let db = ConnectionManager::new(Arc::new(engine));
    assert!(!db.is_supported());

    let err = db.open("nowhere", 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(db.status(), ConnectionStatus::Closed);
    assert_eq!(db.delete_db("nowhere").await.unwrap_err().kind(), ErrorKind::NotSupported);
    Ok(())
}

#[tokio::test]
async fn lower_version_is_an_engine_error() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.open("versions", 3).await?;
    db.close_db().await?;

    let err = db.open("versions", 2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.diagnostic().starts_with("VersionError"), "{}", err.diagnostic());
    // the failed open leaves the previous state untouched
    assert_eq!(db.status(), ConnectionStatus::Closed);
    Ok(())
}

#[tokio::test]
async fn failed_open_keeps_the_active_session() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("shop", 2, items_table()).await?;

    assert!(db.open("shop", 1).await.is_err());
    assert_eq!(db.status(), ConnectionStatus::Open);
    assert_eq!(db.get_all("items").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn overlapping_opens_leave_a_usable_session() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    let (first, second) = futures::join!(db.create_db("shop", 1, items_table()), db.open("other", 0));
    first?;
    assert!(second.is_err());

    assert_eq!(db.status(), ConnectionStatus::Open);
    assert_eq!(db.session().expect("session").name(), "shop");
    assert_eq!(db.get_all("items").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn version_zero_is_rejected() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    let err = db.open("zero", 0).await.unwrap_err();
    match err {
        shelf::AccessError::Engine(EngineError::Version(_)) => {}
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn delete_is_blocked_while_open() -> Result<(), anyhow::Error> {
    let (engine, db) = setup()?;
    db.create_db("shop", 1, items_table()).await?;

    let err = db.delete_db("shop").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.diagnostic().starts_with("BlockedError"), "{}", err.diagnostic());

    db.close_db().await?;
    db.delete_db("shop").await?;
    assert!(engine.database_names().is_empty());

    // a deleted database comes back empty
    db.open("shop", 1).await?;
    assert!(db.session().expect("session").store_names().is_empty());
    Ok(())
}

#[tokio::test]
async fn opening_another_database_replaces_the_handle() -> Result<(), anyhow::Error> {
    let (engine, db) = setup()?;
    db.create_db("first", 1, items_table()).await?;
    db.open("second", 1).await?;

    assert_eq!(db.session().expect("session").name(), "second");
    // the first session was not closed, only forgotten
    assert_eq!(engine.open_sessions("first"), 1);
    assert_eq!(db.get_all("items").await.unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn managers_are_independent() -> Result<(), anyhow::Error> {
    let (engine, first) = setup()?;
    let second = ConnectionManager::new(engine.clone());

    first.create_db("shared", 1, items_table()).await?;
    second.open("shared", 1).await?;
    first.close_db().await?;

    assert_eq!(second.status(), ConnectionStatus::Open);
    assert_eq!(second.get_all("items").await?.len(), 1);
    Ok(())
}
