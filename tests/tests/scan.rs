
use common::*;
use futures::{StreamExt, TryStreamExt};
use shelf::{json, ErrorKind, Key, Record};

#[tokio::test]
async fn scan_yields_records_in_key_order() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("scan", 1, people_table()).await?;
    for id in ["c", "a", "b"] {
        db.save_data("people", json!({ "id": id })).await?;
    }
    db.save_data("people", json!({ "id": 99 })).await?;

    let keys: Vec<Key> = db.scan("people")?.map_ok(|r| r.key).try_collect().await?;
    assert_eq!(keys, vec![Key::from(99), Key::from("a"), Key::from("b"), Key::from("c")]);
    Ok(())
}

#[tokio::test]
async fn scan_can_stop_early() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("scan", 1, people_table()).await?;
    for id in 1..=100 {
        db.save_data("people", json!({ "id": id })).await?;
    }

    let first: Vec<Record> = db.scan("people")?.take(3).try_collect().await?;
    assert_eq!(first.iter().map(|r| r.key.clone()).collect::<Vec<_>>(), vec![Key::from(1), Key::from(2), Key::from(3)]);

    // the table is still usable after abandoning a scan
    assert_eq!(db.get_all("people").await?.len(), 100);
    Ok(())
}

#[tokio::test]
async fn scan_observes_records_written_ahead_of_the_cursor() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("scan", 1, people_table()).await?;
    db.save_data("people", json!({ "id": 1 })).await?;
    db.save_data("people", json!({ "id": 3 })).await?;

    let mut scan = db.scan("people")?;
    let first = scan.next().await.expect("first record")?;
    assert_eq!(first.key, Key::from(1));

    db.save_data("people", json!({ "id": 2 })).await?;
    let rest: Vec<Key> = scan.map_ok(|r| r.key).try_collect().await?;
    assert_eq!(rest, vec![Key::from(2), Key::from(3)]);
    Ok(())
}

#[tokio::test]
async fn scan_of_empty_table_ends_immediately() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("scan", 1, people_table()).await?;
    let mut scan = db.scan("people")?;
    assert!(scan.next().await.is_none());
    assert!(scan.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn scan_of_missing_table_fails_up_front() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("scan", 1, people_table()).await?;
    assert_eq!(db.scan("nope").unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}
