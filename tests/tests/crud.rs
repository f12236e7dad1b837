
use common::*;
use shelf::{json, ErrorKind, Key, TableSpec};

#[tokio::test]
async fn save_then_get_round_trips() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;

    let ada = json!({"id": 7, "name": "Ada", "email": "ada@example.com", "address": {"city": "London"}});
    let key = db.save_data("people", ada.clone()).await?;
    assert_eq!(key, Key::from(7));

    let record = db.get_data("people", 7).await?;
    assert_eq!(record.key, key);
    assert_eq!(record.value, ada);
    assert_eq!(record.get("address.city"), Some(&json!("London")));
    Ok(())
}

#[tokio::test]
async fn auto_increment_assigns_keys() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, items_table()).await?;

    let key = db.save_data("items", json!({"sku": "B1", "price": 5})).await?;
    assert_eq!(key, Key::from(2));
    let item: Item = db.get_data("items", key).await?.deserialize()?;
    assert_eq!(item, Item { sku: "B1".into(), price: 5 });
    Ok(())
}

#[tokio::test]
async fn duplicate_primary_key_is_a_constraint_violation() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;
    db.save_data("people", json!({"id": 1, "email": "a@x"})).await?;

    let err = db.save_data("people", json!({"id": 1, "email": "b@x"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(db.get_data("people", 1).await?.value["email"], json!("a@x"));
    Ok(())
}

#[tokio::test]
async fn missing_key_path_is_an_engine_error() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;

    let err = db.save_data("people", json!({"email": "nokey@x"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(err.diagnostic().starts_with("DataError"), "{}", err.diagnostic());
    Ok(())
}

#[tokio::test]
async fn delete_then_get_is_not_found() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;
    db.save_data("people", json!({"id": 1})).await?;

    db.delete_data("people", 1).await?;
    assert_eq!(db.get_data("people", 1).await.unwrap_err().kind(), ErrorKind::NotFound);
    // deleting an absent key still succeeds
    db.delete_data("people", 1).await?;
    Ok(())
}

#[tokio::test]
async fn update_upserts_by_key() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;

    db.update_data("people", json!({"id": 1, "name": "Ada"})).await?;
    db.update_data("people", json!({"id": 1, "name": "Ada Lovelace"})).await?;

    let all = db.get_all("people").await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value["name"], json!("Ada Lovelace"));
    Ok(())
}

#[tokio::test]
async fn update_failures_are_reported() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;
    db.save_data("people", json!({"id": 1, "email": "a@x"})).await?;
    db.save_data("people", json!({"id": 2, "email": "b@x"})).await?;

    let err = db.update_data("people", json!({"id": 2, "email": "a@x"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(db.get_data("people", 2).await?.value["email"], json!("b@x"));
    Ok(())
}

#[tokio::test]
async fn update_at_explicit_key() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, items_table()).await?;

    db.update_data_at("items", 1, json!({"sku": "A1", "price": 12})).await?;
    assert_eq!(db.get_data("items", 1).await?.value["price"], json!(12));

    // an explicit key advances the generator
    db.update_data_at("items", 10, json!({"sku": "J1", "price": 1})).await?;
    assert_eq!(db.save_data("items", json!({"sku": "K1", "price": 1})).await?, Key::from(11));
    Ok(())
}

#[tokio::test]
async fn lookup_by_index() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;
    db.save_data("people", json!({"id": 2, "email": "b@x", "address": {"city": "Paris"}})).await?;
    db.save_data("people", json!({"id": 1, "email": "a@x", "address": {"city": "Paris"}})).await?;
    db.save_data("people", json!({"id": 3, "email": "c@x"})).await?;

    assert_eq!(db.get_data_by_key("people", "email", "c@x").await?.key, Key::from(3));
    // several matches: the lowest primary key wins
    assert_eq!(db.get_data_by_key("people", "city", "Paris").await?.key, Key::from(1));

    let err = db.get_data_by_key("people", "city", "Rome").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = db.get_data_by_key("people", "phone", "555").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn get_all_after_inserts_and_deletes() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, people_table()).await?;

    for id in 1..=10 {
        db.save_data("people", json!({ "id": id, "email": format!("{id}@x") })).await?;
    }
    for id in [2, 5, 9] {
        db.delete_data("people", id).await?;
    }

    let keys: Vec<Key> = db.get_all("people").await?.into_iter().map(|r| r.key).collect();
    assert_eq!(keys, [1, 3, 4, 6, 7, 8, 10].into_iter().map(Key::from).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn clear_empties_the_table() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, items_table()).await?;
    db.save_data("items", json!({"sku": "B1"})).await?;

    db.clear_data("items").await?;
    assert!(db.get_all("items").await?.is_empty());
    assert_eq!(db.get_data_by_key("items", "sku", "A1").await.unwrap_err().kind(), ErrorKind::NotFound);
    // the unique value is free again
    db.save_data("items", json!({"sku": "A1"})).await?;
    Ok(())
}

#[tokio::test]
async fn unknown_table_is_not_found() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, items_table()).await?;
    assert_eq!(db.save_data("nope", json!({})).await.unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn concurrent_saves_get_distinct_keys() -> Result<(), anyhow::Error> {
    let (_engine, db) = setup()?;
    db.create_db("crud", 1, TableSpec::new("log")).await?;

    let saves = (0..20).map(|i| db.save_data("log", json!({ "n": i })));
    let mut keys = futures::future::try_join_all(saves).await?;
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 20);
    assert_eq!(db.get_all("log").await?.len(), 20);
    Ok(())
}
