//! Integration tests for the `Models` facade

use chrono::{TimeZone, Utc};
use modelstore::model::Entity;
use modelstore::{BaseModel, DbError, Models, Record, StorageConfig, TypeRegistry, model};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

model! {
    pub struct State {
        pub name: String,
    }
}

model! {
    pub struct Widget {}
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<BaseModel>();
    registry.register::<State>();
    registry.register::<Widget>();
    registry
}

#[test]
fn test_widget_commit_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.json");
    let models = Models::open(StorageConfig::new(&path), registry()).unwrap();

    let widget = models.create("Widget", Record::new()).unwrap();
    let id = widget.id().unwrap();
    assert_eq!(uuid::Uuid::parse_str(&id).unwrap().get_version_num(), 4);
    models.persist(&widget).unwrap();

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(document[format!("Widget.{}", id)]["__class__"], json!("Widget"));
}

#[test]
fn test_widget_reconstruction_from_literal() {
    let record = Record::from_value(json!({
        "id": "123",
        "created_at": "2024-01-01T00:00:00.000000",
        "updated_at": "2024-01-01T00:00:00.000000",
        "__class__": "Widget"
    }))
    .unwrap();

    let registry = registry();
    let registration = registry.resolve("Widget").unwrap();
    assert_eq!(registration.entity_type_name(), "Widget");

    let widget = Widget::from_record(&record).unwrap();
    let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(widget.id(), "123");
    assert_eq!(widget.created_at(), midnight);
    assert_eq!(widget.updated_at(), midnight);
    assert!(widget.fields().unwrap().is_empty());
}

#[test]
fn test_create_persist_reconstruct() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.json");

    let models = Models::open(StorageConfig::new(&path), registry()).unwrap();
    let initial = Record::from_value(json!({"name": "California"})).unwrap();
    let state = models.create("State", initial).unwrap();
    models.persist(&state).unwrap();

    let reopened = Models::open(StorageConfig::new(&path), registry()).unwrap();
    let all = reopened.list_all(None).unwrap();
    assert_eq!(all.len(), 1);

    let restored = all[&state.registry_key().unwrap()]
        .downcast::<State>()
        .unwrap();
    assert_eq!(restored.get(|s| s.name.clone()).unwrap(), "California");
    assert_eq!(restored.updated_at().unwrap(), state.updated_at().unwrap());
}

#[test]
fn test_create_rejects_unknown_typed_field() {
    let temp_dir = TempDir::new().unwrap();
    let models = Models::open(
        StorageConfig::new(temp_dir.path().join("file.json")),
        registry(),
    )
    .unwrap();

    let initial = Record::from_value(json!({"capital": "Sacramento"})).unwrap();
    assert!(matches!(
        models.create("State", initial),
        Err(DbError::InvalidRecord(_))
    ));
}

#[test]
fn test_reconstruct_all_reports_loaded_records() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.json");

    let models = Models::open(StorageConfig::new(&path), registry()).unwrap();
    let first = models.create("BaseModel", Record::new()).unwrap();
    models.create_model(State::new("Nevada".to_string())).unwrap();
    models.persist(&first).unwrap();

    assert_eq!(models.reconstruct_all().unwrap(), 2);
    assert_eq!(models.list_all(Some("State")).unwrap().len(), 1);
    assert_eq!(models.list_all(Some("BaseModel")).unwrap().len(), 1);
}

#[test]
fn test_open_propagates_unknown_type() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("file.json");
    fs::write(&path, r#"{"City.1": {"id": "1", "__class__": "City"}}"#).unwrap();

    let err = Models::open(StorageConfig::new(&path), registry()).unwrap_err();
    assert!(matches!(err, DbError::UnknownType(ref name) if name == "City"));
}
