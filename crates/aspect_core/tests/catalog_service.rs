use aspect_core::db::open_db_in_memory;
use aspect_core::model::{AspectMap, MapAspect};
use aspect_core::{
    AddressPattern, AspectDef, Catalog, CatalogRepository, CatalogService, Entity, Hierarchy,
    HierarchyContent, PersistenceContext, PropertyDef, PropertyType, PropertyValue, RepoError,
    Species, SqliteCatalogRepository, TableMapping,
};
use std::sync::Arc;
use uuid::Uuid;

fn label_def(props: &[&str]) -> Arc<AspectDef> {
    let props = props
        .iter()
        .map(|name| PropertyDef::builder(*name, PropertyType::String).build().unwrap())
        .collect();
    Arc::new(AspectDef::mutable("label", props).unwrap())
}

#[test]
fn load_required_reports_missing_catalog() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn, &ctx).unwrap());

    let missing = Uuid::new_v4();
    let err = service.load_required(missing).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
    assert!(!service.exists(missing).unwrap());
}

#[test]
fn commit_revision_bumps_and_persists_version() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn, &ctx).unwrap());

    let mut catalog = Catalog::new(Species::Source, None).unwrap();
    service.save(&catalog).unwrap();
    assert_eq!(service.commit_revision(&mut catalog).unwrap(), 1);
    assert_eq!(service.commit_revision(&mut catalog).unwrap(), 2);

    let loaded = service.load_required(catalog.id()).unwrap();
    assert_eq!(loaded.version(), 2);
    assert_eq!(service.list().unwrap(), vec![catalog.id()]);
}

#[test]
fn failed_commit_keeps_previous_version() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn, &ctx).unwrap());

    let mut owner = Catalog::new(Species::Source, None).unwrap();
    owner.add_aspect_def(label_def(&["text"])).unwrap();
    service.save(&owner).unwrap();

    let mut rival = Catalog::new(Species::Source, None).unwrap();
    rival.add_aspect_def(label_def(&["text", "color"])).unwrap();
    let err = service.commit_revision(&mut rival).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(rival.version(), 0);
    assert!(!service.exists(rival.id()).unwrap());
}

#[test]
fn install_mapping_creates_table_and_routes_saves() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn, &ctx).unwrap());

    let def = label_def(&["text"]);
    let mapping = TableMapping::builder(Arc::clone(&def), "labels")
        .entity_column("entity_id")
        .build()
        .unwrap();
    let installed = service.install_mapping(mapping, true).unwrap();
    assert_eq!(installed.pattern(), AddressPattern::EntityKeyed);
    assert!(service.repository().context().mappings().get("label").is_some());

    let entity = Entity::new();
    let mut map = AspectMap::new(Arc::clone(&def));
    map.insert(Box::new(
        MapAspect::new(entity, Arc::clone(&def))
            .with("text", PropertyValue::single("hello"))
            .unwrap(),
    ))
    .unwrap();
    let mut catalog = Catalog::new(Species::Source, None).unwrap();
    catalog
        .add_hierarchy(Hierarchy::new("labels", HierarchyContent::AspectMap(map)).unwrap())
        .unwrap();
    service.save(&catalog).unwrap();

    let text: String = conn
        .query_row("SELECT text FROM labels;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(text, "hello");
    assert_eq!(service.load_required(catalog.id()).unwrap(), catalog);

    service.delete(catalog.id()).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM labels;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn install_mapping_without_table_fails_on_save() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let service = CatalogService::new(repo);

    let def = label_def(&["text"]);
    service
        .install_mapping(
            TableMapping::builder(Arc::clone(&def), "missing_labels")
                .build()
                .unwrap(),
            false,
        )
        .unwrap();

    let mut map = AspectMap::new(Arc::clone(&def));
    map.insert(Box::new(MapAspect::new(Entity::new(), Arc::clone(&def))))
        .unwrap();
    let mut catalog = Catalog::new(Species::Source, None).unwrap();
    catalog
        .add_hierarchy(Hierarchy::new("labels", HierarchyContent::AspectMap(map)).unwrap())
        .unwrap();
    let err = service.save(&catalog).unwrap_err();
    assert!(err.is_persistence());
    assert!(!service.repository().catalog_exists(catalog.id()).unwrap());
}
