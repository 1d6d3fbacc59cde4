use aspect_core::db::open_db_in_memory;
use aspect_core::model::{
    Aspect, AspectDef, AspectMap, Catalog, Entity, Hierarchy, HierarchyContent, MapAspect,
    PropertyDef, PropertyType, PropertyValue, Species, ValidationError,
};
use aspect_core::{
    AddressPattern, CatalogRepository, ModelError, PersistenceContext, RepoError,
    SqliteCatalogRepository, TableMapping,
};
use rusqlite::Connection;
use std::sync::Arc;

const TABLE: &str = "person_rows";

fn person_def() -> Arc<AspectDef> {
    Arc::new(
        AspectDef::mutable(
            "person",
            vec![
                PropertyDef::builder("name", PropertyType::String)
                    .nullable(false)
                    .build()
                    .unwrap(),
                PropertyDef::builder("age", PropertyType::Integer)
                    .build()
                    .unwrap(),
            ],
        )
        .unwrap(),
    )
}

fn mapping(def: &Arc<AspectDef>, pattern: AddressPattern) -> TableMapping {
    let mut builder = TableMapping::builder(Arc::clone(def), TABLE).column("name", "full_name");
    if pattern.has_catalog_column() {
        builder = builder.catalog_column("catalog_id");
    }
    if pattern.has_entity_column() {
        builder = builder.entity_column("entity_id");
    }
    builder.build().unwrap()
}

fn install(repo: &SqliteCatalogRepository<'_>, def: &Arc<AspectDef>, pattern: AddressPattern) {
    let mapping = mapping(def, pattern);
    assert_eq!(mapping.pattern(), pattern);
    repo.create_table(&mapping).unwrap();
    repo.register_mapping(mapping).unwrap();
}

fn person(def: &Arc<AspectDef>, entity: Entity, name: &str, age: Option<i64>) -> Box<dyn Aspect> {
    Box::new(
        MapAspect::new(entity, Arc::clone(def))
            .with("name", PropertyValue::single(name))
            .unwrap()
            .with("age", age)
            .unwrap(),
    )
}

fn people_catalog(def: &Arc<AspectDef>, people: &[(Entity, &str, Option<i64>)]) -> Catalog {
    let mut map = AspectMap::new(Arc::clone(def));
    for (entity, name, age) in people {
        map.insert(person(def, *entity, name, *age)).unwrap();
    }
    let mut catalog = Catalog::new(Species::Source, None).unwrap();
    catalog
        .add_hierarchy(Hierarchy::new("people", HierarchyContent::AspectMap(map)).unwrap())
        .unwrap();
    catalog
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\";"), [], |row| row.get(0))
        .unwrap()
}

const PATTERNS: [AddressPattern; 4] = [
    AddressPattern::Unscoped,
    AddressPattern::CatalogScoped,
    AddressPattern::EntityKeyed,
    AddressPattern::CatalogEntityKeyed,
];

#[test]
fn every_pattern_reads_back_what_it_wrote() {
    for pattern in PATTERNS {
        let conn = open_db_in_memory().unwrap();
        let ctx = PersistenceContext::default();
        let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
        let def = person_def();
        install(&repo, &def, pattern);

        let catalog = people_catalog(
            &def,
            &[(Entity::new(), "Ann", Some(30)), (Entity::new(), "Bo", None)],
        );
        repo.save_catalog(&catalog).unwrap();
        // Saving twice must not duplicate rows, upsert or not.
        repo.save_catalog(&catalog).unwrap();

        let loaded = repo.load_catalog(catalog.id()).unwrap().unwrap();
        assert_eq!(loaded, catalog, "{pattern:?}");
        assert_eq!(row_count(&conn, TABLE), 2, "{pattern:?}");
        assert_eq!(row_count(&conn, "property_value"), 0, "{pattern:?}");
        assert_eq!(row_count(&conn, "aspect"), 0, "{pattern:?}");
    }
}

#[test]
fn mapped_columns_hold_native_values() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let def = person_def();
    install(&repo, &def, AddressPattern::CatalogEntityKeyed);

    let ann = Entity::new();
    let catalog = people_catalog(&def, &[(ann, "Ann", Some(30))]);
    repo.save_catalog(&catalog).unwrap();

    let (catalog_id, entity_id, name, age): (String, String, String, i64) = conn
        .query_row(
            "SELECT catalog_id, entity_id, full_name, age FROM person_rows;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(catalog_id, catalog.id().to_string());
    assert_eq!(entity_id, ann.id().to_string());
    assert_eq!(name, "Ann");
    assert_eq!(age, 30);
}

#[test]
fn catalog_scoped_clear_leaves_other_catalogs_alone() {
    for pattern in [AddressPattern::CatalogScoped, AddressPattern::CatalogEntityKeyed] {
        let conn = open_db_in_memory().unwrap();
        let ctx = PersistenceContext::default();
        let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
        let def = person_def();
        install(&repo, &def, pattern);

        let first = people_catalog(
            &def,
            &[(Entity::new(), "Ann", Some(30)), (Entity::new(), "Bo", None)],
        );
        let second = people_catalog(&def, &[(Entity::new(), "Cy", Some(41))]);
        repo.save_catalog(&first).unwrap();
        repo.save_catalog(&second).unwrap();
        assert_eq!(row_count(&conn, TABLE), 3, "{pattern:?}");

        repo.delete_catalog(first.id()).unwrap();

        assert_eq!(row_count(&conn, TABLE), 1, "{pattern:?}");
        let loaded = repo.load_catalog(second.id()).unwrap().unwrap();
        assert_eq!(loaded, second, "{pattern:?}");
    }
}

#[test]
fn unscoped_tables_are_truncated_on_delete() {
    for pattern in [AddressPattern::Unscoped, AddressPattern::EntityKeyed] {
        let conn = open_db_in_memory().unwrap();
        let ctx = PersistenceContext::default();
        let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
        let def = person_def();
        install(&repo, &def, pattern);

        let catalog = people_catalog(&def, &[(Entity::new(), "Ann", Some(30))]);
        repo.save_catalog(&catalog).unwrap();
        repo.delete_catalog(catalog.id()).unwrap();
        assert_eq!(row_count(&conn, TABLE), 0, "{pattern:?}");
    }
}

#[test]
fn keyed_resave_removes_dropped_entities() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let def = person_def();
    install(&repo, &def, AddressPattern::CatalogEntityKeyed);

    let ann = Entity::new();
    let bo = Entity::new();
    let mut catalog = people_catalog(&def, &[(ann, "Ann", Some(30)), (bo, "Bo", None)]);
    repo.save_catalog(&catalog).unwrap();

    let map = catalog
        .hierarchy_mut("people")
        .unwrap()
        .as_aspect_map_mut()
        .unwrap();
    map.remove(bo).unwrap();
    map.get_mut(ann)
        .unwrap()
        .set("age", PropertyValue::single(31_i64))
        .unwrap();
    repo.save_catalog(&catalog).unwrap();

    assert_eq!(row_count(&conn, TABLE), 1);
    let loaded = repo.load_catalog(catalog.id()).unwrap().unwrap();
    assert_eq!(loaded, catalog);
}

#[test]
fn dropping_a_mapped_hierarchy_clears_its_rows() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let def = person_def();
    install(&repo, &def, AddressPattern::EntityKeyed);

    let mut catalog = people_catalog(&def, &[(Entity::new(), "Ann", Some(30))]);
    repo.save_catalog(&catalog).unwrap();
    catalog.remove_hierarchy("people").unwrap();
    repo.save_catalog(&catalog).unwrap();

    assert_eq!(row_count(&conn, TABLE), 0);
    let loaded = repo.load_catalog(catalog.id()).unwrap().unwrap();
    assert!(loaded.hierarchies().is_empty());
}

#[test]
fn rows_without_entity_identity_bind_by_position() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let def = person_def();
    install(&repo, &def, AddressPattern::Unscoped);

    let ann = Entity::new();
    let catalog = people_catalog(&def, &[(ann, "Ann", Some(30))]);
    repo.save_catalog(&catalog).unwrap();
    conn.execute(
        "INSERT INTO person_rows (full_name, age) VALUES ('Cy', NULL);",
        [],
    )
    .unwrap();

    let loaded = repo.load_catalog(catalog.id()).unwrap().unwrap();
    let map = loaded.aspect_map_for("person").unwrap();
    assert_eq!(map.len(), 2);
    let entities: Vec<Entity> = map.entities().collect();
    assert_eq!(entities[0], ann);
    assert_eq!(
        map.get(entities[1]).unwrap().get("name").unwrap(),
        PropertyValue::single("Cy")
    );
    assert!(ctx.entities().lookup(entities[1].id()).is_some());
}

#[test]
fn reads_page_through_large_tables() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default().with_page_size(2);
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let def = person_def();
    install(&repo, &def, AddressPattern::CatalogEntityKeyed);

    let names = ["A", "B", "C", "D", "E"];
    let people: Vec<(Entity, &str, Option<i64>)> = names
        .iter()
        .enumerate()
        .map(|(age, name)| (Entity::new(), *name, Some(age as i64)))
        .collect();
    let catalog = people_catalog(&def, &people);
    repo.save_catalog(&catalog).unwrap();

    let loaded = repo.load_catalog(catalog.id()).unwrap().unwrap();
    assert_eq!(loaded, catalog);
    assert_eq!(loaded.aspect_map_for("person").unwrap().len(), names.len());
}

#[test]
fn failed_save_rolls_back_everything() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let def = person_def();
    install(&repo, &def, AddressPattern::CatalogEntityKeyed);

    let ann = Entity::new();
    let mut catalog = people_catalog(&def, &[(ann, "Ann", Some(30))]);
    repo.save_catalog(&catalog).unwrap();
    let saved = repo.load_catalog(catalog.id()).unwrap().unwrap();

    // A never-assigned non-nullable property fails mid-save.
    let nameless = Entity::new();
    catalog
        .hierarchy_mut("people")
        .unwrap()
        .as_aspect_map_mut()
        .unwrap()
        .insert(Box::new(MapAspect::new(nameless, Arc::clone(&def))))
        .unwrap();
    catalog.set_version(9);
    catalog
        .add_hierarchy(
            Hierarchy::new("extra", HierarchyContent::List([ann].into_iter().collect())).unwrap(),
        )
        .unwrap();

    let err = repo.save_catalog(&catalog).unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(
        err,
        RepoError::Model(ModelError::Validation(ValidationError::NullNotAllowed { ref property }))
            if property == "name"
    ));

    let after = repo.load_catalog(catalog.id()).unwrap().unwrap();
    assert_eq!(after, saved);
    assert_eq!(after.version(), 0);
    assert_eq!(row_count(&conn, TABLE), 1);
    assert_eq!(row_count(&conn, "hierarchy_list_item"), 0);
}

#[test]
fn mapping_for_a_changed_definition_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ctx = PersistenceContext::default();
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx).unwrap();
    let old = Arc::new(
        AspectDef::mutable(
            "person",
            vec![PropertyDef::builder("name", PropertyType::String)
                .nullable(false)
                .build()
                .unwrap()],
        )
        .unwrap(),
    );
    repo.register_mapping(TableMapping::builder(old, TABLE).build().unwrap())
        .unwrap();

    let def = person_def();
    let catalog = people_catalog(&def, &[(Entity::new(), "Ann", None)]);
    let err = repo.save_catalog(&catalog).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Model(ModelError::Validation(ValidationError::InvalidMapping { .. }))
    ));
    assert!(!repo.catalog_exists(catalog.id()).unwrap());
}

#[test]
fn mapping_rejects_multivalued_and_unknown_properties() {
    let def = Arc::new(
        AspectDef::mutable(
            "tagged",
            vec![PropertyDef::builder("tags", PropertyType::String)
                .multivalued(true)
                .build()
                .unwrap()],
        )
        .unwrap(),
    );
    assert!(TableMapping::builder(Arc::clone(&def), "tagged_rows")
        .build()
        .is_err());

    let person = person_def();
    assert!(TableMapping::builder(Arc::clone(&person), "person_rows")
        .column("nickname", "nick")
        .build()
        .is_err());
    assert!(TableMapping::builder(Arc::clone(&person), "person rows")
        .build()
        .is_err());
    assert!(TableMapping::builder(person, "person_rows")
        .column("age", "NAME")
        .build()
        .is_err());
}
