use membank_core::ProjectRegistry;

#[test]
fn empty_registry_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ProjectRegistry::new(dir.path());
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn create_and_list_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProjectRegistry::new(dir.path());

    let project = registry
        .create("AI Research", "machine learning notes")
        .unwrap()
        .unwrap();
    assert!(!project.id.is_empty());
    assert_eq!(project.name, "AI Research");
    assert!(project.created_at > 0);
    assert_eq!(project.created_at, project.last_accessed);
    assert!(project.storage_location.starts_with(dir.path()));

    let listed = registry.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, project.id);
}

#[test]
fn duplicate_names_are_rejected_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProjectRegistry::new(dir.path());

    registry.create("AI Research", "first").unwrap().unwrap();
    assert!(registry.create("ai research", "second").unwrap().is_none());
    assert!(registry.create("  AI RESEARCH  ", "third").unwrap().is_none());
    assert_eq!(registry.list().unwrap().len(), 1);
}

#[test]
fn get_by_id_touches_last_accessed() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProjectRegistry::new(dir.path());

    let created = registry.create("AI Research", "notes").unwrap().unwrap();
    let fetched = registry.get(&created.id).unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
    assert!(fetched.last_accessed >= created.last_accessed);

    // The touch was persisted, not just returned.
    let listed = registry.list().unwrap();
    assert_eq!(listed[0].last_accessed, fetched.last_accessed);
}

#[test]
fn get_unknown_id_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProjectRegistry::new(dir.path());
    assert!(registry.get("missing").unwrap().is_none());
}

#[test]
fn get_by_name_or_id_tries_id_then_case_insensitive_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProjectRegistry::new(dir.path());

    let created = registry.create("AI Research", "notes").unwrap().unwrap();

    let by_id = registry.get_by_name_or_id(&created.id).unwrap().unwrap();
    assert_eq!(by_id.id, created.id);

    let by_name = registry.get_by_name_or_id("ai research").unwrap().unwrap();
    assert_eq!(by_name.id, created.id);

    assert!(registry.get_by_name_or_id("unknown").unwrap().is_none());
}

#[test]
fn delete_removes_only_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProjectRegistry::new(dir.path());

    let keep = registry.create("Keep", "kept project").unwrap().unwrap();
    let remove = registry.create("Remove", "doomed project").unwrap().unwrap();

    assert!(registry.delete(&remove.id).unwrap());
    assert!(!registry.delete(&remove.id).unwrap());

    let listed = registry.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, keep.id);
}

#[test]
fn registry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let created = {
        let mut registry = ProjectRegistry::new(dir.path());
        registry.create("Persistent", "survives").unwrap().unwrap()
    };

    let registry = ProjectRegistry::new(dir.path());
    let listed = registry.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].name, "Persistent");
}
