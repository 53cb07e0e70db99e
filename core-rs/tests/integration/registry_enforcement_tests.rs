//! Integration tests for registry-level enforcement
//!
//! Read paths must convert denials into absence; write paths must
//! propagate denials and abort batches. Update checks bind the stored
//! value, and mutations emit change events.

use serde_json::json;
use tessera_core::{
    AccessLevel, Removable, RegistryEvent, Resource, ResourceStore, Session, StoreError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tessera_core=debug")
        .try_init();
}

const OWNED_CARS: &str = r#"
name: owned-cars
types:
  - name: org.acme.Member
    kind: participant
    identifiedBy: email
  - name: org.acme.Car
    kind: asset
    identifiedBy: vin
rules:
  - name: OwnersDoEverything
    verbs: [ALL]
    resource: { type: org.acme.Car, var: r }
    participant: { type: org.acme.Member, var: p }
    condition: r.owner == p
    action: ALLOW
  - name: MembersReadMembers
    verbs: [READ]
    resource: org.acme.Member
    participant: org.acme.Member
    action: ALLOW
"#;

fn member(store: &ResourceStore, email: &str) -> Resource {
    store
        .new_resource("org.acme.Member", json!({"email": email}))
        .unwrap()
}

fn owned_car(store: &ResourceStore, vin: &str, owner_email: &str) -> Resource {
    store
        .new_resource(
            "org.acme.Car",
            json!({
                "vin": vin,
                "owner": format!("resource:org.acme.Member#{}", owner_email),
            }),
        )
        .unwrap()
}

async fn seeded_store() -> ResourceStore {
    let store = ResourceStore::from_yaml_str(OWNED_CARS).unwrap();
    let seeding = Session::anonymous();
    let cars = store.registry("org.acme.Car").unwrap();
    cars.add_all(
        &seeding,
        &[
            owned_car(&store, "A1", "alice@acme.org"),
            owned_car(&store, "B1", "bob@acme.org"),
        ],
    )
    .await
    .unwrap();
    store
}

#[tokio::test]
async fn test_get_all_omits_inaccessible_resources() {
    init_tracing();
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();
    let session = Session::for_participant(member(&store, "alice@acme.org"));

    let visible = cars.get_all(&session).await.unwrap();
    let vins: Vec<_> = visible.iter().map(|r| r.identifier().to_string()).collect();
    assert_eq!(vins, vec!["A1"]);
}

#[tokio::test]
async fn test_get_denial_reads_as_absence() {
    init_tracing();
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();
    let session = Session::for_participant(member(&store, "alice@acme.org"));

    let own = cars.get(&session, "A1").await.unwrap();
    assert_eq!(own.identifier(), "A1");

    // Bob's car exists but reads as missing - and the message is identical
    // to the one a genuinely absent record produces.
    let denied = cars.get(&session, "B1").await.unwrap_err();
    let missing = cars.get(&session, "ZZ").await.unwrap_err();
    match (&denied, &missing) {
        (
            StoreError::ResourceNotFound { registry: r1, .. },
            StoreError::ResourceNotFound { registry: r2, .. },
        ) => assert_eq!(r1, r2),
        other => panic!("Expected two ResourceNotFound errors, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exists_denial_reads_as_false() {
    init_tracing();
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();
    let session = Session::for_participant(member(&store, "alice@acme.org"));

    assert!(cars.exists(&session, "A1").await.unwrap());
    assert!(!cars.exists(&session, "B1").await.unwrap());
    assert!(!cars.exists(&session, "ZZ").await.unwrap());
}

#[tokio::test]
async fn test_create_denial_propagates_and_aborts_batch() {
    init_tracing();
    let store = ResourceStore::from_yaml_str(OWNED_CARS).unwrap();
    let cars = store.registry("org.acme.Car").unwrap();
    let session = Session::for_participant(member(&store, "alice@acme.org"));

    // Alice may create her own car but not bob's.
    let own = owned_car(&store, "A1", "alice@acme.org");
    let foreign = owned_car(&store, "B1", "bob@acme.org");
    let late = owned_car(&store, "A2", "alice@acme.org");

    let err = cars
        .add_all(&session, &[own, foreign, late])
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
    let message = err.to_string();
    assert!(message.contains("CREATE"));
    assert!(message.contains("org.acme.Car#B1"));

    // The batch stopped at the denial: A1 committed, A2 never ran.
    let seeding = Session::anonymous();
    assert!(cars.exists(&seeding, "A1").await.unwrap());
    assert!(!cars.exists(&seeding, "B1").await.unwrap());
    assert!(!cars.exists(&seeding, "A2").await.unwrap());
}

#[tokio::test]
async fn test_add_rejects_cross_registry_type() {
    init_tracing();
    let store = seeded_store().await;
    let members = store.registry("org.acme.Member").unwrap();
    let session = Session::anonymous();

    let car = owned_car(&store, "C7", "alice@acme.org");
    let err = members.add(&session, &car).await.unwrap_err();
    assert!(matches!(err, StoreError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_update_binds_stored_value() {
    init_tracing();
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();

    // Bob tries to steal A1 by writing a version that names himself as
    // owner. The new value would satisfy the predicate, but the check runs
    // against the stored one.
    let bob = Session::for_participant(member(&store, "bob@acme.org"));
    let stolen = owned_car(&store, "A1", "bob@acme.org");
    let err = cars.update(&bob, &stolen).await.unwrap_err();
    assert!(err.is_access_denied());

    // Alice legitimately transfers A1 to bob; afterwards bob can update.
    let alice = Session::for_participant(member(&store, "alice@acme.org"));
    let transferred = owned_car(&store, "A1", "bob@acme.org");
    cars.update(&alice, &transferred).await.unwrap();

    let bobs_touchup = owned_car(&store, "A1", "bob@acme.org");
    cars.update(&bob, &bobs_touchup).await.unwrap();

    // And alice has lost access: the record now reads as absent for her.
    assert!(!cars.exists(&alice, "A1").await.unwrap());
}

#[tokio::test]
async fn test_remove_all_propagates_denial_and_stops() {
    init_tracing();
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();
    let alice = Session::for_participant(member(&store, "alice@acme.org"));

    let err = cars
        .remove_all(&alice, vec![Removable::Id("A1"), Removable::Id("B1")])
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
    assert!(err.to_string().contains("DELETE"));

    // A1 was removed before the denial; B1 survived.
    let seeding = Session::anonymous();
    assert!(!cars.exists(&seeding, "A1").await.unwrap());
    assert!(cars.exists(&seeding, "B1").await.unwrap());
}

#[tokio::test]
async fn test_remove_by_identifier_loads_stored_value() {
    init_tracing();
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();

    // Removing by id must load the stored record to type-check the DELETE.
    let bob = Session::for_participant(member(&store, "bob@acme.org"));
    cars.remove(&bob, "B1").await.unwrap();

    let seeding = Session::anonymous();
    assert!(!cars.exists(&seeding, "B1").await.unwrap());

    // Removing something that does not exist is a plain not-found.
    let err = cars.remove(&bob, "B1").await.unwrap_err();
    assert!(matches!(err, StoreError::ResourceNotFound { .. }));
}

#[tokio::test]
async fn test_mutations_emit_events() {
    init_tracing();
    let store = ResourceStore::from_yaml_str(OWNED_CARS).unwrap();
    let cars = store.registry("org.acme.Car").unwrap();
    let alice = Session::for_participant(member(&store, "alice@acme.org"));
    let mut events = cars.subscribe();

    cars.add(&alice, &owned_car(&store, "A1", "alice@acme.org"))
        .await
        .unwrap();
    cars.update(&alice, &owned_car(&store, "A1", "alice@acme.org"))
        .await
        .unwrap();
    cars.remove(&alice, "A1").await.unwrap();

    match events.try_recv().unwrap() {
        RegistryEvent::ResourceAdded {
            registry,
            resource_id,
            ..
        } => {
            assert_eq!(registry, "asset:org.acme.Car");
            assert_eq!(resource_id, "A1");
        }
        other => panic!("Expected ResourceAdded, got {:?}", other),
    }
    assert!(matches!(
        events.try_recv().unwrap(),
        RegistryEvent::ResourceUpdated { .. }
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        RegistryEvent::ResourceRemoved { .. }
    ));

    // Denied mutations emit nothing.
    let bob = Session::for_participant(member(&store, "bob@acme.org"));
    let _ = cars
        .add(&bob, &owned_car(&store, "X1", "alice@acme.org"))
        .await
        .unwrap_err();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_denied_reader_cannot_distinguish_from_empty() {
    init_tracing();
    // A member who owns nothing sees an empty registry, with no error.
    let store = seeded_store().await;
    let cars = store.registry("org.acme.Car").unwrap();
    let outsider = Session::for_participant(member(&store, "mallory@acme.org"));

    let visible = cars.get_all(&outsider).await.unwrap();
    assert!(visible.is_empty());
}
