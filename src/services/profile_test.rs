use super::*;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::state::test_helpers::MockProfiles;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

fn identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: Some(email.to_owned()),
        display_name: Some("Ada Lovelace".into()),
        metadata: serde_json::Value::Null,
    }
}

fn store(backend: &Arc<MockProfiles>) -> ProfileStore {
    let backend: Arc<dyn ProfileBackend> = Arc::clone(backend) as _;
    ProfileStore::new(Some(backend), Duration::from_millis(500))
}

// =============================================================================
// COMPETITORS
// =============================================================================

#[test]
fn remove_competitor_drops_exact_match() {
    assert_eq!(remove_competitor(&names(&["Qonto", "Doctolib"]), "Qonto"), names(&["Doctolib"]));
}

#[test]
fn remove_non_member_is_noop() {
    let list = names(&["Qonto", "Doctolib"]);
    assert_eq!(remove_competitor(&list, "Alan"), list);
    assert_eq!(remove_competitor(&list, "qonto"), list);
}

#[test]
fn add_competitor_trims_and_skips_blank_or_duplicate() {
    let list = names(&["Qonto"]);
    assert_eq!(add_competitor(&list, "  Doctolib "), names(&["Qonto", "Doctolib"]));
    assert_eq!(add_competitor(&list, "   "), list);
    assert_eq!(add_competitor(&list, "Qonto"), list);
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn email_is_read_only() {
    let err = validate(ProfileField::Email, &FieldValue::Text("x@y.z".into())).unwrap_err();
    assert!(matches!(err, ProfileError::ReadOnlyField("email")));
}

#[test]
fn value_shape_must_match_field() {
    assert!(matches!(
        validate(ProfileField::Company, &FieldValue::List(vec![])),
        Err(ProfileError::InvalidValue("company"))
    ));
    assert!(matches!(
        validate(ProfileField::Competitors, &FieldValue::Text("Qonto".into())),
        Err(ProfileError::InvalidValue("competitors"))
    ));
    assert!(validate(ProfileField::JobTitle, &FieldValue::Text("CTO".into())).is_ok());
}

#[test]
fn field_values_deserialize_untagged() {
    let text: FieldValue = serde_json::from_str(r#""Acme""#).unwrap();
    let list: FieldValue = serde_json::from_str(r#"["Qonto"]"#).unwrap();
    assert_eq!(text, FieldValue::Text("Acme".into()));
    assert_eq!(list, FieldValue::List(names(&["Qonto"])));
}

// =============================================================================
// LOAD
// =============================================================================

#[tokio::test]
async fn load_without_identity_is_default_and_skips_backend() {
    let backend = MockProfiles::new();
    let profile = store(&backend).load(None).await.unwrap();

    assert_eq!(profile, Profile::default());
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_row_is_created_from_identity() {
    let backend = MockProfiles::new();
    let who = identity("ada@example.com");

    let profile = store(&backend).load(Some(&who)).await.unwrap();
    assert_eq!(profile.id, who.id);
    assert_eq!(profile.email, "ada@example.com");
    assert_eq!(profile.full_name, "Ada Lovelace");
    assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
    assert_eq!(backend.row(who.id), Some(profile));
}

#[tokio::test]
async fn existing_row_with_blank_email_falls_back_to_identity() {
    let backend = MockProfiles::new();
    let who = identity("ada@example.com");
    backend.insert(Profile { id: who.id, company: "Acme".into(), ..Profile::default() });

    let profile = store(&backend).load(Some(&who)).await.unwrap();
    assert_eq!(profile.company, "Acme");
    assert_eq!(profile.email, "ada@example.com");
    assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_without_database_seeds_from_identity() {
    let who = identity("ada@example.com");
    let store = ProfileStore::new(None, Duration::from_millis(500));

    assert!(!store.is_configured());
    let profile = store.load(Some(&who)).await.unwrap();
    assert_eq!(profile.id, who.id);
    assert_eq!(profile.email, "ada@example.com");
}

// =============================================================================
// SAVE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn burst_of_saves_writes_last_value_once() {
    let backend = MockProfiles::new();
    let store = store(&backend);
    let id = Uuid::new_v4();

    for value in ["A", "Ac", "Acm", "Acme"] {
        store
            .save_field(id, ProfileField::Company, FieldValue::Text(value.into()))
            .unwrap();
    }
    assert_eq!(store.pending_saves(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio::task::yield_now().await;

    assert_eq!(backend.updates(), vec![(id, ProfileField::Company, FieldValue::Text("Acme".into()))]);
    assert_eq!(store.pending_saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn fields_are_saved_independently() {
    let backend = MockProfiles::new();
    let store = store(&backend);
    let id = Uuid::new_v4();

    store
        .save_field(id, ProfileField::Company, FieldValue::Text("Acme".into()))
        .unwrap();
    store
        .save_field(id, ProfileField::Competitors, FieldValue::List(names(&["Qonto"])))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio::task::yield_now().await;
    assert_eq!(backend.updates().len(), 2);
}

#[tokio::test]
async fn rejected_save_queues_nothing() {
    let backend = MockProfiles::new();
    let store = store(&backend);

    assert!(
        store
            .save_field(Uuid::new_v4(), ProfileField::Email, FieldValue::Text("x@y.z".into()))
            .is_err()
    );
    assert_eq!(store.pending_saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_dropped_after_one_attempt() {
    let backend = MockProfiles::new();
    backend.set_updates_failing(true);
    let store = store(&backend);
    let id = Uuid::new_v4();

    store
        .save_field(id, ProfileField::Industry, FieldValue::Text("Fintech".into()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio::task::yield_now().await;

    assert_eq!(backend.updates().len(), 1);
    assert_eq!(store.pending_saves(), 0);
}

#[tokio::test]
async fn load_surfaces_database_errors() {
    let backend = MockProfiles::new();
    backend.set_fetch_failing(true);
    let store = store(&backend);

    let err = store.load(Some(&identity("ada@example.com"))).await.unwrap_err();
    assert!(matches!(err, ProfileError::Db(_)));
    assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
}
