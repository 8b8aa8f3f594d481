use super::*;

#[tokio::test]
async fn unknown_or_missing_id_creates_context() {
    let registry = ContextRegistry::new();

    let (first, created) = registry.get_or_create(None).await;
    assert!(created);

    let (again, created) = registry.get_or_create(Some(first.id)).await;
    assert!(!created);
    assert!(Arc::ptr_eq(&first, &again));

    let stale = Uuid::new_v4();
    let (fresh, created) = registry.get_or_create(Some(stale)).await;
    assert!(created);
    assert_ne!(fresh.id, stale);
    assert!(registry.get(stale).await.is_none());
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn second_submission_is_refused_until_first_finishes() {
    let ctx = BrowserContext::new(Uuid::new_v4());

    let permit = ctx.try_begin_submission().expect("first submission");
    assert!(ctx.try_begin_submission().is_none());
    drop(permit);
    assert!(ctx.try_begin_submission().is_some());
}

#[tokio::test]
async fn sweep_removes_only_idle_contexts() {
    let registry = ContextRegistry::new();
    let (idle, _) = registry.get_or_create(None).await;
    let ttl = Duration::from_secs(60);

    assert_eq!(registry.sweep_idle_at(ttl, Instant::now()).await, 0);

    let later = Instant::now() + Duration::from_secs(120);
    assert_eq!(registry.sweep_idle_at(ttl, later).await, 1);
    assert!(registry.get(idle.id).await.is_none());
}

#[tokio::test]
async fn sweep_keeps_contexts_with_event_listeners() {
    let registry = ContextRegistry::new();
    let (ctx, _) = registry.get_or_create(None).await;
    let _listener = ctx.events.subscribe();

    let later = Instant::now() + Duration::from_secs(7200);
    assert_eq!(registry.sweep_idle_at(Duration::from_secs(60), later).await, 0);
    assert!(registry.get(ctx.id).await.is_some());
}
