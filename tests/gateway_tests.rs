use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header},
};
use crm_portal::{
    AuthGateway, MemorySessionStore, MockBackend, PortalError, Session,
    access::{self, GateDecision, Route},
    auth::CurrentUser,
    models::{Credential, Role},
    storage::SessionStore,
};
use std::{sync::Arc, time::Duration};

struct Harness {
    gateway: Arc<AuthGateway>,
    store: Arc<MemorySessionStore>,
    mock: Arc<MockBackend>,
}

fn harness_with(store: MemorySessionStore) -> Harness {
    let store = Arc::new(store);
    let mock = Arc::new(MockBackend::new());
    let gateway = Arc::new(AuthGateway::new(store.clone(), mock.clone()));
    Harness {
        gateway,
        store,
        mock,
    }
}

fn harness() -> Harness {
    harness_with(MemorySessionStore::new())
}

// --- Bootstrap ---

#[tokio::test]
async fn test_bootstrap_without_credential_makes_no_call() {
    let h = harness();
    assert_eq!(h.gateway.session(), Session::Unknown);

    let session = h.gateway.bootstrap().await.unwrap();

    assert_eq!(session, Session::Anonymous);
    assert_eq!(h.mock.calls(), 0);
}

#[tokio::test]
async fn test_bootstrap_restores_valid_credential() {
    let mock_token = Credential::new("mock-token-1");
    let h = harness_with(MemorySessionStore::with_credential(mock_token.clone()));

    let session = h.gateway.bootstrap().await.unwrap();

    let identity = session.identity().expect("should be authenticated");
    assert_eq!(identity.email, "admin@crm.com");
    assert_eq!(identity.role, Role::SystemAdmin);
    assert_eq!(h.mock.me_calls(), 1);
    assert_eq!(h.store.load().unwrap(), Some(mock_token));
}

#[tokio::test]
async fn test_bootstrap_with_rejected_credential_clears_it() {
    let h = harness_with(MemorySessionStore::with_credential(Credential::new("expired")));

    let session = h.gateway.bootstrap().await.unwrap();

    assert_eq!(session, Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
    assert_eq!(h.mock.me_calls(), 1);

    // Next start: nothing stored, so no round-trip at all.
    let restarted = AuthGateway::new(h.store.clone(), h.mock.clone());
    assert_eq!(restarted.bootstrap().await.unwrap(), Session::Anonymous);
    assert_eq!(h.mock.calls(), 1);
}

#[tokio::test]
async fn test_bootstrap_network_failure_also_clears() {
    let h = harness_with(MemorySessionStore::with_credential(Credential::new("mock-token-1")));
    h.mock.set_offline(true);

    let session = h.gateway.bootstrap().await.unwrap();

    assert_eq!(session, Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_logout_during_bootstrap_discards_the_restored_identity() {
    let h = harness_with(MemorySessionStore::with_credential(Credential::new("mock-token-1")));
    let release = h.mock.hold_me();

    let gateway = h.gateway.clone();
    let pending = tokio::spawn(async move { gateway.bootstrap().await });

    while h.mock.me_calls() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.gateway.session(), Session::Unknown);
    h.gateway.logout();
    release.notify_one();

    let session = pending.await.unwrap().unwrap();
    assert_eq!(session, Session::Anonymous);
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
}

// --- Login ---

#[tokio::test]
async fn test_login_publishes_identity_and_persists_token() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();

    let identity = h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    assert_eq!(identity.role, Role::SystemAdmin);
    assert_eq!(h.gateway.session().role(), Some(Role::SystemAdmin));
    assert_eq!(
        h.store.load().unwrap().map(|c| c.as_str().to_string()),
        Some("mock-token-1".to_string())
    );

    // A system admin may open user management.
    let users = Route::Users.entry().required_roles;
    assert!(access::can_access(identity.role, users));
    assert!(access::can_access(Role::SystemAdmin, Some(&[Role::SystemAdmin])));
    assert!(!access::can_access(Role::SystemAdmin, Some(&[Role::Customer])));
}

#[tokio::test]
async fn test_login_as_employee_cannot_open_admin_screens() {
    let h = harness();
    h.mock.add_user("emp@acme.com", "pw", Role::Employee);

    let identity = h.gateway.login("emp@acme.com", "pw").await.unwrap();

    assert!(!access::can_access(identity.role, Route::Users.entry().required_roles));
    assert!(access::can_access(identity.role, Route::Leads.entry().required_roles));
}

#[tokio::test]
async fn test_login_failure_returns_backend_message_and_stays_anonymous() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();

    let err = h.gateway.login("admin@crm.com", "wrong").await.unwrap_err();

    assert!(matches!(err, PortalError::AuthRejected(ref m) if m == "Invalid credentials"));
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_login_failure_discards_previous_session() {
    let h = harness();
    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    let err = h.gateway.login("admin@crm.com", "nope").await.unwrap_err();

    assert!(err.is_auth_rejection());
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_login_validates_before_calling_backend() {
    let h = harness();

    let err = h.gateway.login("", "demo123").await.unwrap_err();
    assert!(matches!(err, PortalError::Validation(_)));

    let err = h.gateway.login("admin@crm.com", "").await.unwrap_err();
    assert!(matches!(err, PortalError::Validation(_)));

    assert_eq!(h.mock.login_calls(), 0);
}

#[tokio::test]
async fn test_invalid_login_input_also_ends_the_session() {
    let h = harness();
    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    let err = h.gateway.login("not-an-email", "demo123").await.unwrap_err();

    assert!(matches!(err, PortalError::Validation(_)));
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
    assert_eq!(h.mock.login_calls(), 1);
}

#[tokio::test]
async fn test_abandoned_login_does_not_leave_session_loading() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();
    let release = h.mock.hold_logins();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        h.gateway.login("admin@crm.com", "demo123"),
    )
    .await;

    assert!(timed_out.is_err());
    let session = h.gateway.session();
    assert_eq!(session, Session::Anonymous);
    assert_eq!(
        access::decide(&session, "/login"),
        GateDecision::Render(Route::Login)
    );
    assert!(h.store.load().unwrap().is_none());

    // The in-flight guard was released with the dropped call.
    release.notify_one();
    let identity = h.gateway.login("admin@crm.com", "demo123").await.unwrap();
    assert_eq!(identity.role, Role::SystemAdmin);
}

#[tokio::test]
async fn test_login_network_failure_is_reported() {
    let h = harness();
    h.mock.set_offline(true);

    let err = h.gateway.login("admin@crm.com", "demo123").await.unwrap_err();

    assert!(matches!(err, PortalError::Network(_)));
    assert_eq!(h.gateway.session(), Session::Anonymous);
}

#[tokio::test]
async fn test_subscribers_see_the_new_session() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();
    let mut rx = h.gateway.subscribe();

    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    let seen = rx
        .wait_for(|s| matches!(s, Session::Authenticated { .. }))
        .await
        .unwrap()
        .clone();
    assert_eq!(seen.role(), Some(Role::SystemAdmin));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_never_disagrees_with_the_published_session() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();
    let rx = h.gateway.subscribe();

    let gateway = h.gateway.clone();
    let churn = tokio::spawn(async move {
        for _ in 0..50 {
            gateway.login("admin@crm.com", "demo123").await.unwrap();
            gateway.logout();
        }
    });

    while !churn.is_finished() {
        {
            // Holding the borrow keeps writers out, so this is one consistent view.
            let session = rx.borrow();
            let stored = h.store.load().unwrap().is_some();
            match &*session {
                Session::Authenticated { .. } => assert!(stored),
                Session::Anonymous => assert!(!stored),
                Session::Unknown | Session::Loading => {}
            }
        }
        tokio::task::yield_now().await;
    }
    churn.await.unwrap();
}

// --- Logout & teardown ---

#[tokio::test]
async fn test_logout_clears_everything_and_is_idempotent() {
    let h = harness();
    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    h.gateway.logout();
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());

    h.gateway.logout();
    assert_eq!(h.gateway.session(), Session::Anonymous);
}

#[tokio::test]
async fn test_logout_during_login_discards_the_late_result() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();
    let release = h.mock.hold_logins();
    let mut rx = h.gateway.subscribe();

    let gateway = h.gateway.clone();
    let pending = tokio::spawn(async move { gateway.login("admin@crm.com", "demo123").await });

    rx.wait_for(|s| matches!(s, Session::Loading)).await.unwrap();
    h.gateway.logout();
    release.notify_one();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(PortalError::Superseded)));
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_teardown_during_login_applies_nothing() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();
    let release = h.mock.hold_logins();
    let mut rx = h.gateway.subscribe();

    let gateway = h.gateway.clone();
    let pending = tokio::spawn(async move { gateway.login("admin@crm.com", "demo123").await });

    rx.wait_for(|s| matches!(s, Session::Loading)).await.unwrap();
    h.gateway.teardown();
    release.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(PortalError::Superseded)));
    assert!(h.gateway.session().identity().is_none());
    assert!(h.store.load().unwrap().is_none());
    assert!(h.gateway.is_closed());

    // A closed context refuses new work.
    assert!(matches!(h.gateway.bootstrap().await, Err(PortalError::Closed)));
}

#[tokio::test]
async fn test_teardown_keeps_stored_credential() {
    let h = harness();
    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    h.gateway.teardown();

    assert!(h.store.load().unwrap().is_some());
}

// --- 401 interception ---

#[tokio::test]
async fn test_authorized_call_ends_session_on_401() {
    let h = harness();
    let token = h.mock.add_user("emp@acme.com", "pw", Role::Employee);
    h.gateway.login("emp@acme.com", "pw").await.unwrap();
    h.mock.revoke(&token);

    let err = h
        .gateway
        .authorized(|api, cred| async move { api.list_leads(&cred).await })
        .await
        .unwrap_err();

    assert!(err.is_auth_rejection());
    assert_eq!(h.gateway.session(), Session::Anonymous);
    assert!(h.store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_authorized_call_keeps_session_on_other_errors() {
    let h = harness();
    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    let err = h
        .gateway
        .authorized(|api, cred| async move { api.get_lead(&cred, "missing").await })
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::Backend { status: 404, .. }));
    assert!(h.gateway.session().identity().is_some());
    assert!(h.store.load().unwrap().is_some());
}

#[tokio::test]
async fn test_authorized_call_requires_a_session() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();

    let err = h
        .gateway
        .authorized(|api, cred| async move { api.list_leads(&cred).await })
        .await
        .unwrap_err();

    assert!(err.is_auth_rejection());
    assert_eq!(h.mock.calls(), 0);
}

#[tokio::test]
async fn test_authorized_call_attaches_the_stored_credential() {
    let h = harness();
    h.gateway.login("admin@crm.com", "demo123").await.unwrap();

    let seen = h
        .gateway
        .authorized(|_api, cred| async move { Ok::<_, PortalError>(cred) })
        .await
        .unwrap();

    assert_eq!(seen.as_str(), "mock-token-1");
}

// --- CurrentUser extractor ---

#[tokio::test]
async fn test_current_user_refuses_roles_outside_the_route() {
    let h = harness();
    h.mock.add_user("emp@acme.com", "pw", Role::Employee);
    h.gateway.login("emp@acme.com", "pw").await.unwrap();

    let (mut parts, _) = Request::builder().uri("/users").body(()).unwrap().into_parts();
    let rejection = CurrentUser::from_request_parts(&mut parts, &h.gateway)
        .await
        .unwrap_err();
    assert_eq!(rejection.status(), StatusCode::SEE_OTHER);
    assert_eq!(rejection.headers()[header::LOCATION], "/dashboard");

    let (mut parts, _) = Request::builder().uri("/leads/7").body(()).unwrap().into_parts();
    let user = CurrentUser::from_request_parts(&mut parts, &h.gateway)
        .await
        .ok()
        .expect("employee may open leads");
    assert_eq!(user.role(), Role::Employee);
}

#[tokio::test]
async fn test_current_user_without_session_goes_to_login() {
    let h = harness();
    h.gateway.bootstrap().await.unwrap();

    let (mut parts, _) = Request::builder().uri("/dashboard").body(()).unwrap().into_parts();
    let rejection = CurrentUser::from_request_parts(&mut parts, &h.gateway)
        .await
        .unwrap_err();

    assert_eq!(rejection.status(), StatusCode::SEE_OTHER);
    assert_eq!(rejection.headers()[header::LOCATION], "/login");
}
