use crm_portal::models::{Complaint, DashboardStats, Identity, Lead, Role, TierPlan};
use serde_json::json;

#[test]
fn test_identity_from_login_payload() {
    // /auth/login sends camelCase and string ids.
    let identity: Identity = serde_json::from_value(json!({
        "id": "7",
        "email": "ada@acme.com",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "role": "org_admin",
        "organizationId": "org-9"
    }))
    .unwrap();

    assert_eq!(identity.id, "7");
    assert_eq!(identity.role, Role::OrgAdmin);
    assert_eq!(identity.organization_id.as_deref(), Some("org-9"));
    assert!(identity.is_active);
    assert_eq!(identity.display_name(), "Ada Lovelace");
    assert_eq!(identity.initials(), "AL");
}

#[test]
fn test_identity_from_me_payload() {
    // /auth/me sends snake_case and integer ids.
    let identity: Identity = serde_json::from_value(json!({
        "id": 42,
        "email": "sam@acme.com",
        "first_name": "sam",
        "last_name": "",
        "role": "employee",
        "organization_id": 3,
        "is_active": false
    }))
    .unwrap();

    assert_eq!(identity.id, "42");
    assert_eq!(identity.organization_id.as_deref(), Some("3"));
    assert!(!identity.is_active);
    assert_eq!(identity.display_name(), "sam");
    assert_eq!(identity.initials(), "S");
}

#[test]
fn test_unknown_role_is_rejected() {
    let result = serde_json::from_value::<Identity>(json!({
        "id": "1",
        "email": "x@y.z",
        "role": "superuser"
    }));
    assert!(result.is_err());
}

#[test]
fn test_display_name_falls_back_to_email() {
    let identity: Identity = serde_json::from_value(json!({
        "id": "1",
        "email": "nobody@acme.com",
        "role": "customer"
    }))
    .unwrap();
    assert_eq!(identity.display_name(), "nobody@acme.com");
}

#[test]
fn test_portal_titles() {
    assert_eq!(Role::SystemAdmin.display_name(), "System Admin");
    assert_eq!(Role::OrgAdmin.display_name(), "Organization Admin");
    assert_eq!(Role::Customer.display_name(), "Customer Portal");
}

#[test]
fn test_default_stats_are_zeroed() {
    let stats = DashboardStats::default();
    assert_eq!(stats.total_leads, 0);
    assert_eq!(stats.monthly_leads, vec![0; 12]);
    assert!(stats.recent_activities.is_empty());
}

#[test]
fn test_subscription_catalogue() {
    let plans = TierPlan::catalogue();
    let prices: Vec<u32> = plans.iter().map(|p| p.monthly_price_usd).collect();
    assert_eq!(prices, [0, 49]);
}

#[test]
fn test_numeric_assignee_ids_decode() {
    let lead: Lead = serde_json::from_value(json!({
        "id": 7,
        "first_name": "Grace",
        "last_name": "Hopper",
        "email": "grace@navy.mil",
        "status": "new",
        "assigned_to": 12
    }))
    .unwrap();
    assert_eq!(lead.assigned_to.as_deref(), Some("12"));

    let complaint: Complaint = serde_json::from_value(json!({
        "id": 3,
        "title": "Late",
        "description": "Parcel is late",
        "type": "service",
        "priority": "low",
        "status": "open",
        "assigned_to_id": 4
    }))
    .unwrap();
    assert_eq!(complaint.assigned_to.as_deref(), Some("4"));

    let unassigned: Complaint = serde_json::from_value(json!({
        "id": "c-1",
        "title": "Late",
        "description": "Parcel is late",
        "type": "service",
        "priority": "low",
        "status": "open",
        "assignedTo": null
    }))
    .unwrap();
    assert!(unassigned.assigned_to.is_none());
}
