use campus_hub::models::{
    CredentialsRequest, Item, ItemKind, OtpResponse, ResetPasswordRequest, Role, UserSummary,
};
use chrono::Utc;
use uuid::Uuid;

#[test]
fn test_reset_request_reads_camel_case_new_password() {
    let req: ResetPasswordRequest = serde_json::from_str(
        r#"{"email":"a@x.edu","otp":"123456","newPassword":"p2"}"#,
    )
    .unwrap();

    assert_eq!(req.new_password, "p2");
    assert_eq!(req.otp, "123456");
}

#[test]
fn test_missing_fields_default_to_empty() {
    // Missing fields become blank strings and are rejected by validation, not by serde.
    let req: CredentialsRequest = serde_json::from_str(r#"{"email":"a@x.edu"}"#).unwrap();

    assert_eq!(req.email, "a@x.edu");
    assert!(req.password.is_empty());
}

#[test]
fn test_item_kind_serializes_as_type() {
    let item = Item {
        id: Uuid::new_v4(),
        kind: ItemKind::Lost,
        name: "Wallet".to_string(),
        description: String::new(),
        photo: String::new(),
        posted_by: "s@x.edu".to_string(),
        created_at: Utc::now(),
    };

    let json_output = serde_json::to_string(&item).unwrap();

    assert!(json_output.contains(r#""type":"lost""#));
    assert!(!json_output.contains("kind"));

    let parsed: Item = serde_json::from_str(&json_output).unwrap();
    assert_eq!(parsed.kind, ItemKind::Lost);
}

#[test]
fn test_item_kind_parses_stored_text() {
    assert_eq!(ItemKind::try_from("found".to_string()).unwrap(), ItemKind::Found);
    assert!(ItemKind::try_from("stolen".to_string()).is_err());
}

#[test]
fn test_otp_is_omitted_when_absent() {
    let hidden = OtpResponse {
        success: true,
        message: "OTP sent successfully".to_string(),
        otp: None,
    };
    let shown = OtpResponse {
        otp: Some("123456".to_string()),
        ..hidden.clone()
    };

    assert!(!serde_json::to_string(&hidden).unwrap().contains("otp\""));
    assert!(serde_json::to_string(&shown).unwrap().contains(r#""otp":"123456""#));
}

#[test]
fn test_user_summary_role_is_lowercase() {
    let summary = UserSummary {
        email: "a@x.edu".to_string(),
        role: Role::Student,
    };

    let json_output = serde_json::to_value(&summary).unwrap();
    assert_eq!(json_output["role"], "student");
}
