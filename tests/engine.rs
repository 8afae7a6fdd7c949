//! Engine-level scenarios: validation, authorization tiers and field
//! filtering wired together the way the actions drive them, without a live
//! store.

use serde_json::json;

use gallery_api::auth::access::AuthorizedAccess;
use gallery_api::auth::permission::{
    PermissionMatrix, PermissionParams, Permissions, UserGroup,
};
use gallery_api::model::models::{PHOTO, USER};
use gallery_api::model::{validation_info, Model};

fn registration_payload() -> serde_json::Value {
    json!({
        "username": "abc",
        "password": "Abcdef12",
        "email": "a@b.com",
        "gender": "m",
        "born": "1990-01-01",
    })
}

#[test]
fn registration_payload_is_valid() -> anyhow::Result<()> {
    let user = Model::from_json(&USER, &registration_payload())?;
    assert!(user.validate_all().is_empty());
    Ok(())
}

#[test]
fn validating_twice_reports_the_same_errors() {
    let user = Model::from_json(
        &USER,
        &json!({"username": "a".repeat(25), "email": "nope", "password": "weak"}),
    )
    .unwrap();
    let first = user.validate_all();
    let second = user.validate_all();
    assert_eq!(first, second);
    assert_eq!(validation_info(&first), validation_info(&second));
}

#[test]
fn bad_registration_reports_each_failing_field_once() {
    let user = Model::from_json(&USER, &json!({"username": "abc"})).unwrap();
    let errors = user.validate_all();
    let info = validation_info(&errors);
    // password and email are required and absent: exactly one error each
    assert_eq!(info["password"].as_array().unwrap().len(), 1);
    assert_eq!(info["email"].as_array().unwrap().len(), 1);
    assert!(info.get("username").is_none());
}

#[test]
fn json_round_trip() -> anyhow::Result<()> {
    let user = Model::from_json(&USER, &registration_payload())?;
    assert_eq!(Model::from_json(&USER, &user.to_json())?, user);
    Ok(())
}

// ---------------------------------------------------------------------------
// Authorization scenarios
// ---------------------------------------------------------------------------

fn read_all_matrix(group: UserGroup) -> PermissionMatrix {
    let mut matrix = PermissionMatrix::empty(&PHOTO);
    matrix.set_instance(group, Permissions::READ);
    for index in 0..PHOTO.len() {
        matrix.set_field(group, index, Permissions::READ);
    }
    matrix
}

fn photo_owned_by(owner: i64) -> Model {
    Model::from_json(
        &PHOTO,
        &json!({
            "id": 1,
            "title": "sunset",
            "category": "nature",
            "extension": ".jpg",
            "uploaded_by": owner,
            "is_private": 0,
        }),
    )
    .unwrap()
}

#[test]
fn removing_a_field_bit_removes_the_field_from_reads() {
    let viewer = PermissionParams { group: UserGroup::User, ..Default::default() };

    let full = read_all_matrix(UserGroup::User);
    let access =
        AuthorizedAccess::check_instance(Permissions::READ, viewer.clone(), full).unwrap();
    let mut photo = photo_owned_by(7);
    access.filter_fields(&mut photo).unwrap();
    assert!(photo.get("title").is_some());

    let mut narrowed = read_all_matrix(UserGroup::User);
    narrowed.set_field(UserGroup::User, PHOTO.field_index("title").unwrap(), Permissions::NONE);
    let access = AuthorizedAccess::check_instance(Permissions::READ, viewer, narrowed).unwrap();
    let mut photo = photo_owned_by(7);
    access.filter_fields(&mut photo).unwrap();
    assert!(photo.get("title").is_none());
    assert!(photo.get("category").is_some());
}

#[test]
fn granting_a_bit_never_reduces_visibility() {
    let viewer = PermissionParams { group: UserGroup::User, ..Default::default() };

    let base = read_all_matrix(UserGroup::User);
    let mut widened = read_all_matrix(UserGroup::User);
    for index in 0..PHOTO.len() {
        widened.set_field(UserGroup::User, index, Permissions::READ | Permissions::UPDATE);
    }

    let base_access =
        AuthorizedAccess::check_instance(Permissions::READ, viewer.clone(), base).unwrap();
    let widened_access =
        AuthorizedAccess::check_instance(Permissions::READ, viewer, widened).unwrap();

    let mut before = photo_owned_by(7);
    base_access.filter_fields(&mut before).unwrap();
    let mut after = photo_owned_by(7);
    widened_access.filter_fields(&mut after).unwrap();

    for name in PHOTO.field_names() {
        if before.get(name).is_some() {
            assert!(after.get(name).is_some(), "widening revoked {}", name);
        }
    }
}

#[test]
fn owner_override_unlocks_fields_without_group_bits() {
    // Group tier: instance READ but zero field bits. Owner tier: full READ.
    let mut matrix = PermissionMatrix::empty(&PHOTO);
    matrix.set_instance(UserGroup::User, Permissions::READ);
    matrix.set_instance(UserGroup::Owner, Permissions::READ);
    for index in 0..PHOTO.len() {
        matrix.set_field(UserGroup::Owner, index, Permissions::ALL);
    }

    let caller = PermissionParams {
        group: UserGroup::User,
        user_id: Some(7),
        owner_field: Some("uploaded_by"),
    };
    let access = AuthorizedAccess::check_instance(Permissions::READ, caller, matrix).unwrap();

    let mut own = photo_owned_by(7);
    access.filter_fields(&mut own).unwrap();
    assert!(own.get("title").is_some());

    let mut foreign = photo_owned_by(9);
    let err = access.filter_fields(&mut foreign).err().unwrap();
    assert_eq!(err.error_id(), "UnauthorizedError");
}

#[test]
fn non_owner_with_zero_instance_bits_is_rejected() {
    // Spec scenario: photo owned by user 7, viewed by user 9 whose group has
    // no instance-level READ; the owner row alone cannot help a non-owner.
    let mut matrix = PermissionMatrix::empty(&PHOTO);
    matrix.set_instance(UserGroup::Owner, Permissions::READ);
    for index in 0..PHOTO.len() {
        matrix.set_field(UserGroup::Owner, index, Permissions::ALL);
    }

    let caller = PermissionParams {
        group: UserGroup::Guest,
        user_id: Some(9),
        owner_field: Some("uploaded_by"),
    };
    // Instance check passes through the owner tier...
    let access = AuthorizedAccess::check_instance(Permissions::READ, caller, matrix).unwrap();

    // ...but a record the caller does not own has every field filtered.
    let mut photo = photo_owned_by(7);
    let err = access.filter_fields(&mut photo).err().unwrap();
    assert_eq!(err.error_id(), "UnauthorizedError");
    assert_eq!(err.to_json()["info"]["required_permissions"], "-R--");
}

#[test]
fn forbidden_field_is_dropped_before_update() {
    // Caller's group may update usernames but not permission_group.
    let mut matrix = PermissionMatrix::empty(&USER);
    matrix.set_instance(UserGroup::User, Permissions::UPDATE);
    matrix.set_field(UserGroup::User, USER.field_index("username").unwrap(), Permissions::UPDATE);

    let caller = PermissionParams { group: UserGroup::User, ..Default::default() };
    let access =
        AuthorizedAccess::check_instance(Permissions::UPDATE, caller, matrix).unwrap();

    // Both fields submitted: the forbidden one is silently dropped.
    let mut both =
        Model::from_json(&USER, &json!({"username": "new_name", "permission_group": 4})).unwrap();
    access.filter_fields(&mut both).unwrap();
    assert!(both.get("username").is_some());
    assert!(both.get("permission_group").is_none());

    // Only the forbidden field submitted: nothing remains settable.
    let mut only_forbidden =
        Model::from_json(&USER, &json!({"permission_group": 4})).unwrap();
    access.filter_fields(&mut only_forbidden).unwrap();
    assert!(!only_forbidden.has_values());
}
