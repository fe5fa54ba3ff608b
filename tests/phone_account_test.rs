//! End-to-end phone channel and device-account scenarios: idempotent
//! creation, cookie rotation, and the device-account upgrade path.

use std::sync::Arc;

use identity_core::config::SessionSettings;
use identity_core::models::{
    AccountPassword, AccountUsername, Identity, PhoneNumber, SchemaId,
};
use identity_core::services::{AccountAuthService, PhoneAuthService};
use identity_core::store::{IdentityStore, MemoryIdentityStore};
use identity_core::{AuthError, SessionIssuer};

struct Harness {
    store: Arc<MemoryIdentityStore>,
    sessions: Arc<SessionIssuer>,
    phone: PhoneAuthService,
    account: AccountAuthService,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(MemoryIdentityStore::new());
    let sessions = Arc::new(SessionIssuer::new(&SessionSettings::default()));
    let phone = PhoneAuthService::new(store.clone(), sessions.clone());
    let account = AccountAuthService::new(store.clone(), sessions.clone());
    Harness {
        store,
        sessions,
        phone,
        account,
    }
}

fn number() -> PhoneNumber {
    PhoneNumber::new("+14155551234")
}

#[tokio::test]
async fn create_is_idempotent_and_login_follows() {
    let harness = harness();

    assert_eq!(
        harness.phone.login_token(&number()).await,
        Err(AuthError::IdentityNotFound)
    );

    let first = harness
        .phone
        .create_identity_with_session(&number(), None)
        .await
        .expect("create");
    let second = harness
        .phone
        .create_identity_with_session(&number(), None)
        .await
        .expect("repeat create");
    assert_eq!(first.user_id, second.user_id);
    assert_ne!(first.auth_token, second.auth_token);

    let login = harness.phone.login_token(&number()).await.expect("login");
    assert_eq!(login.user_id, first.user_id);
}

#[tokio::test]
async fn cookie_sessions_rotate_per_identity() {
    let harness = harness();

    let first = harness
        .phone
        .create_identity_with_cookie(&number())
        .await
        .expect("create");
    assert_eq!(first.cookies_to_send.len(), 1);
    let old_cookie = first.cookies_to_send[0].clone();

    let second = harness
        .phone
        .login_cookie(&number())
        .await
        .expect("cookie login");
    assert_eq!(second.cookies_to_send.len(), 2);
    assert_eq!(second.cookies_to_send[0], old_cookie);

    assert!(harness.sessions.session_for_cookie(&old_cookie).is_none());
    let live = &second.cookies_to_send[1];
    assert!(harness.sessions.session_for_cookie(live).is_some());

    harness.phone.logout_cookie(live).await.expect("logout");
    harness
        .phone
        .logout_cookie(live)
        .await
        .expect("logout is idempotent");
    assert!(harness.sessions.session_for_cookie(live).is_none());
}

#[tokio::test]
async fn update_phone_rejects_a_number_bound_elsewhere() {
    let harness = harness();

    let first = harness
        .phone
        .create_identity_no_session(&number())
        .await
        .expect("first identity");
    let other = PhoneNumber::new("+442071838750");
    harness
        .phone
        .create_identity_no_session(&other)
        .await
        .expect("second identity");

    assert_eq!(
        harness.phone.update_phone(&first, &other).await,
        Err(AuthError::PhoneAlreadyInUse)
    );

    let fresh = PhoneNumber::new("+33612345678");
    let updated = harness
        .phone
        .update_phone(&first, &fresh)
        .await
        .expect("update");
    assert_eq!(updated.phone(), Some(&fresh));
    assert!(harness
        .store
        .find_by_phone(&number())
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn device_account_upgrades_to_phone_identity_in_place() {
    let harness = harness();
    let username = AccountUsername::new("device_9f8e7d6c");
    let password = AccountPassword::new("generated-device-secret");

    let created = harness
        .account
        .create_identity_with_session(&username, &password)
        .await
        .expect("create account");
    assert!(created.new_entity);
    let user_id = created.token.user_id.expect("user id");

    // Not a channel identity until upgraded
    assert_eq!(
        harness.store.get(&user_id).await,
        Err(AuthError::IdentityNotFound)
    );

    let identity = harness
        .account
        .upgrade_to_phone_schema(&user_id, &number())
        .await
        .expect("upgrade");
    assert_eq!(*identity.id(), user_id);
    assert_eq!(identity.schema(), SchemaId::PhoneNoPassword);
    assert!(matches!(identity, Identity::Phone(_)));

    // The username no longer authenticates and the phone channel does
    assert_eq!(
        harness
            .account
            .create_identity_with_session(&username, &password)
            .await
            .map(|r| r.new_entity),
        Ok(true)
    );
    let login = harness.phone.login_token(&number()).await.expect("login");
    assert_eq!(login.user_id, Some(user_id));
}

#[tokio::test]
async fn upgrade_conflict_keeps_the_account_intact() {
    let harness = harness();
    harness
        .phone
        .create_identity_no_session(&number())
        .await
        .expect("occupy number");

    let username = AccountUsername::new("device_9f8e7d6c");
    let password = AccountPassword::new("generated-device-secret");
    let created = harness
        .account
        .create_identity_with_session(&username, &password)
        .await
        .expect("create account");
    let user_id = created.token.user_id.expect("user id");

    assert_eq!(
        harness
            .account
            .upgrade_to_phone_schema(&user_id, &number())
            .await,
        Err(AuthError::ChannelUpgradeConflict)
    );

    // Failed upgrade leaves the account usable
    let again = harness
        .account
        .create_identity_with_session(&username, &password)
        .await
        .expect("login after failed upgrade");
    assert!(!again.new_entity);
    assert_eq!(again.token.user_id, Some(user_id));
}

#[tokio::test]
async fn update_identity_from_device_account_covers_both_paths() {
    let harness = harness();

    // Path 1: a device account gets promoted
    let created = harness
        .account
        .create_identity_with_session(
            &AccountUsername::new("device_abc123"),
            &AccountPassword::new("pw-pw-pw"),
        )
        .await
        .expect("create account");
    let account_user = created.token.user_id.expect("user id");
    let promoted = harness
        .phone
        .update_identity_from_device_account(&number(), &account_user)
        .await
        .expect("promote");
    assert_eq!(*promoted.id(), account_user);

    // Path 2: an identity already bound to the number is confirmed as-is
    let confirmed = harness
        .phone
        .update_identity_from_device_account(&number(), &account_user)
        .await
        .expect("confirm");
    assert_eq!(confirmed, promoted);

    // A different number on an already-phone-bound identity conflicts
    assert_eq!(
        harness
            .phone
            .update_identity_from_device_account(
                &PhoneNumber::new("+442071838750"),
                &account_user
            )
            .await,
        Err(AuthError::ChannelUpgradeConflict)
    );
}
