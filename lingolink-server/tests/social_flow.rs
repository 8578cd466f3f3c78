//! Friend-graph flows against a real (temp-dir) store: request lifecycle,
//! friend-set symmetry, and recommendation filtering.

use lingolink_common::{RequestStatus, UserId};
use lingolink_server::error::ApiError;
use lingolink_server::friends;
use lingolink_server::store::{Store, UserDoc};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Store {
    Store::open(dir.path().join("db")).unwrap()
}

fn seed_user(store: &Store, name: &str) -> UserId {
    let mut user = UserDoc::new(
        name.to_owned(),
        format!("{name}@example.com"),
        "not-a-real-hash".to_owned(),
        "https://avatar.example/1.png".to_owned(),
    );
    user.is_onboarded = true;
    store.create_user(&user).unwrap();
    user.id
}

fn recommended_ids(store: &Store, caller: UserId) -> Vec<UserId> {
    friends::recommended_users(store, caller)
        .unwrap()
        .into_iter()
        .map(|profile| profile.id)
        .collect()
}

#[test]
fn send_and_accept_makes_friendship_symmetric() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");
    let badri = seed_user(&store, "badri");

    assert!(friends::friends_of(&store, anna).unwrap().is_empty());

    let request = friends::send_request(&store, anna, badri).unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.sender, anna);
    assert_eq!(request.recipient, badri);

    let outgoing = friends::outgoing_requests(&store, anna).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].id, request.id);
    assert_eq!(outgoing[0].recipient.id, badri);

    let incoming = friends::incoming_requests(&store, badri).unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].id, request.id);
    assert_eq!(incoming[0].sender.id, anna);
    assert_eq!(incoming[0].sender.full_name, "anna");

    // a pending request already hides the pair from each other
    assert!(!recommended_ids(&store, anna).contains(&badri));
    assert!(!recommended_ids(&store, badri).contains(&anna));

    let accepted = friends::accept_request(&store, badri, request.id).unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);

    let anna_friends = friends::friends_of(&store, anna).unwrap();
    let badri_friends = friends::friends_of(&store, badri).unwrap();
    assert_eq!(anna_friends.len(), 1);
    assert_eq!(anna_friends[0].id, badri);
    assert_eq!(badri_friends.len(), 1);
    assert_eq!(badri_friends[0].id, anna);

    // pending listings drain, the accepted request shows up as history
    assert!(friends::outgoing_requests(&store, anna).unwrap().is_empty());
    assert!(friends::incoming_requests(&store, badri).unwrap().is_empty());
    let history = friends::accepted_sent_requests(&store, anna).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].recipient.id, badri);

    // now excluded via the friend check instead
    assert!(!recommended_ids(&store, anna).contains(&badri));
}

#[test]
fn cannot_send_request_to_yourself() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");

    let err = friends::send_request(&store, anna, anna).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[test]
fn unknown_recipient_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");

    let err = friends::send_request(&store, anna, UserId::new()).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn duplicate_requests_conflict_in_both_directions() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");
    let badri = seed_user(&store, "badri");

    let request = friends::send_request(&store, anna, badri).unwrap();

    let err = friends::send_request(&store, anna, badri).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    let err = friends::send_request(&store, badri, anna).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // requests are sticky: acceptance does not reopen the pair
    friends::accept_request(&store, badri, request.id).unwrap();
    let err = friends::send_request(&store, anna, badri).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[test]
fn only_the_recipient_may_accept() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");
    let badri = seed_user(&store, "badri");
    let chidi = seed_user(&store, "chidi");

    let request = friends::send_request(&store, anna, badri).unwrap();

    let err = friends::accept_request(&store, anna, request.id).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = friends::accept_request(&store, chidi, request.id).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = friends::accept_request(&store, badri, lingolink_common::RequestId::new()).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn repeat_accept_conflicts_and_leaves_friend_sets_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");
    let badri = seed_user(&store, "badri");

    let request = friends::send_request(&store, anna, badri).unwrap();
    friends::accept_request(&store, badri, request.id).unwrap();

    let err = friends::accept_request(&store, badri, request.id).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    assert_eq!(friends::friends_of(&store, anna).unwrap().len(), 1);
    assert_eq!(friends::friends_of(&store, badri).unwrap().len(), 1);
}

#[test]
fn existing_friendship_blocks_new_requests() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");
    let badri = seed_user(&store, "badri");

    // friendship written directly, with no ledger record behind it
    store
        .update_user(&anna, |user| {
            user.friends.insert(badri);
            Ok(())
        })
        .unwrap();
    store
        .update_user(&badri, |user| {
            user.friends.insert(anna);
            Ok(())
        })
        .unwrap();

    let err = friends::send_request(&store, anna, badri).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[test]
fn reconcile_repairs_a_partially_applied_accept() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let anna = seed_user(&store, "anna");
    let badri = seed_user(&store, "badri");

    let request = friends::send_request(&store, anna, badri).unwrap();
    // ledger says accepted, but neither friend-set write happened
    store
        .update_request(&request.id, |request| {
            request.status = RequestStatus::Accepted;
            Ok(())
        })
        .unwrap();
    assert!(friends::friends_of(&store, anna).unwrap().is_empty());

    assert_eq!(friends::reconcile_friend_sets(&store).unwrap(), 2);
    assert_eq!(friends::friends_of(&store, anna).unwrap()[0].id, badri);
    assert_eq!(friends::friends_of(&store, badri).unwrap()[0].id, anna);

    // a second sweep finds nothing to do
    assert_eq!(friends::reconcile_friend_sets(&store).unwrap(), 0);
}

#[test]
fn recommendations_exclude_connected_and_pending_users() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let me = seed_user(&store, "me");
    let friend = seed_user(&store, "friend");
    let invited_me = seed_user(&store, "dara");
    let invited_by_me = seed_user(&store, "emre");
    let fresh_a = seed_user(&store, "farah");
    let fresh_b = seed_user(&store, "goro");

    let mut lurker = UserDoc::new(
        "lurker".to_owned(),
        "lurker@example.com".to_owned(),
        "not-a-real-hash".to_owned(),
        "https://avatar.example/2.png".to_owned(),
    );
    lurker.is_onboarded = false;
    store.create_user(&lurker).unwrap();

    let request = friends::send_request(&store, me, friend).unwrap();
    friends::accept_request(&store, friend, request.id).unwrap();
    friends::send_request(&store, invited_me, me).unwrap();
    friends::send_request(&store, me, invited_by_me).unwrap();

    let mut expected = vec![fresh_a, fresh_b];
    expected.sort();
    assert_eq!(recommended_ids(&store, me), expected);

    // deterministic for a fixed store state
    assert_eq!(recommended_ids(&store, me), recommended_ids(&store, me));
}
