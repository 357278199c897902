use poolctl::credentials::{CredentialStore, LeaderSettings, SettingsFile, Userlist, USERLIST_KEY};
use tempfile::TempDir;

#[test]
fn leader_and_follower_share_settings_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lib/leader.json");
    let leader_settings = SettingsFile::new(&path);
    let follower_settings = SettingsFile::new(&path);
    let leader = CredentialStore::new(&leader_settings, true);
    let follower = CredentialStore::new(&follower_settings, false);

    assert!(follower.get_or_create("db_2_psql").unwrap().is_none());
    assert!(follower.raw_userlist().unwrap().is_none());

    let created = leader.get_or_create("db_2_psql").unwrap().unwrap();
    let seen = follower.get_or_create("db_2_psql").unwrap().unwrap();
    assert_eq!(created, seen);
}

#[test]
fn passwords_are_never_rotated() {
    let dir = TempDir::new().unwrap();
    let settings = SettingsFile::new(dir.path().join("leader.json"));
    let store = CredentialStore::new(&settings, true);

    let first = store.get_or_create("postgres").unwrap().unwrap();
    store.get_or_create("nagios").unwrap();
    let again = store.get_or_create("postgres").unwrap().unwrap();

    assert_eq!(first, again);
    assert_eq!(store.userlist().unwrap().len(), 2);
}

#[test]
fn stored_userlist_is_pgbouncer_auth_file_format() {
    let dir = TempDir::new().unwrap();
    let settings = SettingsFile::new(dir.path().join("leader.json"));
    settings
        .set(USERLIST_KEY, "\"old\" \"pa\"\"ss\"\n")
        .unwrap();
    let store = CredentialStore::new(&settings, true);

    store.get_or_create("new").unwrap();

    let text = store.raw_userlist().unwrap().unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("\"new\" \""));
    assert_eq!(lines.next(), Some("\"old\" \"pa\"\"ss\""));
    assert_eq!(
        Userlist::parse(&text).unwrap().get("old").unwrap().expose(),
        "pa\"ss"
    );
}

#[test]
fn malformed_userlist_is_an_error() {
    let dir = TempDir::new().unwrap();
    let settings = SettingsFile::new(dir.path().join("leader.json"));
    settings.set(USERLIST_KEY, "\"only-one-field\"\n").unwrap();
    let store = CredentialStore::new(&settings, true);

    assert!(store.get_or_create("x").is_err());
}
