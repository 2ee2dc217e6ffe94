// SPDX-License-Identifier: MIT OR Apache-2.0
use relay_envelope::{Budget, Envelope};
use relay_index::SqliteIndex;
use relay_maildir::MaildirStore;

#[test]
fn rebuild_is_idempotent_over_identical_maildir_state() {
    let dir = tempfile::TempDir::new().unwrap();
    let maildir = MaildirStore::new(dir.path());
    let mailbox = maildir.create_mailbox("hash-a").unwrap();

    for i in 0..4 {
        let envelope = Envelope::new(
            "relay.agent.a",
            "relay.human.cli",
            None,
            serde_json::json!(i),
            Budget::fresh(),
        );
        mailbox.deliver(&envelope).unwrap();
    }

    let index = SqliteIndex::open_in_memory().unwrap();
    let hashes = maildir.list_endpoint_hashes().unwrap();

    let first = index.rebuild(&maildir, &hashes).unwrap();
    let first_rows = index.get_by_endpoint("hash-a").unwrap();

    let second = index.rebuild(&maildir, &hashes).unwrap();
    let second_rows = index.get_by_endpoint("hash-a").unwrap();

    assert_eq!(first, 4);
    assert_eq!(first, second);
    assert_eq!(first_rows.len(), second_rows.len());

    let mut first_ids: Vec<_> = first_rows.iter().map(|m| m.id.clone()).collect();
    let mut second_ids: Vec<_> = second_rows.iter().map(|m| m.id.clone()).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn rebuild_uses_maildir_filename_not_envelope_id_as_row_id() {
    let dir = tempfile::TempDir::new().unwrap();
    let maildir = MaildirStore::new(dir.path());
    let mailbox_a = maildir.create_mailbox("hash-a").unwrap();
    let mailbox_b = maildir.create_mailbox("hash-b").unwrap();

    let envelope = Envelope::new(
        "relay.agent.>",
        "relay.human.cli",
        None,
        serde_json::json!("fan out"),
        Budget::fresh(),
    );
    let filename_a = mailbox_a.deliver(&envelope).unwrap();
    let filename_b = mailbox_b.deliver(&envelope).unwrap();
    assert_ne!(filename_a, filename_b);

    let index = SqliteIndex::open_in_memory().unwrap();
    let hashes = maildir.list_endpoint_hashes().unwrap();
    index.rebuild(&maildir, &hashes).unwrap();

    let row_a = index.get_message(&filename_a).unwrap().unwrap();
    let row_b = index.get_message(&filename_b).unwrap().unwrap();
    assert_eq!(row_a.id, filename_a);
    assert_eq!(row_b.id, filename_b);
    assert_ne!(row_a.id, row_b.id);
}
