// SPDX-License-Identifier: MIT OR Apache-2.0
use std::sync::Arc;
use std::thread;

use relay_envelope::{Budget, Envelope};
use relay_maildir::MaildirStore;

#[test]
fn exactly_one_thread_wins_a_concurrent_claim() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = MaildirStore::new(dir.path());
    let mailbox = Arc::new(store.create_mailbox("endpoint-hash").unwrap());

    let envelope = Envelope::new(
        "relay.agent.s1",
        "relay.human.cli",
        None,
        serde_json::json!("hi"),
        Budget::fresh(),
    );
    let filename = mailbox.deliver(&envelope).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mailbox = Arc::clone(&mailbox);
            let filename = filename.clone();
            thread::spawn(move || mailbox.claim(&filename).is_ok())
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(wins, 1, "exactly one concurrent claimer should succeed");
    assert!(mailbox.list_cur().unwrap().contains(&filename));
}

#[test]
fn rebuild_from_filesystem_is_order_independent() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = MaildirStore::new(dir.path());
    let mailbox = store.create_mailbox("endpoint-hash").unwrap();

    let mut filenames = Vec::new();
    for i in 0..10 {
        let envelope = Envelope::new(
            "relay.agent.s1",
            "relay.human.cli",
            None,
            serde_json::json!(i),
            Budget::fresh(),
        );
        filenames.push(mailbox.deliver(&envelope).unwrap());
    }

    let mut expected = filenames.clone();
    expected.sort();
    assert_eq!(mailbox.list_new().unwrap(), expected);

    for filename in &filenames[..5] {
        mailbox.claim(filename).unwrap();
    }
    let mut remaining_new = filenames[5..].to_vec();
    remaining_new.sort();
    assert_eq!(mailbox.list_new().unwrap(), remaining_new);

    let mut claimed = filenames[..5].to_vec();
    claimed.sort();
    assert_eq!(mailbox.list_cur().unwrap(), claimed);
}
