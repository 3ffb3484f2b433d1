//! End-to-end behavior of searches and rules against the in-memory server.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::io::Write;

use mailsift_core::search::resolve;
use mailsift_core::session::{Connector, StoredMessage};
use mailsift_core::{
    Account, MemoryServer, MergeMode, Outcome, PostFilter, Predicate, SearchSpec,
};
use mailsift_imap::{Capability, Uid};
use proptest::prelude::*;

async fn resolve_inbox(server: &MemoryServer, spec: &SearchSpec, mode: MergeMode) -> Vec<u32> {
    let mut session = server.connect().await.unwrap();
    resolve(&mut session, "INBOX", spec, mode)
        .await
        .unwrap()
        .into_iter()
        .map(Uid::get)
        .collect()
}

fn mixed_inbox() -> MemoryServer {
    let server = MemoryServer::new();
    server.deliver("INBOX", StoredMessage::new("a@x.com", "invoice March"));
    server.deliver("INBOX", StoredMessage::new("a@x.com", "hi").answered());
    server.deliver("INBOX", StoredMessage::new("b@y.com", "invoice April").seen());
    server.deliver(
        "INBOX",
        StoredMessage::new("c@z.com", "scan").attachment("scan.pdf", 900),
    );
    server
}

fn spam_inbox() -> MemoryServer {
    let server = MemoryServer::new();
    for subject in ["one", "two", "three"] {
        server.deliver("INBOX", StoredMessage::new("spam@bad.com", subject));
    }
    server.deliver("INBOX", StoredMessage::new("mom@home.net", "dinner"));
    server.deliver("INBOX", StoredMessage::new("boss@work.com", "status"));
    server
}

fn rule_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn empty_specification_with_and_is_the_whole_folder() {
    let server = mixed_inbox();
    assert_eq!(
        resolve_inbox(&server, &SearchSpec::new(), MergeMode::And).await,
        [1, 2, 3, 4]
    );
}

#[tokio::test]
async fn unread_only_uses_a_single_unseen_search() {
    let server = mixed_inbox();
    let spec = SearchSpec::new().with_unread(true);
    assert_eq!(resolve_inbox(&server, &spec, MergeMode::And).await, [1, 2, 4]);
    let searches: Vec<String> = server
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("UID SEARCH"))
        .collect();
    assert_eq!(searches, ["UID SEARCH UNSEEN"]);
}

#[tokio::test]
async fn not_replied_is_the_unanswered_set() {
    let server = mixed_inbox();
    let spec = SearchSpec::new().with(Predicate::NotReplied);
    assert_eq!(resolve_inbox(&server, &spec, MergeMode::And).await, [1, 3, 4]);
    assert!(!server.commands().iter().any(|c| c.contains("BODYSTRUCTURE")));
}

#[tokio::test]
async fn sender_and_subject_intersect_or_union() {
    let server = mixed_inbox();
    let spec = SearchSpec::new()
        .with_senders(["a@x.com"])
        .unwrap()
        .with(Predicate::Subject("invoice".to_string()));
    assert_eq!(resolve_inbox(&server, &spec, MergeMode::And).await, [1]);
    assert_eq!(resolve_inbox(&server, &spec, MergeMode::Or).await, [1, 2, 3]);
}

#[tokio::test]
async fn repeated_no_attachments_filter_is_idempotent() {
    let server = mixed_inbox();
    let once = SearchSpec::new().with_post_filter(PostFilter::NoAttachments);
    let twice = once.clone().with_post_filter(PostFilter::NoAttachments);
    assert_eq!(
        resolve_inbox(&server, &once, MergeMode::And).await,
        resolve_inbox(&server, &twice, MergeMode::And).await
    );
}

#[tokio::test(start_paused = true)]
async fn spam_rule_creates_junk_and_moves_only_matches() {
    let server = spam_inbox();
    let rules = rule_file("[[rule]]\nsenders = \"spam@bad.com\"\nmove = \"Junk\"\n");
    let mut account = Account::new("home", server.clone())
        .with_rule_files(vec![rules.path().to_path_buf()]);

    let reports = account.process_rules(false).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].outcome, Outcome::Acted(_)));
    let junk: Vec<String> = server
        .messages("Junk")
        .values()
        .map(|m| m.subject().to_string())
        .collect();
    assert_eq!(junk, ["one", "two", "three"]);
    let inbox: BTreeSet<String> = server
        .messages("INBOX")
        .values()
        .map(|m| m.from_address().to_string())
        .collect();
    assert_eq!(
        inbox,
        ["boss@work.com".to_string(), "mom@home.net".to_string()].into()
    );
    assert_eq!(server.sessions_opened(), server.sessions_closed());
}

#[tokio::test]
async fn spam_rule_in_dry_run_only_reports() {
    let server = spam_inbox();
    let rules = rule_file("[[rule]]\nsenders = \"spam@bad.com\"\nmove = \"Junk\"\n");
    let mut account = Account::new("home", server.clone())
        .with_rule_files(vec![rules.path().to_path_buf()]);

    let reports = account.process_rules(true).await.unwrap();

    assert!(reports[0].to_string().contains("would move 3 messages"));
    assert!(!server.folder_names().contains(&"Junk".to_string()));
    assert_eq!(server.messages("INBOX").len(), 5);
}

#[tokio::test(start_paused = true)]
async fn emulated_move_matches_native_move() {
    let native = spam_inbox();
    let emulated = spam_inbox();
    emulated.set_capabilities(vec![Capability::Imap4Rev1, Capability::UidPlus]);
    let rules = rule_file("[[rule]]\nsenders = \"spam@bad.com\"\nmove = \"Junk\"\n");

    for server in [&native, &emulated] {
        Account::new("home", server.clone())
            .with_rule_files(vec![rules.path().to_path_buf()])
            .process_rules(false)
            .await
            .unwrap();
    }

    let subjects = |server: &MemoryServer, folder: &str| -> Vec<String> {
        server
            .messages(folder)
            .values()
            .map(|m| m.subject().to_string())
            .collect()
    };
    assert_eq!(subjects(&native, "INBOX"), subjects(&emulated, "INBOX"));
    assert_eq!(subjects(&native, "Junk"), subjects(&emulated, "Junk"));
    assert!(emulated.commands().iter().any(|c| c.starts_with("UID COPY")));
    assert!(!emulated.commands().iter().any(|c| c.starts_with("UID MOVE")));
}

#[tokio::test(start_paused = true)]
async fn move_and_delete_both_act_on_the_matched_set() {
    let server = spam_inbox();
    let rules = rule_file("[[rule]]\nsenders = \"spam@bad.com\"\nmove = \"Junk\"\ndelete = true\n");
    let reports = Account::new("home", server.clone())
        .with_rule_files(vec![rules.path().to_path_buf()])
        .process_rules(false)
        .await
        .unwrap();

    let Outcome::Acted(actions) = &reports[0].outcome else {
        panic!("rule should have acted");
    };
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| a.count == 3));
    assert_eq!(server.messages("Junk").len(), 3);
    assert_eq!(server.messages("INBOX").len(), 2);
}

#[tokio::test]
async fn skipped_rule_does_not_touch_the_server_state() {
    let server = spam_inbox();
    let rules = rule_file("[[rule]]\nsubject = \"lottery\"\ndelete = true\n");
    let reports = Account::new("home", server.clone())
        .with_rule_files(vec![rules.path().to_path_buf()])
        .process_rules(false)
        .await
        .unwrap();
    assert_eq!(reports[0].outcome, Outcome::Skipped);
    assert_eq!(server.messages("INBOX").len(), 5);
}

fn subject_for(i: usize) -> String {
    ["alpha", "beta", "gamma"][i % 3].to_string()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn single_predicate_ignores_merge_mode(
        senders in prop::collection::vec(0usize..4, 1..12),
        wanted in 0usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let server = MemoryServer::new();
        for (i, sender) in senders.iter().enumerate() {
            server.deliver(
                "INBOX",
                StoredMessage::new(&format!("user{sender}@example.com"), &subject_for(i)),
            );
        }
        let spec = SearchSpec::new()
            .with_senders([format!("user{wanted}@example.com")])
            .unwrap();

        let and = runtime.block_on(resolve_inbox(&server, &spec, MergeMode::And));
        let or = runtime.block_on(resolve_inbox(&server, &spec, MergeMode::Or));
        prop_assert_eq!(&and, &or);

        let expected: Vec<u32> = senders
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == wanted)
            .map(|(i, _)| u32::try_from(i + 1).unwrap())
            .collect();
        prop_assert_eq!(and, expected);
    }

    #[test]
    fn and_is_a_subset_of_or(
        senders in prop::collection::vec(0usize..3, 1..12),
        subject in 0usize..3,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let server = MemoryServer::new();
        for (i, sender) in senders.iter().enumerate() {
            server.deliver(
                "INBOX",
                StoredMessage::new(&format!("user{sender}@example.com"), &subject_for(i)),
            );
        }
        let spec = SearchSpec::new()
            .with_senders(["user0@example.com"])
            .unwrap()
            .with(Predicate::Subject(subject_for(subject)));

        let and: BTreeSet<u32> = runtime
            .block_on(resolve_inbox(&server, &spec, MergeMode::And))
            .into_iter()
            .collect();
        let or: BTreeSet<u32> = runtime
            .block_on(resolve_inbox(&server, &spec, MergeMode::Or))
            .into_iter()
            .collect();
        prop_assert!(and.is_subset(&or));
    }
}
