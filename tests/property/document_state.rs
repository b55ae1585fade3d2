//! Document state invariants under arbitrary store reports

use proptest::prelude::*;
use rulekeeper::document::{Document, DocumentState, RemoteFile, RemoteFileState};

fn remote_state() -> impl Strategy<Value = RemoteFileState> {
    prop_oneof![
        Just(RemoteFileState::StateUnspecified),
        Just(RemoteFileState::Processing),
        Just(RemoteFileState::Active),
        Just(RemoteFileState::Failed),
    ]
}

fn report() -> impl Strategy<Value = RemoteFile> {
    (remote_state(), proptest::option::of("[a-z]{0,8}")).prop_map(|(state, uri)| RemoteFile {
        name: "files/doc".to_string(),
        uri: uri.map(|u| if u.is_empty() { u } else { format!("https://store.test/{}", u) }),
        state,
        ..Default::default()
    })
}

/// A document has a URI exactly when it is Active, whatever the store reports
#[test]
fn test_uri_present_iff_active() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&proptest::collection::vec(report(), 0..12), |reports| {
            let mut doc = Document::pending("documents/manual.pdf", "application/pdf", None);
            doc.acknowledge("files/doc");
            for file in &reports {
                doc.observe(file);
                prop_assert_eq!(doc.state() == DocumentState::Active, doc.uri().is_some());
            }
            Ok(())
        })
        .unwrap();
}

/// Once a document reaches Active or Failed no later report changes it
#[test]
fn test_terminal_states_are_sticky() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(report(), proptest::collection::vec(report(), 1..8)),
            |(first, rest)| {
                let mut doc = Document::pending("documents/manual.pdf", "application/pdf", None);
                doc.acknowledge("files/doc");
                doc.observe(&first);
                prop_assume!(doc.state().is_terminal());

                let settled = (doc.state(), doc.uri().map(str::to_string));
                for file in &rest {
                    doc.observe(file);
                }
                prop_assert_eq!((doc.state(), doc.uri().map(str::to_string)), settled);
                Ok(())
            },
        )
        .unwrap();
}
