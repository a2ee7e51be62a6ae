use std::sync::{Arc, Mutex};

use note_publisher_core::config::PublishSettings;
use note_publisher_core::contract::{
    Document, Lookup, MockDocumentStore, MockRemoteStore, RemoteCoordinates, RemoteError,
    VersionToken, WriteRequest,
};
use note_publisher_core::fingerprint::fingerprint;
use note_publisher_core::ledger::{Ledger, PublishRecord};
use note_publisher_core::publish::{PublishError, PublishOutcome, Publisher};

const NOTE: &str = "---\nshare: true\n---\nBody\n";

fn coordinates() -> RemoteCoordinates {
    RemoteCoordinates {
        owner: "alice".into(),
        repo: "garden".into(),
        branch: Some("main".into()),
    }
}

fn remote_with_coordinates() -> MockRemoteStore {
    let mut remote = MockRemoteStore::new();
    remote.expect_coordinates().returning(coordinates);
    remote
}

fn store_with(found: &'static [&'static str], content: &'static str) -> MockDocumentStore {
    let mut store = MockDocumentStore::new();
    store.expect_lookup().returning(move |path: &str| {
        if found.contains(&path) {
            Lookup::Found(Document::from_path(path))
        } else {
            Lookup::NotFound
        }
    });
    store
        .expect_read_text()
        .returning(move |_| Ok(content.to_string()));
    store
}

#[tokio::test]
async fn incomplete_coordinates_fail_before_any_remote_call() {
    let mut remote = MockRemoteStore::new();
    remote.expect_coordinates().returning(|| RemoteCoordinates {
        owner: String::new(),
        repo: "garden".into(),
        branch: None,
    });
    remote.expect_get_existing().never();
    remote.expect_create_or_update().never();

    let result = Publisher::new(remote, MockDocumentStore::new(), PublishSettings::default());
    assert!(matches!(result, Err(PublishError::Config(_))));
}

#[tokio::test]
async fn conflict_surfaces_and_keeps_previous_ledger_entry() {
    let mut remote = remote_with_coordinates();
    remote
        .expect_get_existing()
        .returning(|_| Ok(Some(VersionToken("stale".into()))));
    remote
        .expect_create_or_update()
        .times(1)
        .returning(|_| Err(RemoteError::Conflict("sha does not match".into())));
    let store = store_with(&["Idea.md"], NOTE);
    let publisher = Publisher::new(remote, store, PublishSettings::default()).unwrap();

    let mut ledger = Ledger::new();
    let previous = PublishRecord::new("1", "notes/Idea.md");
    ledger.upsert("Idea.md", previous.clone());

    let err = publisher
        .publish_document("Idea.md", &mut ledger)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Remote(RemoteError::Conflict(_))));
    assert_eq!(ledger.get("Idea.md"), Some(&previous));
}

#[tokio::test]
async fn failed_retirement_does_not_block_publish() {
    let mut remote = remote_with_coordinates();
    remote.expect_get_existing().returning(|path: &str| {
        if path == "notes/Old.md" {
            Ok(Some(VersionToken("old-sha".into())))
        } else {
            Ok(None)
        }
    });
    remote
        .expect_delete()
        .times(1)
        .returning(|_, _, _| Err(RemoteError::Http {
            status: 500,
            message: "boom".into(),
        }));
    remote
        .expect_create_or_update()
        .times(1)
        .returning(|request: WriteRequest| {
            assert_eq!(request.path, "notes/New.md");
            assert_eq!(request.token, None);
            Ok(VersionToken("new-sha".into()))
        });
    let store = store_with(&["New.md"], NOTE);
    let publisher = Publisher::new(remote, store, PublishSettings::default()).unwrap();

    let mut ledger = Ledger::new();
    ledger.upsert("Old.md", PublishRecord::new(fingerprint(NOTE), "notes/Old.md"));

    let outcome = publisher
        .publish_document("New.md", &mut ledger)
        .await
        .unwrap();

    match outcome {
        PublishOutcome::Published(report) => assert_eq!(report.retired, None),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(ledger.contains("Old.md"), "entry kept for a later retry");
    assert!(ledger.contains("New.md"));
}

#[tokio::test]
async fn failed_image_upload_keeps_original_reference() {
    const WITH_IMAGE: &str = "---\nshare: true\n---\n![alt](img/pic.png)\n";
    let written = Arc::new(Mutex::new(Vec::<WriteRequest>::new()));
    let log = written.clone();

    let mut remote = remote_with_coordinates();
    remote.expect_get_existing().returning(|_| Ok(None));
    remote
        .expect_create_or_update()
        .returning(move |request: WriteRequest| {
            let is_image = request.path.starts_with("assets/");
            log.lock().unwrap().push(request);
            if is_image {
                Err(RemoteError::Transport("connection reset".into()))
            } else {
                Ok(VersionToken("sha".into()))
            }
        });
    let mut store = store_with(&["Idea.md", "img/pic.png"], WITH_IMAGE);
    store.expect_read_binary().returning(|_| Ok(vec![1, 2, 3]));
    let publisher = Publisher::new(remote, store, PublishSettings::default()).unwrap();

    let mut ledger = Ledger::new();
    let outcome = publisher
        .publish_document("Idea.md", &mut ledger)
        .await
        .unwrap();

    match outcome {
        PublishOutcome::Published(report) => assert_eq!(report.images_uploaded, 0),
        other => panic!("unexpected outcome {other:?}"),
    }
    let written = written.lock().unwrap();
    let paths: Vec<&str> = written.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["assets/images/img/pic.png", "notes/Idea.md"]);

    use base64::Engine;
    let body = base64::engine::general_purpose::STANDARD
        .decode(&written[1].content_base64)
        .unwrap();
    assert_eq!(String::from_utf8(body).unwrap(), WITH_IMAGE);
}

#[tokio::test]
async fn write_message_names_the_note() {
    let mut remote = remote_with_coordinates();
    remote.expect_get_existing().returning(|_| Ok(None));
    remote
        .expect_create_or_update()
        .withf(|request: &WriteRequest| {
            request.message == "Update Idea.md via note-publisher" && request.path == "notes/Idea.md"
        })
        .times(1)
        .returning(|_| Ok(VersionToken("sha".into())));
    let store = store_with(&["Notes/Idea.md"], NOTE);
    let publisher = Publisher::new(remote, store, PublishSettings::default()).unwrap();

    let mut ledger = Ledger::new();
    publisher
        .publish_document("Notes/Idea.md", &mut ledger)
        .await
        .unwrap();
}

#[tokio::test]
async fn own_ledger_entry_is_never_its_predecessor() {
    let mut remote = remote_with_coordinates();
    remote
        .expect_get_existing()
        .returning(|_| Ok(Some(VersionToken("sha".into()))));
    remote.expect_delete().never();
    remote
        .expect_create_or_update()
        .times(1)
        .returning(|_| Ok(VersionToken("sha-2".into())));

    // Every lookup after the first misses, so the note's own key looks vanished.
    let mut store = MockDocumentStore::new();
    let mut lookups = mockall::Sequence::new();
    store
        .expect_lookup()
        .times(1)
        .in_sequence(&mut lookups)
        .returning(|path: &str| Lookup::Found(Document::from_path(path)));
    store
        .expect_lookup()
        .returning(|_| Lookup::NotFound);
    store
        .expect_read_text()
        .returning(|_| Ok(NOTE.to_string()));
    let publisher = Publisher::new(remote, store, PublishSettings::default()).unwrap();

    // Published earlier under a different slug, so a retirement would have to delete.
    let mut ledger = Ledger::new();
    ledger.upsert("Idea.md", PublishRecord::new(fingerprint(NOTE), "notes/old-slug.md"));

    let outcome = publisher
        .publish_document("Idea.md", &mut ledger)
        .await
        .unwrap();

    match outcome {
        PublishOutcome::Published(report) => assert_eq!(report.retired, None),
        other => panic!("unexpected outcome {other:?}"),
    }
    let keys: Vec<&str> = ledger.entries().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["Idea.md"]);
    assert_eq!(
        ledger.get("Idea.md").unwrap().remote_path.as_deref(),
        Some("notes/Idea.md")
    );
}
