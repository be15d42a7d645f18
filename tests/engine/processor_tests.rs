//! Command processor tests against a real directory

use std::fs;

use uiver::processor::{Command, CommandProcessor};
use uiver::server::ComponentPhase;

use crate::common::test_repo::version_source;
use crate::common::{versions_of, TestRepo};

fn keys(state: &uiver::EngineState, name: &str) -> Vec<String> {
    state
        .component(name)
        .map(|c| c.versions.keys().map(|k| k.to_string()).collect())
        .unwrap_or_default()
}

fn new_version(component: &str) -> Command {
    Command::NewVersion {
        component: component.into(),
    }
}

#[tokio::test]
async fn test_new_version_copies_newest() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let state = repo.open().await;
    let mut rx = state.subscribe();
    let processor = CommandProcessor::new(state.clone());

    let ack = processor.execute(new_version("Foo")).await.unwrap();
    assert_eq!(ack.version.as_deref(), Some("v2"));
    assert_eq!(ack.message, "created new version");

    assert_eq!(repo.read("Foo.v2.tsx"), version_source("Foo", "v1"));
    assert!(repo.read("Foo.versions.tsx").contains("import V2 from \"./Foo.v2\";"));
    assert_eq!(keys(&state, "Foo"), ["v1", "v2"]);

    let broadcast: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    assert_eq!(broadcast["type"], "components");
    assert_eq!(versions_of(&broadcast, "Foo").unwrap(), ["v1", "v2"]);
}

#[tokio::test]
async fn test_duplicate_uses_next_free_minor() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1", "v2"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let duplicate = Command::DuplicateVersion {
        component: "Foo".into(),
        version: "v1".into(),
    };
    let ack = processor.execute(duplicate.clone()).await.unwrap();
    assert_eq!(ack.version.as_deref(), Some("v1_1"));
    assert_eq!(ack.message, "duplicated");
    assert_eq!(repo.read("Foo.v1_1.tsx"), version_source("Foo", "v1"));

    let ack = processor.execute(duplicate).await.unwrap();
    assert_eq!(ack.version.as_deref(), Some("v1_2"));
    assert_eq!(keys(&state, "Foo"), ["v1", "v1_1", "v1_2", "v2"]);
}

#[tokio::test]
async fn test_rename_normalizes_target() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1", "v2"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let ack = processor
        .execute(Command::RenameVersion {
            component: "Foo".into(),
            version: "v2".into(),
            new_version: "2.2".into(),
        })
        .await
        .unwrap();
    assert_eq!(ack.version.as_deref(), Some("v2"));
    assert_eq!(ack.new_version.as_deref(), Some("v2_2"));

    assert!(!repo.exists("Foo.v2.tsx"));
    assert_eq!(repo.read("Foo.v2_2.tsx"), version_source("Foo", "v2"));
    let index = repo.read("Foo.versions.tsx");
    assert!(index.contains("\"./Foo.v2_2\""));
    assert!(index.contains("label: \"v2.2\""));
    assert!(!index.contains("\"./Foo.v2\""));
}

#[tokio::test]
async fn test_rename_onto_existing_key_changes_nothing() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1", "v2"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());
    let index_before = repo.read("Foo.versions.tsx");

    let err = processor
        .execute(Command::RenameVersion {
            component: "Foo".into(),
            version: "v2".into(),
            new_version: "v1".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "version_already_exists");
    assert_eq!(repo.read("Foo.v1.tsx"), version_source("Foo", "v1"));
    assert_eq!(repo.read("Foo.v2.tsx"), version_source("Foo", "v2"));
    assert_eq!(repo.read("Foo.versions.tsx"), index_before);

    let err = processor
        .execute(Command::RenameVersion {
            component: "Foo".into(),
            version: "v2".into(),
            new_version: "two".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_version_format");
}

#[tokio::test]
async fn test_delete_last_version_rejected() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let err = processor
        .execute(Command::DeleteVersion {
            component: "Foo".into(),
            version: "v1".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "last_version_delete_rejected");
    assert!(repo.exists("Foo.v1.tsx"));
    assert_eq!(keys(&state, "Foo"), ["v1"]);
}

#[tokio::test]
async fn test_delete_version() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1", "v2"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let ack = processor
        .execute(Command::DeleteVersion {
            component: "Foo".into(),
            version: "V1".into(),
        })
        .await
        .unwrap();
    assert_eq!(ack.version.as_deref(), Some("v1"));
    assert_eq!(ack.message, "deleted version");
    assert!(!repo.exists("Foo.v1.tsx"));
    assert_eq!(keys(&state, "Foo"), ["v2"]);
    assert!(!repo.read("Foo.versions.tsx").contains("Foo.v1"));
}

#[tokio::test]
async fn test_lookup_errors() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state);

    let err = processor.execute(new_version("Bar")).await.unwrap_err();
    assert_eq!(err.code(), "component_not_found");

    let err = processor
        .execute(Command::DuplicateVersion {
            component: "Foo".into(),
            version: "v7".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "version_not_found");

    let err = processor
        .execute(Command::PromoteVersion {
            component: "Foo".into(),
            version: "v1__2".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_version_format");
}

#[tokio::test]
async fn test_promote_removes_scaffolding() {
    let repo = TestRepo::new();
    repo.add_component("src", "Foo", &["v1", "v2"]);
    repo.add_file("src/Foo.tsx", "wrapper");
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());
    assert!(repo.exists("src/Foo.versions.tsx"));

    let ack = processor
        .execute(Command::PromoteVersion {
            component: "Foo".into(),
            version: "v2".into(),
        })
        .await
        .unwrap();
    assert_eq!(ack.version.as_deref(), Some("v2"));
    assert_eq!(ack.component.as_deref(), Some("Foo"));

    assert_eq!(repo.read("src/Foo.tsx"), version_source("Foo", "v2"));
    assert!(!repo.exists("src/Foo.v1.tsx"));
    assert!(!repo.exists("src/Foo.v2.tsx"));
    assert!(!repo.exists("src/Foo.versions.tsx"));
    assert!(state.component("Foo").is_err());
}

#[tokio::test]
async fn test_init_component() {
    let repo = TestRepo::new();
    repo.add_file("src/Card.tsx", "export default function Card() { return null; }\n");
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let init = Command::InitComponent {
        path: "src/Card.tsx".into(),
    };
    let ack = processor.execute(init.clone()).await.unwrap();
    assert_eq!(ack.component.as_deref(), Some("Card"));
    assert_eq!(ack.message, "initialized component");
    assert_eq!(ack.version, None);

    assert_eq!(
        repo.read("src/Card.v1.tsx"),
        "export default function Card() { return null; }\n"
    );
    assert!(repo.read("src/Card.versions.tsx").contains("import V1 from \"./Card.v1\";"));
    assert!(repo.read("src/Card.tsx").contains("VersionSwitcher"));
    assert_eq!(keys(&state, "Card"), ["v1"]);

    let err = processor.execute(init).await.unwrap_err();
    assert_eq!(err.code(), "component_already_versioned");
}

#[tokio::test]
async fn test_init_rejects_paths_outside_root() {
    let repo = TestRepo::new();
    let other = TestRepo::new();
    other.add_file("Card.tsx", "x");
    let processor = CommandProcessor::new(repo.open().await);

    let err = processor
        .execute(Command::InitComponent {
            path: other.join("Card.tsx").to_string_lossy().into_owned(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "file_system_failure");
    assert!(other.exists("Card.tsx"));
    assert!(!other.exists("Card.v1.tsx"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_component_commands_run_in_submission_order() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    // Each rename depends on the previous one having landed
    let pending: Vec<_> = (1..=20)
        .map(|n| {
            processor.submit(Command::RenameVersion {
                component: "Foo".into(),
                version: format!("v{}", n),
                new_version: format!("v{}", n + 1),
            })
        })
        .collect();

    for (i, reply) in pending.into_iter().enumerate() {
        let ack = reply.await.unwrap().unwrap();
        assert_eq!(ack.new_version, Some(format!("v{}", i + 2)));
    }
    assert_eq!(keys(&state, "Foo"), ["v21"]);
    assert_eq!(state.locks().phase("Foo"), ComponentPhase::Idle);
}

#[tokio::test]
async fn test_different_components_do_not_block_each_other() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    repo.add_component("", "Bar", &["v1"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let lock = state.locks().handle("Foo");
    let _held = lock.lock().await;

    let ack = processor.execute(new_version("Bar")).await.unwrap();
    assert_eq!(ack.version.as_deref(), Some("v2"));
    assert!(!repo.exists("Foo.v2.tsx"));
}

#[tokio::test]
async fn test_init_rejects_name_tracked_elsewhere() {
    let repo = TestRepo::new();
    repo.add_component("a", "Card", &["v1"]);
    repo.add_file("b/Card.tsx", "export default function Card() { return null; }\n");
    let state = repo.open().await;
    let mut rx = state.subscribe();
    let processor = CommandProcessor::new(state.clone());

    let err = processor
        .execute(Command::InitComponent {
            path: "b/Card.tsx".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "component_already_versioned");

    assert_eq!(
        repo.read("b/Card.tsx"),
        "export default function Card() { return null; }\n"
    );
    assert!(!repo.exists("b/Card.v1.tsx"));
    assert!(!repo.exists("b/Card.versions.tsx"));
    assert_eq!(state.component("Card").unwrap().directory, repo.join("a"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_queued_command_waits_for_lock() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let state = repo.open().await;
    let processor = CommandProcessor::new(state.clone());

    let lock = state.locks().handle("Foo");
    let guard = lock.lock().await;
    assert_eq!(state.locks().phase("Foo"), ComponentPhase::Mutating);

    let queued = tokio::spawn({
        let processor = processor.clone();
        async move { processor.execute(new_version("Foo")).await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!repo.exists("Foo.v2.tsx"));

    drop(guard);
    let ack = queued.await.unwrap().unwrap();
    assert_eq!(ack.version.as_deref(), Some("v2"));
    assert!(repo.exists("Foo.v2.tsx"));
}

#[tokio::test]
async fn test_regeneration_failure_rolls_back() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    // A directory where the index should go makes every index write fail
    fs::create_dir(repo.join("Foo.versions.tsx")).unwrap();
    let state = repo.open().await;
    let mut rx = state.subscribe();
    let processor = CommandProcessor::new(state.clone());

    let err = processor.execute(new_version("Foo")).await.unwrap_err();
    assert_eq!(err.code(), "regeneration_failure");
    assert!(!repo.exists("Foo.v2.tsx"));
    assert!(!repo.exists(".Foo.versions.tsx.uiver-tmp"));
    assert_eq!(keys(&state, "Foo"), ["v1"]);
    assert!(rx.try_recv().is_err());
}
