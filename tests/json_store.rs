mod support;

use tasktree::coordinator::{CoordinatorSettings, TaskCoordinator};
use tasktree::error::Error;
use tasktree::model::{Task, TaskId};
use tasktree::store::{JsonStore, SortOrder, TaskStore, STORE_SCHEMA_VERSION};

use support::{ids, TestDir};

fn coordinator(dir: &TestDir) -> TaskCoordinator<JsonStore, ()> {
    TaskCoordinator::new(
        JsonStore::open(dir.store_path()),
        (),
        CoordinatorSettings::default(),
    )
    .expect("coordinator")
}

#[test]
fn hierarchy_survives_a_restart() {
    let dir = TestDir::new();
    {
        let first = coordinator(&dir);
        let root = first.create(Task::new("root")).expect("root");
        let root_id = root.id.expect("id");
        let child = first
            .create_subtask(Task::new("child"), root_id)
            .expect("child");
        first
            .create_subtask(Task::new("grandchild"), child.id.expect("id"))
            .expect("grandchild");
    }

    let second = coordinator(&dir);
    assert_eq!(ids(&second.hierarchy()), vec![1, 2, 3]);
    let depths: Vec<usize> = second
        .hierarchy_view()
        .into_iter()
        .map(|entry| entry.depth)
        .collect();
    assert_eq!(depths, vec![0, 1, 2]);
    // Undo history does not outlive the coordinator.
    assert_eq!(second.undo_depth(), 0);
}

#[test]
fn document_layout_is_versioned() {
    let dir = TestDir::new();
    let coordinator = coordinator(&dir);
    coordinator
        .create(Task::new("persisted").with_kind("bug"))
        .expect("create");

    let doc = dir.read_store();
    assert_eq!(doc["schema_version"], STORE_SCHEMA_VERSION);
    assert_eq!(doc["next_id"], 2);
    assert_eq!(doc["tasks"][0]["title"], "persisted");
    assert_eq!(doc["tasks"][0]["type"], "bug");
    assert!(dir.path().join(".tasktree").join("tasks.json.lock").exists());
}

#[test]
fn identities_keep_climbing_after_deletes_and_restarts() {
    let dir = TestDir::new();
    {
        let first = coordinator(&dir);
        first.create(Task::new("one")).expect("one");
        let two = first.create(Task::new("two")).expect("two");
        first.delete(two.id.expect("id")).expect("delete");
    }

    let second = coordinator(&dir);
    let three = second.create(Task::new("three")).expect("three");
    assert_eq!(three.id, Some(TaskId::new(3)));
}

#[test]
fn filtered_queries_read_from_disk() {
    let dir = TestDir::new();
    let coordinator = coordinator(&dir);
    let mut first = Task::new("first").with_priority("HIGH");
    first.created_at -= chrono::Duration::minutes(5);
    coordinator.create(first).expect("first");
    coordinator
        .create(Task::new("second").with_priority("HIGH"))
        .expect("second");
    coordinator
        .create(Task::new("third").with_priority("LOW"))
        .expect("third");

    let desc = coordinator
        .list_by_priority("HIGH", Some(SortOrder::Desc))
        .expect("query");
    let titles: Vec<&str> = desc.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, vec!["second", "first"]);

    let reopened = JsonStore::open(dir.store_path());
    assert_eq!(reopened.find_by_priority("LOW").expect("query").len(), 1);
}

#[test]
fn corrupt_document_is_an_operation_failure() {
    let dir = TestDir::new();
    std::fs::create_dir_all(dir.store_path().parent().expect("parent")).expect("mkdir");
    std::fs::write(dir.store_path(), "{ not json").expect("write");

    let result = TaskCoordinator::new(
        JsonStore::open(dir.store_path()),
        (),
        CoordinatorSettings::default(),
    );
    match result {
        Err(err @ Error::Json(_)) => assert_eq!(err.exit_code(), 4),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("corrupt store accepted"),
    }
}
