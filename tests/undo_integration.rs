mod support;

use std::sync::Arc;

use tasktree::coordinator::{CoordinatorSettings, TaskCoordinator};
use tasktree::model::{Task, TaskId, STATUS_COMPLETED, STATUS_PENDING};
use tasktree::notify::{EventKind, MemoryNotifier};
use tasktree::store::{MemoryStore, TaskStore};
use tasktree::undo::{UndoKind, UndoOutcome};

use support::{ids, stored};

type Coordinator = TaskCoordinator<MemoryStore, Arc<MemoryNotifier>>;

fn setup() -> (Coordinator, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let coordinator = TaskCoordinator::new(
        MemoryStore::new(),
        Arc::clone(&notifier),
        CoordinatorSettings::default(),
    )
    .expect("coordinator");
    (coordinator, notifier)
}

fn id(task: &Task) -> TaskId {
    task.id.expect("persisted")
}

#[test]
fn three_mutations_undo_in_reverse_then_nothing() {
    let (coordinator, notifier) = setup();
    let a = coordinator.create(Task::new("A")).expect("create A");
    coordinator
        .create_subtask(Task::new("B"), id(&a))
        .expect("create B");
    coordinator.complete(id(&a)).expect("complete A");

    let kinds: Vec<Option<UndoKind>> = (0..3)
        .map(|_| coordinator.undo().expect("undo").kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(UndoKind::Complete),
            Some(UndoKind::CreateSubtask),
            Some(UndoKind::Create),
        ]
    );

    let fourth = coordinator.undo().expect("fourth undo");
    assert_eq!(fourth, UndoOutcome::Empty);
    assert_eq!(fourth.message(), "nothing to undo");
    assert_eq!(notifier.kinds().last(), Some(&EventKind::NothingToUndo));

    assert!(coordinator.list_all().expect("list").is_empty());
    assert!(coordinator.hierarchy().is_empty());
}

#[test]
fn create_then_undo_leaves_no_trace() {
    let (coordinator, notifier) = setup();
    let created = coordinator.create(Task::new("ephemeral")).expect("create");

    let outcome = coordinator.undo().expect("undo");
    assert!(outcome.is_reverted());
    assert_eq!(
        outcome.message(),
        format!("Undid creation of task ID {}", id(&created))
    );
    assert!(coordinator.get(id(&created)).expect("get").is_none());
    assert!(coordinator.hierarchy().is_empty());
    assert_eq!(coordinator.undo_depth(), 0);
    assert_eq!(
        notifier.kinds(),
        vec![EventKind::TaskCreated, EventKind::UndoApplied]
    );
}

#[test]
fn delete_then_undo_restores_task_under_its_parent() {
    let (coordinator, _) = setup();
    let parent = coordinator.create(Task::new("parent")).expect("parent");
    let child = coordinator
        .create_subtask(Task::new("child").with_priority("HIGH"), id(&parent))
        .expect("child");

    coordinator.delete(id(&child)).expect("delete").expect("present");
    assert_eq!(ids(&coordinator.hierarchy()), vec![id(&parent).get()]);

    let outcome = coordinator.undo().expect("undo");
    assert_eq!(outcome.kind(), Some(UndoKind::Delete));

    let restored = coordinator.get(id(&child)).expect("get").expect("restored");
    assert_eq!(restored, child);
    coordinator.with_tree(|tree| {
        let node = tree.find_node(id(&child)).expect("mirrored");
        assert_eq!(node.parent(), Some(id(&parent)));
    });
}

#[test]
fn delete_undo_restores_only_the_deleted_task() {
    let (coordinator, _) = setup();
    let parent = coordinator.create(Task::new("parent")).expect("parent");
    let child = coordinator
        .create_subtask(Task::new("child"), id(&parent))
        .expect("child");

    coordinator.delete(id(&parent)).expect("delete");
    assert!(coordinator.get(id(&child)).expect("get").is_none());

    coordinator.undo().expect("undo");
    assert!(coordinator.get(id(&parent)).expect("get").is_some());
    assert!(coordinator.get(id(&child)).expect("get").is_none());
    assert_eq!(ids(&coordinator.hierarchy()), vec![id(&parent).get()]);
}

#[test]
fn restored_identity_is_never_reissued() {
    let (coordinator, _) = setup();
    let first = coordinator.create(Task::new("first")).expect("first");
    coordinator.delete(id(&first)).expect("delete");
    coordinator.undo().expect("undo delete");

    let second = coordinator.create(Task::new("second")).expect("second");
    assert_ne!(id(&first), id(&second));
}

#[test]
fn update_relocates_subtree_and_undo_moves_it_back() {
    let (coordinator, _) = setup();
    let left = coordinator.create(Task::new("left")).expect("left");
    let right = coordinator.create(Task::new("right")).expect("right");
    let mover = coordinator
        .create_subtask(Task::new("mover"), id(&left))
        .expect("mover");
    let rider = coordinator
        .create_subtask(Task::new("rider"), id(&mover))
        .expect("rider");

    let mut values = mover.clone();
    values.parent_id = Some(id(&right));
    values.title = "moved".to_string();
    coordinator
        .update(id(&mover), values)
        .expect("update")
        .expect("present");

    coordinator.with_tree(|tree| {
        assert_eq!(tree.find_node(id(&mover)).expect("node").parent(), Some(id(&right)));
        assert_eq!(tree.find_node(id(&rider)).expect("node").parent(), Some(id(&mover)));
        assert_eq!(tree.find_node(id(&left)).expect("node").child_count(), 0);
    });

    let outcome = coordinator.undo().expect("undo");
    assert_eq!(outcome.kind(), Some(UndoKind::Update));

    let restored = coordinator.get(id(&mover)).expect("get").expect("row");
    assert_eq!(restored.title, "mover");
    assert_eq!(restored.parent_id, Some(id(&left)));
    coordinator.with_tree(|tree| {
        assert_eq!(tree.find_node(id(&mover)).expect("node").parent(), Some(id(&left)));
        assert_eq!(tree.find_node(id(&right)).expect("node").child_count(), 0);
    });
}

#[test]
fn complete_undo_restores_previous_status() {
    let (coordinator, _) = setup();
    let task = coordinator
        .create(Task::new("review").with_status("IN_PROGRESS"))
        .expect("create");

    let done = coordinator.complete(id(&task)).expect("complete").expect("row");
    assert_eq!(done.status, STATUS_COMPLETED);

    coordinator.undo().expect("undo");
    let restored = coordinator.get(id(&task)).expect("get").expect("row");
    assert_eq!(restored.status, "IN_PROGRESS");
    assert_ne!(restored.status, STATUS_PENDING);
    assert!(restored.completed_at.is_none());
}

#[test]
fn undo_of_subtask_whose_parent_vanished_still_deletes_it() {
    let (coordinator, _) = setup();
    let parent = coordinator.create(Task::new("parent")).expect("parent");
    let child = coordinator
        .create_subtask(Task::new("child"), id(&parent))
        .expect("child");
    coordinator.store().delete_by_id(id(&parent)).expect("out of band delete");

    let outcome = coordinator.undo().expect("undo");
    assert_eq!(outcome.kind(), Some(UndoKind::CreateSubtask));
    assert!(coordinator.get(id(&child)).expect("get").is_none());
    coordinator.with_tree(|tree| assert!(tree.find_node(id(&child)).is_none()));
}

#[test]
fn delete_of_unmirrored_parent_prunes_its_store_children_from_the_hierarchy() {
    let notifier = Arc::new(MemoryNotifier::new());
    let store = MemoryStore::with_tasks([stored(1, Some(99), "orphan")]).expect("seed store");
    let coordinator =
        TaskCoordinator::new(store, Arc::clone(&notifier), CoordinatorSettings::default())
            .expect("coordinator");
    let orphan = TaskId::new(1);
    assert!(coordinator.with_tree(|tree| !tree.contains(orphan)));

    let anchor = coordinator.create(Task::new("anchor")).expect("anchor");
    let mover = coordinator
        .create_subtask(Task::new("mover"), id(&anchor))
        .expect("mover");

    let moved = coordinator
        .update(id(&mover), mover.clone().with_parent(orphan))
        .expect("update")
        .expect("mover exists");
    assert_eq!(moved.parent_id, Some(orphan));
    assert_eq!(
        coordinator.with_tree(|tree| tree.find_node(id(&mover)).map(|node| node.parent())),
        Some(Some(id(&anchor)))
    );

    coordinator.delete(orphan).expect("delete").expect("orphan exists");

    let store_ids = ids(&coordinator.list_all().expect("list"));
    assert_eq!(store_ids, vec![id(&anchor).get()]);
    assert_eq!(ids(&coordinator.hierarchy()), store_ids);
}
