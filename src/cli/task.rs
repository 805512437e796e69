//! tasktree command implementations.

use serde::Serialize;

use crate::cli::context::{parse_id, Context};
use crate::cli::TaskFields;
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyEntry;
use crate::model::{Task, TaskId};
use crate::notify::LogEntry;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{sort_tasks, SortOrder};
use crate::undo::UndoOutcome;

pub struct ListOptions {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub kind: Option<String>,
    pub sort: Option<String>,
    pub output: OutputOptions,
}

pub struct IdOptions {
    pub id: String,
    pub output: OutputOptions,
}

pub struct CreateOptions {
    pub title: String,
    pub parent: Option<String>,
    pub fields: TaskFields,
    pub output: OutputOptions,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub fields: TaskFields,
    pub parent: Option<String>,
    pub root: bool,
    pub start: bool,
    pub output: OutputOptions,
}

pub struct LogOptions {
    pub limit: Option<usize>,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct TaskListOutput {
    count: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct ShowOutput {
    task: Task,
    children: Vec<TaskId>,
    in_hierarchy: bool,
}

#[derive(Serialize)]
struct TreeOutput {
    entries: Vec<HierarchyEntry>,
    unresolved: Vec<Task>,
    skipped: Vec<Task>,
}

#[derive(Serialize)]
struct LogOutput {
    count: usize,
    entries: Vec<LogEntry>,
}

pub fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let order = options.sort.as_deref().map(SortOrder::parse).transpose()?;
    let coordinator = &ctx.coordinator;

    let (filter, tasks) = if let Some(status) = options.status.as_deref() {
        (
            Some(format!("status = {status}")),
            coordinator.list_by_status(status, order)?,
        )
    } else if let Some(priority) = options.priority.as_deref() {
        (
            Some(format!("priority = {priority}")),
            coordinator.list_by_priority(priority, order)?,
        )
    } else if let Some(kind) = options.kind.as_deref() {
        (
            Some(format!("type = {kind}")),
            coordinator.list_by_type(kind, order)?,
        )
    } else {
        let mut tasks = coordinator.list_all()?;
        if let Some(order) = order {
            sort_tasks(&mut tasks, order);
        }
        (None, tasks)
    };

    let mut human = HumanOutput::new(format!("Tasks ({})", tasks.len()));
    if let Some(filter) = filter {
        human.push_summary("Filter", filter);
    }
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    if tasks.is_empty() {
        human.push_next_step("tasktree create <title>");
    }

    emit_success(
        options.output,
        "list",
        &TaskListOutput {
            count: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}

pub fn run_show(ctx: &Context, options: IdOptions) -> Result<()> {
    let id = parse_id(&options.id)?;
    let task = require_task(ctx, id)?;
    let children = ctx.coordinator.with_tree(|tree| {
        tree.find_node(id)
            .map(|node| node.children().collect::<Vec<_>>())
    });
    let in_hierarchy = children.is_some();
    let children = children.unwrap_or_default();

    let mut human = HumanOutput::new(format!("Task {id}"));
    push_task_summary(&mut human, &task);
    if !children.is_empty() {
        human.push_summary("Children", join_ids(&children));
    }
    if !in_hierarchy {
        human.push_warning("task is outside the hierarchy: its parent does not resolve");
    }

    emit_success(
        options.output,
        "show",
        &ShowOutput {
            task,
            children,
            in_hierarchy,
        },
        Some(&human),
    )
}

pub fn run_tree(ctx: &Context, output: OutputOptions) -> Result<()> {
    let report = ctx.coordinator.rebuild()?;
    let entries = ctx.coordinator.hierarchy_view();

    let mut human = HumanOutput::new("Task hierarchy");
    human.push_summary("Tasks", entries.len().to_string());
    let roots = ctx.coordinator.with_tree(|tree| tree.roots().count());
    human.push_summary("Roots", roots.to_string());
    for entry in &entries {
        human.push_detail(format!("{}{}", "  ".repeat(entry.depth), task_line(&entry.task)));
    }
    for task in &report.unresolved {
        let parent = task
            .parent_id
            .map(|parent| format!("#{parent}"))
            .unwrap_or_default();
        human.push_warning(format!("{} left out: parent {parent} unresolved", task.label()));
    }
    for task in &report.skipped {
        human.push_warning(format!("{} skipped: invalid identity or parent", task.label()));
    }
    if entries.is_empty() && report.is_clean() {
        human.push_next_step("tasktree create <title>");
    }

    emit_success(
        output,
        "tree",
        &TreeOutput {
            entries,
            unresolved: report.unresolved,
            skipped: report.skipped,
        },
        Some(&human),
    )
}

pub fn run_create(ctx: &Context, options: CreateOptions) -> Result<()> {
    let title = require_title(&options.title)?;
    let mut task = Task::new(title).with_status(ctx.default_status());
    apply_fields(&mut task, options.fields);

    let (command, header, created) = match options.parent.as_deref() {
        Some(raw) => {
            let parent_id = parse_id(raw)?;
            require_task(ctx, parent_id)?;
            let created = ctx.coordinator.create_subtask(task, parent_id)?;
            ("subtask", "Subtask created", created)
        }
        None => ("create", "Task created", ctx.coordinator.create(task)?),
    };

    let mut human = HumanOutput::new(header);
    if let Some(id) = created.id {
        human.push_summary("ID", id.to_string());
        human.push_next_step(format!("tasktree subtask {id} <title>"));
    }
    push_task_summary(&mut human, &created);

    emit_success(options.output, command, &created, Some(&human))
}

pub fn run_update(ctx: &Context, options: UpdateOptions) -> Result<()> {
    let id = parse_id(&options.id)?;
    let existing = require_task(ctx, id)?;

    let mut values = existing.clone();
    if let Some(title) = options.title.as_deref() {
        values.title = require_title(title)?.to_string();
    }
    apply_fields(&mut values, options.fields);
    if options.start {
        values.status = ctx.config.tasks.in_progress_status.trim().to_string();
    }
    if options.root {
        values.parent_id = None;
    } else if let Some(raw) = options.parent.as_deref() {
        let parent_id = parse_id(raw)?;
        require_task(ctx, parent_id)?;
        values.parent_id = Some(parent_id);
    }

    let updated = ctx
        .coordinator
        .update(id, values)?
        .ok_or(Error::TaskNotFound(id))?;
    let mirrored_parent = ctx
        .coordinator
        .with_tree(|tree| tree.find_node(id).map(|node| node.parent()));

    let mut human = HumanOutput::new("Task updated");
    human.push_summary("ID", id.to_string());
    push_task_summary(&mut human, &updated);
    if let Some(mirrored) = mirrored_parent {
        if mirrored != updated.parent_id {
            human.push_warning("new parent is outside the hierarchy; position kept until rebuild");
        }
    }

    emit_success(options.output, "update", &updated, Some(&human))
}

pub fn run_delete(ctx: &Context, options: IdOptions) -> Result<()> {
    let id = parse_id(&options.id)?;
    let deleted = ctx
        .coordinator
        .delete(id)?
        .ok_or(Error::TaskNotFound(id))?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", id.to_string());
    human.push_summary("Title", deleted.title.clone());
    human.push_next_step("tasktree undo");

    emit_success(options.output, "delete", &deleted, Some(&human))
}

pub fn run_complete(ctx: &Context, options: IdOptions) -> Result<()> {
    let id = parse_id(&options.id)?;
    let completed_status = &ctx.coordinator.settings().completed_status;
    let already = require_task(ctx, id)?.is_completed_as(completed_status);
    let completed = ctx
        .coordinator
        .complete(id)?
        .ok_or(Error::TaskNotFound(id))?;

    let mut human = HumanOutput::new("Task completed");
    if already {
        human.push_warning("task was already completed; completion time refreshed");
    }
    human.push_summary("ID", id.to_string());
    push_task_summary(&mut human, &completed);

    emit_success(options.output, "complete", &completed, Some(&human))
}

pub fn run_undo(ctx: &Context, output: OutputOptions) -> Result<()> {
    let outcome = ctx.coordinator.undo()?;

    let mut human = match &outcome {
        UndoOutcome::Reverted { kind, task_id, message } => {
            let mut human = HumanOutput::new("Undo applied");
            human.push_summary("Action", kind.to_string());
            human.push_summary("Task", task_id.to_string());
            human.push_detail(message.clone());
            human
        }
        UndoOutcome::Failed { kind, message } => {
            let mut human = HumanOutput::new("Undo failed");
            human.push_summary("Action", kind.to_string());
            human.push_warning(message.clone());
            human
        }
        UndoOutcome::Empty => HumanOutput::new("Nothing to undo"),
    };
    if ctx.coordinator.undo_depth() > 0 {
        human.push_summary("Remaining", ctx.coordinator.undo_depth().to_string());
    }

    emit_success(output, "undo", &outcome, Some(&human))
}

pub fn run_schedule(ctx: &Context, options: IdOptions) -> Result<()> {
    let id = parse_id(&options.id)?;
    let task = require_task(ctx, id)?;
    ctx.coordinator.schedule(task.clone());

    let mut human = HumanOutput::new("Task scheduled");
    human.push_summary("ID", id.to_string());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Queue length", ctx.coordinator.scheduled().len().to_string());

    emit_success(options.output, "schedule", &task, Some(&human))
}

pub fn run_next(ctx: &Context, output: OutputOptions) -> Result<()> {
    let next = ctx.coordinator.process_next();
    let human = queue_head_output("Processing", next.as_ref());
    emit_success(output, "next", &next, Some(&human))
}

pub fn run_peek(ctx: &Context, output: OutputOptions) -> Result<()> {
    let head = ctx.coordinator.peek_next();
    let human = queue_head_output("Next up", head.as_ref());
    emit_success(output, "peek", &head, Some(&human))
}

pub fn run_queue(ctx: &Context, output: OutputOptions) -> Result<()> {
    let tasks = ctx.coordinator.scheduled();

    let mut human = HumanOutput::new(format!("Scheduled tasks ({})", tasks.len()));
    for (position, task) in tasks.iter().enumerate() {
        human.push_detail(format!("{}. {}", position + 1, task_line(task)));
    }

    emit_success(
        output,
        "queue",
        &TaskListOutput {
            count: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}

pub fn run_log(ctx: &Context, options: LogOptions) -> Result<()> {
    let mut human = HumanOutput::new("Audit log");
    let mut entries = match ctx.audit_log.as_ref() {
        Some(log) => {
            human.push_summary("Path", log.path().display().to_string());
            log.read_entries()?
        }
        None => {
            human.push_warning("audit log disabled");
            human.push_next_step("set events.audit_log in .tasktree.toml");
            Vec::new()
        }
    };
    if let Some(limit) = options.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    human.push_summary("Entries", entries.len().to_string());
    for entry in &entries {
        human.push_detail(format!(
            "[{}] {}: {}",
            entry.timestamp.to_rfc3339(),
            entry.event_type.as_str(),
            entry.message
        ));
    }

    emit_success(
        options.output,
        "log",
        &LogOutput {
            count: entries.len(),
            entries,
        },
        Some(&human),
    )
}

fn require_task(ctx: &Context, id: TaskId) -> Result<Task> {
    ctx.coordinator.get(id)?.ok_or(Error::TaskNotFound(id))
}

fn require_title(raw: &str) -> Result<&str> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    Ok(title)
}

// Empty strings clear optional attributes.
fn apply_fields(task: &mut Task, fields: TaskFields) {
    fn optional(value: String) -> Option<String> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    if let Some(description) = fields.description {
        task.description = optional(description);
    }
    if let Some(priority) = fields.priority {
        task.priority = optional(priority);
    }
    if let Some(kind) = fields.kind {
        task.kind = optional(kind);
    }
    if let Some(status) = fields.status.and_then(optional) {
        task.status = status;
    }
}

fn queue_head_output(header: &str, task: Option<&Task>) -> HumanOutput {
    match task {
        Some(task) => {
            let mut human = HumanOutput::new(header);
            human.push_detail(task_line(task));
            human
        }
        None => {
            let mut human = HumanOutput::new("Schedule queue empty");
            human.push_next_step("tasktree schedule <id>");
            human
        }
    }
}

fn task_line(task: &Task) -> String {
    let mut line = format!("{} [{}]", task.label(), task.status);
    if let Some(priority) = task.priority.as_deref() {
        line.push_str(&format!(" priority={priority}"));
    }
    if let Some(kind) = task.kind.as_deref() {
        line.push_str(&format!(" type={kind}"));
    }
    line
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.clone());
    if let Some(priority) = task.priority.as_ref() {
        human.push_summary("Priority", priority.clone());
    }
    if let Some(kind) = task.kind.as_ref() {
        human.push_summary("Type", kind.clone());
    }
    if let Some(parent) = task.parent_id {
        human.push_summary("Parent", parent.to_string());
    }
    human.push_summary("Created", task.created_at.to_rfc3339());
    if let Some(completed_at) = task.completed_at {
        human.push_summary("Completed", completed_at.to_rfc3339());
    }
    if let Some(description) = task.description.as_ref() {
        human.push_detail(description.clone());
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
