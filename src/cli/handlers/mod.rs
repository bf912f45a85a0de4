mod init;
pub use init::cmd_init;

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::project_io::{self, ProjectError};
use crate::model::dependency::{Dependency, DependencyKind};
use crate::model::task::{NewTask, TaskType, TaskUpdate, shift_date};
use crate::ops::check::{self, CheckError, CheckWarning};
use crate::store::{DateChange, TaskStore};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;
    let dir = cli.project_dir.as_deref();

    match cli.command {
        Commands::Init(args) => cmd_init(args, dir),

        // Read commands
        Commands::List(args) => cmd_list(args, dir, json),
        Commands::Show(args) => cmd_show(args, dir, json),
        Commands::Check => cmd_check(dir, json),
        Commands::History => cmd_history(dir, json),

        // Write commands
        Commands::Add(args) => cmd_add(args, dir, json),
        Commands::Update(args) => cmd_update(args, dir, json),
        Commands::Delete(args) => cmd_delete(args, dir, json),
        Commands::Move(args) => cmd_move(args, dir, json),
        Commands::Indent(args) => cmd_indent(args, dir, json),
        Commands::Outdent(args) => cmd_outdent(args, dir, json),
        Commands::Group(args) => cmd_group(args, dir, json),
        Commands::Ungroup(args) => cmd_ungroup(args, dir, json),
        Commands::Insert(args) => cmd_insert(args, dir, json),
        Commands::Drag(args) => cmd_drag(args, dir, json),
        Commands::Collapse(args) => cmd_collapse(args, dir, json),
        Commands::Link(args) => cmd_link(args, dir, json),
        Commands::Unlink(args) => cmd_unlink(args, dir, json),
        Commands::Undo => cmd_undo(dir, json),
        Commands::Redo => cmd_redo(dir, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A loaded project: its root directory and a store holding its contents
struct Session {
    root: PathBuf,
    store: TaskStore,
    /// Newest undo entry at load time, to tell whether a command recorded
    last_command: Option<String>,
}

impl Session {
    fn open(project_dir: Option<&str>) -> Result<Session, Box<dyn std::error::Error>> {
        let start = match project_dir {
            Some(dir) => std::fs::canonicalize(dir)
                .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
            None => std::env::current_dir().map_err(ProjectError::IoError)?,
        };
        let root = project_io::discover_project(&start)?;
        let store = project_io::load_project(&root)?.into_store();
        let last_command = store.history().peek_last_undo().map(|c| c.id.clone());
        Ok(Session {
            root,
            store,
            last_command,
        })
    }

    fn save(&self) -> Result<(), ProjectError> {
        project_io::save_store(&self.root, &self.store)
    }

    /// Resolve a full task id or a unique prefix of one
    fn resolve(&self, input: &str) -> Result<String, String> {
        resolve_prefix(self.store.tasks().keys().map(String::as_str), input, "task")
    }

    fn resolve_all(&self, inputs: &[String]) -> Result<Vec<String>, String> {
        inputs.iter().map(|input| self.resolve(input)).collect()
    }

    /// Description of the command this invocation recorded, if any
    fn recorded(&self) -> Option<String> {
        let newest = self.store.history().peek_last_undo()?;
        if self.last_command.as_deref() == Some(newest.id.as_str()) {
            return None;
        }
        Some(newest.description.clone())
    }

    /// Save, then report what changed. Created ids are printed one per line
    /// so scripts can capture them.
    fn finish(self, json: bool, created: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
        let description = self.recorded();
        self.save()?;
        if json {
            let change = ChangeJson {
                description,
                ids: created,
            };
            println!("{}", serde_json::to_string_pretty(&change)?);
        } else if !created.is_empty() {
            for id in &created {
                println!("{}", id);
            }
        } else {
            println!("{}", description.as_deref().unwrap_or("no changes"));
        }
        Ok(())
    }
}

/// Exact match first, then a unique prefix
fn resolve_prefix<'a>(
    ids: impl Iterator<Item = &'a str>,
    input: &str,
    what: &str,
) -> Result<String, String> {
    let mut matches = Vec::new();
    for id in ids {
        if id == input {
            return Ok(id.to_string());
        }
        if id.starts_with(input) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [] => Err(format!("{} not found: {}", what, input)),
        [one] => Ok(one.to_string()),
        many => Err(format!(
            "{} id '{}' is ambiguous ({} matches)",
            what,
            input,
            many.len()
        )),
    }
}

fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", input))
}

fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>, String> {
    input.map(parse_date).transpose()
}

fn parse_kind(input: Option<&str>) -> Result<Option<TaskType>, String> {
    input.map(str::parse).transpose()
}

fn link_kind(kind: LinkKind) -> DependencyKind {
    match kind {
        LinkKind::Fs => DependencyKind::FinishToStart,
        LinkKind::Ss => DependencyKind::StartToStart,
        LinkKind::Ff => DependencyKind::FinishToFinish,
        LinkKind::Sf => DependencyKind::StartToFinish,
    }
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(dir)?;
    let store = &session.store;
    let rows = if args.all {
        store.flattened_tasks()
    } else {
        store.visible_tasks()
    };

    if json {
        let tasks: Vec<TaskJson> = rows.iter().map(|row| row_to_json(store.tasks(), row)).collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else if rows.is_empty() {
        println!("no tasks");
    } else {
        for row in &rows {
            println!("{}", format_row(row));
        }
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(dir)?;
    let id = session.resolve(&args.id)?;
    let tasks = session.store.tasks();
    let task = &tasks[&id];
    let links: Vec<Dependency> = session
        .store
        .dependencies()
        .links()
        .iter()
        .filter(|d| d.references(&id))
        .cloned()
        .collect();

    if json {
        let detail = TaskDetailJson {
            task: task_to_json(tasks, task),
            children: crate::ops::hierarchy::task_children(tasks, Some(&id))
                .iter()
                .map(|t| t.id.clone())
                .collect(),
            links,
        };
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        for line in format_task_detail(tasks, task, &links) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_check(dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(dir)?;
    let tasks = session.store.tasks();
    let result = check::check_tasks(tasks);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let label = |id: &str| match tasks.get(id) {
        Some(task) => format!("{} \"{}\"", short_id(id), task.name),
        None => id.to_string(),
    };
    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            match err {
                CheckError::DanglingParent { task_id, parent } => {
                    println!("  {} has missing parent: {}", label(task_id), parent);
                }
                CheckError::CircularParent { task_id } => {
                    println!("  {} is part of a parent loop", label(task_id));
                }
                CheckError::DepthExceeded { task_id, level } => {
                    println!("  {} is nested too deep (level {})", label(task_id), level);
                }
                CheckError::MilestoneParent { task_id, child_id } => {
                    println!(
                        "  milestone {} has child {}",
                        label(task_id),
                        label(child_id)
                    );
                }
                CheckError::StaleSummary { task_id } => {
                    println!("  {} dates differ from its children", label(task_id));
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                CheckWarning::DurationMismatch {
                    task_id,
                    expected,
                    actual,
                } => {
                    println!(
                        "  {} has duration {} but its dates span {} days",
                        label(task_id),
                        actual,
                        expected
                    );
                }
                CheckWarning::MilestoneSpan { task_id } => {
                    println!("  milestone {} ends after it starts", label(task_id));
                }
                CheckWarning::OrderOutOfSequence { task_id } => {
                    println!("  {} is out of display order", label(task_id));
                }
                CheckWarning::ProgressOutOfRange { task_id, progress } => {
                    println!("  {} has progress {}%", label(task_id), progress);
                }
            }
        }
    }
    if result.valid {
        println!("✓ chart is valid");
    } else {
        println!("✗ chart has errors");
    }
    Ok(())
}

fn cmd_history(dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(dir)?;
    let log = session.store.history();

    if json {
        let history = HistoryJson {
            undo: log.undo_stack().iter().rev().map(command_to_json).collect(),
            redo: log.redo_stack().iter().rev().map(command_to_json).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if log.is_empty() {
        println!("no history");
        return Ok(());
    }
    if log.can_undo() {
        println!("Undo (newest first):");
        for command in log.undo_stack().iter().rev() {
            println!("  {}", format_command(command));
        }
    }
    if log.can_redo() {
        if log.can_undo() {
            println!();
        }
        println!("Redo (next first):");
        for command in log.redo_stack().iter().rev() {
            println!("  {}", format_command(command));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write command handlers
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let parent = args.parent.as_deref().map(|p| session.resolve(p)).transpose()?;
    let data = NewTask {
        name: args.name,
        start_date: parse_optional_date(args.start.as_deref())?,
        end_date: parse_optional_date(args.end.as_deref())?,
        progress: args.progress.unwrap_or(0),
        color: args.color,
        kind: parse_kind(args.kind.as_deref())?.unwrap_or_default(),
        parent,
        ..Default::default()
    };
    let id = session.store.add_task(data)?;
    session.finish(json, vec![id])
}

fn cmd_update(args: UpdateArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let id = session.resolve(&args.id)?;
    let update = TaskUpdate {
        name: args.name,
        start_date: parse_optional_date(args.start.as_deref())?,
        end_date: parse_optional_date(args.end.as_deref())?,
        duration: args.duration,
        progress: args.progress,
        color: args.color,
        kind: parse_kind(args.kind.as_deref())?,
        ..Default::default()
    };
    if update.is_empty() {
        return Err("nothing to update (pass at least one field)".into());
    }
    session.store.update_task(&id, update)?;
    session.finish(json, Vec::new())
}

fn cmd_delete(args: DeleteArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let ids = session.resolve_all(&args.ids)?;
    match ids.as_slice() {
        [single] => {
            session.store.delete_task(single, args.cascade)?;
        }
        _ => {
            session.store.set_selected_task_ids(ids);
            session.store.delete_selected_tasks()?;
        }
    }
    session.finish(json, Vec::new())
}

fn cmd_move(args: MoveArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let id = session.resolve(&args.id)?;
    let over = session.resolve(&args.over)?;
    session.store.reorder_tasks(&id, &over)?;
    session.finish(json, Vec::new())
}

fn cmd_indent(args: IdsArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let ids = session.resolve_all(&args.ids)?;
    session.store.set_selected_task_ids(ids);
    session.store.indent_selected_tasks()?;
    session.finish(json, Vec::new())
}

fn cmd_outdent(args: IdsArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let ids = session.resolve_all(&args.ids)?;
    session.store.set_selected_task_ids(ids);
    session.store.outdent_selected_tasks()?;
    session.finish(json, Vec::new())
}

fn cmd_group(args: IdsArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let ids = session.resolve_all(&args.ids)?;
    session.store.set_selected_task_ids(ids);
    let group = session.store.group_selected_tasks()?;
    session.finish(json, vec![group])
}

fn cmd_ungroup(args: IdsArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let ids = session.resolve_all(&args.ids)?;
    session.store.set_selected_task_ids(ids);
    session.store.ungroup_selected_tasks()?;
    session.finish(json, Vec::new())
}

fn cmd_insert(args: InsertArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let id = session.resolve(&args.id)?;
    let created = match args.side {
        InsertSide::Above => session.store.insert_multiple_tasks_above(&id, args.count)?,
        InsertSide::Below if args.count == 1 => vec![session.store.insert_task_below(&id)?],
        InsertSide::Below => return Err("--count is only supported with `insert above`".into()),
    };
    session.finish(json, created)
}

fn cmd_drag(args: DragArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let ids = session.resolve_all(&args.ids)?;
    let mut changes = Vec::with_capacity(ids.len());
    for id in &ids {
        let task = &session.store.tasks()[id];
        let (Some(start), Some(end)) = (task.start_date, task.end_date) else {
            return Err(format!("task \"{}\" has no dates to shift", task.name).into());
        };
        changes.push(DateChange::new(
            id.as_str(),
            shift_date(start, args.days),
            shift_date(end, args.days),
        ));
    }
    session.store.update_multiple_tasks(&changes)?;
    session.finish(json, Vec::new())
}

fn cmd_collapse(args: CollapseArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let id = session.resolve(&args.id)?;
    let open = if args.open || args.close {
        session.store.set_open(&id, args.open)?;
        args.open
    } else {
        session.store.toggle_collapse(&id)?
    };
    session.save()?;
    let state = if open { "expanded" } else { "collapsed" };
    if json {
        println!("{}", serde_json::json!({ "id": id, "open": open }));
    } else {
        println!("{} {}", state, session.store.tasks()[&id].name);
    }
    Ok(())
}

fn cmd_link(args: LinkArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let from = session.resolve(&args.from)?;
    let to = session.resolve(&args.to)?;
    if from == to {
        return Err("a task cannot be linked to itself".into());
    }
    let link = Dependency::new(from, to, link_kind(args.kind));
    let id = link.id.clone();
    session.store.dependencies_mut().add(link);
    session.save()?;
    if json {
        println!("{}", serde_json::json!({ "id": id }));
    } else {
        println!("{}", id);
    }
    Ok(())
}

fn cmd_unlink(args: UnlinkArgs, dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let id = resolve_prefix(
        session.store.dependencies().links().iter().map(|d| d.id.as_str()),
        &args.id,
        "link",
    )?;
    session.store.dependencies_mut().remove(&id);
    session.save()?;
    if json {
        println!("{}", serde_json::json!({ "id": id, "removed": true }));
    } else {
        println!("removed link {}", short_id(&id));
    }
    Ok(())
}

fn cmd_undo(dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let undone = session.store.undo();
    if undone.is_some() {
        session.save()?;
    }
    report_replay(json, "undo", undone)
}

fn cmd_redo(dir: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(dir)?;
    let redone = session.store.redo();
    if redone.is_some() {
        session.save()?;
    }
    report_replay(json, "redo", redone)
}

fn report_replay(json: bool, verb: &str, description: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let change = ChangeJson {
            description,
            ids: Vec::new(),
        };
        println!("{}", serde_json::to_string_pretty(&change)?);
        return Ok(());
    }
    match description {
        Some(description) => println!("{}: {}", verb, description),
        None => println!("nothing to {}", verb),
    }
    Ok(())
}
