use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "gl", about = concat!("ganttline v", env!("CARGO_PKG_VERSION"), " - gantt charts with undo"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create gantt.json and gantt.toml in the current directory
    Init(InitArgs),
    /// Show the chart as an indented tree
    List(ListArgs),
    /// Show one task
    Show(ShowArgs),
    /// Validate hierarchy, summary dates and ordering
    Check,
    /// Add a task as the last child of its parent
    Add(AddArgs),
    /// Edit fields of a task
    Update(UpdateArgs),
    /// Delete tasks
    Delete(DeleteArgs),
    /// Move a task next to another (drag-and-drop)
    Move(MoveArgs),
    /// Indent tasks under their preceding sibling
    Indent(IdsArgs),
    /// Outdent tasks to their grandparent
    Outdent(IdsArgs),
    /// Wrap sibling tasks in a new summary
    Group(IdsArgs),
    /// Dissolve summaries, promoting their children
    Ungroup(IdsArgs),
    /// Insert new tasks above or below another
    Insert(InsertArgs),
    /// Shift tasks' dates by a number of days
    Drag(DragArgs),
    /// Expand or collapse a task's children
    Collapse(CollapseArgs),
    /// Link two tasks
    Link(LinkArgs),
    /// Remove a link
    Unlink(UnlinkArgs),
    /// Undo the last change
    Undo,
    /// Redo the last undone change
    Redo,
    /// Show the undo and redo stacks
    History,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Reinitialize even if gantt.json already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Include children of collapsed tasks
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID (or unique prefix)
    pub id: String,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task name
    pub name: String,
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
    /// task, summary or milestone
    #[arg(long = "type")]
    pub kind: Option<String>,
    /// Parent task ID
    #[arg(long)]
    pub parent: Option<String>,
    /// Percent complete
    #[arg(long)]
    pub progress: Option<u8>,
    /// Bar color (hex)
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
    /// Length in days, counting both ends
    #[arg(long)]
    pub duration: Option<i64>,
    #[arg(long)]
    pub progress: Option<u8>,
    /// task, summary or milestone
    #[arg(long = "type")]
    pub kind: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Task IDs (or unique prefixes)
    #[arg(required = true)]
    pub ids: Vec<String>,
    /// Also delete descendants of a single task (several IDs always do)
    #[arg(long)]
    pub cascade: bool,
}

#[derive(Args)]
pub struct MoveArgs {
    /// Task to move
    pub id: String,
    /// Task to drop it on
    pub over: String,
}

#[derive(Args)]
pub struct IdsArgs {
    /// Task IDs (or unique prefixes) forming the selection
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum InsertSide {
    Above,
    Below,
}

#[derive(Args)]
pub struct InsertArgs {
    /// above or below
    #[arg(value_enum)]
    pub side: InsertSide,
    /// Reference task ID
    pub id: String,
    /// Number of tasks to insert (above only)
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}

#[derive(Args)]
pub struct DragArgs {
    /// Task IDs (or unique prefixes)
    #[arg(required = true)]
    pub ids: Vec<String>,
    /// Days to shift by (negative moves earlier)
    #[arg(long, allow_negative_numbers = true)]
    pub days: i64,
}

#[derive(Args)]
pub struct CollapseArgs {
    /// Task ID (or unique prefix)
    pub id: String,
    /// Expand instead of toggling
    #[arg(long, conflicts_with = "close")]
    pub open: bool,
    /// Collapse instead of toggling
    #[arg(long)]
    pub close: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LinkKind {
    /// finish-to-start
    Fs,
    /// start-to-start
    Ss,
    /// finish-to-finish
    Ff,
    /// start-to-finish
    Sf,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Predecessor task
    pub from: String,
    /// Successor task
    pub to: String,
    #[arg(long, value_enum, default_value = "fs")]
    pub kind: LinkKind,
}

#[derive(Args)]
pub struct UnlinkArgs {
    /// Link ID (or unique prefix)
    pub id: String,
}
