use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use taskboard::client::{ApiClient, Dashboard, TaskApi};
use taskboard::models::{
    Category, NewTaskRequest, Priority, Status, Task, TaskFilter, UpdateTaskRequest,
};

#[derive(Parser, Debug)]
#[command(about = "Command-line front end for the taskboard API")]
struct Cli {
    /// Base URL of the API
    #[arg(long, env = "TASKBOARD_API", default_value = "http://localhost:3000")]
    api: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// List tasks, optionally filtered
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one task
    Show { id: String },
    /// Create a task
    Add {
        title: String,
        #[arg(long, value_parser = parse_priority, default_value = "MEDIUM")]
        priority: Priority,
        #[arg(long, value_parser = parse_status, default_value = "PENDING")]
        status: Status,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Edit a task; categories given here replace the current set
    Edit {
        id: String,
        #[command(flatten)]
        changes: EditArgs,
    },
    /// Set a task's status
    Status {
        id: String,
        #[arg(value_parser = parse_status)]
        status: Status,
    },
    /// Delete a task
    Rm { id: String },
    /// List categories
    Categories,
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct EditArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    description: Option<String>,
    #[arg(long)]
    clear_description: bool,
    #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
    due: Option<DateTime<Utc>>,
    #[arg(long)]
    clear_due: bool,
    #[arg(long, value_parser = parse_priority)]
    priority: Option<Priority>,
    #[arg(long, value_parser = parse_status)]
    status: Option<Status>,
    #[arg(long = "category", conflicts_with = "clear_categories")]
    categories: Vec<String>,
    #[arg(long)]
    clear_categories: bool,
}

impl From<EditArgs> for UpdateTaskRequest {
    fn from(args: EditArgs) -> Self {
        UpdateTaskRequest {
            title: args.title,
            description: if args.clear_description {
                Some(None)
            } else {
                args.description.map(Some)
            },
            due_date: if args.clear_due {
                Some(None)
            } else {
                args.due.map(Some)
            },
            priority: args.priority,
            status: args.status,
            category_ids: if args.clear_categories {
                Some(Vec::new())
            } else if args.categories.is_empty() {
                None
            } else {
                Some(args.categories)
            },
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum CategoryCommands {
    Add { name: String },
    Show { id: String },
    Rename { id: String, name: String },
    Rm { id: String },
}

fn parse_status(raw: &str) -> Result<Status, String> {
    normalize(raw).parse::<Status>().map_err(|e| e.to_string())
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    normalize(raw).parse::<Priority>().map_err(|e| e.to_string())
}

fn parse_due(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 date-time: {}", e))
}

fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase().replace(['-', ' '], "_")
}

fn status_label(status: Status) -> String {
    status.as_str().replace('_', " ")
}

fn render_task(task: &Task) -> String {
    let mut line = format!(
        "{}  [{}] [{}] {}",
        task.id,
        status_label(task.status),
        task.priority,
        task.title
    );
    for category in &task.categories {
        line.push_str(&format!(" #{}", category.name));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" (due {})", due.format("%Y-%m-%d")));
    }
    line
}

fn render_category(category: &Category) -> String {
    format!("{}  {}", category.id, category.name)
}

async fn run(cli: Cli) -> Result<(), String> {
    let client = ApiClient::new(cli.api).map_err(|e| e.to_string())?;
    let api: Arc<dyn TaskApi> = Arc::new(client);
    let mut dashboard = Dashboard::new(api.clone());

    match cli.command {
        Commands::List {
            status,
            priority,
            category,
        } => {
            dashboard
                .set_filter(TaskFilter {
                    status,
                    priority,
                    category_id: category,
                })
                .await;
            if dashboard.error.is_none() && dashboard.tasks.is_empty() {
                println!("No tasks found");
            }
            for task in &dashboard.tasks {
                println!("{}", render_task(task));
            }
        }
        Commands::Show { id } => {
            if let Some(task) = dashboard.open_task(&id).await {
                println!("{}", render_task(&task));
                if let Some(description) = &task.description {
                    println!("\n{}", description);
                }
                println!(
                    "\ncreated {}  updated {}",
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339()
                );
            }
        }
        Commands::Add {
            title,
            priority,
            status,
            description,
            due,
            categories,
        } => {
            let req = NewTaskRequest {
                title,
                description,
                due_date: due,
                priority,
                status,
                category_ids: categories,
            };
            if let Some(task) = dashboard.create_task(req).await {
                println!("{}", render_task(&task));
            }
        }
        Commands::Edit { id, changes } => {
            if let Some(task) = dashboard.update_task(&id, changes.into()).await {
                println!("{}", render_task(&task));
            }
        }
        Commands::Status { id, status } => {
            dashboard.change_status(&id, status).await;
            if let Some(task) = dashboard.tasks.iter().find(|t| t.id == id) {
                println!("{}", render_task(task));
            }
        }
        Commands::Rm { id } => {
            dashboard.delete_task(&id).await;
            if dashboard.error.is_none() {
                println!("Deleted task {}", id);
            }
        }
        Commands::Categories => {
            dashboard.load_categories().await;
            for category in &dashboard.categories {
                println!("{}", render_category(category));
            }
        }
        Commands::Category { command } => match command {
            CategoryCommands::Add { name } => {
                if let Some(category) = dashboard.create_category(&name).await {
                    println!("{}", render_category(&category));
                }
            }
            CategoryCommands::Show { id } => match api.get_category(&id).await {
                Ok(category) => {
                    println!("{}", render_category(&category));
                    for task in category.tasks.unwrap_or_default() {
                        println!(
                            "  {}  [{}] {}",
                            task.id,
                            status_label(task.status),
                            task.title
                        );
                    }
                }
                Err(e) => return Err(e.to_string()),
            },
            CategoryCommands::Rename { id, name } => {
                if let Some(category) = dashboard.rename_category(&id, &name).await {
                    println!("{}", render_category(&category));
                }
            }
            CategoryCommands::Rm { id } => {
                dashboard.delete_category(&id).await;
                if dashboard.error.is_none() {
                    println!("Deleted category {}", id);
                }
            }
        },
    }

    match dashboard.error {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enum_args_are_lenient() {
        assert_eq!(parse_status("in-progress").unwrap(), Status::InProgress);
        assert_eq!(parse_status("done").unwrap(), Status::Done);
        assert_eq!(parse_priority(" High ").unwrap(), Priority::High);
        assert!(parse_status("someday").is_err());
    }

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "taskctl",
            "--api",
            "http://example.test",
            "add",
            "Write report",
            "--priority",
            "high",
            "--category",
            "c1",
            "--category",
            "c2",
        ])
        .unwrap();

        assert_eq!(cli.api, "http://example.test");
        match cli.command {
            Commands::Add {
                title,
                priority,
                status,
                categories,
                ..
            } => {
                assert_eq!(title, "Write report");
                assert_eq!(priority, Priority::High);
                assert_eq!(status, Status::Pending);
                assert_eq!(categories, vec!["c1", "c2"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_edit_builds_partial_update() {
        let req: UpdateTaskRequest = EditArgs {
            title: Some("New".to_string()),
            clear_description: true,
            ..Default::default()
        }
        .into();
        assert_eq!(req.title.as_deref(), Some("New"));
        assert_eq!(req.description, Some(None));
        assert_eq!(req.due_date, None);
        assert_eq!(req.category_ids, None);

        let cleared: UpdateTaskRequest = EditArgs {
            clear_categories: true,
            ..Default::default()
        }
        .into();
        assert_eq!(cleared.category_ids, Some(Vec::new()));
    }

    #[test]
    fn test_edit_rejects_conflicting_flags() {
        let result = Cli::try_parse_from([
            "taskctl",
            "edit",
            "t1",
            "--category",
            "c1",
            "--clear-categories",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_task_line() {
        let now = Utc::now();
        let task = Task {
            id: "t1".to_string(),
            title: "Write report".to_string(),
            description: None,
            due_date: Some(
                DateTime::parse_from_rfc3339("2026-01-10T09:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            priority: Priority::High,
            status: Status::InProgress,
            user_id: None,
            categories: vec![Category {
                id: "c1".to_string(),
                name: "Work".to_string(),
                created_at: now,
                tasks: None,
            }],
            created_at: now,
            updated_at: now,
        };

        assert_eq!(
            render_task(&task),
            "t1  [IN PROGRESS] [HIGH] Write report #Work (due 2026-01-10)"
        );
    }
}
