//! `image-orchestrator task submit|list|show|cancel|matrix`.

use std::io::Read as _;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::commands::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{Task, TaskSpec};
use crate::domain::ports::{Page, TaskFilter};
use crate::infrastructure::config::Config;

#[derive(Debug, Serialize)]
struct SubmitOutput {
    task_id: Uuid,
}

impl CommandOutput for SubmitOutput {
    fn to_human(&self) -> String {
        format!("Submitted task {}", self.task_id)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct TaskListOutput {
    tasks: Vec<Task>,
    total: i64,
    page: u32,
    page_size: u32,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut lines = vec![format!(
            "{:<36}  {:<10}  {:<24}  SUBTASKS",
            "ID", "STATUS", "NAME"
        )];
        for task in &self.tasks {
            lines.push(format!(
                "{:<36}  {:<10}  {:<24}  {}",
                task.id,
                task.status.as_str(),
                truncate(&task.name, 24),
                task.total_images
            ));
        }
        lines.push(format!(
            "-- page {} of size {}, {} total --",
            self.page, self.page_size, self.total
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl CommandOutput for Task {
    fn to_human(&self) -> String {
        format!(
            "id: {}\nname: {}\nstatus: {}\nuser: {}\nimages: {} (completed {}, failed {})\ncreated_at: {}",
            self.id,
            self.name,
            self.status.as_str(),
            self.user_id,
            self.total_images,
            self.completed_subtasks,
            self.failed_subtasks,
            self.created_at
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct CancelOutput {
    task_id: Uuid,
}

impl CommandOutput for CancelOutput {
    fn to_human(&self) -> String {
        format!("Cancelled task {}", self.task_id)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn read_spec(spec_file: &str) -> Result<TaskSpec> {
    let contents = if spec_file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read task spec from stdin")?;
        buf
    } else {
        std::fs::read_to_string(spec_file)
            .with_context(|| format!("failed to read task spec file {spec_file}"))?
    };
    serde_json::from_str(&contents).context("task spec is not valid JSON")
}

pub async fn submit(config: &Config, spec_file: &str, user: &str, json_mode: bool) -> Result<()> {
    let spec = read_spec(spec_file)?;
    let ctx = AppContext::bootstrap(config).await?;
    let task_id = ctx.service.submit(spec, user.to_string()).await?;
    output(&SubmitOutput { task_id }, json_mode);
    Ok(())
}

pub async fn list(
    config: &Config,
    status: Option<String>,
    page: u32,
    page_size: u32,
    json_mode: bool,
) -> Result<()> {
    let ctx = AppContext::bootstrap(config).await?;
    let status = match status.as_deref() {
        Some(s) => {
            Some(crate::domain::models::TaskStatus::parse_str(s).context("unrecognized task status")?)
        }
        None => None,
    };
    let filter = TaskFilter {
        status,
        ..TaskFilter::default()
    };
    let page_spec = Page { page, page_size };
    let (tasks, total) = ctx.service.list(&filter, page_spec).await?;
    output(
        &TaskListOutput {
            tasks,
            total,
            page,
            page_size,
        },
        json_mode,
    );
    Ok(())
}

pub async fn show(config: &Config, id: &str, json_mode: bool) -> Result<()> {
    let task_id = Uuid::parse_str(id).context("invalid task id")?;
    let ctx = AppContext::bootstrap(config).await?;
    let task = ctx.service.get(task_id).await?;
    output(&task, json_mode);
    Ok(())
}

pub async fn cancel(config: &Config, id: &str, json_mode: bool) -> Result<()> {
    let task_id = Uuid::parse_str(id).context("invalid task id")?;
    let ctx = AppContext::bootstrap(config).await?;
    ctx.service.cancel(task_id).await?;
    output(&CancelOutput { task_id }, json_mode);
    Ok(())
}

/// The matrix view is inherently tabular JSON; it has no human-readable
/// rendering distinct from its JSON shape, so `--json` is a no-op here.
pub async fn matrix(config: &Config, id: &str) -> Result<()> {
    let task_id = Uuid::parse_str(id).context("invalid task id")?;
    let ctx = AppContext::bootstrap(config).await?;
    let view = ctx.service.matrix(task_id).await?;
    println!("{}", serde_json::to_string_pretty(&view).unwrap_or_default());
    Ok(())
}
