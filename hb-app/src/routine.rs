//! `create routine`: ask the advisor for a short care routine and save each
//! activity as a task in the routine list.

use crate::agents::{AgentError, RelayClient, TaskGatewayClient};
use hb_tasks::{ListResolution, NewTask};

pub const ROUTINE_INSTRUCTION: &str = "Create a daily horticultural therapy routine with at most 5 short activities. \
Answer only with a numbered list, one activity per line, without any introduction.";

#[derive(Debug)]
pub struct RoutineReport {
    pub list: ListResolution,
    pub added: Vec<String>,
    /// Titles that could not be inserted, with the reason.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug)]
pub enum RoutineOutcome {
    /// The advisor's reply held no usable lines; nothing was written.
    NothingExtracted,
    Saved(RoutineReport),
}

impl RoutineOutcome {
    pub fn render(&self) -> String {
        let report = match self {
            Self::NothingExtracted => {
                return "Sorry, I could not extract a routine from the advisor's answer. Please try again."
                    .to_string();
            }
            Self::Saved(report) => report,
        };

        let mut out = String::new();
        if !report.added.is_empty() {
            out.push_str(&format!(
                "Routine saved to \"{}\"{}:\n",
                report.list.title,
                if report.list.created { " (new list)" } else { "" }
            ));
            for (idx, title) in report.added.iter().enumerate() {
                out.push_str(&format!("{}. {title}\n", idx + 1));
            }
        }
        if !report.failed.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Could not add:\n");
            for (title, reason) in &report.failed {
                out.push_str(&format!("- {title}: {reason}\n"));
            }
        }
        out.trim_end().to_string()
    }
}

/// Generate, parse, resolve the list, then insert item by item.
///
/// Insert failures are collected per title; earlier successes stay committed.
#[tracing::instrument(level = "info", skip_all, fields(list_name = %list_name))]
pub async fn create_routine(
    relay: &RelayClient,
    tasks: &TaskGatewayClient,
    list_name: &str,
) -> Result<RoutineOutcome, AgentError> {
    let reply = relay.ask(ROUTINE_INSTRUCTION).await?;
    let items = hb_llm::parse_routine(&reply);
    if items.is_empty() {
        tracing::warn!(reply_chars = reply.chars().count(), "no routine items extracted");
        return Ok(RoutineOutcome::NothingExtracted);
    }

    let list = tasks.find_or_create_list(list_name).await?;
    let mut added = Vec::new();
    let mut failed = Vec::new();
    for title in items {
        match tasks.insert_task(&list.id, &NewTask::titled(title.clone())).await {
            Ok(_) => added.push(title),
            Err(e) => {
                tracing::warn!(error = %e, %title, "routine item insert failed");
                failed.push((title, e.to_string()));
            }
        }
    }
    tracing::info!(
        list_id = %list.id,
        added = added.len(),
        failed = failed.len(),
        "routine saved"
    );
    Ok(RoutineOutcome::Saved(RoutineReport {
        list,
        added,
        failed,
    }))
}
