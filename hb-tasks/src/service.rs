use crate::client::TasksClient;
use crate::credential::CredentialStore;
use crate::error::{Result, TaskError};
use crate::types::{ListResolution, NewTask, TaskItem, TaskList};
use std::sync::Arc;

/// Task operations guarded by the credential lifecycle.
///
/// Arguments are validated before the credential is touched, so invalid
/// input never causes a refresh or a provider call.
#[derive(Clone)]
pub struct TaskService {
    client: TasksClient,
    credentials: Arc<dyn CredentialStore>,
}

impl TaskService {
    pub fn new(client: TasksClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn list_task_lists(&self) -> Result<Vec<TaskList>> {
        let token = self.credentials.refresh_if_needed().await?;
        self.client.list_task_lists(&token).await
    }

    /// Exact, case-sensitive title match; the first list in provider order wins.
    #[tracing::instrument(level = "info", skip_all, fields(name = %name))]
    pub async fn find_or_create_list(&self, name: &str) -> Result<ListResolution> {
        if name.trim().is_empty() {
            return Err(TaskError::InvalidArgument(
                "list name must not be empty".to_string(),
            ));
        }
        let token = self.credentials.refresh_if_needed().await?;
        let lists = self.client.list_task_lists(&token).await?;
        if let Some(existing) = lists.into_iter().find(|list| list.title == name) {
            return Ok(ListResolution {
                id: existing.id,
                title: existing.title,
                created: false,
            });
        }

        let created = self.client.create_task_list(&token, name).await?;
        tracing::info!(list_id = %created.id, "task list created");
        Ok(ListResolution {
            id: created.id,
            title: created.title,
            created: true,
        })
    }

    #[tracing::instrument(level = "info", skip_all, fields(list_id = %list_id))]
    pub async fn insert_task(&self, list_id: &str, task: &NewTask) -> Result<TaskItem> {
        require_list_id(list_id)?;
        if task.title.trim().is_empty() {
            return Err(TaskError::InvalidArgument(
                "task title must not be empty".to_string(),
            ));
        }
        let task = NewTask {
            title: task.title.trim().to_string(),
            ..task.clone()
        };
        let token = self.credentials.refresh_if_needed().await?;
        let inserted = self.client.insert_task(&token, list_id, &task).await?;
        tracing::info!(task_id = %inserted.id, "task inserted");
        Ok(inserted)
    }

    #[tracing::instrument(level = "info", skip_all, fields(list_id = %list_id))]
    pub async fn list_tasks(&self, list_id: &str) -> Result<Vec<TaskItem>> {
        require_list_id(list_id)?;
        let token = self.credentials.refresh_if_needed().await?;
        self.client.list_tasks(&token, list_id).await
    }
}

fn require_list_id(list_id: &str) -> Result<()> {
    if list_id.trim().is_empty() {
        return Err(TaskError::InvalidArgument(
            "task list id is required".to_string(),
        ));
    }
    Ok(())
}
