use crate::error::{Result, TaskError};
use crate::types::{NewTask, Page, TaskItem, TaskList};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

pub const GOOGLE_TASKS_API_URL: &str = "https://tasks.googleapis.com/tasks/v1";
const MAX_PAGES: usize = 50;

/// Thin Google Tasks v1 REST client. Callers supply the bearer token per call.
#[derive(Clone)]
pub struct TasksClient {
    http: reqwest::Client,
    base_url: Url,
}

impl TasksClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| TaskError::InvalidArgument(format!("tasks api url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TaskError::InvalidArgument(format!(
                "tasks api url cannot be a base: {base_url}"
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn list_task_lists(&self, access_token: &str) -> Result<Vec<TaskList>> {
        let url = self.endpoint(&["users", "@me", "lists"])?;
        self.get_all_pages(url, access_token, None).await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn create_task_list(&self, access_token: &str, title: &str) -> Result<TaskList> {
        let url = self.endpoint(&["users", "@me", "lists"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await?;
        decode(response, None).await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(list_id = %list_id))]
    pub async fn list_tasks(&self, access_token: &str, list_id: &str) -> Result<Vec<TaskItem>> {
        let url = self.endpoint(&["lists", list_id, "tasks"])?;
        self.get_all_pages(url, access_token, Some(list_id)).await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(list_id = %list_id))]
    pub async fn insert_task(
        &self,
        access_token: &str,
        list_id: &str,
        task: &NewTask,
    ) -> Result<TaskItem> {
        let url = self.endpoint(&["lists", list_id, "tasks"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(task)
            .send()
            .await?;
        decode(response, Some(list_id)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TaskError::InvalidArgument("tasks api url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: Url,
        access_token: &str,
        list_id: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut request = self.http.get(url.clone()).bearer_auth(access_token);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }
            let page: Page<T> = decode(request.send().await?, list_id).await?;
            items.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(items),
            }
        }
        tracing::warn!(max_pages = MAX_PAGES, "pagination stopped at page limit");
        Ok(items)
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    list_id: Option<&str>,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(classify_failure(status, body, list_id));
    }
    Ok(serde_json::from_str(&body)?)
}

fn classify_failure(status: StatusCode, body: String, list_id: Option<&str>) -> TaskError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TaskError::AuthRequired(format!("task provider refused the credential ({status})"))
        }
        StatusCode::NOT_FOUND => match list_id {
            Some(id) => TaskError::ListNotFound(id.to_string()),
            None => TaskError::Provider {
                status: status.as_u16(),
                message: body,
            },
        },
        _ => TaskError::Provider {
            status: status.as_u16(),
            message: body,
        },
    }
}
