use std::sync::Arc;

use tracing::error;

use crate::client::TaskApi;
use crate::models::{
    Category, NewCategoryRequest, NewTaskRequest, Status, Task, TaskFilter, UpdateCategoryRequest,
    UpdateTaskRequest,
};

/// Local view state for the task dashboard.
///
/// Every mutation goes to the API first and then reloads the collections it
/// touched. Failures are logged and surface as a single banner message.
pub struct Dashboard {
    api: Arc<dyn TaskApi>,
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub filter: TaskFilter,
    pub error: Option<String>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self {
            api,
            tasks: Vec::new(),
            categories: Vec::new(),
            filter: TaskFilter::default(),
            error: None,
        }
    }

    /// Loads both collections.
    pub async fn refresh(&mut self) {
        self.error = None;
        self.reload_categories().await;
        self.reload_tasks().await;
    }

    pub async fn load_tasks(&mut self) {
        self.error = None;
        self.reload_tasks().await;
    }

    pub async fn load_categories(&mut self) {
        self.error = None;
        self.reload_categories().await;
    }

    pub async fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        self.load_tasks().await;
    }

    pub async fn open_task(&mut self, id: &str) -> Option<Task> {
        self.error = None;
        match self.api.get_task(id).await {
            Ok(task) => Some(task),
            Err(e) => {
                error!("failed to load task {}: {}", id, e);
                self.error = Some("Failed to load task".to_string());
                None
            }
        }
    }

    pub async fn change_status(&mut self, id: &str, status: Status) {
        self.error = None;
        match self.api.update_task_status(id, status).await {
            Ok(_) => self.reload_tasks().await,
            Err(e) => {
                error!("failed to update status: {}", e);
                self.error = Some("Failed to update status".to_string());
            }
        }
    }

    pub async fn create_task(&mut self, req: NewTaskRequest) -> Option<Task> {
        self.error = None;
        match self.api.create_task(&req).await {
            Ok(task) => {
                self.reload_tasks().await;
                Some(task)
            }
            Err(e) => {
                error!("failed to create task: {}", e);
                self.error = Some("Failed to create task".to_string());
                None
            }
        }
    }

    pub async fn update_task(&mut self, id: &str, req: UpdateTaskRequest) -> Option<Task> {
        self.error = None;
        match self.api.update_task(id, &req).await {
            Ok(task) => {
                self.reload_tasks().await;
                Some(task)
            }
            Err(e) => {
                error!("failed to update task: {}", e);
                self.error = Some("Failed to update task".to_string());
                None
            }
        }
    }

    pub async fn delete_task(&mut self, id: &str) {
        self.error = None;
        match self.api.delete_task(id).await {
            Ok(()) => self.reload_tasks().await,
            Err(e) => {
                error!("failed to delete task: {}", e);
                self.error = Some("Failed to delete task".to_string());
            }
        }
    }

    pub async fn create_category(&mut self, name: &str) -> Option<Category> {
        self.error = None;
        let req = NewCategoryRequest {
            name: name.to_string(),
        };
        match self.api.create_category(&req).await {
            Ok(category) => {
                self.reload_categories().await;
                Some(category)
            }
            Err(e) => {
                error!("failed to create category: {}", e);
                self.error = Some("Failed to save category".to_string());
                None
            }
        }
    }

    pub async fn rename_category(&mut self, id: &str, name: &str) -> Option<Category> {
        self.error = None;
        let req = UpdateCategoryRequest {
            name: name.to_string(),
        };
        match self.api.update_category(id, &req).await {
            Ok(category) => {
                self.reload_categories().await;
                self.reload_tasks().await;
                Some(category)
            }
            Err(e) => {
                error!("failed to rename category: {}", e);
                self.error = Some("Failed to save category".to_string());
                None
            }
        }
    }

    /// Deleting a category also drops it from every task, so both
    /// collections are reloaded.
    pub async fn delete_category(&mut self, id: &str) {
        self.error = None;
        match self.api.delete_category(id).await {
            Ok(()) => {
                if self.filter.category_id.as_deref() == Some(id) {
                    self.filter.category_id = None;
                }
                self.reload_categories().await;
                self.reload_tasks().await;
            }
            Err(e) => {
                error!("failed to delete category: {}", e);
                self.error = Some("Failed to delete category".to_string());
            }
        }
    }

    // Reloads only ever raise the banner; callers clear it.
    async fn reload_tasks(&mut self) {
        match self.api.list_tasks(&self.filter).await {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => {
                error!("failed to load tasks: {}", e);
                self.error = Some("Failed to load tasks".to_string());
            }
        }
    }

    async fn reload_categories(&mut self) {
        match self.api.list_categories().await {
            Ok(categories) => self.categories = categories,
            Err(e) => {
                error!("failed to load categories: {}", e);
                self.error = Some("Failed to load categories".to_string());
            }
        }
    }
}
