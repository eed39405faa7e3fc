use std::collections::HashMap;

use sqlx::{AnyConnection, AnyPool, FromRow};
use uuid::Uuid;

use crate::db::{format_timestamp, now_timestamp, parse_timestamp};
use crate::error::AppError;
use crate::models::{
    Category, NewTaskRequest, Priority, Status, Task, TaskFilter, TaskSummary, UpdateTaskRequest,
};

#[derive(Debug, FromRow)]
pub(crate) struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    due_date: Option<String>,
    priority: String,
    status: String,
    user_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for TaskSummary {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let priority: Priority = row
            .priority
            .parse()
            .map_err(|e| AppError::Internal(format!("task {}: {}", row.id, e)))?;
        let status: Status = row
            .status
            .parse()
            .map_err(|e| AppError::Internal(format!("task {}: {}", row.id, e)))?;
        let due_date = row.due_date.as_deref().map(parse_timestamp).transpose()?;

        Ok(TaskSummary {
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            title: row.title,
            description: row.description,
            due_date,
            priority,
            status,
            user_id: row.user_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct LinkRow {
    task_id: String,
    id: String,
    name: String,
    created_at: String,
}

/// Task filter over alias `t`, bound as `$1` status, `$2` priority and
/// `$3` category id.
const FILTER_CLAUSE: &str = r#"
    ($1 IS NULL OR t.status = $1)
    AND ($2 IS NULL OR t.priority = $2)
    AND ($3 IS NULL OR EXISTS (
        SELECT 1 FROM task_categories f
        WHERE f.task_id = t.id AND f.category_id = $3))
"#;

pub async fn fetch_tasks(db: &AnyPool, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
    let sql = format!(
        r#"
        SELECT t.id, t.title, t.description, t.due_date, t.priority, t.status,
               t.user_id, t.created_at, t.updated_at
        FROM tasks t
        WHERE {}
        ORDER BY t.created_at, t.id
        "#,
        FILTER_CLAUSE
    );
    let rows = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.priority.map(|p| p.as_str().to_string()))
        .bind(filter.category_id.clone())
        .fetch_all(db)
        .await?;

    let mut links = links_for_filter(db, filter).await?;

    rows.into_iter()
        .map(|row| {
            let summary = TaskSummary::try_from(row)?;
            let categories = links.remove(&summary.id).unwrap_or_default();
            Ok(Task::from_summary(summary, categories))
        })
        .collect()
}

pub async fn find_task_by_id(db: &AnyPool, id: &str) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT id, title, description, due_date, priority, status,
               user_id, created_at, updated_at
        FROM tasks
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let summary = TaskSummary::try_from(row)?;
    let categories = links_for_task(db, id)
        .await?
        .remove(id)
        .unwrap_or_default();

    Ok(Some(Task::from_summary(summary, categories)))
}

pub async fn insert_task(db: &AnyPool, req: NewTaskRequest) -> Result<Task, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();
    let category_ids = req.linked_category_ids();

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO tasks
            (id, title, description, due_date, priority, status,
            user_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $8)
        "#,
    )
    .bind(&id)
    .bind(req.title)
    .bind(req.description)
    .bind(req.due_date.as_ref().map(format_timestamp))
    .bind(req.priority.as_str())
    .bind(req.status.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    link_categories(&mut tx, &id, &category_ids).await?;
    tx.commit().await?;

    find_task_by_id(db, &id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("task {} vanished after insert", id)))
}

pub async fn update_task(
    db: &AnyPool,
    id: &str,
    req: UpdateTaskRequest,
) -> Result<Option<Task>, AppError> {
    let Some(current) = find_task_by_id(db, id).await? else {
        return Ok(None);
    };

    let category_ids = req.linked_category_ids();
    let title = req.title.unwrap_or(current.title);
    let description = req.description.unwrap_or(current.description);
    let due_date = req.due_date.unwrap_or(current.due_date);
    let priority = req.priority.unwrap_or(current.priority);
    let status = req.status.unwrap_or(current.status);
    let now = now_timestamp();

    let mut tx = db.begin().await?;

    let affected = sqlx::query(
        r#"
        UPDATE tasks
        SET title = $1,
            description = $2,
            due_date = $3,
            priority = $4,
            status = $5,
            updated_at = $6
        WHERE id = $7
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(due_date.as_ref().map(format_timestamp))
    .bind(priority.as_str())
    .bind(status.as_str())
    .bind(&now)
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    if let Some(category_ids) = category_ids {
        sqlx::query("DELETE FROM task_categories WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut tx, id, &category_ids).await?;
    }

    tx.commit().await?;

    find_task_by_id(db, id).await
}

pub async fn update_task_status(
    db: &AnyPool,
    id: &str,
    status: Status,
) -> Result<Option<Task>, AppError> {
    let now = now_timestamp();
    let affected = sqlx::query(
        r#"
        UPDATE tasks
        SET status = $1,
            updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(status.as_str())
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    find_task_by_id(db, id).await
}

pub async fn delete_task(db: &AnyPool, id: &str) -> Result<bool, AppError> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM task_categories WHERE task_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let affected = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(affected > 0)
}

/// Links `task_id` to every category in `category_ids`, failing on the first
/// id that does not resolve.
async fn link_categories(
    conn: &mut AnyConnection,
    task_id: &str,
    category_ids: &[String],
) -> Result<(), AppError> {
    for category_id in category_ids {
        let exists = sqlx::query("SELECT id FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(AppError::Validation(format!(
                "category {} does not exist",
                category_id
            )));
        }

        sqlx::query("INSERT INTO task_categories (task_id, category_id) VALUES ($1, $2)")
            .bind(task_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Categories of every task matching `filter`, keyed by task id.
async fn links_for_filter(
    db: &AnyPool,
    filter: &TaskFilter,
) -> Result<HashMap<String, Vec<Category>>, AppError> {
    let sql = format!(
        r#"
        SELECT tc.task_id, c.id, c.name, c.created_at
        FROM task_categories tc
        JOIN categories c ON c.id = tc.category_id
        JOIN tasks t ON t.id = tc.task_id
        WHERE {}
        ORDER BY c.name, c.id
        "#,
        FILTER_CLAUSE
    );
    let rows = sqlx::query_as::<_, LinkRow>(&sql)
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(filter.priority.map(|p| p.as_str().to_string()))
        .bind(filter.category_id.clone())
        .fetch_all(db)
        .await?;

    group_links(rows)
}

async fn links_for_task(
    db: &AnyPool,
    task_id: &str,
) -> Result<HashMap<String, Vec<Category>>, AppError> {
    let rows = sqlx::query_as::<_, LinkRow>(
        r#"
        SELECT tc.task_id, c.id, c.name, c.created_at
        FROM task_categories tc
        JOIN categories c ON c.id = tc.category_id
        WHERE tc.task_id = $1
        ORDER BY c.name, c.id
        "#,
    )
    .bind(task_id)
    .fetch_all(db)
    .await?;

    group_links(rows)
}

/// Rows arrive ordered by name, so each list keeps that order.
fn group_links(rows: Vec<LinkRow>) -> Result<HashMap<String, Vec<Category>>, AppError> {
    let mut links: HashMap<String, Vec<Category>> = HashMap::new();
    for row in rows {
        links.entry(row.task_id).or_default().push(Category {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            name: row.name,
            tasks: None,
        });
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::categories::insert_category;
    use crate::db::setup_test_db;
    use crate::models::NewCategoryRequest;

    fn new_task(title: &str, status: Status, category_ids: Vec<String>) -> NewTaskRequest {
        NewTaskRequest {
            title: title.to_string(),
            description: None,
            due_date: None,
            priority: Priority::Medium,
            status,
            category_ids,
        }
    }

    async fn category(pool: &AnyPool, name: &str) -> Category {
        insert_category(
            pool,
            NewCategoryRequest {
                name: name.to_string(),
            },
        )
        .await
        .expect("Failed to insert category")
    }

    #[tokio::test]
    async fn test_insert_and_fetch_task() {
        let pool = setup_test_db().await;

        let task = insert_task(&pool, new_task("Write report", Status::Pending, vec![]))
            .await
            .expect("Failed to insert task");

        assert_eq!(task.title, "Write report");
        assert!(task.categories.is_empty());
        assert!(Uuid::parse_str(&task.id).is_ok());
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.user_id, None);

        let fetched = find_task_by_id(&pool, &task.id)
            .await
            .expect("Failed to fetch task")
            .expect("Task not found");
        assert_eq!(fetched, task);
    }

    #[tokio::test]
    async fn test_insert_links_categories_and_skips_empty_ids() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;
        let home = category(&pool, "Home").await;

        let task = insert_task(
            &pool,
            new_task(
                "Write report",
                Status::Pending,
                vec![work.id.clone(), String::new(), home.id.clone(), work.id.clone()],
            ),
        )
        .await
        .expect("Failed to insert task");

        let names: Vec<&str> = task.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Work"]);
    }

    #[tokio::test]
    async fn test_insert_with_unknown_category_leaves_nothing_behind() {
        let pool = setup_test_db().await;

        let result = insert_task(
            &pool,
            new_task("Orphan", Status::Pending, vec!["nonexistent".to_string()]),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let tasks = fetch_tasks(&pool, &TaskFilter::default())
            .await
            .expect("Failed to fetch tasks");
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;

        insert_task(&pool, new_task("a", Status::Pending, vec![work.id.clone()]))
            .await
            .unwrap();
        insert_task(&pool, new_task("b", Status::Pending, vec![]))
            .await
            .unwrap();
        insert_task(&pool, new_task("c", Status::Done, vec![work.id.clone()]))
            .await
            .unwrap();

        let all = fetch_tasks(&pool, &TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let pending = fetch_tasks(
            &pool,
            &TaskFilter {
                status: Some(Status::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|t| t.status == Status::Pending));

        let pending_work = fetch_tasks(
            &pool,
            &TaskFilter {
                status: Some(Status::Pending),
                priority: Some(Priority::Medium),
                category_id: Some(work.id.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(pending_work.len(), 1);
        assert_eq!(pending_work[0].title, "a");
        assert_eq!(pending_work[0].categories.len(), 1);

        let high = fetch_tasks(
            &pool,
            &TaskFilter {
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(high.is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_categories() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;
        let home = category(&pool, "Home").await;

        let task = insert_task(
            &pool,
            new_task("Write report", Status::Pending, vec![work.id.clone()]),
        )
        .await
        .unwrap();

        let swapped = update_task(
            &pool,
            &task.id,
            UpdateTaskRequest {
                category_ids: Some(vec![home.id.clone()]),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("Task not found");
        assert_eq!(swapped.categories.len(), 1);
        assert_eq!(swapped.categories[0].id, home.id);
        assert_eq!(swapped.title, "Write report");

        let cleared = update_task(
            &pool,
            &task.id,
            UpdateTaskRequest {
                category_ids: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("Task not found");
        assert!(cleared.categories.is_empty());
    }

    #[tokio::test]
    async fn test_update_fields_and_clear_description() {
        let pool = setup_test_db().await;
        let mut req = new_task("Draft", Status::Pending, vec![]);
        req.description = Some("first pass".to_string());
        let task = insert_task(&pool, req).await.unwrap();

        let updated = update_task(
            &pool,
            &task.id,
            UpdateTaskRequest {
                title: Some("Final".to_string()),
                description: Some(None),
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("Task not found");

        assert_eq!(updated.title, "Final");
        assert_eq!(updated.description, None);
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.status, Status::Pending);
        assert!(updated.updated_at >= task.updated_at);
    }

    #[tokio::test]
    async fn test_update_with_unknown_category_keeps_old_links() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;
        let task = insert_task(&pool, new_task("a", Status::Pending, vec![work.id.clone()]))
            .await
            .unwrap();

        let result = update_task(
            &pool,
            &task.id,
            UpdateTaskRequest {
                title: Some("renamed".to_string()),
                category_ids: Some(vec!["missing".to_string()]),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let unchanged = find_task_by_id(&pool, &task.id).await.unwrap().unwrap();
        assert_eq!(unchanged, task);
    }

    #[tokio::test]
    async fn test_update_status_touches_only_status() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;
        let task = insert_task(&pool, new_task("a", Status::Pending, vec![work.id.clone()]))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let done = update_task_status(&pool, &task.id, Status::Done)
            .await
            .unwrap()
            .expect("Task not found");
        assert_eq!(done.status, Status::Done);
        assert_eq!(done.title, task.title);
        assert_eq!(done.priority, task.priority);
        assert_eq!(done.categories, task.categories);
        assert!(done.updated_at > task.updated_at);

        let back = update_task_status(&pool, &task.id, Status::Pending)
            .await
            .unwrap()
            .expect("Task not found");
        assert_eq!(back.status, Status::Pending);
    }

    #[tokio::test]
    async fn test_missing_task_operations() {
        let pool = setup_test_db().await;

        assert!(find_task_by_id(&pool, "nope").await.unwrap().is_none());
        assert!(
            update_task(&pool, "nope", UpdateTaskRequest::default())
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            update_task_status(&pool, "nope", Status::Done)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!delete_task(&pool, "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_task() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;
        let task = insert_task(&pool, new_task("a", Status::Pending, vec![work.id.clone()]))
            .await
            .unwrap();

        assert!(delete_task(&pool, &task.id).await.unwrap());
        assert!(find_task_by_id(&pool, &task.id).await.unwrap().is_none());
        assert!(!delete_task(&pool, &task.id).await.unwrap());

        let links: Vec<(String,)> = sqlx::query_as("SELECT task_id FROM task_categories")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_links_are_loaded_for_matching_tasks_only() {
        let pool = setup_test_db().await;
        let work = category(&pool, "Work").await;
        let home = category(&pool, "Home").await;

        let open = insert_task(&pool, new_task("a", Status::Pending, vec![work.id.clone()]))
            .await
            .unwrap();
        insert_task(&pool, new_task("b", Status::Done, vec![home.id.clone()]))
            .await
            .unwrap();

        let filter = TaskFilter {
            status: Some(Status::Pending),
            ..Default::default()
        };
        let links = links_for_filter(&pool, &filter).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[&open.id][0].name, "Work");

        let tasks = fetch_tasks(&pool, &filter).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].categories, vec![work]);
    }
}
