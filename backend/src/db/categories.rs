use sqlx::{AnyPool, FromRow};
use uuid::Uuid;

use crate::db::tasks::TaskRow;
use crate::db::{now_timestamp, parse_timestamp};
use crate::error::AppError;
use crate::models::{Category, NewCategoryRequest, TaskSummary, UpdateCategoryRequest};

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    created_at: String,
}

impl TryFrom<CategoryRow> for Category {
    type Error = AppError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            created_at: parse_timestamp(&row.created_at)?,
            id: row.id,
            name: row.name,
            tasks: None,
        })
    }
}

pub async fn fetch_categories(db: &AnyPool) -> Result<Vec<Category>, AppError> {
    sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT id, name, created_at
        FROM categories
        ORDER BY name, id
        "#,
    )
    .fetch_all(db)
    .await?
    .into_iter()
    .map(Category::try_from)
    .collect()
}

/// Looks up one category together with the tasks linked to it.
pub async fn find_category_by_id(db: &AnyPool, id: &str) -> Result<Option<Category>, AppError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, created_at FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let tasks = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT t.id, t.title, t.description, t.due_date, t.priority, t.status,
               t.user_id, t.created_at, t.updated_at
        FROM tasks t
        JOIN task_categories tc ON tc.task_id = t.id
        WHERE tc.category_id = $1
        ORDER BY t.created_at, t.id
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(TaskSummary::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    let mut category = Category::try_from(row)?;
    category.tasks = Some(tasks);
    Ok(Some(category))
}

pub async fn insert_category(db: &AnyPool, req: NewCategoryRequest) -> Result<Category, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
        .bind(&id)
        .bind(&req.name)
        .bind(&now)
        .execute(db)
        .await?;

    Ok(Category {
        id,
        name: req.name,
        created_at: parse_timestamp(&now)?,
        tasks: None,
    })
}

pub async fn update_category(
    db: &AnyPool,
    id: &str,
    req: UpdateCategoryRequest,
) -> Result<Option<Category>, AppError> {
    let row = sqlx::query_as::<_, CategoryRow>(
        r#"
        UPDATE categories
        SET name = $1
        WHERE id = $2
        RETURNING id, name, created_at
        "#,
    )
    .bind(&req.name)
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(Category::try_from).transpose()
}

/// Removes the category and its task links. Linked tasks stay.
pub async fn delete_category(db: &AnyPool, id: &str) -> Result<bool, AppError> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM task_categories WHERE category_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let affected = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(affected > 0)
}
