pub mod category;
pub mod task;

pub use category::{Category, NewCategoryRequest, UpdateCategoryRequest};
pub use task::{
    NewTaskRequest, ParseEnumError, Priority, Status, Task, TaskFilter, TaskSummary,
    UpdateStatusRequest, UpdateTaskRequest,
};
