/// Response bodies
///
/// Rows hold sealed values; views hold what the client sees. Every handler
/// that returns a house, user, animal or task goes through one of the
/// `open` constructors here.

use crate::{app::AppState, error::ApiResult};
use chrono::{DateTime, Utc};
use hearth_shared::{
    crypto::FieldCipher,
    models::{
        animal::{Animal, AnimalGender, AnimalStatus, AnimalType},
        house::House,
        recurrence::Recurrence,
        task::{Task, TaskStatus},
        user::{User, UserRole},
    },
};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: UserRole,
    pub is_admin: bool,
    pub house_id: Option<Uuid>,
    pub profile_picture_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    pub fn open(cipher: &FieldCipher, user: User) -> ApiResult<Self> {
        Ok(Self {
            id: user.id,
            first_name: user.first_name,
            last_name: cipher.open_opt(user.last_name.as_deref())?,
            email: user.email,
            role: user.role,
            is_admin: user.is_admin,
            house_id: user.house_id,
            profile_picture_id: user.profile_picture_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }
}

/// A user together with their open tasks
#[derive(Debug, Clone, Serialize)]
pub struct UserWithTasks {
    #[serde(flatten)]
    pub user: UserView,
    pub task_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HouseView {
    pub id: Uuid,
    pub name: String,
    pub billing_plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HouseView {
    pub fn open(cipher: &FieldCipher, house: House) -> ApiResult<Self> {
        Ok(Self {
            id: house.id,
            name: cipher.open(&house.name)?,
            billing_plan_id: house.billing_plan_id,
            created_at: house.created_at,
            updated_at: house.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnimalView {
    pub id: Uuid,
    pub house_id: Uuid,
    pub name: String,
    pub born_date: DateTime<Utc>,
    pub gender: AnimalGender,
    pub animal_type: AnimalType,
    pub status: AnimalStatus,
    pub task_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnimalView {
    pub fn open(cipher: &FieldCipher, animal: Animal, task_ids: Vec<Uuid>) -> ApiResult<Self> {
        Ok(Self {
            id: animal.id,
            house_id: animal.house_id,
            name: cipher.open(&animal.name)?,
            born_date: animal.born_date,
            gender: animal.gender,
            animal_type: animal.animal_type,
            status: animal.status,
            task_ids,
            created_at: animal.created_at,
            updated_at: animal.updated_at,
        })
    }

    /// Opens a list of animals, loading each one's task ids
    pub async fn open_all(state: &AppState, animals: Vec<Animal>) -> ApiResult<Vec<Self>> {
        let mut views = Vec::with_capacity(animals.len());
        for animal in animals {
            let task_ids = Animal::task_ids(&state.db, animal.id).await?;
            views.push(Self::open(&state.cipher, animal, task_ids)?);
        }
        Ok(views)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: Uuid,
    pub house_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub message: Option<String>,
    pub date: DateTime<Utc>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub picture_id: Option<Uuid>,
    pub user_ids: Vec<Uuid>,
    pub animal_ids: Vec<Uuid>,
    pub recurrence: Option<Recurrence>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    /// Opens a batch of tasks with their assignees, animals and rules
    ///
    /// Order is preserved.
    pub async fn open_all(state: &AppState, tasks: Vec<Task>) -> ApiResult<Vec<Self>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        let mut relations = Task::relations(&state.db, &ids).await?;
        let mut rules: HashMap<Uuid, Recurrence> = Recurrence::list_for_tasks(&state.db, &ids)
            .await?
            .into_iter()
            .map(|r| (r.task_id, r))
            .collect();

        tasks
            .into_iter()
            .map(|task| {
                let links = relations.remove(&task.id).unwrap_or_default();
                let recurrence = rules.remove(&task.id);
                Ok(Self {
                    id: task.id,
                    house_id: task.house_id,
                    title: state.cipher.open(&task.title)?,
                    description: state.cipher.open_opt(task.description.as_deref())?,
                    status: task.status,
                    message: state.cipher.open_opt(task.message.as_deref())?,
                    date: task.date,
                    is_archived: task.is_archived,
                    archived_at: task.archived_at,
                    picture_id: task.picture_id,
                    user_ids: links.user_ids,
                    animal_ids: links.animal_ids,
                    recurrence,
                    created_at: task.created_at,
                    updated_at: task.updated_at,
                })
            })
            .collect()
    }

    pub async fn open(state: &AppState, task: Task) -> ApiResult<Self> {
        let mut views = Self::open_all(state, vec![task]).await?;
        views
            .pop()
            .ok_or_else(|| crate::error::ApiError::InternalError("Task view missing".to_string()))
    }
}
