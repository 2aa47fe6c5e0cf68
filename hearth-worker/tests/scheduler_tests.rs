/// Integration tests for the scheduled jobs
///
/// These run the jobs against a PostgreSQL database and check the rows they
/// leave behind. Tests in this file hold a shared lock so one test's sweep
/// never races another's assertions. Every test returns early when
/// `DATABASE_URL` is unset.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hearth_shared::db::migrations::run_migrations;
use hearth_shared::models::{
    animal::{Animal, AnimalGender, AnimalStatus, AnimalType, CreateAnimal, UpdateAnimal},
    house::House,
    join_code::{generate_code, JoinCode, JoinCodeType},
    recurrence::{Recurrence, RecurrenceType},
    task::{CreateTask, Task, TaskStatus, TaskTransition},
    user::{CreateUser, User, UserRole},
};
use hearth_worker::jobs::ScheduledJob;
use hearth_worker::orchestrator::{OrchestratorConfig, WorkerOrchestrator};
use hearth_worker::purge::JoinCodePurge;
use hearth_worker::recurrence::{RecurrenceScheduler, Regeneration};
use hearth_worker::sweeper::ExpirySweeper;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

static DB_LOCK: Mutex<()> = Mutex::const_new(());

struct Fixture {
    db: PgPool,
    house_id: Uuid,
    child_id: Uuid,
    _guard: MutexGuard<'static, ()>,
}

impl Fixture {
    async fn new() -> Option<Self> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL").ok()?;
        let guard = DB_LOCK.lock().await;

        let db = PgPool::connect(&url).await.unwrap();
        run_migrations(&db).await.unwrap();

        let owner = User::create(
            &db,
            CreateUser {
                first_name: "Alex".to_string(),
                last_name: None,
                email: Some(format!("worker-{}@example.com", Uuid::new_v4())),
                password_hash: None,
                role: UserRole::Parent,
                is_admin: false,
                house_id: None,
            },
        )
        .await
        .unwrap();

        let house = House::create_with_owner(&db, "worker test house".to_string(), None, owner.id)
            .await
            .unwrap();

        let child = User::create(
            &db,
            CreateUser {
                first_name: "Sam".to_string(),
                last_name: None,
                email: None,
                password_hash: None,
                role: UserRole::Child,
                is_admin: false,
                house_id: Some(house.id),
            },
        )
        .await
        .unwrap();

        Some(Fixture {
            db,
            house_id: house.id,
            child_id: child.id,
            _guard: guard,
        })
    }

    async fn animal(&self, status: AnimalStatus) -> Animal {
        let animal = Animal::create(
            &self.db,
            CreateAnimal {
                house_id: self.house_id,
                name: "Minou".to_string(),
                born_date: Utc::now() - Duration::days(300),
                gender: AnimalGender::Feminine,
                animal_type: AnimalType::Cat,
            },
        )
        .await
        .unwrap();

        Animal::update(
            &self.db,
            animal.id,
            self.house_id,
            UpdateAnimal {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap()
    }

    async fn task(
        &self,
        date: DateTime<Utc>,
        animal_ids: &[Uuid],
        recurrence: Option<RecurrenceType>,
    ) -> Task {
        let mut conn = self.db.acquire().await.unwrap();
        let task = Task::create(
            &mut conn,
            CreateTask {
                house_id: self.house_id,
                title: "sealed-title".to_string(),
                description: Some("sealed-description".to_string()),
                date,
            },
        )
        .await
        .unwrap();

        Task::replace_users(&mut conn, task.id, &[self.child_id]).await.unwrap();
        Task::replace_animals(&mut conn, task.id, animal_ids).await.unwrap();

        if let Some(recurrence_type) = recurrence {
            Recurrence::upsert_for_task(&mut conn, task.id, recurrence_type, date)
                .await
                .unwrap();
        }

        task
    }

    async fn animal_status(&self, id: Uuid) -> AnimalStatus {
        Animal::find_in_house(&self.db, id, self.house_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn cleanup(self) {
        House::delete(&self.db, self.house_id).await.unwrap();
    }
}

async fn drain(job: &dyn ScheduledJob, now: DateTime<Utc>) {
    while job.run(now).await.unwrap() > 0 {}
}

#[tokio::test]
async fn test_regeneration_moves_rule_to_next_occurrence() {
    let Some(fx) = Fixture::new().await else { return };
    let now = Utc::now();
    let animal = fx.animal(AnimalStatus::Normal).await;
    let old = fx
        .task(now - Duration::hours(2), &[animal.id], Some(RecurrenceType::Daily))
        .await;

    let scheduler = RecurrenceScheduler::new(fx.db.clone(), 10);
    drain(&scheduler, now).await;

    let rule = Recurrence::find_by_task(&fx.db, old.id).await.unwrap();
    assert!(rule.is_none(), "rule should have left the old task");

    let tasks = Task::list_by_house(&fx.db, fx.house_id, &Default::default(), "date ASC")
        .await
        .unwrap();
    let next = tasks
        .iter()
        .find(|t| t.id != old.id)
        .expect("next occurrence created");

    assert_eq!(next.date, old.date + Duration::days(1));
    assert_eq!(next.status, TaskStatus::Todo);
    assert_eq!(next.title, "sealed-title");
    assert_eq!(next.description.as_deref(), Some("sealed-description"));

    let relations = Task::relations(&fx.db, &[next.id]).await.unwrap();
    let relations = relations.get(&next.id).cloned().unwrap_or_default();
    assert_eq!(relations.user_ids, vec![fx.child_id]);
    assert_eq!(relations.animal_ids, vec![animal.id]);

    // The rule moved but kept its anchor
    let rule = Recurrence::find_by_task(&fx.db, next.id).await.unwrap().unwrap();
    assert_eq!(rule.date, old.date);

    // Nothing is due any more
    assert_eq!(scheduler.run(now).await.unwrap(), 0);

    fx.cleanup().await;
}

#[tokio::test]
async fn test_regeneration_skips_missed_occurrences() {
    let Some(fx) = Fixture::new().await else { return };
    let now = Utc::now();
    let old = fx
        .task(now - Duration::days(10) - Duration::hours(1), &[], Some(RecurrenceType::Weekly))
        .await;

    let scheduler = RecurrenceScheduler::new(fx.db.clone(), 10);
    let outcome = scheduler.regenerate_one(now).await.unwrap();

    match outcome {
        Some(Regeneration::Moved { date, .. }) => {
            assert_eq!(date, old.date + Duration::weeks(2));
            assert!(date > now);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    fx.cleanup().await;
}

#[tokio::test]
async fn test_monthly_rule_returns_to_its_anchor_day() {
    let Some(fx) = Fixture::new().await else { return };
    let anchor = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
    let feb_29 = Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let current = fx.task(feb_29, &[], None).await;
    let mut conn = fx.db.acquire().await.unwrap();
    Recurrence::upsert_for_task(&mut conn, current.id, RecurrenceType::Monthly, anchor)
        .await
        .unwrap();
    drop(conn);

    let scheduler = RecurrenceScheduler::new(fx.db.clone(), 10);
    match scheduler.regenerate_one(now).await.unwrap() {
        Some(Regeneration::Moved { task_id, date, .. }) => {
            assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 31, 9, 0, 0).unwrap());

            let rule = Recurrence::find_by_task(&fx.db, task_id).await.unwrap().unwrap();
            assert_eq!(rule.date, anchor);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    fx.cleanup().await;
}

#[tokio::test]
async fn test_sweep_downgrades_unvalidated_tasks() {
    let Some(fx) = Fixture::new().await else { return };
    let now = Utc::now();
    let happy = fx.animal(AnimalStatus::Happy).await;
    let sad = fx.animal(AnimalStatus::Sad).await;

    let missed = fx.task(now - Duration::hours(1), &[happy.id, sad.id], None).await;
    let upcoming = fx.task(now + Duration::hours(1), &[happy.id], None).await;

    let sweeper = ExpirySweeper::new(fx.db.clone(), 10);
    drain(&sweeper, now).await;

    let missed = Task::find_by_id(&fx.db, missed.id).await.unwrap().unwrap();
    assert!(missed.is_archived);
    assert!(missed.archived_at.is_some());

    let upcoming = Task::find_by_id(&fx.db, upcoming.id).await.unwrap().unwrap();
    assert!(!upcoming.is_archived);

    assert_eq!(fx.animal_status(happy.id).await, AnimalStatus::Normal);
    assert_eq!(fx.animal_status(sad.id).await, AnimalStatus::Sad);

    fx.cleanup().await;
}

#[tokio::test]
async fn test_sweep_keeps_mood_for_done_tasks() {
    let Some(fx) = Fixture::new().await else { return };
    let now = Utc::now();
    let animal = fx.animal(AnimalStatus::Happy).await;
    let task = fx.task(now - Duration::hours(1), &[animal.id], None).await;

    let mut conn = fx.db.acquire().await.unwrap();
    for (from, to) in [
        (TaskStatus::Todo, TaskStatus::ToValidate),
        (TaskStatus::ToValidate, TaskStatus::Done),
    ] {
        Task::transition(
            &mut conn,
            task.id,
            TaskTransition {
                from,
                to,
                picture_id: None,
                message: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    }
    drop(conn);

    let sweeper = ExpirySweeper::new(fx.db.clone(), 10);
    let swept = sweeper.sweep_one(now).await.unwrap();
    assert!(swept.is_some());
    drain(&sweeper, now).await;

    let task = Task::find_by_id(&fx.db, task.id).await.unwrap().unwrap();
    assert!(task.is_archived);
    assert_eq!(fx.animal_status(animal.id).await, AnimalStatus::Happy);

    fx.cleanup().await;
}

#[tokio::test]
async fn test_tick_regenerates_before_sweeping() {
    let Some(fx) = Fixture::new().await else { return };
    let now = Utc::now();
    let animal = fx.animal(AnimalStatus::Normal).await;
    let old = fx
        .task(now - Duration::minutes(30), &[animal.id], Some(RecurrenceType::Monthly))
        .await;

    let orchestrator = WorkerOrchestrator::new(
        fx.db.clone(),
        OrchestratorConfig {
            poll_interval_secs: 1,
            batch_size: 100,
        },
    );
    let report = orchestrator.tick(now).await;
    assert_eq!(report.failures(), 0);
    assert!(report.handled("recurrence").unwrap() >= 1);
    assert!(report.handled("sweep").unwrap() >= 1);

    let old = Task::find_by_id(&fx.db, old.id).await.unwrap().unwrap();
    assert!(old.is_archived);
    assert_eq!(fx.animal_status(animal.id).await, AnimalStatus::Sad);

    let open = Task::list_by_house(&fx.db, fx.house_id, &Default::default(), "date ASC")
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert!(open[0].date > now);
    assert!(Recurrence::find_by_task(&fx.db, open[0].id).await.unwrap().is_some());

    fx.cleanup().await;
}

#[tokio::test]
async fn test_purge_removes_only_expired_codes() {
    let Some(fx) = Fixture::new().await else { return };
    let now = Utc::now();

    JoinCode::issue(
        &fx.db,
        fx.house_id,
        JoinCodeType::Child,
        &generate_code(),
        now - Duration::minutes(1),
    )
    .await
    .unwrap();
    let live = JoinCode::issue(
        &fx.db,
        fx.house_id,
        JoinCodeType::Parent,
        &generate_code(),
        now + Duration::days(1),
    )
    .await
    .unwrap();

    let purge = JoinCodePurge::new(fx.db.clone());
    assert!(purge.run(now).await.unwrap() >= 1);

    let remaining = JoinCode::list_active_by_house(&fx.db, fx.house_id, now).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, live.id);

    fx.cleanup().await;
}
