//! Finalize workflow integration tests.
//!
//! Runs the meeting service over in-memory storage:
//!
//! - the overlap scenarios for shared and unrelated participants
//! - finalize is not idempotent
//! - finalized meetings reject update and delete for every caller
//! - concurrent finalizes never commit two overlapping meetings

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use scheduler_service::access::Participatable;
use scheduler_service::errors::{ConflictKind, NotFoundKind, SchedulerError};
use scheduler_service::models::{Meeting, UpdateMeetingRequest, User};
use scheduler_service::repositories::memory::InMemoryRepository;
use scheduler_service::repositories::Repository;
use scheduler_service::services::MeetingService;
use scheduler_test_utils::{admin_ctx, at, ctx_for, meeting_request, member, seed_users};
use std::sync::Arc;
use tokio::sync::Barrier;

struct Harness {
    meetings: Arc<InMemoryRepository<Meeting>>,
    users: Arc<InMemoryRepository<User>>,
    service: Arc<MeetingService>,
}

impl Harness {
    fn new() -> Self {
        let users = Arc::new(InMemoryRepository::<User>::new());
        let meetings = Arc::new(InMemoryRepository::<Meeting>::linked_to(users.clone()));
        let service = Arc::new(MeetingService::new(meetings.clone(), users.clone()));
        Self {
            meetings,
            users,
            service,
        }
    }

    async fn seed<const N: usize>(&self, names: [&str; N]) -> [User; N] {
        seed_users(self.users.as_ref(), &names)
            .await
            .try_into()
            .expect("seeded count matches")
    }
}

/// No two finalized meetings that share a participant intersect.
async fn assert_finalized_schedule_consistent(meetings: &InMemoryRepository<Meeting>) {
    let finalized: Vec<Meeting> = meetings
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.is_finalized)
        .collect();

    for a in &finalized {
        for b in finalized.iter().filter(|b| b.id != a.id) {
            let shares_participant = a.participant_ids().iter().any(|id| b.is_participant(*id));
            assert!(
                !(shares_participant && a.overlaps(b.start_time, b.end_time)),
                "finalized meetings {} and {} overlap",
                a.id,
                b.id
            );
        }
    }
}

#[tokio::test]
async fn test_shared_employee_overlap_is_rejected() -> Result<()> {
    let h = Harness::new();
    let [manager_one, employee, manager_three] = h.seed(["Una", "Two", "Tre"]).await;

    let m1 = h
        .service
        .create(
            &ctx_for(&manager_one),
            meeting_request(manager_one.id, employee.id, at(10, 0), at(11, 0)),
        )
        .await?;
    h.service.finalize(&ctx_for(&manager_one), m1.id).await?;

    let m2 = h
        .service
        .create(
            &ctx_for(&manager_three),
            meeting_request(manager_three.id, employee.id, at(10, 30), at(11, 30)),
        )
        .await?;
    let err = h
        .service
        .finalize(&ctx_for(&manager_three), m2.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SchedulerError::Conflict(ConflictKind::OverlapExists)
    ));
    assert!(!h.meetings.find_by_id(m2.id).await?.unwrap().is_finalized);
    Ok(())
}

#[tokio::test]
async fn test_back_to_back_unrelated_meeting_finalizes() -> Result<()> {
    let h = Harness::new();
    let [one, two, five, six] = h.seed(["One", "Two", "Five", "Six"]).await;

    let m1 = h
        .service
        .create(&ctx_for(&one), meeting_request(one.id, two.id, at(10, 0), at(11, 0)))
        .await?;
    h.service.finalize(&ctx_for(&one), m1.id).await?;

    let m3 = h
        .service
        .create(&ctx_for(&six), meeting_request(six.id, five.id, at(11, 0), at(12, 0)))
        .await?;
    let finalized = h.service.finalize(&ctx_for(&five), m3.id).await?;
    assert!(finalized.is_finalized);
    Ok(())
}

#[tokio::test]
async fn test_finalize_twice_conflicts() -> Result<()> {
    let h = Harness::new();
    let [a, b] = h.seed(["Ada", "Bo"]).await;
    let m = h
        .service
        .create(&ctx_for(&a), meeting_request(a.id, b.id, at(9, 0), at(9, 30)))
        .await?;

    h.service.finalize(&ctx_for(&a), m.id).await?;
    let err = h.service.finalize(&ctx_for(&a), m.id).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Conflict(ConflictKind::AlreadyFinalized)
    ));
    Ok(())
}

#[tokio::test]
async fn test_finalized_meeting_rejects_update_and_delete_for_admin() -> Result<()> {
    let h = Harness::new();
    let [a, b] = h.seed(["Ada", "Bo"]).await;
    let m = h
        .service
        .create(&ctx_for(&a), meeting_request(a.id, b.id, at(9, 0), at(9, 30)))
        .await?;
    h.service.finalize(&admin_ctx(), m.id).await?;

    let patch = UpdateMeetingRequest {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    for caller in [ctx_for(&a), ctx_for(&b), admin_ctx()] {
        assert!(matches!(
            h.service.update(&caller, m.id, patch.clone()).await,
            Err(SchedulerError::Conflict(ConflictKind::FinalizedImmutable))
        ));
        assert!(matches!(
            h.service.delete(&caller, m.id).await,
            Err(SchedulerError::Conflict(ConflictKind::FinalizedImmutable))
        ));
    }
    assert_eq!(h.meetings.find_by_id(m.id).await?.unwrap().title, "One-on-one");
    Ok(())
}

#[tokio::test]
async fn test_finalize_with_deleted_participant() -> Result<()> {
    let h = Harness::new();
    let [a, b] = h.seed(["Ada", "Bo"]).await;
    let m = h
        .service
        .create(&ctx_for(&a), meeting_request(a.id, b.id, at(9, 0), at(9, 30)))
        .await?;
    h.users.delete_by_id(b.id).await?;

    let err = h.service.finalize(&ctx_for(&a), m.id).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::NotFound(NotFoundKind::ParticipantMissing)
    ));
    Ok(())
}

#[tokio::test]
async fn test_non_participant_cannot_finalize() -> Result<()> {
    let h = Harness::new();
    let [a, b, c] = h.seed(["Ada", "Bo", "Cy"]).await;
    let m = h
        .service
        .create(&ctx_for(&a), meeting_request(a.id, b.id, at(9, 0), at(9, 30)))
        .await?;

    let err = h.service.finalize(&ctx_for(&c), m.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AccessDenied));

    // Knowing a participant's username is not enough; the user id decides.
    let impostor = member(c.id, "ada");
    let err = h.service.finalize(&impostor, m.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AccessDenied));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finalize_admits_exactly_one() -> Result<()> {
    for _ in 0..25 {
        let h = Harness::new();
        let [mia, eli, ola] = h.seed(["Mia", "Eli", "Ola"]).await;
        let admin = admin_ctx();

        let first = h
            .service
            .create(&admin, meeting_request(mia.id, eli.id, at(10, 0), at(11, 0)))
            .await?;
        let second = h
            .service
            .create(&admin, meeting_request(mia.id, ola.id, at(10, 30), at(11, 30)))
            .await?;

        let barrier = Arc::new(Barrier::new(2));
        let tasks: Vec<_> = [first.id, second.id]
            .into_iter()
            .map(|id| {
                let service = Arc::clone(&h.service);
                let barrier = Arc::clone(&barrier);
                let admin = admin.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    service.finalize(&admin, id).await
                })
            })
            .collect();

        let mut committed = 0;
        for task in tasks {
            match task.await? {
                Ok(_) => committed += 1,
                Err(SchedulerError::Conflict(ConflictKind::OverlapExists)) => {}
                Err(other) => return Err(other.into()),
            }
        }
        assert_eq!(committed, 1);
        assert_finalized_schedule_consistent(&h.meetings).await;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finalize_storm_keeps_schedule_consistent() -> Result<()> {
    let h = Harness::new();
    let users = h.seed(["Ann", "Ben", "Cal", "Dee"]).await;
    let admin = admin_ctx();

    // Pairs of the four users, in staggered half-hour slots, so many
    // candidates share a participant and intersect.
    let mut ids = Vec::new();
    for (i, manager) in users.iter().enumerate() {
        for (j, employee) in users.iter().enumerate().filter(|(j, _)| *j != i) {
            let offset = u32::try_from((i * 3 + j) % 6)?;
            let start = at(9 + offset / 2, (offset % 2) * 30);
            let end = at(10 + offset / 2, (offset % 2) * 30);
            let m = h
                .service
                .create(&admin, meeting_request(manager.id, employee.id, start, end))
                .await?;
            ids.push(m.id);
        }
    }

    let barrier = Arc::new(Barrier::new(ids.len()));
    let tasks: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let service = Arc::clone(&h.service);
            let barrier = Arc::clone(&barrier);
            let admin = admin.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                service.finalize(&admin, id).await
            })
        })
        .collect();

    let mut committed = 0;
    for task in tasks {
        if task.await?.is_ok() {
            committed += 1;
        }
    }

    assert!(committed >= 1);
    assert_finalized_schedule_consistent(&h.meetings).await;
    Ok(())
}
