//! Assignment validator tests
//!
//! Hard rejections, soft warnings and the rule order between them.

mod fixtures;

use crew_planner::error::PlannerError;
use crew_planner::model::{EmployeeId, Task, TaskId};
use crew_planner::schedule::ScheduleSnapshot;
use crew_planner::validator::{validate_move, Decision, RejectKind, Warning, WarningKind};

use fixtures::{hm, plan, TestEmployee, TestTask};

fn id(s: &str) -> EmployeeId {
    EmployeeId::from(s)
}

fn task<'a>(snapshot: &'a ScheduleSnapshot, task_id: &str) -> &'a Task {
    snapshot.task(&TaskId::from(task_id)).unwrap()
}

#[test]
fn test_missing_skill_is_rejected() {
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![
                TestEmployee::new("nurse").skill("algerens").build(),
                TestEmployee::new("helper").skill("cleaning").build(),
            ],
            vec![TestTask::new("dressing")
                .requires("algerens")
                .window(hm(9, 0), hm(10, 0))
                .assigned_to("nurse")
                .build()],
        ),
        0,
    )
    .unwrap();

    let helper = snapshot.employee(&id("helper")).unwrap();
    let decision = validate_move(
        &snapshot,
        task(&snapshot, "dressing"),
        Some(&id("nurse")),
        helper,
        hm(9, 0),
    )
    .unwrap();

    assert_eq!(
        decision,
        Decision::Rejected(RejectKind::MissingSkills {
            missing: vec!["algerens".to_string()]
        })
    );
}

#[test]
fn test_rejected_exactly_when_skills_are_missing() {
    let skill_sets: [&[&str]; 5] = [&[], &["a"], &["b"], &["a", "b"], &["a", "b", "c"]];
    let required: [&[&str]; 4] = [&[], &["a"], &["a", "b"], &["c"]];

    for (e, skills) in skill_sets.iter().enumerate() {
        for (t, needs) in required.iter().enumerate() {
            let mut employee = TestEmployee::new(&format!("e{e}"));
            for skill in *skills {
                employee = employee.skill(skill);
            }
            let mut builder = TestTask::new(&format!("t{t}"));
            for skill in *needs {
                builder = builder.requires(skill);
            }
            let snapshot = ScheduleSnapshot::build(
                plan(vec![employee.build()], vec![builder.build()]),
                0,
            )
            .unwrap();

            let target = &snapshot.employees()[0];
            let moved = &snapshot.plan().tasks[0];
            let decision = validate_move(&snapshot, moved, None, target, hm(9, 0)).unwrap();

            let missing: Vec<String> = needs
                .iter()
                .filter(|skill| !skills.contains(skill))
                .map(|skill| skill.to_string())
                .collect();
            if missing.is_empty() {
                assert!(!decision.is_rejected(), "{skills:?} vs {needs:?}");
            } else {
                assert_eq!(
                    decision,
                    Decision::Rejected(RejectKind::MissingSkills { missing }),
                    "{skills:?} vs {needs:?}"
                );
            }
        }
    }
}

#[test]
fn test_inactive_employee_is_rejected_after_skills() {
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![
                TestEmployee::new("away").inactive().build(),
                TestEmployee::new("away-skilled").skill("lift").inactive().build(),
            ],
            vec![TestTask::new("a").requires("lift").build()],
        ),
        0,
    )
    .unwrap();

    let moved = task(&snapshot, "a");
    let unskilled = validate_move(&snapshot, moved, None, snapshot.employee(&id("away")).unwrap(), hm(9, 0)).unwrap();
    assert!(matches!(
        unskilled,
        Decision::Rejected(RejectKind::MissingSkills { .. })
    ));

    let skilled = validate_move(
        &snapshot,
        moved,
        None,
        snapshot.employee(&id("away-skilled")).unwrap(),
        hm(9, 0),
    )
    .unwrap();
    assert_eq!(skilled, Decision::Rejected(RejectKind::InactiveEmployee));
}

#[test]
fn test_overlap_on_target_warns_with_conflicting_tasks() {
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![TestEmployee::new("e1").build(), TestEmployee::new("e2").build()],
            vec![
                TestTask::new("a").window(hm(9, 0), hm(10, 0)).assigned_to("e1").build(),
                TestTask::new("b").window(hm(9, 30), hm(10, 30)).assigned_to("e2").build(),
            ],
        ),
        0,
    )
    .unwrap();

    let decision = validate_move(
        &snapshot,
        task(&snapshot, "a"),
        Some(&id("e1")),
        snapshot.employee(&id("e2")).unwrap(),
        hm(9, 0),
    )
    .unwrap();

    assert_eq!(
        decision,
        Decision::AllowedWithWarning(vec![Warning::TimeConflict {
            conflicting: vec![TaskId::from("b")]
        }])
    );
}

#[test]
fn test_adjacent_slot_is_allowed() {
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![TestEmployee::new("e1").build(), TestEmployee::new("e2").build()],
            vec![
                TestTask::new("a").window(hm(9, 0), hm(10, 0)).assigned_to("e1").build(),
                TestTask::new("b").window(hm(10, 0), hm(11, 0)).assigned_to("e2").build(),
            ],
        ),
        0,
    )
    .unwrap();

    let decision = validate_move(
        &snapshot,
        task(&snapshot, "a"),
        Some(&id("e1")),
        snapshot.employee(&id("e2")).unwrap(),
        hm(9, 0),
    )
    .unwrap();
    assert_eq!(decision, Decision::Allowed);
}

#[test]
fn test_staying_in_place_does_not_warn_about_existing_overlap() {
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![TestEmployee::new("e1").build()],
            vec![
                TestTask::new("a").window(hm(9, 0), hm(10, 0)).assigned_to("e1").build(),
                TestTask::new("b").window(hm(9, 30), hm(10, 30)).assigned_to("e1").build(),
            ],
        ),
        0,
    )
    .unwrap();

    let e1 = snapshot.employee(&id("e1")).unwrap();
    let stay = validate_move(&snapshot, task(&snapshot, "a"), Some(&id("e1")), e1, hm(9, 0)).unwrap();
    assert_eq!(stay, Decision::Allowed);

    // Moving within the same employee into b's interval does warn.
    let shift = validate_move(&snapshot, task(&snapshot, "a"), Some(&id("e1")), e1, hm(10, 0)).unwrap();
    assert!(shift.has_warning(WarningKind::TimeConflict));
}

#[test]
fn test_overload_is_computed_with_the_move_applied() {
    // 8 hour day with 7.5 hours already booked.
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![
                TestEmployee::new("e1").build(),
                TestEmployee::new("busy").hours(hm(8, 0), hm(16, 0)).build(),
            ],
            vec![
                TestTask::new("a")
                    .window(hm(16, 0), hm(17, 0))
                    .duration(60)
                    .assigned_to("e1")
                    .build(),
                TestTask::new("booked")
                    .window(hm(8, 0), hm(15, 30))
                    .duration(450)
                    .assigned_to("busy")
                    .build(),
            ],
        ),
        0,
    )
    .unwrap();

    let decision = validate_move(
        &snapshot,
        task(&snapshot, "a"),
        Some(&id("e1")),
        snapshot.employee(&id("busy")).unwrap(),
        hm(15, 30),
    )
    .unwrap();

    assert!(!decision.is_rejected());
    assert!(!decision.has_warning(WarningKind::TimeConflict));
    match decision.warnings() {
        [Warning::Overload { percent_of_workday }] => {
            assert!((percent_of_workday - 106.25).abs() < 1e-9);
        }
        other => panic!("expected a single overload warning, got {other:?}"),
    }
}

#[test]
fn test_conflict_and_overload_are_both_reported() {
    let snapshot = ScheduleSnapshot::build(
        plan(
            vec![
                TestEmployee::new("e1").build(),
                TestEmployee::new("busy").hours(hm(8, 0), hm(12, 0)).build(),
            ],
            vec![
                TestTask::new("a")
                    .window(hm(9, 0), hm(10, 0))
                    .duration(60)
                    .assigned_to("e1")
                    .build(),
                TestTask::new("booked")
                    .window(hm(8, 0), hm(12, 0))
                    .duration(240)
                    .assigned_to("busy")
                    .build(),
            ],
        ),
        0,
    )
    .unwrap();

    let decision = validate_move(
        &snapshot,
        task(&snapshot, "a"),
        Some(&id("e1")),
        snapshot.employee(&id("busy")).unwrap(),
        hm(9, 0),
    )
    .unwrap();

    assert!(decision.has_warning(WarningKind::TimeConflict));
    assert!(decision.has_warning(WarningKind::Overload));
}

#[test]
fn test_malformed_task_is_an_error() {
    let snapshot = ScheduleSnapshot::build(
        plan(vec![TestEmployee::new("e1").build()], vec![]),
        0,
    )
    .unwrap();
    let broken = TestTask::new("broken").duration(0).build();

    let result = validate_move(
        &snapshot,
        &broken,
        None,
        snapshot.employee(&id("e1")).unwrap(),
        hm(9, 0),
    );
    assert!(matches!(result, Err(PlannerError::InvalidTask { .. })));
}
