use super::common::*;
use std::sync::Arc;

use crate::registry::domain::{
    ApprenticeshipId, ApprenticeshipTypeId, CuratorGroupId, CuratorId, MissingEntity, UserId,
};
use crate::registry::records::{
    ApprenticeshipOverview, ApprenticeshipUpdate, NewApprenticeshipType, RecordService,
    RecordServiceError,
};
use crate::registry::transitions::ConfirmFlag;
use crate::registry::{ApprenticeshipFlag, RequestContext};

fn update_for(record: &crate::registry::Apprenticeship) -> ApprenticeshipUpdate {
    ApprenticeshipUpdate {
        id: record.id.clone(),
        user_id: record.user_id.clone(),
        apprenticeship_type_id: record.apprenticeship_type_id.clone(),
        curator_id: None,
        curator_group_id: None,
        start_date: record.period.start_date,
        end_date: record.period.end_date,
        academic_year: record.academic_year.clone(),
        employment_status: Some("employed".to_string()),
        referral: None,
        report: Some("reports/anna-2024.pdf".to_string()),
    }
}

#[test]
fn create_starts_with_all_flags_unset() {
    let h = harness();
    let record = h.create_record();

    assert!(record.confirmed_flags().is_empty());
    assert_eq!(record.user_id, UserId::from(STUDENT_ID));
    assert_eq!(record.period.duration_days(), 28);
    assert_eq!(h.records.get(&record.id).expect("stored"), record);
}

#[test]
fn create_defaults_user_to_the_actor() {
    let h = harness();
    let mut input = new_apprenticeship();
    input.user_id = None;

    let ctx = RequestContext::for_actor(UserId::from(STUDENT_ID));
    let record = h.records.create(&ctx, input.clone()).expect("created");
    assert_eq!(record.user_id, UserId::from(STUDENT_ID));

    match h.records.create(&RequestContext::system(), input) {
        Err(RecordServiceError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn create_requires_existing_type_and_valid_period() {
    let h = harness();

    let mut unknown_type = new_apprenticeship();
    unknown_type.apprenticeship_type_id = ApprenticeshipTypeId::from("type-ghost");
    assert!(matches!(
        h.records.create(&RequestContext::system(), unknown_type),
        Err(RecordServiceError::NotFound(MissingEntity::ApprenticeshipType(_)))
    ));

    let mut inverted = new_apprenticeship();
    inverted.end_date = date(2024, 5, 1);
    let err = h
        .records
        .create(&RequestContext::system(), inverted)
        .expect_err("inverted range rejected");
    assert_eq!(err.kind(), "validation");
}

#[test]
fn update_ignores_unknown_curator_references() {
    let h = harness();
    let record = h.create_record();

    let mut update = update_for(&record);
    update.curator_id = Some(CuratorId::from("curator-ghost"));
    update.curator_group_id = Some(CuratorGroupId::from("group-ghost"));

    let updated = h
        .records
        .update(&RequestContext::system(), update)
        .expect("update succeeds");
    assert!(updated.curator_id.is_none());
    assert!(updated.curator_group_id.is_none());
    assert_eq!(updated.employment_status.as_deref(), Some("employed"));
}

#[test]
fn update_connects_known_curators_and_keeps_them_on_bad_ids() {
    let h = harness();
    let record = h.create_record();
    let ctx = RequestContext::system();

    let mut assign = update_for(&record);
    assign.curator_id = Some(CuratorId::from(CURATOR_ID));
    assign.curator_group_id = Some(CuratorGroupId::from(GROUP_ID));
    let assigned = h.records.update(&ctx, assign).expect("assigned");
    assert_eq!(assigned.curator_id, Some(CuratorId::from(CURATOR_ID)));

    let mut reassign = update_for(&record);
    reassign.curator_id = Some(CuratorId::from("curator-ghost"));
    let kept = h.records.update(&ctx, reassign).expect("update succeeds");
    assert_eq!(kept.curator_id, Some(CuratorId::from(CURATOR_ID)));
    assert_eq!(kept.curator_group_id, Some(CuratorGroupId::from(GROUP_ID)));
}

#[test]
fn update_preserves_workflow_flags() {
    let h = harness();
    let record = h.create_record();
    let ctx = RequestContext::system();
    h.transitions
        .confirm(
            &ctx,
            ConfirmFlag {
                apprenticeship_id: record.id.clone(),
                user_id: UserId::from(STUDENT_ID),
                flag: ApprenticeshipFlag::Attendance,
            },
        )
        .expect("confirmed");

    let updated = h
        .records
        .update(&ctx, update_for(&record))
        .expect("update succeeds");
    assert!(updated.attendance);
}

#[test]
fn update_requires_existing_user_and_record() {
    let h = harness();
    let record = h.create_record();
    let ctx = RequestContext::system();

    let mut ghost_user = update_for(&record);
    ghost_user.user_id = UserId::from("user-ghost");
    assert!(matches!(
        h.records.update(&ctx, ghost_user),
        Err(RecordServiceError::NotFound(MissingEntity::User(_)))
    ));

    let mut ghost_record = update_for(&record);
    ghost_record.id = ApprenticeshipId::from("apprt-ghost");
    assert!(matches!(
        h.records.update(&ctx, ghost_record),
        Err(RecordServiceError::NotFound(MissingEntity::Apprenticeship(_)))
    ));
}

#[test]
fn delete_returns_removed_record() {
    let h = harness();
    let record = h.create_record();
    let ctx = RequestContext::system();

    let removed = h.records.delete(&ctx, &record.id).expect("deleted");
    assert_eq!(removed.id, record.id);
    assert!(h.records.find_by_user(&record.user_id).expect("query").is_none());
    assert!(matches!(
        h.records.delete(&ctx, &record.id),
        Err(RecordServiceError::NotFound(_))
    ));
}

#[test]
fn type_lifecycle_respects_references() {
    let h = harness();
    let ctx = RequestContext::system();

    let created = h
        .records
        .create_type(
            &ctx,
            NewApprenticeshipType {
                name: "  Pre-diploma practice ".to_string(),
                description: Some("   ".to_string()),
            },
        )
        .expect("type created");
    assert_eq!(created.name, "Pre-diploma practice");
    assert!(created.description.is_none());
    assert_eq!(h.records.list_types().expect("types").len(), 2);

    h.records
        .delete_type(&ctx, &created.id)
        .expect("unused type deleted");

    h.create_record();
    let err = h
        .records
        .delete_type(&ctx, &ApprenticeshipTypeId::from(TYPE_ID))
        .expect_err("referenced type kept");
    assert_eq!(err.kind(), "conflict");
    assert_eq!(h.records.list_types().expect("types").len(), 1);
    assert_eq!(h.records.list(&Default::default()).expect("list").len(), 1);
}

#[test]
fn blank_type_names_are_rejected() {
    let h = harness();
    let err = h
        .records
        .create_type(
            &RequestContext::system(),
            NewApprenticeshipType {
                name: " ".to_string(),
                description: None,
            },
        )
        .expect_err("blank name rejected");
    assert!(matches!(err, RecordServiceError::Validation(_)));
}

#[test]
fn overview_branches_on_role() {
    let h = harness();
    h.create_record();

    let student = RequestContext::for_actor(UserId::from(STUDENT_ID));
    match h.records.overview(&student).expect("student overview") {
        ApprenticeshipOverview::Personal(records) => assert_eq!(records.len(), 1),
        other => panic!("expected personal view, got {other:?}"),
    }

    let staff = RequestContext::for_actor(UserId::from(STAFF_ID));
    match h.records.overview(&staff).expect("staff overview") {
        ApprenticeshipOverview::Administrative(details) => {
            assert_eq!(details.len(), 1);
            assert!(details[0].user.is_some());
        }
        other => panic!("expected administrative view, got {other:?}"),
    }

    let ghost = RequestContext::for_actor(UserId::from("user-ghost"));
    assert!(matches!(
        h.records.overview(&ghost),
        Err(RecordServiceError::NotFound(MissingEntity::User(_)))
    ));
}

#[test]
fn store_outage_maps_to_store_error() {
    let service = RecordService::new(Arc::new(UnavailableStore));
    let err = service
        .list(&Default::default())
        .expect_err("outage surfaces");
    assert_eq!(err.kind(), "store_failed");
}
