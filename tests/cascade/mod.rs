use rstest::rstest;

use basegrid::catalog::CatalogError;
use basegrid::config::schema::{CommitMode, FailurePolicy};
use basegrid::data_types::{FieldType, ViewType};

use crate::testutils::TEST_USER_ID;
use crate::TestWorkspace;

#[tokio::test]
async fn test_create_base_cascade_order() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;

    let created = t.create_base("Projects").await;

    assert_eq!(
        t.writes(),
        vec![
            "create_base",
            "create_table",
            "create_field",
            "create_field",
            "create_field",
            "create_view",
        ]
    );

    let store = &t.workspace.store;
    let tables = store.list_tables(&created.base.id, TEST_USER_ID).await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "Table 1");

    let fields = store.list_fields(&tables[0].id, TEST_USER_ID).await.unwrap();
    let shape: Vec<(i32, FieldType)> = fields.iter().map(|f| (f.position, f.field_type)).collect();
    assert_eq!(
        shape,
        vec![
            (0, FieldType::Text),
            (1, FieldType::Text),
            (2, FieldType::Select),
        ]
    );

    let views = store.list_views(&tables[0].id, TEST_USER_ID).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].view_type, ViewType::Grid);

    // The listing was reloaded and the modal closed
    assert_eq!(t.workspace.data().bases.len(), 1);
    assert!(!t.workspace.base_modal.open);
}

#[tokio::test]
async fn test_create_table_cascade() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.create_base("Projects").await;
    t.workspace.select_base(&created.base.id).await.unwrap();
    t.repository.clear_calls();

    t.workspace.table_modal.show();
    t.workspace.table_modal.name = "Tasks".to_string();
    t.workspace.table_modal.description = "Things to do".to_string();
    let table = t.workspace.submit_table_modal().await.unwrap();

    assert_eq!(
        t.writes(),
        vec!["create_table", "create_field", "create_field", "create_view"]
    );
    assert_eq!(table.table.description.as_deref(), Some("Things to do"));

    let fields = t
        .workspace
        .store
        .list_fields(&table.table.id, TEST_USER_ID)
        .await
        .unwrap();
    let shape: Vec<(i32, FieldType)> = fields.iter().map(|f| (f.position, f.field_type)).collect();
    assert_eq!(shape, vec![(0, FieldType::Text), (1, FieldType::Text)]);

    assert_eq!(t.workspace.data().tables.len(), 2);
    assert!(!t.workspace.table_modal.open);
}

#[rstest]
#[case::table("create_table", 0)]
#[case::first_field("create_field", 0)]
#[case::last_field("create_field", 2)]
#[case::view("create_view", 0)]
#[tokio::test]
async fn test_failed_cascade_rolls_back(#[case] operation: &'static str, #[case] skip: usize) {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.repository.fail_on(operation, skip);

    t.workspace.base_modal.show();
    t.workspace.base_modal.name = "Projects".to_string();
    let err = t.workspace.submit_base_modal().await.unwrap_err();
    assert!(matches!(err, CatalogError::SqlxError(_)));

    // The form stays open with the underlying message
    assert!(t.workspace.base_modal.open);
    assert!(t
        .workspace
        .base_modal
        .error
        .as_deref()
        .unwrap()
        .contains(&format!("injected failure in {operation}")));

    let bases = t.workspace.store.list_bases(TEST_USER_ID).await.unwrap();
    assert!(bases.is_empty());

    // Compensation runs newest first
    let deletes: Vec<&str> = t
        .writes()
        .into_iter()
        .filter(|c| c.starts_with("delete_"))
        .collect();
    assert_eq!(deletes.last(), Some(&"delete_base"));
    if operation == "create_table" {
        assert_eq!(deletes, vec!["delete_base"]);
    } else {
        assert_eq!(deletes[deletes.len() - 2], "delete_table");
    }
}

#[tokio::test]
async fn test_rollback_deletes_children_first() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.repository.fail_on("create_view", 0);

    t.workspace.base_modal.show();
    t.workspace.base_modal.name = "Projects".to_string();
    t.workspace.submit_base_modal().await.unwrap_err();

    let deletes: Vec<&str> = t
        .writes()
        .into_iter()
        .filter(|c| c.starts_with("delete_"))
        .collect();
    assert_eq!(
        deletes,
        vec![
            "delete_field",
            "delete_field",
            "delete_field",
            "delete_table",
            "delete_base",
        ]
    );
}

#[tokio::test]
async fn test_failed_cascade_can_leave_orphans() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::LeaveOrphans).await;
    t.repository.fail_on("create_field", 1);

    t.workspace.base_modal.show();
    t.workspace.base_modal.name = "Projects".to_string();
    t.workspace.submit_base_modal().await.unwrap_err();
    assert!(t.workspace.base_modal.open);

    assert!(!t.writes().iter().any(|c| c.starts_with("delete_")));

    let store = &t.workspace.store;
    let bases = store.list_bases(TEST_USER_ID).await.unwrap();
    assert_eq!(bases.len(), 1);
    let tables = store.list_tables(&bases[0].id, TEST_USER_ID).await.unwrap();
    assert_eq!(tables.len(), 1);
    let fields = store.list_fields(&tables[0].id, TEST_USER_ID).await.unwrap();
    assert_eq!(fields.len(), 1);
    assert!(store
        .list_views(&tables[0].id, TEST_USER_ID)
        .await
        .unwrap()
        .is_empty());

    // Retrying from the still-open form works
    t.workspace.submit_base_modal().await.unwrap();
    assert_eq!(t.workspace.data().bases.len(), 2);
}

#[tokio::test]
async fn test_failure_before_anything_was_created() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.repository.fail_on("create_base", 0);

    t.workspace.base_modal.show();
    t.workspace.base_modal.name = "Projects".to_string();
    t.workspace.submit_base_modal().await.unwrap_err();

    assert_eq!(t.writes(), vec!["create_base"]);
}
