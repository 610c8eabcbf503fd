use std::sync::Arc;

use serde_json::json;

use basegrid::auth::{AuthProvider, LocalAuthProvider};
use basegrid::catalog::CatalogError;
use basegrid::config::schema::{CommitMode, FailurePolicy};
use basegrid::data_types::{FieldType, SelectOption, ViewType};
use basegrid::grid::{CellCommit, CellDisplay, EndEdit};
use basegrid::selection::Selection;

use crate::testutils::{signed_in_auth, test_users, TEST_USER_ID};
use crate::TestWorkspace;

#[tokio::test]
async fn test_signed_out_workspace_touches_nothing() {
    let auth = Arc::new(LocalAuthProvider::new(test_users()));
    let mut t = TestWorkspace::with_auth(auth, CommitMode::OnConfirm, FailurePolicy::Rollback).await;

    t.workspace.refresh().await.unwrap();
    assert!(t.workspace.data().bases.is_empty());

    t.workspace.base_modal.show();
    t.workspace.base_modal.name = "Projects".to_string();
    assert!(matches!(
        t.workspace.submit_base_modal().await,
        Err(CatalogError::Unauthenticated)
    ));
    assert!(matches!(
        t.workspace.add_record().await,
        Err(CatalogError::Unauthenticated)
    ));
    assert!(matches!(
        t.workspace.update_cell_value("rec_1", "fld_1", json!("x")).await,
        Err(CatalogError::Unauthenticated)
    ));

    assert!(t.repository.calls().is_empty());
    assert_eq!(t.workspace.selection(), &Selection::NoSelection);
}

#[tokio::test]
async fn test_logout_resets_the_workspace() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    assert_eq!(t.workspace.selection().table_id(), Some(created.table.id.as_str()));
    assert_eq!(t.workspace.data().fields.len(), 3);

    t.workspace.logout().await;

    assert!(t.workspace.auth.me().await.is_err());
    assert_eq!(t.workspace.selection(), &Selection::NoSelection);
    assert!(t.workspace.data().bases.is_empty());
    assert!(t.workspace.data().fields.is_empty());
    assert!(t.workspace.render_grid().rows.is_empty());
}

#[tokio::test]
async fn test_selecting_a_base_drops_table_and_view() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let first = t.open_default_table().await;
    assert!(t.workspace.select_view(&first.view.id).await.unwrap());
    assert_eq!(t.workspace.selection().view_id(), Some(first.view.id.as_str()));

    let second = t.create_base("Side projects").await;
    t.workspace.select_base(&second.base.id).await.unwrap();

    assert_eq!(
        t.workspace.selection(),
        &Selection::BaseSelected {
            base_id: second.base.id.clone()
        }
    );
    assert!(t.workspace.data().fields.is_empty());
    assert!(t.workspace.data().views.is_empty());
    assert_eq!(t.workspace.data().tables.len(), 1);
    assert_eq!(t.workspace.data().tables[0].id, second.table.id);
}

#[tokio::test]
async fn test_cell_update_shows_without_refetch() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let name = &created.fields[0];
    t.repository.clear_calls();

    let commit = t
        .workspace
        .update_cell_value(&record.id, &name.id, json!("Launch"))
        .await
        .unwrap();
    assert_eq!(commit, CellCommit::Persisted);
    assert_eq!(t.repository.calls(), vec!["update_record"]);

    let grid = t.workspace.render_grid();
    assert_eq!(grid.headers, vec!["Name", "Notes", "Status"]);
    assert_eq!(grid.rows.len(), 1);
    assert_eq!(grid.rows[0].cells[0], CellDisplay::Text("Launch".to_string()));

    // Persisted for the next session too
    let records = t
        .workspace
        .store
        .list_records(&created.table.id, TEST_USER_ID)
        .await
        .unwrap();
    assert_eq!(records[0].value(&name.id), Some(&json!("Launch")));
}

#[tokio::test]
async fn test_failed_write_keeps_local_value() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let notes = &created.fields[1];
    t.repository.fail_on("update_record", 0);

    let commit = t
        .workspace
        .update_cell_value(&record.id, &notes.id, json!("draft"))
        .await
        .unwrap();
    assert_eq!(commit, CellCommit::LocalOnly);

    let grid = t.workspace.render_grid();
    assert_eq!(grid.rows[0].cells[1], CellDisplay::Text("draft".to_string()));
}

#[tokio::test]
async fn test_update_of_unloaded_record() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    t.repository.clear_calls();

    let commit = t
        .workspace
        .update_cell_value("rec_missing", &created.fields[0].id, json!("x"))
        .await
        .unwrap();
    assert_eq!(commit, CellCommit::UnknownRecord);
    assert!(t.writes().is_empty());
}

#[tokio::test]
async fn test_select_cell_renders_option_label() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();

    let priority = t
        .workspace
        .add_field(
            "Priority",
            FieldType::Select,
            vec![SelectOption::new("a", "Alpha", "red")],
        )
        .await
        .unwrap();
    assert_eq!(priority.position, 3);
    assert_eq!(t.workspace.data().fields.len(), 4);

    t.workspace
        .update_cell_value(&record.id, &priority.id, json!("a"))
        .await
        .unwrap();
    let cell = &t.workspace.render_grid().rows[0].cells[3];
    assert!(matches!(cell, CellDisplay::Tag { label, .. } if label == "Alpha"));

    // An id that isn't among the options shows nothing
    t.workspace
        .update_cell_value(&record.id, &priority.id, json!("z"))
        .await
        .unwrap();
    assert_eq!(t.workspace.render_grid().rows[0].cells[3], CellDisplay::Empty);

    // Picking by label stores the id
    t.workspace
        .choose_option(&record.id, &priority.id, "alpha")
        .await
        .unwrap();
    assert_eq!(
        t.workspace.data().records[0].value(&priority.id),
        Some(&json!("a"))
    );
}

#[tokio::test]
async fn test_on_confirm_edit() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let name = created.fields[0].id.clone();
    t.repository.clear_calls();

    t.workspace.begin_edit(&record.id, &name).unwrap();
    assert_eq!(t.workspace.input_text("Launch").await.unwrap(), None);
    // The draft shows while editing
    assert_eq!(
        t.workspace.render_grid().rows[0].cells[0],
        CellDisplay::Text("Launch".to_string())
    );

    // Escape throws the draft away
    assert_eq!(t.workspace.end_edit(EndEdit::Escape).await.unwrap(), None);
    assert!(t.writes().is_empty());
    assert_eq!(t.workspace.render_grid().rows[0].cells[0], CellDisplay::Empty);

    t.workspace.begin_edit(&record.id, &name).unwrap();
    t.workspace.input_text("Launch").await.unwrap();
    assert_eq!(
        t.workspace.end_edit(EndEdit::Enter).await.unwrap(),
        Some(CellCommit::Persisted)
    );
    assert_eq!(t.writes(), vec!["update_record"]);
    assert_eq!(
        t.workspace.render_grid().rows[0].cells[0],
        CellDisplay::Text("Launch".to_string())
    );
}

#[tokio::test]
async fn test_per_change_edit() {
    let mut t = TestWorkspace::new(CommitMode::PerChange, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let notes = created.fields[1].id.clone();
    t.repository.clear_calls();

    t.workspace.begin_edit(&record.id, &notes).unwrap();
    for text in ["L", "La", "Lau"] {
        assert_eq!(
            t.workspace.input_text(text).await.unwrap(),
            Some(CellCommit::Persisted)
        );
    }
    assert_eq!(t.writes(), vec!["update_record"; 3]);

    // Nothing to roll back: every keystroke is already saved
    assert_eq!(t.workspace.end_edit(EndEdit::Escape).await.unwrap(), None);
    assert_eq!(
        t.workspace.render_grid().rows[0].cells[1],
        CellDisplay::Text("Lau".to_string())
    );
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let amount = t
        .workspace
        .add_field("Amount", FieldType::Number, vec![])
        .await
        .unwrap();
    t.repository.clear_calls();

    t.workspace.begin_edit(&record.id, &amount.id).unwrap();
    t.workspace.input_text("twelve").await.unwrap();
    assert!(matches!(
        t.workspace.end_edit(EndEdit::Blur).await,
        Err(CatalogError::InvalidValue { .. })
    ));
    assert!(t.writes().is_empty());
}

#[tokio::test]
async fn test_toggle_checkbox() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let done = t
        .workspace
        .add_field("Done", FieldType::Checkbox, vec![])
        .await
        .unwrap();

    assert_eq!(
        t.workspace.render_grid().rows[0].cells[3],
        CellDisplay::Checkbox(false)
    );

    t.workspace.toggle_checkbox(&record.id, &done.id).await.unwrap();
    assert_eq!(
        t.workspace.render_grid().rows[0].cells[3],
        CellDisplay::Checkbox(true)
    );

    t.workspace.toggle_checkbox(&record.id, &done.id).await.unwrap();
    assert_eq!(
        t.workspace.data().records[0].value(&done.id),
        Some(&json!(false))
    );
}

#[tokio::test]
async fn test_new_records_go_on_top() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;

    let first = t.workspace.add_record().await.unwrap();
    let second = t.workspace.add_record().await.unwrap();
    let ids: Vec<String> = t
        .workspace
        .render_grid()
        .rows
        .into_iter()
        .map(|r| r.record_id)
        .collect();
    assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

    // Same order after a reload from storage
    t.workspace.select_base(&created.base.id).await.unwrap();
    t.workspace.select_table(&created.table.id).await.unwrap();
    let ids: Vec<String> = t.workspace.data().records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_field_and_view_forms() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    let status = created.fields[2].id.clone();

    let renamed = t.workspace.rename_field(&status, "Stage").await.unwrap();
    assert_eq!(renamed.name, "Stage");
    assert_eq!(t.workspace.render_grid().headers[2], "Stage");

    t.workspace
        .set_field_options(&status, vec![SelectOption::new("open", "Open", "green")])
        .await
        .unwrap();
    assert_eq!(t.workspace.data().fields[2].options.len(), 1);

    assert!(matches!(
        t.workspace.rename_field(&status, "  ").await,
        Err(CatalogError::Validation { .. })
    ));

    let view = t
        .workspace
        .add_view("Due dates", ViewType::Calendar)
        .await
        .unwrap();
    let views: Vec<&str> = t.workspace.data().views.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(views, vec![created.view.id.as_str(), view.id.as_str()]);
}

#[tokio::test]
async fn test_sign_out_at_the_provider_hides_the_workspace() {
    let auth = signed_in_auth();
    let mut t =
        TestWorkspace::with_auth(auth.clone(), CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.open_default_table().await;
    t.workspace.add_record().await.unwrap();
    assert_eq!(t.workspace.render_grid().rows.len(), 1);

    // Another handle on the same session signs out
    auth.logout().await;

    assert_eq!(t.workspace.selection(), &Selection::NoSelection);
    assert!(t.workspace.data().fields.is_empty());
    assert!(t.workspace.render_grid().rows.is_empty());
    assert_eq!(t.workspace.auth_state().user, None);

    // A different user signing in never sees the previous user's data
    auth.sign_in("grace@example.com", "cobol").unwrap();
    assert!(t.workspace.render_grid().rows.is_empty());

    t.workspace.refresh().await.unwrap();
    assert_eq!(t.workspace.selection(), &Selection::NoSelection);
    assert!(t.workspace.data().bases.is_empty());
    assert!(!t.workspace.auth_state().is_loading);
}

#[tokio::test]
async fn test_tables_only_go_into_owned_bases() {
    let auth = signed_in_auth();
    let mut t =
        TestWorkspace::with_auth(auth.clone(), CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let theirs = t.create_base("Projects").await;

    auth.sign_in("grace@example.com", "cobol").unwrap();
    assert!(matches!(
        t.workspace.select_base(&theirs.base.id).await,
        Err(CatalogError::BaseDoesNotExist { .. })
    ));

    t.workspace.table_modal.show();
    t.workspace.table_modal.name = "Sneaky".to_string();
    assert!(matches!(
        t.workspace.submit_table_modal().await,
        Err(CatalogError::BaseDoesNotExist { .. })
    ));
    assert!(t.workspace.table_modal.open);

    let tables = t
        .workspace
        .store
        .list_tables(&theirs.base.id, TEST_USER_ID)
        .await
        .unwrap();
    assert_eq!(tables.len(), 1);
    // Only the cascade behind the first base wrote a table
    assert_eq!(t.writes().iter().filter(|c| **c == "create_table").count(), 1);
}

#[tokio::test]
async fn test_field_type_rules() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    let created = t.open_default_table().await;
    let record = t.workspace.add_record().await.unwrap();
    let (name, status) = (created.fields[0].id.clone(), created.fields[2].id.clone());

    // Selects are picked, not typed
    assert!(matches!(
        t.workspace.begin_edit(&record.id, &status),
        Err(CatalogError::Validation { .. })
    ));
    assert!(t.workspace.grid_session().editing().is_none());

    assert!(matches!(
        t.workspace
            .set_field_options(&name, vec![SelectOption::new("a", "Alpha", "red")])
            .await,
        Err(CatalogError::Validation { .. })
    ));
    assert!(matches!(
        t.workspace
            .add_field("Size", FieldType::Number, vec![SelectOption::new("s", "S", "red")])
            .await,
        Err(CatalogError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_view_needs_a_name() {
    let mut t = TestWorkspace::new(CommitMode::OnConfirm, FailurePolicy::Rollback).await;
    t.open_default_table().await;
    t.repository.clear_calls();

    assert!(matches!(
        t.workspace.add_view("   ", ViewType::Form).await,
        Err(CatalogError::Validation { .. })
    ));
    assert!(t.writes().is_empty());
    assert_eq!(t.workspace.data().views.len(), 1);
}
