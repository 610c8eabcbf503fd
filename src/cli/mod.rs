mod commands;
mod helper;

use std::io::{self, Write};
use std::sync::Arc;

use commands::{Command, COMMANDS};
use helper::CliHelper;
use itertools::Itertools;
use rustyline::{error::ReadlineError, Editor};

use crate::auth::{AuthError, AuthProvider, LocalAuthProvider};
use crate::catalog::CatalogError;
use crate::context::Workspace;
use crate::data_types::{Field, Record, SelectOption};
use crate::grid::CellCommit;
use crate::utils::generate_id;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Usage(String),

    #[error("Error writing output: {0}")]
    Io(#[from] io::Error),
}

type CliResult<T> = Result<T, CliError>;

/// A row picked by 1-based number, id, or (case-insensitive) name
fn resolve<'a, T>(
    items: &'a [T],
    reference: &str,
    kind: &str,
    key: impl Fn(&T) -> (&str, &str),
) -> CliResult<&'a T> {
    if let Ok(n) = reference.parse::<usize>() {
        if n >= 1 && n <= items.len() {
            return Ok(&items[n - 1]);
        }
    }

    items
        .iter()
        .find(|i| key(i).0 == reference)
        .or_else(|| {
            items
                .iter()
                .find(|i| key(i).1.eq_ignore_ascii_case(reference))
        })
        .ok_or_else(|| CliError::Usage(format!("No {kind} {reference:?}")))
}

fn print_table<W: Write>(out: &mut W, headers: &[String], rows: &[Vec<String>]) -> io::Result<()> {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain([h.chars().count()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .join(" | ")
    };

    writeln!(out, "{}", line(headers))?;
    writeln!(out, "{}", widths.iter().map(|w| "-".repeat(*w)).join("-+-"))?;
    for row in rows {
        writeln!(out, "{}", line(&row[..]))?;
    }
    Ok(())
}

fn strings<const N: usize>(cells: [&str; N]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub struct BasegridCli {
    workspace: Workspace,
    auth: Arc<LocalAuthProvider>,
}

impl BasegridCli {
    // Instantiate new CLI instance
    pub fn new(workspace: Workspace, auth: Arc<LocalAuthProvider>) -> Self {
        BasegridCli { workspace, auth }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn prompt(&self) -> String {
        let data = self.workspace.data();
        let path = [
            data.base.as_ref().map(|b| b.name.as_str()),
            data.table.as_ref().map(|t| t.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .join("/");

        if path.is_empty() {
            "basegrid> ".to_string()
        } else {
            format!("{path}> ")
        }
    }

    // Interactive loop for running commands from a CLI
    pub async fn repl_loop(&mut self) -> rustyline::Result<()> {
        let mut rl = Editor::new()?;
        rl.set_helper(Some(CliHelper::default()));
        rl.load_history(".history").ok();

        loop {
            match rl.readline(&self.prompt()) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    rl.add_history_entry(line.trim_end())?;
                    match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(cmd) => {
                            if let Err(e) = self.handle_command(&cmd, &mut io::stdout()).await {
                                eprintln!("{e}")
                            }
                        }
                        Err(e) => eprintln!("{e}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("\\q");
                    break;
                }
                Err(err) => {
                    eprintln!("Error while reading input: {err:?}",);
                    break;
                }
            }
        }

        rl.save_history(".history")
    }

    fn report_commit<W: Write>(out: &mut W, commit: Option<CellCommit>) -> io::Result<()> {
        match commit {
            None => Ok(()),
            Some(CellCommit::Persisted) => writeln!(out, "Saved"),
            Some(CellCommit::LocalOnly) => {
                writeln!(out, "Couldn't save, the change is only visible here")
            }
            Some(CellCommit::UnknownRecord) => writeln!(out, "That row isn't loaded"),
        }
    }

    fn cell<'a>(&'a self, row: &str, column: &str) -> CliResult<(&'a Record, &'a Field)> {
        let data = self.workspace.data();
        let record = resolve(&data.records, row, "row", |r: &Record| {
            (r.id.as_str(), r.id.as_str())
        })?;
        let field = resolve(&data.fields, column, "column", |f: &Field| {
            (f.id.as_str(), f.name.as_str())
        })?;
        Ok((record, field))
    }

    fn cell_ids(&self, row: &str, column: &str) -> CliResult<(String, String)> {
        let (record, field) = self.cell(row, column)?;
        Ok((record.id.clone(), field.id.clone()))
    }

    fn field_id(&self, reference: &str) -> CliResult<String> {
        let field = resolve(&self.workspace.data().fields, reference, "field", |f: &Field| {
            (f.id.as_str(), f.name.as_str())
        })?;
        Ok(field.id.clone())
    }

    // Handle a client command
    pub async fn handle_command<W: Write>(&mut self, cmd: &Command, out: &mut W) -> CliResult<()> {
        match cmd {
            Command::Quit => Ok(()),
            Command::Help => {
                let rows: Vec<Vec<String>> = COMMANDS
                    .iter()
                    .map(|(usage, description)| strings([*usage, *description]))
                    .collect();
                Ok(print_table(out, &strings(["Command", "Description"]), &rows)?)
            }
            Command::Login { email, password } => {
                let user = self.auth.sign_in(email, password)?;
                self.workspace.refresh().await?;
                Ok(writeln!(out, "Signed in as {}", user.email)?)
            }
            Command::Logout => {
                self.workspace.logout().await;
                Ok(writeln!(out, "Signed out")?)
            }
            Command::WhoAmI => {
                if self.workspace.auth_state().is_loading {
                    return Ok(writeln!(out, "Signing in...")?);
                }
                let user = self.auth.me().await?;
                Ok(writeln!(out, "{} ({})", user.email, user.id)?)
            }
            Command::ListBases => {
                self.workspace.refresh().await?;
                let rows: Vec<Vec<String>> = self
                    .workspace
                    .data()
                    .bases
                    .iter()
                    .enumerate()
                    .map(|(i, b)| {
                        vec![
                            (i + 1).to_string(),
                            b.name.clone(),
                            b.color.clone(),
                            b.description.clone().unwrap_or_default(),
                            b.id.clone(),
                        ]
                    })
                    .collect();
                Ok(print_table(
                    out,
                    &strings(["#", "Name", "Color", "Description", "Id"]),
                    &rows,
                )?)
            }
            Command::SelectBase(reference) => {
                let base = resolve(&self.workspace.data().bases, reference, "base", |b| {
                    (b.id.as_str(), b.name.as_str())
                })?;
                let id = base.id.clone();
                self.workspace.select_base(&id).await?;
                Ok(())
            }
            Command::NewBase(name) => {
                self.workspace.base_modal.show();
                self.workspace.base_modal.name = name.clone();
                let created = self.workspace.submit_base_modal().await?;
                Ok(writeln!(
                    out,
                    "Created base {} with table {}",
                    created.base.name, created.table.name
                )?)
            }
            Command::ListTables => {
                if self.workspace.selection().base_id().is_none() {
                    return Err(CatalogError::NoBaseSelected.into());
                }
                let rows: Vec<Vec<String>> = self
                    .workspace
                    .data()
                    .tables
                    .iter()
                    .enumerate()
                    .map(|(i, t)| vec![(i + 1).to_string(), t.name.clone(), t.id.clone()])
                    .collect();
                Ok(print_table(out, &strings(["#", "Name", "Id"]), &rows)?)
            }
            Command::SelectTable(reference) => {
                let table = resolve(&self.workspace.data().tables, reference, "table", |t| {
                    (t.id.as_str(), t.name.as_str())
                })?;
                let id = table.id.clone();
                self.workspace.select_table(&id).await?;
                Ok(())
            }
            Command::NewTable(name) => {
                self.workspace.table_modal.show();
                self.workspace.table_modal.name = name.clone();
                let created = self.workspace.submit_table_modal().await?;
                Ok(writeln!(out, "Created table {}", created.table.name)?)
            }
            Command::ListViews => {
                let selected = self.workspace.selection().view_id();
                let rows: Vec<Vec<String>> = self
                    .workspace
                    .data()
                    .views
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let marker = if Some(v.id.as_str()) == selected { "*" } else { "" };
                        vec![
                            format!("{}{marker}", i + 1),
                            v.name.clone(),
                            v.view_type.to_string(),
                            v.id.clone(),
                        ]
                    })
                    .collect();
                Ok(print_table(out, &strings(["#", "Name", "Type", "Id"]), &rows)?)
            }
            Command::SelectView(reference) => {
                let view = resolve(&self.workspace.data().views, reference, "view", |v| {
                    (v.id.as_str(), v.name.as_str())
                })?;
                let id = view.id.clone();
                if !self.workspace.select_view(&id).await? {
                    return Err(CatalogError::NoTableSelected.into());
                }
                Ok(())
            }
            Command::NewView { view_type, name } => {
                let view = self.workspace.add_view(name, *view_type).await?;
                Ok(writeln!(out, "Created {} view {}", view.view_type, view.name)?)
            }
            Command::ListFields => {
                let rows: Vec<Vec<String>> = self
                    .workspace
                    .data()
                    .fields
                    .iter()
                    .map(|f| {
                        vec![
                            (f.position + 1).to_string(),
                            f.name.clone(),
                            f.field_type.to_string(),
                            f.options.iter().map(|o| o.name.as_str()).join(", "),
                            f.id.clone(),
                        ]
                    })
                    .collect();
                Ok(print_table(
                    out,
                    &strings(["#", "Name", "Type", "Options", "Id"]),
                    &rows,
                )?)
            }
            Command::NewField { field_type, name } => {
                let field = self.workspace.add_field(name, *field_type, vec![]).await?;
                Ok(writeln!(out, "Added {} field {}", field.field_type, field.name)?)
            }
            Command::RenameField { field, name } => {
                let id = self.field_id(field)?;
                self.workspace.rename_field(&id, name).await?;
                Ok(())
            }
            Command::SetOptions { field, labels } => {
                let id = self.field_id(field)?;
                let options = self
                    .workspace
                    .data()
                    .fields
                    .iter()
                    .find(|f| f.id == id)
                    .map(|f| {
                        // Keep the ids of options that already exist
                        labels
                            .iter()
                            .enumerate()
                            .map(|(i, label)| {
                                f.options
                                    .iter()
                                    .find(|o| o.name.eq_ignore_ascii_case(label))
                                    .cloned()
                                    .unwrap_or_else(|| SelectOption {
                                        id: generate_id("opt", i),
                                        name: label.clone(),
                                        color: None,
                                    })
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                self.workspace.set_field_options(&id, options).await?;
                Ok(())
            }
            Command::ShowGrid => {
                if self.workspace.selection().table_id().is_none() {
                    return Err(CatalogError::NoTableSelected.into());
                }
                let grid = self.workspace.render_grid();
                let headers: Vec<String> = ["#".to_string()]
                    .into_iter()
                    .chain(grid.headers)
                    .collect();
                let rows: Vec<Vec<String>> = grid
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| {
                        [(i + 1).to_string()]
                            .into_iter()
                            .chain(row.cells.iter().map(|c| c.to_string()))
                            .collect()
                    })
                    .collect();
                Ok(print_table(out, &headers, &rows)?)
            }
            Command::NewRow => {
                self.workspace.add_record().await?;
                Ok(())
            }
            Command::Edit { row, column } => {
                let (record_id, field_id) = self.cell_ids(row, column)?;
                Ok(self.workspace.begin_edit(&record_id, &field_id)?)
            }
            Command::Type(text) => {
                if self.workspace.grid_session().editing().is_none() {
                    return Err(CliError::Usage("Not editing a cell, use edit first".to_string()));
                }
                let commit = self.workspace.input_text(text).await?;
                Ok(Self::report_commit(out, commit)?)
            }
            Command::EndEdit(reason) => {
                let commit = self.workspace.end_edit(*reason).await?;
                Ok(Self::report_commit(out, commit)?)
            }
            Command::Toggle { row, column } => {
                let (record_id, field_id) = self.cell_ids(row, column)?;
                let commit = self.workspace.toggle_checkbox(&record_id, &field_id).await?;
                Ok(Self::report_commit(out, Some(commit))?)
            }
            Command::Choose {
                row,
                column,
                option,
            } => {
                let (record_id, field_id) = self.cell_ids(row, column)?;
                let commit = self
                    .workspace
                    .choose_option(&record_id, &field_id, option)
                    .await?;
                Ok(Self::report_commit(out, Some(commit))?)
            }
        }
    }
}

// Run one or more `;`-separated commands and write their output to a writer.
// Stops at the first failing command.
pub async fn run_one_off_command<W>(cli: &mut BasegridCli, commands: &str, mut output: W) -> CliResult<()>
where
    W: Write,
{
    for s in commands.split(';') {
        if s.trim().is_empty() {
            continue;
        }

        let command = s.parse::<Command>().map_err(CliError::Usage)?;
        if command == Command::Quit {
            break;
        }
        cli.handle_command(&command, &mut output).await?;
    }
    Ok(())
}
