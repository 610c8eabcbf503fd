use std::str::FromStr;

use crate::data_types::{FieldType, ViewType};
use crate::grid::EndEdit;

/// Commands available inside the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Login { email: String, password: String },
    Logout,
    WhoAmI,
    ListBases,
    SelectBase(String),
    NewBase(String),
    ListTables,
    SelectTable(String),
    NewTable(String),
    ListViews,
    SelectView(String),
    NewView { view_type: ViewType, name: String },
    ListFields,
    NewField { field_type: FieldType, name: String },
    RenameField { field: String, name: String },
    SetOptions { field: String, labels: Vec<String> },
    ShowGrid,
    NewRow,
    Edit { row: String, column: String },
    Type(String),
    EndEdit(EndEdit),
    Toggle { row: String, column: String },
    Choose { row: String, column: String, option: String },
}

/// Usage and description of every command, for `\?` and completion
pub const COMMANDS: &[(&str, &str)] = &[
    ("login <email> <password>", "Sign in"),
    ("logout", "Sign out and clear the workspace"),
    ("whoami", "Show the signed-in user"),
    ("bases", "List bases"),
    ("base <n|id>", "Select a base"),
    ("base new <name>", "Create a base with a default table"),
    ("tables", "List the tables of the selected base"),
    ("table <n|id>", "Select a table"),
    ("table new <name>", "Create a table in the selected base"),
    ("views", "List the views of the selected table"),
    ("view <n|id>", "Select a view"),
    ("view new <grid|form|calendar> <name>", "Create a view"),
    ("fields", "List the fields of the selected table"),
    ("field new <type> <name>", "Add a field after the existing ones"),
    ("field rename <n|id> <name>", "Rename a field"),
    ("field options <n|id> <label,...>", "Set the options of a select field"),
    ("grid", "Show the selected table"),
    ("row new", "Add an empty row at the top"),
    ("edit <row> <column>", "Start editing a cell"),
    ("type <text>", "Replace the text of the cell being edited"),
    ("enter", "Confirm the edit"),
    ("esc", "Cancel the edit"),
    ("blur", "Leave the cell"),
    ("toggle <row> <column>", "Flip a checkbox"),
    ("choose <row> <column> <option>", "Pick a select option"),
    ("\\?", "Show this help"),
    ("\\q", "Quit"),
];

/// First words of every command, for completion
pub fn command_words() -> Vec<&'static str> {
    let mut words: Vec<&str> = COMMANDS
        .iter()
        .filter_map(|(usage, _)| usage.split_whitespace().next())
        .collect();
    words.dedup();
    words
}

fn split_word(s: &str) -> (&str, Option<&str>) {
    match s.trim().split_once(char::is_whitespace) {
        Some((head, rest)) => (head, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (s.trim(), None),
    }
}

fn two_words(s: Option<&str>) -> Option<(&str, &str)> {
    let (first, rest) = split_word(s?);
    Some((first, rest?))
}

fn parse_field_type(s: &str) -> Result<FieldType, String> {
    FieldType::from_str(s).map_err(|_| format!("Unknown field type {s:?}"))
}

fn parse_view_type(s: &str) -> Result<ViewType, String> {
    ViewType::from_str(s).map_err(|_| format!("Unknown view type {s:?}"))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('\\').unwrap_or(s);
        let (c, arg) = split_word(s);

        let usage = || format!("Usage: {}", usage_of(c));

        Ok(match (c, arg) {
            ("q", None) | ("quit", None) => Self::Quit,
            ("?", None) | ("help", None) => Self::Help,
            ("login", arg) => {
                let (email, password) = two_words(arg).ok_or_else(usage)?;
                Self::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                }
            }
            ("logout", None) => Self::Logout,
            ("whoami", None) => Self::WhoAmI,
            ("bases", None) => Self::ListBases,
            ("tables", None) => Self::ListTables,
            ("views", None) => Self::ListViews,
            ("fields", None) => Self::ListFields,
            ("grid", None) => Self::ShowGrid,
            ("enter", None) => Self::EndEdit(EndEdit::Enter),
            ("esc", None) => Self::EndEdit(EndEdit::Escape),
            ("blur", None) => Self::EndEdit(EndEdit::Blur),
            ("base" | "table" | "view", None) => return Err(usage()),
            ("base", Some(rest)) => match split_word(rest) {
                ("new", Some(name)) => Self::NewBase(name.to_string()),
                ("new", None) => return Err(usage()),
                _ => Self::SelectBase(rest.to_string()),
            },
            ("table", Some(rest)) => match split_word(rest) {
                ("new", Some(name)) => Self::NewTable(name.to_string()),
                ("new", None) => return Err(usage()),
                _ => Self::SelectTable(rest.to_string()),
            },
            ("view", Some(rest)) => match split_word(rest) {
                ("new", args) => {
                    let (view_type, name) = two_words(args).ok_or_else(usage)?;
                    Self::NewView {
                        view_type: parse_view_type(view_type)?,
                        name: name.to_string(),
                    }
                }
                _ => Self::SelectView(rest.to_string()),
            },
            ("field", Some(rest)) => {
                let (sub, args) = split_word(rest);
                let (first, second) = two_words(args).ok_or_else(usage)?;
                match sub {
                    "new" => Self::NewField {
                        field_type: parse_field_type(first)?,
                        name: second.to_string(),
                    },
                    "rename" => Self::RenameField {
                        field: first.to_string(),
                        name: second.to_string(),
                    },
                    "options" => Self::SetOptions {
                        field: first.to_string(),
                        labels: second
                            .split(',')
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string)
                            .collect(),
                    },
                    _ => return Err(usage()),
                }
            }
            ("row", Some("new")) => Self::NewRow,
            ("type", arg) => Self::Type(arg.unwrap_or_default().to_string()),
            ("edit" | "toggle", arg) => {
                let (row, column) = two_words(arg).ok_or_else(usage)?;
                let (row, column) = (row.to_string(), column.to_string());
                if c == "edit" {
                    Self::Edit { row, column }
                } else {
                    Self::Toggle { row, column }
                }
            }
            ("choose", arg) => {
                let (row, rest) = two_words(arg).ok_or_else(usage)?;
                let (column, option) = two_words(Some(rest)).ok_or_else(usage)?;
                Self::Choose {
                    row: row.to_string(),
                    column: column.to_string(),
                    option: option.to_string(),
                }
            }
            _ => return Err(format!("'{s}' is not a valid command, try \\?")),
        })
    }
}

fn usage_of(word: &str) -> String {
    COMMANDS
        .iter()
        .filter(|(usage, _)| usage.split_whitespace().next() == Some(word))
        .map(|(usage, _)| *usage)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{command_words, Command};
    use crate::data_types::{FieldType, ViewType};
    use crate::grid::EndEdit;

    #[rstest]
    #[case::quit("\\q", Command::Quit)]
    #[case::help("\\?", Command::Help)]
    #[case::select_base("base 2", Command::SelectBase("2".to_string()))]
    #[case::new_base("base new Side projects", Command::NewBase("Side projects".to_string()))]
    #[case::new_view(
        "view new calendar Due dates",
        Command::NewView { view_type: ViewType::Calendar, name: "Due dates".to_string() }
    )]
    #[case::new_field(
        "field new checkbox Done",
        Command::NewField { field_type: FieldType::Checkbox, name: "Done".to_string() }
    )]
    #[case::options(
        "field options 3 Low, High ,",
        Command::SetOptions { field: "3".to_string(), labels: vec!["Low".to_string(), "High".to_string()] }
    )]
    #[case::type_with_spaces("type hello  world", Command::Type("hello  world".to_string()))]
    #[case::type_nothing("type", Command::Type(String::new()))]
    #[case::escape("esc", Command::EndEdit(EndEdit::Escape))]
    #[case::choose(
        "choose 1 Status In progress",
        Command::Choose { row: "1".to_string(), column: "Status".to_string(), option: "In progress".to_string() }
    )]
    fn test_parse(#[case] input: &str, #[case] expected: Command) {
        assert_eq!(input.parse::<Command>().unwrap(), expected);
    }

    #[rstest]
    #[case::unknown("frobnicate")]
    #[case::missing_password("login ada@example.com")]
    #[case::bad_type("field new formula Total")]
    #[case::bare_base("base")]
    fn test_parse_errors(#[case] input: &str) {
        assert!(input.parse::<Command>().is_err());
    }

    #[test]
    fn test_command_words() {
        let words = command_words();
        assert!(words.contains(&"login"));
        assert!(words.contains(&"\\q"));
        assert_eq!(words.iter().filter(|w| **w == "base").count(), 1);
    }
}
