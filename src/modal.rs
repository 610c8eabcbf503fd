//! Form state behind the "new base" and "new table" dialogs.
//!
//! A submit goes through three steps: `begin_submit` validates the form and
//! hands back the request, the caller runs the cascade, and `finish_submit`
//! either resets and closes the form or keeps it open with the error message.

use crate::cascade::{NewBase, NewTable};
use crate::catalog::{CatalogError, CatalogResult};

pub const DEFAULT_BASE_COLOR: &str = "blue";

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required_name(name: &str, entity: &str) -> CatalogResult<String> {
    non_blank(name).ok_or_else(|| CatalogError::Validation {
        reason: format!("{entity} name can't be empty"),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseModal {
    pub open: bool,
    pub name: String,
    pub description: String,
    pub color: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl Default for BaseModal {
    fn default() -> Self {
        Self {
            open: false,
            name: String::new(),
            description: String::new(),
            color: DEFAULT_BASE_COLOR.to_string(),
            error: None,
            submitting: false,
        }
    }
}

impl BaseModal {
    pub fn show(&mut self) {
        self.open = true;
    }

    /// Close and forget whatever was typed
    pub fn dismiss(&mut self) {
        *self = Self::default();
    }

    pub fn begin_submit(&mut self) -> CatalogResult<NewBase> {
        let name = match required_name(&self.name, "Base") {
            Ok(name) => name,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.error = None;
        self.submitting = true;
        Ok(NewBase {
            name,
            description: non_blank(&self.description),
            color: non_blank(&self.color).unwrap_or_else(|| DEFAULT_BASE_COLOR.to_string()),
        })
    }

    pub fn finish_submit<T>(&mut self, result: &CatalogResult<T>) {
        match result {
            Ok(_) => self.dismiss(),
            Err(e) => {
                self.error = Some(e.to_string());
                self.submitting = false;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableModal {
    pub open: bool,
    pub name: String,
    pub description: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl TableModal {
    pub fn show(&mut self) {
        self.open = true;
    }

    pub fn dismiss(&mut self) {
        *self = Self::default();
    }

    /// The table goes into `base_id`, normally the selected base
    pub fn begin_submit(&mut self, base_id: Option<&str>) -> CatalogResult<NewTable> {
        let checked = base_id
            .ok_or(CatalogError::NoBaseSelected)
            .and_then(|base_id| Ok((base_id, required_name(&self.name, "Table")?)));

        match checked {
            Ok((base_id, name)) => {
                self.error = None;
                self.submitting = true;
                Ok(NewTable {
                    base_id: base_id.to_string(),
                    name,
                    description: non_blank(&self.description),
                })
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn finish_submit<T>(&mut self, result: &CatalogResult<T>) {
        match result {
            Ok(_) => self.dismiss(),
            Err(e) => {
                self.error = Some(e.to_string());
                self.submitting = false;
            }
        }
    }
}
