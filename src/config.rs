//! Run configuration: who is acting, on which collection, and which
//! operation to perform.
//!
//! ```json
//! {
//!   "name": "curator",
//!   "method": "manual fix",
//!   "data_dir": "data",
//!   "collection": "samples",
//!   "operation": "update_one",
//!   "update_criteria": { "stable_id": "X" },
//!   "update_field": "tags",
//!   "new_value": "a;c"
//! }
//! ```

use crate::Document;
use crate::engine::{Engine, Report};
use crate::error::{Error, Result};
use crate::ledger::Operation;
use crate::process::ProcessLog;
use crate::store::{Criteria, DocumentStore};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Actor recorded in process records.
    pub name: String,
    pub method: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub collection: String,
    #[serde(flatten)]
    pub command: Command,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

/// The operation to run, tagged by the `operation` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Command {
    Insert {
        json_documents: PathBuf,
    },
    UpdateOne {
        update_criteria: Document,
        update_field: String,
        new_value: Value,
    },
    UpdateAll {
        update_field: String,
        new_value: Value,
    },
    UpdateWithFile {
        update_file: PathBuf,
    },
    RestoreOne {
        restore_criteria: Document,
        field_name: String,
        log_id: String,
    },
    RestoreAll {
        log_id: String,
    },
    RenameOne {
        rename_criteria: Document,
        field_name: String,
        new_field_name: String,
    },
    RenameAll {
        field_name: String,
        new_field_name: String,
    },
    RemoveOne {
        remove_criteria: Document,
        field_to_remove: String,
    },
    RemoveAll {
        field_to_remove: String,
    },
}

impl Config {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read.
    /// - [`Error::Json`] if it is not a valid configuration.
    /// - [`Error::InvalidInput`] if [`Config::validate`] rejects it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty identity fields and empty field paths.
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("method", &self.method)?;
        require("collection", &self.collection)?;

        match &self.command {
            Command::Insert { .. } | Command::UpdateWithFile { .. } => Ok(()),
            Command::UpdateOne { update_field, .. } | Command::UpdateAll { update_field, .. } => {
                require("update_field", update_field)
            }
            Command::RestoreOne {
                field_name, log_id, ..
            } => {
                require("field_name", field_name)?;
                require("log_id", log_id)
            }
            Command::RestoreAll { log_id } => require("log_id", log_id),
            Command::RenameOne {
                field_name,
                new_field_name,
                ..
            }
            | Command::RenameAll {
                field_name,
                new_field_name,
            } => {
                require("field_name", field_name)?;
                require("new_field_name", new_field_name)
            }
            Command::RemoveOne {
                field_to_remove, ..
            }
            | Command::RemoveAll { field_to_remove } => require("field_to_remove", field_to_remove),
        }
    }
}

fn require(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("'{key}' must not be empty")));
    }
    Ok(())
}

impl Command {
    /// The operation this command runs.
    pub fn operation(&self) -> Operation {
        match self {
            Command::Insert { .. } => Operation::Insert,
            Command::UpdateOne { .. } => Operation::UpdateOne,
            Command::UpdateAll { .. } => Operation::UpdateAll,
            Command::UpdateWithFile { .. } => Operation::UpdateWithFile,
            Command::RestoreOne { .. } => Operation::RestoreOne,
            Command::RestoreAll { .. } => Operation::RestoreAll,
            Command::RenameOne { .. } => Operation::RenameOne,
            Command::RenameAll { .. } => Operation::RenameAll,
            Command::RemoveOne { .. } => Operation::RemoveOne,
            Command::RemoveAll { .. } => Operation::RemoveAll,
        }
    }

    /// Run the command against `engine`.
    ///
    /// Most commands produce one report; `update_with_file` produces one per
    /// CSV file.
    pub fn execute<S: DocumentStore, P: ProcessLog>(
        &self,
        engine: &mut Engine<S, P>,
    ) -> Result<Vec<Report>> {
        let report = match self {
            Command::Insert { json_documents } => engine.insert_from_path(json_documents)?,
            Command::UpdateOne {
                update_criteria,
                update_field,
                new_value,
            } => engine.update_one(
                &Criteria::from(update_criteria.clone()),
                update_field,
                new_value.clone(),
            )?,
            Command::UpdateAll {
                update_field,
                new_value,
            } => engine.update_all(update_field, new_value.clone())?,
            Command::UpdateWithFile { update_file } => {
                return engine.update_from_path(update_file);
            }
            Command::RestoreOne {
                restore_criteria,
                field_name,
                log_id,
            } => engine.restore_one(&Criteria::from(restore_criteria.clone()), field_name, log_id)?,
            Command::RestoreAll { log_id } => engine.restore_all(log_id)?,
            Command::RenameOne {
                rename_criteria,
                field_name,
                new_field_name,
            } => engine.rename_one(
                &Criteria::from(rename_criteria.clone()),
                field_name,
                new_field_name,
            )?,
            Command::RenameAll {
                field_name,
                new_field_name,
            } => engine.rename_all(field_name, new_field_name)?,
            Command::RemoveOne {
                remove_criteria,
                field_to_remove,
            } => engine.remove_one(&Criteria::from(remove_criteria.clone()), field_to_remove)?,
            Command::RemoveAll { field_to_remove } => engine.remove_all(field_to_remove)?,
        };
        Ok(vec![report])
    }
}
