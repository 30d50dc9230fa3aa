//! Create-or-update decision for external records
//!
//! A lookup call runs first; its outcome alone decides whether the mutation
//! is a POST against the collection or a PATCH against the one record found.

use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::transport::{HttpResponse, Method};

/// What a lookup call told us about existing records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Lookup succeeded; ids of every matching record
    Found(Vec<String>),
    /// Lookup answered non-2xx
    Unavailable { status: u16, body: String },
}

impl LookupOutcome {
    /// Interpret a JSON:API list response (`{"data":[{"id":...}, ...]}`)
    pub fn from_list_response(response: HttpResponse) -> Result<Self> {
        if !response.is_success() {
            return Ok(LookupOutcome::Unavailable {
                status: response.status,
                body: response.body,
            });
        }

        #[derive(Deserialize)]
        struct Record {
            id: String,
        }
        #[derive(Deserialize)]
        struct RecordList {
            #[serde(default)]
            data: Vec<Record>,
        }

        let ids = if response.body.trim().is_empty() {
            Vec::new()
        } else {
            response
                .json::<RecordList>()?
                .data
                .into_iter()
                .map(|record| record.id)
                .collect()
        };
        Ok(LookupOutcome::Found(ids))
    }

    /// The single matching id; anything else is an error
    pub fn require_single(self, account_id: &str) -> Result<String> {
        match self {
            LookupOutcome::Found(mut ids) => match ids.len() {
                0 => Err(Error::AccountNotFound(account_id.to_string())),
                1 => Ok(ids.remove(0)),
                count => Err(Error::AccountNotUnique {
                    account_id: account_id.to_string(),
                    count,
                }),
            },
            LookupOutcome::Unavailable { status, body } => Err(Error::Api { status, body }),
        }
    }
}

/// Mutation chosen by [`plan_upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMethod {
    Post,
    Patch,
}

impl UpsertMethod {
    pub fn method(&self) -> Method {
        match self {
            UpsertMethod::Post => Method::Post,
            UpsertMethod::Patch => Method::Patch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult {
    pub existing_id: Option<String>,
    pub method: UpsertMethod,
}

/// Decide between create and update
///
/// A failed lookup is treated as "does not exist" so a transient lookup error
/// never blocks provisioning; the create call surfaces any real conflict.
pub fn plan_upsert(lookup: LookupOutcome, account_id: &str) -> Result<UpsertResult> {
    match lookup {
        LookupOutcome::Found(mut ids) => match ids.len() {
            0 => Ok(UpsertResult {
                existing_id: None,
                method: UpsertMethod::Post,
            }),
            1 => Ok(UpsertResult {
                existing_id: Some(ids.remove(0)),
                method: UpsertMethod::Patch,
            }),
            count => Err(Error::AccountNotUnique {
                account_id: account_id.to_string(),
                count,
            }),
        },
        LookupOutcome::Unavailable { .. } => Ok(UpsertResult {
            existing_id: None,
            method: UpsertMethod::Post,
        }),
    }
}
