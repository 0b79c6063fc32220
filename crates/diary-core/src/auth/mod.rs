//! Signed-in user identity.
//!
//! Identity only namespaces entries and remote objects; credentials and the
//! login flow belong to the front end.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Source of the current user's id.
pub trait CurrentUser: Send + Sync {
    /// `None` when nobody is signed in.
    fn user_id(&self) -> Option<String>;

    /// The signed-in user's id, or [`Error::NotAuthenticated`].
    fn require_user_id(&self) -> Result<String> {
        self.user_id().ok_or(Error::NotAuthenticated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Result<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(Error::InvalidInput("User id cannot be empty".to_string()));
        }
        if id.contains('/') {
            return Err(Error::InvalidInput(
                "User id cannot contain '/'".to_string(),
            ));
        }
        Ok(Self {
            id,
            email: normalize_text_option(email),
        })
    }
}

impl fmt::Display for AuthUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{email}>", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

impl CurrentUser for AuthUser {
    fn user_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

impl<T: CurrentUser> CurrentUser for Option<T> {
    fn user_id(&self) -> Option<String> {
        self.as_ref().and_then(CurrentUser::user_id)
    }
}
