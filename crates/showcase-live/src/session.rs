use std::sync::{Arc, RwLock};

use uuid::Uuid;

use showcase_types::api::{AuthResponse, RegisterRequest};
use showcase_types::format::get_initials;

use crate::backend::AuthBackend;
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInUser {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

impl From<&AuthResponse> for SignedInUser {
    fn from(auth: &AuthResponse) -> Self {
        Self {
            user_id: auth.user_id,
            username: auth.username.clone(),
            is_admin: auth.is_admin,
        }
    }
}

/// Who is signed in, kept next to the backend that holds their token.
pub struct Session<B: AuthBackend> {
    backend: Arc<B>,
    user: RwLock<Option<SignedInUser>>,
}

impl<B: AuthBackend> Session<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            user: RwLock::new(None),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SignedInUser, BackendError> {
        let auth = self.backend.login(username, password).await?;
        Ok(self.store(&auth))
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<SignedInUser, BackendError> {
        let auth = self.backend.register(request).await?;
        Ok(self.store(&auth))
    }

    pub fn sign_out(&self) {
        self.backend.sign_out();
        *self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn current(&self) -> Option<SignedInUser> {
        self.user
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The signed-in user's id, used as the actor for follow buttons.
    pub fn actor(&self) -> Option<Uuid> {
        self.current().map(|user| user.user_id)
    }

    pub fn is_admin(&self) -> bool {
        self.current().is_some_and(|user| user.is_admin)
    }

    /// Avatar initials; "U" when nobody is signed in.
    pub fn initials(&self) -> String {
        let user = self.current();
        get_initials(user.as_ref().map(|u| u.username.as_str()))
    }

    fn store(&self, auth: &AuthResponse) -> SignedInUser {
        let user = SignedInUser::from(auth);
        *self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user.clone());
        user
    }
}
