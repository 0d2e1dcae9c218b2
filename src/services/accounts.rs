//! Registration, login, token rotation and the address book.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{with_retry, Services};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AccessClaims, AuthError, TokenPair};
use crate::domain::aggregates::user::normalize_email;
use crate::domain::aggregates::{Address, Role, User};
use crate::store::documents::EMAIL;
use crate::store::{StoreError, Versioned};
use crate::{EcommerceError, Result};

/// The user as shown to the user.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub addresses: Vec<Address>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for Profile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id(), name: u.name().to_string(), email: u.email().to_string(), role: u.role(),
            addresses: u.addresses().to_vec(), created_at: u.created_at(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: Profile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

impl Services {
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session> {
        let user = self.create_user(name, email, password, Role::User).await?;
        info!(user_id = %user.id(), "user registered");
        Ok(Session { tokens: self.tokens.issue(&user)?, user: Profile::from(&user) })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let user = self.repo.find::<User>(EMAIL, &normalize_email(email)).await?.ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, user.password_hash()) {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(Session { tokens: self.tokens.issue(&user)?, user: Profile::from(&*user) })
    }

    /// Exchanges a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let user = self.repo.get::<User>(&claims.user_id.to_string()).await?.ok_or(AuthError::InvalidToken)?;
        if user.token_version() != claims.token_version {
            return Err(AuthError::TokenRevoked.into());
        }
        Ok(self.tokens.issue(&user)?)
    }

    /// Validates an access token against the user's current token version.
    pub async fn authenticate(&self, access_token: &str) -> Result<AccessClaims> {
        let claims = self.tokens.verify_access(access_token)?;
        let user = self.repo.get::<User>(&claims.user_id.to_string()).await?.ok_or(AuthError::InvalidToken)?;
        if user.token_version() != claims.token_version {
            return Err(AuthError::TokenRevoked.into());
        }
        Ok(AccessClaims { role: user.role(), ..claims })
    }

    /// Revokes every token issued to the user so far.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<()> {
        with_retry("logout_all", move || async move {
            let mut user = self.user(user_id).await?;
            user.bump_token_version();
            let mut uow = self.repo.unit_of_work();
            uow.put(&user)?;
            uow.commit().await?;
            info!(%user_id, token_version = user.token_version(), "sessions revoked");
            Ok(())
        })
        .await
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Profile> {
        Ok(Profile::from(&*self.user(user_id).await?))
    }

    pub async fn addresses(&self, user_id: Uuid) -> Result<Vec<Address>> {
        Ok(self.user(user_id).await?.addresses().to_vec())
    }

    pub async fn add_address(&self, user_id: Uuid, address: Address) -> Result<Vec<Address>> {
        with_retry("add_address", || {
            let address = address.clone();
            async move {
                let mut user = self.user(user_id).await?;
                user.add_address(address)?;
                let mut uow = self.repo.unit_of_work();
                uow.put(&user)?;
                uow.commit().await?;
                Ok(user.addresses().to_vec())
            }
        })
        .await
    }

    pub async fn remove_address(&self, user_id: Uuid, address_id: Uuid) -> Result<Vec<Address>> {
        with_retry("remove_address", move || async move {
            let mut user = self.user(user_id).await?;
            user.remove_address(address_id)?;
            let mut uow = self.repo.unit_of_work();
            uow.put(&user)?;
            uow.commit().await?;
            Ok(user.addresses().to_vec())
        })
        .await
    }

    /// Creates the configured admin account unless the email is taken.
    pub async fn seed_admin(&self, email: &str, password: &str) -> Result<()> {
        if self.repo.find::<User>(EMAIL, &normalize_email(email)).await?.is_some() {
            info!(email, "admin account already present");
            return Ok(());
        }
        let admin = self.create_user("Administrator", email, password, Role::Admin).await?;
        info!(user_id = %admin.id(), "admin account seeded");
        Ok(())
    }

    pub(crate) async fn user(&self, user_id: Uuid) -> Result<Versioned<User>> {
        self.repo.get::<User>(&user_id.to_string()).await?.ok_or(EcommerceError::UserNotFound)
    }

    async fn create_user(&self, name: &str, email: &str, password: &str, role: Role) -> Result<User> {
        let email = normalize_email(email);
        if self.repo.find::<User>(EMAIL, &email).await?.is_some() {
            return Err(AuthError::EmailTaken.into());
        }
        let user = Versioned::new(User::register(name.trim(), &email, hash_password(password)?, role));
        let mut uow = self.repo.unit_of_work();
        uow.put(&user)?;
        match uow.commit().await {
            Err(StoreError::Duplicate { .. }) => Err(AuthError::EmailTaken.into()),
            other => other.map_err(EcommerceError::from),
        }?;
        Ok(user.into_inner())
    }
}
