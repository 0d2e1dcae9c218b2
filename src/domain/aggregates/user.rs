//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_ADDRESSES: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: Role,
    token_version: u32,
    addresses: Vec<Address>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { User, Admin, Vendor }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::User => "user", Self::Admin => "admin", Self::Vendor => "vendor" }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl User {
    pub fn register(name: impl Into<String>, email: &str, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: name.into(), email: normalize_email(email), password_hash, role,
            token_version: 0, addresses: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn email(&self) -> &str { &self.email }
    pub fn password_hash(&self) -> &str { &self.password_hash }
    pub fn role(&self) -> Role { self.role }
    pub fn token_version(&self) -> u32 { self.token_version }
    pub fn addresses(&self) -> &[Address] { &self.addresses }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn address(&self, id: Uuid) -> Option<&Address> { self.addresses.iter().find(|a| a.id == id) }

    /// Invalidates every token issued so far.
    pub fn bump_token_version(&mut self) {
        self.token_version = self.token_version.wrapping_add(1);
        self.updated_at = Utc::now();
    }

    pub fn add_address(&mut self, mut address: Address) -> Result<Uuid, UserError> {
        if self.addresses.len() >= MAX_ADDRESSES { return Err(UserError::TooManyAddresses { max: MAX_ADDRESSES }); }
        address.id = Uuid::now_v7();
        address.is_default = address.is_default || self.addresses.is_empty();
        if address.is_default {
            for a in &mut self.addresses { a.is_default = false; }
        }
        let id = address.id;
        self.addresses.push(address);
        self.updated_at = Utc::now();
        Ok(id)
    }

    pub fn remove_address(&mut self, id: Uuid) -> Result<(), UserError> {
        let idx = self.addresses.iter().position(|a| a.id == id).ok_or(UserError::AddressNotFound)?;
        let removed = self.addresses.remove(idx);
        if removed.is_default {
            if let Some(first) = self.addresses.first_mut() { first.is_default = true; }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("Address not found")]
    AddressNotFound,
    #[error("At most {max} addresses can be saved")]
    TooManyAddresses { max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized() {
        let u = User::register("Asha", "  Asha@Example.COM ", "hash".into(), Role::User);
        assert_eq!(u.email(), "asha@example.com");
    }

    #[test]
    fn test_default_address_moves() {
        let mut u = User::register("Asha", "a@example.com", "hash".into(), Role::User);
        let first = u.add_address(Address { city: "Pune".into(), ..Address::default() }).unwrap();
        let second = u.add_address(Address { city: "Goa".into(), is_default: true, ..Address::default() }).unwrap();
        assert!(!u.address(first).unwrap().is_default);
        u.remove_address(second).unwrap();
        assert!(u.address(first).unwrap().is_default);
        assert_eq!(u.remove_address(second), Err(UserError::AddressNotFound));
    }
}
