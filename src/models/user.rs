use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STARTING_BALANCE: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub balance: f64,
}

impl User {
    /// The record handed out the first time an unknown rider id is looked up.
    pub fn new_rider(id: impl Into<String>) -> Self {
        let id = id.into();
        let short: String = id.chars().take(8).collect();
        Self {
            name: format!("User {short}"),
            id,
            balance: STARTING_BALANCE,
        }
    }

    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(balance) = patch.balance {
            self.balance = balance;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub balance: Option<f64>,
}

impl UserPatch {
    pub fn balance(balance: f64) -> Self {
        Self {
            balance: Some(balance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rider_gets_starting_balance_and_short_name() {
        let user = User::new_rider("abcdefghijklmnop");
        assert_eq!(user.name, "User abcdefgh");
        assert_eq!(user.balance, STARTING_BALANCE);
    }

    #[test]
    fn short_ids_are_not_truncated() {
        assert_eq!(User::new_rider("abc").name, "User abc");
    }
}
