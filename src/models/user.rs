use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Where patient messages go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub name: String,
}

impl From<&User> for Contact {
    fn from(user: &User) -> Self {
        Contact {
            email: user.email.clone(),
            name: user.first_name.clone(),
        }
    }
}
