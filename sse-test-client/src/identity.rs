use anyhow::Result;

/// Identity header the hub expects from its authentication gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: String,
    pub label: String,
}

impl TestUser {
    pub fn parse(input: &str, label: &str) -> Result<Self> {
        let user_id = input.trim();
        if user_id.is_empty() {
            anyhow::bail!("Invalid user id for {label}: must not be empty");
        }
        if user_id.chars().any(char::is_whitespace) {
            anyhow::bail!("Invalid user id for {label}: must not contain whitespace");
        }
        Ok(Self {
            user_id: user_id.to_string(),
            label: label.to_string(),
        })
    }
}
