use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

/// Shared-secret cleartext auth. Principals are carried in the statements
/// themselves; the connection only proves it belongs to a trusted frontend.
#[derive(Debug)]
pub struct SlotlockAuthSource {
    password: String,
}

impl SlotlockAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for SlotlockAuthSource {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
