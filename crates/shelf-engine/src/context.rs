/// Supplies the name recorded as the acting user in version stamps.
pub trait UserProvider: Send + Sync {
    fn current_user(&self) -> String;
}

/// A [`UserProvider`] that always answers with the same name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedUser(String);

impl FixedUser {
    pub fn new(user: impl Into<String>) -> Self {
        Self(user.into())
    }
}

impl UserProvider for FixedUser {
    fn current_user(&self) -> String {
        self.0.clone()
    }
}
