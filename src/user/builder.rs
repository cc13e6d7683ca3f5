//! Typed builder for profiles about to be provisioned.

use crate::identity::VerifiedIdentity;

/// Display name used when neither a name nor an email is known.
pub const PLACEHOLDER_NAME: &str = "User";

/// Attributes of a profile to insert, or to refresh an existing one with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub subject_id: String,
    /// Display name after fallback.
    pub username: String,
    pub email: String,
    /// Name explicitly supplied by the caller; only this overwrites an
    /// existing display name.
    pub explicit_name: Option<String>,
}

/// [`NewProfile`] builder.
#[derive(Debug, Clone)]
pub struct ProfileBuilder<Subject> {
    subject: Subject,
    name: Option<String>,
    email: Option<String>,
}

/// Value is missing on [`ProfileBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`ProfileBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl Default for ProfileBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileBuilder<Missing> {
    /// Create a new [`ProfileBuilder`].
    pub fn new() -> Self {
        Self {
            subject: Missing,
            name: None,
            email: None,
        }
    }

    /// Update `subject_id` field on [`ProfileBuilder`].
    pub fn subject(
        self,
        subject_id: impl Into<String>,
    ) -> ProfileBuilder<Present<String>> {
        ProfileBuilder {
            subject: Present(subject_id.into()),
            name: self.name,
            email: self.email,
        }
    }

    /// Seed subject, name and email from a verified identity.
    pub fn from_identity(
        identity: &VerifiedIdentity,
    ) -> ProfileBuilder<Present<String>> {
        Self::new()
            .subject(identity.subject_id.clone())
            .name(identity.claimed_name.clone())
            .email(identity.claimed_email.clone())
    }
}

impl<Subject> ProfileBuilder<Subject> {
    /// Update `name` field on [`ProfileBuilder`]. Blank names are ignored.
    pub fn name(mut self, name: Option<String>) -> Self {
        if let Some(name) = name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()) {
            self.name = Some(name);
        }
        self
    }

    /// Update `email` field on [`ProfileBuilder`]. Blank emails are ignored.
    pub fn email(mut self, email: Option<String>) -> Self {
        if let Some(email) = email.map(|e| e.trim().to_owned()).filter(|e| !e.is_empty()) {
            self.email = Some(email);
        }
        self
    }
}

impl ProfileBuilder<Present<String>> {
    /// Build a [`NewProfile`], keeping `explicit` as the caller-supplied name.
    pub fn build_with_explicit(self, explicit: Option<String>) -> NewProfile {
        let mut profile = self.build();
        profile.explicit_name =
            explicit.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
        profile
    }

    /// Build a [`NewProfile`], applying the display name fallback.
    pub fn build(self) -> NewProfile {
        let email = self.email.unwrap_or_default();
        let username = fallback_name(self.name.as_deref(), &email);

        NewProfile {
            subject_id: self.subject.0,
            username,
            email,
            explicit_name: None,
        }
    }
}

/// Name if present, else the email local part, else [`PLACEHOLDER_NAME`].
pub fn fallback_name(name: Option<&str>, email: &str) -> String {
    if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
        return name.trim().to_owned();
    }

    email
        .split('@')
        .next()
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .unwrap_or(PLACEHOLDER_NAME)
        .to_owned()
}
