use crate::config::IdentityRules;

const GITHUB_NOREPLY_DOMAIN: &str = "@users.noreply.github.com";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn normalize_github_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

/// Username from `user@users.noreply.github.com` or
/// `12345+user@users.noreply.github.com`, if `email` is one.
pub fn github_username_from_email(email: &str) -> Option<String> {
    let email = normalize_email(email);
    let local = email.strip_suffix(GITHUB_NOREPLY_DOMAIN)?;
    let local = local.rsplit('+').next().unwrap_or(local);
    let username = normalize_github_username(local);
    (!username.is_empty()).then_some(username)
}

/// Decides whether a commit author is "me".
#[derive(Debug, Clone)]
pub struct MeMatcher {
    rules: IdentityRules,
}

impl MeMatcher {
    pub fn new(rules: IdentityRules) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matches(&self, author_name: &str, author_email: &str) -> bool {
        let email = normalize_email(author_email);
        let name = normalize_name(author_name);
        let rules = &self.rules;

        if !email.is_empty() && rules.emails.contains(&email) {
            return true;
        }
        if !name.is_empty() && rules.names.contains(&name) {
            return true;
        }
        if let Some(username) = github_username_from_email(&email) {
            if rules.github_usernames.contains(&username) {
                return true;
            }
        }
        if !name.is_empty() && rules.github_usernames.contains(&name) {
            return true;
        }
        if !email.is_empty() && rules.email_globs.iter().any(|g| g.matches(&email)) {
            return true;
        }
        !name.is_empty() && rules.name_globs.iter().any(|g| g.matches(&name))
    }
}
