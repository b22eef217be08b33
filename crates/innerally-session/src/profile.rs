use tracing::{debug, instrument};

use innerally_store::profile::{OnboardingProfile, OnboardingRepo};
use innerally_store::{Database, StoreError};

/// Read access to the onboarding profile in the shape a conversation needs.
pub struct ProfileProvider {
    repo: OnboardingRepo,
}

impl ProfileProvider {
    pub fn new(db: Database) -> Self {
        Self {
            repo: OnboardingRepo::new(db),
        }
    }

    pub fn profile(&self) -> Result<Option<OnboardingProfile>, StoreError> {
        self.repo.get()
    }

    /// The context message injected ahead of a conversation's first turn,
    /// or `None` before onboarding.
    #[instrument(skip(self))]
    pub fn context_message(&self) -> Result<Option<String>, StoreError> {
        let profile = self.repo.get()?;
        debug!(present = profile.is_some(), "profile loaded");
        Ok(profile.as_ref().map(format_context))
    }
}

pub fn format_context(profile: &OnboardingProfile) -> String {
    format!(
        "User Info:\nName: {}\nCore Values: {}\nEmotional Triggers: {}",
        profile.name, profile.core_values, profile.emotional_triggers
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use innerally_core::validation::NewProfile;

    #[test]
    fn absent_before_onboarding() {
        let provider = ProfileProvider::new(Database::in_memory().unwrap());
        assert!(provider.context_message().unwrap().is_none());
        assert!(provider.profile().unwrap().is_none());
    }

    #[test]
    fn context_lists_every_field() {
        let db = Database::in_memory().unwrap();
        OnboardingRepo::new(db.clone())
            .upsert(&NewProfile::new("Ana", "honesty", "criticism, deadlines").unwrap())
            .unwrap();

        let context = ProfileProvider::new(db).context_message().unwrap().unwrap();
        assert_eq!(
            context,
            "User Info:\nName: Ana\nCore Values: honesty\nEmotional Triggers: criticism, deadlines"
        );
    }

    #[test]
    fn reflects_latest_onboarding() {
        let db = Database::in_memory().unwrap();
        let repo = OnboardingRepo::new(db.clone());
        repo.upsert(&NewProfile::new("Ana", "honesty", "criticism").unwrap())
            .unwrap();
        repo.upsert(&NewProfile::new("Ben", "courage", "").unwrap())
            .unwrap();

        let context = ProfileProvider::new(db).context_message().unwrap().unwrap();
        assert!(context.contains("Name: Ben"));
        assert!(!context.contains("Ana"));
    }
}
