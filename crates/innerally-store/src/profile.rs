use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use innerally_core::labels;
use innerally_core::validation::NewProfile;

use crate::database::Database;
use crate::error::StoreError;

/// The singleton row is always stored under this id.
pub const PROFILE_ID: i64 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProfile {
    pub name: String,
    pub core_values: String,
    pub emotional_triggers: String,
}

impl OnboardingProfile {
    /// Trigger phrases, split on commas or newlines.
    pub fn trigger_list(&self) -> Vec<String> {
        labels::split(&self.emotional_triggers)
    }
}

pub struct OnboardingRepo {
    db: Database,
}

impl OnboardingRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replace the singleton profile. No merge: every column is overwritten.
    #[instrument(skip(self, profile))]
    pub fn upsert(&self, profile: &NewProfile) -> Result<OnboardingProfile, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "REPLACE INTO onboarding (id, name, core_values, emotional_triggers)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    PROFILE_ID,
                    profile.name(),
                    profile.core_values(),
                    profile.emotional_triggers(),
                ],
            )?;
            Ok(OnboardingProfile {
                name: profile.name().to_string(),
                core_values: profile.core_values().to_string(),
                emotional_triggers: profile.emotional_triggers().to_string(),
            })
        })
    }

    /// The profile, or `None` if onboarding was never completed.
    #[instrument(skip(self))]
    pub fn get(&self) -> Result<Option<OnboardingProfile>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, core_values, emotional_triggers FROM onboarding WHERE id = ?1",
            )?;
            let raw = stmt
                .query_row([PROFILE_ID], |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })
                .optional()?;
            match raw {
                None => Ok(None),
                Some((Some(name), core_values, emotional_triggers)) => Ok(Some(OnboardingProfile {
                    name,
                    core_values: core_values.unwrap_or_default(),
                    emotional_triggers: emotional_triggers.unwrap_or_default(),
                })),
                Some((None, _, _)) => Err(StoreError::CorruptRow {
                    table: "onboarding",
                    column: "name",
                    detail: "null name".into(),
                }),
            }
        })
    }

    /// Whether onboarding has been completed.
    pub fn exists(&self) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM onboarding", [], |row| row.get(0))?;
            Ok(count > 0)
        })
    }
}
