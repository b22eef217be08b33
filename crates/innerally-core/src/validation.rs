//! Validated inputs for the journaling store.
//!
//! Every write path takes one of these types, so a row that violates the
//! documented bounds cannot be constructed.

use serde::{Deserialize, Serialize};

use crate::labels;

/// Emotional intensity is rated on a fixed 1–10 scale.
pub const INTENSITY_MIN: u8 = 1;
pub const INTENSITY_MAX: u8 = 10;

/// Mood options offered by the check-in form. Storage accepts any non-empty label.
pub const MOOD_OPTIONS: [&str; 5] = ["😊 Happy", "😐 Neutral", "😟 Sad", "😠 Angry", "😰 Anxious"];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("journal entry is empty")]
    EmptyJournalEntry,
    #[error("mood label is empty")]
    EmptyMood,
    #[error("name is empty")]
    EmptyName,
    #[error("chat message is empty")]
    EmptyChatMessage,
    #[error("intensity {value} outside {min}..={max}")]
    IntensityOutOfRange { value: i64, min: u8, max: u8 },
    #[error("label contains a list delimiter: {0:?}")]
    DelimiterInLabel(String),
    #[error("unknown coping tool: {0}")]
    UnknownCopingTool(String),
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalText(String);

impl JournalText {
    /// Surrounding whitespace is stripped; interior formatting is kept.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        non_blank(raw).map(Self).ok_or(ValidationError::EmptyJournalEntry)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoodLabel(String);

impl MoodLabel {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        non_blank(raw).map(Self).ok_or(ValidationError::EmptyMood)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intensity(u8);

impl Intensity {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (i64::from(INTENSITY_MIN)..=i64::from(INTENSITY_MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::IntensityOutOfRange {
                value,
                min: INTENSITY_MIN,
                max: INTENSITY_MAX,
            })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Closed vocabulary of regulation tools offered on the healing form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopingTool {
    Breathing,
    Grounding,
    Journaling,
    Meditation,
    Movement,
    Music,
    Rest,
    TalkingToSomeone,
}

impl CopingTool {
    pub const ALL: [CopingTool; 8] = [
        Self::Breathing,
        Self::Grounding,
        Self::Journaling,
        Self::Meditation,
        Self::Movement,
        Self::Music,
        Self::Rest,
        Self::TalkingToSomeone,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Breathing => "Breathing",
            Self::Grounding => "Grounding",
            Self::Journaling => "Journaling",
            Self::Meditation => "Meditation",
            Self::Movement => "Movement",
            Self::Music => "Music",
            Self::Rest => "Rest",
            Self::TalkingToSomeone => "Talking to someone",
        }
    }
}

impl std::fmt::Display for CopingTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CopingTool {
    type Err = ValidationError;

    /// Case-insensitive match on the display label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|tool| tool.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownCopingTool(wanted.to_string()))
    }
}

/// Single trigger label. Free text, but must survive the delimited encoding.
pub fn trigger_label(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.contains(labels::is_delimiter) {
        return Err(ValidationError::DelimiterInLabel(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHealingEntry {
    intensity: Intensity,
    triggers: Vec<String>,
    tools: Vec<CopingTool>,
}

impl NewHealingEntry {
    /// Blank trigger labels are dropped; duplicate tools are collapsed.
    pub fn new<S: AsRef<str>>(
        intensity: i64,
        triggers: &[S],
        tools: &[CopingTool],
    ) -> Result<Self, ValidationError> {
        let intensity = Intensity::new(intensity)?;
        let mut parsed = Vec::with_capacity(triggers.len());
        for raw in triggers {
            let label = trigger_label(raw.as_ref())?;
            if !label.is_empty() {
                parsed.push(label);
            }
        }
        let mut unique_tools = Vec::with_capacity(tools.len());
        for tool in tools {
            if !unique_tools.contains(tool) {
                unique_tools.push(*tool);
            }
        }
        Ok(Self {
            intensity,
            triggers: parsed,
            tools: unique_tools,
        })
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }

    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    pub fn tools(&self) -> &[CopingTool] {
        &self.tools
    }
}

/// Onboarding submission. Replaces the singleton profile wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProfile {
    name: String,
    core_values: String,
    emotional_triggers: String,
}

impl NewProfile {
    pub fn new(
        name: &str,
        core_values: &str,
        emotional_triggers: &str,
    ) -> Result<Self, ValidationError> {
        let name = non_blank(name).ok_or(ValidationError::EmptyName)?;
        Ok(Self {
            name,
            core_values: core_values.trim().to_string(),
            emotional_triggers: emotional_triggers.trim().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn core_values(&self) -> &str {
        &self.core_values
    }

    pub fn emotional_triggers(&self) -> &str {
        &self.emotional_triggers
    }
}
