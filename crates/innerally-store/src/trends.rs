//! Aggregations feeding the mood-trend and healing-map charts.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkins::CheckIn;
use crate::healing::HealingEntry;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodTrendPoint {
    pub date: NaiveDate,
    /// Alphabetic mood word of the day's dominant label, e.g. `Happy`.
    pub mood: String,
    /// How many check-ins carried the dominant label.
    pub count: usize,
    /// All check-ins that day.
    pub total: usize,
}

/// First run of ASCII letters in a mood label (`"😊 Happy"` → `"Happy"`).
/// Labels without letters are returned trimmed.
pub fn mood_word(label: &str) -> String {
    let start = label.find(|c: char| c.is_ascii_alphabetic());
    match start {
        Some(start) => {
            let rest = &label[start..];
            let end = rest
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            rest[..end].to_string()
        }
        None => label.trim().to_string(),
    }
}

/// Midnight UTC opening a window of `days` whole calendar days that ends
/// with the day containing `now`. A zero-day window still covers today.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let back = u64::from(days.saturating_sub(1));
    let first = now
        .date_naive()
        .checked_sub_days(Days::new(back))
        .unwrap_or(NaiveDate::MIN);
    first.and_time(NaiveTime::MIN).and_utc()
}

/// One point per UTC calendar day, ascending by date.
///
/// The dominant mood is the most frequent raw label of the day. Ties go to
/// the tied label whose first check-in that day came earliest, which is the
/// order `checkins` is expected in (oldest first).
pub fn mood_trend(checkins: &[CheckIn]) -> Vec<MoodTrendPoint> {
    // Per day: labels in first-seen order with their counts.
    let mut days: BTreeMap<NaiveDate, Vec<(&str, usize)>> = BTreeMap::new();
    for checkin in checkins {
        let tally = days.entry(checkin.timestamp.date_naive()).or_default();
        match tally.iter_mut().find(|(label, _)| *label == checkin.mood) {
            Some((_, count)) => *count += 1,
            None => tally.push((checkin.mood.as_str(), 1)),
        }
    }

    days.into_iter()
        .filter_map(|(date, tally)| {
            let total: usize = tally.iter().map(|(_, c)| c).sum();
            // Strict comparison keeps the earliest label on ties.
            let (label, count) = tally
                .into_iter()
                .fold(None::<(&str, usize)>, |best, (label, count)| match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((label, count)),
                })?;
            Some(MoodTrendPoint {
                date,
                mood: mood_word(label),
                count,
                total,
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisStat {
    pub label: String,
    pub entries: usize,
    pub mean_intensity: f64,
}

/// Radial healing-map data: how often each trigger and tool appears and how
/// intense the moments it appeared in were.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealingMap {
    pub triggers: Vec<AxisStat>,
    pub tools: Vec<AxisStat>,
}

/// Both axes sorted by entry count descending, then label ascending.
pub fn healing_map(entries: &[HealingEntry]) -> HealingMap {
    let mut triggers: BTreeMap<String, (usize, u32)> = BTreeMap::new();
    let mut tools: BTreeMap<String, (usize, u32)> = BTreeMap::new();

    for entry in entries {
        let intensity = u32::from(entry.intensity.value());
        for trigger in &entry.triggers {
            let slot = triggers.entry(trigger.clone()).or_default();
            slot.0 += 1;
            slot.1 += intensity;
        }
        for tool in &entry.tools {
            let slot = tools.entry(tool.label().to_string()).or_default();
            slot.0 += 1;
            slot.1 += intensity;
        }
    }

    HealingMap {
        triggers: to_axis(triggers),
        tools: to_axis(tools),
    }
}

fn to_axis(tally: BTreeMap<String, (usize, u32)>) -> Vec<AxisStat> {
    let mut axis: Vec<AxisStat> = tally
        .into_iter()
        .map(|(label, (entries, sum))| AxisStat {
            label,
            entries,
            mean_intensity: f64::from(sum) / entries as f64,
        })
        .collect();
    // BTreeMap already yields labels ascending; stable sort keeps that on ties.
    axis.sort_by(|a, b| b.entries.cmp(&a.entries));
    axis
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use innerally_core::validation::{CopingTool, Intensity};

    fn checkin(id: i64, mood: &str, day: u32, hour: u32) -> CheckIn {
        CheckIn {
            id,
            mood: mood.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 4, day, hour, 0, 0).unwrap(),
        }
    }

    fn healing(intensity: i64, triggers: &[&str], tools: &[CopingTool]) -> HealingEntry {
        HealingEntry {
            id: 0,
            timestamp: Utc::now(),
            intensity: Intensity::new(intensity).unwrap(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            tools: tools.to_vec(),
        }
    }

    #[test]
    fn mood_word_extracts_letters() {
        assert_eq!(mood_word("😊 Happy"), "Happy");
        assert_eq!(mood_word("😰 Anxious"), "Anxious");
        assert_eq!(mood_word("so-so"), "so");
        assert_eq!(mood_word(" 🙂 "), "🙂");
    }

    #[test]
    fn empty_input_empty_trend() {
        assert!(mood_trend(&[]).is_empty());
    }

    #[test]
    fn one_point_per_day_ascending() {
        let trend = mood_trend(&[
            checkin(1, "😟 Sad", 1, 9),
            checkin(2, "😊 Happy", 2, 9),
            checkin(3, "😊 Happy", 2, 20),
            checkin(4, "😟 Sad", 2, 21),
        ]);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        assert_eq!(trend[0].mood, "Sad");
        assert_eq!(trend[1].mood, "Happy");
        assert_eq!(trend[1].count, 2);
        assert_eq!(trend[1].total, 3);
    }

    #[test]
    fn duplicate_same_day_checkins_both_count() {
        let trend = mood_trend(&[checkin(1, "😊 Happy", 3, 8), checkin(2, "😊 Happy", 3, 18)]);
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].mood, "Happy");
        assert_eq!(trend[0].count, 2);
    }

    #[test]
    fn tie_goes_to_first_recorded_label() {
        let trend = mood_trend(&[
            checkin(1, "😠 Angry", 5, 7),
            checkin(2, "😐 Neutral", 5, 8),
            checkin(3, "😐 Neutral", 5, 9),
            checkin(4, "😠 Angry", 5, 10),
        ]);
        assert_eq!(trend[0].mood, "Angry");

        let reversed = mood_trend(&[
            checkin(1, "😐 Neutral", 5, 7),
            checkin(2, "😠 Angry", 5, 8),
        ]);
        assert_eq!(reversed[0].mood, "Neutral");
    }

    #[test]
    fn healing_map_counts_and_means() {
        let map = healing_map(&[
            healing(8, &["criticism", "deadlines"], &[CopingTool::Breathing]),
            healing(4, &["criticism"], &[CopingTool::Breathing, CopingTool::Rest]),
            healing(6, &["noise"], &[]),
        ]);

        assert_eq!(map.triggers[0].label, "criticism");
        assert_eq!(map.triggers[0].entries, 2);
        assert!((map.triggers[0].mean_intensity - 6.0).abs() < f64::EPSILON);
        // Ties on count fall back to label order.
        assert_eq!(map.triggers[1].label, "deadlines");
        assert_eq!(map.triggers[2].label, "noise");

        assert_eq!(map.tools[0].label, "Breathing");
        assert_eq!(map.tools[0].entries, 2);
        assert_eq!(map.tools[1].label, "Rest");
        assert!((map.tools[1].mean_intensity - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_starts_at_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 4, 10, 15, 42, 7).unwrap();
        assert_eq!(
            window_start(now, 7),
            Utc.with_ymd_and_hms(2026, 4, 4, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window_start(now, 1),
            Utc.with_ymd_and_hms(2026, 4, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(window_start(now, 0), window_start(now, 1));
    }

    #[test]
    fn window_keeps_whole_oldest_day() {
        let now = Utc.with_ymd_and_hms(2026, 4, 10, 15, 0, 0).unwrap();
        let since = window_start(now, 7);
        let early = checkin(1, "😊 Happy", 4, 1);
        assert!(early.timestamp >= since);

        let points = mood_trend(&[early]);
        assert_eq!(points[0].date, since.date_naive());
    }

    #[test]
    fn healing_map_empty() {
        assert_eq!(healing_map(&[]), HealingMap::default());
    }
}
