//! Daily time-blocked schedule and block window transitions.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Error, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Category of scheduled activity. At most one session per category is
/// active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[serde(alias = "science_youtube_and_papers")]
    Science,
    #[serde(alias = "self_help_youtube")]
    SelfHelp,
    #[serde(alias = "artistic_movies")]
    Artistic,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Science => "science",
            BlockType::SelfHelp => "self_help",
            BlockType::Artistic => "artistic",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "science" | "science_youtube_and_papers" => Ok(BlockType::Science),
            "self_help" | "self_help_youtube" => Ok(BlockType::SelfHelp),
            "artistic" | "artistic_movies" => Ok(BlockType::Artistic),
            other => Err(anyhow!("unknown block type '{other}'")),
        }
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// One named block of the day. The window is `[start, end)` in local time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub name: String,
    pub block_type: BlockType,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub goal_minutes: u64,
    pub attention_threshold: f64,
}

impl TimeBlock {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }

    pub fn goal_ms(&self) -> u64 {
        self.goal_minutes.saturating_mul(60_000)
    }

    /// Rejects blocks a session could never be started from.
    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.attention_threshold) {
            bail!(
                "block '{}' attention threshold must be within [0, 1], got {}",
                self.name,
                self.attention_threshold
            );
        }
        if self.start >= self.end {
            bail!(
                "block '{}' must start before it ends ({} >= {})",
                self.name,
                self.start.format("%H:%M"),
                self.end.format("%H:%M")
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub blocks: Vec<TimeBlock>,
}

impl Schedule {
    pub fn new(blocks: Vec<TimeBlock>) -> Self {
        Self { blocks }
    }

    pub fn find(&self, name: &str) -> Option<&TimeBlock> {
        self.blocks.iter().find(|block| block.name == name)
    }

    /// Block in effect at `time`. A manual override, when given and known,
    /// wins over the clock.
    pub fn current_block(&self, time: NaiveTime, override_block: Option<&str>) -> Option<&TimeBlock> {
        if let Some(name) = override_block {
            match self.find(name) {
                Some(block) => return Some(block),
                None => log::warn!("Override block '{name}' not found in schedule"),
            }
        }
        self.blocks.iter().find(|block| block.contains(time))
    }

    /// First block starting after `time` today.
    pub fn next_block(&self, time: NaiveTime) -> Option<&TimeBlock> {
        self.blocks
            .iter()
            .filter(|block| block.start > time)
            .min_by_key(|block| block.start)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Opened(TimeBlock),
    Closed(TimeBlock),
}

/// Turns successive "current block" observations into open/close events.
#[derive(Debug, Default)]
pub struct BlockWindowWatcher {
    open: Option<TimeBlock>,
}

impl BlockWindowWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_block(&self) -> Option<&TimeBlock> {
        self.open.as_ref()
    }

    pub fn observe(&mut self, current: Option<&TimeBlock>) -> Vec<WindowEvent> {
        if self.open.as_ref() == current {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(previous) = self.open.take() {
            events.push(WindowEvent::Closed(previous));
        }
        if let Some(block) = current {
            events.push(WindowEvent::Opened(block.clone()));
            self.open = Some(block.clone());
        }
        events
    }
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// The default learning day.
pub fn default_blocks() -> Vec<TimeBlock> {
    vec![
        TimeBlock {
            name: "Science Learning".into(),
            block_type: BlockType::Science,
            start: at(9, 0),
            end: at(12, 0),
            goal_minutes: 120,
            attention_threshold: 0.7,
        },
        TimeBlock {
            name: "Self Help".into(),
            block_type: BlockType::SelfHelp,
            start: at(14, 0),
            end: at(15, 30),
            goal_minutes: 60,
            attention_threshold: 0.6,
        },
        TimeBlock {
            name: "Artistic Movies".into(),
            block_type: BlockType::Artistic,
            start: at(20, 0),
            end: at(22, 30),
            goal_minutes: 120,
            attention_threshold: 0.5,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schedule() -> Schedule {
        Schedule::new(default_blocks())
    }

    #[test]
    fn current_block_uses_half_open_windows() {
        let schedule = schedule();
        assert_eq!(
            schedule.current_block(at(9, 0), None).map(|b| b.block_type),
            Some(BlockType::Science)
        );
        assert!(schedule.current_block(at(12, 0), None).is_none());
        assert_eq!(
            schedule.next_block(at(12, 0)).map(|b| b.name.as_str()),
            Some("Self Help")
        );
    }

    #[test]
    fn override_wins_over_the_clock() {
        let schedule = schedule();
        let block = schedule.current_block(at(9, 30), Some("Artistic Movies")).unwrap();
        assert_eq!(block.block_type, BlockType::Artistic);

        let unknown = schedule.current_block(at(9, 30), Some("Nap Time")).unwrap();
        assert_eq!(unknown.block_type, BlockType::Science);
    }

    #[test]
    fn watcher_emits_close_then_open() {
        let schedule = schedule();
        let mut watcher = BlockWindowWatcher::new();
        let science = &schedule.blocks[0];
        let self_help = &schedule.blocks[1];

        assert_eq!(watcher.observe(Some(science)), vec![WindowEvent::Opened(science.clone())]);
        assert!(watcher.observe(Some(science)).is_empty());
        assert_eq!(
            watcher.observe(Some(self_help)),
            vec![
                WindowEvent::Closed(science.clone()),
                WindowEvent::Opened(self_help.clone())
            ]
        );
        assert_eq!(watcher.observe(None), vec![WindowEvent::Closed(self_help.clone())]);
        assert!(watcher.open_block().is_none());
    }

    #[test]
    fn blocks_deserialize_from_hour_minute_strings() {
        let json = r#"{
            "name": "Morning Physics",
            "blockType": "science_youtube_and_papers",
            "start": "07:30",
            "end": "08:15",
            "goalMinutes": 40,
            "attentionThreshold": 0.75
        }"#;
        let block: TimeBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.block_type, BlockType::Science);
        assert_eq!(block.start, at(7, 30));
        assert_eq!(block.goal_ms(), 2_400_000);
        assert!(serde_json::to_string(&block).unwrap().contains("\"07:30\""));
    }

    #[test]
    fn check_rejects_percent_thresholds_and_inverted_windows() {
        for block in default_blocks() {
            assert!(block.check().is_ok());
        }

        let mut block = default_blocks().remove(0);
        block.attention_threshold = 70.0;
        assert!(block.check().unwrap_err().to_string().contains("attention threshold"));

        let mut block = default_blocks().remove(0);
        block.end = block.start;
        assert!(block.check().is_err());
    }
}
