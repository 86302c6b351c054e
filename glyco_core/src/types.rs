//! Core domain types for the Glyco log.
//!
//! This module defines the fundamental types used throughout the system:
//! - Entry categories (Matin / Midi / Soir / Divers)
//! - Journal entries with their medication snapshots
//! - Partial updates applied by the entry store

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Category
// ============================================================================

/// Moment of the day an entry is filed under
///
/// Stored with the historical French labels. Labels outside the fixed set are
/// kept verbatim in `Unknown` instead of being folded into `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Morning,
    Midday,
    Evening,
    #[default]
    Other,
    Unknown(String),
}

impl Category {
    /// The four categories every catalog and dashboard reports on
    pub const FIXED: [Category; 4] = [
        Category::Morning,
        Category::Midday,
        Category::Evening,
        Category::Other,
    ];

    /// Resolve a stored or user-typed label
    ///
    /// Accepts the French labels and their English names, case-insensitively.
    /// An empty label resolves to `Other`.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "matin" | "morning" => Category::Morning,
            "midi" | "midday" | "noon" => Category::Midday,
            "soir" | "evening" => Category::Evening,
            "divers" | "other" | "" => Category::Other,
            _ => Category::Unknown(trimmed.to_string()),
        }
    }

    /// Label written to disk and shown to the user
    pub fn label(&self) -> &str {
        match self {
            Category::Morning => "Matin",
            Category::Midday => "Midi",
            Category::Evening => "Soir",
            Category::Other => "Divers",
            Category::Unknown(label) => label,
        }
    }

    /// Map unknown labels onto `Other`, for places that only know the fixed set
    pub fn or_other(&self) -> Category {
        match self {
            Category::Unknown(_) => Category::Other,
            known => known.clone(),
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Category::from_label(&label)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Entry
// ============================================================================

/// Copy of a catalog medication taken with an entry
///
/// Editing the catalog later never rewrites these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicationSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub dose: String,
    #[serde(default)]
    pub taken: bool,
}

/// One journal record: a reading, what was taken, and notes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default = "midnight", with = "hh_mm")]
    pub time: NaiveTime,
    #[serde(default)]
    pub category: Category,
    /// Blood glucose in g/L
    #[serde(default)]
    pub glycemia: Option<f64>,
    /// Rapid-acting insulin units
    #[serde(default)]
    pub rapid_insulin: Option<f64>,
    /// Basal insulin units
    #[serde(default)]
    pub basal_insulin: Option<f64>,
    #[serde(default)]
    pub medications: Vec<MedicationSnapshot>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Create a blank entry with a fresh id and timestamps
    pub fn new(date: NaiveDate, time: NaiveTime, category: Category) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date,
            time,
            category,
            glycemia: None,
            rapid_insulin: None,
            basal_insulin: None,
            medications: Vec::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style setter for the glycemia reading
    pub fn with_glycemia(mut self, glycemia: f64) -> Self {
        self.glycemia = Some(glycemia);
        self
    }

    /// The reading, if present and finite
    pub fn reading(&self) -> Option<f64> {
        self.glycemia.filter(|v| v.is_finite())
    }

    /// Date and time combined, used to order readings
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Partial update for an existing entry; `None` fields are left untouched
///
/// The optional entry values take a nested option: `Some(None)` clears the
/// stored value, `Some(Some(v))` replaces it.
#[derive(Clone, Debug, Default)]
pub struct EntryPatch {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub category: Option<Category>,
    pub glycemia: Option<Option<f64>>,
    pub rapid_insulin: Option<Option<f64>>,
    pub basal_insulin: Option<Option<f64>>,
    pub medications: Option<Vec<MedicationSnapshot>>,
    pub notes: Option<Option<String>>,
}

impl EntryPatch {
    /// True if the patch would not change anything
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.time.is_none()
            && self.category.is_none()
            && self.glycemia.is_none()
            && self.rapid_insulin.is_none()
            && self.basal_insulin.is_none()
            && self.medications.is_none()
            && self.notes.is_none()
    }

    /// Merge the present fields into `entry` and refresh `updated_at`
    pub fn apply(self, entry: &mut Entry) {
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(time) = self.time {
            entry.time = time;
        }
        if let Some(category) = self.category {
            entry.category = category;
        }
        if let Some(glycemia) = self.glycemia {
            entry.glycemia = glycemia;
        }
        if let Some(units) = self.rapid_insulin {
            entry.rapid_insulin = units;
        }
        if let Some(units) = self.basal_insulin {
            entry.basal_insulin = units;
        }
        if let Some(medications) = self.medications {
            entry.medications = medications;
        }
        if let Some(notes) = self.notes {
            entry.notes = notes.filter(|n| !n.trim().is_empty());
        }
        entry.updated_at = Utc::now();
    }
}

fn midnight() -> NaiveTime {
    NaiveTime::MIN
}

/// `HH:MM` codec for entry times; `null` reads as midnight
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(NaiveTime::MIN),
            Some(s) => NaiveTime::parse_from_str(s, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
                .map_err(serde::de::Error::custom),
        }
    }
}
