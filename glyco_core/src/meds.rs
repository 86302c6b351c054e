//! Medication catalog per user and category.
//!
//! The catalog is the list of medications a user usually takes at each moment
//! of the day. Entries never reference it directly: when an entry is created
//! the relevant medications are copied into [`MedicationSnapshot`]s.

use crate::store::user_dir;
use crate::{persist, Category, Error, MedicationSnapshot, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MEDICATIONS_FILE: &str = "medications.json";

/// A medication in the catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub dose: String,
    /// Pre-selected when logging a new entry in this category
    #[serde(default)]
    pub taken: bool,
}

impl Medication {
    pub fn snapshot(&self) -> MedicationSnapshot {
        MedicationSnapshot {
            id: self.id,
            name: self.name.clone(),
            dose: self.dose.clone(),
            taken: self.taken,
        }
    }
}

/// Partial update for a catalog medication
#[derive(Clone, Debug, Default)]
pub struct MedicationPatch {
    pub name: Option<String>,
    pub dose: Option<String>,
    pub taken: Option<bool>,
}

/// Medications grouped by the four fixed categories
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationCatalog {
    #[serde(default, rename = "Matin")]
    pub morning: Vec<Medication>,
    #[serde(default, rename = "Midi")]
    pub midday: Vec<Medication>,
    #[serde(default, rename = "Soir")]
    pub evening: Vec<Medication>,
    #[serde(default, rename = "Divers")]
    pub other: Vec<Medication>,
}

impl MedicationCatalog {
    /// Medications for a category; unknown labels read from `Other`
    pub fn list(&self, category: &Category) -> &[Medication] {
        match category.or_other() {
            Category::Morning => &self.morning,
            Category::Midday => &self.midday,
            Category::Evening => &self.evening,
            _ => &self.other,
        }
    }

    fn list_mut(&mut self, category: &Category) -> &mut Vec<Medication> {
        match category.or_other() {
            Category::Morning => &mut self.morning,
            Category::Midday => &mut self.midday,
            Category::Evening => &mut self.evening,
            _ => &mut self.other,
        }
    }

    /// Add a medication; the name must not be blank
    pub fn add(
        &mut self,
        category: &Category,
        name: &str,
        dose: &str,
        taken: bool,
    ) -> Result<Medication> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("medication name is required".into()));
        }
        let med = Medication {
            id: Uuid::new_v4(),
            name: name.to_string(),
            dose: dose.trim().to_string(),
            taken,
        };
        self.list_mut(category).push(med.clone());
        Ok(med)
    }

    /// Apply `patch` to the medication with `id`; `None` if absent
    pub fn update(
        &mut self,
        category: &Category,
        id: Uuid,
        patch: MedicationPatch,
    ) -> Result<Option<Medication>> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("medication name is required".into()));
            }
        }
        let Some(med) = self.list_mut(category).iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            med.name = name.trim().to_string();
        }
        if let Some(dose) = patch.dose {
            med.dose = dose.trim().to_string();
        }
        if let Some(taken) = patch.taken {
            med.taken = taken;
        }
        Ok(Some(med.clone()))
    }

    /// Remove the medication with `id`; false if absent
    pub fn remove(&mut self, category: &Category, id: Uuid) -> bool {
        let list = self.list_mut(category);
        let before = list.len();
        list.retain(|m| m.id != id);
        list.len() != before
    }

    /// Flip (or set, with `Some`) the taken flag
    pub fn toggle_taken(
        &mut self,
        category: &Category,
        id: Uuid,
        taken: Option<bool>,
    ) -> Option<Medication> {
        let med = self.list_mut(category).iter_mut().find(|m| m.id == id)?;
        med.taken = taken.unwrap_or(!med.taken);
        Some(med.clone())
    }

    /// Find by id, or by case-insensitive name
    pub fn find(&self, category: &Category, key: &str) -> Option<&Medication> {
        let key = key.trim();
        let list = self.list(category);
        if let Ok(id) = Uuid::parse_str(key) {
            if let Some(med) = list.iter().find(|m| m.id == id) {
                return Some(med);
            }
        }
        list.iter().find(|m| m.name.eq_ignore_ascii_case(key))
    }

    /// Copies of the medications flagged as taken in this category
    pub fn snapshot_taken(&self, category: &Category) -> Vec<MedicationSnapshot> {
        self.list(category)
            .iter()
            .filter(|m| m.taken)
            .map(Medication::snapshot)
            .collect()
    }
}

/// File-backed catalog for one user
#[derive(Clone, Debug)]
pub struct MedicationStore {
    path: PathBuf,
}

impl MedicationStore {
    pub fn for_user(data_dir: &Path, user: &str) -> Result<Self> {
        Ok(Self {
            path: user_dir(data_dir, user)?.join(MEDICATIONS_FILE),
        })
    }

    /// Load the catalog; missing or corrupt files give an empty one
    pub fn load(&self) -> Result<MedicationCatalog> {
        Ok(persist::load_json(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, catalog: &MedicationCatalog) -> Result<()> {
        persist::save_json(&self.path, catalog)
    }

    /// Load, modify and save back
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MedicationCatalog) -> Result<T>,
    {
        let mut catalog = self.load()?;
        let out = f(&mut catalog)?;
        self.save(&catalog)?;
        Ok(out)
    }
}
