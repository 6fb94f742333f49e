//! Multi-page biopsy intake
//!
//! An [`IntakeSession`] carries everything entered for one patient visit
//! across the intake pages until it is committed. Each page accepts only its
//! own columns; nothing touches the database before [`IntakeSession::commit`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::core::db::Database;
use crate::core::error::{StoreError, StoreResult};
use crate::core::store::RecordStore;
use crate::core::value::{display_value, Fields, Record};
use crate::entities::clinical::{self, BIOPSIES, CORE_SITES, PATIENTS};

/// Intake pages in the order they are normally filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Demographics,
    Psa,
    Imaging,
    Pathology,
    CoreSites,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Demographics,
        Page::Psa,
        Page::Imaging,
        Page::Pathology,
        Page::CoreSites,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Demographics => "demographics",
            Page::Psa => "psa",
            Page::Imaging => "imaging",
            Page::Pathology => "pathology",
            Page::CoreSites => "core_sites",
        }
    }

    /// Columns this page may set
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Page::Demographics => &[
                "file_number",
                "full_name",
                "birth_date",
                "phone",
                "referring_physician",
            ],
            Page::Psa => &[
                "biopsy_date",
                "psa_total",
                "psa_free",
                "prostate_volume",
                "dre_finding",
            ],
            Page::Imaging => &["mri_pirads"],
            Page::Pathology => &[
                "gleason_primary",
                "gleason_secondary",
                "gleason_score",
                "isup_grade",
                "cores_taken",
                "cores_positive",
                "perineural_invasion",
                "extracapsular_extension",
                "seminal_vesicle_invasion",
                "notes",
            ],
            Page::CoreSites => CORE_SITES,
        }
    }

    fn is_patient_page(&self) -> bool {
        matches!(self, Page::Demographics)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Page {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Page::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| StoreError::validation("page", format!("unknown intake page '{}'", s)))
    }
}

/// On-disk intake file: page name -> field -> scalar
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct IntakeFile {
    patient_id: Option<i64>,
    biopsy_id: Option<i64>,
    demographics: BTreeMap<String, serde_yml::Value>,
    psa: BTreeMap<String, serde_yml::Value>,
    imaging: BTreeMap<String, serde_yml::Value>,
    pathology: BTreeMap<String, serde_yml::Value>,
    core_sites: BTreeMap<String, serde_yml::Value>,
}

/// What a commit wrote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntakeOutcome {
    pub patient_id: i64,
    pub created_patient: bool,
    pub biopsy_id: Option<i64>,
    pub created_biopsy: bool,
    /// Free/total PSA in percent, from the stored biopsy
    pub free_psa_ratio: Option<f64>,
    pub psa_density: Option<f64>,
}

/// Wizard state for one patient visit
#[derive(Debug, Clone, Default)]
pub struct IntakeSession {
    patient_id: Option<i64>,
    biopsy_id: Option<i64>,
    /// Values already stored, shown but not rewritten
    loaded: Fields,
    /// Values entered this session, per page
    edits: BTreeMap<Page, Fields>,
}

impl IntakeSession {
    /// Start a new visit
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a biopsy for an existing patient
    pub fn for_patient(db: &Database, patient_id: i64) -> StoreResult<Self> {
        let patient = db.store(&PATIENTS).get(patient_id)?;
        let mut session = Self::new();
        session.patient_id = Some(patient_id);
        session.absorb(&patient, Page::Demographics);
        Ok(session)
    }

    /// Resume editing a stored biopsy
    pub fn resume(db: &Database, biopsy_id: i64) -> StoreResult<Self> {
        let biopsy = db.store(&BIOPSIES).get(biopsy_id)?;
        let patient_id = biopsy
            .integer("patient_id")
            .ok_or_else(|| StoreError::Integrity(format!("biopsy {} has no patient", biopsy_id)))?;
        let mut session = Self::for_patient(db, patient_id)?;
        session.biopsy_id = Some(biopsy_id);
        for page in Page::ALL.into_iter().filter(|p| !p.is_patient_page()) {
            session.absorb(&biopsy, page);
        }
        Ok(session)
    }

    /// Parse an intake file
    pub fn from_yaml(text: &str) -> StoreResult<Self> {
        let file: IntakeFile = serde_yml::from_str(text)
            .map_err(|e| StoreError::validation("intake", e.to_string()))?;

        let mut session = Self::new();
        session.patient_id = file.patient_id;
        session.biopsy_id = file.biopsy_id;
        let pages = [
            (Page::Demographics, file.demographics),
            (Page::Psa, file.psa),
            (Page::Imaging, file.imaging),
            (Page::Pathology, file.pathology),
            (Page::CoreSites, file.core_sites),
        ];
        for (page, values) in pages {
            for (field, value) in values {
                let text = scalar_text(&field, &value)?;
                session.set(page, &field, text)?;
            }
        }
        Ok(session)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn patient_id(&self) -> Option<i64> {
        self.patient_id
    }

    pub fn biopsy_id(&self) -> Option<i64> {
        self.biopsy_id
    }

    /// Enter a value on a page; fields belonging to another page are refused
    pub fn set(&mut self, page: Page, field: &str, value: impl Into<String>) -> StoreResult<()> {
        if !page.columns().contains(&field) {
            let owner = Page::ALL.into_iter().find(|p| p.columns().contains(&field));
            let message = match owner {
                Some(owner) => format!("belongs on the {} page, not {}", owner, page),
                None => "is not an intake field".to_string(),
            };
            return Err(StoreError::validation(field, message));
        }
        self.edits.entry(page).or_default().insert(field, value);
        Ok(())
    }

    /// Current value of a field: this session's edit, else the stored value
    pub fn value(&self, page: Page, field: &str) -> Option<&str> {
        self.edits
            .get(&page)
            .and_then(|f| f.get(field))
            .or_else(|| self.loaded.get(field).filter(|_| page.columns().contains(&field)))
    }

    /// Values entered on one page this session
    pub fn page(&self, page: Page) -> Fields {
        self.edits.get(&page).cloned().unwrap_or_default()
    }

    pub fn is_dirty(&self) -> bool {
        self.edits.values().any(|f| !f.is_empty())
    }

    /// Write the patient and biopsy in one transaction
    pub fn commit(&self, db: &mut Database) -> StoreResult<IntakeOutcome> {
        let patient_fields = self.page(Page::Demographics);
        let mut biopsy_fields = Fields::new();
        for page in Page::ALL.into_iter().filter(|p| !p.is_patient_page()) {
            biopsy_fields.merge(&self.page(page));
        }

        let tx = db.transaction()?;
        let patients = RecordStore::new(&tx, &PATIENTS);
        let biopsies = RecordStore::new(&tx, &BIOPSIES);

        let known = match (self.patient_id, self.biopsy_id) {
            (Some(id), _) => Some(id),
            (None, Some(biopsy)) => biopsies.get(biopsy)?.integer("patient_id"),
            (None, None) => None,
        };
        let existing = match known {
            Some(id) => Some(id),
            None => match patient_fields.get("file_number").map(str::trim) {
                Some(number) if !number.is_empty() => tx
                    .query_row(
                        "SELECT id FROM patients WHERE file_number = ?1",
                        params![number],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?,
                _ => {
                    return Err(StoreError::validation(
                        "file_number",
                        "a new intake needs a patient id or file number",
                    ))
                }
            },
        };

        let (patient_id, created_patient) = match existing {
            Some(id) => {
                if patient_fields.is_empty() {
                    if !patients.exists(id)? {
                        return Err(StoreError::not_found(PATIENTS.entity, id));
                    }
                } else {
                    patients.patch(id, &patient_fields)?;
                }
                (id, false)
            }
            None => (patients.insert(&patient_fields)?, true),
        };

        let (biopsy_id, created_biopsy) = match self.biopsy_id {
            Some(id) => {
                let stored = biopsies.get(id)?;
                if stored.integer("patient_id") != Some(patient_id) {
                    return Err(StoreError::validation(
                        "biopsy_id",
                        format!("biopsy {} belongs to another patient", id),
                    ));
                }
                if !biopsy_fields.is_empty() {
                    biopsies.patch(id, &biopsy_fields)?;
                }
                (Some(id), false)
            }
            None if biopsy_fields.is_empty() => (None, false),
            None => {
                biopsy_fields.insert("patient_id", patient_id.to_string());
                (Some(biopsies.insert(&biopsy_fields)?), true)
            }
        };

        let stored = match biopsy_id {
            Some(id) => Some(biopsies.get(id)?),
            None => None,
        };
        tx.commit()?;

        tracing::info!(patient_id, ?biopsy_id, created_patient, created_biopsy, "intake committed");
        Ok(IntakeOutcome {
            patient_id,
            created_patient,
            biopsy_id,
            created_biopsy,
            free_psa_ratio: stored.as_ref().and_then(clinical::free_psa_ratio),
            psa_density: stored.as_ref().and_then(clinical::psa_density),
        })
    }

    fn absorb(&mut self, record: &Record, page: Page) {
        for column in page.columns() {
            if let Some(value) = record.get(column).filter(|v| **v != Value::Null) {
                self.loaded.insert(*column, display_value(value));
            }
        }
    }
}

/// Render a YAML scalar as form text
fn scalar_text(field: &str, value: &serde_yml::Value) -> StoreResult<String> {
    match value {
        serde_yml::Value::Null => Ok(String::new()),
        serde_yml::Value::Bool(b) => Ok(b.to_string()),
        serde_yml::Value::Number(n) => Ok(n.to_string()),
        serde_yml::Value::String(s) => Ok(s.clone()),
        _ => Err(StoreError::validation(field, "expected a single value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::Domain;

    fn clinic() -> Database {
        Database::open_in_memory(Domain::Clinical).unwrap()
    }

    const VISIT: &str = r#"
demographics:
  file_number: F-200
  full_name: Samir K.
  birth_date: 1958-04-02
psa:
  biopsy_date: 2024-06-01
  psa_total: 8.0
  psa_free: 1.6
  prostate_volume: 40
  dre_finding: suspicious
imaging:
  mri_pirads: 4
pathology:
  gleason_primary: 3
  gleason_secondary: 4
  gleason_score: 7
  cores_taken: 12
  cores_positive: 2
  perineural_invasion: false
core_sites:
  right_base: true
  left_mid: yes
"#;

    #[test]
    fn test_pages_refuse_foreign_fields() {
        let mut session = IntakeSession::new();
        session.set(Page::Psa, "psa_total", "4.2").unwrap();

        let err = session.set(Page::Psa, "gleason_score", "7").unwrap_err();
        assert!(err.to_string().contains("pathology"));
        assert!(session.set(Page::Imaging, "password", "x").is_err());
        assert_eq!(session.value(Page::Psa, "psa_total"), Some("4.2"));
    }

    #[test]
    fn test_commit_from_yaml_creates_patient_and_biopsy() {
        let mut db = clinic();
        let session = IntakeSession::from_yaml(VISIT).unwrap();
        let outcome = session.commit(&mut db).unwrap();

        assert!(outcome.created_patient);
        assert!(outcome.created_biopsy);
        assert_eq!(outcome.free_psa_ratio, Some(20.0));
        assert_eq!(outcome.psa_density, Some(0.2));

        let biopsy = db.store(&BIOPSIES).get(outcome.biopsy_id.unwrap()).unwrap();
        assert_eq!(biopsy.integer("patient_id"), Some(outcome.patient_id));
        assert_eq!(biopsy.integer("gleason_score"), Some(7));
        assert_eq!(biopsy.integer("right_base"), Some(1));
        assert_eq!(biopsy.integer("left_mid"), Some(1));
        assert_eq!(biopsy.integer("perineural_invasion"), Some(0));
        assert_eq!(biopsy.integer("left_apex"), None);
    }

    #[test]
    fn test_second_visit_reuses_patient_by_file_number() {
        let mut db = clinic();
        let first = IntakeSession::from_yaml(VISIT).unwrap().commit(&mut db).unwrap();

        let mut session = IntakeSession::new();
        session.set(Page::Demographics, "file_number", "F-200").unwrap();
        session.set(Page::Demographics, "phone", "555-0101").unwrap();
        session.set(Page::Psa, "biopsy_date", "2024-12-01").unwrap();
        let second = session.commit(&mut db).unwrap();

        assert!(!second.created_patient);
        assert_eq!(second.patient_id, first.patient_id);
        assert_ne!(second.biopsy_id, first.biopsy_id);
        let patient = db.store(&PATIENTS).get(first.patient_id).unwrap();
        assert_eq!(patient.text("phone"), Some("555-0101"));
        assert_eq!(patient.text("full_name"), Some("Samir K."));
    }

    #[test]
    fn test_resume_updates_only_edited_fields() {
        let mut db = clinic();
        let outcome = IntakeSession::from_yaml(VISIT).unwrap().commit(&mut db).unwrap();
        let biopsy_id = outcome.biopsy_id.unwrap();

        let mut session = IntakeSession::resume(&db, biopsy_id).unwrap();
        assert_eq!(session.value(Page::Imaging, "mri_pirads"), Some("4"));
        assert!(!session.is_dirty());

        session.set(Page::Imaging, "mri_pirads", "5").unwrap();
        let again = session.commit(&mut db).unwrap();
        assert!(!again.created_biopsy);
        assert_eq!(again.biopsy_id, Some(biopsy_id));

        let biopsy = db.store(&BIOPSIES).get(biopsy_id).unwrap();
        assert_eq!(biopsy.integer("mri_pirads"), Some(5));
        assert_eq!(biopsy.integer("gleason_score"), Some(7));
    }

    #[test]
    fn test_failed_biopsy_rolls_back_new_patient() {
        let mut db = clinic();
        let mut session = IntakeSession::new();
        session.set(Page::Demographics, "file_number", "F-300").unwrap();
        session.set(Page::Demographics, "full_name", "Ali R.").unwrap();
        session.set(Page::Psa, "biopsy_date", "2024-01-01").unwrap();
        session.set(Page::Pathology, "cores_taken", "4").unwrap();
        session.set(Page::Pathology, "cores_positive", "9").unwrap();

        assert!(session.commit(&mut db).is_err());
        assert_eq!(db.store(&PATIENTS).count().unwrap(), 0);
    }

    #[test]
    fn test_commit_without_patient_identity_fails() {
        let mut db = clinic();
        let mut session = IntakeSession::new();
        session.set(Page::Psa, "biopsy_date", "2024-01-01").unwrap();
        assert!(matches!(
            session.commit(&mut db).unwrap_err(),
            StoreError::Validation { .. }
        ));
    }

    #[test]
    fn test_yaml_rejects_unknown_page_and_nested_values() {
        assert!(IntakeSession::from_yaml("radiology:\n  x: 1\n").is_err());
        assert!(IntakeSession::from_yaml("psa:\n  psa_total: [1, 2]\n").is_err());
        assert_eq!("core-sites".parse::<Page>().unwrap(), Page::CoreSites);
    }
}
