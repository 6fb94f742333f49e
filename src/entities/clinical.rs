//! Clinical entities - patients and prostate biopsy findings
//!
//! `biopsies` is wide and sparse. A record is usually filled in over several
//! sittings, one [`crate::entities::intake`] page at a time, and most columns
//! stay NULL until the pathology report arrives.

use crate::core::error::{StoreError, StoreResult};
use crate::core::schema::{ColumnDef, Dependent, OnDelete, Order, TableSchema, WritePolicy};
use crate::core::value::Record;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_number TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    birth_date TEXT,
    phone TEXT,
    referring_physician TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS biopsies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    biopsy_date TEXT NOT NULL,
    psa_total REAL,
    psa_free REAL,
    prostate_volume REAL,
    dre_finding TEXT,
    mri_pirads INTEGER,
    gleason_primary INTEGER,
    gleason_secondary INTEGER,
    gleason_score INTEGER,
    isup_grade INTEGER,
    cores_taken INTEGER,
    cores_positive INTEGER,
    right_base INTEGER,
    right_mid INTEGER,
    right_apex INTEGER,
    right_lateral_base INTEGER,
    right_lateral_mid INTEGER,
    right_lateral_apex INTEGER,
    left_base INTEGER,
    left_mid INTEGER,
    left_apex INTEGER,
    left_lateral_base INTEGER,
    left_lateral_mid INTEGER,
    left_lateral_apex INTEGER,
    perineural_invasion INTEGER,
    extracapsular_extension INTEGER,
    seminal_vesicle_invasion INTEGER,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_biopsies_patient ON biopsies(patient_id);
"#;

/// Sextant and lateral sampling sites, one positive/negative flag each
pub const CORE_SITES: &[&str] = &[
    "right_base",
    "right_mid",
    "right_apex",
    "right_lateral_base",
    "right_lateral_mid",
    "right_lateral_apex",
    "left_base",
    "left_mid",
    "left_apex",
    "left_lateral_base",
    "left_lateral_mid",
    "left_lateral_apex",
];

pub const DRE_FINDINGS: &[&str] = &["normal", "suspicious", "nodule"];

pub static PATIENTS: TableSchema = TableSchema {
    name: "patients",
    entity: "patient",
    columns: &[
        ColumnDef::text("file_number").required().unique().searchable(),
        ColumnDef::text("full_name").required().searchable(),
        ColumnDef::date("birth_date"),
        ColumnDef::text("phone").searchable(),
        ColumnDef::text("referring_physician").searchable(),
        ColumnDef::text("notes"),
        ColumnDef::created_at(),
    ],
    order: Order::by("full_name"),
    dependents: &[Dependent {
        table: "biopsies",
        column: "patient_id",
        on_delete: OnDelete::Cascade,
    }],
    policy: WritePolicy::Open,
    check: None,
};

pub static BIOPSIES: TableSchema = TableSchema {
    name: "biopsies",
    entity: "biopsy",
    columns: &[
        ColumnDef::integer("patient_id").required().references("patients"),
        ColumnDef::date("biopsy_date").required(),
        ColumnDef::real("psa_total").non_negative(),
        ColumnDef::real("psa_free").non_negative(),
        ColumnDef::real("prostate_volume").non_negative(),
        ColumnDef::choice("dre_finding", DRE_FINDINGS),
        ColumnDef::integer("mri_pirads").range(1.0, 5.0),
        ColumnDef::integer("gleason_primary").range(1.0, 5.0),
        ColumnDef::integer("gleason_secondary").range(1.0, 5.0),
        ColumnDef::integer("gleason_score").range(2.0, 10.0),
        ColumnDef::integer("isup_grade").range(1.0, 5.0),
        ColumnDef::integer("cores_taken").non_negative(),
        ColumnDef::integer("cores_positive").non_negative(),
        ColumnDef::boolean("right_base"),
        ColumnDef::boolean("right_mid"),
        ColumnDef::boolean("right_apex"),
        ColumnDef::boolean("right_lateral_base"),
        ColumnDef::boolean("right_lateral_mid"),
        ColumnDef::boolean("right_lateral_apex"),
        ColumnDef::boolean("left_base"),
        ColumnDef::boolean("left_mid"),
        ColumnDef::boolean("left_apex"),
        ColumnDef::boolean("left_lateral_base"),
        ColumnDef::boolean("left_lateral_mid"),
        ColumnDef::boolean("left_lateral_apex"),
        ColumnDef::boolean("perineural_invasion"),
        ColumnDef::boolean("extracapsular_extension"),
        ColumnDef::boolean("seminal_vesicle_invasion"),
        ColumnDef::text("notes").searchable(),
        ColumnDef::created_at(),
    ],
    order: Order::newest_first(),
    dependents: &[],
    policy: WritePolicy::Open,
    check: Some(check_biopsy),
};

pub static TABLES: &[&TableSchema] = &[&PATIENTS, &BIOPSIES];

/// Cross-field consistency of a (possibly partial) biopsy row
fn check_biopsy(row: &Record) -> StoreResult<()> {
    if let (Some(taken), Some(positive)) = (row.integer("cores_taken"), row.integer("cores_positive")) {
        if positive > taken {
            return Err(StoreError::validation(
                "cores_positive",
                format!("{} positive cores exceeds {} taken", positive, taken),
            ));
        }
    }

    let flagged = CORE_SITES
        .iter()
        .filter(|site| row.integer(site) == Some(1))
        .count() as i64;
    if let Some(positive) = row.integer("cores_positive") {
        if flagged > positive {
            return Err(StoreError::validation(
                "cores_positive",
                format!("{} sites are flagged positive but cores_positive is {}", flagged, positive),
            ));
        }
    }

    if let (Some(total), Some(free)) = (row.real("psa_total"), row.real("psa_free")) {
        if free > total {
            return Err(StoreError::validation(
                "psa_free",
                format!("free PSA {} exceeds total PSA {}", free, total),
            ));
        }
    }

    if let (Some(primary), Some(secondary), Some(score)) = (
        row.integer("gleason_primary"),
        row.integer("gleason_secondary"),
        row.integer("gleason_score"),
    ) {
        if primary + secondary != score {
            return Err(StoreError::validation(
                "gleason_score",
                format!("{} + {} is not {}", primary, secondary, score),
            ));
        }
    }
    Ok(())
}

/// Free-to-total PSA ratio as a percentage, when both are recorded
pub fn free_psa_ratio(row: &Record) -> Option<f64> {
    let total = row.real("psa_total").filter(|t| *t > 0.0)?;
    let free = row.real("psa_free")?;
    Some(free / total * 100.0)
}

/// PSA density (ng/mL per cc), when volume is recorded
pub fn psa_density(row: &Record) -> Option<f64> {
    let volume = row.real("prostate_volume").filter(|v| *v > 0.0)?;
    Some(row.real("psa_total")? / volume)
}
