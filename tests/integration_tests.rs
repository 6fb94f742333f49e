//! Integration tests for the tally CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to get a tally command with a predictable environment
fn tally() -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env_remove("TALLY_LOG")
        .env_remove("TALLY_CSV_BOM")
        .env_remove("TALLY_RESALE")
        .env("TALLY_CURRENCY", "$");
    cmd
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tally().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Run a command that prints a new row id with `--format id`
fn create_id(tmp: &TempDir, args: &[&str]) -> String {
    let output = tally()
        .current_dir(tmp.path())
        .args(args)
        .args(["--format", "id"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    tally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_init_creates_databases() {
    let tmp = setup_test_project();
    let dir = tmp.path().join(".tally");
    assert!(dir.join("config.yaml").exists());
    for file in [
        "company_management.db",
        "device_inventory.db",
        "bank_system.db",
        "Informations.db",
    ] {
        assert!(dir.join(file).exists(), "{} missing", file);
    }
}

#[test]
fn test_init_twice_reports_existing_project() {
    let tmp = setup_test_project();
    tally()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();
    tally()
        .current_dir(tmp.path())
        .args(["record", "list", "categories"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a tally project"));
}

#[test]
fn test_completions_generate() {
    tally()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tally"));
}

// ============================================================================
// Generic record access
// ============================================================================

#[test]
fn test_record_crud_round() {
    let tmp = setup_test_project();
    let id = create_id(
        &tmp,
        &["record", "new", "categories", "--set", "name=Cables", "--set", "description=Copper"],
    );
    assert_eq!(id, "1");

    tally()
        .current_dir(tmp.path())
        .args(["record", "list", "categories"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cables"))
        .stdout(predicate::str::contains("1 category(s) found"));

    tally()
        .current_dir(tmp.path())
        .args(["record", "edit", "categories", "1", "--set", "description=Fibre"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["record", "show", "categories", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("description: Fibre"));

    tally()
        .current_dir(tmp.path())
        .args(["record", "delete", "categories", "1"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["record", "list", "categories", "--count"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_record_duplicate_reports_already_exists() {
    let tmp = setup_test_project();
    create_id(&tmp, &["record", "new", "categories", "--set", "name=Cables"]);

    tally()
        .current_dir(tmp.path())
        .args(["record", "new", "categories", "--set", "name=Cables"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_record_missing_required_field() {
    let tmp = setup_test_project();
    tally()
        .current_dir(tmp.path())
        .args(["record", "new", "products", "--set", "sku=A-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name"));
}

#[test]
fn test_record_search_and_csv() {
    let tmp = setup_test_project();
    create_id(&tmp, &["record", "new", "suppliers", "--set", "name=Acme Corp"]);
    create_id(&tmp, &["record", "new", "suppliers", "--set", "name=Globex"]);

    tally()
        .current_dir(tmp.path())
        .args(["record", "list", "suppliers", "--search", "acme", "--format", "csv", "--columns", "name"])
        .assert()
        .success()
        .stdout("id,name\n1,Acme Corp\n");
}

#[test]
fn test_record_unknown_table() {
    let tmp = setup_test_project();
    tally()
        .current_dir(tmp.path())
        .args(["record", "list", "widgets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown table"));
}

#[test]
fn test_record_new_refused_for_accounts() {
    let tmp = setup_test_project();
    tally()
        .current_dir(tmp.path())
        .args(["record", "new", "accounts", "--set", "holder_name=Ann", "--set", "account_number=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be changed"));
}

// ============================================================================
// Bank
// ============================================================================

#[test]
fn test_bank_transfer_scenario() {
    let tmp = setup_test_project();
    let a = create_id(&tmp, &["bank", "open", "--holder", "Ann", "--number", "ACC-1", "--initial", "100"]);
    let b = create_id(&tmp, &["bank", "open", "--holder", "Ben", "--number", "ACC-2"]);

    tally()
        .current_dir(tmp.path())
        .args(["bank", "transfer", a.as_str(), b.as_str(), "30"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["bank", "balance", a.as_str()])
        .assert()
        .success()
        .stdout("$70.00\n");

    tally()
        .current_dir(tmp.path())
        .args(["bank", "balance", b.as_str()])
        .assert()
        .success()
        .stdout("$30.00\n");

    tally()
        .current_dir(tmp.path())
        .args(["bank", "withdraw", b.as_str(), "50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient funds"));

    tally()
        .current_dir(tmp.path())
        .args(["bank", "history", a.as_str(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("transfer_out"))
        .stdout(predicate::str::contains("opening balance"));
}

#[test]
fn test_bank_duplicate_account_number() {
    let tmp = setup_test_project();
    create_id(&tmp, &["bank", "open", "--holder", "Ann", "--number", "ACC-1"]);
    tally()
        .current_dir(tmp.path())
        .args(["bank", "open", "--holder", "Bob", "--number", "ACC-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// Inventory
// ============================================================================

#[test]
fn test_stock_sale_and_low_stock_report() {
    let tmp = setup_test_project();
    let product = create_id(
        &tmp,
        &[
            "record", "new", "products",
            "--set", "sku=A-1",
            "--set", "name=Patch cable",
            "--set", "quantity=12",
            "--set", "reorder_point=10",
            "--set", "unit_cost=3",
            "--set", "unit_price=9",
        ],
    );

    tally()
        .current_dir(tmp.path())
        .args(["stock", "sell", product.as_str(), "20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient stock"));

    tally()
        .current_dir(tmp.path())
        .args(["report", "low-stock-alert", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A-1").not());

    tally()
        .current_dir(tmp.path())
        .args(["stock", "sell", product.as_str(), "4"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["report", "low-stock-alert", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A-1,Patch cable,,8,10,2"));

    tally()
        .current_dir(tmp.path())
        .args(["report", "sales-report", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$36.00"));
}

#[test]
fn test_device_resale_policy() {
    let tmp = setup_test_project();
    let device = create_id(
        &tmp,
        &["record", "new", "devices", "--set", "serial_number=SN-1", "--set", "name=Router"],
    );

    tally()
        .current_dir(tmp.path())
        .args(["device", "sell", device.as_str(), "--price", "120", "--customer", "Dana"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["device", "sell", device.as_str(), "--price", "90"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already sold"));

    tally()
        .current_dir(tmp.path())
        .env("TALLY_RESALE", "allow")
        .args(["device", "sell", device.as_str(), "--price", "90"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["device", "sales", device.as_str(), "--format", "id"])
        .assert()
        .success()
        .stdout("2\n1\n");
}

// ============================================================================
// Company
// ============================================================================

#[test]
fn test_payroll_adjustments() {
    let tmp = setup_test_project();
    let employee = create_id(
        &tmp,
        &[
            "record", "new", "employees",
            "--set", "employee_code=E-1",
            "--set", "full_name=Lee",
            "--set", "salary=3000",
        ],
    );
    let payroll = create_id(&tmp, &["payroll", "run", employee.as_str(), "2024-05"]);

    tally()
        .current_dir(tmp.path())
        .args(["payroll", "adjust", payroll.as_str(), "bonus", "250"])
        .assert()
        .success();
    tally()
        .current_dir(tmp.path())
        .args(["payroll", "adjust", payroll.as_str(), "tax", "50", "--reason", "withholding"])
        .assert()
        .success();

    tally()
        .current_dir(tmp.path())
        .args(["payroll", "show", payroll.as_str(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"net_pay\": 3200.0"))
        .stdout(predicate::str::contains("withholding"));

    tally()
        .current_dir(tmp.path())
        .args(["payroll", "run", employee.as_str(), "2024-05"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// Clinical
// ============================================================================

#[test]
fn test_intake_file_commit() {
    let tmp = setup_test_project();
    let file = tmp.path().join("visit.yaml");
    fs::write(
        &file,
        "demographics:\n  file_number: F-1\n  full_name: Omar\npsa:\n  biopsy_date: 2024-06-01\n  psa_total: 8.0\n  psa_free: 1.6\n",
    )
    .unwrap();

    tally()
        .current_dir(tmp.path())
        .args(["intake", "visit.yaml", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created_patient\": true"))
        .stdout(predicate::str::contains("\"free_psa_ratio\": 20.0"));

    tally()
        .current_dir(tmp.path())
        .args(["record", "list", "biopsies", "--count"])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn test_intake_rejects_field_on_wrong_page() {
    let tmp = setup_test_project();
    let file = tmp.path().join("visit.yaml");
    fs::write(&file, "demographics:\n  file_number: F-1\n  psa_total: 8.0\n").unwrap();

    tally()
        .current_dir(tmp.path())
        .args(["intake", "visit.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("psa"));
}

// ============================================================================
// Reports and schema
// ============================================================================

#[test]
fn test_report_list() {
    tally()
        .args(["report", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("low-stock-alert"))
        .stdout(predicate::str::contains("Profit Margin Analysis"));
}

#[test]
fn test_unknown_report_type() {
    let tmp = setup_test_project();
    tally()
        .current_dir(tmp.path())
        .args(["report", "quarterly-forecast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported report type"));
}

#[test]
fn test_report_csv_export() {
    let tmp = setup_test_project();
    create_id(&tmp, &["bank", "open", "--holder", "Ann", "--number", "ACC-1", "--initial", "12.5"]);

    tally()
        .current_dir(tmp.path())
        .args(["report", "account-balances", "--csv", "balances.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("balances.csv"));

    let text = fs::read_to_string(tmp.path().join("balances.csv")).unwrap();
    assert!(text.lines().next().unwrap().contains("Balance"));
    assert!(text.contains("$12.50"));
}

#[test]
fn test_report_html_export() {
    let tmp = setup_test_project();
    tally()
        .current_dir(tmp.path())
        .args(["report", "inventory-summary", "--html", "summary.html"])
        .assert()
        .success();

    let html = fs::read_to_string(tmp.path().join("summary.html")).unwrap();
    assert!(html.contains("<title>Inventory Summary</title>"));
    assert!(html.contains("No rows."));
}

#[test]
fn test_schema_shows_columns() {
    tally()
        .args(["schema", "accounts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("balance"))
        .stdout(predicate::str::contains("bank_transactions.account_id (cascade)"));
}
