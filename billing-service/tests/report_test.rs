//! Reporting integration tests: sales, VAT and outstanding aggregations.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn sales_report_counts_issued_and_paid_only() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;

    // One issued invoice (226.00), one draft that must not count
    let issued = app.seed_issued_invoice(client_id).await;
    app.seed_draft_invoice(client_id, None).await;

    let invoice_id = issued["id"].as_str().unwrap().to_string();
    app.post(
        &format!("/invoices/{}/payments", invoice_id),
        &json!({ "amount": "100.00" }),
    )
    .await;

    let response = app.get("/reports/sales").await;
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();

    assert_eq!(report["invoices"]["subtotal"], "200.00");
    assert_eq!(report["invoices"]["vat"], "26.00");
    assert_eq!(report["invoices"]["total"], "226.00");
    assert_eq!(report["cash"]["received"], "100.00");
    assert!(report["from"].is_string());
    assert!(report["to"].is_string());

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn sales_report_respects_the_date_range() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    app.seed_issued_invoice(client_id).await;

    // A range entirely in the past sees nothing
    let response = app
        .get("/reports/sales?from=2000-01-01&to=2000-12-31")
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["from"], "2000-01-01");
    assert_eq!(report["to"], "2000-12-31");
    assert_eq!(report["invoices"]["total"], "0");
    assert_eq!(report["cash"]["received"], "0");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn vat_report_sums_vatable_sales() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    app.seed_issued_invoice(client_id).await;
    app.seed_issued_invoice(client_id).await;

    let response = app.get("/reports/vat").await;
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();

    assert_eq!(report["vatable_sales"], "400.00");
    assert_eq!(report["vat_invoiced"], "52.00");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn outstanding_report_tracks_unpaid_balances() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;

    let issued = app.seed_issued_invoice(client_id).await;
    let invoice_id = issued["id"].as_str().unwrap().to_string();
    let path = format!("/invoices/{}/payments", invoice_id);

    app.post(&path, &json!({ "amount": "100.00" })).await;

    let response = app.get("/reports/outstanding").await;
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();

    assert_eq!(report["count"], 1);
    assert_eq!(report["total_due"], "126.00");
    let entry = &report["invoices"][0];
    assert_eq!(entry["client_name"], "Acme Traders");
    assert_eq!(entry["total"], "226.00");
    assert_eq!(entry["amount_paid"], "100.00");
    assert_eq!(entry["amount_due"], "126.00");

    // Settling the balance clears the report
    app.post(&path, &json!({ "amount": "126.00" })).await;

    let response = app.get("/reports/outstanding").await;
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["count"], 0);
    assert_eq!(report["invoices"].as_array().unwrap().len(), 0);

    app.cleanup().await;
}
