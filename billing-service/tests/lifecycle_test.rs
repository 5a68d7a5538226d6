//! Invoice lifecycle integration tests: issue, patch, item replacement,
//! deletion, and the transitions each one refuses.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn issuing_a_draft_is_one_way() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    let draft = app.seed_draft_invoice(client_id, None).await;
    let invoice_id = draft["invoice"]["id"].as_str().unwrap().to_string();

    let response = app
        .post(&format!("/invoices/{}/issue", invoice_id), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["invoice"]["status"], "issued");

    // A second issue hits the conflict path
    let response = app
        .post(&format!("/invoices/{}/issue", invoice_id), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvoiceNotDraft");

    // Issuing an unknown invoice is a 404, not a conflict
    let response = app
        .post(&format!("/invoices/{}/issue", uuid::Uuid::new_v4()), &json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvoiceNotFound");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn patching_tax_rate_recomputes_totals() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    let draft = app.seed_draft_invoice(client_id, None).await;
    let invoice_id = draft["invoice"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .patch(format!("{}/invoices/{}", app.address, invoice_id))
        .json(&json!({ "tax_rate": "10", "notes": "Net 30" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let invoice = &body["invoice"];

    assert_eq!(invoice["subtotal"], "200.00");
    assert_eq!(invoice["tax_rate"], "10.00");
    assert_eq!(invoice["tax_total"], "20.00");
    assert_eq!(invoice["total"], "220.00");
    assert_eq!(invoice["notes"], "Net 30");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn patching_a_non_draft_is_rejected() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    let issued = app.seed_issued_invoice(client_id).await;
    let invoice_id = issued["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .patch(format!("{}/invoices/{}", app.address, invoice_id))
        .json(&json!({ "notes": "too late" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvoiceNotDraft");

    // The rejected patch left the invoice unmodified
    let response = app.get(&format!("/invoices/{}", invoice_id)).await;
    let fetched: Value = response.json().await.unwrap();
    assert!(fetched["invoice"]["notes"].is_null());
    assert_eq!(fetched["invoice"]["status"], "issued");
    assert_eq!(fetched["invoice"]["total"], "226.00");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn replacing_items_recomputes_totals() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    let draft = app.seed_draft_invoice(client_id, None).await;
    let invoice_id = draft["invoice"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .put(format!("{}/invoices/{}/items", app.address, invoice_id))
        .json(&json!({
            "items": [
                { "description": "Service fee", "qty": "1", "unit_price": "500.00" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["invoice"]["subtotal"], "500.00");
    assert_eq!(body["invoice"]["tax_total"], "65.00");
    assert_eq!(body["invoice"]["total"], "565.00");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["description"], "Service fee");

    // The old item set is gone
    let response = app.get(&format!("/invoices/{}", invoice_id)).await;
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["items"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn replacing_items_on_issued_invoice_is_rejected() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;
    let issued = app.seed_issued_invoice(client_id).await;
    let invoice_id = issued["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .put(format!("{}/invoices/{}/items", app.address, invoice_id))
        .json(&json!({
            "items": [{ "description": "X", "unit_price": "1.00" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvoiceNotDraft");

    // Totals are untouched
    let response = app.get(&format!("/invoices/{}", invoice_id)).await;
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["invoice"]["total"], "226.00");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn only_drafts_can_be_deleted() {
    let app = TestApp::spawn().await;
    let client_id = app.seed_client("Acme Traders").await;

    let draft = app.seed_draft_invoice(client_id, None).await;
    let draft_id = draft["invoice"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .delete(format!("{}/invoices/{}", app.address, draft_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = app.get(&format!("/invoices/{}", draft_id)).await;
    assert_eq!(response.status().as_u16(), 404);

    let issued = app.seed_issued_invoice(client_id).await;
    let issued_id = issued["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .delete(format!("{}/invoices/{}", app.address, issued_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "InvoiceNotDraft");

    app.cleanup().await;
}
