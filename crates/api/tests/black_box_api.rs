use reqwest::StatusCode;
use serde_json::{Value, json};

use stockledger_infra::EngineConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let app = stockledger_api::app::build_in_memory_app(EngineConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn product(&self, sku: &str, min_stock: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({ "sku": sku, "name": format!("Product {sku}"), "minStock": min_stock }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn warehouse(&self, code: &str) -> String {
        let (status, body) = self
            .post("/warehouses", json!({ "name": code, "shortCode": code }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Draft and validate an IN of `quantity` units.
    async fn receive(&self, product: &str, warehouse: &str, quantity: i64) {
        let (status, body) = self
            .post(
                "/transactions/in",
                json!({
                    "targetWarehouseId": warehouse,
                    "items": [{ "productId": product, "quantity": quantity }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_str().unwrap();
        let (status, body) = self.post(&format!("/transactions/{id}/validate"), json!({})).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn quantity(&self, product: &str, warehouse: &str) -> i64 {
        let (status, body) = self
            .get(&format!("/stock?warehouseId={warehouse}&productId={product}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["items"]
            .as_array()
            .unwrap()
            .first()
            .map(|row| row["quantity"].as_i64().unwrap())
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_reports_store_backend() {
    let server = TestServer::spawn().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn in_transaction_lifecycle_records_stock_and_ledger() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-1", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    let user = "0190a4f6-8d6e-7c2b-9a43-3e1f0c1d2b3a";

    let res = server
        .client
        .post(server.url("/transactions"))
        .header("x-user-id", user)
        .json(&json!({
            "type": "IN",
            "targetWarehouseId": warehouse,
            "reference": "PO-1",
            "items": [{ "productId": product, "quantity": 50 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let draft: Value = res.json().await.unwrap();
    assert_eq!(draft["status"], "DRAFT");
    assert_eq!(draft["type"], "IN");
    assert_eq!(draft["createdBy"], user);
    assert_eq!(draft["items"][0]["lineNo"], 1);
    assert_eq!(server.quantity(&product, &warehouse).await, 0);

    let id = draft["id"].as_str().unwrap();
    let (status, done) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "COMPLETED");
    assert_eq!(server.quantity(&product, &warehouse).await, 50);

    let (status, history) = server.get(&format!("/transactions/history?transactionId={id}")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = history["items"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["quantityChange"], 50);
    assert_eq!(rows[0]["balanceAfter"], 50);

    // A second validation is refused.
    let (status, body) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn transfer_moves_stock_between_warehouses() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-T", 0).await;
    let source = server.warehouse("MAIN").await;
    let target = server.warehouse("STORE").await;
    server.receive(&product, &source, 50).await;

    let (status, draft) = server
        .post(
            "/transactions/transfer",
            json!({
                "sourceWarehouseId": source,
                "targetWarehouseId": target,
                "items": [{ "productId": product, "quantity": 20 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{draft}");
    let id = draft["id"].as_str().unwrap();

    let (status, _) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.quantity(&product, &source).await, 30);
    assert_eq!(server.quantity(&product, &target).await, 20);

    let (_, history) = server.get(&format!("/transactions/history?transactionId={id}")).await;
    let changes: Vec<i64> = history["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["quantityChange"].as_i64().unwrap())
        .collect();
    assert_eq!(changes, vec![-20, 20]);
}

#[tokio::test]
async fn insufficient_stock_is_a_400_and_changes_nothing() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-O", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    server.receive(&product, &warehouse, 30).await;

    let (_, draft) = server
        .post(
            "/transactions/out",
            json!({
                "sourceWarehouseId": warehouse,
                "items": [{ "productId": product, "quantity": 40 }],
            }),
        )
        .await;
    let id = draft["id"].as_str().unwrap();

    let (status, body) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["message"], format!("Insufficient stock for product {product}"));
    assert_eq!(server.quantity(&product, &warehouse).await, 30);

    let (_, txn) = server.get(&format!("/transactions/{id}")).await;
    assert_eq!(txn["status"], "DRAFT");
    let (_, history) = server.get(&format!("/transactions/history?transactionId={id}")).await;
    assert_eq!(history["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn adjust_remove_lowers_stock() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-A", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    server.receive(&product, &warehouse, 30).await;

    let (status, draft) = server
        .post(
            "/transactions/adjust",
            json!({
                "targetWarehouseId": warehouse,
                "adjustmentType": "REMOVE",
                "items": [{ "productId": product, "quantity": 5 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{draft}");
    assert_eq!(draft["adjustmentType"], "REMOVE");
    let id = draft["id"].as_str().unwrap();

    let (status, _) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.quantity(&product, &warehouse).await, 25);
}

#[tokio::test]
async fn malformed_input_is_reported_per_field() {
    let server = TestServer::spawn().await;

    let (status, body) = server
        .post(
            "/transactions",
            json!({
                "type": "OUT",
                "items": [{ "productId": "not-a-uuid", "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"items[0].productId"), "{fields:?}");

    let warehouse = server.warehouse("MAIN").await;
    let product = server.product("SKU-V", 0).await;
    let (status, body) = server
        .post(
            "/transactions",
            json!({
                "type": "IN",
                "targetWarehouseId": warehouse,
                "items": [{ "productId": product, "quantity": 0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "items[0].quantity");

    let (status, body) = server.get("/transactions/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let res = server
        .client
        .get(server.url("/health"))
        .header("x-user-id", "someone")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_references_are_404() {
    let server = TestServer::spawn().await;
    let warehouse = server.warehouse("MAIN").await;
    let missing = "0190a4f6-0000-7000-8000-000000000000";

    let (status, _) = server.post(&format!("/transactions/{missing}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .post(
            "/transactions/in",
            json!({
                "targetWarehouseId": warehouse,
                "items": [{ "productId": missing, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn status_endpoint_only_cancels() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-S", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    let (_, draft) = server
        .post(
            "/transactions/in",
            json!({
                "targetWarehouseId": warehouse,
                "items": [{ "productId": product, "quantity": 3 }],
            }),
        )
        .await;
    let id = draft["id"].as_str().unwrap();

    let (status, body) = server
        .post(&format!("/transactions/{id}/status"), json!({ "status": "COMPLETED" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["message"], "Use validate endpoint for completion");

    let (status, body) = server
        .post(&format!("/transactions/{id}/status"), json!({ "status": "CANCELLED" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, _) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(server.quantity(&product, &warehouse).await, 0);
}

#[tokio::test]
async fn draft_items_can_be_replaced() {
    let server = TestServer::spawn().await;
    let first = server.product("SKU-1", 0).await;
    let second = server.product("SKU-2", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    let (_, draft) = server
        .post(
            "/transactions/in",
            json!({
                "targetWarehouseId": warehouse,
                "items": [{ "productId": first, "quantity": 3 }],
            }),
        )
        .await;
    let id = draft["id"].as_str().unwrap();

    let res = server
        .client
        .put(server.url(&format!("/transactions/{id}")))
        .json(&json!({
            "items": [
                { "productId": first, "quantity": 1 },
                { "productId": second, "quantity": 2 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["items"].as_array().unwrap().len(), 2);
    assert_eq!(updated["items"][1]["lineNo"], 2);

    server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(server.quantity(&first, &warehouse).await, 1);
    assert_eq!(server.quantity(&second, &warehouse).await, 2);
}

#[tokio::test]
async fn concurrent_outs_never_oversell() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-C", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    server.receive(&product, &warehouse, 10).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (_, draft) = server
            .post(
                "/transactions/out",
                json!({
                    "sourceWarehouseId": warehouse,
                    "items": [{ "productId": product, "quantity": 6 }],
                }),
            )
            .await;
        ids.push(draft["id"].as_str().unwrap().to_string());
    }

    let path_a = format!("/transactions/{}/validate", ids[0]);
    let path_b = format!("/transactions/{}/validate", ids[1]);
    let (a, b) = tokio::join!(
        server.post(&path_a, json!({})),
        server.post(&path_b, json!({})),
    );
    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::BAD_REQUEST]);
    assert_eq!(server.quantity(&product, &warehouse).await, 4);
}

#[tokio::test]
async fn reorder_drafts_an_in_transaction() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-R", 10).await;
    let warehouse = server.warehouse("MAIN").await;
    server.receive(&product, &warehouse, 4).await;

    let (status, body) = server
        .post(&format!("/transactions/reorder/{product}/{warehouse}"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["currentQuantity"], 4);
    assert_eq!(body["suggestedQuantity"], 16);
    assert_eq!(body["transaction"]["type"], "IN");
    assert_eq!(body["transaction"]["status"], "DRAFT");
    assert!(
        body["transaction"]["reference"]
            .as_str()
            .unwrap()
            .starts_with("REORDER-AUTO-")
    );
}

#[tokio::test]
async fn transaction_list_filters_by_status() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-L", 0).await;
    let warehouse = server.warehouse("MAIN").await;
    server.receive(&product, &warehouse, 1).await;
    server
        .post(
            "/transactions/in",
            json!({
                "targetWarehouseId": warehouse,
                "items": [{ "productId": product, "quantity": 1 }],
            }),
        )
        .await;

    let (status, all) = server.get("/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], 2);

    let (_, drafts) = server.get("/transactions?status=DRAFT&type=IN").await;
    assert_eq!(drafts["total"], 1);
    assert_eq!(drafts["items"][0]["status"], "DRAFT");

    let (status, _) = server.get("/transactions?status=BOGUS").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_enforces_uniqueness_and_usage() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-U", 0).await;
    let warehouse = server.warehouse("MAIN").await;

    let (status, body) = server
        .post("/products", json!({ "sku": "SKU-U", "name": "Again" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    server.receive(&product, &warehouse, 5).await;
    let res = server
        .client
        .delete(server.url(&format!("/products/{product}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let spare = server.warehouse("SPARE").await;
    let res = server
        .client
        .delete(server.url(&format!("/warehouses/{spare}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let (status, _) = server.get(&format!("/warehouses/{spare}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = server.get("/products?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["items"][0]["sku"], "SKU-U");
}

#[tokio::test]
async fn adjust_add_on_empty_key_creates_stock() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-N", 0).await;
    let warehouse = server.warehouse("MAIN").await;

    let (status, draft) = server
        .post(
            "/transactions/adjust",
            json!({
                "targetWarehouseId": warehouse,
                "adjustmentType": "ADD",
                "items": [{ "productId": product, "quantity": 7 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{draft}");
    let id = draft["id"].as_str().unwrap();

    let (status, _) = server.post(&format!("/transactions/{id}/validate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.quantity(&product, &warehouse).await, 7);

    let (_, history) = server.get(&format!("/transactions/history?transactionId={id}")).await;
    assert_eq!(history["items"][0]["quantityChange"], 7);
    assert_eq!(history["items"][0]["balanceAfter"], 7);
}

#[tokio::test]
async fn oversized_quantity_is_a_validation_error() {
    let server = TestServer::spawn().await;
    let product = server.product("SKU-X", 0).await;
    let warehouse = server.warehouse("MAIN").await;

    let (status, body) = server
        .post(
            "/transactions/in",
            json!({
                "targetWarehouseId": warehouse,
                "items": [{ "productId": product, "quantity": i64::MAX }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "items[0].quantity");
}

#[tokio::test]
async fn product_list_filters_and_reports_stock() {
    let server = TestServer::spawn().await;
    let bolt = server.product("BOLT-1", 0).await;
    server.product("NUT-1", 0).await;
    let (status, _) = server
        .post(
            "/products",
            json!({ "sku": "OLD-1", "name": "Retired bolt", "category": "Legacy", "active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let main = server.warehouse("MAIN").await;
    let annex = server.warehouse("ANNEX").await;
    server.receive(&bolt, &main, 4).await;
    server.receive(&bolt, &annex, 6).await;

    let (status, page) = server.get("/products?search=bolt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"][0]["sku"], "BOLT-1");
    assert_eq!(page["items"][0]["totalStock"], 10);

    let (_, page) = server.get("/products?search=bolt&activeOnly=true").await;
    assert_eq!(page["total"], 1);

    let (_, page) = server.get("/products?category=Legacy").await;
    assert_eq!(page["items"][0]["sku"], "OLD-1");
    assert_eq!(page["items"][0]["totalStock"], 0);

    let (status, _) = server.get("/products?activeOnly=sometimes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, product) = server.get(&format!("/products/{bolt}")).await;
    assert_eq!(product["totalStock"], 10);

    let (status, stock) = server.get(&format!("/products/{bolt}/stock")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["totalStock"], 10);
    assert_eq!(stock["items"].as_array().unwrap().len(), 2);

    let missing = "0190a4f6-8d6e-7c2b-9a43-3e1f0c1d2b3a";
    let (status, _) = server.get(&format!("/products/{missing}/stock")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn locations_group_warehouses() {
    let server = TestServer::spawn().await;
    let (status, location) = server.post("/locations", json!({ "name": "Main Facility" })).await;
    assert_eq!(status, StatusCode::CREATED, "{location}");
    let location = location["id"].as_str().unwrap().to_string();

    let (status, _) = server.post("/locations", json!({ "name": "Main Facility" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = server.post("/locations", json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "name");

    let (status, warehouse) = server
        .post(
            "/warehouses",
            json!({ "name": "Main", "shortCode": "WH-1", "locationId": location }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{warehouse}");
    assert_eq!(warehouse["locationId"], location.as_str());

    let unknown = "0190a4f6-8d6e-7c2b-9a43-3e1f0c1d2b3a";
    let (status, _) = server
        .post(
            "/warehouses",
            json!({ "name": "Ghost", "shortCode": "WH-2", "locationId": unknown }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = server.get("/locations").await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["name"], "Main Facility");

    let delete = |path: String| server.client.delete(server.url(&path)).send();
    let res = delete(format!("/locations/{location}")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let warehouse = warehouse["id"].as_str().unwrap();
    let res = delete(format!("/warehouses/{warehouse}")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = delete(format!("/locations/{location}")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, _) = server.get(&format!("/locations/{location}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
