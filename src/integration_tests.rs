//! HTTP-level tests against a mock venue

#[cfg(test)]
mod tests {
    use crate::client::{
        ApiCredentials, CredentialManager, DiscoveryClient, ExecutionClient, MarketFilters,
        PositionsClient, WalletSigner,
    };
    use crate::order::{AllowanceManager, OrderEngine, OrderRequest};
    use crate::types::{OrderType, PlacedOrderStatus, Side};
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::{Duration, Utc};
    use reqwest::Method;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn signer() -> WalletSigner {
        WalletSigner::from_private_key(TEST_KEY, 137).unwrap()
    }

    fn preconfigured() -> ApiCredentials {
        ApiCredentials {
            api_key: "stale-key".into(),
            secret: STANDARD.encode(b"stale-secret"),
            passphrase: "stale-pass".into(),
        }
    }

    fn fresh_credentials_json() -> serde_json::Value {
        json!({
            "apiKey": "fresh-key",
            "secret": STANDARD.encode(b"fresh-secret"),
            "passphrase": "fresh-pass"
        })
    }

    struct NoopAllowances;

    #[async_trait]
    impl AllowanceManager for NoopAllowances {
        async fn ensure_allowances(&self, _venue: crate::client::Venue) -> crate::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_auth_failure_derives_once_and_retries() {
        let server = MockServer::start().await;

        // First submission with the stale preconfigured key fails auth
        Mock::given(method("POST"))
            .and(path("/order"))
            .and(body_string_contains("stale-key"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        // Exactly one derivation must happen
        Mock::given(method("POST"))
            .and(path("/auth/api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fresh_credentials_json()))
            .expect(1)
            .mount(&server)
            .await;

        // The retry must carry a body re-serialized with the fresh key
        Mock::given(method("POST"))
            .and(path("/order"))
            .and(body_string_contains("fresh-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"orderID": "o-1", "status": "live"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let manager = CredentialManager::new(
            reqwest::Client::new(),
            &server.uri(),
            signer(),
            Some(preconfigured()),
        );

        let build = |creds: &ApiCredentials| Some(json!({"owner": creds.api_key}));
        let resp = manager
            .request_authed(Method::POST, "/order", build)
            .await
            .unwrap();
        assert_eq!(resp["orderID"], "o-1");

        // A second call reuses the derived credentials without another
        // handshake (the derive mock's expect(1) verifies on drop)
        let resp = manager
            .request_authed(Method::POST, "/order", build)
            .await
            .unwrap();
        assert_eq!(resp["orderID"], "o-1");
    }

    #[tokio::test]
    async fn test_second_auth_failure_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/order"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fresh_credentials_json()))
            .mount(&server)
            .await;

        let manager = CredentialManager::new(
            reqwest::Client::new(),
            &server.uri(),
            signer(),
            Some(preconfigured()),
        );

        let err = manager
            .request_authed(Method::POST, "/order", |c| Some(json!({"owner": c.api_key})))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::AgentError::Auth(_)));
    }

    #[tokio::test]
    async fn test_derivation_falls_back_to_derive_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/api-key"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/derive-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fresh_credentials_json()))
            .expect(1)
            .mount(&server)
            .await;

        // No preconfigured credentials: first fetch goes straight to
        // derivation
        let manager =
            CredentialManager::new(reqwest::Client::new(), &server.uri(), signer(), None);
        let creds = manager.get_credentials().await.unwrap();
        assert_eq!(creds.api_key, "fresh-key");
    }

    #[tokio::test]
    async fn test_list_markets_degrades_to_empty_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = DiscoveryClient::new(&server.uri()).unwrap();
        let markets = client.list_markets(&MarketFilters::default()).await;
        assert!(markets.is_empty());
    }

    fn listing_entry(condition_id: &str, question: &str, liquidity: &str) -> serde_json::Value {
        let end = (Utc::now() + Duration::days(7)).to_rfc3339();
        json!({
            "conditionId": condition_id,
            "question": question,
            "endDate": end,
            "active": true,
            "closed": false,
            "liquidity": liquidity,
            "volume": "90000",
            "orderPriceMinTickSize": 0.01,
            "clobTokenIds": "[\"111\",\"222\"]",
            "outcomes": "[\"Yes\",\"No\"]",
            "outcomePrices": "[\"0.62\",\"0.38\"]"
        })
    }

    #[tokio::test]
    async fn test_list_markets_applies_filters() {
        let server = MockServer::start().await;
        let listing = json!([
            listing_entry("0x1", "Will Bitcoin reach $150k?", "25000"),
            listing_entry("0x2", "Will it rain in Paris?", "25000"),
            listing_entry("0x3", "Will Ethereum flip Bitcoin?", "10"),
        ]);
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing))
            .mount(&server)
            .await;

        let client = DiscoveryClient::new(&server.uri()).unwrap();
        let markets = client.list_markets(&MarketFilters::default()).await;

        // Irrelevant question and illiquid market are filtered out
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].condition_id, "0x1");
        assert_eq!(markets[0].tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_market_falls_back_to_listing_scan() {
        let server = MockServer::start().await;

        // Direct lookup answers with a different market (documented
        // upstream inconsistency)
        Mock::given(method("GET"))
            .and(path("/markets/0xwanted"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(listing_entry("0xother", "Will Bitcoin reach $150k?", "25000")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                listing_entry("0xother", "Will Bitcoin reach $150k?", "25000"),
                listing_entry("0xwanted", "Will Solana reach $500?", "25000"),
            ])))
            .mount(&server)
            .await;

        let client = DiscoveryClient::new(&server.uri()).unwrap();
        let market = client.fetch_market("0xwanted", 500).await.unwrap();
        assert_eq!(market.condition_id, "0xwanted");
    }

    #[tokio::test]
    async fn test_fetch_market_missing_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = DiscoveryClient::new(&server.uri()).unwrap();
        assert!(client.fetch_market("0xmissing", 500).await.is_none());
    }

    #[tokio::test]
    async fn test_positions_client_filters_dust() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/positions"))
            .and(query_param("user", "0xwallet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"asset": "111", "conditionId": "0x1", "size": 50, "avgPrice": 0.4,
                 "curPrice": 0.5, "currentValue": 25, "cashPnl": 5, "redeemable": false,
                 "outcome": "Yes"},
                {"asset": "222", "conditionId": "0x2", "size": 0}
            ])))
            .mount(&server)
            .await;

        let client = PositionsClient::new(&server.uri()).unwrap();
        let live = client.live_positions("0xwallet").await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].asset, "111");
    }

    #[tokio::test]
    async fn test_order_management_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/order/o-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"orderID": "o-1", "status": "live"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/order/o-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"canceled": "o-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"orderID": "o-1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Arc::new(CredentialManager::new(
            reqwest::Client::new(),
            &server.uri(),
            signer(),
            Some(preconfigured()),
        ));
        let execution = ExecutionClient::new(&server.uri(), credentials).unwrap();

        let status = execution.order_status("o-1").await.unwrap();
        assert_eq!(status["status"], "live");

        execution.cancel_order("o-1").await.unwrap();

        let open = execution.open_orders().await.unwrap();
        assert_eq!(open.as_array().unwrap().len(), 1);
    }

    async fn order_engine(server: &MockServer) -> OrderEngine {
        let credentials = Arc::new(CredentialManager::new(
            reqwest::Client::new(),
            &server.uri(),
            signer(),
            Some(preconfigured()),
        ));
        let execution = ExecutionClient::new(&server.uri(), credentials).unwrap();
        OrderEngine::new(signer(), execution, Box::new(NoopAllowances), None, 0)
    }

    fn order_request() -> OrderRequest {
        OrderRequest {
            condition_id: "0xmarket".into(),
            token_id: "123456".into(),
            side: Side::Buy,
            price: dec!(0.57),
            size_usd: dec!(100),
            order_type: OrderType::GTC,
        }
    }

    async fn mount_market_params(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/markets/0xmarket"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"minimum_tick_size": "0.01"})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/neg-risk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"neg_risk": false})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fee-rate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fee_rate_bps": 0})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_place_order_success() {
        crate::utils::init_tracing();
        let server = MockServer::start().await;
        mount_market_params(&server).await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"orderID": "o-9", "status": "matched"})),
            )
            .mount(&server)
            .await;

        let engine = order_engine(&server).await;
        let placed = engine.place_order(&order_request()).await;

        assert_eq!(placed.status, PlacedOrderStatus::Matched);
        assert_eq!(placed.order_id.as_deref(), Some("o-9"));
        assert!(placed.error.is_none());
    }

    #[tokio::test]
    async fn test_place_order_failure_returns_audit_record() {
        let server = MockServer::start().await;
        mount_market_params(&server).await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "not enough balance"})),
            )
            .mount(&server)
            .await;

        let engine = order_engine(&server).await;
        let request = order_request();
        let placed = engine.place_order(&request).await;

        // Rejection is carried in the record, never raised; the full
        // request context survives for audit
        assert_eq!(placed.status, PlacedOrderStatus::Error);
        assert!(placed.error.as_deref().unwrap().contains("not enough balance"));
        assert_eq!(placed.condition_id, request.condition_id);
        assert_eq!(placed.token_id, request.token_id);
        assert_eq!(placed.side, Side::Buy);
        assert_eq!(placed.size_usd, dec!(100));
    }
}
