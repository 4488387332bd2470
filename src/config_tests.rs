//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_strategy_config_default() {
        let config = StrategyConfig::default();
        assert_eq!(config.min_edge, dec!(0.05));
        assert_eq!(config.kelly_fraction, dec!(0.25));
        assert_eq!(config.min_stake_usd, dec!(1));
        assert_eq!(config.min_liquidity_usd, dec!(1000));
        assert_eq!(config.max_days_to_resolution, 30);
        assert_eq!(config.market_page_limit, 500);
    }

    #[test]
    fn test_strategy_config_from_empty_toml() {
        let config: StrategyConfig = toml::from_str("").unwrap();
        assert_eq!(config.min_edge, dec!(0.05));
        assert_eq!(config.kelly_fraction, dec!(0.25));
    }

    #[test]
    fn test_strategy_config_deserialize() {
        let toml_str = r#"
min_edge = 0.08
kelly_fraction = 0.35
min_stake_usd = 5
max_days_to_resolution = 14
"#;
        let config: StrategyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.min_edge, dec!(0.08));
        assert_eq!(config.kelly_fraction, dec!(0.35));
        assert_eq!(config.min_stake_usd, dec!(5));
        assert_eq!(config.max_days_to_resolution, 14);
        // Unset fields keep their defaults
        assert_eq!(config.market_page_limit, 500);
    }

    #[test]
    fn test_risk_config_default() {
        let config = RiskConfig::default();
        assert_eq!(config.max_open_positions, 10);
        assert_eq!(config.min_balance_reserve, dec!(100));
    }

    #[test]
    fn test_polymarket_config_minimal() {
        let toml_str = r#"
private_key = "abc123"
"#;
        let config: PolymarketConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.private_key, "abc123");
        assert_eq!(config.clob_url, "https://clob.polymarket.com");
        assert_eq!(config.gamma_url, "https://gamma-api.polymarket.com");
        assert_eq!(config.data_url, "https://data-api.polymarket.com");
        assert_eq!(config.chain_id, 137);
        assert_eq!(config.signature_type, 0);
        assert!(config.funder_address.is_none());
        assert!(config.preconfigured_credentials().is_none());
    }

    #[test]
    fn test_polymarket_config_with_credentials() {
        let toml_str = r#"
private_key = "abc123"
funder_address = "0x123456"
signature_type = 1
api_key = "key"
api_secret = "secret"
api_passphrase = "phrase"
"#;
        let config: PolymarketConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.funder_address, Some("0x123456".to_string()));
        assert_eq!(config.signature_type, 1);
        let (k, s, p) = config.preconfigured_credentials().unwrap();
        assert_eq!((k.as_str(), s.as_str(), p.as_str()), ("key", "secret", "phrase"));
    }

    #[test]
    fn test_partial_credentials_are_ignored() {
        // A credential triple missing any member is unusable
        let toml_str = r#"
private_key = "abc123"
api_key = "key"
api_secret = "secret"
"#;
        let config: PolymarketConfig = toml::from_str(toml_str).unwrap();
        assert!(config.preconfigured_credentials().is_none());
    }

    #[test]
    fn test_full_config_deserialize() {
        let toml_str = r#"
[polymarket]
private_key = "abc123"

[strategy]
min_edge = 0.10

[risk]
max_open_positions = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.strategy.min_edge, dec!(0.10));
        assert_eq!(config.risk.max_open_positions, 5);
        assert_eq!(config.polymarket.chain_id, 137);
    }
}
