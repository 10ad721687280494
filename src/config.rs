use anyhow::{Context, Result, anyhow};

pub struct ServerConfig {
    pub port: u16,
}

pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
    /// ISO currency code all orders are placed in.
    pub currency: String,
    pub timeout_secs: u64,
}

pub struct CartConfig {
    /// Seconds a session may stay idle before its cart is dropped.
    pub idle_ttl_secs: u64,
}

pub struct Config {
    pub server: ServerConfig,
    pub cart: CartConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

/// Loads configuration from the process environment.
///
/// Call `bootstrap::init_env` first so values from `.env` are visible.
pub fn load() -> Result<Config> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the configuration from any key lookup.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let required = |key: &str| {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("{key} must be set"))
    };

    let port = match lookup("PORT") {
        Some(port) => port.parse().context("PORT must be a valid port number")?,
        None => 3000,
    };

    let timeout_secs = match lookup("GATEWAY_TIMEOUT_SECS") {
        Some(secs) => secs
            .parse()
            .context("GATEWAY_TIMEOUT_SECS must be a whole number of seconds")?,
        None => 10,
    };

    let idle_ttl_secs = match lookup("CART_IDLE_TTL_SECS") {
        Some(secs) => secs
            .parse()
            .context("CART_IDLE_TTL_SECS must be a whole number of seconds")?,
        None => 2 * 60 * 60,
    };

    Ok(Config {
        server: ServerConfig { port },
        cart: CartConfig { idle_ttl_secs },
        database: DatabaseConfig {
            url: required("DATABASE_URL")?,
        },
        gateway: GatewayConfig {
            key_id: required("RAZORPAY_KEY_ID")?,
            key_secret: required("RAZORPAY_KEY_SECRET")?,
            base_url: lookup("RAZORPAY_BASE_URL")
                .unwrap_or_else(|| "https://api.razorpay.com".to_string()),
            currency: lookup("PAYMENT_CURRENCY")
                .map(|currency| currency.to_uppercase())
                .unwrap_or_else(|| "INR".to_string()),
            timeout_secs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_apply() {
        let vars = env(&[
            ("DATABASE_URL", "postgres://localhost/bookbazaar"),
            ("RAZORPAY_KEY_ID", "rzp_test_key"),
            ("RAZORPAY_KEY_SECRET", "secret"),
        ]);
        let config = from_lookup(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.gateway.base_url, "https://api.razorpay.com");
        assert_eq!(config.gateway.currency, "INR");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.cart.idle_ttl_secs, 7200);
    }

    #[test]
    fn test_cart_ttl_is_read() {
        let vars = env(&[
            ("DATABASE_URL", "postgres://localhost/bookbazaar"),
            ("RAZORPAY_KEY_ID", "rzp_test_key"),
            ("RAZORPAY_KEY_SECRET", "secret"),
            ("CART_IDLE_TTL_SECS", "900"),
        ]);
        let config = from_lookup(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.cart.idle_ttl_secs, 900);
    }

    #[test]
    fn test_missing_secret_fails() {
        let vars = env(&[
            ("DATABASE_URL", "postgres://localhost/bookbazaar"),
            ("RAZORPAY_KEY_ID", "rzp_test_key"),
            ("RAZORPAY_KEY_SECRET", "  "),
        ]);
        let err = from_lookup(|key| vars.get(key).cloned()).err().unwrap();
        assert!(err.to_string().contains("RAZORPAY_KEY_SECRET"));
    }

    #[test]
    fn test_invalid_port_fails() {
        let vars = env(&[
            ("PORT", "eighty"),
            ("DATABASE_URL", "postgres://localhost/bookbazaar"),
            ("RAZORPAY_KEY_ID", "rzp_test_key"),
            ("RAZORPAY_KEY_SECRET", "secret"),
        ]);
        assert!(from_lookup(|key| vars.get(key).cloned()).is_err());
    }
}
