/// Stripe client and webhook payloads
///
/// Talks to the Stripe REST API with form-encoded requests authenticated by
/// the secret key (HTTP basic auth, empty password). Only the three calls the
/// billing flow needs are implemented: subscription checkout sessions,
/// customer lookup by email and billing portal sessions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{endpoint, IntegrationError};

const SERVICE: &str = "Stripe";

/// Stripe settings
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`); empty disables the client
    pub secret_key: String,

    /// Webhook endpoint secret (`whsec_...`)
    pub webhook_secret: String,

    /// API base URL
    pub api_url: String,

    /// Price id behind `pro_monthly`
    pub price_pro_monthly: String,

    /// Price id behind `team_monthly`
    pub price_team_monthly: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            api_url: "https://api.stripe.com".to_string(),
            price_pro_monthly: "price_1SmLfAQlSOp89SMnO8UavVuJ".to_string(),
            price_team_monthly: "price_1SmLfAQlSOp89SMnWUUAqmrA".to_string(),
        }
    }
}

impl StripeConfig {
    /// Price keys accepted by checkout
    pub const PRICE_KEYS: [&'static str; 2] = ["pro_monthly", "team_monthly"];

    /// Resolves a price key to its Stripe price id
    pub fn price_id(&self, price_key: &str) -> Option<&str> {
        match price_key {
            "pro_monthly" => Some(self.price_pro_monthly.as_str()),
            "team_monthly" => Some(self.price_team_monthly.as_str()),
            _ => None,
        }
    }
}

/// Parameters of a subscription checkout session
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub price_id: &'a str,
    pub price_key: &'a str,
    pub customer_email: &'a str,
    pub clerk_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// Created checkout session
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Stripe customer
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<Customer>,
}

/// Created billing portal session
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Minimal Stripe API client
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, config: StripeConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn secret_key(&self) -> Result<&str, IntegrationError> {
        if self.config.secret_key.is_empty() {
            return Err(IntegrationError::NotConfigured(SERVICE));
        }
        Ok(&self.config.secret_key)
    }

    /// Sends a prepared request and decodes the JSON answer
    ///
    /// Stripe errors carry `{"error": {"message": ...}}`; that message is
    /// surfaced as the upstream error message.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, IntegrationError> {
        let response = request
            .basic_auth(self.secret_key()?, None::<&str>)
            .send()
            .await
            .map_err(|e| IntegrationError::unreachable(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);

            tracing::warn!(status = status.as_u16(), %message, "Stripe API error");
            return Err(IntegrationError::Upstream {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| IntegrationError::invalid_response(SERVICE, e))
    }

    /// Creates a subscription checkout session
    ///
    /// The Clerk id and price key travel as session metadata so the
    /// `checkout.session.completed` webhook can find the user and tier; the
    /// Clerk id is also copied onto the subscription.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, IntegrationError> {
        let url = endpoint(&self.config.api_url, "/v1/checkout/sessions");

        let form = [
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1"),
            ("customer_email", request.customer_email),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("metadata[clerk_id]", request.clerk_id),
            ("metadata[price_key]", request.price_key),
            ("subscription_data[metadata][clerk_id]", request.clerk_id),
            ("allow_promotion_codes", "true"),
        ];

        self.send(self.http.post(url).form(&form)).await
    }

    /// Finds the first customer with the given email
    pub async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, IntegrationError> {
        let url = endpoint(&self.config.api_url, "/v1/customers");

        let list: CustomerList = self
            .send(self.http.get(url).query(&[("email", email), ("limit", "1")]))
            .await?;

        Ok(list.data.into_iter().next())
    }

    /// Creates a billing portal session for a customer
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, IntegrationError> {
        let url = endpoint(&self.config.api_url, "/v1/billing_portal/sessions");

        self.send(
            self.http
                .post(url)
                .form(&[("customer", customer_id), ("return_url", return_url)]),
        )
        .await
    }
}

/// Stripe webhook envelope; `data.object` is decoded per event type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// `checkout.session.completed` object
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckout {
    pub id: String,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    pub subscription: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

impl CompletedCheckout {
    /// Email of the paying customer
    pub fn email(&self) -> Option<&str> {
        self.customer_email.as_deref().or_else(|| {
            self.customer_details
                .as_ref()
                .and_then(|details| details.email.as_deref())
        })
    }

    /// Clerk id stored in the session metadata at checkout creation
    pub fn clerk_id(&self) -> Option<&str> {
        self.metadata.get("clerk_id").map(String::as_str)
    }

    /// Tier purchased: `metadata.tier`, else derived from `metadata.price_key`
    ///
    /// Returns the raw name; unknown names are rejected by the caller.
    pub fn tier_name(&self) -> &str {
        if let Some(tier) = self.metadata.get("tier") {
            return tier.as_str();
        }

        match self.metadata.get("price_key").map(String::as_str) {
            Some(key) if key.starts_with("team") => "team",
            _ => "pro",
        }
    }
}

/// `customer.subscription.*` object
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: Option<String>,
    pub customer: Option<String>,
}

impl Subscription {
    /// Statuses after which the subscription grants nothing
    pub const TERMINAL_STATUSES: [&'static str; 3] = ["canceled", "unpaid", "incomplete_expired"];

    pub fn is_terminal(&self) -> bool {
        self.status
            .as_deref()
            .map_or(false, |status| Self::TERMINAL_STATUSES.contains(&status))
    }
}

/// `invoice.*` object
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub subscription: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkout(metadata: serde_json::Value) -> CompletedCheckout {
        serde_json::from_value(json!({
            "id": "cs_test_1",
            "customer": "cus_1",
            "customer_email": null,
            "customer_details": {"email": "buyer@example.com"},
            "subscription": "sub_1",
            "metadata": metadata,
        }))
        .unwrap()
    }

    #[test]
    fn test_price_id_lookup() {
        let config = StripeConfig::default();
        assert_eq!(config.price_id("pro_monthly"), Some("price_1SmLfAQlSOp89SMnO8UavVuJ"));
        assert_eq!(config.price_id("team_monthly"), Some("price_1SmLfAQlSOp89SMnWUUAqmrA"));
        assert_eq!(config.price_id("enterprise"), None);
    }

    #[test]
    fn test_checkout_tier_resolution() {
        assert_eq!(checkout(json!({"tier": "enterprise"})).tier_name(), "enterprise");
        assert_eq!(checkout(json!({"price_key": "team_monthly"})).tier_name(), "team");
        assert_eq!(checkout(json!({"price_key": "pro_monthly"})).tier_name(), "pro");
        assert_eq!(checkout(json!({})).tier_name(), "pro");
    }

    #[test]
    fn test_checkout_email_falls_back_to_details() {
        let session = checkout(json!({"clerk_id": "user_1"}));
        assert_eq!(session.email(), Some("buyer@example.com"));
        assert_eq!(session.clerk_id(), Some("user_1"));
    }

    #[test]
    fn test_subscription_terminal_status() {
        for (status, terminal) in [
            ("active", false),
            ("past_due", false),
            ("canceled", true),
            ("unpaid", true),
            ("incomplete_expired", true),
        ] {
            let sub = Subscription {
                id: "sub_1".to_string(),
                status: Some(status.to_string()),
                customer: None,
            };
            assert_eq!(sub.is_terminal(), terminal, "{status}");
        }
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = StripeClient::new(reqwest::Client::new(), StripeConfig::default());
        let result = client.find_customer_by_email("a@example.com").await;
        assert!(matches!(result, Err(IntegrationError::NotConfigured("Stripe"))));
    }
}
