/// Stripe checkout endpoints
///
/// # Endpoints
///
/// - `POST /api/checkout/create-session` - Subscription checkout for `pro_monthly` or `team_monthly`
/// - `POST /api/checkout/create-portal-session?customer_email=` - Billing portal
/// - `GET /api/checkout/prices` - Price catalogue (public)
///
/// The tier is granted later by the `checkout.session.completed` webhook,
/// which finds the user through the Clerk id stored in the session metadata.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::{Json, Query},
};
use axum::{extract::State, Extension};
use infraiq_shared::{
    auth::context::AuthContext,
    integrations::stripe::{CheckoutRequest, StripeConfig},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Checkout session request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckoutRequest {
    /// `pro_monthly` or `team_monthly`
    pub price_key: String,

    #[validate(email(message = "Invalid email address"))]
    pub customer_email: String,

    #[validate(length(min = 1, message = "clerk_id is required"))]
    pub clerk_id: String,

    #[validate(url(message = "success_url must be a URL"))]
    pub success_url: Option<String>,

    #[validate(url(message = "cancel_url must be a URL"))]
    pub cancel_url: Option<String>,
}

/// Created checkout session
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Query of the portal endpoint
#[derive(Debug, Deserialize)]
pub struct PortalQuery {
    pub customer_email: String,
}

/// Created portal session
#[derive(Debug, Serialize, Deserialize)]
pub struct PortalResponse {
    pub portal_url: String,
}

/// One plan of the catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub key: String,
    pub name: String,

    /// Monthly price in dollars, `None` for contact-us plans
    pub price: Option<u32>,

    pub currency: String,
    pub interval: Option<String>,
    pub features: Vec<String>,
}

/// Price catalogue
#[derive(Debug, Serialize, Deserialize)]
pub struct PricesResponse {
    pub prices: Vec<Price>,
}

fn plan(key: &str, name: &str, price: Option<u32>, features: &[&str]) -> Price {
    Price {
        key: key.to_string(),
        name: name.to_string(),
        price,
        currency: "usd".to_string(),
        interval: price.map(|_| "month".to_string()),
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

/// Plans shown on the pricing page
pub fn price_catalogue() -> Vec<Price> {
    vec![
        plan(
            "pro_monthly",
            "Pro",
            Some(499),
            &[
                "All 7 InfraIQ tools",
                "Unlimited scans",
                "Dashboard access",
                "Email support",
                "2 seat license",
            ],
        ),
        plan(
            "team_monthly",
            "Team",
            Some(2499),
            &[
                "Everything in Pro",
                "10 seat license",
                "Priority support",
                "Team management",
                "Audit logs",
                "SSO integration",
            ],
        ),
        plan(
            "enterprise",
            "Enterprise",
            None,
            &[
                "Everything in Team",
                "Unlimited seats",
                "Dedicated support",
                "Custom integrations",
                "SLA guarantee",
                "On-premise option",
            ],
        ),
    ]
}

/// Creates a Stripe subscription checkout session
///
/// # Errors
///
/// - `400 Bad Request`: Unknown price key, invalid fields, or Stripe rejected the request
/// - `403 Forbidden`: Checkout for another user
/// - `502 Bad Gateway`: Stripe unreachable
/// - `503 Service Unavailable`: Stripe not configured
pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    req.validate()?;
    auth.ensure_acting_for(&req.clerk_id)?;

    let price_id = state.stripe.config().price_id(&req.price_key).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Invalid price_key. Must be one of: {}",
            StripeConfig::PRICE_KEYS.join(", ")
        ))
    })?;

    let dashboard = &state.config.api.dashboard_url;
    let success_url = req
        .success_url
        .clone()
        .unwrap_or_else(|| format!("{}/dashboard?checkout=success", dashboard));
    let cancel_url = req
        .cancel_url
        .clone()
        .unwrap_or_else(|| format!("{}/dashboard/pricing?checkout=cancelled", dashboard));

    let session = state
        .stripe
        .create_checkout_session(&CheckoutRequest {
            price_id,
            price_key: &req.price_key,
            customer_email: &req.customer_email,
            clerk_id: &req.clerk_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    tracing::info!(
        session_id = %session.id,
        clerk_id = %req.clerk_id,
        price_key = %req.price_key,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        checkout_url: session.url,
        session_id: session.id,
    }))
}

/// Creates a billing portal session for the customer with the given email
///
/// # Errors
///
/// - `404 Not Found`: No Stripe customer has the email
pub async fn create_portal_session(
    State(state): State<AppState>,
    Query(query): Query<PortalQuery>,
) -> ApiResult<Json<PortalResponse>> {
    let customer = state
        .stripe
        .find_customer_by_email(&query.customer_email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No Stripe customer found with this email".to_string()))?;

    let return_url = format!("{}/dashboard/settings", state.config.api.dashboard_url);
    let session = state
        .stripe
        .create_portal_session(&customer.id, &return_url)
        .await?;

    Ok(Json(PortalResponse {
        portal_url: session.url,
    }))
}

/// Static price catalogue
pub async fn get_prices() -> Json<PricesResponse> {
    Json(PricesResponse {
        prices: price_catalogue(),
    })
}
