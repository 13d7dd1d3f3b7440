/// Clerk and Stripe webhooks
///
/// Both endpoints verify the signature over the raw body before parsing it,
/// then acknowledge with `{"received": true}`, including for event types
/// that are not handled and for users that do not exist here. Database
/// failures are returned as errors so the sender retries.
///
/// Verification is only skipped in development when the endpoint secret is
/// not configured. Outside development a missing secret rejects every
/// delivery.
///
/// # Endpoints
///
/// - `POST /webhooks/clerk` - Svix-signed Clerk user events
/// - `POST /webhooks/stripe` - Stripe billing events

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extractors::Json,
    middleware::auth::header_str,
};
use axum::{body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use infraiq_shared::{
    auth::api_key::generate_api_key,
    integrations::{
        clerk::{ClerkEvent, ClerkUser, DeletedClerkUser},
        stripe::{CompletedCheckout, Invoice, StripeEvent, Subscription},
    },
    models::user::{CreateUser, Tier, User},
    webhooks::{stripe as stripe_signature, svix, SignatureError},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn ack() -> Json<WebhookAck> {
    Json(WebhookAck { received: true })
}

/// Decodes a JSON value, reporting failures as bad requests
fn decode<T: DeserializeOwned>(value: serde_json::Value, what: &str) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {} payload: {}", what, e)))
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Decides whether a delivery must be verified
///
/// Returns `Ok(None)` when verification is skipped, the secret otherwise.
fn signing_secret<'a>(state: &AppState, secret: &'a str, service: &str) -> ApiResult<Option<&'a str>> {
    if !secret.is_empty() {
        return Ok(Some(secret));
    }

    if state.config.api.is_development() {
        tracing::warn!(service, "Webhook secret not configured, skipping signature verification");
        return Ok(None);
    }

    Err(ApiError::ServiceUnavailable(format!(
        "{} webhook secret is not configured",
        service
    )))
}

fn verify_clerk(state: &AppState, headers: &HeaderMap, body: &[u8]) -> ApiResult<()> {
    let Some(secret) = signing_secret(state, &state.config.clerk.webhook_secret, "Clerk")? else {
        return Ok(());
    };

    let svix_headers = svix::SvixHeaders::from_parts(
        header_str(headers, svix::ID_HEADER),
        header_str(headers, svix::TIMESTAMP_HEADER),
        header_str(headers, svix::SIGNATURE_HEADER),
    )?;

    svix::verify(body, &svix_headers, secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Clerk webhook");
        ApiError::from(e)
    })
}

fn verify_stripe(state: &AppState, headers: &HeaderMap, body: &[u8]) -> ApiResult<()> {
    let Some(secret) = signing_secret(state, &state.config.stripe.webhook_secret, "Stripe")? else {
        return Ok(());
    };

    let signature = header_str(headers, stripe_signature::SIGNATURE_HEADER)
        .ok_or(SignatureError::MissingHeader(stripe_signature::SIGNATURE_HEADER))?;

    stripe_signature::verify(body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        ApiError::from(e)
    })
}

/// Handles Clerk user lifecycle events
///
/// - `user.created`: creates the user with a trial, or refreshes it
/// - `user.updated`: updates email and name
/// - `user.deleted`: deletes the user row (scans and projects are kept)
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    verify_clerk(&state, &headers, &body)?;

    let event: ClerkEvent = decode_body(&body)?;
    tracing::info!(event_type = %event.event_type, "Received Clerk webhook");

    match event.event_type.as_str() {
        "user.created" => {
            let clerk_user: ClerkUser = decode(event.data, "user")?;
            let Some(email) = clerk_user.primary_email() else {
                tracing::warn!(clerk_id = %clerk_user.id, "Clerk user has no email, skipping");
                return Ok(ack());
            };

            let user = User::upsert(
                &state.db,
                CreateUser {
                    clerk_id: clerk_user.id.clone(),
                    email: email.to_string(),
                    name: clerk_user.display_name(),
                    api_key: generate_api_key(),
                },
                Utc::now(),
            )
            .await?;

            tracing::info!(clerk_id = %user.clerk_id, "User created from Clerk webhook");
        }
        "user.updated" => {
            let clerk_user: ClerkUser = decode(event.data, "user")?;
            let updated = User::update_profile(
                &state.db,
                &clerk_user.id,
                clerk_user.primary_email().map(str::to_string),
                clerk_user.display_name(),
            )
            .await?;

            match updated {
                Some(user) => tracing::info!(clerk_id = %user.clerk_id, "User updated from Clerk webhook"),
                None => tracing::info!(clerk_id = %clerk_user.id, "Update for unknown Clerk user"),
            }
        }
        "user.deleted" => {
            let deleted: DeletedClerkUser = decode(event.data, "user")?;
            if let Some(clerk_id) = deleted.id {
                let existed = User::delete_by_clerk_id(&state.db, &clerk_id).await?;
                tracing::info!(%clerk_id, existed, "User deleted from Clerk webhook");
            }
        }
        other => tracing::debug!(event_type = other, "Ignoring Clerk event"),
    }

    Ok(ack())
}

/// Handles Stripe billing events
///
/// - `checkout.session.completed`: grants the purchased tier, clears the
///   trial and records customer and subscription ids
/// - `customer.subscription.updated`: downgrades on a terminal status
/// - `customer.subscription.deleted`: downgrades
/// - `invoice.payment_failed`: logged
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    verify_stripe(&state, &headers, &body)?;

    let event: StripeEvent = decode_body(&body)?;
    tracing::info!(
        event_id = event.id.as_deref().unwrap_or("-"),
        event_type = %event.event_type,
        "Received Stripe webhook"
    );

    let object = event.data.object;
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let checkout: CompletedCheckout = decode(object, "checkout session")?;
            complete_checkout(&state, &checkout).await?;
        }
        "customer.subscription.updated" => {
            let subscription: Subscription = decode(object, "subscription")?;
            tracing::info!(
                subscription_id = %subscription.id,
                status = subscription.status.as_deref().unwrap_or("-"),
                "Subscription updated"
            );
            if subscription.is_terminal() {
                downgrade(&state, &subscription).await?;
            }
        }
        "customer.subscription.deleted" => {
            let subscription: Subscription = decode(object, "subscription")?;
            downgrade(&state, &subscription).await?;
        }
        "invoice.payment_failed" => {
            let invoice: Invoice = decode(object, "invoice")?;
            tracing::warn!(
                invoice_id = %invoice.id,
                customer = invoice.customer.as_deref().unwrap_or("-"),
                email = invoice.customer_email.as_deref().unwrap_or("-"),
                "Invoice payment failed"
            );
        }
        other => tracing::debug!(event_type = other, "Ignoring Stripe event"),
    }

    Ok(ack())
}

async fn complete_checkout(state: &AppState, checkout: &CompletedCheckout) -> ApiResult<()> {
    let tier_name = checkout.tier_name();
    let Some(tier) = Tier::from_str(tier_name).filter(Tier::is_paid) else {
        tracing::warn!(session_id = %checkout.id, tier = tier_name, "Checkout for unknown tier");
        return Ok(());
    };

    let mut user = None;
    if let Some(clerk_id) = checkout.clerk_id() {
        user = User::find_by_clerk_id(&state.db, clerk_id).await?;
    }
    if user.is_none() {
        if let Some(email) = checkout.email() {
            user = User::find_by_email(&state.db, email).await?;
        }
    }

    let Some(user) = user else {
        tracing::info!(
            session_id = %checkout.id,
            email = checkout.email().unwrap_or("-"),
            "Checkout completed for unknown user"
        );
        return Ok(());
    };

    let updated = User::apply_subscription(
        &state.db,
        user.id,
        tier,
        checkout.customer.clone(),
        checkout.subscription.clone(),
    )
    .await?;

    tracing::info!(
        clerk_id = %updated.clerk_id,
        previous_tier = %user.tier,
        %tier,
        "Checkout completed"
    );

    Ok(())
}

async fn downgrade(state: &AppState, subscription: &Subscription) -> ApiResult<()> {
    match User::downgrade_subscription(&state.db, &subscription.id, Utc::now()).await? {
        Some(user) => tracing::info!(
            clerk_id = %user.clerk_id,
            subscription_id = %subscription.id,
            "Subscription ended, user downgraded"
        ),
        None => tracing::info!(
            subscription_id = %subscription.id,
            "Subscription ended for unknown user"
        ),
    }

    Ok(())
}
