/// User model and database operations
///
/// Users are mirrored from Clerk: they are created on the first sign-in
/// callback or by the `user.created` webhook, and carry the subscription tier
/// that gates access to the InfraIQ tools.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     clerk_id VARCHAR(255) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     name VARCHAR(255),
///     api_key VARCHAR(64) UNIQUE,
///     tier VARCHAR(20) NOT NULL DEFAULT 'trial',
///     trial_started_at TIMESTAMPTZ,
///     trial_ends_at TIMESTAMPTZ,
///     stripe_customer_id VARCHAR(255),
///     stripe_subscription_id VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use infraiq_shared::models::user::{User, CreateUser};
/// use infraiq_shared::auth::api_key::generate_api_key;
/// use infraiq_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::upsert(
///     &pool,
///     CreateUser {
///         clerk_id: "user_2abc".to_string(),
///         email: "Dev@Example.com".to_string(),
///         name: Some("Dev".to_string()),
///         api_key: generate_api_key(),
///     },
///     chrono::Utc::now(),
/// )
/// .await?;
///
/// assert_eq!(user.email, "dev@example.com");
/// assert!(user.is_trial_active());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Length of the free trial granted to new users
pub const TRIAL_DAYS: i64 = 30;

/// Subscription tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free trial, limited in time
    Trial,

    /// Individual paid plan
    Pro,

    /// Team paid plan
    Team,

    /// Custom contract
    Enterprise,
}

impl Tier {
    /// Converts tier to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Trial => "trial",
            Tier::Pro => "pro",
            Tier::Team => "team",
            Tier::Enterprise => "enterprise",
        }
    }

    /// Parses tier from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(Tier::Trial),
            "pro" => Some(Tier::Pro),
            "team" => Some(Tier::Team),
            "enterprise" => Some(Tier::Enterprise),
            _ => None,
        }
    }

    /// True for every tier that is paid for
    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Trial)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account mirrored from Clerk
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Internal user ID (UUID v4)
    pub id: Uuid,

    /// Clerk user ID (`user_...`), the principal id used for ownership
    pub clerk_id: String,

    /// Email address, always stored lowercase
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Personal API key (`iq_` prefix) used by the CLI
    pub api_key: Option<String>,

    /// Current tier, see [`Tier`]
    pub tier: String,

    /// When the trial started (cleared on upgrade)
    pub trial_started_at: Option<DateTime<Utc>>,

    /// When the trial ends (cleared on upgrade)
    pub trial_ends_at: Option<DateTime<Utc>>,

    /// Stripe customer recorded by checkout
    pub stripe_customer_id: Option<String>,

    /// Stripe subscription recorded by checkout
    pub stripe_subscription_id: Option<String>,

    /// When the user was created
    pub created_at: DateTime<Utc>,

    /// When the user was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating (or refreshing) a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Clerk user ID
    pub clerk_id: String,

    /// Email address (lowercased before storage)
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Freshly generated API key, only stored for new users
    pub api_key: String,
}

const USER_COLUMNS: &str = "id, clerk_id, email, name, api_key, tier, trial_started_at, \
     trial_ends_at, stripe_customer_id, stripe_subscription_id, created_at, updated_at";

impl User {
    /// Gets the parsed tier enum
    pub fn get_tier(&self) -> Option<Tier> {
        Tier::from_str(&self.tier)
    }

    /// Whether the user is inside a running trial at `now`
    ///
    /// Only trial-tier users can have an active trial, whatever the stored
    /// trial dates say.
    pub fn is_trial_active_at(&self, now: DateTime<Utc>) -> bool {
        self.get_tier() == Some(Tier::Trial) && self.trial_ends_at.map_or(false, |ends| now < ends)
    }

    /// Whether the user is inside a running trial right now
    pub fn is_trial_active(&self) -> bool {
        self.is_trial_active_at(Utc::now())
    }

    /// Whole days left until `trial_ends_at`, never negative
    pub fn trial_days_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        self.trial_ends_at
            .map(|ends| (ends - now).num_days().max(0))
            .unwrap_or(0)
    }

    /// Whole days left in the trial, counted from now
    pub fn trial_days_remaining(&self) -> i64 {
        self.trial_days_remaining_at(Utc::now())
    }

    /// Paid tiers and running trials both count as an active license
    pub fn has_active_license_at(&self, now: DateTime<Utc>) -> bool {
        self.get_tier().map_or(false, |tier| tier.is_paid()) || self.is_trial_active_at(now)
    }

    /// Creates the user with a fresh trial, or refreshes email and name
    ///
    /// On conflict with an existing `clerk_id` the tier, trial dates and API
    /// key of the stored user are kept. A user without an API key is given
    /// the one supplied in `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the email already belongs to another Clerk user
    /// (unique constraint violation) or the database is unavailable.
    pub async fn upsert(
        pool: &PgPool,
        data: CreateUser,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let trial_ends_at = now + Duration::days(TRIAL_DAYS);

        let query = format!(
            r#"
            INSERT INTO users (clerk_id, email, name, api_key, tier, trial_started_at, trial_ends_at)
            VALUES ($1, $2, $3, $4, 'trial', $5, $6)
            ON CONFLICT (clerk_id) DO UPDATE SET
                email = EXCLUDED.email,
                name = COALESCE(EXCLUDED.name, users.name),
                api_key = COALESCE(users.api_key, EXCLUDED.api_key),
                updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(data.clerk_id)
            .bind(data.email.to_lowercase())
            .bind(data.name)
            .bind(data.api_key)
            .bind(now)
            .bind(trial_ends_at)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    /// Finds a user by Clerk user ID
    pub async fn find_by_clerk_id(
        pool: &PgPool,
        clerk_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE clerk_id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(clerk_id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    /// Finds the owner of a personal API key
    pub async fn find_by_api_key(
        pool: &PgPool,
        api_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE api_key = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(api_key)
            .fetch_optional(pool)
            .await
    }

    /// Updates email and/or name of an existing user
    ///
    /// `None` fields are left untouched. Returns `None` when no user has the
    /// given Clerk ID.
    pub async fn update_profile(
        pool: &PgPool,
        clerk_id: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                name = COALESCE($3, name),
                updated_at = NOW()
            WHERE clerk_id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(clerk_id)
            .bind(email.map(|e| e.to_lowercase()))
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Sets the tier of a user
    ///
    /// Moving to a paid tier clears both trial timestamps.
    pub async fn set_tier(pool: &PgPool, id: Uuid, tier: Tier) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users SET
                tier = $2,
                trial_started_at = CASE WHEN $3 THEN NULL ELSE trial_started_at END,
                trial_ends_at = CASE WHEN $3 THEN NULL ELSE trial_ends_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(tier.as_str())
            .bind(tier.is_paid())
            .fetch_one(pool)
            .await
    }

    /// Records a completed Stripe checkout
    ///
    /// Sets the paid tier, clears the trial and stores whichever Stripe ids
    /// the checkout reported (existing ids are kept when `None`).
    pub async fn apply_subscription(
        pool: &PgPool,
        id: Uuid,
        tier: Tier,
        stripe_customer_id: Option<String>,
        stripe_subscription_id: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users SET
                tier = $2,
                trial_started_at = NULL,
                trial_ends_at = NULL,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_subscription_id = COALESCE($4, stripe_subscription_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(tier.as_str())
            .bind(stripe_customer_id)
            .bind(stripe_subscription_id)
            .fetch_one(pool)
            .await
    }

    /// Downgrades the user holding a Stripe subscription
    ///
    /// The user goes back to the trial tier with an already-expired trial and
    /// the subscription id is cleared. Returns `None` when no user holds the
    /// subscription.
    pub async fn downgrade_subscription(
        pool: &PgPool,
        stripe_subscription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users SET
                tier = 'trial',
                trial_ends_at = $2,
                stripe_subscription_id = NULL,
                updated_at = NOW()
            WHERE stripe_subscription_id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(stripe_subscription_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a user by Clerk ID
    ///
    /// Scans and projects owned by the user are kept.
    ///
    /// # Returns
    ///
    /// True if a user was deleted, false if none matched
    pub async fn delete_by_clerk_id(pool: &PgPool, clerk_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE clerk_id = $1")
            .bind(clerk_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
