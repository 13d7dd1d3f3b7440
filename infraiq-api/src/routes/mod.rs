/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `scans`: Scan listing, retrieval, creation and deletion
/// - `projects`: Project CRUD
/// - `users`: Sign-in callback and current user
/// - `license`: License server callbacks and license status
/// - `sync`: CLI scan upload
/// - `dashboard`: Statistics and recommendations
/// - `checkout`: Stripe checkout and billing portal
/// - `webhooks`: Clerk and Stripe webhooks

pub mod checkout;
pub mod dashboard;
pub mod health;
pub mod license;
pub mod projects;
pub mod scans;
pub mod sync;
pub mod users;
pub mod webhooks;
