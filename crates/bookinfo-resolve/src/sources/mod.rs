use async_trait::async_trait;

use crate::sources::google_books::Volume;

pub mod google_books;

/// A bibliographic search service.
///
/// Implementations swallow their own failures: `None` means the service could
/// not be reached (after retries), `Some(vec![])` means it answered with no
/// matches. Callers treat both the same way.
#[async_trait]
pub trait BookLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, query: &str, api_key: &str) -> Option<Vec<Volume>>;
}
