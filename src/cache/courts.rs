use redis::AsyncCommands;

use crate::cache::CacheService;

const PAGE_TTL_SECONDS: u64 = 600;
const PAGE_PREFIX: &str = "courts:page:";

pub fn page_key(search: Option<&str>, page: u64, limit: u64) -> String {
    format!(
        "{}q={}&p={}&l={}",
        PAGE_PREFIX,
        search.unwrap_or_default().trim().to_lowercase(),
        page,
        limit
    )
}

impl CacheService {
    pub async fn get_court_page(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get(key).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("court page cache read failed: {:?}", e);
                None
            }
        }
    }

    pub async fn cache_court_page(&self, key: &str, json: &str) {
        let mut conn = self.conn.clone();
        let res: Result<(), _> = conn.set_ex(key, json, PAGE_TTL_SECONDS).await;
        if let Err(e) = res {
            tracing::warn!("court page cache write failed: {:?}", e);
        }
    }

    /// Drops every cached court listing. Called after any court write.
    pub async fn invalidate_courts(&self) {
        match self.delete_matching(&format!("{}*", PAGE_PREFIX)).await {
            Ok(n) => tracing::debug!("Invalidated {} cached court pages", n),
            Err(e) => tracing::warn!("court cache invalidation failed: {:?}", e),
        }
    }
}
