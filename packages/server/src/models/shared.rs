use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Uniform response envelope.
///
/// Business endpoints answer HTTP 200 and carry the semantic code here
/// (200 success, 400 bad input, 404 not found, 409 conflict, 500 internal).
/// `timestamp` is epoch milliseconds at serialisation time.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Envelope<T> {
    /// Semantic status code.
    #[schema(example = 200)]
    pub code: i32,
    /// Human-readable message.
    #[schema(example = "success")]
    pub message: String,
    pub data: Option<T>,
    pub timestamp: i64,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".into(),
            data: Some(data),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn success_empty() -> Self {
        Self {
            code: 200,
            message: "success".into(),
            data: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn fail(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Pagination parameters shared by list endpoints.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(default)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub size: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, size: 20 }
    }
}

impl PageQuery {
    pub fn normalized(&self) -> (u64, u64) {
        (self.page.max(1), self.size.clamp(1, 100))
    }

    pub fn offset(&self) -> u64 {
        let (page, size) = self.normalized();
        (page - 1) * size
    }
}

/// A single page of results.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PageResult<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub pages: u64,
}

impl<T> PageResult<T> {
    pub fn of(records: Vec<T>, total: u64, page: u64, size: u64) -> Self {
        Self {
            records,
            total,
            page,
            size,
            pages: total.div_ceil(size.max(1)),
        }
    }

    pub fn empty(page: u64, size: u64) -> Self {
        Self::of(Vec::new(), 0, page, size)
    }
}
