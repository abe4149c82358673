//! Query generation capability.
//!
//! The production deployment plugs an AI-backed generator behind this
//! trait; the pipeline only ever sees `generate`. The template generator
//! below is the deterministic default: enough to exercise every stage and
//! predictable in tests.

use async_trait::async_trait;
use fundscout_protocol::ExecutionRequest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryGeneratorError {
    #[error("query generation failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Turn one execution request into the queries to run. An empty list is
    /// a valid (if useless) outcome; an error fails the trigger
    /// synchronously.
    async fn generate(&self, request: &ExecutionRequest)
        -> Result<Vec<String>, QueryGeneratorError>;
}

/// Deterministic phrase-template expansion.
pub struct TemplateQueryGenerator;

impl TemplateQueryGenerator {
    fn region_name(code: &str) -> &str {
        match code {
            "BG" => "Bulgaria",
            "US" => "United States",
            "DE" => "Germany",
            "FR" => "France",
            "RO" => "Romania",
            other => other,
        }
    }
}

#[async_trait]
impl QueryGenerator for TemplateQueryGenerator {
    async fn generate(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Vec<String>, QueryGeneratorError> {
        let region = Self::region_name(request.region.as_str());
        let category = request.category.phrase();
        let funding = request.funding_type.phrase();
        let recipient = request.recipient_type.phrase();

        Ok(vec![
            format!("{} {} {}", region, category, funding),
            format!("{} for {} in {}", funding, recipient, region),
            format!("{} {} funding opportunities", region, category),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fundscout_protocol::{
        FundingCategory, FundingType, RecipientType, Region, RequestId, SearchEngine,
    };

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            request_id: RequestId::new(),
            category: FundingCategory::Education,
            region: Region::new("BG").unwrap(),
            funding_type: FundingType::Scholarship,
            recipient_type: RecipientType::K12School,
            engine: SearchEngine::Searxng,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn expands_the_request_into_region_aware_queries() {
        let queries = TemplateQueryGenerator.generate(&request()).await.unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], "Bulgaria education scholarships");
        assert!(queries.iter().all(|q| q.contains("Bulgaria")));
    }

    #[tokio::test]
    async fn unknown_regions_fall_back_to_the_code() {
        let mut req = request();
        req.region = Region::new("ZZ").unwrap();
        let queries = TemplateQueryGenerator.generate(&req).await.unwrap();
        assert!(queries[0].starts_with("ZZ "));
    }
}
