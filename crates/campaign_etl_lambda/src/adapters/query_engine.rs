use campaign_etl_core::contract::QueryJob;
use campaign_etl_core::query::QueryState;

/// One page of query results: rows of nullable string cells, plus the token
/// for the next page when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultsPage {
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
}

pub trait QueryEngine {
    fn submit(&self, job: &QueryJob) -> Result<String, String>;
    fn execution_state(&self, execution_id: &str) -> Result<QueryState, String>;
    fn results_page(
        &self,
        execution_id: &str,
        page_token: Option<&str>,
    ) -> Result<ResultsPage, String>;
}
