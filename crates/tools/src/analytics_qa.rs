//! Analytics tool: text-to-SQL over the analytics database.
//!
//! The completion backend writes one SQL query for the question, given the
//! dialect, the table info and a LIMIT value. The query is cleaned up and
//! run. A failing query is not a tool failure: the observation asks the
//! model to apologise and have the user refine the question.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::provider::{CompletionClient, CompletionRequest};
use parley_core::sql::SqlDatabase;
use parley_core::tool::Tool;
use std::sync::Arc;
use tracing::{debug, warn};

const SQL_SYSTEM: &str = "You translate questions into SQL. \
Only return the SQL query statement, without explanation.";

/// Turn model output into a runnable statement.
///
/// Strips Markdown code fences and a leading `SQLQuery:` label, trims,
/// and makes sure the statement ends with `;`.
pub fn clean_sql(raw: &str) -> String {
    let mut sql = raw.trim();

    if let Some(rest) = sql.strip_prefix("```") {
        let rest = rest.strip_prefix("sql").or_else(|| rest.strip_prefix("SQL")).unwrap_or(rest);
        sql = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    if let Some(rest) = sql.strip_prefix("SQLQuery:") {
        sql = rest.trim();
    }

    let mut sql = sql.to_string();
    if !sql.ends_with(';') {
        sql.push(';');
    }
    sql
}

/// The `AnalyticsQA` agent tool. Cheap to clone.
#[derive(Clone)]
pub struct AnalyticsQaTool {
    client: Arc<dyn CompletionClient>,
    database: Arc<dyn SqlDatabase>,
    model: String,
    limit: usize,
}

impl AnalyticsQaTool {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        database: Arc<dyn SqlDatabase>,
        model: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self {
            client,
            database,
            model: model.into(),
            limit,
        }
    }

    fn failure(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "AnalyticsQA".into(),
            reason: reason.into(),
        }
    }

    fn sql_prompt(&self, dialect: &str, table_info: &str, question: &str) -> String {
        format!(
            "Given an input question, create a syntactically correct {dialect} query to run.\n\
             Always end the query with a LIMIT clause whose value is inside the <limit> tag.\n\
             <limit>{limit}</limit>\n\
             Only use the following tables:\n\
             {table_info}\n\n\
             Question: {question}",
            limit = self.limit,
        )
    }

    /// Ask the model for a SQL query answering `question`.
    pub async fn generate_sql(&self, question: &str) -> Result<String, ToolError> {
        let table_info = self
            .database
            .table_info()
            .await
            .map_err(|e| Self::failure(format!("Table info unavailable: {e}")))?;

        let prompt = self.sql_prompt(self.database.dialect(), &table_info, question);
        let request = CompletionRequest::new(self.model.clone(), SQL_SYSTEM, prompt);

        let response = self
            .client
            .complete(request)
            .await
            .map_err(|e| Self::failure(format!("SQL generation failed: {e}")))?;

        let sql = clean_sql(&response.text);
        if sql == ";" {
            return Err(Self::failure("Model returned an empty query"));
        }
        Ok(sql)
    }

    /// Generate and run a query. Execution failures become an apology that
    /// carries the SQL but not the database error.
    pub async fn query(&self, question: &str) -> Result<String, ToolError> {
        let sql = self.generate_sql(question).await?;
        debug!(sql = %sql, "Generated analytics query");

        match self.database.run(&sql).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                warn!(sql = %sql, error = %e, "Analytics query failed");
                Ok(format!(
                    "Failed to run the SQL query {sql} \
                     Apologize, ask the user for further specifications, or to try again later."
                ))
            }
        }
    }
}

#[async_trait]
impl Tool for AnalyticsQaTool {
    fn name(&self) -> &str {
        "AnalyticsQA"
    }

    fn description(&self) -> &str {
        "Use this tool to perform analytical queries and calculations on structured data, \
         such as counting, aggregating or filtering records. \
         The input should be a natural language question."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let question = input.trim();
        if question.is_empty() {
            return Err(ToolError::InvalidInput("Empty analytics question".into()));
        }
        self.query(question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::{CompletionError, StoreError};
    use parley_core::provider::CompletionResponse;
    use std::sync::Mutex;

    struct OneShot {
        reply: Result<String, CompletionError>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for OneShot {
        fn name(&self) -> &str {
            "one-shot"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            self.prompts.lock().unwrap().push(request.prompt);
            self.reply.clone().map(|text| CompletionResponse {
                text,
                model: "test".into(),
                usage: None,
            })
        }
    }

    struct FakeDb {
        fail: bool,
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlDatabase for FakeDb {
        fn dialect(&self) -> &str {
            "sqlite"
        }

        async fn table_info(&self) -> Result<String, StoreError> {
            Ok("CREATE TABLE extracted_entities (name TEXT, gpa REAL)".into())
        }

        async fn run(&self, sql: &str) -> Result<String, StoreError> {
            self.ran.lock().unwrap().push(sql.to_string());
            if self.fail {
                Err(StoreError::QueryFailed("no such column: gpaa".into()))
            } else {
                Ok("[(3,)]".into())
            }
        }
    }

    fn make_tool(
        reply: Result<String, CompletionError>,
        fail: bool,
    ) -> (AnalyticsQaTool, Arc<OneShot>, Arc<FakeDb>) {
        let client = Arc::new(OneShot {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        let db = Arc::new(FakeDb {
            fail,
            ran: Mutex::new(Vec::new()),
        });
        (
            AnalyticsQaTool::new(client.clone(), db.clone(), "m", 5),
            client,
            db,
        )
    }

    #[test]
    fn clean_sql_strips_fences_and_adds_semicolon() {
        assert_eq!(
            clean_sql("```sql\nSELECT COUNT(*) FROM t LIMIT 5\n```"),
            "SELECT COUNT(*) FROM t LIMIT 5;"
        );
        assert_eq!(clean_sql("  SELECT 1;  "), "SELECT 1;");
        assert_eq!(clean_sql("SQLQuery: SELECT 2"), "SELECT 2;");
    }

    #[tokio::test]
    async fn successful_query_returns_rows() {
        let (tool, client, db) =
            make_tool(Ok("SELECT COUNT(*) FROM extracted_entities LIMIT 5".into()), false);

        let out = tool.invoke("How many CVs are there?").await.unwrap();
        assert_eq!(out, "[(3,)]");
        assert_eq!(
            db.ran.lock().unwrap()[0],
            "SELECT COUNT(*) FROM extracted_entities LIMIT 5;"
        );

        let prompts = client.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("sqlite"));
        assert!(prompt.contains("<limit>5</limit>"));
        assert!(prompt.contains("CREATE TABLE extracted_entities"));
        assert!(prompt.contains("How many CVs are there?"));
    }

    #[tokio::test]
    async fn sql_failure_becomes_apology_observation() {
        let (tool, _client, _db) = make_tool(Ok("SELECT gpaa FROM extracted_entities".into()), true);
        let out = tool.invoke("average gpa").await.unwrap();
        assert!(out.starts_with("Failed to run the SQL query SELECT gpaa FROM extracted_entities;"));
        assert!(out.contains("Apologize"));
    }

    #[tokio::test]
    async fn sql_failure_hides_database_error() {
        let (tool, _client, _db) = make_tool(Ok("SELECT gpaa FROM extracted_entities".into()), true);
        let out = tool.query("average gpa").await.unwrap();
        assert_eq!(
            out,
            "Failed to run the SQL query SELECT gpaa FROM extracted_entities; \
             Apologize, ask the user for further specifications, or to try again later."
        );
        assert!(!out.contains("no such column"));
        assert!(!out.contains("Query failed"));
    }

    #[tokio::test]
    async fn completion_failure_is_a_tool_error() {
        let (tool, _client, db) = make_tool(Err(CompletionError::Timeout("slow".into())), false);
        assert!(matches!(
            tool.invoke("how many").await,
            Err(ToolError::ExecutionFailed { .. })
        ));
        assert!(db.ran.lock().unwrap().is_empty());
    }
}
