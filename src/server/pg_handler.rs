use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use log::info;
use pgwire::{
    api::{
        query::SimpleQueryHandler,
        results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse, Response, Tag},
        ClientInfo, Type,
    },
    error::{ErrorInfo, PgWireError, PgWireResult},
};

use crate::{
    database::Database,
    sql::{handler::QueryResult, session::Session},
};

pub struct PostgresHandler {
    pub db: Arc<Database>,
    pub session: Arc<Mutex<Session>>,
}

impl PostgresHandler {
    pub fn new(db: Arc<Database>, session: Arc<Mutex<Session>>) -> Self {
        Self { db, session }
    }
}

#[async_trait]
impl SimpleQueryHandler for PostgresHandler {
    async fn do_query<'b, C>(&self, _client: &C, query: &'b str) -> PgWireResult<Vec<Response<'b>>>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        info!("Query: {}", query);
        let mut session = self.session.lock().unwrap();
        let result = crate::sql::handler::execute(&self.db, &mut session, query).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".to_string(),
                "42000".to_string(),
                e.to_string(),
            )))
        })?;

        match result {
            QueryResult::Rows { columns, rows } => {
                let fields: Vec<FieldInfo> = columns
                    .into_iter()
                    .map(|name| FieldInfo::new(name, None, None, Type::TEXT, FieldFormat::Text))
                    .collect();
                let fields = Arc::new(fields);
                let fields_for_stream = fields.clone();
                let data_rows = stream::iter(rows.into_iter().map(move |row| {
                    let mut encoder = DataRowEncoder::new(fields_for_stream.clone());
                    for value in row {
                        encoder.encode_field(&Some(value))?;
                    }
                    encoder.finish()
                }));
                Ok(vec![Response::Query(QueryResponse::new(fields, data_rows))])
            }
            QueryResult::Affected(n) => Ok(vec![Response::Execution(Tag::new_for_execution(
                "OK",
                Some(n),
            ))]),
            QueryResult::Message(msg) => {
                info!("{}", msg);
                Ok(vec![Response::Execution(Tag::new_for_execution("OK", None))])
            }
        }
    }
}
