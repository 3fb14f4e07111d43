//! Graph backend: object type → node label, source → `source` node reached
//! through a `KNOWS` edge carrying the source-local id, canonical id → node
//! property.
//!
//! Creation and extension are single statements, so the existence check and
//! the write happen atomically in the store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use super::{ident, Backend, Vocabulary};
use crate::config::GraphConfig;
use crate::errors::BackendError;
use crate::models::{Mapping, Mappings, Status};
use crate::neo::{normalize, Cell, CypherTransport, HttpTransport, Record, Statement};

const NAME: &str = "graph";

fn logged(err: BackendError) -> BackendError {
    super::logged(NAME, err)
}

/// `created` is true only when this call's `$nonce` was written, i.e. the
/// edge did not exist before.
fn create_statement(mapping: &Mapping, nonce: &str) -> Result<Statement, BackendError> {
    let label = ident::check("object type", &mapping.object_type)?;
    Ok(Statement::new(format!(
        "MERGE (s:source {{name: $source}}) \
         MERGE (o:{label})-[r:KNOWS {{id: $source_id}}]->(s) \
         ON CREATE SET o.canonical = $canonical, r.created_by = $nonce \
         RETURN o.canonical, r.created_by = $nonce AS created"
    ))
    .param("source", mapping.source.as_str())
    .param("source_id", mapping.source_id.as_str())
    .param("canonical", mapping.canonical.as_str())
    .param("nonce", nonce))
}

/// Links the pair to `$canonical` unless another canonical already holds it;
/// that holder, if any, is returned and nothing is written.
fn update_statement(mapping: &Mapping) -> Result<Statement, BackendError> {
    let label = ident::check("object type", &mapping.object_type)?;
    Ok(Statement::new(format!(
        "OPTIONAL MATCH (x:{label})-[:KNOWS {{id: $source_id}}]->(:source {{name: $source}}) \
         WHERE x.canonical <> $canonical \
         WITH head(collect(x.canonical)) AS holder \
         FOREACH (ignored IN CASE WHEN holder IS NULL THEN [1] ELSE [] END | \
           MERGE (o:{label} {{canonical: $canonical}}) \
           MERGE (s:source {{name: $source}}) \
           MERGE (o)-[:KNOWS {{id: $source_id}}]->(s)) \
         RETURN holder"
    ))
    .param("canonical", mapping.canonical.as_str())
    .param("source", mapping.source.as_str())
    .param("source_id", mapping.source_id.as_str()))
}

fn source_info_statement(mapping: &Mapping) -> Result<Statement, BackendError> {
    let label = ident::check("object type", &mapping.object_type)?;
    Ok(Statement::new(format!(
        "MATCH (o:{label})-[r:KNOWS {{id: $source_id}}]->(s:source {{name: $source}}) \
         RETURN o.canonical"
    ))
    .param("source_id", mapping.source_id.as_str())
    .param("source", mapping.source.as_str()))
}

fn canonical_info_statement(mapping: &Mapping) -> Result<Statement, BackendError> {
    let label = ident::check("object type", &mapping.object_type)?;
    Ok(Statement::new(format!(
        "MATCH (c:{label} {{canonical: $canonical}})-[i:KNOWS]->(s:source) \
         RETURN c.canonical, s.name, i.id"
    ))
    .param("canonical", mapping.canonical.as_str()))
}

/// [`Backend`] over a property graph reached through a [`CypherTransport`].
pub struct GraphBackend {
    config: GraphConfig,
    names: Vocabulary,
    transport: Option<Arc<dyn CypherTransport>>,
}

impl GraphBackend {
    /// Create an unconnected backend; [`Backend::boot`] builds the HTTP
    /// transport from `config`.
    pub fn new(config: GraphConfig, names: Vocabulary) -> Self {
        Self {
            config,
            names,
            transport: None,
        }
    }

    /// Create a backend over an existing transport. `boot` then only checks
    /// that the store answers.
    pub fn with_transport(
        config: GraphConfig,
        names: Vocabulary,
        transport: Arc<dyn CypherTransport>,
    ) -> Self {
        Self {
            config,
            names,
            transport: Some(transport),
        }
    }

    fn transport(&self) -> Result<&Arc<dyn CypherTransport>, BackendError> {
        self.transport.as_ref().ok_or(BackendError::NotBooted(NAME))
    }

    /// Run one statement and normalize its rows.
    async fn query(&self, statement: Statement) -> Result<Vec<Record>, BackendError> {
        let transport = self.transport()?;
        debug!(statement = %statement.statement, "running cypher");
        let results = transport.run(std::slice::from_ref(&statement)).await?;
        match results.first() {
            Some(result) => normalize(result),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Backend for GraphBackend {
    async fn boot(&mut self) -> Result<(), BackendError> {
        info!(url = %self.config.base_url(), "booting graph backend");
        let transport: Arc<dyn CypherTransport> = match &self.transport {
            Some(existing) => existing.clone(),
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        transport
            .run(&[Statement::new("RETURN 1")])
            .await
            .map_err(|e| {
                error!(error = %e, "graph backend failed to boot");
                BackendError::Connection(e.to_string())
            })?;
        self.transport = Some(transport);
        info!("graph backend ready");
        Ok(())
    }

    async fn ping(&self) -> Result<String, BackendError> {
        self.transport()?;
        Ok(self.name().to_string())
    }

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(&self, queries: &[String]) -> Result<(), BackendError> {
        let statements: Vec<Statement> =
            queries.iter().map(|q| Statement::new(q.as_str())).collect();
        debug!(count = statements.len(), "executing raw statements");
        self.transport()?.run(&statements).await.map_err(logged)?;
        Ok(())
    }

    #[instrument(
        skip(self, mapping),
        fields(
            object_type = %mapping.object_type,
            source = %mapping.source,
            source_id = %mapping.source_id
        )
    )]
    async fn map_create(&self, mapping: &mut Mapping) -> Result<Status, BackendError> {
        self.transport()?;
        self.names
            .check_pair(&mapping.object_type, &mapping.source)
            .map_err(logged)?;

        let requested = mapping.ensure_canonical().to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        let statement = create_statement(mapping, &nonce).map_err(logged)?;
        let records = self.query(statement).await.map_err(logged)?;

        let record = records
            .first()
            .ok_or_else(|| logged(BackendError::Decode("merge returned no row".into())))?;
        let stored = record.text("o.canonical").map_err(logged)?.to_string();
        let created = record.text("created").map_err(logged)? == "true";

        if !created {
            info!(
                requested = %requested,
                stored = %stored,
                "mapping already exists, reporting stored canonical"
            );
            mapping.canonical = stored;
            return Ok(Status::Conflict);
        }
        info!(canonical = %stored, "mapping created");
        Ok(Status::Created)
    }

    #[instrument(
        skip(self, mapping),
        fields(
            object_type = %mapping.object_type,
            canonical = %mapping.canonical,
            source = %mapping.source
        )
    )]
    async fn map_update(&self, mapping: &Mapping) -> Result<(String, Status), BackendError> {
        self.transport()?;
        self.names
            .check_pair(&mapping.object_type, &mapping.source)
            .map_err(logged)?;

        let statement = update_statement(mapping).map_err(logged)?;
        let records = self.query(statement).await.map_err(logged)?;

        if let Some(Cell::Text(holder)) = records.first().and_then(|r| r.get("holder")) {
            return Err(logged(BackendError::Conflict {
                object_type: mapping.object_type.clone(),
                source_name: mapping.source.clone(),
                source_id: mapping.source_id.clone(),
                canonical: holder.clone(),
            }));
        }
        info!(source_id = %mapping.source_id, "mapping upserted");
        Ok((String::new(), Status::NoContent))
    }

    #[instrument(
        skip(self, mapping),
        fields(
            object_type = %mapping.object_type,
            source = %mapping.source,
            source_id = %mapping.source_id
        )
    )]
    async fn source_info(&self, mapping: &mut Mapping) -> Result<(String, Status), BackendError> {
        self.transport()?;
        self.names
            .check_pair(&mapping.object_type, &mapping.source)
            .map_err(logged)?;

        let statement = source_info_statement(mapping).map_err(logged)?;
        let records = self.query(statement).await.map_err(logged)?;
        if records.len() > 1 {
            warn!(rows = records.len(), "source pair linked to several canonical nodes");
        }

        let record = records.first().ok_or_else(|| {
            logged(BackendError::NotFound {
                object_type: mapping.object_type.clone(),
                key: format!("{}:{}", mapping.source, mapping.source_id),
            })
        })?;
        let canonical = record.text("o.canonical").map_err(logged)?.to_string();
        debug!(canonical = %canonical, "resolved source");
        mapping.canonical = canonical.clone();
        Ok((canonical, Status::Ok))
    }

    #[instrument(
        skip(self, mapping),
        fields(object_type = %mapping.object_type, canonical = %mapping.canonical)
    )]
    async fn canonical_info(
        &self,
        mapping: &Mapping,
        base_url: &str,
    ) -> Result<(Mappings, Status), BackendError> {
        self.transport()?;
        self.names
            .check_object_type(&mapping.object_type)
            .map_err(logged)?;

        let statement = canonical_info_statement(mapping).map_err(logged)?;
        let records = self.query(statement).await.map_err(logged)?;

        let mappings = records
            .iter()
            .map(|r| {
                Ok(Mapping::new(
                    r.text("c.canonical")?,
                    r.text("s.name")?,
                    r.text("i.id")?,
                    mapping.object_type.clone(),
                    base_url,
                ))
            })
            .collect::<Result<Mappings, BackendError>>()
            .map_err(logged)?;
        if mappings.is_empty() {
            return Err(logged(BackendError::NotFound {
                object_type: mapping.object_type.clone(),
                key: mapping.canonical.clone(),
            }));
        }
        debug!(count = mappings.len(), "resolved canonical");
        Ok((mappings, Status::Ok))
    }
}
