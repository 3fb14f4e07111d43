//! Relational backend: object type → table, source → column, row id →
//! canonical id.

use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

use super::{Backend, Vocabulary};
use crate::config::RelationalConfig;
use crate::db::queries::InsertOutcome;
use crate::db::Database;
use crate::errors::BackendError;
use crate::models::{Mapping, Mappings, Status};

const NAME: &str = "relational";

fn logged(err: BackendError) -> BackendError {
    super::logged(NAME, err)
}

/// [`Backend`] over a SQLite database.
pub struct RelationalBackend {
    config: RelationalConfig,
    names: Vocabulary,
    db: Option<Database>,
}

impl RelationalBackend {
    /// Create an unconnected backend; [`Backend::boot`] opens the database.
    pub fn new(config: RelationalConfig, names: Vocabulary) -> Self {
        Self {
            config,
            names,
            db: None,
        }
    }

    fn db(&self) -> Result<&Database, BackendError> {
        self.db.as_ref().ok_or(BackendError::NotBooted(NAME))
    }
}

#[async_trait]
impl Backend for RelationalBackend {
    async fn boot(&mut self) -> Result<(), BackendError> {
        info!(path = %self.config.path.display(), "booting relational backend");
        let db = Database::new(&self.config.path)
            .and_then(|db| {
                db.initialize(&self.names.object_types, &self.names.sources)?;
                db.ping()?;
                Ok(db)
            })
            .map_err(|e| {
                error!(error = %e, "relational backend failed to boot");
                BackendError::Connection(e.to_string())
            })?;
        self.db = Some(db);
        info!("relational backend ready");
        Ok(())
    }

    async fn ping(&self) -> Result<String, BackendError> {
        self.db()?;
        Ok(self.name().to_string())
    }

    fn name(&self) -> &'static str {
        NAME
    }

    async fn execute(&self, queries: &[String]) -> Result<(), BackendError> {
        debug!(count = queries.len(), "executing raw statements");
        self.db()?.execute_statements(queries).map_err(logged)
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
        let db = self.db()?;
        self.names
            .check_pair(&mapping.object_type, &mapping.source)
            .map_err(logged)?;

        let requested = mapping.ensure_canonical().to_string();
        let outcome = db
            .insert_mapping(
                &mapping.object_type,
                &mapping.source,
                &requested,
                &mapping.source_id,
            )
            .map_err(logged)?;
        match outcome {
            InsertOutcome::Inserted => {
                info!(canonical = %requested, "mapping created");
                Ok(Status::Created)
            }
            InsertOutcome::Existing(stored) => {
                info!(
                    requested = %requested,
                    stored = %stored,
                    "mapping already exists, reporting stored canonical"
                );
                mapping.canonical = stored;
                Ok(Status::Conflict)
            }
        }
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
        let db = self.db()?;
        self.names
            .check_pair(&mapping.object_type, &mapping.source)
            .map_err(logged)?;

        let changed = db
            .set_source(
                &mapping.object_type,
                &mapping.source,
                &mapping.canonical,
                &mapping.source_id,
            )
            .map_err(logged)?;
        if changed == 0 {
            return Err(logged(BackendError::NotFound {
                object_type: mapping.object_type.clone(),
                key: mapping.canonical.clone(),
            }));
        }
        info!(source_id = %mapping.source_id, "mapping updated");
        Ok(("mapping successfully updated".to_string(), Status::Ok))
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
        let db = self.db()?;
        self.names
            .check_pair(&mapping.object_type, &mapping.source)
            .map_err(logged)?;

        let canonical = db
            .find_canonical(&mapping.object_type, &mapping.source, &mapping.source_id)
            .map_err(logged)?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                logged(BackendError::NotFound {
                    object_type: mapping.object_type.clone(),
                    key: format!("{}:{}", mapping.source, mapping.source_id),
                })
            })?;
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
        let db = self.db()?;
        self.names
            .check_object_type(&mapping.object_type)
            .map_err(logged)?;

        let not_found = || {
            logged(BackendError::NotFound {
                object_type: mapping.object_type.clone(),
                key: mapping.canonical.clone(),
            })
        };
        let row = db
            .source_ids(&mapping.object_type, &mapping.canonical, &self.names.sources)
            .map_err(logged)?
            .ok_or_else(not_found)?;

        let mappings: Mappings = row
            .into_iter()
            .filter_map(|(source, id)| id.filter(|id| !id.is_empty()).map(|id| (source, id)))
            .map(|(source, source_id)| {
                Mapping::new(
                    mapping.canonical.clone(),
                    source,
                    source_id,
                    mapping.object_type.clone(),
                    base_url,
                )
            })
            .collect();
        if mappings.is_empty() {
            return Err(not_found());
        }
        debug!(count = mappings.len(), "resolved canonical");
        Ok((mappings, Status::Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://gref.test";

    async fn booted() -> RelationalBackend {
        let mut backend = RelationalBackend::new(
            RelationalConfig {
                path: ":memory:".into(),
            },
            Vocabulary::new(
                ["salesforce", "ezpublish", "zuora", "gluu"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                vec!["person".into(), "article".into()],
            ),
        );
        backend.boot().await.expect("boot");
        backend
    }

    #[tokio::test]
    async fn test_not_booted() {
        let backend = RelationalBackend::new(RelationalConfig::default(), Vocabulary::default());
        let mut m = Mapping::for_source("person", "salesforce", "SF-1");
        let err = backend.map_create(&mut m).await.unwrap_err();
        assert!(matches!(err, BackendError::NotBooted("relational")));
    }

    #[tokio::test]
    async fn test_boot_fails_on_unreachable_path() {
        let mut backend = RelationalBackend::new(
            RelationalConfig {
                path: "/nonexistent-dir/gref.db".into(),
            },
            Vocabulary::new(vec!["salesforce".into()], vec!["person".into()]),
        );
        let err = backend.boot().await.unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
    }

    #[tokio::test]
    async fn test_ping_and_name() {
        let backend = booted().await;
        assert_eq!(backend.ping().await.unwrap(), "relational");
    }

    #[tokio::test]
    async fn test_create_on_empty_store_generates_canonical() {
        let backend = booted().await;
        let mut m = Mapping::for_source("person", "salesforce", "SF-1");
        let status = backend.map_create(&mut m).await.unwrap();
        assert_eq!(status, Status::Created);
        assert!(!m.canonical.is_empty());
    }

    #[tokio::test]
    async fn test_second_create_conflicts_and_keeps_canonical() {
        let backend = booted().await;
        let mut first = Mapping::for_source("person", "salesforce", "SF-1");
        backend.map_create(&mut first).await.unwrap();

        let mut second = Mapping::for_source("person", "salesforce", "SF-1");
        second.canonical = "someone-else".into();
        let status = backend.map_create(&mut second).await.unwrap();
        assert_eq!(status, Status::Conflict);
        assert_eq!(second.canonical, first.canonical);

        let mut lookup = Mapping::for_source("person", "salesforce", "SF-1");
        let (canonical, _) = backend.source_info(&mut lookup).await.unwrap();
        assert_eq!(canonical, first.canonical);
    }

    #[tokio::test]
    async fn test_same_source_id_under_other_type_is_independent() {
        let backend = booted().await;
        let mut person = Mapping::for_source("person", "salesforce", "X-1");
        let mut article = Mapping::for_source("article", "salesforce", "X-1");
        assert_eq!(backend.map_create(&mut person).await.unwrap(), Status::Created);
        assert_eq!(backend.map_create(&mut article).await.unwrap(), Status::Created);
        assert_ne!(person.canonical, article.canonical);
    }

    #[tokio::test]
    async fn test_source_info_round_trip() {
        let backend = booted().await;
        let mut m = Mapping::for_source("article", "ezpublish", "EZ-7");
        m.canonical = "art-7".into();
        backend.map_create(&mut m).await.unwrap();

        let mut lookup = Mapping::for_source("article", "ezpublish", "EZ-7");
        let (canonical, status) = backend.source_info(&mut lookup).await.unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(canonical, "art-7");
        assert_eq!(lookup.canonical, "art-7");
    }

    #[tokio::test]
    async fn test_source_info_not_found() {
        let backend = booted().await;
        let mut m = Mapping::for_source("person", "gluu", "nobody");
        let err = backend.source_info(&mut m).await.unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
        assert!(m.canonical.is_empty());
    }

    #[tokio::test]
    async fn test_update_extends_canonical() {
        let backend = booted().await;
        let mut m = Mapping::for_source("person", "salesforce", "SF-1");
        backend.map_create(&mut m).await.unwrap();

        let mut ext = Mapping::for_canonical("person", m.canonical.clone());
        ext.source = "zuora".into();
        ext.source_id = "Z-1".into();
        let (message, status) = backend.map_update(&ext).await.unwrap();
        assert_eq!(status, Status::Ok);
        assert_eq!(message, "mapping successfully updated");

        let (mappings, status) = backend
            .canonical_info(&Mapping::for_canonical("person", m.canonical.clone()), BASE)
            .await
            .unwrap();
        assert_eq!(status, Status::Ok);
        let pairs: Vec<(&str, &str)> = mappings
            .iter()
            .map(|m| (m.source.as_str(), m.source_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("salesforce", "SF-1"), ("zuora", "Z-1")]);
        for item in &mappings {
            assert_eq!(item.canonical, m.canonical);
            assert_eq!(item.object, format!("{BASE}/person/{}", m.canonical));
        }
    }

    #[tokio::test]
    async fn test_update_missing_canonical_is_not_found() {
        let backend = booted().await;
        let mut ext = Mapping::for_canonical("person", "ghost");
        ext.source = "zuora".into();
        ext.source_id = "Z-1".into();
        let err = backend.map_update(&ext).await.unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[tokio::test]
    async fn test_update_with_pair_owned_by_other_canonical_conflicts() {
        let backend = booted().await;
        let mut a = Mapping::for_source("person", "salesforce", "SF-1");
        let mut b = Mapping::for_source("person", "salesforce", "SF-2");
        backend.map_create(&mut a).await.unwrap();
        backend.map_create(&mut b).await.unwrap();

        let mut steal = Mapping::for_canonical("person", b.canonical.clone());
        steal.source = "salesforce".into();
        steal.source_id = "SF-1".into();
        let err = backend.map_update(&steal).await.unwrap_err();
        assert_eq!(err.status(), Status::Conflict);
    }

    #[tokio::test]
    async fn test_canonical_info_unknown_is_not_found() {
        let backend = booted().await;
        let err = backend
            .canonical_info(&Mapping::for_canonical("person", "ghost"), BASE)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[tokio::test]
    async fn test_unknown_names_are_rejected() {
        let backend = booted().await;
        let mut m = Mapping::for_source("invoice", "salesforce", "1");
        let err = backend.map_create(&mut m).await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownObjectType(_)));

        let mut m = Mapping::for_source("person", "hubspot", "1");
        let err = backend.map_create(&mut m).await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownSource(_)));
        assert_eq!(err.status(), Status::BadRequest);
    }

    #[tokio::test]
    async fn test_execute_runs_raw_statements() {
        let backend = booted().await;
        backend
            .execute(&["INSERT INTO person (id, gluu) VALUES ('raw-1', 'G-1')".to_string()])
            .await
            .unwrap();
        let mut m = Mapping::for_source("person", "gluu", "G-1");
        let (canonical, _) = backend.source_info(&mut m).await.unwrap();
        assert_eq!(canonical, "raw-1");
    }
}
