// crates/db/src/entity.rs
//! Entity graph repository. A flat edge table plus BFS with a visited set — never
//! reference-counted node objects.

use agent_memory_core::types::{Entity, EntityRelation, EntityType, RelationshipType};
use sqlx::{Row, SqlitePool};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

use crate::error::DbResult;
use crate::util::{format_timestamp, parse_timestamp};

/// Hard cap on BFS traversal depth.
pub const MAX_TRAVERSAL_DEPTH: u32 = 2;

#[derive(Clone)]
pub struct EntityRepository {
    pool: SqlitePool,
}

fn row_to_entity(row: &sqlx::sqlite::SqliteRow) -> Entity {
    let entity_type: String = row.get("entity_type");
    Entity {
        id: row.get("id"),
        name: row.get("name"),
        entity_type: EntityType::parse(&entity_type).unwrap_or(EntityType::Other),
        first_seen_at: parse_timestamp(&row.get::<String, _>("first_seen_at")),
        last_seen_at: parse_timestamp(&row.get::<String, _>("last_seen_at")),
        mention_count: row.get("mention_count"),
    }
}

fn row_to_relation(row: &sqlx::sqlite::SqliteRow) -> EntityRelation {
    let relationship: String = row.get("relationship");
    EntityRelation {
        id: row.get("id"),
        source_entity_id: row.get("source_entity_id"),
        target_entity_id: row.get("target_entity_id"),
        relationship: RelationshipType::parse(&relationship).unwrap_or(RelationshipType::RelatedTo),
        observation_id: row.get("observation_id"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}

impl EntityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Increment mention-count and bump last-seen-at if `(name, type)`
    /// exists; otherwise insert with mention-count=1.
    pub async fn upsert_entity(&self, name: &str, entity_type: EntityType) -> DbResult<Entity> {
        let existing = sqlx::query("SELECT * FROM entities WHERE name = ? AND entity_type = ?")
            .bind(name)
            .bind(entity_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let now = chrono::Utc::now();
        if let Some(row) = existing {
            let id: String = row.get("id");
            sqlx::query("UPDATE entities SET mention_count = mention_count + 1, last_seen_at = ? WHERE id = ?")
                .bind(format_timestamp(&now))
                .bind(&id)
                .execute(&self.pool)
                .await?;
            let mut e = row_to_entity(&row);
            e.mention_count += 1;
            e.last_seen_at = now;
            return Ok(e);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO entities (id, name, entity_type, first_seen_at, last_seen_at, mention_count)
             VALUES (?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(name)
        .bind(entity_type.as_str())
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(&self.pool)
        .await?;

        Ok(Entity {
            id,
            name: name.to_string(),
            entity_type,
            first_seen_at: now,
            last_seen_at: now,
            mention_count: 1,
        })
    }

    /// Idempotent on `(source, target, relationship)`.
    pub async fn create_relation(
        &self,
        source: &str,
        target: &str,
        relationship: RelationshipType,
        observation_id: &str,
    ) -> DbResult<()> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO entity_relations (id, source_entity_id, target_entity_id, relationship, observation_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_entity_id, target_entity_id, relationship) DO NOTHING",
        )
        .bind(id)
        .bind(source)
        .bind(target)
        .bind(relationship.as_str())
        .bind(observation_id)
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent on `(entity, observation)`.
    pub async fn link_observation(&self, entity_id: &str, observation_id: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO entity_observations (entity_id, observation_id) VALUES (?, ?)
             ON CONFLICT(entity_id, observation_id) DO NOTHING",
        )
        .bind(entity_id)
        .bind(observation_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Entity>> {
        let row = sqlx::query("SELECT * FROM entities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_entity))
    }

    /// FTS name match, used by search augmentation.
    pub async fn search_by_name(&self, term: &str) -> DbResult<Vec<Entity>> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT e.* FROM entities_fts f JOIN entities e ON e.rowid = f.rowid
             WHERE entities_fts MATCH ? LIMIT 20",
        )
        .bind(format!("\"{}\"", trimmed.replace('"', "\"\"")))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_entity).collect())
    }

    /// Breadth-first visit bounded by `depth` (hard cap
    /// [`MAX_TRAVERSAL_DEPTH`]); returns the set of visited entity ids
    /// including the seed. Follows edges in both directions and tracks
    /// visited ids to guarantee termination on cyclic graphs.
    pub async fn traverse_relations(&self, seed: &str, depth: u32) -> DbResult<HashSet<String>> {
        let depth = depth.min(MAX_TRAVERSAL_DEPTH);
        let edges = sqlx::query("SELECT source_entity_id, target_entity_id FROM entity_relations")
            .fetch_all(&self.pool)
            .await?;
        let mut adjacency: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
        for row in &edges {
            let src: String = row.get("source_entity_id");
            let dst: String = row.get("target_entity_id");
            adjacency.entry(src.clone()).or_default().push(dst.clone());
            adjacency.entry(dst).or_default().push(src);
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(seed.to_string());
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((seed.to_string(), 0));

        while let Some((node, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            if let Some(neighbors) = adjacency.get(&node) {
                for n in neighbors {
                    if visited.insert(n.clone()) {
                        queue.push_back((n.clone(), d + 1));
                    }
                }
            }
        }

        Ok(visited)
    }

    /// Observation ids linked to any entity in `entity_ids`.
    pub async fn linked_observations(&self, entity_ids: &[String]) -> DbResult<Vec<String>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = entity_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT DISTINCT observation_id FROM entity_observations WHERE entity_id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in entity_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("observation_id")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationRepository;
    use crate::session::SessionRepository;
    use crate::Database;
    use agent_memory_core::provider::ObservationDraft;
    use agent_memory_core::types::ObservationType;

    async fn repo() -> EntityRepository {
        let db = Database::open_in_memory().await.unwrap();
        EntityRepository::new(db.pool().clone())
    }

    /// Entity relations carry a foreign key to a justifying observation;
    /// tests that create relations need a real row.
    async fn repo_with_observation() -> (EntityRepository, String) {
        let db = Database::open_in_memory().await.unwrap();
        let sessions = SessionRepository::new(db.pool().clone());
        let observations = ObservationRepository::new(db.pool().clone());
        let s = sessions.create("/p").await.unwrap();
        let draft = ObservationDraft {
            obs_type: ObservationType::Discovery,
            title: "t".into(),
            subtitle: String::new(),
            facts: vec![],
            narrative: "n".into(),
            concepts: vec![],
            files_read: vec![],
            files_modified: vec![],
            importance: 3,
        };
        let obs = observations.create(&s.id, &draft, "Read", "x").await.unwrap();
        (EntityRepository::new(db.pool().clone()), obs.id)
    }

    #[tokio::test]
    async fn upsert_increments_mention_count() {
        let repo = repo().await;
        let e1 = repo.upsert_entity("tokio", EntityType::Library).await.unwrap();
        assert_eq!(e1.mention_count, 1);
        let e2 = repo.upsert_entity("tokio", EntityType::Library).await.unwrap();
        assert_eq!(e2.id, e1.id);
        assert_eq!(e2.mention_count, 2);
    }

    #[tokio::test]
    async fn distinct_types_are_distinct_entities() {
        let repo = repo().await;
        let a = repo.upsert_entity("auth", EntityType::Concept).await.unwrap();
        let b = repo.upsert_entity("auth", EntityType::Project).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn traversal_terminates_on_a_cycle_at_max_depth() {
        let (repo, obs_id) = repo_with_observation().await;
        let a = repo.upsert_entity("A", EntityType::Concept).await.unwrap();
        let b = repo.upsert_entity("B", EntityType::Concept).await.unwrap();
        repo.create_relation(&a.id, &b.id, RelationshipType::RelatedTo, &obs_id).await.unwrap();
        repo.create_relation(&b.id, &a.id, RelationshipType::RelatedTo, &obs_id).await.unwrap();

        let visited = repo.traverse_relations(&a.id, 2).await.unwrap();
        assert_eq!(visited.len(), 2);
        assert!(visited.contains(&a.id));
        assert!(visited.contains(&b.id));
    }

    #[tokio::test]
    async fn relation_creation_is_idempotent() {
        let (repo, obs_id) = repo_with_observation().await;
        let a = repo.upsert_entity("A", EntityType::Concept).await.unwrap();
        let b = repo.upsert_entity("B", EntityType::Concept).await.unwrap();
        repo.create_relation(&a.id, &b.id, RelationshipType::Uses, &obs_id).await.unwrap();
        repo.create_relation(&a.id, &b.id, RelationshipType::Uses, &obs_id).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entity_relations")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
