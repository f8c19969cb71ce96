// crates/search/src/entity_augment.rs
//! Entity-graph augmentation: tokenize the query, match entities by name,
//! BFS the relation graph, and surface their linked observations as
//! rank-0 "project"-sourced results.

use agent_memory_db::{EntityRepository, ObservationRepository};
use std::collections::HashSet;

use crate::types::{ResultSource, SearchResultItem};

const MAX_AUGMENT_DEPTH: u32 = 2;

/// Single words plus adjacent bigrams, lowercased.
pub fn tokenize_for_entities(query: &str) -> Vec<String> {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    let mut tokens = words.clone();
    for window in words.windows(2) {
        tokens.push(format!("{} {}", window[0], window[1]));
    }
    tokens
}

/// Append entity-graph-derived results (rank 0, source project) to
/// `existing` up to `limit`, skipping superseded observations and ids
/// already present.
pub async fn augment_with_entity_graph(
    entities: &EntityRepository,
    observations: &ObservationRepository,
    query: &str,
    existing: &mut Vec<SearchResultItem>,
    limit: usize,
) -> agent_memory_db::DbResult<()> {
    let trimmed = query.trim();
    if trimmed.is_empty() || existing.len() >= limit {
        return Ok(());
    }

    let mut seen_entity_ids: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    for token in tokenize_for_entities(trimmed) {
        let matches = entities.search_by_name(&token).await?;
        for entity in matches {
            if !seen_entity_ids.insert(entity.id.clone()) {
                continue;
            }
            let reached = entities.traverse_relations(&entity.id, MAX_AUGMENT_DEPTH).await?;
            visited.extend(reached);
        }
    }
    if visited.is_empty() {
        return Ok(());
    }

    let already_present: HashSet<String> = existing.iter().map(|r| r.observation.id.clone()).collect();
    let linked_ids = entities
        .linked_observations(&visited.into_iter().collect::<Vec<_>>())
        .await?;

    for obs_id in linked_ids {
        if existing.len() >= limit {
            break;
        }
        if already_present.contains(&obs_id) {
            continue;
        }
        if let Some(observation) = observations.get_by_id(&obs_id).await? {
            if observation.is_superseded() {
                continue;
            }
            existing.push(SearchResultItem {
                snippet: observation.title.clone(),
                observation,
                rank: 0,
                source: ResultSource::Project,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_words_and_adjacent_bigrams() {
        let tokens = tokenize_for_entities("OAuth2 token refresh");
        assert!(tokens.contains(&"oauth2".to_string()));
        assert!(tokens.contains(&"token".to_string()));
        assert!(tokens.contains(&"oauth2 token".to_string()));
        assert!(tokens.contains(&"token refresh".to_string()));
    }

    #[test]
    fn empty_query_has_no_tokens() {
        assert!(tokenize_for_entities("").is_empty());
        assert!(tokenize_for_entities("   ").is_empty());
    }
}
