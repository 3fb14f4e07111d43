//! In-memory model of the registry graph, answering the statements the graph
//! backend sends with the results Neo4j's MERGE/MATCH semantics would give.
//!
//! Only the statement shapes the backend emits are understood; anything else
//! gets an empty result.

#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::{json, Map, Value};

/// One `(:label {canonical})-[:KNOWS {id}]->(:source {name})` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub label: String,
    pub canonical: String,
    pub source: String,
    pub source_id: String,
    created_by: Option<String>,
}

#[derive(Default)]
pub struct MergeModel {
    edges: Mutex<Vec<Edge>>,
}

fn param(params: &Map<String, Value>, name: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Label of the first `(o:`, `(x:` or `(c:` pattern in `text`.
fn label_of(text: &str) -> String {
    let start = ["(o:", "(x:", "(c:"]
        .iter()
        .filter_map(|p| text.find(p).map(|i| i + p.len()))
        .min()
        .unwrap_or(text.len());
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> Value {
    let data: Vec<Value> = rows.into_iter().map(|row| json!({ "row": row })).collect();
    json!({ "columns": columns, "data": data })
}

impl MergeModel {
    pub fn edges(&self) -> Vec<Edge> {
        self.edges.lock().unwrap().clone()
    }

    /// Answer one statement, or an error message for statements marked `BROKEN`.
    pub fn answer(&self, text: &str, params: &Map<String, Value>) -> Result<Value, String> {
        if text.contains("BROKEN") {
            return Err("Invalid input 'BROKEN'".into());
        }
        if text == "RETURN 1" {
            return Ok(result(&["1"], vec![vec![json!(1)]]));
        }

        let label = label_of(text);
        let source = param(params, "source");
        let source_id = param(params, "source_id");
        let canonical = param(params, "canonical");
        let mut edges = self.edges.lock().unwrap();
        let same_pair =
            |e: &Edge| e.label == label && e.source == source && e.source_id == source_id;

        if text.contains("ON CREATE SET") {
            let nonce = param(params, "nonce");
            if let Some(existing) = edges.iter().find(|e| same_pair(*e)) {
                let created = existing.created_by.as_deref() == Some(nonce.as_str());
                return Ok(result(
                    &["o.canonical", "created"],
                    vec![vec![json!(existing.canonical), json!(created)]],
                ));
            }
            edges.push(Edge {
                label: label.clone(),
                canonical: canonical.clone(),
                source: source.clone(),
                source_id: source_id.clone(),
                created_by: Some(nonce),
            });
            return Ok(result(
                &["o.canonical", "created"],
                vec![vec![json!(canonical), json!(true)]],
            ));
        }

        if text.contains("FOREACH") {
            let holder = edges
                .iter()
                .find(|e| same_pair(*e) && e.canonical != canonical)
                .map(|e| e.canonical.clone());
            let linked = edges.iter().any(|e| same_pair(e) && e.canonical == canonical);
            if holder.is_none() && !linked {
                edges.push(Edge {
                    label: label.clone(),
                    canonical: canonical.clone(),
                    source: source.clone(),
                    source_id: source_id.clone(),
                    created_by: None,
                });
            }
            return Ok(result(&["holder"], vec![vec![json!(holder)]]));
        }

        if text.starts_with("MATCH (o:") && text.contains("RETURN o.canonical") {
            let rows = edges
                .iter()
                .filter(|e| same_pair(*e))
                .map(|e| vec![json!(e.canonical)])
                .collect();
            return Ok(result(&["o.canonical"], rows));
        }

        if text.starts_with("MATCH (c:") {
            let rows = edges
                .iter()
                .filter(|e| e.label == label && e.canonical == canonical)
                .map(|e| vec![json!(e.canonical), json!(e.source), json!(e.source_id)])
                .collect();
            return Ok(result(&["c.canonical", "s.name", "i.id"], rows));
        }

        if text.contains("DETACH DELETE") {
            edges.retain(|e| e.label != label);
        }
        Ok(result(&[], vec![]))
    }
}
