//! CLI command implementations.
//!
//! Each command loads the repository from the snapshot document, works
//! on it, and writes the snapshot back when it mutated anything.

use colored::Colorize;
use dossier_core::{
    normalize, summary as core_summary, Actor, DetailValue, Details, EntityId, RelationTarget,
    Repository, DETAIL_REASON, REASON_MANUAL,
};
use dossier_graph::{
    cluster as cluster_repo, collect_statistics, find_bridges, strategy_for, RelationGraph,
};
use dossier_ingest::{ingest_document, link_across_documents, link_within_document};
use dossier_store::{load_snapshot, save_snapshot};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Loads the snapshot, or starts empty when none exists yet.
fn load_or_new(data: &Path) -> Result<Repository> {
    if data.exists() {
        Ok(load_snapshot(data)?)
    } else {
        Ok(Repository::new())
    }
}

/// Loads the snapshot; query commands need one to exist.
fn load_required(data: &Path) -> Result<Repository> {
    if !data.exists() {
        return Err(format!(
            "no snapshot at {}; run `dossier ingest` first",
            data.display()
        )
        .into());
    }
    Ok(load_snapshot(data)?)
}

/// Resolves a user-supplied name to one entity, warning on ambiguity.
fn resolve(repo: &Repository, raw_name: &str) -> Result<EntityId> {
    let canonical = normalize(raw_name);
    let found = repo.find_by_name(&canonical);
    match found.as_slice() {
        [] => Err(dossier_core::RepositoryError::NameNotFound(canonical).into()),
        [single] => Ok(*single),
        [first, ..] => {
            println!(
                "{} {} people share the name '{}'; using the first",
                "⚠".yellow(),
                found.len(),
                canonical
            );
            Ok(*first)
        }
    }
}

fn label(repo: &Repository, id: EntityId) -> String {
    repo.get(id)
        .map(|e| e.label())
        .unwrap_or_else(|| id.to_string())
}

/// Ingest every .txt file in a folder, linking within each document and
/// across the whole batch afterwards.
pub fn ingest(folder: &Path, data: &Path) -> Result<()> {
    let mut files: Vec<_> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|e| e == "txt").unwrap_or(false))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(format!("no .txt files in {}", folder.display()).into());
    }

    let mut repo = load_or_new(data)?;

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::default_bar().template("{bar:30.cyan} {pos}/{len} {msg}")?);

    let mut records = 0;
    let mut skipped = 0;
    let mut links = 0;
    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_message(name.clone());

        let text = fs::read_to_string(file)?;
        let report = ingest_document(&mut repo, &text, &name);
        tracing::debug!(
            file = %report.source_file,
            records = report.records,
            skipped = report.skipped,
            "document ingested"
        );
        links += link_within_document(&mut repo, &report.entities)?;
        records += report.records;
        skipped += report.skipped;
        bar.inc(1);
    }
    bar.finish_and_clear();

    // the cross-document pass needs the whole batch in place
    let possible = link_across_documents(&mut repo)?;

    save_snapshot(&repo, data)?;

    println!(
        "{} Ingested {} files: {} records, {} people total",
        "✓".green(),
        files.len().to_string().cyan(),
        records.to_string().cyan(),
        repo.len().to_string().cyan()
    );
    println!(
        "  {} document links, {} possible cross-document matches",
        links, possible
    );
    if skipped > 0 {
        println!("  {} records without a resolvable name skipped", skipped);
    }
    Ok(())
}

/// Run the pairwise heuristic over all unrelated entity pairs.
pub fn detect(data: &Path) -> Result<()> {
    let mut repo = load_required(data)?;
    tracing::debug!(people = repo.len(), "running pairwise detection");
    let added = dossier_ingest::detect_relations(&mut repo)?;
    save_snapshot(&repo, data)?;
    println!("{} Detected {} new relations", "✓".green(), added);
    Ok(())
}

pub fn path(from: &str, to: &str, data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    let a = resolve(&repo, from)?;
    let b = resolve(&repo, to)?;

    let graph = RelationGraph::build(&repo);
    match graph.shortest_path(a, b) {
        Ok(path) => {
            println!("Path of {} people:", path.len());
            for (i, id) in path.iter().enumerate() {
                let arrow = if i == 0 { "" } else { " → " };
                print!("{}{}", arrow, label(&repo, *id).cyan());
            }
            println!();
            Ok(())
        }
        Err(dossier_graph::GraphError::NoPath) => {
            println!("{} No path between them", "⚠".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn neighborhood(from: &str, to: &str, max_hops: usize, data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    let a = resolve(&repo, from)?;
    let b = resolve(&repo, to)?;

    let graph = RelationGraph::build(&repo);
    let hood = graph.neighborhood(a, b, max_hops)?;
    if hood.is_empty() {
        println!("{} No connections within {} hops", "⚠".yellow(), max_hops);
        return Ok(());
    }
    println!("{} people within {} hops:", hood.len(), max_hops);
    for id in hood {
        println!("  {}", label(&repo, id));
    }
    Ok(())
}

pub fn cluster(data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    let labels = cluster_repo(&repo);

    let groups = labels.values().copied().max().map(|m| m + 1).unwrap_or(0);
    println!("{} {} people in {} groups", "✓".green(), labels.len(), groups);

    for group in 0..groups {
        let members: Vec<String> = repo
            .sorted_ids()
            .into_iter()
            .filter(|id| labels.get(id) == Some(&group))
            .map(|id| label(&repo, id))
            .collect();
        if members.is_empty() {
            continue;
        }
        println!("\n{}", format!("Group {}:", group).cyan());
        for member in members {
            println!("  {}", member);
        }
    }

    let bridges = find_bridges(&repo, &labels);
    if !bridges.is_empty() {
        println!("\n{}", "Bridges between groups:".yellow());
        for id in bridges {
            println!("  {}", label(&repo, id));
        }
    }
    Ok(())
}

pub fn stats(data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    let stats = collect_statistics(&repo);

    println!("People:    {}", stats.people.to_string().cyan());
    println!(
        "Phones:    {} (avg {:.1})",
        stats.phones.to_string().cyan(),
        stats.avg_phones
    );
    println!(
        "Emails:    {} (avg {:.1})",
        stats.emails.to_string().cyan(),
        stats.avg_emails
    );
    println!(
        "Relations: {} (avg {:.1})",
        stats.relations.to_string().cyan(),
        stats.avg_relations
    );

    if !stats.central.is_empty() {
        println!("\nMost connected:");
        for (i, (id, count)) in stats.central.iter().enumerate() {
            println!("  {}. {} — {} relations", i + 1, label(&repo, *id), count);
        }
    }
    if !stats.shared_phones.is_empty() {
        println!("\nShared phones:");
        for (phone, owners) in stats.shared_phones.iter().take(5) {
            let names: Vec<String> = owners.iter().map(|id| label(&repo, *id)).collect();
            println!("  {}: {}", phone, names.join(", "));
        }
    }
    Ok(())
}

pub fn list(data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    for id in repo.sorted_ids() {
        if let Some(entity) = repo.get(id) {
            println!(
                "{} — {} relations, sources: {}",
                entity.label().cyan(),
                entity.relations.len(),
                entity
                    .source_files
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    Ok(())
}

/// Merge the named people into the richest of them.
pub fn merge(names: &[String], data: &Path) -> Result<()> {
    let mut repo = load_required(data)?;

    let mut ids = Vec::new();
    for name in names {
        let id = resolve(&repo, name)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.len() < 2 {
        return Err("need at least two distinct people to merge".into());
    }

    // the richest entity survives
    ids.sort_by_key(|id| {
        std::cmp::Reverse(repo.get(*id).map(|e| e.richness()).unwrap_or(0))
    });
    let primary = ids[0];
    let primary_label = label(&repo, primary);

    let mut merged = 0;
    for &secondary in &ids[1..] {
        repo.merge(primary, secondary)?;
        merged += 1;
    }
    save_snapshot(&repo, data)?;

    println!("{} Merged {} people into {}", "✓".green(), merged, primary_label.cyan());
    Ok(())
}

/// Add a user relation through the ledger. When the two people share no
/// document, the reason records the manual edit.
pub fn link(from: &str, to: &str, kind: &str, data: &Path) -> Result<()> {
    let mut repo = load_required(data)?;
    let a = resolve(&repo, from)?;
    let b = resolve(&repo, to)?;

    let shared_document = match (repo.get(a), repo.get(b)) {
        (Some(x), Some(y)) => x.source_files.intersection(&y.source_files).next().is_some(),
        _ => false,
    };
    let mut details = Details::new();
    if !shared_document {
        details.insert(
            DETAIL_REASON.to_string(),
            DetailValue::Text(REASON_MANUAL.to_string()),
        );
    }

    let added = repo.add_relation(a, kind, RelationTarget::Resolved(b), details, Actor::User)?;
    save_snapshot(&repo, data)?;

    if added {
        println!("{} Linked {} — {} ({})", "✓".green(), from, to, kind);
    } else {
        println!("{} Relation already exists", "⚠".yellow());
    }
    Ok(())
}

pub fn unlink(from: &str, to: &str, kind: &str, data: &Path) -> Result<()> {
    let mut repo = load_required(data)?;
    let a = resolve(&repo, from)?;
    let b = resolve(&repo, to)?;

    let removed = repo.remove_relation(a, kind, &RelationTarget::Resolved(b), Actor::User)?;
    save_snapshot(&repo, data)?;

    if removed {
        println!("{} Removed {} relation", "✓".green(), kind);
    } else {
        println!("{} No such relation", "⚠".yellow());
    }
    Ok(())
}

pub fn delete(name: &str, data: &Path) -> Result<()> {
    let mut repo = load_required(data)?;
    let id = resolve(&repo, name)?;
    let entity = repo.delete(id)?;
    save_snapshot(&repo, data)?;
    println!("{} Deleted {}", "✓".green(), entity.label().cyan());
    Ok(())
}

pub fn summary(name: &str, data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    let id = resolve(&repo, name)?;
    match core_summary::person_summary(&repo, id) {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => Err(format!("no entity named '{}'", name).into()),
    }
}

/// Export the render document: nodes with cluster labels, edges with
/// kinds, and layout positions from the chosen strategy.
pub fn export(output: &Path, layout: &str, data: &Path) -> Result<()> {
    let repo = load_required(data)?;
    let graph = RelationGraph::build(&repo);
    let labels = cluster_repo(&repo);
    let positions = strategy_for(layout).positions(&graph);

    let nodes: Vec<_> = graph
        .nodes()
        .map(|id| {
            let (x, y) = positions.get(&id).copied().unwrap_or((0.5, 0.5));
            serde_json::json!({
                "id": id,
                "name": repo.get(id).map(|e| e.full_name.clone()).unwrap_or_default(),
                "cluster": labels.get(&id),
                "x": x,
                "y": y,
            })
        })
        .collect();

    let export = serde_json::json!({
        "version": "1.0",
        "stats": {
            "nodeCount": graph.node_count(),
            "edgeCount": graph.edge_count()
        },
        "nodes": nodes,
        "edges": graph.export_edges(),
    });

    fs::write(output, serde_json::to_string_pretty(&export)?)?;
    println!("{} Exported to {}", "✓".green(), output.display());
    Ok(())
}
