//! Basic usage example for the research-gap library.
//!
//! Runs the whole pipeline offline: a mock article source, a scripted
//! language model and an in-memory sink stand in for PMC, the chat API and
//! the document store.

use research_gap::llm::ScriptedModel;
use research_gap::models::Section;
use research_gap::pipeline::gap_analysis::GAP_SYSTEM_PROMPT;
use research_gap::pipeline::{Pipeline, PipelineSettings};
use research_gap::sources::mock::{make_document, make_metadata};
use research_gap::sources::MockSource;
use research_gap::storage::{Collection, MemorySink};
use std::sync::Arc;

const GAP_REPLY: &str = r#"```json
{
  "analysis": [
    {
      "article_title": "Fibre and the infant gut",
      "unique_gaps": ["Only breastfed infants were sampled"],
      "recommendations": ["Include formula-fed cohorts"],
      "gap_categories": {"population": ["No formula-fed infants"]}
    }
  ],
  "comparison_section": {
    "commonalities": ["Short follow-up"],
    "contrasts": [],
    "emerging_trends": ["Strain-level profiling"]
  }
}
```"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let source = Arc::new(MockSource::new());
    source.add_article(
        make_metadata("PMC1001", "Fibre and the infant gut", "2024 Mar 5"),
        Some(make_document(&[
            (Section::Abstract, "Dietary fibre changes the infant microbiome."),
            (Section::Methods, "Stool samples from 40 infants were sequenced."),
            (Section::Discussion, "Effects persisted for six months."),
        ])),
    );
    source.add_article(
        make_metadata("PMC1002", "Antibiotics in early life", "2023 Winter"),
        None,
    );

    let model = Arc::new(ScriptedModel::from_fn(|request, _| {
        if request.system == GAP_SYSTEM_PROMPT {
            Ok(GAP_REPLY.to_string())
        } else {
            Ok("A short summary of the section.".to_string())
        }
    }));
    let sink = Arc::new(MemorySink::new());

    let pipeline = Pipeline::new(source, model, sink.clone(), PipelineSettings::default());
    let report = pipeline.run("infant microbiome").await?;

    println!("Run {} finished in {} ms", report.run_id, report.duration_ms);
    println!(
        "Found {} ids, {} with full text, selected {}",
        report.ids_found,
        report.full_text_available,
        report.selected.len()
    );

    for article in &report.selected {
        println!(
            "  {} - {} (score {:.0}, {:.0}% of sections)",
            article.external_id,
            article.title,
            article.score,
            article.filled_sections_ratio * 100.0
        );
    }

    for collection in Collection::ALL {
        println!("{}: {} documents", collection, sink.documents(collection).len());
    }

    if let Some(comparison) = sink.documents(Collection::Comparison).first() {
        println!("\nComparison:\n{}", serde_json::to_string_pretty(comparison)?);
    }

    Ok(())
}
