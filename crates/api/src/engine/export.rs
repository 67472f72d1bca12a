//! The export pipeline: fetch the source collection, enrich, shape, encode.

use chrono::Utc;
use ferry_client::{url, Credential};
use ferry_core::codec::{self, Dialect, ExportMeta, Format};
use ferry_core::lookup::LookupConfig;
use ferry_core::record::preserve_original_id;
use ferry_core::{fields, tree};

use crate::engine::enrich::Enricher;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Source collection endpoint.
    pub url: String,
    pub format: Format,
    /// Attach `_references` metadata (document format only).
    pub enrich: bool,
    /// Nest parent/child data (document format only; the diagram codec is
    /// always hierarchical and the tabular codec is always flat).
    pub tree: bool,
    pub dialect: Dialect,
    pub lookup: Option<LookupConfig>,
}

pub struct ExportOutput {
    pub body: String,
    pub media_type: &'static str,
    pub filename: String,
}

pub async fn run(
    state: &AppState,
    credential: &Credential,
    opts: ExportOptions,
) -> AppResult<ExportOutput> {
    let mut records = state.client.list(&opts.url, credential).await?;
    tracing::info!(url = %opts.url, count = records.len(), "Fetched source records");

    for record in records.iter_mut() {
        preserve_original_id(record);
    }

    let base_url = url::base_of(&opts.url);
    let resource_type = url::resource_of(&opts.url);

    if opts.enrich && opts.format == Format::Json {
        let mut enricher = Enricher::new(
            &state.client,
            credential,
            &base_url,
            &resource_type,
            opts.lookup.as_ref(),
            state.config.lookup_fan_out,
        );
        enricher.enrich(&mut records).await;
        tracing::info!(count = records.len(), "Enriched records with reference metadata");
    }

    if opts.tree && opts.format == Format::Json {
        if let Some(parent_field) = fields::detect_parent_field(&records) {
            match tree::nest(&records, parent_field) {
                Some(forest) => {
                    tracing::info!(parent_field, roots = forest.len(), "Nested records");
                    records = forest;
                }
                None => {
                    tracing::warn!("Parent references are circular; keeping flat shape");
                }
            }
        }
    }

    let meta = ExportMeta {
        resource_type: resource_type.clone(),
        service_url: opts.url.clone(),
        exported_at: Utc::now(),
        dialect: opts.dialect,
        lookup: opts.lookup.clone(),
    };
    let body = codec::encode(opts.format, &records, &meta)?;

    Ok(ExportOutput {
        body,
        media_type: opts.format.media_type(),
        filename: format!("{resource_type}_export.{}", opts.format.extension()),
    })
}
