//! Reference enrichment: attach `_references` metadata to fetched records so
//! FK values can be re-bound on a different instance.
//!
//! For each external FK the referenced record is fetched from the source and
//! the first non-null lookup field (per the lookup policy) is captured. Self
//! FKs get an `_original_id` entry; they resolve through the session id map
//! on import and the entry is only a fallback. Referent fetch failures are
//! skipped silently; the import side reports them as missing.

use std::collections::HashMap;

use ferry_client::{Credential, RestClient};
use ferry_core::fields::{classify, FieldClass};
use ferry_core::lookup::{self, LookupConfig};
use ferry_core::record::Record;
use ferry_core::refs::{attach_references, RefEntry};
use futures::stream::{self, StreamExt};

/// Cache of referent fetches within one export request, keyed by
/// `(resource_type, id)`.
type ReferentCache = HashMap<(String, String), Option<Record>>;

pub struct Enricher<'a> {
    client: &'a RestClient,
    credential: &'a Credential,
    /// Base URL referent fetches are issued against.
    base_url: &'a str,
    /// The exported collection itself; self FKs reference it.
    resource_type: &'a str,
    lookup: Option<&'a LookupConfig>,
    fan_out: usize,
    cache: ReferentCache,
}

impl<'a> Enricher<'a> {
    pub fn new(
        client: &'a RestClient,
        credential: &'a Credential,
        base_url: &'a str,
        resource_type: &'a str,
        lookup: Option<&'a LookupConfig>,
        fan_out: usize,
    ) -> Self {
        Self {
            client,
            credential,
            base_url,
            resource_type,
            lookup,
            fan_out: fan_out.max(1),
            cache: ReferentCache::new(),
        }
    }

    /// Enrich every record in place.
    pub async fn enrich(&mut self, records: &mut [Record]) {
        for record in records.iter_mut() {
            self.enrich_record(record).await;
        }
    }

    async fn enrich_record(&mut self, record: &mut Record) {
        // Classify up front; the fetches below must not observe a record
        // that already has `_references` half-attached.
        let fk_fields: Vec<(String, FieldClass, String)> = record
            .iter()
            .filter_map(|(name, value)| {
                let class = classify(name, value);
                if class == FieldClass::Scalar {
                    return None;
                }
                let fk_value = value.as_str().filter(|s| !s.is_empty())?.to_string();
                Some((name.clone(), class, fk_value))
            })
            .collect();

        if fk_fields.is_empty() {
            return;
        }

        self.fetch_referents(&fk_fields).await;

        let mut entries: Vec<(String, RefEntry)> = Vec::new();
        for (field, class, fk_value) in fk_fields {
            match class {
                FieldClass::SelfFk => {
                    entries.push((field, RefEntry::self_reference(self.resource_type, &fk_value)));
                }
                FieldClass::ExternalFk { resource_type } => {
                    let key = (resource_type.clone(), fk_value.clone());
                    let Some(Some(referent)) = self.cache.get(&key) else {
                        // Not found or fetch failed; export the record
                        // without enrichment for this field.
                        tracing::debug!(
                            field = %field,
                            resource_type = %resource_type,
                            "Referent not available; skipping enrichment"
                        );
                        continue;
                    };

                    let lookup_fields = lookup::lookup_fields_for(&resource_type, self.lookup);
                    let Some((lookup_field, lookup_value)) =
                        lookup::select_lookup(referent, &lookup_fields)
                    else {
                        tracing::debug!(
                            field = %field,
                            resource_type = %resource_type,
                            "Referent has no usable lookup field; skipping enrichment"
                        );
                        continue;
                    };

                    entries.push((
                        field,
                        RefEntry {
                            resource_type,
                            original_id: fk_value,
                            lookup_field: lookup_field.to_string(),
                            lookup_value: lookup_value.clone(),
                        },
                    ));
                }
                FieldClass::Scalar => unreachable!("scalars are filtered out above"),
            }
        }

        attach_references(record, entries);
    }

    /// Fetch all referents one record needs that are not cached yet, with
    /// bounded concurrency, joining before the record is considered done.
    async fn fetch_referents(&mut self, fk_fields: &[(String, FieldClass, String)]) {
        let mut jobs: Vec<(String, String)> = Vec::new();
        for (_, class, fk_value) in fk_fields {
            let FieldClass::ExternalFk { resource_type } = class else {
                continue;
            };
            let key = (resource_type.clone(), fk_value.clone());
            if !self.cache.contains_key(&key) && !jobs.contains(&key) {
                jobs.push(key);
            }
        }

        let client = self.client;
        let credential = self.credential;
        let base_url = self.base_url;

        let fetched: Vec<((String, String), Option<Record>)> = stream::iter(jobs)
            .map(|(resource_type, id)| async move {
                let result = client
                    .fetch(base_url, &resource_type, &id, credential)
                    .await;
                let referent = match result {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::debug!(
                            resource_type = %resource_type,
                            id = %id,
                            error = %err,
                            "Referent fetch failed"
                        );
                        None
                    }
                };
                ((resource_type, id), referent)
            })
            .buffer_unordered(self.fan_out)
            .collect()
            .await;

        self.cache.extend(fetched);
    }
}
