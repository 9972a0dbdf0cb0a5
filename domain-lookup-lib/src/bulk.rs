//! Bulk resolution with bounded concurrency.
//!
//! Domains are split into sequential batches of `max_concurrent`. All
//! lookups inside a batch run as separate tasks and the batch is fully
//! settled before the next one starts, which bounds open connections and
//! keeps results in input order.

use crate::error::LookupError;
use crate::extractor::TldExtractor;
use crate::resolver::DomainLookup;
use crate::types::{BulkOptions, BulkResult, LookupConfig};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs many lookups and reports one [`BulkResult`] per input domain.
#[derive(Clone)]
pub struct BulkProcessor {
    extractor: TldExtractor,
    lookup: Arc<dyn DomainLookup>,
    config: LookupConfig,
}

impl BulkProcessor {
    pub fn new(extractor: TldExtractor, lookup: Arc<dyn DomainLookup>, config: &LookupConfig) -> Self {
        Self {
            extractor,
            lookup,
            config: config.clone(),
        }
    }

    /// Resolve every domain in `domains`.
    ///
    /// # Errors
    ///
    /// `LookupError::InvalidInput` when `domains` is empty or longer than the
    /// configured maximum (100 by default). Per-domain failures never fail
    /// the call; they become `success: false` results.
    pub async fn process_bulk(
        &self,
        domains: &[String],
        options: BulkOptions,
    ) -> Result<Vec<BulkResult>, LookupError> {
        if domains.is_empty() {
            return Err(LookupError::invalid_input("Domains array must not be empty"));
        }
        if domains.len() > self.config.max_bulk_domains {
            return Err(LookupError::invalid_input(format!(
                "Maximum {} domains allowed per request",
                self.config.max_bulk_domains
            )));
        }

        let max_concurrent = self.config.clamp_concurrency(options.max_concurrent);
        let skip_availability_check = options.skip_availability_check;

        info!(
            domain_count = domains.len(),
            max_concurrent,
            skip_availability_check,
            "Starting bulk WHOIS processing"
        );

        let mut results = Vec::with_capacity(domains.len());

        for (batch_index, batch) in domains.chunks(max_concurrent).enumerate() {
            debug!(
                batch_index = batch_index + 1,
                batch_size = batch.len(),
                domains_in_batch = ?batch,
                "Processing batch"
            );

            let tasks = batch.iter().enumerate().map(|(offset, domain)| {
                let extractor = self.extractor.clone();
                let lookup = Arc::clone(&self.lookup);
                let domain = domain.clone();
                let index = batch_index * max_concurrent + offset;
                tokio::spawn(async move {
                    process_single_domain(
                        &extractor,
                        lookup.as_ref(),
                        &domain,
                        skip_availability_check,
                        index,
                    )
                    .await
                })
            });

            for (domain, settled) in batch.iter().zip(join_all(tasks).await) {
                match settled {
                    Ok(result) => results.push(result),
                    Err(join_error) => {
                        let message = if join_error.is_panic() {
                            "Domain task panicked".to_string()
                        } else {
                            "Domain task was cancelled".to_string()
                        };
                        error!(domain = %domain, error = %join_error, "Batch processing task failed");
                        results.push(BulkResult::failed(domain.clone(), None, message, 0));
                    }
                }
            }
        }

        info!(
            total = results.len(),
            successful = results.iter().filter(|r| r.success).count(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Bulk WHOIS processing completed"
        );

        Ok(results)
    }
}

async fn process_single_domain(
    extractor: &TldExtractor,
    lookup: &dyn DomainLookup,
    domain: &str,
    skip_availability_check: bool,
    index: usize,
) -> BulkResult {
    let started = Instant::now();
    let elapsed_ms = || started.elapsed().as_millis() as u64;

    let extraction = extractor.extract_domain_info(domain).await;
    let tld = (!extraction.tld.is_empty()).then(|| extraction.tld.clone());

    if !extraction.is_valid {
        return BulkResult::failed(domain, tld, "Invalid domain format", elapsed_ms());
    }

    match lookup.get_whois_data(domain, skip_availability_check).await {
        Ok(None) => BulkResult {
            domain: domain.to_string(),
            success: true,
            tld,
            available: Some(true),
            cache_hit: Some(false),
            record: None,
            error: None,
            processing_time_ms: elapsed_ms(),
        },
        Ok(Some(found)) => BulkResult {
            domain: domain.to_string(),
            success: true,
            tld,
            available: Some(false),
            cache_hit: Some(found.is_cached),
            record: Some(found.without_raw()),
            error: None,
            processing_time_ms: elapsed_ms(),
        },
        Err(e) => {
            let processing_time_ms = elapsed_ms();
            warn!(domain, index, error = %e, processing_time_ms, "Domain processing failed");
            BulkResult::failed(domain, None, e.to_string(), processing_time_ms)
        }
    }
}
