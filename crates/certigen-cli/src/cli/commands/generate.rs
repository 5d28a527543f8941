use anyhow::Context;
use certigen::{CertificateService, EventId, TemplateRenderer};
use std::sync::Arc;

use super::open_store;
use crate::cli::config::AppConfig;

pub fn run(config: &AppConfig, event_id: i64) -> anyhow::Result<()> {
    let renderer = TemplateRenderer::from_path(&config.template)
        .with_context(|| format!("cannot load template {}", config.template.display()))?;
    let service = CertificateService::from_secrets(
        open_store(config)?,
        Arc::new(renderer),
        &config.keys,
        config.pipeline.clone(),
    )?;

    let event_id = EventId::new(event_id);
    let summary = service.generate_pending(event_id)?;
    if summary.claimed == 0 {
        println!("Nothing to do: every certificate of event {event_id} is already generated");
        return Ok(());
    }

    println!(
        "Generated {} of {} certificates into {}",
        summary.completed,
        summary.claimed,
        config.pipeline.event_dir(event_id).display()
    );
    if summary.skipped() > 0 {
        println!(
            "Skipped {} (decrypt: {}, render: {}, store: {}); run again to retry",
            summary.skipped(),
            summary.crypto_failures,
            summary.render_failures,
            summary.store_failures
        );
    }
    Ok(())
}
