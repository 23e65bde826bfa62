//! Import of the static alert feed.

use std::path::Path;

use crate::error::Result;
use crate::models::{AlertDefinition, CriterionId};
use crate::services::TrackingCommands;

/// Outcome of a feed import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedImport {
    /// Ids of the criteria created or refreshed, in feed order
    pub registered: Vec<CriterionId>,
    pub skipped: usize,
}

/// Register every valid definition through the tracking commands.
///
/// Definitions with no city or an invalid filter token are skipped.
pub async fn register_alerts(
    commands: &TrackingCommands,
    definitions: &[AlertDefinition],
) -> Result<FeedImport> {
    let mut outcome = FeedImport::default();

    for (index, definition) in definitions.iter().enumerate() {
        let draft = match definition.to_draft() {
            Ok(draft) => draft,
            Err(e) => {
                log::warn!("Skipping alert #{} ({:?}): {}", index, definition.name, e);
                outcome.skipped += 1;
                continue;
            }
        };

        match commands.add_or_update_criterion(draft).await {
            Ok(saved) => outcome.registered.push(saved.id),
            Err(e) if !e.is_fatal() => {
                log::warn!("Skipping alert #{} ({:?}): {}", index, definition.name, e);
                outcome.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}

/// Read the feed file and register its definitions.
pub async fn import_alert_feed(commands: &TrackingCommands, path: &Path) -> Result<FeedImport> {
    let definitions = AlertDefinition::load_all(path)?;
    let outcome = register_alerts(commands, &definitions).await?;
    log::info!(
        "Imported {} alerts from {} ({} skipped)",
        outcome.registered.len(),
        path.display(),
        outcome.skipped
    );
    Ok(outcome)
}
