pub mod contest;
pub mod home;
pub mod status;
pub mod submit;

use eframe::egui;
use tracing::{error, info};

use crate::models::{Domain, Identifier};
use crate::services::selection_store::SelectionStore;

/// Records a navigation in the selection store. The next frame routes from it.
pub fn select(store: &mut SelectionStore, domain: Domain, id: Option<Identifier>) {
    match &id {
        Some(id) => info!("Selecting {} {}", domain, id),
        None => info!("Back to {} list", domain),
    }
    if let Err(err) = store.set(domain, id) {
        error!("Failed to persist {} selection: {}", domain, err);
    }
}

/// Integer coercion for id fields typed by hand.
pub fn coerce_id(label: &str, text: &str) -> Result<Identifier, String> {
    text.trim()
        .parse::<u32>()
        .map(Identifier::from)
        .map_err(|_| format!("{label} must be a non-negative integer"))
}

/// Like `coerce_id`, but blank means "not set".
pub fn coerce_optional_id(label: &str, text: &str) -> Result<Option<Identifier>, String> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    coerce_id(label, text).map(Some)
}

pub fn fetch_status_line(ui: &mut egui::Ui, pending: bool, error: Option<&str>) {
    if pending {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading...");
        });
    }
    if let Some(error) = error {
        ui.colored_label(egui::Color32::LIGHT_RED, error);
    }
}

pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_id_parses_trimmed_integers() {
        assert_eq!(coerce_id("User id", " 12 "), Ok(Identifier::from(12)));
        assert_eq!(
            coerce_id("User id", "abc"),
            Err("User id must be a non-negative integer".to_string())
        );
        assert!(coerce_id("User id", "-1").is_err());
    }

    #[test]
    fn blank_optional_id_is_none() {
        assert_eq!(coerce_optional_id("Contest id", "  "), Ok(None));
        assert_eq!(
            coerce_optional_id("Contest id", "3"),
            Ok(Some(Identifier::from(3)))
        );
    }

    #[test]
    fn scores_drop_trailing_zeros() {
        assert_eq!(format_score(100.0), "100");
        assert_eq!(format_score(87.5), "87.50");
    }
}
