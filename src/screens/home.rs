use eframe::egui;
use tracing::{error, info};

use crate::models::Domain;
use crate::services::config_loader::MrojConfig;
use crate::services::selection_store::{Selection, SelectionStore};

fn describe(selection: Selection) -> String {
    match selection {
        Selection::Selected(id) => format!("#{id}"),
        Selection::Cleared => "none (list view)".to_string(),
        Selection::NeverSet => "none".to_string(),
    }
}

pub fn ui(ui: &mut egui::Ui, store: &mut SelectionStore, config: &MrojConfig) {
    ui.vertical_centered(|ui| {
        ui.add_space(24.0);
        ui.heading("MROJ");
        ui.label("Online judge client");
    });
    ui.add_space(16.0);

    egui::Grid::new("home_summary")
        .num_columns(2)
        .spacing([16.0, 6.0])
        .show(ui, |ui| {
            ui.label("Server");
            ui.monospace(&config.server.base_url);
            ui.end_row();

            ui.label("State file");
            ui.monospace(config.storage.state_file.display().to_string());
            ui.end_row();

            ui.label("Selected contest");
            ui.label(describe(store.selection(Domain::Contest)));
            ui.end_row();

            ui.label("Selected job");
            ui.label(describe(store.selection(Domain::Job)));
            ui.end_row();
        });

    ui.add_space(12.0);
    if ui.button("Forget selections").clicked() {
        info!("Forgetting stored selections");
        for domain in [Domain::Contest, Domain::Job] {
            if let Err(err) = store.clear(domain) {
                error!("Failed to clear {} selection: {}", domain, err);
            }
        }
    }
}
