use std::fs;
use std::path::Path;

use eframe::egui;
use rfd::FileDialog;
use tracing::{error, info, warn};

use crate::models::{Domain, Job, NewJob, Page};
use crate::screens::{coerce_id, select};
use crate::services::config_loader::MrojConfig;
use crate::services::fetcher::{
    FetchEvent, FetchRequest, Fetcher, SlotId, Ticket, log_dropped_event, take_action_result,
};
use crate::services::router::Generation;
use crate::services::selection_store::SelectionStore;

const SOURCE_EXTENSIONS: [&str; 7] = ["rs", "c", "cc", "cpp", "cxx", "py", "txt"];

/// Language guessed from a source file name, if the extension is known.
fn language_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "rs" => Some("Rust"),
        "c" => Some("C"),
        "cc" | "cpp" | "cxx" => Some("C++"),
        "py" => Some("Python"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct SubmitForm {
    user_id: String,
    contest_id: String,
    problem_id: String,
    language: String,
    source_code: String,
}

impl SubmitForm {
    fn from_config(config: &MrojConfig) -> Self {
        Self {
            user_id: config.submit.default_user_id.to_string(),
            contest_id: "0".to_string(),
            problem_id: "0".to_string(),
            language: config.submit.default_language.clone(),
            source_code: String::new(),
        }
    }

    fn to_new_job(&self) -> Result<NewJob, String> {
        let language = self.language.trim();
        if language.is_empty() {
            return Err("Language must not be empty".to_string());
        }
        if self.source_code.trim().is_empty() {
            return Err("Source code must not be empty".to_string());
        }
        Ok(NewJob {
            source_code: self.source_code.clone(),
            language: language.to_string(),
            user_id: coerce_id("User id", &self.user_id)?,
            contest_id: coerce_id("Contest id", &self.contest_id)?,
            problem_id: coerce_id("Problem id", &self.problem_id)?,
        })
    }
}

pub struct SubmitScreen {
    form: SubmitForm,
    generation: Generation,
    pending: bool,
    error: Option<String>,
}

impl SubmitScreen {
    pub fn new(config: &MrojConfig) -> Self {
        Self {
            form: SubmitForm::from_config(config),
            generation: Generation::default(),
            pending: false,
            error: None,
        }
    }

    /// On success the new job becomes the job selection and the caller gets
    /// the page to switch to.
    pub fn handle_event(&mut self, event: FetchEvent, store: &mut SelectionStore) -> Option<Page> {
        if event.ticket.slot != SlotId::JobSubmit || event.ticket.generation != self.generation {
            log_dropped_event(&event);
            return None;
        }
        self.pending = false;
        match take_action_result::<Job>("Submit", event.result) {
            Ok(job) => {
                info!("Submitted job {}", job.id);
                self.error = None;
                select(store, Domain::Job, Some(job.id));
                Some(Page::Status)
            }
            Err(message) => {
                self.error = Some(message);
                None
            }
        }
    }

    fn submit(&mut self, fetcher: &mut Fetcher) {
        match self.form.to_new_job() {
            Ok(job) => {
                self.error = None;
                self.pending = true;
                self.generation = self.generation.next();
                info!(
                    "Submitting {} solution for contest {} problem {}",
                    job.language, job.contest_id, job.problem_id
                );
                fetcher.submit(
                    Ticket {
                        slot: SlotId::JobSubmit,
                        generation: self.generation,
                    },
                    FetchRequest::CreateJob(job),
                );
            }
            Err(message) => {
                warn!("Rejected submission form: {}", message);
                self.error = Some(message);
            }
        }
    }

    fn load_file(&mut self) {
        let Some(path) = FileDialog::new()
            .set_directory(".")
            .add_filter("Source", &SOURCE_EXTENSIONS)
            .pick_file()
        else {
            return;
        };

        match fs::read_to_string(&path) {
            Ok(source) => {
                info!("Loaded source from {}", path.display());
                self.form.source_code = source;
                if let Some(language) = language_for_extension(&path) {
                    self.form.language = language.to_string();
                }
            }
            Err(err) => {
                error!("Failed to read {}: {}", path.display(), err);
                self.error = Some(format!("Failed to read {}: {}", path.display(), err));
            }
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, fetcher: &mut Fetcher) {
        ui.heading("Submit");
        ui.add_space(8.0);

        egui::Grid::new("submit_form")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                let form = &mut self.form;
                for (label, value) in [
                    ("User id", &mut form.user_id),
                    ("Contest id", &mut form.contest_id),
                    ("Problem id", &mut form.problem_id),
                    ("Language", &mut form.language),
                ] {
                    ui.label(label);
                    ui.add_sized([240.0, 24.0], egui::TextEdit::singleline(value));
                    ui.end_row();
                }
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label("Source code");
            if ui.button("Load file").clicked() {
                self.load_file();
            }
        });
        egui::ScrollArea::vertical()
            .max_height((ui.available_height() - 64.0).max(120.0))
            .show(ui, |ui| {
                ui.add_sized(
                    [ui.available_width(), 320.0],
                    egui::TextEdit::multiline(&mut self.form.source_code)
                        .code_editor()
                        .desired_rows(16),
                );
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(!self.pending, egui::Button::new("Submit"))
                .clicked()
            {
                self.submit(fetcher);
            }
            if self.pending {
                ui.spinner();
            }
        });
        if let Some(message) = &self.error {
            ui.colored_label(egui::Color32::LIGHT_RED, message);
        }
    }
}
