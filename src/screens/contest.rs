use eframe::egui;
use tracing::{info, warn};

use crate::models::{Contest, Domain, HasId, Identifier, NewContest, RanklistEntry, display_time};
use crate::screens::{fetch_status_line, format_score, select};
use crate::services::api_client::{RanklistQuery, ScoringRule, TieBreaker};
use crate::services::config_loader::MrojConfig;
use crate::services::fetcher::{
    FetchEvent, FetchRequest, Fetcher, SlotId, Ticket, ViewSlot, log_dropped_event,
    take_action_result,
};
use crate::services::ranklist::{self, RanklistTable};
use crate::services::router::{self, Activation, Generation, RouteTracker, ViewMode};
use crate::services::selection_store::SelectionStore;

/// Text fields of the "new contest" form.
#[derive(Debug, Clone, Default)]
struct ContestForm {
    name: String,
    from: String,
    to: String,
    problem_ids: String,
    user_ids: String,
    submission_limit: String,
}

impl ContestForm {
    fn from_template(config: &MrojConfig) -> Self {
        let template = &config.contest_template;
        Self {
            name: template.name.clone(),
            from: template.from.clone(),
            to: template.to.clone(),
            problem_ids: join_ids(&template.problem_ids),
            user_ids: join_ids(&template.user_ids),
            submission_limit: template.submission_limit.to_string(),
        }
    }

    fn to_new_contest(&self) -> Result<NewContest, String> {
        let submission_limit = self
            .submission_limit
            .trim()
            .parse::<u32>()
            .map_err(|_| "Submission limit must be a non-negative integer".to_string())?;
        Ok(NewContest {
            name: self.name.trim().to_string(),
            from: self.from.trim().to_string(),
            to: self.to.trim().to_string(),
            problem_ids: split_ids(&self.problem_ids),
            user_ids: split_ids(&self.user_ids),
            submission_limit,
        })
    }
}

fn join_ids(ids: &[Identifier]) -> String {
    ids.iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_ids(text: &str) -> Vec<Identifier> {
    text.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Identifier::from)
        .collect()
}

/// Contest list and contest leaderboard, switched by the persisted contest
/// selection.
pub struct ContestScreen {
    tracker: RouteTracker,
    list: ViewSlot<Vec<Contest>>,
    detail: ViewSlot<Contest>,
    entries: ViewSlot<Vec<RanklistEntry>>,
    table: Option<RanklistTable>,
    query: RanklistQuery,
    form: ContestForm,
    form_error: Option<String>,
    create_generation: Generation,
    create_pending: bool,
}

impl ContestScreen {
    pub fn new(config: &MrojConfig) -> Self {
        Self {
            tracker: RouteTracker::new(Domain::Contest),
            list: ViewSlot::default(),
            detail: ViewSlot::default(),
            entries: ViewSlot::default(),
            table: None,
            query: config.ranklist.query(),
            form: ContestForm::from_template(config),
            form_error: None,
            create_generation: Generation::default(),
            create_pending: false,
        }
    }

    fn load(&mut self, activation: Activation, same_identity: bool, fetcher: &mut Fetcher) {
        let generation = activation.generation;
        match activation.mode {
            ViewMode::List => {
                self.list.begin(generation, same_identity);
                fetcher.submit(
                    Ticket {
                        slot: SlotId::ContestList,
                        generation,
                    },
                    FetchRequest::ContestList,
                );
            }
            ViewMode::Detail(id) => {
                if !same_identity {
                    self.table = None;
                }
                self.detail.begin(generation, same_identity);
                self.entries.begin(generation, same_identity);
                fetcher.submit(
                    Ticket {
                        slot: SlotId::ContestDetail,
                        generation,
                    },
                    FetchRequest::Contest(id.clone()),
                );
                fetcher.submit(
                    Ticket {
                        slot: SlotId::Ranklist,
                        generation,
                    },
                    FetchRequest::Ranklist {
                        contest_id: id,
                        query: self.query,
                    },
                );
            }
        }
    }

    fn reload(&mut self, fetcher: &mut Fetcher) {
        if let Some(activation) = self.tracker.reload() {
            self.load(activation, true, fetcher);
        }
    }

    /// Rebuilds the table once both halves of the detail view are in.
    fn refresh_table(&mut self) {
        if let (Some(contest), Some(entries)) = (self.detail.snapshot(), self.entries.snapshot()) {
            self.table = Some(ranklist::assemble(&contest.problem_ids, entries));
        }
    }

    pub fn handle_event(&mut self, event: FetchEvent, store: &mut SelectionStore) {
        let FetchEvent { ticket, result } = event;
        match ticket.slot {
            SlotId::ContestList => {
                self.list.accept(ticket.generation, result);
            }
            SlotId::ContestDetail => {
                if self.detail.accept(ticket.generation, result) {
                    self.refresh_table();
                }
            }
            SlotId::Ranklist => {
                if self.entries.accept(ticket.generation, result) {
                    self.refresh_table();
                }
            }
            SlotId::ContestCreate => {
                if ticket.generation != self.create_generation {
                    log_dropped_event(&FetchEvent { ticket, result });
                    return;
                }
                self.create_pending = false;
                match take_action_result::<Contest>("Create contest", result) {
                    Ok(contest) => {
                        info!("Created contest {} ({})", contest.id, contest.name);
                        select(store, Domain::Contest, Some(contest.id));
                    }
                    Err(message) => self.form_error = Some(message),
                }
            }
            _ => log_dropped_event(&FetchEvent { ticket, result }),
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, store: &mut SelectionStore, fetcher: &mut Fetcher) {
        if let Some(activation) = self.tracker.observe(router::route(store, Domain::Contest)) {
            self.load(activation, false, fetcher);
        }

        match self.tracker.current_mode().cloned() {
            Some(ViewMode::Detail(_)) => self.detail_ui(ui, store, fetcher),
            _ => self.list_ui(ui, store, fetcher),
        }
    }

    fn list_ui(&mut self, ui: &mut egui::Ui, store: &mut SelectionStore, fetcher: &mut Fetcher) {
        ui.heading("Contests");
        ui.add_space(8.0);

        egui::CollapsingHeader::new("New contest")
            .default_open(false)
            .show(ui, |ui| self.create_form_ui(ui, fetcher));
        ui.add_space(8.0);

        if ui.button("Refresh").clicked() {
            self.reload(fetcher);
        }
        fetch_status_line(ui, self.list.is_pending(), self.list.error());

        let Some(contests) = self.list.snapshot() else {
            return;
        };
        if contests.is_empty() {
            ui.label("No contests yet.");
            return;
        }

        let mut clicked = None;
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("contest_list")
                    .striped(true)
                    .num_columns(5)
                    .show(ui, |ui| {
                        for title in ["Contest", "Name", "Start", "End", "Problems"] {
                            ui.label(egui::RichText::new(title).strong());
                        }
                        ui.end_row();

                        // newest first
                        for contest in contests.iter().rev() {
                            if ui.button(format!("#{}", contest.id())).clicked() {
                                clicked = Some(contest.id().clone());
                            }
                            ui.label(&contest.name);
                            ui.label(display_time(&contest.from));
                            ui.label(display_time(&contest.to));
                            ui.label(contest.problem_ids.len().to_string());
                            ui.end_row();
                        }
                    });
            });

        if let Some(id) = clicked {
            select(store, Domain::Contest, Some(id));
            ui.ctx().request_repaint();
        }
    }

    fn create_form_ui(&mut self, ui: &mut egui::Ui, fetcher: &mut Fetcher) {
        egui::Grid::new("contest_form")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                let form = &mut self.form;
                for (label, value) in [
                    ("Name", &mut form.name),
                    ("Start", &mut form.from),
                    ("End", &mut form.to),
                    ("Problem ids", &mut form.problem_ids),
                    ("User ids", &mut form.user_ids),
                    ("Submission limit", &mut form.submission_limit),
                ] {
                    ui.label(label);
                    ui.add_sized([360.0, 24.0], egui::TextEdit::singleline(value));
                    ui.end_row();
                }
            });

        if ui
            .add_enabled(!self.create_pending, egui::Button::new("Create contest"))
            .clicked()
        {
            match self.form.to_new_contest() {
                Ok(contest) => {
                    self.form_error = None;
                    self.create_pending = true;
                    self.create_generation = self.create_generation.next();
                    info!("Creating contest {}", contest.name);
                    fetcher.submit(
                        Ticket {
                            slot: SlotId::ContestCreate,
                            generation: self.create_generation,
                        },
                        FetchRequest::CreateContest(contest),
                    );
                }
                Err(message) => {
                    warn!("Rejected contest form: {}", message);
                    self.form_error = Some(message);
                }
            }
        }
        if let Some(message) = &self.form_error {
            ui.colored_label(egui::Color32::LIGHT_RED, message);
        }
    }

    fn detail_ui(&mut self, ui: &mut egui::Ui, store: &mut SelectionStore, fetcher: &mut Fetcher) {
        let mut back = false;
        let mut refresh = false;
        let mut query = self.query;

        ui.horizontal(|ui| {
            ui.heading("Ranklist");
            ui.add_space(16.0);
            back = ui.button("Contest list").clicked();
            refresh = ui.button("Refresh").clicked();

            egui::ComboBox::from_id_salt("scoring_rule")
                .selected_text(query.scoring_rule.map_or("server default", ScoringRule::as_str))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut query.scoring_rule, None, "server default");
                    for rule in ScoringRule::ALL {
                        ui.selectable_value(&mut query.scoring_rule, Some(rule), rule.as_str());
                    }
                });
            egui::ComboBox::from_id_salt("tie_breaker")
                .selected_text(query.tie_breaker.map_or("no tie breaker", TieBreaker::as_str))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut query.tie_breaker, None, "no tie breaker");
                    for breaker in TieBreaker::ALL {
                        ui.selectable_value(
                            &mut query.tie_breaker,
                            Some(breaker),
                            breaker.as_str(),
                        );
                    }
                });
        });

        if let Some(contest) = self.detail.snapshot() {
            ui.label(format!(
                "#{} {}  |  {} - {}  |  submission limit {}",
                contest.id,
                contest.name,
                display_time(&contest.from),
                display_time(&contest.to),
                contest.submission_limit
            ));
        }
        fetch_status_line(
            ui,
            self.detail.is_pending() || self.entries.is_pending(),
            self.detail.error().or(self.entries.error()),
        );
        ui.add_space(8.0);

        if let Some(table) = &self.table {
            ranklist_ui(ui, table);
        } else if !self.detail.is_pending() && !self.entries.is_pending() {
            ui.label("Ranklist not loaded.");
        }

        if back {
            select(store, Domain::Contest, None);
            ui.ctx().request_repaint();
        } else if query != self.query {
            info!("Ranklist options changed to {:?}", query);
            self.query = query;
            self.reload(fetcher);
        } else if refresh {
            self.reload(fetcher);
        }
    }
}

fn ranklist_ui(ui: &mut egui::Ui, table: &RanklistTable) {
    if !table.is_consistent() {
        egui::Frame::group(ui.style())
            .fill(egui::Color32::from_rgb(56, 48, 20))
            .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(190, 160, 70)))
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Score columns do not match the problem list").strong());
                for mismatch in &table.mismatches {
                    ui.colored_label(
                        egui::Color32::from_rgb(255, 220, 140),
                        format!(
                            "Row {} ({}): {} scores for {} problems",
                            mismatch.key, mismatch.user_name, mismatch.actual, mismatch.expected
                        ),
                    );
                }
            });
        ui.add_space(8.0);
    }

    if table.rows.is_empty() {
        ui.label("Nobody is ranked yet.");
        return;
    }

    egui::ScrollArea::both()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            egui::Grid::new("ranklist")
                .striped(true)
                .min_col_width(60.0)
                .num_columns(table.columns.len() + 2)
                .show(ui, |ui| {
                    ui.label(egui::RichText::new("Rank").strong());
                    ui.label(egui::RichText::new("Name").strong());
                    for problem_id in &table.columns {
                        ui.label(egui::RichText::new(problem_id.as_str()).strong());
                    }
                    ui.end_row();

                    for row in &table.rows {
                        ui.label(row.rank.to_string());
                        ui.label(&row.name);
                        for problem_id in &table.columns {
                            let cell = row
                                .scores_by_problem_id
                                .get(problem_id)
                                .map(|score| format_score(*score))
                                .unwrap_or_default();
                            ui.label(cell);
                        }
                        ui.end_row();
                    }
                });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_starts_from_template() {
        let form = ContestForm::from_template(&MrojConfig::default());
        assert_eq!(form.problem_ids, "0, 1");
        assert_eq!(form.user_ids, "0, 1, 2");
        assert_eq!(form.submission_limit, "32");
        assert_eq!(
            form.to_new_contest().unwrap(),
            MrojConfig::default().contest_template.to_new_contest()
        );
    }

    #[test]
    fn form_splits_ids_and_coerces_limit() {
        let form = ContestForm {
            name: " Spring Cup ".to_string(),
            from: "2024-03-01T00:00:00.000Z".to_string(),
            to: "2024-03-01T05:00:00.000Z".to_string(),
            problem_ids: "A, B,,C ".to_string(),
            user_ids: String::new(),
            submission_limit: "10".to_string(),
        };
        let contest = form.to_new_contest().unwrap();
        assert_eq!(contest.name, "Spring Cup");
        assert_eq!(contest.problem_ids, split_ids("A,B,C"));
        assert!(contest.user_ids.is_empty());
        assert_eq!(contest.submission_limit, 10);

        let bad = ContestForm {
            submission_limit: "lots".to_string(),
            ..form
        };
        assert!(bad.to_new_contest().is_err());
    }
}
