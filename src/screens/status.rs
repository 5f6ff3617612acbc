use std::time::Duration;

use eframe::egui;
use tracing::{info, warn};

use crate::models::{Domain, HasId, Job, JobState, display_time};
use crate::screens::{coerce_optional_id, fetch_status_line, format_score, select};
use crate::services::api_client::JobFilter;
use crate::services::config_loader::MrojConfig;
use crate::services::fetcher::{
    FetchEvent, FetchRequest, Fetcher, SlotId, Ticket, ViewSlot, log_dropped_event,
    take_action_result,
};
use crate::services::router::{self, Activation, RouteTracker, ViewMode};
use crate::services::selection_store::SelectionStore;

const STATE_CHOICES: [JobState; 4] = [
    JobState::Queueing,
    JobState::Running,
    JobState::Finished,
    JobState::Canceled,
];

#[derive(Default)]
struct FilterForm {
    user_id: String,
    contest_id: String,
    problem_id: String,
    language: String,
    state: Option<JobState>,
}

impl FilterForm {
    fn to_filter(&self) -> Result<JobFilter, String> {
        let language = self.language.trim();
        Ok(JobFilter {
            user_id: coerce_optional_id("User id", &self.user_id)?,
            contest_id: coerce_optional_id("Contest id", &self.contest_id)?,
            problem_id: coerce_optional_id("Problem id", &self.problem_id)?,
            language: (!language.is_empty()).then(|| language.to_string()),
            state: self.state,
        })
    }
}

/// Job list and job detail, switched by the persisted job selection.
pub struct StatusScreen {
    tracker: RouteTracker,
    list: ViewSlot<Vec<Job>>,
    detail: ViewSlot<Job>,
    filter_form: FilterForm,
    active_filter: JobFilter,
    filter_error: Option<String>,
    last_loaded_at: Option<f64>,
    rejudge_pending: bool,
    notice: Option<String>,
}

impl Default for StatusScreen {
    fn default() -> Self {
        Self {
            tracker: RouteTracker::new(Domain::Job),
            list: ViewSlot::default(),
            detail: ViewSlot::default(),
            filter_form: FilterForm::default(),
            active_filter: JobFilter::default(),
            filter_error: None,
            last_loaded_at: None,
            rejudge_pending: false,
            notice: None,
        }
    }
}

impl StatusScreen {
    fn load(&mut self, activation: Activation, same_identity: bool, fetcher: &mut Fetcher) {
        let generation = activation.generation;
        match activation.mode {
            ViewMode::List => {
                self.list.begin(generation, same_identity);
                fetcher.submit(
                    Ticket {
                        slot: SlotId::JobList,
                        generation,
                    },
                    FetchRequest::JobList(self.active_filter.clone()),
                );
            }
            ViewMode::Detail(id) => {
                if !same_identity {
                    self.notice = None;
                }
                self.detail.begin(generation, same_identity);
                fetcher.submit(
                    Ticket {
                        slot: SlotId::JobDetail,
                        generation,
                    },
                    FetchRequest::Job(id),
                );
            }
        }
    }

    fn reload(&mut self, fetcher: &mut Fetcher) {
        if let Some(activation) = self.tracker.reload() {
            self.load(activation, true, fetcher);
        }
    }

    /// Reload that also restarts the auto-refresh countdown.
    fn reload_at(&mut self, fetcher: &mut Fetcher, now: f64) {
        self.reload(fetcher);
        self.last_loaded_at = Some(now);
    }

    pub fn handle_event(&mut self, event: FetchEvent, fetcher: &mut Fetcher) {
        let FetchEvent { ticket, result } = event;
        match ticket.slot {
            SlotId::JobList => {
                self.list.accept(ticket.generation, result);
            }
            SlotId::JobDetail => {
                self.detail.accept(ticket.generation, result);
            }
            SlotId::JobRejudge => {
                self.rejudge_pending = false;
                if !self.tracker.is_current(ticket.generation) {
                    log_dropped_event(&FetchEvent { ticket, result });
                    return;
                }
                match take_action_result::<Job>("Rejudge", result) {
                    Ok(job) => {
                        info!("Job {} re-queued", job.id);
                        self.notice = Some(format!("Job {} re-queued", job.id));
                        self.reload(fetcher);
                    }
                    Err(message) => self.notice = Some(message),
                }
            }
            _ => log_dropped_event(&FetchEvent { ticket, result }),
        }
    }

    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        store: &mut SelectionStore,
        fetcher: &mut Fetcher,
        config: &MrojConfig,
    ) {
        let now = ui.input(|input| input.time);
        if let Some(activation) = self.tracker.observe(router::route(store, Domain::Job)) {
            self.load(activation, false, fetcher);
            self.last_loaded_at = Some(now);
        }

        self.maybe_auto_refresh(ui, fetcher, config, now);

        match self.tracker.current_mode().cloned() {
            Some(ViewMode::Detail(_)) => self.detail_ui(ui, store, fetcher),
            _ => self.list_ui(ui, store, fetcher),
        }
    }

    fn maybe_auto_refresh(
        &mut self,
        ui: &egui::Ui,
        fetcher: &mut Fetcher,
        config: &MrojConfig,
        now: f64,
    ) {
        let interval = config.status.auto_refresh_seconds;
        let on_detail = matches!(self.tracker.current_mode(), Some(ViewMode::Detail(_)));
        if !on_detail || !interval.is_finite() || interval <= 0.0 {
            return;
        }
        let Some(job) = self.detail.snapshot() else {
            return;
        };
        if job.state.is_terminal() || self.detail.is_pending() {
            return;
        }

        let remaining = time_until_refresh(self.last_loaded_at, now, interval);
        if remaining <= 0.0 {
            self.reload_at(fetcher, now);
        } else {
            ui.ctx().request_repaint_after(Duration::from_secs_f64(remaining));
        }
    }

    fn list_ui(&mut self, ui: &mut egui::Ui, store: &mut SelectionStore, fetcher: &mut Fetcher) {
        ui.heading("Judging status");
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.label("User");
            ui.add_sized(
                [60.0, 24.0],
                egui::TextEdit::singleline(&mut self.filter_form.user_id),
            );
            ui.label("Contest");
            ui.add_sized(
                [60.0, 24.0],
                egui::TextEdit::singleline(&mut self.filter_form.contest_id),
            );
            ui.label("Problem");
            ui.add_sized(
                [60.0, 24.0],
                egui::TextEdit::singleline(&mut self.filter_form.problem_id),
            );
            ui.label("Language");
            ui.add_sized(
                [100.0, 24.0],
                egui::TextEdit::singleline(&mut self.filter_form.language),
            );
            let state_text = self
                .filter_form
                .state
                .map_or_else(|| "Any state".to_string(), |state| state.to_string());
            egui::ComboBox::from_id_salt("job_state_filter")
                .selected_text(state_text)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.filter_form.state, None, "Any state");
                    for state in STATE_CHOICES {
                        ui.selectable_value(
                            &mut self.filter_form.state,
                            Some(state),
                            state.to_string(),
                        );
                    }
                });
        });

        ui.horizontal(|ui| {
            if ui.button("Apply filter").clicked() {
                match self.filter_form.to_filter() {
                    Ok(filter) => {
                        self.filter_error = None;
                        self.active_filter = filter;
                        self.reload(fetcher);
                    }
                    Err(message) => {
                        warn!("Rejected job filter: {}", message);
                        self.filter_error = Some(message);
                    }
                }
            }
            if ui.button("Refresh").clicked() {
                self.reload(fetcher);
            }
        });
        if let Some(message) = &self.filter_error {
            ui.colored_label(egui::Color32::LIGHT_RED, message);
        }

        fetch_status_line(ui, self.list.is_pending(), self.list.error());
        ui.add_space(8.0);

        let Some(jobs) = self.list.snapshot() else {
            return;
        };
        if jobs.is_empty() {
            if self.active_filter.is_empty() {
                ui.label("No submissions yet.");
            } else {
                ui.label("No submissions match the filter.");
            }
            return;
        }

        let mut clicked = None;
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("job_list")
                    .striped(true)
                    .num_columns(9)
                    .show(ui, |ui| {
                        for title in [
                            "Job", "Created", "Score", "Contest", "Problem", "User", "Language",
                            "State", "Result",
                        ] {
                            ui.label(egui::RichText::new(title).strong());
                        }
                        ui.end_row();

                        // newest first
                        for job in jobs.iter().rev() {
                            if ui.button(format!("#{}", job.id())).clicked() {
                                clicked = Some(job.id().clone());
                            }
                            ui.label(display_time(&job.created_time));
                            ui.label(format_score(job.score));
                            ui.label(job.submission.contest_id.to_string());
                            ui.label(job.submission.problem_id.to_string());
                            ui.label(job.submission.user_id.to_string());
                            ui.label(&job.submission.language);
                            ui.label(job.state.to_string());
                            ui.label(job.result.as_str());
                            ui.end_row();
                        }
                    });
            });

        if let Some(id) = clicked {
            select(store, Domain::Job, Some(id));
            ui.ctx().request_repaint();
        }
    }

    fn detail_ui(&mut self, ui: &mut egui::Ui, store: &mut SelectionStore, fetcher: &mut Fetcher) {
        ui.heading("Judging result");
        ui.add_space(8.0);

        let mut back = false;
        let mut refresh = false;
        let mut rejudge = None;
        ui.horizontal(|ui| {
            back = ui.button("Job list").clicked();
            refresh = ui.button("Refresh").clicked();
            let can_rejudge = !self.rejudge_pending
                && self
                    .detail
                    .snapshot()
                    .is_some_and(|job| job.state == JobState::Finished);
            if ui
                .add_enabled(can_rejudge, egui::Button::new("Rejudge"))
                .clicked()
            {
                rejudge = self.detail.snapshot().map(|job| job.id.clone());
            }
        });

        if let Some(notice) = &self.notice {
            ui.label(notice);
        }
        fetch_status_line(ui, self.detail.is_pending(), self.detail.error());

        if let Some(job) = self.detail.snapshot() {
            job_detail(ui, job);
        } else if !self.detail.is_pending() {
            ui.label("Job not loaded.");
        }

        if back {
            select(store, Domain::Job, None);
            ui.ctx().request_repaint();
        } else if refresh {
            self.reload_at(fetcher, ui.input(|input| input.time));
        } else if let Some(id) = rejudge {
            info!("Rejudging job {}", id);
            self.rejudge_pending = true;
            fetcher.submit(
                Ticket {
                    slot: SlotId::JobRejudge,
                    generation: self.tracker.generation(),
                },
                FetchRequest::RejudgeJob(id),
            );
        }
    }
}

/// Seconds left before the next automatic reload, 0 when it is due.
fn time_until_refresh(last_loaded_at: Option<f64>, now: f64, interval: f64) -> f64 {
    last_loaded_at.map_or(0.0, |loaded_at| (interval - (now - loaded_at)).clamp(0.0, interval))
}

fn job_detail(ui: &mut egui::Ui, job: &Job) {
    egui::Grid::new("job_summary")
        .num_columns(6)
        .spacing([24.0, 6.0])
        .show(ui, |ui| {
            ui.label("Created");
            ui.label(display_time(&job.created_time));
            ui.label("Job");
            ui.label(job.id.to_string());
            ui.label("Score");
            ui.label(format_score(job.score));
            ui.end_row();

            ui.label("Contest");
            ui.label(job.submission.contest_id.to_string());
            ui.label("Problem");
            ui.label(job.submission.problem_id.to_string());
            ui.label("User");
            ui.label(job.submission.user_id.to_string());
            ui.end_row();

            ui.label("Language");
            ui.label(&job.submission.language);
            ui.label("State");
            ui.label(job.state.to_string());
            ui.label("Result");
            ui.label(job.result.as_str());
            ui.end_row();
        });

    ui.add_space(8.0);
    ui.label(egui::RichText::new("Source").strong());
    egui::ScrollArea::vertical()
        .id_salt("job_source")
        .max_height(260.0)
        .show(ui, |ui| {
            let mut source = job.submission.source_code.as_str();
            ui.add(
                egui::TextEdit::multiline(&mut source)
                    .code_editor()
                    .desired_width(f32::INFINITY),
            );
        });

    ui.add_space(8.0);
    ui.label(egui::RichText::new("Cases").strong());
    egui::ScrollArea::vertical()
        .id_salt("job_cases")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            egui::Grid::new("job_cases_grid")
                .striped(true)
                .num_columns(5)
                .show(ui, |ui| {
                    for title in ["Case", "Result", "Time (us)", "Memory", "Info"] {
                        ui.label(egui::RichText::new(title).strong());
                    }
                    ui.end_row();
                    for case in &job.cases {
                        ui.label(case.id.to_string());
                        ui.label(case.result.as_str());
                        ui.label(case.time.to_string());
                        ui.label(case.memory.to_string());
                        ui.label(&case.info);
                        ui.end_row();
                    }
                });
        });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Identifier, Submission, Verdict};
    use crate::services::fetcher::FetchPayload;
    use crate::services::fetcher::fake::FakeApi;
    use crate::services::router::Generation;

    fn finished_job(id: u32) -> Job {
        Job {
            id: Identifier::from(id),
            created_time: "2022-08-27T02:05:29.000Z".to_string(),
            updated_time: "2022-08-27T02:05:31.000Z".to_string(),
            submission: Submission {
                source_code: "fn main() {}".to_string(),
                language: "Rust".to_string(),
                user_id: Identifier::from(0),
                contest_id: Identifier::from(0),
                problem_id: Identifier::from(0),
            },
            state: JobState::Finished,
            result: Verdict::Accepted,
            score: 100.0,
            cases: Vec::new(),
        }
    }

    fn rejudge_event(generation: Generation, job: Job) -> FetchEvent {
        FetchEvent {
            ticket: Ticket {
                slot: SlotId::JobRejudge,
                generation,
            },
            result: Ok(FetchPayload::Job(job)),
        }
    }

    fn open_detail(screen: &mut StatusScreen, id: u32, fetcher: &mut Fetcher) -> Generation {
        let activation = screen
            .tracker
            .observe(ViewMode::Detail(Identifier::from(id)))
            .unwrap();
        let generation = activation.generation;
        screen.load(activation, false, fetcher);
        generation
    }

    #[test]
    fn rejudge_reply_for_shown_job_sets_notice_and_reloads() {
        let mut fetcher = Fetcher::new(Arc::new(FakeApi::default())).unwrap();
        let mut screen = StatusScreen::default();
        let generation = open_detail(&mut screen, 4, &mut fetcher);
        screen.rejudge_pending = true;
        assert_eq!(fetcher.in_flight(), 1);

        screen.handle_event(rejudge_event(generation, finished_job(4)), &mut fetcher);
        assert!(!screen.rejudge_pending);
        assert_eq!(screen.notice.as_deref(), Some("Job 4 re-queued"));
        assert_eq!(fetcher.in_flight(), 2);
    }

    #[test]
    fn rejudge_reply_after_leaving_the_job_is_dropped() {
        let mut fetcher = Fetcher::new(Arc::new(FakeApi::default())).unwrap();
        let mut screen = StatusScreen::default();
        let first = open_detail(&mut screen, 4, &mut fetcher);
        screen.rejudge_pending = true;
        open_detail(&mut screen, 5, &mut fetcher);
        assert_eq!(fetcher.in_flight(), 2);

        screen.handle_event(rejudge_event(first, finished_job(4)), &mut fetcher);
        assert!(!screen.rejudge_pending);
        assert_eq!(screen.notice, None);
        assert_eq!(fetcher.in_flight(), 2);
    }

    #[test]
    fn refresh_countdown_uses_remaining_time() {
        assert_eq!(time_until_refresh(None, 10.0, 2.0), 0.0);
        assert_eq!(time_until_refresh(Some(10.0), 10.5, 2.0), 1.5);
        assert_eq!(time_until_refresh(Some(10.0), 13.0, 2.0), 0.0);
        // clock went backwards
        assert_eq!(time_until_refresh(Some(10.0), 9.0, 2.0), 2.0);
    }

    #[test]
    fn manual_reload_restarts_countdown() {
        let mut fetcher = Fetcher::new(Arc::new(FakeApi::default())).unwrap();
        let mut screen = StatusScreen::default();
        let first = open_detail(&mut screen, 4, &mut fetcher);
        screen.last_loaded_at = Some(0.0);

        screen.reload_at(&mut fetcher, 5.0);
        assert_eq!(screen.last_loaded_at, Some(5.0));
        assert!(!screen.tracker.is_current(first));
        assert_eq!(time_until_refresh(screen.last_loaded_at, 5.5, 2.0), 1.5);
    }

    #[test]
    fn filter_form_coerces_fields() {
        let form = FilterForm {
            user_id: "1".to_string(),
            contest_id: String::new(),
            problem_id: " 4 ".to_string(),
            language: "  ".to_string(),
            state: Some(JobState::Running),
        };
        assert_eq!(
            form.to_filter(),
            Ok(JobFilter {
                user_id: Some(Identifier::from(1)),
                contest_id: None,
                problem_id: Some(Identifier::from(4)),
                language: None,
                state: Some(JobState::Running),
            })
        );
    }

    #[test]
    fn filter_form_rejects_non_integer_ids() {
        let form = FilterForm {
            contest_id: "first".to_string(),
            ..FilterForm::default()
        };
        assert_eq!(
            form.to_filter(),
            Err("Contest id must be a non-negative integer".to_string())
        );
    }

    #[test]
    fn empty_form_is_an_empty_filter() {
        assert!(FilterForm::default().to_filter().unwrap().is_empty());
    }
}
