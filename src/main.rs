mod error;
mod models;
mod screens;
mod services;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use eframe::egui;
use models::Page;
use screens::contest::ContestScreen;
use screens::status::StatusScreen;
use screens::submit::SubmitScreen;
use services::api_client::ApiClient;
use services::config_loader::{MrojConfig, config_path, load_mroj_config};
use services::fetcher::{Fetcher, SlotId};
use services::selection_store::{FileMedium, SelectionStore};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const FETCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct MrojApp {
    page: Page,
    store: SelectionStore,
    fetcher: Fetcher,
    config: MrojConfig,
    submit: SubmitScreen,
    status: StatusScreen,
    contest: ContestScreen,
}

impl MrojApp {
    fn new(config: MrojConfig, store: SelectionStore, fetcher: Fetcher) -> Self {
        let page = store.page();
        info!("Restored page {}", page.as_str());
        Self {
            page,
            submit: SubmitScreen::new(&config),
            status: StatusScreen::default(),
            contest: ContestScreen::new(&config),
            store,
            fetcher,
            config,
        }
    }

    fn switch_page(&mut self, page: Page) {
        if page == self.page {
            return;
        }
        info!("Transition: {} -> {}", self.page.as_str(), page.as_str());
        self.page = page;
        if let Err(err) = self.store.set_page(page) {
            error!("Failed to persist page: {}", err);
        }
    }

    fn dispatch_fetch_events(&mut self) {
        for event in self.fetcher.drain() {
            match event.ticket.slot {
                SlotId::ContestList
                | SlotId::ContestDetail
                | SlotId::Ranklist
                | SlotId::ContestCreate => self.contest.handle_event(event, &mut self.store),
                SlotId::JobList | SlotId::JobDetail | SlotId::JobRejudge => {
                    self.status.handle_event(event, &mut self.fetcher)
                }
                SlotId::JobSubmit => {
                    if let Some(page) = self.submit.handle_event(event, &mut self.store) {
                        self.switch_page(page);
                    }
                }
            }
        }
    }
}

impl eframe::App for MrojApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.dispatch_fetch_events();

        let mut requested = self.page;
        egui::SidePanel::left("navigation")
            .resizable(false)
            .exact_width(160.0)
            .show(ctx, |ui| {
                ui.add_space(12.0);
                for page in Page::ALL {
                    ui.selectable_value(&mut requested, page, page.title());
                }
            });
        self.switch_page(requested);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(8.0);
            match self.page {
                Page::Home => screens::home::ui(ui, &mut self.store, &self.config),
                Page::Submit => self.submit.ui(ui, &mut self.fetcher),
                Page::Contest => self.contest.ui(ui, &mut self.store, &mut self.fetcher),
                Page::Status => {
                    self.status
                        .ui(ui, &mut self.store, &mut self.fetcher, &self.config)
                }
            }
        });

        if self.fetcher.in_flight() > 0 {
            ctx.request_repaint_after(FETCH_POLL_INTERVAL);
        }
    }
}

fn init_tracing() -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true);

    let _ = fs::create_dir_all("logs");
    let file_appender = tracing_appender::rolling::daily("logs", "mroj.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(err) = init_result {
        eprintln!("tracing init failed: {err}");
        return None;
    }

    Some(file_guard)
}

fn build_app() -> Result<MrojApp> {
    let path = config_path();
    let config = match load_mroj_config(&path) {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}, falling back to defaults", err);
            MrojConfig::default()
        }
    };

    let medium = FileMedium::open(config.storage.state_file.clone());
    info!("Selections stored in {}", medium.path().display());
    let store = SelectionStore::new(Box::new(medium));

    let api = ApiClient::new(&config.server).context("Failed to set up the judge client")?;
    info!("Judge server at {}", api.base_url());
    let fetcher = Fetcher::new(Arc::new(api))?;

    Ok(MrojApp::new(config, store, fetcher))
}

fn main() -> Result<()> {
    let _log_guard = init_tracing();
    info!("Starting MROJ");

    let app = build_app()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "MROJ",
        options,
        Box::new(|cc| {
            let mut style = (*cc.egui_ctx.style()).clone();
            style
                .text_styles
                .insert(egui::TextStyle::Heading, egui::FontId::proportional(28.0));
            style
                .text_styles
                .insert(egui::TextStyle::Body, egui::FontId::proportional(16.0));
            style
                .text_styles
                .insert(egui::TextStyle::Button, egui::FontId::proportional(16.0));
            style.spacing.button_padding = egui::vec2(10.0, 6.0);
            cc.egui_ctx.set_style(style);

            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow!("eframe exited with an error: {err}"))
}
