//! Runs API calls off the UI thread and hands results back over a channel.
//!
//! The UI thread never blocks on the network: it submits a request with a
//! ticket, keeps drawing, and drains finished events once per frame. Tickets
//! carry the generation of the navigation that asked, and `ViewSlot` drops
//! anything that arrives for a view the user already left.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::models::{Contest, Identifier, Job, NewContest, NewJob, RanklistEntry};
use crate::services::api_client::{JobFilter, JudgeApi, RanklistQuery};
use crate::services::router::Generation;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    ContestList,
    Contest(Identifier),
    Ranklist {
        contest_id: Identifier,
        query: RanklistQuery,
    },
    JobList(JobFilter),
    Job(Identifier),
    CreateContest(NewContest),
    CreateJob(NewJob),
    RejudgeJob(Identifier),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchPayload {
    Contests(Vec<Contest>),
    Contest(Contest),
    Ranklist(Vec<RanklistEntry>),
    Jobs(Vec<Job>),
    Job(Job),
}

impl FetchPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchPayload::Contests(_) => "contest list",
            FetchPayload::Contest(_) => "contest",
            FetchPayload::Ranklist(_) => "ranklist",
            FetchPayload::Jobs(_) => "job list",
            FetchPayload::Job(_) => "job",
        }
    }
}

macro_rules! payload_conversion {
    ($target:ty, $variant:ident) => {
        impl TryFrom<FetchPayload> for $target {
            type Error = FetchPayload;

            fn try_from(payload: FetchPayload) -> std::result::Result<Self, Self::Error> {
                match payload {
                    FetchPayload::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

payload_conversion!(Vec<Contest>, Contests);
payload_conversion!(Contest, Contest);
payload_conversion!(Vec<RanklistEntry>, Ranklist);
payload_conversion!(Vec<Job>, Jobs);
payload_conversion!(Job, Job);

/// Which view model a response is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    ContestList,
    ContestDetail,
    Ranklist,
    ContestCreate,
    JobList,
    JobDetail,
    JobSubmit,
    JobRejudge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub slot: SlotId,
    pub generation: Generation,
}

#[derive(Debug)]
pub struct FetchEvent {
    pub ticket: Ticket,
    pub result: std::result::Result<FetchPayload, FetchError>,
}

async fn execute(
    api: &dyn JudgeApi,
    request: FetchRequest,
) -> std::result::Result<FetchPayload, FetchError> {
    match request {
        FetchRequest::ContestList => api.list_contests().await.map(FetchPayload::Contests),
        FetchRequest::Contest(id) => api.get_contest(&id).await.map(FetchPayload::Contest),
        FetchRequest::Ranklist { contest_id, query } => api
            .get_ranklist(&contest_id, &query)
            .await
            .map(FetchPayload::Ranklist),
        FetchRequest::JobList(filter) => api.list_jobs(&filter).await.map(FetchPayload::Jobs),
        FetchRequest::Job(id) => api.get_job(&id).await.map(FetchPayload::Job),
        FetchRequest::CreateContest(contest) => api
            .create_contest(&contest)
            .await
            .map(FetchPayload::Contest),
        FetchRequest::CreateJob(job) => api.create_job(&job).await.map(FetchPayload::Job),
        FetchRequest::RejudgeJob(id) => api.rejudge_job(&id).await.map(FetchPayload::Job),
    }
}

pub struct Fetcher {
    runtime: tokio::runtime::Runtime,
    api: Arc<dyn JudgeApi>,
    tx: Sender<FetchEvent>,
    rx: Receiver<FetchEvent>,
    in_flight: usize,
}

impl Fetcher {
    pub fn new(api: Arc<dyn JudgeApi>) -> Result<Self> {
        let worker_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .clamp(1, 4);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("mroj-fetch")
            .enable_all()
            .build()
            .context("failed to initialize fetch runtime")?;
        let (tx, rx) = mpsc::channel::<FetchEvent>();

        Ok(Self {
            runtime,
            api,
            tx,
            rx,
            in_flight: 0,
        })
    }

    pub fn submit(&mut self, ticket: Ticket, request: FetchRequest) {
        debug!(
            "Submitting {:?} for {:?} (generation {})",
            request,
            ticket.slot,
            ticket.generation.value()
        );
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let result = execute(api.as_ref(), request).await;
            let _ = tx.send(FetchEvent { ticket, result });
        });
    }

    /// Everything that finished since the last call.
    pub fn drain(&mut self) -> Vec<FetchEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    events.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Fetch channel disconnected");
                    break;
                }
            }
        }
        events
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[cfg(test)]
    fn wait_next(&mut self) -> Option<FetchEvent> {
        let event = self
            .rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(event)
    }
}

/// The fetched snapshot behind one view, guarded by generation.
#[derive(Debug)]
pub struct ViewSlot<T> {
    generation: Option<Generation>,
    snapshot: Option<T>,
    pending: bool,
    error: Option<String>,
}

impl<T> Default for ViewSlot<T> {
    fn default() -> Self {
        Self {
            generation: None,
            snapshot: None,
            pending: false,
            error: None,
        }
    }
}

impl<T> ViewSlot<T>
where
    T: TryFrom<FetchPayload, Error = FetchPayload>,
{
    /// Starts waiting for `generation`. A new view identity drops the old
    /// snapshot; a reload of the same identity keeps it on screen meanwhile.
    pub fn begin(&mut self, generation: Generation, same_identity: bool) {
        self.generation = Some(generation);
        self.pending = true;
        if !same_identity {
            self.snapshot = None;
            self.error = None;
        }
    }

    /// Applies a response. Returns false if it was stale and got dropped.
    /// A failure keeps whatever snapshot was there.
    pub fn accept(
        &mut self,
        generation: Generation,
        result: std::result::Result<FetchPayload, FetchError>,
    ) -> bool {
        if self.generation != Some(generation) {
            debug!(
                "Dropping stale response for generation {} (active {:?})",
                generation.value(),
                self.generation.map(Generation::value)
            );
            return false;
        }
        self.pending = false;

        match result {
            Ok(payload) => match T::try_from(payload) {
                Ok(snapshot) => {
                    self.snapshot = Some(snapshot);
                    self.error = None;
                }
                Err(other) => {
                    error!("Slot received unexpected {} payload", other.kind());
                    self.error = Some(format!("unexpected {} payload", other.kind()));
                }
            },
            Err(err) => {
                warn!("Fetch failed: {}", err);
                self.error = Some(err.to_string());
            }
        }
        true
    }

    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Logs the outcome of a one-shot action (create, submit, rejudge) and
/// returns its payload on success.
pub fn take_action_result<T>(
    action: &str,
    result: std::result::Result<FetchPayload, FetchError>,
) -> std::result::Result<T, String>
where
    T: TryFrom<FetchPayload, Error = FetchPayload>,
{
    match result {
        Ok(payload) => T::try_from(payload).map_err(|other| {
            let message = format!("{action}: unexpected {} payload", other.kind());
            error!("{message}");
            message
        }),
        Err(err) => {
            let message = format!("{action} failed: {err}");
            warn!("{message}");
            Err(message)
        }
    }
}

pub fn log_dropped_event(event: &FetchEvent) {
    info!(
        "No view waiting for {:?} generation {}",
        event.ticket.slot,
        event.ticket.generation.value()
    );
}

/// In-process `JudgeApi` for tests of the fetcher and the screens.
#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::models::User;

    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub contests: Vec<Contest>,
        pub fail_contests: bool,
        pub ranklist_calls: Mutex<Vec<(Identifier, RanklistQuery)>>,
    }

    pub(crate) fn contest(id: u32) -> Contest {
        Contest {
            id: Identifier::from(id),
            name: format!("contest {id}"),
            from: "2022-08-27T02:05:29.000Z".to_string(),
            to: "2022-08-27T02:05:30.000Z".to_string(),
            problem_ids: vec![Identifier::from(0)],
            user_ids: vec![Identifier::from(0)],
            submission_limit: 32,
        }
    }

    pub(crate) fn not_found() -> FetchError {
        FetchError::Status {
            status: StatusCode::NOT_FOUND,
            detail: None,
        }
    }

    #[async_trait]
    impl JudgeApi for FakeApi {
        async fn list_contests(&self) -> std::result::Result<Vec<Contest>, FetchError> {
            if self.fail_contests {
                return Err(not_found());
            }
            Ok(self.contests.clone())
        }

        async fn create_contest(
            &self,
            new: &NewContest,
        ) -> std::result::Result<Contest, FetchError> {
            let mut created = contest(99);
            created.name = new.name.clone();
            Ok(created)
        }

        async fn get_contest(&self, id: &Identifier) -> std::result::Result<Contest, FetchError> {
            self.contests
                .iter()
                .find(|contest| &contest.id == id)
                .cloned()
                .ok_or_else(not_found)
        }

        async fn get_ranklist(
            &self,
            contest_id: &Identifier,
            query: &RanklistQuery,
        ) -> std::result::Result<Vec<RanklistEntry>, FetchError> {
            self.ranklist_calls
                .lock()
                .unwrap()
                .push((contest_id.clone(), *query));
            Ok(vec![RanklistEntry {
                user: User {
                    id: Identifier::from(0),
                    name: "root".to_string(),
                },
                rank: 1,
                scores: vec![100.0],
            }])
        }

        async fn list_jobs(&self, _: &JobFilter) -> std::result::Result<Vec<Job>, FetchError> {
            Ok(Vec::new())
        }

        async fn create_job(&self, _: &NewJob) -> std::result::Result<Job, FetchError> {
            Err(not_found())
        }

        async fn get_job(&self, _: &Identifier) -> std::result::Result<Job, FetchError> {
            Err(not_found())
        }

        async fn rejudge_job(&self, _: &Identifier) -> std::result::Result<Job, FetchError> {
            Err(not_found())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeApi, contest, not_found};
    use super::*;
    use crate::models::Domain;
    use crate::services::router::{RouteTracker, ViewMode};

    fn ticket(slot: SlotId, generation: Generation) -> Ticket {
        Ticket { slot, generation }
    }

    #[test]
    fn results_come_back_with_their_ticket() {
        let api = Arc::new(FakeApi {
            contests: vec![contest(1), contest(2)],
            ..FakeApi::default()
        });
        let mut fetcher = Fetcher::new(api.clone()).unwrap();
        let mut tracker = RouteTracker::new(Domain::Contest);
        let activation = tracker
            .observe(ViewMode::Detail(Identifier::from(2)))
            .unwrap();

        fetcher.submit(
            ticket(SlotId::Ranklist, activation.generation),
            FetchRequest::Ranklist {
                contest_id: Identifier::from(2),
                query: RanklistQuery::default(),
            },
        );
        assert_eq!(fetcher.in_flight(), 1);

        let event = fetcher.wait_next().unwrap();
        assert_eq!(event.ticket, ticket(SlotId::Ranklist, activation.generation));
        assert!(matches!(event.result, Ok(FetchPayload::Ranklist(ref rows)) if rows.len() == 1));
        assert_eq!(fetcher.in_flight(), 0);
        assert_eq!(
            api.ranklist_calls.lock().unwrap().as_slice(),
            &[(Identifier::from(2), RanklistQuery::default())]
        );
    }

    #[test]
    fn stale_response_is_dropped() {
        let api = Arc::new(FakeApi {
            contests: vec![contest(1), contest(2)],
            ..FakeApi::default()
        });
        let mut fetcher = Fetcher::new(api).unwrap();
        let mut tracker = RouteTracker::new(Domain::Contest);
        let mut slot: ViewSlot<Contest> = ViewSlot::default();

        let first = tracker
            .observe(ViewMode::Detail(Identifier::from(1)))
            .unwrap();
        slot.begin(first.generation, false);
        fetcher.submit(
            ticket(SlotId::ContestDetail, first.generation),
            FetchRequest::Contest(Identifier::from(1)),
        );

        // user moves on before the first answer lands
        let second = tracker
            .observe(ViewMode::Detail(Identifier::from(2)))
            .unwrap();
        slot.begin(second.generation, false);
        fetcher.submit(
            ticket(SlotId::ContestDetail, second.generation),
            FetchRequest::Contest(Identifier::from(2)),
        );

        let mut applied = 0;
        for _ in 0..2 {
            let event = fetcher.wait_next().unwrap();
            if slot.accept(event.ticket.generation, event.result) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(slot.snapshot().map(|c| c.id.clone()), Some(Identifier::from(2)));
        assert!(!slot.is_pending());
    }

    #[test]
    fn failure_keeps_previous_snapshot() {
        let mut slot: ViewSlot<Vec<Contest>> = ViewSlot::default();
        let mut tracker = RouteTracker::new(Domain::Contest);
        let first = tracker.observe(ViewMode::List).unwrap();
        slot.begin(first.generation, false);
        assert!(slot.accept(
            first.generation,
            Ok(FetchPayload::Contests(vec![contest(1)]))
        ));

        let reload = tracker.reload().unwrap();
        slot.begin(reload.generation, true);
        assert_eq!(slot.snapshot().map(Vec::len), Some(1));
        assert!(slot.accept(reload.generation, Err(not_found())));
        assert_eq!(slot.snapshot().map(Vec::len), Some(1));
        assert!(slot.error().unwrap().contains("404"));
    }

    #[test]
    fn new_identity_starts_unknown() {
        let mut slot: ViewSlot<Contest> = ViewSlot::default();
        let mut tracker = RouteTracker::new(Domain::Contest);
        let first = tracker
            .observe(ViewMode::Detail(Identifier::from(1)))
            .unwrap();
        slot.begin(first.generation, false);
        slot.accept(first.generation, Ok(FetchPayload::Contest(contest(1))));

        let second = tracker
            .observe(ViewMode::Detail(Identifier::from(2)))
            .unwrap();
        slot.begin(second.generation, false);
        assert!(slot.snapshot().is_none());
        assert!(slot.is_pending());
    }

    #[test]
    fn wrong_payload_kind_is_reported() {
        let mut slot: ViewSlot<Contest> = ViewSlot::default();
        let generation = RouteTracker::new(Domain::Contest)
            .observe(ViewMode::List)
            .unwrap()
            .generation;
        slot.begin(generation, false);
        assert!(slot.accept(generation, Ok(FetchPayload::Jobs(Vec::new()))));
        assert!(slot.snapshot().is_none());
        assert_eq!(slot.error(), Some("unexpected job list payload"));
    }

    #[test]
    fn action_results() {
        let created: std::result::Result<Contest, String> =
            take_action_result("create contest", Ok(FetchPayload::Contest(contest(5))));
        assert_eq!(created.unwrap().id, Identifier::from(5));

        let failed: std::result::Result<Job, String> =
            take_action_result("submit", Err(not_found()));
        assert!(failed.unwrap_err().starts_with("submit failed"));
    }

    #[test]
    fn failing_list_arrives_as_error() {
        let api = Arc::new(FakeApi {
            fail_contests: true,
            ..FakeApi::default()
        });
        let mut fetcher = Fetcher::new(api).unwrap();
        let generation = RouteTracker::new(Domain::Contest)
            .observe(ViewMode::List)
            .unwrap()
            .generation;
        fetcher.submit(ticket(SlotId::ContestList, generation), FetchRequest::ContestList);
        let event = fetcher.wait_next().unwrap();
        assert!(matches!(event.result, Err(FetchError::Status { .. })));
    }
}
