//! The shift data gateway.
//!
//! [`ShiftGateway`] is the only path from callers to the tabular store. It
//! builds queries, follows pagination, normalizes records and computes shift
//! views. It holds no mutable state and is cheap to clone.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, TablesConfig, ThresholdConfig};
use crate::entities::{
    Batch, MassBalance, Person, Process, ProcessStatus, Role, TeamMember, BATCH_DATE_FIELD,
    IDENTITY_CODE_FIELD, MASS_BALANCE_DATE_FIELD, MASS_BALANCE_OPERATOR_FIELD,
    PROCESS_STATUS_FIELD,
};
use crate::error::{Error, Result};
use crate::formula::Formula;
use crate::metrics::{compute_shift_view, shift_statistics, ShiftContext, ShiftStatistics, ShiftView};
use crate::query::{Direction, ListQuery, MAX_PAGE_SIZE};
use crate::record::{Fields, FieldsEnvelope, Record, RecordPage};
use crate::sample::{ConnectionStatus, DataSource};
use crate::shift::{rich, PlantState, Shift, ShiftStatus};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Checkbox column marking active staff.
const PERSONNEL_ACTIVE_FIELD: &str = "Activo";

#[derive(Debug, Clone)]
enum Mode {
    Connected(Arc<dyn Transport>),
    Unconfigured { reason: String },
}

/// Gateway to the shift tables.
#[derive(Debug, Clone)]
pub struct ShiftGateway {
    mode: Mode,
    status: ConnectionStatus,
    tables: TablesConfig,
    thresholds: ThresholdConfig,
    mass_balance_limit: usize,
}

impl ShiftGateway {
    /// Build a gateway with the HTTP transport.
    ///
    /// Missing or placeholder credentials do not fail: the gateway comes up
    /// unconfigured and every data call returns `Error::Configuration`.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are present but the HTTP client
    /// cannot be built from them.
    pub fn connect(config: &Config) -> Result<Self> {
        let status = ConnectionStatus::from_config(&config.airtable);
        if !status.configured {
            warn!(problems = ?status.problems, "Backend not configured, gateway is offline");
            return Ok(Self::build(config, status));
        }

        let credentials = config.airtable.credentials()?;
        let transport = HttpTransport::new(
            &config.airtable.api_url,
            &credentials,
            config.airtable.timeout(),
        )?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a gateway over any transport. Credentials in `config` are not
    /// checked.
    #[must_use]
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let mut gateway = Self::build(config, ConnectionStatus::from_config(&config.airtable));
        gateway.status.configured = true;
        gateway.status.problems.clear();
        gateway.status.source = DataSource::Live;
        gateway.mode = Mode::Connected(transport);
        gateway
    }

    fn build(config: &Config, status: ConnectionStatus) -> Self {
        Self {
            mode: Mode::Unconfigured {
                reason: status.problems.join("; "),
            },
            status,
            tables: config.tables.clone(),
            thresholds: config.thresholds,
            mass_balance_limit: config.polling.mass_balance_limit,
        }
    }

    /// Check whether the gateway can reach the backend.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self.mode, Mode::Connected(_))
    }

    /// Report configuration state. Performs no I/O.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    /// Alert thresholds in use.
    #[must_use]
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Table names in use.
    #[must_use]
    pub fn tables(&self) -> &TablesConfig {
        &self.tables
    }

    fn transport(&self) -> Result<&Arc<dyn Transport>> {
        match &self.mode {
            Mode::Connected(transport) => Ok(transport),
            Mode::Unconfigured { reason } => Err(Error::configuration(reason.clone())),
        }
    }

    // === Record plumbing ===

    async fn list_records(&self, table: &str, query: &ListQuery) -> Result<Vec<Record>> {
        let transport = self.transport()?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let request = ApiRequest::list(table, query.to_params(offset.as_deref()));
            let response = transport.send(request).await?.error_for_status()?;
            let page: RecordPage = serde_json::from_str(&response.body)?;
            records.extend(page.records);

            if let Some(max) = query.max_records {
                if records.len() >= max {
                    records.truncate(max);
                    break;
                }
            }
            match page.offset {
                Some(next) if offset.as_deref() == Some(next.as_str()) => {
                    warn!(table, offset = %next, "Backend repeated a page offset, stopping");
                    break;
                }
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        debug!(table, count = records.len(), "Fetched records");
        Ok(records)
    }

    async fn get_record(&self, table: &str, id: &str) -> Result<Option<Record>> {
        let transport = self.transport()?;
        if id.trim().is_empty() {
            return Err(Error::validation("record id cannot be empty"));
        }
        let response = transport.send(ApiRequest::get(table, id)).await?;
        if response.is_not_found() {
            debug!(table, id, "Record not found");
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(serde_json::from_str(&response.body)?))
    }

    async fn write_record(&self, request: ApiRequest) -> Result<Record> {
        let transport = self.transport()?;
        let response = transport.send(request).await?.error_for_status()?;
        Ok(serde_json::from_str(&response.body)?)
    }

    // === Shifts ===

    /// List shifts, optionally filtered.
    ///
    /// Records that fail normalization are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` for transport failures and non-2xx
    /// responses; the message carries the status and the response body.
    #[instrument(skip(self, filter))]
    pub async fn list_shifts(&self, filter: Option<Formula>) -> Result<Vec<Shift>> {
        let query = ListQuery::new()
            .filter_opt(filter)
            .page_size(MAX_PAGE_SIZE);
        let records = self.list_records(&self.tables.shifts, &query).await?;
        let shifts = normalize_shifts(records);
        info!(count = shifts.len(), "Fetched shifts");
        Ok(shifts)
    }

    /// Shifts that started on `date`.
    ///
    /// # Errors
    ///
    /// See [`ShiftGateway::list_shifts`].
    pub async fn shifts_on_date(&self, date: NaiveDate) -> Result<Vec<Shift>> {
        self.list_shifts(Some(Formula::on_date(rich::START, date)))
            .await
    }

    /// Shifts that started with the plant running.
    ///
    /// # Errors
    ///
    /// See [`ShiftGateway::list_shifts`].
    pub async fn active_shifts(&self) -> Result<Vec<Shift>> {
        self.list_shifts(Some(Formula::eq(
            rich::PLANT_STATE_START,
            PlantState::On.label(),
        )))
        .await
    }

    /// Fetch one shift. A missing record is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` for failures other than not-found, and
    /// `Error::Validation` if the stored record ends before it starts.
    #[instrument(skip(self))]
    pub async fn get_shift(&self, id: &str) -> Result<Option<Shift>> {
        self.get_record(&self.tables.shifts, id)
            .await?
            .map(Shift::from_record)
            .transpose()
    }

    /// Resolve the shift in progress.
    ///
    /// A given id that resolves wins. Otherwise every shift is listed and
    /// [`select_current`] picks one.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` when the shift table is empty, and
    /// propagates connection errors.
    #[instrument(skip(self))]
    pub async fn current_shift(&self, id: Option<&str>) -> Result<Shift> {
        if let Some(id) = id.filter(|id| !id.trim().is_empty()) {
            if let Some(shift) = self.get_shift(id).await? {
                return Ok(shift);
            }
            debug!(id, "Requested shift not found, selecting from all shifts");
        }

        let shifts = self.list_shifts(None).await?;
        select_current(shifts).ok_or_else(|| Error::not_found("current shift (no shifts recorded)"))
    }

    /// Create a shift from raw fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` with the backend message if the write is
    /// rejected.
    #[instrument(skip(self, fields), fields(count = fields.len()))]
    pub async fn create_shift(&self, fields: Fields) -> Result<Shift> {
        self.transport()?;
        let body = serde_json::to_value(FieldsEnvelope { fields: &fields })?;
        let record = self
            .write_record(ApiRequest::create(&self.tables.shifts, body))
            .await?;
        info!(id = %record.id, "Created shift");
        Shift::from_record(record)
    }

    /// Patch a shift with the given fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` with the backend message if the write is
    /// rejected.
    #[instrument(skip(self, fields), fields(count = fields.len()))]
    pub async fn update_shift(&self, id: &str, fields: Fields) -> Result<Shift> {
        self.transport()?;
        if id.trim().is_empty() {
            return Err(Error::validation("shift id cannot be empty"));
        }
        let body = serde_json::to_value(FieldsEnvelope { fields: &fields })?;
        let record = self
            .write_record(ApiRequest::update(&self.tables.shifts, id, body))
            .await?;
        info!(id = %record.id, "Updated shift");
        Shift::from_record(record)
    }

    // === Other tables ===

    /// Active staff.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn personnel(&self) -> Result<Vec<Person>> {
        let query = ListQuery::new().filter(Formula::is_true(PERSONNEL_ACTIVE_FIELD));
        let records = self.list_records(&self.tables.personnel, &query).await?;
        Ok(records.into_iter().map(Person::from_record).collect())
    }

    /// Active staff with the given role.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn personnel_by_role(&self, role: &Role) -> Result<Vec<Person>> {
        let people = self.personnel().await?;
        Ok(people
            .into_iter()
            .filter(|p| p.role.as_ref() == Some(role))
            .collect())
    }

    /// Production lots, optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn processes(&self, status: Option<ProcessStatus>) -> Result<Vec<Process>> {
        let query = ListQuery::new()
            .filter_opt(status.map(|s| Formula::eq(PROCESS_STATUS_FIELD, s.label())));
        let records = self.list_records(&self.tables.processes, &query).await?;
        Ok(records.into_iter().map(Process::from_record).collect())
    }

    /// Lots currently in progress.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn processes_in_progress(&self) -> Result<Vec<Process>> {
        self.processes(Some(ProcessStatus::InProcess)).await
    }

    /// Most recent mass-balance readings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn mass_balances(&self, limit: usize) -> Result<Vec<MassBalance>> {
        self.mass_balances_matching(None, limit).await
    }

    /// Most recent mass-balance readings recorded by `operator`, compared
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a blank name and `Error::Connection`
    /// on backend failure.
    pub async fn mass_balances_by_operator(
        &self,
        operator: &str,
        limit: usize,
    ) -> Result<Vec<MassBalance>> {
        self.transport()?;
        let operator = operator.trim();
        if operator.is_empty() {
            return Err(Error::validation("operator name cannot be empty"));
        }
        self.mass_balances_matching(
            Some(Formula::eq_ignore_case(MASS_BALANCE_OPERATOR_FIELD, operator)),
            limit,
        )
        .await
    }

    async fn mass_balances_matching(
        &self,
        filter: Option<Formula>,
        limit: usize,
    ) -> Result<Vec<MassBalance>> {
        let query = ListQuery::new()
            .filter_opt(filter)
            .sort(MASS_BALANCE_DATE_FIELD, Direction::Desc)
            .max_records(limit.max(1));
        let records = self.list_records(&self.tables.mass_balances, &query).await?;
        Ok(records.into_iter().map(MassBalance::from_record).collect())
    }

    /// Most recent pyrolysis batches, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn batches(&self, limit: usize) -> Result<Vec<Batch>> {
        let query = ListQuery::new()
            .sort(BATCH_DATE_FIELD, Direction::Desc)
            .max_records(limit.max(1));
        let records = self.list_records(&self.tables.batches, &query).await?;
        Ok(records.into_iter().map(Batch::from_record).collect())
    }

    /// The whole team roster.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` on backend failure.
    pub async fn team_members(&self) -> Result<Vec<TeamMember>> {
        let query = ListQuery::new().page_size(MAX_PAGE_SIZE);
        let records = self.list_records(&self.tables.team, &query).await?;
        Ok(records.into_iter().map(TeamMember::from_record).collect())
    }

    /// Look up a team member by identity code. No match is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a blank code (before any I/O) and
    /// `Error::Connection` on backend failure.
    #[instrument(skip(self, code))]
    pub async fn validate_identity_code(&self, code: &str) -> Result<Option<TeamMember>> {
        self.transport()?;
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::validation("identity code cannot be empty"));
        }
        let query = ListQuery::new()
            .filter(Formula::eq(IDENTITY_CODE_FIELD, code))
            .max_records(1);
        let records = self.list_records(&self.tables.team, &query).await?;
        let member = records.into_iter().next().map(TeamMember::from_record);
        debug!(found = member.is_some(), "Identity lookup finished");
        Ok(member)
    }

    // === Views ===

    /// Current shift with related records and metrics.
    ///
    /// Related records are fetched concurrently; if any fetch fails the whole
    /// view fails.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ShiftGateway::current_shift`] and from the
    /// related fetches.
    pub async fn shift_view(&self, id: Option<&str>) -> Result<ShiftView> {
        self.shift_view_at(id, Utc::now()).await
    }

    /// [`ShiftGateway::shift_view`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`ShiftGateway::shift_view`].
    pub async fn shift_view_at(&self, id: Option<&str>, now: DateTime<Utc>) -> Result<ShiftView> {
        let shift = self.current_shift(id).await?;
        let (personnel, processes, mass_balances) = tokio::try_join!(
            self.personnel(),
            self.processes_in_progress(),
            self.mass_balances(self.mass_balance_limit),
        )?;
        let context = ShiftContext {
            personnel,
            processes,
            mass_balances,
            source: DataSource::Live,
        };
        Ok(compute_shift_view(shift, context, &self.thresholds, now))
    }

    /// Totals over shifts that started between `from` and `to`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `from` is after `to`, and
    /// `Error::Connection` on backend failure.
    pub async fn shift_statistics(&self, from: NaiveDate, to: NaiveDate) -> Result<ShiftStatistics> {
        self.transport()?;
        if from > to {
            return Err(Error::validation(format!(
                "start date {from} is after end date {to}"
            )));
        }
        let shifts = self
            .list_shifts(Some(Formula::date_between(rich::START, from, to)))
            .await?;
        Ok(shift_statistics(&shifts, Utc::now()))
    }
}

fn normalize_shifts(records: Vec<Record>) -> Vec<Shift> {
    records
        .into_iter()
        .filter_map(|record| match Shift::from_record(record) {
            Ok(shift) => Some(shift),
            Err(e) => {
                warn!(error = %e, "Skipping invalid shift record");
                None
            }
        })
        .collect()
}

/// Pick the most current shift.
///
/// The first open shift with the plant on wins. A closed shift never does,
/// even if the plant was still running when it ended. Otherwise the most
/// recent one; shifts with a timestamp beat shifts without, and ties keep
/// list order.
#[must_use]
pub fn select_current(shifts: Vec<Shift>) -> Option<Shift> {
    let running = shifts
        .iter()
        .position(|s| s.status() == ShiftStatus::Active);
    if let Some(index) = running {
        return shifts.into_iter().nth(index);
    }

    let mut best: Option<(usize, DateTime<Utc>)> = None;
    for (index, shift) in shifts.iter().enumerate() {
        if let Some(at) = shift.recency() {
            match best {
                Some((_, best_at)) if at <= best_at => {}
                _ => best = Some((index, at)),
            }
        }
    }
    let index = best.map_or(0, |(index, _)| index);
    shifts.into_iter().nth(index)
}
