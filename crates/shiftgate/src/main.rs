//! `shiftgate` - CLI for the shift data gateway
//!
//! This binary provides the command-line interface for reading plant shift
//! data and watching the current shift's metrics.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use shiftgate::cli::{
    into_fields, BatchesCommand, Cli, Command, ConfigCommand, MassBalancesCommand,
    PersonnelCommand, ProcessesCommand, ShiftsCommand, TeamCommand, ViewCommand, WatchCommand,
};
use shiftgate::entities::TemperatureChannel;
use shiftgate::{
    init_logging, sample, Config, DataSource, Labelled, PollScope, Shift, ShiftGateway, ShiftView,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Config commands load the file themselves so they can report on it
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(cli.config, config_cmd),
        command => command,
    };

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let gateway = ShiftGateway::connect(&config)?;
    let app = App {
        sample: cli.sample && !gateway.is_configured(),
        gateway,
        config,
    };
    if app.sample {
        eprintln!("Backend not configured: showing SAMPLE data, not plant data.");
    }

    let result = match command {
        Command::Status(cmd) => app.handle_status(cmd.json),
        Command::Shifts(cmd) => app.handle_shifts(cmd).await,
        Command::Personnel(cmd) => app.handle_personnel(cmd).await,
        Command::Processes(cmd) => app.handle_processes(cmd).await,
        Command::MassBalances(cmd) => app.handle_mass_balances(cmd).await,
        Command::Batches(cmd) => app.handle_batches(cmd).await,
        Command::Team(cmd) => app.handle_team(cmd).await,
        Command::View(cmd) => app.handle_view(cmd).await,
        Command::Watch(cmd) => app.handle_watch(cmd).await,
        Command::Login(cmd) => app.handle_login(&cmd.code).await,
        // Handled before loading configuration
        Command::Config(_) => Ok(()),
    };

    match result {
        Err(e) if is_unconfigured(&e) => Err(e.context(
            "backend credentials are missing; run `shiftgate status` for details or pass --sample",
        )),
        other => other,
    }
}

fn is_unconfigured(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<shiftgate::Error>()
        .is_some_and(shiftgate::Error::is_configuration_error)
}

#[derive(Debug)]
struct App {
    gateway: ShiftGateway,
    config: Config,
    sample: bool,
}

impl App {
    fn source(&self) -> DataSource {
        if self.sample {
            DataSource::Sample
        } else {
            DataSource::Live
        }
    }

    /// JSON output of records, tagged with their source.
    fn print_data<T: Serialize>(&self, data: &T) -> anyhow::Result<()> {
        print_json(&Labelled::new(self.source(), data))
    }

    fn handle_status(&self, json: bool) -> anyhow::Result<()> {
        let status = self.gateway.connection_status();
        if json {
            return print_json(&status);
        }

        println!("shiftgate status");
        println!("----------------");
        println!(
            "Backend:     {}",
            if status.configured {
                "configured"
            } else {
                "not configured"
            }
        );
        println!("API URL:     {}", status.api_url);
        println!(
            "Base:        {}",
            status.base_id.as_deref().unwrap_or("(none)")
        );
        println!(
            "Token:       {}",
            status.token.as_deref().unwrap_or("(none)")
        );
        println!("Data source: {}", status.source);
        for problem in &status.problems {
            println!("  - {problem}");
        }
        Ok(())
    }

    async fn handle_shifts(&self, cmd: ShiftsCommand) -> anyhow::Result<()> {
        match cmd {
            ShiftsCommand::List { date, active, json } => {
                let shifts = if self.sample {
                    sample::shifts()
                } else if let Some(date) = date {
                    self.gateway.shifts_on_date(date).await?
                } else if active {
                    self.gateway.active_shifts().await?
                } else {
                    self.gateway.list_shifts(None).await?
                };
                if json {
                    return self.print_data(&shifts);
                }
                if shifts.is_empty() {
                    println!("No shifts found.");
                }
                for shift in &shifts {
                    print_shift_line(shift);
                }
            }
            ShiftsCommand::Get { id, legacy_fields } => {
                match self.gateway.get_shift(&id).await? {
                    Some(shift) if legacy_fields => print_json(&shift.compat_fields())?,
                    Some(shift) => self.print_data(&shift)?,
                    None => bail!("shift {id} not found"),
                }
            }
            ShiftsCommand::Current { id } => {
                let shift = if self.sample {
                    sample::shifts()
                        .into_iter()
                        .next()
                        .context("no sample shift")?
                } else {
                    self.gateway.current_shift(id.as_deref()).await?
                };
                self.print_data(&shift)?;
            }
            ShiftsCommand::Create { fields } => {
                let shift = self.gateway.create_shift(into_fields(fields)).await?;
                println!("Created shift {}", shift.id);
            }
            ShiftsCommand::Update { id, fields } => {
                let shift = self.gateway.update_shift(&id, into_fields(fields)).await?;
                println!("Updated shift {}", shift.id);
            }
            ShiftsCommand::Stats { from, to, json } => {
                let stats = self.gateway.shift_statistics(from, to).await?;
                if json {
                    return self.print_data(&stats);
                }
                println!("Shifts {from} to {to}");
                println!("  Total:        {}", stats.total);
                println!("  Active:       {}", stats.active);
                println!("  Completed:    {}", stats.completed);
                println!("  Suspended:    {}", stats.suspended);
                println!("  Unknown:      {}", stats.unknown);
                println!("  Avg temp:     {}", format_celsius(stats.average_temperature));
                println!("  Biomass (kg): {:.1}", stats.total_biomass_kg);
                println!("  Biochar (kg): {:.1}", stats.total_biochar_kg);
            }
        }
        Ok(())
    }

    async fn handle_personnel(&self, cmd: PersonnelCommand) -> anyhow::Result<()> {
        let people = match (&cmd.role, self.sample) {
            (_, true) => sample::personnel()
                .into_iter()
                .filter(|p| cmd.role.is_none() || p.role == cmd.role)
                .collect(),
            (Some(role), false) => self.gateway.personnel_by_role(role).await?,
            (None, false) => self.gateway.personnel().await?,
        };
        if cmd.json {
            return self.print_data(&people);
        }
        for person in &people {
            println!(
                "{:<18} {:<24} {}",
                person.id,
                person.name.as_deref().unwrap_or("-"),
                person.role.as_ref().map_or("-", |r| r.label())
            );
        }
        Ok(())
    }

    async fn handle_processes(&self, cmd: ProcessesCommand) -> anyhow::Result<()> {
        let processes = if self.sample {
            sample::processes()
                .into_iter()
                .filter(|p| cmd.status.is_none() || p.status == cmd.status)
                .collect()
        } else {
            self.gateway.processes(cmd.status).await?
        };
        if cmd.json {
            return self.print_data(&processes);
        }
        for process in &processes {
            println!(
                "{:<18} {:<14} {:<12} {}",
                process.id,
                process.lot_id.as_deref().unwrap_or("-"),
                process.status.map_or("-", |s| s.label()),
                process.biomass_type.as_deref().unwrap_or("-")
            );
        }
        Ok(())
    }

    async fn handle_mass_balances(&self, cmd: MassBalancesCommand) -> anyhow::Result<()> {
        let balances = if self.sample {
            let mut balances = sample::mass_balances();
            balances.truncate(cmd.limit);
            balances
        } else if let Some(operator) = &cmd.operator {
            self.gateway
                .mass_balances_by_operator(operator, cmd.limit)
                .await?
        } else {
            self.gateway.mass_balances(cmd.limit).await?
        };
        if cmd.json {
            return self.print_data(&balances);
        }
        for balance in &balances {
            println!(
                "{:<18} {:<26} {:>8} kg  reactor {}",
                balance.id,
                balance
                    .recorded_at
                    .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
                balance
                    .biochar_kg
                    .map_or_else(|| "-".to_string(), |kg| format!("{kg:.1}")),
                format_celsius(balance.mean_temperature(&TemperatureChannel::REACTOR))
            );
        }
        Ok(())
    }

    async fn handle_batches(&self, cmd: BatchesCommand) -> anyhow::Result<()> {
        let batches = if self.sample {
            let mut batches = sample::batches();
            batches.truncate(cmd.limit);
            batches
        } else {
            self.gateway.batches(cmd.limit).await?
        };
        if cmd.json {
            return self.print_data(&batches);
        }
        for batch in &batches {
            println!(
                "{:<10} {:<20} sold {:>7.1} kg {}",
                batch.code.as_deref().unwrap_or("-"),
                batch.status.as_deref().unwrap_or("-"),
                batch.sold_kg,
                if batch.sold { "(sold out)" } else { "" }
            );
        }
        Ok(())
    }

    async fn handle_team(&self, cmd: TeamCommand) -> anyhow::Result<()> {
        let members = if self.sample {
            sample::team_members()
        } else {
            self.gateway.team_members().await?
        };
        if cmd.json {
            return self.print_data(&members);
        }
        if members.is_empty() {
            println!("No team members found.");
        }
        for member in &members {
            println!(
                "{:<18} {:<24} {}",
                member.id,
                member.name.as_deref().unwrap_or("-"),
                member.role.as_deref().unwrap_or("-")
            );
        }
        Ok(())
    }

    async fn handle_view(&self, cmd: ViewCommand) -> anyhow::Result<()> {
        let view = self.fetch_view(cmd.id).await?;
        if cmd.json {
            print_json(&view)
        } else {
            print_view(&view);
            Ok(())
        }
    }

    async fn fetch_view(&self, id: Option<String>) -> anyhow::Result<ShiftView> {
        if self.sample {
            return sample::shift_view(self.gateway.thresholds(), Utc::now())
                .context("no sample shift");
        }
        Ok(self.gateway.shift_view(id.as_deref()).await?)
    }

    async fn handle_watch(&self, cmd: WatchCommand) -> anyhow::Result<()> {
        let period = cmd
            .interval
            .map_or_else(|| self.config.poll_interval(), Duration::from_secs);

        if self.sample {
            let thresholds = *self.gateway.thresholds();
            return watch(period, move || {
                std::future::ready(
                    sample::shift_view(&thresholds, Utc::now()).ok_or_else(|| {
                        shiftgate::Error::not_found("current shift (no sample shift)")
                    }),
                )
            })
            .await;
        }

        let gateway = self.gateway.clone();
        watch(period, move || {
            let gateway = gateway.clone();
            let id = cmd.id.clone();
            async move { gateway.shift_view(id.as_deref()).await }
        })
        .await
    }

    async fn handle_login(&self, code: &str) -> anyhow::Result<()> {
        let member = if self.sample {
            sample::identity(code)
        } else {
            self.gateway.validate_identity_code(code).await?
        };
        match member {
            Some(member) => {
                println!(
                    "Welcome, {}",
                    member.name.as_deref().unwrap_or("team member")
                );
                if let Some(role) = &member.role {
                    println!("Role: {role}");
                }
                Ok(())
            }
            None => bail!("identity code not recognized"),
        }
    }
}

/// Print a fresh view every `period` until Ctrl-C.
async fn watch<F, Fut>(period: Duration, fetch: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = shiftgate::Result<ShiftView>> + Send + 'static,
{
    let mut scope = PollScope::spawn(period, fetch);
    eprintln!(
        "Refreshing every {}s, press Ctrl-C to stop.",
        scope.period().as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                scope.stop();
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            update = scope.next() => match update {
                Some(Ok(view)) => {
                    println!();
                    print_view(&view);
                }
                Some(Err(e)) if e.is_configuration_error() => return Err(e.into()),
                Some(Err(e)) => eprintln!("Refresh failed: {e}"),
                None => break,
            },
        }
    }
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path).context("failed to load configuration")?;
            if json {
                return print_json(&config);
            }
            let status = shiftgate::ConnectionStatus::from_config(&config.airtable);
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[Airtable]");
            println!("  API URL:            {}", config.airtable.api_url);
            println!(
                "  Base id:            {}",
                config.airtable.base_id.as_deref().unwrap_or("(none)")
            );
            println!(
                "  Token:              {}",
                status.token.as_deref().unwrap_or("(none)")
            );
            println!("  Timeout (s):        {}", config.airtable.timeout_secs);
            println!();
            println!("[Tables]");
            println!("  Shifts:             {}", config.tables.shifts);
            println!("  Personnel:          {}", config.tables.personnel);
            println!("  Processes:          {}", config.tables.processes);
            println!("  Mass balances:      {}", config.tables.mass_balances);
            println!("  Batches:            {}", config.tables.batches);
            println!("  Team:               {}", config.tables.team);
            println!();
            println!("[Thresholds]");
            println!("  Max temperature:    {}", config.thresholds.max_temperature);
            println!("  Min temperature:    {}", config.thresholds.min_temperature);
            println!(
                "  Optimal temperature: {}",
                config.thresholds.optimal_temperature
            );
            println!();
            println!("[Polling]");
            println!("  Interval (s):       {}", config.polling.interval_secs);
            println!(
                "  Mass balance limit: {}",
                config.polling.mass_balance_limit
            );
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(config) => {
                    println!("Configuration is valid.");
                    for problem in config.airtable.credential_problems() {
                        println!("  warning: {problem}");
                    }
                }
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_shift_line(shift: &Shift) {
    println!(
        "{:<18} {:<26} {:<20} {}",
        shift.id,
        shift
            .start
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
        shift.operator.as_deref().unwrap_or("-"),
        shift.status()
    );
}

fn format_celsius(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |t| format!("{t:.1}°C"))
}

fn print_view(view: &ShiftView) {
    let shift = &view.shift;
    let metrics = &view.metrics;
    if view.context.source == shiftgate::DataSource::Sample {
        println!("** SAMPLE DATA **");
    }
    println!("Shift {} ({})", shift.id, metrics.status);
    println!(
        "  Operator:     {}",
        shift.operator.as_deref().unwrap_or("-")
    );
    println!("  Elapsed:      {}", metrics.elapsed);
    println!("  Yield:        {:.1}%", metrics.yield_percent);
    println!(
        "  Temperature:  {}",
        format_celsius(metrics.average_temperature)
    );
    println!("  Efficiency:   {:.1}", metrics.efficiency);
    if let Some(energy) = metrics.energy_consumed {
        println!("  Energy:       {energy:.1}");
    }
    if let Some(gas) = metrics.gas_consumed {
        println!("  Gas:          {gas:.1}");
    }
    println!(
        "  Staff: {}  Lots in progress: {}  Mass balances: {}",
        view.context.personnel.len(),
        view.context.processes.len(),
        view.context.mass_balances.len()
    );
    for alert in &metrics.alerts {
        println!("  ALERT: {alert}");
    }
}
