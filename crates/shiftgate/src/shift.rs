//! Shift records and their normalization.
//!
//! Two schema generations of the shift table coexist. Both are parsed into a
//! [`ShiftShape`] at the boundary and folded into one canonical [`Shift`] by
//! [`Shift::from_record`]; nothing past this module looks at raw column names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::{Fields, Record};

/// Column names of the current shift table.
pub mod rich {
    /// Shift start.
    pub const START: &str = "Fecha Inicio Turno";
    /// Shift end, absent while the shift is open.
    pub const END: &str = "Fecha Fin Turno";
    /// Operator name.
    pub const OPERATOR: &str = "Operador";
    /// Plant state when the shift started.
    pub const PLANT_STATE_START: &str = "Estado Inicial Planta";
    /// Plant state when the shift ended.
    pub const PLANT_STATE_END: &str = "Estado Final Planta";
    /// Energy meter at start.
    pub const ENERGY_START: &str = "Consumo Energia Inicio";
    /// Energy meter at end.
    pub const ENERGY_END: &str = "Consumo Energia Fin";
    /// Gas meter at start.
    pub const GAS_START: &str = "Consumo Gas Inicial";
    /// Gas meter at end.
    pub const GAS_END: &str = "Consumo Gas Final";
    /// Wet biomass feed rate in kg per minute.
    pub const FEED_RATE: &str = "🎙️ Alimentación Biomasa Húmeda Por Minuto (Kg)";
    /// Hopper 2 motor frequency.
    pub const HOPPER_HZ: &str = "🎙️ Herzt Tolva 2";
    /// Biochar produced over the shift, in kg.
    pub const BIOCHAR_TOTAL: &str = "Total Biochar Produccido Turno";
    /// Furnace readings of the linked mass balances.
    pub const BATCH_TEMPERATURES: &str = "Temperatura Horno (H1) (from Balances Masa)";
    /// Biochar weights of the linked mass balances.
    pub const BATCH_WEIGHTS: &str = "Peso Biochar (KG) (from Balances Masa)";
    /// Biomass humidity readings.
    pub const HUMIDITY: &str = "Porcentaje Humedad Biomasa";
    /// Linked mass-balance records.
    pub const MASS_BALANCES: &str = "Balances Masa";
    /// Linked biomass trips.
    pub const BIOMASS_TRIPS: &str = "Viajes Biomasa";
    /// Linked log entries.
    pub const LOG_ENTRIES: &str = "Bitácora Pirolisis";
    /// Linked monitoring records.
    pub const MONITORING: &str = "Monitoreo Turnos";
    /// Linked waste-handling records.
    pub const WASTE_HANDLING: &str = "Manejo Residuos";

    /// Any of these marks a record as the current schema.
    pub(crate) const MARKERS: &[&str] = &[
        START,
        END,
        OPERATOR,
        PLANT_STATE_START,
        PLANT_STATE_END,
        ENERGY_START,
        ENERGY_END,
        GAS_START,
        GAS_END,
        FEED_RATE,
        BIOCHAR_TOTAL,
        MASS_BALANCES,
    ];
}

/// Column names of the legacy flat shift table.
pub mod legacy {
    /// Shift date.
    pub const DATE: &str = "fecha";
    /// Shift period (Mañana/Tarde/Noche).
    pub const PERIOD: &str = "turno";
    /// Operator name.
    pub const OPERATOR: &str = "operador";
    /// Supervisor name.
    pub const SUPERVISOR: &str = "supervisor";
    /// Linked process id.
    pub const PROCESS_ID: &str = "proceso_id";
    /// Temperature at start.
    pub const TEMPERATURE_START: &str = "temperatura_inicio";
    /// Temperature at end.
    pub const TEMPERATURE_END: &str = "temperatura_fin";
    /// Biomass fed, in kg.
    pub const BIOMASS: &str = "biomasa_kg";
    /// Biochar produced, in kg.
    pub const BIOCHAR: &str = "biochar_kg";
    /// Free-text notes.
    pub const OBSERVATIONS: &str = "observaciones";
    /// Declared status (Activo/Completado/Suspendido).
    pub const STATUS: &str = "estado";
}

/// Whether the plant was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantState {
    /// Encendida.
    On,
    /// Apagada.
    Off,
}

impl PlantState {
    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "encendida" | "encendido" | "on" => Some(Self::On),
            "apagada" | "apagado" | "off" => Some(Self::Off),
            _ => None,
        }
    }

    /// Label as stored in the table.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::On => "Encendida",
            Self::Off => "Apagada",
        }
    }
}

impl std::fmt::Display for PlantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Time-of-day slot of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPeriod {
    /// Mañana.
    Morning,
    /// Tarde.
    Afternoon,
    /// Noche.
    Night,
}

impl ShiftPeriod {
    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mañana" | "manana" | "morning" => Some(Self::Morning),
            "tarde" | "afternoon" => Some(Self::Afternoon),
            "noche" | "night" => Some(Self::Night),
            _ => None,
        }
    }

    /// Label as stored in the table.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "Mañana",
            Self::Afternoon => "Tarde",
            Self::Night => "Noche",
        }
    }
}

/// Status written by hand into legacy records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredStatus {
    /// Activo.
    Active,
    /// Completado.
    Completed,
    /// Suspendido.
    Suspended,
}

impl DeclaredStatus {
    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "activo" => Some(Self::Active),
            "completado" => Some(Self::Completed),
            "suspendido" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// Inferred status of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    /// Plant running and the shift is still open.
    Active,
    /// The shift has ended.
    Completed,
    /// Marked as suspended.
    Suspended,
    /// Not enough data to tell.
    Unknown,
}

impl ShiftStatus {
    /// Label as the legacy `estado` column writes it.
    #[must_use]
    pub fn legacy_label(self) -> Option<&'static str> {
        match self {
            Self::Active => Some("Activo"),
            Self::Completed => Some("Completado"),
            Self::Suspended => Some("Suspendido"),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Suspended => write!(f, "suspended"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which schema a record was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaGeneration {
    /// Flat lower-case columns.
    Legacy,
    /// Descriptive columns with lookup arrays.
    Rich,
}

/// Meter readings at the start and end of a shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    /// Reading at start.
    pub start: Option<f64>,
    /// Reading at end.
    pub end: Option<f64>,
}

impl Meter {
    /// Consumption over the shift. Absent unless both readings exist;
    /// a meter that went backwards reads as zero.
    #[must_use]
    pub fn consumed(&self) -> Option<f64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).max(0.0)),
            _ => None,
        }
    }
}

/// Ids of records linked from a shift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRecords {
    /// Mass-balance readings.
    pub mass_balances: Vec<String>,
    /// Biomass trips.
    pub biomass_trips: Vec<String>,
    /// Log entries.
    pub log_entries: Vec<String>,
    /// Monitoring records.
    pub monitoring: Vec<String>,
    /// Waste-handling records.
    pub waste_handling: Vec<String>,
}

/// A legacy flat record.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyShift {
    pub date: Option<DateTime<Utc>>,
    pub period: Option<ShiftPeriod>,
    pub operator: Option<String>,
    pub supervisor: Option<String>,
    pub process_id: Option<String>,
    pub temperature_start: Option<f64>,
    pub temperature_end: Option<f64>,
    pub biomass_kg: Option<f64>,
    pub biochar_kg: Option<f64>,
    pub observations: Option<String>,
    pub status: Option<DeclaredStatus>,
}

impl LegacyShift {
    fn parse(fields: &Fields) -> Self {
        Self {
            date: fields.timestamp(legacy::DATE),
            period: fields
                .text(legacy::PERIOD)
                .and_then(|s| ShiftPeriod::from_label(&s)),
            operator: fields.text(legacy::OPERATOR),
            supervisor: fields.text(legacy::SUPERVISOR),
            process_id: fields.text(legacy::PROCESS_ID),
            temperature_start: fields.number(legacy::TEMPERATURE_START),
            temperature_end: fields.number(legacy::TEMPERATURE_END),
            biomass_kg: fields.number(legacy::BIOMASS),
            biochar_kg: fields.number(legacy::BIOCHAR),
            observations: fields.text(legacy::OBSERVATIONS),
            status: fields
                .text(legacy::STATUS)
                .and_then(|s| DeclaredStatus::from_label(&s)),
        }
    }
}

/// A record in the current schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RichShift {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub operator: Option<String>,
    pub plant_state_start: Option<PlantState>,
    pub plant_state_end: Option<PlantState>,
    pub energy: Meter,
    pub gas: Meter,
    pub feed_rate_kg_per_min: Option<f64>,
    pub hopper_hz: Option<f64>,
    pub biochar_total_kg: Option<f64>,
    pub batch_temperatures: Vec<f64>,
    pub batch_weights: Vec<f64>,
    pub humidity: Vec<f64>,
    pub links: LinkedRecords,
}

impl RichShift {
    fn parse(fields: &Fields) -> Self {
        let plant_state = |key: &str| fields.text(key).and_then(|s| PlantState::from_label(&s));
        Self {
            start: fields.timestamp(rich::START),
            end: fields.timestamp(rich::END),
            operator: fields.text(rich::OPERATOR),
            plant_state_start: plant_state(rich::PLANT_STATE_START),
            plant_state_end: plant_state(rich::PLANT_STATE_END),
            energy: Meter {
                start: fields.number(rich::ENERGY_START),
                end: fields.number(rich::ENERGY_END),
            },
            gas: Meter {
                start: fields.number(rich::GAS_START),
                end: fields.number(rich::GAS_END),
            },
            feed_rate_kg_per_min: fields.number(rich::FEED_RATE),
            hopper_hz: fields.number(rich::HOPPER_HZ),
            biochar_total_kg: fields.number(rich::BIOCHAR_TOTAL),
            batch_temperatures: fields.numbers(rich::BATCH_TEMPERATURES),
            batch_weights: fields.numbers(rich::BATCH_WEIGHTS),
            humidity: fields.numbers(rich::HUMIDITY),
            links: LinkedRecords {
                mass_balances: fields.strings(rich::MASS_BALANCES),
                biomass_trips: fields.strings(rich::BIOMASS_TRIPS),
                log_entries: fields.strings(rich::LOG_ENTRIES),
                monitoring: fields.strings(rich::MONITORING),
                waste_handling: fields.strings(rich::WASTE_HANDLING),
            },
        }
    }
}

/// A shift record as it arrived, tagged by schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ShiftShape {
    /// Legacy flat record.
    Legacy(LegacyShift),
    /// Current-schema record.
    Rich(RichShift),
}

impl ShiftShape {
    /// Tag a field map. Any current-schema column makes it [`ShiftShape::Rich`].
    #[must_use]
    pub fn detect(fields: &Fields) -> Self {
        if fields.contains_any(rich::MARKERS) {
            Self::Rich(RichShift::parse(fields))
        } else {
            Self::Legacy(LegacyShift::parse(fields))
        }
    }

    /// Schema generation of this shape.
    #[must_use]
    pub fn generation(&self) -> SchemaGeneration {
        match self {
            Self::Legacy(_) => SchemaGeneration::Legacy,
            Self::Rich(_) => SchemaGeneration::Rich,
        }
    }
}

/// A normalized shift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shift {
    /// Record id.
    pub id: String,
    /// When the backend created the record.
    pub created_time: Option<DateTime<Utc>>,
    /// Schema the record was written in.
    pub schema: SchemaGeneration,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub operator: Option<String>,
    pub supervisor: Option<String>,
    pub period: Option<ShiftPeriod>,
    pub process_id: Option<String>,
    pub plant_state_start: Option<PlantState>,
    pub plant_state_end: Option<PlantState>,
    pub energy: Meter,
    pub gas: Meter,
    pub temperature_start: Option<f64>,
    pub temperature_end: Option<f64>,
    /// Biomass fed, when recorded as a total.
    pub biomass_kg: Option<f64>,
    /// Wet biomass feed rate, when recorded as a rate.
    pub feed_rate_kg_per_min: Option<f64>,
    pub hopper_hz: Option<f64>,
    /// Biochar produced, when recorded as a total.
    pub biochar_kg: Option<f64>,
    /// Per-batch furnace readings.
    pub batch_temperatures: Vec<f64>,
    /// Per-batch biochar weights.
    pub batch_weights: Vec<f64>,
    pub humidity: Vec<f64>,
    pub observations: Option<String>,
    /// Status written into a legacy record, if any.
    pub declared_status: Option<DeclaredStatus>,
    pub links: LinkedRecords,
    /// Every field as stored.
    pub fields: Fields,
}

impl Shift {
    /// Normalize a backend record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the record ends before it starts.
    pub fn from_record(record: Record) -> Result<Self> {
        let shape = ShiftShape::detect(&record.fields);
        let shift = Self::from_shape(record.id, record.created_time, shape, record.fields);
        shift.check_interval()?;
        Ok(shift)
    }

    fn from_shape(
        id: String,
        created_time: Option<DateTime<Utc>>,
        shape: ShiftShape,
        fields: Fields,
    ) -> Self {
        let mut shift = Self {
            id,
            created_time,
            schema: shape.generation(),
            start: None,
            end: None,
            operator: None,
            supervisor: None,
            period: None,
            process_id: None,
            plant_state_start: None,
            plant_state_end: None,
            energy: Meter::default(),
            gas: Meter::default(),
            temperature_start: None,
            temperature_end: None,
            biomass_kg: None,
            feed_rate_kg_per_min: None,
            hopper_hz: None,
            biochar_kg: None,
            batch_temperatures: Vec::new(),
            batch_weights: Vec::new(),
            humidity: Vec::new(),
            observations: None,
            declared_status: None,
            links: LinkedRecords::default(),
            fields,
        };

        match shape {
            ShiftShape::Legacy(l) => {
                shift.start = l.date;
                shift.period = l.period;
                shift.operator = l.operator;
                shift.supervisor = l.supervisor;
                shift.process_id = l.process_id;
                shift.temperature_start = l.temperature_start;
                shift.temperature_end = l.temperature_end;
                shift.biomass_kg = l.biomass_kg;
                shift.biochar_kg = l.biochar_kg;
                shift.observations = l.observations;
                shift.declared_status = l.status;
                // Legacy records have no plant column; "Activo" is the only signal
                if l.status == Some(DeclaredStatus::Active) {
                    shift.plant_state_start = Some(PlantState::On);
                }
            }
            ShiftShape::Rich(r) => {
                shift.start = r.start;
                shift.end = r.end;
                shift.operator = r.operator;
                shift.plant_state_start = r.plant_state_start;
                shift.plant_state_end = r.plant_state_end;
                shift.energy = r.energy;
                shift.gas = r.gas;
                shift.feed_rate_kg_per_min = r.feed_rate_kg_per_min;
                shift.hopper_hz = r.hopper_hz;
                shift.biochar_kg = r.biochar_total_kg;
                shift.batch_temperatures = r.batch_temperatures;
                shift.batch_weights = r.batch_weights;
                shift.humidity = r.humidity;
                shift.links = r.links;
            }
        }
        shift
    }

    fn check_interval(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(Error::validation(format!(
                    "shift {} ends at {end} before it starts at {start}",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Plant state at the end of the shift if recorded, else at the start.
    #[must_use]
    pub fn current_plant_state(&self) -> Option<PlantState> {
        self.plant_state_end.or(self.plant_state_start)
    }

    /// Infer the shift status.
    ///
    /// Rules, first match wins:
    /// 1. plant on and no end: active
    /// 2. end present: completed
    /// 3. declared suspended: suspended
    /// 4. declared completed: completed
    /// 5. otherwise unknown
    #[must_use]
    pub fn status(&self) -> ShiftStatus {
        if self.end.is_none() && self.current_plant_state() == Some(PlantState::On) {
            return ShiftStatus::Active;
        }
        if self.end.is_some() {
            return ShiftStatus::Completed;
        }
        match self.declared_status {
            Some(DeclaredStatus::Suspended) => ShiftStatus::Suspended,
            Some(DeclaredStatus::Completed) => ShiftStatus::Completed,
            _ => ShiftStatus::Unknown,
        }
    }

    /// Timestamp used to rank shifts by recency.
    #[must_use]
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.start.or(self.created_time)
    }

    /// Whole minutes from start to `end` (or `now` while open), never negative.
    #[must_use]
    pub fn duration_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        let start = self.start?;
        let until = self.end.unwrap_or(now);
        Some((until - start).num_minutes().max(0))
    }

    /// Biomass fed over the shift in kg.
    ///
    /// A recorded total wins; otherwise the feed rate times the shift
    /// duration.
    #[must_use]
    pub fn input_mass_kg(&self, now: DateTime<Utc>) -> Option<f64> {
        if let Some(total) = self.biomass_kg {
            return Some(total);
        }
        let rate = self.feed_rate_kg_per_min?;
        #[allow(clippy::cast_precision_loss)]
        let minutes = self.duration_minutes(now)? as f64;
        Some(rate * minutes)
    }

    /// Biochar produced in kg: the recorded total, else the sum of batch weights.
    #[must_use]
    pub fn output_mass_kg(&self) -> Option<f64> {
        self.biochar_kg.or_else(|| {
            (!self.batch_weights.is_empty()).then(|| self.batch_weights.iter().sum())
        })
    }

    /// Stored fields plus legacy-named aliases for anything missing.
    #[must_use]
    pub fn compat_fields(&self) -> Fields {
        let mut out = self.fields.clone();
        alias(
            &mut out,
            legacy::DATE,
            self.start.map(|s| Value::from(s.to_rfc3339())),
        );
        alias(&mut out, legacy::OPERATOR, self.operator.clone().map(Value::from));
        alias(&mut out, legacy::SUPERVISOR, self.supervisor.clone().map(Value::from));
        alias(&mut out, legacy::PROCESS_ID, self.process_id.clone().map(Value::from));
        alias(&mut out, legacy::PERIOD, self.period.map(|p| Value::from(p.label())));
        alias(
            &mut out,
            legacy::TEMPERATURE_START,
            self.temperature_start.map(Value::from),
        );
        alias(
            &mut out,
            legacy::TEMPERATURE_END,
            self.temperature_end.map(Value::from),
        );
        alias(&mut out, legacy::BIOMASS, self.biomass_kg.map(Value::from));
        alias(&mut out, legacy::BIOCHAR, self.output_mass_kg().map(Value::from));
        alias(
            &mut out,
            legacy::OBSERVATIONS,
            self.observations.clone().map(Value::from),
        );
        alias(
            &mut out,
            legacy::STATUS,
            self.status().legacy_label().map(Value::from),
        );
        out
    }
}

fn alias(out: &mut Fields, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        if !out.contains(key) {
            out.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record(fields: Value) -> Record {
        Record {
            id: "recShift1".to_string(),
            created_time: None,
            fields: serde_json::from_value(fields).unwrap(),
        }
    }

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 26, h, m, 0).unwrap()
    }

    #[test]
    fn test_detect_legacy() {
        let shape = ShiftShape::detect(
            &serde_json::from_value(json!({"fecha": "2025-04-26", "operador": "Ana"})).unwrap(),
        );
        assert_eq!(shape.generation(), SchemaGeneration::Legacy);
    }

    #[test]
    fn test_detect_rich() {
        let shape = ShiftShape::detect(
            &serde_json::from_value(json!({"Fecha Inicio Turno": "2025-04-26T08:00:00Z"}))
                .unwrap(),
        );
        assert_eq!(shape.generation(), SchemaGeneration::Rich);
    }

    #[test]
    fn test_normalize_legacy() {
        let shift = Shift::from_record(record(json!({
            "fecha": "2025-04-26T08:00:00Z",
            "turno": "Mañana",
            "operador": "Ana",
            "supervisor": "Luis",
            "temperatura_inicio": 380,
            "temperatura_fin": 420,
            "biomasa_kg": 1000,
            "biochar_kg": 250,
            "estado": "Completado"
        })))
        .unwrap();

        assert_eq!(shift.schema, SchemaGeneration::Legacy);
        assert_eq!(shift.start, Some(ts(8, 0)));
        assert_eq!(shift.period, Some(ShiftPeriod::Morning));
        assert_eq!(shift.operator.as_deref(), Some("Ana"));
        assert_eq!(shift.temperature_end, Some(420.0));
        assert_eq!(shift.biomass_kg, Some(1000.0));
        assert_eq!(shift.status(), ShiftStatus::Completed);
    }

    #[test]
    fn test_normalize_rich() {
        let shift = Shift::from_record(record(json!({
            "Fecha Inicio Turno": "2025-04-26T08:00:00.000Z",
            "Operador": "Ana",
            "Estado Inicial Planta": "Encendida",
            "Consumo Energia Inicio": 100,
            "Consumo Energia Fin": 160,
            "🎙️ Alimentación Biomasa Húmeda Por Minuto (Kg)": 5,
            "Temperatura Horno (H1) (from Balances Masa)": [321, 315],
            "Peso Biochar (KG) (from Balances Masa)": [25, 25],
            "Balances Masa": ["recA", "recB"]
        })))
        .unwrap();

        assert_eq!(shift.schema, SchemaGeneration::Rich);
        assert_eq!(shift.plant_state_start, Some(PlantState::On));
        assert_eq!(shift.energy.consumed(), Some(60.0));
        assert_eq!(shift.gas.consumed(), None);
        assert_eq!(shift.batch_temperatures, vec![321.0, 315.0]);
        assert_eq!(shift.output_mass_kg(), Some(50.0));
        assert_eq!(shift.links.mass_balances, vec!["recA", "recB"]);
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let err = Shift::from_record(record(json!({
            "Fecha Inicio Turno": "2025-04-26T10:00:00Z",
            "Fecha Fin Turno": "2025-04-26T09:00:00Z"
        })))
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("recShift1"));
    }

    #[test]
    fn test_status_open_and_running_is_active() {
        let shift = Shift::from_record(record(json!({
            "Fecha Inicio Turno": "2025-04-26T08:00:00Z",
            "Estado Inicial Planta": "Encendida"
        })))
        .unwrap();
        assert_eq!(shift.status(), ShiftStatus::Active);
    }

    #[test]
    fn test_status_end_state_overrides_start_state() {
        let shift = Shift::from_record(record(json!({
            "Estado Inicial Planta": "Apagada",
            "Estado Final Planta": "Encendida"
        })))
        .unwrap();
        assert_eq!(shift.current_plant_state(), Some(PlantState::On));
        assert_eq!(shift.status(), ShiftStatus::Active);
    }

    #[test]
    fn test_status_closed_is_completed() {
        let shift = Shift::from_record(record(json!({
            "Fecha Inicio Turno": "2025-04-26T08:00:00Z",
            "Fecha Fin Turno": "2025-04-26T16:00:00Z",
            "Estado Inicial Planta": "Encendida"
        })))
        .unwrap();
        assert_eq!(shift.status(), ShiftStatus::Completed);
    }

    #[test]
    fn test_status_legacy_declared() {
        let suspended = Shift::from_record(record(json!({"estado": "Suspendido"}))).unwrap();
        assert_eq!(suspended.status(), ShiftStatus::Suspended);

        let active = Shift::from_record(record(json!({"estado": "Activo"}))).unwrap();
        assert_eq!(active.status(), ShiftStatus::Active);

        let blank = Shift::from_record(record(json!({"operador": "Ana"}))).unwrap();
        assert_eq!(blank.status(), ShiftStatus::Unknown);
    }

    #[test]
    fn test_status_plant_off_open_is_unknown() {
        let shift = Shift::from_record(record(json!({"Estado Inicial Planta": "Apagada"}))).unwrap();
        assert_eq!(shift.status(), ShiftStatus::Unknown);
    }

    #[test]
    fn test_input_mass_from_feed_rate() {
        let shift = Shift::from_record(record(json!({
            "Fecha Inicio Turno": "2025-04-26T08:00:00Z",
            "🎙️ Alimentación Biomasa Húmeda Por Minuto (Kg)": 2.5
        })))
        .unwrap();
        let now = ts(8, 0) + Duration::minutes(120);
        assert_eq!(shift.duration_minutes(now), Some(120));
        assert_eq!(shift.input_mass_kg(now), Some(300.0));
    }

    #[test]
    fn test_duration_never_negative() {
        let shift = Shift::from_record(record(json!({"Fecha Inicio Turno": "2025-04-26T08:00:00Z"})))
            .unwrap();
        assert_eq!(shift.duration_minutes(ts(7, 0)), Some(0));
    }

    #[test]
    fn test_recency_falls_back_to_created_time() {
        let mut rec = record(json!({"operador": "Ana"}));
        rec.created_time = Some(ts(6, 0));
        let shift = Shift::from_record(rec).unwrap();
        assert_eq!(shift.recency(), Some(ts(6, 0)));
    }

    #[test]
    fn test_compat_fields_adds_aliases_without_overwriting() {
        let shift = Shift::from_record(record(json!({
            "Fecha Inicio Turno": "2025-04-26T08:00:00Z",
            "Operador": "Ana",
            "Estado Inicial Planta": "Encendida",
            "Total Biochar Produccido Turno": 120
        })))
        .unwrap();
        let compat = shift.compat_fields();

        assert_eq!(compat.text("operador").as_deref(), Some("Ana"));
        assert_eq!(compat.text("Operador").as_deref(), Some("Ana"));
        assert_eq!(compat.number("biochar_kg"), Some(120.0));
        assert_eq!(compat.text("estado").as_deref(), Some("Activo"));
        assert!(compat.timestamp("fecha").is_some());
    }

    #[test]
    fn test_raw_fields_are_retained() {
        let shift = Shift::from_record(record(json!({"Operador": "Ana", "Custom": "x"}))).unwrap();
        assert_eq!(shift.fields.text("Custom").as_deref(), Some("x"));
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(PlantState::from_label(" ENCENDIDA "), Some(PlantState::On));
        assert_eq!(PlantState::from_label("?"), None);
        assert_eq!(ShiftPeriod::from_label("Noche"), Some(ShiftPeriod::Night));
        assert_eq!(PlantState::Off.label(), "Apagada");
    }

    #[test]
    fn test_meter_going_backwards() {
        let meter = Meter {
            start: Some(50.0),
            end: Some(40.0),
        };
        assert_eq!(meter.consumed(), Some(0.0));
    }
}
