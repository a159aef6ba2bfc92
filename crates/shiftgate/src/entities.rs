//! Personnel, process, mass-balance and batch records.
//!
//! Each type is built from a backend [`Record`] with `from_record`. Columns
//! that are missing or hold the wrong type read as `None`; the original
//! field map is kept on every entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{Fields, Record};
use crate::shift::ShiftPeriod;

/// Job role of a staff member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Operador.
    Operator,
    /// Supervisor.
    Supervisor,
    /// Técnico.
    Technician,
    /// Any other stored value, kept verbatim.
    Other(String),
}

impl Role {
    /// Parse a stored label. Unknown labels are preserved as [`Role::Other`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "operador" | "operator" => Self::Operator,
            "supervisor" => Self::Supervisor,
            "técnico" | "tecnico" | "technician" => Self::Technician,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    /// Label as stored in the table.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Operator => "Operador",
            Self::Supervisor => "Supervisor",
            Self::Technician => "Técnico",
            Self::Other(s) => s,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A staff member from the personnel table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: String,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub preferred_shift: Option<ShiftPeriod>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Checkbox columns are omitted when unchecked, so absent reads as inactive.
    pub active: bool,
    #[serde(skip)]
    pub fields: Fields,
}

impl Person {
    /// Build from a personnel record.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        let f = &record.fields;
        Self {
            name: f.first_text(&["nombre", "Nombre"]),
            role: f.first_text(&["cargo", "Cargo"]).map(|s| Role::from_label(&s)),
            preferred_shift: f
                .first_text(&["turno_preferido", "Turno Preferido"])
                .and_then(|s| ShiftPeriod::from_label(&s)),
            email: f.first_text(&["email", "Email"]),
            phone: f.first_text(&["telefono", "Telefono", "Teléfono"]),
            active: f
                .flag("activo")
                .or_else(|| f.flag("Activo"))
                .unwrap_or(false),
            id: record.id,
            fields: record.fields,
        }
    }
}

/// Workflow state of a team member in the field app.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorState {
    /// Esperando_Audio: a voice note is expected.
    AwaitingAudio,
    /// Normal.
    Normal,
    /// Manipular_Bache: handling a batch.
    HandlingBatch,
    /// Any other stored value.
    Other(String),
}

impl OperatorState {
    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Esperando_Audio" => Self::AwaitingAudio,
            "Normal" => Self::Normal,
            "Manipular_Bache" => Self::HandlingBatch,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Column holding the identity code in the team table.
pub const IDENTITY_CODE_FIELD: &str = "Cedula";

/// A member of the plant team, as used for sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMember {
    /// Record id.
    pub id: String,
    /// Member id column (`ID`).
    pub member_id: Option<String>,
    pub name: Option<String>,
    /// Identity document number. Used to sign in, so never serialized.
    #[serde(skip_serializing)]
    pub identity_code: Option<String>,
    /// Job title, free text.
    pub role: Option<String>,
    /// Chat id used for notifications.
    pub chat_id: Option<String>,
    pub operator_state: Option<OperatorState>,
}

impl TeamMember {
    /// Build from a team record.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        let f = &record.fields;
        Self {
            member_id: f.text("ID"),
            name: f.text("Nombre"),
            identity_code: f.text(IDENTITY_CODE_FIELD),
            role: f.text("Cargo"),
            chat_id: f.text("ID_Chat"),
            operator_state: f
                .text("Estado_Operador")
                .map(|s| OperatorState::from_label(&s)),
            id: record.id,
        }
    }
}

/// Column the process table is filtered on.
pub const PROCESS_STATUS_FIELD: &str = "Estado";

/// Status of a production lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// En_Proceso.
    InProcess,
    /// Completado.
    Completed,
    /// Suspendido.
    Suspended,
}

impl ProcessStatus {
    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace(' ', "_").as_str() {
            "en_proceso" | "in_process" => Some(Self::InProcess),
            "completado" | "completed" => Some(Self::Completed),
            "suspendido" | "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }

    /// Label as stored in the table.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::InProcess => "En_Proceso",
            Self::Completed => "Completado",
            Self::Suspended => "Suspendido",
        }
    }
}

impl std::str::FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown process status: {s}"))
    }
}

/// Biochar quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
}

impl QualityGrade {
    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            _ => None,
        }
    }
}

/// A production lot from the process table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Process {
    pub id: String,
    pub lot_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub biomass_type: Option<String>,
    /// Initial biomass quantity in kg.
    pub initial_quantity: Option<f64>,
    pub temperature: Option<f64>,
    /// Yield percentage as recorded.
    pub yield_percent: Option<f64>,
    pub quality: Option<QualityGrade>,
    pub status: Option<ProcessStatus>,
    #[serde(skip)]
    pub fields: Fields,
}

impl Process {
    /// Build from a process record.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        let f = &record.fields;
        Self {
            lot_id: f.text("lote_id"),
            started_at: f.timestamp("fecha_inicio"),
            finished_at: f.timestamp("fecha_fin"),
            biomass_type: f.text("tipo_biomasa"),
            initial_quantity: f.number("cantidad_inicial"),
            temperature: f.number("temperatura_proceso"),
            yield_percent: f.number("rendimiento"),
            quality: f
                .text("calidad_biochar")
                .and_then(|s| QualityGrade::from_label(&s)),
            status: f
                .first_text(&["estado", PROCESS_STATUS_FIELD])
                .and_then(|s| ProcessStatus::from_label(&s)),
            id: record.id,
            fields: record.fields,
        }
    }
}

/// Temperature sensors read with each mass balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemperatureChannel {
    R1,
    R2,
    R3,
    H1,
    H2,
    H3,
    H4,
    G9,
}

impl TemperatureChannel {
    /// Every channel, reactors first.
    pub const ALL: [Self; 8] = [
        Self::R1,
        Self::R2,
        Self::R3,
        Self::H1,
        Self::H2,
        Self::H3,
        Self::H4,
        Self::G9,
    ];

    /// Reactor channels.
    pub const REACTOR: [Self; 3] = [Self::R1, Self::R2, Self::R3];

    /// Column holding this channel.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::R1 => "Temperatura Reactor (R1)",
            Self::R2 => "Temperatura Reactor (R2)",
            Self::R3 => "Temperatura Reactor (R3)",
            Self::H1 => "Temperatura Horno (H1)",
            Self::H2 => "Temperatura Horno (H2)",
            Self::H3 => "Temperatura Horno (H3)",
            Self::H4 => "Temperatura Horno (H4)",
            Self::G9 => "Temperatura Ducto (G9)",
        }
    }
}

/// Column the mass-balance table is sorted on.
pub const MASS_BALANCE_DATE_FIELD: &str = "Fecha";
/// Column naming who recorded a mass balance.
pub const MASS_BALANCE_OPERATOR_FIELD: &str = "Operador";

/// One set of readings from the mass-balance table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassBalance {
    pub id: String,
    pub recorded_at: Option<DateTime<Utc>>,
    /// Biochar output weight in kg.
    pub biochar_kg: Option<f64>,
    pub operator: Option<String>,
    /// Readings by channel; channels without a reading are absent.
    pub temperatures: BTreeMap<TemperatureChannel, f64>,
}

impl MassBalance {
    /// Build from a mass-balance record.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        let f = &record.fields;
        let temperatures = TemperatureChannel::ALL
            .into_iter()
            .filter_map(|ch| f.number(ch.field_name()).map(|t| (ch, t)))
            .collect();
        Self {
            recorded_at: f
                .timestamp(MASS_BALANCE_DATE_FIELD)
                .or(record.created_time),
            biochar_kg: f.number("Peso Biochar (KG)"),
            operator: f.text(MASS_BALANCE_OPERATOR_FIELD),
            temperatures,
            id: record.id,
        }
    }

    /// Reading of one channel.
    #[must_use]
    pub fn temperature(&self, channel: TemperatureChannel) -> Option<f64> {
        self.temperatures.get(&channel).copied()
    }

    /// Mean over the given channels. Zero readings are treated as an idle
    /// sensor and skipped.
    #[must_use]
    pub fn mean_temperature(&self, channels: &[TemperatureChannel]) -> Option<f64> {
        let readings: Vec<f64> = channels
            .iter()
            .filter_map(|ch| self.temperature(*ch))
            .filter(|t| *t != 0.0)
            .collect();
        mean(&readings)
    }
}

/// Column the batch table is sorted on.
pub const BATCH_DATE_FIELD: &str = "Fecha Creacion";

/// A pyrolysis batch (a pallet of biochar bags).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub id: String,
    pub code: Option<String>,
    pub sequence: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    /// Number of bags.
    pub bag_count: Option<f64>,
    /// Dry biochar in kg.
    pub biochar_kg: Option<f64>,
    /// Wet biochar in kg.
    pub wet_biochar_kg: Option<f64>,
    /// Biochar sold from this batch, in kg.
    pub sold_kg: f64,
    pub sold: bool,
    pub status: Option<String>,
}

impl Batch {
    /// Build from a batch record.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        let f = &record.fields;
        Self {
            code: f.text("Codigo Bache"),
            sequence: f.number("Auto Number"),
            created_at: f.timestamp(BATCH_DATE_FIELD).or(record.created_time),
            bag_count: f.number("Recuento Lonas"),
            biochar_kg: f.number("Total Biochar Bache (KG)"),
            wet_biochar_kg: f.first_number(&["Total Biochar Humedo Bache (KG)", "Biochar Humedo (KG)"]),
            sold_kg: f.numbers("Cantidad Biochar Vendido").iter().sum(),
            sold: f.flag("Vendido").unwrap_or(false),
            status: f.text("Estado Bache"),
            id: record.id,
        }
    }
}

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = values.len() as f64;
    Some(values.iter().sum::<f64>() / count)
}
