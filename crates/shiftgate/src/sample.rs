//! Connection status and labelled sample data.
//!
//! An unconfigured gateway refuses every data call. Callers that opt in may
//! show the records below instead, but must label them with
//! [`DataSource::Sample`] so they are never mistaken for plant data.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{mask_token, AirtableConfig, ThresholdConfig};
use crate::entities::{Batch, MassBalance, Person, Process, TeamMember};
use crate::metrics::{compute_shift_view, ShiftContext, ShiftView};
use crate::record::{parse_timestamp, Fields, Record};
use crate::shift::Shift;

/// Origin of the data a caller is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched from the backend.
    #[default]
    Live,
    /// Built-in sample records.
    Sample,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Sample => write!(f, "sample"),
        }
    }
}

/// Payload tagged with where it came from, for machine-readable output.
///
/// Serializes as `{"source": "sample", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labelled<T> {
    /// Origin of `data`.
    pub source: DataSource,
    /// The records or record shown.
    pub data: T,
}

impl<T> Labelled<T> {
    /// Tag `data` with `source`.
    #[must_use]
    pub fn new(source: DataSource, data: T) -> Self {
        Self { source, data }
    }
}

/// Whether the gateway can reach the backend, and why not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Credentials are present and not placeholders.
    pub configured: bool,
    /// What is wrong with the credentials, empty when configured.
    pub problems: Vec<String>,
    /// REST endpoint.
    pub api_url: String,
    /// Base id, as configured.
    pub base_id: Option<String>,
    /// Masked token prefix.
    pub token: Option<String>,
    /// Data source callers fall back to.
    pub source: DataSource,
}

impl ConnectionStatus {
    /// Inspect backend settings. Performs no I/O.
    #[must_use]
    pub fn from_config(config: &AirtableConfig) -> Self {
        let problems = config.credential_problems();
        let configured = problems.is_empty();
        Self {
            configured,
            problems,
            api_url: config.api_url.clone(),
            base_id: config.base_id.clone(),
            token: config
                .access_token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(mask_token),
            source: if configured {
                DataSource::Live
            } else {
                DataSource::Sample
            },
        }
    }

    /// Check whether callers are limited to sample data.
    #[must_use]
    pub fn uses_sample_data(&self) -> bool {
        self.source == DataSource::Sample
    }
}

fn record(id: &str, created: &str, fields: Value) -> Record {
    let fields = match fields {
        Value::Object(map) => Fields::from(map),
        _ => Fields::new(),
    };
    Record {
        id: id.to_string(),
        created_time: parse_timestamp(created),
        fields,
    }
}

const BALANCE_IDS: [&str; 5] = [
    "recKj68fv5lPLmGL7",
    "recekJHRvu5toLSRn",
    "recGyReoq3oDqLucX",
    "recczzeanzGXRg3h4",
    "recliY4VrrZMZQWMl",
];

/// Sample mass-balance readings, newest first.
#[must_use]
pub fn mass_balances() -> Vec<MassBalance> {
    // date, R1, R2, R3, H1, H2, H3, H4
    let readings: [(&str, [f64; 7]); 5] = [
        ("2025-04-26T00:36:28.000Z", [399.0, 412.0, 413.0, 321.0, 820.0, 414.0, 234.0]),
        ("2025-04-26T01:34:20.000Z", [377.0, 370.0, 370.0, 315.0, 795.0, 401.0, 215.0]),
        ("2025-04-26T01:59:55.000Z", [374.0, 363.0, 363.0, 311.0, 786.0, 399.0, 191.0]),
        ("2025-04-26T02:36:08.000Z", [421.0, 476.0, 477.0, 321.0, 771.0, 408.0, 144.0]),
        ("2025-04-26T03:26:12.000Z", [412.0, 443.0, 444.0, 321.0, 784.0, 411.0, 186.0]),
    ];
    let mut balances: Vec<MassBalance> = BALANCE_IDS
        .iter()
        .zip(readings)
        .map(|(id, (date, t))| {
            MassBalance::from_record(record(
                id,
                date,
                json!({
                    "Fecha": date,
                    "Peso Biochar (KG)": 25.0,
                    "Temperatura Reactor (R1)": t[0],
                    "Temperatura Reactor (R2)": t[1],
                    "Temperatura Reactor (R3)": t[2],
                    "Temperatura Horno (H1)": t[3],
                    "Temperatura Horno (H2)": t[4],
                    "Temperatura Horno (H3)": t[5],
                    "Temperatura Horno (H4)": t[6],
                    "Temperatura Ducto (G9)": 0.0
                }),
            ))
        })
        .collect();
    balances.reverse();
    balances
}

/// Sample pyrolysis batches, newest first.
#[must_use]
pub fn batches() -> Vec<Batch> {
    vec![
        Batch::from_record(record(
            "recNkbSNPnpdGyjXJ",
            "2025-05-05T19:56:22.000Z",
            json!({
                "Auto Number": 3,
                "Fecha Creacion": "2025-05-05T19:56:22.000Z",
                "Codigo Bache": "S-00085",
                "Recuento Lonas": 20,
                "Total Biochar Bache (KG)": 0,
                "Estado Bache": "Bache Agotado",
                "Total Biochar Humedo Bache (KG)": 76,
                "Cantidad Biochar Vendido": [500]
            }),
        )),
        Batch::from_record(record(
            "recrQR3t1FUjr8Ju0",
            "2025-04-30T02:01:15.000Z",
            json!({
                "Auto Number": 2,
                "Fecha Creacion": "2025-04-30T02:01:15.000Z",
                "Codigo Bache": "S-00084",
                "Recuento Lonas": 20,
                "Total Biochar Bache (KG)": 0,
                "Estado Bache": "Bache Agotado",
                "Total Biochar Humedo Bache (KG)": 82,
                "Cantidad Biochar Vendido": [500]
            }),
        )),
        Batch::from_record(record(
            "recK6JEgdsYSAeqB0",
            "2025-04-26T00:36:27.000Z",
            json!({
                "Auto Number": 1,
                "Fecha Creacion": "2025-04-26T00:36:27.000Z",
                "Codigo Bache": "S-00083",
                "Recuento Lonas": 20,
                "Total Biochar Bache (KG)": 500,
                "Estado Bache": "Esperando Pesaje",
                "Biochar Humedo (KG)": 500
            }),
        )),
    ]
}

/// Sample team roster.
#[must_use]
pub fn team_members() -> Vec<TeamMember> {
    vec![
        TeamMember::from_record(record(
            "sample-1",
            "",
            json!({
                "Nombre": "Sample User 1",
                "Cedula": "1234567",
                "Cargo": "Developer",
                "Estado_Operador": "Normal"
            }),
        )),
        TeamMember::from_record(record(
            "sample-2",
            "",
            json!({
                "Nombre": "Sample User 2",
                "Cedula": "7654321",
                "Cargo": "Plant operator",
                "Estado_Operador": "Normal"
            }),
        )),
    ]
}

/// Sample identity lookup: matches the sample roster only.
#[must_use]
pub fn identity(code: &str) -> Option<TeamMember> {
    let code = code.trim();
    team_members()
        .into_iter()
        .find(|m| m.identity_code.as_deref() == Some(code))
}

/// Sample active staff.
#[must_use]
pub fn personnel() -> Vec<Person> {
    [
        ("sample-p1", "Sample Operator", "Operador", "Mañana"),
        ("sample-p2", "Sample Supervisor", "Supervisor", "Tarde"),
    ]
    .into_iter()
    .map(|(id, name, role, period)| {
        Person::from_record(record(
            id,
            "",
            json!({"nombre": name, "cargo": role, "turno_preferido": period, "activo": true}),
        ))
    })
    .collect()
}

/// Sample lots in progress.
#[must_use]
pub fn processes() -> Vec<Process> {
    vec![Process::from_record(record(
        "sample-lot1",
        "",
        json!({
            "lote_id": "L-SAMPLE-1",
            "fecha_inicio": "2025-04-26T00:30:00.000Z",
            "tipo_biomasa": "Pine chips",
            "cantidad_inicial": 1500,
            "temperatura_proceso": 410,
            "estado": "En_Proceso"
        }),
    ))]
}

/// Sample open shift linked to the sample mass balances.
#[must_use]
pub fn shifts() -> Vec<Shift> {
    let shift = record(
        "sample-shift1",
        "2025-04-26T00:30:00.000Z",
        json!({
            "Fecha Inicio Turno": "2025-04-26T00:30:00.000Z",
            "Operador": "Sample Operator",
            "Estado Inicial Planta": "Encendida",
            "Consumo Energia Inicio": 1200,
            "Consumo Gas Inicial": 40,
            "🎙️ Alimentación Biomasa Húmeda Por Minuto (Kg)": 5,
            "🎙️ Herzt Tolva 2": 30,
            "Balances Masa": BALANCE_IDS,
            "Temperatura Horno (H1) (from Balances Masa)": [321, 315, 311, 321, 321],
            "Peso Biochar (KG) (from Balances Masa)": [25, 25, 25, 25, 25]
        }),
    );
    Shift::from_record(shift).into_iter().collect()
}

/// Sample view of the current shift, labelled as sample data.
#[must_use]
pub fn shift_view(thresholds: &ThresholdConfig, now: DateTime<Utc>) -> Option<ShiftView> {
    let shift = shifts().into_iter().next()?;
    let context = ShiftContext {
        personnel: personnel(),
        processes: processes(),
        mass_balances: mass_balances(),
        source: DataSource::Sample,
    };
    Some(compute_shift_view(shift, context, thresholds, now))
}
