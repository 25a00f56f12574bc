//! Unix socket server for admin commands.
//!
//! Provides a local IPC interface for managing the phase/block hierarchy,
//! lots, assignments and residents. One JSON command per line, one JSON
//! response per line.

use crate::controller::{
    add_lot_mutation, add_range_mutation, delete_phase_mutation, lot_mutation, ApplyOutcome,
    LoadOutcome, LotAction, ScopeController,
};
use crate::error::Result;
use crate::repository::{LotRepository, PreferenceStore};
use lotwatch_registry::{
    ConfirmReason, Lot, LotId, LotNo, Mutation, Occupancy, Phase, PhaseId, Resident, ResidentId,
    ResidentQuery, Scope, Warning,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Ping (health check)
    Ping,
    /// List phases with their blocks
    ListPhases,
    AddPhase { name: String },
    AddBlock { phase_id: PhaseId, name: String },
    DeletePhase {
        phase_id: PhaseId,
        #[serde(default)]
        confirm: bool,
    },
    DeleteBlock {
        phase_id: PhaseId,
        block_id: String,
        #[serde(default)]
        confirm: bool,
    },
    /// Change the selected phase/block by name
    Select {
        phase: String,
        #[serde(default)]
        block: Option<String>,
    },
    /// Reconciled lots of the selected scope
    Show {
        #[serde(default)]
        query: Option<String>,
    },
    /// Add one lot to the selected scope
    AddLot { lot_no: i64 },
    /// Add every free number of `from..=to` to the selected scope
    AddLots { from: i64, to: i64 },
    Assign {
        lot_id: LotId,
        resident_id: ResidentId,
        #[serde(default)]
        confirm: bool,
    },
    ClearAssignment { lot_id: LotId },
    DeleteLot {
        lot_id: LotId,
        #[serde(default)]
        confirm: bool,
    },
    PutResident { resident: Resident },
    ListResidents {
        #[serde(default)]
        query: ResidentQuery,
    },
    /// Remember the expanded lot row; `null` collapses it
    Expand {
        #[serde(default)]
        lot_no: Option<LotNo>,
    },
}

/// One reconciled lot, owned for the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LotRow {
    pub lot: Lot,
    pub resident_id: Option<ResidentId>,
    pub resident_name: Option<String>,
    pub ghost_assigned: bool,
    pub state: String,
    pub expanded: bool,
}

/// Response from admin command.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    ConfirmationRequired { message: String, reason: ConfirmReason },
    Phases { phases: Vec<Phase> },
    Lots {
        phase: String,
        block: String,
        scope: Option<Scope>,
        rows: Vec<LotRow>,
        warnings: Vec<Warning>,
    },
    Residents { residents: Vec<Resident> },
    Pong,
}

impl AdminResponse {
    fn error(e: impl ToString) -> Self {
        AdminResponse::Error {
            error: e.to_string(),
        }
    }
}

/// Admin socket server.
pub struct AdminSocket<R> {
    controller: Arc<ScopeController<R>>,
    socket_path: String,
}

impl<R> AdminSocket<R>
where
    R: LotRepository + PreferenceStore + 'static,
{
    /// Create a new admin socket server.
    pub fn new(controller: Arc<ScopeController<R>>, socket_path: &str) -> Self {
        Self {
            controller,
            socket_path: socket_path.to_string(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket file if present
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let controller = Arc::clone(&self.controller);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, controller).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }
}

async fn handle_connection<R>(stream: UnixStream, controller: Arc<ScopeController<R>>) -> Result<()>
where
    R: LotRepository + PreferenceStore + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &controller).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

pub async fn execute_command<R>(cmd: AdminCommand, controller: &ScopeController<R>) -> AdminResponse
where
    R: LotRepository + PreferenceStore + 'static,
{
    match cmd {
        AdminCommand::Ping => AdminResponse::Pong,

        AdminCommand::ListPhases => AdminResponse::Phases {
            phases: controller.snapshot().await.phases,
        },

        AdminCommand::AddPhase { name } => apply(controller, Mutation::AddPhase { name }, false).await,

        AdminCommand::AddBlock { phase_id, name } => {
            apply(controller, Mutation::AddBlock { phase_id, name }, false).await
        }

        AdminCommand::DeletePhase { phase_id, confirm } => {
            apply(controller, delete_phase_mutation(phase_id), confirm).await
        }

        AdminCommand::DeleteBlock {
            phase_id,
            block_id,
            confirm,
        } => {
            let scope = Scope::new(phase_id, block_id);
            apply(controller, Mutation::DeleteBlock { scope }, confirm).await
        }

        AdminCommand::Select { phase, block } => {
            match controller.select(&phase, block.as_deref()).await {
                Ok(LoadOutcome::Committed { lots }) => {
                    let view = controller.view().await;
                    AdminResponse::Ok {
                        message: format!("Selected {} / {} ({} lots)", view.phase, view.block, lots),
                    }
                }
                Ok(LoadOutcome::Stale) => AdminResponse::Ok {
                    message: "Selection superseded by a newer one".to_string(),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::Show { query } => show(controller, query).await,

        AdminCommand::AddLot { lot_no } => match selected(controller).await {
            Ok(scope) => match add_lot_mutation(scope, lot_no) {
                Ok(mutation) => apply(controller, mutation, false).await,
                Err(e) => AdminResponse::error(e),
            },
            Err(response) => response,
        },

        AdminCommand::AddLots { from, to } => match selected(controller).await {
            Ok(scope) => match add_range_mutation(scope, from, to) {
                Ok(mutation) => apply(controller, mutation, false).await,
                Err(e) => AdminResponse::error(e),
            },
            Err(response) => response,
        },

        AdminCommand::Assign {
            lot_id,
            resident_id,
            confirm,
        } => {
            let mutation = lot_mutation(LotAction::Assign(resident_id), lot_id);
            apply(controller, mutation, confirm).await
        }

        AdminCommand::ClearAssignment { lot_id } => {
            apply(controller, lot_mutation(LotAction::Clear, lot_id), false).await
        }

        AdminCommand::DeleteLot { lot_id, confirm } => {
            apply(controller, lot_mutation(LotAction::Delete, lot_id), confirm).await
        }

        AdminCommand::PutResident { resident } => {
            let repo = Arc::clone(controller.repository());
            let stored = resident.clone();
            let result = tokio::task::spawn_blocking(move || repo.put_resident(&stored)).await;
            match result.map_err(crate::Error::from).and_then(|r| r) {
                Ok(()) => {
                    tracing::info!("Saved resident {}", resident.id);
                    if let Err(e) = controller.refresh().await {
                        return AdminResponse::error(e);
                    }
                    AdminResponse::Ok {
                        message: format!("Saved resident {} ({})", resident.full_name(), resident.id),
                    }
                }
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::ListResidents { query } => {
            let snapshot = controller.snapshot().await;
            AdminResponse::Residents {
                residents: query.filter(&snapshot.residents).into_iter().cloned().collect(),
            }
        }

        AdminCommand::Expand { lot_no } => match controller.set_expanded(lot_no).await {
            Ok(()) => AdminResponse::Ok {
                message: match lot_no {
                    Some(n) => format!("Expanded {}", n.label()),
                    None => "Collapsed".to_string(),
                },
            },
            Err(e) => AdminResponse::error(e),
        },
    }
}

async fn apply<R>(controller: &ScopeController<R>, mutation: Mutation, confirm: bool) -> AdminResponse
where
    R: LotRepository + PreferenceStore + 'static,
{
    match controller.apply(mutation, confirm).await {
        Ok(ApplyOutcome::Applied { message }) => AdminResponse::Ok { message },
        Ok(ApplyOutcome::NeedsConfirmation(reason)) => AdminResponse::ConfirmationRequired {
            message: reason.to_string(),
            reason,
        },
        Ok(ApplyOutcome::Rejected(reason)) => AdminResponse::error(reason),
        Err(e) => AdminResponse::error(e),
    }
}

async fn selected<R>(controller: &ScopeController<R>) -> std::result::Result<Scope, AdminResponse>
where
    R: LotRepository + PreferenceStore + 'static,
{
    controller
        .scope()
        .await
        .ok_or_else(|| AdminResponse::error("no phase/block selected"))
}

async fn show<R>(controller: &ScopeController<R>, query: Option<String>) -> AdminResponse
where
    R: LotRepository + PreferenceStore + 'static,
{
    let snapshot = controller.snapshot().await;
    let query = query.map(ResidentQuery::text).unwrap_or_default();
    let view = snapshot.reconcile(&query);
    let expanded = snapshot.view.expanded();

    let rows = view
        .lots
        .iter()
        .map(|row| LotRow {
            lot: row.lot.clone(),
            resident_id: row.resident.map(|r| r.id.clone()),
            resident_name: row.resident.map(Resident::full_name),
            ghost_assigned: row.ghost_assigned,
            state: occupancy_name(&row.occupancy).to_string(),
            expanded: expanded == Some(row.lot.lot_no),
        })
        .collect();

    AdminResponse::Lots {
        phase: snapshot.view.phase.clone(),
        block: snapshot.view.block.clone(),
        scope: snapshot.scope.clone(),
        rows,
        warnings: view.warnings.clone(),
    }
}

fn occupancy_name(occupancy: &Occupancy) -> &'static str {
    match occupancy {
        Occupancy::Assigned => "assigned",
        Occupancy::Legacy => "legacy",
        Occupancy::Ghost => "ghost",
        Occupancy::Ambiguous { .. } => "ambiguous",
        Occupancy::Vacant => "vacant",
    }
}

/// Default socket path.
pub fn default_socket_path() -> String {
    let data_dir =
        std::env::var("LOTWATCH_DATA_DIR").unwrap_or_else(|_| "./lotwatch-data".to_string());
    format!("{}/admin.sock", data_dir)
}
