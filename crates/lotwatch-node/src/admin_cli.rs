//! lotwatch-admin CLI tool
//!
//! Manages phases, blocks, lots, assignments and residents on a running
//! lotwatch-node.
//!
//! Usage:
//!   lotwatch-admin list-phases
//!   lotwatch-admin select <phase> [block]
//!   lotwatch-admin show [query]
//!   lotwatch-admin add-lots <from> <to>
//!   lotwatch-admin delete-lot <lot_id> [--yes]
//!   lotwatch-admin ping

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    Ping,
    ListPhases,
    AddPhase { name: String },
    AddBlock { phase_id: String, name: String },
    DeletePhase { phase_id: String, confirm: bool },
    DeleteBlock { phase_id: String, block_id: String, confirm: bool },
    Select { phase: String, block: Option<String> },
    Show { query: Option<String> },
    AddLot { lot_no: i64 },
    AddLots { from: i64, to: i64 },
    Assign { lot_id: String, resident_id: String, confirm: bool },
    ClearAssignment { lot_id: String },
    DeleteLot { lot_id: String, confirm: bool },
    PutResident { resident: Value },
    ListResidents { query: Value },
    Expand { lot_no: Option<u32> },
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    ConfirmationRequired { message: String },
    Phases { phases: Vec<PhaseView> },
    Lots {
        phase: String,
        block: String,
        rows: Vec<LotRowView>,
        warnings: Vec<Value>,
    },
    Residents { residents: Vec<ResidentView> },
    Pong,
}

#[derive(Debug, Deserialize)]
struct PhaseView {
    id: String,
    name: String,
    blocks: Vec<BlockView>,
}

#[derive(Debug, Deserialize)]
struct BlockView {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotRowView {
    lot: LotView,
    resident_id: Option<String>,
    resident_name: Option<String>,
    state: String,
    expanded: bool,
}

#[derive(Debug, Deserialize)]
struct LotView {
    id: String,
    label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResidentView {
    id: String,
    first_name: String,
    last_name: String,
    lot: String,
}

fn print_usage() {
    eprintln!("lotwatch-admin - Manage the Lotwatch lot registry");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  lotwatch-admin list-phases                         List phases and blocks");
    eprintln!("  lotwatch-admin add-phase <name>                    Add a phase");
    eprintln!("  lotwatch-admin add-block <phase_id> <name>         Add a block to a phase");
    eprintln!("  lotwatch-admin delete-phase <phase_id> [--yes]     Delete a phase and its lots");
    eprintln!("  lotwatch-admin delete-block <phase_id> <block_id> [--yes]");
    eprintln!("                                                     Delete a block and its lots");
    eprintln!("  lotwatch-admin select <phase> [block]              Select phase/block by name");
    eprintln!("  lotwatch-admin show [query]                        Show reconciled lots");
    eprintln!("  lotwatch-admin add-lot <n>                         Add one lot");
    eprintln!("  lotwatch-admin add-lots <from> <to>                Add missing lots in a range");
    eprintln!("  lotwatch-admin assign <lot_id> <resident_id> [--yes]");
    eprintln!("                                                     Assign a resident to a lot");
    eprintln!("  lotwatch-admin clear <lot_id>                      Clear a lot's assignment");
    eprintln!("  lotwatch-admin delete-lot <lot_id> [--yes]         Delete a lot");
    eprintln!("  lotwatch-admin put-resident <json>                 Create or replace a resident");
    eprintln!("  lotwatch-admin residents [query]                   List residents");
    eprintln!("  lotwatch-admin expand [n]                          Expand a lot row (none collapses)");
    eprintln!("  lotwatch-admin ping                                Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LOTWATCH_SOCKET  Path to admin socket (default: ./lotwatch-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("LOTWATCH_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./lotwatch-data/admin.sock"))
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to lotwatch-node at {:?}: {}\n\
             Is the lotwatch-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn arg(args: &[String], i: usize, what: &str) -> String {
    match args.get(i) {
        Some(a) => a.clone(),
        None => fail(&format!("{} requires a {} argument", args[1], what)),
    }
}

fn number(args: &[String], i: usize, what: &str) -> i64 {
    arg(args, i, what)
        .parse()
        .unwrap_or_else(|_| fail(&format!("{} must be a whole number", what)))
}

fn main() {
    let mut args: Vec<String> = std::env::args().collect();
    let confirm = args.iter().any(|a| a == "--yes" || a == "-y");
    args.retain(|a| a != "--yes" && a != "-y");

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match args[1].as_str() {
        "ping" => AdminCommand::Ping,
        "list-phases" => AdminCommand::ListPhases,
        "add-phase" => AdminCommand::AddPhase {
            name: args[2..].join(" "),
        },
        "add-block" => AdminCommand::AddBlock {
            phase_id: arg(&args, 2, "phase_id"),
            name: args.get(3..).map(|a| a.join(" ")).unwrap_or_default(),
        },
        "delete-phase" => AdminCommand::DeletePhase {
            phase_id: arg(&args, 2, "phase_id"),
            confirm,
        },
        "delete-block" => AdminCommand::DeleteBlock {
            phase_id: arg(&args, 2, "phase_id"),
            block_id: arg(&args, 3, "block_id"),
            confirm,
        },
        "select" => AdminCommand::Select {
            phase: arg(&args, 2, "phase"),
            block: args.get(3).cloned(),
        },
        "show" => AdminCommand::Show {
            query: args.get(2).cloned(),
        },
        "add-lot" => AdminCommand::AddLot {
            lot_no: number(&args, 2, "lot number"),
        },
        "add-lots" => AdminCommand::AddLots {
            from: number(&args, 2, "from"),
            to: number(&args, 3, "to"),
        },
        "assign" => AdminCommand::Assign {
            lot_id: arg(&args, 2, "lot_id"),
            resident_id: arg(&args, 3, "resident_id"),
            confirm,
        },
        "clear" => AdminCommand::ClearAssignment {
            lot_id: arg(&args, 2, "lot_id"),
        },
        "delete-lot" => AdminCommand::DeleteLot {
            lot_id: arg(&args, 2, "lot_id"),
            confirm,
        },
        "put-resident" => {
            let json = arg(&args, 2, "json");
            match serde_json::from_str(&json) {
                Ok(resident) => AdminCommand::PutResident { resident },
                Err(e) => fail(&format!("invalid resident json: {}", e)),
            }
        }
        "residents" => AdminCommand::ListResidents {
            query: serde_json::json!({ "text": args.get(2).cloned().unwrap_or_default() }),
        },
        "expand" => AdminCommand::Expand {
            lot_no: match args.get(2) {
                Some(n) => match n.parse() {
                    Ok(n) => Some(n),
                    Err(_) => fail("lot number must be a positive whole number"),
                },
                None => None,
            },
        },
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => fail(&error),
            AdminResponse::ConfirmationRequired { message } => {
                eprintln!("{}", message);
                eprintln!("Re-run with --yes to proceed.");
                std::process::exit(2);
            }
            AdminResponse::Phases { phases } => {
                if phases.is_empty() {
                    println!("(none)");
                }
                for phase in phases {
                    println!("{} ({})", phase.name, phase.id);
                    for block in phase.blocks {
                        println!("  {} ({})", block.name, block.id);
                    }
                }
            }
            AdminResponse::Lots {
                phase,
                block,
                rows,
                warnings,
            } => {
                println!("{} / {}", phase, block);
                if rows.is_empty() {
                    println!("(no lots)");
                }
                for row in rows {
                    let marker = if row.expanded { ">" } else { " " };
                    let occupant = match (row.resident_name, row.resident_id) {
                        (Some(name), Some(id)) => format!("{} ({})", name, id),
                        _ => "-".to_string(),
                    };
                    println!(
                        "{} {:<10} {:<10} {}  [{}]",
                        marker, row.lot.label, row.state, occupant, row.lot.id
                    );
                }
                for warning in warnings {
                    eprintln!("warning: {}", warning);
                }
            }
            AdminResponse::Residents { residents } => {
                if residents.is_empty() {
                    println!("(none)");
                }
                for r in residents {
                    println!("{}  {} {}  {}", r.id, r.first_name, r.last_name, r.lot);
                }
            }
            AdminResponse::Pong => {
                println!("pong - lotwatch-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
