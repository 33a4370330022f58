use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use otx_cli::{
    check_contract, contract_hash, query_can_cancel, run_operation, Operation, OperationInput,
    OperationOutcome,
};
use otx_core::Event;

#[derive(Parser)]
#[command(name = "otx", version, about = "Run smart-contract clauses against a JSON ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a contract without running anything
    Check(CheckArgs),
    /// Activate a draft contract (fires cron_activate)
    Activate(OpArgs),
    /// Run one processing pass (fires cron_process)
    Process(OpArgs),
    /// Execute a clause on behalf of a party
    Trigger(TriggerArgs),
    /// Cancel the contract on behalf of a party
    Cancel(PartyArgs),
    /// Deactivate the contract (fires hook_deactivate)
    Deactivate(OpArgs),
    /// Ask whether a party may cancel the contract (never writes)
    CanCancel(QueryArgs),
    /// Print the contract's content hash
    Hash(HashArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// Contract JSON file
    contract: PathBuf,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct OpArgs {
    /// Contract JSON file
    contract: PathBuf,

    /// Ledger JSON file
    #[arg(long, value_name = "PATH")]
    ledger: PathBuf,

    /// Configuration file (default: otx.toml next to the contract)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the updated contract and ledger back to disk
    #[arg(long)]
    write: bool,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TriggerArgs {
    #[command(flatten)]
    op: OpArgs,

    /// Party triggering the clause
    #[arg(long)]
    party: String,

    /// Clause to run
    #[arg(long)]
    clause: String,
}

#[derive(Args)]
struct PartyArgs {
    #[command(flatten)]
    op: OpArgs,

    /// Party cancelling
    #[arg(long)]
    party: String,
}

#[derive(Args)]
struct QueryArgs {
    /// Contract JSON file
    contract: PathBuf,

    /// Ledger JSON file
    #[arg(long, value_name = "PATH")]
    ledger: PathBuf,

    /// Configuration file (default: otx.toml next to the contract)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Party asking
    #[arg(long)]
    party: String,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct HashArgs {
    /// Contract JSON file
    contract: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check(args) => run_check(args),
        Commands::Activate(args) => run_op(args, Operation::Activate),
        Commands::Process(args) => run_op(args, Operation::Process),
        Commands::Trigger(args) => run_op(
            args.op,
            Operation::Trigger {
                party: args.party,
                clause: args.clause,
            },
        ),
        Commands::Cancel(args) => run_op(args.op, Operation::Cancel { party: args.party }),
        Commands::Deactivate(args) => run_op(args, Operation::Deactivate),
        Commands::CanCancel(args) => run_can_cancel(args),
        Commands::Hash(args) => run_hash(args),
    };

    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    let report = check_contract(&args.contract)?;
    if args.json {
        let json = serde_json::to_string(&report).map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
    } else {
        println!("contract={}", report.contract);
        println!("state={}", report.state.as_str());
        println!("parties={}", report.parties);
        println!("bylaws={}", report.bylaws);
        println!("clauses={}", report.clauses);
        println!("valid={}", report.is_valid());
        for problem in &report.problems {
            println!("problem={}", problem);
        }
    }
    if report.is_valid() {
        Ok(())
    } else {
        Err(format!("{} problem(s) found", report.problems.len()))
    }
}

fn run_op(args: OpArgs, operation: Operation) -> Result<(), String> {
    let outcome = run_operation(OperationInput {
        contract: args.contract,
        ledger: args.ledger,
        config: args.config,
        operation,
        write: args.write,
    })?;

    if args.json {
        let json =
            serde_json::to_string(&outcome).map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &OperationOutcome) {
    println!("operation={}", outcome.operation);
    println!("contract={}", outcome.contract);
    println!("state={}", outcome.state.as_str());
    println!("active={}", outcome.active);
    println!("content_hash={}", outcome.content_hash);
    println!("written={}", outcome.written);
    println!("events={}", outcome.trace.len());
    for event in outcome.trace.events() {
        println!("event={}", describe_event(event));
    }
}

fn describe_event(event: &Event) -> String {
    match event {
        Event::Activated { contract } => format!("activated {}", contract),
        Event::Deactivated { contract } => format!("deactivated {}", contract),
        Event::ClauseExecuted {
            bylaw,
            clause,
            trigger,
            result,
        } => match result {
            Some(value) => format!("clause {}.{} ({}) -> {}", bylaw, clause, trigger, value),
            None => format!("clause {}.{} ({})", bylaw, clause, trigger),
        },
        Event::VariableChanged {
            bylaw,
            variable,
            from,
            to,
            important,
        } => format!(
            "variable {}.{} {} -> {}{}",
            bylaw,
            variable,
            from,
            to,
            if *important { " (important)" } else { "" }
        ),
        Event::FundsMoved { from, to, amount } => format!("moved {} {} -> {}", amount, from, to),
        Event::FundsStashed {
            account,
            stash,
            instrument_definition_id,
            amount,
        } => format!(
            "stashed {} {} from {} into {}",
            amount, instrument_definition_id, account, stash
        ),
        Event::FundsUnstashed {
            account,
            stash,
            instrument_definition_id,
            amount,
        } => format!(
            "unstashed {} {} from {} into {}",
            amount, instrument_definition_id, stash, account
        ),
        Event::NoticeSent { party, reason } => format!("notice {}: {}", party, reason),
        Event::NativeCallFailed { function, reason } => format!("failed {}: {}", function, reason),
    }
}

fn run_can_cancel(args: QueryArgs) -> Result<(), String> {
    let allowed = query_can_cancel(
        &args.contract,
        &args.ledger,
        args.config.as_deref(),
        &args.party,
    )?;
    if args.json {
        println!(
            "{}",
            serde_json::json!({ "party": args.party, "can_cancel": allowed })
        );
    } else {
        println!("party={}", args.party);
        println!("can_cancel={}", allowed);
    }
    Ok(())
}

fn run_hash(args: HashArgs) -> Result<(), String> {
    let hash = contract_hash(&args.contract)?;
    println!("content_hash={}", hash);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_cancel_is_read_only() {
        let base = [
            "otx",
            "can-cancel",
            "contract.json",
            "--ledger",
            "ledger.json",
            "--party",
            "alice",
        ];
        let cli = Cli::try_parse_from(base).expect("parse");
        assert!(matches!(cli.command, Commands::CanCancel(ref args) if args.party == "alice"));

        let with_write = base.iter().copied().chain(["--write"]);
        assert!(Cli::try_parse_from(with_write).is_err());
    }

    #[test]
    fn cancel_accepts_write() {
        let cli = Cli::try_parse_from([
            "otx",
            "cancel",
            "contract.json",
            "--ledger",
            "ledger.json",
            "--party",
            "bob",
            "--write",
        ])
        .expect("parse");
        assert!(matches!(cli.command, Commands::Cancel(ref args) if args.op.write));
    }
}
