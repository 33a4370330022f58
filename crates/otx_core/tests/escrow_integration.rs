// End-to-end runs of an escrow contract: alice stashes the price on
// activation, releases it to bob by triggering a clause, and gets a refund
// if the contract ends before payment.

use otx_core::{
    AccountLedger, Agent, Bylaw, ContractState, EngineError, Event, ExecutionTrace,
    InMemoryLedger, Party, PartyAccount, PartyOwner, SmartContract, Trigger, Value,
    VariableAccess,
};

fn party(name: &str, nym: &str, account: &str, acct_id: &str) -> Party {
    let agent_name = format!("{}_agent", name);
    let mut party =
        Party::new(name, PartyOwner::Nym(nym.to_string()), agent_name.as_str()).expect("party");
    party
        .add_agent(Agent::individual(agent_name.as_str(), nym).expect("agent"))
        .expect("add agent");
    party
        .add_account(PartyAccount::new(account, acct_id, "usd", agent_name.as_str()).expect("account"))
        .expect("add account");
    party
}

fn escrow_bylaw() -> Bylaw {
    let mut bylaw = Bylaw::new("escrow").expect("bylaw");
    bylaw
        .add_integer_variable("price", 300, VariableAccess::Constant)
        .expect("price");
    bylaw
        .add_bool_variable("paid", false, VariableAccess::Persistent)
        .expect("paid");
    bylaw
        .add_string_variable("status", "pending", VariableAccess::Important)
        .expect("status");
    bylaw
        .add_integer_variable("ticks", 0, VariableAccess::Persistent)
        .expect("ticks");

    bylaw
        .add_clause(
            "on_activate",
            r#"stash_funds(acct_alice, "escrow_box", price); status = "funded";"#,
        )
        .expect("on_activate");
    bylaw
        .add_clause(
            "on_process",
            "ticks += 1;\nif (ticks >= 2) { deactivate_contract(); }",
        )
        .expect("on_process");
    bylaw
        .add_clause(
            "release",
            r#"unstash_funds("escrow_box", acct_bob, price); paid = true; status = "released";"#,
        )
        .expect("release");
    bylaw
        .add_clause(
            "on_deactivate",
            r#"
var left = get_stash_balance("escrow_box", get_acct_instrument_definition_id(acct_alice));
if (!paid && left > 0) {
    unstash_funds("escrow_box", acct_alice, left);
    status = "refunded";
}
"#,
        )
        .expect("on_deactivate");
    bylaw
        .add_clause("may_execute", r#"return param_party_name == "alice";"#)
        .expect("may_execute");
    bylaw
        .add_clause("may_cancel", "return !paid;")
        .expect("may_cancel");
    bylaw
        .add_clause("timer", "set_remaining_timer(get_remaining_timer() + 60);")
        .expect("timer");
    bylaw
        .add_clause("break_things", "ticks = 5;\nvar x = 1 / 0;")
        .expect("break_things");
    bylaw
        .add_clause(
            "overdraw",
            "paid = !move_funds(acct_alice, acct_bob, 5000);",
        )
        .expect("overdraw");

    bylaw.add_hook("cron_activate", "on_activate").expect("hook");
    bylaw.add_hook("cron_process", "on_process").expect("hook");
    bylaw.add_hook("hook_deactivate", "on_deactivate").expect("hook");
    bylaw
        .add_callback("callback_party_may_execute_clause", "may_execute")
        .expect("callback");
    bylaw
        .add_callback("callback_party_may_cancel_contract", "may_cancel")
        .expect("callback");
    bylaw
}

fn setup() -> (SmartContract, InMemoryLedger) {
    let mut ledger = InMemoryLedger::new();
    ledger
        .open_account("ACCT-ALICE", "nym_alice", "usd", 1_000)
        .expect("open");
    ledger
        .open_account("ACCT-BOB", "nym_bob", "usd", 0)
        .expect("open");

    let mut contract = SmartContract::new("escrow_deal").expect("contract");
    contract
        .add_party(party("alice", "nym_alice", "acct_alice", "ACCT-ALICE"))
        .expect("alice");
    contract
        .add_party(party("bob", "nym_bob", "acct_bob", "ACCT-BOB"))
        .expect("bob");
    contract.add_bylaw(escrow_bylaw()).expect("bylaw");
    (contract, ledger)
}

fn var(contract: &SmartContract, name: &str) -> Value {
    contract
        .bylaw("escrow")
        .and_then(|b| b.variable(name))
        .map(|v| v.value().clone())
        .expect("variable")
}

fn has(trace: &ExecutionTrace, pred: impl Fn(&Event) -> bool) -> bool {
    trace.events().iter().any(pred)
}

#[test]
fn activation_stashes_funds_and_notifies_parties() {
    let (mut contract, mut ledger) = setup();
    contract.validate().expect("valid contract");
    let trace = contract.activate(&mut ledger).expect("activate");

    assert!(contract.is_active());
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 700);
    assert_eq!(
        contract.stash("escrow_box").map(|s| s.amount("usd")),
        Some(300)
    );
    assert_eq!(var(&contract, "status"), Value::from("funded"));
    assert!(matches!(trace.events()[0], Event::Activated { .. }));
    assert!(has(&trace, |e| matches!(
        e,
        Event::FundsStashed { amount: 300, .. }
    )));
    assert!(has(&trace, |e| matches!(
        e,
        Event::VariableChanged { variable, important: true, .. } if variable == "status"
    )));
    let notified: Vec<&str> = trace
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::NoticeSent { party, .. } => Some(party.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(notified, vec!["alice", "bob"]);
    assert!(matches!(
        trace.events().last(),
        Some(Event::ClauseExecuted { clause, .. }) if clause == "on_activate"
    ));
}

#[test]
fn activation_requires_draft_state_and_owned_accounts() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");
    assert!(matches!(
        contract.activate(&mut ledger),
        Err(EngineError::ContractState(_))
    ));

    let mut contract = SmartContract::new("stolen").expect("contract");
    contract
        .add_party(party("alice", "nym_alice", "acct_alice", "ACCT-EVE"))
        .expect("alice");
    let mut ledger = InMemoryLedger::new();
    ledger
        .open_account("ACCT-EVE", "nym_eve", "usd", 50)
        .expect("open");
    assert!(matches!(
        contract.activate(&mut ledger),
        Err(EngineError::Ledger(_))
    ));
    assert_eq!(contract.state(), ContractState::Draft);
}

#[test]
fn trigger_clause_respects_execute_callback() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");

    assert!(!contract
        .can_execute_clause("bob", "release", &mut ledger)
        .expect("ask"));
    assert!(!contract
        .can_execute_clause("mallory", "release", &mut ledger)
        .expect("ask"));
    assert!(matches!(
        contract.trigger_clause("bob", "release", &mut ledger),
        Err(EngineError::NotPermitted { .. })
    ));

    let trace = contract
        .trigger_clause("alice", "release", &mut ledger)
        .expect("release");
    assert_eq!(ledger.balance("ACCT-BOB").expect("balance"), 300);
    assert_eq!(var(&contract, "paid"), Value::Bool(true));
    assert!(has(&trace, |e| matches!(
        e,
        Event::FundsUnstashed { amount: 300, .. }
    )));

    // Paid, so nobody may cancel any more.
    assert!(!contract.can_party_cancel("alice", &mut ledger).expect("ask"));
    assert!(matches!(
        contract.cancel("alice", &mut ledger),
        Err(EngineError::NotPermitted { .. })
    ));

    let trace = contract.deactivate(&mut ledger).expect("deactivate");
    assert_eq!(contract.state(), ContractState::Deactivated);
    assert!(has(&trace, |e| matches!(e, Event::Deactivated { .. })));
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 700);
    assert!(matches!(
        contract.process(&mut ledger),
        Err(EngineError::ContractState(_))
    ));
}

#[test]
fn process_deactivates_when_a_clause_asks_and_refunds() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");

    let first = contract.process(&mut ledger).expect("process");
    assert!(contract.is_active());
    assert!(!has(&first, |e| matches!(e, Event::Deactivated { .. })));
    assert_eq!(var(&contract, "ticks"), Value::Int(1));

    let second = contract.process(&mut ledger).expect("process");
    assert!(!contract.is_active());
    assert!(has(&second, |e| matches!(e, Event::Deactivated { .. })));
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 1_000);
    assert_eq!(var(&contract, "status"), Value::from("refunded"));
}

#[test]
fn cancel_by_party_refunds_unpaid_escrow() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");

    assert!(matches!(
        contract.cancel("mallory", &mut ledger),
        Err(EngineError::NotPermitted { .. })
    ));
    let trace = contract.cancel("bob", &mut ledger).expect("cancel");
    assert_eq!(contract.state(), ContractState::Deactivated);
    assert!(has(&trace, |e| matches!(
        e,
        Event::FundsUnstashed { account, amount: 300, .. } if account == "acct_alice"
    )));
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 1_000);
    assert_eq!(contract.stash("escrow_box").map(|s| s.amount("usd")), Some(0));
}

#[test]
fn failed_fund_movement_returns_false_without_aborting() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");

    let trace = contract
        .trigger_clause("alice", "overdraw", &mut ledger)
        .expect("overdraw runs");
    assert_eq!(var(&contract, "paid"), Value::Bool(true));
    assert!(has(&trace, |e| matches!(
        e,
        Event::NativeCallFailed { function, .. } if function == "move_funds"
    )));
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 700);
    assert_eq!(ledger.balance("ACCT-BOB").expect("balance"), 0);
}

#[test]
fn clause_errors_roll_back_variables() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");

    let err = contract
        .trigger_clause("alice", "break_things", &mut ledger)
        .expect_err("division by zero");
    assert!(matches!(err, EngineError::Runtime { .. }));
    assert_eq!(var(&contract, "ticks"), Value::Int(0));
    assert!(!contract.bylaw("escrow").expect("bylaw").is_dirty());
}

#[test]
fn clauses_can_read_and_set_the_timer() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");
    contract
        .trigger_clause("alice", "timer", &mut ledger)
        .expect("timer");
    contract
        .trigger_clause("alice", "timer", &mut ledger)
        .expect("timer");
    assert_eq!(contract.remaining_timer(), 120);
}

#[test]
fn validate_collects_every_problem() {
    let mut contract = SmartContract::new("broken").expect("contract");
    contract
        .add_party(party("alice", "nym_alice", "acct_alice", "ACCT-ALICE"))
        .expect("alice");

    let mut bylaw = Bylaw::new("rules").expect("bylaw");
    bylaw
        .add_integer_variable("alice", 1, VariableAccess::Persistent)
        .expect("variable");
    bylaw.add_clause("typo", "var = 1;").expect("clause");
    bylaw.add_clause("rogue", "launch_rockets();").expect("clause");
    bylaw.add_hook("cron_process", "ghost").expect("hook");
    contract.add_bylaw(bylaw).expect("bylaw");

    let problems = contract.validate().expect_err("invalid contract");
    let joined = problems.join("\n");
    assert!(joined.contains("variable 'alice'"), "{}", joined);
    assert!(joined.contains("typo"), "{}", joined);
    assert!(joined.contains("launch_rockets"), "{}", joined);
    assert!(joined.contains("ghost"), "{}", joined);

    let mut ledger = InMemoryLedger::new();
    assert!(matches!(
        contract.activate(&mut ledger),
        Err(EngineError::Invalid(_))
    ));
}

#[test]
fn contract_round_trips_through_json_file() {
    let (mut contract, mut ledger) = setup();
    contract.activate(&mut ledger).expect("activate");
    let before = contract.content_hash().expect("hash");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("contract.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&contract).expect("encode")).expect("write");
    let loaded: SmartContract =
        serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("decode");

    assert_eq!(loaded, contract);
    assert_eq!(loaded.content_hash().expect("hash"), before);
    assert_eq!(loaded.state(), ContractState::Active);

    contract.process(&mut ledger).expect("process");
    assert_ne!(contract.content_hash().expect("hash"), before);
}

/// Alice and bob with a single bylaw, active and funded.
fn active_with(bylaw: Bylaw) -> (SmartContract, InMemoryLedger) {
    let mut ledger = InMemoryLedger::new();
    ledger
        .open_account("ACCT-ALICE", "nym_alice", "usd", 100)
        .expect("open");
    ledger
        .open_account("ACCT-BOB", "nym_bob", "usd", 0)
        .expect("open");
    let mut contract = SmartContract::new("kiosk").expect("contract");
    contract
        .add_party(party("alice", "nym_alice", "acct_alice", "ACCT-ALICE"))
        .expect("alice");
    contract
        .add_party(party("bob", "nym_bob", "acct_bob", "ACCT-BOB"))
        .expect("bob");
    contract.add_bylaw(bylaw).expect("bylaw");
    contract.activate(&mut ledger).expect("activate");
    (contract, ledger)
}

#[test]
fn deactivation_asked_by_a_callback_does_not_carry_over() {
    let mut bylaw = Bylaw::new("rules").expect("bylaw");
    bylaw
        .add_clause("refuse", "deactivate_contract(); return false;")
        .expect("refuse");
    bylaw.add_clause("tick", "1;").expect("tick");
    bylaw.add_hook("cron_process", "tick").expect("hook");
    bylaw
        .add_callback("callback_party_may_cancel_contract", "refuse")
        .expect("callback");
    let (mut contract, mut ledger) = active_with(bylaw);

    assert!(!contract.can_party_cancel("alice", &mut ledger).expect("ask"));
    let trace = contract.process(&mut ledger).expect("process");
    assert!(contract.is_active());
    assert!(!has(&trace, |e| matches!(e, Event::Deactivated { .. })));

    assert!(matches!(
        contract.cancel("alice", &mut ledger),
        Err(EngineError::NotPermitted { .. })
    ));
    let trace = contract.process(&mut ledger).expect("process");
    assert!(contract.is_active());
    assert!(!has(&trace, |e| matches!(e, Event::Deactivated { .. })));
}

#[test]
fn callback_effects_appear_in_the_operation_trace() {
    let mut bylaw = Bylaw::new("rules").expect("bylaw");
    bylaw
        .add_integer_variable("asked", 0, VariableAccess::Important)
        .expect("asked");
    bylaw
        .add_clause("count_asks", "asked += 1; return true;")
        .expect("count_asks");
    bylaw.add_clause("noop", "1;").expect("noop");
    bylaw
        .add_callback("callback_party_may_execute_clause", "count_asks")
        .expect("callback");
    let (mut contract, mut ledger) = active_with(bylaw);

    let trace = contract
        .trigger_clause("alice", "noop", &mut ledger)
        .expect("trigger");
    assert_eq!(
        contract
            .bylaw("rules")
            .and_then(|b| b.variable("asked"))
            .map(|v| v.value().clone()),
        Some(Value::Int(1))
    );
    assert!(has(&trace, |e| matches!(
        e,
        Event::VariableChanged { variable, to: Value::Int(1), .. } if variable == "asked"
    )));
    assert!(has(&trace, |e| matches!(e, Event::NoticeSent { .. })));
    let clauses: Vec<(&str, &Trigger)> = trace
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::ClauseExecuted { clause, trigger, .. } => Some((clause.as_str(), trigger)),
            _ => None,
        })
        .collect();
    assert_eq!(
        clauses,
        vec![
            (
                "count_asks",
                &Trigger::Callback("callback_party_may_execute_clause".to_string())
            ),
            ("noop", &Trigger::Party("alice".to_string())),
        ]
    );
}

#[test]
fn failed_stash_leaves_no_stash_behind() {
    let mut bylaw = Bylaw::new("rules").expect("bylaw");
    bylaw
        .add_clause("hoard", r#"stash_funds(acct_alice, "pool", 5000);"#)
        .expect("hoard");
    let (mut contract, mut ledger) = active_with(bylaw);
    let before = contract.content_hash().expect("hash");

    let trace = contract
        .trigger_clause("alice", "hoard", &mut ledger)
        .expect("hoard runs");
    assert!(has(&trace, |e| matches!(
        e,
        Event::NativeCallFailed { function, .. } if function == "stash_funds"
    )));
    assert!(contract.stash("pool").is_none());
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 100);
    assert_eq!(contract.content_hash().expect("hash"), before);
}

#[test]
fn stash_names_cannot_take_bound_names() {
    let mut bylaw = Bylaw::new("rules").expect("bylaw");
    bylaw
        .add_integer_variable("fee", 10, VariableAccess::Constant)
        .expect("fee");
    bylaw
        .add_clause(
            "squat",
            r#"
var a = stash_funds(acct_alice, "acct_alice", fee);
var b = stash_funds(acct_alice, "bob", fee);
var c = stash_funds(acct_alice, "fee", fee);
return a || b || c;
"#,
        )
        .expect("squat");
    let (mut contract, mut ledger) = active_with(bylaw);

    let trace = contract
        .trigger_clause("alice", "squat", &mut ledger)
        .expect("squat runs");
    assert!(has(&trace, |e| matches!(
        e,
        Event::ClauseExecuted { result: Some(Value::Bool(false)), .. }
    )));
    let failures = trace
        .events()
        .iter()
        .filter(|e| matches!(e, Event::NativeCallFailed { .. }))
        .count();
    assert_eq!(failures, 3);
    assert_eq!(contract.stashes().count(), 0);
    assert_eq!(ledger.balance("ACCT-ALICE").expect("balance"), 100);
    contract.validate().expect("still valid");
}

#[test]
fn clauses_read_balances_and_send_notices() {
    let mut bylaw = Bylaw::new("rules").expect("bylaw");
    bylaw
        .add_clause(
            "announce",
            r#"
var balance = get_acct_balance(acct_alice);
var reached = send_notice(bob);
var lost = send_notice("nobody");
send_notice_to_parties();
if (reached && !lost) { return balance; }
return -1;
"#,
        )
        .expect("announce");
    let (mut contract, mut ledger) = active_with(bylaw);

    let trace = contract
        .trigger_clause("bob", "announce", &mut ledger)
        .expect("announce");
    let notified: Vec<&str> = trace
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::NoticeSent { party, .. } => Some(party.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(notified, vec!["bob", "alice", "bob"]);
    assert!(has(&trace, |e| matches!(
        e,
        Event::ClauseExecuted { result: Some(Value::Int(100)), .. }
    )));
}

#[test]
fn validate_rechecks_names_read_from_json() {
    let contract: SmartContract = serde_json::from_str(
        r#"{
            "name": "k",
            "bylaws": {
                "main": {
                    "name": "main",
                    "variables": {
                        "x": {"name":"cron_evil","type":"integer","access":"persistent","value":1}
                    },
                    "clauses": {"hook_c": {"name":"hook_c","code":"1;"}}
                }
            },
            "stashes": {"pool": {"name": "vault"}}
        }"#,
    )
    .expect("decode contract");

    let problems = contract.validate().expect_err("names are invalid");
    let joined = problems.join("\n");
    assert!(joined.contains("cron_evil"), "{}", joined);
    assert!(joined.contains("mismatched key 'x'"), "{}", joined);
    assert!(joined.contains("hook_c"), "{}", joined);
    assert!(joined.contains("mismatched key 'pool'"), "{}", joined);
}
